//! In-process `Inventory` with vCenter-like folder semantics.
//!
//! Seeded through `add_datacenter` / `add_folder`. Mutations issued through
//! the `Inventory` trait are recorded so callers can assert that dry runs
//! never reach the platform, and faults can be queued per call site.

use crate::error::{FolderError, FolderErrorKind, FolderResult};
use crate::inventory::Inventory;
use crate::types::*;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

const ROOT_FOLDER: &str = "group-d1";

/// Child-type signature vCenter assigns to each datacenter root folder.
pub fn category_child_types(folder_type: FolderType) -> ChildTypeSignature {
    match folder_type {
        FolderType::Vm => ["Folder", "VirtualMachine", "VirtualApp"].into_iter().collect(),
        FolderType::Host => ["Folder", "ComputeResource"].into_iter().collect(),
        FolderType::Datastore => ["Folder", "Datastore", "StoragePod"].into_iter().collect(),
        FolderType::Network => ["Folder", "Network", "DistributedVirtualSwitch"]
            .into_iter()
            .collect(),
    }
}

/// Mutating call that reached the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    CreateFolder { parent: ObjectRef, name: String },
    Destroy(ObjectRef),
    UnregisterAndDestroy(ObjectRef),
}

/// Where a queued fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    CreateFolder,
    Destroy,
    UnregisterAndDestroy,
    /// The destroy call succeeds but its task finishes in error.
    Task,
}

#[derive(Debug, Clone)]
struct Node {
    moref: ObjectRef,
    name: String,
    parent: Option<String>,
    children: Vec<String>,
    child_type: ChildTypeSignature,
}

#[derive(Debug)]
struct State {
    nodes: HashMap<String, Node>,
    datacenters: Vec<Datacenter>,
    tasks: HashMap<String, Option<FolderError>>,
    faults: Vec<(FaultPoint, FolderError)>,
    mutations: Vec<Mutation>,
    api_type: String,
    stall_tasks: bool,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn take_fault(&mut self, point: FaultPoint) -> Option<FolderError> {
        let idx = self.faults.iter().position(|(p, _)| *p == point)?;
        Some(self.faults.remove(idx).1)
    }

    fn node(&self, obj: &ObjectRef) -> FolderResult<&Node> {
        self.nodes
            .get(&obj.value)
            .filter(|n| n.moref.kind == obj.kind)
            .ok_or_else(|| {
                FolderError::new(
                    FolderErrorKind::ManagedObjectNotFound,
                    format!("The object '{obj}' has already been deleted or has not been completely created"),
                )
            })
    }

    fn insert(&mut self, node: Node) {
        if let Some(parent) = node.parent.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.push(node.moref.value.clone());
        }
        self.nodes.insert(node.moref.value.clone(), node);
    }

    fn insert_folder(&mut self, parent: &ObjectRef, name: &str) -> FolderResult<Folder> {
        if name.is_empty() || name.chars().count() > MAX_FOLDER_NAME_CHARS {
            return Err(FolderError::fault("InvalidName", format!("InvalidName: {name}")));
        }
        let parent_node = self.node(parent)?;
        if !parent_node.moref.is_folder() {
            return Err(FolderError::fault(
                "NotSupported",
                format!("{parent} cannot contain folders"),
            ));
        }
        let duplicate = parent_node
            .children
            .iter()
            .filter_map(|c| self.nodes.get(c))
            .any(|c| c.name == name);
        if duplicate {
            return Err(FolderError::fault("DuplicateName", format!("DuplicateName: {name}")));
        }

        let child_type = parent_node.child_type.clone();
        let id = format!("group-{}{}", moid_letter(&child_type), self.next_id());
        let node = Node {
            moref: ObjectRef::folder(id),
            name: name.to_string(),
            parent: Some(parent.value.clone()),
            children: Vec::new(),
            child_type,
        };
        let folder = to_folder(&node, &self.nodes);
        self.insert(node);
        Ok(folder)
    }

    fn remove_subtree(&mut self, moid: &str) {
        let Some(node) = self.nodes.remove(moid) else {
            return;
        };
        if let Some(parent) = node.parent.as_ref().and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| c != moid);
        }
        for child in node.children {
            self.remove_subtree(&child);
        }
    }

    fn start_destroy(&mut self, obj: &ObjectRef) -> FolderResult<TaskRef> {
        self.node(obj)?;
        let task = ObjectRef::new("Task", format!("task-{}", self.next_id()));
        let outcome = self.take_fault(FaultPoint::Task);
        if outcome.is_none() {
            self.remove_subtree(&obj.value);
        }
        self.tasks.insert(task.value.clone(), outcome);
        Ok(TaskRef(task))
    }
}

fn moid_letter(child_type: &ChildTypeSignature) -> char {
    if child_type.contains("VirtualMachine") {
        'v'
    } else if child_type.contains("ComputeResource") {
        'h'
    } else if child_type.contains("Datastore") {
        's'
    } else if child_type.contains("Network") {
        'n'
    } else {
        'd'
    }
}

fn parent_ref(node: &Node, nodes: &HashMap<String, Node>) -> Option<ObjectRef> {
    node.parent
        .as_ref()
        .and_then(|p| nodes.get(p))
        .map(|p| p.moref.clone())
}

fn to_folder(node: &Node, nodes: &HashMap<String, Node>) -> Folder {
    Folder {
        moref: node.moref.clone(),
        name: node.name.clone(),
        child_type: node.child_type.clone(),
        parent: parent_ref(node, nodes),
    }
}

/// In-memory vCenter inventory.
pub struct MemoryInventory {
    state: Mutex<State>,
}

impl Default for MemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryInventory {
    /// Empty inventory holding only the top-level "Datacenters" folder.
    pub fn new() -> Self {
        let mut state = State {
            nodes: HashMap::new(),
            datacenters: Vec::new(),
            tasks: HashMap::new(),
            faults: Vec::new(),
            mutations: Vec::new(),
            api_type: "VirtualCenter".to_string(),
            stall_tasks: false,
            next_id: 1,
        };
        state.insert(Node {
            moref: ObjectRef::folder(ROOT_FOLDER),
            name: "Datacenters".to_string(),
            parent: None,
            children: Vec::new(),
            child_type: ["Folder", "Datacenter"].into_iter().collect(),
        });
        Self { state: Mutex::new(state) }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a datacenter with its four category root folders.
    pub fn add_datacenter(&self, name: &str) -> Datacenter {
        let mut state = self.state();
        let dc_id = format!("datacenter-{}", state.next_id());
        state.insert(Node {
            moref: ObjectRef::new("Datacenter", dc_id.clone()),
            name: name.to_string(),
            parent: Some(ROOT_FOLDER.to_string()),
            children: Vec::new(),
            child_type: ChildTypeSignature::default(),
        });

        let mut roots = HashMap::new();
        for folder_type in FolderType::ALL {
            let child_type = category_child_types(folder_type);
            let id = format!("group-{}{}", moid_letter(&child_type), state.next_id());
            state.insert(Node {
                moref: ObjectRef::folder(id.clone()),
                name: folder_type.as_str().to_string(),
                parent: Some(dc_id.clone()),
                children: Vec::new(),
                child_type,
            });
            roots.insert(folder_type, ObjectRef::folder(id));
        }

        let root = |ft: FolderType| roots.get(&ft).cloned().unwrap_or_else(|| ObjectRef::folder(""));
        let dc = Datacenter {
            moref: ObjectRef::new("Datacenter", dc_id),
            name: name.to_string(),
            vm_folder: root(FolderType::Vm),
            host_folder: root(FolderType::Host),
            datastore_folder: root(FolderType::Datastore),
            network_folder: root(FolderType::Network),
        };
        state.datacenters.push(dc.clone());
        dc
    }

    /// Seed a folder without recording a mutation.
    pub fn add_folder(&self, parent: &ObjectRef, name: &str) -> FolderResult<Folder> {
        self.state().insert_folder(parent, name)
    }

    /// Seed a chain of nested folders and return the innermost one.
    pub fn add_folder_path(&self, parent: &ObjectRef, path: &[&str]) -> FolderResult<Folder> {
        let mut current = parent.clone();
        let mut last = None;
        for name in path {
            let folder = self.add_folder(&current, name)?;
            current = folder.moref.clone();
            last = Some(folder);
        }
        last.ok_or_else(|| FolderError::config("empty folder path"))
    }

    /// Report a different `about.apiType` (e.g. "HostAgent" for ESXi).
    pub fn set_api_type(&self, api_type: &str) {
        self.state().api_type = api_type.to_string();
    }

    /// Queue a one-shot fault for the next call at `point`.
    pub fn inject_fault(&self, point: FaultPoint, fault: FolderError) {
        self.state().faults.push((point, fault));
    }

    /// Leave every task running forever.
    pub fn stall_tasks(&self) {
        self.state().stall_tasks = true;
    }

    /// Mutating calls received through the `Inventory` trait, oldest first.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.state().mutations.clone()
    }

    pub fn contains(&self, obj: &ObjectRef) -> bool {
        self.state().node(obj).is_ok()
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn is_vcenter(&self) -> FolderResult<bool> {
        Ok(self.state().api_type == "VirtualCenter")
    }

    async fn find_datacenter(&self, name: &str) -> FolderResult<Option<Datacenter>> {
        let state = self.state();
        Ok(state
            .datacenters
            .iter()
            .find(|dc| dc.name == name && state.nodes.contains_key(&dc.moref.value))
            .cloned())
    }

    async fn lookup(&self, obj: &ObjectRef) -> FolderResult<Option<InventoryNode>> {
        let state = self.state();
        Ok(state.node(obj).ok().map(|node| InventoryNode {
            moref: node.moref.clone(),
            name: node.name.clone(),
            parent: parent_ref(node, &state.nodes),
        }))
    }

    async fn folder(&self, obj: &ObjectRef) -> FolderResult<Option<Folder>> {
        let state = self.state();
        Ok(state
            .node(obj)
            .ok()
            .filter(|n| n.moref.is_folder())
            .map(|n| to_folder(n, &state.nodes)))
    }

    async fn folders_under(&self, anchor: &ObjectRef, name: &str) -> FolderResult<Vec<Folder>> {
        let state = self.state();
        let mut found = Vec::new();
        let mut pending = VecDeque::from([state.node(anchor)?.moref.value.clone()]);

        while let Some(current) = pending.pop_front() {
            let Some(node) = state.nodes.get(&current) else {
                continue;
            };
            for child in node.children.iter().filter_map(|c| state.nodes.get(c)) {
                if !child.moref.is_folder() {
                    continue;
                }
                pending.push_back(child.moref.value.clone());
                if child.name == name {
                    found.push(to_folder(child, &state.nodes));
                }
            }
        }

        Ok(found)
    }

    async fn create_folder(&self, parent: &ObjectRef, name: &str) -> FolderResult<Folder> {
        let mut state = self.state();
        state.mutations.push(Mutation::CreateFolder {
            parent: parent.clone(),
            name: name.to_string(),
        });
        if let Some(fault) = state.take_fault(FaultPoint::CreateFolder) {
            return Err(fault);
        }
        state.insert_folder(parent, name)
    }

    async fn destroy(&self, obj: &ObjectRef) -> FolderResult<TaskRef> {
        let mut state = self.state();
        state.mutations.push(Mutation::Destroy(obj.clone()));
        if let Some(fault) = state.take_fault(FaultPoint::Destroy) {
            return Err(fault);
        }
        state.start_destroy(obj)
    }

    async fn unregister_and_destroy(&self, obj: &ObjectRef) -> FolderResult<TaskRef> {
        let mut state = self.state();
        state.mutations.push(Mutation::UnregisterAndDestroy(obj.clone()));
        if let Some(fault) = state.take_fault(FaultPoint::UnregisterAndDestroy) {
            return Err(fault);
        }
        if !state.node(obj)?.child_type.contains("VirtualMachine") {
            return Err(FolderError::fault(
                "NotSupported",
                format!("UnregisterAndDestroy is only supported on VM folders, not {obj}"),
            ));
        }
        state.start_destroy(obj)
    }

    async fn wait_for_task(&self, task: &TaskRef) -> FolderResult<TaskInfo> {
        let (stall, outcome) = {
            let state = self.state();
            let outcome = state.tasks.get(&task.0.value).cloned().ok_or_else(|| {
                FolderError::new(
                    FolderErrorKind::ManagedObjectNotFound,
                    format!("Unknown task {}", task.0),
                )
            })?;
            (state.stall_tasks, outcome)
        };
        if stall {
            std::future::pending::<()>().await;
        }
        match outcome {
            None => Ok(TaskInfo { state: TaskState::Success, message: None }),
            Some(fault) => Err(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn datacenter_has_four_typed_roots() {
        let inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC0");
        for ft in FolderType::ALL {
            let root = inv.folder(dc.root_folder(ft)).await.unwrap().unwrap();
            assert_eq!(root.name, ft.as_str());
            assert_eq!(root.child_type, category_child_types(ft));
            assert_eq!(root.parent.as_ref(), Some(&dc.moref));
        }
    }

    #[tokio::test]
    async fn created_folder_inherits_signature() {
        let inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC0");
        let f = inv.create_folder(&dc.network_folder, "Shared").await.unwrap();
        assert_eq!(f.child_type, category_child_types(FolderType::Network));
        assert!(f.moref.value.starts_with("group-n"));
    }

    #[tokio::test]
    async fn duplicate_sibling_names_fault() {
        let inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC0");
        inv.add_folder(&dc.vm_folder, "F").unwrap();
        let err = inv.create_folder(&dc.vm_folder, "F").await.unwrap_err();
        assert_eq!(err.kind, FolderErrorKind::DuplicateName);
    }

    #[tokio::test]
    async fn destroy_removes_subtree() {
        let inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC0");
        let top = inv.add_folder(&dc.host_folder, "a").unwrap();
        let leaf = inv.add_folder_path(&top.moref, &["b", "c"]).unwrap();
        let task = inv.destroy(&top.moref).await.unwrap();
        assert_eq!(inv.wait_for_task(&task).await.unwrap().state, TaskState::Success);
        assert!(!inv.contains(&top.moref));
        assert!(!inv.contains(&leaf.moref));
        assert!(inv.folders_under(&dc.host_folder, "c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn folders_under_filters_by_name_at_any_depth() {
        let inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC0");
        let shallow = inv.add_folder(&dc.vm_folder, "x").unwrap();
        let deep = inv.add_folder_path(&dc.vm_folder, &["a", "b", "x"]).unwrap();

        let found = inv.folders_under(&dc.vm_folder, "x").await.unwrap();
        let ids: Vec<_> = found.iter().map(|f| f.moref.clone()).collect();
        assert_eq!(ids, vec![shallow.moref, deep.moref]);
        assert!(inv.folders_under(&dc.vm_folder, "X").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unregister_and_destroy_requires_vm_folder() {
        let inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC0");
        let f = inv.add_folder(&dc.datastore_folder, "iso").unwrap();
        let err = inv.unregister_and_destroy(&f.moref).await.unwrap_err();
        assert_eq!(err.kind, FolderErrorKind::NotSupported);
        assert!(inv.contains(&f.moref));
    }

    #[tokio::test]
    async fn task_fault_leaves_folder_in_place() {
        let inv = MemoryInventory::new();
        let dc = inv.add_datacenter("DC0");
        let f = inv.add_folder(&dc.vm_folder, "busy").unwrap();
        inv.inject_fault(FaultPoint::Task, FolderError::fault("InvalidState", "busy"));
        let task = inv.unregister_and_destroy(&f.moref).await.unwrap();
        let err = inv.wait_for_task(&task).await.unwrap_err();
        assert_eq!(err.kind, FolderErrorKind::InvalidState);
        assert!(inv.contains(&f.moref));
    }
}
