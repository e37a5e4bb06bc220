//! `Inventory` backed by the vSphere VI/JSON API.

use crate::error::{FolderError, FolderErrorKind, FolderResult};
use crate::inventory::Inventory;
use crate::types::*;
use crate::vsphere::{fault_from_value, VsphereClient};

use async_trait::async_trait;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Folder inventory operations against a live vCenter.
pub struct VimInventory {
    client: VsphereClient,
}

#[derive(Debug, Deserialize)]
struct ServiceContent {
    about: AboutInfo,
}

#[derive(Debug, Deserialize)]
struct AboutInfo {
    #[serde(rename = "apiType")]
    api_type: String,
}

/// Row from `GET /api/vcenter/datacenter`.
#[derive(Debug, Deserialize)]
struct DatacenterSummary {
    datacenter: String,
    name: String,
}

/// Subset of the vim `TaskInfo` data object.
#[derive(Debug, Deserialize)]
struct RawTaskInfo {
    state: TaskState,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

impl VimInventory {
    pub fn new(client: VsphereClient) -> Self {
        Self { client }
    }

    pub fn client_mut(&mut self) -> &mut VsphereClient {
        &mut self.client
    }

    async fn property<T: DeserializeOwned>(&self, obj: &ObjectRef, name: &str) -> FolderResult<T> {
        self.client.get(&self.client.vim_path(obj, name)).await
    }

    async fn fetch_folder(&self, obj: &ObjectRef) -> FolderResult<Folder> {
        let name: String = self.property(obj, "name").await?;
        let child_type: ChildTypeSignature = self.property(obj, "childType").await?;
        let parent: Option<ObjectRef> = self.property(obj, "parent").await?;
        Ok(Folder {
            moref: obj.clone(),
            name,
            child_type,
            parent,
        })
    }
}

/// A vanished managed object is an absent result, not a failure.
fn missing_as_none<T>(result: FolderResult<T>) -> FolderResult<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.kind == FolderErrorKind::ManagedObjectNotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Error for a task that finished in the `error` state.
fn task_failure(error: Option<&serde_json::Value>) -> FolderError {
    let Some(error) = error else {
        return FolderError::task("Task failed without fault details");
    };
    let localized = error
        .get("localizedMessage")
        .and_then(|m| m.as_str())
        .map(str::to_string);
    match error.get("fault").and_then(fault_from_value) {
        Some(fault) => match localized {
            Some(msg) => FolderError::new(fault.kind, msg),
            None => fault,
        },
        None => FolderError::task(localized.unwrap_or_else(|| error.to_string())),
    }
}

#[async_trait]
impl Inventory for VimInventory {
    async fn is_vcenter(&self) -> FolderResult<bool> {
        let instance = ObjectRef::new("ServiceInstance", "ServiceInstance");
        let content: ServiceContent = self.property(&instance, "content").await?;
        debug!("Endpoint apiType = {}", content.about.api_type);
        Ok(content.about.api_type == "VirtualCenter")
    }

    async fn find_datacenter(&self, name: &str) -> FolderResult<Option<Datacenter>> {
        let found = self
            .client
            .get_with_params::<Vec<DatacenterSummary>>(
                "/api/vcenter/datacenter",
                &[("names".into(), name.to_string())],
            )
            .await?;
        let Some(summary) = found.into_iter().find(|dc| dc.name == name) else {
            return Ok(None);
        };

        let moref = ObjectRef::new("Datacenter", summary.datacenter);
        let mut roots = Vec::with_capacity(FolderType::ALL.len());
        for folder_type in FolderType::ALL {
            let root: ObjectRef = self
                .property(&moref, folder_type.datacenter_property())
                .await?;
            roots.push(root);
        }
        let [vm_folder, host_folder, datastore_folder, network_folder]: [ObjectRef; 4] = roots
            .try_into()
            .map_err(|_| FolderError::parse("Datacenter did not report four root folders"))?;

        Ok(Some(Datacenter {
            moref,
            name: summary.name,
            vm_folder,
            host_folder,
            datastore_folder,
            network_folder,
        }))
    }

    async fn lookup(&self, obj: &ObjectRef) -> FolderResult<Option<InventoryNode>> {
        let Some(name) = missing_as_none(self.property::<String>(obj, "name").await)? else {
            return Ok(None);
        };
        let parent: Option<ObjectRef> = self.property(obj, "parent").await?;
        Ok(Some(InventoryNode {
            moref: obj.clone(),
            name,
            parent,
        }))
    }

    async fn folder(&self, obj: &ObjectRef) -> FolderResult<Option<Folder>> {
        missing_as_none(self.fetch_folder(obj).await)
    }

    async fn folders_under(&self, anchor: &ObjectRef, name: &str) -> FolderResult<Vec<Folder>> {
        let mut found = Vec::new();
        let mut pending = VecDeque::from([anchor.clone()]);

        // Only `name` is read for every folder; the rest only for matches.
        while let Some(current) = pending.pop_front() {
            let children: Option<Vec<ObjectRef>> =
                missing_as_none(self.property(&current, "childEntity").await)?;
            for child in children.unwrap_or_default().into_iter().filter(ObjectRef::is_folder) {
                let child_name = missing_as_none(self.property::<String>(&child, "name").await)?;
                let Some(child_name) = child_name else {
                    debug!("Folder {child} vanished during enumeration");
                    continue;
                };
                if child_name == name {
                    if let Some(folder) = self.folder(&child).await? {
                        found.push(folder);
                    }
                }
                pending.push_back(child);
            }
        }

        Ok(found)
    }

    async fn create_folder(&self, parent: &ObjectRef, name: &str) -> FolderResult<Folder> {
        let path = self.client.vim_path(parent, "CreateFolder");
        let created: ObjectRef = self
            .client
            .post(&path, &serde_json::json!({ "name": name }))
            .await?;
        self.fetch_folder(&created).await
    }

    async fn destroy(&self, obj: &ObjectRef) -> FolderResult<TaskRef> {
        let path = self.client.vim_path(obj, "Destroy_Task");
        Ok(TaskRef(self.client.post_empty(&path).await?))
    }

    async fn unregister_and_destroy(&self, obj: &ObjectRef) -> FolderResult<TaskRef> {
        let path = self.client.vim_path(obj, "UnregisterAndDestroy_Task");
        Ok(TaskRef(self.client.post_empty(&path).await?))
    }

    async fn wait_for_task(&self, task: &TaskRef) -> FolderResult<TaskInfo> {
        let interval = Duration::from_millis(self.client.config().task_poll_interval_ms);
        loop {
            let info: RawTaskInfo = self.property(&task.0, "info").await?;
            match info.state {
                TaskState::Success => {
                    return Ok(TaskInfo {
                        state: TaskState::Success,
                        message: info.result.map(|r| match r {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        }),
                    })
                }
                TaskState::Error => {
                    let err = task_failure(info.error.as_ref());
                    warn!("Task {} failed: {}", task.0, err.message);
                    return Err(err);
                }
                TaskState::Queued | TaskState::Running => {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_fault_keeps_type_and_localized_message() {
        let error = serde_json::json!({
            "_typeName": "LocalizedMethodFault",
            "fault": { "_typeName": "ConcurrentAccess" },
            "localizedMessage": "The object was modified by another client"
        });
        let err = task_failure(Some(&error));
        assert_eq!(err.kind, FolderErrorKind::ConcurrentAccess);
        assert_eq!(err.message, "The object was modified by another client");
    }

    #[test]
    fn task_without_fault_is_a_task_error() {
        assert_eq!(task_failure(None).kind, FolderErrorKind::TaskError);
    }

    #[test]
    fn raw_task_info_parses_vim_states() {
        let info: RawTaskInfo =
            serde_json::from_str(r#"{"_typeName":"TaskInfo","state":"running","key":"task-7"}"#).unwrap();
        assert_eq!(info.state, TaskState::Running);
        assert!(info.error.is_none());
    }

    #[test]
    fn morefs_parse_from_vim_json() {
        let moref: ObjectRef = serde_json::from_str(
            r#"{"_typeName":"ManagedObjectReference","type":"Folder","value":"group-v4"}"#,
        )
        .unwrap();
        assert_eq!(moref, ObjectRef::folder("group-v4"));
    }

    mod http {
        use super::*;
        use serde_json::{json, Value};
        use wiremock::matchers::{body_json, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const SDK: &str = "/sdk/vim25/8.0.1.0";

        fn moref(kind: &str, value: &str) -> Value {
            json!({ "_typeName": "ManagedObjectReference", "type": kind, "value": value })
        }

        fn vm_child_types() -> Value {
            json!(["Folder", "VirtualMachine", "VirtualApp"])
        }

        async fn property(server: &MockServer, member: &str, body: Value) {
            Mock::given(method("GET"))
                .and(path(format!("{SDK}/{member}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }

        async fn never_read(server: &MockServer, member: &str) {
            Mock::given(method("GET"))
                .and(path(format!("{SDK}/{member}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
                .expect(0)
                .mount(server)
                .await;
        }

        async fn connected(server: &MockServer) -> VimInventory {
            Mock::given(method("POST"))
                .and(path("/api/session"))
                .respond_with(ResponseTemplate::new(201).set_body_json("sid-1"))
                .mount(server)
                .await;
            let mut client = VsphereClient::new(&VsphereConfig {
                host: server.uri(),
                username: "admin".into(),
                password: "secret".into(),
                task_poll_interval_ms: 1,
                ..Default::default()
            })
            .unwrap();
            client.login().await.unwrap();
            VimInventory::new(client)
        }

        #[tokio::test]
        async fn edition_check_reads_api_type() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            property(
                &server,
                "ServiceInstance/ServiceInstance/content",
                json!({ "_typeName": "ServiceContent", "about": { "apiType": "HostAgent" } }),
            )
            .await;

            assert!(!inv.is_vcenter().await.unwrap());
        }

        #[tokio::test]
        async fn datacenter_lookup_reads_root_folders() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            Mock::given(method("GET"))
                .and(path("/api/vcenter/datacenter"))
                .and(query_param("names", "DC0"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!([{ "datacenter": "datacenter-3", "name": "DC0" }])),
                )
                .mount(&server)
                .await;
            property(&server, "Datacenter/datacenter-3/vmFolder", moref("Folder", "group-v4")).await;
            property(&server, "Datacenter/datacenter-3/hostFolder", moref("Folder", "group-h5")).await;
            property(&server, "Datacenter/datacenter-3/datastoreFolder", moref("Folder", "group-s6")).await;
            property(&server, "Datacenter/datacenter-3/networkFolder", moref("Folder", "group-n7")).await;

            let dc = inv.find_datacenter("DC0").await.unwrap().unwrap();
            assert_eq!(dc.moref, ObjectRef::new("Datacenter", "datacenter-3"));
            assert_eq!(dc.vm_folder, ObjectRef::folder("group-v4"));
            assert_eq!(dc.network_folder, ObjectRef::folder("group-n7"));
            assert_eq!(dc.root_folder(FolderType::Datastore), &ObjectRef::folder("group-s6"));
        }

        #[tokio::test]
        async fn unknown_datacenter_is_none() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            Mock::given(method("GET"))
                .and(path("/api/vcenter/datacenter"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
                .mount(&server)
                .await;

            assert!(inv.find_datacenter("DC9").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn folder_crawl_reads_details_only_for_name_matches() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            property(
                &server,
                "Folder/group-v4/childEntity",
                json!([
                    moref("Folder", "group-v5"),
                    moref("VirtualMachine", "vm-1"),
                    moref("Folder", "group-v6")
                ]),
            )
            .await;
            property(&server, "Folder/group-v5/name", json!("a")).await;
            property(&server, "Folder/group-v5/childEntity", json!([moref("Folder", "group-v7")])).await;
            property(&server, "Folder/group-v6/name", json!("b")).await;
            property(&server, "Folder/group-v6/childEntity", json!([])).await;
            property(&server, "Folder/group-v6/childType", vm_child_types()).await;
            property(&server, "Folder/group-v6/parent", moref("Folder", "group-v4")).await;
            property(&server, "Folder/group-v7/name", json!("b")).await;
            property(&server, "Folder/group-v7/childEntity", json!([])).await;
            property(&server, "Folder/group-v7/childType", vm_child_types()).await;
            property(&server, "Folder/group-v7/parent", moref("Folder", "group-v5")).await;
            never_read(&server, "Folder/group-v5/childType").await;
            never_read(&server, "VirtualMachine/vm-1/name").await;

            let found = inv
                .folders_under(&ObjectRef::folder("group-v4"), "b")
                .await
                .unwrap();
            let ids: Vec<_> = found.iter().map(|f| f.moref.value.as_str()).collect();
            assert_eq!(ids, ["group-v6", "group-v7"]);
            assert_eq!(found[1].parent, Some(ObjectRef::folder("group-v5")));
            assert!(found[0].child_type.contains("VirtualMachine"));
        }

        #[tokio::test]
        async fn vanished_object_looks_up_as_none() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            Mock::given(method("GET"))
                .and(path(format!("{SDK}/Folder/group-v99/name")))
                .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                    "_typeName": "ManagedObjectNotFound",
                    "message": "The object 'vim.Folder:group-v99' has already been deleted"
                })))
                .mount(&server)
                .await;
            property(&server, "Folder/group-d1/name", json!("Datacenters")).await;
            Mock::given(method("GET"))
                .and(path(format!("{SDK}/Folder/group-d1/parent")))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            assert!(inv.lookup(&ObjectRef::folder("group-v99")).await.unwrap().is_none());
            let root = inv.lookup(&ObjectRef::folder("group-d1")).await.unwrap().unwrap();
            assert_eq!(root.name, "Datacenters");
            assert!(root.parent.is_none());
        }

        #[tokio::test]
        async fn create_folder_posts_name_and_reads_back() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            Mock::given(method("POST"))
                .and(path(format!("{SDK}/Folder/group-v4/CreateFolder")))
                .and(body_json(json!({ "name": "tier1" })))
                .respond_with(ResponseTemplate::new(200).set_body_json(moref("Folder", "group-v9")))
                .expect(1)
                .mount(&server)
                .await;
            property(&server, "Folder/group-v9/name", json!("tier1")).await;
            property(&server, "Folder/group-v9/childType", vm_child_types()).await;
            property(&server, "Folder/group-v9/parent", moref("Folder", "group-v4")).await;

            let folder = inv
                .create_folder(&ObjectRef::folder("group-v4"), "tier1")
                .await
                .unwrap();
            assert_eq!(folder.moref, ObjectRef::folder("group-v9"));
            assert_eq!(folder.name, "tier1");
            assert_eq!(folder.parent, Some(ObjectRef::folder("group-v4")));
        }

        #[tokio::test]
        async fn create_folder_fault_is_tagged() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            Mock::given(method("POST"))
                .and(path(format!("{SDK}/Folder/group-v4/CreateFolder")))
                .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                    "_typeName": "DuplicateName",
                    "name": "tier1"
                })))
                .mount(&server)
                .await;

            let err = inv
                .create_folder(&ObjectRef::folder("group-v4"), "tier1")
                .await
                .unwrap_err();
            assert_eq!(err.kind, FolderErrorKind::DuplicateName);
        }

        #[tokio::test]
        async fn destroy_task_is_polled_until_success() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            Mock::given(method("POST"))
                .and(path(format!("{SDK}/Folder/group-h8/Destroy_Task")))
                .respond_with(ResponseTemplate::new(200).set_body_json(moref("Task", "task-11")))
                .expect(1)
                .mount(&server)
                .await;
            for state in ["queued", "running"] {
                Mock::given(method("GET"))
                    .and(path(format!("{SDK}/Task/task-11/info")))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": state })))
                    .up_to_n_times(1)
                    .expect(1)
                    .mount(&server)
                    .await;
            }
            Mock::given(method("GET"))
                .and(path(format!("{SDK}/Task/task-11/info")))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "state": "success", "result": null })),
                )
                .expect(1)
                .mount(&server)
                .await;

            let task = inv.destroy(&ObjectRef::folder("group-h8")).await.unwrap();
            assert_eq!(task, TaskRef(ObjectRef::new("Task", "task-11")));
            let info = inv.wait_for_task(&task).await.unwrap();
            assert_eq!(info.state, TaskState::Success);
            assert!(info.message.is_none());
        }

        #[tokio::test]
        async fn unregister_and_destroy_reports_task_result() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            Mock::given(method("POST"))
                .and(path(format!("{SDK}/Folder/group-v4/UnregisterAndDestroy_Task")))
                .respond_with(ResponseTemplate::new(200).set_body_json(moref("Task", "task-12")))
                .expect(1)
                .mount(&server)
                .await;
            property(
                &server,
                "Task/task-12/info",
                json!({ "state": "success", "result": "2 virtual machines unregistered" }),
            )
            .await;

            let task = inv
                .unregister_and_destroy(&ObjectRef::folder("group-v4"))
                .await
                .unwrap();
            let info = inv.wait_for_task(&task).await.unwrap();
            assert_eq!(info.message.as_deref(), Some("2 virtual machines unregistered"));
        }

        #[tokio::test]
        async fn failed_task_carries_fault_kind() {
            let server = MockServer::start().await;
            let inv = connected(&server).await;
            property(
                &server,
                "Task/task-13/info",
                json!({
                    "state": "error",
                    "error": {
                        "_typeName": "LocalizedMethodFault",
                        "fault": { "_typeName": "InvalidState" },
                        "localizedMessage": "The operation is not allowed in the current state."
                    }
                }),
            )
            .await;

            let err = inv
                .wait_for_task(&TaskRef(ObjectRef::new("Task", "task-13")))
                .await
                .unwrap_err();
            assert_eq!(err.kind, FolderErrorKind::InvalidState);
            assert_eq!(err.message, "The operation is not allowed in the current state.");
        }
    }
}
