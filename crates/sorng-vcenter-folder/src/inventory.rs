//! Inventory client seam.
//!
//! The resolver and reconciler only talk to vCenter through this trait.
//! `VimInventory` implements it over the VI/JSON API and `MemoryInventory`
//! implements it in-process.

use crate::error::FolderResult;
use crate::types::*;

use async_trait::async_trait;

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Whether the endpoint is a vCenter server (as opposed to a standalone ESXi host).
    async fn is_vcenter(&self) -> FolderResult<bool>;

    /// Find a datacenter by exact name.
    async fn find_datacenter(&self, name: &str) -> FolderResult<Option<Datacenter>>;

    /// Name and parent of any inventory object. `None` if it no longer exists.
    async fn lookup(&self, obj: &ObjectRef) -> FolderResult<Option<InventoryNode>>;

    /// Fetch a folder directly by reference. `None` if it does not exist.
    async fn folder(&self, obj: &ObjectRef) -> FolderResult<Option<Folder>>;

    /// Every folder named `name` reachable below `anchor`, excluding the
    /// anchor itself, in breadth-first order.
    async fn folders_under(&self, anchor: &ObjectRef, name: &str) -> FolderResult<Vec<Folder>>;

    /// Create a child folder. Platform faults come back as tagged error kinds.
    async fn create_folder(&self, parent: &ObjectRef, name: &str) -> FolderResult<Folder>;

    /// Destroy an object and everything below it.
    async fn destroy(&self, obj: &ObjectRef) -> FolderResult<TaskRef>;

    /// Destroy a VM folder, unregistering contained virtual machines first.
    async fn unregister_and_destroy(&self, obj: &ObjectRef) -> FolderResult<TaskRef>;

    /// Block until the task reaches a terminal state. A failed task is
    /// returned as an error carrying the task's fault.
    async fn wait_for_task(&self, task: &TaskRef) -> FolderResult<TaskInfo>;
}
