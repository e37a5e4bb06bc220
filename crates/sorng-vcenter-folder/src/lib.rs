//! # SortOfRemote NG – vCenter Folder Management
//!
//! Locates, creates and destroys inventory folders inside a vCenter
//! datacenter, reporting an idempotent no-op when the folder is already in
//! the requested state.
//!
//! ## Modules
//!
//! - **types** — Shared data structures (config, folders, datacenters, tasks, requests)
//! - **error** — Crate-specific error types and fault classification
//! - **inventory** — `Inventory` trait the core talks to
//! - **vsphere** — HTTP client with session-based auth and fault parsing
//! - **vim** — `Inventory` over the vSphere VI/JSON API
//! - **memory** — In-process `Inventory` with fault injection
//! - **resolver** — Folder lookup by name, path and managed object id
//! - **reconciler** — Present / absent state machine
//! - **report** — Outcome payloads
//! - **service** — Aggregate facade

pub mod types;
pub mod error;
pub mod inventory;
pub mod vsphere;
pub mod vim;
pub mod memory;
pub mod resolver;
pub mod reconciler;
pub mod report;
pub mod service;

pub use error::{FolderError, FolderErrorKind, FolderResult};
pub use inventory::Inventory;
pub use report::FolderOutcome;
pub use service::FolderService;
pub use types::{DesiredState, FolderRequest, FolderType, VsphereConfig};
