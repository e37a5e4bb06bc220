//! Present / absent reconciliation for a single folder.

use crate::error::{FolderError, FolderErrorKind, FolderResult};
use crate::inventory::Inventory;
use crate::report::{self, FolderOutcome};
use crate::resolver::FolderResolver;
use crate::types::*;

use log::{debug, info, warn};
use std::time::Duration;

/// What the reconciler will do for a desired/observed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Create,
    Delete,
}

/// Desired × observed → action.
pub fn plan(desired: DesiredState, found: bool) -> Action {
    match (desired, found) {
        (DesiredState::Present, true) | (DesiredState::Absent, false) => Action::NoOp,
        (DesiredState::Present, false) => Action::Create,
        (DesiredState::Absent, true) => Action::Delete,
    }
}

/// Resolved parent folder plus the label used in messages.
struct Anchor {
    folder: Folder,
    label: String,
}

pub struct FolderReconciler<'a, I: Inventory + ?Sized> {
    inventory: &'a I,
    resolver: FolderResolver<'a, I>,
    check_mode: bool,
    task_timeout: Duration,
}

impl<'a, I: Inventory + ?Sized> FolderReconciler<'a, I> {
    pub fn new(inventory: &'a I, datacenter: &'a Datacenter) -> Self {
        Self {
            inventory,
            resolver: FolderResolver::new(inventory, datacenter),
            check_mode: false,
            task_timeout: Duration::from_secs(3600),
        }
    }

    /// Report what would change without mutating anything.
    pub fn check_mode(mut self, enabled: bool) -> Self {
        self.check_mode = enabled;
        self
    }

    /// Bound on waiting for a destroy task.
    pub fn task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Drive `request` to its desired state.
    pub async fn ensure(&self, request: &FolderRequest) -> FolderResult<FolderOutcome> {
        request.validate()?;
        let folder_type = request.folder_type;

        let anchor = match request.parent_spec()? {
            Some(spec) => {
                let folder = self.resolver.resolve_parent(&spec, folder_type).await?;
                let label = match spec {
                    ParentSpec::Moid(_) => folder.name.clone(),
                    ParentSpec::Name(name) => name,
                    ParentSpec::Path { raw, .. } => raw,
                };
                Some(Anchor { folder, label })
            }
            None => None,
        };

        let existing = self
            .resolver
            .resolve(&request.folder_name, folder_type, anchor.as_ref().map(|a| &a.folder))
            .await?;

        match plan(request.state, existing.is_some()) {
            Action::NoOp => self.no_op(request, anchor.as_ref(), existing.as_ref()).await,
            Action::Create => self.create(request, anchor.as_ref()).await,
            Action::Delete => match existing {
                Some(folder) => self.delete(request, anchor.as_ref(), &folder).await,
                None => Err(FolderError::new(FolderErrorKind::Other, "delete planned without a target")),
            },
        }
    }

    async fn no_op(
        &self,
        request: &FolderRequest,
        anchor: Option<&Anchor>,
        existing: Option<&Folder>,
    ) -> FolderResult<FolderOutcome> {
        let label = anchor.map(|a| a.label.as_str());
        match existing {
            Some(folder) => {
                debug!("Folder {} already present as {}", request.folder_name, folder.moref);
                let path = self.resolver.folder_path(&folder.moref).await?;
                Ok(FolderOutcome::unchanged(
                    Some(path),
                    report::already_exists(&request.folder_name, label),
                ))
            }
            None => {
                debug!("Folder {} already absent", request.folder_name);
                Ok(FolderOutcome::unchanged(
                    None,
                    report::absent(&request.folder_name, request.folder_type, label),
                ))
            }
        }
    }

    async fn create(&self, request: &FolderRequest, anchor: Option<&Anchor>) -> FolderResult<FolderOutcome> {
        let label = anchor.map(|a| a.label.as_str());
        let name = request.folder_name.as_str();
        let folder_type = request.folder_type;

        if self.check_mode {
            return Ok(FolderOutcome::changed(
                None,
                report::lifecycle(name, folder_type, label, "will be created"),
            ));
        }

        let parent = match anchor {
            Some(a) => &a.folder.moref,
            None => self.resolver.datacenter().root_folder(folder_type),
        };

        match self.inventory.create_folder(parent, name).await {
            Ok(folder) => {
                info!("Created {folder_type} folder '{name}' as {}", folder.moref);
                // The folder exists now; a failed path lookup must not turn that into a failure.
                let path = match self.resolver.folder_path(&folder.moref).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!("Created folder {} but could not compute its path: {e}", folder.moref);
                        None
                    }
                };
                Ok(FolderOutcome::changed(
                    path,
                    report::lifecycle(name, folder_type, label, "created successfully"),
                ))
            }
            Err(e) => match e.kind {
                FolderErrorKind::DuplicateName => {
                    warn!("Folder '{name}' collides with an existing object: {}", e.message);
                    Ok(FolderOutcome::unchanged(
                        None,
                        format!(
                            "Failed to create folder as another object has same name in the same target folder : {}",
                            e.message
                        ),
                    ))
                }
                FolderErrorKind::InvalidName => Err(e.with_context(
                    "Failed to create folder as folder name is not a valid entity name",
                )),
                _ => Err(e.with_context("Failed to create folder due to generic exception")),
            },
        }
    }

    async fn delete(
        &self,
        request: &FolderRequest,
        anchor: Option<&Anchor>,
        folder: &Folder,
    ) -> FolderResult<FolderOutcome> {
        let label = anchor.map(|a| a.label.as_str());
        let name = request.folder_name.as_str();
        let folder_type = request.folder_type;
        let path = self.resolver.folder_path(&folder.moref).await?;

        if self.check_mode {
            return Ok(FolderOutcome::changed(
                Some(path),
                report::lifecycle(name, folder_type, label, "will be removed"),
            ));
        }

        let task = match folder_type {
            FolderType::Vm => self.inventory.unregister_and_destroy(&folder.moref).await,
            _ => self.inventory.destroy(&folder.moref).await,
        }
        .map_err(removal_failure)?;

        let info = tokio::time::timeout(self.task_timeout, self.inventory.wait_for_task(&task))
            .await
            .map_err(|_| {
                FolderError::timeout(format!(
                    "Timed out after {}s waiting for task {} removing folder '{name}'",
                    self.task_timeout.as_secs(),
                    task.0
                ))
            })?
            .map_err(removal_failure)?;

        match info.state {
            TaskState::Success => {
                info!("Removed {folder_type} folder '{name}' ({})", folder.moref);
                let mut msg = report::lifecycle(name, folder_type, label, "removed successfully");
                if let Some(result) = info.message.as_deref().filter(|m| !m.is_empty()) {
                    msg.push_str(&format!(" Task result: {result}"));
                }
                Ok(FolderOutcome::changed(Some(path), msg))
            }
            state => Err(removal_failure(FolderError::task(format!(
                "task {} finished in state {state:?}",
                task.0
            )))),
        }
    }
}

/// Every removal fault is fatal; the kind only picks the wording.
fn removal_failure(e: FolderError) -> FolderError {
    let context = match e.kind {
        FolderErrorKind::ConcurrentAccess => {
            "Failed to remove folder as another client modified folder before this operation"
        }
        FolderErrorKind::InvalidState => "Failed to remove folder as folder is in invalid state",
        _ => "Failed to remove folder due to generic exception",
    };
    e.with_context(context)
}
