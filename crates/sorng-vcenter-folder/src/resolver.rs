//! Folder resolution inside one datacenter.
//!
//! A folder is identified by name *and* by its child-type signature, which
//! must equal the signature of the requested category's root folder. That is
//! what keeps a vm folder named "Finance" apart from a network folder of the
//! same name. Name-only lookups additionally require the candidate to sit
//! directly under the category root of this datacenter.

use crate::error::{FolderError, FolderErrorKind, FolderResult};
use crate::inventory::Inventory;
use crate::types::*;

use log::debug;

/// Category folder → category root → datacenter.
pub const DATACENTER_DEPTH: usize = 2;

/// Upper bound on parent hops when walking towards the inventory root.
const MAX_ANCESTOR_WALK: usize = 256;

pub struct FolderResolver<'a, I: Inventory + ?Sized> {
    inventory: &'a I,
    datacenter: &'a Datacenter,
}

impl<'a, I: Inventory + ?Sized> FolderResolver<'a, I> {
    pub fn new(inventory: &'a I, datacenter: &'a Datacenter) -> Self {
        Self { inventory, datacenter }
    }

    pub fn datacenter(&self) -> &Datacenter {
        self.datacenter
    }

    /// Signature of this datacenter's root folder for `folder_type`.
    pub async fn category_signature(&self, folder_type: FolderType) -> FolderResult<ChildTypeSignature> {
        let root = self.datacenter.root_folder(folder_type);
        self.inventory
            .folder(root)
            .await?
            .map(|f| f.child_type)
            .ok_or_else(|| {
                FolderError::not_found(format!(
                    "Root {folder_type} folder {root} of datacenter {} is missing",
                    self.datacenter.name
                ))
            })
    }

    /// Find `folder_name` of `folder_type` under `parent`, or directly under
    /// the category root when no parent is given. Not finding it is `Ok(None)`.
    pub async fn resolve(
        &self,
        folder_name: &str,
        folder_type: FolderType,
        parent: Option<&Folder>,
    ) -> FolderResult<Option<Folder>> {
        let signature = self.category_signature(folder_type).await?;
        let anchor = match parent {
            Some(p) => &p.moref,
            None => self.datacenter.root_folder(folder_type),
        };

        for candidate in self.inventory.folders_under(anchor, folder_name).await? {
            if candidate.child_type != signature {
                continue;
            }
            if parent.is_some() || self.in_datacenter_scope(&candidate).await? {
                debug!("Resolved {folder_type} folder '{folder_name}' to {}", candidate.moref);
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Whether the grandparent of `folder` is this datacenter.
    pub async fn in_datacenter_scope(&self, folder: &Folder) -> FolderResult<bool> {
        Ok(self
            .ancestor_at(&folder.moref, DATACENTER_DEPTH)
            .await?
            .is_some_and(|dc| dc.name == self.datacenter.name))
    }

    /// The ancestor `depth` parent hops above `obj` (0 is `obj` itself).
    pub async fn ancestor_at(&self, obj: &ObjectRef, depth: usize) -> FolderResult<Option<InventoryNode>> {
        let mut current = match self.inventory.lookup(obj).await? {
            Some(node) => node,
            None => return Ok(None),
        };
        for _ in 0..depth {
            let Some(parent) = current.parent.clone() else {
                return Ok(None);
            };
            match self.inventory.lookup(&parent).await? {
                Some(node) => current = node,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Walk a multi-segment path, each segment anchored on the previous one.
    pub async fn resolve_path(&self, segments: &[String], folder_type: FolderType) -> FolderResult<Folder> {
        let mut current: Option<Folder> = None;
        for segment in segments {
            match self.resolve(segment, folder_type, current.as_ref()).await? {
                Some(folder) => current = Some(folder),
                None => return Err(FolderError::not_found(format!("Could not find folder {segment}"))),
            }
        }
        current.ok_or_else(|| FolderError::config("parent folder path has no segments"))
    }

    /// Direct lookup by managed object id.
    pub async fn resolve_moid(&self, moid: &str) -> FolderResult<Folder> {
        let not_found = || {
            FolderError::not_found(format!(
                "Could not find folder using moid {moid} : The object 'vim.Folder:{moid}' has already been deleted or has not been completely created"
            ))
        };
        match self.inventory.folder(&ObjectRef::folder(moid)).await {
            Ok(Some(folder)) => Ok(folder),
            Ok(None) => Err(not_found()),
            Err(e) if e.kind == FolderErrorKind::ManagedObjectNotFound => Err(not_found()),
            Err(e) => Err(e),
        }
    }

    /// Resolve the caller's parent anchor. Every failure here is fatal.
    pub async fn resolve_parent(&self, spec: &ParentSpec, folder_type: FolderType) -> FolderResult<Folder> {
        match spec {
            ParentSpec::Moid(moid) => self.resolve_moid(moid).await,
            ParentSpec::Path { segments, .. } => self.resolve_path(segments, folder_type).await,
            ParentSpec::Name(name) => self
                .resolve(name, folder_type, None)
                .await?
                .ok_or_else(|| FolderError::not_found(format!("Parent folder {name} does not exist"))),
        }
    }

    /// Slash-joined names from just below the inventory root down to `obj`,
    /// e.g. `DC0/vm/tier1/tier2`.
    pub async fn folder_path(&self, obj: &ObjectRef) -> FolderResult<String> {
        let mut names = Vec::new();
        let mut next = Some(obj.clone());

        while let Some(current) = next {
            if names.len() >= MAX_ANCESTOR_WALK {
                return Err(FolderError::parse(format!(
                    "Parent chain of {obj} exceeds {MAX_ANCESTOR_WALK} levels"
                )));
            }
            let node = self.inventory.lookup(&current).await?.ok_or_else(|| {
                FolderError::not_found(format!("Inventory object {current} vanished while computing its path"))
            })?;
            if node.parent.is_none() {
                break;
            }
            names.push(node.name);
            next = node.parent;
        }

        names.reverse();
        Ok(names.join("/"))
    }
}
