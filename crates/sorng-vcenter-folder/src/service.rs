//! Aggregate service façade for the folder crate.
//!
//! `FolderService` owns an `Inventory` and runs one request end to end:
//! request validation, the vCenter edition check, datacenter lookup and
//! reconciliation.

use crate::error::{FolderError, FolderResult};
use crate::inventory::Inventory;
use crate::reconciler::FolderReconciler;
use crate::report::FolderOutcome;
use crate::types::*;
use crate::vim::VimInventory;
use crate::vsphere::VsphereClient;

use log::info;
use std::time::Duration;

pub struct FolderService<I: Inventory> {
    inventory: I,
    task_timeout: Duration,
}

impl FolderService<VimInventory> {
    /// Log in to vCenter and wrap the session.
    pub async fn connect(config: &VsphereConfig) -> FolderResult<Self> {
        let mut client = VsphereClient::new(config)?;
        client.login().await?;
        info!("Connected to vCenter {}", client.base_url());
        Ok(Self::new(VimInventory::new(client))
            .with_task_timeout(Duration::from_secs(config.task_timeout_secs)))
    }

    /// End the vCenter session.
    pub async fn disconnect(&mut self) -> FolderResult<()> {
        self.inventory.client_mut().logout().await
    }
}

impl<I: Inventory> FolderService<I> {
    pub fn new(inventory: I) -> Self {
        Self {
            inventory,
            task_timeout: Duration::from_secs(3600),
        }
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    /// Run one folder request against the inventory.
    pub async fn ensure(&self, request: &FolderRequest) -> FolderResult<FolderOutcome> {
        request.validate()?;

        if !self.inventory.is_vcenter().await? {
            return Err(FolderError::config(
                "Folder management is meant for vCenter, the target endpoint is not a vCenter server.",
            ));
        }

        let datacenter = self
            .inventory
            .find_datacenter(&request.datacenter)
            .await?
            .ok_or_else(|| FolderError::not_found(format!("Failed to find datacenter {}", request.datacenter)))?;

        FolderReconciler::new(&self.inventory, &datacenter)
            .check_mode(request.check_mode)
            .task_timeout(self.task_timeout)
            .ensure(request)
            .await
    }
}
