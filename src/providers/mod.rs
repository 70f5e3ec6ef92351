pub mod azure;

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::SyncConfig;
use crate::error::TransportError;
use crate::model::work_item::RemoteWorkItem;
use crate::sync::patch::FieldOp;

/// Which remote test cases make up the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogScope {
    /// Every test case referenced by the plan's suites.
    TestPlan(u64),
    /// Test cases under an area path (the whole project when empty).
    AreaPath(String),
}

impl CatalogScope {
    pub fn from_config(config: &SyncConfig) -> Self {
        match config.constants.test_plan_id {
            Some(plan) => CatalogScope::TestPlan(plan),
            None => CatalogScope::AreaPath(config.constants.area_path.clone()),
        }
    }
}

/// Remote test-management service. One attempt per call, no retries.
#[async_trait]
pub trait TestCaseService: Send + Sync {
    fn name(&self) -> &str;
    async fn list_catalog(&self, scope: &CatalogScope) -> Result<BTreeSet<u64>, TransportError>;
    async fn fetch(&self, ids: &[u64]) -> Result<Vec<RemoteWorkItem>, TransportError>;
    async fn patch(&self, id: u64, ops: &[FieldOp]) -> Result<(), TransportError>;
}

#[cfg(test)]
pub mod tests;

pub fn create_service(config: &SyncConfig) -> Result<Box<dyn TestCaseService>, TransportError> {
    let creds = &config.credentials;
    Ok(Box::new(azure::AzureDevOps::new(
        creds.base_url(),
        &creds.personal_access_token,
    )?))
}
