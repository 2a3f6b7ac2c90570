//! FortiGate-backed policy provider

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use drishti_policy::model::PolicySet;
use drishti_policy::provider::PolicyProvider;

use crate::parser::parse_config;

/// Loads a policy set from a FortiGate configuration dump on disk.
pub struct FortigateProvider {
    path: PathBuf,
}

impl FortigateProvider {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PolicyProvider for FortigateProvider {
    async fn load(&self) -> Result<PolicySet> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("cannot read FortiGate config {}", self.path.display()))?;
        let set = parse_config(&text)?;
        info!(
            addresses = set.catalog.addresses.len(),
            address_groups = set.catalog.address_groups.len(),
            services = set.catalog.services.len(),
            service_groups = set.catalog.service_groups.len(),
            policies = set.drafts.len(),
            "loaded FortiGate policy set"
        );
        Ok(set)
    }

    fn name(&self) -> &str {
        "fortigate"
    }
}
