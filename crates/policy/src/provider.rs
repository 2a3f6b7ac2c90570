//! Policy provider seam
//!
//! A provider turns some backing source (a FortiGate configuration file, a
//! fixture, ...) into a [`PolicySet`] of catalog tables and policy drafts.

use anyhow::Result;
use async_trait::async_trait;

use crate::model::PolicySet;

#[async_trait]
pub trait PolicyProvider: Send + Sync {
    /// Load the raw policy set from the backing source.
    async fn load(&self) -> Result<PolicySet>;

    /// Provider name/identifier for logs.
    fn name(&self) -> &str;
}
