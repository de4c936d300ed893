//! SplitStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::model::SplitConfig;

/// Append-only history of commission split tables.
#[async_trait]
pub trait SplitStore: Send + Sync {
    /// Latest published split table, if any.
    async fn current(&self) -> Result<Option<SplitConfig>>;

    /// Publish a new version. The stored version number is assigned by the
    /// store (latest + 1) and returned.
    async fn publish(&self, splits: SplitConfig) -> Result<SplitConfig>;
}
