//! Binary tree placement.
//!
//! New affiliates are placed breadth-first under their referrer: the first
//! node (in BFS order) with a free slot gets them, left before right.
//! Without a usable referrer the search starts at the earliest root.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::ErrorKind;
use crate::interfaces::{AffiliateStore, StorageError};
use crate::model::{AffiliateId, Position};

/// Where a new affiliate goes. Both `None` means a new root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Placement {
    pub parent_id: Option<AffiliateId>,
    pub position: Option<Position>,
}

impl Placement {
    pub const ROOT: Placement = Placement {
        parent_id: None,
        position: None,
    };

    fn under(parent: AffiliateId, position: Position) -> Self {
        Self {
            parent_id: Some(parent),
            position: Some(position),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PlacementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlacementError::Storage(e) => e.kind(),
        }
    }
}

/// Breadth-first slot finder over the affiliate directory.
pub struct TreePlacement {
    affiliates: Arc<dyn AffiliateStore>,
}

impl TreePlacement {
    pub fn new(affiliates: Arc<dyn AffiliateStore>) -> Self {
        Self { affiliates }
    }

    /// Find a slot for a new affiliate. Read-only.
    ///
    /// An unknown referrer is treated as no referrer. If the search runs out
    /// of nodes without a free slot (only possible with corrupted links) the
    /// result is a new root.
    pub async fn place(
        &self,
        referrer_id: Option<AffiliateId>,
    ) -> Result<Placement, PlacementError> {
        let start = match referrer_id {
            Some(id) if self.affiliates.get(id).await?.is_some() => Some(id),
            Some(id) => {
                debug!(referrer_id = %id, "unknown referrer, placing from root");
                self.affiliates.first_root().await?
            }
            None => self.affiliates.first_root().await?,
        };

        let Some(start) = start else {
            if self.affiliates.count().await? > 0 {
                // Non-empty directory but every node has a parent: a cycle.
                warn!("no root found in non-empty directory, placing as new root");
            }
            return Ok(Placement::ROOT);
        };

        self.first_free_slot(start).await
    }

    async fn first_free_slot(&self, start: AffiliateId) -> Result<Placement, PlacementError> {
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::new();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                warn!(affiliate_id = %node, "cycle in placement tree, node skipped");
                continue;
            }

            let children = self.affiliates.children(node).await?;
            match (children.left, children.right) {
                (None, _) => return Ok(Placement::under(node, Position::Left)),
                (Some(_), None) => return Ok(Placement::under(node, Position::Right)),
                (Some(left), Some(right)) => {
                    queue.push_back(left);
                    queue.push_back(right);
                }
            }
        }

        warn!(start = %start, "placement search exhausted, placing as new root");
        Ok(Placement::ROOT)
    }
}
