//! Reservation snapshots for diagnostics and reconciliation

use crate::id::{HolderId, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of one reserved device.
///
/// Produced under the pool lock, so a list of snapshots is internally
/// consistent. Meant for diagnostics and reconciliation, not for
/// allocation decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub id: ResourceId,
    pub holder: HolderId,
    pub reserved_at: DateTime<Utc>,
}
