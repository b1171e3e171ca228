//! Identifier newtypes for pooled devices and their holders
//!
//! `ResourceId` and `HolderId` are deliberately distinct types: a
//! resource id is a stable device path on the host, a holder id is the
//! identity (container name or id) a reservation is attributed to.
//! Keeping them apart stops release-by-holder calls from being fed a
//! device path and vice versa.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a discoverable host device (its full path).
///
/// Ordered so that pools can hand out devices in a deterministic,
/// ascending order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of the party holding a reservation (e.g. a container name).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HolderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for HolderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ids_order_ascending() {
        let mut ids = vec![
            ResourceId::from("/dev/accel2"),
            ResourceId::from("/dev/accel0"),
            ResourceId::from("/dev/accel1"),
        ];
        ids.sort();
        assert_eq!(ids[0].as_str(), "/dev/accel0");
        assert_eq!(ids[2].as_str(), "/dev/accel2");
    }

    #[test]
    fn display_is_transparent() {
        assert_eq!(HolderId::from("web-1").to_string(), "web-1");
        assert_eq!(ResourceId::from("/dev/accel0").to_string(), "/dev/accel0");
    }
}
