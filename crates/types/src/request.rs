//! Container create-request model
//!
//! The subset of a container-creation payload the injector reads and
//! rewrites. The daemon glue owning the full API payload converts to
//! and from this model at the boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A host device bound into a container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceMapping {
    pub path_on_host: String,
    pub path_in_container: String,
    pub cgroup_permissions: String,
}

impl DeviceMapping {
    /// Map a host device to the same path inside the container with
    /// full (rwm) cgroup permissions.
    pub fn same_path(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            path_on_host: path.clone(),
            path_in_container: path,
            cgroup_permissions: "rwm".to_string(),
        }
    }
}

/// Mutable view of a container-creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Container name; doubles as the holder identity for pooled devices.
    pub name: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Environment in `KEY=VALUE` form, as the engine API carries it.
    #[serde(default)]
    pub env: Vec<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub privileged: bool,

    #[serde(default)]
    pub auto_remove: bool,

    /// Log driver name; `none` is treated as a hint that the request
    /// comes from an image build.
    #[serde(default)]
    pub log_driver: Option<String>,

    /// Bind mount specs (`src:dst[:opts]`).
    #[serde(default)]
    pub binds: Vec<String>,

    #[serde(default)]
    pub devices: Vec<DeviceMapping>,
}

impl CreateRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Look up a label value.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Look up an environment variable by key in the `KEY=VALUE` list.
    #[must_use]
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            let (k, v) = entry.split_once('=')?;
            (k == key).then_some(v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_lookup() {
        let mut req = CreateRequest::new("web-1");
        req.env = vec![
            "PATH=/usr/bin".to_string(),
            "DEVLEASE_ENABLED=true".to_string(),
            "BROKEN".to_string(),
        ];
        assert_eq!(req.env_var("DEVLEASE_ENABLED"), Some("true"));
        assert_eq!(req.env_var("PATH"), Some("/usr/bin"));
        assert_eq!(req.env_var("BROKEN"), None);
        assert_eq!(req.env_var("MISSING"), None);
    }

    #[test]
    fn create_request_json_round_trip() {
        let mut req = CreateRequest::new("worker-3");
        req.labels
            .insert("devlease".to_string(), "true".to_string());
        req.devices.push(DeviceMapping::same_path("/dev/accel0"));

        let json = serde_json::to_string(&req).unwrap();
        let back: CreateRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn same_path_mapping_uses_rwm() {
        let dm = DeviceMapping::same_path("/dev/accel1");
        assert_eq!(dm.path_on_host, dm.path_in_container);
        assert_eq!(dm.cgroup_permissions, "rwm");
    }
}
