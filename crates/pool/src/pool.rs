//! The device pool and its reservation protocol

use crate::resource::Resource;
use devlease_errors::{Error, PoolError};
use devlease_types::{HolderId, ResourceId, ResourceSnapshot};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, error, info};

/// Fixed pool of exclusively reservable host devices.
///
/// The id set is established once by [`DevicePool::discover`] and never
/// changes afterwards; resources only toggle between free and reserved.
/// Every operation takes the single pool-wide lock for its whole
/// duration, so all operations are linearizable with respect to each
/// other. None of them block waiting for devices to free up.
#[derive(Debug)]
pub struct DevicePool {
    resources: Mutex<BTreeMap<ResourceId, Resource>>,
}

impl DevicePool {
    /// Build a pool by listing `source_path` and keeping every entry
    /// whose file name matches `name_pattern`. Resources are keyed by
    /// the entry's full path.
    ///
    /// Re-running discovery builds an independent pool; it is the only
    /// way to pick up added or removed devices.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidPattern` when `name_pattern` is not a
    /// valid regex and `PoolError::Discovery` when `source_path` cannot
    /// be listed. Listing failures are ordinary recoverable errors; the
    /// embedding service decides whether they are fatal.
    pub async fn discover(
        source_path: impl AsRef<Path>,
        name_pattern: &str,
    ) -> Result<Self, Error> {
        let source_path = source_path.as_ref();
        let pattern = Regex::new(name_pattern).map_err(|e| PoolError::InvalidPattern {
            pattern: name_pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut entries =
            tokio::fs::read_dir(source_path)
                .await
                .map_err(|e| PoolError::Discovery {
                    path: source_path.display().to_string(),
                    message: e.to_string(),
                })?;

        let mut resources = BTreeMap::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| PoolError::Discovery {
            path: source_path.display().to_string(),
            message: e.to_string(),
        })? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if pattern.is_match(name) {
                let id = ResourceId::new(entry.path().display().to_string());
                debug!(device = %id, "discovered device");
                resources.insert(id.clone(), Resource::new(id));
            }
        }

        info!(
            path = %source_path.display(),
            pattern = name_pattern,
            devices = resources.len(),
            "device discovery complete"
        );

        Ok(Self {
            resources: Mutex::new(resources),
        })
    }

    /// Build a pool over an explicit id set, bypassing the filesystem.
    /// Meant for embedders that already know their device list, and for
    /// tests.
    pub fn from_ids(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        let resources = ids
            .into_iter()
            .map(|id| (id.clone(), Resource::new(id)))
            .collect();
        Self {
            resources: Mutex::new(resources),
        }
    }

    /// Atomically reserve `count` free devices for `holder`.
    ///
    /// Devices are granted in ascending id order, so grants are
    /// deterministic for a given pool state. The call either returns
    /// exactly `count` ids (in the order they were reserved) or an
    /// error with the pool left exactly as it was; no partial grant is
    /// ever observable.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InsufficientResources` when fewer than
    /// `count` devices are free. `PoolError::InternalConsistency`
    /// signals a double reservation caught under the lock; it means a
    /// defect in the pool itself, not scarcity, and any partial grant
    /// made by this call has been rolled back.
    pub fn request(&self, holder: &HolderId, count: usize) -> Result<Vec<ResourceId>, Error> {
        let mut resources = self.resources.lock().unwrap();

        let available = resources.values().filter(|r| !r.is_reserved()).count();
        if available < count {
            debug!(
                holder = %holder,
                requested = count,
                available,
                "device request denied"
            );
            return Err(PoolError::InsufficientResources {
                requested: count,
                available,
            }
            .into());
        }

        // BTreeMap iteration yields ascending ids, which fixes the
        // selection order.
        let candidates: Vec<ResourceId> = resources
            .values()
            .filter(|r| !r.is_reserved())
            .map(|r| r.id().clone())
            .take(count)
            .collect();

        let mut granted: Vec<ResourceId> = Vec::with_capacity(count);
        for id in candidates {
            let reserved = resources
                .get_mut(&id)
                .is_some_and(|r| r.reserve(holder.clone()));
            if reserved {
                granted.push(id);
            } else {
                // Unreachable while the lock discipline holds; undo the
                // partial grant and report the defect.
                for granted_id in &granted {
                    if let Some(res) = resources.get_mut(granted_id) {
                        res.release();
                    }
                }
                error!(
                    holder = %holder,
                    device = %id,
                    "device already reserved while holding the pool lock"
                );
                return Err(PoolError::InternalConsistency {
                    message: format!("device {id} already reserved under the pool lock"),
                }
                .into());
            }
        }

        info!(holder = %holder, devices = ?granted, "reserved devices");
        Ok(granted)
    }

    /// Release every device currently held by `holder`.
    ///
    /// Unknown holders and already-free devices are ignored; calling
    /// this twice has the same effect as calling it once.
    pub fn release_by_holder(&self, holder: &HolderId) {
        let mut resources = self.resources.lock().unwrap();
        for resource in resources.values_mut() {
            if resource.holder() == Some(holder) {
                info!(holder = %holder, device = %resource.id(), "released device");
                resource.release();
            }
        }
    }

    /// Release the given devices regardless of holder.
    ///
    /// Ids not present in the pool, and devices that are already free,
    /// are ignored. Used by callers that track ids directly.
    pub fn release_by_ids(&self, ids: &[ResourceId]) {
        let mut resources = self.resources.lock().unwrap();
        for id in ids {
            if let Some(resource) = resources.get_mut(id) {
                if resource.is_reserved() {
                    info!(device = %id, "released device");
                    resource.release();
                }
            }
        }
    }

    /// Release every reserved device whose id satisfies `matches`.
    ///
    /// Covers callers that hold authoritative structured data about
    /// what was bound (e.g. a terminated container's device list)
    /// rather than holder-name bookkeeping.
    pub fn release_by_match(&self, matches: impl Fn(&ResourceId) -> bool) {
        let mut resources = self.resources.lock().unwrap();
        for resource in resources.values_mut() {
            if resource.is_reserved() && matches(resource.id()) {
                info!(device = %resource.id(), "released device");
                resource.release();
            }
        }
    }

    /// Consistent snapshot of all currently reserved devices, in
    /// ascending id order.
    #[must_use]
    pub fn list_reserved(&self) -> Vec<ResourceSnapshot> {
        let resources = self.resources.lock().unwrap();
        resources.values().filter_map(Resource::snapshot).collect()
    }

    /// Total number of discovered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of devices currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        let resources = self.resources.lock().unwrap();
        resources.values().filter(|r| !r.is_reserved()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(ids: &[&str]) -> DevicePool {
        DevicePool::from_ids(ids.iter().map(|id| ResourceId::from(*id)))
    }

    #[test]
    fn request_grants_ascending_ids() {
        let pool = pool(&["/dev/accel2", "/dev/accel0", "/dev/accel1"]);
        let granted = pool.request(&HolderId::from("cnt-a"), 2).unwrap();
        assert_eq!(
            granted,
            vec![
                ResourceId::from("/dev/accel0"),
                ResourceId::from("/dev/accel1")
            ]
        );
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn request_more_than_available_leaves_pool_unchanged() {
        let pool = pool(&["/dev/accel0", "/dev/accel1"]);
        pool.request(&HolderId::from("cnt-a"), 1).unwrap();

        let before = pool.list_reserved();
        let err = pool.request(&HolderId::from("cnt-b"), 2).unwrap_err();
        match err {
            Error::Pool(PoolError::InsufficientResources {
                requested,
                available,
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool.list_reserved(), before);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn request_zero_devices_succeeds_empty() {
        let pool = pool(&["/dev/accel0"]);
        let granted = pool.request(&HolderId::from("cnt-a"), 0).unwrap();
        assert!(granted.is_empty());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn release_by_holder_is_idempotent() {
        let pool = pool(&["/dev/accel0", "/dev/accel1"]);
        let holder = HolderId::from("cnt-a");
        pool.request(&holder, 2).unwrap();
        assert_eq!(pool.available(), 0);

        pool.release_by_holder(&holder);
        assert_eq!(pool.available(), 2);
        pool.release_by_holder(&holder);
        assert_eq!(pool.available(), 2);
        pool.release_by_holder(&HolderId::from("never-seen"));
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn release_by_ids_ignores_unknown_ids() {
        let pool = pool(&["/dev/accel0"]);
        let holder = HolderId::from("cnt-a");
        let granted = pool.request(&holder, 1).unwrap();

        pool.release_by_ids(&[
            granted[0].clone(),
            ResourceId::from("/dev/not-in-pool"),
        ]);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn release_by_match_uses_caller_device_list() {
        let pool = pool(&["/dev/accel0", "/dev/accel1", "/dev/accel2"]);
        pool.request(&HolderId::from("cnt-a"), 3).unwrap();

        let bound = ["/dev/accel0", "/dev/accel2"];
        pool.release_by_match(|id| bound.contains(&id.as_str()));

        assert_eq!(pool.available(), 2);
        let reserved = pool.list_reserved();
        assert_eq!(reserved.len(), 1);
        assert_eq!(reserved[0].id, ResourceId::from("/dev/accel1"));
    }

    #[test]
    fn released_device_can_be_reused_by_another_holder() {
        let pool = pool(&["/dev/accel0"]);
        let granted = pool.request(&HolderId::from("cnt-a"), 1).unwrap();
        pool.release_by_holder(&HolderId::from("cnt-a"));

        let again = pool.request(&HolderId::from("cnt-b"), 1).unwrap();
        assert_eq!(again, granted);
        let reserved = pool.list_reserved();
        assert_eq!(reserved[0].holder, HolderId::from("cnt-b"));
    }

    #[test]
    fn reserved_plus_free_is_constant() {
        let pool = pool(&["/dev/accel0", "/dev/accel1", "/dev/accel2"]);
        assert_eq!(pool.len(), 3);

        pool.request(&HolderId::from("cnt-a"), 2).unwrap();
        assert_eq!(pool.list_reserved().len() + pool.available(), 3);

        pool.release_by_holder(&HolderId::from("cnt-a"));
        assert_eq!(pool.list_reserved().len() + pool.available(), 3);
    }
}
