//! Per-device reservation state

use chrono::{DateTime, Utc};
use devlease_types::{HolderId, ResourceId, ResourceSnapshot};

/// Reservation state of one discovered device.
///
/// A resource is either free or reserved; `holder` is `Some` exactly
/// while it is reserved. `reserved_at` is written only on the
/// free-to-reserved transition, `released_at` only on the reverse one.
#[derive(Debug, Clone)]
pub(crate) struct Resource {
    id: ResourceId,
    holder: Option<HolderId>,
    reserved_at: Option<DateTime<Utc>>,
    released_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub(crate) fn new(id: ResourceId) -> Self {
        Self {
            id,
            holder: None,
            reserved_at: None,
            released_at: None,
        }
    }

    pub(crate) fn id(&self) -> &ResourceId {
        &self.id
    }

    pub(crate) fn is_reserved(&self) -> bool {
        self.holder.is_some()
    }

    pub(crate) fn holder(&self) -> Option<&HolderId> {
        self.holder.as_ref()
    }

    /// Reserve this resource for `holder`.
    ///
    /// Returns `false` (and changes nothing) if the resource is already
    /// reserved. The pool lock makes that unreachable in practice; the
    /// check exists to surface a broken locking discipline instead of
    /// silently double-assigning a device.
    pub(crate) fn reserve(&mut self, holder: HolderId) -> bool {
        if self.is_reserved() {
            return false;
        }
        self.holder = Some(holder);
        self.reserved_at = Some(Utc::now());
        true
    }

    /// Return this resource to the free state. No-op when already free.
    pub(crate) fn release(&mut self) {
        if self.holder.take().is_some() {
            self.released_at = Some(Utc::now());
        }
    }

    /// Snapshot of a reserved resource; `None` while free.
    pub(crate) fn snapshot(&self) -> Option<ResourceSnapshot> {
        let holder = self.holder.clone()?;
        Some(ResourceSnapshot {
            id: self.id.clone(),
            holder,
            // reserved_at is always set while a holder is present
            reserved_at: self.reserved_at.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_release_cycle() {
        let mut res = Resource::new(ResourceId::from("/dev/accel0"));
        assert!(!res.is_reserved());
        assert!(res.snapshot().is_none());

        assert!(res.reserve(HolderId::from("cnt-a")));
        assert!(res.is_reserved());
        let snap = res.snapshot().unwrap();
        assert_eq!(snap.holder, HolderId::from("cnt-a"));

        res.release();
        assert!(!res.is_reserved());
        assert!(res.holder().is_none());
    }

    #[test]
    fn double_reserve_is_rejected() {
        let mut res = Resource::new(ResourceId::from("/dev/accel0"));
        assert!(res.reserve(HolderId::from("cnt-a")));
        assert!(!res.reserve(HolderId::from("cnt-b")));
        assert_eq!(res.holder(), Some(&HolderId::from("cnt-a")));
    }

    #[test]
    fn release_when_free_is_a_no_op() {
        let mut res = Resource::new(ResourceId::from("/dev/accel0"));
        res.release();
        assert!(!res.is_reserved());
    }
}
