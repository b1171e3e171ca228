#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Shared types for devlease
//!
//! Identifiers for pooled devices and their holders, reservation
//! snapshots, and the container create-request model the injector
//! manipulates.

pub mod id;
pub mod request;
pub mod snapshot;

pub use id::{HolderId, ResourceId};
pub use request::{CreateRequest, DeviceMapping};
pub use snapshot::ResourceSnapshot;
