#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Container create-request injection for devlease
//!
//! The [`Injector`] owns the loaded configuration and the device pool
//! and rewrites container-creation requests that opt in via labels or
//! environment variables: it merges environment and bind mounts,
//! rewrites the user, flips privileged/auto-remove flags, and binds
//! host devices, including exclusive devices reserved from the pool.
//!
//! The daemon glue calls [`Injector::process`] on every create request
//! and one of the release methods when a container goes away.

pub mod devices;
pub mod env;
pub mod trigger;
pub mod user;

mod injector;

pub use injector::Injector;
pub use trigger::Trigger;
