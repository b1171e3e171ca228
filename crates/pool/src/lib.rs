#![deny(clippy::pedantic, unsafe_code)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc // Mutex::lock panics only on poisoning
)]

//! Exclusive device reservation for devlease
//!
//! A [`DevicePool`] tracks a fixed set of host devices discovered once
//! at startup and hands them out exclusively to holders (containers).
//! Acquisition is atomic over multiple devices: a request is granted in
//! full or not at all, and the pool is left untouched on failure.
//! Release is idempotent and comes in three flavors (by holder, by id,
//! by predicate) because callers have genuinely different information
//! available at cleanup time.
//!
//! The pool does not persist reservations, does not watch for device
//! hot-plug, and does not enforce isolation; it only tracks exclusivity
//! of logical device ids. Waiting and retry policy belong to the
//! caller: a request that cannot be satisfied fails immediately.

mod pool;
mod resource;

pub use pool::DevicePool;
