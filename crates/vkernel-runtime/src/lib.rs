//! Per-container module lifecycle for the vkernel runtime.
//!
//! [`vkernel::VKernel`] names, renames, loads and unloads one module
//! instance. [`registry`] remembers loaded instances across invocations and
//! [`mount`] describes the bind mount a container needs to see the module.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod mount;
pub mod registry;
pub mod vkernel;
