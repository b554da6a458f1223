//! # vkernel-core
//!
//! Low-level pieces of per-container kernel module injection.
//!
//! This crate provides:
//! - **ELF**: identification and header reading for ELF32/ELF64 in either
//!   byte order, section table and name resolution, and in-place renaming of
//!   the module identity section.
//! - **Capabilities**: packing of the five Linux capability sets into the
//!   parameter string the module parses at load time.
//! - **Kernel module operations**: a trait over `uname(2)`,
//!   `init_module(2)` and `delete_module(2)` with a host implementation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod capability;
pub mod elf;
pub mod kmod;
