//! Unified error types for the vkernel workspace.
//!
//! Every hard failure bubbles up unchanged through this enum. A rename that
//! finds nothing to patch is not an error and never appears here.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum VKernelError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path (or pseudo-path such as `uname`) where the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The identification block does not start with the ELF magic.
    #[error("not an ELF object: bad magic {found:02x?}")]
    BadMagic {
        /// The four bytes found at offset 0.
        found: [u8; 4],
    },

    /// The `EI_CLASS` byte names neither ELF32 nor ELF64.
    #[error("unsupported ELF class {0:#04x}")]
    UnsupportedClass(u8),

    /// The `EI_DATA` byte names neither little nor big endian.
    #[error("unsupported ELF data encoding {0:#04x}")]
    UnsupportedEncoding(u8),

    /// The header or section table is structurally inconsistent.
    #[error("malformed ELF object: {message}")]
    Malformed {
        /// Description of the inconsistency.
        message: String,
    },

    /// A rename would write past the identifier it replaces.
    #[error("replacement identifier is {new_len} bytes but only {old_len} may be overwritten")]
    PatchOverflow {
        /// Length of the identifier being replaced.
        old_len: usize,
        /// Length of the replacement.
        new_len: usize,
    },

    /// A capability id or name is outside the supported range.
    #[error("invalid capability: {value}")]
    InvalidCapability {
        /// The rejected input.
        value: String,
    },

    /// A lifecycle operation was requested from the wrong state.
    #[error("cannot {operation} module {name} while {state}")]
    InvalidState {
        /// Logical module name.
        name: String,
        /// Current lifecycle state.
        state: String,
        /// Requested operation.
        operation: &'static str,
    },

    /// The kernel rejected a module load or unload.
    #[error("{operation} {module} failed: {source}")]
    Kernel {
        /// Kernel entry point that failed.
        operation: &'static str,
        /// Logical module name.
        module: String,
        /// Kernel-reported reason.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl VKernelError {
    /// Shorthand for a [`VKernelError::Malformed`] error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VKernelError>;
