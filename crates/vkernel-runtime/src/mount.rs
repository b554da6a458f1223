//! Mount contribution for the surrounding container runtime.
//!
//! The runtime owns the container's mount list; this module only produces
//! the entry that makes the module directory visible inside the container.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Mount flags relevant to the module directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountFlags {
    /// `MS_BIND`.
    pub bind: bool,
    /// `MS_REC`.
    pub recursive: bool,
}

impl MountFlags {
    /// `MS_BIND | MS_REC`.
    pub const RECURSIVE_BIND: Self = Self {
        bind: true,
        recursive: true,
    };
}

/// A command the runtime runs before performing the mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PremountCommand {
    /// Program to execute.
    pub path: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

/// One entry of the container's mount list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountDescriptor {
    /// Host path.
    pub source: PathBuf,
    /// Path inside the container.
    pub destination: PathBuf,
    /// Filesystem type or `bind`.
    pub device: String,
    /// Mount flags.
    pub flags: MountFlags,
    /// Commands to run before mounting.
    pub premount_cmds: Vec<PremountCommand>,
}

/// Recursive bind mount of `install_dir` onto the same path in the
/// container, creating the destination first.
#[must_use]
pub fn module_mount(install_dir: &Path) -> MountDescriptor {
    MountDescriptor {
        source: install_dir.to_path_buf(),
        destination: install_dir.to_path_buf(),
        device: "bind".into(),
        flags: MountFlags::RECURSIVE_BIND,
        premount_cmds: vec![PremountCommand {
            path: "touch".into(),
            args: vec![install_dir.display().to_string()],
        }],
    }
}
