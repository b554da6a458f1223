//! Persistent registry of loaded modules.
//!
//! A local JSON index lets one invocation unload what an earlier one loaded,
//! without a daemon holding the descriptors.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vkernel_common::error::{Result, VKernelError};
use vkernel_common::types::{ModuleDescriptor, ModuleName};

/// Persistent record of one loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Descriptor used for the load.
    pub descriptor: ModuleDescriptor,
    /// Container or session the module was loaded for.
    pub container_id: Option<String>,
    /// When the kernel accepted the module.
    pub loaded_at: DateTime<Utc>,
}

/// All recorded modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    /// Records in load order.
    pub modules: Vec<ModuleRecord>,
}

impl Registry {
    /// Adds `record`, replacing any record with the same module name.
    pub fn record(&mut self, record: ModuleRecord) {
        self.modules
            .retain(|r| r.descriptor.name != record.descriptor.name);
        self.modules.push(record);
    }

    /// Removes and returns the record for `name`.
    pub fn forget(&mut self, name: &ModuleName) -> Option<ModuleRecord> {
        let pos = self.modules.iter().position(|r| r.descriptor.name == *name)?;
        Some(self.modules.remove(pos))
    }

    /// Looks up the record for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::NotFound`] if no such module is recorded.
    pub fn find(&self, name: &ModuleName) -> Result<&ModuleRecord> {
        self.modules
            .iter()
            .find(|r| r.descriptor.name == *name)
            .ok_or_else(|| VKernelError::NotFound {
                kind: "module",
                id: name.to_string(),
            })
    }
}

/// Loads the registry from disk. A missing file is an empty registry.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_registry(path: &Path) -> Result<Registry> {
    tracing::debug!(path = %path.display(), "loading module registry");
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Registry::default()),
        Err(e) => {
            return Err(VKernelError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    Ok(serde_json::from_str(&content)?)
}

/// Persists the registry, writing a sibling temporary file and renaming it
/// over `path`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn save_registry(path: &Path, registry: &Registry) -> Result<()> {
    tracing::debug!(path = %path.display(), modules = registry.modules.len(), "saving module registry");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| VKernelError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let json = serde_json::to_string_pretty(registry)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| VKernelError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| VKernelError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
