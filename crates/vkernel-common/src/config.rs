//! Configuration model for module placement and naming.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, VKernelError};

/// Root configuration for the vkernel runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VKernelConfig {
    /// Built-in module name; also the module file stem.
    pub module_name: String,
    /// Root of the per-release module trees.
    pub modules_root: PathBuf,
    /// Install directory relative to `<modules_root>/<release>`.
    pub install_subdir: PathBuf,
    /// Path to the loaded-module registry.
    pub registry_file: PathBuf,
}

impl Default for VKernelConfig {
    fn default() -> Self {
        Self {
            module_name: constants::DEFAULT_MODULE_NAME.to_string(),
            modules_root: PathBuf::from(constants::DEFAULT_MODULES_ROOT),
            install_subdir: PathBuf::from(constants::DEFAULT_INSTALL_SUBDIR),
            registry_file: constants::default_registry_file(),
        }
    }
}

impl VKernelConfig {
    /// Reads a JSON configuration file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, does not parse, or
    /// fails validation.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| VKernelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the module name can be embedded in a kernel module.
    ///
    /// # Errors
    ///
    /// Returns an error if the module name is empty or contains NUL or `/`.
    pub fn validate(&self) -> Result<()> {
        if self.module_name.is_empty() {
            return Err(VKernelError::Config {
                message: "module_name is empty".into(),
            });
        }
        if self.module_name.contains(['\0', '/']) {
            return Err(VKernelError::Config {
                message: format!("module_name {:?} is not a valid file stem", self.module_name),
            });
        }
        Ok(())
    }

    /// Install directory of the module for a given kernel release.
    #[must_use]
    pub fn install_dir(&self, release: &str) -> PathBuf {
        self.modules_root.join(release).join(&self.install_subdir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_install_dir_matches_module_tree() {
        let config = VKernelConfig::default();
        assert_eq!(
            config.install_dir("5.15.0-91-generic"),
            PathBuf::from("/lib/modules/5.15.0-91-generic/extra/vkernel")
        );
    }

    #[test]
    fn from_file_fills_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vkernel.json");
        std::fs::write(&path, r#"{ "module_name": "vkn2" }"#).unwrap();

        let config = VKernelConfig::from_file(&path).unwrap();
        assert_eq!(config.module_name, "vkn2");
        assert_eq!(config.modules_root, PathBuf::from("/lib/modules"));
    }

    #[test]
    fn from_file_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vkernel.json");
        std::fs::write(&path, r#"{ "module_name": "" }"#).unwrap();

        assert!(matches!(
            VKernelConfig::from_file(&path),
            Err(VKernelError::Config { .. })
        ));
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = VKernelConfig::from_file(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(VKernelError::Io { .. })));
    }
}
