//! Domain primitive types used across the vkernel workspace.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MODULE_NAME, MODULE_EXTENSION, NAME_DISCRIMINATOR_SEPARATOR};
use crate::error::{Result, VKernelError};

/// Kernel-visible name of a module instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleName(String);

impl ModuleName {
    /// Creates a module name from a string value.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Composes `base` with an optional discriminator, e.g. a container id.
    ///
    /// An empty discriminator yields the bare base name.
    ///
    /// # Errors
    ///
    /// Returns an error if the discriminator contains a NUL byte, which the
    /// kernel could never see past.
    pub fn compose(base: &str, discriminator: Option<&str>) -> Result<Self> {
        match discriminator.filter(|d| !d.is_empty()) {
            None => Ok(Self::new(base)),
            Some(d) if d.contains('\0') => Err(VKernelError::Config {
                message: format!("module discriminator contains NUL: {d:?}"),
            }),
            Some(d) => Ok(Self(format!("{base}{NAME_DISCRIMINATOR_SEPARATOR}{d}"))),
        }
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModuleName {
    fn default() -> Self {
        Self::new(DEFAULT_MODULE_NAME)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The handle used for both load and unload of one module instance.
///
/// Created once per container or session and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Logical (possibly suffixed) module name.
    pub name: ModuleName,
    /// Built-in name compiled into the module file.
    pub default_name: ModuleName,
    /// Directory holding the module file.
    pub install_dir: PathBuf,
}

impl ModuleDescriptor {
    /// Path of the module object inside the install directory.
    #[must_use]
    pub fn module_path(&self) -> PathBuf {
        self.install_dir
            .join(format!("{}.{MODULE_EXTENSION}", self.default_name))
    }

    /// Whether the logical name differs from the compiled-in one.
    #[must_use]
    pub fn needs_rename(&self) -> bool {
        self.name != self.default_name
    }
}

/// Lifecycle state of a module instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleState {
    /// Descriptor built, nothing loaded yet.
    Named,
    /// The kernel accepted the module image.
    Loaded,
    /// The kernel removed the module.
    Unloaded,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named => write!(f, "named"),
            Self::Loaded => write!(f, "loaded"),
            Self::Unloaded => write!(f, "unloaded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_without_discriminator_keeps_base() {
        let name = ModuleName::compose("vkernel", None).unwrap();
        assert_eq!(name.as_str(), "vkernel");
        let name = ModuleName::compose("vkernel", Some("")).unwrap();
        assert_eq!(name.as_str(), "vkernel");
    }

    #[test]
    fn compose_appends_discriminator() {
        let name = ModuleName::compose("vkernel", Some("c0ffee")).unwrap();
        assert_eq!(name.as_str(), "vkernel_c0ffee");
    }

    #[test]
    fn compose_rejects_nul() {
        assert!(ModuleName::compose("vkernel", Some("a\0b")).is_err());
    }

    #[test]
    fn module_path_uses_default_name() {
        let desc = ModuleDescriptor {
            name: ModuleName::new("vkernel_x"),
            default_name: ModuleName::default(),
            install_dir: PathBuf::from("/lib/modules/6.1.0/extra/vkernel"),
        };
        assert_eq!(
            desc.module_path(),
            PathBuf::from("/lib/modules/6.1.0/extra/vkernel/vkernel.ko")
        );
        assert!(desc.needs_rename());
    }

    #[test]
    fn module_state_display() {
        assert_eq!(ModuleState::Named.to_string(), "named");
        assert_eq!(ModuleState::Loaded.to_string(), "loaded");
        assert_eq!(ModuleState::Unloaded.to_string(), "unloaded");
    }
}
