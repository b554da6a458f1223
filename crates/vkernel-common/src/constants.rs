//! System-wide constants and default paths.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Built-in name of the kernel module, as compiled into its identity section.
pub const DEFAULT_MODULE_NAME: &str = "vkernel";

/// Separator between the base module name and a per-container discriminator.
pub const NAME_DISCRIMINATOR_SEPARATOR: char = '_';

/// File extension of loadable kernel modules.
pub const MODULE_EXTENSION: &str = "ko";

/// Root of the per-release module trees.
pub const DEFAULT_MODULES_ROOT: &str = "/lib/modules";

/// Install directory of the module, relative to `<modules root>/<release>`.
pub const DEFAULT_INSTALL_SUBDIR: &str = "extra/vkernel";

/// Name of the section carrying the kernel-visible module identity.
pub const THIS_MODULE_SECTION: &str = ".gnu.linkonce.this_module";

/// Highest capability bit the wire format can carry.
pub const MAX_CAPABILITY_ID: u8 = 63;

/// Default base directory for vkernel data on Linux with root access.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/vkernel";

/// File name of the loaded-module registry inside the data directory.
pub const REGISTRY_FILE_NAME: &str = "modules.json";

/// Returns the data directory, preferring `$HOME/.vkernel` when it can be
/// created, falling back to `/var/lib/vkernel`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        let user_dir = PathBuf::from(home).join(".vkernel");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default registry file path.
pub fn default_registry_file() -> PathBuf {
    data_dir().join(REGISTRY_FILE_NAME)
}
