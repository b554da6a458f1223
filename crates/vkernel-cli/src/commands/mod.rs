//! CLI command definitions and dispatch.

pub mod caps;
pub mod inspect;
pub mod list;
pub mod load;
pub mod mounts;
pub mod rename;
pub mod unload;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use vkernel_common::config::VKernelConfig;
use vkernel_common::types::ModuleName;
use vkernel_core::kmod::KernelModuleOps;
use vkernel_runtime::registry::Registry;
use vkernel_runtime::vkernel::VKernel;

/// vkn — per-container kernel module management.
#[derive(Parser, Debug)]
#[command(name = "vkn", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to a JSON configuration file.
    #[arg(long, global = true, env = "VKN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the loaded-module registry.
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the format and section table of a module file.
    Inspect(inspect::InspectArgs),
    /// Rewrite the embedded module name of a module file.
    Rename(rename::RenameArgs),
    /// Print the capability parameter string for the given sets.
    Caps {
        /// Capability sets to encode.
        #[command(flatten)]
        sets: caps::CapsArgs,
        /// List known capability names and ids instead.
        #[arg(long)]
        list: bool,
    },
    /// Load a module instance and record it.
    Load(load::LoadArgs),
    /// Unload a recorded module instance.
    Unload(unload::UnloadArgs),
    /// Print the mount a container needs for a module instance.
    Mounts(mounts::MountsArgs),
    /// List recorded module instances.
    List,
}

impl Cli {
    /// Resolves the effective configuration from `--config` and
    /// `--registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read or is
    /// invalid.
    pub fn resolve_config(&self) -> anyhow::Result<VKernelConfig> {
        let mut config = match &self.config {
            Some(path) => VKernelConfig::from_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => VKernelConfig::default(),
        };
        if let Some(registry) = &self.registry {
            config.registry_file.clone_from(registry);
        }
        tracing::debug!(?config, "resolved configuration");
        Ok(config)
    }
}

/// The instance for `id`: the recorded descriptor if the registry knows it,
/// otherwise a freshly named one.
///
/// # Errors
///
/// Returns an error if a fresh instance cannot be named.
pub fn instance<K: KernelModuleOps>(
    kernel: K,
    config: &VKernelConfig,
    registry: &Registry,
    id: Option<&str>,
) -> anyhow::Result<VKernel<K>> {
    let name = ModuleName::compose(&config.module_name, id)?;
    if let Ok(record) = registry.find(&name) {
        tracing::debug!(module = %name, "using recorded descriptor");
        return Ok(VKernel::from_descriptor(kernel, record.descriptor.clone()));
    }
    Ok(VKernel::with_kernel(kernel, config, id)?)
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;
    match cli.command {
        Command::Inspect(args) => inspect::execute(&args),
        Command::Rename(args) => rename::execute(&args),
        Command::Caps { sets, list } => caps::execute(&sets, list),
        Command::Load(args) => load::execute(&args, &config),
        Command::Unload(args) => unload::execute(&args, &config),
        Command::Mounts(args) => mounts::execute(&args, &config),
        Command::List => list::execute(&config),
    }
}

#[cfg(test)]
pub mod test_support {
    //! A recording kernel and a populated module tree for command tests.

    use std::cell::RefCell;
    use std::path::Path;

    use vkernel_common::error::Result;
    use vkernel_core::elf::fixture;
    use vkernel_core::elf::ident::{Class, Encoding};

    use super::*;

    pub const RELEASE: &str = "6.8.0-test";

    #[derive(Default)]
    pub struct FakeKernel {
        pub loaded: RefCell<Vec<(String, String)>>,
        pub deleted: RefCell<Vec<String>>,
    }

    impl KernelModuleOps for FakeKernel {
        fn release(&self) -> Result<String> {
            Ok(RELEASE.into())
        }

        fn init_module(&self, name: &ModuleName, _image: &[u8], params: &str) -> Result<()> {
            self.loaded.borrow_mut().push((name.to_string(), params.to_string()));
            Ok(())
        }

        fn delete_module(&self, name: &ModuleName) -> Result<()> {
            self.deleted.borrow_mut().push(name.to_string());
            Ok(())
        }
    }

    /// Configuration rooted in `root` with an installed module image.
    pub fn installed_config(root: &Path) -> VKernelConfig {
        let config = VKernelConfig {
            modules_root: root.join("modules"),
            registry_file: root.join("modules.json"),
            ..VKernelConfig::default()
        };
        let dir = config.install_dir(RELEASE);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("vkernel.ko"),
            fixture::module_image(Class::Elf64, Encoding::Little, "vkernel"),
        )
        .unwrap();
        config
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn caps_list_flag_parses() {
        let cli = Cli::parse_from(["vkn", "caps", "--list"]);
        assert!(matches!(cli.command, Command::Caps { list: true, .. }));
    }

    #[test]
    fn registry_flag_overrides_config() {
        let cli = Cli::parse_from(["vkn", "--registry", "/tmp/r.json", "list"]);
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.registry_file, PathBuf::from("/tmp/r.json"));
        assert_eq!(config.module_name, "vkernel");
    }

    #[test]
    fn config_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vkn.json");
        std::fs::write(&path, r#"{"module_name": "vk"}"#).unwrap();
        let cli = Cli::parse_from(["vkn", "list", "--config", path.to_str().unwrap()]);

        assert_eq!(cli.resolve_config().unwrap().module_name, "vk");
    }

    #[test]
    fn instance_prefers_recorded_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_support::installed_config(dir.path());
        let kernel = test_support::FakeKernel::default();
        let mut descriptor = VKernel::with_kernel(&kernel, &config, Some("a"))
            .unwrap()
            .descriptor()
            .clone();
        descriptor.install_dir = PathBuf::from("/elsewhere");
        let mut registry = Registry::default();
        registry.record(vkernel_runtime::registry::ModuleRecord {
            descriptor,
            container_id: Some("a".into()),
            loaded_at: chrono::Utc::now(),
        });

        let recorded = instance(&kernel, &config, &registry, Some("a")).unwrap();
        let fresh = instance(&kernel, &config, &registry, Some("b")).unwrap();

        assert_eq!(recorded.descriptor().install_dir, PathBuf::from("/elsewhere"));
        assert_eq!(fresh.name().as_str(), "vkernel_b");
        assert_eq!(fresh.descriptor().install_dir, config.install_dir(test_support::RELEASE));
    }

    #[test]
    fn missing_config_file_is_error() {
        let cli = Cli::parse_from(["vkn", "--config", "/nonexistent/vkn.json", "list"]);
        let err = cli.resolve_config().unwrap_err();
        assert!(err.to_string().contains("loading configuration"));
    }
}
