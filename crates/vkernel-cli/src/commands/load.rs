//! `vkn load` — Load a module instance and record it.

use anyhow::Context;
use clap::Args;
use vkernel_common::config::VKernelConfig;
use vkernel_core::kmod::{HostKernel, KernelModuleOps};
use vkernel_runtime::registry::{self, ModuleRecord};
use vkernel_runtime::vkernel::VKernel;

use super::caps::CapsArgs;

/// Arguments for the `load` command.
#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Container or session id; the module is named `<name>_<id>`.
    #[arg(long)]
    pub id: Option<String>,

    /// Capability sets passed to the module.
    #[command(flatten)]
    pub caps: CapsArgs,
}

/// Executes the `load` command against the running kernel.
///
/// # Errors
///
/// Returns an error if the module cannot be read, renamed or loaded, or
/// the registry cannot be updated.
pub fn execute(args: &LoadArgs, config: &VKernelConfig) -> anyhow::Result<()> {
    run(args, config, HostKernel)
}

pub(super) fn run<K: KernelModuleOps>(
    args: &LoadArgs,
    config: &VKernelConfig,
    kernel: K,
) -> anyhow::Result<()> {
    let caps = args.caps.group()?;
    let mut vkn = VKernel::with_kernel(kernel, config, args.id.as_deref())?;
    vkn.load(&caps)
        .with_context(|| format!("loading {}", vkn.descriptor().module_path().display()))?;

    let mut reg = registry::load_registry(&config.registry_file)?;
    reg.record(ModuleRecord {
        descriptor: vkn.descriptor().clone(),
        container_id: args.id.clone(),
        loaded_at: chrono::Utc::now(),
    });
    registry::save_registry(&config.registry_file, &reg)
        .context("module loaded but the registry could not be saved")?;

    println!("{}", vkn.name());
    Ok(())
}
