//! `vkn unload` — Unload a module instance and forget it.

use clap::Args;
use vkernel_common::config::VKernelConfig;
use vkernel_core::kmod::{HostKernel, KernelModuleOps};
use vkernel_runtime::registry;

/// Arguments for the `unload` command.
#[derive(Args, Debug)]
pub struct UnloadArgs {
    /// Container or session id the module was loaded with.
    #[arg(long)]
    pub id: Option<String>,
}

/// Executes the `unload` command against the running kernel.
///
/// Modules missing from the registry are still unloaded by name.
///
/// # Errors
///
/// Returns an error if the kernel refuses the unload or the registry cannot
/// be updated.
pub fn execute(args: &UnloadArgs, config: &VKernelConfig) -> anyhow::Result<()> {
    run(args, config, HostKernel)
}

fn run<K: KernelModuleOps>(
    args: &UnloadArgs,
    config: &VKernelConfig,
    kernel: K,
) -> anyhow::Result<()> {
    let mut reg = registry::load_registry(&config.registry_file)?;
    let mut vkn = super::instance(kernel, config, &reg, args.id.as_deref())?;
    vkn.unload()?;

    if reg.forget(vkn.name()).is_some() {
        registry::save_registry(&config.registry_file, &reg)?;
    } else {
        tracing::warn!(module = %vkn.name(), "module was not recorded");
    }
    println!("{}", vkn.name());
    Ok(())
}
