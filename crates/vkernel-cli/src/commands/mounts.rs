//! `vkn mounts` — Print the mount a container needs for a module instance.

use clap::Args;
use vkernel_common::config::VKernelConfig;
use vkernel_core::kmod::{HostKernel, KernelModuleOps};
use vkernel_runtime::registry;

/// Arguments for the `mounts` command.
#[derive(Args, Debug)]
pub struct MountsArgs {
    /// Container or session id of the module instance.
    #[arg(long)]
    pub id: Option<String>,
}

/// Executes the `mounts` command, printing the mount list as JSON.
///
/// # Errors
///
/// Returns an error if the instance cannot be named.
pub fn execute(args: &MountsArgs, config: &VKernelConfig) -> anyhow::Result<()> {
    println!("{}", render(args, config, HostKernel)?);
    Ok(())
}

fn render<K: KernelModuleOps>(
    args: &MountsArgs,
    config: &VKernelConfig,
    kernel: K,
) -> anyhow::Result<String> {
    let reg = registry::load_registry(&config.registry_file)?;
    let vkn = super::instance(kernel, config, &reg, args.id.as_deref())?;
    let mut mounts = Vec::new();
    vkn.configure_mounts(&mut mounts);
    Ok(serde_json::to_string_pretty(&mounts)?)
}
