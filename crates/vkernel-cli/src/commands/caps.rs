//! `vkn caps` — Encode capability sets into module parameters.

use std::fmt::Write as _;

use clap::Args;
use vkernel_core::capability::{self, Capability, CapabilityGroup, CapabilitySet};

/// Capability sets, each a comma-separated list of names or ids.
#[derive(Args, Debug, Default)]
pub struct CapsArgs {
    /// Start from the default container capability group.
    #[arg(long)]
    pub default: bool,

    /// Effective set, e.g. `chown,net_bind_service` or `0,10`.
    #[arg(long)]
    pub effective: Option<String>,

    /// Permitted set.
    #[arg(long)]
    pub permitted: Option<String>,

    /// Inheritable set.
    #[arg(long)]
    pub inheritable: Option<String>,

    /// Bounding set.
    #[arg(long)]
    pub bounding: Option<String>,

    /// Ambient set.
    #[arg(long)]
    pub ambient: Option<String>,
}

impl CapsArgs {
    /// Builds the capability group. Sets given explicitly replace the
    /// corresponding set of the starting group.
    ///
    /// # Errors
    ///
    /// Returns an error naming the flag if a list contains an unknown
    /// capability.
    pub fn group(&self) -> anyhow::Result<CapabilityGroup> {
        let mut group = if self.default {
            CapabilityGroup::default_container()
        } else {
            CapabilityGroup::default()
        };
        let sets = [
            ("effective", &self.effective, &mut group.effective),
            ("permitted", &self.permitted, &mut group.permitted),
            ("inheritable", &self.inheritable, &mut group.inheritable),
            ("bounding", &self.bounding, &mut group.bounding),
            ("ambient", &self.ambient, &mut group.ambient),
        ];
        for (flag, list, set) in sets {
            if let Some(list) = list {
                *set = parse_set(flag, list)?;
            }
        }
        Ok(group)
    }
}

fn parse_set(flag: &str, list: &str) -> anyhow::Result<CapabilitySet> {
    let caps = capability::parse_list(list).map_err(|e| anyhow::anyhow!("--{flag}: {e}"))?;
    Ok(caps.into_iter().collect())
}

/// Executes the `caps` command.
///
/// # Errors
///
/// Returns an error if a capability list is invalid.
pub fn execute(args: &CapsArgs, list: bool) -> anyhow::Result<()> {
    if list {
        print!("{}", known_capabilities());
        return Ok(());
    }
    println!("{}", args.group()?);
    Ok(())
}

/// One `<id> <name>` line per capability with a kernel name.
fn known_capabilities() -> String {
    let mut out = String::new();
    for cap in Capability::all() {
        let _ = writeln!(out, "{:>2} {cap}", cap.id());
    }
    out
}
