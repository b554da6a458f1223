//! `vkn list` — List recorded module instances.

use std::fmt::Write as _;

use vkernel_common::config::VKernelConfig;
use vkernel_runtime::registry::{self, Registry};

/// Executes the `list` command.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub fn execute(config: &VKernelConfig) -> anyhow::Result<()> {
    let reg = registry::load_registry(&config.registry_file)?;
    if reg.modules.is_empty() {
        println!("No modules recorded.");
        return Ok(());
    }
    print!("{}", render(&reg));
    Ok(())
}

fn render(reg: &Registry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<32} {:<16} {:<26} INSTALL DIR", "MODULE", "CONTAINER", "LOADED");
    for record in &reg.modules {
        let _ = writeln!(
            out,
            "{:<32} {:<16} {:<26} {}",
            record.descriptor.name.as_str(),
            record.container_id.as_deref().unwrap_or("-"),
            crate::output::format_timestamp(&record.loaded_at),
            record.descriptor.install_dir.display()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::TimeZone;
    use vkernel_common::types::{ModuleDescriptor, ModuleName};
    use vkernel_runtime::registry::ModuleRecord;

    use super::*;

    #[test]
    fn render_lists_one_row_per_record() {
        let mut reg = Registry::default();
        reg.record(ModuleRecord {
            descriptor: ModuleDescriptor {
                name: ModuleName::new("vkernel_a"),
                default_name: ModuleName::default(),
                install_dir: PathBuf::from("/lib/modules/6.8.0/extra/vkernel"),
            },
            container_id: None,
            loaded_at: chrono::Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        });

        let text = render(&reg);
        let rows: Vec<_> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("MODULE"));
        assert!(rows[1].starts_with("vkernel_a"));
        assert!(rows[1].contains(" - "));
        assert!(rows[1].contains("2026-01-02 03:04:05 UTC"));
        assert!(rows[1].ends_with("/lib/modules/6.8.0/extra/vkernel"));
    }
}
