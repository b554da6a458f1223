//! `vkn inspect` — Print the format and section table of a module file.

use std::fmt::Write as _;
use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use vkernel_common::constants::THIS_MODULE_SECTION;
use vkernel_core::elf::ModuleObject;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the module file (`.ko`).
    pub file: PathBuf,
}

/// Executes the `inspect` command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not a supported
/// module object.
pub fn execute(args: &InspectArgs) -> anyhow::Result<()> {
    let mut file = File::open(&args.file)
        .with_context(|| format!("opening {}", args.file.display()))?;
    let object = ModuleObject::parse(&mut file, &args.file)
        .with_context(|| format!("parsing {}", args.file.display()))?;
    print!("{}", render(&object));
    Ok(())
}

/// Renders the format line and the section table, marking the identity
/// section with `*`.
fn render(object: &ModuleObject) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "format: {}", object.format());
    let _ = writeln!(out, "type: {}", object_type_name(object.header().object_type()));
    let _ = writeln!(out, "  {:>4} {:<32} {:>10} {:>10}", "IDX", "NAME", "OFFSET", "SIZE");
    for section in object.sections() {
        let marker = if section.name == THIS_MODULE_SECTION { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {:>4} {:<32} {:>#10x} {:>10}",
            section.index, section.name, section.header.offset, section.header.size
        );
    }
    if object.identity_section().is_none() {
        let _ = writeln!(out, "no {THIS_MODULE_SECTION} section: the module cannot be renamed");
    }
    out
}

fn object_type_name(e_type: u16) -> String {
    match e_type {
        0 => "NONE".into(),
        1 => "REL (relocatable)".into(),
        2 => "EXEC".into(),
        3 => "DYN".into(),
        4 => "CORE".into(),
        other => format!("{other:#06x}"),
    }
}
