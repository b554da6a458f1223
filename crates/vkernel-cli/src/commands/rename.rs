//! `vkn rename` — Rewrite the embedded module name of a module file.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use vkernel_common::constants::{DEFAULT_MODULE_NAME, MODULE_EXTENSION};
use vkernel_core::elf::ModuleObject;
use vkernel_core::elf::patch::PatchOutcome;

/// Arguments for the `rename` command.
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Path to the module file (`.ko`).
    pub file: PathBuf,

    /// Name currently embedded in the module.
    #[arg(long, default_value = DEFAULT_MODULE_NAME)]
    pub from: String,

    /// New module name.
    #[arg(long)]
    pub to: String,

    /// Output path. Defaults to `<to>.ko` next to the input.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Replace the raw bytes of `--from` instead of the whole name field;
    /// `--to` may then be no longer than `--from`.
    #[arg(long)]
    pub raw: bool,
}

impl RenameArgs {
    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.file.with_file_name(format!("{}.{MODULE_EXTENSION}", self.to)))
    }
}

/// Executes the `rename` command.
///
/// The input file is never modified. A name that is not found is reported
/// and the image is written unchanged.
///
/// # Errors
///
/// Returns an error if the file cannot be read or written, is not a
/// supported module object, or the new name does not fit.
pub fn execute(args: &RenameArgs) -> anyhow::Result<()> {
    let image = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let (image, outcome) = rename_image(image, &args.from, &args.to, args.raw)
        .with_context(|| format!("renaming {}", args.file.display()))?;

    let output = args.output_path();
    std::fs::write(&output, &image)
        .with_context(|| format!("writing {}", output.display()))?;

    match outcome {
        PatchOutcome::Patched { offset } => {
            println!("{} -> {} at {offset:#x}: {}", args.from, args.to, output.display());
        }
        PatchOutcome::SectionMissing | PatchOutcome::NameMissing => {
            tracing::warn!(?outcome, from = %args.from, "module name not replaced");
            println!("{} not found, copied unchanged: {}", args.from, output.display());
        }
    }
    Ok(())
}

fn rename_image(
    mut image: Vec<u8>,
    from: &str,
    to: &str,
    raw: bool,
) -> vkernel_common::error::Result<(Vec<u8>, PatchOutcome)> {
    let object = ModuleObject::from_bytes(&image)?;
    let outcome = if raw {
        object.patch(&mut image, from.as_bytes(), to.as_bytes())?
    } else {
        object.rename_module(&mut image, from, to)?
    };
    Ok((image, outcome))
}
