//! Lifecycle of one per-container module instance.
//!
//! ```text
//! with_kernel()          load()            unload()
//!  ──────────────> Named ───────> Loaded ─────────> Unloaded
//! ```
//!
//! A failed load leaves the instance `Named`. Load and unload take
//! `&mut self`; sharing one instance across threads needs external
//! serialisation.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use vkernel_common::config::VKernelConfig;
use vkernel_common::error::{Result, VKernelError};
use vkernel_common::types::{ModuleDescriptor, ModuleName, ModuleState};
use vkernel_core::capability::CapabilityGroup;
use vkernel_core::elf::ModuleObject;
use vkernel_core::kmod::{HostKernel, KernelModuleOps};

use crate::mount::{self, MountDescriptor};

/// A kernel module instance bound to one container or session.
#[derive(Debug)]
pub struct VKernel<K = HostKernel> {
    descriptor: ModuleDescriptor,
    state: ModuleState,
    kernel: K,
}

impl VKernel<HostKernel> {
    /// Names a module instance on the host kernel with default placement.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel release cannot be queried.
    pub fn new(discriminator: Option<&str>) -> Result<Self> {
        Self::with_kernel(HostKernel, &VKernelConfig::default(), discriminator)
    }
}

impl<K: KernelModuleOps> VKernel<K> {
    /// Names a module instance.
    ///
    /// The logical name is the configured module name, suffixed with
    /// `_<discriminator>` when one is given. The install directory is
    /// `<modules_root>/<release>/<install_subdir>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the discriminator
    /// contains NUL, or the kernel release cannot be queried.
    pub fn with_kernel(
        kernel: K,
        config: &VKernelConfig,
        discriminator: Option<&str>,
    ) -> Result<Self> {
        config.validate()?;
        let release = kernel.release()?;
        let descriptor = ModuleDescriptor {
            name: ModuleName::compose(&config.module_name, discriminator)?,
            default_name: ModuleName::new(config.module_name.clone()),
            install_dir: config.install_dir(&release),
        };
        tracing::info!(
            module = %descriptor.name,
            release = %release,
            install_dir = %descriptor.install_dir.display(),
            "module named"
        );
        Ok(Self::from_descriptor(kernel, descriptor))
    }

    /// Rebuilds an instance from a stored descriptor, e.g. to unload a
    /// module loaded by another process.
    #[must_use]
    pub const fn from_descriptor(kernel: K, descriptor: ModuleDescriptor) -> Self {
        Self {
            descriptor,
            state: ModuleState::Named,
            kernel,
        }
    }

    /// The immutable descriptor of this instance.
    #[must_use]
    pub const fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    /// Logical module name.
    #[must_use]
    pub const fn name(&self) -> &ModuleName {
        &self.descriptor.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ModuleState {
        self.state
    }

    /// Reads the module file and, if the logical name differs from the
    /// built-in one, renames the copy in memory.
    ///
    /// The file handle is released before patching. A rename that finds no
    /// name to replace leaves the image as read.
    ///
    /// # Errors
    ///
    /// Returns an I/O error, a format error from the ELF reader, or
    /// [`VKernelError::PatchOverflow`] if the logical name does not fit.
    pub fn prepare_image(&self) -> Result<Vec<u8>> {
        let path = self.descriptor.module_path();
        let io = |e| VKernelError::Io {
            path: path.clone(),
            source: e,
        };

        let (object, mut image) = {
            let mut file = File::open(&path).map_err(io)?;
            let object = ModuleObject::parse(&mut file, &path)?;
            let _ = file.seek(SeekFrom::Start(0)).map_err(io)?;
            let mut image = Vec::new();
            let _ = file.read_to_end(&mut image).map_err(io)?;
            (object, image)
        };

        if self.descriptor.needs_rename() {
            let outcome = object.rename_module(
                &mut image,
                self.descriptor.default_name.as_str(),
                self.descriptor.name.as_str(),
            )?;
            if outcome.is_patched() {
                tracing::info!(
                    module = %self.descriptor.name,
                    from = %self.descriptor.default_name,
                    outcome = ?outcome,
                    "renamed module image"
                );
            } else {
                tracing::warn!(
                    module = %self.descriptor.name,
                    from = %self.descriptor.default_name,
                    outcome = ?outcome,
                    "module name not found, loading image as is"
                );
            }
        }
        Ok(image)
    }

    /// Loads the module with the given capability sets.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::InvalidState`] unless the instance is
    /// `Named`, otherwise any error from [`VKernel::prepare_image`] or the
    /// kernel, unchanged. The state stays `Named` on failure.
    pub fn load(&mut self, caps: &CapabilityGroup) -> Result<()> {
        if self.state != ModuleState::Named {
            return Err(self.invalid_state("load"));
        }

        let image = self.prepare_image()?;
        let params = caps.to_params();
        tracing::info!(module = %self.descriptor.name, size = image.len(), params = %params, "loading module");
        self.kernel.init_module(&self.descriptor.name, &image, &params)?;

        self.state = ModuleState::Loaded;
        tracing::info!(module = %self.descriptor.name, "module loaded");
        Ok(())
    }

    /// Unloads the module.
    ///
    /// Not gated on `Loaded`: an instance rebuilt with
    /// [`VKernel::from_descriptor`] never saw the load, and the kernel
    /// reports a missing module itself.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::InvalidState`] if already unloaded, otherwise
    /// the kernel error unchanged.
    pub fn unload(&mut self) -> Result<()> {
        if self.state == ModuleState::Unloaded {
            return Err(self.invalid_state("unload"));
        }
        self.kernel.delete_module(&self.descriptor.name)?;
        self.state = ModuleState::Unloaded;
        tracing::info!(module = %self.descriptor.name, "module unloaded");
        Ok(())
    }

    /// Bind mount making the install directory visible in the container.
    #[must_use]
    pub fn mount_descriptor(&self) -> MountDescriptor {
        mount::module_mount(&self.descriptor.install_dir)
    }

    /// Appends [`VKernel::mount_descriptor`] to the container's mount list.
    pub fn configure_mounts(&self, mounts: &mut Vec<MountDescriptor>) {
        mounts.push(self.mount_descriptor());
    }

    fn invalid_state(&self, operation: &'static str) -> VKernelError {
        VKernelError::InvalidState {
            name: self.descriptor.name.to_string(),
            state: self.state.to_string(),
            operation,
        }
    }
}
