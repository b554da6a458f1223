//! Kernel module entry points.
//!
//! [`KernelModuleOps`] is the seam between the lifecycle manager and the
//! running kernel. [`HostKernel`] issues the real system calls; tests
//! substitute a recording implementation.

#[cfg(target_os = "linux")]
use std::ffi::CString;

use vkernel_common::error::{Result, VKernelError};
use vkernel_common::types::ModuleName;

/// Operations the running kernel provides for module management.
///
/// Calls block until the kernel answers. There is no retry: a failure is
/// returned to the caller as reported.
pub trait KernelModuleOps {
    /// Release string of the running kernel, as in `uname -r`.
    ///
    /// # Errors
    ///
    /// Returns an error if the release cannot be queried.
    fn release(&self) -> Result<String>;

    /// Inserts a module image with the given parameter string.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::Kernel`] carrying the kernel-reported reason.
    fn init_module(&self, name: &ModuleName, image: &[u8], params: &str) -> Result<()>;

    /// Removes a module by name, without flags.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::Kernel`] carrying the kernel-reported reason.
    fn delete_module(&self, name: &ModuleName) -> Result<()>;
}

impl<K: KernelModuleOps + ?Sized> KernelModuleOps for &K {
    fn release(&self) -> Result<String> {
        (**self).release()
    }

    fn init_module(&self, name: &ModuleName, image: &[u8], params: &str) -> Result<()> {
        (**self).init_module(name, image, params)
    }

    fn delete_module(&self, name: &ModuleName) -> Result<()> {
        (**self).delete_module(name)
    }
}

/// The kernel this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostKernel;

#[cfg(target_os = "linux")]
fn c_string(what: &str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| VKernelError::Config {
        message: format!("{what} contains a NUL byte: {value:?}"),
    })
}

#[cfg(target_os = "linux")]
impl KernelModuleOps for HostKernel {
    fn release(&self) -> Result<String> {
        let uts = nix::sys::utsname::uname().map_err(|e| VKernelError::Io {
            path: "uname".into(),
            source: e.into(),
        })?;
        uts.release()
            .to_str()
            .map(str::to_owned)
            .ok_or_else(|| VKernelError::Config {
                message: format!("kernel release is not UTF-8: {:?}", uts.release()),
            })
    }

    fn init_module(&self, name: &ModuleName, image: &[u8], params: &str) -> Result<()> {
        let params = c_string("module parameters", params)?;
        tracing::debug!(module = %name, size = image.len(), "init_module");
        nix::kmod::init_module(image, &params).map_err(|errno| VKernelError::Kernel {
            operation: "init_module",
            module: name.to_string(),
            source: errno.into(),
        })
    }

    fn delete_module(&self, name: &ModuleName) -> Result<()> {
        let cname = c_string("module name", name.as_str())?;
        tracing::debug!(module = %name, "delete_module");
        nix::kmod::delete_module(&cname, nix::kmod::DeleteModuleFlags::empty()).map_err(|errno| {
            VKernelError::Kernel {
                operation: "delete_module",
                module: name.to_string(),
                source: errno.into(),
            }
        })
    }
}

#[cfg(not(target_os = "linux"))]
impl KernelModuleOps for HostKernel {
    fn release(&self) -> Result<String> {
        Err(VKernelError::Config {
            message: "Linux required for kernel module operations".into(),
        })
    }

    fn init_module(&self, _name: &ModuleName, _image: &[u8], _params: &str) -> Result<()> {
        Err(VKernelError::Config {
            message: "Linux required for kernel module operations".into(),
        })
    }

    fn delete_module(&self, _name: &ModuleName) -> Result<()> {
        Err(VKernelError::Config {
            message: "Linux required for kernel module operations".into(),
        })
    }
}
