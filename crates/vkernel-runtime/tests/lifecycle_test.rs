//! End-to-end lifecycle tests against a recording kernel.
//!
//! These tests drive the full path a container runtime takes:
//! 1. Name an instance for a container
//! 2. Contribute its mount
//! 3. Load it with capability parameters and record it
//! 4. Unload it from a fresh process using only the registry

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::cell::RefCell;
use std::path::Path;

use vkernel_common::config::VKernelConfig;
use vkernel_common::error::Result;
use vkernel_common::types::{ModuleName, ModuleState};
use vkernel_core::capability::{Capability, CapabilityGroup, CapabilitySet};
use vkernel_core::elf::ident::{Class, Encoding};
use vkernel_core::elf::{ModuleObject, fixture};
use vkernel_core::kmod::KernelModuleOps;
use vkernel_runtime::registry::{self, ModuleRecord};
use vkernel_runtime::vkernel::VKernel;

#[derive(Default)]
struct RecordingKernel {
    loaded: RefCell<Vec<(String, Vec<u8>, String)>>,
    deleted: RefCell<Vec<String>>,
}

impl KernelModuleOps for RecordingKernel {
    fn release(&self) -> Result<String> {
        Ok("6.8.0-vk".into())
    }

    fn init_module(&self, name: &ModuleName, image: &[u8], params: &str) -> Result<()> {
        self.loaded
            .borrow_mut()
            .push((name.to_string(), image.to_vec(), params.to_string()));
        Ok(())
    }

    fn delete_module(&self, name: &ModuleName) -> Result<()> {
        self.deleted.borrow_mut().push(name.to_string());
        Ok(())
    }
}

fn config_in(root: &Path) -> VKernelConfig {
    VKernelConfig {
        modules_root: root.join("modules"),
        registry_file: root.join("state").join("modules.json"),
        ..VKernelConfig::default()
    }
}

fn install(config: &VKernelConfig, image: &[u8]) {
    let dir = config.install_dir("6.8.0-vk");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("vkernel.ko"), image).unwrap();
}

// ── Load ─────────────────────────────────────────────────────────────

#[test]
fn load_renames_identity_and_passes_caps() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    let original = fixture::module_image(Class::Elf64, Encoding::Little, "vkernel");
    install(&config, &original);
    let kernel = RecordingKernel::default();

    let mut vkn = VKernel::with_kernel(&kernel, &config, Some("3f2a")).unwrap();
    let mut effective = CapabilitySet::new();
    effective.insert(Capability::CHOWN);
    effective.insert(Capability::MAC_OVERRIDE);
    let caps = CapabilityGroup {
        effective,
        ..CapabilityGroup::default()
    };
    vkn.load(&caps).unwrap();

    let loaded = kernel.loaded.borrow();
    let (name, image, params) = &loaded[0];
    assert_eq!(name, "vkernel_3f2a");
    assert_eq!(params, "caps_data=1,1,0,0,0,0 caps_bounding=0,0 caps_ambient=0,0");
    assert_eq!(image.len(), original.len());

    let object = ModuleObject::from_bytes(image).unwrap();
    let section = object.identity_section().unwrap();
    let range = section.header.file_range().unwrap();
    let data = &image[usize::try_from(range.start).unwrap()..usize::try_from(range.end).unwrap()];
    assert!(data.windows(12).any(|w| w == b"vkernel_3f2a"));
    assert_eq!(
        std::fs::read(vkn.descriptor().module_path()).unwrap(),
        original,
        "file on disk is never modified"
    );
}

#[test]
fn every_layout_loads_with_discriminator() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    for class in [Class::Elf32, Class::Elf64] {
        for encoding in [Encoding::Little, Encoding::Big] {
            install(&config, &fixture::module_image(class, encoding, "vkernel"));
            let kernel = RecordingKernel::default();
            let mut vkn = VKernel::with_kernel(&kernel, &config, Some("c9")).unwrap();

            vkn.load(&CapabilityGroup::default_container()).unwrap();

            assert_eq!(
                kernel.loaded.borrow()[0].1,
                fixture::module_image(class, encoding, "vkernel_c9"),
                "{class:?}/{encoding:?}"
            );
        }
    }
}

// ── Mounts ───────────────────────────────────────────────────────────

#[test]
fn mount_points_at_install_dir() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    let kernel = RecordingKernel::default();
    let vkn = VKernel::with_kernel(&kernel, &config, Some("c1")).unwrap();

    let mut mounts = Vec::new();
    vkn.configure_mounts(&mut mounts);

    assert_eq!(mounts.len(), 1);
    assert_eq!(mounts[0].source, config.install_dir("6.8.0-vk"));
    assert_eq!(mounts[0].premount_cmds[0].path, "touch");
}

// ── Registry round trip ──────────────────────────────────────────────

#[test]
fn unload_from_registry_after_restart() {
    let root = tempfile::tempdir().unwrap();
    let config = config_in(root.path());
    install(
        &config,
        &fixture::module_image(Class::Elf64, Encoding::Little, "vkernel"),
    );
    let kernel = RecordingKernel::default();

    {
        let mut vkn = VKernel::with_kernel(&kernel, &config, Some("web")).unwrap();
        vkn.load(&CapabilityGroup::default()).unwrap();
        let mut reg = registry::load_registry(&config.registry_file).unwrap();
        reg.record(ModuleRecord {
            descriptor: vkn.descriptor().clone(),
            container_id: Some("web".into()),
            loaded_at: chrono::Utc::now(),
        });
        registry::save_registry(&config.registry_file, &reg).unwrap();
    }

    let mut reg = registry::load_registry(&config.registry_file).unwrap();
    let name = ModuleName::new("vkernel_web");
    let record = reg.forget(&name).unwrap();
    let mut vkn = VKernel::from_descriptor(&kernel, record.descriptor);
    vkn.unload().unwrap();
    registry::save_registry(&config.registry_file, &reg).unwrap();

    assert_eq!(vkn.state(), ModuleState::Unloaded);
    assert_eq!(*kernel.deleted.borrow(), vec!["vkernel_web".to_string()]);
    assert!(
        registry::load_registry(&config.registry_file)
            .unwrap()
            .modules
            .is_empty()
    );
}
