//! In-place renaming of the module identity section.
//!
//! Only bytes inside `.gnu.linkonce.this_module` are ever written, the buffer
//! is never resized, and only the first occurrence is replaced. Not finding
//! the section or the identifier leaves the image untouched and is reported
//! through [`PatchOutcome`], not as an error.

use vkernel_common::constants::THIS_MODULE_SECTION;
use vkernel_common::error::{Result, VKernelError};

use super::ident::Class;
use super::section::SectionTable;

/// What a patch call did to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The identifier was overwritten at this file offset.
    Patched {
        /// Offset of the first replaced byte.
        offset: usize,
    },
    /// The object has no identity section; image unchanged.
    SectionMissing,
    /// The identifier does not occur inside the identity section; image
    /// unchanged.
    NameMissing,
}

impl PatchOutcome {
    /// Whether any byte was written.
    #[must_use]
    pub const fn is_patched(&self) -> bool {
        matches!(self, Self::Patched { .. })
    }
}

/// Replaces the first occurrence of `old` inside the identity section of
/// `image` with `new`.
///
/// `new` may be shorter than `old`; only `new.len()` bytes are written.
///
/// # Errors
///
/// - [`VKernelError::Config`] if `old` is empty.
/// - [`VKernelError::PatchOverflow`] if `new` is longer than `old`. Checked
///   before anything else, so the image is never touched.
/// - [`VKernelError::Malformed`] if the identity section extends past the
///   end of `image`.
pub fn patch_identity(
    sections: &SectionTable,
    image: &mut [u8],
    old: &[u8],
    new: &[u8],
) -> Result<PatchOutcome> {
    if old.is_empty() {
        return Err(VKernelError::Config {
            message: "identifier to replace is empty".into(),
        });
    }
    if new.len() > old.len() {
        return Err(VKernelError::PatchOverflow {
            old_len: old.len(),
            new_len: new.len(),
        });
    }

    let Some(section) = sections.find(THIS_MODULE_SECTION) else {
        tracing::warn!(section = THIS_MODULE_SECTION, "identity section not found, image left unchanged");
        return Ok(PatchOutcome::SectionMissing);
    };

    let range = section.header.file_range()?;
    let (start, end) = match (usize::try_from(range.start), usize::try_from(range.end)) {
        (Ok(start), Ok(end)) if end <= image.len() => (start, end),
        _ => {
            return Err(VKernelError::malformed(format!(
                "section {} ({:#x}..{:#x}) exceeds image of {} bytes",
                section.name,
                range.start,
                range.end,
                image.len()
            )));
        }
    };

    let Some(pos) = image[start..end]
        .windows(old.len())
        .position(|window| window == old)
    else {
        tracing::warn!(
            section = %section.name,
            identifier = %String::from_utf8_lossy(old),
            "identifier not found in identity section, image left unchanged"
        );
        return Ok(PatchOutcome::NameMissing);
    };

    let offset = start + pos;
    image[offset..offset + new.len()].copy_from_slice(new);
    tracing::debug!(offset, len = new.len(), "patched identity section");
    Ok(PatchOutcome::Patched { offset })
}

/// Returns `name` NUL-padded to the size of the kernel's
/// `struct module::name` array for `class`.
///
/// Patching the whole field lets a logical name grow past the compiled-in
/// one without ever writing outside the field.
///
/// # Errors
///
/// Returns [`VKernelError::PatchOverflow`] if `name` plus its terminating NUL
/// does not fit in the field.
pub fn module_name_field(name: &[u8], class: Class) -> Result<Vec<u8>> {
    let field_len = class.module_name_len();
    if name.len() >= field_len {
        return Err(VKernelError::PatchOverflow {
            old_len: field_len - 1,
            new_len: name.len(),
        });
    }
    let mut field = vec![0u8; field_len];
    field[..name.len()].copy_from_slice(name);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use byteorder::{BigEndian, ByteOrder, LittleEndian};

    use super::*;
    use crate::elf::ModuleObject;
    use crate::elf::fixture;
    use crate::elf::ident::Encoding;

    const LAYOUTS: [(Class, Encoding); 4] = [
        (Class::Elf32, Encoding::Little),
        (Class::Elf32, Encoding::Big),
        (Class::Elf64, Encoding::Little),
        (Class::Elf64, Encoding::Big),
    ];

    fn identity_range(object: &ModuleObject) -> std::ops::Range<usize> {
        let range = object
            .identity_section()
            .expect("identity section")
            .header
            .file_range()
            .unwrap();
        usize::try_from(range.start).unwrap()..usize::try_from(range.end).unwrap()
    }

    #[test]
    fn identity_section_past_end_of_image_is_malformed() {
        for (class, encoding) in LAYOUTS {
            let mut image = fixture::module_image(class, encoding, "vkernel");
            let object = ModuleObject::from_bytes(&image).unwrap();
            let header = object.header();
            let entry = usize::try_from(header.section_table_offset()).unwrap()
                + 3 * usize::from(header.section_entry_size());
            // sh_size
            let (field, width) = match class {
                Class::Elf32 => (entry + 20, 4),
                Class::Elf64 => (entry + 32, 8),
            };
            let too_big = image.len() as u64;
            let size = &mut image[field..field + width];
            match encoding {
                Encoding::Little => LittleEndian::write_uint(size, too_big, width),
                Encoding::Big => BigEndian::write_uint(size, too_big, width),
            }
            let object = ModuleObject::from_bytes(&image).unwrap();
            let before = image.clone();

            let err = object.rename_module(&mut image, "vkernel", "vkernel_1").unwrap_err();
            assert!(matches!(err, VKernelError::Malformed { .. }), "{class} {encoding}: {err}");
            assert_eq!(image, before);
        }
    }

    #[test]
    fn image_shorter_than_parsed_object_is_malformed() {
        let original = fixture::module_image(Class::Elf64, Encoding::Little, "vkernel");
        let object = ModuleObject::from_bytes(&original).unwrap();
        let end = identity_range(&object).end;
        let mut short = original[..end - 1].to_vec();

        assert!(matches!(
            object.patch(&mut short, b"vkernel", b"vkern01"),
            Err(VKernelError::Malformed { .. })
        ));
        assert_eq!(short, original[..end - 1]);
    }

    #[test]
    fn equal_length_patch_changes_only_the_match() {
        for (class, encoding) in LAYOUTS {
            let original = fixture::module_image(class, encoding, "vkernel");
            let object = ModuleObject::from_bytes(&original).unwrap();
            let mut image = original.clone();

            let outcome = object.patch(&mut image, b"vkernel", b"vkern01").unwrap();
            let PatchOutcome::Patched { offset } = outcome else {
                panic!("expected a patch for {class} {encoding}, got {outcome:?}");
            };
            assert!(identity_range(&object).contains(&offset));
            assert_eq!(&image[offset..offset + 7], b"vkern01");

            let changed: Vec<usize> = (0..image.len()).filter(|&i| image[i] != original[i]).collect();
            assert!(changed.iter().all(|&i| (offset..offset + 7).contains(&i)));
            assert!(!changed.is_empty());
        }
    }

    #[test]
    fn bytes_outside_the_section_are_untouched() {
        let original = fixture::module_image(Class::Elf64, Encoding::Little, "vkernel");
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original.clone();
        let range = identity_range(&object);

        let _ = object.patch(&mut image, b"vkernel", b"abcdefg").unwrap();

        assert_eq!(image[..range.start], original[..range.start]);
        assert_eq!(image[range.end..], original[range.end..]);
        // .modinfo still carries the original name.
        let modinfo = object.sections().find(".modinfo").unwrap().header;
        let modinfo = usize::try_from(modinfo.offset).unwrap();
        assert_eq!(&image[modinfo..modinfo + 12], b"name=vkernel");
    }

    #[test]
    fn patch_round_trips() {
        for (class, encoding) in LAYOUTS {
            let original = fixture::module_image(class, encoding, "vkernel");
            let object = ModuleObject::from_bytes(&original).unwrap();
            let mut image = original.clone();

            assert!(object.patch(&mut image, b"vkernel", b"vkn_abc").unwrap().is_patched());
            assert_ne!(image, original);
            assert!(object.patch(&mut image, b"vkn_abc", b"vkernel").unwrap().is_patched());
            assert_eq!(image, original);
        }
    }

    #[test]
    fn miss_leaves_image_unchanged() {
        let original = fixture::module_image(Class::Elf64, Encoding::Big, "vkernel");
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original.clone();

        let outcome = object.patch(&mut image, b"absent", b"abc").unwrap();
        assert_eq!(outcome, PatchOutcome::NameMissing);
        assert_eq!(image, original);
    }

    #[test]
    fn match_outside_the_section_is_ignored() {
        // "name=" only occurs in .modinfo.
        let original = fixture::module_image(Class::Elf32, Encoding::Little, "vkernel");
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original.clone();

        let outcome = object.patch(&mut image, b"name=", b"NAME=").unwrap();
        assert_eq!(outcome, PatchOutcome::NameMissing);
        assert_eq!(image, original);
    }

    #[test]
    fn missing_section_leaves_image_unchanged() {
        let original = fixture::build(
            Class::Elf64,
            Encoding::Little,
            &[(".text", vec![0x90; 16]), (".modinfo", b"name=vkernel\0".to_vec())],
        );
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original.clone();

        let outcome = object.patch(&mut image, b"vkernel", b"vkern01").unwrap();
        assert_eq!(outcome, PatchOutcome::SectionMissing);
        assert_eq!(image, original);
    }

    #[test]
    fn longer_replacement_is_rejected_untouched() {
        let original = fixture::module_image(Class::Elf64, Encoding::Little, "vkernel");
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original.clone();

        let err = object.patch(&mut image, b"vkernel", b"vkernel_1234").unwrap_err();
        assert!(matches!(
            err,
            VKernelError::PatchOverflow { old_len: 7, new_len: 12 }
        ));
        assert_eq!(image, original);
    }

    #[test]
    fn shorter_replacement_writes_only_its_own_bytes() {
        let original = fixture::module_image(Class::Elf64, Encoding::Little, "vkernel");
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original.clone();

        let PatchOutcome::Patched { offset } = object.patch(&mut image, b"vkernel", b"xy").unwrap()
        else {
            panic!("expected a patch");
        };
        assert_eq!(&image[offset..offset + 7], b"xyernel");
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let original = fixture::module_image(Class::Elf64, Encoding::Little, "vkernel");
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original;
        assert!(matches!(
            object.patch(&mut image, b"", b""),
            Err(VKernelError::Config { .. })
        ));
    }

    #[test]
    fn only_the_first_occurrence_is_replaced() {
        let mut data = fixture::this_module_data(Class::Elf64, "vkernel");
        data.extend_from_slice(b"vkernel\0");
        let original = fixture::build(
            Class::Elf64,
            Encoding::Little,
            &[(".gnu.linkonce.this_module", data)],
        );
        let object = ModuleObject::from_bytes(&original).unwrap();
        let mut image = original;

        let PatchOutcome::Patched { offset } =
            object.patch(&mut image, b"vkernel", b"abcdefg").unwrap()
        else {
            panic!("expected a patch");
        };
        let range = identity_range(&object);
        let section = &image[range];
        assert_eq!(section.windows(7).filter(|w| *w == b"abcdefg").count(), 1);
        assert_eq!(section.windows(7).filter(|w| *w == b"vkernel").count(), 1);
        assert!(offset < image.len());
    }

    #[test]
    fn same_outcome_across_widths() {
        let outcomes: Vec<Vec<u8>> = LAYOUTS
            .iter()
            .map(|&(class, encoding)| {
                let original = fixture::module_image(class, encoding, "vkernel");
                let object = ModuleObject::from_bytes(&original).unwrap();
                let mut image = original;
                let PatchOutcome::Patched { offset } =
                    object.patch(&mut image, b"vkernel", b"vkn_xyz").unwrap()
                else {
                    panic!("expected a patch");
                };
                let field = offset - identity_range(&object).start;
                assert_eq!(field, fixture::name_offset(class));
                image[offset..offset + 7].to_vec()
            })
            .collect();
        assert!(outcomes.iter().all(|o| o == b"vkn_xyz"));
    }

    #[test]
    fn module_name_field_pads_to_kernel_size() {
        let field = module_name_field(b"vkernel", Class::Elf64).unwrap();
        assert_eq!(field.len(), 56);
        assert_eq!(&field[..7], b"vkernel");
        assert!(field[7..].iter().all(|&b| b == 0));

        assert_eq!(module_name_field(b"vkernel", Class::Elf32).unwrap().len(), 60);
    }

    #[test]
    fn module_name_field_needs_room_for_nul() {
        let name = vec![b'a'; 56];
        assert!(matches!(
            module_name_field(&name, Class::Elf64),
            Err(VKernelError::PatchOverflow { old_len: 55, new_len: 56 })
        ));
        assert!(module_name_field(&name[..55], Class::Elf64).is_ok());
    }

    #[test]
    fn whole_field_rename_to_longer_name() {
        for (class, encoding) in LAYOUTS {
            let original = fixture::module_image(class, encoding, "vkernel");
            let object = ModuleObject::from_bytes(&original).unwrap();
            let mut image = original.clone();

            let old = module_name_field(b"vkernel", class).unwrap();
            let new = module_name_field(b"vkernel_0123456789", class).unwrap();
            assert!(object.patch(&mut image, &old, &new).unwrap().is_patched());

            assert_eq!(image, fixture::module_image(class, encoding, "vkernel_0123456789"));
        }
    }
}
