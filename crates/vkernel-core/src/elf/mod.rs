//! Reading and patching relocatable kernel module objects.
//!
//! The identification block fixes word width and byte order once; every
//! later read dispatches on that result and never looks at the raw bytes
//! again. Unsupported layouts abort the read before the section table is
//! touched.

pub mod header;
pub mod ident;
pub mod patch;
pub mod section;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixture;

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian};
use vkernel_common::constants::THIS_MODULE_SECTION;
use vkernel_common::error::{Result, VKernelError};

use self::header::FileHeader;
use self::ident::{EI_NIDENT, Encoding, FormatDescriptor, Ident};
use self::patch::PatchOutcome;
use self::section::{Section, SectionTable};

/// Parsed structure of a kernel module object.
///
/// Holds only metadata; the image bytes stay with the caller so that the
/// patch step can borrow them exclusively.
#[derive(Debug, Clone)]
pub struct ModuleObject {
    format: FormatDescriptor,
    header: FileHeader,
    sections: SectionTable,
}

impl ModuleObject {
    /// Parses identification, file header and section table from `reader`.
    ///
    /// `origin` is only used to label I/O errors.
    ///
    /// # Errors
    ///
    /// - [`VKernelError::Io`] if the source is unreadable or truncated.
    /// - [`VKernelError::BadMagic`], [`VKernelError::UnsupportedClass`] or
    ///   [`VKernelError::UnsupportedEncoding`] for unsupported
    ///   identification bytes, before any section is parsed.
    /// - [`VKernelError::Malformed`] for an inconsistent section table.
    pub fn parse<R: Read + Seek>(reader: &mut R, origin: &Path) -> Result<Self> {
        let io = |e| VKernelError::Io {
            path: origin.to_path_buf(),
            source: e,
        };

        let file_len = reader.seek(SeekFrom::End(0)).map_err(io)?;
        let _ = reader.seek(SeekFrom::Start(0)).map_err(io)?;

        let mut block = [0u8; EI_NIDENT];
        reader.read_exact(&mut block).map_err(io)?;
        let ident = Ident::parse(&block)?;

        let (header, sections) = match ident.encoding {
            Encoding::Little => {
                let header = FileHeader::read::<LittleEndian, _>(reader, ident.class).map_err(io)?;
                let sections = SectionTable::read::<LittleEndian, _>(reader, &header, file_len, origin)?;
                (header, sections)
            }
            Encoding::Big => {
                let header = FileHeader::read::<BigEndian, _>(reader, ident.class).map_err(io)?;
                let sections = SectionTable::read::<BigEndian, _>(reader, &header, file_len, origin)?;
                (header, sections)
            }
        };

        let format = FormatDescriptor {
            class: ident.class,
            encoding: ident.encoding,
            machine: header.machine(),
        };
        tracing::debug!(
            origin = %origin.display(),
            format = %format,
            sections = sections.len(),
            "parsed module object"
        );

        Ok(Self {
            format,
            header,
            sections,
        })
    }

    /// Parses an in-memory image.
    ///
    /// # Errors
    ///
    /// Same as [`ModuleObject::parse`].
    pub fn from_bytes(image: &[u8]) -> Result<Self> {
        Self::parse(&mut Cursor::new(image), Path::new("<memory>"))
    }

    /// Width, byte order and machine of the object.
    #[must_use]
    pub const fn format(&self) -> FormatDescriptor {
        self.format
    }

    /// The file header.
    #[must_use]
    pub const fn header(&self) -> &FileHeader {
        &self.header
    }

    /// The section table with resolved names.
    #[must_use]
    pub const fn sections(&self) -> &SectionTable {
        &self.sections
    }

    /// The `.gnu.linkonce.this_module` section, if present.
    #[must_use]
    pub fn identity_section(&self) -> Option<&Section> {
        self.sections.find(THIS_MODULE_SECTION)
    }

    /// Replaces the first `old` inside the identity section of `image` with
    /// `new`. See [`patch::patch_identity`].
    ///
    /// `image` must be the bytes this object was parsed from.
    ///
    /// # Errors
    ///
    /// See [`patch::patch_identity`].
    pub fn patch(&self, image: &mut [u8], old: &[u8], new: &[u8]) -> Result<PatchOutcome> {
        patch::patch_identity(&self.sections, image, old, new)
    }

    /// Renames the module by rewriting the whole `struct module::name`
    /// field, allowing `new_name` to be longer than `old_name`.
    ///
    /// # Errors
    ///
    /// [`VKernelError::PatchOverflow`] if either name does not fit the field
    /// for this object's word width, otherwise as [`ModuleObject::patch`].
    pub fn rename_module(
        &self,
        image: &mut [u8],
        old_name: &str,
        new_name: &str,
    ) -> Result<PatchOutcome> {
        let old = patch::module_name_field(old_name.as_bytes(), self.format.class)?;
        let new = patch::module_name_field(new_name.as_bytes(), self.format.class)?;
        self.patch(image, &old, &new)
    }
}
