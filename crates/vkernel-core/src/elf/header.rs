//! Width-specific ELF file headers.

use std::io::{self, Read, Seek, SeekFrom};

use byteorder::{ByteOrder, ReadBytesExt};

use super::ident::{Class, EI_NIDENT};

/// `ELF32_Ehdr` without the identification block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Header32 {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u32,
    pub e_phoff: u32,
    pub e_shoff: u32,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// `ELF64_Ehdr` without the identification block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Header64 {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_version: u32,
    pub e_entry: u64,
    pub e_phoff: u64,
    pub e_shoff: u64,
    pub e_flags: u32,
    pub e_ehsize: u16,
    pub e_phentsize: u16,
    pub e_phnum: u16,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

/// File header in the layout selected by the identification block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileHeader {
    /// 32-bit layout.
    Elf32(Header32),
    /// 64-bit layout.
    Elf64(Header64),
}

impl FileHeader {
    /// Reads the header of the given class in byte order `B`, starting at
    /// offset 0 of `reader`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error, e.g. `UnexpectedEof` on a
    /// truncated header.
    pub fn read<B: ByteOrder, R: Read + Seek>(reader: &mut R, class: Class) -> io::Result<Self> {
        let _ = reader.seek(SeekFrom::Start(EI_NIDENT as u64))?;
        let header = match class {
            Class::Elf32 => Self::Elf32(Header32 {
                e_type: reader.read_u16::<B>()?,
                e_machine: reader.read_u16::<B>()?,
                e_version: reader.read_u32::<B>()?,
                e_entry: reader.read_u32::<B>()?,
                e_phoff: reader.read_u32::<B>()?,
                e_shoff: reader.read_u32::<B>()?,
                e_flags: reader.read_u32::<B>()?,
                e_ehsize: reader.read_u16::<B>()?,
                e_phentsize: reader.read_u16::<B>()?,
                e_phnum: reader.read_u16::<B>()?,
                e_shentsize: reader.read_u16::<B>()?,
                e_shnum: reader.read_u16::<B>()?,
                e_shstrndx: reader.read_u16::<B>()?,
            }),
            Class::Elf64 => Self::Elf64(Header64 {
                e_type: reader.read_u16::<B>()?,
                e_machine: reader.read_u16::<B>()?,
                e_version: reader.read_u32::<B>()?,
                e_entry: reader.read_u64::<B>()?,
                e_phoff: reader.read_u64::<B>()?,
                e_shoff: reader.read_u64::<B>()?,
                e_flags: reader.read_u32::<B>()?,
                e_ehsize: reader.read_u16::<B>()?,
                e_phentsize: reader.read_u16::<B>()?,
                e_phnum: reader.read_u16::<B>()?,
                e_shentsize: reader.read_u16::<B>()?,
                e_shnum: reader.read_u16::<B>()?,
                e_shstrndx: reader.read_u16::<B>()?,
            }),
        };
        Ok(header)
    }

    /// Word width of this header.
    #[must_use]
    pub const fn class(&self) -> Class {
        match self {
            Self::Elf32(_) => Class::Elf32,
            Self::Elf64(_) => Class::Elf64,
        }
    }

    /// `e_type`; `1` for relocatable objects.
    #[must_use]
    pub const fn object_type(&self) -> u16 {
        match self {
            Self::Elf32(h) => h.e_type,
            Self::Elf64(h) => h.e_type,
        }
    }

    /// `e_machine`.
    #[must_use]
    pub const fn machine(&self) -> u16 {
        match self {
            Self::Elf32(h) => h.e_machine,
            Self::Elf64(h) => h.e_machine,
        }
    }

    /// `e_shoff`, widened.
    #[must_use]
    pub fn section_table_offset(&self) -> u64 {
        match self {
            Self::Elf32(h) => u64::from(h.e_shoff),
            Self::Elf64(h) => h.e_shoff,
        }
    }

    /// `e_shentsize`.
    #[must_use]
    pub const fn section_entry_size(&self) -> u16 {
        match self {
            Self::Elf32(h) => h.e_shentsize,
            Self::Elf64(h) => h.e_shentsize,
        }
    }

    /// `e_shnum`.
    #[must_use]
    pub const fn section_count(&self) -> u16 {
        match self {
            Self::Elf32(h) => h.e_shnum,
            Self::Elf64(h) => h.e_shnum,
        }
    }

    /// `e_shstrndx`.
    #[must_use]
    pub const fn string_table_index(&self) -> u16 {
        match self {
            Self::Elf32(h) => h.e_shstrndx,
            Self::Elf64(h) => h.e_shstrndx,
        }
    }
}
