//! ELF identification block and the format descriptor derived from it.

use std::fmt;

use vkernel_common::error::{Result, VKernelError};

/// The four magic bytes every ELF object starts with.
pub const ELF_MAGIC: [u8; 4] = *b"\x7fELF";

/// Size of the identification block.
pub const EI_NIDENT: usize = 16;

/// Offset of the word-width byte.
pub const EI_CLASS: usize = 4;

/// Offset of the byte-order byte.
pub const EI_DATA: usize = 5;

/// Word width of an ELF object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    /// 32-bit layout (`ELFCLASS32`).
    Elf32,
    /// 64-bit layout (`ELFCLASS64`).
    Elf64,
}

impl Class {
    /// Size of the file header in bytes.
    #[must_use]
    pub const fn header_size(self) -> usize {
        match self {
            Self::Elf32 => 52,
            Self::Elf64 => 64,
        }
    }

    /// Size of one section descriptor in bytes.
    #[must_use]
    pub const fn section_header_size(self) -> usize {
        match self {
            Self::Elf32 => 40,
            Self::Elf64 => 64,
        }
    }

    /// `MODULE_NAME_LEN` of a kernel built for this word width:
    /// `64 - sizeof(unsigned long)`.
    #[must_use]
    pub const fn module_name_len(self) -> usize {
        match self {
            Self::Elf32 => 60,
            Self::Elf64 => 56,
        }
    }
}

impl TryFrom<u8> for Class {
    type Error = VKernelError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Elf32),
            2 => Ok(Self::Elf64),
            other => Err(VKernelError::UnsupportedClass(other)),
        }
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Elf32 => write!(f, "ELF32"),
            Self::Elf64 => write!(f, "ELF64"),
        }
    }
}

/// Byte order of an ELF object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// `ELFDATA2LSB`.
    Little,
    /// `ELFDATA2MSB`.
    Big,
}

impl TryFrom<u8> for Encoding {
    type Error = VKernelError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Little),
            2 => Ok(Self::Big),
            other => Err(VKernelError::UnsupportedEncoding(other)),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Little => write!(f, "little-endian"),
            Self::Big => write!(f, "big-endian"),
        }
    }
}

/// Width and byte order decoded from the identification block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident {
    /// Word width.
    pub class: Class,
    /// Byte order.
    pub encoding: Encoding,
}

impl Ident {
    /// Decodes an identification block.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::BadMagic`], [`VKernelError::UnsupportedClass`]
    /// or [`VKernelError::UnsupportedEncoding`].
    pub fn parse(block: &[u8; EI_NIDENT]) -> Result<Self> {
        let magic = [block[0], block[1], block[2], block[3]];
        if magic != ELF_MAGIC {
            return Err(VKernelError::BadMagic { found: magic });
        }
        Ok(Self {
            class: Class::try_from(block[EI_CLASS])?,
            encoding: Encoding::try_from(block[EI_DATA])?,
        })
    }
}

/// Everything the rest of the parser needs to know about the layout.
///
/// Built once from a successfully decoded identification block and header;
/// never observable in a partially initialised state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    /// Word width.
    pub class: Class,
    /// Byte order.
    pub encoding: Encoding,
    /// `e_machine` from the file header. Informational only.
    pub machine: u16,
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} machine {}", self.class, self.encoding, self.machine)
    }
}
