//! Section table reading and section name resolution.
//!
//! Both word widths are normalised into one [`SectionHeader`] so that name
//! resolution and patching share a single code path.

use std::io::{Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, ReadBytesExt};
use vkernel_common::error::{Result, VKernelError};

use super::header::FileHeader;
use super::ident::Class;

/// `SHT_NOBITS`: the section occupies no file bytes.
pub const SHT_NOBITS: u32 = 8;

/// `SHN_XINDEX`: the real string table index lives in section 0.
pub const SHN_XINDEX: u16 = 0xffff;

/// One section descriptor, widened to 64-bit fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionHeader {
    /// Offset of the name in the section name string table.
    pub name_offset: u32,
    /// `sh_type`.
    pub kind: u32,
    /// `sh_flags`.
    pub flags: u64,
    /// `sh_addr`.
    pub addr: u64,
    /// File offset of the section bytes.
    pub offset: u64,
    /// Size of the section in bytes.
    pub size: u64,
    /// `sh_link`.
    pub link: u32,
    /// `sh_info`.
    pub info: u32,
    /// `sh_addralign`.
    pub addralign: u64,
    /// `sh_entsize`.
    pub entsize: u64,
}

impl SectionHeader {
    /// Reads one descriptor of the given class in byte order `B` from the
    /// current position of `reader`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub fn read<B: ByteOrder, R: Read>(reader: &mut R, class: Class) -> std::io::Result<Self> {
        fn word<B: ByteOrder, R: Read>(reader: &mut R, class: Class) -> std::io::Result<u64> {
            match class {
                Class::Elf32 => reader.read_u32::<B>().map(u64::from),
                Class::Elf64 => reader.read_u64::<B>(),
            }
        }

        Ok(Self {
            name_offset: reader.read_u32::<B>()?,
            kind: reader.read_u32::<B>()?,
            flags: word::<B, _>(reader, class)?,
            addr: word::<B, _>(reader, class)?,
            offset: word::<B, _>(reader, class)?,
            size: word::<B, _>(reader, class)?,
            link: reader.read_u32::<B>()?,
            info: reader.read_u32::<B>()?,
            addralign: word::<B, _>(reader, class)?,
            entsize: word::<B, _>(reader, class)?,
        })
    }

    /// Byte range the section occupies in the file.
    ///
    /// `NOBITS` sections occupy nothing and yield an empty range.
    ///
    /// # Errors
    ///
    /// Returns [`VKernelError::Malformed`] if the range overflows.
    pub fn file_range(&self) -> Result<Range<u64>> {
        if self.kind == SHT_NOBITS {
            return Ok(self.offset..self.offset);
        }
        let end = self.offset.checked_add(self.size).ok_or_else(|| {
            VKernelError::malformed(format!(
                "section range {:#x}+{:#x} overflows",
                self.offset, self.size
            ))
        })?;
        Ok(self.offset..end)
    }
}

/// A section descriptor together with its resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Index in the section table.
    pub index: usize,
    /// Name resolved through the section name string table.
    pub name: String,
    /// The descriptor itself.
    pub header: SectionHeader,
}

/// All sections of an object, in table order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    /// Reads the section table described by `header` and resolves every
    /// section name.
    ///
    /// `file_len` bounds every offset read from the header so that a corrupt
    /// table is reported rather than allocated. `origin` names the source in
    /// I/O errors.
    ///
    /// # Errors
    ///
    /// Returns an I/O error from the reader, or [`VKernelError::Malformed`]
    /// if the table or string table lies outside the file.
    pub fn read<B: ByteOrder, R: Read + Seek>(
        reader: &mut R,
        header: &FileHeader,
        file_len: u64,
        origin: &Path,
    ) -> Result<Self> {
        let io = |e| VKernelError::Io {
            path: origin.to_path_buf(),
            source: e,
        };
        let class = header.class();
        let count = usize::from(header.section_count());
        let table_offset = header.section_table_offset();
        if count == 0 {
            if table_offset != 0 {
                return Err(VKernelError::malformed(
                    "extended section numbering is not supported",
                ));
            }
            return Ok(Self::default());
        }

        let entry_size = u64::from(header.section_entry_size());
        if entry_size < class.section_header_size() as u64 {
            return Err(VKernelError::malformed(format!(
                "section entry size {entry_size} is smaller than {}",
                class.section_header_size()
            )));
        }

        let table_end = entry_size
            .checked_mul(count as u64)
            .and_then(|len| len.checked_add(table_offset))
            .filter(|end| *end <= file_len)
            .ok_or_else(|| {
                VKernelError::malformed(format!(
                    "section table at {table_offset:#x} ({count} x {entry_size}) exceeds file length {file_len:#x}"
                ))
            })?;
        tracing::debug!(offset = table_offset, end = table_end, count, "reading section table");

        let mut headers = Vec::with_capacity(count);
        for i in 0..count as u64 {
            let _ = reader
                .seek(SeekFrom::Start(table_offset + i * entry_size))
                .map_err(io)?;
            headers.push(SectionHeader::read::<B, _>(reader, class).map_err(io)?);
        }

        let strndx = header.string_table_index();
        if strndx == SHN_XINDEX {
            return Err(VKernelError::malformed(
                "extended section numbering is not supported",
            ));
        }
        let strtab_header = headers.get(usize::from(strndx)).ok_or_else(|| {
            VKernelError::malformed(format!(
                "string table index {strndx} is outside a table of {count} sections"
            ))
        })?;
        let range = strtab_header.file_range()?;
        if range.end > file_len {
            return Err(VKernelError::malformed(format!(
                "string table {:#x}..{:#x} exceeds file length {file_len:#x}",
                range.start, range.end
            )));
        }
        let len = usize::try_from(range.end - range.start)
            .map_err(|_| VKernelError::malformed("string table does not fit in memory"))?;
        let mut strtab = vec![0u8; len];
        let _ = reader.seek(SeekFrom::Start(range.start)).map_err(io)?;
        reader.read_exact(&mut strtab).map_err(io)?;

        let sections = headers
            .into_iter()
            .enumerate()
            .map(|(index, header)| {
                Ok(Section {
                    index,
                    name: resolve_name(&strtab, header.name_offset)?,
                    header,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { sections })
    }

    /// Returns the first section named `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Iterates over sections in table order.
    pub fn iter(&self) -> std::slice::Iter<'_, Section> {
        self.sections.iter()
    }

    /// Number of sections, including the null section.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the object has no section table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl<'a> IntoIterator for &'a SectionTable {
    type Item = &'a Section;
    type IntoIter = std::slice::Iter<'a, Section>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Resolves the NUL-terminated name starting at `offset` in `strtab`.
///
/// A name running to the end of the table without a terminator is taken as
/// is.
///
/// # Errors
///
/// Returns [`VKernelError::Malformed`] if `offset` lies outside the table.
pub fn resolve_name(strtab: &[u8], offset: u32) -> Result<String> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    let tail = strtab.get(start..).ok_or_else(|| {
        VKernelError::malformed(format!(
            "name offset {offset} is outside a string table of {} bytes",
            strtab.len()
        ))
    })?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
}
