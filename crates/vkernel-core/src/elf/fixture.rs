//! Synthetic relocatable objects shaped like a kernel module.
//!
//! Layout: file header, section bytes back to back, `.shstrtab`, then the
//! section header table aligned to 8.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use vkernel_common::constants::THIS_MODULE_SECTION;

use super::ident::{Class, ELF_MAGIC, EI_NIDENT, Encoding};

const SHT_PROGBITS: u32 = 1;
const SHT_STRTAB: u32 = 3;
const SHF_WRITE: u64 = 0x1;
const SHF_ALLOC: u64 = 0x2;

/// `e_machine` written for each layout: i386, PPC, x86-64 and S390.
#[must_use]
pub const fn machine(class: Class, encoding: Encoding) -> u16 {
    match (class, encoding) {
        (Class::Elf32, Encoding::Little) => 3,
        (Class::Elf32, Encoding::Big) => 20,
        (Class::Elf64, Encoding::Little) => 62,
        (Class::Elf64, Encoding::Big) => 22,
    }
}

/// Offset of `struct module::name`: after `state` and `list`.
#[must_use]
pub const fn name_offset(class: Class) -> usize {
    match class {
        Class::Elf32 => 12,
        Class::Elf64 => 24,
    }
}

/// Contents of `.gnu.linkonce.this_module` for a module called `name`.
#[must_use]
pub fn this_module_data(class: Class, name: &str) -> Vec<u8> {
    let prefix = name_offset(class);
    let field = class.module_name_len();
    assert!(name.len() < field, "fixture name {name:?} does not fit");
    let mut data = vec![0u8; prefix + field + 64];
    data[prefix..prefix + name.len()].copy_from_slice(name.as_bytes());
    data
}

/// A module image with `.text`, `.modinfo` and an identity section naming
/// `name`. Images for different names differ only inside the name field.
#[must_use]
pub fn module_image(class: Class, encoding: Encoding, name: &str) -> Vec<u8> {
    build(
        class,
        encoding,
        &[
            (".text", vec![0x90; 32]),
            (".modinfo", b"name=vkernel\0license=GPL\0".to_vec()),
            (THIS_MODULE_SECTION, this_module_data(class, name)),
        ],
    )
}

/// Builds an object with a null section, `sections` in order, and a
/// trailing `.shstrtab`.
#[must_use]
pub fn build(class: Class, encoding: Encoding, sections: &[(&str, Vec<u8>)]) -> Vec<u8> {
    match encoding {
        Encoding::Little => build_with::<LittleEndian>(class, encoding, sections),
        Encoding::Big => build_with::<BigEndian>(class, encoding, sections),
    }
}

struct Writer<B> {
    out: Vec<u8>,
    class: Class,
    _order: std::marker::PhantomData<B>,
}

impl<B: ByteOrder> Writer<B> {
    fn u16(&mut self, v: u16) {
        let mut buf = [0u8; 2];
        B::write_u16(&mut buf, v);
        self.out.extend_from_slice(&buf);
    }

    fn u32(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        B::write_u32(&mut buf, v);
        self.out.extend_from_slice(&buf);
    }

    fn word(&mut self, v: u64) {
        match self.class {
            Class::Elf32 => self.u32(u32::try_from(v).unwrap_or(u32::MAX)),
            Class::Elf64 => {
                let mut buf = [0u8; 8];
                B::write_u64(&mut buf, v);
                self.out.extend_from_slice(&buf);
            }
        }
    }
}

struct Entry {
    name_offset: u32,
    kind: u32,
    flags: u64,
    offset: u64,
    size: u64,
}

fn build_with<B: ByteOrder>(
    class: Class,
    encoding: Encoding,
    sections: &[(&str, Vec<u8>)],
) -> Vec<u8> {
    let mut shstrtab = vec![0u8];
    let mut name_offsets = Vec::with_capacity(sections.len() + 1);
    for name in sections.iter().map(|(n, _)| *n).chain([".shstrtab"]) {
        name_offsets.push(u32::try_from(shstrtab.len()).unwrap_or(u32::MAX));
        shstrtab.extend_from_slice(name.as_bytes());
        shstrtab.push(0);
    }

    let mut body = Vec::new();
    let mut entries = Vec::with_capacity(sections.len() + 1);
    let data_start = class.header_size();
    for (i, (name, data)) in sections.iter().enumerate() {
        let flags = if *name == THIS_MODULE_SECTION {
            SHF_WRITE | SHF_ALLOC
        } else {
            SHF_ALLOC
        };
        entries.push(Entry {
            name_offset: name_offsets[i],
            kind: SHT_PROGBITS,
            flags,
            offset: (data_start + body.len()) as u64,
            size: data.len() as u64,
        });
        body.extend_from_slice(data);
    }
    entries.push(Entry {
        name_offset: name_offsets[sections.len()],
        kind: SHT_STRTAB,
        flags: 0,
        offset: (data_start + body.len()) as u64,
        size: shstrtab.len() as u64,
    });
    body.extend_from_slice(&shstrtab);
    while (data_start + body.len()) % 8 != 0 {
        body.push(0);
    }

    let shoff = (data_start + body.len()) as u64;
    let shnum = u16::try_from(entries.len() + 1).unwrap_or(u16::MAX);

    let mut w = Writer::<B> {
        out: Vec::new(),
        class,
        _order: std::marker::PhantomData,
    };
    w.out.extend_from_slice(&ELF_MAGIC);
    w.out.push(match class {
        Class::Elf32 => 1,
        Class::Elf64 => 2,
    });
    w.out.push(match encoding {
        Encoding::Little => 1,
        Encoding::Big => 2,
    });
    w.out.push(1);
    w.out.resize(EI_NIDENT, 0);

    w.u16(1);
    w.u16(machine(class, encoding));
    w.u32(1);
    w.word(0);
    w.word(0);
    w.word(shoff);
    w.u32(0);
    w.u16(u16::try_from(class.header_size()).unwrap_or(u16::MAX));
    w.u16(0);
    w.u16(0);
    w.u16(u16::try_from(class.section_header_size()).unwrap_or(u16::MAX));
    w.u16(shnum);
    w.u16(shnum - 1);
    debug_assert_eq!(w.out.len(), data_start);

    w.out.extend_from_slice(&body);

    w.out.resize(w.out.len() + class.section_header_size(), 0);
    for entry in &entries {
        w.u32(entry.name_offset);
        w.u32(entry.kind);
        w.word(entry.flags);
        w.word(0);
        w.word(entry.offset);
        w.word(entry.size);
        w.u32(0);
        w.u32(0);
        w.word(if entry.kind == SHT_STRTAB { 1 } else { 8 });
        w.word(0);
    }
    w.out
}
