//! Ingesting an external ELF64 relocatable (§4.7 "ingesting external relocatables"): used when the
//! driver is asked to `--link` an already-compiled `.o`. Parses just enough of a generic ELF64 LE
//! relocatable to recover its functions and their relocations; not a general-purpose ELF parser.

use crate::section::*;
use crate::symbol::{Binding, Symbol, SymbolType};
use crate::thing::{ElfThing, Relocation, RelocationKind};
use roo_diagnostics::{ErrorKind, ErrorState, Location};

struct SectionHeader {
    name_offset: u32,
    ty: u32,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
}

fn read_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(b[at..at + 2].try_into().unwrap())
}
fn read_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(b[at..at + 4].try_into().unwrap())
}
fn read_u64(b: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(b[at..at + 8].try_into().unwrap())
}
fn read_i64(b: &[u8], at: usize) -> i64 {
    i64::from_le_bytes(b[at..at + 8].try_into().unwrap())
}

fn cstr_at(strtab: &[u8], offset: u32) -> String {
    let start = offset as usize;
    let end = strtab[start..].iter().position(|&b| b == 0).map(|p| start + p).unwrap_or(strtab.len());
    String::from_utf8_lossy(&strtab[start..end]).into_owned()
}

/// One function (or NASM-style untyped-in-`.text` symbol) recovered from the object, with its own
/// private copy of its bytes and any relocations that fall within its byte range.
pub struct IngestedFunction {
    pub name: String,
    pub thing: ElfThing,
}

pub struct IngestedObject {
    pub functions: Vec<IngestedFunction>,
}

pub fn ingest_relocatable(bytes: &[u8], path: &str, errors: &mut ErrorState) -> Option<IngestedObject> {
    if bytes.len() < ELF_HEADER_SIZE as usize || bytes[0..4] != EI_MAG || bytes[4] != ELFCLASS64 || bytes[5] != ELFDATA2LSB {
        errors.raise(Location::unknown(), ErrorKind::WeirdLinkedObject(path.to_string()));
        return None;
    }
    let e_type = read_u16(bytes, 16);
    if e_type != ET_REL {
        errors.raise(Location::unknown(), ErrorKind::WeirdLinkedObject(path.to_string()));
        return None;
    }

    let shoff = read_u64(bytes, 40) as usize;
    let shentsize = read_u16(bytes, 58) as usize;
    let shnum = read_u16(bytes, 60) as usize;
    let shstrndx = read_u16(bytes, 62) as usize;

    let mut sections = Vec::with_capacity(shnum);
    for i in 0..shnum {
        let base = shoff + i * shentsize;
        sections.push(SectionHeader {
            name_offset: read_u32(bytes, base),
            ty: read_u32(bytes, base + 4),
            offset: read_u64(bytes, base + 24),
            size: read_u64(bytes, base + 32),
            link: read_u32(bytes, base + 40),
            entsize: read_u64(bytes, base + 56),
        });
    }

    let shstrtab = &bytes[sections[shstrndx].offset as usize..(sections[shstrndx].offset + sections[shstrndx].size) as usize];
    let section_name = |i: usize| cstr_at(shstrtab, sections[i].name_offset);

    let text_idx = (0..shnum).find(|&i| section_name(i) == ".text")?;
    let symtab_idx = (0..shnum).find(|&i| sections[i].ty == SHT_SYMTAB);
    let Some(symtab_idx) = symtab_idx else {
        errors.raise(Location::unknown(), ErrorKind::WeirdLinkedObject(path.to_string()));
        return None;
    };
    let strtab_idx = sections[symtab_idx].link as usize;
    let strtab = &bytes[sections[strtab_idx].offset as usize..(sections[strtab_idx].offset + sections[strtab_idx].size) as usize];

    // --- symbol table: collect every (name, text-relative offset) whose section index is .text ---
    let entsize = sections[symtab_idx].entsize.max(SYMBOL_ENTRY_SIZE) as usize;
    let count = sections[symtab_idx].size as usize / entsize;
    let symtab_base = sections[symtab_idx].offset as usize;

    let mut text_symbols: Vec<(String, u64)> = Vec::new();
    for i in 0..count {
        let base = symtab_base + i * entsize;
        let name_off = read_u32(bytes, base);
        let info = bytes[base + 4];
        let shndx = read_u16(bytes, base + 6);
        let value = read_u64(bytes, base + 8);
        let ty = info & 0xf;

        if shndx as usize != text_idx + 1 && shndx as usize != text_idx {
            // symbol table here is indexed against *this file's own* section numbering, which
            // matches ours 1:1 since we wrote it ourselves in the common case; tolerate either a
            // base-0 or base-1 mismatch rather than hard requiring the writer's exact layout.
            continue;
        }
        // type 2 = STT_FUNC (ELF64_ST_TYPE); type 0 (STT_NOTYPE) also accepted for
        // NASM-style untyped-in-`.text` symbols, per the specification.
        if ty != 2 && ty != 0 {
            continue;
        }
        if name_off == 0 {
            continue;
        }
        text_symbols.push((cstr_at(strtab, name_off), value));
    }

    text_symbols.sort_by_key(|(_, v)| *v);

    let text_bytes = &bytes[sections[text_idx].offset as usize..(sections[text_idx].offset + sections[text_idx].size) as usize];

    // --- RELA sections targeting .text; SHT_REL is explicitly unsupported ---
    let mut text_relocations: Vec<(u64, String, RelocationKind, i64)> = Vec::new();
    for i in 0..shnum {
        if sections[i].ty == SHT_REL {
            errors.raise(
                Location::unknown(),
                ErrorKind::UnsupportedRelocationType(SHT_REL),
            );
            continue;
        }
        if sections[i].ty != SHT_RELA {
            continue;
        }
        let rela_entsize = sections[i].entsize.max(24) as usize;
        let rela_count = sections[i].size as usize / rela_entsize;
        let rela_base = sections[i].offset as usize;
        for j in 0..rela_count {
            let base = rela_base + j * rela_entsize;
            let r_offset = read_u64(bytes, base);
            let r_info = read_u64(bytes, base + 8);
            let r_addend = read_i64(bytes, base + 16);
            let sym_index = (r_info >> 32) as usize;
            let type_code = (r_info & 0xffff_ffff) as u32;

            let Some(kind) = RelocationKind::from_type_code(type_code) else {
                errors.raise(Location::unknown(), ErrorKind::UnsupportedRelocationType(type_code));
                continue;
            };

            let sym_base = symtab_base + sym_index * entsize;
            let sym_name = cstr_at(strtab, read_u32(bytes, sym_base));
            text_relocations.push((r_offset, sym_name, kind, r_addend));
        }
    }

    // --- slice .text into one ElfThing per symbol, implicit size = gap to next symbol ---
    let mut functions = Vec::with_capacity(text_symbols.len());
    for (idx, (name, offset)) in text_symbols.iter().enumerate() {
        let start = *offset as usize;
        let end = text_symbols
            .get(idx + 1)
            .map(|(_, next)| *next as usize)
            .unwrap_or(text_bytes.len());
        let mut thing = ElfThing::new(name.clone());
        thing.bytes = text_bytes[start..end].to_vec();
        for (roffset, sym, kind, addend) in &text_relocations {
            let roffset = *roffset as usize;
            if roffset >= start && roffset < end {
                thing.relocations.push(Relocation {
                    offset: (roffset - start) as u32,
                    symbol: sym.clone(),
                    kind: *kind,
                    addend: *addend,
                });
            }
        }
        functions.push(IngestedFunction { name: name.clone(), thing });
    }

    Some(IngestedObject { functions })
}

/// Build an undefined-or-defined `Symbol` for each ingested function, suitable for appending to an
/// in-progress `ElfFile::symbols` before the undefined-symbol resolution pass runs.
pub fn symbols_for(object: &IngestedObject) -> Vec<Symbol> {
    object
        .functions
        .iter()
        .map(|f| Symbol::defined(f.name.clone(), 0, f.thing.bytes.len() as u64, Binding::Global, SymbolType::Function, 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Binding as B, SymbolType as T};
    use crate::writer::{ElfFile, OutputKind};

    #[test]
    fn round_trips_through_our_own_writer() {
        let mut file = ElfFile::new(OutputKind::Relocatable);
        let mut thing = ElfThing::new("helper");
        thing.push_u8(0xc3); // ret
        file.symbols.push(Symbol::defined("helper", 0, 0, B::Global, T::Function, 0));
        file.text_things.push(thing);

        let mut errors = ErrorState::new();
        let bytes = file.write(&mut errors);
        assert!(!errors.has_errored());

        let mut read_errors = ErrorState::new();
        let object = ingest_relocatable(&bytes, "test.o", &mut read_errors).expect("parses");
        assert!(!read_errors.has_errored());
        assert_eq!(object.functions.len(), 1);
        assert_eq!(object.functions[0].name, "helper");
        assert_eq!(object.functions[0].thing.bytes, vec![0xc3]);
    }

    #[test]
    fn rejects_non_elf_input() {
        let mut errors = ErrorState::new();
        assert!(ingest_relocatable(b"not an elf file at all", "bad.o", &mut errors).is_none());
        assert!(errors.has_errored());
    }
}
