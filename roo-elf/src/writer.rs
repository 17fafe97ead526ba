//! The ELF writer (§4.7): assembles a vector of `ElfThing`s, a symbol table, and pending
//! relocations into a single ELF64 little-endian file, executable or relocatable.
//!
//! Follows the emission order from the specification almost step for step: lay out `.text`
//! things, then `.rodata`, fold in each section's virtual address, emit the string and symbol
//! tables, patch relocations, then the section and program header tables, and finally go back and
//! write the ELF header now that every offset is known.

use crate::section::*;
use crate::strtab::StringTable;
use crate::symbol::{Binding, Symbol, SymbolType};
use crate::thing::{ElfThing, RelocationKind};
use roo_diagnostics::{ErrorKind, ErrorState, Location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Executable,
    Relocatable,
}

pub struct ElfFile {
    pub kind: OutputKind,
    pub text_things: Vec<ElfThing>,
    pub rodata: ElfThing,
    pub symbols: Vec<Symbol>,
    /// Name of the symbol `_start` should resolve to as the entry point (§4.6 bootstrap); ignored
    /// for `OutputKind::Relocatable`.
    pub entry_symbol: Option<String>,
}

impl ElfFile {
    pub fn new(kind: OutputKind) -> Self {
        Self {
            kind,
            text_things: Vec::new(),
            rodata: ElfThing::new(".rodata"),
            symbols: Vec::new(),
            entry_symbol: None,
        }
    }

    /// Resolve every symbol with `section_index == 0` against another symbol of the same name
    /// that *is* defined, rewriting every relocation that pointed at the undefined one to point at
    /// its defined partner's name instead (they're already the same name here — interning by name
    /// rather than index is what makes the rewrite a no-op on the relocation side, §4.7
    /// "undefined symbols").
    pub fn resolve_undefined_symbols(&mut self, errors: &mut ErrorState) {
        let defined: std::collections::HashSet<String> = self
            .symbols
            .iter()
            .filter(|s| !s.is_undefined())
            .map(|s| s.name.clone())
            .collect();

        let mut still_missing = Vec::new();
        self.symbols.retain(|s| {
            if s.is_undefined() {
                if defined.contains(&s.name) {
                    false // drop the placeholder now that a real definition exists
                } else {
                    still_missing.push(s.name.clone());
                    true
                }
            } else {
                true
            }
        });

        for name in still_missing {
            errors.raise(Location::unknown(), ErrorKind::UnresolvedSymbol(name));
        }
    }

    pub fn write(&mut self, errors: &mut ErrorState) -> Vec<u8> {
        // --- steps 2-3: lay out .text then .rodata, recording each thing's offset within its
        // section ---
        let mut text_bytes = Vec::new();
        for thing in &mut self.text_things {
            thing.section_offset = Some(text_bytes.len() as u32);
            text_bytes.extend_from_slice(&thing.bytes);
        }
        self.rodata.section_offset = Some(0);
        let rodata_bytes = self.rodata.bytes.clone();

        let text_file_offset = ELF_HEADER_SIZE;
        let rodata_file_offset = text_file_offset + text_bytes.len() as u64;

        // --- step 4: fold section base addresses into preliminary symbol values ---
        // A single constant bias between virtual address and file offset lets one PT_LOAD segment
        // cover the header and both sections without needing more than one mapping.
        let text_vaddr = LOAD_BASE_ADDRESS + text_file_offset;
        let rodata_vaddr = LOAD_BASE_ADDRESS + rodata_file_offset;

        for (thing, symbol_name) in self.text_things.iter().zip(self.text_things.iter().map(|t| t.name.clone())) {
            let offset = thing.section_offset.unwrap_or(0) as u64;
            if let Some(sym) = self.symbols.iter_mut().find(|s| s.name == symbol_name) {
                sym.value = text_vaddr + offset;
                sym.section_index = 1;
            }
        }

        let strings_symbol_value = rodata_vaddr;

        // --- step 5: string table ---
        let mut strtab = StringTable::new();
        let text_name = strtab.intern(".text");
        let rodata_name = strtab.intern(".rodata");
        let strtab_name = strtab.intern(".strtab");
        let symtab_name = strtab.intern(".symtab");
        let symbol_names: Vec<u32> = self.symbols.iter().map(|s| strtab.intern(&s.name)).collect();

        // --- step 6: symbol table (leading null entry) ---
        let mut symtab_bytes = vec![0u8; SYMBOL_ENTRY_SIZE as usize];
        for (sym, name_off) in self.symbols.iter().zip(symbol_names.iter()) {
            push_symbol(&mut symtab_bytes, *name_off, sym);
        }

        let strtab_file_offset = rodata_file_offset + rodata_bytes.len() as u64;
        let symtab_file_offset = strtab_file_offset + strtab.len() as u64;
        let shdr_file_offset = symtab_file_offset + symtab_bytes.len() as u64;
        let num_sections = 5u64; // null, .text, .rodata, .strtab, .symtab
        let phdr_file_offset = shdr_file_offset + num_sections * SECTION_HEADER_ENTRY_SIZE;

        let mut buffer = vec![0u8; ELF_HEADER_SIZE as usize];
        buffer.extend_from_slice(&text_bytes);
        buffer.extend_from_slice(&rodata_bytes);
        buffer.extend_from_slice(strtab.bytes());
        buffer.extend_from_slice(&symtab_bytes);

        // --- step 7: apply relocations ---
        let symbol_value = |name: &str| -> Option<u64> {
            if name == ".rodata" {
                return Some(strings_symbol_value);
            }
            self.symbols.iter().find(|s| s.name == name).map(|s| s.value)
        };

        for (thing, section_base) in self
            .text_things
            .iter()
            .map(|t| (t, text_file_offset))
            .chain(std::iter::once((&self.rodata, rodata_file_offset)))
        {
            let thing_file_offset = section_base + thing.section_offset.unwrap_or(0) as u64;
            for reloc in &thing.relocations {
                let Some(sym_vaddr) = symbol_value(&reloc.symbol) else {
                    errors.raise(
                        Location::unknown(),
                        ErrorKind::UnresolvedSymbol(reloc.symbol.clone()),
                    );
                    continue;
                };
                let patch_file_offset = thing_file_offset + reloc.offset as u64;
                let site_vaddr = LOAD_BASE_ADDRESS + patch_file_offset;

                match reloc.kind {
                    RelocationKind::Pc32 => {
                        let value = (sym_vaddr as i64 + reloc.addend) - site_vaddr as i64;
                        let bytes = (value as i32).to_le_bytes();
                        buffer[patch_file_offset as usize..patch_file_offset as usize + 4]
                            .copy_from_slice(&bytes);
                    }
                    RelocationKind::Abs64 => {
                        let value = (sym_vaddr as i64 + reloc.addend) as u64;
                        buffer[patch_file_offset as usize..patch_file_offset as usize + 8]
                            .copy_from_slice(&value.to_le_bytes());
                    }
                }
            }
        }

        // --- step 8: section header table ---
        let mut shdrs = vec![0u8; SECTION_HEADER_ENTRY_SIZE as usize]; // null section
        push_section_header(&mut shdrs, text_name, SHT_PROGBITS, SHF_ALLOC | SHF_EXECINSTR, text_vaddr, text_file_offset, text_bytes.len() as u64, 0, 0);
        push_section_header(&mut shdrs, rodata_name, SHT_PROGBITS, SHF_ALLOC, rodata_vaddr, rodata_file_offset, rodata_bytes.len() as u64, 0, 0);
        push_section_header(&mut shdrs, strtab_name, SHT_STRTAB, 0, 0, strtab_file_offset, strtab.len() as u64, 0, 0);
        push_section_header(&mut shdrs, symtab_name, SHT_SYMTAB, 0, 0, symtab_file_offset, symtab_bytes.len() as u64, 3 /* link: .strtab */, 1);
        buffer.extend_from_slice(&shdrs);

        // --- step 9: program header table ---
        let mut phdrs = Vec::new();
        push_program_header(&mut phdrs, PF_R | PF_X, text_file_offset, text_bytes.len() as u64);
        push_program_header(&mut phdrs, PF_R, rodata_file_offset, rodata_bytes.len() as u64);
        buffer.extend_from_slice(&phdrs);

        // --- step 10: ELF header ---
        let entry_point = match (&self.kind, &self.entry_symbol) {
            (OutputKind::Executable, Some(name)) => match symbol_value(name) {
                Some(v) => v,
                None => {
                    errors.raise(Location::unknown(), ErrorKind::NoStartSymbol);
                    0
                }
            },
            (OutputKind::Executable, None) => {
                errors.raise(Location::unknown(), ErrorKind::NoStartSymbol);
                0
            }
            (OutputKind::Relocatable, _) => 0,
        };

        let e_type = match self.kind {
            OutputKind::Executable => ET_EXEC,
            OutputKind::Relocatable => ET_REL,
        };
        let header = build_elf_header(e_type, entry_point, phdr_file_offset, shdr_file_offset, num_sections as u16, 3);
        buffer[0..ELF_HEADER_SIZE as usize].copy_from_slice(&header);

        buffer
    }
}

fn build_elf_header(e_type: u16, entry: u64, phoff: u64, shoff: u64, shnum: u16, shstrndx: u16) -> [u8; 64] {
    let mut h = [0u8; 64];
    h[0..4].copy_from_slice(&EI_MAG);
    h[4] = ELFCLASS64;
    h[5] = ELFDATA2LSB;
    h[6] = EV_CURRENT;
    h[7] = ELFOSABI_SYSV;
    h[16..18].copy_from_slice(&e_type.to_le_bytes());
    h[18..20].copy_from_slice(&EM_X86_64.to_le_bytes());
    h[20..24].copy_from_slice(&1u32.to_le_bytes()); // e_version
    h[24..32].copy_from_slice(&entry.to_le_bytes());
    h[32..40].copy_from_slice(&phoff.to_le_bytes());
    h[40..48].copy_from_slice(&shoff.to_le_bytes());
    h[48..52].copy_from_slice(&0u32.to_le_bytes()); // e_flags
    h[52..54].copy_from_slice(&(ELF_HEADER_SIZE as u16).to_le_bytes());
    h[54..56].copy_from_slice(&(PROGRAM_HEADER_ENTRY_SIZE as u16).to_le_bytes());
    h[56..58].copy_from_slice(&2u16.to_le_bytes()); // e_phnum: text + rodata segments
    h[58..60].copy_from_slice(&(SECTION_HEADER_ENTRY_SIZE as u16).to_le_bytes());
    h[60..62].copy_from_slice(&shnum.to_le_bytes());
    h[62..64].copy_from_slice(&shstrndx.to_le_bytes());
    h
}

#[allow(clippy::too_many_arguments)]
fn push_section_header(
    out: &mut Vec<u8>,
    name: u32,
    ty: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
) {
    out.extend_from_slice(&name.to_le_bytes());
    out.extend_from_slice(&ty.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&link.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // info
    out.extend_from_slice(&8u64.to_le_bytes()); // addralign
    out.extend_from_slice(&entsize.to_le_bytes());
}

fn push_program_header(out: &mut Vec<u8>, flags: u32, offset: u64, filesz: u64) {
    let vaddr = LOAD_BASE_ADDRESS + offset;
    out.extend_from_slice(&PT_LOAD.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&vaddr.to_le_bytes());
    out.extend_from_slice(&vaddr.to_le_bytes()); // paddr == vaddr, no physical-address distinction
    out.extend_from_slice(&filesz.to_le_bytes());
    out.extend_from_slice(&filesz.to_le_bytes()); // memsz == filesz, no .bss support
    out.extend_from_slice(&PAGE_SIZE.to_le_bytes());
}

fn push_symbol(out: &mut Vec<u8>, name: u32, sym: &Symbol) {
    let bind = match sym.binding {
        Binding::Local => 0u8,
        Binding::Global => 1u8,
    };
    let ty = match sym.ty {
        SymbolType::NoType => 0u8,
        SymbolType::Object => 1u8,
        SymbolType::Function => 2u8,
    };
    out.extend_from_slice(&name.to_le_bytes());
    out.push((bind << 4) | ty);
    out.push(0); // other
    out.extend_from_slice(&sym.section_index.to_le_bytes());
    out.extend_from_slice(&sym.value.to_le_bytes());
    out.extend_from_slice(&sym.size.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_executable_starts_with_elf_magic() {
        let mut file = ElfFile::new(OutputKind::Executable);
        let mut start = ElfThing::new("_start");
        start.push_u8(0xc3); // ret, just to have some bytes
        file.text_things.push(start);
        file.symbols.push(Symbol::defined("_start", 0, 0, Binding::Global, SymbolType::Function, 1));
        file.entry_symbol = Some("_start".to_string());

        let mut errors = ErrorState::new();
        let bytes = file.write(&mut errors);
        assert!(!errors.has_errored());
        assert_eq!(&bytes[0..4], &EI_MAG);
        assert_eq!(bytes[4], ELFCLASS64);
    }

    #[test]
    fn missing_entry_symbol_raises_no_start_symbol() {
        let mut file = ElfFile::new(OutputKind::Executable);
        let mut errors = ErrorState::new();
        file.write(&mut errors);
        assert!(errors.has_errored());
    }

    #[test]
    fn pc32_relocation_is_patched_relative_to_the_next_instruction() {
        let mut file = ElfFile::new(OutputKind::Relocatable);
        let mut f = ElfThing::new("f");
        f.push_u8(0xe8); // call opcode
        f.push_relocation("g", RelocationKind::Pc32, -4);
        let g = ElfThing::new("g");
        file.symbols.push(Symbol::defined("f", 0, 0, Binding::Global, SymbolType::Function, 0));
        file.symbols.push(Symbol::defined("g", 0, 0, Binding::Global, SymbolType::Function, 0));
        file.text_things.push(f);
        file.text_things.push(g);

        let mut errors = ErrorState::new();
        let bytes = file.write(&mut errors);
        assert!(!errors.has_errored());
        // `g` immediately follows the 5-byte call instruction in `f`; a call placed right before
        // its callee resolves to a relative displacement of exactly 0.
        let patch_start = ELF_HEADER_SIZE as usize + 1;
        let value = i32::from_le_bytes(bytes[patch_start..patch_start + 4].try_into().unwrap());
        assert_eq!(value, 0);
    }
}
