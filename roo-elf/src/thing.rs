//! `ElfThing` (§4.7): the unit the code generator emits into. One per code-thing's machine code,
//! one for `.rodata`, each carrying its own relocations until the writer folds everything into a
//! single file.
//!
//! Grounded in the original's `ElfThing`/`Relocation` (`elf.hpp`): a named byte buffer plus the
//! relocations whose placeholder bytes live inside it, with a symbol value that starts out
//! relative to the thing's own start and gets rewritten once the writer knows the containing
//! section's base address.

/// A relocation type the encoder can record (§4.6/§4.7); `R_X86_64_64`/`R_X86_64_PC32`'s numeric
/// values from the target's relocation-type enum, kept here rather than in `roo-isa` since the
/// writer needs to switch on them regardless of which backend produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationKind {
    /// A 32-bit PC-relative displacement (jumps, calls).
    Pc32,
    /// A full 64-bit absolute address (string constant pointers into `.rodata`).
    Abs64,
}

impl RelocationKind {
    /// The numeric code an ingested external relocatable's `RELA` entries use for this kind,
    /// matching the original's `Relocation::Type` (`elf.hpp`).
    pub fn from_type_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(RelocationKind::Abs64),
            2 => Some(RelocationKind::Pc32),
            _ => None,
        }
    }

    pub fn type_code(self) -> u32 {
        match self {
            RelocationKind::Abs64 => 1,
            RelocationKind::Pc32 => 2,
        }
    }

    pub fn width(self) -> usize {
        match self {
            RelocationKind::Pc32 => 4,
            RelocationKind::Abs64 => 8,
        }
    }
}

/// A pending fixup: `offset` bytes into the *section* (filled in once the thing's position within
/// its section is known), pointing at `symbol` with the given `addend` (§4.7 "apply relocations").
#[derive(Debug, Clone)]
pub struct Relocation {
    pub offset: u32,
    pub symbol: String,
    pub kind: RelocationKind,
    pub addend: i64,
}

/// One named blob of bytes destined for a section, plus the relocations whose placeholders live
/// inside it. A code-thing gets one (its machine code); `.rodata` gets exactly one covering every
/// string constant.
#[derive(Debug, Clone, Default)]
pub struct ElfThing {
    pub name: String,
    pub bytes: Vec<u8>,
    pub relocations: Vec<Relocation>,
    /// Offset within the containing section, filled in once every thing before it in emission
    /// order has been measured (§4.7 emission step 2).
    pub section_offset: Option<u32>,
}

impl ElfThing {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes: Vec::new(),
            relocations: Vec::new(),
            section_offset: None,
        }
    }

    pub fn push_u8(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub fn push_u32_le(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn push_u64_le(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// Record a relocation anchored at the current end of the buffer, then emit the 4- or 8-byte
    /// placeholder the writer will later overwrite.
    pub fn push_relocation(&mut self, symbol: impl Into<String>, kind: RelocationKind, addend: i64) {
        let offset = self.offset();
        self.relocations.push(Relocation {
            offset,
            symbol: symbol.into(),
            kind,
            addend,
        });
        match kind {
            RelocationKind::Pc32 => self.push_u32_le(0),
            RelocationKind::Abs64 => self.push_u64_le(0),
        }
    }
}
