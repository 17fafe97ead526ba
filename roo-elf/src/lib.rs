//! ELF64 emission and ingestion for the compiler backend (§4.7/§4.8): a hand-rolled writer, a
//! narrow reader for relinking previously-compiled objects, and the `.roomod` module descriptor
//! format. Deliberately ISA-agnostic — nothing here knows what a register is; that's `roo-isa`'s
//! job, layered on top of the `ElfThing`/`Relocation` data model defined here.

pub mod module;
pub mod reader;
pub mod section;
pub mod strtab;
pub mod symbol;
pub mod thing;
pub mod writer;

pub use module::{parse_module, CodeThingPayload, CodeThingRecord, MemberRecord, ModuleInfo, TypeRecord};
pub use reader::{ingest_relocatable, symbols_for, IngestedFunction, IngestedObject};
pub use strtab::StringTable;
pub use symbol::{Binding, Symbol, SymbolType};
pub use thing::{ElfThing, Relocation, RelocationKind};
pub use writer::{ElfFile, OutputKind};
