//! The x86-64 backend (§4.5, §4.6): register definitions and ABI parameters, the instruction
//! encoder, and AIR-to-`ElfFile` code generation. The only crate in the workspace that knows what
//! a register is — everything upstream (`roo-air`, `roo-elf`) stays target-agnostic.

pub mod codegen;
pub mod encoder;
pub mod registers;

pub use codegen::{generate_bootstrap, generate_code_thing, generate_elf_file};
pub use registers::{x86_64_abi, Reg, CALLER_SAVED, NUM_REGISTERS};
