//! Linking externally-supplied relocatables (§4.7's "ingesting external relocatables", §6's
//! `--link`): `roo_isa::generate_elf_file`'s own doc comment leaves this step to its caller.
//!
//! `generate_elf_file` already runs `ElfFile::resolve_undefined_symbols` once, internally, before
//! any externally-linked object has been appended — so that first pass will genuinely (and
//! correctly, given what it can see at that point) report a `#[Link(...)]`-satisfied symbol as
//! unresolved. We give it a scratch `ErrorState` to absorb that premature pass into, append every
//! ingested object's functions and symbols, then run `resolve_undefined_symbols` a second time
//! against the real error accumulator, which is authoritative: anything still dangling after
//! linking is genuinely missing.

use roo_diagnostics::{ErrorKind, ErrorState};
use roo_elf::writer::ElfFile;
use std::path::Path;

/// Read and ingest every path in `paths`, appending their functions/symbols to `file`, then
/// re-resolve undefined symbols against `errors`.
pub fn link_external_objects(file: &mut ElfFile, paths: &[String], errors: &mut ErrorState) {
    for path in paths {
        let bytes = match std::fs::read(Path::new(path)) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("couldn't read linked object '{path}': {e}");
                errors.raise(roo_diagnostics::Location::unknown(), ErrorKind::WeirdLinkedObject(path.clone()));
                continue;
            }
        };
        ingest_into(file, &bytes, path, errors);
    }

    file.resolve_undefined_symbols(errors);
}

/// Ingests one relocatable's bytes, appending its functions/symbols to `file`. Split out from
/// [`link_external_objects`] so it can be exercised directly on in-memory bytes.
fn ingest_into(file: &mut ElfFile, bytes: &[u8], name: &str, errors: &mut ErrorState) {
    let Some(object) = roo_elf::ingest_relocatable(bytes, name, errors) else {
        return;
    };
    for symbol in roo_elf::symbols_for(&object) {
        file.symbols.push(symbol);
    }
    for function in object.functions {
        file.text_things.push(function.thing);
    }
}

/// Discard every `UnresolvedSymbol` diagnostic the internal pass inside `generate_elf_file` raised
/// before external linking had a chance to run, folding everything else into `errors` untouched.
pub fn absorb_non_linking_diagnostics(errors: &mut ErrorState, scratch: &ErrorState) {
    for diagnostic in scratch.diagnostics() {
        if matches!(diagnostic.kind, ErrorKind::UnresolvedSymbol(_)) {
            continue;
        }
        errors.raise(diagnostic.location, diagnostic.kind.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roo_elf::symbol::{Binding, Symbol, SymbolType};
    use roo_elf::writer::OutputKind;
    use roo_elf::ElfThing;

    #[test]
    fn absorb_drops_unresolved_symbol_but_keeps_everything_else() {
        let mut scratch = ErrorState::new();
        scratch.raise(roo_diagnostics::Location::unknown(), ErrorKind::UnresolvedSymbol("helper".into()));
        scratch.raise(roo_diagnostics::Location::unknown(), ErrorKind::NoEntryFunction);

        let mut real = ErrorState::new();
        absorb_non_linking_diagnostics(&mut real, &scratch);

        assert_eq!(real.diagnostics().len(), 1);
        assert!(matches!(real.diagnostics()[0].kind, ErrorKind::NoEntryFunction));
    }

    #[test]
    fn linking_a_defining_object_clears_an_undefined_placeholder() {
        let mut file = ElfFile::new(OutputKind::Executable);
        file.symbols.push(Symbol::undefined("helper"));

        let mut external = ElfFile::new(OutputKind::Relocatable);
        let mut thing = ElfThing::new("helper");
        thing.push_u8(0xc3);
        external.symbols.push(Symbol::defined("helper", 0, 0, Binding::Global, SymbolType::Function, 0));
        external.text_things.push(thing);
        let mut write_errors = ErrorState::new();
        let bytes = external.write(&mut write_errors);
        assert!(!write_errors.has_errored());

        let mut errors = ErrorState::new();
        ingest_into(&mut file, &bytes, "helper.o", &mut errors);
        file.resolve_undefined_symbols(&mut errors);
        assert!(!errors.has_errored());
        assert!(file.symbols.iter().all(|s| s.name != "helper" || !s.is_undefined()));
    }
}
