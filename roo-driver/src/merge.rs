//! Folding every file's independent `roo_syntax::parse_source` output into one compilation-unit
//! `ParseResult` (§6's directory-wide "every `.roo` file in DIR"). `roo-syntax` only ever parses
//! one file at a time, so this is new: the driver's own multi-file merge.
//!
//! `TypeId`/`CodeThingId` don't need renumbering across files — nothing computed at parse time
//! refers to one by index, only by name, and those get resolved fresh against the merged
//! `types`/`code_things` during IR completion. `AstId`/`ScopeId` are already local to each
//! `CodeThing`'s own arenas, so concatenating `code_things` carries no AST/scope id across file
//! boundaries at all. The one real hazard is `StringId`: the parser assigns one to every string
//! literal starting from zero, independently per file, so every `AstKind::StringLit` embedded in
//! a file's own code-things needs its id shifted by the running total of strings already merged
//! in before that file's own `strings` get appended.
use roo_ir::{AstKind, ParseResult, Primitive, TypeDef};
use roo_entity::EntityRef;

/// Merge every file's `ParseResult` into one, in the order given.
pub fn merge_parsed(parsed: Vec<(std::path::PathBuf, ParseResult)>) -> ParseResult {
    let mut merged = ParseResult::new();

    for (path, mut file_result) in parsed {
        let string_offset = merged.strings.len();
        rewrite_string_lits(&mut file_result, string_offset);

        for s in file_result.strings.values() {
            merged.strings.push(s.clone());
        }
        for t in file_result.types.values() {
            merged.types.push(t.clone());
        }
        for c in file_result.code_things.values() {
            merged.code_things.push(c.clone());
        }

        merged.files_to_link.append(&mut file_result.files_to_link);
        merged.dependencies.append(&mut file_result.dependencies);
        merged.errors.absorb(&file_result.errors);

        merged.is_module |= file_result.is_module;
        if let Some(name) = file_result.name {
            match &merged.name {
                Some(existing) if existing != &name => {
                    log::warn!(
                        "{} declares program name '{name}', but '{existing}' already won; keeping the first one seen",
                        path.display()
                    );
                }
                Some(_) => {}
                None => merged.name = Some(name),
            }
        }
        if let Some(arch) = file_result.target_arch {
            merged.target_arch.get_or_insert(arch);
        }
    }

    merged
}

fn rewrite_string_lits(file_result: &mut ParseResult, offset: usize) {
    if offset == 0 {
        return;
    }
    for thing in file_result.code_things.values_mut() {
        for node in thing.ast.values_mut() {
            if let AstKind::StringLit(id) = &mut node.kind {
                *id = roo_ir::StringId::new(id.index() + offset);
            }
        }
    }
}

/// The four primitives every compilation gets for free even if no source file declares them via
/// `#[DefinePrimitive(...)]` (§9's "global constructors to register passes" note).
pub fn ensure_default_primitives(parse: &mut ParseResult) {
    let present: std::collections::HashSet<String> = parse.types.values().map(|t| t.name.clone()).collect();
    let defaults: [(&str, u32, Primitive); 4] = [
        ("int", 4, Primitive::SignedInt),
        ("uint", 4, Primitive::UnsignedInt),
        ("float", 4, Primitive::Float),
        ("bool", 1, Primitive::Bool),
    ];
    for (name, size, kind) in defaults {
        if !present.contains(name) {
            parse.types.push(TypeDef::new_primitive(name, size, kind));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roo_ir::{AstNode, CodeThing, StringConstant};
    use std::path::PathBuf;

    fn file_with_string(s: &str) -> ParseResult {
        let mut result = ParseResult::new();
        let id = result.strings.push(StringConstant::new(s.as_bytes().to_vec()));
        let mut thing = CodeThing::new_function("f");
        thing.ast_root = Some(thing.ast.push(AstNode::new(AstKind::StringLit(id))));
        result.code_things.push(thing);
        result
    }

    #[test]
    fn second_files_string_literals_are_offset_past_the_firsts() {
        let first = file_with_string("hello");
        let second = file_with_string("world");
        let merged = merge_parsed(vec![(PathBuf::from("a.roo"), first), (PathBuf::from("b.roo"), second)]);

        assert_eq!(merged.strings.len(), 2);
        let second_thing = merged.code_things.values().nth(1).unwrap();
        let AstKind::StringLit(id) = &second_thing.ast[second_thing.ast_root.unwrap()].kind else {
            panic!("expected a string literal node");
        };
        assert_eq!(id.index(), 1);
        assert_eq!(merged.strings.values().nth(1).unwrap().bytes, b"world");
    }

    #[test]
    fn ensure_default_primitives_skips_a_name_already_declared() {
        let mut parse = ParseResult::new();
        parse.types.push(TypeDef::new_primitive("int", 8, Primitive::SignedInt));
        ensure_default_primitives(&mut parse);

        let ints: Vec<_> = parse.types.values().filter(|t| t.name == "int").collect();
        assert_eq!(ints.len(), 1);
        assert_eq!(ints[0].size, Some(8));
        assert!(parse.types.values().any(|t| t.name == "bool"));
    }
}
