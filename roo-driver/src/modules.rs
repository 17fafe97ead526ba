//! Importing a `.roomod` descriptor into a live `ParseResult` (the original's `ImportModule`),
//! and exporting one back out for a `#[Module(...)]` compilation. `roo_elf::module` only
//! (de)serializes the bytes; wiring a parsed `ModuleInfo` into prototype `CodeThing`s and
//! aggregate `TypeDef`s the rest of the compiler can resolve calls and member accesses against is
//! new, driver-owned logic.

use roo_elf::module::{CodeThingPayload, ModuleInfo};
use roo_ir::{ArraySize, CodeThing, MemberDef, ParseResult, TypeDef, TypeRef, VariableDef};

/// Register every type and code-thing a `.roomod` describes as a prototype, the same shape a
/// forward declaration takes: an aggregate `TypeDef` with its members and resolved size already
/// known, and a `CodeThing` with `attribs.is_prototype = true`, `ast_root: None`, ready for
/// `resolve_declared_types`/`TypeChecker` to resolve calls and member accesses against.
pub fn import_module_info(parse: &mut ParseResult, info: &ModuleInfo) {
    for ty in &info.types {
        if parse.find_type(&ty.name).is_some() {
            continue;
        }
        let mut def = TypeDef::new_aggregate(ty.name.clone());
        def.size = Some(ty.size);
        def.members = ty.members.iter().map(member_def_of_record).collect();
        parse.types.push(def);
    }

    for thing in &info.code_things {
        let mut code_thing = match &thing.payload {
            CodeThingPayload::Function { name } => CodeThing::new_function(name.clone()),
            CodeThingPayload::Operator { token_id } => match token_of_record(*token_id) {
                Some(token) => CodeThing::new_operator(token),
                None => continue, // unknown to this build of the compiler; skip rather than raise
            },
        };
        code_thing.attribs.is_prototype = true;
        code_thing.params = thing.params.iter().map(variable_def_of_record).collect();
        parse.code_things.push(code_thing);
    }
}

fn member_def_of_record(record: &roo_elf::module::MemberRecord) -> MemberDef {
    MemberDef::new(record.name.clone(), type_ref_of_record(record))
}

fn variable_def_of_record(record: &roo_elf::module::MemberRecord) -> VariableDef {
    VariableDef::new(record.name.clone(), type_ref_of_record(record), None)
}

fn type_ref_of_record(record: &roo_elf::module::MemberRecord) -> TypeRef {
    let mut ty = TypeRef::new(record.type_name.clone());
    ty.is_mutable = record.is_mutable;
    ty.is_reference = record.is_reference;
    ty.is_reference_mutable = record.is_reference_mutable;
    if record.array_size > 0 {
        ty.array = Some(ArraySize::Resolved(record.array_size));
    }
    ty
}

/// Mirrors `roo_elf::module::token_id_of`, which is private to that crate; only the handful of
/// overloadable tokens a module can actually export ever show up here.
fn token_of_record(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("+"),
        1 => Some("-"),
        2 => Some("*"),
        3 => Some("/"),
        4 => Some("++"),
        5 => Some("--"),
        6 => Some("["),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roo_elf::module::{MemberRecord, TypeRecord};

    #[test]
    fn imported_aggregate_keeps_its_already_known_size() {
        let info = ModuleInfo {
            types: vec![TypeRecord {
                name: "Point".to_string(),
                members: vec![MemberRecord {
                    name: "x".to_string(),
                    type_name: "int".to_string(),
                    is_mutable: true,
                    is_reference: false,
                    is_reference_mutable: false,
                    array_size: 0,
                }],
                size: 8,
            }],
            code_things: vec![],
        };

        let mut parse = ParseResult::new();
        import_module_info(&mut parse, &info);

        let id = parse.find_type("Point").expect("type imported");
        assert_eq!(parse.types[id].size, Some(8));
        assert_eq!(parse.types[id].members[0].name, "x");
    }

    #[test]
    fn imported_function_is_a_prototype_with_no_body() {
        let info = ModuleInfo {
            types: vec![],
            code_things: vec![roo_elf::module::CodeThingRecord {
                payload: CodeThingPayload::Function { name: "area".to_string() },
                params: vec![MemberRecord {
                    name: "p".to_string(),
                    type_name: "Point".to_string(),
                    is_mutable: false,
                    is_reference: true,
                    is_reference_mutable: false,
                    array_size: 0,
                }],
            }],
        };

        let mut parse = ParseResult::new();
        import_module_info(&mut parse, &info);

        let ids = parse.find_code_thing_by_name("area");
        assert_eq!(ids.len(), 1);
        let thing = &parse.code_things[ids[0]];
        assert!(thing.attribs.is_prototype);
        assert!(thing.ast_root.is_none());
        assert!(thing.params[0].ty.is_reference);
    }
}
