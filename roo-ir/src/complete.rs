//! IR completion (§4.2): a single pass run once, after every file in a compilation is parsed and
//! semantically checked, that turns a `ParseResult` from "every name is just a string" into
//! "every name is a resolved id and every local knows exactly where it lives".
//!
//! Unlike the four semantic passes in `passes/`, this isn't a per-code-thing AST walk: most of its
//! steps only need `ParseResult::types`/`CodeThing::params`/`CodeThing::scopes`, and the ordering
//! between steps matters (sizes can't be computed until every member's `TypeRef` is resolved,
//! member sub-variables can't be cloned until sizes are known, and stack offsets can't be assigned
//! until every local has picked register-or-stack storage).

use crate::ast::{AstKind, Literal};
use crate::code_thing::{CodeThing, CodeThingKind};
use crate::parse_result::ParseResult;
use crate::types::{ArraySize, TypeDef, TypeId, TypeRef};
use crate::vars::{Storage, VariableDef};
use roo_diagnostics::{ErrorKind, ErrorState, Location};
use roo_entity::PrimaryMap;

/// Bytes in a general-purpose x86-64 register; a local bigger than this lives on the stack
/// instead of in one (§4.2 step f).
pub const GENERAL_REGISTER_SIZE: u32 = 8;

pub fn complete_ir(parse: &mut ParseResult) {
    mangle_names(parse);
    resolve_declared_types(parse);
    resolve_array_sizes(parse);
    calculate_type_sizes(parse);
    instantiate_member_subvariables(parse);
    assign_storage(parse);
}

/// (a) `functions -> _R_<name>`, `operators -> _RO_<token-word>_<paramTypeNames...>`.
fn mangle_names(parse: &mut ParseResult) {
    for thing in parse.code_things.values_mut() {
        thing.mangled_name = Some(mangle_one(thing));
    }
}

fn mangle_one(thing: &mut CodeThing) -> String {
    match &thing.kind {
        CodeThingKind::Function { name } => format!("_R_{name}"),
        CodeThingKind::Operator { token } => {
            let word = match token.as_str() {
                "+" => "plus",
                "-" => "minus",
                "*" => "multiply",
                "/" => "divide",
                "++" => "increment",
                "--" => "decrement",
                "[" => "index",
                other => {
                    thing.error_state.raise(
                        Location::unknown(),
                        ErrorKind::Ice {
                            where_: "mangle_one".to_string(),
                            detail: format!("unhandled operator token '{other}'"),
                        },
                    );
                    "unknown"
                }
            };
            let mut mangling = format!("_RO_{word}");
            for param in &thing.params {
                mangling.push('_');
                mangling.push_str(&param.ty.name);
            }
            mangling
        }
    }
}

/// (b) resolve every `TypeRef` on returns, parameters, and locals by name lookup. Member
/// `TypeRef`s are resolved too, grouped separately since they live on `ParseResult::types` rather
/// than on a `CodeThing`.
fn resolve_declared_types(parse: &mut ParseResult) {
    let types = parse.types.clone();

    for thing in parse.code_things.values_mut() {
        if let Some(ret) = &mut thing.return_type {
            resolve_one(ret, &types, &mut thing.error_state);
        }
        for param in &mut thing.params {
            resolve_one(&mut param.ty, &types, &mut thing.error_state);
        }
        for scope in thing.scopes.values_mut() {
            for local in &mut scope.locals {
                resolve_one(&mut local.ty, &types, &mut thing.error_state);
            }
        }
    }

    for ty in parse.types.values_mut() {
        let mut errors = std::mem::take(&mut ty.error_state);
        for member in &mut ty.members {
            resolve_one(&mut member.ty, &types, &mut errors);
        }
        ty.error_state = errors;
    }
}

fn resolve_one(r: &mut TypeRef, types: &PrimaryMap<TypeId, TypeDef>, errors: &mut ErrorState) {
    if r.resolved.is_some() {
        return;
    }
    if !r.resolve_name(types) {
        errors.raise(Location::unknown(), ErrorKind::UndefinedType(r.name.clone()));
    }
}

/// (c) an array-size expression must be a constant unsigned-integer literal. Only params/locals
/// carry an unresolved expression (it's evaluated against the owning code-thing's `Ast`); a
/// member's array size is always written as a literal in the type declaration and is folded by
/// the parser directly into `ArraySize::Resolved`.
fn resolve_array_sizes(parse: &mut ParseResult) {
    for thing in parse.code_things.values_mut() {
        let ast = &thing.ast;
        let mut errors = std::mem::take(&mut thing.error_state);

        let mut resolve = |ty: &mut TypeRef| {
            if let Some(ArraySize::Unresolved(expr)) = ty.array.clone() {
                match ast.get(expr).map(|n| &n.kind) {
                    Some(AstKind::Constant(Literal::UInt(n))) => {
                        ty.array = Some(ArraySize::Resolved(*n));
                    }
                    Some(AstKind::Constant(Literal::Int(n))) if *n >= 0 => {
                        ty.array = Some(ArraySize::Resolved(*n as u32));
                    }
                    _ => {
                        errors.raise(Location::unknown(), ErrorKind::InvalidArraySize);
                    }
                }
            }
        };

        if let Some(ret) = &mut thing.return_type {
            resolve(ret);
        }
        for param in &mut thing.params {
            resolve(&mut param.ty);
        }
        for scope in thing.scopes.values_mut() {
            for local in &mut scope.locals {
                resolve(&mut local.ty);
            }
        }

        thing.error_state = errors;
    }
}

/// (d) recursively compute every `TypeDef`'s byte size; members are laid out in declaration order
/// without padding, each member's offset is the running size before it.
fn calculate_type_sizes(parse: &mut ParseResult) {
    for id in parse.types.keys() {
        calculate_size(&mut parse.types, id);
    }
}

fn calculate_size(types: &mut PrimaryMap<TypeId, TypeDef>, id: TypeId) -> u32 {
    if let Some(size) = types[id].size {
        return size;
    }

    let member_type_ids: Vec<Option<TypeId>> =
        types[id].members.iter().map(|m| m.ty.resolved).collect();

    let mut running = 0u32;
    let mut offsets = Vec::with_capacity(member_type_ids.len());
    for member_ty in member_type_ids {
        offsets.push(running);
        running += match member_ty {
            Some(mid) => calculate_size(types, mid),
            None => 0,
        };
    }

    for (member, offset) in types[id].members.iter_mut().zip(offsets) {
        member.offset = Some(offset);
    }
    types[id].size = Some(running);
    running
}

/// (e) clone one sub-variable per member of a variable's resolved `TypeDef`, so a member access
/// doesn't need to re-derive its storage and offset from the type every time.
fn instantiate_member_subvariables(parse: &mut ParseResult) {
    let types = parse.types.clone();

    for thing in parse.code_things.values_mut() {
        for param in &mut thing.params {
            populate_members(param, &types);
        }
        for scope in thing.scopes.values_mut() {
            for local in &mut scope.locals {
                populate_members(local, &types);
            }
        }
    }
}

fn populate_members(var: &mut VariableDef, types: &PrimaryMap<TypeId, TypeDef>) {
    let Some(type_id) = var.ty.resolved else { return };
    let Some(ty) = types.get(type_id) else { return };

    var.members = ty
        .members
        .iter()
        .map(|m| {
            let mut sub = VariableDef::new(m.name.clone(), m.ty.clone(), None);
            sub.storage = Storage::Unresolved;
            sub
        })
        .collect();
}

/// (f)/(g): locals bigger than a register go on the stack, everything else lives in a register;
/// stack locals then get a negative offset from the frame base, counting up toward zero, assigned
/// in declaration order so their sum exactly fills the code-thing's frame.
fn assign_storage(parse: &mut ParseResult) {
    let types = parse.types.clone();

    for thing in parse.code_things.values_mut() {
        let mut needed = 0u32;
        for scope in thing.scopes.values_mut() {
            for local in &mut scope.locals {
                let size = local
                    .ty
                    .resolved
                    .and_then(|id| types.get(id))
                    .and_then(|t| t.size)
                    .unwrap_or(0);
                if size > GENERAL_REGISTER_SIZE {
                    local.storage = Storage::Stack(0);
                    needed += size;
                } else {
                    local.storage = Storage::Register;
                }
            }
        }
        thing.stack_frame_size = needed;

        let mut running = -(needed as i64);
        for scope in thing.scopes.values_mut() {
            for local in &mut scope.locals {
                if let Storage::Stack(_) = local.storage {
                    let size = local
                        .ty
                        .resolved
                        .and_then(|id| types.get(id))
                        .and_then(|t| t.size)
                        .unwrap_or(0);
                    local.storage = Storage::Stack(running as i32);
                    running += size as i64;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Primitive;
    use crate::vars::ScopeDef;

    #[test]
    fn function_name_mangles_to_r_prefix() {
        let mut parse = ParseResult::new();
        let id = parse.code_things.push(CodeThing::new_function("main"));
        complete_ir(&mut parse);
        assert_eq!(parse.code_things[id].mangled_name.as_deref(), Some("_R_main"));
    }

    #[test]
    fn operator_name_mangles_with_param_types() {
        let mut parse = ParseResult::new();
        parse.types.push(TypeDef::new_primitive("int", 4, Primitive::SignedInt));
        let mut thing = CodeThing::new_operator("+");
        thing
            .params
            .push(VariableDef::new("a", TypeRef::new("int"), None));
        thing
            .params
            .push(VariableDef::new("b", TypeRef::new("int"), None));
        let id = parse.code_things.push(thing);

        complete_ir(&mut parse);
        assert_eq!(
            parse.code_things[id].mangled_name.as_deref(),
            Some("_RO_plus_int_int")
        );
    }

    #[test]
    fn large_local_goes_on_stack_small_local_in_register() {
        let mut parse = ParseResult::new();
        parse.types.push(TypeDef::new_primitive("int", 4, Primitive::SignedInt));
        let big = {
            let mut t = TypeDef::new_aggregate("Big");
            t.members.push(crate::vars::MemberDef::new("a", TypeRef::new("int")));
            t.members.push(crate::vars::MemberDef::new("b", TypeRef::new("int")));
            t.members.push(crate::vars::MemberDef::new("c", TypeRef::new("int")));
            t
        };
        parse.types.push(big);

        let mut thing = CodeThing::new_function("f");
        let scope = thing.scopes.push(ScopeDef::new(None));
        thing.scopes[scope]
            .locals
            .push(VariableDef::new("small", TypeRef::new("int"), None));
        thing.scopes[scope]
            .locals
            .push(VariableDef::new("big", TypeRef::new("Big"), None));
        let id = parse.code_things.push(thing);

        complete_ir(&mut parse);

        let locals = &parse.code_things[id].scopes[scope].locals;
        assert_eq!(locals[0].storage, Storage::Register);
        assert!(matches!(locals[1].storage, Storage::Stack(_)));
        assert_eq!(parse.code_things[id].stack_frame_size, 12);
        assert_eq!(locals[1].members.len(), 3);
    }

    #[test]
    fn undefined_return_type_raises_error() {
        let mut parse = ParseResult::new();
        let mut thing = CodeThing::new_function("f");
        thing.return_type = Some(TypeRef::new("NoSuchType"));
        let id = parse.code_things.push(thing);

        complete_ir(&mut parse);
        assert!(parse.code_things[id].error_state.has_errored());
    }
}
