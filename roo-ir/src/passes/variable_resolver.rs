//! `VariableResolver` (§4.1): binds `Variable` and `MemberAccess` nodes to their definitions.
//!
//! A `Variable` node searches the innermost scope outward, then the code-thing's parameters.
//! A `MemberAccess` node resolves its parent first (recursively — the parent may itself be a
//! `MemberAccess`, as in `a.b.c`), derives the parent's named type, looks that type up in
//! `ParseResult::types` by name (IR completion hasn't resolved `TypeRef`s yet, so this pass works
//! off the type *name* rather than a resolved `TypeId`), then looks up the child name among that
//! type's members.

use crate::ast::{Ast, AstId, AstKind, VarBinding};
use crate::code_thing::CodeThingId;
use crate::parse_result::ParseResult;
use crate::types::{TypeDef, TypeId};
use crate::vars::{ScopeDef, ScopeId, VariableDef};
use roo_diagnostics::{ErrorKind, ErrorState, Location};
use roo_entity::PrimaryMap;

pub struct VariableResolver;

impl VariableResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, parse: &mut ParseResult, code_thing_id: CodeThingId) {
        // Snapshot everything the lookups need to read so we can mutate `ast` freely while
        // consulting scopes/params/types without fighting the borrow checker over a single
        // `ParseResult`.
        let scopes = parse.code_things[code_thing_id].scopes.clone();
        let params = parse.code_things[code_thing_id].params.clone();
        let types = parse.types.clone();

        let root = parse.code_things[code_thing_id].ast_root;
        let Some(root) = root else { return };

        let code_thing = &mut parse.code_things[code_thing_id];
        let mut errors = std::mem::take(&mut code_thing.error_state);
        Self::walk(&mut code_thing.ast, root, &scopes, &params, &types, &mut errors);
        code_thing.error_state = errors;
    }

    fn walk(
        ast: &mut Ast,
        id: AstId,
        scopes: &PrimaryMap<ScopeId, ScopeDef>,
        params: &[VariableDef],
        types: &PrimaryMap<TypeId, TypeDef>,
        errors: &mut ErrorState,
    ) {
        Self::resolve_node(ast, id, scopes, params, types, errors);

        // `MemberAccess`'s parent was already walked by `resolve_node` (it must resolve before
        // the child name can be looked up), so skip it here to avoid a double visit.
        if !matches!(ast[id].kind, AstKind::MemberAccess { .. }) {
            for child in ast[id].children() {
                Self::walk(ast, child, scopes, params, types, errors);
            }
        }

        if let Some(next) = ast[id].next {
            Self::walk(ast, next, scopes, params, types, errors);
        }
    }

    fn resolve_node(
        ast: &mut Ast,
        id: AstId,
        scopes: &PrimaryMap<ScopeId, ScopeDef>,
        params: &[VariableDef],
        types: &PrimaryMap<TypeId, TypeDef>,
        errors: &mut ErrorState,
    ) {
        match ast[id].kind.clone() {
            AstKind::Variable { name, .. } => {
                let scope = ast[id].scope;
                let binding = Self::lookup_variable(scopes, scope, params, &name);
                if let AstKind::Variable { resolved, .. } = &mut ast[id].kind {
                    *resolved = binding;
                }
                if binding.is_none() {
                    errors.raise(Location::unknown(), ErrorKind::UndefinedVariable(name));
                }
            }
            AstKind::MemberAccess {
                parent, child_name, ..
            } => {
                Self::walk(ast, parent, scopes, params, types, errors);
                let parent_type_name = Self::named_type_of(ast, parent, scopes, params, types);
                let mut resolved = None;
                if let Some(type_name) = &parent_type_name {
                    if let Some((_, ty)) = types.iter().find(|(_, t)| &t.name == type_name) {
                        resolved = ty.members.iter().position(|m| m.name == child_name);
                    }
                }
                if resolved.is_none() {
                    errors.raise(
                        Location::unknown(),
                        ErrorKind::MemberNotFound {
                            ty: parent_type_name.unwrap_or_else(|| "<unknown>".to_string()),
                            member: child_name,
                        },
                    );
                }
                if let AstKind::MemberAccess { resolved: r, .. } = &mut ast[id].kind {
                    *r = resolved;
                }
            }
            _ => {}
        }
    }

    /// Walk the scope chain outward from `scope`, then fall back to parameters (§4.1).
    fn lookup_variable(
        scopes: &PrimaryMap<ScopeId, ScopeDef>,
        scope: Option<ScopeId>,
        params: &[VariableDef],
        name: &str,
    ) -> Option<VarBinding> {
        let mut current = scope;
        while let Some(scope_id) = current {
            let scope_def = &scopes[scope_id];
            if let Some(idx) = scope_def.find_local(name) {
                return Some(VarBinding::Local(scope_id, idx));
            }
            current = scope_def.parent;
        }
        params
            .iter()
            .position(|p| p.name == name)
            .map(VarBinding::Param)
    }

    /// The name of the type bound to a resolved `Variable`/`MemberAccess` node, needed to chase
    /// `a.b.c` member chains one level at a time.
    fn named_type_of(
        ast: &Ast,
        id: AstId,
        scopes: &PrimaryMap<ScopeId, ScopeDef>,
        params: &[VariableDef],
        types: &PrimaryMap<TypeId, TypeDef>,
    ) -> Option<String> {
        match &ast[id].kind {
            AstKind::Variable {
                resolved: Some(binding),
                ..
            } => match binding {
                VarBinding::Param(idx) => params.get(*idx).map(|p| p.ty.name.clone()),
                VarBinding::Local(scope_id, idx) => {
                    scopes[*scope_id].locals.get(*idx).map(|l| l.ty.name.clone())
                }
            },
            AstKind::MemberAccess {
                parent,
                resolved: Some(member_idx),
                ..
            } => {
                let parent_type = Self::named_type_of(ast, *parent, scopes, params, types)?;
                let ty = types.iter().find(|(_, t)| t.name == parent_type)?.1;
                ty.members.get(*member_idx).map(|m| m.ty.name.clone())
            }
            _ => None,
        }
    }
}

impl Default for VariableResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::code_thing::CodeThing;
    use crate::types::TypeRef;

    #[test]
    fn resolves_parameter_by_name() {
        let mut thing = CodeThing::new_function("f");
        thing
            .params
            .push(VariableDef::new("x", TypeRef::new("int"), None));
        let var = thing.ast.push(AstNode::new(AstKind::Variable {
            name: "x".into(),
            resolved: None,
        }));
        thing.ast_root = Some(var);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        VariableResolver::new().run(&mut parse, id);

        assert!(!parse.code_things[id].error_state.has_errored());
        assert!(matches!(
            parse.code_things[id].ast[var].kind,
            AstKind::Variable {
                resolved: Some(VarBinding::Param(0)),
                ..
            }
        ));
    }

    #[test]
    fn undefined_variable_raises_error() {
        let mut thing = CodeThing::new_function("f");
        let var = thing.ast.push(AstNode::new(AstKind::Variable {
            name: "missing".into(),
            resolved: None,
        }));
        thing.ast_root = Some(var);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        VariableResolver::new().run(&mut parse, id);

        assert!(parse.code_things[id].error_state.has_errored());
    }

    #[test]
    fn resolves_local_through_scope_chain() {
        let mut thing = CodeThing::new_function("f");
        let outer = thing.scopes.push(ScopeDef::new(None));
        let inner = thing.scopes.push(ScopeDef::new(Some(outer)));
        thing.scopes[outer]
            .locals
            .push(VariableDef::new("y", TypeRef::new("int"), None));

        let var = thing.ast.push(AstNode::new(AstKind::Variable {
            name: "y".into(),
            resolved: None,
        }));
        thing.ast[var].scope = Some(inner);
        thing.ast_root = Some(var);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        VariableResolver::new().run(&mut parse, id);

        assert!(matches!(
            parse.code_things[id].ast[var].kind,
            AstKind::Variable {
                resolved: Some(VarBinding::Local(s, 0)),
                ..
            } if s == outer
        ));
    }
}
