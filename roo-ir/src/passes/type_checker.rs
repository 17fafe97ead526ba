//! `TypeChecker` (§4.1): a children-first pass that computes every node's `result_type` and binds
//! `Call`/`BinaryOp` nodes to the overload they resolve to.
//!
//! Overload resolution (for both `Call` and the arithmetic `BinaryOp`s, which lower to a call to a
//! user-defined operator overload — §4.3) matches on name/token, parameter arity, and
//! `TypeRef::compatible_with(.., care_about_mutability = false)` for each argument in order.

use crate::ast::{Ast, AstId, AstKind, BinaryOp, Literal, VarBinding};
use crate::code_thing::{CodeThingId, CodeThingKind};
use crate::parse_result::ParseResult;
use crate::types::{TypeDef, TypeId, TypeRef};
use crate::vars::{ScopeDef, ScopeId, VariableDef};
use roo_diagnostics::{ErrorKind, ErrorState, Location};
use roo_entity::PrimaryMap;

type OverloadPool = Vec<(CodeThingId, CodeThingKind, Vec<TypeRef>, Option<TypeRef>)>;

pub struct TypeChecker;

impl TypeChecker {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, parse: &mut ParseResult, code_thing_id: CodeThingId) {
        let root = parse.code_things[code_thing_id].ast_root;
        let Some(root) = root else { return };

        let types = parse.types.clone();
        let scopes = parse.code_things[code_thing_id].scopes.clone();
        let params = parse.code_things[code_thing_id].params.clone();
        let expected_return = parse.code_things[code_thing_id].return_type.clone();

        let pool: OverloadPool = parse
            .code_things
            .iter()
            .map(|(id, t)| {
                (
                    id,
                    t.kind.clone(),
                    t.params.iter().map(|p| p.ty.clone()).collect(),
                    t.return_type.clone(),
                )
            })
            .collect();

        let code_thing = &mut parse.code_things[code_thing_id];
        let mut errors = std::mem::take(&mut code_thing.error_state);
        Self::walk(
            &mut code_thing.ast,
            root,
            &scopes,
            &params,
            &types,
            &pool,
            &expected_return,
            &mut errors,
        );
        code_thing.error_state = errors;
    }

    /// Children-first: children decide their own `result_type` before the parent looks at them.
    fn walk(
        ast: &mut Ast,
        id: AstId,
        scopes: &PrimaryMap<ScopeId, ScopeDef>,
        params: &[VariableDef],
        types: &PrimaryMap<TypeId, TypeDef>,
        pool: &OverloadPool,
        expected_return: &Option<TypeRef>,
        errors: &mut ErrorState,
    ) {
        for child in ast[id].children() {
            Self::walk(ast, child, scopes, params, types, pool, expected_return, errors);
        }

        Self::check_node(ast, id, scopes, params, types, pool, expected_return, errors);

        if let Some(next) = ast[id].next {
            Self::walk(ast, next, scopes, params, types, pool, expected_return, errors);
        }
    }

    fn check_node(
        ast: &mut Ast,
        id: AstId,
        scopes: &PrimaryMap<ScopeId, ScopeDef>,
        params: &[VariableDef],
        types: &PrimaryMap<TypeId, TypeDef>,
        pool: &OverloadPool,
        expected_return: &Option<TypeRef>,
        errors: &mut ErrorState,
    ) {
        match ast[id].kind.clone() {
            AstKind::Constant(lit) => {
                ast[id].result_type = Some(Self::primitive_type_ref(types, lit));
            }
            AstKind::StringLit(_) => {
                ast[id].result_type = Some(named_type_ref(types, "string"));
            }
            AstKind::Variable { resolved, .. } => {
                ast[id].result_type = resolved.map(|b| match b {
                    VarBinding::Param(idx) => params[idx].ty.clone(),
                    VarBinding::Local(scope_id, idx) => scopes[scope_id].locals[idx].ty.clone(),
                });
            }
            AstKind::MemberAccess { parent, resolved, .. } => {
                ast[id].result_type = resolved.and_then(|member_idx| {
                    let parent_ty = ast[parent].result_type.as_ref()?;
                    let ty = types.iter().find(|(_, t)| t.name == parent_ty.name)?.1;
                    ty.members.get(member_idx).map(|m| m.ty.clone())
                });
            }
            AstKind::BinaryOp {
                op, left, right, ..
            } => {
                Self::check_binary_op(ast, id, op, left, right, pool, errors);
            }
            AstKind::Condition { .. } => {
                ast[id].result_type = Some(named_type_ref(types, "bool"));
            }
            AstKind::Call { name, args, .. } => {
                Self::check_call(ast, id, &name, &args, pool, errors);
            }
            AstKind::VariableAssignment {
                target,
                value,
                ignore_immutability,
            } => {
                Self::check_assignment(ast, target, value, ignore_immutability, errors);
            }
            AstKind::Return(expr) => {
                Self::check_return(ast, expr, expected_return, errors);
            }
            AstKind::Construct {
                type_name, items, ..
            } => {
                Self::check_construct(ast, id, &type_name, &items, types, errors);
            }
            AstKind::Branch { then_branch, .. } => {
                ast[id].result_type = ast[then_branch].result_type.clone();
            }
            AstKind::UnaryOp { operand, .. } => {
                ast[id].result_type = ast[operand].result_type.clone();
            }
            AstKind::ArrayInit { .. }
            | AstKind::While { .. }
            | AstKind::InfiniteLoop { .. }
            | AstKind::Break => {}
        }
    }

    fn primitive_type_ref(types: &PrimaryMap<TypeId, TypeDef>, lit: Literal) -> TypeRef {
        let name = match lit {
            Literal::Int(_) => "int",
            Literal::UInt(_) => "uint",
            Literal::Float(_) => "float",
            Literal::Bool(_) => "bool",
        };
        named_type_ref(types, name)
    }

    fn check_binary_op(
        ast: &mut Ast,
        id: AstId,
        op: BinaryOp,
        left: AstId,
        right: AstId,
        pool: &OverloadPool,
        errors: &mut ErrorState,
    ) {
        let token = match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        let left_ty = ast[left].result_type.clone();
        let right_ty = ast[right].result_type.clone();

        let found = pool.iter().find(|(_, kind, params, _)| {
            matches!(kind, CodeThingKind::Operator { token: t } if t == token)
                && params.len() == 2
                && left_ty
                    .as_ref()
                    .zip(params.first())
                    .is_some_and(|(a, b)| a.compatible_with(b, false))
                && right_ty
                    .as_ref()
                    .zip(params.get(1))
                    .is_some_and(|(a, b)| a.compatible_with(b, false))
        });

        match found {
            Some((callee, _, _, ret)) => {
                if let AstKind::BinaryOp {
                    resolved_operator, ..
                } = &mut ast[id].kind
                {
                    *resolved_operator = Some(*callee);
                }
                ast[id].result_type = ret.clone();
            }
            None => {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::MissingOperator {
                        op: token.to_string(),
                    },
                );
            }
        }
    }

    fn check_call(
        ast: &mut Ast,
        id: AstId,
        name: &str,
        args: &[AstId],
        pool: &OverloadPool,
        errors: &mut ErrorState,
    ) {
        let arg_types: Vec<Option<TypeRef>> = args.iter().map(|a| ast[*a].result_type.clone()).collect();

        let any_named = pool
            .iter()
            .any(|(_, kind, ..)| matches!(kind, CodeThingKind::Function { name: n } if n == name));

        let found = pool.iter().find(|(_, kind, params, _)| {
            matches!(kind, CodeThingKind::Function { name: n } if n == name)
                && params.len() == arg_types.len()
                && params
                    .iter()
                    .zip(arg_types.iter())
                    .all(|(p, a)| a.as_ref().is_some_and(|a| a.compatible_with(p, false)))
        });

        match found {
            Some((callee, _, _, ret)) => {
                if let AstKind::Call { resolved, .. } = &mut ast[id].kind {
                    *resolved = Some(*callee);
                }
                ast[id].result_type = ret.clone();
            }
            None if any_named => {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::IncompatibleType {
                        expected: format!("matching overload of '{name}'"),
                        found: "incompatible arguments".to_string(),
                    },
                );
            }
            None => {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::UndefinedFunction(name.to_string()),
                );
            }
        }
    }

    fn check_assignment(
        ast: &mut Ast,
        target: AstId,
        value: AstId,
        ignore_immutability: bool,
        errors: &mut ErrorState,
    ) {
        if !ignore_immutability {
            let target_mutable = ast[target]
                .result_type
                .as_ref()
                .map(|t| t.is_mutable)
                .unwrap_or(true);
            if !target_mutable {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::AssignmentToImmutable(format!("{target:?}")),
                );
            }
        }

        if let (Some(target_ty), Some(value_ty)) = (
            ast[target].result_type.clone(),
            ast[value].result_type.clone(),
        ) {
            if !value_ty.compatible_with(&target_ty, false) {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::IncompatibleAssign {
                        target_ty: target_ty.name,
                        value_ty: value_ty.name,
                    },
                );
            }
        }
    }

    fn check_return(
        ast: &Ast,
        expr: Option<AstId>,
        expected_return: &Option<TypeRef>,
        errors: &mut ErrorState,
    ) {
        match (expr, expected_return) {
            (None, None) => {}
            (Some(_), None) => {
                errors.raise(Location::unknown(), ErrorKind::ReturnValueNotExpected);
            }
            (None, Some(_)) => {
                errors.raise(Location::unknown(), ErrorKind::WrongReturnArity);
            }
            (Some(expr), Some(expected)) => {
                if let Some(found) = &ast[expr].result_type {
                    if !found.compatible_with(expected, false) {
                        errors.raise(
                            Location::unknown(),
                            ErrorKind::IncompatibleType {
                                expected: expected.name.clone(),
                                found: found.name.clone(),
                            },
                        );
                    }
                } else {
                    errors.raise(
                        Location::unknown(),
                        ErrorKind::MissingTypeInformation("return expression".to_string()),
                    );
                }
            }
        }
    }

    fn check_construct(
        ast: &mut Ast,
        id: AstId,
        type_name: &str,
        items: &[AstId],
        types: &PrimaryMap<TypeId, TypeDef>,
        errors: &mut ErrorState,
    ) {
        let Some((type_id, ty)) = types.iter().find(|(_, t)| t.name == type_name) else {
            errors.raise(
                Location::unknown(),
                ErrorKind::UndefinedType(type_name.to_string()),
            );
            return;
        };

        if ty.members.len() != items.len() {
            errors.raise(
                Location::unknown(),
                ErrorKind::TooFewExpressionsInConstruction(type_name.to_string()),
            );
        }

        for (member, item) in ty.members.iter().zip(items.iter()) {
            if let Some(found) = &ast[*item].result_type {
                if !found.compatible_with(&member.ty, false) {
                    errors.raise(
                        Location::unknown(),
                        ErrorKind::IncompatibleType {
                            expected: member.ty.name.clone(),
                            found: found.name.clone(),
                        },
                    );
                }
            }
        }

        if let AstKind::Construct { resolved_type, .. } = &mut ast[id].kind {
            *resolved_type = Some(type_id);
        }
        ast[id].result_type = Some(named_type_ref(types, type_name));
    }
}

fn named_type_ref(types: &PrimaryMap<TypeId, TypeDef>, name: &str) -> TypeRef {
    let mut r = TypeRef::new(name);
    r.resolve_name(types);
    r
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::code_thing::CodeThing;
    use crate::types::Primitive as P;

    fn base_types() -> PrimaryMap<TypeId, TypeDef> {
        let mut types = PrimaryMap::new();
        types.push(TypeDef::new_primitive("int", 4, P::SignedInt));
        types.push(TypeDef::new_primitive("bool", 1, P::Bool));
        types
    }

    #[test]
    fn literal_gets_primitive_type() {
        let mut parse = ParseResult::new();
        parse.types = base_types();
        let mut thing = CodeThing::new_function("f");
        let lit = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        thing.ast_root = Some(lit);
        let id = parse.code_things.push(thing);

        TypeChecker::new().run(&mut parse, id);
        assert_eq!(
            parse.code_things[id].ast[lit]
                .result_type
                .as_ref()
                .unwrap()
                .name,
            "int"
        );
    }

    #[test]
    fn variable_adopts_parameter_type() {
        let mut parse = ParseResult::new();
        parse.types = base_types();
        let mut thing = CodeThing::new_function("f");
        thing.params.push(VariableDef::new("x", TypeRef::new("int"), None));
        let var = thing.ast.push(AstNode::new(AstKind::Variable {
            name: "x".into(),
            resolved: Some(VarBinding::Param(0)),
        }));
        thing.ast_root = Some(var);
        let id = parse.code_things.push(thing);

        TypeChecker::new().run(&mut parse, id);
        assert_eq!(
            parse.code_things[id].ast[var].result_type.as_ref().unwrap().name,
            "int"
        );
    }

    #[test]
    fn return_without_value_in_void_function_is_fine() {
        let mut parse = ParseResult::new();
        parse.types = base_types();
        let mut thing = CodeThing::new_function("f");
        let ret = thing.ast.push(AstNode::new(AstKind::Return(None)));
        thing.ast_root = Some(ret);
        let id = parse.code_things.push(thing);

        TypeChecker::new().run(&mut parse, id);
        assert!(!parse.code_things[id].error_state.has_errored());
    }

    #[test]
    fn return_value_when_none_expected_errors() {
        let mut parse = ParseResult::new();
        parse.types = base_types();
        let mut thing = CodeThing::new_function("f");
        let lit = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let ret = thing.ast.push(AstNode::new(AstKind::Return(Some(lit))));
        thing.ast_root = Some(ret);
        let id = parse.code_things.push(thing);

        TypeChecker::new().run(&mut parse, id);
        assert!(parse.code_things[id].error_state.has_errored());
    }

    #[test]
    fn undefined_function_call_errors() {
        let mut parse = ParseResult::new();
        parse.types = base_types();
        let mut thing = CodeThing::new_function("f");
        let call = thing.ast.push(AstNode::new(AstKind::Call {
            name: "missing".into(),
            args: vec![],
            resolved: None,
        }));
        thing.ast_root = Some(call);
        let id = parse.code_things.push(thing);

        TypeChecker::new().run(&mut parse, id);
        assert!(parse.code_things[id].error_state.has_errored());
    }
}
