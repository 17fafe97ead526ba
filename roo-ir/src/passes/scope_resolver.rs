//! `ScopeResolver` (§4.1): propagates a containing-scope back-pointer to every node.
//!
//! The parser sets the scope on the first node of each block it emits (so a `Branch`'s then-arm
//! already knows which `ScopeDef` its locals live in); this pass fills in every node that didn't
//! get one — inheriting the scope of whichever node put it there — and recurses into both
//! statement chains (`next`) and expression children so that leaf nodes (operands, call
//! arguments) also carry a scope.

use crate::ast::{Ast, AstId};
use crate::code_thing::CodeThingId;
use crate::parse_result::ParseResult;
use crate::vars::ScopeId;

pub struct ScopeResolver;

impl ScopeResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, parse: &mut ParseResult, code_thing: CodeThingId) {
        let root = parse.code_things[code_thing].ast_root;
        let Some(root) = root else { return };
        let ast = &mut parse.code_things[code_thing].ast;
        Self::visit(ast, root, None);
    }

    fn visit(ast: &mut Ast, id: AstId, inherited: Option<ScopeId>) {
        if ast[id].scope.is_none() {
            ast[id].scope = inherited;
        }
        let scope = ast[id].scope;

        for child in ast[id].children() {
            Self::visit(ast, child, scope);
        }

        if let Some(next) = ast[id].next {
            Self::visit(ast, next, scope);
        }
    }
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstKind, AstNode, Literal};
    use crate::code_thing::CodeThing;
    use crate::vars::ScopeDef;

    #[test]
    fn inherits_scope_from_previous_statement() {
        let mut thing = CodeThing::new_function("f");
        let scope = thing.scopes.push(ScopeDef::new(None));

        let a = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let b = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(2))));
        thing.ast[a].next = Some(b);
        thing.ast[a].scope = Some(scope);
        thing.ast_root = Some(a);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        ScopeResolver::new().run(&mut parse, id);

        assert_eq!(parse.code_things[id].ast[b].scope, Some(scope));
    }

    #[test]
    fn propagates_into_expression_children() {
        let mut thing = CodeThing::new_function("f");
        let scope = thing.scopes.push(ScopeDef::new(None));

        let left = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let right = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(2))));
        let op = thing.ast.push(AstNode::new(AstKind::BinaryOp {
            op: crate::ast::BinaryOp::Add,
            left,
            right,
            resolved_operator: None,
        }));
        thing.ast[op].scope = Some(scope);
        thing.ast_root = Some(op);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        ScopeResolver::new().run(&mut parse, id);

        assert_eq!(parse.code_things[id].ast[left].scope, Some(scope));
        assert_eq!(parse.code_things[id].ast[right].scope, Some(scope));
    }
}
