//! `ConstantFolder` (§4.1): collapses a `BinaryOp` whose operands are both literal constants of
//! the same primitive kind into a single `Constant` node, ahead of `TypeChecker`'s operator
//! resolution — so an expression like `3 + 4` never needs a registered `+` overload on `int` to
//! reach AIR generation; it simply never survives as a `BinaryOp` long enough to need one.
//!
//! Grounded directly on the original's `PASS_constantFolder.hpp`'s `BINARY_OP_NODE` case: fold
//! only once both operands have reduced to the same numeric literal kind, computing the result
//! with the host arithmetic for that kind, same-node-kind swap in place (no sibling chain to
//! re-point, unlike `ConditionFolder`'s `Branch`/`While` cases). A `BinaryOp` with a non-literal
//! operand — a variable, a call result, a user-defined type — is left alone for `TypeChecker` to
//! resolve as an operator overload, same as today. A literal arithmetic overflow or an
//! integer division by a literal zero is also left unfolded, so it surfaces as the ordinary
//! missing-operator diagnostic rather than panicking the compiler.
//!
//! The children-first walk already folds a whole expression tree (`(1 + 2) + 3`) in one call: by
//! the time a parent's operands are inspected, `walk` has already folded them in place at their
//! own `AstId`, so no fixed-point re-run is needed the way `ConditionFolder` needs one.

use crate::ast::{Ast, AstId, AstKind, BinaryOp, Literal};
use crate::code_thing::CodeThingId;
use crate::parse_result::ParseResult;

pub struct ConstantFolder;

impl ConstantFolder {
    pub fn new() -> Self {
        Self
    }

    /// Returns whether anything was folded.
    pub fn run(&mut self, parse: &mut ParseResult, code_thing_id: CodeThingId) -> bool {
        let root = parse.code_things[code_thing_id].ast_root;
        let Some(root) = root else { return false };

        let ast = &mut parse.code_things[code_thing_id].ast;
        let mut changed = false;
        Self::walk(ast, root, &mut changed);
        changed
    }

    fn walk(ast: &mut Ast, id: AstId, changed: &mut bool) {
        for child in ast[id].children() {
            Self::walk(ast, child, changed);
        }

        Self::try_fold(ast, id, changed);

        if let Some(next) = ast[id].next {
            Self::walk(ast, next, changed);
        }
    }

    fn try_fold(ast: &mut Ast, id: AstId, changed: &mut bool) {
        let (op, left, right) = match &ast[id].kind {
            AstKind::BinaryOp { op, left, right, .. } => (*op, *left, *right),
            _ => return,
        };

        let Some(folded) = Self::eval(&ast[left].kind, &ast[right].kind, op) else {
            return;
        };

        ast[id].kind = AstKind::Constant(folded);
        *changed = true;
    }

    fn eval(left: &AstKind, right: &AstKind, op: BinaryOp) -> Option<Literal> {
        match (left, right) {
            (AstKind::Constant(Literal::Int(a)), AstKind::Constant(Literal::Int(b))) => {
                Self::apply_i32(op, *a, *b).map(Literal::Int)
            }
            (AstKind::Constant(Literal::UInt(a)), AstKind::Constant(Literal::UInt(b))) => {
                Self::apply_u32(op, *a, *b).map(Literal::UInt)
            }
            (AstKind::Constant(Literal::Float(a)), AstKind::Constant(Literal::Float(b))) => {
                Some(Literal::Float(Self::apply_f32(op, *a, *b)))
            }
            _ => None,
        }
    }

    fn apply_i32(op: BinaryOp, a: i32, b: i32) -> Option<i32> {
        match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
        }
    }

    fn apply_u32(op: BinaryOp, a: u32, b: u32) -> Option<u32> {
        match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
        }
    }

    fn apply_f32(op: BinaryOp, a: f32, b: f32) -> f32 {
        match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }
}

impl Default for ConstantFolder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::code_thing::CodeThing;

    fn binary(thing: &mut CodeThing, op: BinaryOp, left: AstId, right: AstId) -> AstId {
        thing.ast.push(AstNode::new(AstKind::BinaryOp {
            op,
            left,
            right,
            resolved_operator: None,
        }))
    }

    #[test]
    fn folds_literal_int_addition() {
        let mut thing = CodeThing::new_function("f");
        let a = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(3))));
        let b = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(4))));
        let add = binary(&mut thing, BinaryOp::Add, a, b);
        thing.ast_root = Some(add);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConstantFolder::new().run(&mut parse, id);

        assert!(changed);
        assert!(matches!(parse.code_things[id].ast[add].kind, AstKind::Constant(Literal::Int(7))));
    }

    #[test]
    fn folds_a_nested_expression_in_one_pass() {
        let mut thing = CodeThing::new_function("f");
        let one = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let two = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(2))));
        let three = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(3))));
        let inner = binary(&mut thing, BinaryOp::Add, one, two);
        let outer = binary(&mut thing, BinaryOp::Add, inner, three);
        thing.ast_root = Some(outer);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConstantFolder::new().run(&mut parse, id);

        assert!(changed);
        assert!(matches!(parse.code_things[id].ast[outer].kind, AstKind::Constant(Literal::Int(6))));
    }

    #[test]
    fn leaves_a_variable_operand_unfolded() {
        let mut thing = CodeThing::new_function("f");
        let lit = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(3))));
        let var = thing.ast.push(AstNode::new(AstKind::Variable {
            name: "x".to_string(),
            resolved: None,
        }));
        let add = binary(&mut thing, BinaryOp::Add, lit, var);
        thing.ast_root = Some(add);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConstantFolder::new().run(&mut parse, id);

        assert!(!changed);
        assert!(matches!(parse.code_things[id].ast[add].kind, AstKind::BinaryOp { .. }));
    }

    #[test]
    fn leaves_an_integer_division_by_zero_unfolded() {
        let mut thing = CodeThing::new_function("f");
        let a = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(3))));
        let zero = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(0))));
        let div = binary(&mut thing, BinaryOp::Div, a, zero);
        thing.ast_root = Some(div);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConstantFolder::new().run(&mut parse, id);

        assert!(!changed);
        assert!(matches!(parse.code_things[id].ast[div].kind, AstKind::BinaryOp { .. }));
    }
}
