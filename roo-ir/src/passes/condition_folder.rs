//! `ConditionFolder` (§4.1): collapses `Branch`/`While` nodes whose condition is a compile-time
//! constant.
//!
//! A taken branch is spliced into the folded node's position (the tail of the taken chain is
//! re-pointed at whatever the folded node's own `next` used to be), which is why `run` returns
//! whether it changed anything rather than a single bool condition: the caller (`passes::mod`)
//! re-runs the pass to a fixed point, since splicing in a branch can expose another foldable node
//! one level up (e.g. a constant `While` wrapped in a constant `Branch`).
//!
//! A true `Branch` splices in `then`; a false `Branch` with an `else` splices in `else`; a true
//! `While` becomes an `InfiniteLoop` (a same-node kind swap). The remaining two cases — a false
//! `Branch` with no `else`, and a false `While` — have no chain to splice in their place; the node
//! itself must vanish. `remove` does that by pulling the next statement forward into the node's
//! own slot (so anything that already points at this `AstId` — a parent's `then_branch`, the
//! `CodeThing`'s `ast_root` — transparently sees whatever used to come after it), or, if there is
//! no next statement, collapsing it into the same no-op placeholder the parser already synthesizes
//! for an empty block (`AstKind::Constant(Literal::Bool(false))`, see `roo-syntax`'s parser).

use crate::ast::{Ast, AstId, AstKind, Cmp, Literal};
use crate::code_thing::CodeThingId;
use crate::parse_result::ParseResult;

pub struct ConditionFolder;

impl ConditionFolder {
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
        match ast[id].kind.clone() {
            AstKind::Branch {
                cond,
                then_branch,
                else_branch,
            } => match Self::const_bool(ast, cond) {
                Some(true) => {
                    Self::splice(ast, id, then_branch);
                    *changed = true;
                }
                Some(false) => match else_branch {
                    Some(else_branch) => {
                        Self::splice(ast, id, else_branch);
                        *changed = true;
                    }
                    None => {
                        Self::remove(ast, id);
                        *changed = true;
                    }
                },
                None => {}
            },
            AstKind::While { cond, body } => match Self::const_bool(ast, cond) {
                Some(true) => {
                    ast[id].kind = AstKind::InfiniteLoop { body };
                    *changed = true;
                }
                Some(false) => {
                    Self::remove(ast, id);
                    *changed = true;
                }
                None => {}
            },
            _ => {}
        }
    }

    /// Evaluate `id` as a compile-time boolean: a literal `bool`, or a `Condition` whose operands
    /// are both literals of the same evaluable kind.
    fn const_bool(ast: &Ast, id: AstId) -> Option<bool> {
        match &ast[id].kind {
            AstKind::Constant(Literal::Bool(b)) => Some(*b),
            AstKind::Condition { cmp, left, right } => Self::eval_condition(ast, *cmp, *left, *right),
            _ => None,
        }
    }

    fn eval_condition(ast: &Ast, cmp: Cmp, left: AstId, right: AstId) -> Option<bool> {
        match (&ast[left].kind, &ast[right].kind) {
            (AstKind::Constant(Literal::Int(a)), AstKind::Constant(Literal::Int(b))) => {
                Some(cmp.eval_i64(*a as i64, *b as i64))
            }
            (AstKind::Constant(Literal::UInt(a)), AstKind::Constant(Literal::UInt(b))) => {
                Some(cmp.eval_i64(*a as i64, *b as i64))
            }
            (AstKind::Constant(Literal::Float(a)), AstKind::Constant(Literal::Float(b))) => {
                Some(cmp.eval_f64(*a as f64, *b as f64))
            }
            (AstKind::Constant(Literal::Bool(a)), AstKind::Constant(Literal::Bool(b))) => {
                match cmp {
                    Cmp::Eq => Some(a == b),
                    Cmp::Ne => Some(a != b),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Copy `head`'s chain into `id`'s slot, re-pointing the chain's tail at `id`'s old `next`.
    fn splice(ast: &mut Ast, id: AstId, head: AstId) {
        let after = ast[id].next;

        let mut tail = head;
        while let Some(n) = ast[tail].next {
            tail = n;
        }
        ast[tail].next = after;

        let replacement = ast[head].clone();
        ast[id].kind = replacement.kind;
        ast[id].scope = replacement.scope;
        ast[id].result_type = replacement.result_type;
        ast[id].next = replacement.next;
    }

    /// Delete `id` from its statement chain: absorb whatever follows it into its own slot, or
    /// collapse to a no-op if nothing does.
    fn remove(ast: &mut Ast, id: AstId) {
        match ast[id].next {
            Some(next) => {
                let replacement = ast[next].clone();
                ast[id].kind = replacement.kind;
                ast[id].result_type = replacement.result_type;
                ast[id].next = replacement.next;
            }
            None => {
                ast[id].kind = AstKind::Constant(Literal::Bool(false));
            }
        }
    }
}

impl Default for ConditionFolder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::code_thing::CodeThing;

    #[test]
    fn true_branch_splices_in_then() {
        let mut thing = CodeThing::new_function("f");
        let cond = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Bool(true))));
        let then_stmt = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(7))));
        let else_stmt = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(9))));
        let branch = thing.ast.push(AstNode::new(AstKind::Branch {
            cond,
            then_branch: then_stmt,
            else_branch: Some(else_stmt),
        }));
        let after = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(42))));
        thing.ast[branch].next = Some(after);
        thing.ast_root = Some(branch);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConditionFolder::new().run(&mut parse, id);

        assert!(changed);
        let folded = &parse.code_things[id].ast[branch];
        assert!(matches!(folded.kind, AstKind::Constant(Literal::Int(7))));
        assert_eq!(folded.next, Some(after));
    }

    #[test]
    fn false_branch_with_no_else_and_no_next_becomes_a_nop() {
        let mut thing = CodeThing::new_function("f");
        let cond = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Bool(false))));
        let then_stmt = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(7))));
        let branch = thing.ast.push(AstNode::new(AstKind::Branch {
            cond,
            then_branch: then_stmt,
            else_branch: None,
        }));
        thing.ast_root = Some(branch);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConditionFolder::new().run(&mut parse, id);

        assert!(changed);
        assert!(matches!(
            parse.code_things[id].ast[branch].kind,
            AstKind::Constant(Literal::Bool(false))
        ));
        assert!(parse.code_things[id].ast[branch].next.is_none());
    }

    #[test]
    fn false_branch_with_no_else_but_a_next_is_spliced_out() {
        let mut thing = CodeThing::new_function("f");
        let cond = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Bool(false))));
        let then_stmt = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(7))));
        let branch = thing.ast.push(AstNode::new(AstKind::Branch {
            cond,
            then_branch: then_stmt,
            else_branch: None,
        }));
        let after = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(42))));
        thing.ast[branch].next = Some(after);
        thing.ast_root = Some(branch);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConditionFolder::new().run(&mut parse, id);

        assert!(changed);
        let folded = &parse.code_things[id].ast[branch];
        assert!(matches!(folded.kind, AstKind::Constant(Literal::Int(42))));
        assert!(folded.next.is_none());
    }

    #[test]
    fn false_while_is_removed_entirely() {
        let mut thing = CodeThing::new_function("f");
        let cond = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Bool(false))));
        let body = thing.ast.push(AstNode::new(AstKind::Break));
        let while_node = thing.ast.push(AstNode::new(AstKind::While { cond, body }));
        let after = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(9))));
        thing.ast[while_node].next = Some(after);
        thing.ast_root = Some(while_node);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConditionFolder::new().run(&mut parse, id);

        assert!(changed);
        let folded = &parse.code_things[id].ast[while_node];
        assert!(matches!(folded.kind, AstKind::Constant(Literal::Int(9))));
        assert!(folded.next.is_none());
    }

    #[test]
    fn true_while_becomes_infinite_loop() {
        let mut thing = CodeThing::new_function("f");
        let cond = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Bool(true))));
        let body = thing.ast.push(AstNode::new(AstKind::Break));
        let while_node = thing.ast.push(AstNode::new(AstKind::While { cond, body }));
        thing.ast_root = Some(while_node);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConditionFolder::new().run(&mut parse, id);

        assert!(changed);
        assert!(matches!(
            parse.code_things[id].ast[while_node].kind,
            AstKind::InfiniteLoop { body: b } if b == body
        ));
    }

    #[test]
    fn constant_comparison_folds_branch() {
        let mut thing = CodeThing::new_function("f");
        let lhs = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(3))));
        let rhs = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(5))));
        let cond = thing.ast.push(AstNode::new(AstKind::Condition {
            cmp: Cmp::Lt,
            left: lhs,
            right: rhs,
        }));
        let then_stmt = thing
            .ast
            .push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let branch = thing.ast.push(AstNode::new(AstKind::Branch {
            cond,
            then_branch: then_stmt,
            else_branch: None,
        }));
        thing.ast_root = Some(branch);

        let mut parse = ParseResult::new();
        let id = parse.code_things.push(thing);
        let changed = ConditionFolder::new().run(&mut parse, id);

        assert!(changed);
        assert!(matches!(
            parse.code_things[id].ast[branch].kind,
            AstKind::Constant(Literal::Int(1))
        ));
    }
}
