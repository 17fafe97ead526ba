//! The AIR generator (§4.3): a children-first-ish AST visitor that lowers one code-thing's `Ast`
//! into a linear `AirProgram` plus the `Slot`s it references.
//!
//! Grounded in the original's `GenNodeAIR<T>` family (`air.cpp`): that code used three explicit
//! template instantiations (`slot_def*`, `jump_i::condition`, `void`) to express "this node
//! produces a value", "this node produces a jump condition", and "this node is a statement and
//! has a `next`". The Rust port keeps the same three-way split as three methods (`gen_value`,
//! `gen_condition`, `gen_statement`) instead of monomorphizing over a return type, since Rust
//! doesn't have the C++ template-specialization trick and three small methods read better than
//! one generic one with a marker type.

use crate::abi::TargetAbi;
use crate::instr::{Air, AirProgram, AirUnaryOp, JumpCond, LabelId};
use crate::slot::{Slot, SlotId, SlotKind, SlotSet};
use roo_diagnostics::{ErrorKind, ErrorState, Location};
use roo_ir::{Ast, AstId, AstKind, CodeThingId, Literal, ParseResult, Storage, UnaryOp, VarBinding};
use std::collections::HashMap;

pub struct AirOutput {
    pub program: AirProgram,
    pub slots: SlotSet,
    pub called_things: Vec<CodeThingId>,
}

/// Lower `code_thing_id`'s body. Diagnostics (`BIND_USED_BEFORE_INIT` and internal-compiler-error
/// fallbacks for AST shapes the backend doesn't expect) are raised on `errors`, the code-thing's
/// own `ErrorState`, matching every other pass's ownership convention.
pub fn generate_air(
    parse: &ParseResult,
    code_thing_id: CodeThingId,
    abi: &TargetAbi,
    errors: &mut ErrorState,
) -> AirOutput {
    let thing = &parse.code_things[code_thing_id];
    let mut gen = Generator {
        parse,
        abi,
        errors,
        air: AirProgram::new(),
        slots: SlotSet::new(),
        param_slots: Vec::new(),
        local_slots: Vec::new(),
        member_slots: HashMap::new(),
        called_things: Vec::new(),
        next_temp: 0,
        next_return_result: 0,
        break_targets: Vec::new(),
    };

    for (idx, param) in thing.params.iter().enumerate() {
        let color = abi.int_param_colors.get(idx).copied();
        let mut slot = Slot::new(SlotKind::Param(idx), param.storage);
        slot.color = color;
        slot.live_ranges.push(crate::live_range::LiveRange::from_entry());
        let id = gen.slots.push(slot);
        gen.param_slots.push(id);
    }
    for (scope_id, scope) in thing.scopes.iter() {
        let mut row = Vec::with_capacity(scope.locals.len());
        for (idx, local) in scope.locals.iter().enumerate() {
            row.push(gen.slots.push(Slot::new(
                SlotKind::Local { scope: scope_id, index: idx },
                local.storage,
            )));
        }
        gen.local_slots.push((scope_id, row));
    }

    if let Some(root) = thing.ast_root {
        gen.gen_statement(&thing.ast, root);
    }

    AirOutput {
        program: gen.air,
        slots: gen.slots,
        called_things: gen.called_things,
    }
}

struct Generator<'a> {
    parse: &'a ParseResult,
    abi: &'a TargetAbi,
    errors: &'a mut ErrorState,
    air: AirProgram,
    slots: SlotSet,
    param_slots: Vec<SlotId>,
    local_slots: Vec<(roo_ir::ScopeId, Vec<SlotId>)>,
    member_slots: HashMap<(SlotId, usize), SlotId>,
    called_things: Vec<CodeThingId>,
    next_temp: u32,
    next_return_result: u32,
    break_targets: Vec<LabelId>,
}

impl<'a> Generator<'a> {
    fn local_slot(&self, scope: roo_ir::ScopeId, index: usize) -> SlotId {
        self.local_slots
            .iter()
            .find(|(s, _)| *s == scope)
            .map(|(_, row)| row[index])
            .expect("scope resolved by VariableResolver always exists in this code-thing")
    }

    fn member_slot(&mut self, parent: SlotId, member_index: usize) -> SlotId {
        if let Some(existing) = self.member_slots.get(&(parent, member_index)) {
            return *existing;
        }
        let slot = self.slots.push(Slot::new(
            SlotKind::Member { parent, member_index },
            Storage::Register,
        ));
        self.member_slots.insert((parent, member_index), slot);
        slot
    }

    fn new_temp(&mut self) -> SlotId {
        let id = self.next_temp;
        self.next_temp += 1;
        self.slots.push(Slot::new(SlotKind::Temporary(id), Storage::Register))
    }

    fn new_return_result(&mut self, color: u32) -> SlotId {
        let id = self.next_return_result;
        self.next_return_result += 1;
        let mut slot = Slot::new(SlotKind::ReturnResult(id), Storage::Register);
        slot.color = Some(color);
        self.slots.push(slot)
    }

    fn constant_slot(&mut self, lit: Literal) -> SlotId {
        self.slots.push(Slot::new(SlotKind::Constant(lit), Storage::Register))
    }

    fn use_slot(&mut self, slot: SlotId, at: u32) {
        if !self.slots[slot].mark_used(at) {
            self.errors.raise(
                Location::unknown(),
                ErrorKind::UsedBeforeInit(format!("{:?}", self.slots[slot].kind)),
            );
        }
    }

    fn define_slot(&mut self, slot: SlotId, at: u32) {
        self.slots[slot].mark_defined(at);
    }

    /// Evaluate `arg` and color it for call-argument position `position` (§4.3 "Call"): a slot
    /// already in a register class is colored in place, otherwise (a constant or the result of a
    /// nested call) a temporary is created and a `Mov` inserted.
    fn parameterize(&mut self, ast: &Ast, arg: AstId, position: usize) -> SlotId {
        let value = self.gen_value(ast, arg);
        let color = self
            .abi
            .int_param_colors
            .get(position)
            .copied()
            .unwrap_or(self.abi.return_color);

        match self.slots[value].kind {
            SlotKind::Param(_) | SlotKind::Local { .. } | SlotKind::Member { .. } | SlotKind::Temporary(_) => {
                self.slots[value].color = Some(color);
                value
            }
            SlotKind::ReturnResult(_) | SlotKind::Constant(_) | SlotKind::StringConstant(_) => {
                let temp = self.new_temp();
                self.slots[temp].color = Some(color);
                let idx = self.air.push(Air::Mov { dest: temp, src: value });
                self.use_slot(value, idx);
                self.define_slot(temp, idx);
                temp
            }
        }
    }

    fn gen_call(&mut self, ast: &Ast, callee: CodeThingId, args: &[AstId]) -> Option<SlotId> {
        self.called_things.push(callee);
        let arg_slots: Vec<SlotId> = args
            .iter()
            .enumerate()
            .map(|(i, a)| self.parameterize(ast, *a, i))
            .collect();

        let returns = self.parse.code_things[callee].return_type.is_some();
        let result = returns.then(|| self.new_return_result(self.abi.return_color));

        let idx = self.air.push(Air::Call {
            callee,
            args: arg_slots.clone(),
            result,
        });
        for a in arg_slots {
            self.use_slot(a, idx);
        }
        if let Some(r) = result {
            self.define_slot(r, idx);
        }
        result
    }

    /// Materialize a `Condition` used as an ordinary value (e.g. `b: bool = a > c`), as opposed to
    /// one guarding a `Branch`/`While` (handled by `gen_condition` below, which skips the
    /// 0/1-materializing dance and jumps straight off the flags).
    fn gen_condition_value(&mut self, ast: &Ast, id: AstId) -> SlotId {
        let jump_cond = self.gen_condition(ast, id, false);
        let result = self.new_temp();
        let true_label = self.air.new_label();
        let end_label = self.air.new_label();

        self.air.push(Air::Jump { cond: jump_cond, target: true_label });
        let false_const = self.constant_slot(Literal::Bool(false));
        let idx = self.air.push(Air::Mov { dest: result, src: false_const });
        self.define_slot(result, idx);
        self.air.push(Air::Jump { cond: JumpCond::Unconditional, target: end_label });

        self.air.push(Air::Label(true_label));
        let true_const = self.constant_slot(Literal::Bool(true));
        let idx = self.air.push(Air::Mov { dest: result, src: true_const });
        self.define_slot(result, idx);

        self.air.push(Air::Label(end_label));
        result
    }

    /// Lower a `Condition` node into a `Cmp` plus the jump condition the caller should branch on
    /// (§4.3's reverse-on-jump table).
    fn gen_condition(&mut self, ast: &Ast, id: AstId, reverse_on_jump: bool) -> JumpCond {
        match &ast[id].kind {
            AstKind::Condition { cmp, left, right } => {
                let cmp = *cmp;
                let (left, right) = (*left, *right);
                let a = self.gen_value(ast, left);
                let b = self.gen_value(ast, right);
                let idx = self.air.push(Air::Cmp { a, b });
                self.use_slot(a, idx);
                self.use_slot(b, idx);
                JumpCond::from_cmp(cmp, reverse_on_jump)
            }
            other => {
                self.errors.raise(
                    Location::unknown(),
                    ErrorKind::Ice {
                        where_: "gen_condition".to_string(),
                        detail: format!("expected a Condition node, found {other:?}"),
                    },
                );
                JumpCond::Unconditional
            }
        }
    }

    fn lower_in_place_unary(&mut self, ast: &Ast, op: UnaryOp, operand: AstId) -> SlotId {
        let operand_slot = self.gen_value(ast, operand);
        let air_op = match op {
            UnaryOp::Increment => AirUnaryOp::Increment,
            UnaryOp::Decrement => AirUnaryOp::Decrement,
            UnaryOp::Negate => AirUnaryOp::Negate,
            UnaryOp::LogicalNot => AirUnaryOp::LogicalNot,
        };

        // `++`/`--` mutate the operand's own slot in place (§4.3); `-`/`!` compute into a fresh
        // result so the original value survives (`-x` must not clobber `x`).
        match op {
            UnaryOp::Increment | UnaryOp::Decrement => {
                let idx = self.air.push(Air::UnaryOp { op: air_op, result: operand_slot, operand: operand_slot });
                self.use_slot(operand_slot, idx);
                self.define_slot(operand_slot, idx);
                operand_slot
            }
            UnaryOp::Negate | UnaryOp::LogicalNot => {
                let result = self.new_temp();
                let idx = self.air.push(Air::UnaryOp { op: air_op, result, operand: operand_slot });
                self.use_slot(operand_slot, idx);
                self.define_slot(result, idx);
                result
            }
        }
    }

    /// Evaluate a value-position node into a slot. Does not follow `next` (§4.3: only the
    /// statement-position dispatch threads the block).
    fn gen_value(&mut self, ast: &Ast, id: AstId) -> SlotId {
        match &ast[id].kind {
            AstKind::Constant(lit) => self.constant_slot(*lit),
            AstKind::StringLit(string_id) => {
                self.slots.push(Slot::new(SlotKind::StringConstant(*string_id), Storage::Register))
            }
            AstKind::Variable { resolved, .. } => match resolved {
                Some(VarBinding::Param(idx)) => self.param_slots[*idx],
                Some(VarBinding::Local(scope, idx)) => self.local_slot(*scope, *idx),
                None => {
                    self.errors.raise(
                        Location::unknown(),
                        ErrorKind::Ice {
                            where_: "gen_value".to_string(),
                            detail: "unresolved Variable reached AIR generation".to_string(),
                        },
                    );
                    self.new_temp()
                }
            },
            AstKind::MemberAccess { parent, resolved, .. } => {
                let parent = *parent;
                let resolved = *resolved;
                let parent_slot = self.gen_value(ast, parent);
                match resolved {
                    Some(member_idx) => self.member_slot(parent_slot, member_idx),
                    None => {
                        self.errors.raise(
                            Location::unknown(),
                            ErrorKind::Ice {
                                where_: "gen_value".to_string(),
                                detail: "unresolved MemberAccess reached AIR generation".to_string(),
                            },
                        );
                        self.new_temp()
                    }
                }
            }
            AstKind::BinaryOp { left, right, resolved_operator, .. } => {
                let (left, right, resolved_operator) = (*left, *right, *resolved_operator);
                match resolved_operator {
                    Some(callee) => self
                        .gen_call(ast, callee, &[left, right])
                        .unwrap_or_else(|| self.new_temp()),
                    None => {
                        self.errors.raise(
                            Location::unknown(),
                            ErrorKind::Ice {
                                where_: "gen_value".to_string(),
                                detail: "unresolved operator overload reached AIR generation".to_string(),
                            },
                        );
                        self.new_temp()
                    }
                }
            }
            AstKind::UnaryOp { op, operand } => {
                let (op, operand) = (*op, *operand);
                self.lower_in_place_unary(ast, op, operand)
            }
            AstKind::Condition { .. } => self.gen_condition_value(ast, id),
            AstKind::Call { args, resolved, .. } => {
                let (args, resolved) = (args.clone(), *resolved);
                match resolved {
                    Some(callee) => self.gen_call(ast, callee, &args).unwrap_or_else(|| self.new_temp()),
                    None => {
                        self.errors.raise(
                            Location::unknown(),
                            ErrorKind::Ice {
                                where_: "gen_value".to_string(),
                                detail: "unresolved Call reached AIR generation".to_string(),
                            },
                        );
                        self.new_temp()
                    }
                }
            }
            AstKind::Branch { cond, then_branch, else_branch } => {
                let (cond, then_branch, else_branch) = (*cond, *then_branch, *else_branch);
                self.gen_branch(ast, cond, then_branch, else_branch, true)
            }
            AstKind::Construct { items, .. } => {
                // `VariableAssignment` special-cases a `Construct` RHS (see `gen_statement`) so
                // its members land directly in the target's member slots; a `Construct` reached
                // here stands alone (no assignment target) and just evaluates its members for
                // their side effects before handing back an opaque result.
                let items = items.clone();
                for item in &items {
                    self.gen_value(ast, *item);
                }
                self.new_temp()
            }
            AstKind::ArrayInit { items } => {
                // No array element storage model exists in the backend (ahead of real array
                // runtime support, a non-goal); items are still evaluated so their live ranges
                // and any calls they contain are accounted for.
                let items = items.clone();
                for item in &items {
                    self.gen_value(ast, *item);
                }
                self.new_temp()
            }
            AstKind::VariableAssignment { .. } => {
                self.gen_statement_node(ast, id);
                self.new_temp()
            }
            other => {
                self.errors.raise(
                    Location::unknown(),
                    ErrorKind::Ice {
                        where_: "gen_value".to_string(),
                        detail: format!("{other:?} has no value-position lowering"),
                    },
                );
                self.new_temp()
            }
        }
    }

    fn gen_branch(
        &mut self,
        ast: &Ast,
        cond: AstId,
        then_branch: AstId,
        else_branch: Option<AstId>,
        wants_result: bool,
    ) -> SlotId {
        let jump_cond = self.gen_condition(ast, cond, true);
        let result = wants_result.then(|| self.new_temp());
        let end_label = self.air.new_label();
        let else_label = else_branch.map(|_| self.air.new_label());

        self.air.push(Air::Jump {
            cond: jump_cond,
            target: else_label.unwrap_or(end_label),
        });

        if wants_result {
            let then_value = self.gen_value(ast, then_branch);
            let idx = self.air.push(Air::Mov { dest: result.unwrap(), src: then_value });
            self.use_slot(then_value, idx);
            self.define_slot(result.unwrap(), idx);
        } else {
            self.gen_statement(ast, then_branch);
        }

        if let Some(else_branch) = else_branch {
            self.air.push(Air::Jump { cond: JumpCond::Unconditional, target: end_label });
            self.air.push(Air::Label(else_label.unwrap()));
            if wants_result {
                let else_value = self.gen_value(ast, else_branch);
                let idx = self.air.push(Air::Mov { dest: result.unwrap(), src: else_value });
                self.use_slot(else_value, idx);
                self.define_slot(result.unwrap(), idx);
            } else {
                self.gen_statement(ast, else_branch);
            }
        }

        self.air.push(Air::Label(end_label));
        result.unwrap_or_else(|| self.new_temp())
    }

    fn gen_statement_node(&mut self, ast: &Ast, id: AstId) {
        match &ast[id].kind {
            AstKind::Break => {
                let target = self.break_targets.last().copied();
                match target {
                    Some(target) => {
                        self.air.push(Air::Jump { cond: JumpCond::Unconditional, target });
                    }
                    None => {
                        self.errors.raise(
                            Location::unknown(),
                            ErrorKind::Ice {
                                where_: "gen_statement".to_string(),
                                detail: "break outside any loop reached AIR generation".to_string(),
                            },
                        );
                    }
                }
            }
            AstKind::Return(expr) => {
                let expr = *expr;
                let value = expr.map(|e| self.gen_value(ast, e));
                let idx = self.air.push(Air::Return(value));
                if let Some(v) = value {
                    self.use_slot(v, idx);
                }
            }
            AstKind::VariableAssignment { target, value, .. } => {
                let (target, value) = (*target, *value);
                if let AstKind::Construct { items, .. } = ast[value].kind.clone() {
                    let target_slot = self.gen_value(ast, target);
                    for (i, item) in items.iter().enumerate() {
                        let member = self.member_slot(target_slot, i);
                        let item_value = self.gen_value(ast, *item);
                        let idx = self.air.push(Air::Mov { dest: member, src: item_value });
                        self.use_slot(item_value, idx);
                        self.define_slot(member, idx);
                    }
                } else {
                    let target_slot = self.gen_value(ast, target);
                    let value_slot = self.gen_value(ast, value);
                    let idx = self.air.push(Air::Mov { dest: target_slot, src: value_slot });
                    self.use_slot(value_slot, idx);
                    self.define_slot(target_slot, idx);
                }
            }
            AstKind::UnaryOp { op, operand } => {
                let (op, operand) = (*op, *operand);
                self.lower_in_place_unary(ast, op, operand);
            }
            AstKind::Call { args, resolved, .. } => {
                let (args, resolved) = (args.clone(), *resolved);
                if let Some(callee) = resolved {
                    self.gen_call(ast, callee, &args);
                }
            }
            AstKind::Branch { cond, then_branch, else_branch } => {
                let (cond, then_branch, else_branch) = (*cond, *then_branch, *else_branch);
                self.gen_branch(ast, cond, then_branch, else_branch, false);
            }
            AstKind::While { cond, body } => {
                let (cond, body) = (*cond, *body);
                // §4.3: head label, body, condition, conditional jump back to head — the body
                // always runs once before the condition is ever tested, matching the original's
                // lowering exactly (it never emits a guard jump ahead of the head label either).
                let head = self.air.new_label();
                let end = self.air.new_label();
                self.air.push(Air::Label(head));
                self.break_targets.push(end);
                self.gen_statement(ast, body);
                self.break_targets.pop();
                let jump_cond = self.gen_condition(ast, cond, false);
                self.air.push(Air::Jump { cond: jump_cond, target: head });
                self.air.push(Air::Label(end));
            }
            AstKind::InfiniteLoop { body } => {
                let body = *body;
                let head = self.air.new_label();
                let end = self.air.new_label();
                self.air.push(Air::Label(head));
                self.break_targets.push(end);
                self.gen_statement(ast, body);
                self.break_targets.pop();
                self.air.push(Air::Jump { cond: JumpCond::Unconditional, target: head });
                self.air.push(Air::Label(end));
            }
            AstKind::Constant(_) | AstKind::StringLit(_) | AstKind::Variable { .. } => {
                // A bare literal/variable/member statement (e.g. the empty-block placeholder
                // synthesized by the parser) has no side effect; nothing to lower.
            }
            AstKind::MemberAccess { .. } | AstKind::BinaryOp { .. } | AstKind::Condition { .. } => {
                // Evaluated for any calls/side effects nested inside, result discarded.
                self.gen_value(ast, id);
            }
            AstKind::ArrayInit { .. } | AstKind::Construct { .. } => {
                self.gen_value(ast, id);
            }
        }
    }

    /// Lower `id` as a statement, then continue down the block's `next` chain.
    fn gen_statement(&mut self, ast: &Ast, id: AstId) {
        self.gen_statement_node(ast, id);
        if let Some(next) = ast[id].next {
            self.gen_statement(ast, next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roo_ir::{AstNode, CodeThing, ScopeDef, TypeRef, VariableDef};

    fn test_abi() -> TargetAbi {
        TargetAbi {
            general_registers: (0..14).collect(),
            int_param_colors: vec![7, 6, 3, 2, 8, 9],
            return_color: 0,
        }
    }

    #[test]
    fn return_of_constant_emits_single_instruction() {
        let mut parse = ParseResult::new();
        let mut thing = CodeThing::new_function("f");
        let lit = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let ret = thing.ast.push(AstNode::new(AstKind::Return(Some(lit))));
        thing.ast_root = Some(ret);
        let id = parse.code_things.push(thing);

        let mut errors = ErrorState::new();
        let out = generate_air(&parse, id, &test_abi(), &mut errors);
        assert!(!errors.has_errored());
        assert_eq!(out.program.instructions.len(), 1);
        assert!(matches!(out.program.instructions[0], Air::Return(Some(_))));
    }

    #[test]
    fn binary_op_lowers_to_a_call_with_two_colored_args() {
        let mut parse = ParseResult::new();
        let mut plus = CodeThing::new_operator("+");
        plus.params.push(VariableDef::new("a", TypeRef::new("int"), None));
        plus.params.push(VariableDef::new("b", TypeRef::new("int"), None));
        plus.return_type = Some(TypeRef::new("int"));
        let plus_id = parse.code_things.push(plus);

        let mut thing = CodeThing::new_function("f");
        let l = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let r = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(2))));
        let add = thing.ast.push(AstNode::new(AstKind::BinaryOp {
            op: roo_ir::BinaryOp::Add,
            left: l,
            right: r,
            resolved_operator: Some(plus_id),
        }));
        let ret = thing.ast.push(AstNode::new(AstKind::Return(Some(add))));
        thing.ast_root = Some(ret);
        let id = parse.code_things.push(thing);

        let mut errors = ErrorState::new();
        let out = generate_air(&parse, id, &test_abi(), &mut errors);
        assert!(!errors.has_errored());
        assert_eq!(out.called_things, vec![plus_id]);
        let calls: Vec<_> = out
            .program
            .instructions
            .iter()
            .filter(|i| matches!(i, Air::Call { .. }))
            .collect();
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn use_before_definition_raises_used_before_init() {
        let mut parse = ParseResult::new();
        let mut thing = CodeThing::new_function("f");
        let scope = thing.scopes.push(ScopeDef::new(None));
        thing.scopes[scope].locals.push(VariableDef::new("x", TypeRef::new("int"), None));
        let var = thing.ast.push(AstNode::new(AstKind::Variable {
            name: "x".into(),
            resolved: Some(VarBinding::Local(scope, 0)),
        }));
        let ret = thing.ast.push(AstNode::new(AstKind::Return(Some(var))));
        thing.ast_root = Some(ret);
        let id = parse.code_things.push(thing);

        let mut errors = ErrorState::new();
        generate_air(&parse, id, &test_abi(), &mut errors);
        assert!(errors.has_errored());
    }

    #[test]
    fn break_inside_while_jumps_to_loop_end() {
        let mut parse = ParseResult::new();
        let mut thing = CodeThing::new_function("f");
        let a = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let b = thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let cond = thing.ast.push(AstNode::new(AstKind::Condition {
            cmp: roo_ir::Cmp::Eq,
            left: a,
            right: b,
        }));
        let brk = thing.ast.push(AstNode::new(AstKind::Break));
        let body = brk;
        let while_node = thing.ast.push(AstNode::new(AstKind::While { cond, body }));
        thing.ast_root = Some(while_node);
        let id = parse.code_things.push(thing);

        let mut errors = ErrorState::new();
        let out = generate_air(&parse, id, &test_abi(), &mut errors);
        assert!(!errors.has_errored());
        assert!(out
            .program
            .instructions
            .iter()
            .any(|i| matches!(i, Air::Jump { cond: JumpCond::Unconditional, .. })));
    }
}
