//! Graphviz `.dot` rendering (§4.9): three read-only debug visitors, one per compilation stage.
//! None of this participates in compilation semantics — every function here takes a shared
//! reference and produces a `String`, ported from the original's `passes/dotEmitter.cpp` (whose
//! `EMIT_WITH_LABEL`/`LINK_CHILD`/`VISIT_NEXT` macros become plain `write!` calls below) plus an
//! interference-graph renderer the original never had.

use roo_air::{Air, AirProgram, JumpCond, SlotId, SlotKind, SlotSet};
use roo_entity::EntityRef;
use roo_ir::{AstId, AstKind, CodeThing};
use std::collections::HashSet;
use std::fmt::Write;

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

/// One node per `AstNode` reachable from `code_thing.ast_root`, an edge to each child, a
/// blue-colored edge along the `next` chain threading a block's statements, and a dashed edge
/// from each node to the scope it was resolved in.
pub fn ast_to_dot(code_thing: &CodeThing) -> String {
    let mut out = String::new();
    writeln!(out, "digraph G").unwrap();
    writeln!(out, "{{").unwrap();

    if let Some(root) = code_thing.ast_root {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            emit_ast_node(&mut out, code_thing, id);
            let node = &code_thing.ast[id];
            stack.extend(node.children());
            if let Some(next) = node.next {
                stack.push(next);
            }
        }
    }

    for (id, scope) in code_thing.scopes.iter() {
        let parent = scope
            .parent
            .map(|p| format!("parent scope{}", p.index()))
            .unwrap_or_else(|| "root".to_string());
        writeln!(out, "\tscope{}[label=\"scope {}\",shape=box];", id.index(), parent).unwrap();
    }

    writeln!(out, "}}").unwrap();
    out
}

fn emit_ast_node(out: &mut String, code_thing: &CodeThing, id: AstId) {
    let node = &code_thing.ast[id];
    let name = format!("n{}", id.index());
    writeln!(out, "\t{name}[label=\"{}\"];", escape(&ast_label(&node.kind))).unwrap();

    for child in node.children() {
        writeln!(out, "\t{name} -> n{};", child.index()).unwrap();
    }
    if let Some(next) = node.next {
        writeln!(out, "\t{name} -> n{}[color=blue];", next.index()).unwrap();
    }
    if let Some(scope) = node.scope {
        writeln!(out, "\t{name} -> scope{}[style=dashed];", scope.index()).unwrap();
    }
}

fn ast_label(kind: &AstKind) -> String {
    match kind {
        AstKind::Break => "Break".to_string(),
        AstKind::Return(_) => "Return".to_string(),
        AstKind::UnaryOp { op, .. } => format!("{op:?}"),
        AstKind::BinaryOp { op, .. } => format!("{op:?}"),
        AstKind::Variable { name, resolved } => match resolved {
            Some(binding) => format!("{name} ({binding:?})"),
            None => format!("{name} ??"),
        },
        AstKind::Condition { cmp, .. } => format!("{cmp:?}"),
        AstKind::Branch { .. } => "Branch".to_string(),
        AstKind::While { .. } => "While".to_string(),
        AstKind::InfiniteLoop { .. } => "Loop".to_string(),
        AstKind::Constant(lit) => format!("{lit:?}"),
        AstKind::StringLit(id) => format!("String({})", id.index()),
        AstKind::Call { name, resolved, .. } => match resolved {
            Some(_) => format!("Call({name})"),
            None => format!("Call({name}) ??"),
        },
        AstKind::VariableAssignment { .. } => "=".to_string(),
        AstKind::MemberAccess { child_name, resolved, .. } => match resolved {
            Some(_) => format!(".{child_name}"),
            None => format!(".{child_name} ??"),
        },
        AstKind::ArrayInit { .. } => "{...}".to_string(),
        AstKind::Construct { type_name, .. } => format!("Construct({type_name})"),
    }
}

/// One node per instruction in index order, an edge to the following instruction unless this one
/// always diverts control flow (`Return` or an unconditional `Jump`), and an edge to every jump's
/// target label.
pub fn air_to_dot(program: &AirProgram) -> String {
    let mut out = String::new();
    writeln!(out, "digraph G").unwrap();
    writeln!(out, "{{").unwrap();

    let label_targets = label_instruction_indices(program);

    for (index, instr) in program.instructions.iter().enumerate() {
        let name = format!("i{index}");
        writeln!(out, "\t{name}[label=\"{}\",shape=box];", escape(&air_label(instr))).unwrap();

        let falls_through = !matches!(
            instr,
            Air::Return(_) | Air::Jump { cond: JumpCond::Unconditional, .. }
        );
        if falls_through && index + 1 < program.instructions.len() {
            writeln!(out, "\t{name} -> i{};", index + 1).unwrap();
        }
        if let Air::Jump { target, .. } = instr {
            if let Some(&target_index) = label_targets.get(target) {
                writeln!(out, "\t{name} -> i{target_index}[color=red];").unwrap();
            }
        }
    }

    writeln!(out, "}}").unwrap();
    out
}

fn label_instruction_indices(program: &AirProgram) -> std::collections::HashMap<roo_air::LabelId, usize> {
    program
        .instructions
        .iter()
        .enumerate()
        .filter_map(|(index, instr)| match instr {
            Air::Label(id) => Some((*id, index)),
            _ => None,
        })
        .collect()
}

fn air_label(instr: &Air) -> String {
    match instr {
        Air::Label(id) => format!("Label({})", id.index()),
        Air::Return(slot) => match slot {
            Some(s) => format!("Return({})", s.index()),
            None => "Return".to_string(),
        },
        Air::Jump { cond, .. } => format!("Jump({cond:?})"),
        Air::Mov { dest, src } => format!("Mov({} <- {})", dest.index(), src.index()),
        Air::Cmp { a, b } => format!("Cmp({}, {})", a.index(), b.index()),
        Air::UnaryOp { op, result, operand } => format!("{op:?}({} <- {})", result.index(), operand.index()),
        Air::Call { callee, result, .. } => match result {
            Some(r) => format!("Call({}) -> {}", callee.index(), r.index()),
            None => format!("Call({})", callee.index()),
        },
    }
}

/// One node per non-constant slot, undirected edges for interferences, and a node label that
/// includes the slot's assigned color once coloring has run.
pub fn interference_to_dot(slots: &SlotSet) -> String {
    let mut out = String::new();
    writeln!(out, "graph G").unwrap();
    writeln!(out, "{{").unwrap();

    for (id, slot) in slots.iter() {
        if slot.is_constant() {
            continue;
        }
        writeln!(out, "\ts{}[label=\"{}\"];", id.index(), escape(&slot_label(id, slot))).unwrap();
    }

    let mut emitted: HashSet<(SlotId, SlotId)> = HashSet::new();
    for (id, slot) in slots.iter() {
        if slot.is_constant() {
            continue;
        }
        for &other in &slot.interferences {
            if slots[other].is_constant() {
                continue;
            }
            let pair = if id.index() < other.index() { (id, other) } else { (other, id) };
            if emitted.insert(pair) {
                writeln!(out, "\ts{} -- s{};", pair.0.index(), pair.1.index()).unwrap();
            }
        }
    }

    writeln!(out, "}}").unwrap();
    out
}

fn slot_label(id: SlotId, slot: &roo_air::Slot) -> String {
    let kind = match &slot.kind {
        SlotKind::Param(i) => format!("param{i}"),
        SlotKind::Local { scope, index } => format!("local[{}][{index}]", scope.index()),
        SlotKind::Member { parent, member_index } => format!("member(s{}).{member_index}", parent.index()),
        SlotKind::Temporary(n) => format!("t{n}"),
        SlotKind::ReturnResult(n) => format!("ret{n}"),
        SlotKind::Constant(_) | SlotKind::StringConstant(_) => unreachable!("constants are filtered out"),
    };
    match slot.color {
        Some(color) => format!("s{}: {kind} [color {color}]", id.index()),
        None => format!("s{}: {kind}", id.index()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roo_air::Slot;
    use roo_entity::EntityRef;
    use roo_ir::{AstKind, AstNode, CodeThing, Literal};

    #[test]
    fn ast_to_dot_links_children_and_the_next_chain() {
        let mut code_thing = CodeThing::new_function("f");
        let a = code_thing.ast.push(AstNode::new(AstKind::Constant(Literal::Int(1))));
        let mut first = AstNode::new(AstKind::Return(Some(a)));
        let b = code_thing.ast.push(AstNode::new(AstKind::Break));
        first.next = Some(b);
        let root = code_thing.ast.push(first);
        code_thing.ast_root = Some(root);

        let dot = ast_to_dot(&code_thing);
        assert!(dot.contains(&format!("n{} -> n{};", root.index(), a.index())));
        assert!(dot.contains(&format!("n{} -> n{}[color=blue];", root.index(), b.index())));
    }

    #[test]
    fn ast_to_dot_dashes_the_scope_back_pointer() {
        let mut code_thing = CodeThing::new_function("f");
        let scope = code_thing.root_scope();
        let mut node = AstNode::new(AstKind::Break);
        node.scope = Some(scope);
        let id = code_thing.ast.push(node);
        code_thing.ast_root = Some(id);

        let dot = ast_to_dot(&code_thing);
        assert!(dot.contains(&format!("n{} -> scope{}[style=dashed];", id.index(), scope.index())));
    }

    #[test]
    fn air_to_dot_omits_fallthrough_after_unconditional_jump() {
        let mut program = AirProgram::new();
        let label = program.new_label();
        program.push(Air::Jump { cond: JumpCond::Unconditional, target: label });
        program.push(Air::Label(label));

        let dot = air_to_dot(&program);
        assert!(!dot.contains("i0 -> i1;"));
        assert!(dot.contains("i0 -> i1[color=red];"));
    }

    #[test]
    fn air_to_dot_falls_through_after_a_conditional_jump() {
        let mut program = AirProgram::new();
        let label = program.new_label();
        program.push(Air::Jump { cond: JumpCond::IfEqual, target: label });
        program.push(Air::Label(label));

        let dot = air_to_dot(&program);
        assert!(dot.contains("i0 -> i1;"));
    }

    #[test]
    fn interference_to_dot_skips_constants_and_shows_color() {
        let mut slots = SlotSet::new();
        let a = slots.push(Slot::new(SlotKind::Temporary(0), roo_ir::Storage::Register));
        let b = slots.push(Slot::new(SlotKind::Constant(Literal::Int(1)), roo_ir::Storage::Register));
        slots[a].color = Some(3);
        slots[a].interferences.push(b);

        let dot = interference_to_dot(&slots);
        assert!(dot.contains("[color 3]"));
        assert!(!dot.contains(&format!("s{}", b.index())));
    }
}
