//! AIR (§3, §4.3, §4.4): the machine-independent three-address form each code-thing is lowered to
//! between IR completion and target code generation, plus the interference-graph register
//! allocator that assigns every value-carrying slot a color before `roo-isa` ever sees it.
//!
//! One code-thing at a time: `generate_air` lowers a single `CodeThing`'s `Ast` to an
//! `AirProgram` and its `Slot`s, then `build_interference_graph`/`color_slots` finish the job.
//! `allocate_for_program` strings the three together for every code-thing in a `ParseResult`.

pub mod abi;
pub mod coloring;
pub mod generator;
pub mod instr;
pub mod interference;
pub mod live_range;
pub mod slot;

pub use abi::TargetAbi;
pub use generator::{generate_air, AirOutput};
pub use instr::{Air, AirProgram, AirUnaryOp, JumpCond, LabelId};
pub use live_range::LiveRange;
pub use slot::{Slot, SlotId, SlotKind, SlotSet};

use roo_diagnostics::ErrorState;
use roo_ir::ParseResult;

/// A code-thing's finished AIR plus its colored slot set, ready for `roo-isa`.
pub struct CodeThingAir {
    pub program: AirProgram,
    pub slots: SlotSet,
    pub called_things: Vec<roo_ir::CodeThingId>,
}

/// Run AIR generation and register allocation for every code-thing with a body (prototypes have
/// no AST and are skipped, same as every other per-code-thing pass). Diagnostics raised along the
/// way are absorbed into the owning code-thing's own `ErrorState`, same as every semantic pass.
pub fn allocate_for_program(parse: &mut ParseResult, abi: &TargetAbi) -> Vec<(roo_ir::CodeThingId, CodeThingAir)> {
    let ids: Vec<_> = parse
        .code_things
        .iter()
        .filter(|(_, t)| t.ast_root.is_some())
        .map(|(id, _)| id)
        .collect();

    let mut out = Vec::new();
    for id in ids {
        let mut errors = ErrorState::new();
        let AirOutput { program, mut slots, called_things } = generate_air(parse, id, abi, &mut errors);
        interference::build_interference_graph(&mut slots);
        coloring::precolor_check(&slots, &mut errors);
        coloring::color_slots(&mut slots, abi, &mut errors);

        parse.code_things[id].error_state.absorb(&errors);
        out.push((id, CodeThingAir { program, slots, called_things }));
    }
    out
}
