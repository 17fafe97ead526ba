//! Semantic passes (§4.1): five visitors over the AST, run in order by `roo-driver` between
//! parsing and IR completion.
//!
//! Each pass is a total function over the `AstKind` variant set (§9, "tagged variant + dispatch
//! function" rather than virtual classes), implemented as a plain recursive method rather than a
//! shared trait object: the passes disagree on traversal order (children-first for folding and
//! type checking so leaves decide parents, node-first — the default — for scope propagation) and
//! on what a visit produces, so forcing one trait shape across all four would cost more than it
//! buys. `ScopeResolver` runs first, then `VariableResolver`, then `ConstantFolder` (ahead of
//! `TypeChecker` so literal arithmetic never needs a registered operator overload), then
//! `TypeChecker`, then `ConditionFolder`; `ConditionFolder` may be re-run until it reaches a fixed
//! point ("re-runs compose").

mod condition_folder;
mod constant_folder;
mod scope_resolver;
mod type_checker;
mod variable_resolver;

pub use condition_folder::ConditionFolder;
pub use constant_folder::ConstantFolder;
pub use scope_resolver::ScopeResolver;
pub use type_checker::TypeChecker;
pub use variable_resolver::VariableResolver;

use crate::parse_result::ParseResult;

/// Run the five semantic passes, in order, over every non-prototype code-thing in `parse`.
/// `ConditionFolder` is re-run to a fixed point per code-thing since a fold can expose another
/// fold (e.g. folding a `Branch` whose arm is itself a constant `While`); `ConstantFolder` already
/// folds a whole nested expression in one call, so it only needs to run once, before
/// `TypeChecker`.
pub fn run_semantic_passes(parse: &mut ParseResult) {
    for id in parse.code_things.keys() {
        if parse.code_things[id].ast_root.is_none() {
            continue; // prototype (I6): nothing to walk.
        }
        ScopeResolver::new().run(parse, id);
        VariableResolver::new().run(parse, id);
        ConstantFolder::new().run(parse, id);
        TypeChecker::new().run(parse, id);

        loop {
            let folded = ConditionFolder::new().run(parse, id);
            if !folded {
                break;
            }
        }
    }
}
