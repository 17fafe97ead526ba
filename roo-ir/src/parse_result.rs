//! `ParseResult` (§3): the compilation unit, owned by the caller for its whole lifetime (§3
//! "ownership and lifecycle" — tearing it down frees every subordinate entity, which in Rust
//! terms just means dropping it).

use crate::code_thing::{CodeThing, CodeThingId};
use crate::strings::{StringConstant, StringId};
use crate::types::{TypeDef, TypeId};
use roo_diagnostics::ErrorState;
use roo_entity::PrimaryMap;

/// A module dependency: either a local package path or a remote Git repository URL (§3).
#[derive(Debug, Clone)]
pub enum Dependency {
    Local(String),
    Remote(String),
}

#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub is_module: bool,
    pub name: Option<String>,
    pub target_arch: Option<String>,
    pub dependencies: Vec<Dependency>,
    pub code_things: PrimaryMap<CodeThingId, CodeThing>,
    pub types: PrimaryMap<TypeId, TypeDef>,
    pub strings: PrimaryMap<StringId, StringConstant>,
    pub files_to_link: Vec<String>,
    /// Diagnostics that don't belong to any one `CodeThing`/`TypeDef`: lexer errors and top-level
    /// parse errors (an illegal attribute, a malformed import, an unrecognized item keyword).
    pub errors: ErrorState,
}

impl ParseResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_type(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .find(|(_, t)| t.name == name)
            .map(|(id, _)| id)
    }

    pub fn find_code_thing_by_name(&self, name: &str) -> Vec<CodeThingId> {
        self.code_things
            .iter()
            .filter(|(_, thing)| thing.display_name() == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// All entities with at least one accumulated diagnostic, post-pass (§7 synchronization
    /// points; the driver calls this after semantic passes, after IR completion, and after code
    /// generation).
    pub fn has_errored(&self) -> bool {
        self.errors.has_errored()
            || self
                .code_things
                .values()
                .any(|t| t.error_state.has_errored())
            || self.types.values().any(|t| t.error_state.has_errored())
    }
}
