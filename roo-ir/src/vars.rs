//! `VariableDef`/`MemberDef` and `ScopeDef` (§3).

use crate::ast::AstId;
use crate::types::TypeRef;
use roo_entity::entity_ref;

entity_ref!(
    /// Index of a `ScopeDef` within `CodeThing::scopes`.
    pub struct ScopeId
);

/// Where a local variable ends up living, chosen during IR completion (§4.2 step f).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Not yet decided.
    Unresolved,
    Register,
    /// Signed offset from the frame base pointer; negative, counting up toward zero.
    Stack(i32),
}

/// A named binding: a parameter or a local. Members reuse the same shape (§3 groups
/// `VariableDef`/`MemberDef` together) but are stored separately on `TypeDef` since they don't
/// participate in storage assignment or scoping.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub ty: TypeRef,
    pub initializer: Option<AstId>,
    pub is_mutable: bool,
    pub storage: Storage,
    /// One sub-variable per member of `ty`'s resolved `TypeDef`, cloned in during IR completion
    /// (§4.2 step e) so a member access can be lowered without re-deriving the member's own
    /// storage and offset every time.
    pub members: Vec<VariableDef>,
}

impl VariableDef {
    pub fn new(name: impl Into<String>, ty: TypeRef, initializer: Option<AstId>) -> Self {
        let is_mutable = ty.is_mutable;
        Self {
            name: name.into(),
            ty,
            initializer,
            is_mutable,
            storage: Storage::Unresolved,
            members: Vec::new(),
        }
    }
}

/// A member of an aggregate `TypeDef`. Offset is filled in during IR completion (§4.2 step d).
#[derive(Debug, Clone)]
pub struct MemberDef {
    pub name: String,
    pub ty: TypeRef,
    pub offset: Option<u32>,
}

impl MemberDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            offset: None,
        }
    }
}

/// A lexical scope inside a code-thing. Lookup walks `parent` outward, then falls through to the
/// code-thing's parameters (§4.1, `VariableResolver`).
#[derive(Debug, Clone, Default)]
pub struct ScopeDef {
    pub parent: Option<ScopeId>,
    pub locals: Vec<VariableDef>,
}

impl ScopeDef {
    pub fn new(parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            locals: Vec::new(),
        }
    }

    pub fn find_local(&self, name: &str) -> Option<usize> {
        self.locals.iter().position(|l| l.name == name)
    }
}
