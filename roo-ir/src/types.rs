//! `TypeDef` and `TypeRef` (§3).

use roo_diagnostics::ErrorState;
use roo_entity::entity_ref;

entity_ref!(
    /// Index of a `TypeDef` within `ParseResult::types`.
    pub struct TypeId
);

/// A named user-defined aggregate, or a primitive registered via `#[DefinePrimitive]`.
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    pub members: Vec<crate::vars::MemberDef>,
    /// Unknown (`None`) until IR completion computes it (I1).
    pub size: Option<u32>,
    /// Primitives are registered with an explicit size and never gain members.
    pub primitive: Option<Primitive>,
    pub error_state: ErrorState,
}

/// The flavor of a built-in scalar type, set for the handful of types `#[DefinePrimitive]`
/// registers plus the always-present `int`/`uint`/`float`/`bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    SignedInt,
    UnsignedInt,
    Float,
    Bool,
    Str,
}

impl TypeDef {
    pub fn new_primitive(name: impl Into<String>, size: u32, kind: Primitive) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            size: Some(size),
            primitive: Some(kind),
            error_state: ErrorState::new(),
        }
    }

    pub fn new_aggregate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            size: None,
            primitive: None,
            error_state: ErrorState::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.size.is_some()
    }
}

/// The unevaluated or resolved size of an array `TypeRef`.
#[derive(Debug, Clone)]
pub enum ArraySize {
    /// Not yet evaluated; holds the `AstId` of the size expression within the owning code-thing.
    Unresolved(crate::ast::AstId),
    Resolved(u32),
}

/// A use of a type at some site: a parameter, a local, a member, a return type (§3).
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub name: String,
    pub resolved: Option<TypeId>,
    pub is_mutable: bool,
    pub is_reference: bool,
    pub is_reference_mutable: bool,
    pub array: Option<ArraySize>,
}

impl TypeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resolved: None,
            is_mutable: false,
            is_reference: false,
            is_reference_mutable: false,
            array: None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Resolve `self.name` against `types` by name and stamp `self.resolved`, returning whether a
    /// match was found. Used both by IR completion (declaration sites) and by `TypeChecker`
    /// (AST result types) — both resolve the same way, just at different sites, so the logic is
    /// shared rather than duplicated.
    pub fn resolve_name(&mut self, types: &roo_entity::PrimaryMap<TypeId, TypeDef>) -> bool {
        if let Some((id, _)) = types.iter().find(|(_, t)| t.name == self.name) {
            self.resolved = Some(id);
            true
        } else {
            false
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some() && !matches!(self.array, Some(ArraySize::Unresolved(_)))
    }

    /// An empty array literal (`[]`) has no element type and is compatible with any array type;
    /// callers represent it as a `TypeRef` with `resolved = None` and `array = Some(Resolved(0))`.
    pub fn is_empty_array_literal(&self) -> bool {
        self.resolved.is_none() && matches!(self.array, Some(ArraySize::Resolved(0)))
    }

    /// Compatibility test from §3: equal resolved types, equal reference-ness, and (optionally)
    /// equal mutability. An empty array literal is compatible with any array type.
    pub fn compatible_with(&self, other: &TypeRef, care_about_mutability: bool) -> bool {
        if self.is_empty_array_literal() && other.is_array() {
            return true;
        }
        if other.is_empty_array_literal() && self.is_array() {
            return true;
        }

        if self.resolved != other.resolved {
            return false;
        }
        if self.is_reference != other.is_reference {
            return false;
        }
        if self.is_array() != other.is_array() {
            return false;
        }
        if care_about_mutability && self.is_mutable != other.is_mutable {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roo_entity::EntityRef;

    #[test]
    fn empty_array_literal_is_compatible_with_any_array() {
        let empty = TypeRef {
            array: Some(ArraySize::Resolved(0)),
            ..TypeRef::new("")
        };
        let mut ints = TypeRef::new("int");
        ints.resolved = Some(TypeId::new(0));
        ints.array = Some(ArraySize::Resolved(4));

        assert!(empty.compatible_with(&ints, true));
        assert!(ints.compatible_with(&empty, true));
    }

    #[test]
    fn mutability_mismatch_fails_when_it_matters() {
        let mut a = TypeRef::new("int");
        a.resolved = Some(TypeId::new(0));
        a.is_mutable = true;
        let mut b = TypeRef::new("int");
        b.resolved = Some(TypeId::new(0));
        b.is_mutable = false;

        assert!(!a.compatible_with(&b, true));
        assert!(a.compatible_with(&b, false));
    }
}
