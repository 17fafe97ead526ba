//! `CodeThing` (§3): the unit of compilation for executable code.

use crate::ast::{Ast, AstId};
use crate::types::TypeRef;
use crate::vars::{ScopeDef, ScopeId, VariableDef};
use roo_diagnostics::ErrorState;
use roo_entity::{entity_ref, PrimaryMap};

entity_ref!(
    /// Index of a `CodeThing` within `ParseResult::code_things`.
    pub struct CodeThingId
);

/// A function, or an operator overload identified by the token it overloads plus its parameter
/// list (used to distinguish overloads, §3/§6 mangling).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeThingKind {
    Function { name: String },
    Operator { token: String },
}

/// Code-thing annotations set by `#[Entry]`/`#[Prototype]`/`#[Inline]`/`#[NoInline]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttribSet {
    pub is_entry: bool,
    pub is_prototype: bool,
    pub is_inline: bool,
    pub is_no_inline: bool,
}

#[derive(Debug, Clone)]
pub struct CodeThing {
    pub kind: CodeThingKind,
    /// Set by IR completion (§4.2a): `_R_<name>` for functions, `_RO_<token>_<types>` for
    /// operators.
    pub mangled_name: Option<String>,
    pub params: Vec<VariableDef>,
    pub scopes: PrimaryMap<ScopeId, ScopeDef>,
    pub return_type: Option<TypeRef>,
    pub attribs: AttribSet,
    pub error_state: ErrorState,
    pub called_things: Vec<CodeThingId>,

    /// `None` for a prototype (I6); otherwise the root statement of the body.
    pub ast: Ast,
    pub ast_root: Option<AstId>,

    /// Filled by IR completion; total bytes needed by stack-resident locals.
    pub stack_frame_size: u32,
    /// Index into the eventual ELF symbol table; filled by the code generator (§4.6).
    pub elf_symbol: Option<u32>,
}

impl CodeThing {
    pub fn new_function(name: impl Into<String>) -> Self {
        Self {
            kind: CodeThingKind::Function { name: name.into() },
            mangled_name: None,
            params: Vec::new(),
            scopes: PrimaryMap::new(),
            return_type: None,
            attribs: AttribSet::default(),
            error_state: ErrorState::new(),
            called_things: Vec::new(),
            ast: Ast::new(),
            ast_root: None,
            stack_frame_size: 0,
            elf_symbol: None,
        }
    }

    pub fn new_operator(token: impl Into<String>) -> Self {
        Self {
            kind: CodeThingKind::Operator {
                token: token.into(),
            },
            ..Self::new_function("")
        }
    }

    pub fn display_name(&self) -> &str {
        match &self.kind {
            CodeThingKind::Function { name } => name,
            CodeThingKind::Operator { token } => token,
        }
    }

    /// A root scope, created if it doesn't exist yet, for top-level locals.
    pub fn root_scope(&mut self) -> ScopeId {
        if self.scopes.is_empty() {
            self.scopes.push(ScopeDef::new(None));
        }
        self.scopes.keys().next().unwrap()
    }
}
