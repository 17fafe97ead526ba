//! `StringConstant` (§3): one interned immutable byte sequence shared by reference from `String`
//! AST nodes but owned by the `ParseResult`.

use roo_entity::entity_ref;

entity_ref!(
    /// Handle for a `StringConstant`, and the value a `String` AST node carries.
    pub struct StringId
);

#[derive(Debug, Clone)]
pub struct StringConstant {
    pub bytes: Vec<u8>,
    /// Filled in by the code generator when the constant is emitted into `.rodata`.
    pub rodata_offset: Option<u32>,
}

impl StringConstant {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            rodata_offset: None,
        }
    }
}
