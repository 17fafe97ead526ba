//! The `.roomod` module descriptor (de)serializer (§4.8/§6): a compact binary companion to a
//! linked relocatable object, carrying just enough of a compiled module's types and code-thing
//! signatures for a downstream compilation to `#[Import]` it without re-parsing source.
//!
//! Byte layout (exact, from the specification): magic `7F 'R' 'O' 'O'`, version (1 byte, 0),
//! `typeCount` (u32 LE), `codeThingCount` (u32 LE), then that many type records and code-thing
//! records. Strings are single-byte-length-prefixed and that length includes the terminating null
//! byte (i.e. a length-N string occupies `1 + N` bytes, the last of which is `0x00`).

use roo_diagnostics::{ErrorKind, ErrorState, Location};
use roo_ir::{ArraySize, Primitive, TypeDef, TypeRef};

pub const MAGIC: [u8; 4] = [0x7f, b'R', b'O', b'O'];
pub const VERSION: u8 = 0;

#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub name: String,
    pub type_name: String,
    pub is_mutable: bool,
    pub is_reference: bool,
    pub is_reference_mutable: bool,
    pub array_size: u32,
}

#[derive(Debug, Clone)]
pub struct TypeRecord {
    pub name: String,
    pub members: Vec<MemberRecord>,
    pub size: u32,
}

#[derive(Debug, Clone)]
pub enum CodeThingPayload {
    Function { name: String },
    Operator { token_id: u32 },
}

#[derive(Debug, Clone)]
pub struct CodeThingRecord {
    pub payload: CodeThingPayload,
    pub params: Vec<MemberRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    pub types: Vec<TypeRecord>,
    pub code_things: Vec<CodeThingRecord>,
}

struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Single-byte length prefix *including* the trailing null, per the format.
    fn string(&mut self, s: &str) {
        let len = s.len() + 1;
        self.u8(len as u8);
        self.bytes.extend_from_slice(s.as_bytes());
        self.u8(0);
    }

    fn member(&mut self, m: &MemberRecord) {
        self.string(&m.name);
        self.string(&m.type_name);
        self.u8(m.is_mutable as u8);
        self.u8(m.is_reference as u8);
        self.u8(m.is_reference_mutable as u8);
        self.u32(m.array_size);
    }
}

impl ModuleInfo {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes.extend_from_slice(&MAGIC);
        w.u8(VERSION);
        w.u32(self.types.len() as u32);
        w.u32(self.code_things.len() as u32);

        for ty in &self.types {
            w.string(&ty.name);
            w.u8(ty.members.len() as u8);
            for m in &ty.members {
                w.member(m);
            }
            w.u32(ty.size);
        }

        for thing in &self.code_things {
            match &thing.payload {
                CodeThingPayload::Function { name } => {
                    w.u8(0);
                    w.string(name);
                }
                CodeThingPayload::Operator { token_id } => {
                    w.u8(1);
                    w.u32(*token_id);
                }
            }
            // Not specified explicitly, but a parameter count has to precede the records
            // themselves for a reader to know where one code-thing record ends and the next
            // begins — the same role `memberCount` plays for a type record just above.
            w.u8(thing.params.len() as u8);
            for p in &thing.params {
                w.member(p);
            }
        }

        w.bytes
    }

    /// Build a `ModuleInfo` snapshot of a compiled unit's exported surface: every resolved
    /// aggregate type and every non-prototype, non-operator-overload... actually every code-thing
    /// (functions and operators alike), so a later compilation linking this module can resolve
    /// calls and operator overloads the same way it would against source.
    pub fn from_parse_result(parse: &roo_ir::ParseResult) -> Self {
        let mut types = Vec::new();
        for ty in parse.types.values() {
            if ty.primitive.is_some() {
                continue; // primitives are always registered fresh by the importing compilation
            }
            types.push(type_record(ty));
        }

        let mut code_things = Vec::new();
        for thing in parse.code_things.values() {
            let payload = match &thing.kind {
                roo_ir::CodeThingKind::Function { name } => CodeThingPayload::Function { name: name.clone() },
                roo_ir::CodeThingKind::Operator { token } => {
                    CodeThingPayload::Operator { token_id: token_id_of(token) }
                }
            };
            let params = thing.params.iter().map(member_record_of_param).collect();
            code_things.push(CodeThingRecord { payload, params });
        }

        Self { types, code_things }
    }
}

fn type_record(ty: &TypeDef) -> TypeRecord {
    TypeRecord {
        name: ty.name.clone(),
        members: ty
            .members
            .iter()
            .map(|m| MemberRecord {
                name: m.name.clone(),
                type_name: m.ty.name.clone(),
                is_mutable: m.ty.is_mutable,
                is_reference: m.ty.is_reference,
                is_reference_mutable: m.ty.is_reference_mutable,
                array_size: array_size_of(&m.ty),
            })
            .collect(),
        size: ty.size.unwrap_or(0),
    }
}

fn member_record_of_param(p: &roo_ir::VariableDef) -> MemberRecord {
    MemberRecord {
        name: p.name.clone(),
        type_name: p.ty.name.clone(),
        is_mutable: p.ty.is_mutable,
        is_reference: p.ty.is_reference,
        is_reference_mutable: p.ty.is_reference_mutable,
        array_size: array_size_of(&p.ty),
    }
}

fn array_size_of(ty: &TypeRef) -> u32 {
    match &ty.array {
        Some(ArraySize::Resolved(n)) => *n,
        _ => 0,
    }
}

/// Stable numeric ids for the handful of overloadable operator tokens (§4.8's "token id as 4
/// bytes"); must agree between the writer and reader, but need not agree with anything outside
/// this format.
fn token_id_of(token: &str) -> u32 {
    match token {
        "+" => 0,
        "-" => 1,
        "*" => 2,
        "/" => 3,
        "++" => 4,
        "--" => 5,
        "[" => 6,
        _ => u32::MAX,
    }
}

fn token_of_id(id: u32) -> Option<&'static str> {
    match id {
        0 => Some("+"),
        1 => Some("-"),
        2 => Some("*"),
        3 => Some("/"),
        4 => Some("++"),
        5 => Some("--"),
        6 => Some("["),
        _ => None,
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn u8(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.pos)?;
        self.pos += 1;
        Some(b)
    }

    fn u32(&mut self) -> Option<u32> {
        let slice = self.bytes.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_le_bytes(slice.try_into().unwrap()))
    }

    /// A length-prefixed string whose length includes the trailing null (§4.8).
    fn string(&mut self) -> Option<String> {
        let len = self.u8()? as usize;
        if len == 0 {
            return None;
        }
        let slice = self.bytes.get(self.pos..self.pos + len)?;
        self.pos += len;
        let without_null = &slice[..len - 1];
        String::from_utf8(without_null.to_vec()).ok()
    }

    fn member(&mut self) -> Option<MemberRecord> {
        Some(MemberRecord {
            name: self.string()?,
            type_name: self.string()?,
            is_mutable: self.u8()? != 0,
            is_reference: self.u8()? != 0,
            is_reference_mutable: self.u8()? != 0,
            array_size: self.u32()?,
        })
    }
}

pub fn parse_module(bytes: &[u8], errors: &mut ErrorState) -> Option<ModuleInfo> {
    if bytes.len() < 10 || bytes[0..4] != MAGIC {
        errors.raise(
            Location::unknown(),
            ErrorKind::MalformedModuleInfo("missing magic".to_string()),
        );
        return None;
    }
    if bytes[4] != VERSION {
        errors.raise(
            Location::unknown(),
            ErrorKind::MalformedModuleInfo(format!("unsupported version {}", bytes[4])),
        );
        return None;
    }

    let mut r = Reader::new(bytes);
    r.pos = 5;
    let type_count = r.u32()? as usize;
    let code_thing_count = r.u32()? as usize;

    let mut types = Vec::with_capacity(type_count);
    for _ in 0..type_count {
        let name = r.string()?;
        let member_count = r.u8()? as usize;
        let mut members = Vec::with_capacity(member_count);
        for _ in 0..member_count {
            members.push(r.member()?);
        }
        let size = r.u32()?;
        types.push(TypeRecord { name, members, size });
    }

    let mut code_things = Vec::with_capacity(code_thing_count);
    for _ in 0..code_thing_count {
        let kind = r.u8()?;
        let payload = match kind {
            0 => CodeThingPayload::Function { name: r.string()? },
            1 => {
                let token_id = r.u32()?;
                if token_of_id(token_id).is_none() {
                    errors.raise(
                        Location::unknown(),
                        ErrorKind::MalformedModuleInfo(format!("unknown operator token id {token_id}")),
                    );
                }
                CodeThingPayload::Operator { token_id }
            }
            other => {
                errors.raise(
                    Location::unknown(),
                    ErrorKind::MalformedModuleInfo(format!("unknown code-thing kind {other}")),
                );
                return None;
            }
        };

        let param_count = r.u8()? as usize;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            params.push(r.member()?);
        }
        code_things.push(CodeThingRecord { payload, params });
    }

    Some(ModuleInfo { types, code_things })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_single_aggregate_type() {
        let info = ModuleInfo {
            types: vec![TypeRecord {
                name: "Point".to_string(),
                members: vec![MemberRecord {
                    name: "x".to_string(),
                    type_name: "int".to_string(),
                    is_mutable: true,
                    is_reference: false,
                    is_reference_mutable: false,
                    array_size: 0,
                }],
                size: 4,
            }],
            code_things: vec![CodeThingRecord {
                payload: CodeThingPayload::Function { name: "area".to_string() },
                params: vec![MemberRecord {
                    name: "p".to_string(),
                    type_name: "Point".to_string(),
                    is_mutable: false,
                    is_reference: true,
                    is_reference_mutable: false,
                    array_size: 0,
                }],
            }],
        };

        let bytes = info.to_bytes();
        assert_eq!(&bytes[0..4], &MAGIC);
        assert_eq!(bytes[4], VERSION);

        let mut errors = ErrorState::new();
        let parsed = parse_module(&bytes, &mut errors).expect("valid module");
        assert!(!errors.has_errored());
        assert_eq!(parsed.types.len(), 1);
        assert_eq!(parsed.types[0].name, "Point");
        assert_eq!(parsed.types[0].members[0].name, "x");
        assert_eq!(parsed.code_things.len(), 1);
        assert_eq!(parsed.code_things[0].params[0].name, "p");
        assert!(parsed.code_things[0].params[0].is_reference);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut errors = ErrorState::new();
        assert!(parse_module(&[0, 0, 0, 0, 0, 0, 0, 0, 0, 0], &mut errors).is_none());
        assert!(errors.has_errored());
    }
}
