//! Attribute data model (§3a). Parsed generically here; interpreted by `Parser` at the call site
//! since what an attribute means depends on what it's attached to (a module-level `#[Name(...)]`
//! sets `ParseResult::name`, a code-thing-level `#[Entry]` sets a bit on that thing's `AttribSet`).

#[derive(Debug, Clone, PartialEq)]
pub enum AttrArg {
    Ident(String),
    Str(String),
    UInt(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<AttrArg>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, args: Vec<AttrArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn arg_str(&self, idx: usize) -> Option<&str> {
        match self.args.get(idx) {
            Some(AttrArg::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn arg_ident(&self, idx: usize) -> Option<&str> {
        match self.args.get(idx) {
            Some(AttrArg::Ident(s)) => Some(s),
            _ => None,
        }
    }

    pub fn arg_uint(&self, idx: usize) -> Option<u32> {
        match self.args.get(idx) {
            Some(AttrArg::UInt(n)) => Some(*n),
            _ => None,
        }
    }
}
