//! Lexing and parsing (§3a): turns Roo source text into a `roo_ir::ParseResult` ready for the
//! semantic passes. Nothing here resolves names or computes layout — that's `roo-ir`'s job once
//! parsing is done.

pub mod attrs;
pub mod lexer;
pub mod parser;
pub mod token;

pub use attrs::{AttrArg, Attribute};
pub use lexer::Lexer;
pub use parser::parse_tokens;
pub use token::{Token, TokenKind};

use roo_ir::ParseResult;

/// Lex and parse one source file, merging lexer diagnostics into the result's top-level error
/// sink so a lex failure trips `ParseResult::has_errored()` exactly like a parse failure would.
pub fn parse_source(source: &str, file: Option<&'static str>) -> ParseResult {
    let mut result = ParseResult::new();
    let tokens = Lexer::new(source, file).tokenize(&mut result.errors);
    let parsed = parse_tokens(&tokens, file);

    // `parse_tokens` builds its own `ParseResult` (it needs one to push into while parsing); fold
    // it into the one already carrying the lexer's diagnostics rather than discarding either.
    result.is_module = parsed.is_module;
    result.name = parsed.name;
    result.target_arch = parsed.target_arch;
    result.dependencies = parsed.dependencies;
    result.code_things = parsed.code_things;
    result.types = parsed.types;
    result.strings = parsed.strings;
    result.files_to_link = parsed.files_to_link;
    result.errors.absorb(&parsed.errors);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_program_end_to_end() {
        let result = parse_source("#[Entry]\nfn main() -> int {\n  return 0\n}\n", None);
        assert!(!result.has_errored());
        assert_eq!(result.code_things.iter().count(), 1);
    }

    #[test]
    fn lexer_error_surfaces_through_parse_source() {
        let result = parse_source("fn f() {\n  x: int = \"unterminated\n}\n", None);
        assert!(result.has_errored());
    }
}
