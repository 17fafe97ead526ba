//! `--dump-dot` (§4.9, §6): writes one `.dot` file per code-thing per requested stage, next to the
//! output artifact.

use roo_air::CodeThingAir;
use roo_ir::{CodeThingId, ParseResult};
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotStage {
    Ast,
    Air,
    Interference,
}

impl DotStage {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ast" => Some(DotStage::Ast),
            "air" => Some(DotStage::Air),
            "interference" => Some(DotStage::Interference),
            _ => None,
        }
    }

    fn extension(self) -> &'static str {
        match self {
            DotStage::Ast => "ast",
            DotStage::Air => "air",
            DotStage::Interference => "interference",
        }
    }
}

fn code_thing_file_name(parse: &ParseResult, id: CodeThingId) -> String {
    let thing = &parse.code_things[id];
    thing.mangled_name.clone().unwrap_or_else(|| thing.display_name().to_string())
}

/// Called right after IR completion, once mangled names exist: dumps the AST for every code-thing
/// with a body.
pub fn dump_ast(parse: &ParseResult, out_dir: &Path) -> io::Result<()> {
    for (id, thing) in parse.code_things.iter() {
        if thing.ast_root.is_none() {
            continue;
        }
        let dot = roo_dot::ast_to_dot(thing);
        let path = out_dir.join(format!("{}.{}.dot", code_thing_file_name(parse, id), DotStage::Ast.extension()));
        std::fs::write(path, dot)?;
    }
    Ok(())
}

/// Called right after register allocation: dumps AIR and/or the interference graph for every
/// code-thing that was allocated.
pub fn dump_air_and_interference(
    parse: &ParseResult,
    things: &[(CodeThingId, CodeThingAir)],
    stages: &[DotStage],
    out_dir: &Path,
) -> io::Result<()> {
    let want_air = stages.contains(&DotStage::Air);
    let want_interference = stages.contains(&DotStage::Interference);
    if !want_air && !want_interference {
        return Ok(());
    }

    for (id, air) in things {
        let name = code_thing_file_name(parse, *id);
        if want_air {
            let dot = roo_dot::air_to_dot(&air.program);
            std::fs::write(out_dir.join(format!("{name}.{}.dot", DotStage::Air.extension())), dot)?;
        }
        if want_interference {
            let dot = roo_dot::interference_to_dot(&air.slots);
            std::fs::write(out_dir.join(format!("{name}.{}.dot", DotStage::Interference.extension())), dot)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_round_trip() {
        assert_eq!(DotStage::parse("ast"), Some(DotStage::Ast));
        assert_eq!(DotStage::parse("air"), Some(DotStage::Air));
        assert_eq!(DotStage::parse("interference"), Some(DotStage::Interference));
        assert_eq!(DotStage::parse("bogus"), None);
    }
}
