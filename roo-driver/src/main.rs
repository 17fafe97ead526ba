//! The `roo` driver binary (§6): the CLI surface plus phase orchestration the original's
//! `main.cpp`/`Compile` function performed in a single translation unit. Splits cleanly along the
//! spec's own control-flow sentence: parse every file, merge, resolve dependencies, run semantic
//! passes, complete the IR, allocate registers and generate code per code-thing, link, and write —
//! checking for accumulated errors at the three synchronization points named in §5/§7 between
//! semantic passes, IR completion, and code generation.

mod discover;
mod dots;
mod link;
mod merge;
mod modules;

use clap::{ArgAction, Args, Parser, Subcommand};
use dots::DotStage;
use roo_diagnostics::{Diagnostic, ErrorKind, ErrorState, Location};
use roo_ir::{Dependency, ParseResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "roo", version, about = "The Roo compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile every `.roo` file in a directory to a linked ELF artifact.
    Build(BuildArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Directory to compile (default: current directory).
    #[arg(default_value = ".")]
    dir: PathBuf,

    /// Output artifact path (default: ./<program name>).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit a relocatable object plus a `.roomod` descriptor instead of a linked executable.
    #[arg(long)]
    module: bool,

    /// Where to write the `.roomod` descriptor (only meaningful with `--module`).
    #[arg(long)]
    emit_mod: Option<PathBuf>,

    /// Extra external relocatables to link, in addition to `#[LinkFile(...)]` attributes and
    /// module dependencies.
    #[arg(long = "link")]
    link: Vec<String>,

    /// Stages to dump as `.dot` files: `ast`, `air`, `interference` (repeatable).
    #[arg(long = "dump-dot")]
    dump_dot: Vec<String>,

    /// Raise the log level; repeatable (`-v` = debug, `-vv` = trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let Command::Build(args) = cli.command;
    init_logging(args.verbose);

    match run_build(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for d in diagnostics {
        eprintln!("{d}");
    }
}

/// Returns `Ok(true)` on a clean build, `Ok(false)` if source-level diagnostics accumulated
/// (already printed), and `Err` for a hard I/O-shaped failure unrelated to the program being
/// compiled.
fn run_build(args: &BuildArgs) -> anyhow::Result<bool> {
    log::info!("discovering .roo files in {}", args.dir.display());
    let paths = discover::find_roo_files(&args.dir)?;
    if paths.is_empty() {
        log::warn!("no .roo files found in {}", args.dir.display());
    }

    let mut parsed = Vec::with_capacity(paths.len());
    for path in paths {
        log::debug!("parsing {}", path.display());
        let source = std::fs::read_to_string(&path)?;
        let leaked_path: &'static str = Box::leak(path.to_string_lossy().into_owned().into_boxed_str());
        let result = roo_syntax::parse_source(&source, Some(leaked_path));
        parsed.push((path, result));
    }

    let mut parse = merge::merge_parsed(parsed);
    merge::ensure_default_primitives(&mut parse);
    parse.is_module |= args.module;

    if parse.name.is_none() {
        parse.errors.raise(Location::unknown(), ErrorKind::NoProgramName);
    }

    resolve_dependencies(&mut parse);

    if parse.has_errored() {
        log::error!("aborting after parsing and dependency resolution");
        print_diagnostics(parse.errors.diagnostics());
        return Ok(false);
    }

    log::info!("running semantic passes");
    roo_ir::passes::run_semantic_passes(&mut parse);
    if !check_sync_point(&parse, "semantic passes") {
        return Ok(false);
    }

    log::info!("completing IR");
    roo_ir::complete_ir(&mut parse);
    if !check_sync_point(&parse, "IR completion") {
        return Ok(false);
    }

    if let Some(out_dir) = dump_dir(args) {
        let stages: Vec<DotStage> = args.dump_dot.iter().filter_map(|s| DotStage::parse(s)).collect();
        if stages.contains(&DotStage::Ast) {
            std::fs::create_dir_all(&out_dir)?;
            dots::dump_ast(&parse, &out_dir)?;
        }
    }

    log::info!("allocating registers");
    let abi = roo_isa::x86_64_abi();
    let things = roo_air::allocate_for_program(&mut parse, &abi);

    if let Some(out_dir) = dump_dir(args) {
        let stages: Vec<DotStage> = args.dump_dot.iter().filter_map(|s| DotStage::parse(s)).collect();
        if stages.contains(&DotStage::Air) || stages.contains(&DotStage::Interference) {
            std::fs::create_dir_all(&out_dir)?;
            dots::dump_air_and_interference(&parse, &things, &stages, &out_dir)?;
        }
    }

    log::info!("generating code");
    let mut codegen_errors = ErrorState::new();
    let mut scratch_errors = ErrorState::new();
    let mut file = roo_isa::generate_elf_file(&parse, &things, parse.is_module, &mut scratch_errors);
    link::absorb_non_linking_diagnostics(&mut codegen_errors, &scratch_errors);

    let mut extra_links = parse.files_to_link.clone();
    extra_links.extend(args.link.iter().cloned());
    if !extra_links.is_empty() {
        log::debug!("linking {} external object(s)", extra_links.len());
        link::link_external_objects(&mut file, &extra_links, &mut codegen_errors);
    }

    if codegen_errors.has_errored() {
        log::error!("aborting after code generation");
        print_diagnostics(codegen_errors.diagnostics());
        return Ok(false);
    }

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("./{}", parse.name.clone().unwrap_or_default())));
    let mut write_errors = ErrorState::new();
    let bytes = file.write(&mut write_errors);
    if write_errors.has_errored() {
        log::error!("discarding output: ELF writer reported an error");
        print_diagnostics(write_errors.diagnostics());
        return Ok(false);
    }
    std::fs::write(&output_path, &bytes)?;
    if !parse.is_module {
        make_executable(&output_path)?;
    }
    log::info!("wrote {}", output_path.display());

    if parse.is_module {
        let mod_path = args
            .emit_mod
            .clone()
            .unwrap_or_else(|| output_path.with_extension("roomod"));
        let info = roo_elf::ModuleInfo::from_parse_result(&parse);
        std::fs::write(&mod_path, info.to_bytes())?;
        log::info!("wrote module descriptor {}", mod_path.display());
    }

    Ok(true)
}

fn dump_dir(args: &BuildArgs) -> Option<PathBuf> {
    if args.dump_dot.is_empty() {
        return None;
    }
    let dir = match &args.output {
        Some(output) => output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        None => PathBuf::from("."),
    };
    Some(dir)
}

fn check_sync_point(parse: &ParseResult, stage: &str) -> bool {
    if parse.has_errored() {
        log::error!("aborting after {stage}");
        let mut all = Vec::new();
        all.extend(parse.errors.diagnostics().iter().cloned());
        for thing in parse.code_things.values() {
            all.extend(thing.error_state.diagnostics().iter().cloned());
        }
        for ty in parse.types.values() {
            all.extend(ty.error_state.diagnostics().iter().cloned());
        }
        print_diagnostics(&all);
        false
    } else {
        true
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Resolves every `Dependency` against the filesystem (the original's `ImportModule`): a local
/// dependency's companion relocatable is queued for linking and its `.roomod` descriptor is
/// imported as prototypes; a remote dependency isn't supported yet, matching the original's own
/// `// TODO` for `Type::REMOTE`.
fn resolve_dependencies(parse: &mut ParseResult) {
    let dependencies = parse.dependencies.clone();
    for dep in dependencies {
        match dep {
            Dependency::Local(name) => {
                if !Path::new(&name).exists() {
                    parse.errors.raise(Location::unknown(), ErrorKind::MissingModule(name.clone()));
                    continue;
                }
                parse.files_to_link.push(name.clone());

                let mod_path = format!("{name}.roomod");
                match std::fs::read(&mod_path) {
                    Ok(bytes) => {
                        if let Some(info) = roo_elf::parse_module(&bytes, &mut parse.errors) {
                            modules::import_module_info(parse, &info);
                        }
                    }
                    Err(_) => {
                        parse.errors.raise(Location::unknown(), ErrorKind::MissingModule(mod_path));
                    }
                }
            }
            Dependency::Remote(url) => {
                log::warn!("remote dependency '{url}' is not supported yet");
            }
        }
    }
}
