//! `rillc`: compile one or more Rill translation units to object files and,
//! unless `-bm`/`--bm` is given, link them into `a.out` (§6.1).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use rillc::driver::{self, Options};

/// `rillc [options] file1 file2 …` (§6.1). `-O` takes its level attached
/// (`-O0`..`-O3`, clap's usual short-option-with-value parsing), matching
/// the literal flag spelling; `--bm`/`--da`/`--di` are spelled as long
/// flags since clap has no single-dash multi-letter flag form.
#[derive(Parser)]
#[command(name = "rillc", version, about = "Rill compiler front end and code generator")]
struct Cli {
  /// Pass-manager level.
  #[arg(short = 'O', default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=3))]
  opt_level: u8,

  /// Build object files only; skip linking.
  #[arg(long = "bm")]
  build_modules_only: bool,

  /// Dump the AST of each file to stderr.
  #[arg(long = "da")]
  dump_ast: bool,

  /// Dump the backend IR of each module to stderr.
  #[arg(long = "di")]
  dump_ir: bool,

  /// Raise logging verbosity (repeatable: `-v` info, `-vv` debug, `-vvv` trace).
  #[arg(short = 'v', action = clap::ArgAction::Count)]
  verbose: u8,

  /// Source files to compile.
  #[arg(required = true)]
  files: Vec<PathBuf>,
}

fn level_for(verbose: u8) -> LevelFilter {
  match verbose {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Info,
    2 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  let _ = TermLogger::init(level_for(cli.verbose), Config::default(), TerminalMode::Mixed, ColorChoice::Auto);

  let opts = Options {
    opt_level: cli.opt_level,
    build_modules_only: cli.build_modules_only,
    dump_ast: cli.dump_ast,
    dump_ir: cli.dump_ir,
  };

  let mut objects = Vec::new();
  let mut had_error = false;

  for file in &cli.files {
    match driver::compile_unit(file, &opts) {
      Ok(outcome) => {
        had_error |= outcome.had_error;
        if let Some(path) = outcome.object_path { objects.push(path) }
      }
      Err(e) => {
        log::error!("{}: {e:#}", file.display());
        had_error = true;
      }
    }
  }

  if had_error {
    return ExitCode::FAILURE;
  }

  if !opts.build_modules_only {
    if let Err(e) = driver::link(&objects, std::path::Path::new("a.out")) {
      log::error!("{e:#}");
      return ExitCode::FAILURE;
    }
  }

  ExitCode::SUCCESS
}
