//! The driver (§5, §6.1): turns CLI-named source files into object files
//! and, unless `-bm`/`--bm` is passed, one linked executable. This is the
//! only module besides `main.rs` that uses `anyhow` (§7: every other layer
//! follows "internal calls return optionals").

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::ast::{ExprKind, Item, LBinOp, StmtKind, TypeKind, Unit};
use crate::backend::RecordingBackend;
use crate::cg::{self, func};
use crate::diag::Sink;

/// Resolved CLI flags that affect a single unit's compilation (§6.1).
#[derive(Copy, Clone, Debug)]
pub struct Options {
  pub opt_level: u8,
  pub build_modules_only: bool,
  pub dump_ast: bool,
  pub dump_ir: bool,
}

/// One source file's result. `object_path` is `None` whenever `had_error` is
/// set — emission never proceeds past a diagnosed failure (§7).
pub struct UnitOutcome {
  pub object_path: Option<PathBuf>,
  pub had_error: bool,
}

/// Compile one translation unit start to finish (§5: "single-threaded per
/// translation unit", "every arena, cache, and scope is owned by exactly one
/// compilation"): read the file, lex+parse it, run the full `Cg` pipeline
/// against a fresh backend module, verify, optimize, and emit an object.
pub fn compile_unit(path: &Path, opts: &Options) -> Result<UnitOutcome> {
  let source_text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
  let source_name = path.to_string_lossy().into_owned();

  let mut parse_diag = Sink::new();
  parse_diag.set_source(&source_text);
  let unit = crate::parser::parse_unit(source_name.clone(), source_text, &mut parse_diag);

  if opts.dump_ast {
    eprintln!("--- ast: {source_name} ---");
    eprint!("{}", dump_unit(&unit));
  }

  log::debug!("{source_name}: parsed, entering codegen");
  let mut cg = cg::Cg::new(&unit, RecordingBackend::new());
  cg.diag.set_source(&unit.source_text);
  let gen_ok = func::gen_unit(&mut cg).is_some();
  log::debug!("{source_name}: codegen {}", if gen_ok { "complete" } else { "aborted" });

  print_diagnostics(&source_name, &parse_diag);
  print_diagnostics(&source_name, &cg.diag);
  let had_error = parse_diag.had_error() || cg.diag.had_error() || !gen_ok;
  if had_error {
    return Ok(UnitOutcome { object_path: None, had_error: true });
  }

  if let Err(msg) = cg.backend.verify_module() {
    log::error!("{source_name}: module verification failed: {msg}");
    return Ok(UnitOutcome { object_path: None, had_error: true });
  }
  if let Err(msg) = cg.backend.run_passes(opts.opt_level) {
    log::error!("{source_name}: optimization failed: {msg}");
    return Ok(UnitOutcome { object_path: None, had_error: true });
  }

  if opts.dump_ir {
    eprintln!("--- ir: {source_name} ---");
    for line in &cg.backend.log { eprintln!("{line}") }
  }

  let object_path = object_path_for(path)?;
  if let Err(msg) = cg.backend.emit_object(&object_path) {
    log::error!("{source_name}: could not write object file '{}': {msg}", object_path.display());
    return Ok(UnitOutcome { object_path: None, had_error: true });
  }

  Ok(UnitOutcome { object_path: Some(object_path), had_error: false })
}

/// "Any non-flag is a source file; each must have an extension (used to
/// derive `name.o`)" (§6.1).
fn object_path_for(path: &Path) -> Result<PathBuf> {
  if path.extension().is_none() {
    bail!("source file '{}' has no extension", path.display());
  }
  Ok(path.with_extension("o"))
}

/// Without `-bm`, link every object the run produced with the system C
/// compiler as linker (§6.1: `cc f1.o f2.o … -o a.out`).
pub fn link(objects: &[PathBuf], output: &Path) -> Result<()> {
  let status = Command::new("cc").args(objects).arg("-o").arg(output).status()
    .context("invoking cc as the linker")?;
  if !status.success() {
    bail!("linking failed: cc exited with {status}");
  }
  Ok(())
}

fn print_diagnostics(source_name: &str, sink: &Sink) {
  if sink.diagnostics().is_empty() { return }
  let mut out = String::new();
  sink.format_into(&mut out);
  for line in out.lines() { eprintln!("{source_name}: {line}") }
}

/// `-da`: a plain S-expression rendering of every top-level item (§6.1).
/// Not a reparsable format, just a readable trace of what the parser built.
fn dump_unit(unit: &Unit) -> String {
  let mut out = String::new();
  for item in unit.items().iter() { dump_item(unit, item, &mut out) }
  out
}

fn dump_item(unit: &Unit, item: &Item, out: &mut String) {
  use std::fmt::Write as _;
  match item {
    Item::Fn(f) => {
      let params: Vec<String> = f.params.iter().map(|p| format!("{}: {}", p.name, dump_type(unit, p.ty))).collect();
      let _ = writeln!(out, "(fn {} ({}) -> {}", f.name, params.join(", "), dump_type(unit, f.ret));
      if let Some(body) = f.body { dump_stmt(unit, body, 1, out) }
      let _ = writeln!(out, ")");
    }
    Item::Typedef(t) => { let _ = writeln!(out, "(typedef {} {})", t.name, dump_type(unit, t.ty)); }
    Item::Effect(e) => { let _ = writeln!(out, "(effect {} {})", e.name, dump_type(unit, e.ty)); }
    Item::Import(i) => { let _ = writeln!(out, "(import {})", i.path); }
    Item::Module(m) => { let _ = writeln!(out, "(module {})", m.name); }
  }
}

fn indent(depth: usize, out: &mut String) { for _ in 0..depth { out.push_str("  ") } }

fn dump_stmt(unit: &Unit, id: crate::ast::StmtId, depth: usize, out: &mut String) {
  use std::fmt::Write as _;
  indent(depth, out);
  match &unit.stmt(id).kind {
    StmtKind::Block(stmts) => {
      let _ = writeln!(out, "(block");
      for &s in stmts { dump_stmt(unit, s, depth + 1, out) }
      indent(depth, out);
      let _ = writeln!(out, ")");
    }
    StmtKind::Return(e) => {
      match e {
        Some(e) => { let _ = writeln!(out, "(return {})", dump_expr(unit, *e)); }
        None => { let _ = writeln!(out, "(return)"); }
      }
    }
    StmtKind::Defer(s) => {
      let _ = writeln!(out, "(defer");
      dump_stmt(unit, *s, depth + 1, out);
      indent(depth, out);
      let _ = writeln!(out, ")");
    }
    StmtKind::Break => { let _ = writeln!(out, "(break)"); }
    StmtKind::Continue => { let _ = writeln!(out, "(continue)"); }
    StmtKind::If { cond, then, els, .. } => {
      let _ = writeln!(out, "(if {}", dump_expr(unit, *cond));
      dump_stmt(unit, *then, depth + 1, out);
      if let Some(els) = els { dump_stmt(unit, *els, depth + 1, out) }
      indent(depth, out);
      let _ = writeln!(out, ")");
    }
    StmtKind::Let { name, ty, init, .. } => {
      let ty = ty.map(|t| dump_type(unit, t)).unwrap_or_default();
      let init = init.map(|e| dump_expr(unit, e)).unwrap_or_default();
      let _ = writeln!(out, "(let {name} {ty} {init})");
    }
    StmtKind::GLet { name, ty, init, .. } => {
      let ty = ty.map(|t| dump_type(unit, t)).unwrap_or_default();
      let _ = writeln!(out, "(glet {name} {ty} {})", dump_expr(unit, *init));
    }
    StmtKind::Using { name, ty, init } => {
      let init = init.map(|e| dump_expr(unit, e)).unwrap_or_default();
      let _ = writeln!(out, "(using {name} {} {init})", dump_type(unit, *ty));
    }
    StmtKind::For { cond, body, .. } => {
      let cond = cond.map(|e| dump_expr(unit, e)).unwrap_or_default();
      let _ = writeln!(out, "(for {cond}");
      dump_stmt(unit, *body, depth + 1, out);
      indent(depth, out);
      let _ = writeln!(out, ")");
    }
    StmtKind::Expr(e) => { let _ = writeln!(out, "{}", dump_expr(unit, *e)); }
    StmtKind::Assign { op, lhs, rhs } => {
      let _ = writeln!(out, "({op:?} {} {})", dump_expr(unit, *lhs), dump_expr(unit, *rhs));
    }
  }
}

fn dump_expr(unit: &Unit, id: crate::ast::ExprId) -> String {
  match &unit.expr(id).kind {
    ExprKind::Tuple(elems) => format!("(tuple {})", elems.iter().map(|&e| dump_expr(unit, e)).collect::<Vec<_>>().join(" ")),
    ExprKind::Call { callee, args } => {
      format!("(call {} {})", dump_expr(unit, *callee), args.iter().map(|&a| dump_expr(unit, a)).collect::<Vec<_>>().join(" "))
    }
    ExprKind::Type(t) => dump_type(unit, *t),
    ExprKind::Var(name) => name.to_string(),
    ExprKind::Selector(a, b) => format!("{a}::{b}"),
    ExprKind::Int { value, .. } => value.to_string(),
    ExprKind::Flt { value, .. } => value.to_string(),
    ExprKind::Str(s) => format!("{s:?}"),
    ExprKind::Bool(b) => b.to_string(),
    ExprKind::Agg { ty, fields } => {
      let fields: Vec<String> = fields.iter().map(|(name, e)| match name {
        Some(n) => format!("{n}: {}", dump_expr(unit, *e)),
        None => dump_expr(unit, *e),
      }).collect();
      format!("(agg {} {})", dump_type(unit, *ty), fields.join(", "))
    }
    ExprKind::Bin { op, lhs, rhs } => format!("({op:?} {} {})", dump_expr(unit, *lhs), dump_expr(unit, *rhs)),
    ExprKind::LBin { op, lhs, rhs } => {
      let op = match op { LBinOp::Or => "||", LBinOp::And => "&&" };
      format!("({op} {} {})", dump_expr(unit, *lhs), dump_expr(unit, *rhs))
    }
    ExprKind::Unary { op, operand } => format!("({op:?} {})", dump_expr(unit, *operand)),
    ExprKind::Index { base, index } => format!("(index {} {})", dump_expr(unit, *base), dump_expr(unit, *index)),
    ExprKind::Explode(e) => format!("(...{})", dump_expr(unit, *e)),
    ExprKind::Eff(e) => format!("({}!)", dump_expr(unit, *e)),
    ExprKind::Access { base, field } => format!("(. {} {field})", dump_expr(unit, *base)),
    ExprKind::Cast { operand, ty } => format!("(as {} {})", dump_expr(unit, *operand), dump_type(unit, *ty)),
    ExprKind::Test { operand, ty } => format!("(is {} {})", dump_expr(unit, *operand), dump_type(unit, *ty)),
    ExprKind::Prop { ty, prop } => format!("(of {} {prop})", dump_type(unit, *ty)),
    ExprKind::InferSize => "?".to_owned(),
  }
}

fn dump_type(unit: &Unit, id: crate::ast::TypeId) -> String {
  match &unit.ty(id).kind {
    TypeKind::Tuple(fields) | TypeKind::Args(fields) => {
      let fields: Vec<String> = fields.iter().map(|(name, t)| match name {
        Some(n) => format!("{n}: {}", dump_type(unit, *t)),
        None => dump_type(unit, *t),
      }).collect();
      format!("({})", fields.join(", "))
    }
    TypeKind::Union(alts) => alts.iter().map(|&t| dump_type(unit, t)).collect::<Vec<_>>().join(" | "),
    TypeKind::Ident(name) => name.to_string(),
    TypeKind::Bool => "bool".to_owned(),
    TypeKind::VarArgs => "...".to_owned(),
    TypeKind::Ptr(t) => format!("*{}", dump_type(unit, *t)),
    TypeKind::Array(t, len) => format!("[{}]{}", dump_expr(unit, *len), dump_type(unit, *t)),
    TypeKind::Slice(t) => format!("[]{}", dump_type(unit, *t)),
    TypeKind::Fn { args, effects, ret } => {
      let effects: Vec<String> = effects.iter().map(|&e| dump_type(unit, e)).collect();
      format!("fn{} {} -> {}", dump_type(unit, *args), effects.join(" "), dump_type(unit, *ret))
    }
    TypeKind::Atom(t) => format!("atomic<{}>", dump_type(unit, *t)),
    TypeKind::Enum(variants) => {
      let variants: Vec<String> = variants.iter().map(|(name, val)| match val {
        Some(v) => format!("{name} = {}", dump_expr(unit, *v)),
        None => name.to_string(),
      }).collect();
      format!("enum({})", variants.join(", "))
    }
  }
}
