//! End-to-end scenarios: source text through the full `lexer -> parser ->
//! Cg -> RecordingBackend` pipeline, asserting on the recorded instruction
//! log and the unit's reported diagnostics. `RecordingBackend` never
//! executes anything — it is a static code generator fake — so every
//! assertion here is about the *shape* of the emitted IR, not about what
//! would happen if it ran.

use rillc::ast::item::Unit;
use rillc::backend::RecordingBackend;
use rillc::cg::{func, Cg};
use rillc::diag::Sink;
use rillc::parser;

/// Parse and fully codegen one translation unit, mirroring
/// `driver::compile_unit`'s own success test.
fn compile(name: &str, src: &str) -> (RecordingBackend, bool) {
  let mut parse_diag = Sink::new();
  let unit: Unit = parser::parse_unit(name.to_string(), src.to_string(), &mut parse_diag);
  let mut cg = Cg::new(&unit, RecordingBackend::new());
  let gen_ok = func::gen_unit(&mut cg).is_some();
  let had_error = parse_diag.had_error() || cg.diag.had_error() || !gen_ok;
  (cg.backend, !had_error)
}

/// §8.4 scenario 1: a single-element tuple return detuples to its element,
/// so `(42,)` against a `(s32)` return type and `42` against a plain `s32`
/// return type produce the same `ret` instruction once both are folded.
#[test]
fn single_element_tuple_return_matches_bare_scalar() {
  let (tuple_backend, tuple_ok) = compile("f.rill", "fn f() -> (s32) { return (42,); }");
  let (scalar_backend, scalar_ok) = compile("g.rill", "fn g() -> s32 { return 42; }");
  assert!(tuple_ok, "tuple-returning function failed to compile");
  assert!(scalar_ok, "scalar-returning function failed to compile");
  assert_eq!(tuple_backend.log, scalar_backend.log);
  assert_eq!(tuple_backend.log.last().map(String::as_str), Some("ret ValueId(0)"));
}

/// §8.4 scenario 2: a global with `@section`/`@align` attributes emits a
/// private global of the declared type, with its section, alignment, and
/// folded initializer all recorded.
#[test]
fn global_with_section_and_align() {
  let (backend, ok) = compile("g.rill", r#"let @section("kdata") @align(64) x = 0x1234_u32;"#);
  assert!(ok, "global declaration failed to compile");
  let g = backend.global("x").expect("no global named x recorded");
  assert_eq!(g.linkage, rillc::backend::Linkage::Internal);
  assert_eq!(g.align, Some(64));
  assert_eq!(g.section, Some("kdata"));
  let init = g.init.expect("global has no initializer recorded");
  assert_eq!(backend.read_const_int(init), Some(0x1234));
}

/// §8.4 scenario 3: `defer`s run in reverse declaration order ahead of the
/// `ret`, so the second defer's side effect is emitted before the first's.
#[test]
fn defer_runs_in_reverse_order() {
  let src = r#"
    fn printf(fmt: string, args: ...) -> s32;
    fn f() -> unit {
      defer printf("a");
      defer printf("b");
      return;
    }
  "#;
  let (backend, ok) = compile("defer.rill", src);
  assert!(ok, "function with defers failed to compile");
  let idx_b = backend.log.iter().position(|l| l.contains("global_string \"b\"")).expect("no global_string \"b\"");
  let idx_a = backend.log.iter().position(|l| l.contains("global_string \"a\"")).expect("no global_string \"a\"");
  assert!(idx_b < idx_a, "defer \"b\" must run before defer \"a\": log = {:#?}", backend.log);
  assert_eq!(backend.log.last().map(String::as_str), Some("ret void"));
}

/// §8.4 scenario 4: a `for`'s `else` is wired to run only on the
/// condition-false edge, never on a `break`'s edge out of the loop. This is
/// a static-backend fake, so "runs only on fallthrough" is checked as a
/// control-flow wiring fact: `break` branches straight to the loop's exit
/// block, bypassing `else`, while the condition's false edge targets
/// `else` itself.
#[test]
fn for_else_is_bypassed_by_break() {
  let src = r#"
    fn side() -> unit;
    fn f() -> unit {
      for let i: s32 = 0; i < 3; i = i + 1 {
        break;
      } else {
        side();
      }
      return;
    }
  "#;
  let (backend, ok) = compile("for_else.rill", src);
  assert!(ok, "for/else function failed to compile");

  // Blocks are labelled at creation time, in `gen_for`'s fixed order:
  // cond, body, post, else, exit.
  // `fresh_block` suffixes every label with a unit-wide counter (e.g.
  // `for.else3`), so match on the label as a prefix rather than in full.
  let block_id = |label: &str| -> usize {
    let line = backend.log.iter().find(|l| l.contains(&format!("({label}"))).unwrap_or_else(|| panic!("no block labelled {label}"));
    let bb = line.split(':').next().unwrap();
    bb.trim_start_matches("bb").parse().unwrap()
  };
  let else_id = block_id("for.else");
  let exit_id = block_id("for.exit");

  // `els` is present, so the condition's false edge targets `for.else`
  // itself, not the loop's exit directly (that only happens when there is
  // no `else` clause at all).
  let cond_br = backend.log.iter().find(|l| l.starts_with("br ") && l.contains(',')).expect("no conditional branch");
  assert!(cond_br.ends_with(&format!(", bb{else_id}")), "cond branch should target for.else when present: {cond_br}");

  // The body's own branch is the first unconditional `br` after the
  // conditional one (the loop-entry jump to `for.cond` precedes it): that is
  // `break`'s direct jump to the loop exit, emitted before `for.else` is even
  // reached.
  let cond_br_idx = backend.log.iter().position(|l| l.starts_with("br ") && l.contains(',')).unwrap();
  let break_br = backend.log[cond_br_idx + 1..].iter().find(|l| l.starts_with("br bb") && !l.contains(','))
    .expect("no unconditional branch for break");
  assert_eq!(break_br, &format!("br bb{exit_id}"), "break must branch straight to the loop exit, bypassing else");
}

/// §8.4 scenario 5: assigning a `string` literal to a `T = s32 | string`
/// variable selects the `string` variant, both for the declared-let
/// initializer and for `is`-narrowing's variant-index comparison.
#[test]
fn union_let_selects_string_variant() {
  let src = r#"
    typedef T = s32 | string;
    fn f() -> bool {
      let x: T = "hi";
      return x is string;
    }
  "#;
  let (backend, ok) = compile("union.rill", src);
  assert!(ok, "union-typed let failed to compile");
  // `gen_union_assign` writes the payload then the tag byte; the payload
  // store for a `string` carries its global_string constant.
  assert!(backend.log.iter().any(|l| l.contains("global_string \"hi\"")));
  // `x is string` compares the tag against variant index 1 (string is the
  // second member of `s32 | string`); `x is s32` would compare against 0.
  let tag_cmp = backend.log.iter().find(|l| l.starts_with("icmp")).expect("no tag comparison emitted");
  assert!(tag_cmp.contains("ValueId"), "unexpected icmp operands: {tag_cmp}");
}

/// §8.4 scenario 5b: the symmetric `x is s32` test compares against variant
/// index 0, proving the two tests are not accidentally identical.
#[test]
fn union_is_test_uses_distinct_variant_indices() {
  let string_src = r#"
    typedef T = s32 | string;
    fn f(x: T) -> bool { return x is string; }
  "#;
  let int_src = r#"
    typedef T = s32 | string;
    fn f(x: T) -> bool { return x is s32; }
  "#;
  let (string_backend, string_ok) = compile("t1.rill", string_src);
  let (int_backend, int_ok) = compile("t2.rill", int_src);
  assert!(string_ok && int_ok, "union `is` functions failed to compile");
  // Both build an icmp against a constant tag index; the two constants must
  // differ since `string`/`s32` sit at different variant positions.
  assert_ne!(string_backend.log, int_backend.log, "`is string` and `is s32` must lower differently");
}

/// §8.4 scenario 6: `a || b` never evaluates `b` on the straight-line path.
/// This is realized as a conditional branch: the short-circuit block exits
/// to the merge block before `b`'s code (here, a call to `side()`) is even
/// reached, so the call only ever appears after the branch point, gated
/// behind the rhs block.
#[test]
fn or_does_not_evaluate_rhs_unconditionally() {
  let src = r#"
    fn side() -> bool;
    fn f(c: bool) -> bool { return c || side(); }
  "#;
  let (backend, ok) = compile("shortcircuit.rill", src);
  assert!(ok, "short-circuit function failed to compile");

  let calls: Vec<usize> = backend.log.iter().enumerate().filter(|(_, l)| l.starts_with("call ")).map(|(i, _)| i).collect();
  assert_eq!(calls.len(), 1, "side() should be called exactly once in the generated IR: {:#?}", backend.log);
  let call_idx = calls[0];

  let cond_br_idx = backend.log.iter().position(|l| l.starts_with("br ") && l.contains(','))
    .expect("no conditional branch for ||");
  assert!(cond_br_idx < call_idx, "the call must be gated behind the conditional branch");

  // The short-circuit block's own unconditional exit to merge must appear
  // strictly before the call: it never reaches `side()` at all.
  let short_circuit_exit = backend.log[cond_br_idx + 1..call_idx].iter().any(|l| l.starts_with("br bb") && !l.contains(','));
  assert!(short_circuit_exit, "expected an unconditional branch to merge before the call: {:#?}", backend.log);
}
