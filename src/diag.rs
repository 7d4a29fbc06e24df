//! Diagnostics (§4.2).

use std::fmt::Write as _;
use crate::source::Range;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Severity { Warning, Error, Fatal }

#[derive(Clone, Debug)]
pub struct Diagnostic {
  pub range: Range,
  pub severity: Severity,
  pub message: String,
}

/// A source's line-start offsets, computed once and reused for every
/// diagnostic against that source (scanning from the start per diagnostic,
/// as a literal reading of §4.2 would imply, is quadratic in the number of
/// diagnostics and is avoided here).
struct LineIndex {
  /// `starts[i]` is the byte offset of the first byte of line `i` (0-based).
  starts: Vec<u32>,
}

impl LineIndex {
  fn build(src: &str) -> Self {
    let mut starts = vec![0u32];
    for (i, b) in src.bytes().enumerate() {
      if b == b'\n' { starts.push(u32::try_from(i + 1).expect("source too large")) }
    }
    Self { starts }
  }

  /// `(line, column)`, both 1-based. An offset that lands exactly at the
  /// start of a new line is reported as the last column of the *previous*
  /// line (§4.2), so a diagnostic range produced as "one past the last real
  /// character" (common for EOF and end-of-token ranges) does not point at
  /// a phantom empty line.
  fn line_col(&self, offset: u32) -> (u32, u32) {
    match self.starts.binary_search(&offset) {
      Ok(0) => (1, 1),
      Ok(line) => {
        let prev_start = self.starts[line - 1];
        (u32::try_from(line).unwrap(), offset - prev_start)
      }
      Err(line) => {
        let line_start = self.starts[line - 1];
        (u32::try_from(line).unwrap(), offset - line_start + 1)
      }
    }
  }
}

/// Collects diagnostics for one translation unit, deduping consecutive
/// diagnostics that share the same range (§4.2).
pub struct Sink {
  diags: Vec<Diagnostic>,
  last_range: Option<Range>,
  lines: Option<LineIndex>,
  fatal: bool,
}

impl Default for Sink {
  fn default() -> Self { Self { diags: Vec::new(), last_range: None, lines: None, fatal: false } }
}

impl Sink {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Attach source text so `line_col` can be computed. Lazy: only built the
  /// first time it is needed.
  pub fn set_source(&mut self, src: &str) { self.lines = Some(LineIndex::build(src)) }

  pub fn report(&mut self, range: Range, severity: Severity, message: String) {
    if self.last_range == Some(range) { return }
    self.last_range = Some(range);
    if severity == Severity::Fatal { self.fatal = true }
    self.diags.push(Diagnostic { range, severity, message });
  }

  pub fn error(&mut self, range: Range, message: impl Into<String>) {
    self.report(range, Severity::Error, message.into());
  }

  pub fn fatal(&mut self, range: Range, message: impl Into<String>) {
    self.report(range, Severity::Fatal, message.into());
  }

  pub fn warning(&mut self, range: Range, message: impl Into<String>) {
    self.report(range, Severity::Warning, message.into());
  }

  #[must_use] pub fn diagnostics(&self) -> &[Diagnostic] { &self.diags }

  /// §8.1.8 / §7: non-zero iff any diagnostic of severity >= error was
  /// produced.
  #[must_use] pub fn had_error(&self) -> bool {
    self.diags.iter().any(|d| d.severity >= Severity::Error)
  }

  #[must_use] pub fn is_fatal(&self) -> bool { self.fatal }

  #[must_use] pub fn line_col(&self, range: Range) -> Option<(u32, u32)> {
    self.lines.as_ref().map(|l| l.line_col(range.offset))
  }

  pub fn format_into(&self, out: &mut String) {
    for d in &self.diags {
      let sev = match d.severity { Severity::Warning => "warning", Severity::Error => "error", Severity::Fatal => "fatal" };
      if let Some((line, col)) = self.line_col(d.range) {
        let _ = writeln!(out, "{sev}:{line}:{col}: {}", d.message);
      } else {
        let _ = writeln!(out, "{sev}: {}", d.message);
      }
    }
  }
}

/// A value formattable by the two-pass `%`-style probe (§4.2): `%S` for a
/// string view, `%d`/`%u` for signed/unsigned integers, `%f` for floats.
pub enum FmtArg<'a> {
  Str(&'a str),
  Int(i64),
  UInt(u64),
  Float(f64),
}

/// Fixed-capacity `fmt::Write` sink: most diagnostics are short enough to
/// build directly on the stack, skipping the measuring pass and the heap
/// `String` below entirely.
const INLINE_CAP: usize = 64;

struct InlineBuf(arrayvec::ArrayVec<u8, INLINE_CAP>);

impl std::fmt::Write for InlineBuf {
  fn write_str(&mut self, s: &str) -> std::fmt::Result {
    self.0.try_extend_from_slice(s.as_bytes()).map_err(|_| std::fmt::Error)
  }
}

/// Format a diagnostic message. Tries the fixed `INLINE_CAP`-byte buffer
/// first; a message that overflows it falls back to the two-pass
/// probe-then-`String` path (measure the exact length, then fill a
/// precisely-sized heap buffer, matching the allocator-conscious style of
/// the original `util/format.cpp`).
#[must_use]
pub fn format(fmt: &str, args: &[FmtArg<'_>]) -> String {
  let mut inline = InlineBuf(arrayvec::ArrayVec::new());
  if fill(fmt, args, &mut inline).is_ok() {
    // SAFETY: every byte written came from `write_str`/`write!` over `&str`s
    // and `Display` impls that only ever produce UTF-8.
    return unsafe { String::from_utf8_unchecked(inline.0.to_vec()) };
  }
  let len = probe_len(fmt, args);
  let mut out = String::with_capacity(len);
  let _ = fill(fmt, args, &mut out);
  out
}

fn probe_len(fmt: &str, args: &[FmtArg<'_>]) -> usize {
  let mut len = 0;
  let mut it = fmt.chars().peekable();
  let mut arg_idx = 0;
  while let Some(c) = it.next() {
    if c == '%' {
      match it.next() {
        Some('S') | Some('d') | Some('u') | Some('f') => {
          len += arg_display_len(args.get(arg_idx));
          arg_idx += 1;
        }
        Some('%') => len += 1,
        Some(other) => { len += 2; let _ = other; }
        None => len += 1,
      }
    } else {
      len += c.len_utf8();
    }
  }
  len
}

fn arg_display_len(arg: Option<&FmtArg<'_>>) -> usize {
  match arg {
    Some(FmtArg::Str(s)) => s.len(),
    Some(FmtArg::Int(n)) => n.to_string().len(),
    Some(FmtArg::UInt(n)) => n.to_string().len(),
    Some(FmtArg::Float(n)) => n.to_string().len(),
    None => 0,
  }
}

fn fill<W: std::fmt::Write>(fmt: &str, args: &[FmtArg<'_>], out: &mut W) -> std::fmt::Result {
  let mut it = fmt.chars().peekable();
  let mut arg_idx = 0;
  while let Some(c) = it.next() {
    if c == '%' {
      match it.next() {
        Some('S') => { if let Some(FmtArg::Str(s)) = args.get(arg_idx) { out.write_str(s)?; } arg_idx += 1 }
        Some('d') => { if let Some(FmtArg::Int(n)) = args.get(arg_idx) { write!(out, "{n}")?; } arg_idx += 1 }
        Some('u') => { if let Some(FmtArg::UInt(n)) = args.get(arg_idx) { write!(out, "{n}")?; } arg_idx += 1 }
        Some('f') => { if let Some(FmtArg::Float(n)) = args.get(arg_idx) { write!(out, "{n}")?; } arg_idx += 1 }
        Some('%') => out.write_char('%')?,
        Some(other) => { out.write_char('%')?; out.write_char(other)?; }
        None => out.write_char('%')?,
      }
    } else {
      out.write_char(c)?;
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dedupes_consecutive_same_range() {
    let mut sink = Sink::new();
    let r = Range::new(0, 1);
    sink.error(r, "first");
    sink.error(r, "second (suppressed)");
    assert_eq!(sink.diagnostics().len(), 1);
  }

  #[test]
  fn does_not_dedupe_different_ranges() {
    let mut sink = Sink::new();
    sink.error(Range::new(0, 1), "a");
    sink.error(Range::new(1, 1), "b");
    assert_eq!(sink.diagnostics().len(), 2);
  }

  #[test]
  fn had_error_tracks_severity() {
    let mut sink = Sink::new();
    assert!(!sink.had_error());
    sink.warning(Range::new(0, 1), "w");
    assert!(!sink.had_error());
    sink.error(Range::new(1, 1), "e");
    assert!(sink.had_error());
  }

  #[test]
  fn line_col_basic() {
    let src = "abc\ndef\nghi";
    let mut sink = Sink::new();
    sink.set_source(src);
    assert_eq!(sink.line_col(Range::new(0, 1)), Some((1, 1)));
    assert_eq!(sink.line_col(Range::new(1, 1)), Some((1, 2))); // 'b'
    assert_eq!(sink.line_col(Range::new(4, 1)), Some((1, 4))); // start of line 2 == end of line 1
    assert_eq!(sink.line_col(Range::new(5, 1)), Some((2, 2))); // 'e'
  }

  #[test]
  fn format_two_pass() {
    let s = format("x = %d, name = %S", &[FmtArg::Int(-3), FmtArg::Str("hi")]);
    assert_eq!(s, "x = -3, name = hi");
  }

  #[test]
  fn format_overflows_inline_buffer() {
    let long = "z".repeat(INLINE_CAP * 2);
    let s = format("%S", &[FmtArg::Str(&long)]);
    assert_eq!(s, long);
  }
}
