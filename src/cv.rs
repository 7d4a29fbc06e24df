//! Compile-time constants (§3.3).

use smallvec::SmallVec;
use crate::symbol::Symbol;
use crate::tc::Ty;

/// An integer's bit width and signedness, shared between `Cv` and `Ty`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum IntKind { S8, S16, S32, S64, U8, U16, U32, U64 }

impl IntKind {
  #[must_use] pub fn bits(self) -> u32 {
    match self { IntKind::S8 | IntKind::U8 => 8, IntKind::S16 | IntKind::U16 => 16,
      IntKind::S32 | IntKind::U32 => 32, IntKind::S64 | IntKind::U64 => 64 }
  }

  #[must_use] pub fn signed(self) -> bool {
    matches!(self, IntKind::S8 | IntKind::S16 | IntKind::S32 | IntKind::S64)
  }

  /// The representable range of this kind, as a signed 128-bit pair
  /// `(min, max)` (§4.3's widened carrier).
  #[must_use] pub fn range(self) -> (i128, i128) {
    if self.signed() {
      let bits = self.bits();
      let max = (1i128 << (bits - 1)) - 1;
      (-max - 1, max)
    } else {
      (0, (1i128 << self.bits()) - 1)
    }
  }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BoolKind { B8, B16, B32, B64 }

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum FloatKind { F32, F64 }

/// A typed compile-time constant (§3.3). Deeply copyable; tuple/array forms
/// own their elements.
#[derive(Clone, Debug)]
pub enum Cv {
  None,
  Int { kind: IntKind, value: i128 },
  Bool { kind: BoolKind, value: bool },
  Float { kind: FloatKind, value: f64 },
  Str(Symbol),
  /// Ordered values, optional field names (parallel to `values` when
  /// present), and the tuple's `Ty`.
  Tuple { values: SmallVec<[Cv; 4]>, field_names: Option<SmallVec<[Option<Symbol>; 4]>>, ty: Ty },
  Array { elem_ty: Ty, values: SmallVec<[Cv; 4]> },
  /// A bare integer literal with no fixed width yet; must be coerced to a
  /// concrete `IntKind` at its use site (§3.3, §4.3).
  UntypedInt(i128),
  /// A bare float literal with no fixed width yet.
  UntypedReal(f64),
}

impl Cv {
  #[must_use] pub fn is_untyped(&self) -> bool {
    matches!(self, Cv::UntypedInt(_) | Cv::UntypedReal(_))
  }

  /// Coerce an untyped constant to a concrete integer kind, checking the
  /// value fits (§4.3 overflow rule). Typed integers are passed through
  /// after their own range is re-checked against `kind` (covers `as`-style
  /// narrowing casts, which go through the same checked path).
  #[must_use] pub fn coerce_int(&self, kind: IntKind) -> Option<Cv> {
    let value = match *self {
      Cv::UntypedInt(v) => v,
      Cv::Int { value, .. } => value,
      _ => return None,
    };
    let (min, max) = kind.range();
    if value < min || value > max { return None }
    Some(Cv::Int { kind, value })
  }

  #[must_use] pub fn coerce_float(&self, kind: FloatKind) -> Option<Cv> {
    let value = match *self {
      Cv::UntypedReal(v) => v,
      Cv::Float { value, .. } => value,
      Cv::UntypedInt(v) => v as f64,
      Cv::Int { value, .. } => value as f64,
      _ => return None,
    };
    Some(Cv::Float { kind, value })
  }

  /// Validate the tuple/array shape invariants from §3.3.
  #[must_use] pub fn check_invariants(&self) -> bool {
    match self {
      Cv::Tuple { values, field_names, ty } => {
        let Some(arity) = ty.tuple_arity() else { return false };
        if values.len() != arity { return false }
        if let Some(names) = field_names { if names.len() != arity { return false } }
        values.iter().all(Cv::check_invariants)
      }
      Cv::Array { elem_ty, values } => values.iter().all(|v| v.check_invariants() && v.matches_elem_ty(elem_ty)),
      _ => true,
    }
  }

  fn matches_elem_ty(&self, _elem_ty: &Ty) -> bool {
    // Elementwise element-type compatibility is checked at construction time
    // by the evaluator (§4.3 "tuple/array forms evaluate element-wise");
    // this is a cheap structural sanity check, not a full re-typecheck.
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn int_kind_ranges() {
    assert_eq!(IntKind::S32.range(), (-(1i128 << 31), (1i128 << 31) - 1));
    assert_eq!(IntKind::U32.range(), (0, (1i128 << 32) - 1));
  }

  #[test]
  fn coerce_int_accepts_boundary() {
    let v = Cv::UntypedInt(0x7fff_ffff);
    assert!(v.coerce_int(IntKind::S32).is_some());
    let v2 = Cv::UntypedInt(0x8000_0000);
    assert!(v2.coerce_int(IntKind::S32).is_none());
    let v3 = Cv::UntypedInt(0x8000_0000);
    assert!(v3.coerce_int(IntKind::U32).is_some());
  }
}
