//! The constant evaluator (§4.3): pure, typed-only results, integer
//! arithmetic widened into `i128` and narrowed with an explicit range check.
//! Grounded on `original_source/src/biron/cg_const.cpp`, the concrete
//! evaluator this section restates.

use smallvec::SmallVec;
use num::traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub};
use crate::ast::{BinOp, ExprId, ExprKind, LBinOp, UnaryOp};
use crate::backend::Backend;
use crate::cg::Cg;
use crate::cv::Cv;

/// Evaluate `id` to a typed or untyped constant, or `None` if it is not a
/// compile-time constant (§4.3). No IR is emitted and no scope is mutated.
pub fn eval_value<B: Backend>(cg: &Cg<'_, B>, id: ExprId) -> Option<Cv> {
  let node = cg.unit.expr(id);
  match &node.kind {
    ExprKind::Int { value, suffix } => Some(match suffix {
      Some(k) => Cv::Int { kind: *k, value: *value },
      None => Cv::UntypedInt(*value),
    }),
    ExprKind::Flt { value, suffix } => Some(match suffix {
      Some(k) => Cv::Float { kind: *k, value: *value },
      None => Cv::UntypedReal(*value),
    }),
    ExprKind::Bool(b) => Some(Cv::Bool { kind: crate::cv::BoolKind::B8, value: *b }),
    ExprKind::Str(s) => Some(Cv::Str(*s)),

    // §4.3: `Var` resolves only against top-level constants; locals are
    // invisible to the evaluator.
    ExprKind::Var(name) => cg.lookup_global_const(*name).cloned(),

    ExprKind::Tuple(elems) => {
      let mut values = SmallVec::new();
      for &e in elems { values.push(eval_value(cg, e)?) }
      // A single-element tuple detuples (§4.5.1), including here.
      if values.len() == 1 { return values.into_iter().next() }
      let mut elem_tys = Vec::with_capacity(values.len());
      for v in &values { elem_tys.push(cv_ty(&cg.tc, v)?) }
      let ty = cg.tc.tuple(elem_tys, None, None);
      Some(Cv::Tuple { values, field_names: None, ty })
    }

    ExprKind::Unary { op, operand } => {
      let v = eval_value(cg, *operand)?;
      eval_unary(*op, &v)
    }

    ExprKind::Bin { op, lhs, rhs } => {
      let l = eval_value(cg, *lhs)?;
      let r = eval_value(cg, *rhs)?;
      eval_bin(*op, &l, &r)
    }

    ExprKind::LBin { op, lhs, rhs } => {
      let l = eval_value(cg, *lhs)?;
      let Cv::Bool { value: lb, kind } = l else { return None };
      match op {
        LBinOp::Or if lb => Some(Cv::Bool { kind, value: true }),
        LBinOp::And if !lb => Some(Cv::Bool { kind, value: false }),
        _ => {
          let r = eval_value(cg, *rhs)?;
          match r { Cv::Bool { value: rb, kind: rk } => Some(Cv::Bool { kind: rk, value: rb }), _ => None }
        }
      }
    }

    ExprKind::Cast { operand, ty } => {
      let v = eval_value(cg, *operand)?;
      let target = cg.resolve_type(*ty)?;
      coerce_to_ty(&v, &target)
    }

    ExprKind::Test { operand, ty } => {
      let v = eval_value(cg, *operand)?;
      let target = cg.resolve_type(*ty)?;
      Some(Cv::Bool { kind: crate::cv::BoolKind::B8, value: coerce_to_ty(&v, &target).is_some() })
    }

    // Everything else (`Call`, `Agg` referencing a non-constant, address/deref,
    // indexing, etc.) is not a compile-time constant in this evaluator.
    _ => None,
  }
}

/// The CT of an already-typed constant, or `None` for an untyped literal
/// (which has no shape of its own until coerced at a use site, §3.3).
fn cv_ty(tc: &crate::tc::TyCache, v: &Cv) -> Option<crate::tc::Ty> {
  match v {
    Cv::Int { kind, .. } => Some(tc.int(*kind)),
    Cv::Bool { kind, .. } => Some(tc.bool_(*kind)),
    Cv::Float { kind, .. } => Some(tc.float(*kind)),
    Cv::Str(_) => Some(tc.builtins.string.clone()),
    Cv::Tuple { ty, .. } => Some(ty.clone()),
    Cv::Array { elem_ty, values } => Some(tc.array(elem_ty.clone(), values.len() as u64)),
    Cv::None | Cv::UntypedInt(_) | Cv::UntypedReal(_) => None,
  }
}

fn eval_unary(op: UnaryOp, v: &Cv) -> Option<Cv> {
  match (op, v) {
    (UnaryOp::Neg, Cv::UntypedInt(n)) => Some(Cv::UntypedInt(-n)),
    (UnaryOp::Neg, Cv::Int { kind, value }) => Some(Cv::Int { kind: *kind, value: -value }),
    (UnaryOp::Neg, Cv::UntypedReal(f)) => Some(Cv::UntypedReal(-f)),
    (UnaryOp::Neg, Cv::Float { kind, value }) => Some(Cv::Float { kind: *kind, value: -value }),
    (UnaryOp::Not, Cv::Bool { kind, value }) => Some(Cv::Bool { kind: *kind, value: !value }),
    (UnaryOp::Not, Cv::UntypedInt(n)) => Some(Cv::UntypedInt(!n)),
    (UnaryOp::Not, Cv::Int { kind, value }) => Some(Cv::Int { kind: *kind, value: !value }),
    // `*`/`&` require an address, which a pure constant does not have.
    _ => None,
  }
}

fn eval_bin(op: BinOp, l: &Cv, r: &Cv) -> Option<Cv> {
  if let (Some(a), Some(b)) = (as_int(l), as_int(r)) {
    return eval_int_bin(op, l, r, a, b)
  }
  if let (Some(a), Some(b)) = (as_float(l), as_float(r)) {
    return eval_float_bin(op, l, r, a, b)
  }
  None
}

fn as_int(v: &Cv) -> Option<i128> {
  match v { Cv::UntypedInt(n) => Some(*n), Cv::Int { value, .. } => Some(*value), _ => None }
}
fn as_float(v: &Cv) -> Option<f64> {
  match v { Cv::UntypedReal(f) => Some(*f), Cv::Float { value, .. } => Some(*value), _ => None }
}

/// Widened-carrier integer arithmetic (§4.3): the operation runs in `i128`;
/// the result stays untyped (to be coerced at its use site) unless either
/// operand was already typed, in which case the typed kind is preserved and
/// the result is range-checked, failing as a diagnostic-producing `None` on
/// overflow (the caller reports the diagnostic; the evaluator only refuses).
fn eval_int_bin(op: BinOp, l: &Cv, r: &Cv, a: i128, b: i128) -> Option<Cv> {
  let result = match op {
    BinOp::Add => a.checked_add(&b)?,
    BinOp::Sub => a.checked_sub(&b)?,
    BinOp::Mul => a.checked_mul(&b)?,
    BinOp::Div => a.checked_div(&b)?,
    BinOp::BitOr => a | b,
    BinOp::BitAnd => a & b,
    BinOp::Shl => a.checked_shl(u32::try_from(b).ok()?)?,
    BinOp::Shr => a.checked_shr(u32::try_from(b).ok()?)?,
    BinOp::Max => a.max(b),
    BinOp::Min => a.min(b),
    BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
      let v = match op {
        BinOp::Eq => a == b, BinOp::Ne => a != b, BinOp::Lt => a < b,
        BinOp::Le => a <= b, BinOp::Gt => a > b, BinOp::Ge => a >= b,
        _ => unreachable!(),
      };
      return Some(Cv::Bool { kind: crate::cv::BoolKind::B8, value: v })
    }
    BinOp::Of | BinOp::Dot => return None,
  };
  match (l, r) {
    (Cv::Int { kind, .. }, _) | (_, Cv::Int { kind, .. }) => {
      let (min, max) = kind.range();
      if result < min || result > max { return None }
      Some(Cv::Int { kind: *kind, value: result })
    }
    _ => Some(Cv::UntypedInt(result)),
  }
}

fn eval_float_bin(op: BinOp, l: &Cv, r: &Cv, a: f64, b: f64) -> Option<Cv> {
  let result = match op {
    BinOp::Add => a + b,
    BinOp::Sub => a - b,
    BinOp::Mul => a * b,
    BinOp::Div => a / b,
    BinOp::Max => a.max(b),
    BinOp::Min => a.min(b),
    BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
      #[allow(clippy::float_cmp)]
      let v = match op {
        BinOp::Eq => a == b, BinOp::Ne => a != b, BinOp::Lt => a < b,
        BinOp::Le => a <= b, BinOp::Gt => a > b, BinOp::Ge => a >= b,
        _ => unreachable!(),
      };
      return Some(Cv::Bool { kind: crate::cv::BoolKind::B8, value: v })
    }
    _ => return None,
  };
  match (l, r) {
    (Cv::Float { kind, .. }, _) | (_, Cv::Float { kind, .. }) => Some(Cv::Float { kind: *kind, value: result }),
    _ => Some(Cv::UntypedReal(result)),
  }
}

/// Checked constant cast (`x as T`, §4.3): narrows/widens an integer or
/// float constant to the destination CT, failing if out of range.
fn coerce_to_ty(v: &Cv, target: &crate::tc::Ty) -> Option<Cv> {
  if let Some(k) = target.int_kind() { return v.coerce_int(k) }
  match &target.kind {
    crate::tc::TyKind::Float(k) => v.coerce_float(*k),
    _ => None,
  }
}
