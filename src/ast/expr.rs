//! Expressions (§3.2).

use smallvec::SmallVec;
use crate::arena::Handle;
use crate::cv::{FloatKind, IntKind};
use crate::source::Range;
use crate::symbol::Symbol;
use super::types::TypeId;

pub type ExprId = Handle<ExprNode>;

pub struct ExprNode {
  pub kind: ExprKind,
  pub range: Range,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BinOp {
  Add, Sub, Mul, Div,
  Eq, Ne, Lt, Le, Gt, Ge,
  BitOr, BitAnd, Shl, Shr,
  Max, Min,
  /// Enum/property access, the infix spelling of `Prop`.
  Of,
  /// Field access, the infix spelling of `Access`.
  Dot,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LBinOp { Or, And }

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum UnaryOp { Not, Neg, Deref, Addr }

pub enum ExprKind {
  /// A single element detuples during lowering (§4.5.1); the parser still
  /// produces this node uniformly for `(a)` and `(a, b)`.
  Tuple(SmallVec<[ExprId; 4]>),
  Call { callee: ExprId, args: SmallVec<[ExprId; 4]> },
  /// A type used in expression position (e.g. as a `Cast`/`Test` operand or a
  /// bare type argument).
  Type(TypeId),
  Var(Symbol),
  /// `A::b`, resolved against the current unit's own `Module` item (§4.5.1
  /// Open Question resolution).
  Selector(Symbol, Symbol),
  Int { value: i128, suffix: Option<IntKind> },
  Flt { value: f64, suffix: Option<FloatKind> },
  Str(Symbol),
  Bool(bool),
  Agg { ty: TypeId, fields: SmallVec<[(Option<Symbol>, ExprId); 4]> },
  Bin { op: BinOp, lhs: ExprId, rhs: ExprId },
  LBin { op: LBinOp, lhs: ExprId, rhs: ExprId },
  Unary { op: UnaryOp, operand: ExprId },
  Index { base: ExprId, index: ExprId },
  /// `...x`, valid only as a `Call` argument (§4.4 additions).
  Explode(ExprId),
  /// `x!`.
  Eff(ExprId),
  /// `a.b` with `b` a compile-time-known field name (§4.5.1).
  Access { base: ExprId, field: Symbol },
  Cast { operand: ExprId, ty: TypeId },
  Test { operand: ExprId, ty: TypeId },
  /// `p of T`, the postfix spelling of `Bin(Of, ..)` (§4.5.1).
  Prop { ty: TypeId, prop: Symbol },
  /// `?`, valid only where a `want_ty` hint names an array CT (§4.5.1).
  InferSize,
}
