//! Type expressions (§3.2): the surface syntax for types, distinct from the
//! canonical `tc::Ty` that type inference eventually produces.

use smallvec::SmallVec;
use crate::arena::Handle;
use crate::source::Range;
use crate::symbol::Symbol;
use super::expr::ExprId;

pub type TypeId = Handle<TypeNode>;

pub struct TypeNode {
  pub kind: TypeKind,
  pub range: Range,
}

pub enum TypeKind {
  Tuple(SmallVec<[(Option<Symbol>, TypeId); 4]>),
  /// A function's parameter list, spelled as a tuple type in argument
  /// position (distinguished from `Tuple` so named parameters are visible to
  /// the parser without re-deriving them from a plain tuple).
  Args(SmallVec<[(Option<Symbol>, TypeId); 4]>),
  Union(SmallVec<[TypeId; 4]>),
  Ident(Symbol),
  Bool,
  VarArgs,
  Ptr(TypeId),
  Array(TypeId, ExprId),
  Slice(TypeId),
  Fn { args: TypeId, effects: SmallVec<[TypeId; 2]>, ret: TypeId },
  /// `atomic<T>`.
  Atom(TypeId),
  Enum(SmallVec<[(Symbol, Option<ExprId>); 8]>),
}
