//! Statements (§3.2, §4.5.2).

use smallvec::SmallVec;
use crate::arena::Handle;
use crate::source::Range;
use crate::symbol::Symbol;
use super::attr::AttrKind;
use super::expr::ExprId;
use super::types::TypeId;

pub type StmtId = Handle<StmtNode>;

pub struct StmtNode {
  pub kind: StmtKind,
  pub range: Range,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AssignOp { Assign, AddAssign, SubAssign, MulAssign, DivAssign }

pub enum StmtKind {
  Block(SmallVec<[StmtId; 8]>),
  Return(Option<ExprId>),
  /// Appended to the enclosing scope's defer list at lowering time; never
  /// lowered in place (§4.5.2).
  Defer(StmtId),
  Break,
  Continue,
  If { init: Option<StmtId>, cond: ExprId, then: StmtId, els: Option<StmtId> },
  Let { name: Symbol, ty: Option<TypeId>, init: Option<ExprId>, attrs: SmallVec<[AttrKind; 2]> },
  GLet { name: Symbol, ty: Option<TypeId>, init: ExprId, attrs: SmallVec<[AttrKind; 2]> },
  Using { name: Symbol, ty: TypeId, init: Option<ExprId> },
  For { init: Option<StmtId>, cond: Option<ExprId>, post: Option<StmtId>, body: StmtId, els: Option<StmtId> },
  Expr(ExprId),
  Assign { op: AssignOp, lhs: ExprId, rhs: ExprId },
}
