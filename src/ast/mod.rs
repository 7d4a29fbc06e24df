//! The typed... well, untyped-but-parsed AST (§3.2, §3.5): nodes live in
//! per-unit arenas (`src/arena.rs`) and reference each other through stable
//! handles rather than owned trees, so the evaluator and code generator can
//! hold onto a node across scope mutations without fighting the borrow
//! checker.

pub mod attr;
pub mod expr;
pub mod item;
pub mod stmt;
pub mod types;

pub use attr::{AttrFlags, AttrKind, Attrs};
pub use expr::{BinOp, ExprId, ExprKind, ExprNode, LBinOp, UnaryOp};
pub use item::{EffectItem, FnItem, Item, ImportItem, ModuleItem, Param, TypedefItem, Unit};
pub use stmt::{AssignOp, StmtId, StmtKind, StmtNode};
pub use types::{TypeId, TypeKind, TypeNode};
