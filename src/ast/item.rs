//! Top-level items (§3.2) and the translation unit (§3.5).

use std::cell::RefCell;
use crate::source::Range;
use crate::symbol::Symbol;
use super::attr::AttrKind;
use super::expr::{ExprId, ExprNode};
use super::stmt::{StmtId, StmtNode};
use super::types::{TypeId, TypeNode};
use crate::arena::Cache;

pub struct Param {
  pub name: Symbol,
  pub ty: TypeId,
}

pub struct FnItem {
  pub name: Symbol,
  pub params: Vec<Param>,
  pub effects: Vec<TypeId>,
  pub ret: TypeId,
  /// Absent for an external (no-body) declaration.
  pub body: Option<StmtId>,
  pub attrs: Vec<AttrKind>,
  pub range: Range,
}

impl FnItem {
  /// A body-less declaration names a symbol the linker must resolve
  /// externally, which makes it a C-ABI callee (§4.5.1 Call).
  #[must_use] pub fn is_c_abi(&self) -> bool { self.body.is_none() }
}

pub struct TypedefItem {
  pub name: Symbol,
  pub ty: TypeId,
  pub range: Range,
}

pub struct EffectItem {
  pub name: Symbol,
  pub ty: TypeId,
  pub range: Range,
}

/// Recorded for diagnostics only (§3 additions): the literal import path as
/// written, not resolved to a file.
pub struct ImportItem {
  pub path: Symbol,
  pub range: Range,
}

pub struct ModuleItem {
  pub name: Symbol,
  pub range: Range,
}

pub enum Item {
  Fn(FnItem),
  Typedef(TypedefItem),
  Effect(EffectItem),
  Import(ImportItem),
  Module(ModuleItem),
}

/// One translation unit (§3.5): owns every AST node allocated while parsing
/// one source file, plus the source text itself.
pub struct Unit {
  pub source_name: String,
  pub source_text: String,
  pub exprs: Cache<ExprNode>,
  pub stmts: Cache<StmtNode>,
  pub types: Cache<TypeNode>,
  items: RefCell<Vec<Item>>,
  /// Top-level `let` bindings, as `StmtKind::GLet` nodes (§4.5 "Globals").
  /// Not one of the five `Item` categories (§3.2), but stored alongside them.
  globals: RefCell<Vec<StmtId>>,
}

impl Unit {
  #[must_use] pub fn new(source_name: String, source_text: String) -> Self {
    Self {
      source_name, source_text, exprs: Cache::new(), stmts: Cache::new(), types: Cache::new(),
      items: RefCell::new(Vec::new()), globals: RefCell::new(Vec::new()),
    }
  }

  #[must_use] pub fn expr(&self, id: ExprId) -> &ExprNode { self.exprs.resolve(id) }
  #[must_use] pub fn stmt(&self, id: StmtId) -> &StmtNode { self.stmts.resolve(id) }
  #[must_use] pub fn ty(&self, id: TypeId) -> &TypeNode { self.types.resolve(id) }

  pub fn push_item(&self, item: Item) { self.items.borrow_mut().push(item) }
  pub fn push_global(&self, id: StmtId) { self.globals.borrow_mut().push(id) }

  #[must_use] pub fn items(&self) -> std::cell::Ref<'_, Vec<Item>> { self.items.borrow() }
  #[must_use] pub fn globals(&self) -> std::cell::Ref<'_, Vec<StmtId>> { self.globals.borrow() }

  /// The unit's own `module` declaration, if any (§4.5.1 `Selector`
  /// resolution is scoped to this).
  #[must_use] pub fn module_name(&self) -> Option<Symbol> {
    self.items.borrow().iter().find_map(|it| match it {
      Item::Module(m) => Some(m.name),
      _ => None,
    })
  }
}
