//! The code generator (§4.5): owns the backend module handle, a builder, the
//! type cache, a scratch allocator, a diagnostic sink, and the five stacks
//! `{fns, globals, typedefs, effects, scopes}` plus the loop-handle stack.

pub mod consts;
pub mod expr;
pub mod func;
pub mod stmt;
pub mod types;

use smallvec::SmallVec;
use crate::arena::Scratch;
use crate::ast::{ExprId, StmtId, Unit};
use crate::backend::Backend;
use crate::cv::Cv;
use crate::diag::Sink;
use crate::symbol::Symbol;
use crate::tc::{Ty, TyCache};

/// An l-value: a pointer to storage of CT `ty`.
pub struct Addr<B: Backend> { pub ty: Ty, pub handle: B::Value }
impl<B: Backend> Clone for Addr<B> { fn clone(&self) -> Self { Self { ty: self.ty.clone(), handle: self.handle } } }

/// An r-value.
pub struct GenValue<B: Backend> { pub ty: Ty, pub handle: B::Value }
impl<B: Backend> Clone for GenValue<B> { fn clone(&self) -> Self { Self { ty: self.ty.clone(), handle: self.handle } } }

pub struct FnEntry<B: Backend> { pub name: Symbol, pub ty: Ty, pub handle: B::Function, pub has_body: bool }
pub struct GlobalEntry<B: Backend> { pub name: Symbol, pub ty: Ty, pub handle: B::Global, pub value: Option<Cv> }
pub struct TypedefEntry { pub name: Symbol, pub ty: Ty }
pub struct EffectEntry { pub name: Symbol, pub ty: Ty }

pub struct LocalBinding<B: Backend> { pub stmt: StmtId, pub name: Symbol, pub addr: Addr<B> }
pub struct UsingBinding<B: Backend> { pub name: Symbol, pub ty: Ty, pub addr: Addr<B> }

/// A narrowing recorded by `x is T` (§4.5.1), cleared on entry to `else`.
#[derive(Clone)]
pub struct Test { pub name: Symbol, pub ty: Ty }

/// One lexical scope (block, `if` init, `for` init, function body).
pub struct Scope<B: Backend> {
  pub vars: Vec<LocalBinding<B>>,
  pub usings: Vec<UsingBinding<B>>,
  pub defers: Vec<StmtId>,
  pub tests: Vec<Test>,
}

impl<B: Backend> Scope<B> {
  fn new() -> Self { Self { vars: Vec::new(), usings: Vec::new(), defers: Vec::new(), tests: Vec::new() } }
}

pub struct LoopHandles<B: Backend> {
  pub exit: B::BasicBlock,
  pub post: B::BasicBlock,
  /// `self.scopes.len()` at loop entry: `break`/`continue` flush defers from
  /// this depth inward, but leave the loop's own shared scope (init/cond/
  /// post/body) for `gen_for`'s own trailing flush, which runs exactly once
  /// regardless of which edge reaches `for.exit` (§4.5.2 `For`).
  pub scope_depth: usize,
}

/// What a name resolved against `vars`/`usings`/`fns`/`globals` turned out to
/// be (§4.5.1 `Var`: "search scopes inside-out ... on miss, search fns and
/// globals").
pub enum Resolved<'a, B: Backend> {
  Local(&'a Addr<B>),
  Using(&'a Addr<B>),
  Fn(&'a FnEntry<B>),
  Global(&'a GlobalEntry<B>),
}

/// Primitive type names (`s32`, `u8`, `f64`, `string`, ...) are surface
/// identifiers (`TypeKind::Ident`), so they resolve through the same
/// `lookup_typedef` path user `typedef`s do (§4.4); this seeds that table
/// before any unit-defined typedef is pushed.
fn builtin_typedefs(tc: &TyCache) -> Vec<TypedefEntry> {
  let b = &tc.builtins;
  let names: [(&str, Ty); 17] = [
    ("s8", b.s8.clone()), ("s16", b.s16.clone()), ("s32", b.s32.clone()), ("s64", b.s64.clone()),
    ("u8", b.u8.clone()), ("u16", b.u16.clone()), ("u32", b.u32.clone()), ("u64", b.u64.clone()),
    ("b8", b.b8.clone()), ("b16", b.b16.clone()), ("b32", b.b32.clone()), ("b64", b.b64.clone()),
    ("f32", b.f32.clone()), ("f64", b.f64.clone()),
    ("string", b.string.clone()), ("void", b.ptr_void.clone()), ("unit", b.unit.clone()),
  ];
  names.into_iter().map(|(n, ty)| TypedefEntry { name: crate::symbol::intern(n), ty }).collect()
}

pub struct Cg<'u, B: Backend> {
  pub unit: &'u Unit,
  pub backend: B,
  pub module: B::Module,
  pub builder: B::Builder,
  pub tc: TyCache,
  pub scratch: Scratch,
  pub diag: Sink,
  pub fns: Vec<FnEntry<B>>,
  pub globals: Vec<GlobalEntry<B>>,
  pub typedefs: Vec<TypedefEntry>,
  pub effects: Vec<EffectEntry>,
  pub scopes: Vec<Scope<B>>,
  pub loops: Vec<LoopHandles<B>>,
  /// The enclosing function's return CT, set for the duration of `gen_fn`.
  pub current_return_ty: Option<Ty>,
  /// The function currently being lowered, needed to open new basic blocks
  /// for short-circuit `LBin`, `Max`/`Min`, `If`, and `For` (§4.5.2/§4.5.3).
  pub current_fn: Option<B::Function>,
  next_block_id: u32,
}

impl<'u, B: Backend> Cg<'u, B> {
  pub fn new(unit: &'u Unit, mut backend: B) -> Self {
    let module = backend.create_module(&unit.source_name);
    let builder = backend.create_builder();
    let tc = TyCache::new();
    let typedefs = builtin_typedefs(&tc);
    Self {
      unit, backend, module, builder,
      tc, scratch: Scratch::new(), diag: Sink::new(),
      fns: Vec::new(), globals: Vec::new(), typedefs, effects: Vec::new(),
      scopes: Vec::new(), loops: Vec::new(), current_return_ty: None,
      current_fn: None, next_block_id: 0,
    }
  }

  /// A fresh, readable basic-block label (`bb0`, `bb1`, ...).
  pub fn fresh_block(&mut self, name: &str) -> B::BasicBlock {
    let f = self.current_fn.expect("fresh_block outside a function body");
    let label = format!("{name}{}", self.next_block_id);
    self.next_block_id += 1;
    self.backend.append_basic_block(f, &label)
  }

  pub fn push_scope(&mut self) { self.scopes.push(Scope::new()) }
  pub fn pop_scope(&mut self) -> Scope<B> { self.scopes.pop().expect("scope stack underflow") }

  #[must_use] pub fn lookup_typedef(&self, name: Symbol) -> Option<Ty> {
    self.typedefs.iter().find(|t| t.name == name).map(|t| t.ty.clone())
  }

  #[must_use] pub fn lookup_effect(&self, name: Symbol) -> Option<Ty> {
    self.effects.iter().find(|e| e.name == name).map(|e| e.ty.clone())
  }

  /// Top-level constants only (§4.3 `Var` contract for the evaluator): a
  /// global whose initializer successfully const-evaluated.
  #[must_use] pub fn lookup_global_const(&self, name: Symbol) -> Option<&Cv> {
    self.globals.iter().find(|g| g.name == name).and_then(|g| g.value.as_ref())
  }

  #[must_use] pub fn resolve_type(&self, id: crate::ast::TypeId) -> Option<Ty> { types::resolve(self, id) }

  /// Scope search order (§4.5.1 `Var`): local vars, then usings, innermost
  /// scope first; then top-level `fns`; then top-level `globals`.
  #[must_use] pub fn resolve_var(&self, name: Symbol) -> Option<Resolved<'_, B>> {
    for scope in self.scopes.iter().rev() {
      if let Some(b) = scope.vars.iter().rev().find(|b| b.name == name) { return Some(Resolved::Local(&b.addr)) }
      if let Some(b) = scope.usings.iter().rev().find(|b| b.name == name) { return Some(Resolved::Using(&b.addr)) }
    }
    if let Some(f) = self.fns.iter().find(|f| f.name == name) { return Some(Resolved::Fn(f)) }
    if let Some(g) = self.globals.iter().find(|g| g.name == name) { return Some(Resolved::Global(g)) }
    None
  }

  /// Active `is`-narrowings, innermost scope first (§4.5.1 `Test`).
  #[must_use] pub fn active_tests(&self) -> SmallVec<[Test; 4]> {
    let mut out = SmallVec::new();
    for scope in self.scopes.iter().rev() { out.extend(scope.tests.iter().cloned()) }
    out
  }

  pub fn push_test(&mut self, t: Test) {
    if let Some(scope) = self.scopes.last_mut() { scope.tests.push(t) }
  }

  /// Clear narrowings recorded in the current scope (§4.5.2 `If`: "clear
  /// tests before lowering else").
  pub fn clear_tests(&mut self) {
    if let Some(scope) = self.scopes.last_mut() { scope.tests.clear() }
  }

  pub fn push_defer(&mut self, stmt: StmtId) {
    if let Some(scope) = self.scopes.last_mut() { scope.defers.push(stmt) }
  }

  /// Every pending defer across every open scope, innermost first, in
  /// LIFO order within each scope (§4.5.2 `Return`, §5 ordering guarantee).
  /// Draining (not just reading) them means a scope's own later, ordinary
  /// exit never re-runs what a `return` already flushed on the way out.
  #[must_use] pub fn all_pending_defers(&mut self) -> Vec<StmtId> {
    let mut out = Vec::new();
    for scope in self.scopes.iter_mut().rev() { out.extend(scope.defers.drain(..).rev()) }
    out
  }

  /// Defers from scope depth `from` inward, innermost first, draining them
  /// (§4.5.2 `Break`/`Continue`: the scopes between the jump and the loop's
  /// own shared scope exit early and must run their defers now).
  #[must_use] pub fn defers_from(&mut self, from: usize) -> Vec<StmtId> {
    let mut out = Vec::new();
    for scope in self.scopes[from..].iter_mut().rev() { out.extend(scope.defers.drain(..).rev()) }
    out
  }

  pub fn bind_local(&mut self, binding: LocalBinding<B>) {
    self.scopes.last_mut().expect("bind_local outside any scope").vars.push(binding);
  }

  pub fn bind_using(&mut self, binding: UsingBinding<B>) {
    self.scopes.last_mut().expect("bind_using outside any scope").usings.push(binding);
  }

  #[must_use] pub fn current_loop(&self) -> Option<&LoopHandles<B>> { self.loops.last() }

  /// Evaluate `id` with `eval::eval_value`, wiring through a throwaway hint;
  /// the evaluator itself does not take a `want_ty` (§4.3).
  #[must_use] pub fn const_eval(&self, id: ExprId) -> Option<Cv> { crate::eval::eval_value(self, id) }
}
