//! Per-translation-unit orchestration (§4.5 "CG lifecycle") and function
//! emission (§4.5.3): prepass every top-level `fn`, lower every top-level
//! `let` into a global, then emit each function body in source order.

use crate::ast::{FnItem, Item, StmtId, StmtKind, TypeId};
use crate::backend::{Backend, Linkage};
use crate::cg::expr::{coerce_cv, cv_target_ty};
use crate::cg::{consts, stmt, Addr, Cg, EffectEntry, FnEntry, GlobalEntry, LocalBinding, TypedefEntry};
use crate::symbol::Symbol;
use crate::tc::{Ty, TyKind};

/// Run the full per-unit pipeline (§4.5): typedefs and effects first (both
/// are name tables other resolution steps consult), then the three
/// lifecycle stages proper.
pub fn gen_unit<B: Backend>(cg: &mut Cg<'_, B>) -> Option<()> {
  gen_typedefs(cg)?;
  gen_effects(cg)?;

  // `items()`/`globals()` borrow the `Unit`'s own `RefCell`s, not `cg` — the
  // guard can be held across `&mut cg` calls for the rest of this function
  // (see `Unit::expr`/`Unit::stmt`'s identical independence from `cg`).
  let items = cg.unit.items();

  log::debug!("prepass: {} top-level items", items.len());
  let mut bodies = Vec::new();
  for item in items.iter() {
    if let Item::Fn(f) = item {
      let handle = gen_fn_prepass(cg, f)?;
      if let Some(body) = f.body { bodies.push((f, body, handle)); }
    }
  }

  let globals = cg.unit.globals();
  log::debug!("globals: {} top-level lets", globals.len());
  for &g in globals.iter() { gen_global(cg, g)?; }

  log::debug!("bodies: {} function(s) with a body", bodies.len());
  for (f, body, handle) in bodies { gen_fn_body(cg, f, body, handle)?; }
  Some(())
}

/// Named typedefs (§4.4, §9 Open Question 2): a placeholder is registered
/// for every name before any body is resolved, so a typedef that refers to
/// itself (always through a `*`/`[]` indirection — a direct self-reference
/// would be an infinitely-sized type and is rejected by `tc::layout` on its
/// own) sees its own name already bound. The entry is patched with the real
/// type afterward; indirection-typed references already captured the
/// placeholder `Ty`, which is fine since pointer/slice layout never depends
/// on the pointee's.
fn gen_typedefs<B: Backend>(cg: &mut Cg<'_, B>) -> Option<()> {
  let pending: Vec<(Symbol, TypeId)> = cg.unit.items().iter()
    .filter_map(|it| if let Item::Typedef(t) = it { Some((t.name, t.ty)) } else { None })
    .collect();
  for &(name, _) in &pending {
    cg.typedefs.push(TypedefEntry { name, ty: cg.tc.builtins.ptr_void.clone() });
  }
  for (name, ty_id) in pending {
    let resolved = crate::cg::types::resolve(cg, ty_id)?;
    cg.tc.set_name(&resolved, name);
    let entry = cg.typedefs.iter_mut().rev().find(|e| e.name == name)?;
    entry.ty = resolved;
  }
  Some(())
}

fn gen_effects<B: Backend>(cg: &mut Cg<'_, B>) -> Option<()> {
  let pending: Vec<(Symbol, TypeId)> = cg.unit.items().iter()
    .filter_map(|it| if let Item::Effect(e) = it { Some((e.name, e.ty)) } else { None })
    .collect();
  for (name, ty_id) in pending {
    let ty = crate::cg::types::resolve(cg, ty_id)?;
    cg.tc.set_name(&ty, name);
    cg.effects.push(EffectEntry { name, ty });
  }
  Some(())
}

/// Prepass (§4.5 step 1): create the function's CT and a backend function
/// handle with external linkage, and push it onto `fns` — this is what lets
/// any function call any other regardless of source order.
fn gen_fn_prepass<B: Backend>(cg: &mut Cg<'_, B>, item: &FnItem) -> Option<B::Function> {
  let mut param_tys = Vec::with_capacity(item.params.len());
  let mut backend_param_tys = Vec::with_capacity(item.params.len());
  let mut var_args = false;
  for p in &item.params {
    let ty = cg.resolve_type(p.ty)?;
    if matches!(ty.kind, TyKind::Va) { var_args = true; continue }
    backend_param_tys.push(consts::backend_ty(cg, &ty));
    param_tys.push(ty);
  }
  let mut effect_tys = Vec::with_capacity(item.effects.len());
  for &e in &item.effects { effect_tys.push(cg.resolve_type(e)?); }
  let ret_ty = cg.resolve_type(item.ret)?;
  // A body-less declaration exists only to name a symbol the linker resolves
  // externally (§6.1's `cc` link step), which in practice means the C
  // calling convention (§4.5.1 Call's "C-ABI callee").
  let fn_ty = cg.tc.func(Vec::new(), param_tys, effect_tys, ret_ty.clone(), item.is_c_abi());

  // A 1-tuple return detuples to its element at the backend boundary too
  // (§4.5.1), so `fn f() -> (s32)` and `fn g() -> s32` emit the same
  // `ty_function` signature, matching `gen_implicit_return`'s identical
  // special case below.
  let ret_bty = match (ret_ty.tuple_arity(), &ret_ty.kind) {
    (Some(1), TyKind::Tuple { elems, .. }) => consts::backend_ty(cg, &elems[0]),
    _ => consts::backend_ty(cg, &ret_ty),
  };
  let bty = cg.backend.ty_function(&backend_param_tys, ret_bty, var_args);
  let handle = cg.backend.add_function(&item.name.to_string(), bty);
  cg.backend.set_linkage(handle, Linkage::External);

  cg.fns.push(FnEntry { name: item.name, ty: fn_ty, handle, has_body: item.body.is_some() });
  Some(handle)
}

/// Globals (§4.5 step 2): the initializer must const-evaluate; a `let` whose
/// value can't be folded is a "non-constant in constant context" error (§7).
fn gen_global<B: Backend>(cg: &mut Cg<'_, B>, stmt: StmtId) -> Option<()> {
  let node = cg.unit.stmt(stmt);
  let StmtKind::GLet { name, ty, init, attrs } = &node.kind else { return None };
  let (name, ty, init, attrs) = (*name, *ty, *init, attrs.clone());

  let want = ty.and_then(|t| cg.resolve_type(t));
  let cv = cg.const_eval(init)?;
  let var_ty = cv_target_ty(cg, &cv, want.as_ref())?;
  let cv = coerce_cv(&cv, &var_ty)?;

  let bty = consts::backend_ty(cg, &var_ty);
  let handle = cg.backend.add_global(&name.to_string(), bty);
  let value = consts::gen_const(cg, &cv, &var_ty);
  cg.backend.set_initializer(handle, value);

  let parsed = crate::ast::Attrs::from_kinds(&attrs);
  if let Some(align) = parsed.align { cg.backend.set_alignment(handle, align) }
  if let Some(section) = parsed.section { cg.backend.set_section(handle, &section.to_string()) }
  if parsed.used() { cg.backend.append_to_used(handle) }
  cg.backend.set_global_linkage(handle, if parsed.export() { Linkage::External } else { Linkage::Internal });

  cg.globals.push(GlobalEntry { name, ty: var_ty, handle, value: Some(cv) });
  Some(())
}

/// Bodies (§4.5 step 3, §4.5.3): entry block, parameter binding, the body
/// itself, then an implicit return if control falls off the end.
fn gen_fn_body<B: Backend>(cg: &mut Cg<'_, B>, item: &FnItem, body: StmtId, handle: B::Function) -> Option<()> {
  let ret_ty = cg.resolve_type(item.ret)?;

  cg.current_fn = Some(handle);
  cg.current_return_ty = Some(ret_ty.clone());
  let entry = cg.fresh_block("entry");
  cg.backend.position_at_end(entry);

  cg.push_scope();
  for (i, p) in item.params.iter().enumerate() {
    let ty = cg.resolve_type(p.ty)?;
    if matches!(ty.kind, TyKind::Va) { continue }
    let bty = consts::backend_ty(cg, &ty);
    let slot = cg.backend.build_alloca(bty, &p.name.to_string());
    let incoming = cg.backend.fn_param(handle, u32::try_from(i).expect("too many parameters"));
    cg.backend.build_store(incoming, slot);
    cg.bind_local(LocalBinding { stmt: body, name: p.name, addr: Addr { ty, handle: slot } });
  }

  let result = stmt::gen_stmt(cg, body);
  let scope = cg.pop_scope();
  if result.is_some() {
    for &d in scope.defers.iter().rev() { stmt::gen_stmt(cg, d)?; }
    // Every path that already ends in `return`/`break`/`continue` placed its
    // own terminator; only a body that can fall off the end needs one here.
    if !terminates(cg, body) { gen_implicit_return(cg, &ret_ty); }
  }

  cg.current_fn = None;
  cg.current_return_ty = None;
  result
}

/// A conservative, purely syntactic approximation of "every path through
/// this statement ends in a terminator" (§4.5.3 step 4). It is deliberately
/// not full reachability analysis: it covers the shapes that matter in
/// practice (a trailing `return`, or an `if`/`else` whose both arms do) and
/// otherwise assumes control can fall through, which only ever costs an
/// extra (harmless, dead) implicit return rather than a missing one.
pub(crate) fn terminates<B: Backend>(cg: &Cg<'_, B>, id: StmtId) -> bool {
  match &cg.unit.stmt(id).kind {
    StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => true,
    StmtKind::Block(stmts) => stmts.last().is_some_and(|&s| terminates(cg, s)),
    StmtKind::If { then, els: Some(els), .. } => terminates(cg, *then) && terminates(cg, *els),
    _ => false,
  }
}

/// §4.5.3 step 4: a function whose body falls off the end without a
/// terminator returns a zeroed value of its declared return CT — detupled
/// for arity-1 returns, void for arity-0, a zeroed aggregate otherwise.
fn gen_implicit_return<B: Backend>(cg: &mut Cg<'_, B>, ret_ty: &Ty) {
  match (ret_ty.tuple_arity(), &ret_ty.kind) {
    (Some(0), _) => { cg.backend.build_ret_void(); }
    (Some(1), TyKind::Tuple { elems, .. }) => {
      let elem = elems[0].clone();
      let bty = consts::backend_ty(cg, &elem);
      let zero = cg.backend.const_zero(bty);
      cg.backend.build_ret(zero);
    }
    _ => {
      let bty = consts::backend_ty(cg, ret_ty);
      let zero = cg.backend.const_zero(bty);
      cg.backend.build_ret(zero);
    }
  }
}
