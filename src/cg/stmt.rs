//! Statement lowering (§4.5.2): scope push/pop with LIFO defer flushing,
//! `Return`'s cross-scope defer-then-return sequencing, loop control flow,
//! and assignment (including union-variant selection through the byte-blob
//! representation §4.6 settled on).

use if_chain::if_chain;
use crate::ast::{AssignOp, ExprId, StmtId, StmtKind};
use crate::backend::Backend;
use crate::cg::expr::{gen_addr, gen_value};
use crate::cg::func::terminates;
use crate::cg::{Cg, LocalBinding, LoopHandles, UsingBinding};
use crate::tc::TyKind;

/// Lower every statement reachable from `id`, in order. Returns `Some(())`
/// on success; a `None` anywhere aborts the whole function (§4.5.3: codegen
/// is all-or-nothing per function, diagnostics already recorded by whichever
/// resolution step failed).
pub fn gen_stmt<B: Backend>(cg: &mut Cg<'_, B>, id: StmtId) -> Option<()> {
  let node = cg.unit.stmt(id);
  match &node.kind {
    StmtKind::Block(stmts) => gen_block(cg, stmts),
    StmtKind::Return(value) => gen_return(cg, *value),
    StmtKind::Defer(inner) => { cg.push_defer(*inner); Some(()) }
    StmtKind::Break => {
      let h = cg.current_loop()?;
      let (exit, depth) = (h.exit, h.scope_depth);
      for d in cg.defers_from(depth) { gen_stmt(cg, d)?; }
      cg.backend.build_br(exit);
      Some(())
    }
    StmtKind::Continue => {
      let h = cg.current_loop()?;
      let (post, depth) = (h.post, h.scope_depth);
      for d in cg.defers_from(depth) { gen_stmt(cg, d)?; }
      cg.backend.build_br(post);
      Some(())
    }
    StmtKind::If { init, cond, then, els } => gen_if(cg, *init, *cond, *then, *els),
    StmtKind::Let { name, ty, init, .. } => gen_let(cg, id, *name, *ty, *init),
    StmtKind::GLet { .. } => Some(()), // globals are lowered once, up front (§4.5)
    StmtKind::Using { name, ty, init } => gen_using(cg, *name, *ty, *init),
    StmtKind::For { init, cond, post, body, els } => gen_for(cg, *init, *cond, *post, *body, *els),
    StmtKind::Expr(e) => { gen_value(cg, *e, None)?; Some(()) }
    StmtKind::Assign { op, lhs, rhs } => gen_assign(cg, *op, *lhs, *rhs),
  }
}

fn gen_block<B: Backend>(cg: &mut Cg<'_, B>, stmts: &[StmtId]) -> Option<()> {
  cg.push_scope();
  let mut ok = true;
  for &s in stmts {
    if gen_stmt(cg, s).is_none() { ok = false; break }
  }
  let scope = cg.pop_scope();
  if ok {
    for &d in scope.defers.iter().rev() { gen_stmt(cg, d)?; }
    Some(())
  } else {
    None
  }
}

/// `return` (§4.5.2): flush every pending defer across every currently open
/// scope, innermost first, before building the actual `ret`.
fn gen_return<B: Backend>(cg: &mut Cg<'_, B>, value: Option<ExprId>) -> Option<()> {
  let want = cg.current_return_ty.clone();
  // A union-typed return whose expression produces one of its variants goes
  // through the same tag-plus-payload box `gen_let`/`Assign` use: `gen_value`'s
  // own coercion only ever targets the variant's natural type, never an
  // enclosing union, so the bare variant value would otherwise be handed to
  // `build_ret` against a function whose backend return type is the union's
  // blob (fixed at prepass).
  if_chain! {
    if let Some(ret_ty) = &want;
    if let Some(e) = value;
    if let TyKind::Union { variants } = &ret_ty.kind;
    then {
      let variants = variants.clone();
      let bty = crate::cg::consts::backend_ty(cg, ret_ty);
      let slot = cg.backend.build_alloca(bty, "ret.union");
      let addr = crate::cg::Addr { ty: ret_ty.clone(), handle: slot };
      gen_union_assign(cg, &addr, &variants, e)?;
      for d in cg.all_pending_defers() { gen_stmt(cg, d)?; }
      let loaded = cg.backend.build_load(bty, slot);
      cg.backend.build_ret(loaded);
      return Some(());
    }
  }
  let v = match value {
    Some(e) => Some(gen_value(cg, e, want.as_ref())?),
    None => None,
  };
  for d in cg.all_pending_defers() { gen_stmt(cg, d)?; }
  match v {
    Some(v) => cg.backend.build_ret(v.handle),
    None => cg.backend.build_ret_void(),
  }
  Some(())
}

fn gen_let<B: Backend>(cg: &mut Cg<'_, B>, stmt: StmtId, name: crate::symbol::Symbol, ty: Option<crate::ast::TypeId>, init: Option<ExprId>) -> Option<()> {
  let want = ty.and_then(|t| cg.resolve_type(t));
  // A declared union type with an initializer of one of its variants goes
  // through the same tag-plus-payload write `Assign` uses (§4.5.2), not a
  // plain store: `gen_value`'s own coercion only ever targets the literal's
  // natural type, never a enclosing union.
  if_chain! {
    if let Some(var_ty) = &want;
    if let Some(e) = init;
    if let TyKind::Union { variants } = &var_ty.kind;
    then {
      let variants = variants.clone();
      let bty = crate::cg::consts::backend_ty(cg, var_ty);
      let slot = cg.backend.build_alloca(bty, &name.to_string());
      let addr = crate::cg::Addr { ty: var_ty.clone(), handle: slot };
      gen_union_assign(cg, &addr, &variants, e)?;
      cg.bind_local(LocalBinding { stmt, name, addr });
      return Some(());
    }
  }
  let value = match init {
    Some(e) => Some(gen_value(cg, e, want.as_ref())?),
    None => None,
  };
  let var_ty = want.or_else(|| value.as_ref().map(|v| v.ty.clone()))?;
  let bty = crate::cg::consts::backend_ty(cg, &var_ty);
  let slot = cg.backend.build_alloca(bty, &name.to_string());
  if let Some(v) = &value { cg.backend.build_store(v.handle, slot) }
  cg.bind_local(LocalBinding { stmt, name, addr: crate::cg::Addr { ty: var_ty, handle: slot } });
  Some(())
}

/// `using` (§4.4 additions, §4.5.2): like `let`, but also registers the
/// binding so lookups through `resolve_var` can see it as a `Using`
/// (narrowing and defer-on-scope-exit semantics are identical to `let`
/// otherwise — the distinction only matters to the type checker upstream).
fn gen_using<B: Backend>(cg: &mut Cg<'_, B>, name: crate::symbol::Symbol, ty: crate::ast::TypeId, init: Option<ExprId>) -> Option<()> {
  let var_ty = cg.resolve_type(ty)?;
  let value = match init {
    Some(e) => Some(gen_value(cg, e, Some(&var_ty))?),
    None => None,
  };
  let bty = crate::cg::consts::backend_ty(cg, &var_ty);
  let slot = cg.backend.build_alloca(bty, &name.to_string());
  if let Some(v) = &value { cg.backend.build_store(v.handle, slot) }
  cg.bind_using(UsingBinding { name, ty: var_ty.clone(), addr: crate::cg::Addr { ty: var_ty, handle: slot } });
  Some(())
}

/// `if` (§4.5.2): init runs in its own scope enclosing both branches; tests
/// recorded while lowering `cond` are visible in `then` and cleared before
/// `else` is lowered.
fn gen_if<B: Backend>(
  cg: &mut Cg<'_, B>, init: Option<StmtId>, cond: ExprId, then: StmtId, els: Option<StmtId>,
) -> Option<()> {
  cg.push_scope();
  if let Some(i) = init { gen_stmt(cg, i)?; }
  let cond_v = gen_value(cg, cond, None)?;
  let then_bb = cg.fresh_block("if.then");
  let else_bb = cg.fresh_block("if.else");
  let merge_bb = cg.fresh_block("if.merge");
  cg.backend.build_cond_br(cond_v.handle, then_bb, if els.is_some() { else_bb } else { merge_bb });

  cg.backend.position_at_end(then_bb);
  gen_stmt(cg, then)?;
  if !terminates(cg, then) { cg.backend.build_br(merge_bb); }

  if let Some(e) = els {
    cg.clear_tests();
    cg.backend.position_at_end(else_bb);
    gen_stmt(cg, e)?;
    if !terminates(cg, e) { cg.backend.build_br(merge_bb); }
  }

  cg.backend.position_at_end(merge_bb);
  let scope = cg.pop_scope();
  for &d in scope.defers.iter().rev() { gen_stmt(cg, d)?; }
  Some(())
}

/// `for` (§4.5.2, §8.4): `init`/`cond`/`post` share one scope with the body;
/// `els` runs only when the loop falls through the condition, never after a
/// `break`.
fn gen_for<B: Backend>(
  cg: &mut Cg<'_, B>, init: Option<StmtId>, cond: Option<ExprId>, post: Option<StmtId>, body: StmtId, els: Option<StmtId>,
) -> Option<()> {
  cg.push_scope();
  if let Some(i) = init { gen_stmt(cg, i)?; }

  let cond_bb = cg.fresh_block("for.cond");
  let body_bb = cg.fresh_block("for.body");
  let post_bb = cg.fresh_block("for.post");
  let els_bb = cg.fresh_block("for.else");
  let exit_bb = cg.fresh_block("for.exit");

  cg.backend.build_br(cond_bb);
  cg.backend.position_at_end(cond_bb);
  match cond {
    Some(c) => {
      let v = gen_value(cg, c, None)?;
      cg.backend.build_cond_br(v.handle, body_bb, if els.is_some() { els_bb } else { exit_bb });
    }
    None => cg.backend.build_br(body_bb),
  }

  let scope_depth = cg.scopes.len();
  cg.loops.push(LoopHandles { exit: exit_bb, post: post_bb, scope_depth });
  cg.backend.position_at_end(body_bb);
  gen_stmt(cg, body)?;
  if !terminates(cg, body) { cg.backend.build_br(post_bb); }
  cg.loops.pop();

  cg.backend.position_at_end(post_bb);
  if let Some(p) = post { gen_stmt(cg, p)?; }
  cg.backend.build_br(cond_bb);

  if let Some(e) = els {
    cg.backend.position_at_end(els_bb);
    gen_stmt(cg, e)?;
    if !terminates(cg, e) { cg.backend.build_br(exit_bb); }
  }

  cg.backend.position_at_end(exit_bb);
  let scope = cg.pop_scope();
  for &d in scope.defers.iter().rev() { gen_stmt(cg, d)?; }
  Some(())
}

/// Union-variant selection (§4.5.2 Assign): assigning a concrete variant
/// value to a union-typed lvalue writes the payload bytes then the tag byte,
/// rather than going through the uniform store every other assignment uses.
fn gen_union_assign<B: Backend>(cg: &mut Cg<'_, B>, dst: &crate::cg::Addr<B>, variants: &[crate::tc::Ty], rhs: ExprId) -> Option<()> {
  let rv = gen_value(cg, rhs, None)?;
  let idx = variants.iter().position(|v| *v == rv.ty)?;
  // The payload occupies the union blob's leading bytes (§4.4 layout), so the
  // union's own address is already the payload's address.
  cg.backend.build_store(rv.handle, dst.handle);
  let tag_offset = variants.iter().map(|v| v.layout.size).max().unwrap_or(0);
  let u8ty = cg.backend.ty_int(8);
  let byte_idx = cg.backend.const_int(cg.backend.ty_int(64), i128::try_from(tag_offset).ok()?);
  let tag_ptr = cg.backend.build_gep(u8ty, dst.handle, &[byte_idx]);
  let tag = cg.backend.const_int(u8ty, i128::try_from(idx).ok()?);
  cg.backend.build_store(tag, tag_ptr);
  Some(())
}

fn gen_assign<B: Backend>(cg: &mut Cg<'_, B>, op: AssignOp, lhs: ExprId, rhs: ExprId) -> Option<()> {
  let dst = gen_addr(cg, lhs)?;
  // Atomics reject the compound-assignment operators (§4.4): only a plain
  // store ever applies to an atomic-typed lvalue.
  if matches!(dst.ty.kind, TyKind::Atomic(_)) && op != AssignOp::Assign { return None }
  if let TyKind::Union { variants } = &dst.ty.kind {
    let variants = variants.clone();
    return gen_union_assign(cg, &dst, &variants, rhs)
  }
  let new_value = match op {
    AssignOp::Assign => gen_value(cg, rhs, Some(&dst.ty))?,
    AssignOp::AddAssign | AssignOp::SubAssign | AssignOp::MulAssign | AssignOp::DivAssign => {
      let cur_bty = crate::cg::consts::backend_ty(cg, &dst.ty);
      let cur = cg.backend.build_load(cur_bty, dst.handle);
      let rv = gen_value(cg, rhs, Some(&dst.ty))?;
      let is_float = matches!(dst.ty.kind, TyKind::Float(_));
      let signed = dst.ty.int_kind().is_some_and(|k| k.signed());
      let handle = if is_float {
        match op {
          AssignOp::AddAssign => cg.backend.build_fadd(cur, rv.handle),
          AssignOp::SubAssign => cg.backend.build_fsub(cur, rv.handle),
          AssignOp::MulAssign => cg.backend.build_fmul(cur, rv.handle),
          AssignOp::DivAssign => cg.backend.build_fdiv(cur, rv.handle),
          AssignOp::Assign => unreachable!(),
        }
      } else {
        match op {
          AssignOp::AddAssign => cg.backend.build_add(cur, rv.handle),
          AssignOp::SubAssign => cg.backend.build_sub(cur, rv.handle),
          AssignOp::MulAssign => cg.backend.build_mul(cur, rv.handle),
          AssignOp::DivAssign if signed => cg.backend.build_sdiv(cur, rv.handle),
          AssignOp::DivAssign => cg.backend.build_udiv(cur, rv.handle),
          AssignOp::Assign => unreachable!(),
        }
      };
      crate::cg::GenValue { ty: dst.ty.clone(), handle }
    }
  };
  cg.backend.build_store(new_value.handle, dst.handle);
  Some(())
}
