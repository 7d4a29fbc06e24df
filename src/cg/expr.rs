//! Expression lowering (§4.5.1): `gen_value` for r-values, `gen_addr` for
//! l-values. Every expression whose whole subtree const-evaluates takes the
//! `eval::eval_value` fast path and lowers straight to a backend constant
//! (§8.1 property 4); everything else lowers operand-by-operand against the
//! live builder.

use smallvec::SmallVec;
use crate::ast::{BinOp, ExprId, ExprKind, LBinOp, UnaryOp};
use crate::backend::{Backend, CastOp, FloatPredicate, IntPredicate};
use crate::cg::{consts, Addr, Cg, GenValue, Resolved};
use crate::cv::Cv;
use crate::tc::{Ty, TyKind};

/// The canonical `Ty` a const value should be lowered at: its own type if
/// already typed, or `want`'s if it's still an untyped literal (§3.3/§4.3).
pub(crate) fn cv_target_ty<B: Backend>(cg: &Cg<'_, B>, cv: &Cv, want: Option<&Ty>) -> Option<Ty> {
  // A 1-tuple type is source-level sugar for its own element (§4.5.1):
  // `eval::eval_value` already detuples the *value* side for a one-element
  // `Tuple` expression, so the *target* type must detuple the same way or a
  // bare scalar constant against a `(T)`-typed target never coerces.
  let want = want.map(|t| match &t.kind {
    TyKind::Tuple { elems, .. } if elems.len() == 1 => &elems[0],
    _ => t,
  });
  match cv {
    Cv::Int { kind, .. } => Some(cg.tc.int(*kind)),
    Cv::Bool { kind, .. } => Some(cg.tc.bool_(*kind)),
    Cv::Float { kind, .. } => Some(cg.tc.float(*kind)),
    Cv::Str(_) => Some(cg.tc.builtins.string.clone()),
    Cv::Tuple { ty, .. } => Some(ty.clone()),
    Cv::Array { elem_ty, values } => Some(cg.tc.array(elem_ty.clone(), values.len() as u64)),
    Cv::UntypedInt(_) | Cv::UntypedReal(_) => want.cloned(),
    Cv::None => want.cloned(),
  }
}

pub(crate) fn coerce_cv(cv: &Cv, ty: &Ty) -> Option<Cv> {
  if !cv.is_untyped() { return Some(cv.clone()) }
  match &ty.kind {
    TyKind::Int(k) => cv.coerce_int(*k),
    TyKind::Float(k) => cv.coerce_float(*k),
    _ => None,
  }
}

/// Lower `id` to an r-value, coercing an untyped constant result against
/// `want` when given (§4.3's "coerced at its use site").
pub fn gen_value<B: Backend>(cg: &mut Cg<'_, B>, id: ExprId, want: Option<&Ty>) -> Option<GenValue<B>> {
  if let Some(cv) = cg.const_eval(id) {
    let ty = cv_target_ty(cg, &cv, want)?;
    let coerced = coerce_cv(&cv, &ty)?;
    let handle = consts::gen_const(cg, &coerced, &ty);
    return Some(GenValue { ty, handle })
  }
  gen_value_runtime(cg, id, want)
}

fn load_addr<B: Backend>(cg: &mut Cg<'_, B>, addr: &Addr<B>) -> GenValue<B> {
  let bty = consts::backend_ty(cg, &addr.ty);
  let v = cg.backend.build_load(bty, addr.handle);
  GenValue { ty: addr.ty.clone(), handle: v }
}

/// Find a tuple field by name, returning its position among the laid-out
/// fields (padding included, matching `build_gep`'s struct-index space) and
/// its `Ty`.
fn find_field(ty: &Ty, field: crate::symbol::Symbol) -> Option<(u32, Ty)> {
  ty.tuple_fields.iter().enumerate().find(|(_, f)| f.name == Some(field))
    .map(|(i, f)| (u32::try_from(i).expect("too many fields"), f.ty.clone()))
}

/// Position of `variant` among a union's member types, used both for the
/// tag value and for `is`-narrowing comparisons.
fn union_variant_index(ty: &Ty, variant: &Ty) -> Option<u32> {
  match &ty.kind {
    TyKind::Union { variants } => variants.iter().position(|v| v == variant).map(|i| u32::try_from(i).unwrap()),
    _ => None,
  }
}

pub fn gen_addr<B: Backend>(cg: &mut Cg<'_, B>, id: ExprId) -> Option<Addr<B>> {
  let node = cg.unit.expr(id);
  match &node.kind {
    ExprKind::Var(name) => {
      let name = *name;
      match cg.resolve_var(name)? {
        Resolved::Local(addr) | Resolved::Using(addr) => {
          let addr = addr.clone();
          // An active `is`-narrowing (§4.5.1 `Test`) overrides the binding's
          // declared CT for reads inside `then`; the backing storage is the
          // same bytes either way, so only the reported type changes.
          match cg.active_tests().into_iter().find(|t| t.name == name) {
            Some(t) => Some(Addr { ty: t.ty, handle: addr.handle }),
            None => Some(addr),
          }
        }
        Resolved::Global(g) => Some(Addr { ty: g.ty.clone(), handle: cg.backend.global_value(g.handle) }),
        Resolved::Fn(_) => None,
      }
    }
    ExprKind::Unary { op: UnaryOp::Deref, operand } => {
      let v = gen_value(cg, *operand, None)?;
      let pointee = match &v.ty.kind { TyKind::Ptr(p) => p.clone(), _ => return None };
      Some(Addr { ty: pointee, handle: v.handle })
    }
    ExprKind::Index { base, index } => {
      let base_addr = gen_addr(cg, *base)?;
      let elem_ty = match &base_addr.ty.kind { TyKind::Array(e, _) | TyKind::Slice(e) => e.clone(), _ => return None };
      let u64_ty = cg.tc.builtins.u64.clone();
      let idx = gen_value(cg, *index, Some(&u64_ty))?;
      let base_bty = consts::backend_ty(cg, &base_addr.ty);
      let i32ty = cg.backend.ty_int(32);
      let zero = cg.backend.const_int(i32ty, 0);
      let ptr = cg.backend.build_gep(base_bty, base_addr.handle, &[zero, idx.handle]);
      Some(Addr { ty: elem_ty, handle: ptr })
    }
    ExprKind::Access { base, field } => {
      let base_addr = gen_addr(cg, *base)?;
      let (idx, field_ty) = find_field(&base_addr.ty, *field)?;
      let base_bty = consts::backend_ty(cg, &base_addr.ty);
      let i32ty = cg.backend.ty_int(32);
      let zero = cg.backend.const_int(i32ty, 0);
      let idx_v = cg.backend.const_int(i32ty, i128::from(idx));
      let ptr = cg.backend.build_gep(base_bty, base_addr.handle, &[zero, idx_v]);
      Some(Addr { ty: field_ty, handle: ptr })
    }
    _ => None,
  }
}

fn int_pred(op: BinOp, signed: bool) -> Option<IntPredicate> {
  Some(match (op, signed) {
    (BinOp::Eq, _) => IntPredicate::Eq,
    (BinOp::Ne, _) => IntPredicate::Ne,
    (BinOp::Lt, true) => IntPredicate::SLt, (BinOp::Lt, false) => IntPredicate::ULt,
    (BinOp::Le, true) => IntPredicate::SLe, (BinOp::Le, false) => IntPredicate::ULe,
    (BinOp::Gt, true) => IntPredicate::SGt, (BinOp::Gt, false) => IntPredicate::UGt,
    (BinOp::Ge, true) => IntPredicate::SGe, (BinOp::Ge, false) => IntPredicate::UGe,
    _ => return None,
  })
}

fn float_pred(op: BinOp) -> Option<FloatPredicate> {
  Some(match op {
    BinOp::Eq => FloatPredicate::Eq, BinOp::Ne => FloatPredicate::Ne,
    BinOp::Lt => FloatPredicate::Lt, BinOp::Le => FloatPredicate::Le,
    BinOp::Gt => FloatPredicate::Gt, BinOp::Ge => FloatPredicate::Ge,
    _ => return None,
  })
}

fn is_cmp(op: BinOp) -> bool {
  matches!(op, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
}

/// Lower an integer `Bin` (§4.5.1): both operands already share `ty`.
fn gen_int_bin<B: Backend>(cg: &mut Cg<'_, B>, op: BinOp, lhs: B::Value, rhs: B::Value, signed: bool) -> Option<B::Value> {
  Some(match op {
    BinOp::Add => cg.backend.build_add(lhs, rhs),
    BinOp::Sub => cg.backend.build_sub(lhs, rhs),
    BinOp::Mul => cg.backend.build_mul(lhs, rhs),
    BinOp::Div if signed => cg.backend.build_sdiv(lhs, rhs),
    BinOp::Div => cg.backend.build_udiv(lhs, rhs),
    BinOp::BitAnd => cg.backend.build_and(lhs, rhs),
    BinOp::BitOr => cg.backend.build_or(lhs, rhs),
    BinOp::Shl => cg.backend.build_shl(lhs, rhs),
    BinOp::Shr if signed => cg.backend.build_ashr(lhs, rhs),
    BinOp::Shr => cg.backend.build_lshr(lhs, rhs),
    _ if is_cmp(op) => cg.backend.build_icmp(int_pred(op, signed)?, lhs, rhs),
    _ => return None,
  })
}

fn gen_float_bin<B: Backend>(cg: &mut Cg<'_, B>, op: BinOp, lhs: B::Value, rhs: B::Value) -> Option<B::Value> {
  Some(match op {
    BinOp::Add => cg.backend.build_fadd(lhs, rhs),
    BinOp::Sub => cg.backend.build_fsub(lhs, rhs),
    BinOp::Mul => cg.backend.build_fmul(lhs, rhs),
    BinOp::Div => cg.backend.build_fdiv(lhs, rhs),
    _ if is_cmp(op) => cg.backend.build_fcmp(float_pred(op)?, lhs, rhs),
    _ => return None,
  })
}

/// `a max b` / `a min b` (§4.4 `BinOp::Max`/`Min`): no dedicated backend
/// instruction, so lowered as `icmp` + a two-successor branch merging through
/// a `phi`, the same shape the builder uses for `if` (§4.5.2).
fn gen_minmax<B: Backend>(cg: &mut Cg<'_, B>, op: BinOp, lhs: &GenValue<B>, rhs: &GenValue<B>) -> Option<GenValue<B>> {
  let signed = lhs.ty.int_kind().is_some_and(|k| k.signed());
  let want_lhs_greater = matches!(op, BinOp::Max);
  let pred = if want_lhs_greater {
    if signed { IntPredicate::SGt } else { IntPredicate::UGt }
  } else if signed { IntPredicate::SLt } else { IntPredicate::ULt };
  let cmp = cg.backend.build_icmp(pred, lhs.handle, rhs.handle);
  let then_bb = cg.fresh_block("minmax.then");
  let else_bb = cg.fresh_block("minmax.else");
  let merge_bb = cg.fresh_block("minmax.merge");
  cg.backend.build_cond_br(cmp, then_bb, else_bb);
  cg.backend.position_at_end(then_bb);
  cg.backend.build_br(merge_bb);
  cg.backend.position_at_end(else_bb);
  cg.backend.build_br(merge_bb);
  cg.backend.position_at_end(merge_bb);
  let bty = consts::backend_ty(cg, &lhs.ty);
  let phi = cg.backend.build_phi(bty, &[(lhs.handle, then_bb), (rhs.handle, else_bb)]);
  Some(GenValue { ty: lhs.ty.clone(), handle: phi })
}

fn gen_value_runtime<B: Backend>(cg: &mut Cg<'_, B>, id: ExprId, want: Option<&Ty>) -> Option<GenValue<B>> {
  let node = cg.unit.expr(id);
  match &node.kind {
    ExprKind::Var(_) | ExprKind::Index { .. } | ExprKind::Access { .. } => {
      let addr = gen_addr(cg, id)?;
      Some(load_addr(cg, &addr))
    }
    ExprKind::Unary { op: UnaryOp::Deref, .. } => {
      let addr = gen_addr(cg, id)?;
      Some(load_addr(cg, &addr))
    }
    ExprKind::Unary { op: UnaryOp::Addr, operand } => {
      let addr = gen_addr(cg, *operand)?;
      Some(GenValue { ty: cg.tc.ptr(addr.ty), handle: addr.handle })
    }
    ExprKind::Unary { op: UnaryOp::Not, operand } => {
      let v = gen_value(cg, *operand, None)?;
      let r = cg.backend.build_not(v.handle);
      Some(GenValue { ty: v.ty, handle: r })
    }
    ExprKind::Unary { op: UnaryOp::Neg, operand } => {
      let v = gen_value(cg, *operand, want)?;
      let r = if matches!(v.ty.kind, TyKind::Float(_)) { cg.backend.build_fneg(v.handle) } else { cg.backend.build_neg(v.handle) };
      Some(GenValue { ty: v.ty, handle: r })
    }
    // Infix spellings (§4.5.1): `a.b` desugars to `Access`, `T of name` to
    // `Prop`; the parser produces `Bin` nodes for the operator spelling and
    // `Access`/`Prop` directly for the postfix spelling, so both land here.
    ExprKind::Bin { op: BinOp::Dot, lhs, rhs } => {
      let field = match &cg.unit.expr(*rhs).kind { ExprKind::Var(s) => *s, _ => return None };
      let base_addr = gen_addr(cg, *lhs)?;
      let (idx, field_ty) = find_field(&base_addr.ty, field)?;
      let base_bty = consts::backend_ty(cg, &base_addr.ty);
      let i32ty = cg.backend.ty_int(32);
      let zero = cg.backend.const_int(i32ty, 0);
      let idx_v = cg.backend.const_int(i32ty, i128::from(idx));
      let ptr = cg.backend.build_gep(base_bty, base_addr.handle, &[zero, idx_v]);
      Some(load_addr(cg, &Addr { ty: field_ty, handle: ptr }))
    }
    ExprKind::Bin { op: BinOp::Of, lhs, rhs } => {
      let ty = match &cg.unit.expr(*lhs).kind { ExprKind::Type(t) => *t, _ => return None };
      let prop = match &cg.unit.expr(*rhs).kind { ExprKind::Var(s) => *s, _ => return None };
      gen_prop(cg, ty, prop)
    }
    ExprKind::Bin { op, lhs, rhs } => gen_bin(cg, *op, *lhs, *rhs),
    ExprKind::LBin { op, lhs, rhs } => gen_lbin(cg, *op, *lhs, *rhs),
    ExprKind::Cast { operand, ty } => gen_cast(cg, *operand, *ty),
    ExprKind::Test { operand, ty } => gen_test(cg, *operand, *ty),
    ExprKind::Prop { ty, prop } => gen_prop(cg, *ty, *prop),
    ExprKind::Tuple(elems) => gen_tuple(cg, elems, want),
    ExprKind::Agg { ty, fields } => gen_agg(cg, *ty, fields),
    ExprKind::Call { callee, args } => gen_call(cg, *callee, args),
    ExprKind::Eff(inner) => gen_value(cg, *inner, want),
    ExprKind::Selector(module, member) => gen_selector(cg, node.range, *module, *member),
    ExprKind::InferSize => gen_infer_size(cg, node.range, want),
    _ => None,
  }
}

/// `A::b` (§4.5.1 `Selector`): resolved only against the current unit's own
/// `module` item, cross-unit resolution being out of scope. Either half of
/// the lookup failing is a diagnostic, not a silent `None`.
fn gen_selector<B: Backend>(
  cg: &mut Cg<'_, B>, range: crate::source::Range, module: crate::symbol::Symbol, member: crate::symbol::Symbol,
) -> Option<GenValue<B>> {
  if cg.unit.module_name() != Some(module) {
    cg.diag.error(range, format!("no module named '{module}' in this unit"));
    return None;
  }
  match cg.resolve_var(member) {
    Some(Resolved::Local(addr)) | Some(Resolved::Using(addr)) => {
      let addr = addr.clone();
      Some(load_addr(cg, &addr))
    }
    Some(Resolved::Global(g)) => {
      let (ty, handle) = (g.ty.clone(), g.handle);
      let v = cg.backend.global_value(handle);
      Some(GenValue { ty, handle: v })
    }
    Some(Resolved::Fn(_)) | None => {
      cg.diag.error(range, format!("'{member}' is not a value in module '{module}'"));
      None
    }
  }
}

/// `?` (§4.5.1 `InferSize`): only legal where `want` names an array CT, in
/// which case it lowers to that array's extent as a plain integer constant.
fn gen_infer_size<B: Backend>(cg: &mut Cg<'_, B>, range: crate::source::Range, want: Option<&Ty>) -> Option<GenValue<B>> {
  let extent = match want.map(|t| &t.kind) {
    Some(TyKind::Array(_, n)) => *n,
    _ => {
      cg.diag.error(range, "cannot infer size without a target array type");
      return None;
    }
  };
  let ty = cg.tc.int(crate::cv::IntKind::S32);
  let bty = consts::backend_ty(cg, &ty);
  let handle = cg.backend.const_int(bty, i128::from(extent));
  Some(GenValue { ty, handle })
}

fn gen_bin<B: Backend>(cg: &mut Cg<'_, B>, op: BinOp, lhs: ExprId, rhs: ExprId) -> Option<GenValue<B>> {
  // Evaluate whichever side is not a bare untyped literal first, so its
  // concrete type can hint the other side's coercion (§4.3).
  let lv = gen_value(cg, lhs, None)?;
  let rv = gen_value(cg, rhs, Some(&lv.ty))?;
  let lv = if lv.ty == rv.ty { lv } else { gen_value(cg, lhs, Some(&rv.ty))? };
  let is_float = matches!(lv.ty.kind, TyKind::Float(_));
  let result = if is_float {
    gen_float_bin(cg, op, lv.handle, rv.handle)?
  } else {
    let signed = lv.ty.int_kind().is_some_and(|k| k.signed());
    match op {
      BinOp::Max | BinOp::Min => return gen_minmax(cg, op, &lv, &rv),
      _ => gen_int_bin(cg, op, lv.handle, rv.handle, signed)?,
    }
  };
  let ty = if is_cmp(op) { cg.tc.bool_(crate::cv::BoolKind::B8) } else { lv.ty };
  Some(GenValue { ty, handle: result })
}

/// `&&`/`||` (§4.5.1, §8.4): the right operand is only evaluated when the
/// left doesn't already decide the result.
fn gen_lbin<B: Backend>(cg: &mut Cg<'_, B>, op: LBinOp, lhs: ExprId, rhs: ExprId) -> Option<GenValue<B>> {
  let bool_ty = cg.tc.bool_(crate::cv::BoolKind::B8);
  let lv = gen_value(cg, lhs, Some(&bool_ty))?;
  let rhs_bb = cg.fresh_block("lbin.rhs");
  let merge_bb = cg.fresh_block("lbin.merge");
  let short_circuit_bb = cg.fresh_block("lbin.shortcircuit");
  match op {
    LBinOp::And => cg.backend.build_cond_br(lv.handle, rhs_bb, short_circuit_bb),
    LBinOp::Or => cg.backend.build_cond_br(lv.handle, short_circuit_bb, rhs_bb),
  }
  cg.backend.position_at_end(short_circuit_bb);
  cg.backend.build_br(merge_bb);
  cg.backend.position_at_end(rhs_bb);
  let rv = gen_value(cg, rhs, Some(&bool_ty))?;
  cg.backend.build_br(merge_bb);
  cg.backend.position_at_end(merge_bb);
  let bty = consts::backend_ty(cg, &bool_ty);
  let phi = cg.backend.build_phi(bty, &[(lv.handle, short_circuit_bb), (rv.handle, rhs_bb)]);
  Some(GenValue { ty: bool_ty, handle: phi })
}

fn float_bits(k: crate::cv::FloatKind) -> u32 {
  match k { crate::cv::FloatKind::F32 => 32, crate::cv::FloatKind::F64 => 64 }
}

fn cast_op(from: &Ty, to: &Ty) -> Option<CastOp> {
  match (&from.kind, &to.kind) {
    (TyKind::Int(f), TyKind::Int(t)) if f.bits() == t.bits() => Some(CastOp::Bitcast),
    (TyKind::Int(f), TyKind::Int(t)) if f.bits() > t.bits() => Some(CastOp::Trunc),
    (TyKind::Int(f), TyKind::Int(_)) if f.signed() => Some(CastOp::SExt),
    (TyKind::Int(_), TyKind::Int(_)) => Some(CastOp::ZExt),
    (TyKind::Int(f), TyKind::Float(_)) => Some(if f.signed() { CastOp::SiToFp } else { CastOp::UiToFp }),
    (TyKind::Float(_), TyKind::Int(t)) => Some(if t.signed() { CastOp::FpToSi } else { CastOp::FpToUi }),
    (TyKind::Float(f), TyKind::Float(t)) if float_bits(*f) > float_bits(*t) => Some(CastOp::FpTrunc),
    (TyKind::Float(_), TyKind::Float(_)) => Some(CastOp::FpExt),
    (TyKind::Ptr(_), TyKind::Ptr(_)) => Some(CastOp::Bitcast),
    (TyKind::Ptr(_), TyKind::Int(_)) => Some(CastOp::PtrToInt),
    (TyKind::Int(_), TyKind::Ptr(_)) => Some(CastOp::IntToPtr),
    _ => None,
  }
}

fn gen_cast<B: Backend>(cg: &mut Cg<'_, B>, operand: ExprId, ty: crate::ast::TypeId) -> Option<GenValue<B>> {
  let target = cg.resolve_type(ty)?;
  let v = gen_value(cg, operand, None)?;
  let op = cast_op(&v.ty, &target)?;
  let bty = consts::backend_ty(cg, &target);
  let handle = cg.backend.build_cast(op, v.handle, bty);
  Some(GenValue { ty: target, handle })
}

/// `x is T` (§4.5.1): compare the union's tag byte against `T`'s variant
/// index. The narrowing itself (binding `x` as `T` in the `then` branch) is
/// recorded by the caller (`cg::stmt`'s `If` lowering), not here.
fn gen_test<B: Backend>(cg: &mut Cg<'_, B>, operand: ExprId, ty: crate::ast::TypeId) -> Option<GenValue<B>> {
  let variant = cg.resolve_type(ty)?;
  let addr = gen_addr(cg, operand)?;
  let idx = union_variant_index(&addr.ty, &variant)?;
  // A bare-variable operand also records a narrowing (§4.5.1 `Test`): the
  // caller (`cg::stmt`'s `If`) scopes its visibility to `then` and clears it
  // before lowering `else`. A non-`Var` operand (a field, an index, ...)
  // narrows nothing since there is no name to rebind.
  if let ExprKind::Var(name) = &cg.unit.expr(operand).kind {
    cg.push_test(crate::cg::Test { name: *name, ty: variant.clone() });
  }
  let tag_offset = match &addr.ty.kind {
    TyKind::Union { variants } => variants.iter().map(|v| v.layout.size).max().unwrap_or(0),
    _ => return None,
  };
  let u8ty = cg.backend.ty_int(8);
  let byte_idx = cg.backend.const_int(cg.backend.ty_int(64), i128::try_from(tag_offset).ok()?);
  let tag_ptr = cg.backend.build_gep(u8ty, addr.handle, &[byte_idx]);
  let tag = cg.backend.build_load(u8ty, tag_ptr);
  let want = cg.backend.const_int(u8ty, i128::from(idx));
  let r = cg.backend.build_icmp(IntPredicate::Eq, tag, want);
  Some(GenValue { ty: cg.tc.bool_(crate::cv::BoolKind::B8), handle: r })
}

/// `T of name` (§4.5.1): always compile-time known once `T`'s enumerators are
/// resolved.
fn gen_prop<B: Backend>(cg: &mut Cg<'_, B>, ty: crate::ast::TypeId, prop: crate::symbol::Symbol) -> Option<GenValue<B>> {
  let enum_ty = cg.resolve_type(ty)?;
  let (base, value) = match &enum_ty.kind {
    TyKind::Enum { base, enumerators } => (*base, enumerators.iter().find(|(n, _)| *n == prop).map(|(_, v)| *v)?),
    _ => return None,
  };
  let bty = consts::backend_ty(cg, &enum_ty);
  let handle = cg.backend.const_int(bty, value);
  let _ = base;
  Some(GenValue { ty: enum_ty, handle })
}

/// A single-element tuple detuples to its element (§4.5.1); larger tuples
/// build an aggregate, field by field, laid out with the same padding the
/// type cache already computed (§4.4).
fn gen_tuple<B: Backend>(cg: &mut Cg<'_, B>, elems: &SmallVec<[ExprId; 4]>, want: Option<&Ty>) -> Option<GenValue<B>> {
  if elems.len() == 1 { return gen_value(cg, elems[0], want) }
  let want_elem_tys: Option<Vec<Ty>> = want.and_then(|t| match &t.kind {
    TyKind::Tuple { elems: e, .. } if e.len() == elems.len() => Some(e.to_vec()),
    _ => None,
  });
  let mut values = Vec::with_capacity(elems.len());
  let mut tys = Vec::with_capacity(elems.len());
  for (i, &e) in elems.iter().enumerate() {
    let hint = want_elem_tys.as_ref().map(|v| &v[i]);
    let v = gen_value(cg, e, hint)?;
    tys.push(v.ty.clone());
    values.push(v);
  }
  let tuple_ty = cg.tc.tuple(tys, None, None);
  build_aggregate(cg, &tuple_ty, &values)
}

fn gen_agg<B: Backend>(cg: &mut Cg<'_, B>, ty: crate::ast::TypeId, fields: &SmallVec<[(Option<crate::symbol::Symbol>, ExprId); 4]>) -> Option<GenValue<B>> {
  let agg_ty = cg.resolve_type(ty)?;
  let (elems, field_names) = match &agg_ty.kind {
    TyKind::Tuple { elems, field_names } => (elems.clone(), field_names.clone()),
    _ => return None,
  };
  let mut ordered: Vec<Option<GenValue<B>>> = (0..elems.len()).map(|_| None).collect();
  for (name, expr) in fields {
    let slot = if let Some(name) = name {
      field_names.as_ref()?.iter().position(|n| *n == Some(*name))?
    } else {
      ordered.iter().position(Option::is_none)?
    };
    let v = gen_value(cg, *expr, Some(&elems[slot]))?;
    ordered[slot] = Some(v);
  }
  let values: Vec<GenValue<B>> = ordered.into_iter().collect::<Option<_>>()?;
  build_aggregate(cg, &agg_ty, &values)
}

/// Assemble a tuple-shaped constant/runtime value from already-lowered
/// element values, via `const_zero` + `insert_value` (no dedicated "poison"
/// constructor in the backend trait, so a zeroed scaffold stands in).
fn build_aggregate<B: Backend>(cg: &mut Cg<'_, B>, ty: &Ty, values: &[GenValue<B>]) -> Option<GenValue<B>> {
  let bty = consts::backend_ty(cg, ty);
  let mut agg = cg.backend.const_zero(bty);
  let mut vi = 0;
  for (i, field) in ty.tuple_fields.iter().enumerate() {
    if matches!(field.ty.kind, TyKind::Padding(_)) { continue }
    let v = &values[vi];
    agg = cg.backend.build_insert_value(agg, v.handle, u32::try_from(i).ok()?);
    vi += 1;
  }
  Some(GenValue { ty: ty.clone(), handle: agg })
}

/// Call arguments: a `...x` operand (`ExprKind::Explode`) spreads a tuple's
/// elements as separate raw args instead of passing the tuple itself
/// (§4.4 additions); every other argument lowers normally.
fn gen_call<B: Backend>(cg: &mut Cg<'_, B>, callee: ExprId, args: &SmallVec<[ExprId; 4]>) -> Option<GenValue<B>> {
  let callee_node = cg.unit.expr(callee);
  let (fn_value, ret_ty, c_abi) = match &callee_node.kind {
    ExprKind::Var(name) => match cg.resolve_var(*name)? {
      Resolved::Fn(f) => {
        let (ret, c_abi) = match &f.ty.kind { TyKind::Fn { ret, c_abi, .. } => (ret.clone(), *c_abi), _ => return None };
        (cg.backend.function_value(f.handle), ret, c_abi)
      }
      _ => return None,
    },
    _ => {
      let v = gen_value(cg, callee, None)?;
      let (ret, c_abi) = match &v.ty.kind { TyKind::Fn { ret, c_abi, .. } => (ret.clone(), *c_abi), _ => return None };
      (v.handle, ret, c_abi)
    }
  };
  let mut raw_args = Vec::with_capacity(args.len());
  for &a in args {
    let arg_node = cg.unit.expr(a);
    if let ExprKind::Explode(inner) = &arg_node.kind {
      let tuple = gen_value(cg, *inner, None)?;
      let field_count = tuple.ty.tuple_fields.len();
      for i in 0..field_count {
        if matches!(tuple.ty.tuple_fields[i].ty.kind, TyKind::Padding(_)) { continue }
        raw_args.push(cg.backend.build_extract_value(tuple.handle, u32::try_from(i).ok()?));
      }
    } else {
      let v = gen_value(cg, a, None)?;
      // §4.5.1 Call: a C-ABI callee takes a bare pointer for a `string`
      // argument, not the `{ptr, len}` aggregate.
      if c_abi && matches!(v.ty.kind, TyKind::String) {
        raw_args.push(cg.backend.build_extract_value(v.handle, 0));
      } else {
        raw_args.push(v.handle);
      }
    }
  }
  let handle = cg.backend.build_call(fn_value, &raw_args);
  Some(GenValue { ty: ret_ty, handle })
}
