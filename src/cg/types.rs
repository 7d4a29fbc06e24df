//! Resolves a surface type expression (`ast::types::TypeKind`) to a
//! canonical `tc::Ty`. Shared by `Expr::gen_type` (§4.5) and by the
//! evaluator's `as`/`is` operand resolution (§4.3).

use crate::ast::{TypeId, TypeKind};
use crate::backend::Backend;
use crate::cg::Cg;
use crate::cv::{BoolKind, IntKind};
use crate::symbol::Symbol;
use crate::tc::Ty;

pub fn resolve<B: Backend>(cg: &Cg<'_, B>, id: TypeId) -> Option<Ty> {
  let node = cg.unit.ty(id);
  match &node.kind {
    TypeKind::Bool => Some(cg.tc.bool_(BoolKind::B8)),
    TypeKind::VarArgs => Some(cg.tc.va()),
    TypeKind::Ptr(inner) => Some(cg.tc.ptr(resolve(cg, *inner)?)),
    TypeKind::Slice(inner) => Some(cg.tc.slice(resolve(cg, *inner)?)),
    TypeKind::Atom(inner) => cg.tc.atomic(resolve(cg, *inner)?),
    TypeKind::Array(inner, extent_expr) => {
      let elem = resolve(cg, *inner)?;
      let extent = crate::eval::eval_value(cg, *extent_expr)?;
      let n = match extent { crate::cv::Cv::UntypedInt(n) | crate::cv::Cv::Int { value: n, .. } => n, _ => return None };
      Some(cg.tc.array(elem, u64::try_from(n).ok()?))
    }
    TypeKind::Tuple(fields) => {
      let mut elems = Vec::with_capacity(fields.len());
      let mut names: Vec<Option<Symbol>> = Vec::with_capacity(fields.len());
      for (name, ty) in fields { elems.push(resolve(cg, *ty)?); names.push(*name) }
      let names = names.iter().any(Option::is_some).then_some(names);
      Some(cg.tc.tuple(elems, names, None))
    }
    TypeKind::Args(fields) => {
      let mut elems = Vec::with_capacity(fields.len());
      for (_, ty) in fields { elems.push(resolve(cg, *ty)?) }
      Some(cg.tc.tuple(elems, None, None))
    }
    TypeKind::Union(variants) => {
      let mut vs = Vec::with_capacity(variants.len());
      for &v in variants { vs.push(resolve(cg, v)?) }
      Some(cg.tc.union(vs, None))
    }
    TypeKind::Fn { args, effects, ret } => {
      let args_ty = resolve(cg, *args)?;
      let mut effs = Vec::with_capacity(effects.len());
      for &e in effects { effs.push(resolve(cg, e)?) }
      let ret_ty = resolve(cg, *ret)?;
      let arg_elems = match &args_ty.kind { crate::tc::TyKind::Tuple { elems, .. } => elems.to_vec(), _ => vec![args_ty] };
      // A `fn(...) -> T` type expression never names an extern declaration
      // directly, so it carries no C-ABI marking of its own.
      Some(cg.tc.func(Vec::new(), arg_elems, effs, ret_ty, false))
    }
    TypeKind::Enum(enumerators) => {
      let mut out = Vec::with_capacity(enumerators.len());
      let mut next = 0i128;
      for (name, init) in enumerators {
        let value = match init {
          Some(e) => match crate::eval::eval_value(cg, *e)? {
            crate::cv::Cv::UntypedInt(n) | crate::cv::Cv::Int { value: n, .. } => n,
            _ => return None,
          },
          None => next,
        };
        next = value + 1;
        out.push((*name, value));
      }
      Some(cg.tc.enum_(IntKind::S32, out, None))
    }
    TypeKind::Ident(name) => cg.lookup_typedef(*name),
  }
}
