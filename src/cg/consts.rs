//! §4.6: lowering a `cv::Cv` and its `tc::Ty` to the backend's own constant
//! and type representations. Shared by global initializers, literal
//! expressions, and enum/array extent folding.

use crate::backend::Backend;
use crate::cg::Cg;
use crate::cv::{BoolKind, Cv};
use crate::tc::{Layout, Ty, TyKind};

fn bool_bits(k: BoolKind) -> u32 {
  match k { BoolKind::B8 => 8, BoolKind::B16 => 16, BoolKind::B32 => 32, BoolKind::B64 => 64 }
}

/// Map a canonical `Ty` to the backend's own type representation (§4.6).
/// Tuples lower field-for-field (including synthetic padding, already laid
/// out by `tc::layout`); unions lower to a flat `[size]u8` blob since the
/// opaque backend has no notion of a tagged union (§3.4's byte-blob-plus-tag
/// representation is realized entirely at this boundary).
pub fn backend_ty<B: Backend>(cg: &mut Cg<'_, B>, ty: &Ty) -> B::Ty {
  match &ty.kind {
    TyKind::Int(k) => cg.backend.ty_int(k.bits()),
    TyKind::Bool(k) => cg.backend.ty_int(bool_bits(*k)),
    TyKind::Float(k) => cg.backend.ty_float(*k),
    TyKind::Ptr(_) => cg.backend.ty_ptr(),
    TyKind::String | TyKind::Slice(_) => {
      let ptr = cg.backend.ty_ptr();
      let len = cg.backend.ty_int(64);
      cg.backend.ty_struct(&[ptr, len])
    }
    TyKind::Array(elem, n) => { let et = backend_ty(cg, elem); cg.backend.ty_array(et, *n) }
    TyKind::Padding(n) => { let u8t = cg.backend.ty_int(8); cg.backend.ty_array(u8t, u64::from(*n)) }
    TyKind::Tuple { .. } => {
      let field_tys: Vec<B::Ty> = ty.tuple_fields.iter().map(|f| backend_ty(cg, &f.ty)).collect();
      cg.backend.ty_struct(&field_tys)
    }
    TyKind::Union { .. } => {
      let u8t = cg.backend.ty_int(8);
      cg.backend.ty_array(u8t, ty.layout.size)
    }
    TyKind::Fn { .. } => cg.backend.ty_ptr(),
    TyKind::Va => cg.backend.ty_void(),
    TyKind::Atomic(base) => backend_ty(cg, base),
    TyKind::Enum { base, .. } => cg.backend.ty_int(base.bits()),
  }
}

fn zero_padding<B: Backend>(cg: &mut Cg<'_, B>, layout: Layout) -> B::Value {
  let u8t = cg.backend.ty_int(8);
  let arr_ty = cg.backend.ty_array(u8t, layout.size);
  cg.backend.const_zero(arr_ty)
}

/// Lower `cv` (already known to have canonical type `ty`) to a backend
/// constant value (§4.6).
pub fn gen_const<B: Backend>(cg: &mut Cg<'_, B>, cv: &Cv, ty: &Ty) -> B::Value {
  match cv {
    Cv::Int { value, .. } | Cv::UntypedInt(value) => {
      let t = backend_ty(cg, ty);
      cg.backend.const_int(t, *value)
    }
    Cv::Bool { value, .. } => {
      let t = backend_ty(cg, ty);
      cg.backend.const_int(t, i128::from(*value))
    }
    Cv::Float { value, .. } | Cv::UntypedReal(value) => {
      let t = backend_ty(cg, ty);
      cg.backend.const_float(t, *value)
    }
    Cv::Str(s) => {
      let text = s.to_string();
      let data = cg.backend.build_global_string(&text);
      let len = cg.backend.const_int(cg.backend.ty_int(64), i128::try_from(text.len()).expect("string literal too large"));
      let struct_ty = backend_ty(cg, ty);
      cg.backend.const_struct(struct_ty, &[data, len])
    }
    Cv::Tuple { values, ty: tuple_ty, .. } => {
      let mut field_values = Vec::with_capacity(tuple_ty.tuple_fields.len());
      let mut vi = 0;
      for field in &tuple_ty.tuple_fields {
        if matches!(field.ty.kind, TyKind::Padding(_)) {
          field_values.push(zero_padding(cg, field.ty.layout));
        } else {
          let v = gen_const(cg, &values[vi], &field.ty);
          field_values.push(v);
          vi += 1;
        }
      }
      let struct_ty = backend_ty(cg, tuple_ty);
      cg.backend.const_struct(struct_ty, &field_values)
    }
    Cv::Array { elem_ty, values } => {
      let elem_backend_ty = backend_ty(cg, elem_ty);
      let elems: Vec<B::Value> = values.iter().map(|v| gen_const(cg, v, elem_ty)).collect();
      let arr_ty = cg.backend.ty_array(elem_backend_ty, elems.len() as u64);
      cg.backend.const_array(arr_ty, &elems)
    }
    Cv::None => { let t = backend_ty(cg, ty); cg.backend.const_zero(t) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::RecordingBackend;
  use crate::ast::item::Unit;
  use crate::tc::TyCache;

  #[test]
  fn lowers_int_constant() {
    let unit = Unit::new("t".into(), String::new());
    let mut cg = Cg::new(&unit, RecordingBackend::new());
    let ty = cg.tc.u32();
    let v = gen_const(&mut cg, &Cv::Int { kind: crate::cv::IntKind::U32, value: 7 }, &ty);
    assert_eq!(cg.backend.read_const_int(v), Some(7));
  }

  #[test]
  fn lowers_tuple_with_padding() {
    let unit = Unit::new("t".into(), String::new());
    let mut cg = Cg::new(&unit, RecordingBackend::new());
    let tc: &TyCache = &cg.tc;
    let u8 = tc.u8();
    let u32 = tc.u32();
    let tuple_ty = cg.tc.tuple(vec![u8, u32], None, None);
    let cv = Cv::Tuple {
      values: [Cv::Int { kind: crate::cv::IntKind::U8, value: 1 }, Cv::Int { kind: crate::cv::IntKind::U32, value: 2 }].into(),
      field_names: None,
      ty: tuple_ty.clone(),
    };
    let _v = gen_const(&mut cg, &cv, &tuple_ty);
  }
}
