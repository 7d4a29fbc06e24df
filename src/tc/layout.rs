//! Layout computation: padding insertion for tuples, union sizing (§4.4).

use itertools::Either;
use smallvec::SmallVec;
use crate::symbol::Symbol;
use super::{Layout, Ty};

#[must_use] fn align_up(offset: u64, align: u64) -> u64 {
  if align == 0 { return offset }
  (offset + align - 1) & !(align - 1)
}

/// One field of a laid-out tuple, in final declaration order (including any
/// synthetic padding fields).
#[derive(Clone)]
pub struct LaidOutField {
  pub ty: Ty,
  pub name: Option<Symbol>,
  pub offset: u64,
}

/// Deterministic padding insertion (§4.4): for elements `T_1..T_n` with an
/// optional parallel `field_names`, walk left to right, align up to each
/// element's alignment (inserting a padding field for the gap), place the
/// element, then after the last element align up to the running max
/// alignment and append a final padding field if needed.
pub struct TupleLayout {
  pub fields: SmallVec<[LaidOutField; 6]>,
  pub layout: Layout,
}

pub fn layout_tuple(pad_ty: impl Fn(u64) -> Ty, elems: &[Ty], field_names: Option<&[Option<Symbol>]>) -> TupleLayout {
  let mut fields = SmallVec::new();
  let mut offset: u64 = 0;
  let mut max_align: u64 = 1;
  // Zipped against `elems`, not indexed: a shorter (or absent) name list pads
  // out with `None` via `Either` rather than forcing both arms of the match
  // to the same concrete iterator type.
  let names = match field_names {
    Some(ns) => Either::Left(ns.iter().copied().chain(std::iter::repeat(None))),
    None => Either::Right(std::iter::repeat(None)),
  };
  for (elem, name) in elems.iter().zip(names) {
    let el = elem.layout;
    max_align = max_align.max(el.align.max(1));
    let aligned = align_up(offset, el.align.max(1));
    if aligned > offset {
      fields.push(LaidOutField { ty: pad_ty(aligned - offset), name: None, offset });
    }
    fields.push(LaidOutField { ty: elem.clone(), name, offset: aligned });
    offset = aligned + el.size;
  }
  let total = align_up(offset, max_align);
  if total > offset {
    fields.push(LaidOutField { ty: pad_ty(total - offset), name: None, offset });
  }
  TupleLayout { fields, layout: Layout { size: total, align: max_align } }
}

/// Union layout (§3.4, §4.4): `[size-of-largest-variant]u8` followed by a
/// `u8` tag, followed by trailing padding to the union's own alignment.
#[must_use] pub fn layout_union(variants: &[Ty]) -> Layout {
  let max_size = variants.iter().map(|v| v.layout.size).max().unwrap_or(0);
  let max_align = variants.iter().map(|v| v.layout.align.max(1)).max().unwrap_or(1);
  let align = max_align.max(1 /* the tag byte's own alignment */);
  let raw = max_size + 1;
  Layout { size: align_up(raw, align), align }
}

#[must_use] pub fn layout_array(elem: &Ty, extent: u64) -> Layout {
  let el = elem.layout;
  Layout { size: el.size * extent, align: el.align.max(1) }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tc::TyCache;

  #[test]
  fn tuple_padding_matches_spec_invariant() {
    let tc = TyCache::new();
    let u8 = tc.u8();
    let u32 = tc.u32();
    // (u8, u32): one padding byte inserted before u32, and the whole tuple's
    // size must already be a multiple of its own alignment (4).
    let t = tc.tuple(vec![u8.clone(), u32.clone()], None, None);
    assert_eq!(t.tuple_fields.len(), 3); // u8, padding, u32
    assert_eq!(t.layout.size % t.layout.align, 0);
    for f in &t.tuple_fields {
      assert_eq!(f.offset % f.ty.layout.align.max(1), 0);
    }
  }

  #[test]
  fn union_size_and_align() {
    let tc = TyCache::new();
    let u8 = tc.u8();
    let u64 = tc.u64();
    let u = tc.union(vec![u8, u64.clone()], None);
    assert!(u.layout.size >= u64.layout.size + 1);
    assert_eq!(u.layout.align, u64.layout.align);
  }

  #[test]
  fn array_extent_zero() {
    let tc = TyCache::new();
    let u32 = tc.u32();
    let a = tc.array(u32.clone(), 0);
    assert_eq!(a.layout.size, 0);
    assert_eq!(a.layout.align, u32.layout.align);
  }
}
