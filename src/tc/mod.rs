//! Canonical types (§3.4, §4.4).

pub mod layout;

use std::cell::RefCell;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use hashbrown::HashMap;
use im::Vector;
use smallvec::SmallVec;
use crate::cv::{BoolKind, FloatKind, IntKind};
use crate::symbol::Symbol;
pub use layout::LaidOutField;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct Layout { pub size: u64, pub align: u64 }

/// The structural payload of a canonical type. Name is deliberately *not*
/// part of this enum: per §4.4, two CTs with identical `(kind, layout,
/// extent, children)` compare equal regardless of name.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TyKind {
  Int(IntKind),
  Bool(BoolKind),
  Float(FloatKind),
  Ptr(Ty),
  /// `{ptr, u64}` — a fat pointer to UTF-8 bytes with an explicit length.
  String,
  /// `{ptr, u64}` — a fat pointer to a homogeneous run with an explicit length.
  Slice(Ty),
  Array(Ty, u64),
  /// A synthetic `[N]u8` padding field.
  Padding(u32),
  Tuple { elems: SmallVec<[Ty; 6]>, field_names: Option<SmallVec<[Option<Symbol>; 6]>> },
  Union { variants: SmallVec<[Ty; 4]> },
  /// `c_abi` marks a callee that expects the platform C calling convention
  /// (§4.5.1 Call): a `string` argument passed to one is destructured to its
  /// raw pointer field rather than passed as the `{ptr, len}` aggregate.
  Fn { objs: SmallVec<[Ty; 1]>, args: SmallVec<[Ty; 4]>, effects: SmallVec<[Ty; 2]>, ret: Ty, c_abi: bool },
  /// The `...` varargs marker type.
  Va,
  Atomic(Ty),
  Enum { base: IntKind, enumerators: Vector<(Symbol, i128)> },
}

pub struct TyNode {
  pub kind: TyKind,
  pub layout: Layout,
  /// The full laid-out field list (elements *and* synthetic padding, in
  /// declaration order) for `Tuple` kinds — distinct from `TyKind::Tuple`'s
  /// `elems`, which holds only the user-visible elements so that
  /// `Cv`'s "tuple value count equals type arity" invariant (§3.3) has a
  /// plain count to check against.
  pub tuple_fields: Vec<LaidOutField>,
  pub name: RefCell<Option<Symbol>>,
}

/// A canonical type: an `Rc`-shared, interned, immutable node. Equality and
/// hashing are by pointer identity — safe because canonicalization (below)
/// guarantees structurally-equal types share one node (§4.4 invariant 1,
/// §8.1.1).
#[derive(Clone)]
pub struct Ty(Rc<TyNode>);

impl PartialEq for Ty { fn eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) } }
impl Eq for Ty {}
impl Hash for Ty {
  fn hash<H: Hasher>(&self, state: &mut H) { (Rc::as_ptr(&self.0) as usize).hash(state) }
}
impl std::fmt::Debug for Ty {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.to_display_string()) }
}

impl std::ops::Deref for Ty {
  type Target = TyNode;
  fn deref(&self) -> &TyNode { &self.0 }
}

impl Ty {
  #[must_use] pub fn name(&self) -> Option<Symbol> { *self.name.borrow() }

  #[must_use] pub fn tuple_arity(&self) -> Option<usize> {
    match &self.kind { TyKind::Tuple { elems, .. } => Some(elems.len()), _ => None }
  }

  #[must_use] pub fn is_union(&self) -> bool { matches!(self.kind, TyKind::Union { .. }) }
  #[must_use] pub fn is_int(&self) -> bool { matches!(self.kind, TyKind::Int(_)) }
  #[must_use] pub fn is_pointer(&self) -> bool { matches!(self.kind, TyKind::Ptr(_)) }
  #[must_use] pub fn is_array(&self) -> bool { matches!(self.kind, TyKind::Array(..)) }

  #[must_use] pub fn int_kind(&self) -> Option<IntKind> {
    match self.kind { TyKind::Int(k) => Some(k), _ => None }
  }

  /// Structural equality, ignoring name — `==` on `Ty` already does this
  /// via pointer identity since canonicalization guarantees one node per
  /// shape, but this is provided for clarity at call sites that want to be
  /// explicit about intent (e.g. union-variant selection, §4.5.2 Assign).
  #[must_use] pub fn structurally_eq(&self, other: &Ty) -> bool { self == other }

  /// User-facing printer (§4.4): named types print as their name; unnamed
  /// aggregates print their structure.
  #[must_use] pub fn to_display_string(&self) -> String {
    if let Some(n) = self.name() { return n.to_string() }
    match &self.kind {
      TyKind::Int(k) => format!("{}{}", if k.signed() { "s" } else { "u" }, k.bits()),
      TyKind::Bool(BoolKind::B8) => "b8".into(),
      TyKind::Bool(BoolKind::B16) => "b16".into(),
      TyKind::Bool(BoolKind::B32) => "b32".into(),
      TyKind::Bool(BoolKind::B64) => "b64".into(),
      TyKind::Float(FloatKind::F32) => "f32".into(),
      TyKind::Float(FloatKind::F64) => "f64".into(),
      TyKind::Ptr(t) => format!("*{}", t.to_display_string()),
      TyKind::String => "string".into(),
      TyKind::Slice(t) => format!("[]{}", t.to_display_string()),
      TyKind::Array(t, n) => format!("[{n}]{}", t.to_display_string()),
      TyKind::Padding(n) => format!("[{n}]u8"),
      TyKind::Tuple { elems, .. } => {
        let parts: Vec<_> = elems.iter().map(Ty::to_display_string).collect();
        format!("({})", parts.join(", "))
      }
      TyKind::Union { variants } => {
        let parts: Vec<_> = variants.iter().map(Ty::to_display_string).collect();
        parts.join(" | ")
      }
      TyKind::Fn { args, ret, .. } => {
        let parts: Vec<_> = args.iter().map(Ty::to_display_string).collect();
        format!("fn({}) -> {}", parts.join(", "), ret.to_display_string())
      }
      TyKind::Va => "...".into(),
      TyKind::Atomic(t) => format!("atomic<{}>", t.to_display_string()),
      TyKind::Enum { base, .. } => format!("enum({})", base.bits()),
    }
  }
}

pub struct Builtins {
  pub s8: Ty, pub s16: Ty, pub s32: Ty, pub s64: Ty,
  pub u8: Ty, pub u16: Ty, pub u32: Ty, pub u64: Ty,
  pub b8: Ty, pub b16: Ty, pub b32: Ty, pub b64: Ty,
  pub f32: Ty, pub f64: Ty,
  pub ptr_void: Ty,
  pub string: Ty,
  pub unit: Ty,
  pub va: Ty,
}

/// The type cache (§4.4): canonicalizes and interns every `TyKind` produced
/// by a translation unit, and tracks name-to-node assignment for the
/// pointer-identity guarantee (§8.1.1).
pub struct TyCache {
  interner: RefCell<HashMap<TyKind, Ty>>,
  pub builtins: Builtins,
}

fn int_layout(k: IntKind) -> Layout { Layout { size: u64::from(k.bits() / 8), align: u64::from(k.bits() / 8) } }
fn bool_layout(k: BoolKind) -> Layout {
  let bits = match k { BoolKind::B8 => 8, BoolKind::B16 => 16, BoolKind::B32 => 32, BoolKind::B64 => 64 };
  Layout { size: u64::from(bits / 8), align: u64::from(bits / 8) }
}
fn float_layout(k: FloatKind) -> Layout {
  match k { FloatKind::F32 => Layout { size: 4, align: 4 }, FloatKind::F64 => Layout { size: 8, align: 8 } }
}
const PTR_LAYOUT: Layout = Layout { size: 8, align: 8 };
const FAT_PTR_LAYOUT: Layout = Layout { size: 16, align: 8 }; // {ptr, u64}

impl Default for TyCache { fn default() -> Self { Self::new() } }

impl TyCache {
  #[must_use] pub fn new() -> Self {
    let interner = RefCell::new(HashMap::new());
    let mut this = Self {
      interner,
      builtins: Builtins {
        s8: dummy(), s16: dummy(), s32: dummy(), s64: dummy(),
        u8: dummy(), u16: dummy(), u32: dummy(), u64: dummy(),
        b8: dummy(), b16: dummy(), b32: dummy(), b64: dummy(),
        f32: dummy(), f64: dummy(),
        ptr_void: dummy(), string: dummy(), unit: dummy(), va: dummy(),
      },
    };
    this.builtins = Builtins {
      s8: this.int(IntKind::S8), s16: this.int(IntKind::S16), s32: this.int(IntKind::S32), s64: this.int(IntKind::S64),
      u8: this.int(IntKind::U8), u16: this.int(IntKind::U16), u32: this.int(IntKind::U32), u64: this.int(IntKind::U64),
      b8: this.bool_(BoolKind::B8), b16: this.bool_(BoolKind::B16), b32: this.bool_(BoolKind::B32), b64: this.bool_(BoolKind::B64),
      f32: this.float(FloatKind::F32), f64: this.float(FloatKind::F64),
      ptr_void: this.intern(TyKind::Ptr(this.int(IntKind::U8)), PTR_LAYOUT),
      string: this.intern(TyKind::String, FAT_PTR_LAYOUT),
      unit: this.tuple(vec![], None, None),
      va: this.intern(TyKind::Va, Layout { size: 0, align: 1 }),
    };
    this
  }

  /// Canonicalize-or-reuse: the one true entry point every `make_*`
  /// constructor below funnels through (§4.4 invariant 1).
  fn intern(&self, kind: TyKind, layout: Layout) -> Ty {
    let mut map = self.interner.borrow_mut();
    if let Some(existing) = map.get(&kind) { return existing.clone() }
    let node = Ty(Rc::new(TyNode { kind: kind.clone(), layout, tuple_fields: Vec::new(), name: RefCell::new(None) }));
    map.insert(kind, node.clone());
    node
  }

  fn intern_tuple(&self, kind: TyKind, layout: Layout, fields: Vec<LaidOutField>) -> Ty {
    let mut map = self.interner.borrow_mut();
    if let Some(existing) = map.get(&kind) { return existing.clone() }
    let node = Ty(Rc::new(TyNode { kind: kind.clone(), layout, tuple_fields: fields, name: RefCell::new(None) }));
    map.insert(kind, node.clone());
    node
  }

  /// Attach a name to `ty`, unless the canonical node already carries one
  /// (structural identity is first-name-wins: the same shape can be named
  /// by two different `typedef`s, and the first to be interned keeps the
  /// backend-visible name — see `DESIGN.md`).
  pub fn set_name(&self, ty: &Ty, name: Symbol) {
    let mut slot = ty.name.borrow_mut();
    if slot.is_none() { *slot = Some(name) }
  }

  #[must_use] pub fn int(&self, k: IntKind) -> Ty { self.intern(TyKind::Int(k), int_layout(k)) }
  #[must_use] pub fn bool_(&self, k: BoolKind) -> Ty { self.intern(TyKind::Bool(k), bool_layout(k)) }
  #[must_use] pub fn float(&self, k: FloatKind) -> Ty { self.intern(TyKind::Float(k), float_layout(k)) }
  #[must_use] pub fn ptr(&self, pointee: Ty) -> Ty { self.intern(TyKind::Ptr(pointee), PTR_LAYOUT) }
  #[must_use] pub fn slice(&self, elem: Ty) -> Ty { self.intern(TyKind::Slice(elem), FAT_PTR_LAYOUT) }
  #[must_use] pub fn array(&self, elem: Ty, extent: u64) -> Ty {
    let layout = layout::layout_array(&elem, extent);
    self.intern(TyKind::Array(elem, extent), layout)
  }
  #[must_use] pub fn padding(&self, n: u32) -> Ty { self.intern(TyKind::Padding(n), Layout { size: u64::from(n), align: 1 }) }

  #[must_use] pub fn u8(&self) -> Ty { self.builtins.u8.clone() }
  #[must_use] pub fn u32(&self) -> Ty { self.builtins.u32.clone() }
  #[must_use] pub fn u64(&self) -> Ty { self.builtins.u64.clone() }
  #[must_use] pub fn unit(&self) -> Ty { self.builtins.unit.clone() }

  /// Build (or reuse) a tuple CT, inserting padding per §4.4, then
  /// optionally attaching `name`.
  pub fn tuple(&self, elems: Vec<Ty>, field_names: Option<Vec<Option<Symbol>>>, name: Option<Symbol>) -> Ty {
    let pad_ty = |n: u64| self.padding(u32::try_from(n).expect("padding too large"));
    let laid_out = layout::layout_tuple(pad_ty, &elems, field_names.as_deref());
    let elems_sv: SmallVec<[Ty; 6]> = elems.into();
    let names_sv = field_names.map(SmallVec::<[Option<Symbol>; 6]>::from_vec);
    let kind = TyKind::Tuple { elems: elems_sv, field_names: names_sv };
    let ty = self.intern_tuple(kind, laid_out.layout, laid_out.fields.into_vec());
    if let Some(n) = name { self.set_name(&ty, n) }
    ty
  }

  pub fn union(&self, variants: Vec<Ty>, name: Option<Symbol>) -> Ty {
    let layout = layout::layout_union(&variants);
    let ty = self.intern(TyKind::Union { variants: variants.into() }, layout);
    if let Some(n) = name { self.set_name(&ty, n) }
    ty
  }

  pub fn func(&self, objs: Vec<Ty>, args: Vec<Ty>, effects: Vec<Ty>, ret: Ty, c_abi: bool) -> Ty {
    self.intern(TyKind::Fn { objs: objs.into(), args: args.into(), effects: effects.into(), ret, c_abi }, PTR_LAYOUT)
  }

  #[must_use] pub fn va(&self) -> Ty { self.builtins.va.clone() }

  /// Atomics are only valid over integer or pointer bases (§4.4).
  pub fn atomic(&self, base: Ty) -> Option<Ty> {
    if !(base.is_int() || base.is_pointer()) { return None }
    let layout = base.layout;
    Some(self.intern(TyKind::Atomic(base), layout))
  }

  pub fn enum_(&self, base: IntKind, enumerators: Vec<(Symbol, i128)>, name: Option<Symbol>) -> Ty {
    let layout = int_layout(base);
    let ty = self.intern(TyKind::Enum { base, enumerators: enumerators.into() }, layout);
    if let Some(n) = name { self.set_name(&ty, n) }
    ty
  }
}

fn dummy() -> Ty {
  Ty(Rc::new(TyNode { kind: TyKind::Va, layout: Layout { size: 0, align: 1 }, tuple_fields: Vec::new(), name: RefCell::new(None) }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn canonicalization_returns_same_pointer() {
    let tc = TyCache::new();
    let a = tc.int(IntKind::U32);
    let b = tc.int(IntKind::U32);
    assert_eq!(a, b);
    assert!(Rc::ptr_eq(&a.0, &b.0));
  }

  #[test]
  fn name_does_not_affect_identity() {
    let tc = TyCache::new();
    let a = tc.tuple(vec![tc.u32()], None, Some(crate::symbol::intern("Foo")));
    let b = tc.tuple(vec![tc.u32()], None, Some(crate::symbol::intern("Bar")));
    assert_eq!(a, b);
    // first name wins
    assert_eq!(a.name(), Some(crate::symbol::intern("Foo")));
  }

  #[test]
  fn distinct_structure_is_distinct() {
    let tc = TyCache::new();
    let a = tc.int(IntKind::U32);
    let b = tc.int(IntKind::S32);
    assert_ne!(a, b);
  }

  #[test]
  fn to_string_unnamed_vs_named() {
    let tc = TyCache::new();
    let t = tc.tuple(vec![tc.u8(), tc.u32()], None, None);
    assert_eq!(t.to_display_string(), "(u8, u32)");
    let named = tc.tuple(vec![tc.u64()], None, Some(crate::symbol::intern("Wrapper")));
    assert_eq!(named.to_display_string(), "Wrapper");
  }

  #[test]
  fn atomic_rejects_non_scalar_base() {
    let tc = TyCache::new();
    let t = tc.tuple(vec![tc.u8(), tc.u32()], None, None);
    assert!(tc.atomic(t).is_none());
    assert!(tc.atomic(tc.u32()).is_some());
  }
}
