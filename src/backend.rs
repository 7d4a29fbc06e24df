//! The backend interface (§6.3): every operation the code generator needs
//! from a concrete SSA IR producer, kept behind one trait so the rest of the
//! crate never names a specific backend. `RecordingBackend` below is an
//! in-memory fake used by the unit and integration tests; a real backend
//! (e.g. one that emits LLVM IR) implements the same trait.

use std::path::Path;
use crate::cv::{BoolKind, FloatKind, IntKind};

/// Integer comparison predicates, split by signedness per §4.5.1 ("signed vs
/// unsigned predicate selection based on LHS type").
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum IntPredicate { Eq, Ne, SLt, SLe, SGt, SGe, ULt, ULe, UGt, UGe }

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FloatPredicate { Eq, Ne, Lt, Le, Gt, Ge }

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Linkage { External, Internal }

/// A cast opcode choice, left to the backend (§6.3 "choose opcode") based on
/// the source/destination widths and numeric family.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CastOp { Trunc, ZExt, SExt, FpToSi, FpToUi, SiToFp, UiToFp, FpTrunc, FpExt, Bitcast, PtrToInt, IntToPtr }

/// Backend integer/float/bool scalar width, independent of the frontend's
/// `tc::Ty` (the backend only needs bit widths, not names or struct shape).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Scalar { Int(IntKind), Bool(BoolKind), Float(FloatKind) }

/// All operations an implementer must supply (§6.3). Opaque handle types are
/// associated types so a real backend can use whatever representation suits
/// it (an index, a raw pointer, a wrapped FFI handle); the middle-end never
/// inspects them.
pub trait Backend {
  type Module;
  type Builder;
  type BasicBlock: Copy + Eq;
  type Ty: Copy + Eq;
  type Value: Copy + Eq;
  type Function: Copy + Eq;
  type Global: Copy + Eq;

  fn create_module(&mut self, name: &str) -> Self::Module;
  fn create_builder(&mut self) -> Self::Builder;

  fn ty_int(&mut self, bits: u32) -> Self::Ty;
  fn ty_float(&mut self, kind: FloatKind) -> Self::Ty;
  fn ty_ptr(&mut self) -> Self::Ty;
  fn ty_array(&mut self, elem: Self::Ty, len: u64) -> Self::Ty;
  fn ty_struct(&mut self, fields: &[Self::Ty]) -> Self::Ty;
  fn ty_named_struct(&mut self, name: &str) -> Self::Ty;
  fn set_struct_body(&mut self, named: Self::Ty, fields: &[Self::Ty]);
  fn ty_void(&mut self) -> Self::Ty;
  fn ty_function(&mut self, params: &[Self::Ty], ret: Self::Ty, var_args: bool) -> Self::Ty;

  fn add_global(&mut self, name: &str, ty: Self::Ty) -> Self::Global;
  fn add_function(&mut self, name: &str, ty: Self::Ty) -> Self::Function;
  fn set_linkage(&mut self, f: Self::Function, linkage: Linkage);
  fn set_global_linkage(&mut self, g: Self::Global, linkage: Linkage);
  fn set_alignment(&mut self, g: Self::Global, align: u64);
  fn set_section(&mut self, g: Self::Global, section: &str);
  fn set_initializer(&mut self, g: Self::Global, value: Self::Value);
  /// §9's `used` open question: appends `g` to the module's `llvm.used`-style
  /// retention list so the linker never strips it even with no references.
  fn append_to_used(&mut self, g: Self::Global);

  fn append_basic_block(&mut self, f: Self::Function, name: &str) -> Self::BasicBlock;
  fn position_at_end(&mut self, bb: Self::BasicBlock);

  fn build_alloca(&mut self, ty: Self::Ty, name: &str) -> Self::Value;
  fn build_load(&mut self, ty: Self::Ty, ptr: Self::Value) -> Self::Value;
  fn build_store(&mut self, value: Self::Value, ptr: Self::Value);
  fn build_gep(&mut self, base_ty: Self::Ty, ptr: Self::Value, indices: &[Self::Value]) -> Self::Value;
  fn build_call(&mut self, f: Self::Value, args: &[Self::Value]) -> Self::Value;
  fn build_ret(&mut self, value: Self::Value);
  fn build_ret_void(&mut self);
  fn build_br(&mut self, target: Self::BasicBlock);
  fn build_cond_br(&mut self, cond: Self::Value, then_bb: Self::BasicBlock, else_bb: Self::BasicBlock);
  fn build_phi(&mut self, ty: Self::Ty, incoming: &[(Self::Value, Self::BasicBlock)]) -> Self::Value;

  fn build_add(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_sub(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_mul(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_sdiv(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_udiv(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_and(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_or(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_xor(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_shl(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_ashr(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_lshr(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_icmp(&mut self, pred: IntPredicate, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_fcmp(&mut self, pred: FloatPredicate, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_fadd(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_fsub(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_fmul(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_fdiv(&mut self, lhs: Self::Value, rhs: Self::Value) -> Self::Value;
  fn build_neg(&mut self, operand: Self::Value) -> Self::Value;
  fn build_fneg(&mut self, operand: Self::Value) -> Self::Value;
  fn build_not(&mut self, operand: Self::Value) -> Self::Value;
  fn build_cast(&mut self, op: CastOp, value: Self::Value, to: Self::Ty) -> Self::Value;
  fn build_global_string(&mut self, text: &str) -> Self::Value;
  fn build_extract_value(&mut self, agg: Self::Value, index: u32) -> Self::Value;
  fn build_insert_value(&mut self, agg: Self::Value, elt: Self::Value, index: u32) -> Self::Value;
  fn build_memcpy(&mut self, dst: Self::Value, src: Self::Value, len: u64, align: u64);

  fn const_int(&mut self, ty: Self::Ty, value: i128) -> Self::Value;
  fn const_float(&mut self, ty: Self::Ty, value: f64) -> Self::Value;
  fn const_struct(&mut self, ty: Self::Ty, fields: &[Self::Value]) -> Self::Value;
  fn const_array(&mut self, ty: Self::Ty, elems: &[Self::Value]) -> Self::Value;
  fn const_zero(&mut self, ty: Self::Ty) -> Self::Value;
  fn function_value(&mut self, f: Self::Function) -> Self::Value;
  fn global_value(&mut self, g: Self::Global) -> Self::Value;
  /// The `index`th incoming parameter of `f` as an SSA value (§4.5.3 function
  /// emission: "store the incoming parameter value" needs a handle to it).
  fn fn_param(&mut self, f: Self::Function, index: u32) -> Self::Value;

  /// Returns `Err` with an owned message on failure (§6.3: "error reporting
  /// is a string that the interface owner must free" — in Rust, an owned
  /// `String` already is that).
  fn verify_module(&mut self) -> Result<(), String>;
  fn run_passes(&mut self, opt_level: u8) -> Result<(), String>;
  fn emit_object(&mut self, path: &Path) -> Result<(), String>;
}

pub mod recording;
pub use recording::RecordingBackend;
