//! Interned identifiers.
//!
//! Every identifier that appears more than once in a translation unit (local
//! names, field names, type names) is interned once so equality and hashing
//! of `Symbol` are `u32` comparisons rather than string comparisons.

use std::sync::{LazyLock, Mutex};
use hashbrown::HashMap;

/// An interned identifier. Cheap to copy, compare, and hash.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl std::fmt::Debug for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Symbol({:?})", with_interner(|i| i.resolve(*self).to_owned()))
  }
}

impl std::fmt::Display for Symbol {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", with_interner(|i| i.resolve(*self).to_owned()))
  }
}

/// Owns the interned strings. A translation unit keeps one of these, but
/// built-in keywords live in the process-global interner below so that
/// `Symbol`s for keywords are stable across units.
#[derive(Default)]
pub struct Interner {
  strings: Vec<Box<str>>,
  lookup: HashMap<Box<str>, u32>,
}

impl Interner {
  #[must_use] pub fn new() -> Self { Self::default() }

  pub fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&id) = self.lookup.get(s) { return Symbol(id) }
    let id = u32::try_from(self.strings.len()).expect("too many interned symbols");
    let owned: Box<str> = s.into();
    self.strings.push(owned.clone());
    self.lookup.insert(owned, id);
    Symbol(id)
  }

  #[must_use] pub fn resolve(&self, sym: Symbol) -> &str { &self.strings[sym.0 as usize] }
}

static GLOBAL: LazyLock<Mutex<Interner>> = LazyLock::new(|| Mutex::new(Interner::new()));

fn with_interner<R>(f: impl FnOnce(&Interner) -> R) -> R {
  f(&GLOBAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
}

/// Intern a string in the process-global interner. Used for keywords and
/// primitive names that must compare equal across translation units.
pub fn intern(s: &str) -> Symbol {
  GLOBAL.lock().unwrap_or_else(std::sync::PoisonError::into_inner).intern(s)
}

/// Build a dense lookup table `Symbol -> Option<T>` for a small closed set of
/// symbols, for `O(1)` keyword classification. Mirrors the `LazyLock` dense
/// symbol map idiom used for primitive-name lookup.
#[must_use]
pub fn init_dense_symbol_map<T: Copy>(pairs: &[(Symbol, T)]) -> Box<[Option<T>]> {
  let len = pairs.iter().map(|(s, _)| s.0 as usize + 1).max().unwrap_or(0);
  let mut map = vec![None; len].into_boxed_slice();
  for &(s, t) in pairs { map[s.0 as usize] = Some(t) }
  map
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_dedupes() {
    let mut i = Interner::new();
    let a = i.intern("foo");
    let b = i.intern("foo");
    let c = i.intern("bar");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(i.resolve(a), "foo");
  }

  #[test]
  fn global_intern_is_stable() {
    assert_eq!(intern("x"), intern("x"));
  }
}
