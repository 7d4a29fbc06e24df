//! Item/statement attributes (§3.2), reproduced from the closed set in
//! `ast_attr.h`: `section`, `align`, `used`, `export`.

use crate::symbol::Symbol;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AttrKind {
  Section(Symbol),
  Align(u64),
  Used,
  Export,
}

bitflags::bitflags! {
  /// The two no-payload attributes, packed as independent bits (§3.2).
  #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
  pub struct AttrFlags: u8 {
    const USED = 1 << 0;
    const EXPORT = 1 << 1;
  }
}

/// Fold a sequence of parsed attributes into their final values,
/// last-write-wins on duplicates (settled by the original parser, not an
/// open question — see `DESIGN.md`).
#[derive(Copy, Clone, Debug, Default)]
pub struct Attrs {
  pub section: Option<Symbol>,
  pub align: Option<u64>,
  pub flags: AttrFlags,
}

impl Attrs {
  #[must_use] pub fn from_kinds(kinds: &[AttrKind]) -> Self {
    let mut attrs = Self::default();
    for &k in kinds {
      match k {
        AttrKind::Section(s) => attrs.section = Some(s),
        AttrKind::Align(n) => attrs.align = Some(n),
        AttrKind::Used => attrs.flags |= AttrFlags::USED,
        AttrKind::Export => attrs.flags |= AttrFlags::EXPORT,
      }
    }
    attrs
  }

  #[must_use] pub fn used(&self) -> bool { self.flags.contains(AttrFlags::USED) }
  #[must_use] pub fn export(&self) -> bool { self.flags.contains(AttrFlags::EXPORT) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn last_write_wins_on_duplicate_align() {
    let attrs = Attrs::from_kinds(&[AttrKind::Align(4), AttrKind::Align(16)]);
    assert_eq!(attrs.align, Some(16));
  }

  #[test]
  fn flags_accumulate_independently() {
    let attrs = Attrs::from_kinds(&[AttrKind::Used, AttrKind::Export]);
    assert!(attrs.used());
    assert!(attrs.export());
  }
}
