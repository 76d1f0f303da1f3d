//! Type-aware merging of document trees.
//!
//! All merges take a *base* and an *overlay* and build a new tree. Which side
//! is which depends on the phase:
//!
//! | Phase | Base | Overlay | Plain strings |
//! |---|---|---|---|
//! | inheritance | parent | child | child wins |
//! | extend | content at the target path | extension | extension wins |
//! | import (`use`) | imported fragment | importing document | **import wins** |
//!
//! Text de-duplication, array unique-concat and nested object deep-merge are
//! the same in every phase.

mod content;
mod extend;
mod import;
mod inherit;

pub use content::{MergePolicy, deep_merge, merge_content, merge_values, text_merge, unique_concat};
pub use extend::{apply_extend, apply_extends};
pub use import::{AliasEntry, AliasTable, merge_import};
pub use inherit::merge_inheritance;
