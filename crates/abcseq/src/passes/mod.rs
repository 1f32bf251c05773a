//! Tree walks over a parsed [`Music`](crate::ast::Music).
//!
//! All three passes are read-only over the tree and keep their own state:
//! well-formedness checking, tick resolution and linearization to events.

pub mod linearize;
pub mod ticks;
pub mod wellformed;

pub use linearize::{linearize, NoteEvent};
pub use ticks::ticks_per_quarter_note;
pub use wellformed::check;
