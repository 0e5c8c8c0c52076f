//! Working set ("Focus"): the few items most relevant to the ongoing interaction.

mod focus;

pub use focus::{FocusEntry, WorkingSet, WorkingSetConfig, MAX_CAPACITY, MIN_CAPACITY};
