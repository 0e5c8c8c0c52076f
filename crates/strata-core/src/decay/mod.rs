//! Decay of the Decaying tier.
//!
//! Each pass recomputes an item's retention strength from its age, access
//! history and signals, maps the strength to a compression phase, asks the
//! compressor to shrink the content when the phase advances, and deletes
//! items that reach the forgotten phase. Permanent, Pattern and Archive
//! items are never touched by the strength computation.

mod phase;
mod scheduler;
mod strength;

pub use phase::{DecayPhase, PHASE_FLOORS, PHASE_TOKEN_BUDGETS};
pub use scheduler::{DecayReport, DecayScheduler, ItemOutcome, ResumeToken};
pub use strength::{base_strength, DecayConfig, StrengthBreakdown, StrengthModel};
