//! Lifecycle events emitted by the engine.
//!
//! Subscribers observe routing, phase advancement, forgetting, archive
//! purges and pattern detection. Emission never blocks the engine.

mod bus;
mod event;

pub use bus::{EventBus, EventSubscriber};
pub use event::{EngineEvent, PatternDetectedEvent, PhaseAdvancedEvent, RoutedEvent};
