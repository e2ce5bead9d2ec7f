//! Acquisition events module.
//!
//! Provides the event types emitted while an acquisition run progresses and
//! the sink trait callers implement to react to them (for example, refreshing
//! their own state once a resource is acquired).

mod acquisition_event;
mod sink;

pub use acquisition_event::*;
pub use sink::*;
