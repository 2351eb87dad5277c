//! Buffered pub/sub between sectors
//!
//! Events published during step `t` are buffered and become visible to
//! subscribers at step `t+1`, never in the step they were published. Sectors
//! reference each other only through topics, so there are no ownership
//! cycles between them.

pub mod bus;
pub mod types;

pub use bus::EventBus;
pub use types::{Event, EventPayload, Topic};
