//! # Event subscribers for the patching runtime.
//!
//! ## Architecture
//! ```text
//! Registry / Tracker / Coordinator ── publish(Event) ──► Bus
//!                                                         │
//!                                              subscriber_listener (coordinator runtime)
//!                                                         │
//!                                                         ▼
//!                                                   SubscriberSet
//!                                              ┌──────────┼──────────┐
//!                                              ▼          ▼          ▼
//!                                          LogWriter   Metrics    Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
