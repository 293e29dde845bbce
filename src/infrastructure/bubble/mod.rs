//! Bubble Module
//!
//! Decodes the Bubble transmitter's notification stream and builds the
//! commands written back to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     BubbleService                        │
//! │     (transport events in, writes and app events out)     │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!                       ▼
//!           ┌────────────────────────┐
//!           │ NotificationDispatcher │
//!           └───┬────────┬────────┬──┘
//!               │        │        │
//!               ▼        ▼        ▼
//! ┌──────────────┐ ┌────────────┐ ┌────────────┐
//! │ Advertisement│ │ Reassembly │ │  Protocol  │
//! │              │ │            │ │            │
//! │ - firmware   │ │ - challenge│ │ - tags     │
//! │ - MAC        │ │ - FRAM     │ │ - commands │
//! └──────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Response kinds, wire constants and commands
//! - [`advertisement`] - Manufacturer data parsing
//! - [`reassembly`] - Multi-frame buffering
//! - [`dispatcher`] - Per-session protocol state machine
//! - [`service`] - Async event loop around the dispatcher

pub mod advertisement;
pub mod dispatcher;
pub mod protocol;
pub mod reassembly;
pub mod service;

// Re-export main service for convenience
pub use dispatcher::{Dispatch, NotificationDispatcher};
pub use service::{BubbleService, ServiceConfig, TransportEvent};
