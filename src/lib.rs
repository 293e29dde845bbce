//! Bubble transmitter driver
//!
//! Decodes the notification stream of a Bubble BLE transmitter, reassembles
//! sensor FRAM images from it and hands them to a sensor-model component.
//! Radio transport, UI and glucose computation live elsewhere.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{AppEvent, SessionEvent, TransmitterInfo};
pub use domain::sensor::{Sensor, SensorKind, SharedSensor};
pub use domain::version::Version;
pub use error::{CommandError, DecodeError, VersionError};
pub use infrastructure::bubble::{
    BubbleService, Dispatch, NotificationDispatcher, ServiceConfig, TransportEvent,
};
