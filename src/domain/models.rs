use crate::domain::sensor::{Fram, PatchInfo, SensorKind, SensorUid, SharedSensor};
use crate::domain::version::Version;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 6-byte MAC address, stored in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Build from the wire representation, which is byte-reversed.
    pub fn from_wire(bytes: &[u8; 6]) -> Self {
        let mut mac = *bytes;
        mac.reverse();
        Self(mac)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Transmitter identity, populated from advertisements and data-info frames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitterInfo {
    pub firmware: Option<Version>,
    pub hardware: Option<Version>,
    pub mac_address: Option<MacAddress>,
    pub battery: Option<u8>,
    pub sensor_uid: Option<SensorUid>,
    pub patch_info: Option<PatchInfo>,
}

/// Fields parsed from the advertised manufacturer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerData {
    pub firmware: Version,
    pub hardware: Version,
    pub mac_address: MacAddress,
    pub battery: Option<u8>,
}

/// What a dispatched notification produced for the sensor-model side.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Transmitter reports no sensor attached.
    NoSensor { status: String },
    /// Battery / firmware / hardware refreshed from a data-info frame.
    TransmitterUpdated(TransmitterInfo),
    /// A new handoff entity was created.
    SensorDetected(SharedSensor),
    SensorUid(SensorUid),
    PatchInfo {
        patch_info: PatchInfo,
        kind: SensorKind,
        serial: String,
    },
    SecurityChallenge(Vec<u8>),
    FramReady {
        kind: SensorKind,
        fram: Fram,
        reading_started_at: Option<DateTime<Utc>>,
    },
    Status(StatusMessage),
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Session(SessionEvent),
    ConnectionStatus(ConnectionStatus),
    Advertised(ManufacturerData),
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: MessageSeverity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
