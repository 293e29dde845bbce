//! Bubble Transmitter Protocol
//!
//! Response tags, wire constants and outbound commands for the Bubble
//! transmitter's notify/write characteristic pair.

use crate::domain::sensor::SensorKind;
use crate::domain::version::Version;
use crate::error::CommandError;
use std::fmt;

/// Nordic UART style data service
pub const SERVICE_UUID: &str = "6E400001-B5A3-F393-E0A9-E50E24DCCA9E";

/// Write characteristic - where commands are sent
pub const WRITE_CHAR_UUID: &str = "6E400002-B5A3-F393-E0A9-E50E24DCCA9E";

/// Notify characteristic - where responses are received
pub const READ_CHAR_UUID: &str = "6E400003-B5A3-F393-E0A9-E50E24DCCA9E";

pub const DEFAULT_READ_INTERVAL_MINUTES: u8 = 5;

/// Reassembly thresholds fixed by the transmitter's fragmentation scheme.
pub mod thresholds {
    /// Payload offset of the first security-challenge fragment
    pub const CHALLENGE_FIRST_OFFSET: usize = 5;
    /// Payload offset of the second security-challenge fragment
    pub const CHALLENGE_SECOND_OFFSET: usize = 4;
    /// Buffer length after the first challenge fragment
    pub const CHALLENGE_FIRST_LEN: usize = 15;
    /// Buffer length of a complete challenge
    pub const CHALLENGE_LEN: usize = 28;
    /// Significant challenge bytes handed on
    pub const CHALLENGE_PREFIX: usize = 25;
    /// Payload offset of every data packet
    pub const DATA_PACKET_OFFSET: usize = 4;
    /// FRAM image size
    pub const FRAM_LEN: usize = crate::domain::sensor::FRAM_SIZE;
}

/// Firmware gates
pub mod gates {
    use crate::domain::version::Version;

    /// Minimum firmware for the Libre 2 unlock command
    pub const LIBRE2_UNLOCK: Version = Version::new(2, 6);
    /// First firmware with the shifted patch-info layout
    pub const PATCH_INFO_SHIFT: Version = Version::new(1, 35);
}

/// Semantic type of an inbound notification, keyed by its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    DataInfo,
    DataPacket,
    DecryptedDataPacket,
    SecurityChallenge,
    NoSensor,
    SerialNumber,
    PatchInfo,
    Unrecognized(u8),
}

impl ResponseKind {
    /// Classify a notification by its leading byte. Total over all byte values.
    pub fn classify(tag: u8) -> Self {
        match tag {
            0x80 => Self::DataInfo,
            0x82 => Self::DataPacket,
            0x88 => Self::DecryptedDataPacket,
            0x8A => Self::SecurityChallenge,
            0xBF => Self::NoSensor,
            0xC0 => Self::SerialNumber,
            0xC1 => Self::PatchInfo,
            other => Self::Unrecognized(other),
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Self::DataInfo => 0x80,
            Self::DataPacket => 0x82,
            Self::DecryptedDataPacket => 0x88,
            Self::SecurityChallenge => 0x8A,
            Self::NoSensor => 0xBF,
            Self::SerialNumber => 0xC0,
            Self::PatchInfo => 0xC1,
            Self::Unrecognized(tag) => *tag,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DataInfo => "data info",
            Self::DataPacket => "data packet",
            Self::DecryptedDataPacket => "decrypted data packet",
            Self::SecurityChallenge => "security challenge",
            Self::NoSensor => "no sensor",
            Self::SerialNumber => "serial number",
            Self::PatchInfo => "patch info",
            Self::Unrecognized(_) => "unknown",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.tag())
    }
}

/// Outbound commands written to the write characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleCommand {
    /// Request a report every `n` minutes
    Read { interval_minutes: u8 },
    /// Start a sensor read, unlocking Libre 2 data
    UnlockLibre2,
    /// Start a plain sensor read
    Unlock,
}

impl BubbleCommand {
    pub fn read(interval_minutes: u8) -> Result<Self, CommandError> {
        if interval_minutes == 0 {
            return Err(CommandError::InvalidInterval(interval_minutes));
        }
        Ok(Self::Read { interval_minutes })
    }

    /// Pick the unlock variant for the given firmware and sensor kind.
    ///
    /// Only firmware >= 2.6 talking to a Libre 2 or US 14-day sensor gets the
    /// Libre 2 unlock; an unknown firmware always gets the plain one.
    pub fn unlock(firmware: Option<Version>, kind: SensorKind) -> Self {
        let gated = firmware.is_some_and(|fw| fw >= gates::LIBRE2_UNLOCK);
        if gated && matches!(kind, SensorKind::Libre2 | SensorKind::LibreUS14day) {
            Self::UnlockLibre2
        } else {
            Self::Unlock
        }
    }

    /// Get the raw bytes for this command
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Read { interval_minutes } => vec![0x00, 0x00, *interval_minutes],
            Self::UnlockLibre2 => vec![0x08, 0x01, 0x00, 0x00, 0x00, 0x2B],
            Self::Unlock => vec![0x02, 0x01, 0x00, 0x00, 0x00, 0x2B],
        }
    }
}

/// Lowercase hex dump used in log lines
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
