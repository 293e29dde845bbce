//! Sensor handoff entity
//!
//! The dispatcher creates a [`Sensor`] lazily and shares it with the
//! sensor-model component. Updates go through the capability traits
//! [`AcceptsPatchInfo`] and [`AcceptsFram`] instead of downcasting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Size of the reassembled FRAM image.
pub const FRAM_SIZE: usize = 344;

/// 8-byte sensor UID as reported by the transmitter.
pub type SensorUid = [u8; 8];

/// 6-byte patch metadata block.
pub type PatchInfo = [u8; 6];

/// A complete FRAM image.
pub type Fram = Box<[u8; FRAM_SIZE]>;

pub type SharedSensor = Arc<Mutex<Sensor>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SensorKind {
    Libre1,
    LibreUS14day,
    LibreProH,
    Libre2,
    Libre2US,
    Libre2CA,
    LibreSense,
    #[default]
    Unknown,
}

impl SensorKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Libre1 => "Libre 1",
            Self::LibreUS14day => "Libre US 14d",
            Self::LibreProH => "Libre Pro/H",
            Self::Libre2 => "Libre 2",
            Self::Libre2US => "Libre 2 US",
            Self::Libre2CA => "Libre 2 CA",
            Self::LibreSense => "Libre Sense",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sensor family, encoded in the high nibble of patch byte 2.
/// Unlisted codes fall back to plain Libre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFamily {
    Libre,
    LibrePro,
    Libre2,
    LibreSense,
}

impl SensorFamily {
    pub fn from_patch_info(patch_info: &PatchInfo) -> Self {
        match patch_info[2] >> 4 {
            1 => Self::LibrePro,
            3 => Self::Libre2,
            7 => Self::LibreSense,
            _ => Self::Libre,
        }
    }

    /// Leading digit of the printed serial number.
    pub fn code(&self) -> u8 {
        match self {
            Self::Libre => 0,
            Self::LibrePro => 1,
            Self::Libre2 => 3,
            Self::LibreSense => 7,
        }
    }
}

/// Derives the sensor kind from patch metadata.
pub trait SensorKindClassifier: Send {
    fn classify(&self, patch_info: &PatchInfo) -> SensorKind;
}

/// Classifier for the Libre 1 / Libre 2 patch layouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchInfoClassifier;

impl SensorKindClassifier for PatchInfoClassifier {
    fn classify(&self, patch_info: &PatchInfo) -> SensorKind {
        match patch_info[0] {
            0xDF | 0xA2 => SensorKind::Libre1,
            0xE5 | 0xE6 => SensorKind::LibreUS14day,
            0x70 => SensorKind::LibreProH,
            0x9D | 0xC5 => SensorKind::Libre2,
            0x76 => match patch_info[3] {
                0x02 => SensorKind::Libre2US,
                0x04 => SensorKind::Libre2CA,
                _ if patch_info[2] >> 4 == 7 => SensorKind::LibreSense,
                _ => SensorKind::Unknown,
            },
            _ => SensorKind::Unknown,
        }
    }
}

const SERIAL_ALPHABET: &[u8; 32] = b"0123456789ACDEFGHJKLMNPQRTUVWXYZ";

/// Printed serial number: family digit followed by ten base-32 characters
/// taken from the six significant UID bytes.
pub fn serial_number(uid: &SensorUid, family: SensorFamily) -> String {
    let b: Vec<u8> = uid[..6].iter().rev().copied().collect();
    let groups = [
        b[0] >> 3,
        (b[0] << 2) | (b[1] >> 6),
        b[1] >> 1,
        (b[1] << 4) | (b[2] >> 4),
        (b[2] << 1) | (b[3] >> 7),
        b[3] >> 2,
        (b[3] << 3) | (b[4] >> 5),
        b[4],
        b[5] >> 3,
        b[5] << 2,
    ];

    let mut serial = family.code().to_string();
    serial.extend(
        groups
            .iter()
            .map(|g| SERIAL_ALPHABET[(g & 0x1F) as usize] as char),
    );
    serial
}

/// Sensor that can take patch metadata.
pub trait AcceptsPatchInfo {
    fn set_patch_info(&mut self, patch_info: PatchInfo, kind: SensorKind);
}

/// Sensor that can take a reassembled FRAM image.
pub trait AcceptsFram {
    fn set_fram(&mut self, fram: Fram);
}

/// Fields every sensor variant carries.
#[derive(Debug, Clone, Default)]
pub struct SensorCore {
    pub uid: Option<SensorUid>,
    pub kind: SensorKind,
    pub serial: String,
    pub last_reading_at: Option<DateTime<Utc>>,
}

/// A Libre-family sensor read through a transmitter.
#[derive(Debug, Clone, Default)]
pub struct LibreSensor {
    pub core: SensorCore,
    pub patch_info: Option<PatchInfo>,
    pub fram: Option<Fram>,
}

impl LibreSensor {
    fn refresh_serial(&mut self) {
        if let (Some(uid), Some(patch_info)) = (self.core.uid, self.patch_info) {
            self.core.serial = serial_number(&uid, SensorFamily::from_patch_info(&patch_info));
        }
    }
}

impl AcceptsPatchInfo for LibreSensor {
    fn set_patch_info(&mut self, patch_info: PatchInfo, kind: SensorKind) {
        self.patch_info = Some(patch_info);
        self.core.kind = kind;
        self.refresh_serial();
    }
}

impl AcceptsFram for LibreSensor {
    fn set_fram(&mut self, fram: Fram) {
        self.fram = Some(fram);
    }
}

#[derive(Debug, Clone)]
pub enum Sensor {
    Libre(LibreSensor),
    /// A sensor the transmitter can identify but not read.
    Generic(SensorCore),
}

impl Sensor {
    pub fn new_libre() -> Self {
        Self::Libre(LibreSensor::default())
    }

    pub fn shared(self) -> SharedSensor {
        Arc::new(Mutex::new(self))
    }

    pub fn core(&self) -> &SensorCore {
        match self {
            Self::Libre(libre) => &libre.core,
            Self::Generic(core) => core,
        }
    }

    pub fn core_mut(&mut self) -> &mut SensorCore {
        match self {
            Self::Libre(libre) => &mut libre.core,
            Self::Generic(core) => core,
        }
    }

    pub fn kind(&self) -> SensorKind {
        self.core().kind
    }

    pub fn serial(&self) -> &str {
        &self.core().serial
    }

    pub fn set_uid(&mut self, uid: SensorUid) {
        self.core_mut().uid = Some(uid);
        if let Self::Libre(libre) = self {
            libre.refresh_serial();
        }
    }

    pub fn as_patch_info_sink(&mut self) -> Option<&mut dyn AcceptsPatchInfo> {
        match self {
            Self::Libre(libre) => Some(libre),
            Self::Generic(_) => None,
        }
    }

    pub fn as_fram_sink(&mut self) -> Option<&mut dyn AcceptsFram> {
        match self {
            Self::Libre(libre) => Some(libre),
            Self::Generic(_) => None,
        }
    }

    pub fn fram(&self) -> Option<&[u8; FRAM_SIZE]> {
        match self {
            Self::Libre(libre) => libre.fram.as_deref(),
            Self::Generic(_) => None,
        }
    }
}
