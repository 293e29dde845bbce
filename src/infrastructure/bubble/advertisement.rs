//! Advertised manufacturer data
//!
//! ```text
//! [0-1]   : company id
//! [2-7]   : MAC address (reversed)
//! [8-9]   : firmware major, minor
//! [10-11] : hardware major, minor
//! [12]    : battery percent (newer firmware only)
//! ```

use crate::domain::models::{MacAddress, ManufacturerData};
use crate::domain::version::Version;
use crate::error::DecodeError;
use tracing::info;

pub const MIN_MANUFACTURER_DATA_LEN: usize = 12;

pub fn parse_manufacturer_data(data: &[u8]) -> Result<ManufacturerData, DecodeError> {
    if data.len() < MIN_MANUFACTURER_DATA_LEN {
        return Err(DecodeError::AdvertisementTooShort {
            needed: MIN_MANUFACTURER_DATA_LEN,
            actual: data.len(),
        });
    }

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[2..8]);

    let parsed = ManufacturerData {
        firmware: Version::new(data[8], data[9]),
        hardware: Version::new(data[10], data[11]),
        mac_address: MacAddress::from_wire(&mac),
        battery: data.get(12).copied(),
    };

    let mut msg = format!(
        "Bubble: advertised manufacturer data: firmware: {}, hardware: {}, MAC address: {}",
        parsed.firmware, parsed.hardware, parsed.mac_address
    );
    if let Some(battery) = parsed.battery {
        msg.push_str(&format!(", battery: {battery}"));
    }
    info!("{}", msg);

    Ok(parsed)
}
