//! Capture file transport
//!
//! Stands in for the BLE transport by replaying a text capture of one or
//! more sessions:
//!
//! ```text
//! # comment
//! adv 00 00 01 02 03 04 05 06 02 08 01 00 64
//! connect
//! rx 80:00:02:08:64:01:00
//! disconnect
//! ```

use crate::infrastructure::bubble::TransportEvent;
use chrono::Utc;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("line {line}: unknown directive {directive:?}")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: invalid hex {token:?}")]
    InvalidHex { line: usize, token: String },

    #[error("line {line}: {directive} needs a payload")]
    MissingPayload { line: usize, directive: &'static str },
}

/// Parse hex with optional space, colon or dash separators.
pub fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | '-' | '\t'))
        .collect();
    if digits.is_empty() || digits.len() % 2 != 0 {
        return None;
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok())
        .collect()
}

pub fn parse_capture(text: &str) -> Result<Vec<TransportEvent>, CaptureError> {
    let mut events = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let content = raw.split('#').next().unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }

        let (directive, rest) = content
            .split_once(char::is_whitespace)
            .map(|(d, r)| (d, r.trim()))
            .unwrap_or((content, ""));

        let payload = |name: &'static str| -> Result<Vec<u8>, CaptureError> {
            if rest.is_empty() {
                return Err(CaptureError::MissingPayload {
                    line,
                    directive: name,
                });
            }
            parse_hex(rest).ok_or_else(|| CaptureError::InvalidHex {
                line,
                token: rest.to_string(),
            })
        };

        let event = match directive.to_ascii_lowercase().as_str() {
            "adv" => TransportEvent::Advertisement(payload("adv")?),
            "rx" => TransportEvent::Notification(payload("rx")?),
            "connect" => TransportEvent::Connected { at: Utc::now() },
            "disconnect" => TransportEvent::Disconnected,
            _ => {
                return Err(CaptureError::UnknownDirective {
                    line,
                    directive: directive.to_string(),
                })
            }
        };
        events.push(event);
    }

    Ok(events)
}

pub fn load_capture(path: &Path) -> anyhow::Result<Vec<TransportEvent>> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_capture(&text)?)
}
