//! Notification dispatcher
//!
//! Owns one transmitter session: identity fields, the reassembly buffer and
//! a back-reference to the sensor handoff entity. Each call consumes one
//! notification in arrival order and returns at most one command to write
//! plus the events it produced.

use super::advertisement::parse_manufacturer_data;
use super::protocol::{gates, hex, BubbleCommand, ResponseKind};
use super::reassembly::{ChallengeProgress, FramProgress, ReassemblyBuffer, ReassemblyTarget};
use crate::domain::models::{
    ManufacturerData, MessageSeverity, SessionEvent, StatusMessage, TransmitterInfo,
};
use crate::domain::sensor::{
    PatchInfo, PatchInfoClassifier, Sensor, SensorKind, SensorKindClassifier, SensorUid,
    SharedSensor,
};
use crate::domain::version::Version;
use crate::error::DecodeError;
use chrono::{DateTime, Utc};
use std::sync::{MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

const DATA_INFO_MIN_LEN: usize = 6;
const SERIAL_NUMBER_MIN_LEN: usize = 10;
const PATCH_INFO_LEGACY_RANGE: std::ops::Range<usize> = 3..9;
const PATCH_INFO_RANGE: std::ops::Range<usize> = 5..11;

/// Result of dispatching one notification.
#[derive(Debug, Default)]
pub struct Dispatch {
    pub write: Option<BubbleCommand>,
    pub events: Vec<SessionEvent>,
}

impl Dispatch {
    fn event(event: SessionEvent) -> Self {
        Self {
            write: None,
            events: vec![event],
        }
    }
}

pub struct NotificationDispatcher {
    info: TransmitterInfo,
    buffer: ReassemblyBuffer,
    sensor: Option<SharedSensor>,
    classifier: Box<dyn SensorKindClassifier>,
    connected_at: Option<DateTime<Utc>>,
    raw_logging: bool,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::with_classifier(Box::new(PatchInfoClassifier))
    }

    pub fn with_classifier(classifier: Box<dyn SensorKindClassifier>) -> Self {
        Self {
            info: TransmitterInfo::default(),
            buffer: ReassemblyBuffer::new(),
            sensor: None,
            classifier,
            connected_at: None,
            raw_logging: false,
        }
    }

    /// Trace every inbound frame as hex.
    pub fn set_raw_logging(&mut self, enabled: bool) {
        self.raw_logging = enabled;
    }

    pub fn info(&self) -> &TransmitterInfo {
        &self.info
    }

    pub fn sensor(&self) -> Option<&SharedSensor> {
        self.sensor.as_ref()
    }

    /// Replace the handoff entity, e.g. when the sensor model swaps sensors.
    pub fn attach_sensor(&mut self, sensor: SharedSensor) {
        self.sensor = Some(sensor);
    }

    pub fn detach_sensor(&mut self) -> Option<SharedSensor> {
        self.sensor.take()
    }

    pub fn reassembly(&self) -> &ReassemblyBuffer {
        &self.buffer
    }

    /// Apply an advertisement seen before connecting.
    pub fn on_advertisement(&mut self, data: &[u8]) -> Result<ManufacturerData, DecodeError> {
        let parsed = parse_manufacturer_data(data)?;
        self.info.firmware = Some(parsed.firmware);
        self.info.hardware = Some(parsed.hardware);
        self.info.mac_address = Some(parsed.mac_address);
        if parsed.battery.is_some() {
            self.info.battery = parsed.battery;
        }
        Ok(parsed)
    }

    /// Start of a connection: stamps the session and clears reassembly.
    pub fn on_connected(&mut self, at: DateTime<Utc>) {
        self.connected_at = Some(at);
        self.buffer.reset();
    }

    /// End of a connection: in-flight reassembly is dropped, never emitted.
    pub fn on_disconnected(&mut self) {
        if !self.buffer.is_empty() {
            debug!(
                "Discarding {} buffered bytes on disconnect",
                self.buffer.len()
            );
        }
        self.buffer.reset();
        self.connected_at = None;
    }

    /// Kind derived from the cached patch info, `Unknown` until one arrives.
    pub fn cached_sensor_kind(&self) -> SensorKind {
        self.info
            .patch_info
            .map(|patch_info| self.classifier.classify(&patch_info))
            .unwrap_or_default()
    }

    /// Consume one notification.
    pub fn handle_notification(&mut self, data: &[u8]) -> Result<Dispatch, DecodeError> {
        let tag = *data.first().ok_or(DecodeError::Empty)?;
        let kind = ResponseKind::classify(tag);
        debug!("Bubble response: {}", kind);
        if self.raw_logging {
            trace!("Raw notification: {}", hex(data));
        }

        match kind {
            ResponseKind::NoSensor => Ok(Dispatch::event(SessionEvent::NoSensor {
                status: "Bubble: no sensor".to_string(),
            })),
            ResponseKind::DataInfo => self.handle_data_info(data),
            ResponseKind::SerialNumber => self.handle_serial_number(data),
            ResponseKind::PatchInfo => self.handle_patch_info(data),
            ResponseKind::SecurityChallenge => self.handle_security_challenge(data),
            ResponseKind::DataPacket | ResponseKind::DecryptedDataPacket => {
                self.handle_data_packet(kind, data)
            }
            ResponseKind::Unrecognized(tag) => {
                warn!("Ignoring unrecognized Bubble response 0x{:02X}", tag);
                Ok(Dispatch::default())
            }
        }
    }

    fn handle_data_info(&mut self, data: &[u8]) -> Result<Dispatch, DecodeError> {
        require(ResponseKind::DataInfo, data, DATA_INFO_MIN_LEN)?;

        let len = data.len();
        let battery = data[4];
        let firmware = Version::new(data[2], data[3]);
        let hardware = Version::new(data[len - 2], data[len - 1]);
        info!(
            "Bubble: battery: {}, firmware: {}, hardware: {}",
            battery, firmware, hardware
        );
        self.info.battery = Some(battery);
        self.info.firmware = Some(firmware);
        self.info.hardware = Some(hardware);

        let mut events = Vec::new();
        if let Some(status) = self.start_cycle() {
            events.push(SessionEvent::Status(status));
        }
        events.push(SessionEvent::TransmitterUpdated(self.info.clone()));

        let sensor_kind = self.cached_sensor_kind();
        let command = self.unlock_command(sensor_kind);
        debug!("Bubble: sending {:?} for {}", command, sensor_kind);

        Ok(Dispatch {
            write: Some(command),
            events,
        })
    }

    /// A data-info frame opens a new read cycle. Fragments left over from
    /// an interrupted cycle can never complete, so they are dropped here.
    fn start_cycle(&mut self) -> Option<StatusMessage> {
        let target = self.buffer.target()?;
        let dropped = self.buffer.len();
        warn!(
            "New read cycle with {} bytes of {:?} still buffered, dropping",
            dropped, target
        );
        self.buffer.reset();
        Some(StatusMessage::warning(format!(
            "Bubble: reassembly desync, {dropped} bytes dropped"
        )))
    }

    fn unlock_command(&self, kind: SensorKind) -> BubbleCommand {
        if self.info.firmware.is_none() {
            warn!("Bubble firmware unknown, falling back to the plain unlock command");
        }
        BubbleCommand::unlock(self.info.firmware, kind)
    }

    fn handle_serial_number(&mut self, data: &[u8]) -> Result<Dispatch, DecodeError> {
        require(ResponseKind::SerialNumber, data, SERIAL_NUMBER_MIN_LEN)?;

        let mut uid: SensorUid = [0; 8];
        uid.copy_from_slice(&data[2..10]);

        let mut dispatch = Dispatch::default();
        let sensor = self.ensure_sensor(&mut dispatch);
        self.info.sensor_uid = Some(uid);
        lock(&sensor).set_uid(uid);
        info!("Bubble: patch uid: {}", hex(&uid));

        dispatch.events.push(SessionEvent::SensorUid(uid));
        Ok(dispatch)
    }

    fn handle_patch_info(&mut self, data: &[u8]) -> Result<Dispatch, DecodeError> {
        let range = match self.info.firmware {
            Some(fw) if fw < gates::PATCH_INFO_SHIFT => PATCH_INFO_LEGACY_RANGE,
            Some(_) => PATCH_INFO_RANGE,
            None => {
                warn!("Bubble firmware unknown, assuming the current patch info layout");
                PATCH_INFO_RANGE
            }
        };
        require(ResponseKind::PatchInfo, data, range.end)?;

        let mut patch_info: PatchInfo = [0; 6];
        patch_info.copy_from_slice(&data[range]);
        let kind = self.classifier.classify(&patch_info);

        let mut dispatch = Dispatch::default();
        let sensor = self.ensure_sensor(&mut dispatch);
        self.info.patch_info = Some(patch_info);

        let serial = {
            let mut sensor = lock(&sensor);
            match sensor.as_patch_info_sink() {
                Some(sink) => sink.set_patch_info(patch_info, kind),
                None => warn!("Attached sensor does not take patch info"),
            }
            sensor.serial().to_string()
        };
        info!(
            "Bubble: patch info: {}, sensor type: {}, serial number: {}",
            hex(&patch_info),
            kind,
            serial
        );

        dispatch.events.push(SessionEvent::PatchInfo {
            patch_info,
            kind,
            serial,
        });
        Ok(dispatch)
    }

    fn handle_security_challenge(&mut self, data: &[u8]) -> Result<Dispatch, DecodeError> {
        let progress = self.buffer.push_challenge(data)?;
        let mut dispatch = Dispatch::default();
        self.ensure_sensor(&mut dispatch);

        match progress {
            ChallengeProgress::Partial(_) => {}
            ChallengeProgress::Complete(challenge) => {
                info!("Bubble: gen2 security challenge: {}", hex(&challenge));
                dispatch
                    .events
                    .push(SessionEvent::SecurityChallenge(challenge));
            }
            ChallengeProgress::Desync { buffered } => {
                dispatch.events.push(SessionEvent::Status(StatusMessage::warning(
                    format!("Bubble: security challenge out of sync ({buffered} bytes dropped)"),
                )));
            }
        }
        Ok(dispatch)
    }

    fn handle_data_packet(
        &mut self,
        kind: ResponseKind,
        data: &[u8],
    ) -> Result<Dispatch, DecodeError> {
        let starting = !self.buffer.is_collecting(ReassemblyTarget::Fram);
        let progress = self.buffer.push_data_packet(kind, data)?;

        let mut dispatch = Dispatch::default();
        let sensor = self.ensure_sensor(&mut dispatch);
        if starting {
            lock(&sensor).core_mut().last_reading_at = self.connected_at;
        }

        if let FramProgress::Complete { fram, discarded } = progress {
            if discarded > 0 {
                debug!("Dropping {} bytes past the FRAM image", discarded);
            }

            let (sensor_kind, reading_started_at) = {
                let mut sensor = lock(&sensor);
                match sensor.as_fram_sink() {
                    Some(sink) => sink.set_fram(fram.clone()),
                    None => warn!("Attached sensor does not take FRAM"),
                }
                (sensor.kind(), sensor.core().last_reading_at)
            };

            dispatch.events.push(SessionEvent::Status(StatusMessage {
                message: format!("{sensor_kind}  +  Bubble"),
                severity: MessageSeverity::Success,
            }));
            dispatch.events.push(SessionEvent::FramReady {
                kind: sensor_kind,
                fram,
                reading_started_at,
            });
        }
        Ok(dispatch)
    }

    /// Create the handoff entity on first use.
    fn ensure_sensor(&mut self, dispatch: &mut Dispatch) -> SharedSensor {
        if let Some(sensor) = &self.sensor {
            return sensor.clone();
        }
        let sensor = Sensor::new_libre().shared();
        self.sensor = Some(sensor.clone());
        dispatch
            .events
            .push(SessionEvent::SensorDetected(sensor.clone()));
        sensor
    }
}

fn require(kind: ResponseKind, data: &[u8], needed: usize) -> Result<(), DecodeError> {
    if data.len() < needed {
        return Err(DecodeError::TooShort {
            kind,
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

/// The sensor is plain data, so a poisoned lock is still usable.
fn lock(sensor: &SharedSensor) -> MutexGuard<'_, Sensor> {
    sensor.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sensor::SensorCore;

    const LIBRE2_PATCH: PatchInfo = [0x9D, 0x08, 0x30, 0x01, 0x76, 0x25];

    fn data_info(fw: (u8, u8), hw: (u8, u8), battery: u8) -> Vec<u8> {
        vec![0x80, 0x00, fw.0, fw.1, battery, hw.0, hw.1]
    }

    fn patch_frame(offset: usize, patch: &PatchInfo) -> Vec<u8> {
        let mut f = vec![0xC1];
        f.resize(offset, 0);
        f.extend_from_slice(patch);
        f
    }

    fn serial_frame(uid: &SensorUid) -> Vec<u8> {
        let mut f = vec![0xC0, 0x00];
        f.extend_from_slice(uid);
        f
    }

    fn data_packet(payload: &[u8]) -> Vec<u8> {
        let mut f = vec![0x82, 0x00, 0x00, 0x00];
        f.extend_from_slice(payload);
        f
    }

    fn write_bytes(d: &Dispatch) -> Option<Vec<u8>> {
        d.write.map(|c| c.to_bytes())
    }

    #[test]
    fn test_no_sensor_touches_nothing() {
        let mut dispatcher = NotificationDispatcher::new();
        let d = dispatcher.handle_notification(&[0xBF]).unwrap();

        assert!(d.write.is_none());
        assert!(matches!(&d.events[..], [SessionEvent::NoSensor { status }] if status == "Bubble: no sensor"));
        assert!(dispatcher.sensor().is_none());
    }

    #[test]
    fn test_data_info_updates_identity_and_unlocks() {
        let mut dispatcher = NotificationDispatcher::new();
        let d = dispatcher
            .handle_notification(&data_info((2, 6), (1, 1), 87))
            .unwrap();

        let info = dispatcher.info();
        assert_eq!(info.battery, Some(87));
        assert_eq!(info.firmware, Some(Version::new(2, 6)));
        assert_eq!(info.hardware, Some(Version::new(1, 1)));
        // No patch info cached yet, so the kind is unknown.
        assert_eq!(write_bytes(&d), Some(vec![0x02, 0x01, 0x00, 0x00, 0x00, 0x2B]));
        assert!(dispatcher.sensor().is_none());
    }

    #[test]
    fn test_data_info_unlocks_libre2_with_cached_patch_info() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.handle_notification(&data_info((2, 6), (1, 1), 50)).unwrap();
        dispatcher
            .handle_notification(&patch_frame(5, &LIBRE2_PATCH))
            .unwrap();

        let d = dispatcher
            .handle_notification(&data_info((2, 6), (1, 1), 50))
            .unwrap();
        assert_eq!(write_bytes(&d), Some(vec![0x08, 0x01, 0x00, 0x00, 0x00, 0x2B]));

        let d = dispatcher
            .handle_notification(&data_info((2, 5), (1, 1), 50))
            .unwrap();
        assert_eq!(write_bytes(&d), Some(vec![0x02, 0x01, 0x00, 0x00, 0x00, 0x2B]));
    }

    #[test]
    fn test_short_data_info_commits_nothing() {
        let mut dispatcher = NotificationDispatcher::new();
        let err = dispatcher.handle_notification(&[0x80, 0, 2, 6, 90]).unwrap_err();

        assert!(matches!(err, DecodeError::TooShort { needed: 6, actual: 5, .. }));
        assert_eq!(dispatcher.info(), &TransmitterInfo::default());
    }

    #[test]
    fn test_serial_number_creates_sensor_once() {
        let mut dispatcher = NotificationDispatcher::new();
        let uid = [1, 2, 3, 4, 5, 6, 0x07, 0xE0];

        let d = dispatcher.handle_notification(&serial_frame(&uid)).unwrap();
        assert!(matches!(d.events[0], SessionEvent::SensorDetected(_)));
        assert!(matches!(d.events[1], SessionEvent::SensorUid(u) if u == uid));
        assert_eq!(dispatcher.info().sensor_uid, Some(uid));

        let d = dispatcher.handle_notification(&serial_frame(&uid)).unwrap();
        assert_eq!(d.events.len(), 1);

        let sensor = dispatcher.sensor().unwrap().lock().unwrap();
        assert_eq!(sensor.core().uid, Some(uid));
    }

    #[test]
    fn test_patch_info_offset_switches_at_1_35() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.on_advertisement(&[0, 0, 1, 2, 3, 4, 5, 6, 1, 34, 1, 0]).unwrap();

        let mut legacy = patch_frame(3, &LIBRE2_PATCH);
        legacy.resize(11, 0xEE);
        let d = dispatcher.handle_notification(&legacy).unwrap();
        let event = d.events.last().unwrap();
        assert!(matches!(event, SessionEvent::PatchInfo { patch_info, .. } if *patch_info == LIBRE2_PATCH));

        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.on_advertisement(&[0, 0, 1, 2, 3, 4, 5, 6, 1, 35, 1, 0]).unwrap();
        let d = dispatcher
            .handle_notification(&patch_frame(5, &LIBRE2_PATCH))
            .unwrap();
        let event = d.events.last().unwrap();
        assert!(matches!(
            event,
            SessionEvent::PatchInfo { patch_info, kind: SensorKind::Libre2, .. } if *patch_info == LIBRE2_PATCH
        ));
    }

    #[test]
    fn test_patch_info_too_short_for_layout() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.on_advertisement(&[0, 0, 1, 2, 3, 4, 5, 6, 2, 6, 1, 0]).unwrap();

        let err = dispatcher
            .handle_notification(&patch_frame(3, &LIBRE2_PATCH))
            .unwrap_err();
        assert!(matches!(err, DecodeError::TooShort { needed: 11, actual: 9, .. }));
        assert!(dispatcher.info().patch_info.is_none());
        assert!(dispatcher.sensor().is_none());
    }

    #[test]
    fn test_patch_info_derives_serial_with_uid() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.on_advertisement(&[0, 0, 1, 2, 3, 4, 5, 6, 2, 8, 1, 0]).unwrap();
        dispatcher.handle_notification(&serial_frame(&[0xFF; 8])).unwrap();

        let d = dispatcher
            .handle_notification(&patch_frame(5, &LIBRE2_PATCH))
            .unwrap();
        match &d.events[..] {
            [SessionEvent::PatchInfo { serial, kind, .. }] => {
                assert_eq!(serial, "3ZZZZZZZZZW");
                assert_eq!(*kind, SensorKind::Libre2);
            }
            other => panic!("Unexpected events: {:?}", other),
        }
    }

    #[test]
    fn test_challenge_emits_prefix() {
        let mut dispatcher = NotificationDispatcher::new();
        let mut first = vec![0x8A, 0, 0, 0, 0];
        first.extend(0u8..15);
        let mut second = vec![0x8A, 0, 0, 0];
        second.extend(15u8..28);

        dispatcher.handle_notification(&first).unwrap();
        assert_eq!(dispatcher.reassembly().len(), 15);

        let d = dispatcher.handle_notification(&second).unwrap();
        let challenge: Vec<u8> = (0..25).collect();
        assert!(d
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::SecurityChallenge(c) if *c == challenge)));
        assert!(dispatcher.reassembly().is_empty());
    }

    #[test]
    fn test_challenge_desync_reports_status() {
        let mut dispatcher = NotificationDispatcher::new();
        let mut first = vec![0x8A, 0, 0, 0, 0];
        first.extend([0u8; 7]);
        dispatcher.handle_notification(&first).unwrap();

        let d = dispatcher.handle_notification(&[0x8A, 0, 0, 0, 1, 2]).unwrap();
        assert!(d.events.iter().any(|e| matches!(
            e,
            SessionEvent::Status(StatusMessage { severity: MessageSeverity::Warning, .. })
        )));
        assert!(dispatcher.reassembly().is_empty());
    }

    #[test]
    fn test_fram_completion_hands_off_to_sensor() {
        let mut dispatcher = NotificationDispatcher::new();
        let connected_at = Utc::now();
        dispatcher.on_connected(connected_at);

        let image: Vec<u8> = (0..344u32).map(|i| (i * 7) as u8).collect();
        let mut ready = None;
        for chunk in image.chunks(16) {
            let d = dispatcher.handle_notification(&data_packet(chunk)).unwrap();
            for event in d.events {
                if let SessionEvent::FramReady {
                    kind,
                    fram,
                    reading_started_at,
                } = event
                {
                    ready = Some((kind, fram, reading_started_at));
                }
            }
        }

        let (kind, fram, started) = ready.expect("FRAM should complete");
        assert_eq!(kind, SensorKind::Unknown);
        assert_eq!(&fram[..], &image[..]);
        assert_eq!(started, Some(connected_at));

        let sensor = dispatcher.sensor().unwrap().lock().unwrap();
        assert_eq!(sensor.fram().map(|f| &f[..]), Some(&image[..]));
        assert_eq!(sensor.core().last_reading_at, Some(connected_at));
    }

    #[test]
    fn test_fram_before_patch_info_keeps_unknown_kind() {
        // Payload completion uses whatever kind is cached at that moment.
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.on_advertisement(&[0, 0, 1, 2, 3, 4, 5, 6, 2, 8, 1, 0]).unwrap();

        let d = dispatcher.handle_notification(&data_packet(&[0u8; 344])).unwrap();
        assert!(d.events.iter().any(|e| matches!(
            e,
            SessionEvent::FramReady { kind: SensorKind::Unknown, .. }
        )));

        dispatcher
            .handle_notification(&patch_frame(5, &LIBRE2_PATCH))
            .unwrap();
        let sensor = dispatcher.sensor().unwrap().lock().unwrap();
        assert_eq!(sensor.kind(), SensorKind::Libre2);
    }

    #[test]
    fn test_disconnect_drops_partial_fram() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.on_connected(Utc::now());
        dispatcher.handle_notification(&data_packet(&[1u8; 200])).unwrap();
        assert_eq!(dispatcher.reassembly().len(), 200);

        dispatcher.on_disconnected();
        assert!(dispatcher.reassembly().is_empty());

        let d = dispatcher.handle_notification(&data_packet(&[1u8; 200])).unwrap();
        assert!(!d
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::FramReady { .. })));
    }

    #[test]
    fn test_partial_fram_dropped_on_new_cycle() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.on_connected(Utc::now());
        dispatcher.handle_notification(&data_packet(&[0xAA; 200])).unwrap();

        let d = dispatcher
            .handle_notification(&data_info((2, 6), (1, 1), 80))
            .unwrap();
        assert!(dispatcher.reassembly().is_empty());
        assert!(d.write.is_some());
        assert!(matches!(
            &d.events[..],
            [
                SessionEvent::Status(StatusMessage { severity: MessageSeverity::Warning, message }),
                SessionEvent::TransmitterUpdated(_),
            ] if message.contains("200 bytes dropped")
        ));

        let d = dispatcher.handle_notification(&data_packet(&[0xBB; 344])).unwrap();
        let fram = d
            .events
            .into_iter()
            .find_map(|e| match e {
                SessionEvent::FramReady { fram, .. } => Some(fram),
                _ => None,
            })
            .expect("new cycle should complete its own image");
        assert!(fram.iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn test_stray_challenge_fragment_does_not_cost_next_cycle() {
        let mut dispatcher = NotificationDispatcher::new();
        let mut stray = vec![0x8A, 0, 0, 0];
        stray.extend([0xEEu8; 13]);
        dispatcher.handle_notification(&stray).unwrap();
        assert_eq!(dispatcher.reassembly().len(), 12);

        dispatcher
            .handle_notification(&data_info((2, 8), (1, 1), 80))
            .unwrap();
        assert!(dispatcher.reassembly().is_empty());

        let mut first = vec![0x8A, 0, 0, 0, 0];
        first.extend(0u8..15);
        let mut second = vec![0x8A, 0, 0, 0];
        second.extend(15u8..28);
        dispatcher.handle_notification(&first).unwrap();
        let d = dispatcher.handle_notification(&second).unwrap();

        let challenge: Vec<u8> = (0..25).collect();
        assert!(d
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::SecurityChallenge(c) if *c == challenge)));
    }

    #[test]
    fn test_data_info_with_empty_buffer_reports_no_desync() {
        let mut dispatcher = NotificationDispatcher::new();
        let d = dispatcher
            .handle_notification(&data_info((2, 8), (1, 1), 80))
            .unwrap();
        assert!(matches!(&d.events[..], [SessionEvent::TransmitterUpdated(_)]));
    }

    #[test]
    fn test_generic_sensor_is_skipped_not_downcast() {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.attach_sensor(Sensor::Generic(SensorCore::default()).shared());

        let d = dispatcher.handle_notification(&data_packet(&[0u8; 344])).unwrap();
        assert!(d
            .events
            .iter()
            .any(|e| matches!(e, SessionEvent::FramReady { .. })));
        let sensor = dispatcher.sensor().unwrap().lock().unwrap();
        assert!(sensor.fram().is_none());
    }

    #[test]
    fn test_unrecognized_and_empty() {
        let mut dispatcher = NotificationDispatcher::new();
        let d = dispatcher.handle_notification(&[0x42, 1, 2, 3]).unwrap();
        assert!(d.write.is_none() && d.events.is_empty());

        assert_eq!(
            dispatcher.handle_notification(&[]).unwrap_err(),
            DecodeError::Empty
        );
    }
}
