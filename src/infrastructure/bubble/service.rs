//! Bubble Service Module
//!
//! Drives one [`NotificationDispatcher`] from a stream of transport events,
//! forwarding outbound commands to the write channel and everything else to
//! the application event channel.

use super::dispatcher::NotificationDispatcher;
use super::protocol::{hex, BubbleCommand};
use crate::domain::models::{AppEvent, ConnectionStatus, MessageSeverity, StatusMessage};
use crate::domain::settings::Settings;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// What the (external) BLE transport reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Manufacturer data from a discovery event
    Advertisement(Vec<u8>),
    /// Notifications are subscribed and commands can be written
    Connected { at: DateTime<Utc> },
    Notification(Vec<u8>),
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub reading_interval_minutes: u8,
    pub raw_data_logging: bool,
}

impl From<&Settings> for ServiceConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            reading_interval_minutes: settings.reading_interval_minutes,
            raw_data_logging: settings.debug_raw_data_logging,
        }
    }
}

/// One transmitter session. Each tracked transmitter gets its own service.
pub struct BubbleService {
    dispatcher: NotificationDispatcher,
    config: ServiceConfig,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    write_sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl BubbleService {
    pub fn new(
        config: ServiceConfig,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        write_sender: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        Self::with_dispatcher(NotificationDispatcher::new(), config, event_sender, write_sender)
    }

    pub fn with_dispatcher(
        mut dispatcher: NotificationDispatcher,
        config: ServiceConfig,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        write_sender: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Self {
        dispatcher.set_raw_logging(config.raw_data_logging);
        Self {
            dispatcher,
            config,
            event_sender,
            write_sender,
        }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut NotificationDispatcher {
        &mut self.dispatcher
    }

    /// Process transport events until the channel closes.
    pub async fn run(mut self, mut transport: mpsc::UnboundedReceiver<TransportEvent>) -> Self {
        while let Some(event) = transport.recv().await {
            self.handle(event);
        }
        debug!("Transport channel closed, stopping Bubble service");
        self
    }

    /// Process a single transport event.
    pub fn handle(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Advertisement(data) => match self.dispatcher.on_advertisement(&data) {
                Ok(parsed) => self.send(AppEvent::Advertised(parsed)),
                Err(e) => self.report_decode_error(&e),
            },
            TransportEvent::Connected { at } => {
                info!("Bubble connected");
                self.dispatcher.on_connected(at);
                self.send(AppEvent::ConnectionStatus(ConnectionStatus::Connected));
                match BubbleCommand::read(self.config.reading_interval_minutes) {
                    Ok(command) => self.write(command),
                    Err(e) => {
                        error!("Not requesting periodic readings: {}", e);
                        self.send(AppEvent::LogMessage(StatusMessage {
                            message: e.to_string(),
                            severity: MessageSeverity::Error,
                        }));
                    }
                }
            }
            TransportEvent::Notification(data) => {
                match self.dispatcher.handle_notification(&data) {
                    Ok(dispatch) => {
                        if let Some(command) = dispatch.write {
                            self.write(command);
                        }
                        for event in dispatch.events {
                            self.send(AppEvent::Session(event));
                        }
                    }
                    Err(e) => self.report_decode_error(&e),
                }
            }
            TransportEvent::Disconnected => {
                info!("Bubble disconnected");
                self.dispatcher.on_disconnected();
                self.send(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
            }
        }
    }

    fn report_decode_error(&self, e: &crate::error::DecodeError) {
        warn!("Bubble decode error: {}", e);
        self.send(AppEvent::LogMessage(StatusMessage::warning(format!(
            "Bubble: {e}"
        ))));
    }

    fn write(&self, command: BubbleCommand) {
        let bytes = command.to_bytes();
        debug!("Bubble write: {}", hex(&bytes));
        if self.write_sender.send(bytes).is_err() {
            warn!("Write channel closed, dropping {:?}", command);
        }
    }

    fn send(&self, event: AppEvent) {
        let _ = self.event_sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (
        BubbleService,
        mpsc::UnboundedReceiver<AppEvent>,
        mpsc::UnboundedReceiver<Vec<u8>>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let config = ServiceConfig::from(&Settings::default());
        (BubbleService::new(config, event_tx, write_tx), event_rx, write_rx)
    }

    #[test]
    fn test_connect_writes_read_command() {
        let (mut service, mut events, mut writes) = service();
        service.handle(TransportEvent::Connected { at: Utc::now() });

        assert_eq!(writes.try_recv().unwrap(), vec![0x00, 0x00, 0x05]);
        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::ConnectionStatus(ConnectionStatus::Connected)
        ));
    }

    #[test]
    fn test_zero_interval_skips_read_command() {
        let (event_tx, mut events) = mpsc::unbounded_channel();
        let (write_tx, mut writes) = mpsc::unbounded_channel();
        let config = ServiceConfig {
            reading_interval_minutes: 0,
            raw_data_logging: false,
        };
        let mut service = BubbleService::new(config, event_tx, write_tx);
        service.handle(TransportEvent::Connected { at: Utc::now() });

        assert!(writes.try_recv().is_err());
        events.try_recv().unwrap();
        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::LogMessage(StatusMessage { severity: MessageSeverity::Error, .. })
        ));
    }

    #[test]
    fn test_decode_error_is_reported_not_fatal() {
        let (mut service, mut events, _writes) = service();
        service.handle(TransportEvent::Notification(vec![0xC0, 0x00, 0x01]));
        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::LogMessage(StatusMessage { severity: MessageSeverity::Warning, .. })
        ));

        service.handle(TransportEvent::Notification(vec![0xBF]));
        assert!(matches!(
            events.try_recv().unwrap(),
            AppEvent::Session(crate::domain::models::SessionEvent::NoSensor { .. })
        ));
    }
}
