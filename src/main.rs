use bubble_transmitter::domain::models::{AppEvent, SessionEvent};
use bubble_transmitter::domain::settings::SettingsService;
use bubble_transmitter::infrastructure::bubble::protocol::hex;
use bubble_transmitter::infrastructure::{capture, logging};
use bubble_transmitter::{BubbleService, ServiceConfig};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "bubble-replay")]
#[command(about = "Replay a Bubble transmitter capture through the protocol decoder")]
struct Cli {
    /// Capture file to replay
    #[arg(short, long)]
    capture: PathBuf,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings_service = match &cli.settings {
        Some(path) => SettingsService::load_from(path),
        None => SettingsService::new()?,
    };
    let settings = settings_service.get().clone();
    let _logging_guard = logging::init_logger(&settings.log_settings)?;

    info!("Replaying {}", cli.capture.display());
    let events = capture::load_capture(&cli.capture)?;

    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (write_tx, mut write_rx) = mpsc::unbounded_channel();

    let service = BubbleService::new(ServiceConfig::from(&settings), event_tx, write_tx);
    let session = tokio::spawn(service.run(transport_rx));

    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(event) = event_rx.recv() => print_event(event),
                Some(bytes) = write_rx.recv() => info!("-> write {}", hex(&bytes)),
                else => break,
            }
        }
    });

    for event in events {
        transport_tx.send(event)?;
    }
    drop(transport_tx);

    let service = session.await?;
    // The service owned the senders; dropping it closes the printer's channels.
    let info = service.dispatcher().info().clone();
    drop(service);
    printer.await?;

    info!("Final transmitter state: {:?}", info);
    Ok(())
}

fn print_event(event: AppEvent) {
    match event {
        AppEvent::Session(SessionEvent::FramReady {
            kind,
            fram,
            reading_started_at,
        }) => info!(
            "FRAM ready: {} ({} bytes, reading started {:?})",
            kind,
            fram.len(),
            reading_started_at
        ),
        AppEvent::Session(SessionEvent::SensorDetected(_)) => info!("Sensor detected"),
        AppEvent::LogMessage(message) => warn!("{}", message.message),
        other => info!("{:?}", other),
    }
}
