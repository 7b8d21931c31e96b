//! Observer sink: the display layer's view of a session

use std::io::Write;

use log::{error, info, warn};
use serde::Serialize;

use crate::core::codec::GlucoseReading;
use crate::core::error::{ErrorDetail, ErrorKind};
use crate::core::session::state::ConnectionState;

/// Receives state and value changes from the session state machine
pub trait SessionObserver {
    fn on_connection_state_changed(&mut self, state: &ConnectionState);
    fn on_manufacturer_name_updated(&mut self, name: &str);
    fn on_glucose_reading_updated(&mut self, reading: &GlucoseReading);
    fn on_error(&mut self, kind: ErrorKind, detail: &ErrorDetail);
}

/// Writes every notification through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SessionObserver for LoggingObserver {
    fn on_connection_state_changed(&mut self, state: &ConnectionState) {
        info!("Connection state: {}", state);
    }

    fn on_manufacturer_name_updated(&mut self, name: &str) {
        info!("Manufacturer: {:?}", name);
    }

    fn on_glucose_reading_updated(&mut self, reading: &GlucoseReading) {
        info!("Blood glucose: {} (at {})", reading.value, reading.observed_at);
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &ErrorDetail) {
        if kind.is_terminal() {
            error!("{}: {}", kind, detail.message);
        } else {
            warn!("{}: {}", kind, detail.message);
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ObserverRecord<'a> {
    ConnectionState { state: &'a ConnectionState },
    ManufacturerName { name: &'a str },
    GlucoseReading { reading: &'a GlucoseReading },
    Error { kind: ErrorKind, detail: &'a ErrorDetail },
}

/// Serializes every notification as one JSON object per line
pub struct JsonLinesObserver<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesObserver<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, record: ObserverRecord<'_>) {
        if let Err(e) = self.write_record(&record) {
            error!("Failed to emit observer record: {}", e);
        }
    }

    fn write_record(&mut self, record: &ObserverRecord<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

impl<W: Write> SessionObserver for JsonLinesObserver<W> {
    fn on_connection_state_changed(&mut self, state: &ConnectionState) {
        self.emit(ObserverRecord::ConnectionState { state });
    }

    fn on_manufacturer_name_updated(&mut self, name: &str) {
        self.emit(ObserverRecord::ManufacturerName { name });
    }

    fn on_glucose_reading_updated(&mut self, reading: &GlucoseReading) {
        self.emit(ObserverRecord::GlucoseReading { reading });
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &ErrorDetail) {
        self.emit(ObserverRecord::Error { kind, detail });
    }
}

/// Fans every notification out to each observer in order
impl SessionObserver for Vec<Box<dyn SessionObserver + Send>> {
    fn on_connection_state_changed(&mut self, state: &ConnectionState) {
        self.iter_mut().for_each(|o| o.on_connection_state_changed(state));
    }

    fn on_manufacturer_name_updated(&mut self, name: &str) {
        self.iter_mut().for_each(|o| o.on_manufacturer_name_updated(name));
    }

    fn on_glucose_reading_updated(&mut self, reading: &GlucoseReading) {
        self.iter_mut().for_each(|o| o.on_glucose_reading_updated(reading));
    }

    fn on_error(&mut self, kind: ErrorKind, detail: &ErrorDetail) {
        self.iter_mut().for_each(|o| o.on_error(kind, detail));
    }
}
