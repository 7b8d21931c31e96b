//! Core functionality for the GlucoWatch bridge
//! This module contains the acquisition pipeline: radio access, payload
//! decoding and the session state machine.

pub mod bluetooth;
pub mod codec;
pub mod error;
pub mod session;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use codec::GlucoseReading;
pub use error::{CodecError, ErrorDetail, ErrorKind};
pub use session::observer::{JsonLinesObserver, LoggingObserver, SessionObserver};
pub use session::runner::SessionRunner;
pub use session::state::{ConnectionState, DeviceInfo, FailureReason};
pub use session::{SessionOptions, SessionStateMachine};
