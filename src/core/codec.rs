//! GlucoWatch characteristic payload decoding
//! This module translates raw characteristic values into typed readings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::bluetooth::constants::GLUCOSE_PAYLOAD_SIZE;
use crate::core::error::CodecError;

/// A single glucose value as reported by the sensor, in sensor-defined units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlucoseReading {
    /// Raw sensor value, no scaling applied
    pub value: u16,
    /// Time the payload was decoded
    pub observed_at: DateTime<Utc>,
}

/// Decodes a glucose measurement payload, stamped with the current time.
pub fn decode_glucose(bytes: &[u8]) -> Result<GlucoseReading, CodecError> {
    decode_glucose_at(bytes, Utc::now())
}

/// Decodes a glucose measurement payload with an explicit timestamp.
///
/// The payload must be exactly two bytes, little-endian.
pub fn decode_glucose_at(bytes: &[u8], observed_at: DateTime<Utc>) -> Result<GlucoseReading, CodecError> {
    let raw: [u8; GLUCOSE_PAYLOAD_SIZE] = bytes.try_into().map_err(|_| CodecError::MalformedPayload {
        expected: GLUCOSE_PAYLOAD_SIZE,
        actual: bytes.len(),
    })?;

    Ok(GlucoseReading {
        value: u16::from_le_bytes(raw),
        observed_at,
    })
}

/// Decodes a manufacturer name payload. An empty payload is an empty name.
pub fn decode_manufacturer_name(bytes: &[u8]) -> Result<String, CodecError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| CodecError::InvalidUtf8 {
            valid_up_to: e.valid_up_to(),
        })
}

/// Test fixture encoders
pub mod fixtures {
    pub fn encode_glucose(value: u16) -> Vec<u8> {
        value.to_le_bytes().to_vec()
    }

    pub fn encode_manufacturer_name(name: &str) -> Vec<u8> {
        name.as_bytes().to_vec()
    }
}
