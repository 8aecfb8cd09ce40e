//! Response decoders
//!
//! Every scalar in a response starts at the same offset, right after the
//! echoed address, function code and length byte.

use crate::catalog::{CommandDescriptor, DecoderKind};
use crate::value::{DecodedValue, SystemClock};
use sanext_core::{SanextError, SanextResult};

/// Offset of the first value byte in a response
pub const PAYLOAD_OFFSET: usize = 6;

const FLOAT_LENGTH: usize = 4;
const ROUNDING_SCALE: f64 = 10_000.0;

/// Smallest response `kind` can decode
pub fn minimum_length(kind: DecoderKind) -> usize {
    match kind {
        DecoderKind::RoundedFloat | DecoderKind::RawFloat => PAYLOAD_OFFSET + FLOAT_LENGTH,
        DecoderKind::SystemClock => PAYLOAD_OFFSET + SystemClock::LENGTH,
    }
}

/// Decode the response to `descriptor`
///
/// # Errors
///
/// Returns `SanextError::Decode` when `payload` is shorter than the decoder
/// needs. Extra trailing bytes (the response checksum) are ignored.
pub fn decode(descriptor: &CommandDescriptor, payload: &[u8]) -> SanextResult<DecodedValue> {
    let kind = descriptor.decoder;
    let expected = minimum_length(kind);
    if payload.len() < expected {
        return Err(SanextError::Decode {
            decoder: kind.name(),
            expected,
            actual: payload.len(),
        });
    }

    let value = match kind {
        DecoderKind::RoundedFloat => DecodedValue::Float(round4(read_f32_le(payload))),
        DecoderKind::RawFloat => DecodedValue::RawFloat(read_f32_le(payload)),
        DecoderKind::SystemClock => {
            let mut bytes = [0u8; SystemClock::LENGTH];
            bytes.copy_from_slice(&payload[PAYLOAD_OFFSET..PAYLOAD_OFFSET + SystemClock::LENGTH]);
            DecodedValue::Timestamp(SystemClock::from_bytes(bytes))
        }
    };
    Ok(value)
}

/// Little-endian IEEE-754 single at `PAYLOAD_OFFSET`, widened without loss
fn read_f32_le(payload: &[u8]) -> f64 {
    let mut bytes = [0u8; FLOAT_LENGTH];
    bytes.copy_from_slice(&payload[PAYLOAD_OFFSET..PAYLOAD_OFFSET + FLOAT_LENGTH]);
    f64::from(f32::from_le_bytes(bytes))
}

fn round4(value: f64) -> f64 {
    (value * ROUNDING_SCALE).round() / ROUNDING_SCALE
}
