//! Byte encoding for `Array` as persisted through a `CacheStore`. The actual
//! on-disk tile format a host framework uses is out of scope (`spec.md`
//! §1); this is the minimum the scheduler itself needs to round-trip an
//! `Array` through `CacheStore::put`/`get` in its own tests and in-process
//! reference implementations.

use raster_model::Array;

use crate::error::{Result, SchedulerError};

/// `rows, cols, bands` as little-endian `u32`s, followed by `data` as
/// little-endian `f32`s.
pub fn encode(array: &Array) -> Vec<u8> {
    let (rows, cols, bands) = array.shape;
    let mut out = Vec::with_capacity(12 + array.data.len() * 4);
    out.extend_from_slice(&rows.to_le_bytes());
    out.extend_from_slice(&cols.to_le_bytes());
    out.extend_from_slice(&bands.to_le_bytes());
    for value in &array.data {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<Array> {
    if bytes.len() < 12 {
        return Err(SchedulerError::Cache(
            "cache tile shorter than the shape header".to_string(),
        ));
    }
    let rows = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let cols = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
    let bands = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let expected_len = rows as usize * cols as usize * bands as usize;
    let payload = &bytes[12..];
    if payload.len() != expected_len * 4 {
        return Err(SchedulerError::Cache(format!(
            "cache tile payload length {} does not match shape {rows}x{cols}x{bands}",
            payload.len()
        )));
    }
    let data = payload
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    Ok(Array {
        shape: (rows, cols, bands),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let array = Array::filled((2, 2, 1), 3.5);
        let bytes = encode(&array);
        let back = decode(&bytes).unwrap();
        assert_eq!(array, back);
    }

    #[test]
    fn rejects_truncated_payload() {
        let array = Array::filled((2, 2, 1), 1.0);
        let mut bytes = encode(&array);
        bytes.truncate(bytes.len() - 1);
        assert!(decode(&bytes).is_err());
    }
}
