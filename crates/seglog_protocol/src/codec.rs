//! CBOR encoding of protocol messages.

use crate::error::{CodecError, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a message to CBOR.
///
/// # Errors
///
/// Returns `EncodingFailed` if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(message, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decodes a message from CBOR.
///
/// # Errors
///
/// Returns `DecodingFailed` if the bytes are not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response};

    #[test]
    fn garbage_fails_to_decode() {
        let result: CodecResult<Request> = decode(&[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }

    #[test]
    fn empty_input_fails_to_decode() {
        let result: CodecResult<Response> = decode(&[]);
        assert!(result.is_err());
    }

    #[test]
    fn request_is_not_a_response() {
        let bytes = encode(&Request::Cancel).unwrap();
        let result: CodecResult<Response> = decode(&bytes);
        assert!(result.is_err());
    }
}
