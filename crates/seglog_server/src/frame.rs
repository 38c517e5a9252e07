//! Length-delimited framing shared by server and client.

use bytes::{Bytes, BytesMut};
use seglog_protocol::{decode, encode, CodecResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// A TCP connection carrying one message per 4-byte length-prefixed frame.
pub(crate) type FramedConn = Framed<TcpStream, LengthDelimitedCodec>;

pub(crate) fn framed(stream: TcpStream, max_frame_bytes: usize) -> FramedConn {
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_frame_bytes)
        .new_codec();
    Framed::new(stream, codec)
}

pub(crate) fn to_frame<T: Serialize>(message: &T) -> CodecResult<Bytes> {
    encode(message).map(Bytes::from)
}

pub(crate) fn from_frame<T: DeserializeOwned>(frame: &BytesMut) -> CodecResult<T> {
    decode(frame)
}
