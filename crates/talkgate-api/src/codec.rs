//! Control channel framing.
//!
//! Every message on the TLS stream is prefixed by a six byte header: a
//! big-endian `u16` message type followed by a big-endian `u32` payload
//! length.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;
use crate::proto::MessageType;

const HEADER_LEN: usize = 6;

/// Largest payload we accept. Servers cap messages well below this.
pub const MAX_FRAME_LEN: usize = 8 * 1024 * 1024;

/// One framed control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(kind: u16, payload: Bytes) -> Self {
        Self { kind, payload }
    }

    pub fn typed(kind: MessageType, payload: Bytes) -> Self {
        Self::new(kind as u16, payload)
    }

    /// Encode `message` as the payload of a `kind` frame.
    pub fn message(kind: MessageType, message: &impl prost::Message) -> Self {
        Self::typed(kind, Bytes::from(message.encode_to_vec()))
    }
}

/// `tokio_util` codec for [`Frame`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Error> {
        let Some(header) = src.first_chunk::<HEADER_LEN>() else {
            return Ok(None);
        };
        let kind = u16::from_be_bytes([header[0], header[1]]);
        let len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
        let len = usize::try_from(len).unwrap_or(usize::MAX);

        if len > MAX_FRAME_LEN {
            return Err(Error::FrameTooLarge {
                len,
                max: MAX_FRAME_LEN,
            });
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame { kind, payload }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Error> {
        let len = u32::try_from(frame.payload.len())
            .ok()
            .filter(|&l| usize::try_from(l).is_ok_and(|l| l <= MAX_FRAME_LEN))
            .ok_or(Error::FrameTooLarge {
                len: frame.payload.len(),
                max: MAX_FRAME_LEN,
            })?;

        dst.reserve(HEADER_LEN + frame.payload.len());
        dst.put_u16(frame.kind);
        dst.put_u32(len);
        dst.put_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use tokio_util::codec::FramedRead;

    fn encoded(kind: u16, payload: &'static [u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        FrameCodec
            .encode(Frame::new(kind, Bytes::from_static(payload)), &mut buf)
            .unwrap();
        buf
    }

    #[test]
    fn header_is_big_endian() {
        let buf = encoded(7, b"abc");
        assert_eq!(buf.as_ref(), &[0, 7, 0, 0, 0, 3, b'a', b'b', b'c']);
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let full = encoded(3, b"ping");
        let mut partial = BytesMut::from(&full[..7]);
        assert_eq!(FrameCodec.decode(&mut partial).unwrap(), None);

        partial.extend_from_slice(&full[7..]);
        let frame = FrameCodec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(frame.kind, 3);
        assert_eq!(frame.payload.as_ref(), b"ping");
        assert!(partial.is_empty());
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let mut buf = BytesMut::from(&[0, 1, 0xff, 0xff, 0xff, 0xff][..]);
        assert!(matches!(
            FrameCodec.decode(&mut buf),
            Err(Error::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn frames_split_across_reads() {
        let mut stream = encoded(5, b"sync");
        stream.extend_from_slice(&encoded(9, b""));

        let io = tokio_test::io::Builder::new()
            .read(&stream[..4])
            .read(&stream[4..])
            .build();
        let mut framed = FramedRead::new(io, FrameCodec);

        let first = framed.next().await.unwrap().unwrap();
        assert_eq!((first.kind, first.payload.as_ref()), (5, &b"sync"[..]));
        let second = framed.next().await.unwrap().unwrap();
        assert_eq!((second.kind, second.payload.len()), (9, 0));
        assert!(framed.next().await.is_none());
    }
}
