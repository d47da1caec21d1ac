use amqp_sampler_protocol::{
    codec::Encoder, error::DecodeError, protocol::frames::FRAME_MIN_SIZE, Frame,
};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder as TokioDecoder, Encoder as TokioEncoder};

use crate::error::ConnectionError;

/// Frame codec bounded by the largest frame the peer may send. Until `connection.tune`
/// completes that is `FRAME_MIN_SIZE`.
#[derive(Debug)]
pub(crate) struct AmqpCodec {
    frame_max: u32,
}

impl Default for AmqpCodec {
    fn default() -> Self {
        AmqpCodec {
            frame_max: FRAME_MIN_SIZE,
        }
    }
}

impl AmqpCodec {
    /// Zero lifts the limit.
    pub(crate) fn set_frame_max(&mut self, frame_max: u32) {
        self.frame_max = frame_max;
    }
}

impl TokioDecoder for AmqpCodec {
    type Item = Frame;
    type Error = ConnectionError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, ConnectionError> {
        match Frame::decode_bounded(buf, self.frame_max) {
            Ok((remaining, frame)) => {
                let len = remaining.len();
                buf.advance(buf.len() - len);
                Ok(Some(frame))
            }
            Err(DecodeError::Incomplete(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokioEncoder<Frame> for AmqpCodec {
    type Error = ConnectionError;

    fn encode(&mut self, frame: Frame, buf: &mut BytesMut) -> Result<(), ConnectionError> {
        let len = frame.encoded_size();
        buf.reserve(len as usize);
        let mut writer = buf.writer();
        frame.encode(&mut writer)?;

        Ok(())
    }
}
