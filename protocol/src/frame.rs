use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use crate::{
    codec::{
        decoder::{check_len, read_u16, read_u32, read_u8},
        Decoder, Encoder,
    },
    error::{DecodeError, EncodeError},
    method::Method,
    protocol::frames::*,
};

/// One AMQP frame: a typed payload addressed to a channel.
#[derive(Debug, PartialEq, Clone)]
pub struct Frame {
    channel: u16,
    payload: FramePayload,
}

#[derive(Debug, PartialEq, Clone)]
pub enum FramePayload {
    Method(Method),
    Header(Vec<u8>),
    Body(Vec<u8>),
    Heartbeat,
}

impl Frame {
    pub fn new(channel: u16, payload: FramePayload) -> Self {
        Self { channel, payload }
    }

    pub fn method(channel: u16, method: impl Into<Method>) -> Self {
        Self::new(channel, FramePayload::Method(method.into()))
    }

    pub fn heartbeat() -> Self {
        Self::new(0, FramePayload::Heartbeat)
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }

    pub fn payload(&self) -> &FramePayload {
        &self.payload
    }

    pub fn into_payload(self) -> FramePayload {
        self.payload
    }

    fn frame_type(&self) -> u8 {
        match self.payload {
            FramePayload::Method(_) => FRAME_METHOD,
            FramePayload::Header(_) => FRAME_HEADER,
            FramePayload::Body(_) => FRAME_BODY,
            FramePayload::Heartbeat => FRAME_HEARTBEAT,
        }
    }

    fn payload_size(&self) -> u32 {
        match &self.payload {
            FramePayload::Method(method) => method.encoded_size(),
            FramePayload::Header(bytes) | FramePayload::Body(bytes) => bytes.len() as u32,
            FramePayload::Heartbeat => 0,
        }
    }
}

impl Encoder for Frame {
    fn encoded_size(&self) -> u32 {
        1 + 2 + 4 + self.payload_size() + 1
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        writer.write_u8(self.frame_type())?;
        writer.write_u16::<BigEndian>(self.channel)?;
        writer.write_u32::<BigEndian>(self.payload_size())?;
        match &self.payload {
            FramePayload::Method(method) => method.encode(writer)?,
            FramePayload::Header(bytes) | FramePayload::Body(bytes) => writer.write_all(bytes)?,
            FramePayload::Heartbeat => {}
        }
        writer.write_u8(FRAME_END)?;
        Ok(())
    }
}

impl Frame {
    /// Decodes one frame, rejecting it as soon as its header declares more than
    /// `frame_max` bytes. A `frame_max` of zero means no limit.
    pub fn decode_bounded(input: &[u8], frame_max: u32) -> Result<(&[u8], Self), DecodeError> {
        check_len(input, 7)?;
        let (input, frame_type) = read_u8(input)?;
        if !matches!(
            frame_type,
            FRAME_METHOD | FRAME_HEADER | FRAME_BODY | FRAME_HEARTBEAT
        ) {
            return Err(DecodeError::UnknownFrameType(frame_type));
        }
        let (input, channel) = read_u16(input)?;
        let (input, size) = read_u32(input)?;
        let total = u64::from(size) + 8;
        if frame_max != 0 && total > u64::from(frame_max) {
            return Err(DecodeError::FrameTooLarge {
                size: total,
                max: frame_max,
            });
        }
        let size = size as usize;
        check_len(input, size + 1)?;

        let (payload, input) = input.split_at(size);
        let (input, frame_end) = read_u8(input)?;
        if frame_end != FRAME_END {
            return Err(DecodeError::InvalidFrameEnd(frame_end));
        }

        let payload = match frame_type {
            FRAME_METHOD => match Method::decode(payload) {
                Ok((_, method)) => FramePayload::Method(method),
                Err(DecodeError::Incomplete(_)) => {
                    return Err(DecodeError::MalformedFrame(channel))
                }
                Err(e) => return Err(e),
            },
            FRAME_HEADER => FramePayload::Header(payload.to_vec()),
            FRAME_BODY => FramePayload::Body(payload.to_vec()),
            FRAME_HEARTBEAT => FramePayload::Heartbeat,
            n => return Err(DecodeError::UnknownFrameType(n)),
        };

        Ok((input, Frame { channel, payload }))
    }
}

impl Decoder for Frame {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        Frame::decode_bounded(input, 0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Frame, FramePayload};
    use crate::{
        codec::{Decoder, Encoder},
        error::DecodeError,
        method::{queue, Method, MethodId},
    };

    #[test]
    fn heartbeat_frame_wire_format_test() {
        let mut buffer = vec![];
        Frame::heartbeat().encode(&mut buffer).unwrap();

        assert_eq!(vec![8, 0, 0, 0, 0, 0, 0, 0xCE], buffer);
    }

    #[test]
    fn method_frame_encode_decode_test() {
        let frame = Frame::method(3, queue::Bind::new("q1", "ex1", "rk"));

        let mut buffer = vec![];
        frame.encode(&mut buffer).unwrap();
        assert_eq!(buffer.len() as u32, frame.encoded_size());

        let (remaining, decoded) = Frame::decode(&buffer).unwrap();
        assert_eq!(frame, decoded);
        assert!(remaining.is_empty());
    }

    #[test]
    fn frame_incomplete_test() {
        let mut buffer = vec![];
        Frame::method(1, queue::Delete::new("q1"))
            .encode(&mut buffer)
            .unwrap();

        for len in [0, 3, 7, buffer.len() - 1] {
            assert!(matches!(
                Frame::decode(&buffer[..len]),
                Err(DecodeError::Incomplete(_))
            ));
        }
    }

    #[test]
    fn frame_invalid_end_test() {
        let mut buffer = vec![];
        Frame::heartbeat().encode(&mut buffer).unwrap();
        let last = buffer.len() - 1;
        buffer[last] = 0;

        assert!(matches!(
            Frame::decode(&buffer),
            Err(DecodeError::InvalidFrameEnd(0))
        ));
    }

    #[test]
    fn frame_rejects_protocol_header_test() {
        // a broker that refuses the protocol version answers with its own header
        let input = b"AMQP\x00\x00\x09\x01";

        assert!(matches!(
            Frame::decode(input),
            Err(DecodeError::UnknownFrameType(b'A'))
        ));
    }

    #[test]
    fn unknown_method_is_preserved_test() {
        let mut buffer = vec![1, 0, 1, 0, 0, 0, 6];
        buffer.extend_from_slice(&[0, 60, 0, 60, 0, 0]);
        buffer.push(0xCE);

        let (_, frame) = Frame::decode(&buffer).unwrap();
        assert_eq!(
            &FramePayload::Method(Method::Unknown(MethodId::new(60, 60))),
            frame.payload()
        );
    }

    #[test]
    fn truncated_method_arguments_are_malformed_test() {
        // channel.close whose reply text claims 50 bytes but carries 2
        let mut payload = vec![0, 20, 0, 40, 1, 0x94, 50, b'n', b'o'];
        payload.extend_from_slice(&[0, 0, 0, 0]);
        let mut buffer = vec![1, 0, 5];
        buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buffer.extend_from_slice(&payload);
        buffer.push(0xCE);

        assert!(matches!(
            Frame::decode(&buffer),
            Err(DecodeError::MalformedFrame(5))
        ));
    }

    #[test]
    fn oversized_frame_is_rejected_from_its_header_test() {
        let header = [1, 0, 1, 0xFF, 0xFF, 0xFF, 0xF0];

        assert!(matches!(
            Frame::decode_bounded(&header, 4096),
            Err(DecodeError::FrameTooLarge { max: 4096, .. })
        ));
        assert!(matches!(
            Frame::decode(&header),
            Err(DecodeError::Incomplete(_))
        ));
    }

    #[test]
    fn frame_at_the_limit_is_accepted_test() {
        let frame = Frame::new(1, FramePayload::Body(vec![7; 92]));
        let mut buffer = vec![];
        frame.encode(&mut buffer).unwrap();
        assert_eq!(100, buffer.len());

        assert_eq!(frame, Frame::decode_bounded(&buffer, 100).unwrap().1);
        assert!(matches!(
            Frame::decode_bounded(&buffer, 99),
            Err(DecodeError::FrameTooLarge { size: 100, max: 99 })
        ));
    }

    #[test]
    fn frames_are_consumed_one_at_a_time_test() {
        let mut buffer = vec![];
        Frame::heartbeat().encode(&mut buffer).unwrap();
        Frame::method(2, queue::BindOk).encode(&mut buffer).unwrap();

        let (remaining, first) = Frame::decode(&buffer).unwrap();
        assert_eq!(Frame::heartbeat(), first);

        let (remaining, second) = Frame::decode(remaining).unwrap();
        assert_eq!(2, second.channel());
        assert!(remaining.is_empty());
    }
}
