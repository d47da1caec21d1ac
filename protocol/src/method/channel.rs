use std::io::Write;

use super::empty_method;
use crate::{
    codec::{
        long_str_size, read_long_str, read_short_str, short_str_size, write_long_str,
        write_short_str, Decoder, Encoder,
    },
    error::{DecodeError, EncodeError},
};

#[cfg(test)]
use fake::Fake;

#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Open;

impl Encoder for Open {
    fn encoded_size(&self) -> u32 {
        short_str_size("")
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        // out-of-band, reserved
        write_short_str(writer, "")
    }
}

impl Decoder for Open {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, _out_of_band) = read_short_str(input)?;
        Ok((input, Open))
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct OpenOk;

impl Encoder for OpenOk {
    fn encoded_size(&self) -> u32 {
        long_str_size(&[])
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        // channel-id, reserved
        write_long_str(writer, &[])
    }
}

impl Decoder for OpenOk {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, _channel_id) = read_long_str(input)?;
        Ok((input, OpenOk))
    }
}

/// channel.close, sent by either peer. Carries the method that caused it when the broker closes.
#[cfg_attr(test, derive(fake::Dummy))]
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Close {
    pub reply_code: u16,
    pub reply_text: String,
    pub class_id: u16,
    pub method_id: u16,
}

impl Close {
    pub fn new(reply_code: u16, reply_text: impl Into<String>) -> Self {
        Self {
            reply_code,
            reply_text: reply_text.into(),
            class_id: 0,
            method_id: 0,
        }
    }
}

impl Encoder for Close {
    fn encoded_size(&self) -> u32 {
        2 + short_str_size(&self.reply_text) + 2 + 2
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        self.reply_code.encode(writer)?;
        write_short_str(writer, &self.reply_text)?;
        self.class_id.encode(writer)?;
        self.method_id.encode(writer)?;
        Ok(())
    }
}

impl Decoder for Close {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, reply_code) = u16::decode(input)?;
        let (input, reply_text) = read_short_str(input)?;
        let (input, class_id) = u16::decode(input)?;
        let (input, method_id) = u16::decode(input)?;

        Ok((
            input,
            Close {
                reply_code,
                reply_text,
                class_id,
                method_id,
            },
        ))
    }
}

empty_method!(CloseOk);
