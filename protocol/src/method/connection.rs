use std::io::Write;

use super::empty_method;
use crate::{
    codec::{
        long_str_size, read_flags, read_long_str, read_short_str, short_str_size, write_flags,
        write_long_str, write_short_str, Decoder, Encoder,
    },
    error::{DecodeError, EncodeError},
    types::FieldTable,
};

#[cfg(test)]
use fake::Fake;

#[derive(PartialEq, Debug, Clone)]
pub struct Start {
    pub version_major: u8,
    pub version_minor: u8,
    pub server_properties: FieldTable,
    pub mechanisms: Vec<u8>,
    pub locales: Vec<u8>,
}

impl Start {
    /// SASL mechanisms offered by the broker, space separated on the wire.
    pub fn mechanisms(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.mechanisms)
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    }

    pub fn locales(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.locales)
            .split_whitespace()
            .map(str::to_owned)
            .collect()
    }
}

impl Encoder for Start {
    fn encoded_size(&self) -> u32 {
        1 + 1
            + self.server_properties.encoded_size()
            + long_str_size(&self.mechanisms)
            + long_str_size(&self.locales)
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        self.version_major.encode(writer)?;
        self.version_minor.encode(writer)?;
        self.server_properties.encode(writer)?;
        write_long_str(writer, &self.mechanisms)?;
        write_long_str(writer, &self.locales)?;
        Ok(())
    }
}

impl Decoder for Start {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, version_major) = u8::decode(input)?;
        let (input, version_minor) = u8::decode(input)?;
        let (input, server_properties) = FieldTable::decode(input)?;
        let (input, mechanisms) = read_long_str(input)?;
        let (input, locales) = read_long_str(input)?;

        Ok((
            input,
            Start {
                version_major,
                version_minor,
                server_properties,
                mechanisms,
                locales,
            },
        ))
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct StartOk {
    pub client_properties: FieldTable,
    pub mechanism: String,
    pub response: Vec<u8>,
    pub locale: String,
}

impl Encoder for StartOk {
    fn encoded_size(&self) -> u32 {
        self.client_properties.encoded_size()
            + short_str_size(&self.mechanism)
            + long_str_size(&self.response)
            + short_str_size(&self.locale)
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        self.client_properties.encode(writer)?;
        write_short_str(writer, &self.mechanism)?;
        write_long_str(writer, &self.response)?;
        write_short_str(writer, &self.locale)?;
        Ok(())
    }
}

impl Decoder for StartOk {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, client_properties) = FieldTable::decode(input)?;
        let (input, mechanism) = read_short_str(input)?;
        let (input, response) = read_long_str(input)?;
        let (input, locale) = read_short_str(input)?;

        Ok((
            input,
            StartOk {
                client_properties,
                mechanism,
                response,
                locale,
            },
        ))
    }
}

macro_rules! tune_method {
    ($ty:ident) => {
        #[cfg_attr(test, derive(fake::Dummy))]
        #[derive(PartialEq, Eq, Debug, Clone, Copy)]
        pub struct $ty {
            pub channel_max: u16,
            pub frame_max: u32,
            pub heartbeat: u16,
        }

        impl Encoder for $ty {
            fn encoded_size(&self) -> u32 {
                2 + 4 + 2
            }

            fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
                self.channel_max.encode(writer)?;
                self.frame_max.encode(writer)?;
                self.heartbeat.encode(writer)?;
                Ok(())
            }
        }

        impl Decoder for $ty {
            fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
                let (input, channel_max) = u16::decode(input)?;
                let (input, frame_max) = u32::decode(input)?;
                let (input, heartbeat) = u16::decode(input)?;

                Ok((
                    input,
                    $ty {
                        channel_max,
                        frame_max,
                        heartbeat,
                    },
                ))
            }
        }
    };
}

tune_method!(Tune);
tune_method!(TuneOk);

#[cfg_attr(test, derive(fake::Dummy))]
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Open {
    pub virtual_host: String,
}

impl Open {
    pub fn new(virtual_host: impl Into<String>) -> Self {
        Self {
            virtual_host: virtual_host.into(),
        }
    }
}

impl Encoder for Open {
    fn encoded_size(&self) -> u32 {
        short_str_size(&self.virtual_host) + short_str_size("") + 1
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        write_short_str(writer, &self.virtual_host)?;
        // capabilities and insist, both reserved
        write_short_str(writer, "")?;
        write_flags(writer, &[false])?;
        Ok(())
    }
}

impl Decoder for Open {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, virtual_host) = read_short_str(input)?;
        let (input, _capabilities) = read_short_str(input)?;
        let (input, _insist) = read_flags(input)?;

        Ok((input, Open { virtual_host }))
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct OpenOk;

impl Encoder for OpenOk {
    fn encoded_size(&self) -> u32 {
        short_str_size("")
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        write_short_str(writer, "")
    }
}

impl Decoder for OpenOk {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, _known_hosts) = read_short_str(input)?;
        Ok((input, OpenOk))
    }
}

/// connection.close, sent by either peer
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

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Blocked {
    pub reason: String,
}

impl Encoder for Blocked {
    fn encoded_size(&self) -> u32 {
        short_str_size(&self.reason)
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        write_short_str(writer, &self.reason)
    }
}

impl Decoder for Blocked {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, reason) = read_short_str(input)?;
        Ok((input, Blocked { reason }))
    }
}

empty_method!(Unblocked);
