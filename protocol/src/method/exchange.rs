use std::io::Write;

use super::empty_method;
use crate::{
    codec::{read_flags, read_short_str, short_str_size, write_flags, write_short_str, Decoder, Encoder},
    error::{DecodeError, EncodeError},
    types::FieldTable,
};

#[derive(PartialEq, Debug, Clone)]
pub struct Declare {
    pub exchange: String,
    pub kind: String,
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

impl Declare {
    pub fn new(exchange: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            kind: kind.into(),
            passive: false,
            durable: false,
            auto_delete: false,
            internal: false,
            no_wait: false,
            arguments: FieldTable::new(),
        }
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    pub fn passive(mut self, passive: bool) -> Self {
        self.passive = passive;
        self
    }
}

impl Encoder for Declare {
    fn encoded_size(&self) -> u32 {
        2 + short_str_size(&self.exchange)
            + short_str_size(&self.kind)
            + 1
            + self.arguments.encoded_size()
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        // ticket, reserved
        0u16.encode(writer)?;
        write_short_str(writer, &self.exchange)?;
        write_short_str(writer, &self.kind)?;
        write_flags(
            writer,
            &[
                self.passive,
                self.durable,
                self.auto_delete,
                self.internal,
                self.no_wait,
            ],
        )?;
        self.arguments.encode(writer)?;
        Ok(())
    }
}

impl Decoder for Declare {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, _ticket) = u16::decode(input)?;
        let (input, exchange) = read_short_str(input)?;
        let (input, kind) = read_short_str(input)?;
        let (input, flags) = read_flags(input)?;
        let (input, arguments) = FieldTable::decode(input)?;

        Ok((
            input,
            Declare {
                exchange,
                kind,
                passive: flags[0],
                durable: flags[1],
                auto_delete: flags[2],
                internal: flags[3],
                no_wait: flags[4],
                arguments,
            },
        ))
    }
}

empty_method!(DeclareOk);

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Delete {
    pub exchange: String,
    pub if_unused: bool,
    pub no_wait: bool,
}

impl Delete {
    pub fn new(exchange: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            if_unused: false,
            no_wait: false,
        }
    }
}

impl Encoder for Delete {
    fn encoded_size(&self) -> u32 {
        2 + short_str_size(&self.exchange) + 1
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        0u16.encode(writer)?;
        write_short_str(writer, &self.exchange)?;
        write_flags(writer, &[self.if_unused, self.no_wait])?;
        Ok(())
    }
}

impl Decoder for Delete {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, _ticket) = u16::decode(input)?;
        let (input, exchange) = read_short_str(input)?;
        let (input, flags) = read_flags(input)?;

        Ok((
            input,
            Delete {
                exchange,
                if_unused: flags[0],
                no_wait: flags[1],
            },
        ))
    }
}

empty_method!(DeleteOk);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Declare;
    use crate::{codec::Encoder, method::tests::specific_command_encode_decode_test};

    #[test]
    fn exchange_declare_flags_test() {
        let declare = Declare::new("ex1", "topic").durable(true);

        let mut buffer = vec![];
        declare.encode(&mut buffer).unwrap();

        // ticket(2) + "ex1"(4) + "topic"(6) then the flags octet
        assert_eq!(0b0000_0010, buffer[12]);

        specific_command_encode_decode_test(declare);
    }

    #[test]
    fn exchange_declare_passive_test() {
        specific_command_encode_decode_test(Declare::new("ex1", "fanout").passive(true));
    }
}
