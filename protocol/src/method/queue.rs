use std::io::Write;

use super::empty_method;
use crate::{
    codec::{read_flags, read_short_str, short_str_size, write_flags, write_short_str, Decoder, Encoder},
    error::{DecodeError, EncodeError},
    types::FieldTable,
};

#[cfg(test)]
use fake::Fake;

#[derive(PartialEq, Debug, Clone)]
pub struct Declare {
    pub queue: String,
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

impl Declare {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            passive: false,
            durable: false,
            exclusive: false,
            auto_delete: false,
            no_wait: false,
            arguments: FieldTable::new(),
        }
    }

    /// Existence check only, the broker closes the channel with 404 when the queue is missing.
    pub fn passive(queue: impl Into<String>) -> Self {
        Self {
            passive: true,
            ..Self::new(queue)
        }
    }
}

impl Encoder for Declare {
    fn encoded_size(&self) -> u32 {
        2 + short_str_size(&self.queue) + 1 + self.arguments.encoded_size()
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        0u16.encode(writer)?;
        write_short_str(writer, &self.queue)?;
        write_flags(
            writer,
            &[
                self.passive,
                self.durable,
                self.exclusive,
                self.auto_delete,
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
        let (input, queue) = read_short_str(input)?;
        let (input, flags) = read_flags(input)?;
        let (input, arguments) = FieldTable::decode(input)?;

        Ok((
            input,
            Declare {
                queue,
                passive: flags[0],
                durable: flags[1],
                exclusive: flags[2],
                auto_delete: flags[3],
                no_wait: flags[4],
                arguments,
            },
        ))
    }
}

#[cfg_attr(test, derive(fake::Dummy))]
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct DeclareOk {
    pub queue: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

impl Encoder for DeclareOk {
    fn encoded_size(&self) -> u32 {
        short_str_size(&self.queue) + 4 + 4
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        write_short_str(writer, &self.queue)?;
        self.message_count.encode(writer)?;
        self.consumer_count.encode(writer)?;
        Ok(())
    }
}

impl Decoder for DeclareOk {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, queue) = read_short_str(input)?;
        let (input, message_count) = u32::decode(input)?;
        let (input, consumer_count) = u32::decode(input)?;

        Ok((
            input,
            DeclareOk {
                queue,
                message_count,
                consumer_count,
            },
        ))
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Bind {
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
    pub no_wait: bool,
    pub arguments: FieldTable,
}

impl Bind {
    pub fn new(
        queue: impl Into<String>,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        Self {
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            no_wait: false,
            arguments: FieldTable::new(),
        }
    }
}

impl Encoder for Bind {
    fn encoded_size(&self) -> u32 {
        2 + short_str_size(&self.queue)
            + short_str_size(&self.exchange)
            + short_str_size(&self.routing_key)
            + 1
            + self.arguments.encoded_size()
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        0u16.encode(writer)?;
        write_short_str(writer, &self.queue)?;
        write_short_str(writer, &self.exchange)?;
        write_short_str(writer, &self.routing_key)?;
        write_flags(writer, &[self.no_wait])?;
        self.arguments.encode(writer)?;
        Ok(())
    }
}

impl Decoder for Bind {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, _ticket) = u16::decode(input)?;
        let (input, queue) = read_short_str(input)?;
        let (input, exchange) = read_short_str(input)?;
        let (input, routing_key) = read_short_str(input)?;
        let (input, flags) = read_flags(input)?;
        let (input, arguments) = FieldTable::decode(input)?;

        Ok((
            input,
            Bind {
                queue,
                exchange,
                routing_key,
                no_wait: flags[0],
                arguments,
            },
        ))
    }
}

empty_method!(BindOk);

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Delete {
    pub queue: String,
    pub if_unused: bool,
    pub if_empty: bool,
    pub no_wait: bool,
}

impl Delete {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            if_unused: false,
            if_empty: false,
            no_wait: false,
        }
    }
}

impl Encoder for Delete {
    fn encoded_size(&self) -> u32 {
        2 + short_str_size(&self.queue) + 1
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        0u16.encode(writer)?;
        write_short_str(writer, &self.queue)?;
        write_flags(writer, &[self.if_unused, self.if_empty, self.no_wait])?;
        Ok(())
    }
}

impl Decoder for Delete {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, _ticket) = u16::decode(input)?;
        let (input, queue) = read_short_str(input)?;
        let (input, flags) = read_flags(input)?;

        Ok((
            input,
            Delete {
                queue,
                if_unused: flags[0],
                if_empty: flags[1],
                no_wait: flags[2],
            },
        ))
    }
}

#[cfg_attr(test, derive(fake::Dummy))]
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct DeleteOk {
    pub message_count: u32,
}

impl Encoder for DeleteOk {
    fn encoded_size(&self) -> u32 {
        4
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        self.message_count.encode(writer)
    }
}

impl Decoder for DeleteOk {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, message_count) = u32::decode(input)?;
        Ok((input, DeleteOk { message_count }))
    }
}
