use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use super::Encoder;
use crate::{
    error::EncodeError,
    types::{FieldTable, FieldValue},
};

impl Encoder for u8 {
    fn encoded_size(&self) -> u32 {
        1
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        writer.write_u8(*self)?;
        Ok(())
    }
}

impl Encoder for u16 {
    fn encoded_size(&self) -> u32 {
        2
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        writer.write_u16::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Encoder for u32 {
    fn encoded_size(&self) -> u32 {
        4
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        writer.write_u32::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Encoder for u64 {
    fn encoded_size(&self) -> u32 {
        8
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        writer.write_u64::<BigEndian>(*self)?;
        Ok(())
    }
}

pub fn short_str_size(value: &str) -> u32 {
    1 + value.len() as u32
}

pub fn long_str_size(value: &[u8]) -> u32 {
    4 + value.len() as u32
}

pub fn write_short_str(writer: &mut impl Write, value: &str) -> Result<(), EncodeError> {
    if value.len() > u8::MAX as usize {
        return Err(EncodeError::ShortStringTooLong(value.len()));
    }
    writer.write_u8(value.len() as u8)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

pub fn write_long_str(writer: &mut impl Write, value: &[u8]) -> Result<(), EncodeError> {
    writer.write_u32::<BigEndian>(value.len() as u32)?;
    writer.write_all(value)?;
    Ok(())
}

/// Packs up to eight consecutive bit arguments into one octet, first flag in the lowest bit.
pub fn write_flags(writer: &mut impl Write, flags: &[bool]) -> Result<(), EncodeError> {
    let octet = flags
        .iter()
        .take(8)
        .enumerate()
        .fold(0u8, |acc, (bit, set)| if *set { acc | (1 << bit) } else { acc });
    writer.write_u8(octet)?;
    Ok(())
}

impl Encoder for FieldTable {
    fn encoded_size(&self) -> u32 {
        4 + self.iter().fold(0, |acc, (key, value)| {
            acc + short_str_size(key) + value.encoded_size()
        })
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        writer.write_u32::<BigEndian>(self.encoded_size() - 4)?;
        for (key, value) in self.iter() {
            write_short_str(writer, key)?;
            value.encode(writer)?;
        }
        Ok(())
    }
}

impl Encoder for FieldValue {
    fn encoded_size(&self) -> u32 {
        1 + match self {
            FieldValue::Boolean(_) | FieldValue::ShortShortInt(_) | FieldValue::ShortShortUInt(_) => 1,
            FieldValue::ShortInt(_) | FieldValue::ShortUInt(_) => 2,
            FieldValue::LongInt(_) | FieldValue::LongUInt(_) | FieldValue::Float(_) => 4,
            FieldValue::LongLongInt(_) | FieldValue::Double(_) | FieldValue::Timestamp(_) => 8,
            FieldValue::Decimal { .. } => 5,
            FieldValue::LongString(bytes) | FieldValue::ByteArray(bytes) => long_str_size(bytes),
            FieldValue::FieldArray(values) => {
                4 + values.iter().map(Encoder::encoded_size).sum::<u32>()
            }
            FieldValue::FieldTable(table) => table.encoded_size(),
            FieldValue::Void => 0,
        }
    }

    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError> {
        writer.write_u8(self.tag())?;
        match self {
            FieldValue::Boolean(value) => writer.write_u8(u8::from(*value))?,
            FieldValue::ShortShortInt(value) => writer.write_i8(*value)?,
            FieldValue::ShortShortUInt(value) => writer.write_u8(*value)?,
            FieldValue::ShortInt(value) => writer.write_i16::<BigEndian>(*value)?,
            FieldValue::ShortUInt(value) => writer.write_u16::<BigEndian>(*value)?,
            FieldValue::LongInt(value) => writer.write_i32::<BigEndian>(*value)?,
            FieldValue::LongUInt(value) => writer.write_u32::<BigEndian>(*value)?,
            FieldValue::LongLongInt(value) => writer.write_i64::<BigEndian>(*value)?,
            FieldValue::Float(value) => writer.write_f32::<BigEndian>(*value)?,
            FieldValue::Double(value) => writer.write_f64::<BigEndian>(*value)?,
            FieldValue::Decimal { scale, value } => {
                writer.write_u8(*scale)?;
                writer.write_u32::<BigEndian>(*value)?;
            }
            FieldValue::LongString(bytes) | FieldValue::ByteArray(bytes) => {
                write_long_str(writer, bytes)?
            }
            FieldValue::FieldArray(values) => {
                let size = values.iter().map(Encoder::encoded_size).sum::<u32>();
                writer.write_u32::<BigEndian>(size)?;
                for value in values {
                    value.encode(writer)?;
                }
            }
            FieldValue::Timestamp(value) => writer.write_u64::<BigEndian>(*value)?,
            FieldValue::FieldTable(table) => table.encode(writer)?,
            FieldValue::Void => {}
        }
        Ok(())
    }
}
