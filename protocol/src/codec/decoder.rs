use byteorder::ByteOrder;

use super::Decoder;
use crate::{
    error::DecodeError,
    types::{FieldTable, FieldValue},
};

impl Decoder for u8 {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        read_u8(input)
    }
}

impl Decoder for u16 {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        read_u16(input)
    }
}

impl Decoder for u32 {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        read_u32(input)
    }
}

impl Decoder for u64 {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        read_u64(input)
    }
}

impl Decoder for FieldTable {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, len) = read_u32(input)?;
        let len = len as usize;
        check_len(input, len)?;

        let (mut entries, remaining) = input.split_at(len);
        let mut table = FieldTable::new();
        while !entries.is_empty() {
            let (rest, key) = read_short_str(entries)?;
            let (rest, value) = FieldValue::decode(rest)?;
            table.insert(key, value);
            entries = rest;
        }

        Ok((remaining, table))
    }
}

impl Decoder for FieldValue {
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError> {
        let (input, tag) = read_u8(input)?;

        match tag {
            b't' => read_u8(input).map(|(i, v)| (i, FieldValue::Boolean(v != 0))),
            b'b' => read_u8(input).map(|(i, v)| (i, FieldValue::ShortShortInt(v as i8))),
            b'B' => read_u8(input).map(|(i, v)| (i, FieldValue::ShortShortUInt(v))),
            b's' => read_i16(input).map(|(i, v)| (i, FieldValue::ShortInt(v))),
            b'u' => read_u16(input).map(|(i, v)| (i, FieldValue::ShortUInt(v))),
            b'I' => read_i32(input).map(|(i, v)| (i, FieldValue::LongInt(v))),
            b'i' => read_u32(input).map(|(i, v)| (i, FieldValue::LongUInt(v))),
            b'l' => read_i64(input).map(|(i, v)| (i, FieldValue::LongLongInt(v))),
            b'f' => read_f32(input).map(|(i, v)| (i, FieldValue::Float(v))),
            b'd' => read_f64(input).map(|(i, v)| (i, FieldValue::Double(v))),
            b'D' => {
                let (input, scale) = read_u8(input)?;
                let (input, value) = read_u32(input)?;
                Ok((input, FieldValue::Decimal { scale, value }))
            }
            b'S' => read_long_str(input).map(|(i, v)| (i, FieldValue::LongString(v))),
            b'x' => read_long_str(input).map(|(i, v)| (i, FieldValue::ByteArray(v))),
            b'A' => {
                let (input, len) = read_u32(input)?;
                let len = len as usize;
                check_len(input, len)?;

                let (mut items, remaining) = input.split_at(len);
                let mut values = Vec::new();
                while !items.is_empty() {
                    let (rest, value) = FieldValue::decode(items)?;
                    values.push(value);
                    items = rest;
                }
                Ok((remaining, FieldValue::FieldArray(values)))
            }
            b'T' => read_u64(input).map(|(i, v)| (i, FieldValue::Timestamp(v))),
            b'F' => FieldTable::decode(input).map(|(i, v)| (i, FieldValue::FieldTable(v))),
            b'V' => Ok((input, FieldValue::Void)),
            n => Err(DecodeError::UnknownFieldType(n)),
        }
    }
}

pub fn read_short_str(input: &[u8]) -> Result<(&[u8], String), DecodeError> {
    let (input, len) = read_u8(input)?;
    let len = len as usize;
    check_len(input, len)?;

    let (bytes, input) = input.split_at(len);
    let string = String::from_utf8(bytes.to_vec())?;
    Ok((input, string))
}

pub fn read_long_str(input: &[u8]) -> Result<(&[u8], Vec<u8>), DecodeError> {
    let (input, len) = read_u32(input)?;
    let len = len as usize;
    check_len(input, len)?;

    let (bytes, input) = input.split_at(len);
    Ok((input, bytes.to_vec()))
}

/// Unpacks one octet of bit arguments, first flag in the lowest bit.
pub fn read_flags(input: &[u8]) -> Result<(&[u8], [bool; 8]), DecodeError> {
    let (input, octet) = read_u8(input)?;
    let mut flags = [false; 8];
    for (bit, flag) in flags.iter_mut().enumerate() {
        *flag = octet & (1 << bit) != 0;
    }
    Ok((input, flags))
}

pub fn check_len(input: &[u8], size: usize) -> Result<(), DecodeError> {
    if input.len() < size {
        return Err(DecodeError::Incomplete(size));
    }
    Ok(())
}

macro_rules! reader {
    ( $fn:ident, $size:expr, $ret:ty) => {
        #[allow(unused)]
        pub fn $fn(input: &[u8]) -> Result<(&[u8], $ret), crate::error::DecodeError> {
            check_len(input, $size)?;
            let x = byteorder::BigEndian::$fn(input);
            Ok((&input[$size..], x))
        }
    };
}

pub fn read_u8(input: &[u8]) -> Result<(&[u8], u8), DecodeError> {
    check_len(input, 1)?;
    Ok((&input[1..], input[0]))
}

reader!(read_i16, 2, i16);
reader!(read_u16, 2, u16);
reader!(read_i32, 4, i32);
reader!(read_u32, 4, u32);
reader!(read_i64, 8, i64);
reader!(read_u64, 8, u64);
reader!(read_f32, 4, f32);
reader!(read_f64, 8, f64);
