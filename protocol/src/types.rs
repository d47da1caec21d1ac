use std::{collections::BTreeMap, fmt};

/// AMQP field table. Keys are kept ordered so encodings are deterministic.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct FieldTable(BTreeMap<String, FieldValue>);

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        FieldTable(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl fmt::Display for FieldTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (key, value)) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum FieldValue {
    Boolean(bool),
    ShortShortInt(i8),
    ShortShortUInt(u8),
    ShortInt(i16),
    ShortUInt(u16),
    LongInt(i32),
    LongUInt(u32),
    LongLongInt(i64),
    Float(f32),
    Double(f64),
    Decimal { scale: u8, value: u32 },
    LongString(Vec<u8>),
    FieldArray(Vec<FieldValue>),
    Timestamp(u64),
    FieldTable(FieldTable),
    ByteArray(Vec<u8>),
    Void,
}

impl FieldValue {
    /// Type octet preceding the value on the wire.
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Boolean(_) => b't',
            FieldValue::ShortShortInt(_) => b'b',
            FieldValue::ShortShortUInt(_) => b'B',
            FieldValue::ShortInt(_) => b's',
            FieldValue::ShortUInt(_) => b'u',
            FieldValue::LongInt(_) => b'I',
            FieldValue::LongUInt(_) => b'i',
            FieldValue::LongLongInt(_) => b'l',
            FieldValue::Float(_) => b'f',
            FieldValue::Double(_) => b'd',
            FieldValue::Decimal { .. } => b'D',
            FieldValue::LongString(_) => b'S',
            FieldValue::FieldArray(_) => b'A',
            FieldValue::Timestamp(_) => b'T',
            FieldValue::FieldTable(_) => b'F',
            FieldValue::ByteArray(_) => b'x',
            FieldValue::Void => b'V',
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::LongString(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&FieldTable> {
        match self {
            FieldValue::FieldTable(table) => Some(table),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(value) => write!(f, "{}", value),
            FieldValue::ShortShortInt(value) => write!(f, "{}", value),
            FieldValue::ShortShortUInt(value) => write!(f, "{}", value),
            FieldValue::ShortInt(value) => write!(f, "{}", value),
            FieldValue::ShortUInt(value) => write!(f, "{}", value),
            FieldValue::LongInt(value) => write!(f, "{}", value),
            FieldValue::LongUInt(value) => write!(f, "{}", value),
            FieldValue::LongLongInt(value) => write!(f, "{}", value),
            FieldValue::Float(value) => write!(f, "{}", value),
            FieldValue::Double(value) => write!(f, "{}", value),
            FieldValue::Decimal { scale, value } => write!(f, "{}e-{}", value, scale),
            FieldValue::LongString(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            FieldValue::FieldArray(values) => {
                write!(f, "[")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            FieldValue::Timestamp(value) => write!(f, "{}", value),
            FieldValue::FieldTable(table) => write!(f, "{}", table),
            FieldValue::ByteArray(bytes) => write!(f, "<{} bytes>", bytes.len()),
            FieldValue::Void => write!(f, "void"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::LongInt(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::LongLongInt(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::LongString(value.as_bytes().to_vec())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::LongString(value.into_bytes())
    }
}

impl From<FieldTable> for FieldValue {
    fn from(value: FieldTable) -> Self {
        FieldValue::FieldTable(value)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{FieldTable, FieldValue};
    use crate::{
        codec::{Decoder, Encoder},
        error::DecodeError,
    };

    #[test]
    fn field_table_nested_encode_decode_test() {
        let capabilities = FieldTable::new()
            .with("authentication_failure_close", true)
            .with("connection.blocked", true);
        let table = FieldTable::new()
            .with("product", "amqp-sampler")
            .with("capabilities", capabilities)
            .with("x-message-ttl", 5000i32)
            .with(
                "hosts",
                FieldValue::FieldArray(vec!["a".into(), FieldValue::Void, FieldValue::ShortUInt(7)]),
            )
            .with("ratio", FieldValue::Double(0.5));

        let mut buffer = vec![];
        table.encode(&mut buffer).unwrap();

        assert_eq!(buffer.len() as u32, table.encoded_size());

        let (remaining, decoded) = FieldTable::decode(&buffer).unwrap();
        assert_eq!(table, decoded);
        assert!(remaining.is_empty());
    }

    #[test]
    fn field_table_long_int_wire_format_test() {
        let table = FieldTable::new().with("x-expires", 60000i32);

        let mut buffer = vec![];
        table.encode(&mut buffer).unwrap();

        let mut expected = vec![0, 0, 0, 15, 9];
        expected.extend_from_slice(b"x-expires");
        expected.push(b'I');
        expected.extend_from_slice(&60000i32.to_be_bytes());

        assert_eq!(expected, buffer);
    }

    #[test]
    fn field_table_incomplete_test() {
        let table = FieldTable::new().with("key", "value");
        let mut buffer = vec![];
        table.encode(&mut buffer).unwrap();

        let truncated = &buffer[..buffer.len() - 2];
        assert!(matches!(
            FieldTable::decode(truncated),
            Err(DecodeError::Incomplete(_))
        ));
    }

    #[test]
    fn field_value_unknown_tag_test() {
        let input = [b'?', 0, 0];
        assert!(matches!(
            FieldValue::decode(&input),
            Err(DecodeError::UnknownFieldType(b'?'))
        ));
    }

    #[test]
    fn field_table_display_test() {
        let table = FieldTable::new()
            .with("x-message-ttl", 5000i32)
            .with("x-expires", 100i32);

        assert_eq!("{x-expires=100, x-message-ttl=5000}", table.to_string());
    }
}
