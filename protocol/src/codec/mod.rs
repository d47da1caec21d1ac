use std::io::Write;

use crate::error::{DecodeError, EncodeError};

pub mod decoder;
pub mod encoder;

pub use decoder::{read_flags, read_long_str, read_short_str};
pub use encoder::{long_str_size, short_str_size, write_flags, write_long_str, write_short_str};

pub trait Encoder {
    fn encoded_size(&self) -> u32;
    fn encode(&self, writer: &mut impl Write) -> Result<(), EncodeError>;
}

pub trait Decoder
where
    Self: Sized,
{
    fn decode(input: &[u8]) -> Result<(&[u8], Self), DecodeError>;
}
