#[derive(Debug)]
pub enum DecodeError {
    Incomplete(usize),
    InvalidFrameEnd(u8),
    UnknownFrameType(u8),
    UnknownFieldType(u8),
    /// The frame was complete but its method arguments ran past the payload.
    MalformedFrame(u16),
    FrameTooLarge { size: u64, max: u32 },
    Utf8Error(std::string::FromUtf8Error),
}

#[derive(Debug)]
pub enum EncodeError {
    Io(std::io::Error),
    ShortStringTooLong(usize),
}

impl From<std::io::Error> for EncodeError {
    fn from(err: std::io::Error) -> Self {
        EncodeError::Io(err)
    }
}

impl From<std::string::FromUtf8Error> for DecodeError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        DecodeError::Utf8Error(err)
    }
}
