pub mod codec;
pub mod error;
mod frame;
pub mod method;
pub mod protocol;
pub mod types;

pub use frame::{Frame, FramePayload};
pub use method::{FromMethod, Method, MethodId};
