//! Firmata-style message framing and 7-bit encodings.
//!
//! Every byte after a command byte carries 7 bits. This crate provides:
//! - the message framer (fixed-format messages and sysex bodies)
//! - 14-bit, signed 32-bit and scaled-float packing
//! - base64 opaque blocks for binary parameters
//! - blocking/polling readers and writers over `std::io`
//!
//! No partial reads, no buffer management in user code.

pub mod command;
pub mod error;
pub mod message;
pub mod opaque;
pub mod packing;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

pub use error::{CodecError, Result};
pub use command::Origin;
pub use message::{
    decode_message, decode_message_from, encode_message, Message, MessageConfig,
    DEFAULT_MAX_SYSEX,
};
pub use opaque::{decode_opaque, decoded_len, encode_opaque, opaque_str};
pub use packing::{
    decode14, decode32_signed, decode_scaled_float, decode_string_data, encode14,
    encode32_signed, encode_scaled_float, encode_string_data, put14, MAX_14BIT,
};
pub use reader::MessageReader;
pub use writer::MessageWriter;

#[cfg(feature = "async")]
pub use async_codec::FirmataCodec;
