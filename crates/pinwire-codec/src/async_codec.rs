//! `tokio_util::codec` adapter for host-side async streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::command::Origin;
use crate::error::CodecError;
use crate::message::{decode_message_from, encode_message, Message, MessageConfig};

/// Message codec for `Framed` / `FramedRead` / `FramedWrite`.
#[derive(Debug, Clone, Default)]
pub struct FirmataCodec {
    config: MessageConfig,
}

impl FirmataCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MessageConfig) -> Self {
        Self { config }
    }

    /// Codec for the host end of the link, decoding what the board sends.
    pub fn host() -> Self {
        Self::with_config(MessageConfig {
            origin: Origin::Board,
            ..MessageConfig::default()
        })
    }
}

impl Decoder for FirmataCodec {
    type Item = Message;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        decode_message_from(src, self.config.max_sysex_size, self.config.origin)
    }
}

impl Encoder<Message> for FirmataCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode_message(&item, dst)
    }
}

impl Encoder<&Message> for FirmataCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), CodecError> {
        encode_message(item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_read_yields_messages() {
        let wire: &[u8] = &[0xF9, 0xF0, 0x6B, 0xF7];
        let mut framed = FramedRead::new(wire, FirmataCodec::new());

        let first = framed.next().await.unwrap().unwrap();
        assert_eq!(first, Message::report_version());
        let second = framed.next().await.unwrap().unwrap();
        assert_eq!(second, Message::sysex(0x6B, Vec::new()));
        assert!(framed.next().await.is_none());
    }

    #[tokio::test]
    async fn host_codec_reads_version_reply() {
        let wire: &[u8] = &[0xF9, 0x02, 0x06];
        let mut framed = FramedRead::new(wire, FirmataCodec::host());
        let reply = framed.next().await.unwrap().unwrap();
        assert_eq!(reply, Message::protocol_version());
    }

    #[tokio::test]
    async fn framed_write_encodes_messages() {
        let mut framed = FramedWrite::new(Vec::new(), FirmataCodec::new());
        framed.send(Message::set_pin_mode(5, 3)).await.unwrap();
        assert_eq!(framed.get_ref().as_slice(), &[0xF4, 0x05, 0x03]);
    }
}
