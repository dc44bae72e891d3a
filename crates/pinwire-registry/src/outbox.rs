use bytes::Bytes;
use pinwire_codec::Message;
use tracing::warn;

/// Messages queued for the host during one dispatch.
///
/// The engine drains the outbox after every message and every report pass.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Message>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue any message.
    pub fn message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Queue a sysex message.
    pub fn sysex(&mut self, command: u8, args: impl Into<Bytes>) {
        self.messages.push(Message::sysex(command, args));
    }

    /// Queue a free-text diagnostic (STRING_DATA) and log it.
    pub fn diagnostic(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        warn!(diagnostic = text, "reporting diagnostic to host");
        self.messages.push(Message::string(text));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Text of every queued diagnostic, in order.
    pub fn diagnostics(&self) -> Vec<String> {
        self.messages.iter().filter_map(Message::as_string).collect()
    }

    /// Remove and return everything queued.
    pub fn take(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}
