use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use pinwire_codec::command::{
    command_name, sysex_name, REPORT_FIRMWARE, REPORT_VERSION, SAMPLING_INTERVAL, SET_PIN_MODE,
    SYSTEM_RESET,
};
use pinwire_codec::{
    decode14, encode_string_data, CodecError, Message, MessageConfig, MessageReader,
    MessageWriter, Origin,
};
use pinwire_registry::{CapabilityRegistry, PinMode};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::timer::ReportTimer;

/// The board-side protocol loop.
///
/// Reads host messages from `R`, dispatches each to completion through the
/// registry and writes whatever the registry queued to `W`. Everything runs
/// on the caller's thread; nothing here blocks longer than one read on `R`.
pub struct Engine<R, W> {
    registry: CapabilityRegistry,
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    config: EngineConfig,
    timer: ReportTimer,
}

impl<R: Read, W: Write> Engine<R, W> {
    /// Build the engine, reset every handler once and announce the protocol
    /// version and firmware to the host.
    pub fn new(
        reader: R,
        writer: W,
        registry: CapabilityRegistry,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let reader = MessageReader::with_config(
            reader,
            MessageConfig {
                max_sysex_size: config.max_sysex_size,
                origin: Origin::Host,
            },
        );
        let writer = MessageWriter::with_config(
            writer,
            MessageConfig {
                max_sysex_size: config.max_response_size,
                origin: Origin::Board,
            },
        );
        let timer = ReportTimer::new(config.sampling_interval(), Instant::now());

        let mut engine = Self {
            registry,
            reader,
            writer,
            config,
            timer,
        };

        engine.registry.reset();
        engine.registry.outbox_mut().message(Message::protocol_version());
        engine.queue_firmware();
        engine.flush()?;

        info!(
            firmware = %engine.config.firmware_name,
            major = engine.config.firmware_major,
            minor = engine.config.firmware_minor,
            features = ?engine.registry.feature_names(),
            "engine started"
        );
        Ok(engine)
    }

    /// One loop iteration at the current time. See [`Engine::poll_at`].
    pub fn poll(&mut self) -> Result<usize> {
        self.poll_at(Instant::now())
    }

    /// One loop iteration: dispatch the messages available without waiting,
    /// run the per-loop report and write queued output.
    ///
    /// Malformed input is logged and dropped. Returns the number of messages
    /// dispatched; a closed or failed stream is returned as an error after
    /// pending output has been written.
    pub fn poll_at(&mut self, now: Instant) -> Result<usize> {
        let mut dispatched = 0;
        let mut failure = None;

        while dispatched < self.config.max_messages_per_poll {
            match self.reader.poll_message() {
                Ok(Some(message)) => {
                    self.dispatch(message);
                    dispatched += 1;
                }
                Ok(None) => break,
                Err(err) if err.is_recoverable() => {
                    warn!(error = %err, "dropping malformed input");
                }
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let elapsed = self.timer.check(now);
        self.registry.report(elapsed);
        self.flush()?;

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(dispatched),
        }
    }

    /// Poll until `running` is cleared or the host disconnects.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            match self.poll() {
                Ok(_) => {}
                Err(err) if err.is_disconnect() => {
                    info!("host disconnected");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
        info!("engine stopped");
        Ok(())
    }

    /// Dispatch one decoded message to completion.
    pub fn dispatch(&mut self, message: Message) {
        match message {
            Message::Fixed { command, data } => {
                debug!(command = command_name(command), len = data.len(), "message");
                match command {
                    SET_PIN_MODE => match data[..] {
                        [pin, mode] => {
                            self.registry.on_set_pin_mode(pin, PinMode::from_code(mode));
                        }
                        _ => warn!(len = data.len(), "malformed SET_PIN_MODE"),
                    },
                    REPORT_VERSION => {
                        self.registry.outbox_mut().message(Message::protocol_version());
                    }
                    SYSTEM_RESET => self.reset(),
                    _ => {
                        self.registry.on_message(command, &data);
                    }
                }
            }
            Message::Sysex { command, args } => {
                debug!(command = sysex_name(command), len = args.len(), "sysex");
                match command {
                    REPORT_FIRMWARE => self.queue_firmware(),
                    SAMPLING_INTERVAL => self.set_sampling_interval(&args),
                    _ => {
                        self.registry.on_sysex(command, &args);
                    }
                }
            }
        }
    }

    /// Protocol reset: pins return to their defaults and every handler is
    /// reset in registration order.
    pub fn reset(&mut self) {
        info!("system reset");
        self.registry.reset();
    }

    fn queue_firmware(&mut self) {
        let mut args = BytesMut::with_capacity(2 + self.config.firmware_name.len() * 2);
        args.extend_from_slice(&[
            self.config.firmware_major & 0x7F,
            self.config.firmware_minor & 0x7F,
        ]);
        encode_string_data(&self.config.firmware_name, &mut args);
        self.registry
            .outbox_mut()
            .sysex(REPORT_FIRMWARE, args.freeze());
    }

    fn set_sampling_interval(&mut self, args: &[u8]) {
        let Ok(millis) = decode14(args) else {
            self.registry
                .outbox_mut()
                .diagnostic("Not enough data in SAMPLING_INTERVAL message");
            return;
        };
        let interval = self
            .timer
            .set_interval(Duration::from_millis(u64::from(millis)));
        debug!(interval_ms = interval.as_millis() as u64, "sampling interval changed");
    }

    /// Write everything the registry queued. A response too large for the
    /// outbound limit is replaced by a STRING_DATA diagnostic naming it.
    fn flush(&mut self) -> Result<()> {
        for message in self.registry.take_outbound() {
            match self.writer.write_message(&message) {
                Ok(()) => {}
                Err(CodecError::MessageTooLarge { size, max }) => {
                    let command = message.command();
                    warn!(command = sysex_name(command), size, max, "dropping oversized response");
                    self.write_diagnostic(&format!(
                        "Response too large: 0x{command:02x} (len: {size})"
                    ))?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn write_diagnostic(&mut self, text: &str) -> Result<()> {
        match self.writer.write_message(&Message::string(text)) {
            Ok(()) => Ok(()),
            Err(CodecError::MessageTooLarge { .. }) => {
                debug!(text, "diagnostic exceeds the outbound limit");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CapabilityRegistry {
        &mut self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sampling_interval(&self) -> Duration {
        self.timer.interval()
    }

    pub fn reader_mut(&mut self) -> &mut R {
        self.reader.get_mut()
    }

    pub fn writer(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn writer_mut(&mut self) -> &mut W {
        self.writer.get_mut()
    }

    /// Tear the engine down, returning the streams.
    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}
