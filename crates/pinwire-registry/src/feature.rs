use bytes::{BufMut, BytesMut};

use crate::outbox::Outbox;
use crate::pins::{PinMode, PinTable};
use crate::sysvar::SystemVariable;

/// Shared state a handler may touch during a callback.
///
/// Handlers keep no reference to the registry; everything they need is
/// passed in for the duration of one call.
pub struct FeatureContext<'a> {
    pub pins: &'a mut PinTable,
    pub outbox: &'a mut Outbox,
}

impl<'a> FeatureContext<'a> {
    pub fn new(pins: &'a mut PinTable, outbox: &'a mut Outbox) -> Self {
        Self { pins, outbox }
    }

    pub fn pins(&self) -> &PinTable {
        &*self.pins
    }

    pub fn pins_mut(&mut self) -> &mut PinTable {
        &mut *self.pins
    }

    pub fn outbox(&mut self) -> &mut Outbox {
        &mut *self.outbox
    }

    /// Queue a diagnostic for the host.
    pub fn diagnostic(&mut self, text: impl AsRef<str>) {
        self.outbox.diagnostic(text);
    }
}

/// Collects the (mode, resolution) pairs a handler offers for one pin.
pub struct CapabilityWriter<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> CapabilityWriter<'a> {
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// Advertise `mode` with `resolution` bits.
    pub fn offer(&mut self, mode: PinMode, resolution: u8) {
        self.buf.put_u8(mode.code() & 0x7F);
        self.buf.put_u8(resolution & 0x7F);
    }
}

/// A peripheral feature plugged into the registry.
///
/// Registration order is the tie-break for every dispatch. Pin modes are
/// offered to every handler; sysex commands and system variables stop at
/// the first handler that claims them.
pub trait FeatureHandler {
    /// Name used for logging and for inspecting registration order.
    fn name(&self) -> &str;

    /// React to a mode assignment; return `true` to claim it.
    ///
    /// Every handler sees every assignment, so a handler that owned `pin`
    /// must release it when another mode is set.
    fn handle_pin_mode(&mut self, pin: u8, mode: PinMode, ctx: &mut FeatureContext<'_>) -> bool;

    /// Advertise the modes this handler supports on `pin`.
    fn handle_capability(&mut self, pin: u8, caps: &mut CapabilityWriter<'_>);

    /// Handle a sysex command; return `true` to claim it.
    fn handle_sysex(&mut self, command: u8, args: &[u8], ctx: &mut FeatureContext<'_>) -> bool;

    /// Handle a fixed-format message the engine does not own.
    fn handle_message(&mut self, _command: u8, _data: &[u8], _ctx: &mut FeatureContext<'_>) -> bool {
        false
    }

    /// Answer a system variable query; return `true` when answered.
    fn handle_system_variable(
        &mut self,
        _query: &mut SystemVariable,
        _ctx: &mut FeatureContext<'_>,
    ) -> bool {
        false
    }

    /// Return to the power-on state.
    fn reset(&mut self, ctx: &mut FeatureContext<'_>);

    /// Called on every loop iteration; `elapsed` is set on the reporting
    /// cadence only.
    fn report(&mut self, _elapsed: bool, _ctx: &mut FeatureContext<'_>) {}
}
