//! A simulated board for exercising the engine off-target.
//!
//! Two demonstration features stand in for real peripheral handlers:
//! [`DigitalOutput`] drives output pins from DIGITAL_MESSAGE and
//! SET_DIGITAL_PIN_VALUE, [`AnalogInput`] reports a synthetic waveform on
//! pins switched to analog mode. A [`RegisterFileTable`] with an
//! `i2c-temp-sensor` and an `eeprom` class backs the device sessions.

use pinwire_codec::command::{ANALOG_MESSAGE, DIGITAL_MESSAGE, REPORT_ANALOG, SET_DIGITAL_PIN_VALUE};
use pinwire_codec::{decode14, encode14, Message};
use pinwire_device::{DeviceMultiplexer, RegisterFileTable};
use pinwire_engine::EngineConfig;
use pinwire_registry::{
    CapabilityRegistry, CapabilityWriter, FeatureContext, FeatureHandler, PinMode,
    SystemVariable,
};
use tracing::debug;

/// System variable holding the number of analog reports sent since reset.
pub const SYSVAR_ANALOG_REPORTS: u16 = 100;

/// Register contents of a freshly opened temperature sensor: 25.0 °C in
/// 1/16 degree steps, big-endian, followed by the config register.
pub const TEMP_SENSOR_REGISTERS: [u8; 4] = [0x01, 0x90, 0x00, 0x00];

/// Size of a simulated EEPROM unit.
pub const EEPROM_SIZE: usize = 64;

/// Digital output pins.
#[derive(Debug, Default)]
pub struct DigitalOutput;

impl DigitalOutput {
    fn write_port(&self, port: u8, value: u16, ctx: &mut FeatureContext<'_>) {
        let first = port.saturating_mul(8);
        for bit in 0..8u8 {
            let pin = first.saturating_add(bit);
            if ctx.pins().mode(pin) == Some(PinMode::Output) {
                let level = u32::from((value >> bit) & 1);
                if ctx.pins_mut().set_state(pin, level).is_err() {
                    debug!(pin, "output pin outside the pin table");
                }
            }
        }
        debug!(port, value, "digital port written");
    }
}

impl FeatureHandler for DigitalOutput {
    fn name(&self) -> &str {
        "digital-output"
    }

    fn handle_pin_mode(&mut self, pin: u8, mode: PinMode, ctx: &mut FeatureContext<'_>) -> bool {
        mode == PinMode::Output
            && matches!(ctx.pins().mode(pin), Some(current) if current != PinMode::Ignore)
    }

    fn handle_capability(&mut self, _pin: u8, caps: &mut CapabilityWriter<'_>) {
        caps.offer(PinMode::Output, 1);
    }

    fn handle_sysex(&mut self, _command: u8, _args: &[u8], _ctx: &mut FeatureContext<'_>) -> bool {
        false
    }

    fn handle_message(&mut self, command: u8, data: &[u8], ctx: &mut FeatureContext<'_>) -> bool {
        if command == SET_DIGITAL_PIN_VALUE {
            if let [pin, value] = *data {
                if ctx.pins().mode(pin) == Some(PinMode::Output)
                    && ctx.pins_mut().set_state(pin, u32::from(value & 1)).is_err()
                {
                    debug!(pin, "output pin outside the pin table");
                }
            }
            return true;
        }
        if command & 0xF0 == DIGITAL_MESSAGE {
            if let Ok(value) = decode14(data) {
                self.write_port(command & 0x0F, value, ctx);
            }
            return true;
        }
        false
    }

    fn reset(&mut self, _ctx: &mut FeatureContext<'_>) {}
}

/// Analog inputs on a contiguous pin range, reporting a synthetic sawtooth.
#[derive(Debug)]
pub struct AnalogInput {
    first_pin: u8,
    count: u8,
    reporting: Vec<bool>,
    tick: u32,
    reports: u32,
}

impl AnalogInput {
    /// `count` analog channels starting at `first_pin`; channel `n` is pin
    /// `first_pin + n`.
    pub fn new(first_pin: u8, count: u8) -> Self {
        let count = count.min(16);
        Self {
            first_pin,
            count,
            reporting: vec![false; usize::from(count)],
            tick: 0,
            reports: 0,
        }
    }

    fn channel(&self, pin: u8) -> Option<u8> {
        let channel = pin.checked_sub(self.first_pin)?;
        (channel < self.count).then_some(channel)
    }

    /// 10-bit sample for `channel` at the current tick.
    pub fn sample(&self, channel: u8) -> u16 {
        ((self.tick.wrapping_mul(37) + u32::from(channel) * 101) % 1024) as u16
    }

    fn send(&mut self, channel: u8, ctx: &mut FeatureContext<'_>) {
        let value = self.sample(channel);
        ctx.outbox()
            .message(Message::fixed(ANALOG_MESSAGE | channel, encode14(value).to_vec()));
        self.reports = self.reports.wrapping_add(1);
    }
}

impl FeatureHandler for AnalogInput {
    fn name(&self) -> &str {
        "analog-input"
    }

    fn handle_pin_mode(&mut self, pin: u8, mode: PinMode, _ctx: &mut FeatureContext<'_>) -> bool {
        let Some(channel) = self.channel(pin) else {
            return false;
        };
        let enabled = mode == PinMode::Analog;
        self.reporting[usize::from(channel)] = enabled;
        enabled
    }

    fn handle_capability(&mut self, pin: u8, caps: &mut CapabilityWriter<'_>) {
        if self.channel(pin).is_some() {
            caps.offer(PinMode::Analog, 10);
        }
    }

    fn handle_sysex(&mut self, _command: u8, _args: &[u8], _ctx: &mut FeatureContext<'_>) -> bool {
        false
    }

    fn handle_message(&mut self, command: u8, data: &[u8], ctx: &mut FeatureContext<'_>) -> bool {
        if command & 0xF0 != REPORT_ANALOG {
            return false;
        }
        let channel = command & 0x0F;
        if channel < self.count {
            let enabled = data.first().is_some_and(|&v| v != 0);
            self.reporting[usize::from(channel)] = enabled;
            if enabled {
                self.send(channel, ctx);
            }
        }
        true
    }

    fn handle_system_variable(
        &mut self,
        query: &mut SystemVariable,
        _ctx: &mut FeatureContext<'_>,
    ) -> bool {
        if query.id != SYSVAR_ANALOG_REPORTS || query.write {
            return false;
        }
        query.answer_int(i32::try_from(self.reports).unwrap_or(i32::MAX));
        true
    }

    fn reset(&mut self, _ctx: &mut FeatureContext<'_>) {
        self.reporting.fill(false);
        self.reports = 0;
    }

    fn report(&mut self, elapsed: bool, ctx: &mut FeatureContext<'_>) {
        if !elapsed {
            return;
        }
        self.tick = self.tick.wrapping_add(1);
        for channel in 0..self.count {
            let pin = self.first_pin.saturating_add(channel);
            if self.reporting[usize::from(channel)] && ctx.pins().mode(pin) == Some(PinMode::Analog)
            {
                self.send(channel, ctx);
            }
        }
    }
}

/// Driver table for the simulated board.
pub fn drivers() -> RegisterFileTable {
    RegisterFileTable::new()
        .with_class("i2c-temp-sensor", TEMP_SENSOR_REGISTERS.to_vec())
        .with_class("eeprom", vec![0xFF; EEPROM_SIZE])
}

/// Registry for the simulated board: digital outputs on every pin, analog
/// inputs on the last six pins, and device sessions.
pub fn board(config: &EngineConfig) -> pinwire_registry::Result<CapabilityRegistry> {
    let mut registry = config.build_registry();
    let analog = config.total_pins.min(6);
    registry.register(DigitalOutput)?;
    registry.register(AnalogInput::new(config.total_pins - analog, analog))?;
    registry.register(DeviceMultiplexer::with_config(drivers(), config.device_config()))?;
    Ok(registry)
}
