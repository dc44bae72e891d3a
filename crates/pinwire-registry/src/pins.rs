use std::fmt;

use crate::error::{RegistryError, Result};

/// Largest pin state the wire can carry (three 7-bit bytes).
pub const MAX_PIN_STATE: u32 = (1 << 21) - 1;

/// A pin mode and its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinMode {
    Input,
    Output,
    Analog,
    Pwm,
    Servo,
    Shift,
    I2c,
    OneWire,
    Stepper,
    Encoder,
    Serial,
    PullupInput,
    Spi,
    Sonar,
    Tone,
    Dht,
    Frequency,
    /// Pin excluded from capability reports and mode diagnostics.
    Ignore,
    /// Any other 7-bit code, carried through untouched.
    Unknown(u8),
}

impl PinMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => PinMode::Input,
            0x01 => PinMode::Output,
            0x02 => PinMode::Analog,
            0x03 => PinMode::Pwm,
            0x04 => PinMode::Servo,
            0x05 => PinMode::Shift,
            0x06 => PinMode::I2c,
            0x07 => PinMode::OneWire,
            0x08 => PinMode::Stepper,
            0x09 => PinMode::Encoder,
            0x0A => PinMode::Serial,
            0x0B => PinMode::PullupInput,
            0x0C => PinMode::Spi,
            0x0D => PinMode::Sonar,
            0x0E => PinMode::Tone,
            0x0F => PinMode::Dht,
            0x10 => PinMode::Frequency,
            0x7F => PinMode::Ignore,
            other => PinMode::Unknown(other & 0x7F),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            PinMode::Input => 0x00,
            PinMode::Output => 0x01,
            PinMode::Analog => 0x02,
            PinMode::Pwm => 0x03,
            PinMode::Servo => 0x04,
            PinMode::Shift => 0x05,
            PinMode::I2c => 0x06,
            PinMode::OneWire => 0x07,
            PinMode::Stepper => 0x08,
            PinMode::Encoder => 0x09,
            PinMode::Serial => 0x0A,
            PinMode::PullupInput => 0x0B,
            PinMode::Spi => 0x0C,
            PinMode::Sonar => 0x0D,
            PinMode::Tone => 0x0E,
            PinMode::Dht => 0x0F,
            PinMode::Frequency => 0x10,
            PinMode::Ignore => 0x7F,
            PinMode::Unknown(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PinMode::Input => "input",
            PinMode::Output => "output",
            PinMode::Analog => "analog",
            PinMode::Pwm => "pwm",
            PinMode::Servo => "servo",
            PinMode::Shift => "shift",
            PinMode::I2c => "i2c",
            PinMode::OneWire => "onewire",
            PinMode::Stepper => "stepper",
            PinMode::Encoder => "encoder",
            PinMode::Serial => "serial",
            PinMode::PullupInput => "pullup",
            PinMode::Spi => "spi",
            PinMode::Sonar => "sonar",
            PinMode::Tone => "tone",
            PinMode::Dht => "dht",
            PinMode::Frequency => "frequency",
            PinMode::Ignore => "ignore",
            PinMode::Unknown(_) => "unknown",
        }
    }
}

impl From<u8> for PinMode {
    fn from(code: u8) -> Self {
        PinMode::from_code(code)
    }
}

impl From<PinMode> for u8 {
    fn from(mode: PinMode) -> Self {
        mode.code()
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinMode::Unknown(code) => write!(f, "unknown(0x{code:02x})"),
            other => f.write_str(other.name()),
        }
    }
}

/// One pin's current mode and state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin {
    pub mode: PinMode,
    /// Opaque to the registry; at most 21 bits.
    pub state: u32,
}

/// Current mode/state of every pin plus the modes `reset` restores.
#[derive(Debug, Clone)]
pub struct PinTable {
    pins: Vec<Pin>,
    defaults: Vec<PinMode>,
}

impl PinTable {
    /// `total` pins, all defaulting to `mode`.
    pub fn new(total: u8, mode: PinMode) -> Self {
        Self::with_defaults(vec![mode; usize::from(total)])
    }

    /// One pin per entry, starting in (and resetting to) the given mode.
    ///
    /// Entries past 128 are ignored since pin numbers are 7-bit.
    pub fn with_defaults(mut defaults: Vec<PinMode>) -> Self {
        defaults.truncate(128);
        let pins = defaults
            .iter()
            .map(|&mode| Pin { mode, state: 0 })
            .collect();
        Self { pins, defaults }
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn get(&self, pin: u8) -> Option<&Pin> {
        self.pins.get(usize::from(pin))
    }

    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.get(pin).map(|p| p.mode)
    }

    pub fn state(&self, pin: u8) -> Option<u32> {
        self.get(pin).map(|p| p.state)
    }

    /// Record a claimed mode change; the state is cleared.
    pub fn set_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        let total = self.pins.len();
        let entry = self
            .pins
            .get_mut(usize::from(pin))
            .ok_or(RegistryError::PinOutOfRange { pin, total })?;
        entry.mode = mode;
        entry.state = 0;
        Ok(())
    }

    /// Store a pin state, truncated to 21 bits.
    pub fn set_state(&mut self, pin: u8, state: u32) -> Result<()> {
        let total = self.pins.len();
        let entry = self
            .pins
            .get_mut(usize::from(pin))
            .ok_or(RegistryError::PinOutOfRange { pin, total })?;
        entry.state = state & MAX_PIN_STATE;
        Ok(())
    }

    /// Change the mode a pin returns to on reset, and apply it now.
    pub fn set_default_mode(&mut self, pin: u8, mode: PinMode) -> Result<()> {
        self.set_mode(pin, mode)?;
        self.defaults[usize::from(pin)] = mode;
        Ok(())
    }

    /// Restore every pin to its default mode with a cleared state.
    pub fn reset(&mut self) {
        for (pin, &mode) in self.pins.iter_mut().zip(&self.defaults) {
            pin.mode = mode;
            pin.state = 0;
        }
    }

    /// Iterate `(pin number, pin)`.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Pin)> {
        // at most 128 entries, so the index fits in u8
        self.pins.iter().enumerate().map(|(i, p)| (i as u8, p))
    }
}

/// Split a pin state into the fewest 7-bit bytes that carry it (1 to 3).
pub fn encode_pin_state(state: u32) -> Vec<u8> {
    let state = state & MAX_PIN_STATE;
    let mut out = vec![(state & 0x7F) as u8];
    if state >= 1 << 7 {
        out.push(((state >> 7) & 0x7F) as u8);
    }
    if state >= 1 << 14 {
        out.push(((state >> 14) & 0x7F) as u8);
    }
    out
}
