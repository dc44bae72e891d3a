//! Wire command numbering (Firmata protocol family).
//!
//! Commands at or above 0x80 are fixed-format message types; bytes below 0x80
//! are data. Sysex command ids are 7-bit values carried after `START_SYSEX`.

/// Protocol version announced in `REPORT_VERSION`.
pub const PROTOCOL_VERSION_MAJOR: u8 = 2;
pub const PROTOCOL_VERSION_MINOR: u8 = 6;

// Fixed-format message types. Channel messages carry the pin/port in the low
// nibble of the command byte.
pub const ANALOG_MESSAGE: u8 = 0xE0;
pub const DIGITAL_MESSAGE: u8 = 0x90;
pub const REPORT_ANALOG: u8 = 0xC0;
pub const REPORT_DIGITAL: u8 = 0xD0;

pub const START_SYSEX: u8 = 0xF0;
pub const SET_PIN_MODE: u8 = 0xF4;
pub const SET_DIGITAL_PIN_VALUE: u8 = 0xF5;
pub const END_SYSEX: u8 = 0xF7;
pub const REPORT_VERSION: u8 = 0xF9;
pub const SYSTEM_RESET: u8 = 0xFF;

// Sysex command ids.
pub const DEVICE_QUERY: u8 = 0x30;
pub const DEVICE_RESPONSE: u8 = 0x31;
pub const SYSTEM_VARIABLE: u8 = 0x66;
pub const CAPABILITY_QUERY: u8 = 0x6B;
pub const CAPABILITY_RESPONSE: u8 = 0x6C;
pub const PIN_STATE_QUERY: u8 = 0x6D;
pub const PIN_STATE_RESPONSE: u8 = 0x6E;
pub const EXTENDED_ANALOG: u8 = 0x6F;
pub const STRING_DATA: u8 = 0x71;
pub const REPORT_FIRMWARE: u8 = 0x79;
pub const SAMPLING_INTERVAL: u8 = 0x7A;

/// Terminator after each pin's entries in a capability response.
pub const CAPABILITY_PIN_END: u8 = 0x7F;

/// Whether `byte` starts a message (high bit set).
pub fn is_command(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Number of data bytes following a fixed-format command byte, or `None` for
/// bytes that do not start a fixed-format message.
pub fn fixed_data_len(command: u8) -> Option<usize> {
    match command {
        SYSTEM_RESET => Some(0),
        REPORT_VERSION => Some(0),
        SET_PIN_MODE | SET_DIGITAL_PIN_VALUE => Some(2),
        _ => match command & 0xF0 {
            ANALOG_MESSAGE | DIGITAL_MESSAGE => Some(2),
            REPORT_ANALOG | REPORT_DIGITAL => Some(1),
            _ => None,
        },
    }
}

/// Which end of the link sent a message.
///
/// REPORT_VERSION is a bare query from the host but carries the protocol
/// version from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Origin {
    #[default]
    Host,
    Board,
}

/// [`fixed_data_len`] for a message sent by `origin`.
pub fn fixed_data_len_from(command: u8, origin: Origin) -> Option<usize> {
    match (command, origin) {
        (REPORT_VERSION, Origin::Board) => Some(2),
        _ => fixed_data_len(command),
    }
}

/// Human-readable name for a fixed-format command byte.
pub fn command_name(command: u8) -> &'static str {
    match command {
        START_SYSEX => "START_SYSEX",
        SET_PIN_MODE => "SET_PIN_MODE",
        SET_DIGITAL_PIN_VALUE => "SET_DIGITAL_PIN_VALUE",
        END_SYSEX => "END_SYSEX",
        REPORT_VERSION => "REPORT_VERSION",
        SYSTEM_RESET => "SYSTEM_RESET",
        _ => match command & 0xF0 {
            ANALOG_MESSAGE => "ANALOG_MESSAGE",
            DIGITAL_MESSAGE => "DIGITAL_MESSAGE",
            REPORT_ANALOG => "REPORT_ANALOG",
            REPORT_DIGITAL => "REPORT_DIGITAL",
            _ => "UNKNOWN",
        },
    }
}

/// Human-readable name for a sysex command id.
pub fn sysex_name(command: u8) -> &'static str {
    match command {
        DEVICE_QUERY => "DEVICE_QUERY",
        DEVICE_RESPONSE => "DEVICE_RESPONSE",
        SYSTEM_VARIABLE => "SYSTEM_VARIABLE",
        CAPABILITY_QUERY => "CAPABILITY_QUERY",
        CAPABILITY_RESPONSE => "CAPABILITY_RESPONSE",
        PIN_STATE_QUERY => "PIN_STATE_QUERY",
        PIN_STATE_RESPONSE => "PIN_STATE_RESPONSE",
        EXTENDED_ANALOG => "EXTENDED_ANALOG",
        STRING_DATA => "STRING_DATA",
        REPORT_FIRMWARE => "REPORT_FIRMWARE",
        SAMPLING_INTERVAL => "SAMPLING_INTERVAL",
        _ => "UNKNOWN",
    }
}
