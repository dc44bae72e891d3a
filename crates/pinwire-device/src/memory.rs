//! In-memory register-file driver table.
//!
//! Each device class is a named block of registers; every opened unit gets
//! its own copy. Used by the simulated board and by tests.

use std::collections::HashMap;

use tracing::debug;

use crate::driver::{DeviceDriverTable, DriverEvent};
use crate::handle::DeviceHandle;
use crate::header::DeviceAction;
use crate::status::StatusCode;

/// Control register: fill every register with `data[0]`.
pub const CONTROL_FILL: u16 = 0;
/// Control register: report the first `data[0]` registers as an
/// unsolicited read on the next timer dispatch.
pub const CONTROL_NOTIFY: u16 = 1;

#[derive(Debug, Clone)]
struct DeviceClass {
    name: String,
    initial: Vec<u8>,
}

#[derive(Debug, Clone)]
struct Unit {
    registers: Vec<u8>,
    writes: u32,
}

#[derive(Debug, Default)]
pub struct RegisterFileTable {
    classes: Vec<DeviceClass>,
    units: HashMap<DeviceHandle, Unit>,
    pending: Vec<DriverEvent>,
}

impl RegisterFileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device class whose units start with `initial` registers.
    pub fn with_class(mut self, name: impl Into<String>, initial: Vec<u8>) -> Self {
        self.add_class(name, initial);
        self
    }

    /// Add a device class and return its class index.
    ///
    /// Classes past 128 are unreachable since class indices are 7-bit.
    pub fn add_class(&mut self, name: impl Into<String>, initial: Vec<u8>) -> usize {
        self.classes.push(DeviceClass {
            name: name.into(),
            initial,
        });
        self.classes.len() - 1
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn open_units(&self) -> usize {
        self.units.len()
    }

    fn unit_mut(&mut self, handle: DeviceHandle) -> Option<&mut Unit> {
        self.units.get_mut(&handle)
    }
}

/// Split `"name:unit"` into the class name and unit number. The unit may be
/// decimal or `0x` hex and defaults to 0 when absent.
pub fn parse_identity(identity: &str) -> Option<(&str, u8)> {
    let (name, unit) = match identity.rsplit_once(':') {
        Some((name, unit)) => (name, unit.trim()),
        None => (identity, "0"),
    };
    let unit = match unit.strip_prefix("0x").or_else(|| unit.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok()?,
        None => unit.parse::<u8>().ok()?,
    };
    (unit < 0x80 && !name.is_empty()).then_some((name, unit))
}

fn span(len: usize, register: u16, count: usize) -> Option<std::ops::Range<usize>> {
    let start = usize::from(register);
    if start >= len {
        return None;
    }
    Some(start..len.min(start + count))
}

impl DeviceDriverTable for RegisterFileTable {
    fn open(&mut self, identity: &str, _flags: u8) -> StatusCode {
        let Some((name, unit)) = parse_identity(identity) else {
            return StatusCode::INVALID_ARGUMENT;
        };
        let Some(class) = self.classes.iter().position(|c| c.name == name) else {
            return StatusCode::NO_DEVICE;
        };
        let Ok(class_index) = u8::try_from(class) else {
            return StatusCode::NO_DEVICE;
        };
        if class_index >= 0x80 {
            return StatusCode::NO_DEVICE;
        }

        let handle = DeviceHandle::new(class_index, unit);
        if self.units.contains_key(&handle) {
            return StatusCode::BUSY;
        }
        self.units.insert(
            handle,
            Unit {
                registers: self.classes[class].initial.clone(),
                writes: 0,
            },
        );
        debug!(%handle, identity, "register file unit opened");
        StatusCode(i32::from(handle.raw()))
    }

    fn status(&mut self, handle: DeviceHandle, register: u16, buf: &mut [u8]) -> StatusCode {
        let Some(unit) = self.units.get(&handle) else {
            return StatusCode::BAD_HANDLE;
        };
        // class, unit, register count (2×7 bits), write count (low 7 bits)
        let len = unit.registers.len();
        let block = [
            handle.class(),
            handle.unit(),
            (len & 0x7F) as u8,
            ((len >> 7) & 0x7F) as u8,
            (unit.writes & 0x7F) as u8,
        ];
        let Some(range) = span(block.len(), register, buf.len()) else {
            return StatusCode::INVALID_ARGUMENT;
        };
        let n = range.len();
        buf[..n].copy_from_slice(&block[range]);
        StatusCode::bytes(n)
    }

    fn control(&mut self, handle: DeviceHandle, register: u16, data: &[u8]) -> StatusCode {
        let Some(unit) = self.unit_mut(handle) else {
            return StatusCode::BAD_HANDLE;
        };
        match register {
            CONTROL_FILL => {
                let Some(&value) = data.first() else {
                    return StatusCode::INVALID_ARGUMENT;
                };
                unit.registers.fill(value);
                StatusCode::OK
            }
            CONTROL_NOTIFY => {
                let count = data
                    .first()
                    .map_or(unit.registers.len(), |&n| usize::from(n))
                    .min(unit.registers.len());
                let snapshot = unit.registers[..count].to_vec();
                self.pending.push(DriverEvent {
                    handle,
                    action: DeviceAction::Read,
                    register: 0,
                    status: StatusCode::bytes(snapshot.len()),
                    data: snapshot,
                });
                StatusCode::OK
            }
            _ => StatusCode::NOT_SUPPORTED,
        }
    }

    fn read(&mut self, handle: DeviceHandle, register: u16, buf: &mut [u8]) -> StatusCode {
        let Some(unit) = self.units.get(&handle) else {
            return StatusCode::BAD_HANDLE;
        };
        let Some(range) = span(unit.registers.len(), register, buf.len()) else {
            return StatusCode::INVALID_ARGUMENT;
        };
        let n = range.len();
        buf[..n].copy_from_slice(&unit.registers[range]);
        StatusCode::bytes(n)
    }

    fn write(&mut self, handle: DeviceHandle, register: u16, data: &[u8]) -> StatusCode {
        let Some(unit) = self.unit_mut(handle) else {
            return StatusCode::BAD_HANDLE;
        };
        let Some(range) = span(unit.registers.len(), register, data.len()) else {
            return StatusCode::INVALID_ARGUMENT;
        };
        let n = range.len();
        unit.registers[range].copy_from_slice(&data[..n]);
        unit.writes = unit.writes.wrapping_add(1);
        StatusCode::bytes(n)
    }

    fn close(&mut self, handle: DeviceHandle) -> StatusCode {
        self.pending.retain(|event| event.handle != handle);
        match self.units.remove(&handle) {
            Some(_) => {
                debug!(%handle, "register file unit closed");
                StatusCode::OK
            }
            None => StatusCode::BAD_HANDLE,
        }
    }

    fn dispatch_timers(&mut self, events: &mut Vec<DriverEvent>) {
        events.append(&mut self.pending);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RegisterFileTable {
        RegisterFileTable::new()
            .with_class("eeprom", vec![0u8; 16])
            .with_class("i2c-temp-sensor", vec![0x01, 0x90, 0x00, 0x00])
    }

    #[test]
    fn identity_parsing() {
        assert_eq!(parse_identity("i2c-temp-sensor:0x48"), Some(("i2c-temp-sensor", 0x48)));
        assert_eq!(parse_identity("eeprom:3"), Some(("eeprom", 3)));
        assert_eq!(parse_identity("eeprom"), Some(("eeprom", 0)));
        assert_eq!(parse_identity("eeprom:0x80"), None);
        assert_eq!(parse_identity(":1"), None);
    }

    #[test]
    fn open_read_write_close() {
        let mut drivers = table();
        let status = drivers.open("i2c-temp-sensor:0x48", 0);
        let handle = DeviceHandle::from_raw(status.value() as u16).unwrap();
        assert_eq!((handle.class(), handle.unit()), (1, 0x48));

        let mut buf = [0u8; 2];
        assert_eq!(drivers.read(handle, 0, &mut buf), StatusCode(2));
        assert_eq!(buf, [0x01, 0x90]);

        assert_eq!(drivers.write(handle, 2, &[0xAB, 0xCD, 0xEF]), StatusCode(2));
        let mut buf = [0u8; 4];
        assert_eq!(drivers.read(handle, 0, &mut buf), StatusCode(4));
        assert_eq!(buf, [0x01, 0x90, 0xAB, 0xCD]);

        assert_eq!(drivers.close(handle), StatusCode::OK);
        assert_eq!(drivers.read(handle, 0, &mut buf), StatusCode::BAD_HANDLE);
    }

    #[test]
    fn open_errors() {
        let mut drivers = table();
        assert_eq!(drivers.open("thermocouple:1", 0), StatusCode::NO_DEVICE);
        assert_eq!(drivers.open("eeprom:zz", 0), StatusCode::INVALID_ARGUMENT);
        assert!(!drivers.open("eeprom:1", 0).is_error());
        assert_eq!(drivers.open("eeprom:1", 0), StatusCode::BUSY);
    }

    #[test]
    fn status_reports_geometry() {
        let mut drivers = table();
        let handle = DeviceHandle::from_raw(drivers.open("eeprom:2", 0).value() as u16).unwrap();
        drivers.write(handle, 0, &[1]);

        let mut buf = [0u8; 8];
        assert_eq!(drivers.status(handle, 0, &mut buf), StatusCode(5));
        assert_eq!(&buf[..5], &[0, 2, 16, 0, 1]);
    }

    #[test]
    fn notify_control_emits_event_on_dispatch() {
        let mut drivers = table();
        let handle = DeviceHandle::from_raw(drivers.open("eeprom:0", 0).value() as u16).unwrap();
        assert_eq!(drivers.control(handle, CONTROL_FILL, &[7]), StatusCode::OK);
        assert_eq!(drivers.control(handle, CONTROL_NOTIFY, &[3]), StatusCode::OK);
        assert_eq!(drivers.control(handle, 9, &[]), StatusCode::NOT_SUPPORTED);

        let mut events = Vec::new();
        drivers.dispatch_timers(&mut events);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, vec![7, 7, 7]);
        assert_eq!(events[0].status, StatusCode(3));

        drivers.dispatch_timers(&mut events);
        assert_eq!(events.len(), 1);
    }
}
