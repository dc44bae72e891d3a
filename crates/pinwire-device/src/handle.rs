use std::fmt;

use pinwire_codec::MAX_14BIT;

/// 14-bit device session id: 7-bit device class (high) and 7-bit unit (low).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceHandle(u16);

impl DeviceHandle {
    pub fn new(class: u8, unit: u8) -> Self {
        DeviceHandle((u16::from(class & 0x7F) << 7) | u16::from(unit & 0x7F))
    }

    /// `None` if `raw` does not fit in 14 bits.
    pub fn from_raw(raw: u16) -> Option<Self> {
        (raw <= MAX_14BIT).then_some(DeviceHandle(raw))
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn class(self) -> u8 {
        (self.0 >> 7) as u8
    }

    pub fn unit(self) -> u8 {
        (self.0 & 0x7F) as u8
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class(), self.unit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_class_and_unit() {
        let handle = DeviceHandle::new(3, 0x48);
        assert_eq!(handle.raw(), (3 << 7) | 0x48);
        assert_eq!((handle.class(), handle.unit()), (3, 0x48));
        assert_eq!(handle.to_string(), "3:72");
    }

    #[test]
    fn raw_must_fit_14_bits() {
        assert!(DeviceHandle::from_raw(0x3FFF).is_some());
        assert!(DeviceHandle::from_raw(0x4000).is_none());
    }
}
