use crate::handle::DeviceHandle;
use crate::header::DeviceAction;
use crate::status::StatusCode;

/// An unsolicited completion a driver reports from `dispatch_timers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverEvent {
    pub handle: DeviceHandle,
    pub action: DeviceAction,
    pub register: u16,
    pub status: StatusCode,
    pub data: Vec<u8>,
}

/// The external table of device drivers the multiplexer dispatches to.
///
/// Every call must return without waiting on hardware; longer work is
/// started in a call and finished from `dispatch_timers`.
pub trait DeviceDriverTable {
    /// Open the unit named by `identity`; a non-negative status is the new
    /// 14-bit handle.
    fn open(&mut self, identity: &str, flags: u8) -> StatusCode;

    /// Non-mutating introspection; fills `buf` and returns the bytes valid.
    fn status(&mut self, handle: DeviceHandle, register: u16, buf: &mut [u8]) -> StatusCode;

    /// Driver-specific side-effecting operation.
    fn control(&mut self, handle: DeviceHandle, register: u16, data: &[u8]) -> StatusCode;

    /// Fill `buf` from the device; returns the bytes read.
    fn read(&mut self, handle: DeviceHandle, register: u16, buf: &mut [u8]) -> StatusCode;

    /// Returns the bytes written.
    fn write(&mut self, handle: DeviceHandle, register: u16, data: &[u8]) -> StatusCode;

    /// Release the unit and any hardware it holds.
    fn close(&mut self, handle: DeviceHandle) -> StatusCode;

    /// Called every loop iteration; push completions of in-progress work.
    fn dispatch_timers(&mut self, _events: &mut Vec<DriverEvent>) {}
}
