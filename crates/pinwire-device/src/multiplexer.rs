use pinwire_codec::command::{DEVICE_QUERY, DEVICE_RESPONSE};
use pinwire_codec::opaque_str;
use pinwire_registry::{CapabilityWriter, FeatureContext, FeatureHandler, PinMode};
use tracing::{debug, info, warn};

use crate::driver::{DeviceDriverTable, DriverEvent};
use crate::error::DeviceError;
use crate::handle::DeviceHandle;
use crate::header::{DeviceAction, DeviceRequest, DeviceResponse, MAX_STATUS_MAGNITUDE};
use crate::session::{Session, SessionKey, SessionTable};
use crate::status::StatusCode;

/// Default maximum decoded parameter block, in bytes.
pub const DEFAULT_MAX_BLOCK: usize = 128;

/// Configuration for the device multiplexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Largest decoded parameter block accepted or produced. Default: 128.
    pub max_block_size: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            max_block_size: DEFAULT_MAX_BLOCK,
        }
    }
}

/// The device query sub-protocol as a feature handler.
///
/// Claims DEVICE_QUERY, tracks open sessions by handle and relays each
/// operation to the driver table. Operations on a handle that is not open
/// fail with `BAD_HANDLE` without reaching the drivers.
pub struct DeviceMultiplexer<T> {
    drivers: T,
    sessions: SessionTable,
    config: DeviceConfig,
    events: Vec<DriverEvent>,
}

impl<T: DeviceDriverTable> DeviceMultiplexer<T> {
    /// Create a new multiplexer with default configuration.
    pub fn new(drivers: T) -> Self {
        Self::with_config(drivers, DeviceConfig::default())
    }

    /// Create a new multiplexer with explicit configuration.
    pub fn with_config(drivers: T, config: DeviceConfig) -> Self {
        Self {
            drivers,
            sessions: SessionTable::new(),
            config,
            events: Vec::new(),
        }
    }

    /// Open a session. Returns the new handle as a non-negative status.
    pub fn open(&mut self, identity: &[u8], flags: u8) -> StatusCode {
        let name = opaque_str(identity);
        if name.is_empty() {
            return StatusCode::INVALID_ARGUMENT;
        }

        let status = self.drivers.open(&name, flags);
        if status.is_error() {
            debug!(identity = %name, %status, "driver refused open");
            return status;
        }
        let Some(handle) = status
            .count()
            .and_then(|raw| u16::try_from(raw).ok())
            .and_then(DeviceHandle::from_raw)
        else {
            warn!(identity = %name, %status, "driver returned a handle wider than 14 bits");
            return StatusCode::INVALID_ARGUMENT;
        };

        let (key, displaced) = self.sessions.insert(Session {
            handle,
            identity: name.clone(),
            flags,
        });
        if displaced.is_some() {
            warn!(%handle, "driver reissued a handle that was still open");
        }
        info!(%handle, identity = %name, generation = key.generation(), "device session opened");
        status
    }

    /// Non-mutating introspection of up to `count` bytes; `count` is bounded
    /// by the block limit.
    pub fn status(
        &mut self,
        handle: DeviceHandle,
        register: u16,
        count: u16,
    ) -> (StatusCode, Vec<u8>) {
        if !self.sessions.contains(handle) {
            return (StatusCode::BAD_HANDLE, Vec::new());
        }
        let mut buf = match self.scratch(count) {
            Ok(buf) => buf,
            Err(status) => return (status, Vec::new()),
        };
        let status = self.drivers.status(handle, register, &mut buf);
        (status, received(buf, status))
    }

    /// Side-effecting, driver-specific operation; `data` must be `count`
    /// bytes long.
    pub fn control(
        &mut self,
        handle: DeviceHandle,
        register: u16,
        count: u16,
        data: &[u8],
    ) -> StatusCode {
        if !self.sessions.contains(handle) {
            return StatusCode::BAD_HANDLE;
        }
        if data.len() != usize::from(count) {
            return StatusCode::INVALID_ARGUMENT;
        }
        self.drivers.control(handle, register, data)
    }

    /// Read up to `count` bytes; `count` is bounded by the block limit.
    pub fn read(
        &mut self,
        handle: DeviceHandle,
        register: u16,
        count: u16,
    ) -> (StatusCode, Vec<u8>) {
        if !self.sessions.contains(handle) {
            return (StatusCode::BAD_HANDLE, Vec::new());
        }
        let mut buf = match self.scratch(count) {
            Ok(buf) => buf,
            Err(status) => return (status, Vec::new()),
        };
        let status = self.drivers.read(handle, register, &mut buf);
        (status, received(buf, status))
    }

    /// Write `data`, which must be `count` bytes long.
    pub fn write(
        &mut self,
        handle: DeviceHandle,
        register: u16,
        count: u16,
        data: &[u8],
    ) -> StatusCode {
        if !self.sessions.contains(handle) {
            return StatusCode::BAD_HANDLE;
        }
        if data.len() != usize::from(count) {
            return StatusCode::INVALID_ARGUMENT;
        }
        self.drivers.write(handle, register, data)
    }

    /// Close a session. The session is released even if the driver reports
    /// an error.
    pub fn close(&mut self, handle: DeviceHandle) -> StatusCode {
        let Some(session) = self.sessions.remove(handle) else {
            return StatusCode::BAD_HANDLE;
        };
        let status = self.drivers.close(handle);
        info!(%handle, identity = %session.identity, %status, "device session closed");
        status
    }

    /// Collect driver completions for live sessions as unsolicited
    /// responses. Events for handles that are not open are dropped.
    pub fn dispatch_timers(&mut self) -> Vec<DeviceResponse> {
        self.drivers.dispatch_timers(&mut self.events);
        let mut responses = Vec::with_capacity(self.events.len());
        for event in self.events.drain(..) {
            if !self.sessions.contains(event.handle) {
                debug!(
                    handle = %event.handle,
                    action = event.action.name(),
                    "dropping event for closed handle"
                );
                continue;
            }
            let mut data = event.data;
            let mut status = event.status;
            if data.len() > self.config.max_block_size {
                data.truncate(self.config.max_block_size);
                if !status.is_error() {
                    status = StatusCode::bytes(data.len());
                }
            }
            responses.push(
                DeviceResponse::new(event.action, event.handle, event.register, status)
                    .with_data(data),
            );
        }
        responses
    }

    /// Force-close every open session.
    pub fn close_all(&mut self) {
        let sessions = self.sessions.drain();
        if sessions.is_empty() {
            return;
        }
        for session in &sessions {
            let status = self.drivers.close(session.handle);
            if status.is_error() {
                debug!(handle = %session.handle, %status, "driver error during forced close");
            }
        }
        info!(closed = sessions.len(), "device sessions force-closed");
    }

    /// Decode a DEVICE_QUERY body, run it and build the response.
    pub fn handle_request(&mut self, args: &[u8]) -> DeviceResponse {
        let request = match DeviceRequest::decode(args, self.config.max_block_size) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, len = args.len(), "rejecting device query");
                let action = match err {
                    DeviceError::HeaderTooShort { .. } | DeviceError::UnknownAction(_) => None,
                    DeviceError::Codec(_) => DeviceAction::from_code(args[0] & 0x0F),
                };
                return DeviceResponse::error(action, err.status());
            }
        };

        debug!(
            action = request.action.name(),
            handle = %request.handle,
            register = request.register,
            count = request.count,
            "device query"
        );

        let DeviceRequest {
            action,
            flags,
            handle,
            register,
            count,
            data,
        } = request;

        match action {
            DeviceAction::Open => {
                let status = self.open(&data, flags);
                let opened = status
                    .count()
                    .and_then(|raw| u16::try_from(raw).ok())
                    .and_then(DeviceHandle::from_raw);
                match opened {
                    Some(opened) => {
                        DeviceResponse::new(action, opened, 0, open_status(opened)).with_data(data)
                    }
                    None => DeviceResponse::new(action, DeviceHandle::new(0, 0), 0, status)
                        .with_data(data),
                }
            }
            DeviceAction::Status => {
                if !data.is_empty() {
                    return DeviceResponse::new(
                        action,
                        handle,
                        register,
                        StatusCode::INVALID_ARGUMENT,
                    );
                }
                let (status, data) = self.status(handle, register, count);
                DeviceResponse::new(action, handle, register, status).with_data(data)
            }
            DeviceAction::Control => {
                let status = self.control(handle, register, count, &data);
                DeviceResponse::new(action, handle, register, status)
            }
            DeviceAction::Read => {
                if !data.is_empty() {
                    return DeviceResponse::new(
                        action,
                        handle,
                        register,
                        StatusCode::INVALID_ARGUMENT,
                    );
                }
                let (status, data) = self.read(handle, register, count);
                DeviceResponse::new(action, handle, register, status).with_data(data)
            }
            DeviceAction::Write => {
                let status = self.write(handle, register, count, &data);
                DeviceResponse::new(action, handle, register, status)
            }
            DeviceAction::Close => {
                if !data.is_empty() {
                    return DeviceResponse::new(action, handle, 0, StatusCode::INVALID_ARGUMENT);
                }
                DeviceResponse::new(action, handle, 0, self.close(handle))
            }
        }
    }

    /// Zeroed scratch buffer of `count` bytes. Counts above the block limit
    /// fail with `MESSAGE_TOO_LARGE`, a failed allocation with `OUT_OF_MEMORY`.
    fn scratch(&self, count: u16) -> Result<Vec<u8>, StatusCode> {
        let len = usize::from(count);
        if len > self.config.max_block_size {
            debug!(count, max = self.config.max_block_size, "requested block too large");
            return Err(StatusCode::MESSAGE_TOO_LARGE);
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| StatusCode::OUT_OF_MEMORY)?;
        buf.resize(len, 0);
        Ok(buf)
    }

    /// Session key of the open session for `handle`.
    pub fn session_key(&self, handle: DeviceHandle) -> Option<SessionKey> {
        self.sessions.lookup(handle)
    }

    /// Whether `key` still refers to an open session.
    pub fn is_live(&self, key: SessionKey) -> bool {
        self.sessions.is_live(key)
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn drivers(&self) -> &T {
        &self.drivers
    }

    pub fn drivers_mut(&mut self) -> &mut T {
        &mut self.drivers
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

/// Status for a successful Open: the handle itself when it fits the
/// non-negative status range, otherwise `OK` with the handle left to the
/// unit and class bytes.
fn open_status(handle: DeviceHandle) -> StatusCode {
    let raw = i32::from(handle.raw());
    if raw <= MAX_STATUS_MAGNITUDE {
        StatusCode(raw)
    } else {
        StatusCode::OK
    }
}

/// The valid prefix of a driver-filled buffer.
fn received(mut buf: Vec<u8>, status: StatusCode) -> Vec<u8> {
    let valid = status.count().unwrap_or(0).min(buf.len());
    buf.truncate(valid);
    buf
}

impl<T: DeviceDriverTable> FeatureHandler for DeviceMultiplexer<T> {
    fn name(&self) -> &str {
        "device"
    }

    fn handle_pin_mode(&mut self, _pin: u8, _mode: PinMode, _ctx: &mut FeatureContext<'_>) -> bool {
        false
    }

    fn handle_capability(&mut self, _pin: u8, _caps: &mut CapabilityWriter<'_>) {}

    fn handle_sysex(&mut self, command: u8, args: &[u8], ctx: &mut FeatureContext<'_>) -> bool {
        if command != DEVICE_QUERY {
            return false;
        }
        let response = self.handle_request(args);
        ctx.outbox().sysex(DEVICE_RESPONSE, response.encode());
        true
    }

    fn reset(&mut self, _ctx: &mut FeatureContext<'_>) {
        self.close_all();
    }

    fn report(&mut self, _elapsed: bool, ctx: &mut FeatureContext<'_>) {
        for response in self.dispatch_timers() {
            ctx.outbox().sysex(DEVICE_RESPONSE, response.encode());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use pinwire_codec::encode_opaque;
    use pinwire_registry::{CapabilityRegistry, RegistryConfig};

    use super::*;
    use crate::header::HEADER_LEN;
    use crate::memory::{RegisterFileTable, CONTROL_NOTIFY};

    /// Register-file drivers that count every call.
    struct Counting {
        inner: RegisterFileTable,
        calls: Rc<Cell<usize>>,
    }

    impl Counting {
        fn bump(&self) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    impl DeviceDriverTable for Counting {
        fn open(&mut self, identity: &str, flags: u8) -> StatusCode {
            self.bump();
            self.inner.open(identity, flags)
        }

        fn status(&mut self, handle: DeviceHandle, register: u16, buf: &mut [u8]) -> StatusCode {
            self.bump();
            self.inner.status(handle, register, buf)
        }

        fn control(&mut self, handle: DeviceHandle, register: u16, data: &[u8]) -> StatusCode {
            self.bump();
            self.inner.control(handle, register, data)
        }

        fn read(&mut self, handle: DeviceHandle, register: u16, buf: &mut [u8]) -> StatusCode {
            self.bump();
            self.inner.read(handle, register, buf)
        }

        fn write(&mut self, handle: DeviceHandle, register: u16, data: &[u8]) -> StatusCode {
            self.bump();
            self.inner.write(handle, register, data)
        }

        fn close(&mut self, handle: DeviceHandle) -> StatusCode {
            self.bump();
            self.inner.close(handle)
        }

        fn dispatch_timers(&mut self, events: &mut Vec<DriverEvent>) {
            self.inner.dispatch_timers(events);
        }
    }

    fn mux() -> (DeviceMultiplexer<Counting>, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let drivers = Counting {
            inner: RegisterFileTable::new()
                .with_class("eeprom", vec![0u8; 32])
                .with_class("i2c-temp-sensor", vec![0x01, 0x90, 0x00, 0x00]),
            calls: Rc::clone(&calls),
        };
        (DeviceMultiplexer::new(drivers), calls)
    }

    fn open(mux: &mut DeviceMultiplexer<Counting>, identity: &str) -> DeviceHandle {
        let status = mux.open(identity.as_bytes(), 0);
        DeviceHandle::from_raw(status.value() as u16).unwrap()
    }

    fn request(mux: &mut DeviceMultiplexer<Counting>, req: DeviceRequest) -> DeviceResponse {
        mux.handle_request(&req.encode())
    }

    #[test]
    fn open_read_close_scenario() {
        let (mut mux, _) = mux();

        let opened = request(&mut mux, DeviceRequest::open("i2c-temp-sensor:0x48", 0));
        assert_eq!(opened.action, DeviceAction::Open);
        let handle = opened.handle;
        assert_eq!((handle.class(), handle.unit()), (1, 0x48));
        assert_eq!(opened.status, StatusCode(0xC8));
        assert_eq!(opened.data, b"i2c-temp-sensor:0x48");

        let read = request(&mut mux, DeviceRequest::read(handle, 0x00, 2));
        assert_eq!(read.status, StatusCode(2));
        assert_eq!(read.data, vec![0x01, 0x90]);

        let closed = request(&mut mux, DeviceRequest::close(handle));
        assert_eq!(closed.status, StatusCode::OK);

        let stale = request(&mut mux, DeviceRequest::read(handle, 0x00, 2));
        assert!(stale.status.is_error());
        assert!(stale.data.is_empty());
    }

    #[test]
    fn operations_on_unopened_handles_never_reach_drivers() {
        let (mut mux, calls) = mux();
        let never = DeviceHandle::new(0, 9);

        assert_eq!(mux.read(never, 0, 1).0, StatusCode::BAD_HANDLE);
        assert_eq!(mux.write(never, 0, 1, &[1]), StatusCode::BAD_HANDLE);
        assert_eq!(mux.status(never, 0, 1).0, StatusCode::BAD_HANDLE);
        assert_eq!(mux.control(never, 0, 1, &[1]), StatusCode::BAD_HANDLE);
        assert_eq!(mux.close(never), StatusCode::BAD_HANDLE);
        assert_eq!(calls.get(), 0);

        let handle = open(&mut mux, "eeprom:1");
        mux.close(handle);
        let before = calls.get();
        assert_eq!(mux.read(handle, 0, 1).0, StatusCode::BAD_HANDLE);
        assert_eq!(calls.get(), before);
    }

    #[test]
    fn write_requires_matching_count() {
        let (mut mux, calls) = mux();
        let handle = open(&mut mux, "eeprom:0");
        let before = calls.get();

        assert_eq!(mux.write(handle, 0, 3, &[1, 2]), StatusCode::INVALID_ARGUMENT);
        assert_eq!(mux.control(handle, 0, 0, &[1]), StatusCode::INVALID_ARGUMENT);
        assert_eq!(calls.get(), before);

        assert_eq!(mux.write(handle, 4, 2, &[0xDE, 0xAD]), StatusCode(2));
        assert_eq!(mux.read(handle, 4, 2), (StatusCode(2), vec![0xDE, 0xAD]));
    }

    #[test]
    fn payload_where_none_expected_is_invalid() {
        let (mut mux, _) = mux();
        let handle = open(&mut mux, "eeprom:0");

        let mut read = DeviceRequest::read(handle, 0, 2);
        read.data = vec![1];
        assert_eq!(request(&mut mux, read).status, StatusCode::INVALID_ARGUMENT);

        let mut close = DeviceRequest::close(handle);
        close.data = vec![1];
        assert_eq!(request(&mut mux, close).status, StatusCode::INVALID_ARGUMENT);
        assert!(mux.session_key(handle).is_some());
    }

    #[test]
    fn open_without_identity_is_invalid() {
        let (mut mux, calls) = mux();
        let resp = request(&mut mux, DeviceRequest::open("", 0));
        assert_eq!(resp.status, StatusCode::INVALID_ARGUMENT);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn driver_errors_are_relayed() {
        let (mut mux, _) = mux();
        let resp = request(&mut mux, DeviceRequest::open("thermocouple:0", 0));
        assert_eq!(resp.status, StatusCode::NO_DEVICE);
        assert!(mux.sessions().is_empty());
    }

    #[test]
    fn oversized_block_is_rejected_before_allocation() {
        let (mut mux, calls) = mux();
        let handle = open(&mut mux, "eeprom:0");
        let before = calls.get();

        let mut args = DeviceRequest::write(handle, 0, &[]).encode();
        args.extend_from_slice(encode_opaque(&[0x55; 300]).as_bytes());
        let resp = mux.handle_request(&args);

        assert_eq!(resp.action, DeviceAction::Write);
        assert_eq!(resp.status, StatusCode::MESSAGE_TOO_LARGE);
        assert_eq!(calls.get(), before);
    }

    #[test]
    fn read_count_above_block_limit_is_message_too_large() {
        let (mut mux, calls) = mux();
        let handle = open(&mut mux, "eeprom:0");
        let before = calls.get();

        let read = request(&mut mux, DeviceRequest::read(handle, 0, 300));
        assert_eq!(read.status, StatusCode::MESSAGE_TOO_LARGE);
        assert!(read.data.is_empty());
        let status = request(&mut mux, DeviceRequest::status(handle, 0, 129));
        assert_eq!(status.status, StatusCode::MESSAGE_TOO_LARGE);
        assert_eq!(calls.get(), before);

        let at_limit = request(&mut mux, DeviceRequest::read(handle, 0, 128));
        assert!(!at_limit.status.is_error());
        let wire = DeviceResponse::decode(&at_limit.encode(), DEFAULT_MAX_BLOCK).unwrap();
        assert_eq!(wire, at_limit);
    }

    #[test]
    fn oversized_timer_event_reports_truncated_length() {
        struct Chatty;

        impl DeviceDriverTable for Chatty {
            fn open(&mut self, _identity: &str, _flags: u8) -> StatusCode {
                StatusCode(5)
            }
            fn status(&mut self, _: DeviceHandle, _: u16, _: &mut [u8]) -> StatusCode {
                StatusCode::OK
            }
            fn control(&mut self, _: DeviceHandle, _: u16, _: &[u8]) -> StatusCode {
                StatusCode::OK
            }
            fn read(&mut self, _: DeviceHandle, _: u16, _: &mut [u8]) -> StatusCode {
                StatusCode::OK
            }
            fn write(&mut self, _: DeviceHandle, _: u16, _: &[u8]) -> StatusCode {
                StatusCode::OK
            }
            fn close(&mut self, _: DeviceHandle) -> StatusCode {
                StatusCode::OK
            }
            fn dispatch_timers(&mut self, events: &mut Vec<DriverEvent>) {
                events.push(DriverEvent {
                    handle: DeviceHandle::new(0, 5),
                    action: DeviceAction::Read,
                    register: 0,
                    status: StatusCode(500),
                    data: vec![0xAB; 500],
                });
            }
        }

        let mut mux = DeviceMultiplexer::new(Chatty);
        mux.open(b"chatty:5", 0);
        let responses = mux.dispatch_timers();
        assert_eq!(responses[0].data.len(), DEFAULT_MAX_BLOCK);
        assert_eq!(responses[0].status, StatusCode::bytes(DEFAULT_MAX_BLOCK));
    }

    #[test]
    fn open_status_falls_back_to_ok_for_wide_handles() {
        let mut drivers = RegisterFileTable::new();
        for class in 0..65 {
            drivers = drivers.with_class(&format!("class{class}"), vec![0u8; 4]);
        }
        let mut mux = DeviceMultiplexer::new(drivers);

        let narrow = mux.handle_request(&DeviceRequest::open("class63:0x7f", 0).encode());
        assert_eq!(narrow.status, StatusCode(0x1FFF));
        let wide = mux.handle_request(&DeviceRequest::open("class64:1", 0).encode());
        assert_eq!(wide.status, StatusCode::OK);
        assert_eq!((wide.handle.class(), wide.handle.unit()), (64, 1));
    }

    #[test]
    fn short_header_answers_message_too_large() {
        let (mut mux, _) = mux();
        let resp = mux.handle_request(&[0x03, 0x00]);
        assert_eq!(resp.action, DeviceAction::Close);
        assert_eq!(resp.status, StatusCode::MESSAGE_TOO_LARGE);
    }

    #[test]
    fn unknown_action_not_supported() {
        let (mut mux, _) = mux();
        let resp = mux.handle_request(&[0x0C, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(resp.status, StatusCode::NOT_SUPPORTED);
    }

    #[test]
    fn close_releases_even_on_driver_error() {
        let (mut mux, _) = mux();
        let handle = open(&mut mux, "eeprom:0");
        // pull the unit out from under the session
        mux.drivers_mut().inner.close(handle);

        assert_eq!(mux.close(handle), StatusCode::BAD_HANDLE);
        assert!(mux.session_key(handle).is_none());
    }

    #[test]
    fn reopen_issues_fresh_session_key() {
        let (mut mux, _) = mux();
        let handle = open(&mut mux, "eeprom:4");
        let old = mux.session_key(handle).unwrap();
        mux.close(handle);

        let again = open(&mut mux, "eeprom:4");
        assert_eq!(again, handle);
        let new = mux.session_key(again).unwrap();
        assert!(!mux.is_live(old));
        assert!(mux.is_live(new));
    }

    #[test]
    fn close_all_force_closes_sessions() {
        let (mut mux, _) = mux();
        let a = open(&mut mux, "eeprom:0");
        let b = open(&mut mux, "i2c-temp-sensor:0x48");

        mux.close_all();
        assert!(mux.sessions().is_empty());
        assert_eq!(mux.drivers().inner.open_units(), 0);
        assert_eq!(mux.read(a, 0, 1).0, StatusCode::BAD_HANDLE);
        assert_eq!(mux.read(b, 0, 1).0, StatusCode::BAD_HANDLE);
    }

    #[test]
    fn timer_events_for_live_sessions_only() {
        let (mut mux, _) = mux();
        let live = open(&mut mux, "eeprom:0");
        let closed = open(&mut mux, "eeprom:1");
        assert_eq!(mux.control(live, CONTROL_NOTIFY, 1, &[2]), StatusCode::OK);
        assert_eq!(mux.control(closed, CONTROL_NOTIFY, 1, &[2]), StatusCode::OK);
        mux.sessions.remove(closed);

        let responses = mux.dispatch_timers();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].handle, live);
        assert_eq!(responses[0].action, DeviceAction::Read);
        assert_eq!(responses[0].data, vec![0, 0]);
    }

    #[test]
    fn status_is_distinct_from_read() {
        let (mut mux, _) = mux();
        let handle = open(&mut mux, "eeprom:3");
        let resp = request(&mut mux, DeviceRequest::status(handle, 0, 4));
        assert_eq!(resp.action, DeviceAction::Status);
        assert_eq!(resp.status, StatusCode(4));
        assert_eq!(resp.data, vec![0, 3, 32, 0]);
    }

    #[test]
    fn registry_routes_device_query_and_reset() {
        let (mux, _) = mux();
        let mut registry = CapabilityRegistry::with_config(RegistryConfig {
            total_pins: 2,
            ..RegistryConfig::default()
        });
        registry.register(mux).unwrap();

        let open = DeviceRequest::open("eeprom:2", 0).encode();
        assert!(registry.on_sysex(DEVICE_QUERY, &open));
        let out = registry.take_outbound();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].command(), DEVICE_RESPONSE);
        let resp = DeviceResponse::decode(out[0].args(), DEFAULT_MAX_BLOCK).unwrap();
        assert_eq!(resp.status, StatusCode(2));
        assert!(out[0].args().len() > HEADER_LEN);

        registry.reset();
        let read = DeviceRequest::read(resp.handle, 0, 1).encode();
        registry.on_sysex(DEVICE_QUERY, &read);
        let out = registry.take_outbound();
        let resp = DeviceResponse::decode(out[0].args(), DEFAULT_MAX_BLOCK).unwrap();
        assert_eq!(resp.status, StatusCode::BAD_HANDLE);
    }
}
