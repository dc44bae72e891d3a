use std::fmt;

/// Result of a device operation.
///
/// Non-negative values are byte counts (or, for Open, the new handle);
/// negative values are errors. Drivers may return any negative errno, which
/// is relayed to the host unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(0);
    /// Operation on a handle that is not open (EBADF).
    pub const BAD_HANDLE: StatusCode = StatusCode(-9);
    /// Scratch buffer allocation failed (ENOMEM).
    pub const OUT_OF_MEMORY: StatusCode = StatusCode(-12);
    /// Unit already open (EBUSY), used by drivers.
    pub const BUSY: StatusCode = StatusCode(-16);
    /// No such device (ENODEV), used by drivers.
    pub const NO_DEVICE: StatusCode = StatusCode(-19);
    /// Payload present where none is expected, or length mismatch (EINVAL).
    pub const INVALID_ARGUMENT: StatusCode = StatusCode(-22);
    /// Message or parameter block too large (EMSGSIZE).
    pub const MESSAGE_TOO_LARGE: StatusCode = StatusCode(-90);
    /// Unrecognised action (ENOTSUP).
    pub const NOT_SUPPORTED: StatusCode = StatusCode(-95);

    /// A byte count, saturating at `i32::MAX`.
    pub fn bytes(count: usize) -> Self {
        StatusCode(i32::try_from(count).unwrap_or(i32::MAX))
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_error(self) -> bool {
        self.0 < 0
    }

    /// The byte count of a successful status.
    pub fn count(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusCode::BAD_HANDLE => "bad handle",
            StatusCode::OUT_OF_MEMORY => "out of memory",
            StatusCode::BUSY => "busy",
            StatusCode::NO_DEVICE => "no such device",
            StatusCode::INVALID_ARGUMENT => "invalid argument",
            StatusCode::MESSAGE_TOO_LARGE => "message too large",
            StatusCode::NOT_SUPPORTED => "not supported",
            s if s.is_error() => "driver error",
            _ => "ok",
        }
    }
}

impl From<i32> for StatusCode {
    fn from(value: i32) -> Self {
        StatusCode(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            write!(f, "{} ({})", self.0, self.name())
        } else {
            write!(f, "{}", self.0)
        }
    }
}
