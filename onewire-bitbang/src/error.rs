use core::fmt;

/// 1-Wire communication error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Encapsulates the error type of the underlying pin.
    Bus(E),
    /// No device answered the reset pulse with a presence pulse.
    /// Indicates a wiring or power fault; never retried internally.
    NoDevicePresent,
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Bus(other)
    }
}

impl<E: fmt::Debug> fmt::Display for OneWireError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus line error: {e:?}"),
            Self::NoDevicePresent => write!(f, "no presence pulse detected"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for OneWireError<E> {}
