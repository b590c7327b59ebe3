use core::fmt;

use crate::line::Direction;

/// Possible errors from the DHT11 driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum DhtError<E> {
    /// The sensor did not acknowledge the start signal.
    NoResponse,
    /// Timed out waiting for a pin state change.
    Timeout,
    /// Checksum did not match the received data.
    ChecksumMismatch,
    /// The line was used in the wrong direction. Carries the direction the
    /// operation required.
    WrongDirection(Direction),
    /// Error from the GPIO pin (input/output).
    PinError(E),
}

impl<E> DhtError<E> {
    /// Short, static name of the error, suitable for log lines.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DhtError::NoResponse => "no response",
            DhtError::Timeout => "timeout",
            DhtError::ChecksumMismatch => "checksum mismatch",
            DhtError::WrongDirection(_) => "wrong line direction",
            DhtError::PinError(_) => "pin error",
        }
    }
}

impl<E> From<E> for DhtError<E> {
    fn from(value: E) -> Self {
        Self::PinError(value)
    }
}

impl<E: fmt::Debug> fmt::Display for DhtError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DhtError::WrongDirection(required) => {
                write!(f, "{} (line must be {:?})", self.as_str(), required)
            }
            DhtError::PinError(e) => write!(f, "{}: {:?}", self.as_str(), e),
            _ => f.write_str(self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err: DhtError<()> = DhtError::NoResponse;
        assert_eq!(format!("{err}"), "no response");

        let err: DhtError<()> = DhtError::WrongDirection(Direction::Input);
        assert_eq!(format!("{err}"), "wrong line direction (line must be Input)");

        let err = DhtError::from(7u8);
        assert_eq!(err, DhtError::PinError(7));
        assert_eq!(format!("{err}"), "pin error: 7");
    }
}
