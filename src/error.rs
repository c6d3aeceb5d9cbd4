use core::fmt;

/// Which of the two bus lines an error refers to.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// The bidirectional DATA line.
    Data,
    /// The SCK line.
    Clock,
}

/// Acknowledgement phase that failed after a command byte.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ack {
    /// The sensor did not pull DATA low on the ninth clock pulse.
    Pulled,
    /// The sensor did not release DATA after the ninth clock pulse.
    Released,
}

/// Possible errors from the SHT1x driver.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// A line could not be acquired or configured while constructing the driver.
    PinAcquisition {
        /// The line that failed.
        signal: Signal,
        /// Error reported by the GPIO layer.
        source: E,
    },
    /// The sensor did not acknowledge a command with the expected polarity.
    Handshake(Ack),
    /// The sensor never signalled that a measurement was ready.
    ReadyTimeout,
    /// The driver was used after it was closed.
    Closed,
    /// Error from a GPIO pin (input/output).
    Pin(E),
}

impl<E> From<E> for Error<E> {
    fn from(value: E) -> Self {
        Self::Pin(value)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PinAcquisition { signal, source } => {
                write!(f, "could not acquire {signal:?} line: {source:?}")
            }
            Error::Handshake(Ack::Pulled) => {
                f.write_str("command not acknowledged (DATA not pulled low)")
            }
            Error::Handshake(Ack::Released) => {
                f.write_str("command not acknowledged (DATA not released)")
            }
            Error::ReadyTimeout => f.write_str("timed out waiting for measurement"),
            Error::Closed => f.write_str("sensor has been closed"),
            Error::Pin(e) => write!(f, "pin error: {e:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for Error<E> {}
