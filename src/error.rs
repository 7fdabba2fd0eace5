//! Our error types for the X2 bench.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Transport faults raised by a single Modbus transaction.
///
/// These never leave the retry wrapper: every variant is retried the same way
/// and exhaustion is reported as a missing value, not as an error.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Modbus protocol error: {0:?}")]
    ModbusError(rmodbus::ErrorKind),
    #[error("Communication timeout")]
    Timeout,
    #[error("Invalid range")]
    InvalidRange,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Frame does not fit the buffer")]
    BufferError,
}

impl<I: embedded_io::Error> From<rmodbus::ErrorKind> for Error<I> {
    fn from(err: rmodbus::ErrorKind) -> Self {
        Error::ModbusError(err)
    }
}

/// Faults outside the register-access layer that abort the current board.
///
/// Anything here surfaces to the run loop, which logs it, writes an error
/// marker row and powers the rails down.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("GPIO error: {0:?}")]
    Gpio(embedded_hal::digital::ErrorKind),
    #[error("SPI error: {0:?}")]
    Spi(embedded_hal::spi::ErrorKind),
    #[error("ADC channel {0} out of range")]
    AdcChannel(u8),
    #[error("Operator console error: {0}")]
    Operator(String),
    #[error("Interrupted by the operator")]
    Interrupted,
    #[error(transparent)]
    Report(#[from] crate::report::ReportError),
}

impl BenchError {
    pub(crate) fn gpio(err: impl embedded_hal::digital::Error) -> Self {
        BenchError::Gpio(err.kind())
    }

    pub(crate) fn spi(err: impl embedded_hal::spi::Error) -> Self {
        BenchError::Spi(err.kind())
    }
}
