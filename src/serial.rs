//! The USB RS-485 adapter, seen through `embedded-io`.

use std::time::Duration;

use serialport::{ClearBuffer, DataBits, SerialPort, StopBits};
use thiserror::Error;

use crate::{
    bus::BusPort,
    config::{Parity, SerialConfig},
};

pub struct PortWrapper(Box<dyn SerialPort>);

impl PortWrapper {
    /// Open and configure the port named in `config`.
    pub fn open(config: &SerialConfig) -> Result<Self, PortError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits(config.data_bits)?)
            .stop_bits(stop_bits(config.stop_bits)?)
            .parity(match config.parity {
                Parity::None => serialport::Parity::None,
                Parity::Even => serialport::Parity::Even,
                Parity::Odd => serialport::Parity::Odd,
            })
            .timeout(read_timeout(config))
            .open()?;
        Ok(Self(port))
    }
}

/// How long a read may wait before the frame is considered finished.
fn read_timeout(config: &SerialConfig) -> Duration {
    Duration::from_millis(config.timeout().to_millis() as u64)
}

fn invalid(what: &str, value: u8) -> serialport::Error {
    serialport::Error::new(
        serialport::ErrorKind::InvalidInput,
        format!("unsupported {what}: {value}"),
    )
}

fn data_bits(bits: u8) -> Result<DataBits, serialport::Error> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(invalid("data bits", other)),
    }
}

fn stop_bits(bits: u8) -> Result<StopBits, serialport::Error> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(invalid("stop bits", other)),
    }
}

/// Faults from the RS-485 adapter.
#[derive(Error, Debug)]
pub enum PortError {
    #[error("Serial I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port setup failed: {0}")]
    Setup(#[from] serialport::Error),
}

impl embedded_io::Error for PortError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind as E;
        match self {
            PortError::Io(err) => match err.kind() {
                std::io::ErrorKind::TimedOut => E::TimedOut,
                std::io::ErrorKind::Interrupted => E::Interrupted,
                std::io::ErrorKind::BrokenPipe => E::BrokenPipe,
                std::io::ErrorKind::NotFound => E::NotFound,
                std::io::ErrorKind::PermissionDenied => E::PermissionDenied,
                std::io::ErrorKind::InvalidData => E::InvalidData,
                _ => E::Other,
            },
            PortError::Setup(err) => match err.kind() {
                serialport::ErrorKind::NoDevice => E::NotFound,
                serialport::ErrorKind::InvalidInput => E::InvalidInput,
                _ => E::Other,
            },
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = PortError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Ok(std::io::Read::read(&mut self.0, buf)?)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(std::io::Write::write(&mut self.0, buf)?)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(std::io::Write::flush(&mut self.0)?)
    }
}

impl BusPort for PortWrapper {
    fn discard_input(&mut self) -> Result<(), Self::Error> {
        Ok(self.0.clear(ClearBuffer::Input)?)
    }
}
