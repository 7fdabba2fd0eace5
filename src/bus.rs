//! Modbus RTU over the shared RS-485 bus.
//!
//! One [`ModbusBus`] owns the serial port. Every unit on the bus is addressed through a
//! [`DeviceHandle`], and because every call takes `&mut self` only one transaction can
//! be in flight at a time.

use crate::{
    config::SerialConfig,
    error::{Error, Result},
};
use embedded_io::Error as _;

/// Function code 4 response overhead: unit id, function, byte count and CRC.
const READ_RESPONSE_OVERHEAD: usize = 5;
/// Function code 16 response: unit id, function, address, quantity and CRC.
const WRITE_RESPONSE_LEN: usize = 8;
/// Exception response: unit id, function | 0x80, exception code and CRC.
const EXCEPTION_RESPONSE_LEN: usize = 5;
/// Largest quantity a function code 4 request may ask for.
const MAX_READ_COUNT: u16 = 125;

/// A serial port we can speak Modbus RTU over.
///
/// On top of plain reads and writes the port must be able to throw away bytes
/// that are already waiting in its receive buffer. A reply to a request that
/// timed out can arrive late and would otherwise be parsed as the reply to
/// the next request.
pub trait BusPort: embedded_io::Read + embedded_io::Write {
    fn discard_input(&mut self) -> core::result::Result<(), Self::Error>;
}

/// One addressable unit on the bus.
///
/// Addresses 248 - 255 are reserved in Modbus, but the X2 answers on the
/// universal address 252 so the full `u8` range is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceHandle {
    pub label: &'static str,
    pub address: u8,
    pub serial: SerialConfig,
}

impl DeviceHandle {
    pub fn new(label: &'static str, address: u8, serial: SerialConfig) -> Self {
        Self {
            label,
            address,
            serial,
        }
    }
}

/// The raw register operations the retry layer is built on.
pub trait RegisterTransport {
    type Error: core::fmt::Debug;

    /// Drop any stale bytes waiting on the receive side.
    fn discard_input(&mut self) -> core::result::Result<(), Self::Error>;

    /// Read `count` input registers (function code 4).
    fn read_input_registers(
        &mut self,
        unit: u8,
        address: u16,
        count: u16,
    ) -> core::result::Result<Vec<u16>, Self::Error>;

    /// Write sequential holding registers (function code 16).
    fn write_registers(
        &mut self,
        unit: u8,
        address: u16,
        values: &[u16],
    ) -> core::result::Result<(), Self::Error>;
}

/// Modbus RTU client over any [`BusPort`].
///
/// `L` is the size of the frame buffers.
pub struct ModbusBus<S: BusPort, const L: usize = 256> {
    interface: S,
}

impl<S: BusPort, const L: usize> ModbusBus<S, L> {
    pub fn new(interface: S) -> Self {
        Self { interface }
    }

    /// Give the port back, e.g. to reopen it with other settings.
    pub fn release(self) -> S {
        self.interface
    }

    /// Read the reply to a request until `expected` bytes arrived, an exception frame
    /// is complete or the port stops delivering.
    fn receive(&mut self, buff: &mut heapless::Vec<u8, L>, expected: usize) -> Result<(), S::Error> {
        let mut temp_buf = [0u8; 16];
        loop {
            match self.interface.read(&mut temp_buf) {
                Ok(0) => {
                    if buff.is_empty() {
                        return Err(Error::Timeout);
                    }
                    break;
                }
                Ok(bytes_read) => {
                    if buff.extend_from_slice(&temp_buf[0..bytes_read]).is_err() {
                        return Err(Error::BufferError);
                    }
                    if buff.len() >= expected {
                        break;
                    }
                    if buff.len() >= EXCEPTION_RESPONSE_LEN && buff[1] & 0x80 != 0 {
                        break;
                    }
                }
                Err(e) => {
                    if matches!(
                        e.kind(),
                        embedded_io::ErrorKind::Other | embedded_io::ErrorKind::TimedOut
                    ) {
                        if buff.is_empty() {
                            return Err(Error::Timeout);
                        }
                        // Let the parser decide what the partial frame is worth.
                        break;
                    }
                    return Err(Error::SerialError(e));
                }
            }
        }
        Ok(())
    }
}

impl<S: BusPort, const L: usize> RegisterTransport for ModbusBus<S, L> {
    type Error = Error<S::Error>;

    fn discard_input(&mut self) -> Result<(), S::Error> {
        self.interface.discard_input().map_err(Error::SerialError)
    }

    fn read_input_registers(&mut self, unit: u8, address: u16, count: u16) -> Result<Vec<u16>, S::Error> {
        if count == 0 || count > MAX_READ_COUNT {
            return Err(Error::InvalidRange);
        }

        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = rmodbus::client::ModbusRequest::new(unit, rmodbus::ModbusProto::Rtu);
        req.generate_get_inputs(address, count, &mut buff)?;

        self.interface.write_all(&buff).map_err(Error::SerialError)?;
        self.interface.flush().map_err(Error::SerialError)?;

        // Reuse same buffer when reading back
        buff.clear();
        self.receive(&mut buff, READ_RESPONSE_OVERHEAD + 2 * count as usize)?;

        let mut parsed_data: heapless::Vec<u16, 125> = heapless::Vec::new();
        req.parse_u16(&buff, &mut parsed_data)?;

        if parsed_data.len() != count as usize {
            return Err(Error::InvalidResponse);
        }
        Ok(parsed_data.to_vec())
    }

    fn write_registers(&mut self, unit: u8, address: u16, values: &[u16]) -> Result<(), S::Error> {
        if values.is_empty() {
            return Err(Error::InvalidRange);
        }

        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        let mut req = rmodbus::client::ModbusRequest::new(unit, rmodbus::ModbusProto::Rtu);
        req.generate_set_holdings_bulk(address, values, &mut buff)?;

        self.interface.write_all(&buff).map_err(Error::SerialError)?;
        self.interface.flush().map_err(Error::SerialError)?;

        buff.clear();
        self.receive(&mut buff, WRITE_RESPONSE_LEN)?;

        req.parse_ok(&buff)?;
        Ok(())
    }
}
