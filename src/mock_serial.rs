//! In-memory serial port for the bus tests.

use std::collections::VecDeque;

use crate::bus::BusPort;

/// RS-485 adapter stand-in.
///
/// Bytes in the receive buffer are readable straight away. Replies queued with
/// [`MockSerial::queue_reply`] arrive one at a time, each after the next request
/// has been flushed out.
#[derive(Default)]
pub struct MockSerial {
    /// Everything written to the port.
    write_buffer: Vec<u8>,
    /// Bytes waiting to be read.
    read_buffer: VecDeque<u8>,
    /// Replies released one per flushed request.
    replies: VecDeque<Vec<u8>>,
    /// How many times the receive buffer was discarded.
    discards: usize,
    /// Every write and flush fails.
    write_fails: bool,
    /// Every read and discard fails.
    read_fails: bool,
}

#[derive(thiserror::Error, Debug)]
pub enum MockSerialError {
    /// Simulated adapter unplugged.
    #[error("Mock serial port disconnected")]
    Disconnected,
    /// Nothing to read yet.
    #[error("Mock serial port has nothing to read")]
    WouldBlock,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Disconnected => embedded_io::ErrorKind::BrokenPipe,
            MockSerialError::WouldBlock => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.write_fails {
            return Err(MockSerialError::Disconnected);
        }
        self.write_buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.write_fails {
            return Err(MockSerialError::Disconnected);
        }
        if let Some(reply) = self.replies.pop_front() {
            self.read_buffer.extend(reply);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.read_fails {
            return Err(MockSerialError::Disconnected);
        }
        if self.read_buffer.is_empty() {
            return Err(MockSerialError::WouldBlock);
        }

        let bytes_to_read = core::cmp::min(buf.len(), self.read_buffer.len());
        for (slot, byte) in buf.iter_mut().zip(self.read_buffer.drain(..bytes_to_read)) {
            *slot = byte;
        }
        Ok(bytes_to_read)
    }
}

impl BusPort for MockSerial {
    fn discard_input(&mut self) -> Result<(), Self::Error> {
        if self.read_fails {
            return Err(MockSerialError::Disconnected);
        }
        self.read_buffer.clear();
        self.discards += 1;
        Ok(())
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put bytes in the receive buffer, readable immediately.
    pub fn set_read_data(&mut self, data: &[u8]) {
        self.read_buffer.clear();
        self.read_buffer.extend(data.iter().copied());
    }

    /// Queue a reply that arrives once the next request is flushed.
    pub fn queue_reply(&mut self, frame: &[u8]) {
        self.replies.push_back(frame.to_vec());
    }

    /// Every request byte sent so far.
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    pub fn discards(&self) -> usize {
        self.discards
    }

    /// Unplug the adapter on the transmit side.
    pub fn set_write_error(&mut self, should_error: bool) {
        self.write_fails = should_error;
    }

    /// Unplug the adapter on the receive side.
    pub fn set_read_error(&mut self, should_error: bool) {
        self.read_fails = should_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_reply_released_on_flush() {
        let mut mock = MockSerial::new();
        mock.queue_reply(b"reply");

        let mut buffer = [0u8; 8];
        assert!(matches!(mock.read(&mut buffer), Err(MockSerialError::WouldBlock)));

        mock.write_all(b"request").unwrap();
        mock.flush().unwrap();

        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer[..5], b"reply");
        assert_eq!(mock.written_data(), b"request");
    }

    #[test]
    fn test_read_partial_data() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"Long response data");

        let mut buffer = [0u8; 5];
        assert_eq!(mock.read(&mut buffer).unwrap(), 5);
        assert_eq!(&buffer, b"Long ");
    }

    #[test]
    fn test_discard_input() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"stale");
        mock.discard_input().unwrap();

        let mut buffer = [0u8; 8];
        assert!(mock.read(&mut buffer).is_err());
        assert_eq!(mock.discards(), 1);
    }

    #[test]
    fn test_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.written_data().is_empty());

        mock.set_read_error(true);
        let mut buffer = [0u8; 4];
        let err = mock.read(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), embedded_io::ErrorKind::BrokenPipe);
    }
}
