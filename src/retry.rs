//! Bounded retries around single register transactions.
//!
//! The RS-485 adapter on the bench drops or mangles the odd frame, so every
//! transaction gets a few attempts. Faults never leave this module: when every
//! attempt fails the caller gets `None` and reports the step as failed.

use log::debug;

use crate::bus::{DeviceHandle, RegisterTransport};

/// Read `count` input registers from `device`, trying at most `attempts` times.
///
/// Stale bytes are discarded before each attempt. The first read that completes
/// wins, whatever the values look like. `attempts == 0` touches nothing on the bus.
pub fn read_with_retries<T: RegisterTransport>(
    transport: &mut T,
    device: &DeviceHandle,
    address: u16,
    count: u16,
    attempts: u32,
) -> Option<Vec<u16>> {
    if attempts == 0 {
        return None;
    }

    for attempt in 0..attempts {
        let result = transport
            .discard_input()
            .and_then(|()| transport.read_input_registers(device.address, address, count));
        match result {
            Ok(values) => return Some(values),
            Err(err) => debug!(
                "Reading {attempt} failed ({} 0x{address:04X}): {err:?}",
                device.label
            ),
        }
    }
    None
}

/// Write `values` to sequential holding registers of `device`, trying at most
/// `attempts` times.
///
/// Returns the values written on success. The device is not read back.
pub fn write_with_retries<T: RegisterTransport>(
    transport: &mut T,
    device: &DeviceHandle,
    address: u16,
    values: &[u16],
    attempts: u32,
) -> Option<Vec<u16>> {
    if attempts == 0 {
        return None;
    }

    for attempt in 0..attempts {
        let result = transport
            .discard_input()
            .and_then(|()| transport.write_registers(device.address, address, values));
        match result {
            Ok(()) => return Some(values.to_vec()),
            Err(err) => debug!(
                "Writing {attempt} failed ({} 0x{address:04X}): {err:?}",
                device.label
            ),
        }
    }
    None
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::config::SerialConfig;
    use crate::register::X2Input;

    /// Every call the fake saw, in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Discard,
        Read { unit: u8, address: u16, count: u16 },
        Write { unit: u8, address: u16, values: Vec<u16> },
    }

    #[derive(Debug)]
    pub struct Fault;

    /// A register transport answering from a script.
    ///
    /// Each transaction pops the next outcome; an empty script fails every call.
    #[derive(Default)]
    pub struct ScriptedTransport {
        pub outcomes: VecDeque<Result<Vec<u16>, Fault>>,
        pub calls: Vec<Call>,
    }

    impl ScriptedTransport {
        pub fn new(outcomes: impl IntoIterator<Item = Result<Vec<u16>, Fault>>) -> Self {
            Self {
                outcomes: outcomes.into_iter().collect(),
                calls: Vec::new(),
            }
        }

        pub fn transactions(&self) -> usize {
            self.calls.iter().filter(|c| **c != Call::Discard).count()
        }

        fn next(&mut self) -> Result<Vec<u16>, Fault> {
            self.outcomes.pop_front().unwrap_or(Err(Fault))
        }
    }

    impl RegisterTransport for ScriptedTransport {
        type Error = Fault;

        fn discard_input(&mut self) -> Result<(), Fault> {
            self.calls.push(Call::Discard);
            Ok(())
        }

        fn read_input_registers(&mut self, unit: u8, address: u16, count: u16) -> Result<Vec<u16>, Fault> {
            self.calls.push(Call::Read {
                unit,
                address,
                count,
            });
            self.next()
        }

        fn write_registers(&mut self, unit: u8, address: u16, values: &[u16]) -> Result<(), Fault> {
            self.calls.push(Call::Write {
                unit,
                address,
                values: values.to_vec(),
            });
            self.next().map(|_| ())
        }
    }

    fn main_board() -> DeviceHandle {
        DeviceHandle::new("X2 Main", 252, SerialConfig::default())
    }

    #[test]
    fn address_read_succeeds_on_third_attempt() {
        let add = X2Input::ModbusAddress.descriptor();
        let mut transport = ScriptedTransport::new([Err(Fault), Err(Fault), Ok(vec![1])]);

        let result = read_with_retries(&mut transport, &main_board(), add.address, add.count, 3);

        assert_eq!(result, Some(vec![1]));
        assert_eq!(transport.transactions(), 3);
        assert_eq!(
            transport.calls.last(),
            Some(&Call::Read {
                unit: 252,
                address: 0x1000,
                count: 1
            })
        );
    }

    #[test]
    fn first_success_stops_retrying() {
        for attempts in 1..=5u32 {
            for failures in 0..attempts {
                let mut outcomes: Vec<_> = (0..failures).map(|_| Err(Fault)).collect();
                outcomes.push(Ok(vec![7, 8]));
                outcomes.push(Ok(vec![9, 9]));
                let mut transport = ScriptedTransport::new(outcomes);

                let result = read_with_retries(&mut transport, &main_board(), 0x3020, 2, attempts);

                assert_eq!(result, Some(vec![7, 8]));
                assert_eq!(transport.transactions(), failures as usize + 1);
            }
        }
    }

    #[test]
    fn exhaustion_takes_exactly_n_attempts() {
        for attempts in 1..=5u32 {
            let mut transport = ScriptedTransport::default();
            let result = read_with_retries(&mut transport, &main_board(), 0x1000, 1, attempts);
            assert_eq!(result, None);
            assert_eq!(transport.transactions(), attempts as usize);
        }
    }

    #[test]
    fn zero_attempts_never_touch_the_bus() {
        let mut transport = ScriptedTransport::new([Ok(vec![1])]);
        assert_eq!(read_with_retries(&mut transport, &main_board(), 0x1000, 1, 0), None);
        assert_eq!(write_with_retries(&mut transport, &main_board(), 0x300A, &[1], 0), None);
        assert!(transport.calls.is_empty());
    }

    #[test]
    fn input_discarded_before_every_attempt() {
        let mut transport = ScriptedTransport::new([Err(Fault), Ok(vec![1])]);
        read_with_retries(&mut transport, &main_board(), 0x1000, 1, 3);

        let read = Call::Read {
            unit: 252,
            address: 0x1000,
            count: 1,
        };
        assert_eq!(
            transport.calls,
            vec![Call::Discard, read.clone(), Call::Discard, read]
        );
    }

    #[test]
    fn write_echoes_values() {
        let mut transport = ScriptedTransport::new([Err(Fault), Ok(vec![])]);
        let result = write_with_retries(&mut transport, &main_board(), 0x701C, &[1, 2, 0, 0], 3);

        assert_eq!(result, Some(vec![1, 2, 0, 0]));
        assert_eq!(transport.transactions(), 2);
    }

    #[test]
    fn write_exhaustion_returns_none() {
        let mut transport = ScriptedTransport::default();
        let result = write_with_retries(&mut transport, &main_board(), 0x300D, &[0], 4);
        assert_eq!(result, None);
        assert_eq!(transport.transactions(), 4);
    }

    #[test]
    fn retries_over_the_modbus_bus() {
        use crate::bus::ModbusBus;
        use crate::mock_serial::MockSerial;

        // First reply is corrupt, second is good.
        let mut serial = MockSerial::new();
        serial.queue_reply(&[0xFC, 0x04, 0x02, 0x00, 0x01, 0x00, 0x00]);
        serial.queue_reply(&[0xFC, 0x04, 0x02, 0x00, 0x01, 0x15, 0x24]);
        let mut bus: ModbusBus<MockSerial> = ModbusBus::new(serial);

        let result = read_with_retries(&mut bus, &main_board(), 0x1000, 1, 3);

        assert_eq!(result, Some(vec![1]));
        let serial = bus.release();
        assert_eq!(serial.discards(), 2);
        assert_eq!(serial.written_data().len(), 16);
    }
}
