//! Register access to the X2 and the passthrough node by register name.
//!
//! [`RegisterClient`] owns the bus and both device handles. Every call goes
//! through the retry layer, so a `None` here means the bus gave up.

use log::{debug, info};

use crate::{
    bus::{DeviceHandle, RegisterTransport},
    register::{NodeInput, X2Control, X2Input},
    retry::{read_with_retries, write_with_retries},
    words::{decode_f32, round3},
};

pub struct RegisterClient<T: RegisterTransport> {
    transport: T,
    main: DeviceHandle,
    node: DeviceHandle,
    attempts: u32,
}

impl<T: RegisterTransport> RegisterClient<T> {
    pub fn new(transport: T, main: DeviceHandle, node: DeviceHandle, attempts: u32) -> Self {
        Self {
            transport,
            main,
            node,
            attempts,
        }
    }

    pub fn main_board(&self) -> &DeviceHandle {
        &self.main
    }

    pub fn node(&self) -> &DeviceHandle {
        &self.node
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Read every word of an X2 input register.
    pub fn read(&mut self, register: X2Input) -> Option<Vec<u16>> {
        let desc = register.descriptor();
        let values = read_with_retries(
            &mut self.transport,
            &self.main,
            desc.address,
            desc.count,
            self.attempts,
        );
        if values.is_none() {
            info!("Reading {} was not successful", desc.name);
        }
        values
    }

    /// Read a single-word X2 input register.
    pub fn read_word(&mut self, register: X2Input) -> Option<u16> {
        self.read(register)?.first().copied()
    }

    /// Read a float X2 input register, rounded to three places.
    pub fn read_float(&mut self, register: X2Input) -> Option<f64> {
        let words = self.read(register)?;
        let value = decode_f32(&words).map(round3);
        debug!("{} = {value:?}", register.name());
        value
    }

    /// Write an X2 holding register. Returns the values written.
    pub fn write(&mut self, register: X2Control, values: &[u16]) -> Option<Vec<u16>> {
        let desc = register.descriptor();
        let written = write_with_retries(
            &mut self.transport,
            &self.main,
            desc.address,
            values,
            self.attempts,
        );
        if written.is_none() {
            info!("Writing {} was not successful", desc.name);
        }
        written
    }

    /// Turn an X2 switch register on (`1`) or off (`0`).
    pub fn switch(&mut self, register: X2Control, on: bool) -> bool {
        let (verb, value) = if on { ("Enabling", 1) } else { ("Disabling", 0) };
        info!("{verb} {}...", register.name());
        self.write(register, &[value]).is_some()
    }

    /// Read every word of a passthrough node register.
    pub fn read_node(&mut self, register: NodeInput) -> Option<Vec<u16>> {
        let desc = register.descriptor();
        read_with_retries(
            &mut self.transport,
            &self.node,
            desc.address,
            desc.count,
            self.attempts,
        )
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Give the transport back.
    pub fn release(self) -> T {
        self.transport
    }
}
