//! This crate drives the production test bench for the X2 Main data-logger PCB.
//!
//! The bench powers the board through GPIO-switched supplies, talks to it over
//! Modbus RTU on RS-485, fakes a few rails with an MCP3008 ADC, scans for the
//! board's Wi-Fi network and asks the operator to confirm what only a person
//! can see. Each board gets one row in a dated CSV results file.
//!
//! Both units on the bus use extended addresses: the X2 answers on the universal
//! address 252 and the passthrough T-node on 20. Standard Modbus stops at 247, so
//! the full `u8` range is accepted.
//!
//! The serial port used for the bus should be configured like so:
//! * Baud rate: 19200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//! * Timeout: 0.5 s

pub mod adc;
pub mod bench;
pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluate;
pub mod modules;
pub mod operator;
pub mod rails;
pub mod register;
pub mod report;
pub mod retry;
pub mod serial;
pub mod session;
pub mod wifi;
pub mod words;

#[cfg(test)]
mod mock_hw;
#[cfg(test)]
mod mock_serial;
