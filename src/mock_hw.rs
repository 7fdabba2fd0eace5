//! Stand-ins for the bench hardware and the operator, used in unit tests.
//!
//! Handles share their state, so a test can keep a clone and inspect it after
//! handing the original to the code under test.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorKind, ErrorType, InputPin, OutputPin},
};

use crate::{
    adc::AnalogInput,
    error::BenchError,
    operator::Operator,
    wifi::{ScanError, WifiScanner},
};

/// A GPIO line that reads back what was last written.
#[derive(Clone, Default)]
pub struct FakePin {
    level: Rc<Cell<bool>>,
    fail: Rc<Cell<bool>>,
}

impl FakePin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.level.get()
    }

    pub fn set(&self, high: bool) {
        self.level.set(high);
    }

    /// Make every access fail.
    pub fn fail(&self, fail: bool) {
        self.fail.set(fail);
    }

    fn check(&self) -> Result<(), ErrorKind> {
        if self.fail.get() {
            return Err(ErrorKind::Other);
        }
        Ok(())
    }
}

impl ErrorType for FakePin {
    type Error = ErrorKind;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.check()?;
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.check()?;
        self.level.set(true);
        Ok(())
    }
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, ErrorKind> {
        self.check()?;
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, ErrorKind> {
        self.is_high().map(|high| !high)
    }
}

/// Records every wait in milliseconds instead of sleeping.
#[derive(Clone, Default)]
pub struct FakeDelay {
    calls: Rc<RefCell<Vec<u32>>>,
}

impl FakeDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.borrow().clone()
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls.borrow_mut().push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls.borrow_mut().push(ms);
    }
}

/// Returns a fixed voltage per channel.
#[derive(Clone, Default)]
pub struct FakeAdc {
    volts: Rc<RefCell<[f64; 8]>>,
}

impl FakeAdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, channel: u8, volts: f64) {
        self.volts.borrow_mut()[channel as usize] = volts;
    }
}

impl AnalogInput for FakeAdc {
    fn read_volts(&mut self, channel: u8, scale: f64) -> Result<f64, BenchError> {
        let volts = self
            .volts
            .borrow()
            .get(channel as usize)
            .copied()
            .ok_or(BenchError::AdcChannel(channel))?;
        Ok(volts * scale)
    }
}

/// Answers scans from a script. Once the script runs out every scan reports a busy radio.
#[derive(Default)]
pub struct FakeScanner {
    script: VecDeque<Result<Vec<String>, ScanError>>,
    scans: usize,
}

impl FakeScanner {
    pub fn new(script: Vec<Result<Vec<String>, ScanError>>) -> Self {
        Self {
            script: script.into(),
            scans: 0,
        }
    }

    pub fn scans(&self) -> usize {
        self.scans
    }
}

impl WifiScanner for FakeScanner {
    fn scan(&mut self) -> Result<Vec<String>, ScanError> {
        self.scans += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(ScanError::Busy("Device or resource busy".into())))
    }
}

/// An operator that answers from scripts.
#[derive(Clone, Default)]
pub struct FakeOperator {
    serials: Rc<RefCell<VecDeque<Option<String>>>>,
    answers: Rc<RefCell<VecDeque<bool>>>,
    questions: Rc<RefCell<Vec<String>>>,
    messages: Rc<RefCell<Vec<String>>>,
    console_down: bool,
}

impl FakeOperator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serial numbers to hand out, then `None`.
    pub fn with_serials(self, serials: &[&str]) -> Self {
        self.serials
            .borrow_mut()
            .extend(serials.iter().map(|s| Some(s.to_string())));
        self
    }

    /// Answers to yes/no questions. Unscripted questions get `false`.
    pub fn with_answers(self, answers: &[bool]) -> Self {
        self.answers.borrow_mut().extend(answers.iter().copied());
        self
    }

    /// Every prompt fails from now on.
    pub fn console_down(mut self) -> Self {
        self.console_down = true;
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.borrow().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl Operator for FakeOperator {
    fn serial_number(&mut self, _length: usize) -> Result<Option<String>, BenchError> {
        Ok(self.serials.borrow_mut().pop_front().flatten())
    }

    fn confirm(&mut self, question: &str) -> Result<bool, BenchError> {
        self.questions.borrow_mut().push(question.to_string());
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }

    fn acknowledge(&mut self, message: &str) -> Result<(), BenchError> {
        if self.console_down {
            return Err(BenchError::Operator("stdin closed".into()));
        }
        self.messages.borrow_mut().push(message.to_string());
        Ok(())
    }
}
