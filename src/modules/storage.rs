//! On-board storage self tests. The X2 runs them itself and reports a status word.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::{
    bench::Bench,
    bus::RegisterTransport,
    evaluate::{Field, TestResult},
    register::X2Input,
};

pub(super) fn serial_flash<T, P, D>(bench: &mut Bench<T, P, D>) -> TestResult
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let (verdict, _) = bench.check_status(X2Input::SerialFlashStatus, "serial flash");
    TestResult::new(vec![Field::Status(verdict)])
}

pub(super) fn sd_card<T, P, D>(bench: &mut Bench<T, P, D>) -> TestResult
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let (verdict, _) = bench.check_status(X2Input::SdCardStatus, "SD card");
    TestResult::new(vec![Field::Status(verdict)])
}
