//! Processor, host RS-485 and EE.
//!
//! The address register is stored in EE. A board still on the factory address
//! gets a different one, is power cycled and must come back with it; the factory
//! address is restored afterwards. Any other address is simply reset to the
//! factory one, and its survival so far is taken as proof the EE works.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use fugit::MillisDurationU32;
use log::info;

use crate::{
    bench::Bench,
    bus::RegisterTransport,
    error::BenchError,
    evaluate::{Field, TestResult, Verdict},
    register::{X2Control, X2Input},
};

const FACTORY_ADDRESS: u16 = 1;
const TRIAL_ADDRESS: u16 = 2;

fn row(processor: Verdict, ee: Verdict) -> TestResult {
    TestResult::new(vec![Field::Status(processor), Field::Status(ee)])
}

fn ee_not_tested() -> Verdict {
    Verdict::fail("EE not tested")
}

pub(super) fn address_and_ee<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Reading address...");
    let Some(original) = bench.client.read_word(X2Input::ModbusAddress) else {
        return Ok(row(Verdict::fail("Initial read was not successful"), ee_not_tested()));
    };
    info!("The device's original address is {original}");

    if original != FACTORY_ADDRESS {
        let verdict = match bench.client.write(X2Control::ModbusAddress, &[FACTORY_ADDRESS]) {
            Some(_) => Verdict::Pass,
            None => Verdict::fail("Writing address was not successful"),
        };
        return Ok(row(verdict, Verdict::Pass));
    }

    if bench.client.write(X2Control::ModbusAddress, &[TRIAL_ADDRESS]).is_none() {
        return Ok(row(Verdict::fail("Writing address was not successful"), ee_not_tested()));
    }

    info!("Power cycling to confirm EE works...");
    bench.power_cycle_primary()?;

    let ee = match bench.client.read_word(X2Input::ModbusAddress) {
        Some(TRIAL_ADDRESS) => {
            info!("The address was retained on power cycle");
            Verdict::Pass
        }
        Some(other) => {
            info!("The address was not retained on power cycle, it reads {other}");
            Verdict::fail("Address not retained in EE")
        }
        None => {
            return Ok(row(
                Verdict::fail("Reading address after EE power cycle was not successful"),
                ee_not_tested(),
            ));
        }
    };

    if bench.client.write(X2Control::ModbusAddress, &[FACTORY_ADDRESS]).is_none() {
        return Ok(row(
            Verdict::fail("Changing address back to 1 was not successful"),
            ee,
        ));
    }
    // The address does not read back straight after the write.
    bench.pause(MillisDurationU32::millis(10));

    match bench.client.read_word(X2Input::ModbusAddress) {
        Some(address) => {
            info!("The device's final address is {address}");
            Ok(row(Verdict::Pass, ee))
        }
        None => Ok(row(Verdict::fail("Final read was not successful"), ee)),
    }
}
