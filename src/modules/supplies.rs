//! Supply rails: the 3V LDO on the bench ADC, the switched regulators, the sensor
//! ports and the total current draw.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::info;

use super::ModuleKind;
use crate::{
    bench::Bench,
    bus::RegisterTransport,
    config::Tolerance,
    error::BenchError,
    evaluate::{Field, TestResult, Verdict, range_check},
    rails::Rail,
    register::X2Input,
};

/// ADC channel wired to the 3V LDO output.
const LDO3V_CHANNEL: u8 = 0;

fn in_range(limit: Tolerance, value: f64) -> Verdict {
    range_check(limit.expected, limit.tolerance, value)
}

pub(super) fn ldo3v<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Reading 3V LDO Voltage...");
    let volts = bench.adc.read_volts(LDO3V_CHANNEL, 1.0)?;
    info!("The read voltage is {volts}");
    let verdict = in_range(bench.settings.limits.ldo3v, volts);
    Ok(TestResult::new(vec![Field::Status(verdict), Field::Value(volts)]))
}

/// One of the switched regulators. The runner has already enabled it.
pub(super) fn regulator<T, P, D>(bench: &mut Bench<T, P, D>, kind: ModuleKind) -> TestResult
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let limits = &bench.settings.limits;
    let (register, limit) = match kind {
        ModuleKind::Sepic12 => (X2Input::Sepic12Voltage, limits.sepic12),
        ModuleKind::Ldo5 => (X2Input::Ldo5Voltage, limits.ldo5),
        _ => (X2Input::Vcc33Voltage, limits.sepic33),
    };
    let name = kind.name();

    info!("Reading {name} Voltage...");
    match bench.client.read_float(register) {
        Some(volts) => {
            info!("The {name} voltage level is {volts}");
            TestResult::new(vec![Field::Status(in_range(limit, volts)), Field::Value(volts)])
        }
        None => TestResult::new(vec![
            Field::Status(Verdict::Fail(format!(
                "Reading the {name} voltage was not successful"
            ))),
            Field::missing(),
        ]),
    }
}

/// Switch each 12V sensor port on in turn, measure it and switch it off again.
pub(super) fn sensor_ports<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let ports = [
        (Rail::SensorPort1, X2Input::SensorPort1Voltage),
        (Rail::SensorPort2, X2Input::SensorPort2Voltage),
        (Rail::SensorPort3, X2Input::SensorPort3Voltage),
        (Rail::SensorPort4, X2Input::SensorPort4Voltage),
    ];
    let limit = bench.settings.limits.sensor_port;
    let mut fields = Vec::with_capacity(ports.len() * 2);

    for (rail, register) in ports {
        if !bench.power_on(rail)? {
            fields.push(Field::Status(Verdict::Fail(format!(
                "Enabling the {} was not successful",
                rail.label()
            ))));
            fields.push(Field::missing());
            continue;
        }

        match bench.client.read_float(register) {
            Some(volts) => {
                info!("The {} voltage level is {volts}", rail.label());
                fields.push(Field::Status(in_range(limit, volts)));
                fields.push(Field::Value(volts));
            }
            None => {
                fields.push(Field::Status(Verdict::Fail(format!(
                    "Reading the {} voltage was not successful",
                    rail.label()
                ))));
                fields.push(Field::missing());
            }
        }
        bench.power_off(rail)?;
    }
    Ok(TestResult::new(fields))
}

pub(super) fn system_current<T, P, D>(bench: &mut Bench<T, P, D>) -> TestResult
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Reading the system current...");
    match bench.client.read_float(X2Input::SystemCurrent) {
        Some(ma) => {
            let verdict = in_range(bench.settings.limits.system_current, ma);
            TestResult::new(vec![Field::Status(verdict), Field::Value(ma)])
        }
        None => TestResult::new(vec![
            Field::Status(Verdict::fail("The Modbus read failed")),
            Field::missing(),
        ]),
    }
}
