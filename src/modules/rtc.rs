//! RTC backup battery and timekeeping across a power cycle.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::info;

use crate::{
    bench::Bench,
    bus::RegisterTransport,
    error::BenchError,
    evaluate::{Field, TestResult, Verdict, range_check},
    register::{X2Control, X2Input},
    words::{epoch_from_time_words, set_time_payload},
};

fn format_epoch(epoch: i64) -> String {
    chrono::DateTime::from_timestamp(epoch, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

pub(super) fn battery_and_clock<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let mut fields = battery(bench);
    let (verdict, drift) = clock(bench)?;
    fields.push(Field::Status(verdict));
    fields.push(drift.map_or_else(Field::missing, Field::Count));
    Ok(TestResult::new(fields))
}

fn battery<T, P, D>(bench: &mut Bench<T, P, D>) -> Vec<Field>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Reading the RTC Voltage...");
    match bench.client.read_float(X2Input::RtcBatteryVoltage) {
        Some(volts) => {
            info!("The RTC Battery voltage is {volts}");
            let limit = bench.settings.limits.rtc_battery;
            vec![
                Field::Status(range_check(limit.expected, limit.tolerance, volts)),
                Field::Value(volts),
            ]
        }
        None => vec![
            Field::Status(Verdict::fail("Voltage read not successful")),
            Field::missing(),
        ],
    }
}

/// Set the clock from the host, power cycle, and see how far it moved.
fn clock<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<(Verdict, Option<i64>), BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Reading Time from X2...");
    let Some(initial) = bench.client.read(X2Input::ReadTime).and_then(|w| epoch_from_time_words(&w)) else {
        return Ok((Verdict::fail("Initial time read not successful"), None));
    };
    info!("The device's original time is {}", format_epoch(initial as i64));

    let now = (bench.clock)();
    info!("Writing current time {}...", format_epoch(now));
    let payload = set_time_payload(now.clamp(0, u32::MAX as i64) as u32);
    if bench.client.write(X2Control::SetTime, &payload).is_none() {
        return Ok((Verdict::fail("Time write not successful"), None));
    }

    bench.power_cycle_primary()?;

    info!("Reading Time from X2...");
    let Some(after) = bench.client.read(X2Input::ReadTime).and_then(|w| epoch_from_time_words(&w)) else {
        return Ok((Verdict::fail("Final time read not successful"), None));
    };
    info!("The device's final time is {}", format_epoch(after as i64));

    let drift = after as i64 - (bench.clock)();
    let limit = bench.settings.limits.clock_drift_s;
    let verdict = if drift.abs() <= limit {
        info!("Success! The RTC Clock was {drift} seconds off");
        Verdict::Pass
    } else {
        info!("Failure! The RTC Clock was {drift} seconds off");
        Verdict::fail("Clock drift out of range")
    };
    Ok((verdict, Some(drift)))
}
