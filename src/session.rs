//! The batch loop: serial number in, every module run, one row out.

use std::time::Instant;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::{error, info, warn};

use crate::{
    bench::Bench,
    bus::RegisterTransport,
    error::BenchError,
    modules::{ModuleKind, run_module},
    report::{BoardRecord, ResultLog},
};

/// Run `modules` in order against the board on the bench.
pub fn test_board<T, P, D>(
    bench: &mut Bench<T, P, D>,
    modules: &[ModuleKind],
    serial: &str,
) -> Result<BoardRecord, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Testing board {serial}");
    let started = Instant::now();
    let mut record = BoardRecord::new(serial);
    for &kind in modules {
        bench.check_interrupt()?;
        record.results.push(run_module(bench, kind)?);
    }
    record.elapsed = started.elapsed();
    info!(
        "Board {serial} {} in {:.1} s",
        if record.passed() { "passed" } else { "failed" },
        record.elapsed.as_secs_f64()
    );
    Ok(record)
}

/// Test boards until the operator is done. Returns the number of rows written.
///
/// `current` is kept up to date with the serial number on the bench, so the
/// caller can name the board when an error ends the session.
pub fn run_session<T, P, D>(
    bench: &mut Bench<T, P, D>,
    modules: &[ModuleKind],
    log: &mut ResultLog,
    serial_length: usize,
    current: &mut Option<String>,
) -> Result<usize, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let mut rows = 0;
    loop {
        bench.check_interrupt()?;
        let Some(serial) = bench.operator.serial_number(serial_length)? else {
            info!("Operator is done, {rows} rows written to {}", log.path().display());
            return Ok(rows);
        };
        *current = Some(serial.clone());

        loop {
            let record = test_board(bench, modules, &serial)?;
            log.append(&record)?;
            rows += 1;
            if !bench.operator.confirm("Re-test this board?")? {
                break;
            }
        }

        bench.power_down()?;
        *current = None;
    }
}

/// Leave a trace of a fatal error in the log and hold the console until the
/// operator has read it.
pub fn record_fatal<T, P, D>(
    bench: &mut Bench<T, P, D>,
    log: &mut ResultLog,
    serial: Option<&str>,
    err: &BenchError,
) where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    error!("The program encountered the following error: {err}");
    if let Err(log_err) = log.append_error_marker(serial, &err.to_string()) {
        error!("Could not record the error in the results log: {log_err}");
    }
    if let Err(ack_err) = bench.operator.acknowledge("Press Enter to exit") {
        warn!("Operator console unavailable: {ack_err}");
    }
}
