//! Priority power switch.
//!
//! The board starts on the backup input alone; secondary and then primary are
//! added, and after each step the input voltage and the valid lines must match.
//! Finally the primary is disconnected through `PPP_Dis` and the valid lines
//! must drop back to secondary and backup.

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
    evaluate::{Field, TestResult, ValidLines, Verdict, range_check},
    rails::Rail,
    register::{X2Control, X2Input},
};

pub(super) fn priority_switch<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    // The valid lines are only readable with the 3.3V SEPIC up.
    let valid_readable = bench.power_on(Rail::Sepic33)?;
    let no_settle = MillisDurationU32::millis(0);

    let mut fields = Vec::with_capacity(11);
    let backup = ValidLines::new().with_backup(true);
    info!("Testing the Backup Input...");
    fields.extend(channel(bench, X2Input::BackupVoltage, valid_readable, backup));

    bench.power_on_with_settle(Rail::Secondary, no_settle)?;
    let secondary = backup.with_secondary(true);
    info!("Testing the Secondary Input...");
    fields.extend(channel(bench, X2Input::SecondaryVoltage, valid_readable, secondary));

    bench.power_on_with_settle(Rail::Primary, no_settle)?;
    let primary = secondary.with_primary(true);
    info!("Testing the Primary Input...");
    fields.extend(channel(bench, X2Input::PrimaryVoltage, valid_readable, primary));

    fields.extend(disconnect_primary(bench, secondary));

    bench.power_off(Rail::Secondary)?;
    bench.power_off(Rail::Backup)?;
    Ok(TestResult::new(fields))
}

/// Status, voltage and valid-lines word for one input.
fn channel<T, P, D>(
    bench: &mut Bench<T, P, D>,
    register: X2Input,
    valid_readable: bool,
    expected: ValidLines,
) -> [Field; 3]
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let limit = bench.settings.limits.power_input;
    let volts = bench.client.read_float(register);
    let voltage_ok = match volts {
        Some(v) => {
            info!("The channel voltage level is {v}");
            range_check(limit.expected, limit.tolerance, v).is_pass()
        }
        None => {
            info!("The channel voltage read was not successful");
            false
        }
    };

    let (valid, valid_ok) = if !valid_readable {
        (Field::Status(Verdict::fail("Enabling 3.3V SEPIC was not successful")), false)
    } else {
        match bench.client.read_word(X2Input::ValidLines) {
            Some(raw) if ValidLines::from_raw(raw) == expected => {
                info!("The correct valid lines were enabled");
                (Field::Count(raw as i64), true)
            }
            Some(raw) => {
                info!("The incorrect valid lines were enabled: {raw:#05b}");
                (Field::Count(raw as i64), false)
            }
            None => {
                info!("Reading the valid lines was not successful");
                let reason = "Reading the valid lines was not successful";
                (Field::Status(Verdict::fail(reason)), false)
            }
        }
    };

    let status = if voltage_ok && valid_ok {
        Verdict::Pass
    } else {
        Verdict::Fail(format!(
            "Channel voltage returned {voltage_ok} and channel valid returned {valid_ok}"
        ))
    };
    [
        Field::Status(status),
        Field::reading(volts),
        valid,
    ]
}

fn disconnect_primary<T, P, D>(bench: &mut Bench<T, P, D>, expected: ValidLines) -> [Field; 2]
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("Triggering disconnect of Primary Power...");
    if bench.client.write(X2Control::PrimaryDisconnect, &[1]).is_none() {
        return [
            Field::Status(Verdict::fail("Disabling primary power failed")),
            Field::missing(),
        ];
    }

    let fields = match bench.client.read_word(X2Input::ValidLines) {
        Some(raw) => {
            let verdict = if ValidLines::from_raw(raw) == expected {
                Verdict::Pass
            } else {
                Verdict::fail("The incorrect valid lines were set")
            };
            [Field::Status(verdict), Field::Count(raw as i64)]
        }
        None => [
            Field::Status(Verdict::fail("Reading the valid lines was not successful")),
            Field::missing(),
        ],
    };

    if bench.client.write(X2Control::PrimaryDisconnect, &[0]).is_none() {
        info!("Reconnecting primary power was not successful");
    }
    fields
}

#[cfg(test)]
mod tests {
    use crate::bench::tests::test_bench;
    use crate::modules::{ModuleKind, run_module};
    use crate::rails::Rail;
    use crate::retry::tests::{Call, Fault};

    fn ok() -> Result<Vec<u16>, Fault> {
        Ok(vec![])
    }

    fn volts(v: f32) -> Result<Vec<u16>, Fault> {
        let raw = v.to_bits();
        Ok(vec![(raw >> 16) as u16, raw as u16])
    }

    #[test]
    fn inputs_come_up_in_priority_order() {
        let (mut bench, fakes) = test_bench(vec![
            ok(),
            ok(),
            volts(12.0),
            Ok(vec![0b100]),
            ok(),
            volts(12.1),
            Ok(vec![0b110]),
            ok(),
            volts(11.9),
            Ok(vec![0b111]),
            ok(),
            Ok(vec![0b110]),
            ok(),
        ]);

        let result = run_module(&mut bench, ModuleKind::PriorityPower).unwrap();

        assert_eq!(
            result.rendered(),
            vec![
                "Pass", "12", "4", "Pass", "12.1", "6", "Pass", "11.9", "7", "Pass", "6"
            ]
        );
        let disconnects: Vec<_> = bench
            .client
            .transport()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Write { address: 0x3013, values, .. } => Some(values[0]),
                _ => None,
            })
            .collect();
        assert_eq!(disconnects, vec![1, 0]);
        // Primary stays up, secondary and backup are dropped.
        assert!(fakes.pins[0].is_set());
        assert!(!fakes.pins[1].is_set());
        assert!(!fakes.pins[2].is_set());
    }

    #[test]
    fn switch_is_tested_on_a_live_board() {
        let (mut bench, fakes) = test_bench(vec![
            ok(),
            ok(),
            ok(),
            volts(12.0),
            Ok(vec![0b100]),
            ok(),
            volts(12.0),
            Ok(vec![0b110]),
            ok(),
            volts(12.0),
            Ok(vec![0b111]),
            ok(),
            Ok(vec![0b110]),
            ok(),
        ]);
        bench.power_on(Rail::Primary).unwrap();

        let result = run_module(&mut bench, ModuleKind::PriorityPower).unwrap();

        assert!(result.passed());
        // Backup joins with no settle, then Primary drops.
        assert_eq!(fakes.delay.calls()[2..4], [100, 5000]);
    }

    #[test]
    fn valid_lines_read_fails() {
        let mut script = vec![ok(), ok(), volts(12.0)];
        script.extend([Err(Fault), Err(Fault), Err(Fault)]);
        let (mut bench, _) = test_bench(script);
        let result = run_module(&mut bench, ModuleKind::PriorityPower).unwrap();
        assert_eq!(
            result.rendered()[2],
            "Fail-Reading the valid lines was not successful"
        );
    }

    #[test]
    fn wrong_valid_lines() {
        let (mut bench, _) = test_bench(vec![
            ok(),
            ok(),
            volts(12.0),
            Ok(vec![0b000]),
            ok(),
            volts(12.0),
            Ok(vec![0b110]),
            ok(),
            volts(12.0),
            Ok(vec![0b111]),
            ok(),
            Ok(vec![0b111]),
            ok(),
        ]);
        let result = run_module(&mut bench, ModuleKind::PriorityPower).unwrap();
        let row = result.rendered();
        assert_eq!(
            row[0],
            "Fail-Channel voltage returned true and channel valid returned false"
        );
        assert_eq!(row[2], "0");
        assert_eq!(row[9], "Fail-The incorrect valid lines were set");
        assert_eq!(row[10], "7");
    }

    #[test]
    fn valid_lines_skipped_without_sepic() {
        // Backup on and the Wi-Fi write succeed; the SEPIC switch fails three times.
        let mut script = vec![ok(), Err(Fault), Err(Fault), Err(Fault)];
        script.extend([volts(12.0), ok(), volts(12.0), ok(), volts(12.0)]);
        script.extend([ok(), Ok(vec![0b110]), ok()]);
        let (mut bench, _) = test_bench(script);

        let result = run_module(&mut bench, ModuleKind::PriorityPower).unwrap();

        let row = result.rendered();
        for status in [0, 3, 6] {
            assert_eq!(
                row[status],
                "Fail-Channel voltage returned true and channel valid returned false"
            );
            assert_eq!(row[status + 2], "Fail-Enabling 3.3V SEPIC was not successful");
        }
        assert_eq!(row[9], "Pass");
    }

    #[test]
    fn disconnect_write_fails() {
        let mut script = vec![
            ok(),
            ok(),
            volts(12.0),
            Ok(vec![0b100]),
            ok(),
            volts(12.0),
            Ok(vec![0b110]),
            ok(),
            volts(12.0),
            Ok(vec![0b111]),
        ];
        script.extend([Err(Fault), Err(Fault), Err(Fault)]);
        let (mut bench, _) = test_bench(script);
        let result = run_module(&mut bench, ModuleKind::PriorityPower).unwrap();
        assert_eq!(
            result.rendered()[9..],
            ["Fail-Disabling primary power failed", "-999999"]
        );
    }
}
