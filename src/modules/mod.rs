//! The test catalogue.
//!
//! Each module declares the rails it needs and the columns it fills. The runner
//! applies the rails before the module body runs; if a rail cannot be switched the
//! body is skipped and every column is filled with a failure so the row keeps its
//! shape.

mod passthrough;
mod priority;
mod processor;
mod radio;
mod rtc;
mod storage;
mod supplies;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::{
    bench::Bench,
    bus::RegisterTransport,
    error::BenchError,
    evaluate::{Field, TestResult, Verdict},
    rails::{Preconditions, Rail},
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// `Pass` or `Fail-<reason>`.
    Status,
    /// A number, or the no-reading sentinel.
    Reading,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn status(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Status,
    }
}

const fn reading(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Reading,
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Ldo3v,
    ProcessorEe,
    Rtc,
    Sepic33,
    Sepic12,
    Ldo5,
    SensorPorts,
    SerialFlash,
    SdCard,
    SystemCurrent,
    PriorityPower,
    Wifi,
    StatusLed,
    Passthrough,
}

const CATALOGUE: [ModuleKind; 14] = [
    ModuleKind::Ldo3v,
    ModuleKind::ProcessorEe,
    ModuleKind::Rtc,
    ModuleKind::Sepic33,
    ModuleKind::Sepic12,
    ModuleKind::Ldo5,
    ModuleKind::SensorPorts,
    ModuleKind::SerialFlash,
    ModuleKind::SdCard,
    ModuleKind::SystemCurrent,
    ModuleKind::PriorityPower,
    ModuleKind::Wifi,
    ModuleKind::StatusLed,
    ModuleKind::Passthrough,
];

impl ModuleKind {
    /// Every module, in the order a full board test runs them.
    pub const fn catalogue() -> &'static [ModuleKind] {
        &CATALOGUE
    }

    pub const fn name(self) -> &'static str {
        use ModuleKind as M;
        match self {
            M::Ldo3v => "3V LDO",
            M::ProcessorEe => "Processor, RS-485 & EE",
            M::Rtc => "RTC",
            M::Sepic33 => "3.3V SEPIC",
            M::Sepic12 => "12V SEPIC",
            M::Ldo5 => "5V LDO",
            M::SensorPorts => "12V Sensor Ports",
            M::SerialFlash => "Serial Flash",
            M::SdCard => "SD Card",
            M::SystemCurrent => "System Current",
            M::PriorityPower => "Priority Power Switch",
            M::Wifi => "Wi-Fi",
            M::StatusLed => "Status LED",
            M::Passthrough => "T-Node Passthrough",
        }
    }

    pub const fn preconditions(self) -> Preconditions {
        use ModuleKind as M;
        match self {
            M::Ldo3v | M::ProcessorEe | M::Rtc | M::StatusLed => Preconditions::on(&[Rail::Primary]),
            M::Sepic33 | M::SerialFlash | M::SdCard | M::SystemCurrent | M::Wifi => {
                Preconditions::on(&[Rail::Primary, Rail::Sepic33])
            }
            M::Sepic12 | M::SensorPorts => Preconditions::on(&[Rail::Primary, Rail::Sepic12]),
            M::Ldo5 => Preconditions::on(&[Rail::Primary, Rail::Ldo5]),
            M::PriorityPower => Preconditions::handover(&[Rail::Backup], &[Rail::Primary, Rail::Secondary]),
            M::Passthrough => Preconditions::on(&[Rail::Passthrough]),
        }
    }

    pub const fn columns(self) -> &'static [Column] {
        use ModuleKind as M;
        match self {
            M::Ldo3v => LDO3V_COLUMNS,
            M::ProcessorEe => PROCESSOR_COLUMNS,
            M::Rtc => RTC_COLUMNS,
            M::Sepic33 => SEPIC33_COLUMNS,
            M::Sepic12 => SEPIC12_COLUMNS,
            M::Ldo5 => LDO5_COLUMNS,
            M::SensorPorts => SENSOR_PORT_COLUMNS,
            M::SerialFlash => FLASH_COLUMNS,
            M::SdCard => SD_COLUMNS,
            M::SystemCurrent => CURRENT_COLUMNS,
            M::PriorityPower => PRIORITY_COLUMNS,
            M::Wifi => WIFI_COLUMNS,
            M::StatusLed => LED_COLUMNS,
            M::Passthrough => NODE_COLUMNS,
        }
    }
}

const LDO3V_COLUMNS: &[Column] = &[status("3V LDO Status"), reading("3V LDO Voltage")];
const PROCESSOR_COLUMNS: &[Column] = &[status("Processor & Host RS-485 Status"), status("EE Status")];
const RTC_COLUMNS: &[Column] = &[
    status("RTC Battery Status"),
    reading("RTC Battery Voltage"),
    status("RTC Clock Status"),
    reading("RTC Clock Drift (s)"),
];
const SEPIC33_COLUMNS: &[Column] = &[status("3.3V SEPIC Status"), reading("3.3V SEPIC Voltage")];
const SEPIC12_COLUMNS: &[Column] = &[status("12V SEPIC Status"), reading("12V SEPIC Voltage")];
const LDO5_COLUMNS: &[Column] = &[status("5V LDO Status"), reading("5V LDO Voltage")];
const SENSOR_PORT_COLUMNS: &[Column] = &[
    status("Port 1 Status"),
    reading("Port 1 Voltage"),
    status("Port 2 Status"),
    reading("Port 2 Voltage"),
    status("Port 3 Status"),
    reading("Port 3 Voltage"),
    status("Port 4 Status"),
    reading("Port 4 Voltage"),
];
const FLASH_COLUMNS: &[Column] = &[status("Serial Flash Status")];
const SD_COLUMNS: &[Column] = &[status("SD Card Status")];
const CURRENT_COLUMNS: &[Column] = &[status("System Current Status"), reading("System Current (mA)")];
const PRIORITY_COLUMNS: &[Column] = &[
    status("Backup Input Status"),
    reading("Backup Input Voltage"),
    reading("Backup Input Valid"),
    status("Secondary Input Status"),
    reading("Secondary Input Voltage"),
    reading("Secondary Input Valid"),
    status("Primary Input Status"),
    reading("Primary Input Voltage"),
    reading("Primary Input Valid"),
    status("Primary Disconnect Status"),
    reading("Primary Disconnect Valid"),
];
const WIFI_COLUMNS: &[Column] = &[status("Wi-Fi Status")];
const LED_COLUMNS: &[Column] = &[status("Status LED Status")];
const NODE_COLUMNS: &[Column] = &[status("T-Node Status"), reading("T-Node Address")];

/// Apply a module's preconditions and run it.
pub fn run_module<T, P, D>(bench: &mut Bench<T, P, D>, kind: ModuleKind) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    info!("==================== {} ====================", kind.name());
    let columns = kind.columns();

    if let Some(rail) = bench.rails.apply(&mut bench.client, &kind.preconditions())? {
        info!("Enabling the {} was not successful", rail.label());
        return Ok(precondition_failure(columns, rail));
    }

    use ModuleKind as M;
    let result = match kind {
        M::Ldo3v => supplies::ldo3v(bench)?,
        M::ProcessorEe => processor::address_and_ee(bench)?,
        M::Rtc => rtc::battery_and_clock(bench)?,
        M::Sepic33 | M::Sepic12 | M::Ldo5 => supplies::regulator(bench, kind),
        M::SensorPorts => supplies::sensor_ports(bench)?,
        M::SerialFlash => storage::serial_flash(bench),
        M::SdCard => storage::sd_card(bench),
        M::SystemCurrent => supplies::system_current(bench),
        M::PriorityPower => priority::priority_switch(bench)?,
        M::Wifi => radio::find_network(bench)?,
        M::StatusLed => status_led(bench)?,
        M::Passthrough => passthrough::node_address(bench),
    };
    Ok(fit(result, columns, kind))
}

fn precondition_failure(columns: &[Column], rail: Rail) -> TestResult {
    let fields = columns
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Status => Field::Status(Verdict::Fail(format!(
                "Enabling the {} was not successful",
                rail.label()
            ))),
            ColumnKind::Reading => Field::missing(),
        })
        .collect();
    TestResult::new(fields)
}

/// Keep the row aligned with the header whatever the module returned.
fn fit(mut result: TestResult, columns: &[Column], kind: ModuleKind) -> TestResult {
    if result.fields.len() != columns.len() {
        warn!(
            "{} returned {} fields for {} columns",
            kind.name(),
            result.fields.len(),
            columns.len()
        );
        result.fields.resize_with(columns.len(), Field::missing);
    }
    result
}

fn status_led<T, P, D>(bench: &mut Bench<T, P, D>) -> Result<TestResult, BenchError>
where
    T: RegisterTransport,
    P: OutputPin + InputPin,
    D: DelayNs,
{
    let seen = bench.operator.confirm("Is the status LED on the X2 blinking?")?;
    let verdict = if seen {
        Verdict::Pass
    } else {
        Verdict::fail("The operator did not see the status LED")
    };
    Ok(TestResult::new(vec![Field::Status(verdict)]))
}
