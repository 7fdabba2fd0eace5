//! Pass/fail decisions and the shape of a module result.

use core::fmt;

use modular_bitfield::prelude::*;

/// Logged in place of a reading that could not be taken.
pub const NO_READING: i64 = -999_999;

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn fail(reason: impl Into<String>) -> Self {
        Verdict::Fail(reason.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// Renders as `Pass` or `Fail-<reason>`, the form the results log has always used.
impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("Pass"),
            Verdict::Fail(reason) => write!(f, "Fail-{reason}"),
        }
    }
}

/// Check `observed` lies strictly inside `expected ± tolerance`.
pub fn range_check(expected: f64, tolerance: f64, observed: f64) -> Verdict {
    // NaN lands in the low branch.
    if !(observed > expected - tolerance) {
        log::info!("Reading is too low. It is {observed}");
        Verdict::fail("Reading low")
    } else if observed < expected + tolerance {
        log::info!("Reading is in range. It is {observed}");
        Verdict::Pass
    } else {
        log::info!("Reading is too high. It is {observed}");
        Verdict::fail("Reading high")
    }
}

/// Classify a one-register status read. `None` means the read itself failed.
///
/// Returns the verdict and the value to log next to it.
pub fn decode_status(name: &str, raw: Option<u16>) -> (Verdict, i64) {
    match raw {
        Some(1) => (Verdict::Pass, 1),
        Some(0) => (
            Verdict::Fail(format!("The {name} status was returned as bad")),
            0,
        ),
        Some(other) => (
            Verdict::Fail(format!("The {name} status was returned as an unknown value")),
            other as i64,
        ),
        None => (
            Verdict::fail("The Modbus read failed. No status received"),
            NO_READING,
        ),
    }
}

/// The power input valid lines as reported by the X2.
#[bitfield(bits = 16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ValidLines {
    pub primary: bool,
    pub secondary: bool,
    pub backup: bool,
    #[skip]
    __: B13,
}

impl ValidLines {
    pub fn from_raw(raw: u16) -> Self {
        Self::from_bytes(raw.to_le_bytes())
    }

    pub fn raw(&self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }
}

/// One cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Status(Verdict),
    Value(f64),
    Count(i64),
}

impl Field {
    pub fn missing() -> Self {
        Field::Count(NO_READING)
    }

    /// A reading, or the sentinel when there is none.
    pub fn reading(value: Option<f64>) -> Self {
        value.map_or_else(Field::missing, Field::Value)
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Field::Status(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Status(v) => v.fmt(f),
            Field::Value(v) => write!(f, "{v}"),
            Field::Count(v) => write!(f, "{v}"),
        }
    }
}

/// The fields one module contributes to the board's row, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TestResult {
    pub fields: Vec<Field>,
}

impl TestResult {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// True if no verdict in the result is a fail.
    pub fn passed(&self) -> bool {
        self.fields
            .iter()
            .filter_map(Field::verdict)
            .all(Verdict::is_pass)
    }

    pub fn rendered(&self) -> Vec<String> {
        self.fields.iter().map(ToString::to_string).collect()
    }
}
