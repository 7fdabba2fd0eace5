//! The day's results file.
//!
//! One CSV file per calendar day, `<dir>/<YYYY.MM.DD>_PCBTestResults.csv`. A new
//! file gets the header row; an existing one is appended to as is, so a bench
//! restarted during the day keeps a single file.

use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::NaiveDate;
use log::{info, warn};
use thiserror::Error;

use crate::{evaluate::TestResult, modules::ModuleKind};

pub const SERIAL_COLUMN: &str = "Serial Number";
pub const ELAPSED_COLUMN: &str = "Elapsed Time (s)";
/// First cell of a row written after a fatal error.
pub const ERROR_MARKER: &str = "ERROR";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Cannot open results log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Results log write failed: {0}")]
    Csv(#[from] csv::Error),
}

/// Header row for a run of `modules`.
pub fn header_for(modules: &[ModuleKind]) -> Vec<String> {
    std::iter::once(SERIAL_COLUMN)
        .chain(modules.iter().flat_map(|m| m.columns().iter().map(|c| c.name)))
        .chain(std::iter::once(ELAPSED_COLUMN))
        .map(str::to_string)
        .collect()
}

pub fn file_name(date: NaiveDate) -> String {
    format!("{}_PCBTestResults.csv", date.format("%Y.%m.%d"))
}

/// One tested board.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardRecord {
    pub serial: String,
    pub results: Vec<TestResult>,
    pub elapsed: Duration,
}

impl BoardRecord {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            results: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(TestResult::passed)
    }

    pub fn to_row(&self) -> Vec<String> {
        let mut row = vec![self.serial.clone()];
        row.extend(self.results.iter().flat_map(TestResult::rendered));
        row.push(format!("{:.1}", self.elapsed.as_secs_f64()));
        row
    }
}

pub struct ResultLog {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl ResultLog {
    /// Open (or create) the log for `date` under `dir`.
    pub fn open(dir: &Path, date: NaiveDate, header: &[String]) -> Result<Self, ReportError> {
        let io_err = |source| ReportError::Io {
            path: dir.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let path = dir.join(file_name(date));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;
        let is_new = file
            .metadata()
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?
            .len()
            == 0;

        // Error rows are shorter than the header.
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(file);
        if is_new {
            writer.write_record(header)?;
            writer.flush().map_err(csv::Error::from)?;
            info!("Created results log {}", path.display());
        } else {
            info!("Appending to results log {}", path.display());
        }
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &BoardRecord) -> Result<(), ReportError> {
        self.writer.write_record(record.to_row())?;
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Record that the session died, and on which board.
    pub fn append_error_marker(&mut self, serial: Option<&str>, message: &str) -> Result<(), ReportError> {
        self.writer
            .write_record([serial.unwrap_or(""), ERROR_MARKER, message])?;
        self.writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

impl Drop for ResultLog {
    fn drop(&mut self) {
        if let Err(err) = self.writer.flush() {
            warn!("Flushing {} failed: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluate::{Field, Verdict};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    fn record(serial: &str) -> BoardRecord {
        BoardRecord {
            serial: serial.into(),
            results: vec![TestResult::new(vec![
                Field::Status(Verdict::Pass),
                Field::Value(3.02),
            ])],
            elapsed: Duration::from_millis(41_260),
        }
    }

    #[test]
    fn header_follows_module_order() {
        let header = header_for(&[ModuleKind::Ldo3v, ModuleKind::SdCard]);
        assert_eq!(
            header,
            vec![
                "Serial Number",
                "3V LDO Status",
                "3V LDO Voltage",
                "SD Card Status",
                "Elapsed Time (s)"
            ]
        );
    }

    #[test]
    fn file_is_named_by_date() {
        assert_eq!(file_name(date()), "2024.03.07_PCBTestResults.csv");
    }

    #[test]
    fn row_rendering() {
        assert_eq!(record("0042").to_row(), vec!["0042", "Pass", "3.02", "41.3"]);
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let header = header_for(&[ModuleKind::Ldo3v]);

        let path = {
            let mut log = ResultLog::open(dir.path(), date(), &header).unwrap();
            log.append(&record("0001")).unwrap();
            log.path().to_path_buf()
        };
        {
            let mut log = ResultLog::open(dir.path(), date(), &header).unwrap();
            log.append(&record("0002")).unwrap();
        }

        let text = std::fs::read_to_string(path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Serial Number,3V LDO Status,3V LDO Voltage,Elapsed Time (s)",
                "0001,Pass,3.02,41.3",
                "0002,Pass,3.02,41.3"
            ]
        );
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("TestResults");
        let log = ResultLog::open(&nested, date(), &header_for(&[ModuleKind::SdCard])).unwrap();
        assert!(log.path().starts_with(&nested));
        assert!(log.path().exists());
    }

    #[test]
    fn error_marker_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut log = ResultLog::open(dir.path(), date(), &header_for(&[ModuleKind::Ldo3v])).unwrap();
            log.append_error_marker(Some("0003"), "GPIO error: Other").unwrap();
            log.path().to_path_buf()
        };
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().nth(1), Some("0003,ERROR,GPIO error: Other"));
    }

    #[test]
    fn record_pass_needs_every_module() {
        let mut board = record("0004");
        assert!(board.passed());
        board
            .results
            .push(TestResult::new(vec![Field::Status(Verdict::fail("Reading low"))]));
        assert!(!board.passed());
    }
}
