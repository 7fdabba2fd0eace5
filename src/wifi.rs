//! Looking for the X2's access point from the bench.

use std::process::Command;

use fugit::MillisDurationU32;
use log::{debug, info};
use thiserror::Error;

use crate::evaluate::Verdict;

/// How often a scan that errors out is tried again before giving up.
pub const BUSY_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The host is using the radio, e.g. for its own background scan.
    #[error("Wi-Fi interface busy: {0}")]
    Busy(String),
    #[error("Could not run the scan tool: {0}")]
    Io(#[from] std::io::Error),
}

/// Lists the SSIDs currently visible.
pub trait WifiScanner {
    fn scan(&mut self) -> Result<Vec<String>, ScanError>;
}

/// Scans with `iwlist <interface> scan`.
pub struct IwlistScanner {
    interface: String,
}

impl IwlistScanner {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

impl WifiScanner for IwlistScanner {
    fn scan(&mut self) -> Result<Vec<String>, ScanError> {
        let output = Command::new("iwlist")
            .arg(&self.interface)
            .arg("scan")
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Busy(stderr.trim().to_string()));
        }
        Ok(parse_essids(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Pull the `ESSID:"..."` values out of `iwlist` output. Hidden networks are skipped.
pub fn parse_essids(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix("ESSID:\"")?;
            let ssid = rest.strip_suffix('"')?;
            (!ssid.is_empty()).then(|| ssid.to_string())
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    /// Substring the SSID must contain.
    pub ssid: String,
    /// Scans before the network counts as missing.
    pub scans: u32,
    /// Wait between scans, and after a busy radio.
    pub pause: MillisDurationU32,
}

/// Scan until an SSID containing `settings.ssid` shows up.
///
/// A scan that errors is treated as the radio being busy; the whole search is
/// restarted up to [`BUSY_ATTEMPTS`] times.
pub fn search_network(
    scanner: &mut dyn WifiScanner,
    settings: &SearchSettings,
    mut pause: impl FnMut(MillisDurationU32),
) -> Verdict {
    if settings.scans == 0 {
        return Verdict::fail("Network not found");
    }

    for busy_attempt in 1..=BUSY_ATTEMPTS {
        info!("Looking for an {} Wi-Fi network...", settings.ssid);
        match scan_for(scanner, settings, &mut pause) {
            Ok(true) => {
                info!("Successfully found the Wi-Fi network");
                return Verdict::Pass;
            }
            Ok(false) => {
                info!("Failed to find a {} network", settings.ssid);
                return Verdict::fail("Network not found");
            }
            Err(err) => {
                pause(settings.pause);
                debug!("Wi-Fi network resource busy on attempt {busy_attempt} of {BUSY_ATTEMPTS}: {err}");
            }
        }
    }
    Verdict::fail("RPi was using the Wi-Fi resource")
}

fn scan_for(
    scanner: &mut dyn WifiScanner,
    settings: &SearchSettings,
    pause: &mut impl FnMut(MillisDurationU32),
) -> Result<bool, ScanError> {
    for scan in 1..=settings.scans {
        let ssids = scanner.scan()?;
        debug!("Networks found: {ssids:?}");
        if let Some(found) = ssids.iter().find(|s| s.contains(&settings.ssid)) {
            debug!("Attempt {scan} of {} found network {found}", settings.scans);
            return Ok(true);
        }
        debug!("Attempt {scan} of {} found nothing", settings.scans);
        if scan < settings.scans {
            pause(settings.pause);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_hw::FakeScanner;

    fn settings(scans: u32) -> SearchSettings {
        SearchSettings {
            ssid: "X2 Logger".into(),
            scans,
            pause: MillisDurationU32::millis(2000),
        }
    }

    #[test]
    fn parses_iwlist_output() {
        let text = r#"
wlan0     Scan completed :
          Cell 01 - Address: 00:11:22:33:44:55
                    ESSID:"X2 Logger 0042"
                    Mode:Master
          Cell 02 - Address: 66:77:88:99:AA:BB
                    ESSID:""
          Cell 03 - Address: 66:77:88:99:AA:BC
                    ESSID:"Office"
"#;
        assert_eq!(parse_essids(text), vec!["X2 Logger 0042", "Office"]);
    }

    #[test]
    fn found_on_second_scan() {
        let mut scanner = FakeScanner::new(vec![
            Ok(vec!["Office".into()]),
            Ok(vec!["Office".into(), "X2 Logger 0042".into()]),
        ]);
        let mut pauses = Vec::new();
        let verdict = search_network(&mut scanner, &settings(3), |d| pauses.push(d.to_millis()));

        assert_eq!(verdict, Verdict::Pass);
        assert_eq!(scanner.scans(), 2);
        assert_eq!(pauses, vec![2000]);
    }

    #[test]
    fn not_found_after_all_scans() {
        let mut scanner = FakeScanner::new(vec![Ok(vec![]), Ok(vec![]), Ok(vec![])]);
        let mut pauses = 0;
        let verdict = search_network(&mut scanner, &settings(3), |_| pauses += 1);

        assert_eq!(verdict.to_string(), "Fail-Network not found");
        assert_eq!(scanner.scans(), 3);
        // No pause after the last scan.
        assert_eq!(pauses, 2);
    }

    #[test]
    fn busy_radio_restarts_search() {
        let mut scanner = FakeScanner::new(vec![
            Err(ScanError::Busy("Device or resource busy".into())),
            Ok(vec!["X2 Logger".into()]),
        ]);
        let verdict = search_network(&mut scanner, &settings(3), |_| {});
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn radio_busy_every_time() {
        let mut scanner = FakeScanner::new(vec![]);
        let verdict = search_network(&mut scanner, &settings(3), |_| {});
        assert_eq!(verdict.to_string(), "Fail-RPi was using the Wi-Fi resource");
        assert_eq!(scanner.scans(), 3);
    }

    #[test]
    fn zero_scans_fails_without_scanning() {
        let mut scanner = FakeScanner::new(vec![Ok(vec!["X2 Logger".into()])]);
        let verdict = search_network(&mut scanner, &settings(0), |_| {});
        assert_eq!(verdict.to_string(), "Fail-Network not found");
        assert_eq!(scanner.scans(), 0);
    }
}
