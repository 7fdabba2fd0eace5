//! Everything a test module needs, in one place.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use fugit::MillisDurationU32;
use log::info;

use crate::{
    adc::AnalogInput,
    bus::RegisterTransport,
    client::RegisterClient,
    config::{HarnessConfig, Limits, TimingConfig},
    error::BenchError,
    evaluate::{Verdict, decode_status},
    operator::Operator,
    rails::{Rail, RailSequencer},
    register::X2Input,
    wifi::{SearchSettings, WifiScanner},
};

/// The parts of the configuration the modules read.
#[derive(Debug, Clone)]
pub struct BenchSettings {
    pub limits: Limits,
    pub timing: TimingConfig,
    pub wifi: SearchSettings,
    /// Address the passthrough node is expected to report.
    pub node_address: u8,
}

impl From<&HarnessConfig> for BenchSettings {
    fn from(config: &HarnessConfig) -> Self {
        Self {
            limits: config.limits.clone(),
            timing: config.timing.clone(),
            wifi: SearchSettings {
                ssid: config.wifi.ssid.clone(),
                scans: config.retries.wifi_scans,
                pause: config.timing.wifi_scan_pause(),
            },
            node_address: config.devices.node_address,
        }
    }
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

/// Epoch seconds, UTC.
pub type Clock = Box<dyn Fn() -> i64>;

pub fn system_clock() -> Clock {
    Box::new(|| chrono::Utc::now().timestamp())
}

/// The bench and the board on it.
pub struct Bench<T: RegisterTransport, P: OutputPin + InputPin, D: DelayNs> {
    pub client: RegisterClient<T>,
    pub rails: RailSequencer<P, D>,
    pub adc: Box<dyn AnalogInput>,
    pub wifi: Box<dyn WifiScanner>,
    pub operator: Box<dyn Operator>,
    pub settings: BenchSettings,
    pub clock: Clock,
    stop: Arc<AtomicBool>,
}

impl<T: RegisterTransport, P: OutputPin + InputPin, D: DelayNs> Bench<T, P, D> {
    pub fn new(
        client: RegisterClient<T>,
        rails: RailSequencer<P, D>,
        adc: Box<dyn AnalogInput>,
        wifi: Box<dyn WifiScanner>,
        operator: Box<dyn Operator>,
        settings: BenchSettings,
    ) -> Self {
        Self {
            client,
            rails,
            adc,
            wifi,
            operator,
            settings,
            clock: system_clock(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Flag that ends the session at the next module boundary once set.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn check_interrupt(&self) -> Result<(), BenchError> {
        if self.stop.load(Ordering::SeqCst) {
            return Err(BenchError::Interrupted);
        }
        Ok(())
    }

    pub fn power_on(&mut self, rail: Rail) -> Result<bool, BenchError> {
        self.rails.ensure_on(&mut self.client, rail)
    }

    pub fn power_on_with_settle(&mut self, rail: Rail, settle: MillisDurationU32) -> Result<bool, BenchError> {
        self.rails.ensure_on_with_settle(&mut self.client, rail, settle)
    }

    pub fn power_off(&mut self, rail: Rail) -> Result<bool, BenchError> {
        self.rails.ensure_off(&mut self.client, rail)
    }

    pub fn force(&mut self, rail: Rail, on: bool) -> Result<bool, BenchError> {
        self.rails.force(&mut self.client, rail, on)
    }

    pub fn pause(&mut self, duration: MillisDurationU32) {
        self.rails.pause(duration);
    }

    /// Take the board's primary input down and back up again.
    pub fn power_cycle_primary(&mut self) -> Result<(), BenchError> {
        info!("Power cycling the board...");
        self.power_off(Rail::Primary)?;
        let wait = self.settings.timing.power_cycle();
        self.pause(wait);
        self.power_on(Rail::Primary)?;
        Ok(())
    }

    /// Read and classify a one-word status register.
    pub fn check_status(&mut self, register: X2Input, name: &str) -> (Verdict, i64) {
        info!("Reading {name} Status...");
        let raw = self.client.read_word(register);
        let (verdict, value) = decode_status(name, raw);
        info!("The {name} status is {verdict}");
        (verdict, value)
    }

    /// Bring every host rail down so the board can be swapped.
    pub fn power_down(&mut self) -> Result<(), BenchError> {
        for rail in Rail::HOST {
            self.power_off(rail)?;
        }
        Ok(())
    }
}
