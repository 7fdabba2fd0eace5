//! Power rail sequencing.
//!
//! Host rails are switched by GPIO lines on the bench and read back from the same
//! lines. Device rails are switches inside the X2, driven over Modbus, and their
//! state is whatever we last wrote successfully.
//!
//! Whenever a host rail feeding the X2 comes up, the X2's Wi-Fi module is switched
//! off straight after the settle delay. The module shares the RS-485 lines
//! physically and its chatter makes the bus unreliable.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use fugit::MillisDurationU32;
use log::{debug, info, warn};
use strum::EnumCount;
use strum_macros::EnumIter;

use crate::{
    bus::RegisterTransport, client::RegisterClient, config::TimingConfig, error::BenchError,
    register::X2Control,
};

/// A switchable power domain on the bench or on the board.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, EnumIter, strum_macros::EnumCount)]
pub enum Rail {
    /// IO1, primary power input.
    Primary,
    /// IO2, secondary power input.
    Secondary,
    /// IO3, backup power input.
    Backup,
    /// IO4, supply of the passthrough T-node.
    Passthrough,
    Sepic33,
    Sepic12,
    Ldo5,
    Wifi,
    SensorPort1,
    SensorPort2,
    SensorPort3,
    SensorPort4,
    PriorityOut,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RailKind {
    /// Bench GPIO line, by index into the sequencer's pins.
    Host(usize),
    /// X2 switch register.
    Device(X2Control),
}

impl Rail {
    pub const HOST: [Rail; 4] = [Rail::Primary, Rail::Secondary, Rail::Backup, Rail::Passthrough];

    pub const fn kind(self) -> RailKind {
        use Rail as R;
        match self {
            R::Primary => RailKind::Host(0),
            R::Secondary => RailKind::Host(1),
            R::Backup => RailKind::Host(2),
            R::Passthrough => RailKind::Host(3),
            R::Sepic33 => RailKind::Device(X2Control::Sepic33Enable),
            R::Sepic12 => RailKind::Device(X2Control::Sepic12Enable),
            R::Ldo5 => RailKind::Device(X2Control::Ldo5Enable),
            R::Wifi => RailKind::Device(X2Control::WifiPower),
            R::SensorPort1 => RailKind::Device(X2Control::SensorPort1Enable),
            R::SensorPort2 => RailKind::Device(X2Control::SensorPort2Enable),
            R::SensorPort3 => RailKind::Device(X2Control::SensorPort3Enable),
            R::SensorPort4 => RailKind::Device(X2Control::SensorPort4Enable),
            R::PriorityOut => RailKind::Device(X2Control::PriorityOutEnable),
        }
    }

    pub const fn label(self) -> &'static str {
        use Rail as R;
        match self {
            R::Primary => "Primary Power",
            R::Secondary => "Secondary Power",
            R::Backup => "Backup Power",
            R::Passthrough => "T-Node Power",
            R::Sepic33 => "3.3V SEPIC",
            R::Sepic12 => "12V SEPIC",
            R::Ldo5 => "5V LDO",
            R::Wifi => "Wi-Fi Module",
            R::SensorPort1 => "Sensor Port 1",
            R::SensorPort2 => "Sensor Port 2",
            R::SensorPort3 => "Sensor Port 3",
            R::SensorPort4 => "Sensor Port 4",
            R::PriorityOut => "Priority Power Out",
        }
    }

    /// Host rails that power the X2 itself. Bringing one up silences the Wi-Fi.
    pub const fn feeds_main_board(self) -> bool {
        matches!(self, Rail::Primary | Rail::Secondary | Rail::Backup)
    }
}

/// Rails a test module needs on and off before it runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Preconditions {
    pub on: &'static [Rail],
    pub off: &'static [Rail],
    /// Bring the `on` rails up, without a settle delay, before dropping the `off`
    /// rails, so the board never loses every supply.
    pub handover: bool,
}

impl Preconditions {
    pub const fn on(on: &'static [Rail]) -> Self {
        Self {
            on,
            off: &[],
            handover: false,
        }
    }

    /// Move the board onto `on` and away from `off` while it stays powered.
    pub const fn handover(on: &'static [Rail], off: &'static [Rail]) -> Self {
        Self {
            on,
            off,
            handover: true,
        }
    }
}

/// Settle delays after a rail transition.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RailTiming {
    pub host_on: MillisDurationU32,
    pub host_off: MillisDurationU32,
    pub device: MillisDurationU32,
}

impl Default for RailTiming {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for RailTiming {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            host_on: timing.host_on(),
            host_off: timing.host_off(),
            device: timing.device(),
        }
    }
}

/// Owns the rail enable lines and the settle delay.
///
/// Dropping the sequencer drives every host line low.
pub struct RailSequencer<P: OutputPin + InputPin, D: DelayNs> {
    pins: [P; 4],
    delay: D,
    timing: RailTiming,
    /// Last state successfully written to each device rail.
    tracked: [bool; Rail::COUNT],
}

impl<P: OutputPin + InputPin, D: DelayNs> RailSequencer<P, D> {
    /// `pins` are the Primary, Secondary, Backup and Passthrough enables, in that order.
    pub fn new(pins: [P; 4], delay: D, timing: RailTiming) -> Self {
        Self {
            pins,
            delay,
            timing,
            tracked: [false; Rail::COUNT],
        }
    }

    pub fn timing(&self) -> RailTiming {
        self.timing
    }

    /// Current state of a rail.
    pub fn is_on(&mut self, rail: Rail) -> Result<bool, BenchError> {
        match rail.kind() {
            RailKind::Host(i) => self.pins[i].is_high().map_err(BenchError::gpio),
            RailKind::Device(_) => Ok(self.tracked[rail as usize]),
        }
    }

    /// Bring a rail up with its default settle delay.
    ///
    /// Returns `false` if a device rail could not be switched.
    pub fn ensure_on<T: RegisterTransport>(
        &mut self,
        client: &mut RegisterClient<T>,
        rail: Rail,
    ) -> Result<bool, BenchError> {
        let settle = match rail.kind() {
            RailKind::Host(_) => self.timing.host_on,
            RailKind::Device(_) => self.timing.device,
        };
        self.ensure_on_with_settle(client, rail, settle)
    }

    /// Bring a rail up, waiting `settle` if it was off.
    pub fn ensure_on_with_settle<T: RegisterTransport>(
        &mut self,
        client: &mut RegisterClient<T>,
        rail: Rail,
        settle: MillisDurationU32,
    ) -> Result<bool, BenchError> {
        if self.is_on(rail)? {
            debug!("{} already on", rail.label());
            return Ok(true);
        }
        info!("Powering {} on...", rail.label());
        match rail.kind() {
            RailKind::Host(i) => {
                self.pins[i].set_high().map_err(BenchError::gpio)?;
                self.pause(settle);
                if rail.feeds_main_board() {
                    self.silence_wifi(client);
                }
                Ok(true)
            }
            RailKind::Device(register) => Ok(self.switch_device(client, rail, register, true, settle)),
        }
    }

    /// Take a rail down with its default settle delay.
    pub fn ensure_off<T: RegisterTransport>(
        &mut self,
        client: &mut RegisterClient<T>,
        rail: Rail,
    ) -> Result<bool, BenchError> {
        if !self.is_on(rail)? {
            debug!("{} already off", rail.label());
            return Ok(true);
        }
        info!("Powering {} off...", rail.label());
        match rail.kind() {
            RailKind::Host(i) => {
                self.pins[i].set_low().map_err(BenchError::gpio)?;
                self.pause(self.timing.host_off);
                self.forget_device_rails_if_unpowered()?;
                Ok(true)
            }
            RailKind::Device(register) => {
                let settle = self.timing.device;
                Ok(self.switch_device(client, rail, register, false, settle))
            }
        }
    }

    /// Switch a rail whatever its known state, without side effects on other rails.
    pub fn force<T: RegisterTransport>(
        &mut self,
        client: &mut RegisterClient<T>,
        rail: Rail,
        on: bool,
    ) -> Result<bool, BenchError> {
        match rail.kind() {
            RailKind::Host(i) => {
                let pin = &mut self.pins[i];
                if on {
                    pin.set_high().map_err(BenchError::gpio)?;
                } else {
                    pin.set_low().map_err(BenchError::gpio)?;
                    self.forget_device_rails_if_unpowered()?;
                }
                Ok(true)
            }
            RailKind::Device(register) => {
                let settle = self.timing.device;
                Ok(self.switch_device(client, rail, register, on, settle))
            }
        }
    }

    /// Apply a module's preconditions: everything that must be off first, then
    /// everything that must be on, each in declaration order. A handover runs the
    /// `on` rails first with no settle delay.
    ///
    /// Returns the first rail that could not be switched, if any.
    pub fn apply<T: RegisterTransport>(
        &mut self,
        client: &mut RegisterClient<T>,
        preconditions: &Preconditions,
    ) -> Result<Option<Rail>, BenchError> {
        if preconditions.handover {
            for &rail in preconditions.on {
                if !self.ensure_on_with_settle(client, rail, MillisDurationU32::millis(0))? {
                    return Ok(Some(rail));
                }
            }
            return self.apply_off(client, preconditions.off);
        }
        if let Some(rail) = self.apply_off(client, preconditions.off)? {
            return Ok(Some(rail));
        }
        for &rail in preconditions.on {
            if !self.ensure_on(client, rail)? {
                return Ok(Some(rail));
            }
        }
        Ok(None)
    }

    fn apply_off<T: RegisterTransport>(
        &mut self,
        client: &mut RegisterClient<T>,
        rails: &[Rail],
    ) -> Result<Option<Rail>, BenchError> {
        for &rail in rails {
            if !self.ensure_off(client, rail)? {
                return Ok(Some(rail));
            }
        }
        Ok(None)
    }

    /// Blocking wait.
    pub fn pause(&mut self, duration: MillisDurationU32) {
        let ms = duration.to_millis();
        if ms > 0 {
            self.delay.delay_ms(ms);
        }
    }

    /// Drive every host line low. No settle delay.
    pub fn shutdown(&mut self) -> Result<(), BenchError> {
        let mut first_err = None;
        for pin in self.pins.iter_mut() {
            if let Err(err) = pin.set_low() {
                first_err.get_or_insert(BenchError::gpio(err));
            }
        }
        self.tracked = [false; Rail::COUNT];
        first_err.map_or(Ok(()), Err)
    }

    fn silence_wifi<T: RegisterTransport>(&mut self, client: &mut RegisterClient<T>) {
        let settle = self.timing.device;
        if !self.switch_device(client, Rail::Wifi, X2Control::WifiPower, false, settle) {
            warn!("Could not switch the Wi-Fi module off, bus traffic may be unreliable");
        }
    }

    fn switch_device<T: RegisterTransport>(
        &mut self,
        client: &mut RegisterClient<T>,
        rail: Rail,
        register: X2Control,
        on: bool,
        settle: MillisDurationU32,
    ) -> bool {
        if !client.switch(register, on) {
            info!("Switching {} was not successful", rail.label());
            return false;
        }
        self.tracked[rail as usize] = on;
        self.pause(settle);
        true
    }

    fn forget_device_rails_if_unpowered(&mut self) -> Result<(), BenchError> {
        for rail in [Rail::Primary, Rail::Secondary, Rail::Backup] {
            if self.is_on(rail)? {
                return Ok(());
            }
        }
        debug!("X2 unpowered, device rails reset");
        self.tracked = [false; Rail::COUNT];
        Ok(())
    }
}

impl<P: OutputPin + InputPin, D: DelayNs> Drop for RailSequencer<P, D> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!("Rail shutdown failed: {err}");
        }
    }
}
