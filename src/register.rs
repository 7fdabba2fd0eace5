//! This module is used to define the registers on the X2 Main board and on the passthrough node.
//!
//! Telemetry and status live in the input-register space (read with function code 4).
//! Switches and settings live in the holding-register space (written with function code 16).
//! The two spaces are separate on the device, so a read and a write descriptor may share an address.

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Whether a register is read (function code 4) or written (function code 16).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Which unit on the bus a register belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceRole {
    MainBoard,
    Passthrough,
}

/// One entry of the register map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegisterDescriptor {
    /// Symbolic name used in the bench logs.
    pub name: &'static str,
    pub address: u16,
    /// Number of 16-bit registers, 1 - 6.
    pub count: u16,
    pub access: Access,
}

impl RegisterDescriptor {
    /// First address past the end of this register.
    pub const fn end(&self) -> u32 {
        self.address as u32 + self.count as u32
    }

    /// True if both descriptors share an access space and their address ranges intersect.
    pub const fn overlaps(&self, other: &RegisterDescriptor) -> bool {
        let same_space = matches!(
            (self.access, other.access),
            (Access::Read, Access::Read) | (Access::Write, Access::Write)
        );
        same_space && (self.address as u32) < other.end() && (other.address as u32) < self.end()
    }
}

/// Input registers on the X2 Main board.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum X2Input {
    /// __R__ - Modbus address currently stored in EE.
    ModbusAddress = 0x1000,
    /// __R__ - Primary power input voltage. Float, volts.
    PrimaryVoltage = 0x3020,
    /// __R__ - Secondary power input voltage. Float, volts.
    SecondaryVoltage = 0x3022,
    /// __R__ - Backup power input voltage. Float, volts.
    BackupVoltage = 0x3024,
    /// __R__ - 3.3V SEPIC output. Float, volts.
    Vcc33Voltage = 0x3026,
    /// __R__ - 12V SEPIC (sensor supply) output. Float, volts.
    Sepic12Voltage = 0x3028,
    /// __R__ - 5V LDO output. Float, volts.
    Ldo5Voltage = 0x302A,
    /// __R__ - RTC backup battery. Float, volts.
    RtcBatteryVoltage = 0x302C,
    /// __R__ - Total system current. Float, milliamps.
    SystemCurrent = 0x302E,
    /// __R__ - 12V sensor port 1 output. Float, volts.
    SensorPort1Voltage = 0x3030,
    /// __R__ - 12V sensor port 2 output. Float, volts.
    SensorPort2Voltage = 0x3032,
    /// __R__ - 12V sensor port 3 output. Float, volts.
    SensorPort3Voltage = 0x3034,
    /// __R__ - 12V sensor port 4 output. Float, volts.
    SensorPort4Voltage = 0x3036,
    /// __R__ - Power input valid lines.
    ///
    /// See [`ValidLines`](crate::evaluate::ValidLines).
    ValidLines = 0x3042,
    /// __R__ - SD card self test.
    /// * `0` - Bad.
    /// * `1` - Good.
    SdCardStatus = 0x3043,
    /// __R__ - Serial flash self test.
    /// * `0` - Bad.
    /// * `1` - Good.
    SerialFlashStatus = 0x3044,
    /// __R__ - RTC time. Two words of UTC epoch seconds followed by two words of time zone offset.
    ReadTime = 0x701C,
}

impl X2Input {
    pub const fn count(self) -> u16 {
        use X2Input as I;
        match self {
            I::ModbusAddress | I::ValidLines | I::SdCardStatus | I::SerialFlashStatus => 1,
            I::ReadTime => 4,
            _ => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        use X2Input as I;
        match self {
            I::ModbusAddress => "Add",
            I::PrimaryVoltage => "PriPwr_V",
            I::SecondaryVoltage => "SecPwr_V",
            I::BackupVoltage => "BakPwr_V",
            I::Vcc33Voltage => "VCC33_V",
            I::Sepic12Voltage => "12VSen_V",
            I::Ldo5Voltage => "5VLDO_V",
            I::RtcBatteryVoltage => "RTCBAT_V",
            I::SystemCurrent => "SysCur",
            I::SensorPort1Voltage => "Port1_V",
            I::SensorPort2Voltage => "Port2_V",
            I::SensorPort3Voltage => "Port3_V",
            I::SensorPort4Voltage => "Port4_V",
            I::ValidLines => "Valid",
            I::SdCardStatus => "SDTest",
            I::SerialFlashStatus => "FlashTest",
            I::ReadTime => "ReadTime",
        }
    }

    pub const fn descriptor(self) -> RegisterDescriptor {
        RegisterDescriptor {
            name: self.name(),
            address: self as u16,
            count: self.count(),
            access: Access::Read,
        }
    }
}

impl From<X2Input> for u16 {
    fn from(value: X2Input) -> Self {
        value as u16
    }
}

/// Holding registers on the X2 Main board.
///
/// Switch registers take `1` for on and `0` for off.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum X2Control {
    /// __W__ - Modbus address. Stored in EE, survives a power cycle.
    ModbusAddress = 0x1000,
    /// __W__ - 3.3V SEPIC enable.
    Sepic33Enable = 0x300A,
    /// __W__ - 12V SEPIC enable.
    Sepic12Enable = 0x300B,
    /// __W__ - 5V LDO enable.
    Ldo5Enable = 0x300C,
    /// __W__ - Wi-Fi module power.
    WifiPower = 0x300D,
    /// __W__ - 12V sensor port 1 switch.
    SensorPort1Enable = 0x300E,
    /// __W__ - 12V sensor port 2 switch.
    SensorPort2Enable = 0x300F,
    /// __W__ - 12V sensor port 3 switch.
    SensorPort3Enable = 0x3010,
    /// __W__ - 12V sensor port 4 switch.
    SensorPort4Enable = 0x3011,
    /// __W__ - Priority power output switch.
    PriorityOutEnable = 0x3012,
    /// __W__ - PPP_1DISCON. Pulls the primary input UV pin to ground.
    /// * `0` - Primary connected.
    /// * `1` - Primary disconnected.
    PrimaryDisconnect = 0x3013,
    /// __W__ - RTC time. Two words of UTC epoch seconds followed by two words of time zone offset.
    SetTime = 0x701C,
}

impl X2Control {
    pub const fn count(self) -> u16 {
        match self {
            X2Control::SetTime => 4,
            _ => 1,
        }
    }

    pub const fn name(self) -> &'static str {
        use X2Control as C;
        match self {
            C::ModbusAddress => "Add",
            C::Sepic33Enable => "33SEPIC_OF",
            C::Sepic12Enable => "12SEPIC_OF",
            C::Ldo5Enable => "5VLDO_OF",
            C::WifiPower => "WiFiPwr_OF",
            C::SensorPort1Enable => "Port1_OF",
            C::SensorPort2Enable => "Port2_OF",
            C::SensorPort3Enable => "Port3_OF",
            C::SensorPort4Enable => "Port4_OF",
            C::PriorityOutEnable => "PrioOut_OF",
            C::PrimaryDisconnect => "PPP_Dis",
            C::SetTime => "SetTime",
        }
    }

    pub const fn descriptor(self) -> RegisterDescriptor {
        RegisterDescriptor {
            name: self.name(),
            address: self as u16,
            count: self.count(),
            access: Access::Write,
        }
    }
}

impl From<X2Control> for u16 {
    fn from(value: X2Control) -> Self {
        value as u16
    }
}

/// Input registers on the passthrough (T-node) diagnostic unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum NodeInput {
    /// __R__ - Modbus address of the node.
    ModbusAddress = 0x1000,
    /// __R__ - Example measurement. Float.
    ExampleValue = 0x1020,
}

impl NodeInput {
    pub const fn count(self) -> u16 {
        match self {
            NodeInput::ModbusAddress => 1,
            NodeInput::ExampleValue => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            NodeInput::ModbusAddress => "Add",
            NodeInput::ExampleValue => "ex",
        }
    }

    pub const fn descriptor(self) -> RegisterDescriptor {
        RegisterDescriptor {
            name: self.name(),
            address: self as u16,
            count: self.count(),
            access: Access::Read,
        }
    }
}

/// Every descriptor known for a device role.
pub fn register_map(role: DeviceRole) -> Vec<RegisterDescriptor> {
    match role {
        DeviceRole::MainBoard => X2Input::iter()
            .map(X2Input::descriptor)
            .chain(X2Control::iter().map(X2Control::descriptor))
            .collect(),
        DeviceRole::Passthrough => NodeInput::iter().map(NodeInput::descriptor).collect(),
    }
}

/// Find a register by its symbolic name.
pub fn lookup(role: DeviceRole, name: &str, access: Access) -> Option<RegisterDescriptor> {
    register_map(role)
        .into_iter()
        .find(|reg| reg.access == access && reg.name == name)
}
