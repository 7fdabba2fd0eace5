//! MCP3008 ADC on the bench, used to read rails the X2 cannot measure itself.

use embedded_hal::spi::SpiDevice;

use crate::error::BenchError;

/// Reference voltage of the bench ADC.
const VREF: f64 = 3.3;
const FULL_SCALE: f64 = 1023.0;

/// Something that returns a voltage per channel.
pub trait AnalogInput {
    /// Volts on `channel`, rounded to two places, then multiplied by the divider `scale`.
    fn read_volts(&mut self, channel: u8, scale: f64) -> Result<f64, BenchError>;
}

/// 8 channel, 10 bit SPI ADC in single-ended mode.
pub struct Mcp3008<SPI> {
    spi: SPI,
}

impl<SPI: SpiDevice> Mcp3008<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Raw 10 bit sample of a channel.
    pub fn read_raw(&mut self, channel: u8) -> Result<u16, BenchError> {
        if channel > 7 {
            return Err(BenchError::AdcChannel(channel));
        }
        // Start bit, single-ended + channel, then clock out the result.
        let mut frame = [0x01, (8 + channel) << 4, 0x00];
        self.spi
            .transfer_in_place(&mut frame)
            .map_err(BenchError::spi)?;
        Ok((((frame[1] & 0x03) as u16) << 8) | frame[2] as u16)
    }

    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI: SpiDevice> AnalogInput for Mcp3008<SPI> {
    fn read_volts(&mut self, channel: u8, scale: f64) -> Result<f64, BenchError> {
        let sample = self.read_raw(channel)?;
        let volts = (sample as f64 * VREF / FULL_SCALE * 100.0).round() / 100.0;
        Ok(volts * scale)
    }
}
