//! MCP3008 10-bit ADC on the Raspberry Pi SPI bus.
//!
//! One `Mcp3008` owns the bus; `channel()` hands out per-channel inputs that
//! share it.

use std::rc::Rc;

use bpr_traits::AnalogInput;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::trace;

use crate::error::{HwError, Result};

const SPI_CLOCK_HZ: u32 = 1_000_000;

pub struct Mcp3008 {
    spi: Rc<Spi>,
}

impl Mcp3008 {
    pub fn new() -> Result<Self> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi: Rc::new(spi) })
    }

    /// Single-ended input on `channel` (0..=7).
    pub fn channel(&self, channel: u8) -> Result<Mcp3008Channel> {
        if channel > 7 {
            return Err(HwError::Spi(format!("mcp3008 has no channel {channel}")));
        }
        Ok(Mcp3008Channel {
            spi: self.spi.clone(),
            channel,
        })
    }
}

pub struct Mcp3008Channel {
    spi: Rc<Spi>,
    channel: u8,
}

impl AnalogInput for Mcp3008Channel {
    fn read(&mut self) -> std::result::Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        // Start bit, single-ended + channel in the high nibble, then clock out 10 bits.
        let tx = [0x01, (0x08 | self.channel) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        let value = (u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]);
        trace!(channel = self.channel, raw = value, "mcp3008 sample");
        Ok(value)
    }
}
