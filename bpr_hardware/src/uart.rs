//! Serial link on a Raspberry Pi UART.

use std::time::Duration;

use bpr_traits::SerialLink;
use rppal::uart::{Parity, Uart};

use crate::error::{HwError, Result};

pub struct UartLink {
    uart: Uart,
    // Last read timeout programmed into the port (avoids a tcsetattr per byte).
    read_timeout: Option<Duration>,
}

impl UartLink {
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let uart = Uart::with_path(path, baud, Parity::None, 8, 1)
            .map_err(|e| HwError::Uart(format!("open {path}: {e}")))?;
        tracing::info!(path, baud, "uart opened");
        Ok(Self {
            uart,
            read_timeout: None,
        })
    }
}

impl SerialLink for UartLink {
    fn read_byte(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        if self.read_timeout != Some(timeout) {
            self.uart
                .set_read_mode(0, timeout)
                .map_err(|e| HwError::Uart(e.to_string()))?;
            self.read_timeout = Some(timeout);
        }
        let mut b = [0u8; 1];
        let n = self
            .uart
            .read(&mut b)
            .map_err(|e| HwError::Uart(e.to_string()))?;
        Ok((n == 1).then_some(b[0]))
    }

    fn write_all(
        &mut self,
        bytes: &[u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut rest = bytes;
        while !rest.is_empty() {
            let n = self
                .uart
                .write(rest)
                .map_err(|e| HwError::Uart(e.to_string()))?;
            if n == 0 {
                return Err(Box::new(HwError::Disconnected));
            }
            rest = &rest[n..];
        }
        Ok(())
    }
}
