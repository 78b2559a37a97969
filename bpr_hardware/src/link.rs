//! Serial link over the process's stdin/stdout.
//!
//! A reader thread owns stdin and forwards bytes through a bounded channel so
//! the control loop can poll with a timeout without blocking on the terminal.

use std::io::{Read, Write};
use std::time::Duration;

use bpr_traits::SerialLink;
use crossbeam_channel as xch;

use crate::error::HwError;

/// Bytes buffered between the stdin thread and the control loop.
const LINK_BUFFER: usize = 256;

pub struct StdioLink {
    rx: xch::Receiver<u8>,
    out: std::io::Stdout,
    closed: bool,
}

impl StdioLink {
    pub fn spawn() -> Self {
        let (tx, rx) = xch::bounded(LINK_BUFFER);
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut lock = stdin.lock();
            let mut buf = [0u8; 64];
            loop {
                match lock.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        for &b in &buf[..n] {
                            if tx.send(b).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed; closing link");
                        break;
                    }
                }
            }
            tracing::debug!("stdin reader exiting");
        });
        Self {
            rx,
            out: std::io::stdout(),
            closed: false,
        }
    }
}

impl SerialLink for StdioLink {
    fn read_byte(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let res = if timeout.is_zero() {
            self.rx.try_recv().map_err(|e| e.is_disconnected())
        } else {
            self.rx.recv_timeout(timeout).map_err(|e| e.is_disconnected())
        };
        match res {
            Ok(b) => Ok(Some(b)),
            Err(true) => {
                // Regulation continues without a host; only the first EOF is reported
                if !self.closed {
                    tracing::info!("command link closed (stdin EOF)");
                    self.closed = true;
                }
                Ok(None)
            }
            Err(false) => Ok(None),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut lock = self.out.lock();
        lock.write_all(bytes).map_err(HwError::Io)?;
        lock.flush().map_err(HwError::Io)?;
        Ok(())
    }
}
