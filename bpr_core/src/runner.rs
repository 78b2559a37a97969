//! Sampling and control loop: stabilize the pressure reading, then actuate.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bpr_traits::SerialLink;

use crate::config::SamplingCfg;
use crate::control::Output;
use crate::device::{Device, Motion};
use crate::error::Result;

/// Phase of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stabilizing,
    Actuating,
}

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// Published pressure (bar).
    pub pressure: f32,
    /// Stabilization passes taken.
    pub passes: u32,
    pub output: Output,
    /// `None` when the cycle idled.
    pub motion: Option<Motion>,
}

/// Totals for a finished `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub moves: u64,
    pub faults: u64,
}

/// Owns the device and its command link for the life of the process.
pub struct ControlLoop<L: SerialLink> {
    device: Device,
    link: L,
    sampling: SamplingCfg,
    state: LoopState,
    prev_avg: Option<f32>,
    shutdown: Arc<AtomicBool>,
}

impl<L: SerialLink> core::fmt::Debug for ControlLoop<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ControlLoop")
            .field("device", &self.device)
            .field("state", &self.state)
            .field("prev_avg", &self.prev_avg)
            .finish()
    }
}

impl<L: SerialLink> ControlLoop<L> {
    pub fn new(device: Device, link: L, sampling: SamplingCfg) -> Self {
        Self {
            device,
            link,
            sampling,
            state: LoopState::Stabilizing,
            prev_avg: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an external shutdown flag (e.g. raised by Ctrl-C).
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Service the command link once.
    pub fn poll(&mut self) -> Result<usize> {
        self.device.poll_protocol(&mut self.link)
    }

    /// One averaging pass over `samples_per_pass` readings, servicing the
    /// link after every sample. Publishes and returns the average (bar).
    pub fn stabilization_pass(&mut self) -> Result<f32> {
        let n = self.sampling.samples_per_pass.max(1);
        let mut sum = 0.0f32;
        for i in 0..n {
            sum += self.device.sample_pressure()?;
            self.poll()?;
            if i + 1 < n {
                self.device.sleep(self.sampling.sample_interval);
            }
        }
        let avg = sum / n as f32;
        self.device.publish_pressure(avg);
        Ok(avg)
    }

    /// Repeat passes while the reading is still settling near the setpoint.
    ///
    /// Stops once consecutive averages agree within the noise threshold, or
    /// as soon as the average is far from the setpoint (no point waiting for
    /// it to settle before correcting).
    pub fn stabilize(&mut self) -> Result<(f32, u32)> {
        self.state = LoopState::Stabilizing;
        let mut passes = 0u32;
        loop {
            let avg = self.stabilization_pass()?;
            passes += 1;
            let settling = self.prev_avg.is_some_and(|prev| {
                (avg - prev).abs() > self.sampling.noise_threshold_bar
                    && (avg - self.device.setpoint()).abs()
                        <= self.sampling.divergence_threshold_bar
            });
            self.prev_avg = Some(avg);
            if !settling || self.stopping() {
                tracing::debug!(pressure = avg, passes, "pressure stabilized");
                return Ok((avg, passes));
            }
        }
    }

    /// Run the control law once and move if enabled, otherwise idle.
    pub fn actuate(&mut self) -> Result<(Output, Option<Motion>)> {
        self.state = LoopState::Actuating;
        let output = self.device.control_output();
        if !output.is_idle() && self.device.is_enabled() {
            let motion = self.device.drive(output.steps, output.speed)?;
            tracing::debug!(
                steps = output.steps,
                speed = output.speed,
                issued = motion.issued,
                "actuated"
            );
            return Ok((output, Some(motion)));
        }
        self.poll()?;
        self.device.sleep(self.sampling.idle);
        Ok((output, None))
    }

    /// Stabilize, then actuate.
    pub fn cycle(&mut self) -> Result<CycleReport> {
        let (pressure, passes) = self.stabilize()?;
        let (output, motion) = self.actuate()?;
        self.state = LoopState::Stabilizing;
        Ok(CycleReport {
            pressure,
            passes,
            output,
            motion,
        })
    }

    /// Cycle until the shutdown flag is raised or `max_cycles` is spent.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        tracing::info!(max_cycles, "control loop started");
        while !self.stopping() {
            if max_cycles.is_some_and(|max| summary.cycles >= max) {
                break;
            }
            let report = self.cycle()?;
            summary.cycles += 1;
            if let Some(m) = report.motion {
                summary.moves += 1;
                if m.fault != crate::servo::MotionFault::None {
                    summary.faults += 1;
                }
            }
        }
        tracing::info!(
            cycles = summary.cycles,
            moves = summary.moves,
            faults = summary.faults,
            "control loop stopped"
        );
        Ok(summary)
    }
}
