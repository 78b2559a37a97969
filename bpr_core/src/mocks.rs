//! Test and helper mocks for bpr_core

use std::collections::VecDeque;
use std::time::Duration;

use bpr_traits::{AnalogInput, SerialLink};

/// Serial link fed from an in-memory script; replies are captured.
///
/// Reads never block: an empty script behaves like a timeout.
#[derive(Debug, Default, Clone)]
pub struct ScriptedLink {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl ScriptedLink {
    pub fn new(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }

    /// Queue more incoming bytes.
    pub fn push(&mut self, bytes: impl AsRef<[u8]>) {
        self.input.extend(bytes.as_ref());
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    /// Everything written so far, lossily decoded.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Drain and return the captured replies.
    pub fn take_output(&mut self) -> String {
        let out = self.output();
        self.output.clear();
        out
    }
}

impl SerialLink for ScriptedLink {
    fn read_byte(
        &mut self,
        _timeout: Duration,
    ) -> Result<Option<u8>, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.input.pop_front())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }
}

/// Analog input that replays a sequence, repeating the last value.
#[derive(Debug, Clone)]
pub struct SequenceInput {
    values: VecDeque<u16>,
    last: u16,
}

impl SequenceInput {
    pub fn new(values: impl IntoIterator<Item = u16>) -> Self {
        Self {
            values: values.into_iter().collect(),
            last: 0,
        }
    }

    /// Always reads `value`.
    pub fn fixed(value: u16) -> Self {
        Self {
            values: VecDeque::new(),
            last: value,
        }
    }
}

impl AnalogInput for SequenceInput {
    fn read(&mut self) -> Result<u16, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(v) = self.values.pop_front() {
            self.last = v;
        }
        Ok(self.last)
    }
}
