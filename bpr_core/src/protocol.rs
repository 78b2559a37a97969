//! ASCII command protocol over a byte-oriented serial link.
//!
//! Grammar (case-sensitive):
//!
//! - `S<n>=<v>` sets variable `n`
//! - `R<n>` reads variable `n`; the reply is the value followed by `\r\n`
//!
//! Numbers need no terminator: the byte that ends a number is left in the
//! stream, so several commands may share one buffer (`S3=5.0R4`). Text values
//! run to `\n` or the per-byte timeout. Anything the parser does not
//! recognise is dropped without a reply.

use std::time::Duration;

use bpr_traits::SerialLink;
use eyre::WrapErr;

use crate::error::Result;
use crate::hw_error::to_report;

/// Longest text value, in bytes.
pub const TEXT_MAX: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
    /// Write-only action.
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Text,
    Bool,
    Float,
    Int,
    None,
}

/// The numbered variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Id,
    Enable,
    Setpoint,
    Pressure,
    Position,
    CalibrationBegin,
    CalibrationEnd,
    CaptureMin,
    CaptureMax,
    Jog,
}

impl Variable {
    pub const ALL: [Variable; 10] = [
        Variable::Id,
        Variable::Enable,
        Variable::Setpoint,
        Variable::Pressure,
        Variable::Position,
        Variable::CalibrationBegin,
        Variable::CalibrationEnd,
        Variable::CaptureMin,
        Variable::CaptureMax,
        Variable::Jog,
    ];

    /// Look up by wire number. 0 is reserved and never resolves.
    pub fn from_number(n: u32) -> Option<Self> {
        let idx = usize::try_from(n).ok()?.checked_sub(1)?;
        Self::ALL.get(idx).copied()
    }

    pub fn number(self) -> u32 {
        match self {
            Variable::Id => 1,
            Variable::Enable => 2,
            Variable::Setpoint => 3,
            Variable::Pressure => 4,
            Variable::Position => 5,
            Variable::CalibrationBegin => 6,
            Variable::CalibrationEnd => 7,
            Variable::CaptureMin => 8,
            Variable::CaptureMax => 9,
            Variable::Jog => 10,
        }
    }

    pub fn access(self) -> Access {
        match self {
            Variable::Id | Variable::Enable | Variable::Setpoint => Access::ReadWrite,
            Variable::Pressure | Variable::Position => Access::ReadOnly,
            _ => Access::Command,
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            Variable::Id => Kind::Text,
            Variable::Enable => Kind::Bool,
            Variable::Setpoint
            | Variable::Pressure
            | Variable::CalibrationBegin
            | Variable::CalibrationEnd => Kind::Float,
            Variable::Position | Variable::Jog => Kind::Int,
            Variable::CaptureMin | Variable::CaptureMax => Kind::None,
        }
    }
}

/// A typed variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Bool(bool),
    Float(f32),
    Int(i32),
    None,
}

impl Value {
    /// Wire form, without the line terminator.
    pub fn to_wire(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Bool(b) => u8::from(*b).to_string(),
            Value::Float(f) => format!("{f:.2}"),
            Value::Int(i) => i.to_string(),
            Value::None => String::new(),
        }
    }
}

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set(Variable, Value),
    Read(Variable),
}

/// Write a reply line for `value`.
pub fn respond<L: SerialLink + ?Sized>(link: &mut L, value: &Value) -> Result<()> {
    let mut line = value.to_wire();
    line.push_str("\r\n");
    link.write_all(line.as_bytes())
        .map_err(to_report)
        .wrap_err("writing protocol reply")
}

/// Incremental command decoder with one byte of lookahead.
///
/// The lookahead survives between calls, so a byte that terminated a number
/// in one poll starts the next command in the following poll.
#[derive(Debug, Clone)]
pub struct CommandParser {
    pending: Option<u8>,
    byte_timeout: Duration,
}

impl CommandParser {
    pub fn new(byte_timeout: Duration) -> Self {
        Self {
            pending: None,
            byte_timeout,
        }
    }

    /// Decode the next well-formed command from whatever is buffered.
    ///
    /// Returns `Ok(None)` once the link has nothing more to offer. Malformed
    /// input is consumed and skipped.
    pub fn next_command<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<Option<Command>> {
        loop {
            let Some(lead) = self.byte(link, Duration::ZERO)? else {
                return Ok(None);
            };
            let parsed = match lead {
                b'S' => self.parse_set(link)?,
                b'R' => self.parse_read(link)?,
                other => {
                    tracing::trace!(byte = other, "discarding unrecognised byte");
                    None
                }
            };
            if let Some(cmd) = parsed {
                tracing::debug!(?cmd, "command decoded");
                return Ok(Some(cmd));
            }
        }
    }

    fn parse_set<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<Option<Command>> {
        let Some(n) = self.unsigned(link)? else {
            return Ok(None);
        };
        match self.byte(link, self.byte_timeout)? {
            Some(b'=') => {}
            Some(other) => {
                self.pending = Some(other);
                return Ok(None);
            }
            None => return Ok(None),
        }
        let Some(var) = Variable::from_number(n) else {
            tracing::debug!(n, "set of unknown variable dropped");
            return Ok(None);
        };
        let value = match var.kind() {
            Kind::Text => Some(Value::Text(self.text(link)?)),
            Kind::Bool => self.integer(link)?.map(|i| Value::Bool(i != 0)),
            Kind::Int => self.integer(link)?.map(Value::Int),
            Kind::Float => self.float(link)?.map(Value::Float),
            Kind::None => Some(Value::None),
        };
        let Some(value) = value else {
            tracing::debug!(var = n, "malformed value dropped");
            return Ok(None);
        };
        if var.access() == Access::ReadOnly {
            tracing::debug!(var = n, "write to read-only variable ignored");
            return Ok(None);
        }
        Ok(Some(Command::Set(var, value)))
    }

    fn parse_read<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<Option<Command>> {
        let Some(n) = self.unsigned(link)? else {
            return Ok(None);
        };
        match Variable::from_number(n) {
            Some(var) if var.access() != Access::Command => Ok(Some(Command::Read(var))),
            _ => {
                tracing::debug!(n, "read of unknown or write-only variable dropped");
                Ok(None)
            }
        }
    }

    fn byte<L: SerialLink + ?Sized>(&mut self, link: &mut L, timeout: Duration) -> Result<Option<u8>> {
        if let Some(b) = self.pending.take() {
            return Ok(Some(b));
        }
        link.read_byte(timeout)
            .map_err(to_report)
            .wrap_err("reading command link")
    }

    /// Collect `[-]digits[.digits][(e|E)[+|-]digits]`, the fraction and
    /// exponent only when `fraction` is set; the terminating byte is pushed back.
    fn numeral<L: SerialLink + ?Sized>(
        &mut self,
        link: &mut L,
        signed: bool,
        fraction: bool,
    ) -> Result<Option<String>> {
        let mut text = String::new();
        let mut digits = 0usize;
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(b) = self.byte(link, self.byte_timeout)? {
            let after_exp = text.ends_with(|c| c == 'e' || c == 'E');
            let accept = match b {
                b'0'..=b'9' => {
                    digits += 1;
                    true
                }
                b'-' => (signed && text.is_empty()) || after_exp,
                b'+' => after_exp,
                b'.' if fraction && !seen_dot && !seen_exp => {
                    seen_dot = true;
                    true
                }
                b'e' | b'E' if fraction && digits > 0 && !seen_exp => {
                    seen_exp = true;
                    true
                }
                _ => false,
            };
            if !accept {
                self.pending = Some(b);
                break;
            }
            text.push(char::from(b));
            // Longer than any value this protocol carries
            if text.len() > 32 {
                return Ok(None);
            }
        }
        Ok((digits > 0).then_some(text))
    }

    fn unsigned<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<Option<u32>> {
        Ok(self
            .numeral(link, false, false)?
            .and_then(|t| t.parse::<u32>().ok()))
    }

    fn integer<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<Option<i32>> {
        Ok(self
            .numeral(link, true, false)?
            .and_then(|t| t.parse::<i32>().ok()))
    }

    fn float<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<Option<f32>> {
        Ok(self
            .numeral(link, true, true)?
            .and_then(|t| t.parse::<f32>().ok())
            .filter(|f| f.is_finite()))
    }

    /// Bytes up to `\n` or a per-byte timeout, capped at [`TEXT_MAX`],
    /// with one trailing `\r` removed.
    fn text<L: SerialLink + ?Sized>(&mut self, link: &mut L) -> Result<String> {
        let mut bytes = Vec::with_capacity(TEXT_MAX);
        while let Some(b) = self.byte(link, self.byte_timeout)? {
            if b == b'\n' {
                break;
            }
            if bytes.len() < TEXT_MAX {
                bytes.push(b);
            }
        }
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
