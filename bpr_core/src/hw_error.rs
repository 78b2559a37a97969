//! Maps `Box<dyn Error>` from trait boundaries to typed `BprError`.
//!
//! The traits in `bpr_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `bpr_hardware::HwError` downcasting.

use crate::error::BprError;

/// Map a trait-boundary error to a typed `BprError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> BprError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<bpr_hardware::error::HwError>() {
            use bpr_hardware::error::HwError;
            return match hw {
                HwError::Timeout => BprError::Timeout,
                HwError::OutOfRange { .. } => BprError::Storage(hw.to_string()),
                HwError::Io(io) => BprError::Io(io.to_string()),
                other => BprError::HardwareFault(other.to_string()),
            };
        }
    }

    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return BprError::Io(io.to_string());
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        BprError::Timeout
    } else {
        BprError::Hardware(s)
    }
}

/// Convenience for `map_err` at the trait seams.
pub(crate) fn to_report(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
