pub mod error;
pub mod link;
pub mod nvm;
pub mod sim;

#[cfg(feature = "hardware")]
pub mod gpio;
#[cfg(feature = "hardware")]
pub mod mcp3008;
#[cfg(feature = "hardware")]
pub mod uart;

pub use link::StdioLink;
pub use nvm::{FileStore, MemStore};
pub use sim::{RigParams, SimulatedDriver, SimulatedRig, SimulatedSensor};

#[cfg(feature = "hardware")]
pub use gpio::GpioStepDir;
#[cfg(feature = "hardware")]
pub use mcp3008::{Mcp3008, Mcp3008Channel};
#[cfg(feature = "hardware")]
pub use uart::UartLink;
