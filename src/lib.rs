pub mod acquisition;
pub mod board_ops;
pub mod command;
pub mod constants;
pub mod device;
pub mod error;
pub mod run_data;
pub mod transport;
pub mod units;
pub mod version;

// Re-export the session type and the handles most callers need.
pub use acquisition::{AcqValueDescriptor, MemoryClass, SyncState};
pub use board_ops::{BoardOperationOutput, HardwareStatus};
pub use command::CommandCode;
pub use device::{SessionState, Udxp};
pub use error::DxpError;
pub use run_data::{ModuleStatistics, RunData};
pub use transport::Transport;
pub use version::VersionInfo;
