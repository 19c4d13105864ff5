//! Launcher implementations
//!
//! Only local process execution is built in: `ssh` and `rsync` are local
//! processes too. Implement [`Launcher`](crate::launcher::Launcher) to run
//! them some other way.

pub mod local;
pub use local::LocalLauncher;
