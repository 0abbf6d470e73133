//! Self-update subsystem for the Touch-N-Stars mobile shell.
//!
//! The flow: [`UpdateController::check_for_update`] asks the remote release
//! endpoint for a newer version (silently resolving to "no update" on any
//! failure), presents a confirmation through the shell's [`UpdateEmitter`],
//! and on [`UpdateController::confirm`] streams the artifact in the
//! background with progress events, cooperative cancellation and guaranteed
//! cleanup of partial files, finally handing the finished file to the
//! platform's [`install::InstallHandoff`].

pub mod bridge;
pub mod core;
pub mod install;
pub mod models;
pub mod storage;

pub use crate::core::controller::UpdateController;
pub use crate::core::error::UpdateError;
pub use crate::core::events::{DownloadProgress, UpdateEmitter, UpdateStatus};
pub use crate::core::version::VersionOracle;
pub use crate::models::release::ReleaseInfo;
pub use crate::models::settings::UpdaterSettings;
