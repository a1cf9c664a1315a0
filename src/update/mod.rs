//! Release checking and self-update

pub mod checker;
pub mod updater;
pub mod version;

pub use checker::{ReleaseChecker, ReleaseInfo, UpdateCheckState, UpdateDecision};
pub use updater::{SelfUpdater, StagedUpdate};
pub use version::{compare_versions, is_newer, parse_version};
