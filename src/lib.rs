//! Watches the open GitHub pull requests a user is involved in and reduces
//! them to a colored count badge plus a per-repository listing.

pub mod aggregate;
pub mod badge;
pub mod config;
pub mod github;
pub mod messages;
pub mod options;
pub mod platform;
pub mod report;
pub mod scheduler;
