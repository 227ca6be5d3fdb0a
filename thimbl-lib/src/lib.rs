#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

//! Microblogging over the finger protocol.
//!
//! Each user publishes a JSON "plan" (profile, posts, follow list) in the
//! file their finger daemon serves. Reading someone's posts means fingering
//! `user@host` and pulling the plan out of the response.

pub mod address;
pub mod cache;
pub mod daemon;
pub mod error;
pub mod finger;
pub mod plan;
pub mod profile;
pub mod session;
pub mod settings;
pub mod sync;

pub use address::Address;
pub use cache::{Cache, TimelineEntry};
#[cfg(unix)]
pub use daemon::AccountHomes;
pub use daemon::{FingerDaemon, HomeDirs, HomeResolver};
pub use error::{Error, ErrorKind};
pub use finger::FingerClient;
pub use plan::{Follow, Identity, Message, Plan};
pub use profile::Profile;
pub use session::Session;
pub use settings::{DaemonSettings, Settings};
pub use sync::{fetch_all, fetch_plan, FetchReport, PlanSource};

/// The finger port
pub const FINGER_PORT: u16 = 79;

/// File name the finger daemon looks for in a home directory
pub const PLAN_FILENAME: &str = ".plan";
