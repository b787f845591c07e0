//! driftscan - configuration drift detection
//!
//! Compares the observed configuration of infrastructure resources against
//! their declared (terraform) state and reports every difference as a drift.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod matcher;
pub mod output;
pub mod path;
pub mod policy;
pub mod report;
pub mod sources;
pub mod terraform;
pub mod value;

pub use batch::{BatchCoordinator, BatchOutcome, CancelFlag, ResourceError, ResourcePair};
pub use engine::{compare, detect_one};
pub use error::DriftError;
pub use policy::{ComparisonPolicy, IdentityKey};
pub use report::{Drift, DriftKind, DriftReport};
pub use sources::{StateSource, open_source};
pub use value::{ConfigValue, Scalar};
