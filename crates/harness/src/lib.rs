//! Primitives for driving a cluster end-to-end run.
//!
//! Everything an install/upgrade scenario needs that is not
//! scenario-specific: bounded retry/poll loops, an external command runner,
//! kubectl and helm wrappers, the two resource wait gates, version
//! extraction and constraint evaluation, and K3s bootstrap helpers.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use harness::{Kubectl, RetryPolicy};
//!
//! #[tokio::main]
//! async fn main() -> harness::Result<()> {
//!     let policy = RetryPolicy::new(Duration::from_secs(300), Duration::from_secs(10))?;
//!     Kubectl::new()
//!         .wait_for_condition("kube-system", "deployment/coredns", "Available", &policy)
//!         .await
//! }
//! ```

pub mod cmd;
pub mod error;
pub mod helm;
pub mod k3s;
pub mod kubectl;
pub mod pods;
pub mod retry;
pub mod version;

// Re-export commonly used types at the crate root
pub use cmd::CommandSpec;
pub use error::{Error, Result};
pub use helm::Helm;
pub use kubectl::Kubectl;
pub use pods::PodSelector;
pub use retry::RetryPolicy;
pub use version::VersionSpec;
