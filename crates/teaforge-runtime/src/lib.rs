//! # teaforge-runtime
//!
//! Process-level plumbing around the kernel: configuration, the tracing
//! pipeline and the cycle sequencer.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use teaforge_hal::SimHardware;
//! use teaforge_kernel::{Effect, PlatformState, Subscription};
//! use teaforge_net::NetworkRuntime;
//! use teaforge_runtime::{CycleRunner, PlatformConfig, telemetry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PlatformConfig::load_from(Path::new("teaforge.toml"))?;
//! let _guard = telemetry::init_tracing("teaforge", &config.logging);
//!
//! let state = PlatformState::new(
//!     Arc::new(SimHardware::new()),
//!     NetworkRuntime::new(config.network_worker_threads)?,
//!     config.settings(),
//! );
//! let mut runner = CycleRunner::new(state, config.cycle_period());
//! runner.subscribe(Subscription::robot_state(|mode| format!("{mode:?}")));
//! let (runner, messages) = runner.run_cycle([Effect::log("robot program started")]);
//! println!("{messages:?}");
//! runner.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod cycle;
pub mod telemetry;

pub use config::{ConfigError, LogFormat, LoggingConfig, PlatformConfig};
pub use cycle::{CycleRunner, CycleStats, SubscriptionId};
