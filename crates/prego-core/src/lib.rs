//! prego core: event model, state feedback and the streaming runner
//!
//! Reads JSON lines, evaluates each one with a prepared policy query and
//! writes one formatted line per result.
//!
//! ```text
//! EventSource → StateFeedbackController → OutputFormatter → sink
//!                   ↓            ↑
//!                 MAIN      NEXTSTATE → State
//! ```
//!
//! The policy engine is reached only through [`PreparedQuery`]; formatting
//! only through [`OutputFormatter`].

pub mod config;
pub mod data_model;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod format;
pub mod runner;
pub mod shutdown;
pub mod source;

pub use config::{ParseMode, RunConfig, StagedConfig};
pub use data_model::{Event, OutputItem, ResultBinding, State};
pub use engine::{FnQuery, PreparedQuery};
pub use error::{PregoError, Result};
pub use feedback::{StateChange, StateFeedbackController, Transition};
pub use format::OutputFormatter;
pub use runner::{PipelineRunner, RunSummary};
pub use shutdown::{Shutdown, ShutdownListener};
pub use source::EventSource;

/// Version logged when a run starts
pub const PREGO_VERSION: &str = env!("CARGO_PKG_VERSION");
