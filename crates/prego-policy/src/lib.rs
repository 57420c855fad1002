//! prego policy: Rego loading and evaluation
//!
//! Implements [`prego_core::PreparedQuery`] on top of the `regorus` Rego
//! interpreter.
//!
//! ```text
//! --policy/--data paths → PolicySources → PolicyEngine → RegoQuery (MAIN)
//!                                                    └→ RegoQuery (NEXTSTATE)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use prego_core::{Event, PreparedQuery};
//! use prego_policy::{PolicyEngine, PolicySources};
//!
//! let sources = PolicySources::load(&["policy.rego"], &["data.json"]).unwrap();
//! let engine = PolicyEngine::new(&sources).unwrap();
//! let mut query = engine.compile("res = data").unwrap();
//!
//! let event = Event::try_from(serde_json::json!({"x": 1})).unwrap();
//! for binding in query.evaluate(Some(&event), None).unwrap() {
//!     println!("{}", serde_json::to_string(&binding).unwrap());
//! }
//! ```

pub mod engine;
pub mod sources;

pub use engine::{PolicyEngine, RegoQuery};
pub use sources::{PolicyModule, PolicySources, SourceError, SourceKind};

use prego_core::feedback::NEXTSTATE_QUERY;
use prego_core::{PregoError, RunConfig, StateFeedbackController};
use tracing::info;

/// Builds the simple-mode controller described by `config`: the user query,
/// plus the NEXTSTATE query when `stateful` is set.
pub fn prepare_controller(
    config: &RunConfig,
) -> Result<StateFeedbackController<RegoQuery>, PregoError> {
    let sources = PolicySources::load(&config.policy_paths, &config.data_paths)?;
    let engine = PolicyEngine::new(&sources)?;
    let main = engine.compile(&config.query)?;

    info!(
        query = %config.query,
        modules = sources.modules().len(),
        stateful = config.stateful,
        "query prepared"
    );

    if config.stateful {
        let next_state = engine.compile(NEXTSTATE_QUERY)?;
        Ok(StateFeedbackController::with_feedback(main, next_state))
    } else {
        Ok(StateFeedbackController::stateless(main))
    }
}
