//! State Feedback: threads one state document through successive evaluations
//!
//! ```text
//! event k ─→ MAIN(event, state_k) ─→ outputs
//!        └─→ NEXTSTATE(event, state_k) ─→ state_k+1 ─→ visible to event k+1
//! ```
use crate::data_model::{Event, ResultBinding, State};
use crate::engine::PreparedQuery;
use crate::error::{PregoError, Result};
use tracing::debug;

/// Query compiled for the feedback step. Policies define `nextstate` in the
/// `prego` package and read the current value from `data.prego_state`.
pub const NEXTSTATE_QUERY: &str = "nextstate = data.prego.nextstate";

/// Binding that carries the next state out of [`NEXTSTATE_QUERY`].
pub const NEXTSTATE_BINDING: &str = "nextstate";

/// Where the current state is mounted in `data`.
pub const STATE_DATA_KEY: &str = "prego_state";

/// Outcome of committing a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// Feedback is disabled.
    Stateless,
    /// NEXTSTATE produced no result.
    Unchanged,
    Advanced { version: u64 },
}

pub struct StateFeedbackController<Q> {
    main: Q,
    next_state: Option<Q>,
    state: State,
}

impl<Q: PreparedQuery> StateFeedbackController<Q> {
    pub fn stateless(main: Q) -> Self {
        Self {
            main,
            next_state: None,
            state: State::initial(),
        }
    }

    pub fn with_feedback(main: Q, next_state: Q) -> Self {
        Self {
            main,
            next_state: Some(next_state),
            state: State::initial(),
        }
    }

    pub fn is_stateful(&self) -> bool {
        self.next_state.is_some()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The state as queries should see it: `None` when feedback is off.
    pub fn feedback_state(&self) -> Option<&State> {
        self.next_state.as_ref().map(|_| &self.state)
    }

    /// Evaluates MAIN for `event`. The returned transition holds the
    /// controller until it is committed or dropped, so the next event cannot
    /// start before this one has updated the state.
    pub fn begin<'a>(&'a mut self, event: &'a Event) -> Result<Transition<'a, Q>> {
        let state = if self.next_state.is_some() {
            Some(&self.state)
        } else {
            None
        };
        let outputs = self.main.evaluate(Some(event), state)?;
        debug!(query = self.main.query(), results = outputs.len(), "evaluated event");

        Ok(Transition {
            controller: self,
            event,
            outputs,
        })
    }
}

pub struct Transition<'a, Q> {
    controller: &'a mut StateFeedbackController<Q>,
    event: &'a Event,
    outputs: Vec<ResultBinding>,
}

impl<'a, Q: PreparedQuery> Transition<'a, Q> {
    pub fn take_outputs(&mut self) -> Vec<ResultBinding> {
        std::mem::take(&mut self.outputs)
    }

    /// Runs NEXTSTATE and installs its result as the new state.
    pub fn commit(self) -> Result<StateChange> {
        let controller = self.controller;
        let Some(next_query) = controller.next_state.as_mut() else {
            return Ok(StateChange::Stateless);
        };

        let results = next_query.evaluate(Some(self.event), Some(&controller.state))?;
        let Some(first) = results.first() else {
            return Ok(StateChange::Unchanged);
        };
        let Some(next) = first.get(NEXTSTATE_BINDING).cloned() else {
            return Err(PregoError::MissingBinding {
                binding: NEXTSTATE_BINDING.to_string(),
                bindings: serde_json::to_string(&results).unwrap_or_default(),
            });
        };

        let current = std::mem::take(&mut controller.state);
        controller.state = current.advance(next);
        let version = controller.state.version();
        debug!(version, "state advanced");

        Ok(StateChange::Advanced { version })
    }
}
