//! Rego evaluation engine
//!
//! Wraps `regorus::Engine`. Modules and data are added once; every compiled
//! query owns its own engine clone so queries never share mutable state.

use crate::sources::PolicySources;
use prego_core::feedback::STATE_DATA_KEY;
use prego_core::{Event, PreparedQuery, PregoError, ResultBinding, State};
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

/// Engine loaded with modules and data, ready to compile queries
#[derive(Clone)]
pub struct PolicyEngine {
    engine: regorus::Engine,
    data: regorus::Value,
}

impl PolicyEngine {
    pub fn new(sources: &PolicySources) -> Result<Self, PregoError> {
        let mut engine = regorus::Engine::new();
        for module in sources.modules() {
            engine
                .add_policy(module.path.clone(), module.source.clone())
                .map_err(|e| PregoError::Compile(format!("{}: {e:#}", module.path)))?;
        }

        let data = to_rego(&Value::Object(sources.data().clone()))
            .map_err(|e| PregoError::Config(format!("invalid data: {e:#}")))?;
        engine
            .add_data(data.clone())
            .map_err(|e| PregoError::Config(format!("invalid data: {e:#}")))?;

        debug!(modules = sources.modules().len(), "policy engine ready");
        Ok(Self { engine, data })
    }

    /// Prepares `query`. Syntax errors surface here, before any event is
    /// read; errors that depend on the input surface per event.
    pub fn compile(&self, query: &str) -> Result<RegoQuery, PregoError> {
        check_syntax(query)
            .map_err(|e| PregoError::Compile(format!("error creating evalQuery `{query}`: {e:#}")))?;
        Ok(RegoQuery {
            engine: self.engine.clone(),
            data: self.data.clone(),
            query: query.to_string(),
            mounted: None,
        })
    }
}

/// Parses `query` as the body of a throwaway rule on an empty engine, which
/// rejects malformed queries without evaluating anything.
fn check_syntax(query: &str) -> anyhow::Result<()> {
    let module = format!("package prego_query_check\nimport rego.v1\n\nok if {{\n{query}\n}}\n");
    regorus::Engine::new().add_policy("<query>".to_string(), module)?;
    Ok(())
}

/// A compiled query bound to a private engine
pub struct RegoQuery {
    engine: regorus::Engine,
    data: regorus::Value,
    query: String,
    /// Version of the state currently under `data.prego_state`.
    mounted: Option<u64>,
}

impl RegoQuery {
    /// Remounts the data document only when the state changed since the
    /// last evaluation. regorus rejects re-adding a key with a new value, so
    /// the base data goes back in first; cloning it only bumps a refcount.
    fn mount(&mut self, state: Option<&State>) -> anyhow::Result<()> {
        let version = state.map(State::version);
        if version == self.mounted {
            return Ok(());
        }

        self.engine.clear_data();
        self.engine.add_data(self.data.clone())?;
        if let Some(state) = state {
            let mut document = serde_json::Map::new();
            document.insert(STATE_DATA_KEY.to_string(), state.document().clone());
            self.engine.add_data(to_rego(&Value::Object(document))?)?;
        }
        self.mounted = version;
        Ok(())
    }
}

impl PreparedQuery for RegoQuery {
    fn query(&self) -> &str {
        &self.query
    }

    fn evaluate(
        &mut self,
        input: Option<&Event>,
        state: Option<&State>,
    ) -> prego_core::Result<Vec<ResultBinding>> {
        let evaluation = |e: anyhow::Error| PregoError::Evaluation(format!("{e:#}"));

        self.mount(state).map_err(evaluation)?;
        let input = match input {
            Some(event) => to_rego(&event.to_value()).map_err(evaluation)?,
            None => regorus::Value::new_object(),
        };
        self.engine.set_input(input);

        let engine = &mut self.engine;
        let query = &self.query;
        let results = in_place(|| engine.eval_query(query.clone(), false)).map_err(evaluation)?;

        results
            .result
            .iter()
            .map(|result| from_rego(&result.bindings).map_err(evaluation))
            .map(|bindings| {
                bindings.map(|value| match value {
                    Value::Object(map) => ResultBinding::new(map),
                    _ => ResultBinding::default(),
                })
            })
            .collect()
    }
}

/// Evaluation is synchronous. On a multi-threaded runtime the worker hands
/// its other tasks off first; elsewhere it just runs inline.
fn in_place<T>(evaluate: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(evaluate)
        }
        _ => evaluate(),
    }
}

fn to_rego(value: &Value) -> anyhow::Result<regorus::Value> {
    Ok(regorus::Value::deserialize(value)?)
}

fn from_rego(value: &regorus::Value) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}
