//! Session: the BEGIN/MAIN/END rules of one package, resolved once
use prego_core::feedback::NEXTSTATE_QUERY;
use prego_core::{
    OutputItem, PreparedQuery, PregoError, Result, ResultBinding, State,
    StateFeedbackController,
};
use prego_policy::{PolicyEngine, PolicySources, RegoQuery};
use serde_json::Value;
use tracing::info;

/// Binding that carries BEGIN and END values.
pub const LINES_BINDING: &str = "lines";

/// Binding that carries MAIN values.
pub const ITEMS_BINDING: &str = "items";

pub struct Session<Q> {
    begin: Q,
    pub(crate) controller: StateFeedbackController<Q>,
    end: Q,
}

impl Session<RegoQuery> {
    /// Compiles `data.<package>.BEGIN`, `.MAIN` and `.END` from `sources`,
    /// plus the NEXTSTATE query when `stateful` is set.
    pub fn resolve(sources: &PolicySources, package: &str, stateful: bool) -> Result<Self> {
        validate_package(package)?;
        let engine = PolicyEngine::new(sources)?;

        let begin = engine.compile(&format!("{LINES_BINDING} = data.{package}.BEGIN"))?;
        let main = engine.compile(&format!("{ITEMS_BINDING} = data.{package}.MAIN"))?;
        let end = engine.compile(&format!("{LINES_BINDING} = data.{package}.END"))?;

        let controller = if stateful {
            StateFeedbackController::with_feedback(main, engine.compile(NEXTSTATE_QUERY)?)
        } else {
            StateFeedbackController::stateless(main)
        };

        info!(package, stateful, modules = sources.modules().len(), "session resolved");
        Ok(Self::new(begin, controller, end))
    }
}

impl<Q: PreparedQuery> Session<Q> {
    /// `controller` evaluates MAIN; its binding must be [`ITEMS_BINDING`].
    pub fn new(begin: Q, controller: StateFeedbackController<Q>, end: Q) -> Self {
        Self {
            begin,
            controller,
            end,
        }
    }

    pub fn state(&self) -> &State {
        self.controller.state()
    }

    pub fn begin_lines(&mut self) -> Result<Vec<String>> {
        let state = self.controller.feedback_state();
        let bindings = self.begin.evaluate(None, state)?;
        Ok(lines(&bindings))
    }

    pub fn end_lines(&mut self) -> Result<Vec<String>> {
        let state = self.controller.feedback_state();
        let bindings = self.end.evaluate(None, state)?;
        Ok(lines(&bindings))
    }
}

/// One entry per element for arrays (and sets), otherwise the value itself.
pub fn expand(value: Option<&Value>) -> Vec<Value> {
    match value {
        None => Vec::new(),
        Some(Value::Array(elements)) => elements.clone(),
        Some(other) => vec![other.clone()],
    }
}

pub(crate) fn items(bindings: Vec<ResultBinding>) -> Vec<OutputItem> {
    bindings
        .iter()
        .flat_map(|binding| expand(binding.get(ITEMS_BINDING)))
        .map(OutputItem)
        .collect()
}

fn lines(bindings: &[ResultBinding]) -> Vec<String> {
    bindings
        .iter()
        .flat_map(|binding| expand(binding.get(LINES_BINDING)))
        .map(|value| match value {
            Value::String(line) => line,
            other => other.to_string(),
        })
        .collect()
}

fn validate_package(package: &str) -> Result<()> {
    let valid = !package.is_empty()
        && package
            .split('.')
            .all(|part| {
                !part.is_empty()
                    && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                    && !part.starts_with(|c: char| c.is_ascii_digit())
            });
    if valid {
        Ok(())
    } else {
        Err(PregoError::Config(format!("invalid package name: {package}")))
    }
}
