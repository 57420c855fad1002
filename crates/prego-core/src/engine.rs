//! Prepared Query: the contract every evaluation engine fulfils
use crate::data_model::{Event, ResultBinding, State};
use crate::error::Result;

/// A compiled query bound to its modules and data.
///
/// `evaluate` takes `&mut self`: whoever owns the handle is the only one
/// evaluating it, which keeps reads of the injected state sequential.
pub trait PreparedQuery: Send {
    /// Source text of the query (ex: "res = data")
    fn query(&self) -> &str;

    /// Evaluates against `input` (absent for BEGIN/END) and, when feedback
    /// is on, the current state.
    fn evaluate(
        &mut self,
        input: Option<&Event>,
        state: Option<&State>,
    ) -> Result<Vec<ResultBinding>>;
}

impl<Q: PreparedQuery + ?Sized> PreparedQuery for Box<Q> {
    fn query(&self) -> &str {
        (**self).query()
    }

    fn evaluate(
        &mut self,
        input: Option<&Event>,
        state: Option<&State>,
    ) -> Result<Vec<ResultBinding>> {
        (**self).evaluate(input, state)
    }
}

/// Query backed by a closure. Handy for embedding and for tests that should
/// not depend on a real engine.
pub struct FnQuery<F> {
    query: String,
    eval: F,
}

impl<F> FnQuery<F>
where
    F: FnMut(Option<&Event>, Option<&State>) -> Result<Vec<ResultBinding>> + Send,
{
    pub fn new(query: impl Into<String>, eval: F) -> Self {
        Self {
            query: query.into(),
            eval,
        }
    }
}

impl<F> PreparedQuery for FnQuery<F>
where
    F: FnMut(Option<&Event>, Option<&State>) -> Result<Vec<ResultBinding>> + Send,
{
    fn query(&self) -> &str {
        &self.query
    }

    fn evaluate(
        &mut self,
        input: Option<&Event>,
        state: Option<&State>,
    ) -> Result<Vec<ResultBinding>> {
        (self.eval)(input, state)
    }
}
