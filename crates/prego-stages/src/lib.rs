//! prego stages: BEGIN/MAIN/END sessions
//!
//! A policy package may define three rules that split a run into stages:
//!
//! | Rule | Evaluated | Output |
//! |---|---|---|
//! | `BEGIN` | once, before any input | printed verbatim, one line per element |
//! | `MAIN` | once per event | one formatted item per element |
//! | `END` | once, after input ends or shutdown | printed verbatim, one line per element |
//!
//! Undefined rules print nothing. With state feedback on, `END` sees the
//! final state under `data.prego_state`.
//!
//! # Pipeline Flow
//!
//! ```text
//! EventSource → generator → evaluator → printer → sink
//!                              ↓
//!                           Session (MAIN + NEXTSTATE)
//! ```

pub mod pipeline;
pub mod session;

pub use pipeline::{StagedPipeline, HANDOFF_CAPACITY};
pub use session::{expand, Session, ITEMS_BINDING, LINES_BINDING};
