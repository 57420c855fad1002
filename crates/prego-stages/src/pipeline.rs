//! Staged Pipeline: generator → evaluator → printer
//!
//! ```text
//!  BEGIN lines
//!      ↓
//!  generator ──Event──→ evaluator ──OutputItem──→ printer ──→ sink
//!  (input)      (1)     (MAIN, NEXTSTATE)   (1)   (formatter)
//!      ↓
//!  epilogue, END lines
//! ```
//!
//! Each stage is one task and every hand-off is a capacity-1 channel, so a
//! stage cannot run more than one item ahead of the next and output keeps
//! event order. Tasks hand their owned resources back when they finish: the
//! evaluator returns the session (END needs its engine and final state), the
//! printer returns the formatter and the sink.
use crate::session::{items, Session};
use prego_core::runner::write_line;
use prego_core::{
    Event, EventSource, OutputFormatter, OutputItem, PreparedQuery, PregoError, Result,
    RunSummary, Shutdown, ShutdownListener,
};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, info, info_span, Instrument};

/// Items a stage may hand off before it has to wait for the next stage.
pub const HANDOFF_CAPACITY: usize = 1;

pub struct StagedPipeline<Q, F> {
    session: Session<Q>,
    formatter: F,
}

impl<Q, F> StagedPipeline<Q, F>
where
    Q: PreparedQuery + 'static,
    F: OutputFormatter + 'static,
{
    pub fn new(session: Session<Q>, formatter: F) -> Self {
        Self { session, formatter }
    }

    /// Runs the session to completion. Input end and `shutdown` take the same
    /// path: stop reading, drain what is in flight, print the epilogue and
    /// END. A fatal error skips both.
    pub async fn run<R, W>(
        self,
        source: EventSource<R>,
        mut sink: W,
        shutdown: &Shutdown,
    ) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            mut session,
            formatter,
        } = self;

        for line in session.begin_lines()? {
            write_line(&mut sink, &line).await?;
        }

        let (event_tx, event_rx) = mpsc::channel::<Event>(HANDOFF_CAPACITY);
        let (item_tx, item_rx) = mpsc::channel::<OutputItem>(HANDOFF_CAPACITY);

        let generator = tokio::spawn(
            generate(source, event_tx, shutdown.listener()).instrument(info_span!("generator")),
        );
        let evaluator =
            tokio::spawn(evaluate(session, event_rx, item_tx).instrument(info_span!("evaluator")));
        let printer =
            tokio::spawn(print(formatter, sink, item_rx).instrument(info_span!("printer")));

        let (generated, evaluated, printed) = tokio::join!(generator, evaluator, printer);
        let interrupted = joined("generator", generated)?;
        let (mut session, events) = joined("evaluator", evaluated)?;
        let (formatter, mut sink, printed_items) = joined("printer", printed)?;

        if let Some(epilogue) = formatter.epilogue() {
            write_line(&mut sink, &epilogue).await?;
        }
        for line in session.end_lines()? {
            write_line(&mut sink, &line).await?;
        }
        sink.flush().await?;

        let summary = RunSummary {
            events,
            items: printed_items,
            interrupted,
        };
        info!(
            events = summary.events,
            items = summary.items,
            interrupted = summary.interrupted,
            "session finished"
        );
        Ok(summary)
    }
}

fn joined<T>(stage: &str, result: std::result::Result<Result<T>, JoinError>) -> Result<T> {
    result.map_err(|e| PregoError::Pipeline(format!("{stage} stage failed: {e}")))?
}

/// Reads events until the input ends, shutdown fires, or the evaluator is
/// gone. Returns whether shutdown stopped it.
async fn generate<R>(
    mut source: EventSource<R>,
    events: mpsc::Sender<Event>,
    mut shutdown: ShutdownListener,
) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.wait() => {
                info!(line = source.line_number(), "shutdown requested, no more input");
                return Ok(true);
            }
            _ = events.closed() => return Ok(false),
            next = source.next_event() => next,
        };
        let Some(event) = next else {
            debug!(lines = source.line_number(), "input closed");
            return Ok(false);
        };
        if events.send(event?).await.is_err() {
            return Ok(false);
        }
    }
}

/// Evaluates MAIN (and NEXTSTATE) per event. Items of an event are handed
/// to the printer before the state moves on.
async fn evaluate<Q>(
    mut session: Session<Q>,
    mut events: mpsc::Receiver<Event>,
    printer: mpsc::Sender<OutputItem>,
) -> Result<(Session<Q>, u64)>
where
    Q: PreparedQuery,
{
    let mut count = 0;
    'events: loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = printer.closed() => None,
        };
        let Some(event) = event else {
            break;
        };
        count += 1;

        let mut transition = session.controller.begin(&event)?;
        for item in items(transition.take_outputs()) {
            if printer.send(item).await.is_err() {
                break 'events;
            }
        }
        transition.commit()?;
    }
    Ok((session, count))
}

async fn print<F, W>(
    formatter: F,
    mut sink: W,
    mut items: mpsc::Receiver<OutputItem>,
) -> Result<(F, W, u64)>
where
    F: OutputFormatter,
    W: AsyncWrite + Unpin,
{
    if let Some(preamble) = formatter.preamble() {
        write_line(&mut sink, &preamble).await?;
    }

    let mut count = 0;
    while let Some(item) = items.recv().await {
        let line = formatter.print(&item)?;
        write_line(&mut sink, &line).await?;
        sink.flush().await?;
        count += 1;
    }
    Ok((formatter, sink, count))
}
