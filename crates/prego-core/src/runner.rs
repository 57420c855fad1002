//! Pipeline Runner: the single-loop lifecycle (read → evaluate → format → write)
use crate::data_model::OutputItem;
use crate::engine::PreparedQuery;
use crate::error::Result;
use crate::feedback::StateFeedbackController;
use crate::format::OutputFormatter;
use crate::shutdown::Shutdown;
use crate::source::EventSource;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Counters reported when a run ends without a fatal error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub events: u64,
    pub items: u64,
    /// The run stopped because shutdown was requested, not at end of input.
    pub interrupted: bool,
}

pub struct PipelineRunner<Q, F> {
    controller: StateFeedbackController<Q>,
    formatter: F,
}

impl<Q, F> PipelineRunner<Q, F>
where
    Q: PreparedQuery,
    F: OutputFormatter,
{
    pub fn new(controller: StateFeedbackController<Q>, formatter: F) -> Self {
        Self {
            controller,
            formatter,
        }
    }

    pub fn controller(&self) -> &StateFeedbackController<Q> {
        &self.controller
    }

    /// Processes events one at a time until the source closes or `shutdown`
    /// fires. An event that was already read is always finished; the epilogue
    /// is written in both cases.
    pub async fn run<R, W>(
        &mut self,
        source: &mut EventSource<R>,
        sink: &mut W,
        shutdown: &Shutdown,
    ) -> Result<RunSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut listener = shutdown.listener();
        let mut summary = RunSummary::default();

        if let Some(preamble) = self.formatter.preamble() {
            write_line(sink, &preamble).await?;
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = listener.wait() => {
                    summary.interrupted = true;
                    break;
                }
                next = source.next_event() => next,
            };
            let Some(event) = next else {
                break;
            };
            let event = event?;
            summary.events += 1;

            let mut transition = self.controller.begin(&event)?;
            for binding in transition.take_outputs() {
                let line = self.formatter.print(&OutputItem::from(binding))?;
                write_line(sink, &line).await?;
                summary.items += 1;
            }
            transition.commit()?;
            sink.flush().await?;

            debug!(line = source.line_number(), "event done");
        }

        if let Some(epilogue) = self.formatter.epilogue() {
            write_line(sink, &epilogue).await?;
        }
        sink.flush().await?;

        info!(
            stateful = self.controller.is_stateful(),
            events = summary.events,
            items = summary.items,
            interrupted = summary.interrupted,
            "run finished"
        );
        Ok(summary)
    }
}

pub async fn write_line<W>(sink: &mut W, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    sink.write_all(line.as_bytes()).await?;
    sink.write_all(b"\n").await?;
    Ok(())
}
