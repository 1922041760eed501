//! Runs one pipeline per calendar day, each day gated on the previous day's
//! hand-off instead of on its completion.

use async_trait::async_trait;
use chrono::NaiveDate;
use daylife_indexing::{MemoryIndex, MemoryRegistry};
use daylife_schemas::Event;
use daylife_timeline::{date_span, format_day};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::{MindError, Result};
use crate::pipeline::{DailyPipeline, PipelineSettings};
use crate::services::Services;

/// Single-fire "the next day may start" signal.
///
/// Raising twice is a no-op. A hand-off dropped without being raised raises
/// itself, so a day that dies early never blocks the chain.
#[derive(Debug)]
pub struct HandOff {
    date: NaiveDate,
    sender: Option<oneshot::Sender<()>>,
}

/// Receiving end of a [`HandOff`]
#[derive(Debug)]
pub struct StartGate {
    receiver: oneshot::Receiver<()>,
}

impl HandOff {
    pub fn channel(date: NaiveDate) -> (HandOff, StartGate) {
        let (sender, receiver) = oneshot::channel();
        (
            HandOff {
                date,
                sender: Some(sender),
            },
            StartGate { receiver },
        )
    }

    pub fn raise(&mut self) {
        if let Some(sender) = self.sender.take() {
            // The receiving day may already be gone; nothing to wake then.
            let _ = sender.send(());
            debug!("Day {} handed off to the next day", format_day(self.date));
        }
    }

    pub fn is_raised(&self) -> bool {
        self.sender.is_none()
    }
}

impl Drop for HandOff {
    fn drop(&mut self) {
        self.raise();
    }
}

impl StartGate {
    /// A gate that is already open, for the first day of a run
    pub fn open() -> Self {
        let (mut handoff, gate) = HandOff::channel(NaiveDate::MIN);
        handoff.raise();
        gate
    }

    /// Wait until the paired hand-off is raised or dropped
    pub async fn wait(self) {
        let _ = self.receiver.await;
    }
}

/// Runs a single day. The implementation must raise `handoff` as soon as
/// the next day may start.
#[async_trait]
pub trait DayRunner: Send + Sync + 'static {
    async fn run_day(
        &self,
        date: NaiveDate,
        memory: Arc<MemoryIndex>,
        handoff: &mut HandOff,
    ) -> Result<()>;
}

/// Runs the full [`DailyPipeline`] for each day, always starting from the
/// initial forest
pub struct PipelineRunner {
    initial_events: Vec<Event>,
    services: Services,
    settings: PipelineSettings,
}

impl PipelineRunner {
    pub fn new(initial_events: Vec<Event>, services: Services, settings: PipelineSettings) -> Self {
        Self {
            initial_events,
            services,
            settings,
        }
    }
}

#[async_trait]
impl DayRunner for PipelineRunner {
    async fn run_day(
        &self,
        date: NaiveDate,
        memory: Arc<MemoryIndex>,
        handoff: &mut HandOff,
    ) -> Result<()> {
        let mut pipeline = DailyPipeline::new(
            date,
            self.initial_events.clone(),
            memory,
            self.services.clone(),
            self.settings.clone(),
        );
        pipeline.run(handoff).await?;
        Ok(())
    }
}

/// Outcome of a multi-day run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub completed: Vec<NaiveDate>,
    pub failed: Vec<(NaiveDate, String)>,
    pub timed_out: Vec<NaiveDate>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }
}

pub struct DayScheduler {
    runner: Arc<dyn DayRunner>,
    memory: Arc<MemoryRegistry>,
    join_timeout: Duration,
}

impl DayScheduler {
    pub fn new(runner: Arc<dyn DayRunner>, memory: Arc<MemoryRegistry>, join_timeout: Duration) -> Self {
        Self {
            runner,
            memory,
            join_timeout,
        }
    }

    /// Launch every day in `start..=end` and wait for each in date order
    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<RunReport> {
        let days = date_span(start, end)?;
        info!(
            "Scheduling {} days from {} to {}",
            days.len(),
            format_day(start),
            format_day(end)
        );

        let mut gate = StartGate::open();
        let mut handles = Vec::with_capacity(days.len());

        for date in days {
            let memory = self
                .memory
                .index_for(&format_day(date))
                .map_err(|e| MindError::external("memory index", e))?;
            let (mut handoff, next_gate) = HandOff::channel(date);
            let start_gate = std::mem::replace(&mut gate, next_gate);
            let runner = self.runner.clone();

            let handle = tokio::spawn(async move {
                start_gate.wait().await;
                info!("Day {} started", format_day(date));

                let result = runner.run_day(date, memory, &mut handoff).await;
                if let Err(ref err) = result {
                    error!("Day {} failed: {}", format_day(date), err);
                }
                handoff.raise();
                result
            });
            handles.push((date, handle));
        }

        let mut report = RunReport::default();
        for (date, handle) in handles {
            match tokio::time::timeout(self.join_timeout, handle).await {
                Ok(Ok(Ok(()))) => report.completed.push(date),
                Ok(Ok(Err(err))) => report.failed.push((date, err.to_string())),
                Ok(Err(join_err)) => {
                    error!("Day {} task aborted: {}", format_day(date), join_err);
                    report.failed.push((date, join_err.to_string()));
                }
                Err(_) => {
                    // Dropping the handle detaches the task; it keeps running.
                    warn!(
                        "Day {} still running after {:?}, no longer waiting",
                        format_day(date),
                        self.join_timeout
                    );
                    report.timed_out.push(date);
                }
            }
        }

        info!(
            "Run finished: {} completed, {} failed, {} timed out",
            report.completed.len(),
            report.failed.len(),
            report.timed_out.len()
        );
        Ok(report)
    }
}
