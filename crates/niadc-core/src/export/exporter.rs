//! Periodic export thread
//!
//! Every period the loop drains the ring buffer, reshapes the snapshot into
//! rows, appends them to storage and copies them to the display buffer.
//!
//! A storage failure is fatal for the session: the rows from that drain are
//! lost and reported, and the thread exits. On stop (or when acquisition
//! fails) one final drain persists whatever is still buffered.

use crate::acquisition::gate::DrainCoordinator;
use crate::export::display::DisplayBuffer;
use crate::export::storage::Storage;
use crate::session::control::{Component, SessionControl};
use crate::session::{panic_message, SessionError};
use crossbeam_channel::{select, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Totals reported when the export thread exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Export periods elapsed (including the final drain)
    pub ticks: u64,
    /// Rows appended to storage
    pub rows_exported: u64,
}

#[derive(Default)]
struct ExportCounters {
    ticks: AtomicU64,
    rows_exported: AtomicU64,
}

impl ExportCounters {
    fn summary(&self) -> ExportSummary {
        ExportSummary {
            ticks: self.ticks.load(Ordering::Relaxed),
            rows_exported: self.rows_exported.load(Ordering::Relaxed),
        }
    }
}

/// Consumer side of the pipeline
pub struct ExportLoop {
    period: Duration,
    coordinator: Arc<DrainCoordinator>,
    storage: Storage,
    display: Arc<DisplayBuffer>,
}

impl ExportLoop {
    pub fn new(
        coordinator: Arc<DrainCoordinator>,
        storage: Storage,
        display: Arc<DisplayBuffer>,
        period: Duration,
    ) -> Self {
        Self {
            period,
            coordinator,
            storage,
            display,
        }
    }

    /// Drain once and export the result
    ///
    /// Returns the number of rows written; an empty drain writes nothing.
    pub fn export_once(&mut self) -> Result<usize, SessionError> {
        let snapshot = self.coordinator.drain();
        if snapshot.is_empty() {
            return Ok(0);
        }

        let rows = snapshot.into_rows();
        if let Err(e) = self.storage.append_rows(&rows) {
            tracing::error!(rows_lost = rows.len(), error = %e, "Failed to export rows");
            return Err(SessionError::StorageWrite(e));
        }
        self.display.extend(&rows);

        tracing::debug!(rows = rows.len(), "Exported rows");
        Ok(rows.len())
    }

    /// Spawn the export thread
    pub fn start(self, control: Arc<SessionControl>) -> Result<ExportHandle, SessionError> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let counters = Arc::new(ExportCounters::default());
        let thread_counters = Arc::clone(&counters);
        let period = self.period;

        let thread = std::thread::Builder::new()
            .name("export".into())
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    self.run(&stop_rx, &control, &thread_counters)
                }))
                .unwrap_or_else(|panic| {
                    Err(SessionError::Panicked {
                        component: Component::Export,
                        message: panic_message(panic),
                    })
                });

                if let Err(ref e) = result {
                    control.report(Component::Export, e);
                }
                result
            })
            .map_err(SessionError::Spawn)?;

        tracing::info!(period_ms = period.as_millis() as u64, "Export loop started");

        Ok(ExportHandle {
            stop_tx: Some(stop_tx),
            counters,
            thread: Some(thread),
        })
    }

    fn run(
        mut self,
        stop_rx: &Receiver<()>,
        control: &SessionControl,
        counters: &ExportCounters,
    ) -> Result<ExportSummary, SessionError> {
        let ticker = crossbeam_channel::tick(self.period);

        loop {
            select! {
                recv(ticker) -> _ => {},
                // Sender dropped: stop requested
                recv(stop_rx) -> _ => break,
            }
            if control.is_failed() {
                tracing::warn!("Session failed, exporting remaining samples");
                break;
            }
            self.tick(counters)?;
        }

        self.tick(counters)?;

        let summary = counters.summary();
        tracing::info!(
            ticks = summary.ticks,
            rows = summary.rows_exported,
            "Export loop stopped"
        );
        Ok(summary)
    }

    fn tick(&mut self, counters: &ExportCounters) -> Result<(), SessionError> {
        let rows = self.export_once()?;
        counters.ticks.fetch_add(1, Ordering::Relaxed);
        counters
            .rows_exported
            .fetch_add(rows as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Handle returned by [`ExportLoop::start`] to stop the export thread
pub struct ExportHandle {
    stop_tx: Option<Sender<()>>,
    counters: Arc<ExportCounters>,
    thread: Option<JoinHandle<Result<ExportSummary, SessionError>>>,
}

impl ExportHandle {
    /// Stop the thread after a final drain and wait for it to finish
    pub fn stop(&mut self) -> Result<ExportSummary, SessionError> {
        self.stop_tx.take();
        match self.thread.take() {
            Some(h) => h.join().unwrap_or_else(|panic| {
                Err(SessionError::Panicked {
                    component: Component::Export,
                    message: panic_message(panic),
                })
            }),
            None => Ok(self.counters.summary()),
        }
    }

    /// Check if the export thread is still alive
    pub fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Live counters
    pub fn summary(&self) -> ExportSummary {
        self.counters.summary()
    }
}

impl Drop for ExportHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
