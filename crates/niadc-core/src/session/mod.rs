//! Measurement session
//!
//! A [`Session`] ties the pipeline together: it creates the on-disk layout,
//! wires the acquisition loop, the drain coordinator and the export loop,
//! and owns the threads from start to join.
//!
//! Lifecycle: `Ready -> Running -> Stopped | Failed`. Stopping joins the
//! acquisition thread first, then the export thread, whose final drain
//! persists everything enqueued before the stop.

pub mod control;
pub mod layout;

use crate::acquisition::engine::{AcquisitionHandle, AcquisitionLoop, AcquisitionSummary};
use crate::acquisition::gate::DrainCoordinator;
use crate::acquisition::ring::RingBufferError;
use crate::acquisition::source::{SampleSource, SourceError};
use crate::config::{ConfigError, SessionConfig};
use crate::export::display::DisplayBuffer;
use crate::export::exporter::{ExportHandle, ExportLoop, ExportSummary};
use crate::export::storage::{Storage, StorageError};
use control::{Component, Failure, SessionControl};
use layout::SessionLayout;
use std::any::Any;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("acquisition timed out: requested {requested} samples, received {received}")]
    SourceTimeout { requested: usize, received: usize },

    #[error("sample source error: {0}")]
    Source(#[source] SourceError),

    #[error("session output already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("failed to write samples: {0}")]
    StorageWrite(#[source] StorageError),

    #[error("ring buffer error: {0}")]
    RingBuffer(#[from] RingBufferError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("{component} thread panicked: {message}")]
    Panicked {
        component: Component,
        message: String,
    },

    #[error("cannot {action} a session that is {state:?}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
}

impl From<SourceError> for SessionError {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::Timeout {
                requested,
                received,
            } => SessionError::SourceTimeout {
                requested,
                received,
            },
            other => SessionError::Source(other),
        }
    }
}

impl From<StorageError> for SessionError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::AlreadyExists(path) => SessionError::AlreadyExists(path),
            other => SessionError::StorageWrite(other),
        }
    }
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Files created, threads not started
    Ready,
    Running,
    /// Stopped cleanly (terminal)
    Stopped,
    /// Stopped after a fatal error (terminal)
    Failed,
}

/// Counters for a session run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub blocks_read: u64,
    pub samples_enqueued: u64,
    /// Blocks discarded because a drain was in flight
    pub blocks_skipped: u64,
    /// Samples overwritten in the ring buffer before export
    pub samples_evicted: u64,
    pub rows_exported: u64,
    pub ticks: u64,
    pub data_path: PathBuf,
}

/// One configured measurement run
pub struct Session {
    config: SessionConfig,
    layout: SessionLayout,
    state: SessionState,
    coordinator: Arc<DrainCoordinator>,
    display: Arc<DisplayBuffer>,
    control: Arc<SessionControl>,
    pending: Option<(AcquisitionLoop, ExportLoop)>,
    acquisition: Option<AcquisitionHandle>,
    export: Option<ExportHandle>,
}

impl Session {
    /// Create a session under a new timestamped directory in `save_file_dir`
    pub fn create(
        config: SessionConfig,
        source: Box<dyn SampleSource>,
    ) -> Result<Self, SessionError> {
        let layout = SessionLayout::timestamped(&config.save_file_dir, &config.save_file_name);
        Self::create_in(config, layout, source)
    }

    /// Create a session in an explicit layout
    ///
    /// Nothing is written if the configuration is invalid. If the data file
    /// or the settings dump cannot be written, the new directory is removed
    /// again.
    pub fn create_in(
        config: SessionConfig,
        layout: SessionLayout,
        source: Box<dyn SampleSource>,
    ) -> Result<Self, SessionError> {
        let settings = config.acquisition_settings()?;
        let coordinator = Arc::new(DrainCoordinator::with_capacity(
            settings.channels.len(),
            config.data_length,
        )?);

        let dir = layout.dir();
        if let Some(parent) = dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::create_dir(dir).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => SessionError::AlreadyExists(dir.to_path_buf()),
            _ => SessionError::Io {
                path: dir.to_path_buf(),
                source: e,
            },
        })?;

        let storage = match Self::write_files(&config, &layout, &settings.channels.columns()) {
            Ok(storage) => storage,
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(dir) {
                    tracing::warn!(dir = %dir.display(), error = %cleanup, "Failed to remove session directory");
                }
                return Err(e);
            }
        };

        let display = Arc::new(DisplayBuffer::new(config.display_capacity));
        let acquisition = AcquisitionLoop::new(source, settings, Arc::clone(&coordinator));
        let export = ExportLoop::new(
            Arc::clone(&coordinator),
            storage,
            Arc::clone(&display),
            config.export_period(),
        );

        tracing::info!(
            dir = %dir.display(),
            version = crate::VERSION,
            build = crate::BUILD_DATE,
            "Session created"
        );

        Ok(Self {
            config,
            layout,
            state: SessionState::Ready,
            coordinator,
            display,
            control: Arc::new(SessionControl::new()),
            pending: Some((acquisition, export)),
            acquisition: None,
            export: None,
        })
    }

    fn write_files(
        config: &SessionConfig,
        layout: &SessionLayout,
        columns: &[String],
    ) -> Result<Storage, SessionError> {
        let storage = Storage::create(&layout.data_path(), columns)?;
        let settings_path = layout.settings_path();
        std::fs::write(&settings_path, config.to_settings_text()).map_err(|e| {
            SessionError::Io {
                path: settings_path.clone(),
                source: e,
            }
        })?;
        Ok(storage)
    }

    /// Open the source and start both threads
    pub fn start(&mut self) -> Result<(), SessionError> {
        let (acquisition, export) = match (self.state, self.pending.take()) {
            (SessionState::Ready, Some(loops)) => loops,
            (state, _) => {
                return Err(SessionError::InvalidState {
                    action: "start",
                    state,
                })
            }
        };

        let mut acquisition = match acquisition.start(Arc::clone(&self.control)) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, "Failed to start acquisition");
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        match export.start(Arc::clone(&self.control)) {
            Ok(handle) => self.export = Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start export, stopping acquisition");
                let _ = acquisition.stop();
                self.acquisition = Some(acquisition);
                self.state = SessionState::Failed;
                return Err(e);
            }
        }

        self.acquisition = Some(acquisition);
        self.state = SessionState::Running;
        tracing::info!(data = %self.layout.data_path().display(), "Session running");
        Ok(())
    }

    /// Stop both threads and return the run's counters
    ///
    /// Acquisition is joined first, then export performs its final drain.
    /// Returns the first fatal error of the run (acquisition before export).
    /// Once the session is terminal, later calls return the counters.
    pub fn stop(&mut self) -> Result<SessionSummary, SessionError> {
        match self.state {
            SessionState::Running => {}
            SessionState::Ready => {
                self.pending = None;
                self.state = SessionState::Stopped;
                tracing::info!("Session stopped before start");
                return Ok(self.summary());
            }
            SessionState::Stopped | SessionState::Failed => return Ok(self.summary()),
        }

        let acquisition = self.acquisition.as_mut().map(AcquisitionHandle::stop);
        let export = self.export.as_mut().map(ExportHandle::stop);

        let error = [
            acquisition.and_then(Result::err),
            export.and_then(Result::err),
        ]
        .into_iter()
        .flatten()
        .next();

        let summary = self.summary();
        match error {
            Some(e) => {
                self.state = SessionState::Failed;
                tracing::error!(error = %e, rows = summary.rows_exported, "Session failed");
                Err(e)
            }
            None => {
                self.state = SessionState::Stopped;
                tracing::info!(
                    blocks = summary.blocks_read,
                    rows = summary.rows_exported,
                    skipped = summary.blocks_skipped,
                    evicted = summary.samples_evicted,
                    "Session stopped"
                );
                Ok(summary)
            }
        }
    }

    /// Live counters (final once the session is terminal)
    pub fn summary(&self) -> SessionSummary {
        let acquisition = self
            .acquisition
            .as_ref()
            .map(AcquisitionHandle::summary)
            .unwrap_or_default();
        let export = self
            .export
            .as_ref()
            .map(ExportHandle::summary)
            .unwrap_or_default();
        summarize(
            acquisition,
            export,
            self.coordinator.evicted_total(),
            self.layout.data_path(),
        )
    }

    /// Block until a thread reports a failure or the timeout elapses
    pub fn wait_for_failure(&self, timeout: Duration) -> Option<Failure> {
        self.control.wait_for_failure(timeout)
    }

    /// Rows exported since the last poll, for a live front-end
    pub fn display(&self) -> &Arc<DisplayBuffer> {
        &self.display
    }

    pub fn control(&self) -> &Arc<SessionControl> {
        &self.control
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn paths(&self) -> &SessionLayout {
        &self.layout
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

fn summarize(
    acquisition: AcquisitionSummary,
    export: ExportSummary,
    samples_evicted: u64,
    data_path: PathBuf,
) -> SessionSummary {
    SessionSummary {
        blocks_read: acquisition.blocks_read,
        samples_enqueued: acquisition.samples_enqueued,
        blocks_skipped: acquisition.blocks_skipped,
        samples_evicted,
        rows_exported: export.rows_exported,
        ticks: export.ticks,
        data_path,
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state == SessionState::Running {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::source::{ScriptedSource, SimulatedSource};

    fn config(root: &std::path::Path) -> SessionConfig {
        SessionConfig {
            channel: vec![1, 0],
            data_length: 1000,
            read_samples: 10,
            save_file_dir: root.to_path_buf(),
            export_period_ms: 20,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_create_writes_layout() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let layout = SessionLayout::in_dir(dir.path().join("run"), &cfg.save_file_name);
        let session = Session::create_in(cfg.clone(), layout, Box::new(SimulatedSource::new())).unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        let data = std::fs::read_to_string(session.paths().data_path()).unwrap();
        assert_eq!(data, "timestamp,ch_1,ch_0\n");
        let settings = std::fs::read_to_string(session.paths().settings_path()).unwrap();
        assert_eq!(SessionConfig::from_settings_text(&settings).unwrap(), cfg);
    }

    #[test]
    fn test_invalid_config_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SessionConfig {
            sampling_rate: 0,
            ..config(dir.path())
        };
        let result = Session::create(cfg, Box::new(SimulatedSource::new()));
        assert!(matches!(result, Err(SessionError::Config(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_existing_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let run = dir.path().join("run");
        std::fs::create_dir(&run).unwrap();
        std::fs::write(run.join("measured_data.csv"), "old").unwrap();

        let layout = SessionLayout::in_dir(&run, &cfg.save_file_name);
        let result = Session::create_in(cfg, layout, Box::new(SimulatedSource::new()));
        assert!(matches!(result, Err(SessionError::AlreadyExists(p)) if p == run));
        assert_eq!(std::fs::read_to_string(run.join("measured_data.csv")).unwrap(), "old");
        assert!(!run.join("setting.txt").exists());
    }

    #[test]
    fn test_start_twice_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::create(config(dir.path()), Box::new(SimulatedSource::new())).unwrap();
        session.start().unwrap();
        assert!(matches!(
            session.start(),
            Err(SessionError::InvalidState {
                action: "start",
                state: SessionState::Running
            })
        ));
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_stop_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::create(config(dir.path()), Box::new(SimulatedSource::new())).unwrap();
        let summary = session.stop().unwrap();
        assert_eq!(summary.rows_exported, 0);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.start().is_err());
    }

    #[test]
    fn test_open_failure_fails_start() {
        struct Unplugged;
        impl SampleSource for Unplugged {
            fn open(&mut self, _: &str, _: &crate::ChannelSet, _: u32) -> Result<(), SourceError> {
                Err(SourceError::Device("device not found".into()))
            }
            fn read(&mut self, _: usize, _: Duration) -> Result<crate::SampleBlock, SourceError> {
                Err(SourceError::NotOpen)
            }
            fn close(&mut self) -> Result<(), SourceError> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::create(config(dir.path()), Box::new(Unplugged)).unwrap();
        assert!(matches!(session.start(), Err(SessionError::Source(_))));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_source_timeout_fails_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::create(config(dir.path()), Box::new(ScriptedSource::from_blocks(Vec::new()))).unwrap();
        session.start().unwrap();

        let failure = session.wait_for_failure(Duration::from_secs(2)).unwrap();
        assert_eq!(failure.component, Component::Acquisition);
        assert!(matches!(
            session.stop(),
            Err(SessionError::SourceTimeout {
                requested: 10,
                received: 0
            })
        ));
        assert_eq!(session.state(), SessionState::Failed);
        // Terminal: further stops return the counters
        assert!(session.stop().is_ok());
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42)), "unknown panic");
    }
}
