//! Session orchestration: fans generation out across every style and tracks each
//! style's outcome in a [`ResultStore`].
//!
//! Every reset to pending stamps the entry with a fresh ticket. A settlement is only
//! applied while the entry still carries the ticket its invocation was issued with, so
//! invocations outliving a new batch or a new source image are discarded.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::gemini::GenerationClient;
use crate::models::{InlineImage, PhotoStyle, ResultEntry};
use crate::store::ResultStore;

/// Message stored on an entry whose generation failed.
pub const FAILURE_MESSAGE: &str = "Failed";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("no source image selected")]
    NoSourceImage,
}

/// One issued generation, identified by the ticket stamped on its entry.
#[derive(Debug, Clone)]
pub struct Job {
    pub style: PhotoStyle,
    pub ticket: u64,
    pub source: InlineImage,
}

/// The jobs of one generate-all action.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: u64,
    pub jobs: Vec<Job>,
}

/// Point-in-time copy of everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: Uuid,
    pub source: Option<InlineImage>,
    pub store: ResultStore,
    pub is_generating: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

struct SessionState {
    source: Option<InlineImage>,
    store: ResultStore,
    batch: Option<u64>,
    next_ticket: u64,
    next_batch: u64,
    updated_at: DateTime<Utc>,
}

impl SessionState {
    fn issue_ticket(&mut self) -> u64 {
        self.next_ticket += 1;
        self.next_ticket
    }
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    client: Arc<dyn GenerationClient>,
    state: RwLock<SessionState>,
    changes: watch::Sender<u64>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        let (changes, _) = watch::channel(0);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            client,
            state: RwLock::new(SessionState {
                source: None,
                store: ResultStore::new(),
                batch: None,
                next_ticket: 0,
                next_batch: 0,
                updated_at: now,
            }),
            changes,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            id: self.id,
            source: state.source.clone(),
            store: state.store.clone(),
            is_generating: state.batch.is_some(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.state.read().batch.is_some()
    }

    /// Change notifications; the value is a revision counter bumped on every mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    /// Mark the session as removed and wake observers so they can stop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Replace the source image and reset every entry to idle.
    pub fn select_image(&self, image: InlineImage) {
        {
            let mut state = self.state.write();
            info!(session = %self.id, "🖼️ New source image selected: {}", image.preview());
            state.source = Some(image);
            state.store = ResultStore::new();
            state.batch = None;
            state.updated_at = Utc::now();
        }
        self.notify();
    }

    /// Reset every entry to pending and return the jobs to run, or `None` when a batch
    /// is already in flight.
    pub fn begin_batch(&self) -> Result<Option<Batch>, ControllerError> {
        let batch = {
            let mut state = self.state.write();
            let source = state.source.clone().ok_or(ControllerError::NoSourceImage)?;
            if state.batch.is_some() {
                debug!(session = %self.id, "generation already in flight, ignoring");
                return Ok(None);
            }
            state.next_batch += 1;
            let id = state.next_batch;
            let mut jobs = Vec::with_capacity(PhotoStyle::ALL.len());
            for style in PhotoStyle::ALL {
                let ticket = state.issue_ticket();
                state.store.update(ResultEntry::pending(style, ticket));
                jobs.push(Job { style, ticket, source: source.clone() });
            }
            state.batch = Some(id);
            state.updated_at = Utc::now();
            Batch { id, jobs }
        };
        info!(session = %self.id, batch = batch.id, "🚀 Starting generation of {} styles", batch.jobs.len());
        self.notify();
        Ok(Some(batch))
    }

    /// Run every job of `batch` concurrently; returns once all have settled.
    pub async fn run_batch(&self, batch: Batch) {
        let Batch { id, jobs } = batch;
        join_all(jobs.into_iter().map(|job| self.run_job(job))).await;
        {
            let mut state = self.state.write();
            if state.batch == Some(id) {
                state.batch = None;
                state.updated_at = Utc::now();
            }
        }
        info!(session = %self.id, batch = id, "✅ Batch settled");
        self.notify();
    }

    /// Generate every style. Returns false when a batch was already running.
    pub async fn start_all(&self) -> Result<bool, ControllerError> {
        match self.begin_batch()? {
            Some(batch) => {
                self.run_batch(batch).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reset one style to pending, or `None` when that style is already pending.
    pub fn begin_retry(&self, style: PhotoStyle) -> Result<Option<Job>, ControllerError> {
        let job = {
            let mut state = self.state.write();
            let source = state.source.clone().ok_or(ControllerError::NoSourceImage)?;
            if state.store.get(style).is_pending {
                debug!(session = %self.id, %style, "retry ignored, style still pending");
                return Ok(None);
            }
            let ticket = state.issue_ticket();
            state.store.update(ResultEntry::pending(style, ticket));
            state.updated_at = Utc::now();
            Job { style, ticket, source }
        };
        info!(session = %self.id, %style, "🔄 Retrying");
        self.notify();
        Ok(Some(job))
    }

    /// Regenerate a single style. Returns false when it was already pending.
    pub async fn retry_one(&self, style: PhotoStyle) -> Result<bool, ControllerError> {
        match self.begin_retry(style)? {
            Some(job) => {
                self.run_job(job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Invoke the client once and record the outcome on the job's entry.
    ///
    /// A panicking client counts as a failure, so the entry and the batch always settle.
    pub async fn run_job(&self, job: Job) {
        let Job { style, ticket, source } = job;
        let outcome = AssertUnwindSafe(self.client.generate(&source, style)).catch_unwind().await;
        let entry = match outcome {
            Ok(Ok(image)) => ResultEntry::succeeded(style, image),
            Ok(Err(e)) => {
                warn!(session = %self.id, %style, "generation failed: {}", e);
                ResultEntry::failed(style, FAILURE_MESSAGE)
            }
            Err(_) => {
                error!(session = %self.id, %style, "generation panicked");
                ResultEntry::failed(style, FAILURE_MESSAGE)
            }
        };
        let applied = {
            let mut state = self.state.write();
            let applied = state.store.settle(ticket, entry);
            if applied {
                state.updated_at = Utc::now();
            }
            applied
        };
        if applied {
            self.notify();
        } else {
            debug!(session = %self.id, %style, ticket, "discarding stale settlement");
        }
    }
}
