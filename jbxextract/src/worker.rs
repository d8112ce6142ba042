//! Extraction worker pool.
//!
//! Bridges the blocking extractor into the async engine: a fixed set of OS
//! worker threads consume a job queue, and callers await a oneshot reply.
//! The pool size is the hard bound on concurrent extractions process-wide;
//! extra submissions queue until a worker frees up.
//!
//! Credential text is written to a fresh temporary file per call and the
//! file is removed when the call ends, success or failure. A deletion
//! failure is logged and swallowed; it never masks the extraction result.

use crate::error::{ExtractError, Result};
use crate::extractor::Extractor;
use crate::model::ExtractionOutput;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Default number of worker threads
pub const DEFAULT_WORKERS: usize = 2;

/// Default bounded wait for one extraction call.
///
/// The extractor has no timeout of its own; this bound releases the caller
/// when a call hangs. The worker thread stays occupied until the extractor
/// actually returns.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(90);

struct ExtractionJob {
    query: String,
    credentials: Option<String>,
    reply: oneshot::Sender<Result<ExtractionOutput>>,
}

/// Fixed-size pool of extraction worker threads.
///
/// Dropping the pool closes the job queue; workers finish their current
/// call and exit.
pub struct ExtractionPool {
    jobs: Sender<ExtractionJob>,
    workers: usize,
    call_timeout: Duration,
}

impl ExtractionPool {
    /// Spawns `workers` threads (at least one) running `extractor`.
    pub fn new(extractor: Arc<dyn Extractor>, workers: usize) -> Self {
        let workers = workers.max(1);
        let (jobs, queue) = unbounded::<ExtractionJob>();

        for index in 0..workers {
            let queue = queue.clone();
            let extractor = extractor.clone();
            std::thread::Builder::new()
                .name(format!("jbx-extract-{index}"))
                .spawn(move || worker_loop(index, queue, extractor))
                .expect("Failed to spawn extraction worker thread");
        }

        Self {
            jobs,
            workers,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Overrides the per-call bounded wait
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// The concurrency bound this pool was built with
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Submits one extraction and awaits its result.
    ///
    /// `credentials` is the raw cookie text to expose to the extractor via a
    /// single-use temporary file.
    pub async fn submit(
        &self,
        query: impl Into<String>,
        credentials: Option<String>,
    ) -> Result<ExtractionOutput> {
        let (reply, response) = oneshot::channel();
        self.jobs
            .send(ExtractionJob {
                query: query.into(),
                credentials,
                reply,
            })
            .map_err(|_| ExtractError::WorkerGone)?;

        match tokio::time::timeout(self.call_timeout, response).await {
            Err(_) => Err(ExtractError::Timeout),
            Ok(Err(_)) => Err(ExtractError::WorkerGone),
            Ok(Ok(result)) => result,
        }
    }
}

fn worker_loop(index: usize, queue: Receiver<ExtractionJob>, extractor: Arc<dyn Extractor>) {
    debug!(worker = index, "Extraction worker started");
    while let Ok(job) = queue.recv() {
        let result = run_job(extractor.as_ref(), &job.query, job.credentials.as_deref());
        if job.reply.send(result).is_err() {
            debug!(worker = index, "Caller gave up before extraction finished");
        }
    }
    debug!(worker = index, "Extraction worker stopped");
}

fn run_job(
    extractor: &dyn Extractor,
    query: &str,
    credentials: Option<&str>,
) -> Result<ExtractionOutput> {
    let credential_file = match credentials {
        Some(text) => Some(write_credential_file(text)?),
        None => None,
    };

    let result = extractor.extract(query, credential_file.as_ref().map(|f| f.path()));

    if let Some(file) = credential_file {
        let path = file.path().to_path_buf();
        if let Err(error) = file.close() {
            warn!(path = %path.display(), error = %error, "Failed to remove credential file");
        }
    }

    result
}

fn write_credential_file(text: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("jbx_cookies_")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}
