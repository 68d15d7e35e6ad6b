//! Acquisition scheduler: bounded worker pool with per-granule retry
//!
//! Each worker holds at most one archive session and pulls granules from a
//! shared queue. Session-level failures (connect, login) abort the whole run;
//! per-granule failures are retried with exponential backoff and recorded in
//! the report so the caller always gets one outcome per requested granule.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::cache::{CacheManager, CacheStatus};
use crate::app::models::{FetchOutcome, FetchReport, GranuleRef};
use crate::app::transfer::{Connector, Transport};
use crate::constants::workers;
use crate::errors::{ConfigError, TransferError};

use super::config::SchedulerConfig;
use super::retry::RetryPolicy;

/// Cooperative cancellation signal shared between the scheduler and callers
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress notification emitted as each granule reaches a terminal outcome
#[derive(Debug, Clone)]
pub struct FetchEvent {
    pub granule: GranuleRef,
    pub outcome: FetchOutcome,
}

/// Result of one scheduler run
#[derive(Debug)]
pub struct RunOutcome {
    /// One outcome per requested granule
    pub report: FetchReport,
    /// Session-level error that aborted the run, if any
    pub fatal_error: Option<String>,
}

impl RunOutcome {
    pub fn aborted(&self) -> bool {
        self.fatal_error.is_some()
    }
}

/// Bounded-concurrency granule acquisition
pub struct Scheduler {
    config: SchedulerConfig,
    cache: Arc<CacheManager>,
    connector: Arc<dyn Connector>,
    cancel: CancelFlag,
}

impl Scheduler {
    /// Create a scheduler after validating its configuration
    pub fn new(
        config: SchedulerConfig,
        cache: Arc<CacheManager>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            cache,
            connector,
            cancel: CancelFlag::new(),
        })
    }

    /// Handle callers can use to request cancellation mid-run
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Acquire every requested granule, returning a complete report
    pub async fn run(&self, granules: Vec<GranuleRef>) -> RunOutcome {
        self.run_with_events(granules, None).await
    }

    /// Like [`run`](Self::run), forwarding per-granule events for progress display
    pub async fn run_with_events(
        &self,
        granules: Vec<GranuleRef>,
        events: Option<mpsc::Sender<FetchEvent>>,
    ) -> RunOutcome {
        let total = granules.len();
        if total == 0 {
            return RunOutcome {
                report: FetchReport::new(),
                fatal_error: None,
            };
        }

        let worker_count = self.config.worker_count.min(total);
        info!("Starting {} workers for {} granules", worker_count, total);

        let queue: Arc<Mutex<VecDeque<GranuleRef>>> =
            Arc::new(Mutex::new(granules.iter().cloned().collect()));
        let fatal: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let (result_tx, mut result_rx) =
            mpsc::channel::<(GranuleRef, FetchOutcome)>(workers::CHANNEL_BUFFER_SIZE);

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                config: self.config.clone(),
                retry: RetryPolicy::from_config(&self.config),
                cache: self.cache.clone(),
                connector: self.connector.clone(),
                queue: queue.clone(),
                cancel: self.cancel.clone(),
                fatal: fatal.clone(),
                results: result_tx.clone(),
                transport: None,
                listings: HashMap::new(),
            };
            handles.push(tokio::spawn(worker.run()));
        }
        drop(result_tx);

        let mut report = FetchReport::new();
        while let Some((granule, outcome)) = result_rx.recv().await {
            if let Some(events) = &events {
                let _ = events
                    .send(FetchEvent {
                        granule: granule.clone(),
                        outcome: outcome.clone(),
                    })
                    .await;
            }
            report.record(granule, outcome);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Worker task panicked: {}", e);
            }
        }

        // Complete accounting: anything a worker never reported is unattempted
        for granule in granules {
            if report.outcome(&granule).is_none() {
                report.record(granule, FetchOutcome::NotAttempted);
            }
        }

        let fatal_error = fatal.lock().unwrap().take();
        if let Some(reason) = &fatal_error {
            warn!("Run aborted: {}", reason);
        }
        info!("Run finished: {}", report.summary());

        RunOutcome {
            report,
            fatal_error,
        }
    }
}

/// Classified failure of a single acquisition step
enum AttemptError {
    /// Session-level problem; abort the whole run
    Fatal(String),
    /// This granule can never succeed; do not retry
    Permanent(String),
    /// Transient; worth another attempt after backoff
    Retryable(String),
}

fn classify(error: TransferError) -> AttemptError {
    if error.is_fatal() {
        AttemptError::Fatal(error.to_string())
    } else if error.is_permanent() {
        AttemptError::Permanent(error.to_string())
    } else {
        AttemptError::Retryable(error.to_string())
    }
}

struct Worker {
    id: usize,
    config: SchedulerConfig,
    retry: RetryPolicy,
    cache: Arc<CacheManager>,
    connector: Arc<dyn Connector>,
    queue: Arc<Mutex<VecDeque<GranuleRef>>>,
    cancel: CancelFlag,
    fatal: Arc<Mutex<Option<String>>>,
    results: mpsc::Sender<(GranuleRef, FetchOutcome)>,
    /// Live archive session, opened on first need
    transport: Option<Box<dyn Transport>>,
    /// Directory listings already fetched this session: dir -> (name -> size)
    listings: HashMap<String, HashMap<String, u64>>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let granule = self.queue.lock().unwrap().pop_front();
            let Some(granule) = granule else { break };

            if self.cancel.is_set() {
                self.send(granule, FetchOutcome::NotAttempted).await;
                continue;
            }

            match self.process(&granule).await {
                Ok(outcome) => {
                    debug!("Worker {}: {} -> {}", self.id, granule, outcome);
                    self.send(granule, outcome).await;
                }
                Err(reason) => {
                    // First fatal error wins; everyone else drains the queue
                    self.fatal.lock().unwrap().get_or_insert(reason);
                    self.cancel.set();
                    self.send(granule, FetchOutcome::NotAttempted).await;
                }
            }
        }

        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
    }

    async fn send(&self, granule: GranuleRef, outcome: FetchOutcome) {
        let _ = self.results.send((granule, outcome)).await;
    }

    /// Drive one granule to a terminal outcome, or a fatal run error
    async fn process(&mut self, granule: &GranuleRef) -> Result<FetchOutcome, String> {
        match self.cache.check(granule, None).await {
            Ok(CacheStatus::Hit) => return Ok(FetchOutcome::CachedHit),
            Ok(CacheStatus::Stale) => {
                if let Err(e) = self.cache.evict(granule).await {
                    return Ok(FetchOutcome::FailedPermanently {
                        reason: e.to_string(),
                    });
                }
            }
            Ok(CacheStatus::Miss) => {}
            Err(e) => {
                return Ok(FetchOutcome::FailedPermanently {
                    reason: e.to_string(),
                })
            }
        }

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            if self.cancel.is_set() {
                return Ok(FetchOutcome::NotAttempted);
            }

            match self.attempt(granule).await {
                Ok(bytes) => return Ok(FetchOutcome::Fetched { bytes }),
                Err(AttemptError::Fatal(reason)) => return Err(reason),
                Err(AttemptError::Permanent(reason)) => {
                    return Ok(FetchOutcome::FailedPermanently { reason })
                }
                Err(AttemptError::Retryable(reason)) => {
                    warn!(
                        "Worker {}: attempt {}/{} for {} failed: {}",
                        self.id, attempt, self.config.max_attempts, granule, reason
                    );
                    last_error = reason;
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    }
                }
            }
        }

        Ok(FetchOutcome::FailedRetriesExhausted {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    /// One download attempt: list for the expected size, transfer, promote
    async fn attempt(&mut self, granule: &GranuleRef) -> Result<u64, AttemptError> {
        let expected = self.expected_size(granule).await?;

        let temp_path = self
            .cache
            .begin_download(granule)
            .await
            .map_err(|e| AttemptError::Permanent(e.to_string()))?;

        let download = {
            let transport = self.transport().await?;
            transport.download(granule.remote_path(), &temp_path).await
        };

        match download {
            Ok(_received) => match self.cache.promote(granule, &temp_path, expected).await {
                Ok(()) => Ok(expected),
                Err(e @ crate::errors::CacheError::SizeMismatch { .. }) => {
                    Err(AttemptError::Retryable(e.to_string()))
                }
                Err(e) => {
                    self.cache.discard(&temp_path).await;
                    Err(AttemptError::Permanent(e.to_string()))
                }
            },
            Err(e) => {
                self.cache.discard(&temp_path).await;
                // A broken stream leaves the session in an undefined state
                if !e.is_permanent() {
                    self.reset_session().await;
                }
                Err(classify(e))
            }
        }
    }

    /// Remote-reported size for the granule, from a per-session listing cache
    async fn expected_size(&mut self, granule: &GranuleRef) -> Result<u64, AttemptError> {
        let dir = granule.remote_dir();
        if !self.listings.contains_key(&dir) {
            let listed = {
                let transport = self.transport().await?;
                transport.list(&dir).await
            };
            match listed {
                Ok(entries) => {
                    self.listings.insert(
                        dir.clone(),
                        entries.into_iter().map(|e| (e.name, e.size)).collect(),
                    );
                }
                Err(e) => {
                    if !e.is_permanent() {
                        self.reset_session().await;
                    }
                    return Err(classify(e));
                }
            }
        }

        self.listings[&dir]
            .get(granule.file_name())
            .copied()
            .ok_or_else(|| {
                AttemptError::Permanent(format!(
                    "{} not present in archive listing",
                    granule.file_name()
                ))
            })
    }

    /// Current session, connecting on first use
    async fn transport(&mut self) -> Result<&mut Box<dyn Transport>, AttemptError> {
        if self.transport.is_none() {
            match self.connector.connect().await {
                Ok(transport) => {
                    debug!("Worker {}: session established", self.id);
                    self.transport = Some(transport);
                }
                Err(e) => return Err(classify(e)),
            }
        }
        Ok(self.transport.as_mut().expect("transport just set"))
    }

    /// Drop the session so the next attempt reconnects; listings die with it
    async fn reset_session(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            let _ = transport.close().await;
        }
        self.listings.clear();
    }
}
