//! Concurrent dispatch and the attack engine facade

use crate::attack_modes::{AttackMode, AttackPlan};
use crate::error::{AttackError, AttackResult};
use crate::sequencer::Sequencer;
use crate::substitution::RequestBuilder;
use crate::traits::{format_duration, AttackSummary, ResultSink};
use crate::types::{ConcreteRequest, Job, RequestTemplate, ResultRecord};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Browser strings rotated through the `User-Agent` header
pub const USER_AGENTS: [&str; 7] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/142.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 17_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.5845.97 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 12; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.5845.97 Mobile Safari/537.36",
];

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub max_workers: usize,
    /// Per-attempt timeout
    pub timeout_ms: u64,
    /// Extra attempts after a transport failure
    pub retries: u32,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    pub proxy: Option<String>,
    pub verify_tls: bool,
    pub follow_redirects: bool,
    /// Hand each request's wire bytes to the raw sink before sending
    pub record_raw: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 12,
            timeout_ms: 60_000,
            retries: 1,
            jitter_min_ms: 20,
            jitter_max_ms: 120,
            proxy: None,
            verify_tls: false,
            follow_redirects: true,
            record_raw: true,
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> AttackResult<()> {
        if self.max_workers == 0 {
            return Err(AttackError::configuration(
                "dispatch",
                "max_workers must be at least 1",
            ));
        }
        if self.timeout_ms == 0 {
            return Err(AttackError::configuration(
                "dispatch",
                "timeout must be greater than zero",
            ));
        }
        if self.jitter_min_ms > self.jitter_max_ms {
            return Err(AttackError::configuration(
                "dispatch",
                "jitter_min_ms cannot exceed jitter_max_ms",
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Build the HTTP client one worker keeps for its lifetime
    pub fn build_client(&self) -> AttackResult<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout())
            .danger_accept_invalid_certs(!self.verify_tls)
            .redirect(if self.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            });

        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| AttackError::configuration("proxy", &e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| AttackError::configuration("http client", &e.to_string()))
    }
}

/// Runs jobs on a bounded pool of workers
pub struct Dispatcher {
    config: Arc<DispatchConfig>,
    raw_sink: Option<Arc<dyn ResultSink>>,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config: Arc::new(config),
            raw_sink: None,
        }
    }

    /// Sink receiving raw request captures
    pub fn with_raw_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.raw_sink = Some(sink);
        self
    }

    /// Start executing `jobs`. Records arrive on the returned channel in
    /// completion order; the channel closes once every worker has exited.
    pub fn dispatch(
        &self,
        jobs: Vec<Job>,
        builder: RequestBuilder,
        cancel: CancellationToken,
    ) -> AttackResult<mpsc::Receiver<ResultRecord>> {
        self.config.validate()?;

        let workers = self.config.max_workers.min(jobs.len()).max(1);
        let (job_tx, job_rx) = mpsc::channel::<Job>(workers * 2);
        let (result_tx, result_rx) = mpsc::channel(workers * 4);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut contexts = Vec::with_capacity(workers);
        for _ in 0..workers {
            contexts.push(WorkerContext {
                client: self.config.build_client()?,
                builder: builder.clone(),
                config: self.config.clone(),
                raw_sink: self.raw_sink.clone(),
            });
        }

        debug!("Dispatching {} jobs on {} workers", jobs.len(), workers);

        let feeder_cancel = cancel.clone();
        tokio::spawn(async move {
            for job in jobs {
                tokio::select! {
                    _ = feeder_cancel.cancelled() => break,
                    sent = job_tx.send(job) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        for (worker_id, context) in contexts.into_iter().enumerate() {
            tokio::spawn(worker_loop(
                worker_id,
                context,
                job_rx.clone(),
                result_tx.clone(),
                cancel.clone(),
            ));
        }

        Ok(result_rx)
    }
}

async fn worker_loop(
    worker_id: usize,
    context: WorkerContext,
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    results: mpsc::Sender<ResultRecord>,
    cancel: CancellationToken,
) {
    loop {
        let job = {
            let mut rx = jobs.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = job else { break };

        let index = job.index;
        let params = job.summary(context.builder.token_order());

        let record = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = AssertUnwindSafe(context.execute(job)).catch_unwind() => match outcome {
                Ok(record) => record,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Worker {} panicked on job {}: {}", worker_id, index, message);
                    ResultRecord::failed(index, params, format!("Worker exception: {}", message))
                }
            },
        };

        if results.send(record).await.is_err() {
            break;
        }
    }

    debug!("Worker {} exiting", worker_id);
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// State owned by one worker
struct WorkerContext {
    client: reqwest::Client,
    builder: RequestBuilder,
    config: Arc<DispatchConfig>,
    raw_sink: Option<Arc<dyn ResultSink>>,
}

impl WorkerContext {
    async fn execute(&self, job: Job) -> ResultRecord {
        let record = ResultRecord::new(job.index, job.summary(self.builder.token_order()));

        tokio::time::sleep(self.jitter()).await;

        let mut request = match self.builder.build(&job.values) {
            Ok(request) => request,
            Err(e) => {
                debug!("Job {} could not be built: {}", job.index, e);
                return record.with_error(e.to_string());
            }
        };
        request.headers.set_ignore_case("User-Agent", pick_user_agent());

        let mut record = record;
        record.request_text = request.request_text();
        record.raw_path = self.capture_raw(job.index, &request).await;

        let start = Instant::now();
        match self.send_with_retries(&request).await {
            Ok((status, bytes)) => {
                let body = decode_body(job.index, bytes);
                debug!("Job {} -> {} ({} chars)", job.index, status, body.chars().count());
                record.with_response(status, body, start.elapsed())
            }
            Err(e) => {
                debug!("Job {} failed: {}", job.index, e);
                record.elapsed = start.elapsed();
                record.with_error(e.to_string())
            }
        }
    }

    fn jitter(&self) -> Duration {
        let millis = rand::thread_rng().gen_range(self.config.jitter_min_ms..=self.config.jitter_max_ms);
        Duration::from_millis(millis)
    }

    async fn capture_raw(&self, index: usize, request: &ConcreteRequest) -> Option<std::path::PathBuf> {
        if !self.config.record_raw {
            return None;
        }
        let sink = self.raw_sink.as_ref()?;
        match sink.store_raw(index, &request.raw_bytes()).await {
            Ok(path) => path,
            Err(e) => {
                warn!("Failed to store raw request {}: {}", index, e);
                None
            }
        }
    }

    async fn send_with_retries(&self, request: &ConcreteRequest) -> AttackResult<(u16, Vec<u8>)> {
        let attempts = self.config.retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_recoverable() => {
                    debug!("Attempt {}/{} for {} failed: {}", attempt, attempts, request.url, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(AttackError::RetriesExhausted {
            last_error: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    async fn send_once(&self, request: &ConcreteRequest) -> AttackResult<(u16, Vec<u8>)> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            AttackError::InvalidRequest {
                reason: format!("Invalid method {}: {}", request.method, e),
            }
        })?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in request.headers.iter() {
            // Recomputed by the client from the body
            if name.eq_ignore_ascii_case("Content-Length") {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| self.classify(e))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok((status, bytes.to_vec()))
    }

    fn classify(&self, err: reqwest::Error) -> AttackError {
        if err.is_timeout() {
            AttackError::timeout("send", self.config.timeout_ms)
        } else {
            AttackError::from(err)
        }
    }
}

fn pick_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Strict UTF-8, falling back to replacement characters
fn decode_body(index: usize, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(body) => body,
        Err(e) => {
            warn!("Response {} is not valid UTF-8, decoding lossily", index);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct AttackReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// `None` when the run was a single request
    pub mode: Option<AttackMode>,
    pub cancelled: bool,
    /// One record per job, ascending by index
    pub records: Vec<ResultRecord>,
    pub summary: AttackSummary,
}

/// Plans, dispatches and sequences one attack at a time
pub struct AttackEngine {
    config: DispatchConfig,
    sinks: Vec<Arc<dyn ResultSink>>,
    raw_sink: Option<Arc<dyn ResultSink>>,
}

impl AttackEngine {
    /// Create a new attack engine
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            sinks: Vec::new(),
            raw_sink: None,
        }
    }

    /// Add a sink receiving ordered results
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Set the sink storing raw request captures
    pub fn with_raw_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.raw_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run an attack to completion or cancellation.
    ///
    /// Precondition failures are returned before any request is sent. Once
    /// dispatch starts, failures end up in the individual records.
    pub async fn run(
        &self,
        template: &RequestTemplate,
        value_lists: &HashMap<String, Vec<String>>,
        mode: AttackMode,
        cancel: CancellationToken,
    ) -> AttackResult<AttackReport> {
        self.config.validate()?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let token_order = template.token_ids();
        let plan = AttackPlan::build(&token_order, value_lists, mode)?;
        let total = plan.len();

        info!(
            "Starting attack {} with {} requests ({})",
            run_id,
            total,
            plan.mode_name()
        );

        let mut dispatcher = Dispatcher::new(self.config.clone());
        if let Some(sink) = &self.raw_sink {
            dispatcher = dispatcher.with_raw_sink(sink.clone());
        }

        let builder = RequestBuilder::new(template.clone(), plan.token_order.clone());
        let results = dispatcher.dispatch(plan.jobs, builder, cancel.clone())?;
        let records = Sequencer::new(total).run(results, self.sinks.clone()).await;

        let summary = AttackSummary::from_records(&records, start.elapsed());
        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!("Attack {} cancelled", run_id);
        }
        info!(
            "Attack {} completed: {}/{} succeeded in {}",
            run_id,
            summary.successful_requests,
            summary.total_requests,
            format_duration(summary.duration)
        );

        Ok(AttackReport {
            run_id,
            started_at,
            mode: plan.mode,
            cancelled,
            records,
            summary,
        })
    }
}
