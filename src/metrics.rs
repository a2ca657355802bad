//! Prometheus-compatible metrics endpoint
//!
//! Exposes sync layer metrics in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::colony::work_order::LoadSummary;
use crate::sync::coordinator::{PassOutcome, PassReport};
use crate::sync::dirty::SyncChannel;

const HISTORY_LEN: usize = 1000;

/// Metrics registry for the sync layer
#[derive(Debug)]
pub struct SyncMetrics {
    // Pass counters
    pub passes_run: AtomicU64,
    pub passes_skipped: AtomicU64,

    // Subscribers
    pub subscribers: AtomicU64,
    pub new_subscriber_passes: AtomicU64,

    // Messages per channel, indexed by SyncChannel::index
    messages_sent: [AtomicU64; 6],
    pub dispatch_failures: AtomicU64,

    // Load results
    pub work_orders_loaded: AtomicU64,
    pub work_orders_unknown: AtomicU64,
    pub work_orders_corrupt: AtomicU64,
    pub work_orders_duplicate: AtomicU64,

    // Pass timing (microseconds)
    pub pass_time_us: AtomicU64,
    pub pass_time_p95_us: AtomicU64,
    pub pass_time_p99_us: AtomicU64,
    pub pass_time_max_us: AtomicU64,

    start_time: Instant,

    // Rolling pass times for percentile calculation
    pass_history: RwLock<VecDeque<u64>>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            passes_run: AtomicU64::new(0),
            passes_skipped: AtomicU64::new(0),
            subscribers: AtomicU64::new(0),
            new_subscriber_passes: AtomicU64::new(0),
            messages_sent: Default::default(),
            dispatch_failures: AtomicU64::new(0),
            work_orders_loaded: AtomicU64::new(0),
            work_orders_unknown: AtomicU64::new(0),
            work_orders_corrupt: AtomicU64::new(0),
            work_orders_duplicate: AtomicU64::new(0),
            pass_time_us: AtomicU64::new(0),
            pass_time_p95_us: AtomicU64::new(0),
            pass_time_p99_us: AtomicU64::new(0),
            pass_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
            pass_history: RwLock::new(VecDeque::with_capacity(HISTORY_LEN)),
        }
    }

    /// Record the outcome of one sync pass and how long it took
    pub fn record_pass(&self, outcome: &PassOutcome, duration: Duration) {
        match outcome {
            PassOutcome::Skipped => {
                self.passes_skipped.fetch_add(1, Ordering::Relaxed);
            }
            PassOutcome::Completed(report) => {
                self.passes_run.fetch_add(1, Ordering::Relaxed);
                self.record_report(report);
                self.record_pass_time(duration);
            }
        }
    }

    fn record_report(&self, report: &PassReport) {
        self.subscribers.store(report.subscribers as u64, Ordering::Relaxed);
        if report.has_new_subscribers {
            self.new_subscriber_passes.fetch_add(1, Ordering::Relaxed);
        }
        for channel in SyncChannel::ALL {
            self.messages_sent[channel.index()].fetch_add(report.sent_on(channel) as u64, Ordering::Relaxed);
        }
        self.dispatch_failures
            .fetch_add(report.failed.len() as u64, Ordering::Relaxed);
    }

    fn record_pass_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.pass_time_us.store(us, Ordering::Relaxed);

        let mut history = self.pass_history.write();
        history.push_back(us);
        while history.len() > HISTORY_LEN {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.pass_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.pass_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.pass_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Record a colony load
    pub fn record_load(&self, summary: &LoadSummary) {
        self.work_orders_loaded.fetch_add(summary.loaded as u64, Ordering::Relaxed);
        self.work_orders_unknown.fetch_add(summary.unknown as u64, Ordering::Relaxed);
        self.work_orders_corrupt.fetch_add(summary.corrupt as u64, Ordering::Relaxed);
        self.work_orders_duplicate.fetch_add(summary.duplicate as u64, Ordering::Relaxed);
    }

    pub fn messages_sent(&self, channel: SyncChannel) -> u64 {
        self.messages_sent[channel.index()].load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("colony_sync_passes_total", "Sync passes completed", "counter",
            self.passes_run.load(Ordering::Relaxed));
        metric!("colony_sync_passes_skipped_total", "Sync passes skipped while the world was unavailable", "counter",
            self.passes_skipped.load(Ordering::Relaxed));
        metric!("colony_sync_subscribers", "Current subscriber count", "gauge",
            self.subscribers.load(Ordering::Relaxed));
        metric!("colony_sync_new_subscriber_passes_total", "Passes that saw at least one new subscriber", "counter",
            self.new_subscriber_passes.load(Ordering::Relaxed));
        metric!("colony_sync_dispatch_failures_total", "Subsystem dispatches that failed", "counter",
            self.dispatch_failures.load(Ordering::Relaxed));

        output.push_str("# HELP colony_sync_messages_sent_total Messages sent per channel\n");
        output.push_str("# TYPE colony_sync_messages_sent_total counter\n");
        for channel in SyncChannel::ALL {
            output.push_str(&format!(
                "colony_sync_messages_sent_total{{channel=\"{}\"}} {}\n",
                channel.name(),
                self.messages_sent(channel)
            ));
        }

        metric!("colony_sync_work_orders_loaded_total", "Work orders restored from saves", "counter",
            self.work_orders_loaded.load(Ordering::Relaxed));
        metric!("colony_sync_work_orders_unknown_total", "Work orders dropped for an unknown type", "counter",
            self.work_orders_unknown.load(Ordering::Relaxed));
        metric!("colony_sync_work_orders_corrupt_total", "Work orders dropped as corrupt", "counter",
            self.work_orders_corrupt.load(Ordering::Relaxed));
        metric!("colony_sync_work_orders_duplicate_total", "Work orders dropped for a repeated id", "counter",
            self.work_orders_duplicate.load(Ordering::Relaxed));

        metric!("colony_sync_pass_time_microseconds", "Last pass time in microseconds", "gauge",
            self.pass_time_us.load(Ordering::Relaxed));
        metric!("colony_sync_pass_time_p95_microseconds", "95th percentile pass time", "gauge",
            self.pass_time_p95_us.load(Ordering::Relaxed));
        metric!("colony_sync_pass_time_p99_microseconds", "99th percentile pass time", "gauge",
            self.pass_time_p99_us.load(Ordering::Relaxed));
        metric!("colony_sync_pass_time_max_microseconds", "Maximum pass time", "gauge",
            self.pass_time_max_us.load(Ordering::Relaxed));
        metric!("colony_sync_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// JSON metrics for direct API access
    pub fn to_json(&self) -> String {
        let messages: serde_json::Map<String, serde_json::Value> = SyncChannel::ALL
            .iter()
            .map(|channel| (channel.name().to_string(), json!(self.messages_sent(*channel))))
            .collect();

        json!({
            "passes": {
                "run": self.passes_run.load(Ordering::Relaxed),
                "skipped": self.passes_skipped.load(Ordering::Relaxed),
                "dispatch_failures": self.dispatch_failures.load(Ordering::Relaxed),
            },
            "subscribers": {
                "current": self.subscribers.load(Ordering::Relaxed),
                "new_subscriber_passes": self.new_subscriber_passes.load(Ordering::Relaxed),
            },
            "messages_sent": messages,
            "work_orders": {
                "loaded": self.work_orders_loaded.load(Ordering::Relaxed),
                "unknown": self.work_orders_unknown.load(Ordering::Relaxed),
                "corrupt": self.work_orders_corrupt.load(Ordering::Relaxed),
                "duplicate": self.work_orders_duplicate.load(Ordering::Relaxed),
            },
            "performance": {
                "pass_time_us": self.pass_time_us.load(Ordering::Relaxed),
                "pass_time_p95_us": self.pass_time_p95_us.load(Ordering::Relaxed),
                "pass_time_p99_us": self.pass_time_p99_us.load(Ordering::Relaxed),
                "pass_time_max_us": self.pass_time_max_us.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Answer one HTTP request on `socket`
pub async fn respond<S>(metrics: &SyncMetrics, socket: &mut S) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = [0u8; 1024];
    let n = socket.read(&mut buffer).await?;
    if n == 0 {
        return Ok(());
    }
    let request = String::from_utf8_lossy(&buffer[..n]);

    // Longest prefix first: "/metrics" would also match "/metrics/json"
    let response = if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
        http_response("application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        http_response("text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") || request.starts_with("GET / ") {
        http_response("text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    };

    socket.write_all(response.as_bytes()).await
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<SyncMetrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            if let Err(e) = respond(&metrics, &mut socket).await {
                debug!("Metrics request from {} failed: {}", peer, e);
            }
        });
    }
}
