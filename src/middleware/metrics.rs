use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use http::{Method, StatusCode};
use tracing::info;

use super::Middleware;
use crate::context::RequestCtx;
use crate::router::{RouteError, Router};

/// Path the metrics route is registered on unless changed
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

const BUCKET_COUNT: usize = 17;

/// Upper bounds (seconds) of the request duration histogram buckets
pub const DURATION_BUCKETS: [f64; BUCKET_COUNT] = [
    0.005, 0.01, 0.02, 0.04, 0.06, 0.08, 0.1, 0.15, 0.25, 0.4, 0.6, 0.8, 1.0, 1.5, 2.0, 3.0, 5.0,
];

/// `path` label of requests no route matched, used when path grouping is on
pub const UNMATCHED_PATH_LABEL: &str = "<unmatched>";

const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct SeriesKey {
    code: u16,
    path: String,
    method: String,
}

/// Cumulative histogram; `buckets[i]` counts observations `<= DURATION_BUCKETS[i]`
#[derive(Debug, Default)]
struct Histogram {
    buckets: [AtomicU64; BUCKET_COUNT],
    count: AtomicU64,
    sum_nanos: AtomicU64,
}

impl Histogram {
    fn observe(&self, latency: Duration) {
        let secs = latency.as_secs_f64();
        for (bound, bucket) in DURATION_BUCKETS.iter().zip(&self.buckets) {
            if secs <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// Middleware recording a Prometheus request duration histogram
///
/// Observes `<subsystem>_request_duration_seconds`, labelled with the
/// response `code`, the request `path` and the `method`. Requests for the
/// metrics path itself are not observed. With path grouping enabled the
/// `path` label is the matched route pattern (`/users/{id}`) instead of the
/// raw path, and every unmatched request (404, 405, redirect) shares
/// [`UNMATCHED_PATH_LABEL`], which keeps label cardinality bounded.
///
/// ```
/// use std::sync::Arc;
/// use routetree::middleware::{Instrumented, PrometheusMiddleware};
/// use routetree::Router;
///
/// # fn main() -> Result<(), routetree::RouteError> {
/// let mut router = Router::new();
/// let mut prom = PrometheusMiddleware::new("api");
/// prom.set_path_grouping(true);
/// let prom = Arc::new(prom);
/// prom.register(&mut router)?;
///
/// let app = Instrumented::new(router).with(prom);
/// # let _ = app;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PrometheusMiddleware {
    metric_name: String,
    metrics_path: String,
    group_paths: bool,
    series: DashMap<SeriesKey, Histogram>,
}

impl PrometheusMiddleware {
    /// Create the collector; an empty `subsystem` leaves the metric name
    /// unprefixed.
    #[must_use]
    pub fn new(subsystem: &str) -> Self {
        let metric_name = if subsystem.is_empty() {
            "request_duration_seconds".to_string()
        } else {
            format!("{subsystem}_request_duration_seconds")
        };
        Self {
            metric_name,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            group_paths: false,
            series: DashMap::new(),
        }
    }

    /// Change where [`register`](Self::register) mounts the metrics route
    pub fn set_metrics_path(&mut self, path: impl Into<String>) {
        self.metrics_path = path.into();
    }

    #[must_use]
    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }

    #[must_use]
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Label by matched route pattern instead of raw request path;
    /// unmatched requests are labelled [`UNMATCHED_PATH_LABEL`]
    pub fn set_path_grouping(&mut self, enabled: bool) {
        self.group_paths = enabled;
    }

    /// Register `GET <metrics_path>` on `router`, rendering the exposition
    /// text of this collector
    pub fn register(self: &Arc<Self>, router: &mut Router) -> Result<(), RouteError> {
        let metrics = Arc::clone(self);
        router.get(&self.metrics_path, move |ctx: &mut RequestCtx| {
            ctx.set_status(StatusCode::OK);
            ctx.set_content_type(EXPOSITION_CONTENT_TYPE);
            ctx.set_body(metrics.render());
        })?;
        info!(path = %self.metrics_path, metric = %self.metric_name, "Metrics route registered");
        Ok(())
    }

    /// Record one request
    pub fn observe(&self, code: StatusCode, path: &str, method: &Method, latency: Duration) {
        let key = SeriesKey {
            code: code.as_u16(),
            path: path.to_string(),
            method: method.as_str().to_string(),
        };
        self.series.entry(key).or_default().observe(latency);
    }

    /// Number of observations for one label combination
    #[must_use]
    pub fn observed_count(&self, code: StatusCode, path: &str, method: &Method) -> u64 {
        let key = SeriesKey {
            code: code.as_u16(),
            path: path.to_string(),
            method: method.as_str().to_string(),
        };
        self.series
            .get(&key)
            .map_or(0, |h| h.count.load(Ordering::Relaxed))
    }

    /// Number of distinct label combinations observed so far
    #[must_use]
    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Render all series in the Prometheus text exposition format, sorted
    /// by label values
    #[must_use]
    pub fn render(&self) -> String {
        let name = &self.metric_name;
        let mut keys: Vec<SeriesKey> = self.series.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        let mut output = String::with_capacity(256 + keys.len() * 1024);
        output.push_str(&format!("# HELP {name} request latencies\n"));
        output.push_str(&format!("# TYPE {name} histogram\n"));

        for key in keys {
            let Some(hist) = self.series.get(&key) else {
                continue;
            };
            let labels = format!(
                "code=\"{}\",path=\"{}\",method=\"{}\"",
                key.code,
                escape_label(&key.path),
                escape_label(&key.method)
            );
            for (bound, bucket) in DURATION_BUCKETS.iter().zip(&hist.buckets) {
                output.push_str(&format!(
                    "{name}_bucket{{{labels},le=\"{bound}\"}} {}\n",
                    bucket.load(Ordering::Relaxed)
                ));
            }
            let count = hist.count.load(Ordering::Relaxed);
            let sum = Duration::from_nanos(hist.sum_nanos.load(Ordering::Relaxed)).as_secs_f64();
            output.push_str(&format!("{name}_bucket{{{labels},le=\"+Inf\"}} {count}\n"));
            output.push_str(&format!("{name}_sum{{{labels}}} {sum}\n"));
            output.push_str(&format!("{name}_count{{{labels}}} {count}\n"));
        }
        output
    }
}

impl Middleware for PrometheusMiddleware {
    fn after(&self, ctx: &mut RequestCtx, latency: Duration) {
        if ctx.path() == self.metrics_path {
            return;
        }
        let path = if self.group_paths {
            ctx.matched_route().unwrap_or(UNMATCHED_PATH_LABEL)
        } else {
            ctx.path()
        };
        self.observe(ctx.status(), path, ctx.method(), latency);
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
