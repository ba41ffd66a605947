use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all catalog server metrics
const PREFIX: &str = "cultivar_catalog";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Catalog Metrics
    pub static ref CULTIVAR_MUTATIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_cultivar_mutations_total"), "Committed cultivar mutations"),
        &["kind"]
    ).expect("Failed to create cultivar_mutations_total metric");

    pub static ref CATALOG_CULTIVARS_TOTAL: Gauge = Gauge::new(
        format!("{PREFIX}_cultivars_total"),
        "Number of cultivars in the catalog"
    ).expect("Failed to create cultivars_total metric");

    // Error Metrics
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_errors_total"), "Errors returned by the API"),
        &["error_type", "status"]
    ).expect("Failed to create errors_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(CULTIVAR_MUTATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_CULTIVARS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ERRORS_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn set_catalog_size(num_cultivars: usize) {
    CATALOG_CULTIVARS_TOTAL.set(num_cultivars as f64);
}

/// Record a committed mutation. Creations and seeds also grow the catalog
/// size gauge.
pub fn record_cultivar_mutation(kind: &str) {
    CULTIVAR_MUTATIONS_TOTAL.with_label_values(&[kind]).inc();
    if kind == "create" || kind == "seed" {
        CATALOG_CULTIVARS_TOTAL.inc();
    }
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let path = route_label(path);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, &path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, &path])
        .observe(duration.as_secs_f64());
}

/// Record an error response
pub fn record_error(error_type: &str, status: u16) {
    ERRORS_TOTAL
        .with_label_values(&[error_type, &status.to_string()])
        .inc();
}

const STATIC_SEGMENTS: &[&str] = &[
    "v1",
    "cultivars",
    "status",
    "reviews",
    "images",
    "info",
    "logs",
    "me",
    "geneticCertificate",
    "plantPicture",
    "cannabinoidInfo",
    "terpeneInfo",
];

/// Collapse ids in a request path so metric labels stay bounded.
pub fn route_label(path: &str) -> String {
    if path.starts_with("/media/") {
        return "/media/*".to_string();
    }
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if STATIC_SEGMENTS.contains(&segment) {
                segment
            } else {
                ":id"
            }
        })
        .collect();
    format!("/{}", segments.join("/"))
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
