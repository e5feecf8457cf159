use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::MonitoringConfig;


lazy_static! {
    pub static ref LISTENER_NOTIFY_DURATION_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "listener_notify_duration_ms",
            "Histogram of listener notification duration in ms"
        )
        .buckets(exponential_buckets(1.0, 2.0, 12).expect("valid buckets")),
        &["agent"]
    )
    .expect("metric can not be created");

    pub static ref LISTENER_NOTIFY_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("listener_notify_failures", "listener_notify_failures"),
        &["agent"]
    )
    .expect("Should succeed to create metric");

    pub static ref CONFIG_DIFF_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("config_diff_failures", "config_diff_failures"),
        &["content_type"]
    )
    .expect("Should succeed to create metric");

    pub static ref SERVER_CACHE_PUBLISH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("server_cache_publish_total", "server_cache_publish_total"),
        &["kind"]
    )
    .expect("Should succeed to create metric");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub(crate) fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(LISTENER_NOTIFY_DURATION_METRIC.clone()),
        Box::new(LISTENER_NOTIFY_FAILURES.clone()),
        Box::new(CONFIG_DIFF_FAILURES.clone()),
        Box::new(SERVER_CACHE_PUBLISH_TOTAL.clone()),
    ];
    for c in collectors {
        if let Err(e) = registry.register(c) {
            error!("collector can not be registered: {}", e);
        }
    }
}

/// Renders every metric of [`REGISTRY`] in the Prometheus text format
pub fn render() -> String {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

/// Spawns [`start_server`] when Prometheus is enabled in `config`
pub fn spawn_server(
    config: &MonitoringConfig,
    shutdown_signal: watch::Receiver<()>,
) -> Option<JoinHandle<()>> {
    if !config.prometheus_enabled {
        return None;
    }
    Some(tokio::spawn(start_server(config.prometheus_port, shutdown_signal)))
}

/// Serves `/metrics` until `shutdown_signal` fires
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let (addr, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    info!("metrics server listening on {}", addr);
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(render())
}
