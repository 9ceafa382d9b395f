use axum::{
    debug_handler,
    extract::{Path, Query},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use lazy_static::lazy_static;
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tracing::debug;

pub async fn run(addr: SocketAddr) {
    let app = Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/work", post(work))
        .route("/stats", get(stats))
        .route("/delay/ms/:delay_ms", get(delay))
        .route("/delay/jitter/ms/:mean_ms/std/:std_ms", get(delay_jitter))
        .route("/flaky/ratio/:permille/delay/ms/:delay_ms", get(flaky))
        .route("/limited/:max_tps/delay/ms/:delay_ms/server/:server_id", get(limited))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

#[debug_handler]
pub async fn root() -> &'static str {
    count_request();
    "ok"
}

/// Liveness probe; succeeds whenever the service accepts traffic.
#[debug_handler]
pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct WorkParams {
    #[serde(default)]
    pub cpu_ms: u64,
    #[serde(default)]
    pub mem_mb: usize,
}

#[derive(Debug, Serialize)]
pub struct WorkDone {
    message: &'static str,
    cpu_ms: u64,
    mem_mb: usize,
}

/// Simulated work: holds the request for `cpu_ms` and touches `mem_mb` of
/// freshly allocated memory.
#[debug_handler]
pub async fn work(Query(params): Query<WorkParams>) -> Json<WorkDone> {
    count_request();
    counter!("mock-server.work").increment(1);

    if params.cpu_ms > 0 {
        tokio::time::sleep(Duration::from_millis(params.cpu_ms)).await;
    }
    if params.mem_mb > 0 {
        allocate_once(params.mem_mb);
    }

    Json(WorkDone {
        message: "work done",
        cpu_ms: params.cpu_ms,
        mem_mb: params.mem_mb,
    })
}

fn allocate_once(mem_mb: usize) {
    let mut buf = vec![0u8; mem_mb * 1024 * 1024];
    // Touch each page so the allocation is backed by real memory.
    for i in (0..buf.len()).step_by(4096) {
        buf[i] = 1;
    }
    std::hint::black_box(&buf);
}

#[derive(Debug, Serialize)]
pub struct Stats {
    total_requests: u64,
}

/// The service's own view of the traffic it served, independent of whatever
/// the load generator measured.
#[debug_handler]
pub async fn stats() -> Json<Stats> {
    Json(Stats {
        total_requests: REQUEST_COUNT.load(Ordering::Relaxed),
    })
}

#[debug_handler]
pub async fn delay(Path(delay_ms): Path<u64>) {
    count_request();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
}

/// Like `delay`, but with right-skewed jitter around the mean so latency
/// percentiles have an actual tail to measure.
#[debug_handler]
pub async fn delay_jitter(Path((mean_ms, std_ms)): Path<(u64, u64)>) {
    count_request();
    let normal = rand_distr::SkewNormal::new(mean_ms as f64, std_ms.max(1) as f64, 20.).unwrap();
    let sampled: f64 = {
        let mut rng = rand::thread_rng();
        rand_distr::Distribution::sample(&normal, &mut rng).max(0.)
    };
    tokio::time::sleep(Duration::from_secs_f64(sampled / 1_000.)).await;
}

/// Fails `permille` out of every thousand requests after the given delay.
#[debug_handler]
pub async fn flaky(
    Path((permille, delay_ms)): Path<(u32, u64)>,
) -> Result<(), StatusCode> {
    count_request();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let roll = rand::thread_rng().gen_range(0..1_000);
    if roll < permille {
        debug!("MOCK SERVER ___ ERR");
        Err(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        Ok(())
    }
}

lazy_static! {
    static ref LIMITED_MAP: Arc<RwLock<HashMap<String, Arc<DefaultDirectRateLimiter>>>> =
        Arc::new(RwLock::new(HashMap::new()));
}

/// Errors once the per-server rate cap is exceeded; lets generator tests
/// drive a target that degrades under load.
#[debug_handler]
pub async fn limited(
    Path((max_tps, delay_ms, server_id)): Path<(u32, u64, String)>,
) -> Result<(), StatusCode> {
    count_request();
    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

    let read = LIMITED_MAP.read().unwrap().get(&server_id).cloned();
    let limiter = if let Some(limiter) = read {
        limiter
    } else {
        let limiter = Arc::new(rate_limiter(max_tps));
        LIMITED_MAP
            .write()
            .unwrap()
            .insert(server_id, limiter.clone());
        limiter
    };

    match limiter.check() {
        Ok(_) => Ok(()),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/** Utils **/

pub fn rate_limiter(tps: u32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(NonZeroU32::new(tps).unwrap()))
}

static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static TPS_MEASURE: AtomicU64 = AtomicU64::new(0);

fn count_request() {
    counter!("mock-server.tps").increment(1);
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
    TPS_MEASURE.fetch_add(1, Ordering::Relaxed);
}

/** TPS Printer **/

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let transactions = TPS_MEASURE.fetch_min(0, Ordering::Relaxed);
        println!("{transactions} TPS");
    }
}
