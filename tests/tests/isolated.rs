mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;

    use reqwest::Client;
    use std::sync::OnceLock;
    use std::time::Duration;
    use surge::prelude::*;

    static CLIENT: OnceLock<Client> = OnceLock::new();

    async fn get(path: &str) -> IterationResult {
        let client = CLIENT.get_or_init(Client::new);
        let res = client
            .get(format!("{}{path}", target_base_url()))
            .send()
            .await
            .map_err(|e| TargetError::Transport(e.to_string()))?;
        if res.status().is_success() {
            Ok(TargetResponse::new(res.status().as_u16()))
        } else {
            Err(TargetError::Status(res.status().as_u16()))
        }
    }

    async fn post(path: &str) -> IterationResult {
        let client = CLIENT.get_or_init(Client::new);
        let res = client
            .post(format!("{}{path}", target_base_url()))
            .send()
            .await
            .map_err(|e| TargetError::Transport(e.to_string()))?;
        if res.status().is_success() {
            Ok(TargetResponse::new(res.status().as_u16()))
        } else {
            Err(TargetError::Status(res.status().as_u16()))
        }
    }

    #[tokio::test]
    #[ntest::timeout(60_000)]
    async fn smoke_ramp_serves_every_arrival() {
        init().await;

        // Gentle ramp: 5 -> 50, hold, cool down to 0.
        let report = LoadTest::new("smoke", |_ctx| get("/"))
            .start_rate(5.)
            .stage(50., Duration::from_secs(3))
            .stage(50., Duration::from_secs(3))
            .stage(0., Duration::from_secs(1))
            .preallocated_vus(20)
            .max_vus(200)
            .iteration_timeout(Duration::from_secs(10))
            .threshold("dropped_iterations.count <= 0")
            .threshold("http_req_failed.rate < 0.05")
            .await
            .unwrap();

        let snapshot = &report.snapshot;
        // (5+50)/2*3 + 50*3 + 25 arrivals.
        assert_eq!(snapshot.dropped, 0);
        assert!(snapshot.success >= 255 && snapshot.success <= 260);
        assert!(report.passed(), "{report}");
    }

    #[tokio::test]
    #[ntest::timeout(60_000)]
    async fn saturation_drops_instead_of_throttling() {
        init().await;

        let report = LoadTest::new("saturation", |_ctx| get("/delay/ms/50"))
            .start_rate(100.)
            .stage(100., Duration::from_secs(3))
            .preallocated_vus(2)
            .max_vus(4)
            .await
            .unwrap();

        let snapshot = &report.snapshot;
        // 4 workers x ~20/s each cannot carry 100/s: ticks must drop, but
        // the offered count still matches the schedule.
        assert_eq!(snapshot.total(), 300);
        assert!(snapshot.dropped > 0, "{snapshot}");
        assert!(snapshot.success > 0);
    }

    #[tokio::test]
    #[ntest::timeout(60_000)]
    async fn slow_target_times_out_and_fails_thresholds() {
        init().await;

        let report = LoadTest::new("timeouts", |_ctx| get("/delay/ms/50"))
            .start_rate(40.)
            .stage(40., Duration::from_secs(3))
            .preallocated_vus(30)
            .max_vus(60)
            .iteration_timeout(Duration::from_millis(10))
            .threshold("http_req_failed.rate < 0.05")
            .await
            .unwrap();

        let snapshot = &report.snapshot;
        assert!(snapshot.timeouts > 0);
        assert_eq!(snapshot.success, 0);
        assert_eq!(report.thresholds[0].verdict, Verdict::Fail);
        assert!(!report.passed());
    }

    #[tokio::test]
    #[ntest::timeout(60_000)]
    async fn flaky_target_breaches_the_error_rate() {
        init().await;

        // 20% of requests fail server-side.
        let report = LoadTest::new("flaky", |_ctx| get("/flaky/ratio/200/delay/ms/1"))
            .start_rate(50.)
            .stage(50., Duration::from_secs(3))
            .preallocated_vus(20)
            .max_vus(100)
            .threshold("http_req_failed.rate < 0.05")
            .threshold("http_req_duration.p95 < 300ms")
            .await
            .unwrap();

        let snapshot = &report.snapshot;
        assert!(snapshot.target_errors > 0);
        let error_rate = report.thresholds[0].observed;
        assert!(error_rate > 0.1 && error_rate < 0.35, "rate: {error_rate}");
        assert_eq!(report.thresholds[0].verdict, Verdict::Fail);
        // Latency stays fine even though the error budget is blown.
        assert_eq!(report.thresholds[1].verdict, Verdict::Pass);
    }

    #[tokio::test]
    #[ntest::timeout(60_000)]
    async fn abort_threshold_stops_a_long_schedule_early() {
        init().await;

        let started = std::time::Instant::now();
        let report = LoadTest::new("abort", |_ctx| get("/flaky/ratio/900/delay/ms/1"))
            .start_rate(50.)
            .stage(50., Duration::from_secs(60))
            .preallocated_vus(20)
            .max_vus(100)
            .threshold_with_abort("http_req_failed.rate < 0.5")
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(20));
        assert!(report.aborted);
        assert!(!report.passed());
    }

    #[tokio::test]
    #[ntest::timeout(60_000)]
    async fn work_endpoint_reports_its_own_stats() {
        init().await;

        let probe = get("/healthz").await;
        assert!(probe.is_ok());

        let report = LoadTest::new("work", |_ctx| post("/work?cpu_ms=5&mem_mb=1"))
            .start_rate(20.)
            .stage(20., Duration::from_secs(2))
            .preallocated_vus(10)
            .max_vus(50)
            .await
            .unwrap();

        assert!(report.snapshot.success > 0);

        // The target's own counter is independent of the generator's sink
        // and must have seen at least our successful requests.
        let stats: serde_json::Value = CLIENT
            .get_or_init(Client::new)
            .get(format!("{}/stats", target_base_url()))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let total = stats["total_requests"].as_u64().unwrap();
        assert!(total >= report.snapshot.success);
    }
}
