//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置快照测试
//! - 模拟 e2e 测试（分发、工作池、日志器联动，无需真实网络）
//! - 时序基线（宽松上下界）

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{order_endpoints, CoreConfig, RequestLogStoreKind};

    #[test]
    fn test_default_config_is_valid() {
        let config = CoreConfig::default();
        ConfigLoader::validate(&config).unwrap();

        assert_eq!(config.dispatcher.timeout_ms, 10_000);
        assert_eq!(config.dispatcher.retry_base_interval_ms, 100);
        assert_eq!(config.worker_pool.workers, 10);
        assert_eq!(config.worker_pool.queue_capacity, 1000);
        assert_eq!(config.request_log.workers, 5);
        assert_eq!(config.request_log.queue_capacity, 10_000);
        assert_eq!(config.request_log.store, RequestLogStoreKind::Tracing);
    }

    #[test]
    fn test_config_to_endpoint_order() {
        let content = r#"
[[nodes]]
name = "eth-low"
chain = "ethereum"
url = "https://eth-low.example.org"
priority = 1

[[nodes]]
name = "eth-off"
chain = "ethereum"
url = "https://eth-off.example.org"
priority = 50
is_active = false

[[nodes]]
name = "eth-high"
chain = "ethereum"
url = "https://eth-high.example.org"
priority = 10
"#;
        let config = ConfigLoader::load_from_str(content, ConfigFormat::Toml).unwrap();
        assert_eq!(
            order_endpoints(&config.nodes),
            vec![
                "https://eth-high.example.org".to_string(),
                "https://eth-low.example.org".to_string(),
            ]
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use config_loader::ConfigLoader;
    use contracts::{
        CallContext, CallError, CallReply, CancellationToken, ContractError, EndpointCall,
        FnRemoteCall, LogStore, RequestLog,
    };
    use dispatcher::{DispatchError, Dispatcher};
    use ironnode_cli::simulation::{
        NodeProfile, SimulatedNodes, Simulation, SimulationConfig, SimulationMode,
    };
    use ironnode_cli::CoreServices;
    use observability::DispatchAggregator;
    use tokio::time::Instant;
    use worker_pool::{Task, WorkerPool, WorkerPoolConfig};
    use write_behind::{LoggerConfig, RequestLogStore, WriteBehindLogger};

    /// Node whose delay and outcome depend on the endpoint name: "hang*"
    /// never answers in time, "slow" takes 100ms, "bad*" fails
    async fn scripted(call: EndpointCall, ctx: CallContext) -> Result<CallReply, CallError> {
        let delay = if call.endpoint.starts_with("hang") {
            Duration::from_secs(30)
        } else if call.endpoint == "slow" {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(10)
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            reason = ctx.done() => return Err(reason),
        }
        if call.endpoint.starts_with("bad") {
            Err(CallError::transport(format!("{} refused", call.endpoint)))
        } else {
            Ok(CallReply::new(call.endpoint.clone(), delay))
        }
    }

    #[tokio::test]
    async fn test_failover_slow_success_beats_fast_failures() {
        let dispatcher = Dispatcher::new(FnRemoteCall::new(scripted), Duration::from_secs(2));

        let started = Instant::now();
        let result = dispatcher
            .request_with_failover(&["bad-1", "slow", "bad-2"], "eth_blockNumber", Bytes::new())
            .await
            .unwrap();

        assert_eq!(result.endpoint, "slow");
        assert_eq!(&result.payload[..], b"slow");
        assert!(started.elapsed() < Duration::from_secs(1));

        let metrics = dispatcher.metrics();
        assert_eq!(metrics.succeeded, 1);
    }

    #[tokio::test]
    async fn test_failover_timeout_lists_every_endpoint() {
        let dispatcher = Dispatcher::new(FnRemoteCall::new(scripted), Duration::from_millis(150));

        let started = Instant::now();
        let err = dispatcher
            .request_with_failover(&["bad-1", "hang"], "eth_blockNumber", Bytes::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::TimedOut { .. }));
        assert_eq!(err.failures().len(), 2);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    fn cancel_after(parent: &CancellationToken, delay: Duration) {
        let cancel = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            cancel.cancel();
        });
    }

    #[tokio::test]
    async fn test_caller_cancellation_reaches_attempts() {
        let dispatcher = Dispatcher::new(FnRemoteCall::new(scripted), Duration::from_secs(10));
        let parent = CancellationToken::new();
        cancel_after(&parent, Duration::from_millis(50));

        let started = Instant::now();
        let results = dispatcher
            .scope(&parent)
            .request_all(&["hang", "hang-2"], "eth_blockNumber", Bytes::new())
            .await
            .unwrap();

        assert!(results.iter().all(|r| r.error == Some(CallError::Cancelled)));
        assert_eq!(dispatcher.metrics().interrupted, 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_failover_caller_cancellation_is_cancelled() {
        let dispatcher = Dispatcher::new(FnRemoteCall::new(scripted), Duration::from_secs(10));
        let parent = CancellationToken::new();
        cancel_after(&parent, Duration::from_millis(50));

        let err = dispatcher
            .scope(&parent)
            .request_with_failover(&["hang", "hang-2"], "eth_blockNumber", Bytes::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled { .. }), "got {err}");
        assert_eq!(err.failures().len(), 2);
        assert!(err.failures().iter().all(|f| f.error == CallError::Cancelled));
    }

    #[tokio::test]
    async fn test_fastest_caller_cancellation_is_cancelled() {
        let dispatcher = Dispatcher::new(FnRemoteCall::new(scripted), Duration::from_secs(10));
        let parent = CancellationToken::new();
        cancel_after(&parent, Duration::from_millis(50));

        let err = dispatcher
            .scope(&parent)
            .request_fastest(&["bad-1", "hang", "hang-2"], "eth_blockNumber", Bytes::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Cancelled { .. }), "got {err}");
        let endpoints: Vec<_> = err.failures().iter().map(|f| f.endpoint.as_str()).collect();
        assert_eq!(endpoints, vec!["bad-1"]);
        assert!(err.failures().iter().all(|f| !f.error.is_cancellation()));
    }

    #[tokio::test]
    async fn test_fastest_deadline_is_timed_out() {
        let dispatcher = Dispatcher::new(FnRemoteCall::new(scripted), Duration::from_millis(150));

        let err = dispatcher
            .request_fastest(&["bad-1", "hang", "hang-2"], "eth_blockNumber", Bytes::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::TimedOut { .. }), "got {err}");
        assert_eq!(err.failures().len(), 1);
        assert_eq!(err.failures()[0].endpoint, "bad-1");
        assert_eq!(dispatcher.metrics().interrupted, 1);
    }

    #[tokio::test]
    async fn test_pool_two_workers_five_tasks() {
        let pool = WorkerPool::new(WorkerPoolConfig::new(2, 10)).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        let started = Instant::now();
        for i in 0..5 {
            let done = Arc::clone(&done);
            let task = Task::new(move |_ctx| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .with_label(format!("sleep-{i}"));
            pool.submit_blocking(task).await.unwrap();
        }

        let outcome = pool.shutdown(Duration::from_secs(5)).await;
        let elapsed = started.elapsed();

        assert!(outcome.is_completed());
        assert_eq!(done.load(Ordering::SeqCst), 5);
        assert_eq!(pool.stats().tasks_completed, 5);
        assert!(elapsed >= Duration::from_millis(280), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1000), "elapsed {elapsed:?}");
    }

    /// Store that fails the first `failures` writes of every record
    struct FlakyStore {
        failures: usize,
        attempts: AtomicUsize,
        written: Mutex<Vec<String>>,
    }

    impl LogStore for FlakyStore {
        type Record = String;

        fn name(&self) -> &str {
            "flaky"
        }

        async fn persist(&self, record: &String) -> Result<(), ContractError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                return Err(ContractError::store_write("flaky", "database unavailable"));
            }
            self.written.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_logger_retries_until_persisted_once() {
        let store = FlakyStore {
            failures: 1,
            attempts: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
        };
        let config = LoggerConfig::new(1, 4).with_retry(3, Duration::from_millis(10));
        let logger = WriteBehindLogger::new(store, config).unwrap();

        logger.log("request-1".to_string()).await;
        let outcome = logger.shutdown(Duration::from_secs(2)).await;

        assert!(outcome.is_completed());
        let stats = logger.stats();
        assert_eq!(stats.persisted, 1);
        assert_eq!(stats.dropped_exhausted, 0);
    }

    #[tokio::test]
    async fn test_dispatch_results_logged_to_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("requests.jsonl");

        let mut config = contracts::CoreConfig::default();
        config.request_log.store = contracts::RequestLogStoreKind::JsonLines;
        config.request_log.path = Some(path.clone());
        config.request_log.workers = 2;

        let store = RequestLogStore::from_settings(&config.request_log).unwrap();
        let logger = WriteBehindLogger::new(store, LoggerConfig::from(&config.request_log)).unwrap();
        let dispatcher = Dispatcher::new(FnRemoteCall::new(scripted), Duration::from_secs(1));

        let results = dispatcher
            .request_all(&["fast", "bad-1"], "eth_chainId", Bytes::new())
            .await
            .unwrap();
        let mut aggregator = DispatchAggregator::new();
        for result in &results {
            aggregator.update(result);
            logger.log(RequestLog::from_call_result("ethereum", result)).await;
        }

        assert!(logger.shutdown(Duration::from_secs(2)).await.is_completed());

        let content = std::fs::read_to_string(&path).unwrap();
        let mut records: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        records.sort_by_key(|r| r["endpoint"].as_str().unwrap_or_default().to_string());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["endpoint"], "bad-1");
        assert_eq!(records[0]["status_code"], 502);
        assert_eq!(records[1]["endpoint"], "fast");
        assert_eq!(records[1]["status_code"], 200);

        let summary = aggregator.summary();
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.failures, 1);
    }

    #[tokio::test]
    async fn test_config_file_to_core_services() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(
            br#"
[dispatcher]
timeout_ms = 500

[worker_pool]
workers = 2
queue_capacity = 4

[request_log]
workers = 1
queue_capacity = 16
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        let store = RequestLogStore::from_settings(&config.request_log).unwrap();
        let services = CoreServices::init(&config, FnRemoteCall::new(scripted), store).unwrap();
        assert_eq!(services.dispatcher.config().timeout, Duration::from_millis(500));

        let dispatcher = services.dispatcher.clone();
        let logger = services.logger.clone();
        let task = Task::new(move |_ctx| async move {
            let result = dispatcher
                .request_fastest(&["slow", "fast"], "eth_gasPrice", Bytes::new())
                .await?;
            logger.log(RequestLog::from_call_result("ethereum", &result)).await;
            Ok(())
        });
        assert!(services.pool.submit(task).await);

        let outcome = services.shutdown(Duration::from_secs(2)).await;
        assert!(outcome.is_completed());
        assert_eq!(services.pool.stats().tasks_completed, 1);
        assert_eq!(services.logger.stats().persisted, 1);
    }

    #[tokio::test]
    async fn test_simulation_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("simulation.jsonl");

        let mut config = contracts::CoreConfig::default();
        config.worker_pool.workers = 4;
        config.worker_pool.queue_capacity = 8;
        config.request_log.store = contracts::RequestLogStoreKind::JsonLines;
        config.request_log.path = Some(path.clone());

        let store = RequestLogStore::from_settings(&config.request_log).unwrap();
        let nodes = SimulatedNodes::new(NodeProfile::new(Duration::from_millis(5), 0.0));
        let services = CoreServices::init(&config, nodes, store).unwrap();

        let simulation_config = SimulationConfig {
            mode: SimulationMode::Fastest,
            requests: 12,
            shutdown_timeout: Duration::from_secs(5),
            ..SimulationConfig::default()
        };
        let endpoints = vec!["sim://a".to_string(), "sim://b".to_string()];
        let stats = Simulation::new(simulation_config, services, endpoints)
            .unwrap()
            .run()
            .await
            .unwrap();

        assert_eq!(stats.submitted, 12);
        assert_eq!(stats.dispatch.succeeded, 12);
        assert_eq!(stats.logger.persisted, 12);
        assert_eq!(stats.dropped_logs(), 0);
        assert!(stats.shutdown.is_completed());

        let lines = std::fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 12);
    }
}
