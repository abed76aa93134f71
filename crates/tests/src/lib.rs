//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置到组件的装配测试
//! - HTTP → BufferedStore → Sink 端到端测试
//! - 并发写入不丢失、不重复

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};

    #[test]
    fn test_blueprint_builds_store_and_sink() {
        let blueprint = ConfigLoader::load_from_str(
            "[store]\nflush_interval = \"100ms\"\n[sink]\ntype = \"log\"\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        let store_config = buffered_store::StoreConfig::from(&blueprint.store);
        assert_eq!(store_config.flush_interval.as_millis(), 100);

        let sink = sinks::create_sink(&blueprint.sink).unwrap();
        assert_eq!(contracts::RecordSink::name(&sink), "log");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use buffered_store::{BufferedStore, StoreConfig, StoreError};
    use contracts::{ContractError, EventRecord, FileSinkConfig, RecordSink, ServerConfig};
    use ingestion::IngestServer;
    use sinks::FileSink;
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    /// Sink keeping every saved record; can be switched to fail
    #[derive(Default)]
    struct RecordingSink {
        saved: Mutex<Vec<EventRecord>>,
        failing: AtomicBool,
    }

    impl RecordSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn save(&self, records: &[EventRecord]) -> Result<(), ContractError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ContractError::sink_write("recording", "unavailable"));
            }
            self.saved.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    struct RunningServer {
        addr: SocketAddr,
        cancel: CancellationToken,
        handle: JoinHandle<ingestion::Result<()>>,
    }

    impl RunningServer {
        fn url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }

        async fn shutdown(self) {
            self.cancel.cancel();
            self.handle.await.unwrap().unwrap();
        }
    }

    async fn spawn_server<S>(store: Arc<BufferedStore<S>>) -> RunningServer
    where
        S: RecordSink + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig {
            addr: addr.to_string(),
            ..ServerConfig::default()
        };
        let cancel = CancellationToken::new();
        let server = IngestServer::new(config, store);
        let handle = tokio::spawn(server.serve(listener, cancel.clone()));

        RunningServer {
            addr,
            cancel,
            handle,
        }
    }

    fn event(session: &str, sequence: i64) -> String {
        serde_json::json!({
            "client_time": "2020-12-01 23:59:00",
            "device_id": "0287D9AA-4ADF-4B37-A60F-3E9E645C821E",
            "device_os": "iOS 13.5.1",
            "session": session,
            "sequence": sequence,
            "event": "app_start",
            "param_int": sequence * 10,
            "param_str": "some text"
        })
        .to_string()
    }

    fn store_config(flush_interval: Duration) -> StoreConfig {
        StoreConfig {
            flush_interval,
            save_timeout: Duration::from_secs(5),
            high_water_mark: None,
        }
    }

    async fn post(client: &reqwest::Client, url: &str, body: String) -> reqwest::StatusCode {
        client.post(url).body(body).send().await.unwrap().status()
    }

    /// HTTP → store → FileSink, persisted by the periodic loop
    #[tokio::test]
    async fn test_e2e_http_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(
            "file",
            FileSinkConfig {
                base_path: dir.path().to_path_buf(),
            },
        )
        .unwrap();
        let output = sink.file_for(chrono::Utc::now());

        let store = BufferedStore::new(sink, store_config(Duration::from_millis(50)));
        store.start().unwrap();
        let server = spawn_server(Arc::clone(&store)).await;

        let client = reqwest::Client::new();
        let body = format!(
            "{}\n{{\"event\":\"no_session\"}}\n{}",
            event("s1", 1),
            event("s1", 2)
        );
        let response = client
            .post(server.url("/submit"))
            .header("x-forwarded-for", "203.0.113.9")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);

        // Wait for the background loop to persist.
        let mut lines = Vec::new();
        for _ in 0..100 {
            if let Ok(content) = std::fs::read_to_string(&output) {
                lines = content.lines().map(str::to_string).collect();
                if lines.len() == 2 {
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["sequence"], 1);
        assert_eq!(first["ip"], "203.0.113.9");
        assert_eq!(first["client_time"], "2020-12-01 23:59:00");

        server.shutdown().await;
        store.stop().await.unwrap();
        assert_eq!(store.pending_len(), 0);
    }

    /// Records still buffered at shutdown are drained by `stop`
    #[tokio::test]
    async fn test_e2e_shutdown_drains_pending() {
        let store = BufferedStore::new(
            RecordingSink::default(),
            store_config(Duration::from_secs(3600)),
        );
        store.start().unwrap();
        let server = spawn_server(Arc::clone(&store)).await;

        let client = reqwest::Client::new();
        for seq in 0..10 {
            let status = post(&client, &server.url("/submit"), event("s", seq)).await;
            assert_eq!(status, reqwest::StatusCode::CREATED);
        }
        assert_eq!(store.pending_len(), 10);
        assert!(store.sink().saved.lock().unwrap().is_empty());

        server.shutdown().await;
        store.stop().await.unwrap();

        let saved = store.sink().saved.lock().unwrap();
        let sequences: Vec<i64> = saved.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, (0..10).collect::<Vec<_>>());
        assert!(saved.iter().all(|r| r.ip == "127.0.0.1"));
    }

    /// Five concurrent clients; every record lands exactly once, in per-client order
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_e2e_concurrent_writers_no_loss() {
        const WRITERS: usize = 5;
        const REQUESTS: i64 = 40;
        const PER_REQUEST: i64 = 5;

        let store = BufferedStore::new(
            RecordingSink::default(),
            store_config(Duration::from_millis(10)),
        );
        store.start().unwrap();
        let server = spawn_server(Arc::clone(&store)).await;
        let url = server.url("/submit");

        let client = reqwest::Client::new();
        let mut writers = Vec::new();
        for w in 0..WRITERS {
            let client = client.clone();
            let url = url.clone();
            writers.push(tokio::spawn(async move {
                let session = format!("writer-{w}");
                for r in 0..REQUESTS {
                    let body: Vec<String> = (0..PER_REQUEST)
                        .map(|i| event(&session, r * PER_REQUEST + i))
                        .collect();
                    let status = post(&client, &url, body.join("\n")).await;
                    assert_eq!(status, reqwest::StatusCode::CREATED);
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }

        server.shutdown().await;
        store.stop().await.unwrap();

        let saved = store.sink().saved.lock().unwrap();
        let expected = WRITERS * (REQUESTS * PER_REQUEST) as usize;
        assert_eq!(saved.len(), expected);

        let mut by_session: HashMap<&str, Vec<i64>> = HashMap::new();
        for record in saved.iter() {
            by_session
                .entry(record.session.as_str())
                .or_default()
                .push(record.sequence);
        }
        assert_eq!(by_session.len(), WRITERS);
        for sequences in by_session.values() {
            let expected: Vec<i64> = (0..REQUESTS * PER_REQUEST).collect();
            assert_eq!(sequences, &expected);
        }
        assert_eq!(store.metrics().snapshot().flushed_count, expected as u64);
    }

    /// A sink that is down at shutdown surfaces a drain error
    #[tokio::test]
    async fn test_e2e_drain_failure_reported() {
        let store = BufferedStore::new(
            RecordingSink::default(),
            store_config(Duration::from_secs(3600)),
        );
        store.start().unwrap();
        let server = spawn_server(Arc::clone(&store)).await;

        let client = reqwest::Client::new();
        let status = post(&client, &server.url("/submit"), event("s", 1)).await;
        assert_eq!(status, reqwest::StatusCode::CREATED);

        store.sink().failing.store(true, Ordering::SeqCst);
        server.shutdown().await;

        match store.stop().await {
            Err(StoreError::Drain { pending, .. }) => assert_eq!(pending, 1),
            other => panic!("expected drain error, got {other:?}"),
        }
    }
}
