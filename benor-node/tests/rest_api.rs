use std::sync::Arc;
use std::time::Duration;

use benor_common::{Bit, NodeId, NodeState, Opinion};
use benor_consensus::{AlwaysReady, ConsensusConfig, ConsensusNode, Diagnostics, InMemoryNetwork};
use benor_node::api::rest::{serve, AppState};
use benor_node::{build_runtime, launch_network, ClusterPlan, NodeConfig};
use reqwest::StatusCode;
use serde_json::json;
use tokio::net::TcpListener;

/// Serves a single node whose peers do not exist: every send fails and no
/// report ever arrives, so the node never reaches a threshold on its own
/// unless `n == 1`.
async fn spawn_node(n: usize, initial: Opinion, faulty: bool) -> (String, Arc<ConsensusNode>) {
    let (network, _tx, _rx) = InMemoryNetwork::new(NodeId(0));
    let config = ConsensusConfig::new(n, 0).unwrap().with_seed(1);
    let node = Arc::new(ConsensusNode::new(
        NodeId(0),
        initial,
        faulty,
        config,
        Arc::new(network),
        Arc::new(AlwaysReady),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, AppState { node: Arc::clone(&node) }, std::future::pending()));
    (url, node)
}

#[tokio::test]
async fn test_status_reports_live_and_faulty() {
    let client = reqwest::Client::new();

    let (live, _) = spawn_node(3, Some(Bit::One), false).await;
    let response = client.get(format!("{live}/status")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "live");

    let (faulty, _) = spawn_node(3, Some(Bit::One), true).await;
    let response = client.get(format!("{faulty}/status")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text().await.unwrap(), "faulty");
}

#[tokio::test]
async fn test_message_intake_accepts_and_rejects() {
    let client = reqwest::Client::new();
    let (url, node) = spawn_node(3, Some(Bit::Zero), false).await;

    let ok = client
        .post(format!("{url}/message"))
        .json(&json!({"round": 0, "value": 1, "decision": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(ok.text().await.unwrap(), "received");

    for bad in [
        json!({"round": 0, "value": 2, "decision": false}),
        json!({"round": 0, "value": null, "decision": true}),
        json!({"value": 1}),
    ] {
        let response = client.post(format!("{url}/message")).json(&bad).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{bad}");
    }

    let diagnostics: Diagnostics = client
        .get(format!("{url}/diagnostics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(diagnostics.rejected_messages, 3);
    assert_eq!(diagnostics.logged_messages, 1);
    assert_eq!(node.get_state().await.decided, Some(false));
}

#[tokio::test]
async fn test_decision_announcement_is_adopted() {
    let client = reqwest::Client::new();
    let (url, _) = spawn_node(3, Some(Bit::Zero), false).await;

    client
        .post(format!("{url}/message"))
        .json(&json!({"round": 5, "value": 1, "decision": true}))
        .send()
        .await
        .unwrap();

    let state: serde_json::Value = client.get(format!("{url}/getState")).send().await.unwrap().json().await.unwrap();
    assert_eq!(state, json!({"killed": false, "x": 1, "decided": true, "k": 0}));
}

#[tokio::test]
async fn test_faulty_node_state_is_undefined() {
    let client = reqwest::Client::new();
    let (url, _) = spawn_node(3, Some(Bit::One), true).await;

    let start = client.get(format!("{url}/start")).send().await.unwrap();
    assert_eq!(start.text().await.unwrap(), "stopped");

    let state: serde_json::Value = client.get(format!("{url}/getState")).send().await.unwrap().json().await.unwrap();
    assert_eq!(state, json!({"killed": false, "x": null, "decided": null, "k": null}));
}

#[tokio::test]
async fn test_single_node_network_decides_over_http() {
    let client = reqwest::Client::new();
    let (url, _) = spawn_node(1, Some(Bit::One), false).await;

    let start = client.get(format!("{url}/start")).send().await.unwrap();
    assert_eq!(start.status(), StatusCode::OK);
    assert_eq!(start.text().await.unwrap(), "decided 1");
}

#[tokio::test]
async fn test_second_start_conflicts_and_stop_ends_the_first() {
    let client = reqwest::Client::new();
    let (url, _) = spawn_node(3, Some(Bit::One), false).await;

    let first = {
        let client = client.clone();
        let url = format!("{url}/start");
        tokio::spawn(async move { client.get(url).send().await.unwrap().text().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    let second = client.get(format!("{url}/start")).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let stop = client.get(format!("{url}/stop")).send().await.unwrap();
    assert_eq!(stop.text().await.unwrap(), "success");
    assert_eq!(first.await.unwrap(), "stopped");

    let state: NodeState = client.get(format!("{url}/getState")).send().await.unwrap().json().await.unwrap();
    assert!(state.killed);
    assert!(state.round.unwrap() >= 1);
}

#[tokio::test]
async fn test_launch_network_reaches_agreement() {
    let plan = ClusterPlan::new(1, vec![Some(Bit::One), Some(Bit::One), Some(Bit::One), Some(Bit::Zero)])
        .with_faulty_nodes([NodeId(3)])
        .with_host("127.0.0.1")
        .with_base_port(0)
        .with_seed(4)
        .with_deadline(Duration::from_secs(30));

    let reports = launch_network(&plan).await.unwrap();
    assert_eq!(reports.len(), 4);
    assert_eq!(reports[3].outcome, "stopped");
    assert_eq!(reports[3].state.opinion, None);
    for report in &reports[..3] {
        assert_eq!(report.outcome, "decided 1");
        assert_eq!(report.state.opinion, Some(Bit::One));
        assert_eq!(report.state.decided, Some(true));
    }
}

#[tokio::test]
async fn test_build_runtime_serves_on_configured_port() {
    let mut config = NodeConfig::new(NodeId(0), 1, 0, Some(Bit::Zero));
    config.listen_host = "127.0.0.1".into();
    config.peer_host = "127.0.0.1".into();
    config.base_port = 39_410;

    let runtime = build_runtime(&config).await.unwrap();
    assert_eq!(runtime.local_addr().unwrap().port(), 39_410);
    let url = format!("http://{}", runtime.local_addr().unwrap());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(runtime.serve_until(async move {
        let _ = shutdown_rx.await;
    }));

    let client = reqwest::Client::new();
    let status = client.get(format!("{url}/status")).send().await.unwrap();
    assert_eq!(status.text().await.unwrap(), "live");

    shutdown_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_build_runtime_rejects_zero_base_port() {
    let mut config = NodeConfig::new(NodeId(0), 1, 0, Some(Bit::Zero));
    config.base_port = 0;
    assert!(build_runtime(&config).await.is_err());
}

#[tokio::test]
async fn test_two_runtimes_agree_over_http() {
    let configs: Vec<NodeConfig> = (0..2)
        .map(|i| {
            let mut config = NodeConfig::new(NodeId(i), 2, 0, Some(Bit::One));
            config.listen_host = "127.0.0.1".into();
            config.peer_host = "127.0.0.1".into();
            config.base_port = 39_420;
            config.propagation_delay_ms = 50;
            config.readiness_poll_interval_ms = 20;
            config.seed = Some(i as u64);
            config
        })
        .collect();

    let mut urls = Vec::new();
    let mut shutdowns = Vec::new();
    let mut servers = Vec::new();
    for config in &configs {
        let runtime = build_runtime(config).await.unwrap();
        urls.push(format!("http://{}", runtime.local_addr().unwrap()));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        shutdowns.push(tx);
        servers.push(tokio::spawn(runtime.serve_until(async move {
            let _ = rx.await;
        })));
    }

    let client = reqwest::Client::new();
    let starts: Vec<_> = urls
        .iter()
        .map(|url| {
            let client = client.clone();
            let url = format!("{url}/start");
            tokio::spawn(async move { client.get(url).send().await.unwrap().text().await.unwrap() })
        })
        .collect();
    for start in starts {
        let outcome = tokio::time::timeout(Duration::from_secs(10), start).await.unwrap().unwrap();
        assert_eq!(outcome, "decided 1");
    }

    for url in &urls {
        let state: NodeState = client.get(format!("{url}/getState")).send().await.unwrap().json().await.unwrap();
        assert_eq!(state.opinion, Some(Bit::One));
        assert_eq!(state.decided, Some(true));
    }

    for tx in shutdowns {
        tx.send(()).unwrap();
    }
    for server in servers {
        server.await.unwrap().unwrap();
    }
}
