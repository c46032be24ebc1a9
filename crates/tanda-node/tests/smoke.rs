//! End-to-end smoke test for tanda-node.
//!
//! Starts a real node process with a fresh database, drives a full 3-member
//! circle round over JSON-RPC with real wall-clock timing, and asserts the
//! pot lands with the first-joined member.
//!
//! Run with:
//!   cargo test -p tanda-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tanda_core::types::Address;

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── RPC helpers ───────────────────────────────────────────────────────────────

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

/// Poll until the RPC server responds or the timeout elapses.
async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "tanda_listCircles",
        "params": [],
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

async fn balance_of(client: &reqwest::Client, url: &str, address: &str) -> u128 {
    let result = rpc_call(client, url, "tanda_balanceOf", serde_json::json!([address])).await;
    result.as_str().unwrap().parse().expect("parse balance")
}

// ── Smoke test ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_full_circle_round() {
    // ── 1. Prepare temp dir ───────────────────────────────────────────────────
    let data_dir = std::env::temp_dir().join(format!("tanda_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    // ── 2. Start node ─────────────────────────────────────────────────────────
    let rpc_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{}", rpc_port);

    let node_bin = env!("CARGO_BIN_EXE_tanda-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir",
            data_dir.join("state").to_str().unwrap(),
            "--rpc-addr",
            &format!("127.0.0.1:{}", rpc_port),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn tanda-node");

    let _guard = NodeGuard { child, data_dir };

    // ── 3. Wait for RPC ready ─────────────────────────────────────────────────
    let http = reqwest::Client::new();
    assert!(
        wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await,
        "tanda-node did not become ready within 20 seconds"
    );

    // ── 4. Fund three members on the dev ledger ───────────────────────────────
    let alice = Address::from_bytes([1u8; 32]).to_b58();
    let bob = Address::from_bytes([2u8; 32]).to_b58();
    let carol = Address::from_bytes([3u8; 32]).to_b58();

    for who in [&alice, &bob, &carol] {
        rpc_call(&http, &rpc_url, "tanda_mint", serde_json::json!([who, "1000"])).await;
    }

    // ── 5. Create a short-round circle ────────────────────────────────────────
    // 3 s contribution window + 1 s grace keeps the test fast while leaving
    // enough slack for the RPC round-trips.
    let params = serde_json::json!({
        "contribution_amount": "100",
        "collateral_requirement": "50",
        "max_members": 3,
        "contribution_period_secs": 3,
        "grace_period_secs": 1,
        "penalty_rate_percent": 5
    });
    let circle_id = rpc_call(
        &http,
        &rpc_url,
        "tanda_createCircle",
        serde_json::json!([alice, params]),
    )
    .await
    .as_str()
    .expect("circle id string")
    .to_string();

    // ── 6. Join in order: alice, bob, carol ───────────────────────────────────
    for who in [&alice, &bob, &carol] {
        rpc_call(
            &http,
            &rpc_url,
            "tanda_approve",
            serde_json::json!([who, circle_id, "1000"]),
        )
        .await;
        rpc_call(&http, &rpc_url, "tanda_join", serde_json::json!([circle_id, who])).await;
    }

    let info = rpc_call(
        &http,
        &rpc_url,
        "tanda_getCircleInfo",
        serde_json::json!([circle_id]),
    )
    .await;
    assert_eq!(info["status"], "Active");
    assert_eq!(info["current_turn"], 1);
    assert_eq!(info["member_count"], 3);

    // ── 7. Everyone contributes inside the window ─────────────────────────────
    for who in [&alice, &bob, &carol] {
        rpc_call(
            &http,
            &rpc_url,
            "tanda_contribute",
            serde_json::json!([circle_id, who]),
        )
        .await;
    }
    // Collateral 50 + contribution 100 gone from each wallet.
    assert_eq!(balance_of(&http, &rpc_url, &alice).await, 850);

    // ── 8. Let the window and grace elapse, then settle ───────────────────────
    tokio::time::sleep(Duration::from_secs(5)).await;
    rpc_call(
        &http,
        &rpc_url,
        "tanda_processRound",
        serde_json::json!([circle_id]),
    )
    .await;

    // ── 9. The whole pot went to the first-joined member ──────────────────────
    assert_eq!(
        balance_of(&http, &rpc_url, &alice).await,
        850 + 300,
        "alice should receive the full pot of 300"
    );

    let info = rpc_call(
        &http,
        &rpc_url,
        "tanda_getCircleInfo",
        serde_json::json!([circle_id]),
    )
    .await;
    assert_eq!(info["status"], "Active");
    assert_eq!(info["current_turn"], 2);
    assert_eq!(info["pot"], "0");

    let member = rpc_call(
        &http,
        &rpc_url,
        "tanda_getMemberInfo",
        serde_json::json!([circle_id, alice]),
    )
    .await;
    assert_eq!(member["has_contributed_this_round"], false);
    assert_eq!(member["is_defaulted"], false);

    // Payout is recorded in the event log under the recipient's turn index.
    let events = rpc_call(
        &http,
        &rpc_url,
        "tanda_getEvents",
        serde_json::json!([circle_id, 0, 100]),
    )
    .await;
    let payout = events
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["kind"] == "PotDistributed")
        .expect("payout event");
    assert_eq!(payout["address"].as_str().unwrap(), alice);
    assert_eq!(payout["turn"], 1);
    assert_eq!(payout["amount"], "300");
}
