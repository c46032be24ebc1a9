use anyhow::{bail, Context};

use tanda_rpc::{RpcCircleInfo, RpcCircleParams, RpcEvent, RpcMemberInfo};

/// Simple JSON-RPC 2.0 client used by the CLI to talk to a running node.
///
/// Uses raw HTTP POST with serde_json rather than the full jsonrpsee client
/// to keep the binary lean and dependency-minimal.
pub struct CircleRpcClient {
    url: String,
    client: reqwest::Client,
}

impl CircleRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to node at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error") {
            bail!("RPC error: {}", err);
        }

        Ok(json["result"].clone())
    }

    // ── Mutating operations ───────────────────────────────────────────────────

    pub async fn create_circle(
        &self,
        creator: &str,
        params: &RpcCircleParams,
    ) -> anyhow::Result<String> {
        let result = self
            .call("tanda_createCircle", serde_json::json!([creator, params]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected circle id string from createCircle")
    }

    pub async fn join(&self, circle_id: &str, member: &str) -> anyhow::Result<()> {
        self.call("tanda_join", serde_json::json!([circle_id, member]))
            .await?;
        Ok(())
    }

    pub async fn contribute(&self, circle_id: &str, member: &str) -> anyhow::Result<()> {
        self.call("tanda_contribute", serde_json::json!([circle_id, member]))
            .await?;
        Ok(())
    }

    pub async fn process_round(&self, circle_id: &str) -> anyhow::Result<()> {
        self.call("tanda_processRound", serde_json::json!([circle_id]))
            .await?;
        Ok(())
    }

    pub async fn withdraw_collateral(&self, circle_id: &str, member: &str) -> anyhow::Result<()> {
        self.call(
            "tanda_withdrawCollateral",
            serde_json::json!([circle_id, member]),
        )
        .await?;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub async fn circle_info(&self, circle_id: &str) -> anyhow::Result<RpcCircleInfo> {
        let result = self
            .call("tanda_getCircleInfo", serde_json::json!([circle_id]))
            .await?;
        serde_json::from_value(result).context("parsing circle info")
    }

    pub async fn member_info(
        &self,
        circle_id: &str,
        address: &str,
    ) -> anyhow::Result<Option<RpcMemberInfo>> {
        let result = self
            .call("tanda_getMemberInfo", serde_json::json!([circle_id, address]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .context("parsing member info")
    }

    pub async fn member_addresses(&self, circle_id: &str) -> anyhow::Result<Vec<String>> {
        let result = self
            .call("tanda_getMemberAddresses", serde_json::json!([circle_id]))
            .await?;
        serde_json::from_value(result).context("parsing member addresses")
    }

    pub async fn events(
        &self,
        circle_id: &str,
        from_seq: u64,
        limit: u32,
    ) -> anyhow::Result<Vec<RpcEvent>> {
        let result = self
            .call(
                "tanda_getEvents",
                serde_json::json!([circle_id, from_seq, limit]),
            )
            .await?;
        serde_json::from_value(result).context("parsing events")
    }

    pub async fn list_circles(&self) -> anyhow::Result<Vec<String>> {
        let result = self.call("tanda_listCircles", serde_json::json!([])).await?;
        serde_json::from_value(result).context("parsing circle list")
    }

    pub async fn describe_circle(&self, circle_id: &str) -> anyhow::Result<String> {
        let result = self
            .call("tanda_describeCircle", serde_json::json!([circle_id]))
            .await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected description string")
    }

    // ── Dev token ledger ─────────────────────────────────────────────────────

    pub async fn mint(&self, to: &str, amount: &str) -> anyhow::Result<()> {
        self.call("tanda_mint", serde_json::json!([to, amount]))
            .await?;
        Ok(())
    }

    pub async fn approve(
        &self,
        owner: &str,
        circle_id: &str,
        amount: &str,
    ) -> anyhow::Result<()> {
        self.call("tanda_approve", serde_json::json!([owner, circle_id, amount]))
            .await?;
        Ok(())
    }

    pub async fn balance_of(&self, owner: &str) -> anyhow::Result<u128> {
        let result = self
            .call("tanda_balanceOf", serde_json::json!([owner]))
            .await?;
        let bal_str = result.as_str().context("expected string balance")?;
        let bal: u128 = bal_str.parse().context("parsing balance")?;
        Ok(bal)
    }
}
