use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tracing::info;

use tanda_circle::CircleQuery;
use tanda_core::error::CircleError;
use tanda_core::types::{Address, CircleId, Timestamp};
use tanda_state::{CircleEngine, StateDb};
use tanda_token::{MemoryLedger, TokenLedger};

use crate::api::TandaApiServer;
use crate::types::{parse_amount, RpcCircleInfo, RpcCircleParams, RpcEvent, RpcMemberInfo};

fn invalid(msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(-32602, msg.into(), None::<()>)
}

/// Domain failures keep their machine-readable kind in the error data so the
/// client can surface the specific condition and offer a retry.
fn engine_err(e: CircleError) -> ErrorObject<'static> {
    match e {
        CircleError::Storage(_) | CircleError::Serialization(_) => {
            ErrorObject::owned(-32603, e.to_string(), None::<()>)
        }
        other => ErrorObject::owned(-32000, other.to_string(), Some(other.kind())),
    }
}

fn parse_circle_id(s: &str) -> Result<CircleId, ErrorObject<'static>> {
    CircleId::from_hex(s).map_err(|e| invalid(format!("invalid circle id: {e}")))
}

fn parse_address(s: &str) -> Result<Address, ErrorObject<'static>> {
    Address::from_b58(s).map_err(|e| invalid(format!("invalid address: {e}")))
}

/// Wall-clock timestamp injected into every engine call.
fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

// ── RpcServerState ───────────────────────────────────────────────────────────

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub engine: Arc<CircleEngine>,
    pub db: Arc<StateDb>,
    /// Dev token ledger backing mint/approve/balance helpers. In-memory
    /// only; a production deployment points the engine at a real ledger.
    pub ledger: Arc<MemoryLedger>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr`. Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let server = Server::builder().build(addr).await?;
        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl TandaApiServer for RpcServer {
    // ── Mutating operations ───────────────────────────────────────────────────

    async fn create_circle(
        &self,
        creator: String,
        params: RpcCircleParams,
    ) -> RpcResult<String> {
        let creator = parse_address(&creator)?;
        let params = params.to_params().map_err(invalid)?;
        let id = self
            .state
            .engine
            .create_circle(&creator, params, now())
            .map_err(engine_err)?;
        Ok(id.to_hex())
    }

    async fn join(&self, circle_id: String, member: String) -> RpcResult<()> {
        let id = parse_circle_id(&circle_id)?;
        let member = parse_address(&member)?;
        self.state
            .engine
            .join(&id, &member, now())
            .map_err(engine_err)?;
        Ok(())
    }

    async fn contribute(&self, circle_id: String, member: String) -> RpcResult<()> {
        let id = parse_circle_id(&circle_id)?;
        let member = parse_address(&member)?;
        self.state
            .engine
            .contribute(&id, &member, now())
            .map_err(engine_err)?;
        Ok(())
    }

    async fn process_round(&self, circle_id: String) -> RpcResult<()> {
        let id = parse_circle_id(&circle_id)?;
        self.state
            .engine
            .process_round(&id, now())
            .map_err(engine_err)?;
        Ok(())
    }

    async fn withdraw_collateral(&self, circle_id: String, member: String) -> RpcResult<()> {
        let id = parse_circle_id(&circle_id)?;
        let member = parse_address(&member)?;
        self.state
            .engine
            .withdraw_collateral(&id, &member, now())
            .map_err(engine_err)?;
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    async fn get_circle_info(&self, circle_id: String) -> RpcResult<RpcCircleInfo> {
        let id = parse_circle_id(&circle_id)?;
        let info = CircleQuery::new(&self.state.db)
            .circle_info(&id)
            .map_err(engine_err)?;
        Ok(info.into())
    }

    async fn get_member_info(
        &self,
        circle_id: String,
        address: String,
    ) -> RpcResult<Option<RpcMemberInfo>> {
        let id = parse_circle_id(&circle_id)?;
        let address = parse_address(&address)?;
        let member = CircleQuery::new(&self.state.db)
            .member_info(&id, &address)
            .map_err(engine_err)?;
        Ok(member.map(Into::into))
    }

    async fn get_member_addresses(&self, circle_id: String) -> RpcResult<Vec<String>> {
        let id = parse_circle_id(&circle_id)?;
        let addresses = CircleQuery::new(&self.state.db)
            .member_addresses(&id)
            .map_err(engine_err)?;
        Ok(addresses.iter().map(|a| a.to_b58()).collect())
    }

    async fn grace_period_seconds(&self, circle_id: String) -> RpcResult<i64> {
        let id = parse_circle_id(&circle_id)?;
        CircleQuery::new(&self.state.db)
            .grace_period_secs(&id)
            .map_err(engine_err)
    }

    async fn get_events(
        &self,
        circle_id: String,
        from_seq: u64,
        limit: u32,
    ) -> RpcResult<Vec<RpcEvent>> {
        let id = parse_circle_id(&circle_id)?;
        let records = CircleQuery::new(&self.state.db)
            .events(&id, from_seq, limit)
            .map_err(engine_err)?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    async fn list_circles(&self) -> RpcResult<Vec<String>> {
        let ids = CircleQuery::new(&self.state.db)
            .list()
            .map_err(engine_err)?;
        Ok(ids.iter().map(|id| id.to_hex()).collect())
    }

    async fn describe_circle(&self, circle_id: String) -> RpcResult<String> {
        let id = parse_circle_id(&circle_id)?;
        CircleQuery::new(&self.state.db)
            .describe(&id, now())
            .map_err(engine_err)
    }

    // ── Dev token ledger ─────────────────────────────────────────────────────

    async fn mint(&self, to: String, amount: String) -> RpcResult<()> {
        let to = parse_address(&to)?;
        let amount = parse_amount(&amount).map_err(invalid)?;
        self.state.ledger.mint(&to, amount);
        Ok(())
    }

    async fn approve(&self, owner: String, circle_id: String, amount: String) -> RpcResult<()> {
        let owner = parse_address(&owner)?;
        let id = parse_circle_id(&circle_id)?;
        let amount = parse_amount(&amount).map_err(invalid)?;
        self.state
            .ledger
            .approve(&owner, &id.custody_address(), amount)
            .map_err(|e| ErrorObject::owned(-32000, e.to_string(), Some("ValueTransferFailed")))?;
        Ok(())
    }

    async fn balance_of(&self, owner: String) -> RpcResult<String> {
        let owner = parse_address(&owner)?;
        let balance = self
            .state
            .ledger
            .balance_of(&owner)
            .map_err(|e| ErrorObject::owned(-32603, e.to_string(), None::<()>))?;
        Ok(balance.to_string())
    }

    async fn allowance(&self, owner: String, circle_id: String) -> RpcResult<String> {
        let owner = parse_address(&owner)?;
        let id = parse_circle_id(&circle_id)?;
        let allowance = self
            .state
            .ledger
            .allowance(&owner, &id.custody_address())
            .map_err(|e| ErrorObject::owned(-32603, e.to_string(), None::<()>))?;
        Ok(allowance.to_string())
    }
}
