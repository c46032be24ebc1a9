use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcCircleInfo, RpcCircleParams, RpcEvent, RpcMemberInfo};

/// Tanda JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "tanda_" via `namespace = "tanda"`.
/// Addresses are base-58 strings, circle ids are hex strings, and token
/// amounts travel as decimal strings (u128 does not fit in JSON numbers).
#[rpc(server, namespace = "tanda")]
pub trait TandaApi {
    // ── Mutating operations ───────────────────────────────────────────────────

    /// Create a circle with immutable parameters. Returns the circle id hex.
    #[method(name = "createCircle")]
    async fn create_circle(&self, creator: String, params: RpcCircleParams)
        -> RpcResult<String>;

    /// Join a forming circle. Pulls the collateral requirement from `member`
    /// (allowance for the circle's custody address must be in place).
    #[method(name = "join")]
    async fn join(&self, circle_id: String, member: String) -> RpcResult<()>;

    /// Pay the fixed contribution for the current round.
    #[method(name = "contribute")]
    async fn contribute(&self, circle_id: String, member: String) -> RpcResult<()>;

    /// Settle the current round once the grace window has elapsed.
    /// Permissionless: no caller identity is required.
    #[method(name = "processRound")]
    async fn process_round(&self, circle_id: String) -> RpcResult<()>;

    /// Recover remaining collateral after the circle completed or failed.
    #[method(name = "withdrawCollateral")]
    async fn withdraw_collateral(&self, circle_id: String, member: String) -> RpcResult<()>;

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Circle summary: status, round counters, pot, and fixed parameters.
    #[method(name = "getCircleInfo")]
    async fn get_circle_info(&self, circle_id: String) -> RpcResult<RpcCircleInfo>;

    /// Detail for one member, or null if the address never joined.
    #[method(name = "getMemberInfo")]
    async fn get_member_info(
        &self,
        circle_id: String,
        address: String,
    ) -> RpcResult<Option<RpcMemberInfo>>;

    /// Member addresses ordered by join rank (== payout order).
    #[method(name = "getMemberAddresses")]
    async fn get_member_addresses(&self, circle_id: String) -> RpcResult<Vec<String>>;

    /// The circle's immutable grace period, in seconds.
    #[method(name = "gracePeriodSeconds")]
    async fn grace_period_seconds(&self, circle_id: String) -> RpcResult<i64>;

    /// Event history page for a circle, from `from_seq`, at most `limit`
    /// records (server-side clamp applies).
    #[method(name = "getEvents")]
    async fn get_events(
        &self,
        circle_id: String,
        from_seq: u64,
        limit: u32,
    ) -> RpcResult<Vec<RpcEvent>>;

    /// Ids of every circle known to this node.
    #[method(name = "listCircles")]
    async fn list_circles(&self) -> RpcResult<Vec<String>>;

    /// Human-readable one-line summary of a circle's state.
    #[method(name = "describeCircle")]
    async fn describe_circle(&self, circle_id: String) -> RpcResult<String>;

    // ── Dev token ledger ─────────────────────────────────────────────────────

    /// Credit `amount` to `to` on the node's in-memory dev ledger.
    #[method(name = "mint")]
    async fn mint(&self, to: String, amount: String) -> RpcResult<()>;

    /// Approve the circle's custody address to pull up to `amount` from
    /// `owner`. Invoked by the client before join/contribute.
    #[method(name = "approve")]
    async fn approve(&self, owner: String, circle_id: String, amount: String) -> RpcResult<()>;

    /// Token balance of `owner` (decimal string).
    #[method(name = "balanceOf")]
    async fn balance_of(&self, owner: String) -> RpcResult<String>;

    /// Remaining allowance from `owner` to the circle's custody address.
    #[method(name = "allowance")]
    async fn allowance(&self, owner: String, circle_id: String) -> RpcResult<String>;
}
