//! tanda-rpc
//!
//! JSON-RPC 2.0 server for tanda nodes.
//!
//! Namespace: "tanda"
//! Mutating methods (each one atomic engine transaction):
//!   tanda_createCircle        — create a circle with immutable parameters
//!   tanda_join                — join a forming circle (pulls collateral)
//!   tanda_contribute          — pay the current round's contribution
//!   tanda_processRound        — settle the round (permissionless)
//!   tanda_withdrawCollateral  — recover collateral after the circle ends
//! Queries:
//!   tanda_getCircleInfo, tanda_getMemberInfo, tanda_getMemberAddresses,
//!   tanda_gracePeriodSeconds, tanda_getEvents, tanda_listCircles,
//!   tanda_describeCircle
//! Dev token ledger (in-memory, not persistent):
//!   tanda_mint, tanda_approve, tanda_balanceOf, tanda_allowance

pub mod api;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState};
pub use types::{RpcCircleInfo, RpcCircleParams, RpcEvent, RpcMemberInfo};
