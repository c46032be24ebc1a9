//! tanda-cli
//!
//! Command-line client for a running tanda node. Plays the role of the
//! external client collaborator: submits circle operations over JSON-RPC and
//! renders query results. Caller identity is an address string (`--member`);
//! signing and wallet flows live outside this tool.
//!
//! Usage:
//!   tanda-cli create     --creator <b58> --contribution <n> --collateral <n> --max-members <n> ...
//!   tanda-cli join       --circle <hex> --member <b58>
//!   tanda-cli contribute --circle <hex> --member <b58>
//!   tanda-cli settle     --circle <hex>
//!   tanda-cli withdraw   --circle <hex> --member <b58>
//!   tanda-cli info       --circle <hex>
//!   tanda-cli member     --circle <hex> --address <b58>
//!   tanda-cli members    --circle <hex>
//!   tanda-cli events     --circle <hex> [--from <seq>] [--limit <n>]
//!   tanda-cli list
//!   tanda-cli mint       --to <b58> --amount <n>         (dev ledger)
//!   tanda-cli approve    --owner <b58> --circle <hex> --amount <n>
//!   tanda-cli balance    --address <b58>

use clap::{Parser, Subcommand};

use tanda_rpc::RpcCircleParams;

mod rpc_client;
use rpc_client::CircleRpcClient;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "tanda-cli",
    version,
    about = "Tanda client — drive rotating savings circles over JSON-RPC"
)]
struct Args {
    /// Node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8545")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new circle with immutable parameters.
    Create {
        /// Creator address (base-58).
        #[arg(long)]
        creator: String,
        /// Fixed contribution per member per round (token base units).
        #[arg(long)]
        contribution: String,
        /// Collateral pulled from each member at join time.
        #[arg(long)]
        collateral: String,
        /// Number of seats; the circle activates when the last one fills.
        #[arg(long)]
        max_members: u32,
        /// Contribution window length in seconds.
        #[arg(long, default_value_t = 86_400)]
        period: i64,
        /// Grace period before settlement opens, in seconds.
        #[arg(long, default_value_t = 3_600)]
        grace: i64,
        /// Penalty on a missed contribution, percent of the contribution.
        #[arg(long, default_value_t = 5)]
        penalty: u16,
    },

    /// Join a forming circle (collateral allowance must be approved first).
    Join {
        #[arg(long)]
        circle: String,
        /// Joining member address (base-58).
        #[arg(long)]
        member: String,
    },

    /// Pay the current round's contribution.
    Contribute {
        #[arg(long)]
        circle: String,
        #[arg(long)]
        member: String,
    },

    /// Settle the current round. Anyone may call this.
    Settle {
        #[arg(long)]
        circle: String,
    },

    /// Withdraw remaining collateral after the circle completed or failed.
    Withdraw {
        #[arg(long)]
        circle: String,
        #[arg(long)]
        member: String,
    },

    /// Print the circle summary and a human-readable status line.
    Info {
        #[arg(long)]
        circle: String,
    },

    /// Print one member's detail.
    Member {
        #[arg(long)]
        circle: String,
        #[arg(long)]
        address: String,
    },

    /// Print member addresses in join (== payout) order.
    Members {
        #[arg(long)]
        circle: String,
    },

    /// Print the circle's event history.
    Events {
        #[arg(long)]
        circle: String,
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },

    /// List all circles known to the node.
    List,

    /// Credit tokens on the node's dev ledger.
    Mint {
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: String,
    },

    /// Approve a circle's custody address to pull tokens from an owner.
    Approve {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        circle: String,
        #[arg(long)]
        amount: String,
    },

    /// Print an address's token balance.
    Balance {
        #[arg(long)]
        address: String,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,tanda_cli=info")
        .init();

    let args = Args::parse();
    let client = CircleRpcClient::new(&args.rpc);

    match args.command {
        Command::Create {
            creator,
            contribution,
            collateral,
            max_members,
            period,
            grace,
            penalty,
        } => {
            let params = RpcCircleParams {
                contribution_amount: contribution,
                collateral_requirement: collateral,
                max_members,
                contribution_period_secs: period,
                grace_period_secs: grace,
                penalty_rate_percent: penalty,
            };
            let id = client.create_circle(&creator, &params).await?;
            println!("Circle created: {}", id);
            Ok(())
        }

        Command::Join { circle, member } => {
            client.join(&circle, &member).await?;
            println!("Joined: {} as {}", &circle[..16.min(circle.len())], member);
            Ok(())
        }

        Command::Contribute { circle, member } => {
            client.contribute(&circle, &member).await?;
            println!("Contribution submitted for {}", member);
            Ok(())
        }

        Command::Settle { circle } => {
            client.process_round(&circle).await?;
            println!("Round settled");
            Ok(())
        }

        Command::Withdraw { circle, member } => {
            client.withdraw_collateral(&circle, &member).await?;
            println!("Collateral withdrawn for {}", member);
            Ok(())
        }

        Command::Info { circle } => {
            let info = client.circle_info(&circle).await?;
            let description = client.describe_circle(&circle).await?;
            println!("{}", description);
            println!("Status:        {}", info.status);
            println!("Members:       {}/{}", info.member_count, info.max_members);
            println!("Current turn:  {}", info.current_turn);
            println!("Pot:           {}", info.pot);
            println!("Contribution:  {}", info.contribution_amount);
            println!("Collateral:    {}", info.collateral_requirement);
            println!(
                "Round window:  {} s (+{} s grace)",
                info.contribution_period_secs, info.grace_period_secs
            );
            println!("Penalty:       {}%", info.penalty_rate_percent);
            if let Some(deadline) = info.round_deadline {
                println!("Deadline:      {}", deadline);
            }
            Ok(())
        }

        Command::Member { circle, address } => {
            match client.member_info(&circle, &address).await? {
                None => println!("{} is not a member", address),
                Some(m) => {
                    println!("Address:      {}", m.address);
                    println!("Turn:         {}", m.turn_index);
                    println!("Collateral:   {}", m.collateral_deposited);
                    println!("Contributed:  {}", m.has_contributed_this_round);
                    println!("Defaulted:    {}", m.is_defaulted);
                    println!("Reputation:   {}", m.reputation_score);
                    println!("Joined at:    {}", m.joined_at);
                }
            }
            Ok(())
        }

        Command::Members { circle } => {
            for (i, address) in client.member_addresses(&circle).await?.iter().enumerate() {
                println!("{:>3}  {}", i + 1, address);
            }
            Ok(())
        }

        Command::Events { circle, from, limit } => {
            for e in client.events(&circle, from, limit).await? {
                let detail = [
                    e.address.as_deref().map(|a| a.to_string()),
                    e.turn.map(|t| format!("turn {t}")),
                    e.amount.as_deref().map(|a| format!("amount {a}")),
                ]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(", ");
                println!("#{:<4} {:<22} {}  [{}]", e.seq, e.kind, detail, e.emitted_at);
            }
            Ok(())
        }

        Command::List => {
            for id in client.list_circles().await? {
                println!("{}", id);
            }
            Ok(())
        }

        Command::Mint { to, amount } => {
            client.mint(&to, &amount).await?;
            println!("Minted {} to {}", amount, to);
            Ok(())
        }

        Command::Approve { owner, circle, amount } => {
            client.approve(&owner, &circle, &amount).await?;
            println!("Approved {} for circle custody", amount);
            Ok(())
        }

        Command::Balance { address } => {
            let balance = client.balance_of(&address).await?;
            println!("Account:  {}", address);
            println!("Balance:  {}", balance);
            Ok(())
        }
    }
}
