//! Pool Resolver CLI
//!
//! Run with: cargo run -- resolve --pair WETH,USDC,500 --pair WBTC,WETH,3000
//!
//! Prints the live Uniswap V3 state of every requested pair that exists,
//! fetched with two Multicall3 reads.

use alloy_primitives::U256;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pool_resolver::cartographer::{Create2Derivation, PoolSummary};
use pool_resolver::tokens::parse_token;
use pool_resolver::{
    AddressCache, ApprovalResolver, BatchStateFetcher, Config, FeeAmount, Multicall3Fetcher,
    PairCanonicalizer, PoolResolver, Token, TokenAmount,
};

#[derive(Parser)]
#[command(name = "pool-resolver", version, about = "Resolve Uniswap V3 pools with batched reads")]
struct Cli {
    /// TOML config file (defaults to environment variables / .env)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve pools for token pairs
    Resolve {
        /// TOKEN_A,TOKEN_B,FEE - tokens by symbol or address, fee in hundredths of a bip
        #[arg(long = "pair", required = true)]
        pairs: Vec<String>,

        /// Print pools as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Ask the swap router which approval flow each token needs
    Approval {
        #[arg(long)]
        token_in: String,
        /// Raw amount (already scaled by decimals)
        #[arg(long)]
        amount_in: String,
        #[arg(long)]
        token_out: String,
        /// Raw amount (already scaled by decimals)
        #[arg(long)]
        amount_out: String,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🗺  POOL RESOLVER - Uniswap V3 state in two batched reads").cyan().bold()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn parse_pair(arg: &str, chain_id: u64) -> Result<(Token, Token, FeeAmount)> {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    let [a, b, fee] = parts.as_slice() else {
        return Err(eyre!("Pair '{}' should look like TOKEN_A,TOKEN_B,FEE", arg));
    };

    let token_a = parse_token(a, chain_id)?;
    let token_b = parse_token(b, chain_id)?;
    if token_a == token_b {
        return Err(eyre!("Pair '{}' uses the same token twice", arg));
    }

    let fee: u32 = fee
        .parse()
        .wrap_err_with(|| format!("Invalid fee in pair '{}'", arg))?;

    Ok((token_a, token_b, FeeAmount::try_from(fee)?))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_resolve(
    config: &Config,
    fetcher: Arc<dyn BatchStateFetcher>,
    pair_args: &[String],
    json: bool,
) -> Result<()> {
    let pairs = pair_args
        .iter()
        .map(|p| parse_pair(p, config.chain_id))
        .collect::<Result<Vec<_>>>()?;

    let cache = Arc::new(AddressCache::new(config.cache_ttl()));
    let canonicalizer = PairCanonicalizer::new(
        config.v3_factory()?,
        cache,
        Arc::new(Create2Derivation::default()),
    );
    let resolver = PoolResolver::new(canonicalizer, fetcher);

    let pb = spinner(&format!("Fetching slot0 + liquidity for {} pairs...", pairs.len()));
    let accessor = resolver.resolve(&pairs).await;
    pb.finish_and_clear();
    let accessor = accessor?;

    if json {
        let summaries: Vec<PoolSummary> = accessor
            .iter()
            .map(|(address, pool)| pool.summary(*address))
            .collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "═══ {} of {} pairs resolved at block {} ═══",
            accessor.len(),
            pairs.len(),
            accessor.block_number()
        ))
        .blue()
        .bold()
    );

    for (token_a, token_b, fee) in &pairs {
        match accessor.get_pool(token_a, token_b, *fee) {
            Some(pool) => println!(
                "  {} {:<22} tick {:>8}  liquidity {:>30}  price {:.8}",
                style("✓").green(),
                pool.to_string(),
                pool.tick,
                pool.liquidity,
                pool.token0_price()
            ),
            None => println!(
                "  {} {}/{}/{} - no pool or empty pool",
                style("✗").red(),
                token_a,
                token_b,
                fee
            ),
        }
    }

    Ok(())
}

async fn run_approval(
    config: &Config,
    fetcher: Arc<dyn BatchStateFetcher>,
    token_in: &str,
    amount_in: &str,
    token_out: &str,
    amount_out: &str,
) -> Result<()> {
    let token_in = TokenAmount::new(
        parse_token(token_in, config.chain_id)?,
        U256::from_str(amount_in).wrap_err("Invalid --amount-in")?,
    );
    let token_out = TokenAmount::new(
        parse_token(token_out, config.chain_id)?,
        U256::from_str(amount_out).wrap_err("Invalid --amount-out")?,
    );

    let approvals = ApprovalResolver::new(fetcher, config.swap_router()?)
        .get_approval_type(&token_in, &token_out)
        .await?;

    println!(
        "  {} in:  {}",
        style(&token_in.token).bold(),
        approvals.approval_token_in
    );
    println!(
        "  {} out: {}",
        style(&token_out.token).bold(),
        approvals.approval_token_out
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pool_resolver=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file or --config");
        return Err(e);
    }

    let json = matches!(cli.command, Command::Resolve { json: true, .. });
    if !json {
        print_banner();
        config.print_summary();
        println!();
    }

    let fetcher: Arc<dyn BatchStateFetcher> = Arc::new(Multicall3Fetcher::with_settings(
        config.rpc_url.clone(),
        config.multicall()?,
        config.max_calls_per_batch,
    ));

    match &cli.command {
        Command::Resolve { pairs, json } => run_resolve(&config, fetcher, pairs, *json).await?,
        Command::Approval {
            token_in,
            amount_in,
            token_out,
            amount_out,
        } => run_approval(&config, fetcher, token_in, amount_in, token_out, amount_out).await?,
    }

    info!("Done");
    Ok(())
}
