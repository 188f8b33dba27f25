// src/main.rs
mod accounts;
mod balance;
mod config;
mod error;
mod fees;
mod liquidity;
mod logging;
mod metadata;
mod progress;
mod rpc;
mod token;
mod tx;
mod uploader;
mod wallet;

use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use balance::BalanceService;
use config::{Config, Network};
use fees::FeeEstimate;
use liquidity::LiquidityService;
use rpc::RpcRotator;
use token::{AuthorityKind, AuthorityOptions, MetadataUpdate, TokenDetails, TokenService};
use uploader::PinataUploader;

fn token_args(cmd: Command) -> Command {
    cmd.arg(Arg::new("name").long("name").required(true).help("Token name (max 32 bytes)"))
        .arg(Arg::new("symbol").long("symbol").required(true).help("Ticker (max 10 bytes)"))
        .arg(Arg::new("description").long("description").default_value(""))
        .arg(
            Arg::new("decimals")
                .long("decimals")
                .value_parser(value_parser!(u8))
                .help("0-9, defaults to token.default_decimals"),
        )
        .arg(
            Arg::new("supply")
                .long("supply")
                .value_parser(value_parser!(u64))
                .help("Whole tokens minted to the wallet"),
        )
        .arg(Arg::new("website").long("website"))
        .arg(Arg::new("twitter").long("twitter"))
        .arg(Arg::new("telegram").long("telegram"))
        .arg(Arg::new("discord").long("discord"))
        .arg(Arg::new("image").long("image").help("Image file pinned to IPFS"))
        .arg(Arg::new("uri").long("uri").help("Existing metadata URI, skips the upload"))
        .arg(Arg::new("revoke-mint").long("revoke-mint").action(ArgAction::SetTrue))
        .arg(Arg::new("revoke-freeze").long("revoke-freeze").action(ArgAction::SetTrue))
        .arg(Arg::new("immutable").long("immutable").action(ArgAction::SetTrue))
}

fn cli() -> Command {
    let mint_arg = || Arg::new("mint").long("mint").required(true).help("Token mint address");
    Command::new("token-launcher")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Create SPL tokens and Raydium CPMM pools")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(Arg::new("config").long("config").global(true).default_value("config.json"))
        .arg(Arg::new("network").long("network").global(true).help("mainnet or devnet"))
        .arg(Arg::new("keypair").long("keypair").global(true).help("Wallet keypair file"))
        .arg(Arg::new("rpc").long("rpc").global(true).help("Endpoint tried first"))
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Simulate transactions instead of sending them"),
        )
        .subcommand(
            Command::new("balance")
                .about("Show the SOL balance of the wallet or an address")
                .arg(Arg::new("address").long("address")),
        )
        .subcommand(token_args(Command::new("estimate-fees").about("Estimate the cost of creating a token")))
        .subcommand(token_args(Command::new("create-token").about("Create a token with metadata")))
        .subcommand(
            Command::new("mint-to")
                .about("Mint more tokens")
                .arg(mint_arg())
                .arg(Arg::new("amount").long("amount").required(true).help("UI amount, e.g. 1000.5"))
                .arg(Arg::new("to").long("to").help("Recipient wallet, defaults to the signer")),
        )
        .subcommand(
            Command::new("revoke")
                .about("Revoke the mint, freeze or update authority")
                .arg(mint_arg())
                .arg(
                    Arg::new("authority")
                        .long("authority")
                        .required(true)
                        .value_parser(["mint", "freeze", "update"]),
                ),
        )
        .subcommand(
            Command::new("update-metadata")
                .about("Change name, symbol or URI")
                .arg(mint_arg())
                .arg(Arg::new("name").long("name"))
                .arg(Arg::new("symbol").long("symbol"))
                .arg(Arg::new("uri").long("uri")),
        )
        .subcommand(Command::new("token-info").about("Show mint and metadata").arg(mint_arg()))
        .subcommand(token_args(
            Command::new("upload").about("Pin the image and metadata document to IPFS"),
        ))
        .subcommand(
            Command::new("create-pool")
                .about("Create a token/SOL pool on Raydium CPMM")
                .arg(mint_arg())
                .arg(Arg::new("tokens").long("tokens").required(true))
                .arg(Arg::new("sol").long("sol").required(true)),
        )
        .subcommand(
            Command::new("add-liquidity")
                .about("Deposit into an existing pool")
                .arg(Arg::new("pool").long("pool").required(true))
                .arg(Arg::new("tokens").long("tokens").required(true))
                .arg(Arg::new("sol").long("sol").required(true))
                .arg(
                    Arg::new("slippage-bps")
                        .long("slippage-bps")
                        .value_parser(value_parser!(u16))
                        .default_value("100"),
                ),
        )
        .subcommand(
            Command::new("pool-info")
                .about("Show pool reserves and price")
                .arg(Arg::new("pool").long("pool").required_unless_present("mint"))
                .arg(Arg::new("mint").long("mint").help("Derive the pool of this token")),
        )
}

fn opt(m: &ArgMatches, name: &str) -> Option<String> {
    m.get_one::<String>(name).map(|s| s.trim().to_string())
}

fn req(m: &ArgMatches, name: &str) -> Result<String> {
    opt(m, name).ok_or_else(|| anyhow!("--{} is required", name))
}

fn pubkey_arg(m: &ArgMatches, name: &str) -> Result<Pubkey> {
    let raw = req(m, name)?;
    Pubkey::from_str(&raw).with_context(|| format!("--{} is not a valid address: {}", name, raw))
}

fn apply_overrides(cfg: &mut Config, m: &ArgMatches) -> Result<()> {
    if let Some(n) = opt(m, "network") {
        cfg.network = n.parse::<Network>()?;
    }
    if let Some(path) = opt(m, "keypair") {
        cfg.wallet_keypair_path = Some(path);
    }
    if let Some(url) = opt(m, "rpc") {
        cfg.priority_rpc = Some(url);
    }
    if m.get_flag("dry-run") {
        cfg.dry_run = true;
    }
    Ok(())
}

fn token_details(m: &ArgMatches, cfg: &Config) -> Result<TokenDetails> {
    Ok(TokenDetails {
        name: req(m, "name")?,
        symbol: req(m, "symbol")?,
        description: opt(m, "description").unwrap_or_default(),
        decimals: m.get_one::<u8>("decimals").copied().unwrap_or(cfg.token.default_decimals),
        total_supply: m.get_one::<u64>("supply").copied().unwrap_or(cfg.token.default_supply),
        website: opt(m, "website").unwrap_or_default(),
        twitter: opt(m, "twitter").unwrap_or_default(),
        telegram: opt(m, "telegram").unwrap_or_default(),
        discord: opt(m, "discord").unwrap_or_default(),
        image: opt(m, "image"),
        uri: opt(m, "uri"),
    })
}

fn authority_options(m: &ArgMatches) -> AuthorityOptions {
    AuthorityOptions {
        revoke_mint: m.get_flag("revoke-mint"),
        revoke_freeze: m.get_flag("revoke-freeze"),
        immutable_metadata: m.get_flag("immutable"),
    }
}

fn load_wallet(cfg: &Config) -> Result<Keypair> {
    let kp = wallet::load_keypair(cfg.wallet_path())?;
    println!("{} {}", "Wallet:".bold(), kp.pubkey());
    Ok(kp)
}

fn print_fees(title: &str, est: &FeeEstimate) {
    println!("{}", title.bold());
    println!("{}", est);
}

/// Pins the image and document when no URI was given and Pinata is configured.
async fn ensure_metadata_uri(cfg: &Config, details: &mut TokenDetails, creator: &Pubkey) -> Result<()> {
    if details.uri.is_some() {
        return Ok(());
    }
    if cfg.pinata.jwt.is_empty() {
        warn!("no --uri and no Pinata JWT; metadata URI left empty");
        return Ok(());
    }
    let uploader = PinataUploader::from_config(&cfg.pinata)?;
    let doc = details.offchain_document(creator);
    let url = match details.image.as_deref() {
        Some(image) => {
            let assets = uploader.upload_token_assets(Path::new(image), doc).await?;
            println!("{} {}", "[IMAGE]".cyan(), assets.image_url);
            assets.metadata_url
        }
        None => uploader.upload_metadata(&doc).await?,
    };
    println!("{} {}", "[METADATA]".cyan(), url);
    details.uri = Some(url);
    Ok(())
}

async fn run(m: &ArgMatches, cfg: Config, rpcs: Arc<RpcRotator>) -> Result<()> {
    let (cmd, sub) = m
        .subcommand()
        .ok_or_else(|| anyhow!("a subcommand is required"))?;

    match cmd {
        "balance" => {
            let service = BalanceService::new(rpcs.clone(), cfg.network);
            let owner = match opt(sub, "address") {
                Some(_) => pubkey_arg(sub, "address")?,
                None => load_wallet(&cfg)?.pubkey(),
            };
            let lamports = service.get_balance(&owner).await?;
            println!(
                "{} {} SOL ({} lamports)",
                "[BALANCE]".green(),
                lamports_to_sol(lamports),
                lamports
            );
            println!("  {}", cfg.explorer_address_link(&owner));
        }
        "estimate-fees" => {
            let wallet = load_wallet(&cfg)?;
            let details = token_details(sub, &cfg)?;
            let service = TokenService::new(rpcs.clone(), &cfg);
            let est = service
                .estimate(&wallet.pubkey(), &details, authority_options(sub))
                .await?;
            print_fees("Token creation cost", &est);
            let balance = BalanceService::new(rpcs.clone(), cfg.network)
                .get_balance(&wallet.pubkey())
                .await?;
            if balance >= est.total() {
                println!("{} balance {} SOL covers it", "[OK]".green(), lamports_to_sol(balance));
            } else {
                println!(
                    "{} balance {} SOL is short by {} SOL",
                    "[LOW]".red(),
                    lamports_to_sol(balance),
                    lamports_to_sol(est.total() - balance)
                );
            }
        }
        "create-token" => {
            let wallet = load_wallet(&cfg)?;
            let mut details = token_details(sub, &cfg)?;
            details.validate()?;
            ensure_metadata_uri(&cfg, &mut details, &wallet.pubkey()).await?;

            let service = TokenService::new(rpcs.clone(), &cfg);
            let created = service
                .create_token(&details, &wallet, authority_options(sub))
                .await?;
            print_fees("Fees", &created.fees);
            println!("{} {} ({})", "[TOKEN CREATED]".green().bold(), details.name, details.symbol);
            println!("  mint:          {}", created.mint);
            println!("  token account: {}", created.owner_token_account);
            println!("  metadata:      {}", created.metadata);
            println!("  supply (raw):  {}", created.raw_supply);
            println!("  signature:     {}", created.signature);
            println!("  {}", created.explorer_link);
            println!("  {}", cfg.explorer_address_link(&created.mint));
        }
        "mint-to" => {
            let wallet = load_wallet(&cfg)?;
            let mint = pubkey_arg(sub, "mint")?;
            let to = match opt(sub, "to") {
                Some(_) => pubkey_arg(sub, "to")?,
                None => wallet.pubkey(),
            };
            let service = TokenService::new(rpcs.clone(), &cfg);
            let minted = service
                .mint_tokens(&mint, &to, &req(sub, "amount")?, &wallet)
                .await?;
            println!("{} {} raw units", "[MINTED]".green(), minted.raw_amount);
            println!("  to: {}", minted.recipient_token_account);
            println!("  {}", minted.explorer_link);
        }
        "revoke" => {
            let wallet = load_wallet(&cfg)?;
            let mint = pubkey_arg(sub, "mint")?;
            let kind: AuthorityKind = req(sub, "authority")?.parse()?;
            let service = TokenService::new(rpcs.clone(), &cfg);
            let sig = service.revoke_authority(&mint, kind, &wallet).await?;
            println!("{} {} authority of {}", "[REVOKED]".green(), kind, mint);
            println!("  {}", cfg.explorer_tx_link(&sig.to_string()));
        }
        "update-metadata" => {
            let wallet = load_wallet(&cfg)?;
            let mint = pubkey_arg(sub, "mint")?;
            let updates = MetadataUpdate {
                name: opt(sub, "name"),
                symbol: opt(sub, "symbol"),
                uri: opt(sub, "uri"),
            };
            let service = TokenService::new(rpcs.clone(), &cfg);
            let sig = service.update_metadata(&mint, &updates, &wallet).await?;
            println!("{} {}", "[METADATA UPDATED]".green(), mint);
            println!("  {}", cfg.explorer_tx_link(&sig.to_string()));
        }
        "token-info" => {
            let mint = pubkey_arg(sub, "mint")?;
            let info = TokenService::new(rpcs.clone(), &cfg).token_info(&mint).await?;
            let show = |k: Option<Pubkey>| k.map(|k| k.to_string()).unwrap_or_else(|| "revoked".yellow().to_string());
            println!("{} {}", "[TOKEN]".green(), info.mint);
            println!("  supply (raw):     {}", info.supply);
            println!("  decimals:         {}", info.decimals);
            println!("  mint authority:   {}", show(info.mint_authority));
            println!("  freeze authority: {}", show(info.freeze_authority));
            match info.metadata {
                Some(md) => {
                    println!("  metadata:         {}", md.address);
                    println!("  name:             {}", md.name);
                    println!("  symbol:           {}", md.symbol);
                    println!("  uri:              {}", md.uri);
                    println!("  update authority: {}", md.update_authority);
                    println!("  mutable:          {}", md.is_mutable);
                }
                None => println!("  {}", "no metadata account".yellow()),
            }
        }
        "upload" => {
            let wallet = load_wallet(&cfg)?;
            let mut details = token_details(sub, &cfg)?;
            if details.image.is_none() {
                return Err(anyhow!("--image is required for upload"));
            }
            details.uri = None;
            if cfg.pinata.jwt.is_empty() {
                return Err(anyhow!("PINATA_JWT is not set"));
            }
            ensure_metadata_uri(&cfg, &mut details, &wallet.pubkey()).await?;
        }
        "create-pool" => {
            let wallet = load_wallet(&cfg)?;
            let mint = pubkey_arg(sub, "mint")?;
            let service = LiquidityService::new(rpcs.clone(), &cfg)?;
            let created = service
                .create_pool(&mint, &req(sub, "tokens")?, &req(sub, "sol")?, &wallet)
                .await?;
            print_fees("Pool cost", &created.fees);
            println!("{} {}", "[POOL CREATED]".green().bold(), created.pool);
            println!("  lp mint:  {}", created.lp_mint);
            println!("  tokens:   {} raw", created.token_amount);
            println!("  sol:      {}", lamports_to_sol(created.sol_amount));
            println!("  {}", created.explorer_link);
        }
        "add-liquidity" => {
            let wallet = load_wallet(&cfg)?;
            let pool = pubkey_arg(sub, "pool")?;
            let slippage = sub.get_one::<u16>("slippage-bps").copied().unwrap_or(100);
            let service = LiquidityService::new(rpcs.clone(), &cfg)?;
            let dep = service
                .add_liquidity(&pool, &req(sub, "tokens")?, &req(sub, "sol")?, slippage, &wallet)
                .await?;
            println!("{} {} LP tokens into {}", "[DEPOSITED]".green(), dep.lp_amount, dep.pool);
            println!("  max token_0: {}", dep.max_token_0);
            println!("  max token_1: {}", dep.max_token_1);
            println!("  {}", dep.explorer_link);
        }
        "pool-info" => {
            let service = LiquidityService::new(rpcs.clone(), &cfg)?;
            let pool = match opt(sub, "pool") {
                Some(_) => pubkey_arg(sub, "pool")?,
                None => service.pdas_for(&pubkey_arg(sub, "mint")?).pool,
            };
            let info = service.pool_info(&pool).await?;
            println!("{} {}", "[POOL]".green(), info.pool);
            println!("  token_0:   {} reserve {}", info.state.token_0_mint, info.reserve_0);
            println!("  token_1:   {} reserve {}", info.state.token_1_mint, info.reserve_1);
            println!("  lp mint:   {} supply {}", info.state.lp_mint, info.state.lp_supply);
            match info.price_in_sol {
                Some(p) => println!("  price:     {:.12} SOL", p),
                None => println!("  price:     {}", "n/a".yellow()),
            }
        }
        other => return Err(anyhow!("unknown command {}", other)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let log_path = logging::init()?;

    let mut cfg = Config::load(&req(&matches, "config")?)?;
    apply_overrides(&mut cfg, &matches)?;

    let mode = if cfg.dry_run { "DRY-RUN".yellow() } else { "LIVE".red() };
    println!("token-launcher - {} - {}", cfg.network, mode);
    info!("logs: {}", log_path.display());

    let rpcs = Arc::new(RpcRotator::new(
        cfg.endpoints(),
        cfg.rpc_config.timeout_ms,
        cfg.rpc_config.commitment_config()?,
    ));
    rpcs.require()?;
    println!("Using JSON-RPC: {}", rpcs.current_url());

    if let Err(e) = run(&matches, cfg, rpcs).await {
        eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
        std::process::exit(1);
    }
    Ok(())
}
