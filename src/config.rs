// src/config.rs
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::native_token::sol_to_lamports;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::{fmt, fs, path::Path};
use tracing::{debug, info};

use crate::accounts::{
    CpmmAddresses, DEVNET_CPMM, DEVNET_FALLBACK_RPCS, MAINNET_CPMM, MAINNET_FALLBACK_RPCS,
};
use crate::error::{LauncherError, LauncherResult};

const EXPLORER_BASE: &str = "https://explorer.solana.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[serde(alias = "mainnet-beta")]
    Mainnet,
    #[default]
    Devnet,
}

impl FromStr for Network {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(Network::Mainnet),
            "devnet" => Ok(Network::Devnet),
            other => Err(LauncherError::Config(format!("unknown network: {}", other))),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Devnet => write!(f, "devnet"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub wallet_keypair_path: Option<String>,

    // RPC
    /// Tried before `rpcs` and the static fallbacks (Helius in practice).
    #[serde(default)]
    pub priority_rpc: Option<String>,
    #[serde(default)]
    pub rpcs: Vec<String>,
    #[serde(default)]
    pub rpc_config: RpcConfig,

    #[serde(default)]
    pub fees: Fees,
    #[serde(default)]
    pub token: TokenDefaults,
    #[serde(default)]
    pub pinata: PinataConfig,
    #[serde(default)]
    pub raydium: RaydiumConfig,

    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            commitment: default_commitment(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RpcConfig {
    pub fn commitment_config(&self) -> LauncherResult<CommitmentConfig> {
        CommitmentConfig::from_str(&self.commitment)
            .map_err(|_| LauncherError::Config(format!("invalid commitment: {}", self.commitment)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fees {
    #[serde(default = "default_lamports_per_signature")]
    pub lamports_per_signature: u64,
    #[serde(default)]
    pub priority_fee_micro_lamports: u64,
    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,
    /// Used when fee estimation against the node fails.
    #[serde(default)]
    pub fallback_fee_sol: Option<f64>,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            lamports_per_signature: default_lamports_per_signature(),
            priority_fee_micro_lamports: 0,
            compute_unit_limit: default_compute_unit_limit(),
            fallback_fee_sol: None,
        }
    }
}

impl Fees {
    pub fn priority_fee_lamports(&self) -> u64 {
        let micro = self.priority_fee_micro_lamports as u128 * self.compute_unit_limit as u128;
        (micro.div_ceil(1_000_000)).min(u64::MAX as u128) as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDefaults {
    #[serde(default = "default_decimals")]
    pub default_decimals: u8,
    #[serde(default = "default_supply")]
    pub default_supply: u64,
}

impl Default for TokenDefaults {
    fn default() -> Self {
        Self {
            default_decimals: default_decimals(),
            default_supply: default_supply(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinataConfig {
    #[serde(default)]
    pub jwt: String,
    #[serde(default = "default_pinata_gateway")]
    pub gateway: String,
    #[serde(default = "default_pinata_api")]
    pub api_url: String,
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            jwt: String::new(),
            gateway: default_pinata_gateway(),
            api_url: default_pinata_api(),
        }
    }
}

/// Overrides for the Raydium CPMM deployment; unset fields use the network's.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RaydiumConfig {
    #[serde(default)]
    pub cpmm_program: Option<String>,
    #[serde(default)]
    pub amm_config: Option<String>,
    #[serde(default)]
    pub create_pool_fee: Option<String>,
    #[serde(default)]
    pub pool_creation_fee_lamports: Option<u64>,
}

fn default_commitment() -> String { "confirmed".to_string() }
fn default_timeout_ms() -> u64 { 30_000 }
fn default_lamports_per_signature() -> u64 { 5_000 }
fn default_compute_unit_limit() -> u32 { 400_000 }
fn default_decimals() -> u8 { 9 }
fn default_supply() -> u64 { 1_000_000 }
fn default_pinata_gateway() -> String { "gateway.pinata.cloud".to_string() }
fn default_pinata_api() -> String { "https://api.pinata.cloud".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            network: Network::default(),
            wallet_keypair_path: None,
            priority_rpc: None,
            rpcs: Vec::new(),
            rpc_config: RpcConfig::default(),
            fees: Fees::default(),
            token: TokenDefaults::default(),
            pinata: PinataConfig::default(),
            raydium: RaydiumConfig::default(),
            dry_run: false,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Serialises tests that read or write the process environment.
#[cfg(test)]
pub static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

#[cfg(test)]
pub const ENV_KEYS: &[&str] = &[
    "SOLANA_NETWORK",
    "HELIUS_RPC_URL",
    "SOLANA_RPC_URL",
    "WALLET_FILE_PATH",
    "PINATA_JWT",
    "PINATA_GATEWAY",
    "DRY_RUN",
];

#[cfg(test)]
pub fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

fn parse_pubkey(field: &'static str, value: &str) -> LauncherResult<Pubkey> {
    Pubkey::from_str(value.trim())
        .map_err(|e| LauncherError::Config(format!("{} is not a valid address: {}", field, e)))
}

impl Config {
    /// Reads `path` if it exists, then applies environment overrides.
    pub fn load(path: &str) -> LauncherResult<Self> {
        dotenv::dotenv().ok();

        let mut cfg = if Path::new(path).exists() {
            Self::load_from_file(path)?
        } else {
            debug!("config file {} not found, using defaults", path);
            Self::default()
        };
        cfg.apply_env()?;
        info!("network={} endpoints={}", cfg.network, cfg.endpoints().len());
        Ok(cfg)
    }

    pub fn load_from_file(path: &str) -> LauncherResult<Self> {
        let txt = fs::read_to_string(Path::new(path))?;
        let cfg: Self = serde_json::from_str(&txt)?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> LauncherResult<()> {
        if let Some(n) = env_var("SOLANA_NETWORK") {
            self.network = n.parse()?;
        }
        if let Some(url) = env_var("HELIUS_RPC_URL") {
            self.priority_rpc = Some(url);
        }
        if let Some(url) = env_var("SOLANA_RPC_URL") {
            self.rpcs.push(url);
        }
        if let Some(path) = env_var("WALLET_FILE_PATH") {
            self.wallet_keypair_path = Some(path);
        }
        if let Some(jwt) = env_var("PINATA_JWT") {
            self.pinata.jwt = jwt;
        }
        if let Some(gw) = env_var("PINATA_GATEWAY") {
            self.pinata.gateway = gw;
        }
        if let Some(v) = env_var("DRY_RUN") {
            self.dry_run = v.eq_ignore_ascii_case("true") || v == "1";
        }
        Ok(())
    }

    pub fn wallet_path(&self) -> &str {
        self.wallet_keypair_path.as_deref().unwrap_or("wallet.json")
    }

    /// Priority endpoint, configured endpoints, then the network's public ones.
    /// Blank entries are skipped and each URL keeps its first position.
    pub fn endpoints(&self) -> Vec<String> {
        let fallbacks = match self.network {
            Network::Mainnet => MAINNET_FALLBACK_RPCS,
            Network::Devnet => DEVNET_FALLBACK_RPCS,
        };

        let mut out: Vec<String> = Vec::new();
        let candidates = self
            .priority_rpc
            .iter()
            .map(String::as_str)
            .chain(self.rpcs.iter().map(String::as_str))
            .chain(fallbacks.iter().copied());
        for url in candidates {
            let url = url.trim();
            if url.is_empty() || out.iter().any(|u| u == url) {
                continue;
            }
            out.push(url.to_string());
        }
        out
    }

    pub fn fallback_fee_lamports(&self) -> u64 {
        let sol = self.fees.fallback_fee_sol.unwrap_or(match self.network {
            Network::Mainnet => 0.005,
            Network::Devnet => 0.001,
        });
        sol_to_lamports(sol)
    }

    pub fn cpmm(&self) -> LauncherResult<CpmmAddresses> {
        let base = match self.network {
            Network::Mainnet => MAINNET_CPMM,
            Network::Devnet => DEVNET_CPMM,
        };
        let r = &self.raydium;
        Ok(CpmmAddresses {
            program: match &r.cpmm_program {
                Some(s) => parse_pubkey("raydium.cpmm_program", s)?,
                None => base.program,
            },
            amm_config: match &r.amm_config {
                Some(s) => parse_pubkey("raydium.amm_config", s)?,
                None => base.amm_config,
            },
            create_pool_fee: match &r.create_pool_fee {
                Some(s) => parse_pubkey("raydium.create_pool_fee", s)?,
                None => base.create_pool_fee,
            },
            pool_creation_fee_lamports: r
                .pool_creation_fee_lamports
                .unwrap_or(base.pool_creation_fee_lamports),
        })
    }

    pub fn explorer_tx_link(&self, signature: &str) -> String {
        self.network.explorer_tx_link(signature)
    }

    pub fn explorer_address_link(&self, address: &Pubkey) -> String {
        self.network.explorer_address_link(address)
    }
}

impl Network {
    fn cluster_suffix(&self) -> &'static str {
        match self {
            Network::Mainnet => "",
            Network::Devnet => "?cluster=devnet",
        }
    }

    pub fn explorer_tx_link(&self, signature: &str) -> String {
        format!("{}/tx/{}{}", EXPLORER_BASE, signature, self.cluster_suffix())
    }

    pub fn explorer_address_link(&self, address: &Pubkey) -> String {
        format!("{}/address/{}{}", EXPLORER_BASE, address, self.cluster_suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_priority_order_and_dedupe() {
        let cfg = Config {
            network: Network::Mainnet,
            priority_rpc: Some("https://helius.example/rpc".to_string()),
            rpcs: vec![
                " ".to_string(),
                "https://api.mainnet-beta.solana.com".to_string(),
                "https://custom.example".to_string(),
            ],
            ..Config::default()
        };

        assert_eq!(
            cfg.endpoints(),
            vec![
                "https://helius.example/rpc",
                "https://api.mainnet-beta.solana.com",
                "https://custom.example",
                "https://solana-mainnet.g.alchemy.com/v2/demo",
                "https://solana-api.projectserum.com",
            ]
        );
    }

    #[test]
    fn devnet_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.endpoints(), vec!["https://api.devnet.solana.com"]);
        assert_eq!(cfg.fallback_fee_lamports(), 1_000_000);
        assert_eq!(
            cfg.explorer_tx_link("abc"),
            "https://explorer.solana.com/tx/abc?cluster=devnet"
        );
    }

    #[test]
    fn mainnet_fallback_fee_and_links() {
        let cfg = Config {
            network: Network::Mainnet,
            ..Config::default()
        };
        assert_eq!(cfg.fallback_fee_lamports(), 5_000_000);
        assert_eq!(cfg.explorer_tx_link("sig"), "https://explorer.solana.com/tx/sig");
        assert_eq!(cfg.cpmm().unwrap(), MAINNET_CPMM);
    }

    #[test]
    fn parses_partial_file_with_defaults() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "network": "mainnet-beta",
                "rpcs": ["https://a.example"],
                "fees": { "priority_fee_micro_lamports": 10000 },
                "raydium": { "pool_creation_fee_lamports": 1 }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.network, Network::Mainnet);
        assert_eq!(cfg.rpc_config.commitment, "confirmed");
        assert_eq!(cfg.fees.compute_unit_limit, 400_000);
        assert_eq!(cfg.fees.priority_fee_lamports(), 4_000);
        assert_eq!(cfg.token.default_decimals, 9);
        assert_eq!(cfg.pinata.gateway, "gateway.pinata.cloud");
        assert_eq!(cfg.cpmm().unwrap().pool_creation_fee_lamports, 1);
        assert_eq!(cfg.cpmm().unwrap().program, MAINNET_CPMM.program);
    }

    #[test]
    fn rejects_bad_overrides() {
        let cfg = Config {
            raydium: RaydiumConfig {
                amm_config: Some("not-a-key".to_string()),
                ..RaydiumConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(cfg.cpmm(), Err(LauncherError::Config(_))));
        assert!("testnet".parse::<Network>().is_err());
        assert_eq!("Mainnet-Beta".parse::<Network>().unwrap(), Network::Mainnet);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let _env = ENV_LOCK.lock();
        let cfg = Config::load("/nonexistent/token-launcher/config.json").unwrap();
        assert!(!cfg.endpoints().is_empty());
    }

    fn file_config() -> Config {
        serde_json::from_str(
            r#"{
                "network": "devnet",
                "priority_rpc": "https://file-priority.example",
                "rpcs": ["https://file.example"],
                "dry_run": false
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn environment_overrides_file_values() {
        let _env = ENV_LOCK.lock();
        clear_env();
        std::env::set_var("SOLANA_NETWORK", "mainnet");
        std::env::set_var("HELIUS_RPC_URL", "https://helius.example/?api-key=k");
        std::env::set_var("SOLANA_RPC_URL", " https://env.example ");
        std::env::set_var("WALLET_FILE_PATH", "/keys/launcher.json");
        std::env::set_var("DRY_RUN", "TRUE");

        let mut cfg = file_config();
        cfg.apply_env().unwrap();
        clear_env();

        assert_eq!(cfg.network, Network::Mainnet);
        assert!(cfg.dry_run);
        assert_eq!(cfg.wallet_path(), "/keys/launcher.json");
        assert_eq!(
            cfg.endpoints(),
            vec![
                "https://helius.example/?api-key=k",
                "https://file.example",
                "https://env.example",
                "https://api.mainnet-beta.solana.com",
                "https://solana-mainnet.g.alchemy.com/v2/demo",
                "https://solana-api.projectserum.com",
            ]
        );
    }

    #[test]
    fn dry_run_and_blank_variables() {
        let _env = ENV_LOCK.lock();
        clear_env();

        for (value, expected) in [("1", true), ("true", true), ("0", false), ("no", false)] {
            std::env::set_var("DRY_RUN", value);
            let mut cfg = file_config();
            cfg.dry_run = !expected;
            cfg.apply_env().unwrap();
            assert_eq!(cfg.dry_run, expected, "DRY_RUN={}", value);
        }

        // blank values leave the file untouched
        std::env::set_var("DRY_RUN", " ");
        std::env::set_var("HELIUS_RPC_URL", "");
        let mut cfg = file_config();
        cfg.apply_env().unwrap();
        assert!(!cfg.dry_run);
        assert_eq!(cfg.endpoints()[0], "https://file-priority.example");

        std::env::set_var("SOLANA_NETWORK", "testnet");
        assert!(file_config().apply_env().is_err());
        clear_env();
    }
}
