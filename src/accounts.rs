// src/accounts.rs
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

/// Wrapped SOL, the base side of every pool.
pub const WSOL_MINT: Pubkey = spl_token::native_mint::ID;

/// Largest serialized Metaplex metadata account (no creators beyond the
/// fixed slots, no collection details).
pub const MAX_METADATA_LEN: usize = 679;

pub const MAINNET_FALLBACK_RPCS: &[&str] = &[
    "https://api.mainnet-beta.solana.com",
    "https://solana-mainnet.g.alchemy.com/v2/demo",
    "https://solana-api.projectserum.com",
];

pub const DEVNET_FALLBACK_RPCS: &[&str] = &["https://api.devnet.solana.com"];

/// Raydium CPMM deployment for one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpmmAddresses {
    pub program: Pubkey,
    pub amm_config: Pubkey,
    pub create_pool_fee: Pubkey,
    pub pool_creation_fee_lamports: u64,
}

pub const MAINNET_CPMM: CpmmAddresses = CpmmAddresses {
    program: pubkey!("CPMMoo8L3F4NbTegBCKVNunggL7H1ZpdTHKxQB5qKP1C"),
    amm_config: pubkey!("D4FPEruKEHrG5TenZ2mpDGEfu1iUvTiqBxvpU8HLBvC2"),
    create_pool_fee: pubkey!("DNXgeM9EiiaAbaWvwjHj9fQQLAX5ZsfHyvmYUNRAdNC8"),
    pool_creation_fee_lamports: 150_000_000,
};

pub const DEVNET_CPMM: CpmmAddresses = CpmmAddresses {
    program: pubkey!("CPMDWBwJDtYax9qW7AyRuVC19Cc4L4Vcy4n2BHAbHkCW"),
    amm_config: pubkey!("9zSzfkYy6awexsHvmggeH36pfVUdDGyCcwmjT3AQPBj6"),
    create_pool_fee: pubkey!("G11FKBRaAkHAKuLCgLM6K6NUc9rTjPAznRCjZifrTQe2"),
    pool_creation_fee_lamports: 150_000_000,
};

pub const TOKEN_2022_PROGRAM: Pubkey = pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
