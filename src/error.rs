use solana_client::client_error::ClientError;
use solana_sdk::program_error::ProgramError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::SignerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("All {attempts} RPC endpoints failed for {op}, last error: {last_error}")]
    AllEndpointsFailed {
        op: String,
        attempts: usize,
        last_error: String,
    },

    #[error("Insufficient SOL balance: have {balance_lamports} lamports, need at least {required_lamports}")]
    InsufficientBalance {
        balance_lamports: u64,
        required_lamports: u64,
    },

    #[error("Account {0} not found")]
    AccountNotFound(Pubkey),

    #[error("Invalid account {address}: {reason}")]
    InvalidAccount { address: Pubkey, reason: String },

    #[error("Upload failed with HTTP {status}: {body}")]
    Upload { status: u16, body: String },

    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed { signature: Signature, reason: String },

    #[error("Transaction {0} was not confirmed in time; check the explorer before retrying")]
    Unconfirmed(Signature),

    #[error("Simulation failed: {0}")]
    Simulation(String),

    #[error("RPC error: {0}")]
    Rpc(#[from] ClientError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Program error: {0}")]
    Program(#[from] ProgramError),

    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),
}

impl LauncherError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        LauncherError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

pub type LauncherResult<T> = Result<T, LauncherError>;
