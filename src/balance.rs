use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::info;

use crate::config::Network;
use crate::error::LauncherResult;
use crate::rpc::RpcRotator;

/// Wallet SOL balance, read through the endpoint fallback list.
pub struct BalanceService {
    rpcs: Arc<RpcRotator>,
    network: Network,
}

impl BalanceService {
    pub fn new(rpcs: Arc<RpcRotator>, network: Network) -> Self {
        Self { rpcs, network }
    }

    pub fn explorer_link(&self, signature: &str) -> String {
        self.network.explorer_tx_link(signature)
    }

    pub async fn get_balance(&self, owner: &Pubkey) -> LauncherResult<u64> {
        let owner = *owner;
        let lamports = self
            .rpcs
            .first_ok("get_balance", |c| async move { c.get_balance(&owner).await })
            .await?;
        info!(
            "balance of {}: {} SOL via {}",
            owner,
            lamports_to_sol(lamports),
            self.rpcs.current_url()
        );
        Ok(lamports)
    }
}
