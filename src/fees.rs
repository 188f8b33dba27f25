use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::MAX_METADATA_LEN;
use crate::config::Fees;
use crate::error::{LauncherError, LauncherResult};
use crate::rpc::RpcRotator;

pub const POOL_STATE_LEN: usize = 8 + 629;
pub const OBSERVATION_STATE_LEN: usize = 8 + 4067;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeItem {
    pub label: &'static str,
    pub lamports: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeEstimate {
    pub items: Vec<FeeItem>,
}

impl FeeEstimate {
    pub fn push(&mut self, label: &'static str, lamports: u64) {
        self.items.push(FeeItem { label, lamports });
    }

    pub fn total(&self) -> u64 {
        self.items.iter().fold(0u64, |acc, i| acc.saturating_add(i.lamports))
    }

    pub fn get(&self, label: &str) -> Option<u64> {
        self.items.iter().find(|i| i.label == label).map(|i| i.lamports)
    }
}

impl fmt::Display for FeeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.items {
            writeln!(f, "  {:<24} {:>14.9} SOL", item.label, lamports_to_sol(item.lamports))?;
        }
        write!(f, "  {:<24} {:>14.9} SOL", "total", lamports_to_sol(self.total()))
    }
}

/// Fails when `balance` cannot cover `required`. Equal amounts are enough.
pub fn ensure_sufficient(balance: u64, required: u64) -> LauncherResult<()> {
    if balance < required {
        return Err(LauncherError::InsufficientBalance {
            balance_lamports: balance,
            required_lamports: required,
        });
    }
    Ok(())
}

pub struct FeeEstimator {
    rpcs: Arc<RpcRotator>,
    fees: Fees,
    fallback_lamports: u64,
}

impl FeeEstimator {
    pub fn new(rpcs: Arc<RpcRotator>, fees: Fees, fallback_lamports: u64) -> Self {
        Self { rpcs, fees, fallback_lamports }
    }

    pub async fn rent(&self, len: usize) -> LauncherResult<u64> {
        self.rpcs
            .first_ok("get_minimum_balance_for_rent_exemption", |c| async move {
                c.get_minimum_balance_for_rent_exemption(len).await
            })
            .await
    }

    async fn price_message(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
    ) -> LauncherResult<u64> {
        let blockhash = self
            .rpcs
            .first_ok("get_latest_blockhash", |c| async move {
                c.get_latest_blockhash().await
            })
            .await?;
        let message = Message::new_with_blockhash(instructions, Some(payer), &blockhash);
        self.rpcs
            .first_ok("get_fee_for_message", |c| {
                let message = message.clone();
                async move { c.get_fee_for_message(&message).await }
            })
            .await
    }

    /// Pushes the network fee of `instructions` as a message paid by `payer`.
    /// A node-priced message already carries the prioritization fee; the
    /// configured priority fee is listed on its own only when pricing falls
    /// back to `lamports_per_signature * signatures`.
    async fn push_network_fees(
        &self,
        est: &mut FeeEstimate,
        payer: &Pubkey,
        instructions: &[Instruction],
        signatures: u64,
    ) {
        match self.price_message(payer, instructions).await {
            Ok(fee) => est.push("network fee", fee),
            Err(e) => {
                let fallback = self.fees.lamports_per_signature.saturating_mul(signatures);
                warn!("fee pricing failed, assuming {} lamports: {}", fallback, e);
                est.push("network fee", fallback);
                est.push("priority fee", self.fees.priority_fee_lamports());
            }
        }
    }

    pub async fn network_fee(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
        signatures: u64,
    ) -> u64 {
        let mut est = FeeEstimate::default();
        self.push_network_fees(&mut est, payer, instructions, signatures).await;
        est.total()
    }

    /// Mint, owner token account and metadata rent, plus the network fee.
    pub async fn estimate_token_creation(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
    ) -> LauncherResult<FeeEstimate> {
        let mut est = FeeEstimate::default();
        est.push("mint rent", self.rent(spl_token::state::Mint::LEN).await?);
        est.push("token account rent", self.rent(spl_token::state::Account::LEN).await?);
        est.push("metadata rent", self.rent(MAX_METADATA_LEN).await?);
        self.push_network_fees(&mut est, payer, instructions, 2).await;
        info!("token creation estimate: {} SOL", lamports_to_sol(est.total()));
        Ok(est)
    }

    /// Like [`estimate_token_creation`](Self::estimate_token_creation) but never
    /// fails; the configured fallback fee stands in when the node is unreachable.
    pub async fn estimate_or_fallback(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
    ) -> FeeEstimate {
        match self.estimate_token_creation(payer, instructions).await {
            Ok(est) => est,
            Err(e) => {
                warn!("fee estimation failed, using fallback: {}", e);
                let mut est = FeeEstimate::default();
                est.push("estimated fees", self.fallback_lamports);
                est
            }
        }
    }

    pub async fn estimate_pool_creation(
        &self,
        payer: &Pubkey,
        instructions: &[Instruction],
        pool_creation_fee: u64,
        sol_deposit: u64,
    ) -> LauncherResult<FeeEstimate> {
        let token_account = self.rent(spl_token::state::Account::LEN).await?;
        let mut est = FeeEstimate::default();
        est.push("pool state rent", self.rent(POOL_STATE_LEN).await?);
        est.push("observation rent", self.rent(OBSERVATION_STATE_LEN).await?);
        est.push("lp mint rent", self.rent(spl_token::state::Mint::LEN).await?);
        est.push("vault rent", token_account.saturating_mul(2));
        est.push("lp + wsol account rent", token_account.saturating_mul(2));
        est.push("pool creation fee", pool_creation_fee);
        est.push("sol deposit", sol_deposit);
        self.push_network_fees(&mut est, payer, instructions, 1).await;
        info!("pool creation estimate: {} SOL", lamports_to_sol(est.total()));
        Ok(est)
    }
}
