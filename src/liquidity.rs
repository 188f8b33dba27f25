use borsh::BorshDeserialize;
use solana_sdk::hash::hashv;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::native_token::lamports_to_sol;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::{system_instruction, system_program, sysvar};
use spl_associated_token_account::get_associated_token_address_with_program_id;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use std::sync::Arc;
use tracing::{info, warn};

use crate::accounts::{CpmmAddresses, TOKEN_2022_PROGRAM, WSOL_MINT};
use crate::balance::BalanceService;
use crate::config::{Config, Fees, Network};
use crate::error::{LauncherError, LauncherResult};
use crate::fees::{ensure_sufficient, FeeEstimate, FeeEstimator};
use crate::progress::Progress;
use crate::rpc::RpcRotator;
use crate::token::{decode_mint, ui_to_raw};
use crate::tx::{compute_budget_instructions, TxSender};

const AUTH_SEED: &[u8] = b"vault_and_lp_mint_auth_seed";
const POOL_SEED: &[u8] = b"pool";
const POOL_LP_MINT_SEED: &[u8] = b"pool_lp_mint";
const POOL_VAULT_SEED: &[u8] = b"pool_vault";
const OBSERVATION_SEED: &[u8] = b"observation";

const BPS: u128 = 10_000;
const SOL_DECIMALS: u8 = 9;

/// First 8 bytes of `sha256("global:<name>")`.
pub fn anchor_discriminator(name: &str) -> [u8; 8] {
    let hash = hashv(&[&b"global:"[..], name.as_bytes()]);
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash.to_bytes()[..8]);
    out
}

/// Addresses of a CPMM pool. `mint_0 < mint_1` byte-wise, as the program requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpmmPdas {
    pub authority: Pubkey,
    pub pool: Pubkey,
    pub lp_mint: Pubkey,
    pub mint_0: Pubkey,
    pub mint_1: Pubkey,
    pub vault_0: Pubkey,
    pub vault_1: Pubkey,
    pub observation: Pubkey,
}

pub fn sort_mints(a: Pubkey, b: Pubkey) -> (Pubkey, Pubkey) {
    if a.to_bytes() < b.to_bytes() {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn cpmm_pdas(program: &Pubkey, amm_config: &Pubkey, mint_a: &Pubkey, mint_b: &Pubkey) -> CpmmPdas {
    let (mint_0, mint_1) = sort_mints(*mint_a, *mint_b);
    let (authority, _) = Pubkey::find_program_address(&[AUTH_SEED], program);
    let (pool, _) = Pubkey::find_program_address(
        &[POOL_SEED, amm_config.as_ref(), mint_0.as_ref(), mint_1.as_ref()],
        program,
    );
    let (lp_mint, _) = Pubkey::find_program_address(&[POOL_LP_MINT_SEED, pool.as_ref()], program);
    let vault = |mint: &Pubkey| {
        Pubkey::find_program_address(&[POOL_VAULT_SEED, pool.as_ref(), mint.as_ref()], program).0
    };
    let (observation, _) =
        Pubkey::find_program_address(&[OBSERVATION_SEED, pool.as_ref()], program);

    CpmmPdas {
        authority,
        pool,
        lp_mint,
        vault_0: vault(&mint_0),
        vault_1: vault(&mint_1),
        mint_0,
        mint_1,
        observation,
    }
}

pub struct InitializeArgs {
    pub init_amount_0: u64,
    pub init_amount_1: u64,
    pub open_time: u64,
}

pub fn initialize_instruction(
    cpmm: &CpmmAddresses,
    pdas: &CpmmPdas,
    creator: &Pubkey,
    args: &InitializeArgs,
) -> Instruction {
    let token_0 = get_associated_token_address_with_program_id(creator, &pdas.mint_0, &spl_token::ID);
    let token_1 = get_associated_token_address_with_program_id(creator, &pdas.mint_1, &spl_token::ID);
    let lp = get_associated_token_address_with_program_id(creator, &pdas.lp_mint, &spl_token::ID);

    let mut data = Vec::with_capacity(32);
    data.extend_from_slice(&anchor_discriminator("initialize"));
    data.extend_from_slice(&args.init_amount_0.to_le_bytes());
    data.extend_from_slice(&args.init_amount_1.to_le_bytes());
    data.extend_from_slice(&args.open_time.to_le_bytes());

    Instruction {
        program_id: cpmm.program,
        accounts: vec![
            AccountMeta::new(*creator, true),
            AccountMeta::new_readonly(cpmm.amm_config, false),
            AccountMeta::new_readonly(pdas.authority, false),
            AccountMeta::new(pdas.pool, false),
            AccountMeta::new_readonly(pdas.mint_0, false),
            AccountMeta::new_readonly(pdas.mint_1, false),
            AccountMeta::new(pdas.lp_mint, false),
            AccountMeta::new(token_0, false),
            AccountMeta::new(token_1, false),
            AccountMeta::new(lp, false),
            AccountMeta::new(pdas.vault_0, false),
            AccountMeta::new(pdas.vault_1, false),
            AccountMeta::new(cpmm.create_pool_fee, false),
            AccountMeta::new(pdas.observation, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(spl_associated_token_account::ID, false),
            AccountMeta::new_readonly(system_program::ID, false),
            AccountMeta::new_readonly(sysvar::rent::ID, false),
        ],
        data,
    }
}

pub struct DepositArgs {
    pub lp_token_amount: u64,
    pub maximum_token_0_amount: u64,
    pub maximum_token_1_amount: u64,
}

pub fn deposit_instruction(
    program: &Pubkey,
    pool: &Pubkey,
    state: &PoolState,
    owner: &Pubkey,
    args: &DepositArgs,
) -> Instruction {
    let (authority, _) = Pubkey::find_program_address(&[AUTH_SEED], program);
    let token_0 = get_associated_token_address_with_program_id(owner, &state.token_0_mint, &state.token_0_program);
    let token_1 = get_associated_token_address_with_program_id(owner, &state.token_1_mint, &state.token_1_program);
    let lp = get_associated_token_address_with_program_id(owner, &state.lp_mint, &spl_token::ID);

    let mut data = Vec::with_capacity(32);
    data.extend_from_slice(&anchor_discriminator("deposit"));
    data.extend_from_slice(&args.lp_token_amount.to_le_bytes());
    data.extend_from_slice(&args.maximum_token_0_amount.to_le_bytes());
    data.extend_from_slice(&args.maximum_token_1_amount.to_le_bytes());

    Instruction {
        program_id: *program,
        accounts: vec![
            AccountMeta::new_readonly(*owner, true),
            AccountMeta::new_readonly(authority, false),
            AccountMeta::new(*pool, false),
            AccountMeta::new(lp, false),
            AccountMeta::new(token_0, false),
            AccountMeta::new(token_1, false),
            AccountMeta::new(state.token_0_vault, false),
            AccountMeta::new(state.token_1_vault, false),
            AccountMeta::new_readonly(spl_token::ID, false),
            AccountMeta::new_readonly(TOKEN_2022_PROGRAM, false),
            AccountMeta::new_readonly(state.token_0_mint, false),
            AccountMeta::new_readonly(state.token_1_mint, false),
            AccountMeta::new(state.lp_mint, false),
        ],
        data,
    }
}

/// CPMM pool account, after the 8-byte Anchor discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshDeserialize)]
pub struct PoolState {
    pub amm_config: Pubkey,
    pub pool_creator: Pubkey,
    pub token_0_vault: Pubkey,
    pub token_1_vault: Pubkey,
    pub lp_mint: Pubkey,
    pub token_0_mint: Pubkey,
    pub token_1_mint: Pubkey,
    pub token_0_program: Pubkey,
    pub token_1_program: Pubkey,
    pub observation_key: Pubkey,
    pub auth_bump: u8,
    pub status: u8,
    pub lp_mint_decimals: u8,
    pub mint_0_decimals: u8,
    pub mint_1_decimals: u8,
    pub lp_supply: u64,
    pub protocol_fees_token_0: u64,
    pub protocol_fees_token_1: u64,
    pub fund_fees_token_0: u64,
    pub fund_fees_token_1: u64,
    pub open_time: u64,
    pub recent_epoch: u64,
    pub creator_fee_on: u8,
    pub enable_creator_fee: bool,
    pub padding1: [u8; 6],
    pub creator_fees_token_0: u64,
    pub creator_fees_token_1: u64,
    pub padding: [u64; 28],
}

impl PoolState {
    pub fn decode(address: &Pubkey, data: &[u8]) -> LauncherResult<Self> {
        if data.len() < 8 {
            return Err(LauncherError::InvalidAccount {
                address: *address,
                reason: format!("pool account too short: {} bytes", data.len()),
            });
        }
        BorshDeserialize::deserialize(&mut &data[8..]).map_err(|e| LauncherError::InvalidAccount {
            address: *address,
            reason: format!("failed to deserialize pool state: {}", e),
        })
    }

    /// Vault balances minus the fees the pool owes to protocol, fund and creator.
    pub fn net_reserves(&self, vault_0: u64, vault_1: u64) -> (u64, u64) {
        let owed_0 = self
            .protocol_fees_token_0
            .saturating_add(self.fund_fees_token_0)
            .saturating_add(self.creator_fees_token_0);
        let owed_1 = self
            .protocol_fees_token_1
            .saturating_add(self.fund_fees_token_1)
            .saturating_add(self.creator_fees_token_1);
        (vault_0.saturating_sub(owed_0), vault_1.saturating_sub(owed_1))
    }
}

/// LP tokens issued for depositing `amount_0`/`amount_1` into reserves
/// `(reserve_0, reserve_1)`: the smaller pro-rata share, rounded down.
pub fn lp_for_deposit(amount_0: u64, amount_1: u64, reserves: (u64, u64), lp_supply: u64) -> u64 {
    let (r0, r1) = reserves;
    if r0 == 0 || r1 == 0 || lp_supply == 0 {
        return 0;
    }
    let lp_0 = amount_0 as u128 * lp_supply as u128 / r0 as u128;
    let lp_1 = amount_1 as u128 * lp_supply as u128 / r1 as u128;
    lp_0.min(lp_1).min(u64::MAX as u128) as u64
}

/// Token amounts the program pulls for `lp` LP tokens, rounded up.
pub fn tokens_for_lp(lp: u64, reserves: (u64, u64), lp_supply: u64) -> (u64, u64) {
    if lp_supply == 0 {
        return (0, 0);
    }
    let side = |reserve: u64| {
        (lp as u128 * reserve as u128)
            .div_ceil(lp_supply as u128)
            .min(u64::MAX as u128) as u64
    };
    (side(reserves.0), side(reserves.1))
}

pub fn with_slippage_up(amount: u64, slippage_bps: u16) -> u64 {
    (amount as u128 * (BPS + slippage_bps as u128))
        .div_ceil(BPS)
        .min(u64::MAX as u128) as u64
}

/// Token price in SOL from the reserves of a token/WSOL pool.
pub fn price_in_sol(state: &PoolState, reserves: (u64, u64)) -> Option<f64> {
    let (token_reserve, token_decimals, sol_reserve) = if state.token_0_mint == WSOL_MINT {
        (reserves.1, state.mint_1_decimals, reserves.0)
    } else if state.token_1_mint == WSOL_MINT {
        (reserves.0, state.mint_0_decimals, reserves.1)
    } else {
        return None;
    };
    if token_reserve == 0 {
        return None;
    }
    let tokens = token_reserve as f64 / 10f64.powi(token_decimals as i32);
    Some(lamports_to_sol(sol_reserve) / tokens)
}

/// Lamports a deposit takes from the wallet: the wrapped SOL, the network fee
/// and rent for each token account the transaction creates.
pub fn deposit_requirement(
    max_sol: u64,
    network_fee: u64,
    token_account_rent: u64,
    missing_accounts: u64,
) -> u64 {
    max_sol
        .saturating_add(network_fee)
        .saturating_add(token_account_rent.saturating_mul(missing_accounts))
}

/// Funds the owner's WSOL account with `lamports`, creating it if needed.
pub fn wrap_sol_instructions(owner: &Pubkey, lamports: u64) -> LauncherResult<Vec<Instruction>> {
    let wsol_ata = get_associated_token_address_with_program_id(owner, &WSOL_MINT, &spl_token::ID);
    let mut ixs = vec![create_associated_token_account_idempotent(
        owner,
        owner,
        &WSOL_MINT,
        &spl_token::ID,
    )];
    if lamports > 0 {
        ixs.push(system_instruction::transfer(owner, &wsol_ata, lamports));
        ixs.push(spl_token::instruction::sync_native(&spl_token::ID, &wsol_ata)?);
    }
    Ok(ixs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolCreation {
    pub pool: Pubkey,
    pub lp_mint: Pubkey,
    pub signature: Signature,
    pub explorer_link: String,
    pub token_amount: u64,
    pub sol_amount: u64,
    pub fees: FeeEstimate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityDeposit {
    pub pool: Pubkey,
    pub lp_amount: u64,
    pub max_token_0: u64,
    pub max_token_1: u64,
    pub signature: Signature,
    pub explorer_link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolInfo {
    pub pool: Pubkey,
    pub state: PoolState,
    pub reserve_0: u64,
    pub reserve_1: u64,
    pub price_in_sol: Option<f64>,
}

pub struct LiquidityService {
    rpcs: Arc<RpcRotator>,
    sender: TxSender,
    estimator: FeeEstimator,
    balance: BalanceService,
    cpmm: CpmmAddresses,
    fees: Fees,
    network: Network,
}

impl LiquidityService {
    pub fn new(rpcs: Arc<RpcRotator>, cfg: &Config) -> LauncherResult<Self> {
        Ok(Self {
            sender: TxSender::new(rpcs.clone(), cfg.dry_run),
            estimator: FeeEstimator::new(rpcs.clone(), cfg.fees.clone(), cfg.fallback_fee_lamports()),
            balance: BalanceService::new(rpcs.clone(), cfg.network),
            cpmm: cfg.cpmm()?,
            fees: cfg.fees.clone(),
            network: cfg.network,
            rpcs,
        })
    }

    pub fn pdas_for(&self, mint: &Pubkey) -> CpmmPdas {
        cpmm_pdas(&self.cpmm.program, &self.cpmm.amm_config, mint, &WSOL_MINT)
    }

    async fn token_amount(&self, address: &Pubkey) -> LauncherResult<u64> {
        let account = self.rpcs.require_account(address).await?;
        spl_token::state::Account::unpack(&account.data)
            .map(|a| a.amount)
            .map_err(|e| LauncherError::InvalidAccount {
                address: *address,
                reason: format!("not a token account: {}", e),
            })
    }

    async fn fetch_pool(&self, pool: &Pubkey) -> LauncherResult<PoolState> {
        let account = self.rpcs.require_account(pool).await?;
        if account.owner != self.cpmm.program {
            return Err(LauncherError::InvalidAccount {
                address: *pool,
                reason: format!("owned by {}, not the CPMM program", account.owner),
            });
        }
        PoolState::decode(pool, &account.data)
    }

    /// Creates a token/WSOL pool seeded with `token_ui` tokens and `sol_ui` SOL.
    pub async fn create_pool(
        &self,
        mint: &Pubkey,
        token_ui: &str,
        sol_ui: &str,
        signer: &dyn Signer,
    ) -> LauncherResult<PoolCreation> {
        let mut progress = Progress::pool();
        progress.advance(0);
        let creator = signer.pubkey();

        progress.advance(1);
        let pdas = self.pdas_for(mint);
        let mut fetched = self.rpcs.accounts(&[*mint, pdas.pool]).await?.into_iter();
        let mint_account = fetched
            .next()
            .flatten()
            .ok_or(LauncherError::AccountNotFound(*mint))?;
        let pool_exists = fetched.next().flatten().is_some();
        if mint_account.owner != spl_token::ID {
            return Err(LauncherError::InvalidAccount {
                address: *mint,
                reason: "pools need an SPL token mint".to_string(),
            });
        }
        let mint_state = decode_mint(mint, &mint_account.data)?;
        if mint_state.freeze_authority.is_some() {
            warn!("{} still has a freeze authority; most DEX front-ends hide such pools", mint);
        }

        let token_amount = ui_to_raw(token_ui, mint_state.decimals)?;
        let sol_amount = ui_to_raw(sol_ui, SOL_DECIMALS)?;
        if token_amount == 0 {
            return Err(LauncherError::invalid("token_amount", "must be greater than zero"));
        }
        if sol_amount == 0 {
            return Err(LauncherError::invalid("sol_amount", "must be greater than zero"));
        }
        if pool_exists {
            return Err(LauncherError::invalid(
                "pool",
                format!("pool {} already exists", pdas.pool),
            ));
        }
        let (init_amount_0, init_amount_1) = if pdas.mint_0 == WSOL_MINT {
            (sol_amount, token_amount)
        } else {
            (token_amount, sol_amount)
        };

        let mut ixs = compute_budget_instructions(&self.fees);
        ixs.extend(wrap_sol_instructions(&creator, sol_amount)?);
        ixs.push(initialize_instruction(
            &self.cpmm,
            &pdas,
            &creator,
            &InitializeArgs { init_amount_0, init_amount_1, open_time: 0 },
        ));

        let fees = self
            .estimator
            .estimate_pool_creation(&creator, &ixs, self.cpmm.pool_creation_fee_lamports, sol_amount)
            .await?;
        let balance = self.balance.get_balance(&creator).await?;
        ensure_sufficient(balance, fees.total())?;

        progress.advance(2);
        info!(
            "creating pool {} for {}: {} raw tokens + {} SOL",
            pdas.pool,
            mint,
            token_amount,
            lamports_to_sol(sol_amount)
        );
        progress.advance(3);
        let signature = self.sender.send("create_pool", &ixs, signer, &[]).await?;
        progress.advance(4);

        Ok(PoolCreation {
            pool: pdas.pool,
            lp_mint: pdas.lp_mint,
            signature,
            explorer_link: self.network.explorer_tx_link(&signature.to_string()),
            token_amount,
            sol_amount,
            fees,
        })
    }

    pub async fn add_liquidity(
        &self,
        pool: &Pubkey,
        token_ui: &str,
        sol_ui: &str,
        slippage_bps: u16,
        signer: &dyn Signer,
    ) -> LauncherResult<LiquidityDeposit> {
        let owner = signer.pubkey();
        let state = self.fetch_pool(pool).await?;
        let sol_is_0 = state.token_0_mint == WSOL_MINT;
        if !sol_is_0 && state.token_1_mint != WSOL_MINT {
            return Err(LauncherError::InvalidAccount {
                address: *pool,
                reason: "not a WSOL pool".to_string(),
            });
        }

        let token_decimals = if sol_is_0 { state.mint_1_decimals } else { state.mint_0_decimals };
        let token_amount = ui_to_raw(token_ui, token_decimals)?;
        let sol_amount = ui_to_raw(sol_ui, SOL_DECIMALS)?;
        let (amount_0, amount_1) = if sol_is_0 {
            (sol_amount, token_amount)
        } else {
            (token_amount, sol_amount)
        };

        let vault_0 = self.token_amount(&state.token_0_vault).await?;
        let vault_1 = self.token_amount(&state.token_1_vault).await?;
        let reserves = state.net_reserves(vault_0, vault_1);
        let lp_amount = lp_for_deposit(amount_0, amount_1, reserves, state.lp_supply);
        if lp_amount == 0 {
            return Err(LauncherError::invalid("amount", "deposit too small for one LP token"));
        }
        let (need_0, need_1) = tokens_for_lp(lp_amount, reserves, state.lp_supply);
        let max_token_0 = with_slippage_up(need_0, slippage_bps);
        let max_token_1 = with_slippage_up(need_1, slippage_bps);
        let max_sol = if sol_is_0 { max_token_0 } else { max_token_1 };

        let mut ixs = compute_budget_instructions(&self.fees);
        ixs.extend(wrap_sol_instructions(&owner, max_sol)?);
        ixs.push(create_associated_token_account_idempotent(
            &owner,
            &owner,
            &state.lp_mint,
            &spl_token::ID,
        ));
        ixs.push(deposit_instruction(
            &self.cpmm.program,
            pool,
            &state,
            &owner,
            &DepositArgs {
                lp_token_amount: lp_amount,
                maximum_token_0_amount: max_token_0,
                maximum_token_1_amount: max_token_1,
            },
        ));

        let wsol_ata = get_associated_token_address_with_program_id(&owner, &WSOL_MINT, &spl_token::ID);
        let lp_ata = get_associated_token_address_with_program_id(&owner, &state.lp_mint, &spl_token::ID);
        let missing = self
            .rpcs
            .accounts(&[wsol_ata, lp_ata])
            .await?
            .iter()
            .filter(|a| a.is_none())
            .count() as u64;
        let token_account_rent = if missing > 0 {
            self.estimator.rent(spl_token::state::Account::LEN).await?
        } else {
            0
        };

        let balance = self.balance.get_balance(&owner).await?;
        let network_fee = self.estimator.network_fee(&owner, &ixs, 1).await;
        ensure_sufficient(
            balance,
            deposit_requirement(max_sol, network_fee, token_account_rent, missing),
        )?;

        info!(
            "depositing into {}: lp={} max0={} max1={}",
            pool, lp_amount, max_token_0, max_token_1
        );
        let signature = self.sender.send("add_liquidity", &ixs, signer, &[]).await?;
        Ok(LiquidityDeposit {
            pool: *pool,
            lp_amount,
            max_token_0,
            max_token_1,
            signature,
            explorer_link: self.network.explorer_tx_link(&signature.to_string()),
        })
    }

    pub async fn pool_info(&self, pool: &Pubkey) -> LauncherResult<PoolInfo> {
        let state = self.fetch_pool(pool).await?;
        let vault_0 = self.token_amount(&state.token_0_vault).await?;
        let vault_1 = self.token_amount(&state.token_1_vault).await?;
        let (reserve_0, reserve_1) = state.net_reserves(vault_0, vault_1);
        Ok(PoolInfo {
            pool: *pool,
            price_in_sol: price_in_sol(&state, (reserve_0, reserve_1)),
            state,
            reserve_0,
            reserve_1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::MAINNET_CPMM;
    use crate::rpc::mock;
    use base64::prelude::*;
    use solana_client::rpc_request::RpcRequest;
    use solana_sdk::account::Account;
    use solana_sdk::pubkey;
    use solana_sdk::signature::Keypair;

    const TOKEN: Pubkey = pubkey!("4JPyh4ATbE8hfcH7LqhxF3YThsECZm6htmLvMUyrbonk");
    const POOL: Pubkey = pubkey!("BtGUffMEnxrzdjyC3kKAHjGMpG1UdZiVWXZUaSpUv13C");
    const POOL_DATA: &str = "9+3j9dfD3kazIT+6i/nIf6keR4GWKMOD4AvqfpjHoD4DuhBpz8P28x8Na0rc7C1Zm7LyJl4ShisCRi0+5a8Nk4OaqdH0m7wVBqQduY0Igai9wR2ia3vG3PgpwHivUyv22iEjyfHy/CraGtqK7nhH5z24aSL2iI6mFwcGnviAEXfRG0m3q1L/5x4J70KbYQNB95Fy7IrHByfvAX2wY0tJu+3I7ItHuCA+BpuIV/6rgYT7aH9jRhjANdrEOdwa6ztVmKDwAAAAAAExB+pJ3KsjugmehWQPi7KSS7v4rbB+qi46TyOqDmQA9Qbd9uHXZaGT2cvhRs7reawctIXtX1s3kTqM9YV+/wCpBt324ddloZPZy+FGzut5rBy0he1fWzeROoz1hX7/AKkfCKZLj4dOgvwYS5t4w4t0gbKegIyNEYUvo/IxnasrnP0ACQkGmu4BXX0DAAAmCOwCAAAAAD4qgssAAAAAR5w9AAAAAABLEssNAAAAAKfssWgAAAAASQMAAAAAAAABAQAAAAAAAIKNfdgNAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==";

    fn recorded_pool() -> PoolState {
        let data = BASE64_STANDARD.decode(POOL_DATA).unwrap();
        PoolState::decode(&POOL, &data).unwrap()
    }

    #[test]
    fn discriminators() {
        assert_eq!(anchor_discriminator("initialize"), [175, 175, 109, 31, 13, 152, 155, 237]);
        assert_eq!(anchor_discriminator("deposit"), [242, 35, 198, 137, 82, 225, 242, 182]);
    }

    #[test]
    fn derives_mainnet_pool_addresses() {
        let pdas = cpmm_pdas(&MAINNET_CPMM.program, &MAINNET_CPMM.amm_config, &TOKEN, &WSOL_MINT);
        assert_eq!(pdas.mint_0, WSOL_MINT);
        assert_eq!(pdas.mint_1, TOKEN);
        assert_eq!(pdas.authority, pubkey!("GpMZbSM2GgvTKHJirzeGfMFoaZ8UR2X7F4v8vHTvxFbL"));
        assert_eq!(pdas.pool, POOL);
        assert_eq!(pdas.vault_0, pubkey!("SvbJANoKJmz6RqEJBj5gjPrfurkKzhfGXUvaEams48y"));
        assert_eq!(pdas.vault_1, pubkey!("FgPdQQ37kZVDqsfgPSLzC851mx9BMP6HRYe2ia4HDNLe"));
        assert_eq!(pdas.lp_mint, pubkey!("32G1zhdfadicaoi8Fpw1a7niNqjHsPC718FXZ3Qg5Df3"));
        assert_eq!(pdas.observation, pubkey!("369Hj5tT85pGAwsUESErUeZybnk5cTBoJ1tysDbs4eM9"));

        // argument order does not matter
        assert_eq!(
            cpmm_pdas(&MAINNET_CPMM.program, &MAINNET_CPMM.amm_config, &WSOL_MINT, &TOKEN),
            pdas
        );
    }

    #[test]
    fn decodes_recorded_pool() {
        let state = recorded_pool();
        assert_eq!(state.amm_config, MAINNET_CPMM.amm_config);
        assert_eq!(state.pool_creator, pubkey!("36DWP52MVRDooYNrcRVDyoCh2R1fPXCYqKJQYg9pFQoE"));
        assert_eq!(state.token_0_mint, WSOL_MINT);
        assert_eq!(state.token_1_mint, TOKEN);
        assert_eq!(state.token_0_program, spl_token::ID);
        assert_eq!(state.lp_mint, pubkey!("32G1zhdfadicaoi8Fpw1a7niNqjHsPC718FXZ3Qg5Df3"));
        assert_eq!(state.observation_key, pubkey!("369Hj5tT85pGAwsUESErUeZybnk5cTBoJ1tysDbs4eM9"));
        assert_eq!(state.mint_0_decimals, 9);
        assert_eq!(state.mint_1_decimals, 6);
        assert_eq!(state.lp_supply, 3_836_966_203_034);
        assert_eq!(state.protocol_fees_token_0, 49_023_014);
        assert_eq!(state.fund_fees_token_1, 231_412_299);
        assert_eq!(state.creator_fees_token_0, 59_466_681_730);
        assert!(state.enable_creator_fee);

        assert!(PoolState::decode(&POOL, &[0u8; 4]).is_err());
    }

    #[test]
    fn reserves_exclude_owed_fees() {
        let state = recorded_pool();
        let owed_0 = 49_023_014 + 4_037_703 + 59_466_681_730;
        let owed_1 = 3_414_305_342 + 231_412_299;
        assert_eq!(
            state.net_reserves(owed_0 + 1_000, owed_1 + 2_000),
            (1_000, 2_000)
        );
        assert_eq!(state.net_reserves(0, 0), (0, 0));
    }

    #[test]
    fn prices_token_against_sol() {
        let state = recorded_pool();
        // 100 SOL against 1_000_000 tokens (6 decimals)
        let price = price_in_sol(&state, (100_000_000_000, 1_000_000_000_000)).unwrap();
        assert!((price - 0.0001).abs() < 1e-12);
        assert_eq!(price_in_sol(&state, (1, 0)), None);
    }

    #[test]
    fn deposit_math() {
        assert_eq!(lp_for_deposit(100, 300, (1_000, 2_000), 10_000), 1_000);
        assert_eq!(lp_for_deposit(100, 100, (1_000, 2_000), 10_000), 500);
        assert_eq!(lp_for_deposit(1, 1, (3, 3), 1), 0);
        assert_eq!(lp_for_deposit(100, 100, (0, 2_000), 10_000), 0);

        assert_eq!(tokens_for_lp(500, (1_000, 2_000), 10_000), (50, 100));
        assert_eq!(tokens_for_lp(1, (3, 3), 2), (2, 2));

        // rounding never asks for more than was offered
        let (a0, a1) = (12_345u64, 67_890u64);
        let reserves = (1_000_003, 7_777_777);
        let lp = lp_for_deposit(a0, a1, reserves, 999_999);
        let (n0, n1) = tokens_for_lp(lp, reserves, 999_999);
        assert!(n0 <= a0 && n1 <= a1);
    }

    #[test]
    fn slippage_rounds_up() {
        assert_eq!(with_slippage_up(10_000, 100), 10_100);
        assert_eq!(with_slippage_up(1, 1), 2);
        assert_eq!(with_slippage_up(0, 500), 0);
        assert_eq!(with_slippage_up(u64::MAX, 100), u64::MAX);
    }

    #[test]
    fn initialize_layout() {
        let creator = Pubkey::new_unique();
        let pdas = cpmm_pdas(&MAINNET_CPMM.program, &MAINNET_CPMM.amm_config, &TOKEN, &WSOL_MINT);
        let ix = initialize_instruction(
            &MAINNET_CPMM,
            &pdas,
            &creator,
            &InitializeArgs { init_amount_0: 5, init_amount_1: 7, open_time: 0 },
        );

        assert_eq!(ix.program_id, MAINNET_CPMM.program);
        assert_eq!(ix.accounts.len(), 20);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert_eq!(ix.accounts[3].pubkey, POOL);
        assert_eq!(
            ix.accounts[7].pubkey,
            get_associated_token_address_with_program_id(&creator, &WSOL_MINT, &spl_token::ID)
        );
        assert_eq!(ix.accounts[12].pubkey, MAINNET_CPMM.create_pool_fee);
        assert_eq!(ix.accounts[19].pubkey, sysvar::rent::ID);

        assert_eq!(ix.data.len(), 32);
        assert_eq!(&ix.data[8..16], &5u64.to_le_bytes());
        assert_eq!(&ix.data[16..24], &7u64.to_le_bytes());
        assert_eq!(&ix.data[24..], &0u64.to_le_bytes());
    }

    #[test]
    fn deposit_layout() {
        let owner = Pubkey::new_unique();
        let state = recorded_pool();
        let ix = deposit_instruction(
            &MAINNET_CPMM.program,
            &POOL,
            &state,
            &owner,
            &DepositArgs { lp_token_amount: 1, maximum_token_0_amount: 2, maximum_token_1_amount: 3 },
        );
        assert_eq!(ix.accounts.len(), 13);
        assert_eq!(ix.accounts[1].pubkey, pubkey!("GpMZbSM2GgvTKHJirzeGfMFoaZ8UR2X7F4v8vHTvxFbL"));
        assert_eq!(ix.accounts[6].pubkey, state.token_0_vault);
        assert_eq!(ix.accounts[12].pubkey, state.lp_mint);
        assert!(ix.accounts[12].is_writable);
        assert_eq!(&ix.data[..8], &anchor_discriminator("deposit"));
        assert_eq!(&ix.data[24..], &3u64.to_le_bytes());
    }

    #[test]
    fn wraps_sol_into_the_wsol_account() {
        let owner = Pubkey::new_unique();
        let ixs = wrap_sol_instructions(&owner, 1_000).unwrap();
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, spl_associated_token_account::ID);
        assert_eq!(ixs[1].program_id, system_program::ID);
        assert_eq!(ixs[2].program_id, spl_token::ID);
        assert_eq!(wrap_sol_instructions(&owner, 0).unwrap().len(), 1);
    }

    #[test]
    fn deposit_needs_rent_for_new_token_accounts() {
        assert_eq!(deposit_requirement(1_000_000, 5_000, 2_039_280, 0), 1_005_000);
        assert_eq!(deposit_requirement(1_000_000, 5_000, 2_039_280, 2), 5_083_560);
        assert_eq!(deposit_requirement(u64::MAX, 5_000, 2_039_280, 2), u64::MAX);
    }

    /// Service whose node returns `mint` and `pool` for the batched lookup.
    fn service_with(mint: Option<Account>, pool: Option<Account>) -> LiquidityService {
        let mut mocks = mock::Mocks::new();
        mocks.insert(RpcRequest::GetMultipleAccounts, mock::accounts_response(&[mint, pool]));
        LiquidityService::new(mock::rotator("succeeds", mocks), &Config::default()).unwrap()
    }

    #[tokio::test]
    async fn create_pool_rejects_zero_amounts() {
        let signer = Keypair::new();
        let mint = Pubkey::new_unique();

        let service = service_with(Some(mock::mint_account(None, 6)), None);
        let res = service.create_pool(&mint, "0", "1", &signer).await;
        assert!(matches!(res, Err(LauncherError::InvalidInput { field: "token_amount", .. })), "{:?}", res);

        let service = service_with(Some(mock::mint_account(None, 6)), None);
        let res = service.create_pool(&mint, "1000", "0.0", &signer).await;
        assert!(matches!(res, Err(LauncherError::InvalidInput { field: "sol_amount", .. })), "{:?}", res);
    }

    #[tokio::test]
    async fn create_pool_rejects_existing_pool() {
        let signer = Keypair::new();
        let cpmm = Config::default().cpmm().unwrap();
        let pool = Account {
            lamports: 1,
            data: vec![0u8; 8],
            owner: cpmm.program,
            executable: false,
            rent_epoch: 0,
        };
        let service = service_with(Some(mock::mint_account(None, 6)), Some(pool));

        let res = service.create_pool(&Pubkey::new_unique(), "1000", "1", &signer).await;
        assert!(matches!(res, Err(LauncherError::InvalidInput { field: "pool", .. })), "{:?}", res);
    }

    #[tokio::test]
    async fn create_pool_needs_a_token_mint() {
        let signer = Keypair::new();
        let mint = Pubkey::new_unique();

        let res = service_with(None, None).create_pool(&mint, "1", "1", &signer).await;
        assert!(matches!(res, Err(LauncherError::AccountNotFound(m)) if m == mint), "{:?}", res);

        let mut foreign = mock::mint_account(None, 6);
        foreign.owner = system_program::ID;
        let res = service_with(Some(foreign), None).create_pool(&mint, "1", "1", &signer).await;
        assert!(matches!(res, Err(LauncherError::InvalidAccount { .. })), "{:?}", res);
    }
}
