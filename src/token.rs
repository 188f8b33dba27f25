// src/token.rs
use mpl_token_metadata::accounts::Metadata;
use mpl_token_metadata::instructions::{
    CreateMetadataAccountV3Builder, UpdateMetadataAccountV2Builder,
};
use mpl_token_metadata::types::DataV2;
use solana_sdk::instruction::Instruction;
use solana_sdk::program_option::COption;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::system_instruction;
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use spl_token::instruction::{initialize_mint2, mint_to, set_authority, AuthorityType};
use spl_token::state::Mint;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::balance::BalanceService;
use crate::config::{Config, Fees, Network};
use crate::error::{LauncherError, LauncherResult};
use crate::fees::{ensure_sufficient, FeeEstimate, FeeEstimator};
use crate::metadata::{
    deserialize_metadata, metadata_pda, trim_padded, MetadataCreator, MetadataLinks,
    MetadataProperties, OffChainMetadata,
};
use crate::progress::Progress;
use crate::rpc::RpcRotator;
use crate::tx::{compute_budget_instructions, TxSender};

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_SYMBOL_LEN: usize = 10;
pub const MAX_URI_LEN: usize = 200;
pub const MAX_DECIMALS: u8 = 9;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDetails {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub decimals: u8,
    pub total_supply: u64,
    pub website: String,
    pub twitter: String,
    pub telegram: String,
    pub discord: String,
    /// Local image file, uploaded before creation when `uri` is unset.
    pub image: Option<String>,
    pub uri: Option<String>,
}

impl TokenDetails {
    pub fn validate(&self) -> LauncherResult<()> {
        validate_name(&self.name)?;
        validate_symbol(&self.symbol)?;
        validate_uri(self.uri.as_deref().unwrap_or_default())?;
        if self.decimals > MAX_DECIMALS {
            return Err(LauncherError::invalid(
                "decimals",
                format!("must be between 0 and {}", MAX_DECIMALS),
            ));
        }
        if self.total_supply == 0 {
            return Err(LauncherError::invalid("total_supply", "must be at least 1"));
        }
        self.raw_supply().map(|_| ())
    }

    /// `total_supply * 10^decimals`.
    pub fn raw_supply(&self) -> LauncherResult<u64> {
        10u64
            .checked_pow(self.decimals as u32)
            .and_then(|scale| self.total_supply.checked_mul(scale))
            .ok_or_else(|| {
                LauncherError::invalid("total_supply", "too large for the chosen decimals")
            })
    }

    /// Metaplex fungible document for this token, created by `creator`.
    pub fn offchain_document(&self, creator: &Pubkey) -> OffChainMetadata {
        OffChainMetadata {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            description: self.description.clone(),
            image: String::new(),
            external_url: self.website.clone(),
            attributes: Vec::new(),
            properties: MetadataProperties {
                files: Vec::new(),
                category: "token".to_string(),
                creators: vec![MetadataCreator {
                    address: creator.to_string(),
                    share: 100,
                }],
            },
            links: MetadataLinks {
                website: self.website.clone(),
                twitter: self.twitter.clone(),
                telegram: self.telegram.clone(),
                discord: self.discord.clone(),
            },
        }
    }
}

fn validate_name(name: &str) -> LauncherResult<()> {
    if name.trim().is_empty() {
        return Err(LauncherError::invalid("name", "must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(LauncherError::invalid(
            "name",
            format!("at most {} bytes", MAX_NAME_LEN),
        ));
    }
    Ok(())
}

fn validate_symbol(symbol: &str) -> LauncherResult<()> {
    if symbol.trim().is_empty() {
        return Err(LauncherError::invalid("symbol", "must not be empty"));
    }
    if symbol.len() > MAX_SYMBOL_LEN {
        return Err(LauncherError::invalid(
            "symbol",
            format!("at most {} bytes", MAX_SYMBOL_LEN),
        ));
    }
    Ok(())
}

fn validate_uri(uri: &str) -> LauncherResult<()> {
    if uri.len() > MAX_URI_LEN {
        return Err(LauncherError::invalid(
            "uri",
            format!("at most {} bytes", MAX_URI_LEN),
        ));
    }
    Ok(())
}

/// Parses a decimal string like `"12.5"` into base units without going
/// through floating point.
pub fn ui_to_raw(text: &str, decimals: u8) -> LauncherResult<u64> {
    let text = text.trim();
    if text.starts_with('-') {
        return Err(LauncherError::invalid("amount", "must not be negative"));
    }
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(LauncherError::invalid("amount", format!("not a number: {:?}", text)));
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(frac) {
        return Err(LauncherError::invalid("amount", format!("not a number: {:?}", text)));
    }
    if frac.len() > decimals as usize {
        return Err(LauncherError::invalid(
            "amount",
            format!("more than {} decimal places", decimals),
        ));
    }

    let overflow = || LauncherError::invalid("amount", "too large");
    let scale = 10u64.checked_pow(decimals as u32).ok_or_else(overflow)?;
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| overflow())? };
    let frac_raw: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        padded.parse().map_err(|_| overflow())?
    };
    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_raw))
        .ok_or_else(overflow)
}

/// Toggles applied inside the creation transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthorityOptions {
    pub revoke_mint: bool,
    pub revoke_freeze: bool,
    pub immutable_metadata: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityKind {
    Mint,
    Freeze,
    Update,
}

impl FromStr for AuthorityKind {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mint" => Ok(AuthorityKind::Mint),
            "freeze" => Ok(AuthorityKind::Freeze),
            "update" => Ok(AuthorityKind::Update),
            other => Err(LauncherError::invalid(
                "authority",
                format!("expected mint, freeze or update, got {}", other),
            )),
        }
    }
}

impl fmt::Display for AuthorityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorityKind::Mint => write!(f, "mint"),
            AuthorityKind::Freeze => write!(f, "freeze"),
            AuthorityKind::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCreation {
    pub mint: Pubkey,
    pub owner_token_account: Pubkey,
    pub metadata: Pubkey,
    pub signature: Signature,
    pub explorer_link: String,
    pub raw_supply: u64,
    pub fees: FeeEstimate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintResult {
    pub recipient_token_account: Pubkey,
    pub raw_amount: u64,
    pub signature: Signature,
    pub explorer_link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub uri: Option<String>,
}

impl MetadataUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.symbol.is_none() && self.uri.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataInfo {
    pub address: Pubkey,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub update_authority: Pubkey,
    pub is_mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub mint: Pubkey,
    pub supply: u64,
    pub decimals: u8,
    pub mint_authority: Option<Pubkey>,
    pub freeze_authority: Option<Pubkey>,
    pub metadata: Option<MetadataInfo>,
}

fn coption(c: COption<Pubkey>) -> Option<Pubkey> {
    match c {
        COption::Some(k) => Some(k),
        COption::None => None,
    }
}

pub fn decode_mint(address: &Pubkey, data: &[u8]) -> LauncherResult<Mint> {
    Mint::unpack(data).map_err(|e| LauncherError::InvalidAccount {
        address: *address,
        reason: format!("not an SPL token mint: {}", e),
    })
}

/// Instructions creating the mint, the payer's token account, the initial
/// supply and the metadata account, in that order.
pub fn build_create_token_instructions(
    payer: &Pubkey,
    mint: &Pubkey,
    details: &TokenDetails,
    authorities: AuthorityOptions,
    mint_rent: u64,
) -> LauncherResult<Vec<Instruction>> {
    let raw_supply = details.raw_supply()?;
    let ata = get_associated_token_address(payer, mint);
    let freeze = if authorities.revoke_freeze { None } else { Some(payer) };

    let mut ixs = vec![
        system_instruction::create_account(
            payer,
            mint,
            mint_rent,
            Mint::LEN as u64,
            &spl_token::ID,
        ),
        initialize_mint2(&spl_token::ID, mint, payer, freeze, details.decimals)?,
        create_associated_token_account_idempotent(payer, payer, mint, &spl_token::ID),
        mint_to(&spl_token::ID, mint, &ata, payer, &[], raw_supply)?,
        CreateMetadataAccountV3Builder::new()
            .metadata(metadata_pda(mint))
            .mint(*mint)
            .mint_authority(*payer)
            .payer(*payer)
            .update_authority(*payer, true)
            .data(DataV2 {
                name: details.name.clone(),
                symbol: details.symbol.clone(),
                uri: details.uri.clone().unwrap_or_default(),
                seller_fee_basis_points: 0,
                creators: None,
                collection: None,
                uses: None,
            })
            .is_mutable(!authorities.immutable_metadata)
            .instruction(),
    ];
    if authorities.revoke_mint {
        ixs.push(set_authority(
            &spl_token::ID,
            mint,
            None,
            AuthorityType::MintTokens,
            payer,
            &[],
        )?);
    }
    Ok(ixs)
}

pub struct TokenService {
    rpcs: Arc<RpcRotator>,
    sender: TxSender,
    estimator: FeeEstimator,
    balance: BalanceService,
    fees: Fees,
    network: Network,
}

impl TokenService {
    pub fn new(rpcs: Arc<RpcRotator>, cfg: &Config) -> Self {
        Self {
            sender: TxSender::new(rpcs.clone(), cfg.dry_run),
            estimator: FeeEstimator::new(
                rpcs.clone(),
                cfg.fees.clone(),
                cfg.fallback_fee_lamports(),
            ),
            balance: BalanceService::new(rpcs.clone(), cfg.network),
            fees: cfg.fees.clone(),
            network: cfg.network,
            rpcs,
        }
    }

    fn with_budget(&self, ixs: Vec<Instruction>) -> Vec<Instruction> {
        let mut all = compute_budget_instructions(&self.fees);
        all.extend(ixs);
        all
    }

    /// Cost of creating `details` for `payer`, without a mint yet.
    pub async fn estimate(
        &self,
        payer: &Pubkey,
        details: &TokenDetails,
        authorities: AuthorityOptions,
    ) -> LauncherResult<FeeEstimate> {
        details.validate()?;
        let mint_rent = self.estimator.rent(Mint::LEN).await.unwrap_or_default();
        let sample = build_create_token_instructions(
            payer,
            &Pubkey::new_unique(),
            details,
            authorities,
            mint_rent,
        )?;
        Ok(self
            .estimator
            .estimate_or_fallback(payer, &self.with_budget(sample))
            .await)
    }

    pub async fn create_token(
        &self,
        details: &TokenDetails,
        signer: &dyn Signer,
        authorities: AuthorityOptions,
    ) -> LauncherResult<TokenCreation> {
        let mut progress = Progress::token();
        progress.advance(0);
        details.validate()?;

        let payer = signer.pubkey();
        let mint = Keypair::new();
        let mint_rent = self.estimator.rent(Mint::LEN).await?;
        let ixs = self.with_budget(build_create_token_instructions(
            &payer,
            &mint.pubkey(),
            details,
            authorities,
            mint_rent,
        )?);

        let fees = self.estimator.estimate_or_fallback(&payer, &ixs).await;
        let balance = self.balance.get_balance(&payer).await?;
        ensure_sufficient(balance, fees.total())?;
        info!("creating {} ({}) mint={}", details.name, details.symbol, mint.pubkey());

        // Every stage lands in the same transaction.
        for stage in 1..=5 {
            progress.advance(stage);
        }
        let signature = self
            .sender
            .send("create_token", &ixs, signer, &[&mint])
            .await?;
        progress.advance(6);

        Ok(TokenCreation {
            mint: mint.pubkey(),
            owner_token_account: get_associated_token_address(&payer, &mint.pubkey()),
            metadata: metadata_pda(&mint.pubkey()),
            signature,
            explorer_link: self.network.explorer_tx_link(&signature.to_string()),
            raw_supply: details.raw_supply()?,
            fees,
        })
    }

    async fn fetch_mint(&self, mint: &Pubkey) -> LauncherResult<Mint> {
        let account = self.rpcs.require_account(mint).await?;
        if account.owner != spl_token::ID {
            return Err(LauncherError::InvalidAccount {
                address: *mint,
                reason: format!("owned by {}, not the token program", account.owner),
            });
        }
        decode_mint(mint, &account.data)
    }

    async fn fetch_metadata(&self, mint: &Pubkey) -> LauncherResult<Option<Metadata>> {
        let address = metadata_pda(mint);
        match self.rpcs.account(&address).await? {
            Some(account) => deserialize_metadata(&address, &account.data).map(Some),
            None => Ok(None),
        }
    }

    pub async fn mint_tokens(
        &self,
        mint: &Pubkey,
        recipient: &Pubkey,
        ui_amount: &str,
        signer: &dyn Signer,
    ) -> LauncherResult<MintResult> {
        let authority = signer.pubkey();
        let state = self.fetch_mint(mint).await?;
        if coption(state.mint_authority) != Some(authority) {
            return Err(LauncherError::invalid(
                "mint_authority",
                format!("{} cannot mint {}", authority, mint),
            ));
        }
        let raw_amount = ui_to_raw(ui_amount, state.decimals)?;
        if raw_amount == 0 {
            return Err(LauncherError::invalid("amount", "must be greater than zero"));
        }

        let recipient_ata = get_associated_token_address(recipient, mint);
        let ixs = self.with_budget(vec![
            create_associated_token_account_idempotent(&authority, recipient, mint, &spl_token::ID),
            mint_to(&spl_token::ID, mint, &recipient_ata, &authority, &[], raw_amount)?,
        ]);
        info!("minting {} raw units of {} to {}", raw_amount, mint, recipient);
        let signature = self.sender.send("mint_to", &ixs, signer, &[]).await?;

        Ok(MintResult {
            recipient_token_account: recipient_ata,
            raw_amount,
            signature,
            explorer_link: self.network.explorer_tx_link(&signature.to_string()),
        })
    }

    pub async fn revoke_authority(
        &self,
        mint: &Pubkey,
        kind: AuthorityKind,
        signer: &dyn Signer,
    ) -> LauncherResult<Signature> {
        let authority = signer.pubkey();
        let ix = match kind {
            AuthorityKind::Mint | AuthorityKind::Freeze => {
                let state = self.fetch_mint(mint).await?;
                let (current, authority_type) = match kind {
                    AuthorityKind::Mint => (state.mint_authority, AuthorityType::MintTokens),
                    _ => (state.freeze_authority, AuthorityType::FreezeAccount),
                };
                match coption(current) {
                    None => {
                        return Err(LauncherError::invalid(
                            "authority",
                            format!("{} authority already revoked", kind),
                        ))
                    }
                    Some(k) if k != authority => {
                        return Err(LauncherError::invalid(
                            "authority",
                            format!("{} authority is {}, not {}", kind, k, authority),
                        ))
                    }
                    Some(_) => {}
                }
                set_authority(&spl_token::ID, mint, None, authority_type, &authority, &[])?
            }
            AuthorityKind::Update => {
                let md = self
                    .fetch_metadata(mint)
                    .await?
                    .ok_or(LauncherError::AccountNotFound(metadata_pda(mint)))?;
                if !md.is_mutable {
                    return Err(LauncherError::invalid(
                        "authority",
                        "metadata is already immutable",
                    ));
                }
                if md.update_authority != authority {
                    return Err(LauncherError::invalid(
                        "update_authority",
                        format!("metadata is controlled by {}", md.update_authority),
                    ));
                }
                UpdateMetadataAccountV2Builder::new()
                    .metadata(metadata_pda(mint))
                    .update_authority(authority)
                    .is_mutable(false)
                    .instruction()
            }
        };

        info!("revoking {} authority of {}", kind, mint);
        let ixs = self.with_budget(vec![ix]);
        self.sender.send("revoke_authority", &ixs, signer, &[]).await
    }

    pub async fn update_metadata(
        &self,
        mint: &Pubkey,
        updates: &MetadataUpdate,
        signer: &dyn Signer,
    ) -> LauncherResult<Signature> {
        if updates.is_empty() {
            return Err(LauncherError::invalid("metadata", "nothing to update"));
        }
        let address = metadata_pda(mint);
        let md = self
            .fetch_metadata(mint)
            .await?
            .ok_or(LauncherError::AccountNotFound(address))?;
        if !md.is_mutable {
            return Err(LauncherError::invalid("metadata", "metadata is immutable"));
        }
        if md.update_authority != signer.pubkey() {
            return Err(LauncherError::invalid(
                "update_authority",
                format!("metadata is controlled by {}", md.update_authority),
            ));
        }

        let data = merge_metadata(&md, updates)?;
        info!("updating metadata of {}: {} ({})", mint, data.name, data.symbol);
        let ix = UpdateMetadataAccountV2Builder::new()
            .metadata(address)
            .update_authority(signer.pubkey())
            .data(data)
            .instruction();
        let ixs = self.with_budget(vec![ix]);
        self.sender.send("update_metadata", &ixs, signer, &[]).await
    }

    pub async fn token_info(&self, mint: &Pubkey) -> LauncherResult<TokenInfo> {
        let state = self.fetch_mint(mint).await?;
        let metadata = match self.fetch_metadata(mint).await {
            Ok(md) => md.map(|md| MetadataInfo {
                address: metadata_pda(mint),
                name: trim_padded(&md.name),
                symbol: trim_padded(&md.symbol),
                uri: trim_padded(&md.uri),
                update_authority: md.update_authority,
                is_mutable: md.is_mutable,
            }),
            Err(e) => {
                warn!("metadata of {} unreadable: {}", mint, e);
                None
            }
        };
        Ok(TokenInfo {
            mint: *mint,
            supply: state.supply,
            decimals: state.decimals,
            mint_authority: coption(state.mint_authority),
            freeze_authority: coption(state.freeze_authority),
            metadata,
        })
    }
}

/// Current on-chain data with `updates` applied on top.
pub fn merge_metadata(current: &Metadata, updates: &MetadataUpdate) -> LauncherResult<DataV2> {
    let name = updates
        .name
        .clone()
        .unwrap_or_else(|| trim_padded(&current.name));
    let symbol = updates
        .symbol
        .clone()
        .unwrap_or_else(|| trim_padded(&current.symbol));
    let uri = updates
        .uri
        .clone()
        .unwrap_or_else(|| trim_padded(&current.uri));
    validate_name(&name)?;
    validate_symbol(&symbol)?;
    validate_uri(&uri)?;

    Ok(DataV2 {
        name,
        symbol,
        uri,
        seller_fee_basis_points: current.seller_fee_basis_points,
        creators: current.creators.clone(),
        collection: current.collection.clone(),
        uses: current.uses.clone(),
    })
}
