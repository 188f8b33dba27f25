use base64::prelude::*;
use solana_sdk::compute_budget::ComputeBudgetInstruction;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::signature::{Signature, Signer};
use solana_sdk::transaction::{Transaction, TransactionError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Fees;
use crate::error::{LauncherError, LauncherResult};
use crate::rpc::RpcRotator;

/// Compute budget prefix. The unit price is only added when a priority fee is set.
pub fn compute_budget_instructions(fees: &Fees) -> Vec<Instruction> {
    let mut ixs = vec![ComputeBudgetInstruction::set_compute_unit_limit(
        fees.compute_unit_limit,
    )];
    if fees.priority_fee_micro_lamports > 0 {
        ixs.push(ComputeBudgetInstruction::set_compute_unit_price(
            fees.priority_fee_micro_lamports,
        ));
    }
    ixs
}

/// Builds a legacy transaction paid by `payer` and signed by it plus `extra`.
pub fn build_signed(
    instructions: &[Instruction],
    payer: &dyn Signer,
    extra: &[&dyn Signer],
    blockhash: Hash,
) -> LauncherResult<Transaction> {
    let message = Message::new_with_blockhash(instructions, Some(&payer.pubkey()), &blockhash);
    let mut tx = Transaction::new_unsigned(message);

    let mut signers: Vec<&dyn Signer> = Vec::with_capacity(extra.len() + 1);
    signers.push(payer);
    signers.extend_from_slice(extra);
    tx.try_sign(&signers[..], blockhash)?;
    Ok(tx)
}

const CONFIRM_POLL: Duration = Duration::from_millis(500);
/// Roughly the lifetime of a blockhash.
const CONFIRM_ATTEMPTS: usize = 120;

/// What the cluster reports for a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureState {
    pub confirmed: bool,
    pub err: Option<TransactionError>,
}

pub struct TxSender {
    rpcs: Arc<RpcRotator>,
    dry_run: bool,
}

impl TxSender {
    pub fn new(rpcs: Arc<RpcRotator>, dry_run: bool) -> Self {
        Self { rpcs, dry_run }
    }

    pub async fn latest_blockhash(&self) -> LauncherResult<Hash> {
        self.rpcs
            .first_ok("get_latest_blockhash", |c| async move {
                c.get_latest_blockhash().await
            })
            .await
    }

    /// Signs and submits the instructions, waiting for confirmation. In dry-run
    /// mode the transaction is simulated instead and its would-be signature returned.
    ///
    /// The transaction is submitted once through the endpoint list and then
    /// confirmed by signature. A submit error is not final when the cluster
    /// already knows the signature.
    pub async fn send(
        &self,
        op: &str,
        instructions: &[Instruction],
        payer: &dyn Signer,
        extra: &[&dyn Signer],
    ) -> LauncherResult<Signature> {
        let blockhash = self.latest_blockhash().await?;
        let tx = build_signed(instructions, payer, extra, blockhash)?;
        let signature = tx.signatures[0];
        debug!(
            "{}: {} instructions, {} signatures, blockhash {}",
            op,
            instructions.len(),
            tx.signatures.len(),
            blockhash
        );

        if self.dry_run {
            return self.simulate(op, &tx).await.map(|_| signature);
        }

        let submitted = self
            .rpcs
            .first_ok(op, |c| {
                let tx = tx.clone();
                async move { c.send_transaction(&tx).await }
            })
            .await;
        if let Err(e) = submitted {
            match self.signature_state(&signature).await {
                Ok(Some(_)) => warn!("{} submit reported an error but {} is on chain: {}", op, signature, e),
                _ => return Err(e),
            }
        }

        self.confirm(op, &signature).await?;
        info!("{} confirmed sig={}", op, signature);
        Ok(signature)
    }

    /// `None` while no endpoint knows the signature.
    pub async fn signature_state(&self, signature: &Signature) -> LauncherResult<Option<SignatureState>> {
        let signature = *signature;
        self.rpcs
            .first_ok("get_signature_statuses", |c| async move {
                let commitment = c.commitment();
                c.get_signature_statuses(&[signature]).await.map(|resp| {
                    resp.value.into_iter().next().flatten().map(|status| SignatureState {
                        confirmed: status.satisfies_commitment(commitment),
                        err: status.err,
                    })
                })
            })
            .await
    }

    async fn confirm(&self, op: &str, signature: &Signature) -> LauncherResult<()> {
        for attempt in 1..=CONFIRM_ATTEMPTS {
            match self.signature_state(signature).await {
                Ok(Some(SignatureState { err: Some(err), .. })) => {
                    return Err(LauncherError::TransactionFailed {
                        signature: *signature,
                        reason: err.to_string(),
                    })
                }
                Ok(Some(SignatureState { confirmed: true, .. })) => return Ok(()),
                Ok(_) => {}
                Err(e) => debug!("{} status lookup failed: {}", op, e),
            }
            if attempt < CONFIRM_ATTEMPTS {
                tokio::time::sleep(CONFIRM_POLL).await;
            }
        }
        Err(LauncherError::Unconfirmed(*signature))
    }

    async fn simulate(&self, op: &str, tx: &Transaction) -> LauncherResult<()> {
        let encoded = BASE64_STANDARD.encode(bincode::serialize(tx).map_err(|e| {
            LauncherError::Simulation(format!("cannot serialize transaction: {}", e))
        })?);
        info!("[DRY-RUN] {} tx ({} bytes base64)", op, encoded.len());
        debug!("[DRY-RUN] {}", encoded);

        let result = self
            .rpcs
            .first_ok("simulate_transaction", |c| {
                let tx = tx.clone();
                async move { c.simulate_transaction(&tx).await }
            })
            .await?
            .value;

        for line in result.logs.unwrap_or_default() {
            debug!("[SIM] {}", line);
        }
        if let Some(err) = result.err {
            warn!("[DRY-RUN] {} simulation error: {}", op, err);
            return Err(LauncherError::Simulation(err.to_string()));
        }
        info!(
            "[DRY-RUN] {} simulated OK, units={:?}",
            op, result.units_consumed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::mock;
    use serde_json::json;
    use solana_client::rpc_request::RpcRequest;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use solana_sdk::system_instruction;

    fn transfer(payer: &Keypair) -> Vec<Instruction> {
        vec![system_instruction::transfer(&payer.pubkey(), &Pubkey::new_unique(), 1_000)]
    }

    /// A node that answers `sendTransaction` with something other than a signature.
    fn broken_submit() -> mock::Mocks {
        let mut mocks = mock::Mocks::new();
        mocks.insert(RpcRequest::SendTransaction, json!(42));
        mocks
    }

    #[test]
    fn signs_with_payer_and_extra_signers() {
        let payer = Keypair::new();
        let mint = Keypair::new();
        let ix = system_instruction::create_account(
            &payer.pubkey(),
            &mint.pubkey(),
            1_000,
            82,
            &spl_token::ID,
        );

        let tx = build_signed(&[ix], &payer, &[&mint], Hash::new_unique()).unwrap();

        assert_eq!(tx.message.account_keys[0], payer.pubkey());
        assert_eq!(tx.signatures.len(), 2);
        assert!(tx.verify().is_ok());
    }

    #[test]
    fn missing_signer_is_an_error() {
        let payer = Keypair::new();
        let mint = Keypair::new();
        let ix = system_instruction::create_account(
            &payer.pubkey(),
            &mint.pubkey(),
            1_000,
            82,
            &spl_token::ID,
        );
        assert!(matches!(
            build_signed(&[ix], &payer, &[], Hash::new_unique()),
            Err(LauncherError::Signer(_))
        ));
    }

    #[test]
    fn priority_price_only_when_configured() {
        let mut fees = Fees::default();
        assert_eq!(compute_budget_instructions(&fees).len(), 1);
        fees.priority_fee_micro_lamports = 5_000;
        assert_eq!(compute_budget_instructions(&fees).len(), 2);
    }

    #[tokio::test]
    async fn submits_then_confirms_by_signature() {
        crate::logging::init_test_logging();
        let payer = Keypair::new();
        let sender = TxSender::new(mock::rotator("succeeds", mock::Mocks::new()), false);

        let sig = sender.send("transfer", &transfer(&payer), &payer, &[]).await.unwrap();
        assert_ne!(sig, Signature::default());
        let state = sender.signature_state(&sig).await.unwrap().unwrap();
        assert!(state.confirmed);
        assert_eq!(state.err, None);
    }

    #[tokio::test]
    async fn landed_transaction_counts_as_sent_despite_submit_error() {
        let payer = Keypair::new();
        let sender = TxSender::new(mock::rotator("succeeds", broken_submit()), false);

        let sig = sender.send("transfer", &transfer(&payer), &payer, &[]).await;
        assert!(sig.is_ok(), "{:?}", sig);
    }

    #[tokio::test]
    async fn submit_error_stands_when_signature_is_unknown() {
        let payer = Keypair::new();
        let sender = TxSender::new(mock::rotator("sig_not_found", broken_submit()), false);

        let res = sender.send("transfer", &transfer(&payer), &payer, &[]).await;
        assert!(matches!(res, Err(LauncherError::AllEndpointsFailed { .. })), "{:?}", res);
    }

    #[tokio::test]
    async fn failed_execution_is_reported() {
        let payer = Keypair::new();
        let sender = TxSender::new(mock::rotator("instruction_error", mock::Mocks::new()), false);

        let res = sender.send("transfer", &transfer(&payer), &payer, &[]).await;
        assert!(matches!(res, Err(LauncherError::TransactionFailed { .. })), "{:?}", res);
    }
}
