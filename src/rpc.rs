use parking_lot::Mutex;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::account::Account;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{LauncherError, LauncherResult};

struct Endpoint {
    url: String,
    client: Arc<RpcClient>,
}

/// Ordered list of RPC endpoints. Calls go to the preferred endpoint first and
/// fall through the rest of the list on failure.
pub struct RpcRotator {
    endpoints: Vec<Endpoint>,
    idx: Mutex<usize>,
}

impl RpcRotator {
    pub fn new(urls: Vec<String>, timeout_ms: u64, commitment: CommitmentConfig) -> Self {
        let endpoints = urls
            .into_iter()
            .map(|url| Endpoint {
                client: Arc::new(RpcClient::new_with_timeout_and_commitment(
                    url.clone(),
                    Duration::from_millis(timeout_ms),
                    commitment,
                )),
                url,
            })
            .collect();
        Self { endpoints, idx: Mutex::new(0) }
    }

    pub fn require(&self) -> LauncherResult<()> {
        if self.endpoints.is_empty() {
            return Err(LauncherError::Config("no RPC endpoints configured".to_string()));
        }
        Ok(())
    }

    fn current(&self) -> usize {
        let i = *self.idx.lock();
        if self.endpoints.is_empty() { 0 } else { i % self.endpoints.len() }
    }

    pub fn client(&self) -> LauncherResult<Arc<RpcClient>> {
        self.require()?;
        Ok(self.endpoints[self.current()].client.clone())
    }

    pub fn current_url(&self) -> String {
        self.endpoints
            .get(self.current())
            .map(|e| e.url.clone())
            .unwrap_or_default()
    }

    pub fn rotate(&self) {
        if self.endpoints.is_empty() {
            return;
        }
        let mut i = self.idx.lock();
        *i = (*i + 1) % self.endpoints.len();
    }

    /// Runs `f` against each endpoint once, starting at the preferred one,
    /// and returns the first success. The succeeding endpoint becomes preferred.
    pub async fn first_ok<T, E, F, Fut>(&self, op: &str, f: F) -> LauncherResult<T>
    where
        F: Fn(Arc<RpcClient>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.require()?;
        let n = self.endpoints.len();
        let start = self.current();
        let mut last_error = String::new();

        for step in 0..n {
            let i = (start + step) % n;
            let ep = &self.endpoints[i];
            debug!("{} via {}", op, ep.url);
            match f(ep.client.clone()).await {
                Ok(v) => {
                    if i != start {
                        *self.idx.lock() = i;
                        debug!("preferred endpoint is now {}", ep.url);
                    }
                    return Ok(v);
                }
                Err(e) => {
                    warn!("{} failed on {}: {}", op, ep.url, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(LauncherError::AllEndpointsFailed {
            op: op.to_string(),
            attempts: n,
            last_error,
        })
    }

    /// `None` when the account does not exist.
    pub async fn account(&self, address: &Pubkey) -> LauncherResult<Option<Account>> {
        let address = *address;
        let resp = self
            .first_ok("get_account", |c| async move {
                let commitment = c.commitment();
                c.get_account_with_commitment(&address, commitment).await
            })
            .await?;
        Ok(resp.value)
    }

    pub async fn require_account(&self, address: &Pubkey) -> LauncherResult<Account> {
        self.account(address)
            .await?
            .ok_or(LauncherError::AccountNotFound(*address))
    }

    /// Several accounts in one round trip, in the order of `addresses`.
    pub async fn accounts(&self, addresses: &[Pubkey]) -> LauncherResult<Vec<Option<Account>>> {
        let resp = self
            .first_ok("get_multiple_accounts", |c| async move {
                let commitment = c.commitment();
                c.get_multiple_accounts_with_commitment(addresses, commitment).await
            })
            .await?;
        Ok(resp.value)
    }
}

#[cfg(test)]
impl RpcRotator {
    pub fn from_clients(clients: Vec<(String, Arc<RpcClient>)>) -> Self {
        let endpoints = clients
            .into_iter()
            .map(|(url, client)| Endpoint { url, client })
            .collect();
        Self { endpoints, idx: Mutex::new(0) }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rotator(urls: &[&str]) -> RpcRotator {
        RpcRotator::new(
            urls.iter().map(|u| u.to_string()).collect(),
            1_000,
            CommitmentConfig::confirmed(),
        )
    }

    #[tokio::test]
    async fn falls_through_to_next_endpoint() {
        crate::logging::init_test_logging();
        let rpcs = rotator(&["http://a.invalid", "http://b.invalid", "http://c.invalid"]);
        let calls = AtomicUsize::new(0);

        let url = rpcs
            .first_ok("get_slot", |client| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err("connection refused")
                    } else {
                        Ok(client.url())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(url, "http://b.invalid");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(rpcs.current_url(), "http://b.invalid");
    }

    #[tokio::test]
    async fn preferred_endpoint_is_tried_first_and_wraps_around() {
        let rpcs = rotator(&["http://a.invalid", "http://b.invalid"]);
        rpcs.rotate();
        let seen = Mutex::new(Vec::new());

        let res: LauncherResult<()> = rpcs
            .first_ok("get_slot", |client| {
                seen.lock().push(client.url());
                async { Err::<(), _>("down") }
            })
            .await;

        assert_eq!(*seen.lock(), vec!["http://b.invalid", "http://a.invalid"]);
        match res {
            Err(LauncherError::AllEndpointsFailed { op, attempts, last_error }) => {
                assert_eq!(op, "get_slot");
                assert_eq!(attempts, 2);
                assert_eq!(last_error, "down");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn empty_list_is_a_config_error() {
        let rpcs = rotator(&[]);
        assert!(rpcs.client().is_err());
        let res: LauncherResult<u8> = rpcs
            .first_ok("get_slot", |_| async { Ok::<_, String>(1) })
            .await;
        assert!(matches!(res, Err(LauncherError::Config(_))));
        assert_eq!(rpcs.current_url(), "");
    }

    #[tokio::test]
    async fn fetches_accounts_in_order() {
        use solana_client::rpc_request::RpcRequest;

        let owner = Pubkey::new_unique();
        let present = Account { lamports: 7, data: vec![1, 2, 3], owner, executable: false, rent_epoch: 0 };
        let mut mocks = mock::Mocks::new();
        mocks.insert(
            RpcRequest::GetMultipleAccounts,
            mock::accounts_response(&[None, Some(present.clone())]),
        );
        let rpcs = mock::rotator("succeeds", mocks);

        let got = rpcs
            .accounts(&[Pubkey::new_unique(), Pubkey::new_unique()])
            .await
            .unwrap();
        assert_eq!(got, vec![None, Some(present)]);
    }
}
