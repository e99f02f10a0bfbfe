//! Client session: owns the connection, the typed contract clients, and the
//! locally cached derived state. Reads flow one way into the cache; writes
//! round-trip through confirmation and force a re-read of whatever they may
//! have changed.

use crate::{
    amount::MintAmountInput,
    chain::{
        ChainTransport,
        Connection,
        PendingCall,
        TxReceipt,
    },
    claims::ClaimEligibilityEngine,
    contracts::{
        GovernanceContract,
        MAX_TOKEN_SUPPLY,
        NftContract,
        TOKENS_PER_NFT,
        TokenContract,
        WhitelistContract,
    },
    deployment::ContractAddresses,
    poller::{
        PollOutcome,
        Poller,
    },
    proposals::{
        Proposal,
        ProposalState,
        ProposalStore,
        Vote,
        classify,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
    time::Duration,
};
use tracing::warn;

const MAX_LOGGED_ERRORS: usize = 50;

/// Where the NFT sale currently stands, derived from the contract's
/// `presaleStarted` flag and `presaleEnded` timestamp.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PresalePhase {
    NotStarted,
    Active,
    Ended,
}

/// Derived, replaceable view of the remote contracts. The contracts remain
/// the source of truth; nothing here is fresher than the last successful
/// read, and every refresh replaces values wholesale.
#[derive(Clone, Debug)]
pub struct DashboardState {
    pub treasury_balance: u128,
    pub num_proposals: u64,
    pub proposals: Vec<Proposal>,
    pub nft_balance: u64,
    pub nfts_minted: u64,
    pub token_balance: u128,
    pub total_supply: u128,
    pub unclaimed_tokens: u64,
    pub presale: PresalePhase,
    pub is_owner: bool,
    pub whitelisted: bool,
    pub num_whitelisted: u64,
    pub mint_amount: MintAmountInput,
    /// True while a submitted write is awaiting confirmation.
    pub loading: bool,
    pub status: String,
    pub errors: Vec<String>,
}

impl DashboardState {
    fn new() -> Self {
        Self {
            treasury_balance: 0,
            num_proposals: 0,
            proposals: Vec::new(),
            nft_balance: 0,
            nfts_minted: 0,
            token_balance: 0,
            total_supply: 0,
            unclaimed_tokens: 0,
            presale: PresalePhase::NotStarted,
            is_owner: false,
            whitelisted: false,
            num_whitelisted: 0,
            mint_amount: MintAmountInput::new(MAX_TOKEN_SUPPLY),
            loading: false,
            status: String::from("Ready"),
            errors: Vec::new(),
        }
    }

    /// Proposals paired with the action currently valid for each.
    pub fn proposals_with_state(&self, now: u64) -> Vec<(Proposal, ProposalState)> {
        self.proposals
            .iter()
            .map(|p| (p.clone(), classify(p, now)))
            .collect()
    }
}

pub struct Session<T> {
    connection: Connection<T>,
    whitelist: WhitelistContract<T>,
    nft: NftContract<T>,
    token: TokenContract<T>,
    governance: GovernanceContract<T>,
    proposals: ProposalStore<T>,
    claims: ClaimEligibilityEngine<T>,
    state: Arc<Mutex<DashboardState>>,
}

impl<T> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            whitelist: self.whitelist.clone(),
            nft: self.nft.clone(),
            token: self.token.clone(),
            governance: self.governance.clone(),
            proposals: self.proposals.clone(),
            claims: self.claims.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T: ChainTransport> Session<T> {
    pub fn new(connection: Connection<T>, addresses: ContractAddresses) -> Self {
        let whitelist = WhitelistContract::new(addresses.whitelist, connection.clone());
        let nft = NftContract::new(addresses.nft, connection.clone());
        let token = TokenContract::new(addresses.token, connection.clone());
        let governance =
            GovernanceContract::new(addresses.governance, connection.clone());
        let proposals = ProposalStore::new(governance.clone());
        let claims = ClaimEligibilityEngine::new(nft.clone(), token.clone());
        Self {
            connection,
            whitelist,
            nft,
            token,
            governance,
            proposals,
            claims,
            state: Arc::new(Mutex::new(DashboardState::new())),
        }
    }

    /// Snapshot of the derived state as of the last completed reads.
    pub fn state(&self) -> DashboardState {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap()
    }

    fn set_status(&self, status: impl Into<String>) {
        self.lock_state().status = status.into();
    }

    fn push_error(&self, message: String) {
        warn!("{message}");
        let mut state = self.lock_state();
        state.errors.push(message);
        if state.errors.len() > MAX_LOGGED_ERRORS {
            let drain = state.errors.len() - MAX_LOGGED_ERRORS;
            state.errors.drain(0..drain);
        }
    }

    /// "Now" as the chain sees it: the latest confirmed block's timestamp.
    /// Deadline checks use this rather than the local clock so the client
    /// agrees with what the contracts enforce.
    pub async fn chain_time(&self) -> Result<u64> {
        self.connection.latest_timestamp().await
    }

    // ---- read pipelines -------------------------------------------------

    /// Refresh the governance view: treasury balance, proposal count, and
    /// the full proposal listing (best-effort per proposal).
    pub async fn refresh_proposals(&self) -> Result<()> {
        let treasury_balance = self.governance.treasury_balance().await?;
        let num_proposals = self.governance.num_proposals().await?;
        let proposals = self.proposals.fetch_all(num_proposals).await;
        let mut state = self.lock_state();
        state.treasury_balance = treasury_balance;
        state.num_proposals = num_proposals;
        state.proposals = proposals;
        Ok(())
    }

    /// Refresh supply counters and the caller's holdings and entitlement.
    /// Requires an authenticated identity for the per-address reads.
    pub async fn refresh_claims(&self) -> Result<()> {
        let me = self.connection.address()?;
        let total_supply = self.token.total_supply().await?;
        let nfts_minted = self.nft.token_ids().await?;
        let num_whitelisted = self.whitelist.num_addresses_whitelisted().await?;
        let token_balance = self.token.balance_of(me).await?;
        let nft_balance = self.nft.balance_of(me).await?;
        let whitelisted = self.whitelist.whitelisted_addresses(me).await?;
        // Fail-closed: any enumeration failure inside reports zero.
        let unclaimed_nfts = self.claims.unclaimed_count(me).await;
        let unclaimed_tokens = unclaimed_nfts * TOKENS_PER_NFT;
        let mut state = self.lock_state();
        state.total_supply = total_supply;
        state.nfts_minted = nfts_minted;
        state.num_whitelisted = num_whitelisted;
        state.token_balance = token_balance;
        state.nft_balance = nft_balance;
        state.whitelisted = whitelisted;
        state.unclaimed_tokens = unclaimed_tokens;
        Ok(())
    }

    /// Refresh the presale phase. Reports `Settled` once the presale has
    /// ended, since the phase can no longer change after that.
    pub async fn refresh_presale(&self) -> Result<PollOutcome> {
        let started = self.nft.presale_started().await?;
        let phase = if !started {
            PresalePhase::NotStarted
        } else if self.chain_time().await? >= self.nft.presale_ended().await? {
            PresalePhase::Ended
        } else {
            PresalePhase::Active
        };
        let is_owner = match self.connection.address() {
            Ok(me) => self.nft.owner().await? == me,
            Err(_) => false,
        };
        let mut state = self.lock_state();
        state.presale = phase;
        state.is_owner = is_owner;
        Ok(if phase == PresalePhase::Ended {
            PollOutcome::Settled
        } else {
            PollOutcome::Continue
        })
    }

    // ---- local input -----------------------------------------------------

    /// Run one edit of the mint-amount entry through the validator.
    pub fn edit_mint_amount(&self, raw: &str) {
        self.lock_state().mint_amount.apply_edit(raw);
    }

    // ---- write actions ---------------------------------------------------

    /// Await settlement of a submitted write, holding the loading flag for
    /// the duration. No timeout is applied: if the node never answers, this
    /// suspends indefinitely, which is a documented liveness limit of the
    /// design. A contract rejection is recorded and returned, never
    /// swallowed. Failed writes are not retried here; the caller must
    /// re-initiate.
    async fn confirm(&self, pending: PendingCall<T>) -> Result<TxReceipt> {
        self.lock_state().loading = true;
        let outcome = pending.confirmed().await;
        self.lock_state().loading = false;
        if let Err(error) = &outcome {
            self.push_error(format!("{error:#}"));
        }
        outcome
    }

    pub async fn join_whitelist(&self) -> Result<()> {
        let pending = self.whitelist.add_address_to_whitelist().await?;
        self.confirm(pending).await?;
        self.refresh_claims().await?;
        self.set_status("Joined the whitelist");
        Ok(())
    }

    /// Owner-only: open the presale window.
    pub async fn start_presale(&self) -> Result<()> {
        let pending = self.nft.start_presale().await?;
        self.confirm(pending).await?;
        self.refresh_presale().await?;
        self.set_status("Presale started");
        Ok(())
    }

    pub async fn presale_mint(&self) -> Result<()> {
        let pending = self.nft.presale_mint().await?;
        self.confirm(pending).await?;
        self.refresh_claims().await?;
        self.set_status("Minted one NFT in the presale");
        Ok(())
    }

    pub async fn public_mint(&self) -> Result<()> {
        let pending = self.nft.mint().await?;
        self.confirm(pending).await?;
        self.refresh_claims().await?;
        self.set_status("Minted one NFT");
        Ok(())
    }

    /// Bulk-purchase the currently entered (validated) token amount.
    pub async fn mint_tokens(&self) -> Result<()> {
        let amount = self.lock_state().mint_amount.value();
        if amount == 0 {
            return Err(eyre!("no token amount entered"));
        }
        let pending = self.token.mint(amount).await?;
        self.confirm(pending).await?;
        self.refresh_claims().await?;
        self.set_status(format!("Minted {amount} token(s)"));
        Ok(())
    }

    /// Claim the free grant for every held, unclaimed NFT.
    pub async fn claim_tokens(&self) -> Result<()> {
        let pending = self.token.claim().await?;
        self.confirm(pending).await?;
        self.refresh_claims().await?;
        self.set_status("Claimed tokens");
        Ok(())
    }

    pub async fn create_proposal(&self, nft_token_id: u64) -> Result<()> {
        let pending = self.governance.create_proposal(nft_token_id).await?;
        self.confirm(pending).await?;
        self.refresh_proposals().await?;
        self.set_status(format!("Created proposal for NFT #{nft_token_id}"));
        Ok(())
    }

    /// Cast a vote. Whether the caller already voted is the contract's call;
    /// its rejection is surfaced rather than predicted.
    pub async fn vote(&self, proposal_id: u64, vote: Vote) -> Result<()> {
        let pending = self.governance.vote_on_proposal(proposal_id, vote).await?;
        self.confirm(pending).await?;
        self.refresh_proposals().await?;
        self.set_status(format!("Voted {vote:?} on proposal {proposal_id}"));
        Ok(())
    }

    pub async fn execute(&self, proposal_id: u64) -> Result<()> {
        let pending = self.governance.execute_proposal(proposal_id).await?;
        self.confirm(pending).await?;
        self.refresh_proposals().await?;
        self.set_status(format!("Executed proposal {proposal_id}"));
        Ok(())
    }

    // ---- polling ---------------------------------------------------------

    /// Start the recurring refresh timers. Each tick independently retries
    /// regardless of the previous tick's outcome; ticks are pure reads.
    pub fn spawn_pollers(&self, interval: Duration) -> PollingCoordinator {
        let proposals = {
            let session = self.clone();
            Poller::spawn("proposals", interval, move || {
                let session = session.clone();
                Box::pin(async move {
                    if let Err(error) = session.refresh_proposals().await {
                        warn!(%error, "proposal refresh tick failed");
                    }
                    PollOutcome::Continue
                })
            })
        };
        let claims = {
            let session = self.clone();
            Poller::spawn("claims", interval, move || {
                let session = session.clone();
                Box::pin(async move {
                    if let Err(error) = session.refresh_claims().await {
                        warn!(%error, "claim refresh tick failed");
                    }
                    PollOutcome::Continue
                })
            })
        };
        let presale = {
            let session = self.clone();
            Poller::spawn("presale", interval, move || {
                let session = session.clone();
                Box::pin(async move {
                    match session.refresh_presale().await {
                        Ok(outcome) => outcome,
                        Err(error) => {
                            warn!(%error, "presale refresh tick failed");
                            PollOutcome::Continue
                        }
                    }
                })
            })
        };
        PollingCoordinator {
            proposals,
            claims,
            presale,
        }
    }
}

/// The session's refresh timers. Dropping the coordinator aborts all of
/// them, so no timer outlives the session it belongs to.
pub struct PollingCoordinator {
    pub proposals: Poller,
    pub claims: Poller,
    pub presale: Poller,
}

impl PollingCoordinator {
    pub async fn shutdown(self) {
        self.proposals.stopped().await;
        self.claims.stopped().await;
        self.presale.stopped().await;
    }
}
