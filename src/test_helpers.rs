//! In-memory chain for tests: four fake contracts behind the
//! `ChainTransport` seam, with injectable read failures and write reverts.
//! Writes queue on submit and only apply once their confirmation is awaited,
//! so tests can observe the submitted-but-not-settled window.

use crate::{
    chain::{
        Address,
        CallArg,
        CallValue,
        ChainTransport,
        Connection,
        TxHandle,
        TxReceipt,
    },
    contracts::{
        MAX_NFT_SUPPLY,
        MAX_TOKEN_SUPPLY,
        NFT_PRICE,
        TOKEN_PRICE,
        TOKENS_PER_NFT,
    },
    deployment::ContractAddresses,
    session::Session,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    sync::{
        Arc,
        Mutex,
    },
};

pub const WHITELIST_ADDRESS: Address = Address([0xA1; 20]);
pub const NFT_ADDRESS: Address = Address([0xA2; 20]);
pub const TOKEN_ADDRESS: Address = Address([0xA3; 20]);
pub const GOVERNANCE_ADDRESS: Address = Address([0xA4; 20]);

pub const OWNER: Address = Address([0xEE; 20]);
pub const ALICE: Address = Address([0xAA; 20]);
pub const BOB: Address = Address([0xBB; 20]);

/// How long a presale window or a proposal's voting window stays open,
/// in fake-clock seconds.
pub const WINDOW_SECS: u64 = 300;

#[derive(Clone, Debug)]
struct LedgerProposal {
    nft_token_id: u64,
    deadline: u64,
    yay_votes: u64,
    nay_votes: u64,
    executed: bool,
}

#[derive(Clone, Debug)]
struct PendingWrite {
    from: Address,
    contract: Address,
    method: &'static str,
    args: Vec<CallArg>,
    payment: u128,
}

struct Ledger {
    now: u64,
    block_height: u32,
    whitelist: BTreeSet<Address>,
    nft_holdings: BTreeMap<u64, Address>,
    next_token_id: u64,
    presale_started: bool,
    presale_end: u64,
    token_balances: BTreeMap<Address, u128>,
    total_supply: u128,
    claimed: BTreeSet<u64>,
    proposals: Vec<LedgerProposal>,
    voted: BTreeMap<u64, BTreeSet<u64>>,
    native_balances: BTreeMap<Address, u128>,
    pending: BTreeMap<u64, PendingWrite>,
    next_tx_id: u64,
    call_counts: BTreeMap<&'static str, u64>,
    planned_failures: BTreeMap<&'static str, BTreeSet<u64>>,
    forced_reverts: BTreeMap<&'static str, String>,
}

impl Ledger {
    fn tokens_of(&self, owner: Address) -> Vec<u64> {
        self.nft_holdings
            .iter()
            .filter(|(_, holder)| **holder == owner)
            .map(|(id, _)| *id)
            .collect()
    }

    fn unclaimed_of(&self, owner: Address) -> Vec<u64> {
        self.tokens_of(owner)
            .into_iter()
            .filter(|id| !self.claimed.contains(id))
            .collect()
    }
}

pub struct FakeChain {
    inner: Mutex<Ledger>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Ledger {
                now: 1_000_000,
                block_height: 1,
                whitelist: BTreeSet::new(),
                nft_holdings: BTreeMap::new(),
                next_token_id: 1,
                presale_started: false,
                presale_end: 0,
                token_balances: BTreeMap::new(),
                total_supply: 0,
                claimed: BTreeSet::new(),
                proposals: Vec::new(),
                voted: BTreeMap::new(),
                native_balances: BTreeMap::new(),
                pending: BTreeMap::new(),
                next_tx_id: 1,
                call_counts: BTreeMap::new(),
                planned_failures: BTreeMap::new(),
                forced_reverts: BTreeMap::new(),
            }),
        })
    }

    pub fn addresses() -> ContractAddresses {
        ContractAddresses {
            whitelist: WHITELIST_ADDRESS,
            nft: NFT_ADDRESS,
            token: TOKEN_ADDRESS,
            governance: GOVERNANCE_ADDRESS,
        }
    }

    // ---- test controls ---------------------------------------------------

    pub fn set_now(&self, now: u64) {
        self.inner.lock().unwrap().now = now;
    }

    pub fn now(&self) -> u64 {
        self.inner.lock().unwrap().now
    }

    pub fn advance(&self, secs: u64) {
        self.inner.lock().unwrap().now += secs;
    }

    /// Seed an NFT directly, bypassing the mint flow.
    pub fn grant_nft(&self, owner: Address) -> u64 {
        let mut ledger = self.inner.lock().unwrap();
        let id = ledger.next_token_id;
        ledger.next_token_id += 1;
        ledger.nft_holdings.insert(id, owner);
        id
    }

    pub fn set_claimed(&self, token_id: u64) {
        self.inner.lock().unwrap().claimed.insert(token_id);
    }

    /// Seed a proposal directly; returns its id.
    pub fn seed_proposal(
        &self,
        nft_token_id: u64,
        deadline: u64,
        yay_votes: u64,
        nay_votes: u64,
        executed: bool,
    ) -> u64 {
        let mut ledger = self.inner.lock().unwrap();
        ledger.proposals.push(LedgerProposal {
            nft_token_id,
            deadline,
            yay_votes,
            nay_votes,
            executed,
        });
        ledger.proposals.len() as u64 - 1
    }

    pub fn fund_native(&self, of: Address, amount: u128) {
        *self
            .inner
            .lock()
            .unwrap()
            .native_balances
            .entry(of)
            .or_insert(0) += amount;
    }

    /// Make the nth (0-based) invocation of a read method fail, one-shot.
    pub fn fail_nth_call(&self, method: &'static str, nth: u64) {
        self.inner
            .lock()
            .unwrap()
            .planned_failures
            .entry(method)
            .or_default()
            .insert(nth);
    }

    /// Make the next confirmation of a write method revert with `message`.
    pub fn revert_next(&self, method: &'static str, message: impl Into<String>) {
        self.inner
            .lock()
            .unwrap()
            .forced_reverts
            .insert(method, message.into());
    }

    pub fn read_count(&self, method: &'static str) -> u64 {
        self.inner
            .lock()
            .unwrap()
            .call_counts
            .get(method)
            .copied()
            .unwrap_or(0)
    }

    pub fn pending_writes(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    // ---- dispatch --------------------------------------------------------

    fn dispatch_read(
        ledger: &Ledger,
        contract: Address,
        method: &str,
        args: &[CallArg],
    ) -> Result<CallValue> {
        match (contract, method) {
            (WHITELIST_ADDRESS, "numAddressesWhitelisted") => {
                Ok(CallValue::Uint(ledger.whitelist.len() as u128))
            }
            (WHITELIST_ADDRESS, "whitelistedAddresses") => {
                let who = arg_address(args, 0)?;
                Ok(CallValue::Bool(ledger.whitelist.contains(&who)))
            }
            (NFT_ADDRESS, "presaleStarted") => {
                Ok(CallValue::Bool(ledger.presale_started))
            }
            (NFT_ADDRESS, "presaleEnded") => {
                Ok(CallValue::Uint(ledger.presale_end as u128))
            }
            (NFT_ADDRESS, "owner") => Ok(CallValue::Address(OWNER)),
            (NFT_ADDRESS, "tokenIds") => {
                Ok(CallValue::Uint(ledger.nft_holdings.len() as u128))
            }
            (NFT_ADDRESS, "balanceOf") => {
                let who = arg_address(args, 0)?;
                Ok(CallValue::Uint(ledger.tokens_of(who).len() as u128))
            }
            (NFT_ADDRESS, "tokenOfOwnerByIndex") => {
                let who = arg_address(args, 0)?;
                let index = arg_uint(args, 1)? as usize;
                ledger
                    .tokens_of(who)
                    .get(index)
                    .map(|id| CallValue::Uint(*id as u128))
                    .ok_or_else(|| eyre!("owner index out of bounds"))
            }
            (TOKEN_ADDRESS, "balanceOf") => {
                let who = arg_address(args, 0)?;
                Ok(CallValue::Uint(
                    ledger.token_balances.get(&who).copied().unwrap_or(0),
                ))
            }
            (TOKEN_ADDRESS, "totalSupply") => Ok(CallValue::Uint(ledger.total_supply)),
            (TOKEN_ADDRESS, "tokenIdsClaimed") => {
                let id = arg_uint(args, 0)? as u64;
                Ok(CallValue::Bool(ledger.claimed.contains(&id)))
            }
            (GOVERNANCE_ADDRESS, "numProposals") => {
                Ok(CallValue::Uint(ledger.proposals.len() as u128))
            }
            (GOVERNANCE_ADDRESS, "proposals") => {
                let id = arg_uint(args, 0)? as usize;
                let proposal = ledger
                    .proposals
                    .get(id)
                    .ok_or_else(|| eyre!("no proposal at index {id}"))?;
                Ok(CallValue::Record(vec![
                    (
                        "nftTokenId".to_string(),
                        CallValue::Uint(proposal.nft_token_id as u128),
                    ),
                    (
                        "deadline".to_string(),
                        CallValue::Uint(proposal.deadline as u128),
                    ),
                    (
                        "yayVotes".to_string(),
                        CallValue::Uint(proposal.yay_votes as u128),
                    ),
                    (
                        "nayVotes".to_string(),
                        CallValue::Uint(proposal.nay_votes as u128),
                    ),
                    ("executed".to_string(), CallValue::Bool(proposal.executed)),
                ]))
            }
            _ => Err(eyre!("unknown read '{method}' on {contract}")),
        }
    }

    fn apply_write(ledger: &mut Ledger, write: &PendingWrite) -> Result<()> {
        match (write.contract, write.method) {
            (WHITELIST_ADDRESS, "addAddressToWhitelist") => {
                if !ledger.whitelist.insert(write.from) {
                    return Err(eyre!("sender is already whitelisted"));
                }
                Ok(())
            }
            (NFT_ADDRESS, "startPresale") => {
                if write.from != OWNER {
                    return Err(eyre!("caller is not the owner"));
                }
                ledger.presale_started = true;
                ledger.presale_end = ledger.now + WINDOW_SECS;
                Ok(())
            }
            (NFT_ADDRESS, "presaleMint") => {
                if !ledger.presale_started || ledger.now >= ledger.presale_end {
                    return Err(eyre!("presale is not running"));
                }
                if !ledger.whitelist.contains(&write.from) {
                    return Err(eyre!("sender is not whitelisted"));
                }
                Self::mint_nft(ledger, write)
            }
            (NFT_ADDRESS, "mint") => {
                if !ledger.presale_started || ledger.now < ledger.presale_end {
                    return Err(eyre!("presale has not ended yet"));
                }
                Self::mint_nft(ledger, write)
            }
            (TOKEN_ADDRESS, "mint") => {
                let amount = arg_uint(&write.args, 0)?;
                if write.payment < amount * TOKEN_PRICE {
                    return Err(eyre!("payment below token price"));
                }
                if ledger.total_supply + amount > MAX_TOKEN_SUPPLY as u128 {
                    return Err(eyre!("exceeds the max total supply"));
                }
                *ledger.token_balances.entry(write.from).or_insert(0) += amount;
                ledger.total_supply += amount;
                Ok(())
            }
            (TOKEN_ADDRESS, "claim") => {
                let unclaimed = ledger.unclaimed_of(write.from);
                if unclaimed.is_empty() {
                    return Err(eyre!("sender has no tokens to claim"));
                }
                let grant = unclaimed.len() as u128 * TOKENS_PER_NFT as u128;
                for id in unclaimed {
                    ledger.claimed.insert(id);
                }
                *ledger.token_balances.entry(write.from).or_insert(0) += grant;
                ledger.total_supply += grant;
                Ok(())
            }
            (GOVERNANCE_ADDRESS, "createProposal") => {
                if ledger.tokens_of(write.from).is_empty() {
                    return Err(eyre!("sender is not a DAO member"));
                }
                let nft_token_id = arg_uint(&write.args, 0)? as u64;
                let deadline = ledger.now + WINDOW_SECS;
                ledger.proposals.push(LedgerProposal {
                    nft_token_id,
                    deadline,
                    yay_votes: 0,
                    nay_votes: 0,
                    executed: false,
                });
                Ok(())
            }
            (GOVERNANCE_ADDRESS, "voteOnProposal") => {
                let id = arg_uint(&write.args, 0)? as u64;
                let choice = arg_uint(&write.args, 1)?;
                let deadline = {
                    let proposal = ledger
                        .proposals
                        .get(id as usize)
                        .ok_or_else(|| eyre!("no proposal {id}"))?;
                    if proposal.executed {
                        return Err(eyre!("proposal already executed"));
                    }
                    proposal.deadline
                };
                if ledger.now >= deadline {
                    return Err(eyre!("deadline has been exceeded"));
                }
                let held = ledger.tokens_of(write.from);
                let used = ledger.voted.entry(id).or_default();
                let fresh: Vec<u64> = held
                    .into_iter()
                    .filter(|token| !used.contains(token))
                    .collect();
                if fresh.is_empty() {
                    return Err(eyre!("sender already voted"));
                }
                let weight = fresh.len() as u64;
                for token in fresh {
                    used.insert(token);
                }
                let proposal = &mut ledger.proposals[id as usize];
                if choice == 0 {
                    proposal.yay_votes += weight;
                } else {
                    proposal.nay_votes += weight;
                }
                Ok(())
            }
            (GOVERNANCE_ADDRESS, "executeProposal") => {
                let id = arg_uint(&write.args, 0)? as usize;
                let now = ledger.now;
                let proposal = ledger
                    .proposals
                    .get_mut(id)
                    .ok_or_else(|| eyre!("no proposal {id}"))?;
                if proposal.executed {
                    return Err(eyre!("proposal already executed"));
                }
                if now < proposal.deadline {
                    return Err(eyre!("deadline has not been exceeded"));
                }
                proposal.executed = true;
                Ok(())
            }
            _ => Err(eyre!(
                "unknown write '{}' on {}",
                write.method,
                write.contract
            )),
        }
    }

    fn mint_nft(ledger: &mut Ledger, write: &PendingWrite) -> Result<()> {
        if write.payment < NFT_PRICE {
            return Err(eyre!("payment below NFT price"));
        }
        if ledger.nft_holdings.len() as u64 >= MAX_NFT_SUPPLY {
            return Err(eyre!("exceeded the collection size"));
        }
        let id = ledger.next_token_id;
        ledger.next_token_id += 1;
        ledger.nft_holdings.insert(id, write.from);
        Ok(())
    }
}

fn arg_address(args: &[CallArg], index: usize) -> Result<Address> {
    match args.get(index) {
        Some(CallArg::Address(a)) => Ok(*a),
        other => Err(eyre!("expected address argument, got {other:?}")),
    }
}

fn arg_uint(args: &[CallArg], index: usize) -> Result<u128> {
    match args.get(index) {
        Some(CallArg::Uint(v)) => Ok(*v),
        other => Err(eyre!("expected uint argument, got {other:?}")),
    }
}

impl ChainTransport for FakeChain {
    async fn call(
        &self,
        contract: Address,
        method: &'static str,
        args: Vec<CallArg>,
    ) -> Result<CallValue> {
        let mut ledger = self.inner.lock().unwrap();
        let seen = ledger.call_counts.entry(method).or_insert(0);
        let nth = *seen;
        *seen += 1;
        if let Some(planned) = ledger.planned_failures.get_mut(method) {
            if planned.remove(&nth) {
                return Err(eyre!("injected failure for '{method}' (call {nth})"));
            }
        }
        Self::dispatch_read(&ledger, contract, method, &args)
    }

    async fn submit(
        &self,
        from: Address,
        contract: Address,
        method: &'static str,
        args: Vec<CallArg>,
        payment: u128,
    ) -> Result<TxHandle> {
        let mut ledger = self.inner.lock().unwrap();
        let id = ledger.next_tx_id;
        ledger.next_tx_id += 1;
        ledger.pending.insert(
            id,
            PendingWrite {
                from,
                contract,
                method,
                args,
                payment,
            },
        );
        Ok(TxHandle { id })
    }

    async fn await_confirmation(&self, tx: TxHandle) -> Result<TxReceipt> {
        let mut ledger = self.inner.lock().unwrap();
        let write = ledger
            .pending
            .remove(&tx.id)
            .ok_or_else(|| eyre!("unknown transaction {}", tx.id))?;
        if let Some(message) = ledger.forced_reverts.remove(write.method) {
            return Err(eyre!(message));
        }
        Self::apply_write(&mut ledger, &write)?;
        ledger.block_height += 1;
        Ok(TxReceipt {
            block_height: ledger.block_height,
        })
    }

    async fn native_balance(&self, of: Address) -> Result<u128> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .native_balances
            .get(&of)
            .copied()
            .unwrap_or(0))
    }

    async fn latest_timestamp(&self) -> Result<u64> {
        Ok(self.inner.lock().unwrap().now)
    }
}

/// Shared setup for integration tests: one fake chain and ready-made
/// connections for the contract owner and a regular user.
pub struct TestContext {
    pub chain: Arc<FakeChain>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            chain: FakeChain::new(),
        }
    }

    pub fn read_only(&self) -> Connection<FakeChain> {
        Connection::read_only(self.chain.clone())
    }

    pub fn connected_as(&self, address: Address) -> Connection<FakeChain> {
        Connection::authenticated(self.chain.clone(), address)
    }

    pub fn owner_session(&self) -> Session<FakeChain> {
        Session::new(self.connected_as(OWNER), FakeChain::addresses())
    }

    pub fn alice_session(&self) -> Session<FakeChain> {
        Session::new(self.connected_as(ALICE), FakeChain::addresses())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
