//! Proposal lifecycle tracking: fetch, tally, and classification of which
//! action is currently valid for a governance proposal.

use crate::{
    chain::ChainTransport,
    contracts::GovernanceContract,
};
use tracing::warn;

/// One governance proposal as read from the chain. `proposal_id` is assigned
/// sequentially by the contract at creation and doubles as the fetch index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Proposal {
    pub proposal_id: u64,
    pub nft_token_id: u64,
    /// Absolute deadline, seconds since epoch. Fixed at creation.
    pub deadline: u64,
    pub yay_votes: u64,
    pub nay_votes: u64,
    /// Terminal flag. Once true, vote counts no longer change.
    pub executed: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Vote {
    Yay,
    Nay,
}

impl Vote {
    /// Encoding used by `voteOnProposal` on the wire.
    pub fn wire_value(self) -> u8 {
        match self {
            Vote::Yay => 0,
            Vote::Nay => 1,
        }
    }
}

/// Which action, if any, is currently valid for a proposal.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProposalState {
    /// Deadline not reached; a vote may be cast. Whether the caller has
    /// already voted is enforced by the contract, not predicted here.
    Voting,
    /// Deadline passed, not yet executed. `leaning` is an advisory outcome
    /// label only; a tie reads as Nay because the comparison is strictly
    /// yay > nay.
    ReadyToExecute { leaning: Vote },
    /// Terminal. No actions.
    Executed,
}

/// Pure classification of a proposal against the current time.
pub fn classify(proposal: &Proposal, now: u64) -> ProposalState {
    if proposal.executed {
        return ProposalState::Executed;
    }
    if now < proposal.deadline {
        return ProposalState::Voting;
    }
    let leaning = if proposal.yay_votes > proposal.nay_votes {
        Vote::Yay
    } else {
        Vote::Nay
    };
    ProposalState::ReadyToExecute { leaning }
}

/// Fetches proposals by sequential id and assembles the typed collection.
pub struct ProposalStore<T> {
    governance: GovernanceContract<T>,
}

impl<T> Clone for ProposalStore<T> {
    fn clone(&self) -> Self {
        Self {
            governance: self.governance.clone(),
        }
    }
}

impl<T: ChainTransport> ProposalStore<T> {
    pub fn new(governance: GovernanceContract<T>) -> Self {
        Self { governance }
    }

    /// Fetch proposals `0..count`, skipping any single id whose read fails.
    /// Listing is informational, so a best-effort collection beats aborting
    /// the whole fetch; each failure is logged and dropped.
    pub async fn fetch_all(&self, count: u64) -> Vec<Proposal> {
        let mut proposals = Vec::with_capacity(count as usize);
        for id in 0..count {
            match self.governance.proposal(id).await {
                Ok(proposal) => proposals.push(proposal),
                Err(error) => {
                    warn!(%id, %error, "skipping proposal that failed to fetch");
                }
            }
        }
        proposals
    }
}
