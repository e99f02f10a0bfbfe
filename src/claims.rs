//! Claim eligibility: how many of the caller's NFTs still have an
//! uncollected token grant.

use crate::{
    chain::{
        Address,
        ChainTransport,
    },
    contracts::{
        NftContract,
        TokenContract,
    },
};
use color_eyre::eyre::Result;
use tracing::warn;

/// Aggregates ownership and claimed-flag reads into an unclaimed-token count.
pub struct ClaimEligibilityEngine<T> {
    nft: NftContract<T>,
    token: TokenContract<T>,
}

impl<T> Clone for ClaimEligibilityEngine<T> {
    fn clone(&self) -> Self {
        Self {
            nft: self.nft.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T: ChainTransport> ClaimEligibilityEngine<T> {
    pub fn new(nft: NftContract<T>, token: TokenContract<T>) -> Self {
        Self { nft, token }
    }

    /// Count of held NFTs whose claim flag is still false.
    ///
    /// Unlike proposal listing, this fails closed: eligibility gates a
    /// value-bearing claim, and a partial count could misstate the
    /// entitlement. Any read failure mid-enumeration yields 0.
    pub async fn unclaimed_count(&self, owner: Address) -> u64 {
        match self.try_unclaimed_count(owner).await {
            Ok(count) => count,
            Err(error) => {
                warn!(%owner, %error, "claim eligibility read failed, reporting zero");
                0
            }
        }
    }

    async fn try_unclaimed_count(&self, owner: Address) -> Result<u64> {
        let held = self.nft.balance_of(owner).await?;
        if held == 0 {
            // Never enumerate an empty holding: indexable contracts may
            // revert on out-of-range enumeration.
            return Ok(0);
        }
        let mut unclaimed = 0;
        for index in 0..held {
            let token_id = self.nft.token_of_owner_by_index(owner, index).await?;
            if !self.token.token_ids_claimed(token_id).await? {
                unclaimed += 1;
            }
        }
        Ok(unclaimed)
    }
}
