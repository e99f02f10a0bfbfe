//! Typed call surfaces for the four deployed contracts. Each wrapper holds a
//! fixed contract address and the session connection, and builds a reader or
//! writer per call so a missing signer fails at the call site.

use crate::{
    chain::{
        Address,
        CallArg,
        ChainTransport,
        Connection,
        PendingCall,
    },
    proposals::{
        Proposal,
        Vote,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};

/// Price of one NFT in native base units (0.01 with 18 decimals).
pub const NFT_PRICE: u128 = 10_000_000_000_000_000;
/// Price of one fungible token in native base units (0.001 with 18 decimals).
pub const TOKEN_PRICE: u128 = 1_000_000_000_000_000;
/// Tokens granted per unclaimed NFT on `claim()`.
pub const TOKENS_PER_NFT: u64 = 10;
/// Collection cap enforced by the NFT contract.
pub const MAX_NFT_SUPPLY: u64 = 20;
/// Issuance cap enforced by the token contract; also the bulk-purchase bound.
pub const MAX_TOKEN_SUPPLY: u64 = 10_000;

macro_rules! contract_client {
    ($name:ident) => {
        pub struct $name<T> {
            address: Address,
            connection: Connection<T>,
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    address: self.address,
                    connection: self.connection.clone(),
                }
            }
        }

        impl<T: ChainTransport> $name<T> {
            pub fn new(address: Address, connection: Connection<T>) -> Self {
                Self {
                    address,
                    connection,
                }
            }

            pub fn address(&self) -> Address {
                self.address
            }
        }
    };
}

contract_client!(WhitelistContract);
contract_client!(NftContract);
contract_client!(TokenContract);
contract_client!(GovernanceContract);

impl<T: ChainTransport> WhitelistContract<T> {
    pub async fn num_addresses_whitelisted(&self) -> Result<u64> {
        self.connection
            .reader(self.address)?
            .get("numAddressesWhitelisted", vec![])
            .await?
            .as_u64()
    }

    pub async fn whitelisted_addresses(&self, who: Address) -> Result<bool> {
        self.connection
            .reader(self.address)?
            .get("whitelistedAddresses", vec![CallArg::Address(who)])
            .await?
            .as_bool()
    }

    pub async fn add_address_to_whitelist(&self) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit("addAddressToWhitelist", vec![], 0)
            .await
    }
}

impl<T: ChainTransport> NftContract<T> {
    pub async fn presale_started(&self) -> Result<bool> {
        self.connection
            .reader(self.address)?
            .get("presaleStarted", vec![])
            .await?
            .as_bool()
    }

    /// Timestamp (seconds since epoch) at which the presale window closes.
    pub async fn presale_ended(&self) -> Result<u64> {
        self.connection
            .reader(self.address)?
            .get("presaleEnded", vec![])
            .await?
            .as_u64()
    }

    pub async fn owner(&self) -> Result<Address> {
        self.connection
            .reader(self.address)?
            .get("owner", vec![])
            .await?
            .as_address()
    }

    /// Count of NFTs minted so far.
    pub async fn token_ids(&self) -> Result<u64> {
        self.connection
            .reader(self.address)?
            .get("tokenIds", vec![])
            .await?
            .as_u64()
    }

    pub async fn balance_of(&self, owner: Address) -> Result<u64> {
        self.connection
            .reader(self.address)?
            .get("balanceOf", vec![CallArg::Address(owner)])
            .await?
            .as_u64()
    }

    pub async fn token_of_owner_by_index(
        &self,
        owner: Address,
        index: u64,
    ) -> Result<u64> {
        self.connection
            .reader(self.address)?
            .get(
                "tokenOfOwnerByIndex",
                vec![CallArg::Address(owner), CallArg::Uint(index as u128)],
            )
            .await?
            .as_u64()
    }

    pub async fn start_presale(&self) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit("startPresale", vec![], 0)
            .await
    }

    pub async fn presale_mint(&self) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit("presaleMint", vec![], NFT_PRICE)
            .await
    }

    pub async fn mint(&self) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit("mint", vec![], NFT_PRICE)
            .await
    }
}

impl<T: ChainTransport> TokenContract<T> {
    pub async fn balance_of(&self, owner: Address) -> Result<u128> {
        self.connection
            .reader(self.address)?
            .get("balanceOf", vec![CallArg::Address(owner)])
            .await?
            .as_uint()
    }

    pub async fn total_supply(&self) -> Result<u128> {
        self.connection
            .reader(self.address)?
            .get("totalSupply", vec![])
            .await?
            .as_uint()
    }

    pub async fn token_ids_claimed(&self, token_id: u64) -> Result<bool> {
        self.connection
            .reader(self.address)?
            .get("tokenIdsClaimed", vec![CallArg::Uint(token_id as u128)])
            .await?
            .as_bool()
    }

    /// Bulk purchase of `amount` tokens at `TOKEN_PRICE` each.
    pub async fn mint(&self, amount: u64) -> Result<PendingCall<T>> {
        let payment = TOKEN_PRICE
            .checked_mul(amount as u128)
            .ok_or_else(|| color_eyre::eyre::eyre!("mint payment overflows"))?;
        self.connection
            .writer(self.address)?
            .submit("mint", vec![CallArg::Uint(amount as u128)], payment)
            .await
    }

    /// Free claim of `TOKENS_PER_NFT` tokens per unclaimed held NFT.
    pub async fn claim(&self) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit("claim", vec![], 0)
            .await
    }
}

impl<T: ChainTransport> GovernanceContract<T> {
    pub async fn num_proposals(&self) -> Result<u64> {
        self.connection
            .reader(self.address)?
            .get("numProposals", vec![])
            .await?
            .as_u64()
    }

    /// Fetch and parse a single proposal record by its sequential id.
    pub async fn proposal(&self, id: u64) -> Result<Proposal> {
        let record = self
            .connection
            .reader(self.address)?
            .get("proposals", vec![CallArg::Uint(id as u128)])
            .await?;
        let parsed = Proposal {
            proposal_id: id,
            nft_token_id: record.field("nftTokenId")?.as_u64()?,
            deadline: record.field("deadline")?.as_u64()?,
            yay_votes: record.field("yayVotes")?.as_u64()?,
            nay_votes: record.field("nayVotes")?.as_u64()?,
            executed: record.field("executed")?.as_bool()?,
        };
        Ok(parsed)
    }

    pub async fn create_proposal(&self, nft_token_id: u64) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit(
                "createProposal",
                vec![CallArg::Uint(nft_token_id as u128)],
                0,
            )
            .await
    }

    pub async fn vote_on_proposal(
        &self,
        proposal_id: u64,
        vote: Vote,
    ) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit(
                "voteOnProposal",
                vec![
                    CallArg::Uint(proposal_id as u128),
                    CallArg::Uint(vote.wire_value() as u128),
                ],
                0,
            )
            .await
    }

    pub async fn execute_proposal(&self, proposal_id: u64) -> Result<PendingCall<T>> {
        self.connection
            .writer(self.address)?
            .submit(
                "executeProposal",
                vec![CallArg::Uint(proposal_id as u128)],
                0,
            )
            .await
    }

    /// Native-coin balance held by the governance treasury.
    pub async fn treasury_balance(&self) -> Result<u128> {
        self.connection
            .native_balance(self.address)
            .await
            .wrap_err("reading treasury balance failed")
    }
}
