#![allow(non_snake_case)]
use westpunks_client::{
    proposals::{
        ProposalState,
        Vote,
    },
    test_helpers::*,
};

#[tokio::test]
async fn refresh_proposals__lists_proposals_in_id_order() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given
    ctx.chain.seed_proposal(3, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.seed_proposal(7, now + WINDOW_SECS, 2, 1, false);
    ctx.chain.seed_proposal(9, now - 1, 5, 5, true);

    // when
    session.refresh_proposals().await.unwrap();

    // then
    let state = session.state();
    assert_eq!(state.num_proposals, 3);
    let ids: Vec<u64> = state.proposals.iter().map(|p| p.proposal_id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
    assert_eq!(state.proposals[1].nft_token_id, 7);
    assert_eq!(state.proposals[1].yay_votes, 2);
    assert!(state.proposals[2].executed);
}

#[tokio::test]
async fn refresh_proposals__skips_a_proposal_that_fails_to_load() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given three proposals where the middle fetch fails once
    ctx.chain.seed_proposal(1, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.seed_proposal(2, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.seed_proposal(3, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.fail_nth_call("proposals", 1);

    // when
    session.refresh_proposals().await.unwrap();

    // then the listing keeps the proposals that did load
    let state = session.state();
    assert_eq!(state.num_proposals, 3);
    let ids: Vec<u64> = state.proposals.iter().map(|p| p.proposal_id).collect();
    assert_eq!(ids, vec![0, 2]);
}

#[tokio::test]
async fn refresh_proposals__reports_the_treasury_balance() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // given
    ctx.chain.fund_native(GOVERNANCE_ADDRESS, 1_234);

    // when
    session.refresh_proposals().await.unwrap();

    // then
    assert_eq!(session.state().treasury_balance, 1_234);
}

#[tokio::test]
async fn create_proposal__appears_in_the_refreshed_listing() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // given alice holds an NFT, which makes her a member
    ctx.chain.grant_nft(ALICE);

    // when
    session.create_proposal(42).await.unwrap();

    // then the write round-tripped and the re-read picked it up
    let state = session.state();
    assert_eq!(state.proposals.len(), 1);
    assert_eq!(state.proposals[0].nft_token_id, 42);
    assert_eq!(state.status, "Created proposal for NFT #42");
}

#[tokio::test]
async fn create_proposal__without_an_nft_is_rejected() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // when
    let result = session.create_proposal(1).await;

    // then
    assert!(result.is_err());
    let errors = session.state().errors;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("not a DAO member"), "got: {}", errors[0]);
}

#[tokio::test]
async fn vote__adds_one_vote_per_held_nft() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given alice holds two NFTs and an open proposal exists
    ctx.chain.grant_nft(ALICE);
    ctx.chain.grant_nft(ALICE);
    let id = ctx.chain.seed_proposal(1, now + WINDOW_SECS, 0, 0, false);

    // when
    session.vote(id, Vote::Yay).await.unwrap();

    // then
    let state = session.state();
    assert_eq!(state.proposals[0].yay_votes, 2);
    assert_eq!(state.proposals[0].nay_votes, 0);
}

#[tokio::test]
async fn vote__twice_surfaces_the_contract_rejection() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given
    ctx.chain.grant_nft(ALICE);
    let id = ctx.chain.seed_proposal(1, now + WINDOW_SECS, 0, 0, false);
    session.vote(id, Vote::Nay).await.unwrap();

    // when the same NFT votes again
    let result = session.vote(id, Vote::Nay).await;

    // then the rejection is returned and recorded, and the tally is unchanged
    assert!(result.is_err());
    let state = session.state();
    assert_eq!(state.proposals[0].nay_votes, 1);
    assert!(state.errors.iter().any(|e| e.contains("already voted")));
}

#[tokio::test]
async fn vote__after_the_deadline_is_rejected() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given
    ctx.chain.grant_nft(ALICE);
    let id = ctx.chain.seed_proposal(1, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.advance(WINDOW_SECS);

    // when
    let result = session.vote(id, Vote::Yay).await;

    // then
    assert!(result.is_err());
}

#[tokio::test]
async fn execute__marks_the_proposal_executed() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given a proposal whose voting window has closed
    ctx.chain.grant_nft(ALICE);
    let id = ctx.chain.seed_proposal(5, now - 1, 3, 1, false);

    // when
    session.execute(id).await.unwrap();

    // then
    assert!(session.state().proposals[0].executed);
}

#[tokio::test]
async fn proposal_listing__classifies_each_entry() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given one open, one closed-and-tied, one closed-and-won, one executed
    ctx.chain.seed_proposal(1, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.seed_proposal(2, now - 1, 2, 2, false);
    ctx.chain.seed_proposal(3, now - 1, 3, 1, false);
    ctx.chain.seed_proposal(4, now - 1, 3, 1, true);
    session.refresh_proposals().await.unwrap();

    // when
    let listed = session.state().proposals_with_state(now);

    // then a tie leans Nay; only a strict yay majority leans Yay
    assert_eq!(listed[0].1, ProposalState::Voting);
    assert_eq!(
        listed[1].1,
        ProposalState::ReadyToExecute { leaning: Vote::Nay }
    );
    assert_eq!(
        listed[2].1,
        ProposalState::ReadyToExecute { leaning: Vote::Yay }
    );
    assert_eq!(listed[3].1, ProposalState::Executed);
}
