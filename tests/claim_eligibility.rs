#![allow(non_snake_case)]
use westpunks_client::test_helpers::*;

#[tokio::test]
async fn refresh_claims__zero_nft_balance_skips_enumeration() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // when alice holds nothing
    session.refresh_claims().await.unwrap();

    // then no per-index reads were issued at all
    assert_eq!(session.state().unclaimed_tokens, 0);
    assert_eq!(ctx.chain.read_count("tokenOfOwnerByIndex"), 0);
}

#[tokio::test]
async fn refresh_claims__counts_only_unclaimed_nfts() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // given three NFTs, one already claimed against
    let first = ctx.chain.grant_nft(ALICE);
    ctx.chain.grant_nft(ALICE);
    ctx.chain.grant_nft(ALICE);
    ctx.chain.set_claimed(first);

    // when
    session.refresh_claims().await.unwrap();

    // then
    let state = session.state();
    assert_eq!(state.nft_balance, 3);
    assert_eq!(state.unclaimed_tokens, 2 * 10);
}

#[tokio::test]
async fn refresh_claims__a_failed_claimed_lookup_reports_zero() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // given two NFTs, neither claimed, but the second lookup will fail
    ctx.chain.grant_nft(ALICE);
    ctx.chain.grant_nft(ALICE);
    ctx.chain.fail_nth_call("tokenIdsClaimed", 1);

    // when
    session.refresh_claims().await.unwrap();

    // then the entitlement reads zero rather than a partial count
    assert_eq!(session.state().unclaimed_tokens, 0);
}

#[tokio::test]
async fn refresh_claims__recovers_on_the_next_pass() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // given a one-shot failure
    ctx.chain.grant_nft(ALICE);
    ctx.chain.fail_nth_call("tokenIdsClaimed", 0);
    session.refresh_claims().await.unwrap();
    assert_eq!(session.state().unclaimed_tokens, 0);

    // when the next refresh runs clean
    session.refresh_claims().await.unwrap();

    // then
    assert_eq!(session.state().unclaimed_tokens, 10);
}

#[tokio::test]
async fn claim_tokens__grants_ten_per_unclaimed_nft() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // given
    let first = ctx.chain.grant_nft(ALICE);
    ctx.chain.grant_nft(ALICE);
    ctx.chain.set_claimed(first);

    // when
    session.claim_tokens().await.unwrap();

    // then the grant landed and the entitlement is now zero
    let state = session.state();
    assert_eq!(state.token_balance, 10);
    assert_eq!(state.unclaimed_tokens, 0);
    assert_eq!(state.status, "Claimed tokens");
}

#[tokio::test]
async fn claim_tokens__with_nothing_to_claim_is_rejected() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // when
    let result = session.claim_tokens().await;

    // then
    assert!(result.is_err());
    assert!(
        session
            .state()
            .errors
            .iter()
            .any(|e| e.contains("no tokens to claim"))
    );
}
