#![allow(non_snake_case)]
use std::time::Duration;
use westpunks_client::{
    poller::PollOutcome,
    session::{
        PresalePhase,
        Session,
    },
    test_helpers::*,
};

#[tokio::test]
async fn read_only_session__can_refresh_proposals_but_not_write() {
    let ctx = TestContext::new();
    let session = Session::new(ctx.read_only(), FakeChain::addresses());
    ctx.chain
        .seed_proposal(1, ctx.chain.now() + WINDOW_SECS, 0, 0, false);

    // public reads work without a signer
    session.refresh_proposals().await.unwrap();
    assert_eq!(session.state().proposals.len(), 1);

    // identity-dependent reads and writes do not
    assert!(session.refresh_claims().await.is_err());
    assert!(session.join_whitelist().await.is_err());
}

#[tokio::test]
async fn refresh_proposals__replaces_the_listing_wholesale() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    let now = ctx.chain.now();

    // given a refresh that saw two proposals, one of which failed to load
    ctx.chain.seed_proposal(1, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.seed_proposal(2, now + WINDOW_SECS, 0, 0, false);
    ctx.chain.fail_nth_call("proposals", 1);
    session.refresh_proposals().await.unwrap();
    assert_eq!(session.state().proposals.len(), 1);

    // when the next refresh runs clean
    session.refresh_proposals().await.unwrap();

    // then the earlier partial listing is gone, not merged with
    let ids: Vec<u64> = session
        .state()
        .proposals
        .iter()
        .map(|p| p.proposal_id)
        .collect();
    assert_eq!(ids, vec![0, 1]);
}

#[tokio::test]
async fn refresh_presale__settles_once_the_window_closes() {
    let ctx = TestContext::new();
    let session = ctx.owner_session();

    // before the owner opens the window the phase cannot settle
    assert_eq!(
        session.refresh_presale().await.unwrap(),
        PollOutcome::Continue
    );
    assert_eq!(session.state().presale, PresalePhase::NotStarted);

    session.start_presale().await.unwrap();
    assert_eq!(
        session.refresh_presale().await.unwrap(),
        PollOutcome::Continue
    );

    // when the chain clock passes the end of the window
    ctx.chain.advance(WINDOW_SECS);

    // then the phase is final and the poll reports it settled
    assert_eq!(
        session.refresh_presale().await.unwrap(),
        PollOutcome::Settled
    );
    assert_eq!(session.state().presale, PresalePhase::Ended);
}

#[tokio::test(start_paused = true)]
async fn spawned_pollers__populate_state_and_the_presale_timer_settles() {
    let ctx = TestContext::new();
    let session = ctx.owner_session();
    ctx.chain
        .seed_proposal(1, ctx.chain.now() + WINDOW_SECS, 0, 0, false);
    session.start_presale().await.unwrap();

    // when the timers have had a few ticks
    let pollers = session.spawn_pollers(Duration::from_secs(5));
    tokio::time::sleep(Duration::from_secs(12)).await;

    // then the read pipelines have filled the snapshot
    let state = session.state();
    assert_eq!(state.proposals.len(), 1);
    assert_eq!(state.presale, PresalePhase::Active);
    assert!(!pollers.presale.is_finished());

    // when the presale window closes on-chain
    ctx.chain.advance(WINDOW_SECS);
    tokio::time::sleep(Duration::from_secs(12)).await;

    // then the presale timer stopped itself; the others keep going
    assert_eq!(session.state().presale, PresalePhase::Ended);
    assert!(pollers.presale.is_finished());
    assert!(!pollers.proposals.is_finished());

    pollers.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn spawned_pollers__keep_ticking_through_failed_reads() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();
    ctx.chain
        .seed_proposal(1, ctx.chain.now() + WINDOW_SECS, 0, 0, false);

    // given the first proposal-count read fails outright
    ctx.chain.fail_nth_call("numProposals", 0);

    // when
    let pollers = session.spawn_pollers(Duration::from_secs(5));
    tokio::time::sleep(Duration::from_secs(12)).await;

    // then a later tick succeeded anyway
    assert_eq!(session.state().proposals.len(), 1);
    pollers.shutdown().await;
}

#[tokio::test]
async fn error_log__is_capped_at_fifty_entries() {
    let ctx = TestContext::new();
    let session = ctx.alice_session();

    // given sixty rejected writes
    for _ in 0..60 {
        ctx.chain.revert_next("claim", "nothing to claim");
        let _ = session.claim_tokens().await;
    }

    // then only the most recent fifty remain
    let errors = session.state().errors;
    assert_eq!(errors.len(), 50);
    assert!(errors.iter().all(|e| e.contains("nothing to claim")));
}
