//! Canary split and state-machine tests

use super::{StubProvider, resilient};
use crate::core::router::{Engine, EngineOptions, RoutingPolicy};
use crate::utils::error::GatewayError;

fn two_provider_engine() -> Engine {
    // "a" is primary (cheapest), "b" is the canary candidate.
    Engine::new(
        vec![
            resilient(StubProvider::new("a", 1.0)),
            resilient(StubProvider::new("b", 2.0)),
        ],
        EngineOptions::default(),
    )
}

#[tokio::test]
async fn test_candidate_is_second_cheapest() {
    let engine = two_provider_engine();
    let status = engine.canary_status();
    assert_eq!(status.candidate_provider.as_deref(), Some("b"));
    assert_eq!(status.stage_index, 0);
    assert_eq!(status.percent, 1.0);
    assert_eq!(status.window_size, 200);
}

#[tokio::test]
async fn test_single_provider_has_no_candidate_and_zero_percent() {
    let engine = Engine::new(
        vec![resilient(StubProvider::new("only", 1.0))],
        EngineOptions::default(),
    );
    let status = engine.canary_status();
    assert_eq!(status.candidate_provider, None);
    assert_eq!(status.percent, 0.0);

    // All canary traffic goes to the only provider.
    let chosen = engine
        .choose(RoutingPolicy::Canary, "")
        .expect("provider available");
    assert_eq!(chosen.name(), "only");
}

#[tokio::test]
async fn test_split_fraction_matches_stage_percent() {
    let engine = two_provider_engine();
    engine.configure_canary(vec![10.0], 200, 2.0);

    let mut candidate_picks = 0u32;
    for _ in 0..10_000 {
        let chosen = engine
            .choose(RoutingPolicy::Canary, "")
            .expect("provider available");
        if chosen.name() == "b" {
            candidate_picks += 1;
        }
    }
    // Expect 1000 +/- 3 * sqrt(900) with a seeded RNG.
    assert!(
        (910..=1090).contains(&candidate_picks),
        "candidate picked {candidate_picks} times"
    );
}

#[tokio::test]
async fn test_auto_advance_then_burn_rollback() {
    let engine = two_provider_engine();
    engine.configure_canary(vec![1.0, 5.0, 25.0], 200, 2.0);

    // 400 clean candidate calls advance twice.
    for _ in 0..400 {
        engine.record_result("b", false);
    }
    let status = engine.canary_status();
    assert_eq!(status.stage_index, 2);
    assert_eq!(status.percent, 25.0);
    assert_eq!(
        status.last_transition.map(|t| t.reason).as_deref(),
        Some("auto_advance")
    );

    // 200 failed candidate calls: the stats window fills with errors, and
    // the next boundary evaluation rolls back to stage 0.
    let candidate = engine.providers()[1].clone();
    for _ in 0..200 {
        candidate.stats().record(100, true);
        engine.record_result("b", true);
    }
    let status = engine.canary_status();
    assert_eq!(status.stage_index, 0);
    let reason = status.last_transition.map(|t| t.reason).unwrap_or_default();
    assert!(
        reason.starts_with("auto_rollback:burn="),
        "unexpected reason {reason}"
    );
}

#[tokio::test]
async fn test_non_candidate_calls_do_not_count() {
    let engine = two_provider_engine();
    engine.configure_canary(vec![1.0, 5.0], 10, 2.0);
    for _ in 0..100 {
        engine.record_result("a", false);
    }
    assert_eq!(engine.canary_status().stage_index, 0);
}

#[tokio::test]
async fn test_candidate_counts_regardless_of_routing_policy() {
    // Calls recorded against the candidate advance the window even when
    // another policy routed them.
    let engine = two_provider_engine();
    engine.configure_canary(vec![1.0, 5.0], 10, 2.0);
    for _ in 0..10 {
        engine.record_result("b", false);
    }
    assert_eq!(engine.canary_status().stage_index, 1);
}

#[tokio::test]
async fn test_advance_guardrail_rejects_burning_candidate() {
    let engine = two_provider_engine();
    let candidate = engine.providers()[1].clone();
    for _ in 0..20 {
        candidate.stats().record(100, true);
    }

    let err = engine.canary_advance(false).expect_err("guardrail");
    assert!(matches!(err, GatewayError::CanaryGuardrail { .. }));
    assert_eq!(engine.canary_status().stage_index, 0);

    // Force bypasses the guardrail.
    engine.canary_advance(true).expect("forced advance");
    assert_eq!(engine.canary_status().stage_index, 1);
}

#[tokio::test]
async fn test_advance_saturates_at_last_stage() {
    let engine = two_provider_engine();
    engine.configure_canary(vec![1.0, 5.0], 200, 2.0);
    engine.canary_advance(false).expect("advance");
    engine.canary_advance(false).expect("advance");
    engine.canary_advance(false).expect("advance");
    assert_eq!(engine.canary_status().stage_index, 1);
}

#[tokio::test]
async fn test_rollback_is_idempotent() {
    let engine = two_provider_engine();
    engine.canary_advance(true).expect("advance");
    engine.canary_rollback();
    let first = engine.canary_status();
    engine.canary_rollback();
    let second = engine.canary_status();
    assert_eq!(first.stage_index, 0);
    assert_eq!(second.stage_index, 0);
    assert_eq!(second.percent, first.percent);
}

#[tokio::test]
async fn test_configure_clamps_stage_index() {
    let engine = two_provider_engine();
    engine.configure_canary(vec![1.0, 5.0, 25.0], 200, 2.0);
    engine.canary_advance(true).expect("advance");
    engine.canary_advance(true).expect("advance");
    assert_eq!(engine.canary_status().stage_index, 2);

    // Shrinking the stage list clamps the index into range.
    engine.configure_canary(vec![50.0], 100, 3.0);
    let status = engine.canary_status();
    assert_eq!(status.stage_index, 0);
    assert_eq!(status.percent, 50.0);
    assert_eq!(status.window_size, 100);
}

#[tokio::test]
async fn test_canary_split_respects_zero_percent_stage() {
    let engine = two_provider_engine();
    engine.configure_canary(vec![0.0], 200, 2.0);
    for _ in 0..500 {
        let chosen = engine
            .choose(RoutingPolicy::Canary, "")
            .expect("provider available");
        assert_eq!(chosen.name(), "a");
    }
}
