mod common;

use common::{route_context, Harness, TENANT};
use payments_orchestrator::domain::context::Environment;
use payments_orchestrator::domain::provider::Provider;
use payments_orchestrator::domain::routing_decision::{RetryContext, RouteReason};
use payments_orchestrator::domain::rules::RuleConditions;
use uuid::Uuid;

fn retry(failed: Provider, code: &str, attempt_number: u32) -> RetryContext {
    RetryContext {
        failed_provider: failed,
        failure_code: Some(code.to_string()),
        failure_category: Some("processor_error".to_string()),
        attempt_number,
    }
}

#[tokio::test]
async fn conditions_filter_the_candidate_set() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.split_when(
        profile,
        Provider::Stripe,
        100,
        RuleConditions {
            currency: Some("EUR".into()),
            ..Default::default()
        },
    )
    .await;
    h.split_when(
        profile,
        Provider::Adyen,
        100,
        RuleConditions {
            currency: Some("usd".into()),
            max_amount_minor: Some(5_000),
            ..Default::default()
        },
    )
    .await;
    h.creds(Provider::Stripe).await;
    h.creds(Provider::Adyen).await;

    let orch = h.orchestrator();
    for _ in 0..20 {
        let d = orch.select_psp(&route_context(Uuid::new_v4(), 1000)).await.unwrap().unwrap();
        assert_eq!(d.provider, Provider::Adyen);
        assert_eq!(d.reason, RouteReason::WeightedRandom);
        assert_eq!(d.profile_id, Some(profile));
        assert_eq!(d.candidates.len(), 1);
    }
}

#[tokio::test]
async fn no_matching_rule_falls_back_to_legacy_route() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.split_when(
        profile,
        Provider::Stripe,
        100,
        RuleConditions {
            min_amount_minor: Some(1_000_000),
            ..Default::default()
        },
    )
    .await;
    h.creds(Provider::Chase).await;

    let d = h
        .orchestrator()
        .select_psp(&route_context(Uuid::new_v4(), 1000))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(d.provider, Provider::Chase);
    assert_eq!(d.reason, RouteReason::Default);
    assert_eq!(d.profile_id, None);
}

#[tokio::test]
async fn all_zero_weights_select_nothing() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.split(profile, Provider::Stripe, 0).await;
    h.split(profile, Provider::Adyen, 0).await;
    h.creds(Provider::Stripe).await;

    let d = h.orchestrator().select_psp(&route_context(Uuid::new_v4(), 1000)).await.unwrap();
    assert!(d.is_none());
    assert!(h.decisions.all().await.is_empty());
}

#[tokio::test]
async fn missing_credentials_fall_back_to_next_heaviest_candidate() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.split(profile, Provider::Stripe, 90).await;
    h.split(profile, Provider::Adyen, 10).await;
    h.split(profile, Provider::Chase, 5).await;
    // Stripe has a row that no longer decrypts; Chase has none at all.
    h.credentials
        .insert_undecryptable(TENANT, Provider::Stripe, Environment::Test)
        .await;
    h.creds(Provider::Adyen).await;

    let orch = h.orchestrator();
    for _ in 0..20 {
        let d = orch.select_psp(&route_context(Uuid::new_v4(), 1000)).await.unwrap().unwrap();
        assert_eq!(d.provider, Provider::Adyen);
        assert_eq!(d.reason, RouteReason::WeightedRandom);
        assert_eq!(d.candidates.len(), 3);
    }
}

#[tokio::test]
async fn no_credentials_anywhere_selects_nothing() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.split(profile, Provider::Stripe, 50).await;
    h.split(profile, Provider::Adyen, 50).await;

    let d = h.orchestrator().select_psp(&route_context(Uuid::new_v4(), 1000)).await.unwrap();
    assert!(d.is_none());
}

#[tokio::test]
async fn retry_rule_must_match_order_and_failure_code() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.retry_rule(profile, Provider::Stripe, Provider::Adyen, 1, 3, Some(vec!["timeout"]))
        .await;
    h.retry_rule(profile, Provider::Stripe, Provider::Chase, 2, 3, None).await;
    h.priority(profile, Provider::Nuvei, 1, true).await;
    for p in [Provider::Adyen, Provider::Chase, Provider::Nuvei] {
        h.creds(p).await;
    }
    let orch = h.orchestrator();
    let ctx = route_context(Uuid::new_v4(), 1000);

    let d = orch.select_retry_psp(&ctx, &retry(Provider::Stripe, "timeout", 1)).await.unwrap().unwrap();
    assert_eq!((d.provider, d.reason), (Provider::Adyen, RouteReason::Retry));

    // Code not listed on the order-1 rule: failover instead.
    let d = orch
        .select_retry_psp(&ctx, &retry(Provider::Stripe, "processor_error", 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((d.provider, d.reason), (Provider::Nuvei, RouteReason::Failover));

    let d = orch
        .select_retry_psp(&ctx, &retry(Provider::Stripe, "processor_error", 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!((d.provider, d.reason), (Provider::Chase, RouteReason::Retry));
    assert_eq!(d.retry_number, Some(2));
    assert_eq!(d.previous_provider, Some(Provider::Stripe));
}

#[tokio::test]
async fn retry_beyond_max_retries_fails_over() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.retry_rule(profile, Provider::Stripe, Provider::Adyen, 2, 1, None).await;
    h.priority(profile, Provider::Chase, 1, true).await;
    h.creds(Provider::Adyen).await;
    h.creds(Provider::Chase).await;

    let d = h
        .orchestrator()
        .select_retry_psp(&route_context(Uuid::new_v4(), 1000), &retry(Provider::Stripe, "timeout", 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(d.provider, Provider::Chase);
    assert_eq!(d.reason, RouteReason::Failover);
}

#[tokio::test]
async fn failover_walks_healthy_priorities_in_order() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.priority(profile, Provider::Stripe, 1, true).await;
    h.priority(profile, Provider::Adyen, 2, false).await;
    h.priority(profile, Provider::Nuvei, 4, true).await;
    h.priority(profile, Provider::Chase, 3, true).await;
    for p in [Provider::Stripe, Provider::Adyen, Provider::Nuvei, Provider::Chase] {
        h.creds(p).await;
    }

    let d = h
        .orchestrator()
        .select_retry_psp(&route_context(Uuid::new_v4(), 1000), &retry(Provider::Stripe, "timeout", 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(d.provider, Provider::Chase);
    assert_eq!(d.reason, RouteReason::Failover);
    assert!(d.is_retry);
    let shown: Vec<(Provider, u32)> = d.candidates.iter().map(|c| (c.provider, c.weight)).collect();
    assert_eq!(shown, vec![(Provider::Chase, 97), (Provider::Nuvei, 96)]);
}

#[tokio::test]
async fn failover_considers_at_most_five_providers() {
    let h = Harness::new();
    let profile = h.profile().await;
    let ordered = [
        Provider::Adyen,
        Provider::Chase,
        Provider::Nuvei,
        Provider::Dlocal,
        Provider::Braintree,
        Provider::Paypal,
    ];
    for (i, p) in ordered.iter().enumerate() {
        h.priority(profile, *p, i as i32 + 1, true).await;
    }
    // Only the sixth has credentials, so nothing inside the window resolves.
    h.creds(Provider::Paypal).await;

    let d = h
        .orchestrator()
        .select_retry_psp(&route_context(Uuid::new_v4(), 1000), &retry(Provider::Stripe, "timeout", 1))
        .await
        .unwrap();
    assert!(d.is_none());
}

#[tokio::test]
async fn retry_without_profile_has_no_route() {
    let h = Harness::new();
    h.creds(Provider::Adyen).await;
    let d = h
        .orchestrator()
        .select_retry_psp(&route_context(Uuid::new_v4(), 1000), &retry(Provider::Stripe, "timeout", 1))
        .await
        .unwrap();
    assert!(d.is_none());
}

#[tokio::test]
async fn pinned_profile_is_used_even_when_not_the_active_one() {
    let h = Harness::new();
    let active = h.profile().await;
    h.split(active, Provider::Stripe, 100).await;
    let pinned = Uuid::new_v4();
    h.split(pinned, Provider::Windcave, 100).await;
    h.creds(Provider::Stripe).await;
    h.creds(Provider::Windcave).await;

    let d = h
        .orchestrator()
        .select_psp_with_profile(pinned, &route_context(Uuid::new_v4(), 1000))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(d.provider, Provider::Windcave);
    assert_eq!(d.profile_id, Some(pinned));
    assert_eq!(d.reason, RouteReason::WeightedRandom);
}

#[tokio::test]
async fn forced_provider_without_credentials_selects_nothing() {
    let h = Harness::new();
    let d = h
        .orchestrator()
        .select_forced(Provider::Airwallex, &route_context(Uuid::new_v4(), 1000))
        .await
        .unwrap();
    assert!(d.is_none());
}

#[tokio::test]
async fn every_decision_is_logged_before_it_is_returned() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.split(profile, Provider::Stripe, 100).await;
    h.creds(Provider::Stripe).await;

    let session_id = Uuid::new_v4();
    let d = h
        .orchestrator()
        .select_psp(&route_context(session_id, 1000))
        .await
        .unwrap()
        .unwrap();

    let log = h.decisions.all().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].decision_id, d.decision_id);
    assert_eq!(log[0].session_id, session_id);
    assert_eq!(log[0].tenant_id, TENANT);
    assert_eq!(log[0].amount_minor, 1000);
    assert_eq!(log[0].payment_method, "card");
    assert!(log[0].outcome.is_none());
}

#[tokio::test]
async fn observed_split_tracks_configured_weights() {
    let h = Harness::new();
    let profile = h.profile().await;
    h.split(profile, Provider::Stripe, 70).await;
    h.split(profile, Provider::Adyen, 30).await;
    h.creds(Provider::Stripe).await;
    h.creds(Provider::Adyen).await;

    let orch = h.orchestrator();
    let mut stripe = 0;
    let draws = 2_000;
    for _ in 0..draws {
        let d = orch.select_psp(&route_context(Uuid::new_v4(), 1000)).await.unwrap().unwrap();
        if d.provider == Provider::Stripe {
            stripe += 1;
        }
    }
    let share = stripe as f64 / draws as f64;
    assert!((0.62..=0.78).contains(&share), "stripe share {share}");
}
