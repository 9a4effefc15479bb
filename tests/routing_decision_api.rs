use payments_orchestrator::domain::provider::Provider;
use payments_orchestrator::domain::routing_decision::{Candidate, DecisionOutcome, RouteReason, RoutingDecisionRecord};

fn failover_record() -> RoutingDecisionRecord {
    RoutingDecisionRecord {
        decision_id: uuid::Uuid::new_v4(),
        tenant_id: "tenant_1".to_string(),
        session_id: uuid::Uuid::new_v4(),
        profile_id: Some(uuid::Uuid::new_v4()),
        selected_provider: Provider::Adyen,
        reason: RouteReason::Failover,
        candidates: vec![Candidate {
            provider: Provider::Adyen,
            weight: 97,
        }],
        is_retry: true,
        retry_number: Some(1),
        previous_provider: Some(Provider::Stripe),
        previous_failure_code: Some("processor_error".to_string()),
        amount_minor: 1000,
        currency: "USD".to_string(),
        payment_method: "card".to_string(),
        outcome: Some(DecisionOutcome::Success),
        created_at: chrono::Utc::now(),
    }
}

#[test]
fn routing_decision_record_serializes_snake_case() {
    let v = serde_json::to_value(failover_record()).unwrap();
    assert_eq!(v["selected_provider"], "adyen");
    assert_eq!(v["reason"], "failover");
    assert_eq!(v["previous_provider"], "stripe");
    assert_eq!(v["outcome"], "success");
    assert_eq!(v["candidates"][0]["weight"], 97);
}

#[test]
fn unmarked_outcome_serializes_as_null() {
    let mut rec = failover_record();
    rec.outcome = None;
    let v = serde_json::to_value(rec).unwrap();
    assert!(v["outcome"].is_null());
}
