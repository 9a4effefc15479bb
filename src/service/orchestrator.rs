use crate::config::OrchestratorConfig;
use crate::domain::context::RouteContext;
use crate::domain::provider::{Credentials, Provider};
use crate::domain::routing_decision::{
    Candidate, DecisionOutcome, NewRoutingDecision, RetryContext, RouteDecision, RouteReason,
};
use crate::ports::{CredentialStoreRef, RoutingDecisionLogRef, RoutingRuleStoreRef};
use crate::router::conditions::matching_rules;
use crate::router::weighted::{fallback_order, weighted_random_select};
use anyhow::Result;
use uuid::Uuid;

/// Turns a `RouteContext` into a logged `RouteDecision`.
///
/// Every returned decision has already been written to the decision log.
/// `Ok(None)` means no provider could be selected; store failures are the only
/// errors.
#[derive(Clone)]
pub struct Orchestrator {
    pub rules: RoutingRuleStoreRef,
    pub credentials: CredentialStoreRef,
    pub decisions: RoutingDecisionLogRef,
    pub config: OrchestratorConfig,
}

impl Orchestrator {
    /// First-attempt selection through the tenant's active profile.
    pub async fn select_psp(&self, ctx: &RouteContext) -> Result<Option<RouteDecision>> {
        let Some(profile) = self.rules.active_profile(&ctx.tenant_id, ctx.environment).await? else {
            tracing::debug!(tenant_id = %ctx.tenant_id, "no active profile, using legacy route");
            return self.legacy_route(ctx).await;
        };
        self.select_from_profile(profile.profile_id, ctx).await
    }

    /// Same as `select_psp` but against a caller-pinned profile.
    pub async fn select_psp_with_profile(&self, profile_id: Uuid, ctx: &RouteContext) -> Result<Option<RouteDecision>> {
        self.select_from_profile(profile_id, ctx).await
    }

    /// Caller named the provider. No weights, no fallback.
    pub async fn select_forced(&self, provider: Provider, ctx: &RouteContext) -> Result<Option<RouteDecision>> {
        let Some(credentials) = self.resolve(ctx, provider).await else {
            tracing::warn!(session_id = %ctx.session_id, %provider, "forced provider has no credentials");
            return Ok(None);
        };
        let record = NewRoutingDecision::from_context(
            ctx,
            None,
            provider,
            RouteReason::Forced,
            vec![Candidate { provider, weight: 100 }],
        );
        self.record(record, credentials).await.map(Some)
    }

    pub async fn select_retry_psp(&self, ctx: &RouteContext, retry: &RetryContext) -> Result<Option<RouteDecision>> {
        let Some(profile) = self.rules.active_profile(&ctx.tenant_id, ctx.environment).await? else {
            return Ok(None);
        };

        let rules = self
            .rules
            .retry_rules(profile.profile_id, retry.failed_provider)
            .await?;
        let rule = rules
            .iter()
            .filter(|r| r.source_provider == retry.failed_provider)
            .filter(|r| r.matches_failure(retry.failure_code.as_deref()))
            .find(|r| r.retry_order == retry.attempt_number);

        let Some(rule) = rule else {
            return self.select_failover_psp(ctx, retry, profile.profile_id).await;
        };
        if retry.attempt_number > rule.max_retries {
            return self.select_failover_psp(ctx, retry, profile.profile_id).await;
        }

        let Some(credentials) = self.resolve(ctx, rule.target_provider).await else {
            return self.select_failover_psp(ctx, retry, profile.profile_id).await;
        };

        let record = NewRoutingDecision::from_context(
            ctx,
            Some(profile.profile_id),
            rule.target_provider,
            RouteReason::Retry,
            vec![Candidate {
                provider: rule.target_provider,
                weight: 100,
            }],
        )
        .with_retry(retry);
        self.record(record, credentials).await.map(Some)
    }

    pub async fn mark_outcome(&self, decision: &RouteDecision, outcome: DecisionOutcome) -> Result<()> {
        self.decisions.mark_outcome(decision.decision_id, outcome).await
    }

    async fn select_from_profile(&self, profile_id: Uuid, ctx: &RouteContext) -> Result<Option<RouteDecision>> {
        let rules = self.rules.traffic_split_rules(profile_id).await?;
        let survivors = matching_rules(&rules, ctx);
        if survivors.is_empty() {
            tracing::debug!(%profile_id, session_id = %ctx.session_id, "no traffic rule matched, using legacy route");
            return self.legacy_route(ctx).await;
        }

        let candidates: Vec<Candidate> = survivors
            .iter()
            .map(|r| Candidate {
                provider: r.provider,
                weight: r.weight,
            })
            .collect();

        // ThreadRng is !Send; keep it out of any await.
        let picked = weighted_random_select(&candidates, &mut rand::thread_rng());
        let Some(chosen) = picked else {
            tracing::warn!(%profile_id, "all matching traffic rules have zero weight");
            return Ok(None);
        };

        let (provider, credentials) = match self.resolve(ctx, chosen).await {
            Some(creds) => (chosen, creds),
            None => match self.select_fallback(ctx, &candidates, chosen).await {
                Some(found) => found,
                None => return Ok(None),
            },
        };

        let record = NewRoutingDecision::from_context(
            ctx,
            Some(profile_id),
            provider,
            RouteReason::WeightedRandom,
            candidates,
        );
        self.record(record, credentials).await.map(Some)
    }

    async fn select_fallback(
        &self,
        ctx: &RouteContext,
        candidates: &[Candidate],
        unavailable: Provider,
    ) -> Option<(Provider, Credentials)> {
        for provider in fallback_order(candidates, unavailable) {
            if let Some(creds) = self.resolve(ctx, provider).await {
                tracing::info!(session_id = %ctx.session_id, from = %unavailable, to = %provider, "credential fallback");
                return Some((provider, creds));
            }
        }
        None
    }

    async fn select_failover_psp(
        &self,
        ctx: &RouteContext,
        retry: &RetryContext,
        profile_id: Uuid,
    ) -> Result<Option<RouteDecision>> {
        let mut priorities: Vec<_> = self
            .rules
            .provider_priorities(profile_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active && p.is_healthy && p.provider != retry.failed_provider)
            .collect();
        priorities.sort_by_key(|p| p.priority);
        priorities.truncate(self.config.failover_candidate_limit);

        let candidates: Vec<Candidate> = priorities
            .iter()
            .map(|p| Candidate {
                provider: p.provider,
                weight: failover_weight(p.priority),
            })
            .collect();

        for p in &priorities {
            let Some(credentials) = self.resolve(ctx, p.provider).await else {
                continue;
            };
            let record = NewRoutingDecision::from_context(
                ctx,
                Some(profile_id),
                p.provider,
                RouteReason::Failover,
                candidates.clone(),
            )
            .with_retry(retry);
            return self.record(record, credentials).await.map(Some);
        }

        tracing::warn!(%profile_id, failed = %retry.failed_provider, "no failover provider available");
        Ok(None)
    }

    async fn legacy_route(&self, ctx: &RouteContext) -> Result<Option<RouteDecision>> {
        let Some(provider) = self.credentials.default_provider(&ctx.tenant_id, ctx.environment).await else {
            return Ok(None);
        };
        let Some(credentials) = self.resolve(ctx, provider).await else {
            return Ok(None);
        };
        let record = NewRoutingDecision::from_context(
            ctx,
            None,
            provider,
            RouteReason::Default,
            vec![Candidate { provider, weight: 100 }],
        );
        self.record(record, credentials).await.map(Some)
    }

    async fn resolve(&self, ctx: &RouteContext, provider: Provider) -> Option<Credentials> {
        self.credentials
            .get_credentials(&ctx.tenant_id, provider, ctx.environment)
            .await
    }

    async fn record(&self, record: NewRoutingDecision, credentials: Credentials) -> Result<RouteDecision> {
        let decision_id = self.decisions.insert(&record).await?;
        tracing::info!(
            %decision_id,
            session_id = %record.session_id,
            provider = %record.selected_provider,
            reason = record.reason.as_str(),
            is_retry = record.is_retry,
            "routing decision"
        );
        Ok(RouteDecision {
            decision_id,
            provider: record.selected_provider,
            credentials,
            profile_id: record.profile_id,
            reason: record.reason,
            candidates: record.candidates,
            is_retry: record.is_retry,
            retry_number: record.retry_number,
            previous_provider: record.previous_provider,
            previous_failure_code: record.previous_failure_code,
        })
    }
}

/// Display weight for a failover candidate: lower priority numbers rank higher.
fn failover_weight(priority: i32) -> u32 {
    100i32.saturating_sub(priority).max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failover_weight_clamps_extreme_priorities() {
        assert_eq!(failover_weight(3), 97);
        assert_eq!(failover_weight(150), 0);
        assert_eq!(failover_weight(i32::MIN), i32::MAX as u32);
        assert_eq!(failover_weight(i32::MAX), 0);
    }
}
