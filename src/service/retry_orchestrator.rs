use crate::config::OrchestratorConfig;
use crate::gateways::AttemptResult;
use std::time::Duration;

pub const PROCESSOR_ERROR: &str = "processor_error";
pub const GATEWAY_ERROR: &str = "gateway_error";
pub const NETWORK_ERROR: &str = "network_error";
pub const TIMEOUT: &str = "timeout";
pub const RATE_LIMIT: &str = "rate_limit";
pub const TEMPORARY_FAILURE: &str = "temporary_failure";

/// Terminal codes: retrying them against any provider cannot help.
pub const NON_RETRYABLE_CODES: [&str; 9] = [
    "card_declined",
    "insufficient_funds",
    "expired_card",
    "invalid_card",
    "fraud_detected",
    "do_not_honor",
    "card_not_supported",
    "currency_not_supported",
    "duplicate_transaction",
];

pub const RETRYABLE_CATEGORIES: [&str; 5] = [PROCESSOR_ERROR, NETWORK_ERROR, TIMEOUT, RATE_LIMIT, TEMPORARY_FAILURE];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDirective {
    Success,
    RequiresAction,
    Continue,
    FailNow,
}

/// An explicit terminal code wins over the category. Otherwise a retryable
/// category allows a retry, and only generic or unlabeled processor errors
/// default to retryable. Unknown codes are not retried.
pub fn is_retryable_failure(failure_code: Option<&str>, failure_category: Option<&str>) -> bool {
    if let Some(code) = failure_code {
        if NON_RETRYABLE_CODES.contains(&code) {
            return false;
        }
    }

    if let Some(category) = failure_category {
        if RETRYABLE_CATEGORIES.contains(&category) {
            return true;
        }
    }

    matches!(failure_code, None | Some(PROCESSOR_ERROR) | Some(GATEWAY_ERROR))
}

/// A challenge is checked before the success flag. `success` on a status that
/// is not an approval is retried like a processor error.
pub fn classify_attempt_result(result: &AttemptResult) -> RetryDirective {
    if result.is_requires_action() {
        return RetryDirective::RequiresAction;
    }
    if result.is_approved() {
        return RetryDirective::Success;
    }
    if result.success {
        return RetryDirective::Continue;
    }
    if is_retryable_failure(result.failure_code.as_deref(), result.failure_category.as_deref()) {
        RetryDirective::Continue
    } else {
        RetryDirective::FailNow
    }
}

/// Fixed pause before the next attempt, longer when the failed attempt was
/// itself already a retry.
pub fn retry_delay(config: &OrchestratorConfig, decision_was_retry: bool) -> Duration {
    if decision_was_retry {
        Duration::from_millis(config.retry_delay_after_retry_ms)
    } else {
        Duration::from_millis(config.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_code_beats_retryable_category() {
        assert!(!is_retryable_failure(Some("insufficient_funds"), Some(TIMEOUT)));
        assert!(!is_retryable_failure(Some("card_declined"), Some(PROCESSOR_ERROR)));
    }

    #[test]
    fn retryable_category_allows_unknown_code() {
        assert!(is_retryable_failure(Some("psp_503"), Some(TEMPORARY_FAILURE)));
        assert!(is_retryable_failure(Some("x"), Some(RATE_LIMIT)));
    }

    #[test]
    fn generic_errors_default_to_retryable() {
        assert!(is_retryable_failure(None, None));
        assert!(is_retryable_failure(Some(PROCESSOR_ERROR), None));
        assert!(is_retryable_failure(Some(GATEWAY_ERROR), None));
    }

    #[test]
    fn unfamiliar_codes_default_to_terminal() {
        assert!(!is_retryable_failure(Some("issuer_says_maybe"), None));
        assert!(!is_retryable_failure(Some("http_400"), Some("validation")));
    }

    #[test]
    fn delay_is_longer_after_a_retry() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(retry_delay(&cfg, false), Duration::from_millis(100));
        assert!(retry_delay(&cfg, true) > retry_delay(&cfg, false));
    }
}
