use crate::domain::context::RouteContext;
use crate::domain::rules::{RuleConditions, TrafficSplitRule};

pub fn matches(conditions: &RuleConditions, ctx: &RouteContext) -> bool {
    if let Some(currency) = &conditions.currency {
        if !currency.eq_ignore_ascii_case(&ctx.currency) {
            return false;
        }
    }

    if let Some(method) = &conditions.payment_method {
        if !method.eq_ignore_ascii_case(ctx.payment_method.as_str()) {
            return false;
        }
    }

    if let Some(brand) = &conditions.card_brand {
        match &ctx.card_brand {
            Some(actual) if brand.eq_ignore_ascii_case(actual) => {}
            _ => return false,
        }
    }

    if let Some(min) = conditions.min_amount_minor {
        if ctx.amount_minor < min {
            return false;
        }
    }

    if let Some(max) = conditions.max_amount_minor {
        if ctx.amount_minor > max {
            return false;
        }
    }

    true
}

pub fn matching_rules<'a>(rules: &'a [TrafficSplitRule], ctx: &RouteContext) -> Vec<&'a TrafficSplitRule> {
    rules.iter().filter(|r| matches(&r.conditions, ctx)).collect()
}
