use crate::domain::payment::{ConfirmPaymentRequest, PaymentMethodType, PaymentSession};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Test,
    Live,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "test",
            Environment::Live => "live",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "test" => Some(Environment::Test),
            "live" => Some(Environment::Live),
            _ => None,
        }
    }
}

/// Immutable input to every routing decision made for one logical payment.
#[derive(Debug, Clone)]
pub struct RouteContext {
    pub tenant_id: String,
    pub session_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: PaymentMethodType,
    pub card_brand: Option<String>,
    pub country: Option<String>,
    pub environment: Environment,
}

pub fn build_route_context(session: &PaymentSession, req: &ConfirmPaymentRequest) -> RouteContext {
    let card_brand = req
        .card_brand
        .clone()
        .or_else(|| req.card.as_ref().and_then(|c| c.brand.clone()))
        .map(|b| b.to_lowercase());

    RouteContext {
        tenant_id: session.tenant_id.clone(),
        session_id: session.session_id,
        amount_minor: session.amount_minor,
        currency: session.currency.to_uppercase(),
        payment_method: req.payment_method,
        card_brand,
        country: req.country.as_ref().map(|c| c.to_uppercase()),
        environment: session.environment,
    }
}
