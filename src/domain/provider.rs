use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every PSP the orchestrator can route to. Adapters are registered per variant,
/// so a rule naming an unknown provider fails to parse instead of failing at call time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Stripe,
    Adyen,
    AuthorizeNet,
    Chase,
    Nuvei,
    Dlocal,
    Braintree,
    CheckoutCom,
    Airwallex,
    Windcave,
    Paypal,
    Ach,
}

impl Provider {
    pub const ALL: [Provider; 12] = [
        Provider::Stripe,
        Provider::Adyen,
        Provider::AuthorizeNet,
        Provider::Chase,
        Provider::Nuvei,
        Provider::Dlocal,
        Provider::Braintree,
        Provider::CheckoutCom,
        Provider::Airwallex,
        Provider::Windcave,
        Provider::Paypal,
        Provider::Ach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Adyen => "adyen",
            Provider::AuthorizeNet => "authorize_net",
            Provider::Chase => "chase",
            Provider::Nuvei => "nuvei",
            Provider::Dlocal => "dlocal",
            Provider::Braintree => "braintree",
            Provider::CheckoutCom => "checkout_com",
            Provider::Airwallex => "airwallex",
            Provider::Windcave => "windcave",
            Provider::Paypal => "paypal",
            Provider::Ach => "ach",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider: {}", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', '.'], "_");
        Provider::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

/// Decrypted provider credentials. The orchestrator never looks inside; it only
/// hands them to the adapter for the provider they were resolved for.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Credentials(pub serde_json::Value);

impl Credentials {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|v| v.as_str())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}
