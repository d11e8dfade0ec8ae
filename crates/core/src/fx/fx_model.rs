use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of converting one native amount into the two target currencies.
///
/// The display currency carries the headline portfolio-value metric; the
/// reporting currency is the fixed base used for allocation analytics.
/// Either side is `None` when its rate could not be obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertedAmount {
    /// Amount in the user-selected display currency.
    pub display: Option<Decimal>,
    /// Quote used for the display conversion: native units per one unit
    /// of the display currency.
    pub display_rate: Option<Decimal>,
    /// Amount in the fixed reporting currency.
    pub base: Option<Decimal>,
}

impl ConvertedAmount {
    pub fn unavailable() -> Self {
        ConvertedAmount {
            display: None,
            display_rate: None,
            base: None,
        }
    }
}
