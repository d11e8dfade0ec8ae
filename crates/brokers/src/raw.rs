//! Lenient numeric handling for raw provider payloads.

use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use foliolens_core::FetchWarning;

/// A numeric field as some provider schema revisions serialize it: a JSON
/// number, or the same number quoted as a string.
///
/// Values that fail to coerce are kept as-is so the adapter can report the
/// offending record instead of rejecting the whole payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Float(f64),
    Text(String),
}

impl RawNumber {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawNumber::Float(v) if v.is_finite() => Some(*v),
            RawNumber::Float(_) => None,
            RawNumber::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        self.as_f64().and_then(Decimal::from_f64)
    }
}

/// Coerces an optional raw numeric field to `Decimal`.
///
/// A missing field is the documented default of zero. A present but
/// unparseable value is also zero, plus a recorded parse warning naming the
/// field; one bad record never aborts the fragment.
pub fn coerce_amount(
    value: Option<&RawNumber>,
    field: &str,
    warnings: &mut Vec<FetchWarning>,
) -> Decimal {
    match value {
        None => Decimal::ZERO,
        Some(raw) => match raw.as_decimal() {
            Some(amount) => amount,
            None => {
                warnings.push(FetchWarning::Parse {
                    source: field.to_string(),
                    detail: format!("unparseable numeric value {:?}", raw),
                });
                Decimal::ZERO
            }
        },
    }
}

/// Coerces an optional raw numeric field, keeping `None` as `None`.
///
/// Used where absence means "compute it locally" rather than zero, e.g.
/// provider-reported unrealized P/L.
pub fn coerce_optional(
    value: Option<&RawNumber>,
    field: &str,
    warnings: &mut Vec<FetchWarning>,
) -> Option<Decimal> {
    let raw = value?;
    match raw.as_decimal() {
        Some(amount) => Some(amount),
        None => {
            warnings.push(FetchWarning::Parse {
                source: field.to_string(),
                detail: format!("unparseable numeric value {:?}", raw),
            });
            None
        }
    }
}
