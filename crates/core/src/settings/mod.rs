//! Application settings consumed by the aggregation engine.

use std::time::Duration;

/// Currency and staleness settings.
///
/// The display currency is the user's choice for the headline portfolio
/// value; the reporting currency is the fixed base every allocation chart
/// is computed in, regardless of the display choice.
#[derive(Debug, Clone, PartialEq)]
pub struct AppSettings {
    pub display_currency: String,
    pub reporting_currency: String,
    /// A snapshot older than this is flagged stale.
    pub staleness_threshold: Duration,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            display_currency: "USD".to_string(),
            reporting_currency: "USD".to_string(),
            staleness_threshold: Duration::from_secs(900),
        }
    }
}

impl AppSettings {
    /// Builds settings from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    ///
    /// * `FOLIOLENS_DISPLAY_CURRENCY` (default `USD`)
    /// * `FOLIOLENS_REPORTING_CURRENCY` (default `USD`)
    /// * `FOLIOLENS_STALE_AFTER_SECS` (default `900`)
    pub fn from_env() -> Self {
        let defaults = AppSettings::default();

        let currency = |name: &str, fallback: String| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_uppercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };

        let staleness = std::env::var("FOLIOLENS_STALE_AFTER_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.staleness_threshold);

        AppSettings {
            display_currency: currency(
                "FOLIOLENS_DISPLAY_CURRENCY",
                defaults.display_currency,
            ),
            reporting_currency: currency(
                "FOLIOLENS_REPORTING_CURRENCY",
                defaults.reporting_currency,
            ),
            staleness_threshold: staleness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AppSettings::default();
        assert_eq!(settings.display_currency, "USD");
        assert_eq!(settings.reporting_currency, "USD");
        assert_eq!(settings.staleness_threshold, Duration::from_secs(900));
    }
}
