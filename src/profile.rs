//! Flavor-profile lookup for the quiz flow.
//!
//! One parameterized SELECT against the consumer flavor profiles table,
//! keyed by the part of the e-mail address before `@`.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::core::{GatewayError, Params, TabularResult, Value};
use crate::gateway::{GatewayBuilder, WarehouseGateway};

pub const PROFILE_QUERY: &str = "
    SELECT
        consumer_id,
        flavor_profile_json,
        top_cuisines,
        cuisine_confidence
    FROM proddb.public.consumer_flavor_profiles
    WHERE LOWER(email_prefix) = LOWER(:username)
    LIMIT 1
";

/// At most this many cuisines are reported.
pub const MAX_CUISINES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlavorProfile {
    pub found: bool,
    pub cuisine_preferences: Vec<String>,
    pub top_cuisine: Option<String>,
    pub confidence: f64,
    /// Parsed `flavor_profile_json`; an empty object when absent.
    pub flavor_profile: serde_json::Value,
}

impl FlavorProfile {
    #[must_use]
    pub fn not_found() -> Self {
        Self {
            found: false,
            cuisine_preferences: Vec::new(),
            top_cuisine: None,
            confidence: 0.0,
            flavor_profile: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

#[derive(Error, Debug)]
pub enum LookupError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Malformed flavor profile: {0}")]
    Malformed(String),
}

/// Outcome of a lookup. A failure is kept apart from "no such user".
#[derive(Debug)]
pub enum ProfileLookup {
    Found(FlavorProfile),
    NotFound,
    Failed(LookupError),
}

impl ProfileLookup {
    /// Fail-open view: anything but a hit reads as "not found". Failures
    /// are logged at error level.
    #[must_use]
    pub fn into_profile(self) -> FlavorProfile {
        match self {
            Self::Found(profile) => profile,
            Self::NotFound => FlavorProfile::not_found(),
            Self::Failed(e) => {
                error!("Warehouse lookup failed: {}", e);
                FlavorProfile::not_found()
            }
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// `fiona.fan@example.com` -> `fiona.fan`; strings without `@` pass through.
#[must_use]
pub fn email_username(email: &str) -> &str {
    email.split_once('@').map_or(email, |(name, _)| name)
}

/// Looks up the flavor profile for `email` on a scoped gateway built from
/// `builder`. The gateway is closed before this returns.
pub fn lookup_flavor_profile(builder: GatewayBuilder, email: &str) -> ProfileLookup {
    let username = email_username(email);
    let params = Params::new().bind("username", username);

    let result = WarehouseGateway::scoped(builder, |gateway| gateway.fetch(PROFILE_QUERY, &params));
    match result {
        Ok(result) => match profile_from_result(&result) {
            Ok(Some(profile)) => {
                debug!("Retrieved flavor profile for {}", username);
                ProfileLookup::Found(profile)
            }
            Ok(None) => {
                info!("No flavor profile found for {}", username);
                ProfileLookup::NotFound
            }
            Err(e) => ProfileLookup::Failed(e),
        },
        Err(e) => ProfileLookup::Failed(e.into()),
    }
}

/// Interprets the first row of a profile query result.
pub fn profile_from_result(result: &TabularResult) -> Result<Option<FlavorProfile>, LookupError> {
    if result.is_empty() {
        return Ok(None);
    }

    let flavor_profile = match result.get(0, "flavor_profile_json") {
        None | Some(Value::Null) => serde_json::Value::Object(serde_json::Map::new()),
        Some(Value::Text(raw)) => serde_json::from_str(raw)
            .map_err(|e| LookupError::Malformed(format!("flavor_profile_json: {e}")))?,
        Some(other) => other.to_json(),
    };

    let cuisines: Vec<String> = match result.get(0, "top_cuisines") {
        Some(Value::Text(raw)) => raw
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_text)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };

    let confidence = match result.get(0, "cuisine_confidence") {
        None | Some(Value::Null) => 0.0,
        Some(value) => value
            .as_f64()
            .ok_or_else(|| LookupError::Malformed(format!("cuisine_confidence: '{value}'")))?,
    };

    let top_cuisine = cuisines.first().cloned();
    let cuisine_preferences = cuisines.into_iter().take(MAX_CUISINES).collect();

    Ok(Some(FlavorProfile {
        found: true,
        cuisine_preferences,
        top_cuisine,
        confidence,
        flavor_profile,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ResultColumn;

    fn row(json: Value, cuisines: Value, confidence: Value) -> TabularResult {
        TabularResult::new(
            ["consumer_id", "flavor_profile_json", "top_cuisines", "cuisine_confidence"]
                .into_iter()
                .map(|name| ResultColumn::new(name, None))
                .collect(),
            vec![vec![Value::Integer(7), json, cuisines, confidence]],
        )
    }

    #[test]
    fn test_email_username() {
        assert_eq!(email_username("fiona.fan@example.com"), "fiona.fan");
        assert_eq!(email_username("fiona"), "fiona");
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let empty = TabularResult::empty(vec![ResultColumn::new("consumer_id", None)]);
        assert!(profile_from_result(&empty).unwrap().is_none());
    }

    #[test]
    fn test_top_five_cuisines() {
        let result = row(
            Value::Text(r#"{"spicy": 0.9}"#.into()),
            Value::Text(" thai, mexican ,, indian,korean,italian,french ".into()),
            Value::Text("0.82".into()),
        );
        let profile = profile_from_result(&result).unwrap().unwrap();
        assert!(profile.found);
        assert_eq!(
            profile.cuisine_preferences,
            vec!["thai", "mexican", "indian", "korean", "italian"]
        );
        assert_eq!(profile.top_cuisine.as_deref(), Some("thai"));
        assert!((profile.confidence - 0.82).abs() < f64::EPSILON);
        assert_eq!(profile.flavor_profile["spicy"], serde_json::json!(0.9));
    }

    #[test]
    fn test_missing_fields_default() {
        let profile = profile_from_result(&row(Value::Null, Value::Null, Value::Null))
            .unwrap()
            .unwrap();
        assert!(profile.found);
        assert!(profile.cuisine_preferences.is_empty());
        assert_eq!(profile.top_cuisine, None);
        assert_eq!(profile.confidence, 0.0);
        assert_eq!(profile.flavor_profile, serde_json::json!({}));
    }

    #[test]
    fn test_malformed_json() {
        let result = row(Value::Text("{not json".into()), Value::Null, Value::Null);
        assert!(matches!(
            profile_from_result(&result),
            Err(LookupError::Malformed(_))
        ));
    }

    #[test]
    fn test_failed_lookup_fails_open() {
        let failed = ProfileLookup::Failed(LookupError::Malformed("x".into()));
        assert!(failed.is_failed());
        assert_eq!(failed.into_profile(), FlavorProfile::not_found());
    }
}
