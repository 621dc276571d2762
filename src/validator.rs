use serde_json::Value;

use crate::ai_models::FeaturePayload;
use crate::errors::AppError;
use crate::models::Feature;

/// Required top-level keys of `feature` that are absent or null in `value`.
pub fn missing_fields(feature: Feature, value: &Value) -> Vec<&'static str> {
    feature
        .required_fields()
        .iter()
        .copied()
        .filter(|key| value.get(key).map_or(true, Value::is_null))
        .collect()
}

/// Confirms the decoded object carries every key its feature requires and builds the typed
/// record from it. Extra keys are ignored.
pub fn validate<T: FeaturePayload>(value: Value) -> Result<T, AppError> {
    let missing = missing_fields(T::FEATURE, &value);
    if !missing.is_empty() {
        return Err(AppError::ValidationError {
            feature: T::FEATURE,
            reason: format!("missing required field(s): {}", missing.join(", ")),
        });
    }

    serde_json::from_value(value).map_err(|e| AppError::ValidationError {
        feature: T::FEATURE,
        reason: e.to_string(),
    })
}
