use crate::ai_models::FeaturePayload;
use crate::decoder::decode;
use crate::errors::AppError;
use crate::gemini_client::LanguageModel;
use crate::validator::validate;

/// Runs the model stage shared by every feature: generate, sanitize, decode, validate.
///
/// Model failures surface as `ModelUnavailable`/`Timeout`; unusable output as
/// `DecodeError`/`ValidationError`. Nothing here is retried, the model client owns that.
pub async fn run_model_stage<T: FeaturePayload>(
    model: &dyn LanguageModel,
    prompt: &str,
) -> Result<T, AppError> {
    let raw = model.generate(prompt).await?;
    tracing::debug!("{}: received {} chars from model", T::FEATURE.as_str(), raw.len());

    let value = decode(T::FEATURE, &raw)?;
    validate::<T>(value)
}
