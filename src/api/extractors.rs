//! Request extractors.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::ShopError;

/// JSON body that has been deserialized and passed `validator` checks.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = ShopError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ShopError::validation(e.body_text()))?;
        value.validate().map_err(invalid)?;
        Ok(ValidatedJson(value))
    }
}

/// Turns `validator` output into one readable message.
pub fn invalid(errors: ValidationErrors) -> ShopError {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("{} is invalid", field)))
        })
        .collect();
    messages.sort();
    ShopError::Validation(messages.join(", "))
}

/// Path ids are taken as strings so a malformed id gets the JSON error body.
pub fn parse_id(raw: &str) -> Result<Uuid, ShopError> {
    Uuid::parse_str(raw).map_err(|_| ShopError::validation("Invalid id"))
}
