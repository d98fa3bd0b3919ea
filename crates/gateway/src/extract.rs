//! Request extractors that report failures as `AppError`

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRef, FromRequest, FromRequestParts, Query, Request,
    },
    http::{header::CONTENT_LENGTH, request::Parts, StatusCode},
    Json,
};
use campusdesk_common::{config::AppConfig, errors::AppError};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use std::sync::Arc;
use validator::Validate;

/// JSON body that has passed its `validator` rules
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Arc<AppConfig>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| json_rejection(rejection, declared, state))?;

        value.validate()?;
        Ok(Self(value))
    }
}

fn json_rejection<S>(rejection: JsonRejection, declared: Option<usize>, state: &S) -> AppError
where
    Arc<AppConfig>: FromRef<S>,
{
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let limit = Arc::<AppConfig>::from_ref(state).server.max_body_bytes;
        return AppError::PayloadTooLarge {
            size: declared.unwrap_or(limit),
            limit,
        };
    }
    AppError::InvalidFormat {
        message: rejection.body_text(),
    }
}

/// Query string parameters
#[derive(Debug, Clone)]
pub struct QueryParams<T>(pub T);

impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| AppError::InvalidFormat {
                message: rejection.body_text(),
            })?;
        Ok(Self(value))
    }
}

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// a missing key stays `None`, an explicit `null` becomes `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_distinguishes_null() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.notes, None);

        let cleared: Patch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        assert_eq!(cleared.notes, Some(None));

        let set: Patch = serde_json::from_str(r#"{"notes": "call back"}"#).unwrap();
        assert_eq!(set.notes, Some(Some("call back".to_string())));
    }
}
