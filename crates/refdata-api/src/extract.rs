//! ---
//! refdata_section: "05-networking-external-interfaces"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Request extractors for bearer identity, JSON bodies and query strings."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use refdata_domain::messages::{ERROR_INVALID_PARAMETER, ERROR_INVALID_REQUEST_BODY};
use refdata_security::Principal;
use serde::de::DeserializeOwned;
use url::form_urlencoded;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::ApiState;

/// Caller resolved from `Authorization: Bearer <token>` or the
/// `access_token` query parameter.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Principal);

impl AuthenticatedUser {
    pub fn id(&self) -> Uuid {
        self.0.user_id
    }
}

#[axum::async_trait]
impl FromRequestParts<Arc<ApiState>> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ApiState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(ApiError::authentication_required)?;
        let principal = state.tokens.authenticate(&token).await?;
        Ok(Self(principal))
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(header) = parts.headers.get(AUTHORIZATION) {
        let value = header.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        let token = token.trim();
        if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
            return Some(token.to_owned());
        }
        return None;
    }
    QueryParams::parse(parts.uri.query())
        .get("access_token")
        .map(str::to_owned)
}

/// JSON body whose rejections become 400 with the invalid-body key.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::bad_request(
                ERROR_INVALID_REQUEST_BODY,
                rejection.body_text(),
            )),
        }
    }
}

/// Raw query pairs in request order; keeps repeated keys such as `id`.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let pairs = query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self(pairs)
    }

    /// First non-blank value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.all(name).next()
    }

    pub fn all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_owned();
        self.0
            .iter()
            .filter(move |(key, _)| *key == name)
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    pub fn owned(&self, name: &str) -> Option<String> {
        self.get(name).map(str::to_owned)
    }

    pub fn uuid(&self, name: &str) -> Result<Option<Uuid>, ApiError> {
        self.get(name).map(|raw| parse_uuid(name, raw)).transpose()
    }

    pub fn require_uuid(&self, name: &str) -> Result<Uuid, ApiError> {
        self.uuid(name)?.ok_or_else(|| {
            ApiError::bad_request(ERROR_INVALID_PARAMETER, format!("{name} is required"))
        })
    }

    /// Every value of `name`, also splitting comma separated lists.
    pub fn uuids(&self, name: &str) -> Result<Vec<Uuid>, ApiError> {
        self.all(name)
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(|raw| parse_uuid(name, raw))
            .collect()
    }

    pub fn u32(&self, name: &str) -> Result<Option<u32>, ApiError> {
        self.get(name)
            .map(|raw| {
                raw.parse::<u32>().map_err(|_| {
                    ApiError::bad_request(
                        ERROR_INVALID_PARAMETER,
                        format!("{name} must be a non-negative integer"),
                    )
                })
            })
            .transpose()
    }
}

fn parse_uuid(name: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::bad_request(
            ERROR_INVALID_PARAMETER,
            format!("{name} is not a valid UUID: {raw}"),
        )
    })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::parse(parts.uri.query()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn repeated_and_comma_separated_ids_are_collected() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let query = format!("id={a}&id={b},{c}&name=x");
        let params = QueryParams::parse(Some(query.as_str()));
        assert_eq!(params.uuids("id").unwrap(), vec![a, b, c]);
        assert_eq!(params.get("name"), Some("x"));
        assert_eq!(params.get("code"), None);
    }

    #[test]
    fn blank_values_count_as_absent() {
        let params = QueryParams::parse(Some("programId=&page=2"));
        assert_eq!(params.uuid("programId").unwrap(), None);
        assert_eq!(params.u32("page").unwrap(), Some(2));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let params = QueryParams::parse(Some("rightId=nope&size=-1"));
        let err = params.uuid("rightId").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message_key(), ERROR_INVALID_PARAMETER);
        assert!(params.u32("size").is_err());
        assert!(params.require_uuid("programId").is_err());
    }
}
