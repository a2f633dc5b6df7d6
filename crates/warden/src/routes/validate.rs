//! Token validation endpoints.

use axum::{
    Form, Json,
    body::Bytes,
    extract::{FromRequest, Request, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use warden_common::{ChallengeVersion, ValidateResponse, ValidationRequest};

use crate::client_ip::ClientIp;
use crate::fingerprint::token_fingerprint;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ValidateBody {
    #[serde(default)]
    token: Option<String>,
    /// v3 only
    #[serde(default)]
    action: Option<String>,
}

/// Request body accepted as JSON or as an urlencoded form
///
/// A missing or empty body reads as `{}` so the validator reports the
/// missing token itself. Bodies of any other content type are ignored.
pub struct ValidatePayload(pub ValidateBody);

impl<S: Send + Sync> FromRequest<S> for ValidatePayload {
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        match content_type.as_deref() {
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => {
                Form::<ValidateBody>::from_request(req, state)
                    .await
                    .map(|Form(body)| Self(body))
                    .map_err(|rejection| bad_body(rejection.body_text()))
            }
            None => read_json(req, state).await,
            Some(ct) if is_json(ct) => read_json(req, state).await,
            Some(_) => Ok(Self(ValidateBody::default())),
        }
    }
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence == "application/json" || essence.ends_with("+json")
}

async fn read_json<S: Send + Sync>(req: Request, state: &S) -> Result<ValidatePayload, Response> {
    let bytes = Bytes::from_request(req, state)
        .await
        .map_err(|rejection| bad_body(rejection.body_text()))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ValidatePayload(ValidateBody::default()));
    }

    Json::<ValidateBody>::from_bytes(&bytes)
        .map(|Json(body)| ValidatePayload(body))
        .map_err(|rejection| bad_body(rejection.body_text()))
}

fn bad_body(message: String) -> Response {
    let body = ValidateResponse {
        success: false,
        message: Some(message),
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

/// Validate a reCAPTCHA v2 token
pub async fn validate_v2(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    headers: HeaderMap,
    ValidatePayload(body): ValidatePayload,
) -> Response {
    respond(&state, ChallengeVersion::V2, client, &headers, body).await
}

/// Validate a reCAPTCHA v3 token and its action
pub async fn validate_v3(
    State(state): State<AppState>,
    ClientIp(client): ClientIp,
    headers: HeaderMap,
    ValidatePayload(body): ValidatePayload,
) -> Response {
    respond(&state, ChallengeVersion::V3, client, &headers, body).await
}

async fn respond(
    state: &AppState,
    version: ChallengeVersion,
    client_address: String,
    headers: &HeaderMap,
    body: ValidateBody,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let request = ValidationRequest {
        token: body.token.unwrap_or_default(),
        origin: origin.to_string(),
        action: body.action.filter(|_| version == ChallengeVersion::V3),
        client_address,
    };

    let outcome = state.validator.validate(version, &request).await;

    tracing::debug!(
        version = %version,
        token = %token_fingerprint(&request.token),
        origin = %request.origin,
        client = %request.client_address,
        accepted = outcome.accepted,
        status = outcome.status,
        "Validation completed"
    );

    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ValidateResponse::from(&outcome))).into_response()
}
