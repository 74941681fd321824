use std::fmt::Debug;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Protocol failures of the authorization code flow. Every variant is
/// terminal: the flow aborts, no session cookie is set, and authorization
/// codes are never retried (they are single-use).
#[derive(Debug, thiserror::Error)]
pub enum AuthFlowError {
    #[error("state parameter missing or does not match the stored value")]
    InvalidState,

    #[error("code challenge does not derive from the stored verifier")]
    InvalidCodeChallenge,

    #[error("callback did not carry an authorization code")]
    MissingCode,

    #[error("authorization code rejected by the token endpoint")]
    InvalidCode,

    #[error("upstream service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("failed to seal the session payload")]
    SealingFailure,
}

impl AuthFlowError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidState
            | Self::InvalidCodeChallenge
            | Self::MissingCode
            | Self::InvalidCode => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) | Self::SealingFailure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Plaintext body for the first-party callback response.
    pub fn message(&self) -> &'static str {
        match self {
            Self::InvalidState => "Invalid State",
            Self::InvalidCodeChallenge => "Invalid Code Challenge",
            Self::MissingCode => "Missing authorization code",
            Self::InvalidCode => "Invalid Code",
            Self::UpstreamUnavailable(_) => "Identity service unavailable",
            Self::SealingFailure => "Failed to establish session",
        }
    }

    /// Query-string error code for the third-party callback redirect.
    pub fn redirect_code(&self) -> &'static str {
        match self {
            Self::InvalidState => "invalid_state",
            Self::MissingCode => "no_code",
            _ => "authentication_failed",
        }
    }
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "authorization flow failed");
        (self.status(), self.message().to_owned()).into_response()
    }
}

#[derive(Debug)]
pub struct ServerError<R: IntoResponse>(pub(crate) color_eyre::Report, pub(crate) R);

pub type ServerResult<S, F = Response> = Result<S, ServerError<F>>;

impl<R: IntoResponse> IntoResponse for ServerError<R> {
    fn into_response(self) -> Response {
        tracing::error!(error = ?self.0, "Request Error");
        self.1.into_response()
    }
}

impl<E> From<E> for ServerError<StatusCode>
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        ServerError(err.into(), StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub(crate) trait WithStatus<T> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError<StatusCode>>;
}

impl<T> WithStatus<T> for Result<T, color_eyre::Report> {
    fn with_status(self, status: StatusCode) -> Result<T, ServerError<StatusCode>> {
        match self {
            Ok(val) => Ok(val),
            Err(err) => Err(ServerError(err, status)),
        }
    }
}
