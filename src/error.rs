//! errors occuring while turning a webhook request into a delivered dingtalk message

use axum::http::StatusCode;
use thiserror::Error;

/// Every way a single webhook request can fail. None of them outlive the
/// request, they are logged and translated into a status code for the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// rendering the title or content fragment failed
    #[error("failed to render {fragment}")]
    Template {
        fragment: &'static str,
        #[source]
        source: tera::Error,
    },

    /// inbound alertmanager payload is malformed
    #[error("cannot decode alertmanager webhook payload")]
    Decode(#[source] serde_json::Error),

    /// notification could not be serialized
    #[error("error encoding dingtalk request")]
    Encoding(#[source] serde_json::Error),

    /// the request never produced a response
    #[error("error sending notification to dingtalk")]
    Transport(#[source] reqwest::Error),

    #[error("unacceptable response code {0}")]
    UnexpectedStatus(u16),

    #[error("error decoding response from dingtalk")]
    ResponseDecode(#[source] reqwest::Error),

    /// dingtalk answered with a non zero errcode
    #[error("dingtalk rejected notification: errcode {code}: {message}")]
    Application { code: i64, message: String },
}

impl Error {
    /// status code returned to alertmanager
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Application { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// body returned to alertmanager, error details only go to the log
    pub fn public_message(&self) -> &'static str {
        match self {
            Error::Application { .. } => "Unable to talk to DingTalk",
            _ => "Bad Request",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
