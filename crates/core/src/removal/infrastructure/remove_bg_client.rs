use reqwest::blocking::multipart;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::photo::photo::{Photo, Provenance};
use crate::removal::domain::background_remover::{BackgroundRemover, RemovalError};
use crate::shared::constants::{
    REMOVE_BG_ACCOUNT_ENDPOINT, REMOVE_BG_API_KEY_HEADER, REMOVE_BG_ENDPOINT, REMOVE_BG_SIZE_MODE,
    REMOVE_BG_TIMEOUT,
};

/// Credit figures reported by the removal service's account endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct AccountUsage {
    pub total_credits: f64,
    pub subscription_credits: f64,
    pub payg_credits: f64,
    pub enterprise_credits: Option<f64>,
    pub free_api_calls: u64,
}

#[derive(Deserialize)]
struct AccountPayload {
    data: AccountData,
}

#[derive(Deserialize)]
struct AccountData {
    attributes: AccountAttributes,
}

#[derive(Deserialize)]
struct AccountAttributes {
    credits: CreditFigures,
    api: ApiFigures,
}

#[derive(Deserialize)]
struct CreditFigures {
    total: f64,
    subscription: f64,
    payg: f64,
    #[serde(default)]
    enterprise: Option<f64>,
}

#[derive(Deserialize)]
struct ApiFigures {
    free_calls: u64,
}

#[derive(Deserialize)]
struct ErrorPayload {
    errors: Vec<ErrorEntry>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    title: String,
}

/// Background removal over the remove.bg HTTP API.
///
/// Uploads the photo as PNG multipart with the injected API key and a
/// fixed client-side timeout. The credential comes from configuration;
/// it is never embedded in source.
pub struct RemoveBgClient {
    http: reqwest::blocking::Client,
    api_key: String,
    removebg_url: String,
    account_url: String,
}

impl RemoveBgClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, RemovalError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REMOVE_BG_TIMEOUT)
            .build()
            .map_err(|e| RemovalError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            removebg_url: REMOVE_BG_ENDPOINT.to_string(),
            account_url: REMOVE_BG_ACCOUNT_ENDPOINT.to_string(),
        })
    }

    /// Points the client at a different service base, e.g. a local stand-in.
    pub fn with_endpoints(
        mut self,
        removebg_url: impl Into<String>,
        account_url: impl Into<String>,
    ) -> Self {
        self.removebg_url = removebg_url.into();
        self.account_url = account_url.into();
        self
    }

    /// Read-only credit/usage figures for the configured credential.
    pub fn account(&self) -> Result<AccountUsage, RemovalError> {
        let response = self
            .http
            .get(&self.account_url)
            .header(REMOVE_BG_API_KEY_HEADER, &self.api_key)
            .send()
            .map_err(classify_request_error)?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RemovalError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        parse_account_payload(&body)
    }
}

impl BackgroundRemover for RemoveBgClient {
    fn remove(&self, photo: &Photo) -> Result<Photo, RemovalError> {
        let png = photo
            .to_png()
            .map_err(|e| RemovalError::Malformed(format!("could not encode photo: {e}")))?;

        let form = multipart::Form::new()
            .part(
                "image_file",
                multipart::Part::bytes(png).file_name("photo.png"),
            )
            .text("size", REMOVE_BG_SIZE_MODE);

        let response = self
            .http
            .post(&self.removebg_url)
            .header(REMOVE_BG_API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let bytes = response
            .bytes()
            .map_err(classify_request_error)?;
        Photo::from_png(&bytes, Provenance::BackgroundRemoved)
            .map_err(|e| RemovalError::Malformed(e.to_string()))
    }
}

fn classify_request_error(e: reqwest::Error) -> RemovalError {
    if e.is_timeout() {
        RemovalError::Timeout(REMOVE_BG_TIMEOUT)
    } else {
        RemovalError::Transport(e.to_string())
    }
}

/// Maps the service's status taxonomy: 403 = bad credential, 429 = rate
/// limited, any other non-success = generic failure.
fn classify_status(status: StatusCode, body: &str) -> RemovalError {
    match status.as_u16() {
        403 => RemovalError::Unauthorized,
        429 => RemovalError::RateLimited,
        _ => {
            let detail = error_title(body).unwrap_or_else(|| body.trim().to_string());
            RemovalError::Transport(format!("service returned {status}: {detail}"))
        }
    }
}

/// Pulls the human-readable title out of the service's JSON error payload.
fn error_title(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorPayload>(body)
        .ok()
        .and_then(|p| p.errors.into_iter().next())
        .map(|e| e.title)
}

fn parse_account_payload(body: &str) -> Result<AccountUsage, RemovalError> {
    let payload: AccountPayload =
        serde_json::from_str(body).map_err(|e| RemovalError::Malformed(e.to_string()))?;
    let attrs = payload.data.attributes;
    Ok(AccountUsage {
        total_credits: attrs.credits.total,
        subscription_credits: attrs.credits.subscription,
        payg_credits: attrs.credits.payg,
        enterprise_credits: attrs.credits.enterprise,
        free_api_calls: attrs.api.free_calls,
    })
}
