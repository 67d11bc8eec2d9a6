//! Moderation endpoint client and wire types.
//!
//! The wire contract: `POST <endpoint>` with bearer authentication and an
//! optional organization header, body `{"input": text, "model": model}`.
//! Only the first entry of `results` is ever consulted.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use palisade_core::category::{CategorySignal, HarmCategory};

use crate::config::ModerationConfig;
use crate::error::{ClientError, ClientResult};

/// Header carrying the optional organization id.
pub const ORGANIZATION_HEADER: &str = "OpenAI-Organization";

/// Request body for a moderation call.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationRequest {
    /// Text to classify.
    pub input: String,
    /// Model to classify with.
    pub model: String,
}

/// One classification outcome from the moderation endpoint.
///
/// Unknown fields are ignored and missing fields default, so older and
/// newer endpoint revisions both deserialize.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModerationOutcome {
    /// Whether any category was flagged.
    #[serde(default)]
    pub flagged: bool,
    #[serde(default)]
    pub hate: bool,
    #[serde(default)]
    pub hate_score: f64,
    #[serde(default)]
    pub self_harm: bool,
    #[serde(default)]
    pub self_harm_score: f64,
    #[serde(default)]
    pub sexual: bool,
    #[serde(default)]
    pub sexual_score: f64,
    #[serde(default)]
    pub violence: bool,
    #[serde(default)]
    pub violence_score: f64,
}

impl ModerationOutcome {
    /// Returns the signal for one category via an explicit field mapping.
    ///
    /// Reserved categories carry no wire fields and return `None`.
    pub fn signal(&self, category: HarmCategory) -> Option<CategorySignal> {
        let (flagged, score) = match category {
            HarmCategory::Hate => (self.hate, self.hate_score),
            HarmCategory::SelfHarm => (self.self_harm, self.self_harm_score),
            HarmCategory::Sexual => (self.sexual, self.sexual_score),
            HarmCategory::Violence => (self.violence, self.violence_score),
            HarmCategory::Suggestive
            | HarmCategory::Profanity
            | HarmCategory::PersonalData
            | HarmCategory::AgeInappropriate => return None,
        };
        Some(CategorySignal::new(category, flagged, score))
    }

    /// Returns signals for every actively scored category, in check order.
    pub fn signals(&self) -> Vec<CategorySignal> {
        HarmCategory::active()
            .iter()
            .filter_map(|category| self.signal(*category))
            .collect()
    }
}

/// Response body from the moderation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModerationResponse {
    /// Upstream request id.
    #[serde(default)]
    pub id: Option<String>,
    /// Model that produced the classification.
    #[serde(default)]
    pub model: Option<String>,
    /// Per-input outcomes. Only the first entry is consulted.
    #[serde(default)]
    pub results: Vec<ModerationOutcome>,
}

impl ModerationResponse {
    /// Returns the first outcome, the only one this core consults.
    pub fn primary(&self) -> Option<&ModerationOutcome> {
        self.results.first()
    }
}

/// The seam between the resilience layer and a concrete classifier.
///
/// The HTTP client implements this; tests substitute scripted backends.
#[async_trait]
pub trait ClassifierBackend: Send + Sync {
    /// Classifies the given text.
    async fn classify(&self, text: &str) -> ClientResult<ModerationResponse>;

    /// Returns the backend name for logging.
    fn name(&self) -> &'static str;
}

/// HTTP client for the remote moderation endpoint.
pub struct HttpModerationClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    organization: Option<String>,
    model: String,
}

impl std::fmt::Debug for HttpModerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModerationClient")
            .field("endpoint", &self.endpoint)
            .field("organization", &self.organization)
            .field("model", &self.model)
            .finish()
    }
}

impl HttpModerationClient {
    /// Creates a client from configuration.
    ///
    /// Fails with [`ClientError::MissingApiKey`] when no key resolves from
    /// any configured source.
    pub fn from_config(config: &ModerationConfig) -> ClientResult<Self> {
        let api_key = config.resolve_api_key().ok_or(ClientError::MissingApiKey)?;
        let http = reqwest::Client::builder()
            .user_agent(format!("Palisade/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
            organization: config.organization.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ClassifierBackend for HttpModerationClient {
    async fn classify(&self, text: &str) -> ClientResult<ModerationResponse> {
        let request = ModerationRequest {
            input: text.to_string(),
            model: self.model.clone(),
        };

        let mut builder = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request);
        if let Some(org) = &self.organization {
            builder = builder.header(ORGANIZATION_HEADER, org);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Upstream {
                status: status.as_u16(),
            });
        }

        // Deserialize from the raw body so malformed payloads surface as
        // a distinct error class rather than a generic transport error.
        let body = response.text().await?;
        let parsed: ModerationResponse = serde_json::from_str(&body)?;
        if parsed.results.is_empty() {
            return Err(ClientError::EmptyResponse);
        }
        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "http-moderation"
    }
}
