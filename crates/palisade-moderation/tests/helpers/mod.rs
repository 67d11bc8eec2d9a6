//! Shared test helpers: a stub classifier backend and response builders.

use std::sync::Arc;

use async_trait::async_trait;

use palisade_moderation::{
    ClassifierBackend, ClientResult, ModerationOutcome, ModerationResponse,
};

type Responder = dyn Fn(&str) -> ClientResult<ModerationResponse> + Send + Sync;

/// Backend whose behavior is a function of the submitted text.
pub struct StubBackend {
    responder: Box<Responder>,
}

impl StubBackend {
    pub fn new(
        responder: impl Fn(&str) -> ClientResult<ModerationResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
        })
    }

    /// Backend that never flags anything.
    pub fn clean() -> Arc<Self> {
        Self::new(|_| Ok(clean_response()))
    }
}

#[async_trait]
impl ClassifierBackend for StubBackend {
    async fn classify(&self, text: &str) -> ClientResult<ModerationResponse> {
        (self.responder)(text)
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// A response with one all-clear outcome.
pub fn clean_response() -> ModerationResponse {
    response_with(ModerationOutcome::default())
}

/// Wraps one outcome into a full response envelope.
pub fn response_with(outcome: ModerationOutcome) -> ModerationResponse {
    ModerationResponse {
        id: Some("modr-stub".to_string()),
        model: Some("stub-model".to_string()),
        results: vec![outcome],
    }
}
