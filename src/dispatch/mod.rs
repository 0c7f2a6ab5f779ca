//! Canvas AI dispatch
//!
//! The canvas machine hands a confirmed drawing to a [`CanvasDispatcher`] and
//! polls it for the answer. Two dispatchers exist:
//!
//! - [`InlineDispatcher`] runs the query on the calling thread, blocking the
//!   frame loop until the answer arrives.
//! - [`AiWorker`] runs queries on a background thread and delivers answers
//!   through a channel; a reset cancels whatever is outstanding.
//!
//! Failures never propagate to the frame loop. They come back as display text
//! prefixed with [`ERROR_PREFIX`].

pub mod ollama;
pub mod prompts;
pub mod worker;

pub use ollama::{OllamaClient, VisionError};
pub use prompts::{get_builtin_prompts, get_prompt_by_id, resolve_prompt, PromptTemplate};
pub use worker::AiWorker;

use futures_util::future::BoxFuture;
use std::time::Duration;

/// Prefix of the text shown when a query fails
pub const ERROR_PREFIX: &str = "Error: ";

/// An external image + prompt -> text service
pub trait VisionClient: Send + Sync {
    fn describe<'a>(
        &'a self,
        prompt: &'a str,
        image_png: &'a [u8],
    ) -> BoxFuture<'a, Result<String, VisionError>>;
}

/// One query: the instruction and the PNG-encoded canvas
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub prompt: String,
    pub image_png: Vec<u8>,
}

impl VisionRequest {
    pub fn new(prompt: impl Into<String>, image_png: Vec<u8>) -> Self {
        Self {
            prompt: prompt.into(),
            image_png,
        }
    }
}

/// Text to display for a query outcome
pub fn response_text<E: std::fmt::Display>(result: Result<String, E>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => format!("{}{}", ERROR_PREFIX, e),
    }
}

/// Where the canvas machine sends confirmed drawings
pub trait CanvasDispatcher {
    /// Start a query
    fn send(&mut self, request: VisionRequest);

    /// Take the newest answer, if one has arrived since the last poll
    fn poll(&mut self) -> Option<String>;

    /// Drop any outstanding query and undelivered answer
    fn cancel(&mut self);

    /// Whether a query was sent and its answer not yet taken
    fn is_pending(&self) -> bool;

    /// Block up to `timeout` for an outstanding answer
    fn wait(&mut self, _timeout: Duration) -> Option<String> {
        self.poll()
    }
}

/// Runs each query to completion inside `send`
pub struct InlineDispatcher<C> {
    client: C,
    runtime: tokio::runtime::Runtime,
    ready: Option<String>,
}

impl<C: VisionClient> InlineDispatcher<C> {
    pub fn new(client: C) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            client,
            runtime,
            ready: None,
        })
    }
}

impl<C: VisionClient> CanvasDispatcher for InlineDispatcher<C> {
    fn send(&mut self, request: VisionRequest) {
        tracing::info!("Querying vision model ({} byte image)", request.image_png.len());
        let result = self
            .runtime
            .block_on(self.client.describe(&request.prompt, &request.image_png));
        if let Err(e) = &result {
            tracing::error!("Vision query failed: {}", e);
        }
        self.ready = Some(response_text(result));
    }

    fn poll(&mut self) -> Option<String> {
        self.ready.take()
    }

    fn cancel(&mut self) {
        self.ready = None;
    }

    fn is_pending(&self) -> bool {
        self.ready.is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedClient;
    use super::*;

    fn request() -> VisionRequest {
        VisionRequest::new("Which side wins?", vec![1, 2, 3])
    }

    #[test]
    fn test_response_text() {
        assert_eq!(response_text::<VisionError>(Ok("left".to_string())), "left");
        let failed: Result<String, VisionError> = Err(VisionError::Timeout(5));
        assert_eq!(response_text(failed), "Error: Request timeout after 5 seconds");
    }

    #[test]
    fn test_inline_dispatch_returns_answer_once() {
        let client = ScriptedClient::answering("left, because of the shading");
        let mut dispatcher = InlineDispatcher::new(client.clone()).unwrap();

        assert!(!dispatcher.is_pending());
        dispatcher.send(request());
        assert!(dispatcher.is_pending());
        assert_eq!(
            dispatcher.poll().as_deref(),
            Some("left, because of the shading")
        );
        assert_eq!(dispatcher.poll(), None);
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn test_inline_dispatch_failure_becomes_text() {
        let mut dispatcher = InlineDispatcher::new(ScriptedClient::failing(401)).unwrap();
        dispatcher.send(request());
        let text = dispatcher.poll().unwrap();
        assert!(text.starts_with(ERROR_PREFIX));
        assert!(text.contains("401"));
    }

    #[test]
    fn test_inline_cancel_discards_answer() {
        let mut dispatcher = InlineDispatcher::new(ScriptedClient::answering("right")).unwrap();
        dispatcher.send(request());
        dispatcher.cancel();
        assert!(!dispatcher.is_pending());
        assert_eq!(dispatcher.wait(Duration::from_millis(10)), None);
    }
}
