//! End-to-end tests for the tutor.
//!
//! The Gemini tests run against a local mock server.  The live test needs
//! GEMINI_API_KEY and is skipped without it.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::json;

    use tutorchat::{
        DispatchState, Error, Gemini, GenerateRequest, GenerationError, GenerationErrorKind,
        Generator, ImageData, InstructionMode, Model, Part, PendingRequest, Role, Tutor,
        TutorConfig, Turn,
    };

    const TINY_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    /// Answers arithmetic it knows, fails on everything else.
    #[derive(Clone, Default)]
    struct Arithmetic {
        calls: Arc<Mutex<Vec<GenerateRequest>>>,
    }

    #[async_trait]
    impl Generator for Arithmetic {
        async fn generate(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
            self.calls.lock().unwrap().push(request.clone());
            let question = request
                .parts
                .iter()
                .find_map(|part| match part {
                    Part::Text(text) => Some(text.as_str()),
                    Part::Image(_) => None,
                })
                .unwrap_or_default();
            match question {
                "What is 2+2?" => Ok("$2 + 2 = 4$".to_string()),
                _ if request.parts.iter().any(|p| matches!(p, Part::Image(_))) => {
                    Ok("The sketch shows $y = x^2$.".to_string())
                }
                _ => Err(GenerationError::new(
                    GenerationErrorKind::Connection,
                    "connection refused",
                )),
            }
        }
    }

    /// Counts warnings emitted by this crate.
    #[derive(Clone, Default)]
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let meta = event.metadata();
            if *meta.level() == tracing::Level::WARN && meta.target().starts_with("tutorchat") {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn config() -> TutorConfig {
        TutorConfig::new().with_instruction(Some("You are a patient math teacher.".to_string()))
    }

    fn gemini(server: &MockServer) -> Gemini {
        Gemini::with_options(
            Some("test-key".to_string()),
            Some(server.url("/v1beta")),
            Some(Duration::from_secs(5)),
        )
        .unwrap()
    }

    fn request(text: &str) -> GenerateRequest {
        GenerateRequest::new(
            Model::default(),
            Some("Be patient.".to_string()),
            PendingRequest::Text(text.to_string()),
        )
    }

    #[tokio::test]
    async fn question_and_answer() {
        let mut tutor = Tutor::new(Arithmetic::default(), config());
        let answer = tutor.ask(Turn::user("What is 2+2?")).await.unwrap();
        assert_eq!(answer.role, Role::Assistant);
        assert!(answer.text().contains('4'));
        assert_eq!(tutor.session().len(), 2);
        assert_eq!(tutor.session().turns()[0], Turn::user("What is 2+2?"));
    }

    #[tokio::test]
    async fn reset_then_ask_again() {
        let mut tutor = Tutor::new(Arithmetic::default(), config());
        tutor.ask(Turn::user("What is 2+2?")).await.unwrap();
        tutor.reset();
        assert!(tutor.session().is_empty());
        assert!(tutor.session().last().is_none());

        tutor.ask(Turn::user("What is 2+2?")).await.unwrap();
        assert_eq!(tutor.session().len(), 2);
    }

    #[tokio::test]
    async fn transport_failure_leaves_transcript_with_question_only() {
        let generator = Arithmetic::default();
        let mut tutor = Tutor::new(generator.clone(), config());
        let err = tutor.ask(Turn::user("Integrate sin(x)")).await.unwrap_err();
        match err {
            Error::Generation(err) => assert_eq!(err.kind, GenerationErrorKind::Connection),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(tutor.session().turns(), &[Turn::user("Integrate sin(x)")]);
        assert_eq!(tutor.state(), DispatchState::Idle);
        assert_eq!(generator.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn image_question_gets_one_answer() {
        let generator = Arithmetic::default();
        let mut tutor = Tutor::new(generator.clone(), config());
        let image = ImageData::from_bytes(TINY_PNG.to_vec()).unwrap();
        tutor
            .ask(Turn::user_with_image("What curve is this?", image))
            .await
            .unwrap();

        let turns = tutor.session().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Assistant);

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].instruction.as_deref(),
            Some("You are a patient math teacher.")
        );
        assert!(calls[0].has_image());
    }

    #[tokio::test]
    async fn gemini_returns_text_verbatim() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent")
                    .header("x-goog-api-key", "test-key");
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "candidates": [{
                            "content": {
                                "role": "model",
                                "parts": [
                                    {"text": "Step 1: $2 + 2$\n"},
                                    {"text": "Step 2: $= 4$  "}
                                ]
                            },
                            "finishReason": "STOP"
                        }]
                    }));
            })
            .await;

        let text = gemini(&server).generate(&request("2+2")).await.unwrap();
        assert_eq!(text, "Step 1: $2 + 2$\nStep 2: $= 4$  ");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn gemini_rate_limit_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1beta/models/gemini-1.5-flash:generateContent");
                then.status(429)
                    .header("retry-after", "7")
                    .json_body(json!({
                        "error": {"code": 429, "message": "Resource has been exhausted"}
                    }));
            })
            .await;

        let err = gemini(&server).generate(&request("2+2")).await.unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::RateLimit);
        assert_eq!(err.status_code, Some(429));
        assert_eq!(err.retry_after, Some(7));
        assert!(err.is_retryable());
        assert!(err.message.contains("exhausted"));
        mock.assert_calls_async(1).await;
    }

    #[tokio::test]
    async fn gemini_invalid_key_is_authentication() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(400).json_body(json!({
                    "error": {
                        "code": 400,
                        "message": "API key not valid. Please pass a valid API key.",
                        "status": "INVALID_ARGUMENT"
                    }
                }));
            })
            .await;

        let err = gemini(&server).generate(&request("2+2")).await.unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Authentication);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn gemini_blocked_prompt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200).json_body(json!({
                    "promptFeedback": {"blockReason": "SAFETY"}
                }));
            })
            .await;

        let err = gemini(&server).generate(&request("2+2")).await.unwrap_err();
        assert_eq!(err.kind, GenerationErrorKind::Blocked);
        assert!(err.message.contains("SAFETY"));
    }

    #[tokio::test]
    async fn gemini_server_error_through_tutor() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(503).body("upstream unavailable");
            })
            .await;

        let client = gemini(&server).with_instruction_mode(InstructionMode::Prefix);
        let mut tutor = Tutor::new(client, config());
        assert_eq!(
            tutor.generator().instruction_mode(),
            InstructionMode::Prefix
        );
        let err = tutor.ask(Turn::user("2+2")).await.unwrap_err();
        let generation = err.as_generation().unwrap();
        assert_eq!(generation.kind, GenerationErrorKind::Server);
        assert_eq!(generation.message, "upstream unavailable");
        assert_eq!(tutor.session().len(), 1);
    }

    #[tokio::test]
    async fn failed_call_warns_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(500).body("internal");
            })
            .await;

        let warnings = WarnCounter::default();
        let _default = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(warnings.clone()),
        );
        let mut tutor = Tutor::new(gemini(&server), config());
        assert!(tutor.ask(Turn::user("2+2")).await.is_err());
        assert_eq!(warnings.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn live_gemini_answer() {
        let api_key = std::env::var("GEMINI_API_KEY").ok();
        if api_key.is_none() {
            eprintln!("Skipping test: GEMINI_API_KEY not set");
            return;
        }

        let client = Gemini::new(api_key).expect("Failed to create client");
        let mut tutor = Tutor::new(client, TutorConfig::new());
        let answer = tutor.ask(Turn::user("What is 2+2?")).await;
        assert!(answer.is_ok(), "Request should succeed with valid API key");
    }
}
