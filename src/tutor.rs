//! The dispatch cycle that ties a session to a generator.
//!
//! Every question goes through two explicit phases.  `submit` appends the
//! user turn; `resolve` derives the pending request from that turn, issues
//! exactly one generation call, and appends the assistant turn only if the
//! call succeeds.  A failure leaves the user turn in place and the session
//! ready for the next action.

use crate::config::TutorConfig;
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::observability::{DISPATCH_COMPLETED, DISPATCH_FAILED, DISPATCH_REFUSED};
use crate::session::Session;
use crate::types::{GenerateRequest, Model, PendingRequest, Turn};

/// Where a session is in its dispatch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Ready for the next action.
    Idle,
    /// A generation call is outstanding.
    Dispatched,
}

/// Holds a session in `Dispatched` and puts it back to `Idle` when dropped,
/// whether the call finished or its future was abandoned.
struct DispatchGuard<'a> {
    state: &'a mut DispatchState,
}

impl<'a> DispatchGuard<'a> {
    fn enter(state: &'a mut DispatchState) -> Self {
        *state = DispatchState::Dispatched;
        Self { state }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        *self.state = DispatchState::Idle;
    }
}

/// Counters describing a tutoring session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TutorStats {
    /// Turns currently in the transcript.
    pub turn_count: usize,
    /// Generation calls that produced an answer.
    pub completed: u64,
    /// Generation calls that failed.
    pub failed: u64,
}

/// A tutoring session: one transcript, one generator, one call at a time.
pub struct Tutor<G: Generator> {
    generator: G,
    config: TutorConfig,
    session: Session,
    state: DispatchState,
    completed: u64,
    failed: u64,
}

impl<G: Generator> Tutor<G> {
    /// Creates a tutor with an empty session.
    pub fn new(generator: G, config: TutorConfig) -> Self {
        Self {
            generator,
            config,
            session: Session::new(),
            state: DispatchState::Idle,
            completed: 0,
            failed: 0,
        }
    }

    /// Phase one: record the user's turn.
    ///
    /// Refused while a call is outstanding; the transcript is untouched in
    /// that case.
    pub fn submit(&mut self, turn: Turn) -> Result<()> {
        self.check_idle()?;
        if !turn.is_user() {
            return Err(Error::invalid_turn("only user turns can be submitted"));
        }
        self.session.append(turn);
        Ok(())
    }

    /// Phase two: answer the latest unresolved user turn.
    ///
    /// On success the assistant turn holding the provider's text, unaltered,
    /// is appended and returned.  On failure nothing is appended.  Dropping
    /// the returned future abandons the call and leaves the session idle.
    pub async fn resolve(&mut self) -> Result<&Turn> {
        self.check_idle()?;
        let pending = self
            .session
            .last_unresolved_user()
            .and_then(PendingRequest::from_turn)
            .ok_or_else(|| Error::nothing_pending("there is no unanswered question"))?;
        let request = self.build_request(pending);

        tracing::debug!(
            model = %request.model,
            parts = request.parts.len(),
            "dispatching question"
        );
        let outcome = {
            let _dispatched = DispatchGuard::enter(&mut self.state);
            self.generator.generate(&request).await
        };

        match outcome {
            Ok(text) => {
                DISPATCH_COMPLETED.click();
                self.completed += 1;
                tracing::info!(
                    model = %request.model,
                    chars = text.len(),
                    "answer received"
                );
                self.session.append(Turn::assistant(text));
                self.session
                    .last()
                    .ok_or_else(|| Error::nothing_pending("transcript is empty"))
            }
            Err(err) => {
                DISPATCH_FAILED.click();
                self.failed += 1;
                tracing::debug!(
                    model = %request.model,
                    error = %err,
                    "question left unanswered"
                );
                Err(Error::Generation(err))
            }
        }
    }

    /// Submit a turn and resolve it.
    pub async fn ask(&mut self, turn: Turn) -> Result<&Turn> {
        self.submit(turn)?;
        self.resolve().await
    }

    /// Re-dispatch the latest unanswered question without repeating it in
    /// the transcript.
    pub async fn retry(&mut self) -> Result<&Turn> {
        if self.session.last_unresolved_user().is_none() {
            return Err(Error::nothing_pending(
                "the last question has already been answered",
            ));
        }
        self.resolve().await
    }

    /// Clears the transcript and returns the session to `Idle`.
    pub fn reset(&mut self) {
        self.session.reset();
        self.state = DispatchState::Idle;
    }

    /// The transcript.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The current dispatch state.
    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// The generator answering questions.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// The active configuration.
    pub fn config(&self) -> &TutorConfig {
        &self.config
    }

    /// Changes the model used for answers.
    pub fn set_model(&mut self, model: Model) {
        self.config.model = model;
    }

    /// Returns the current model.
    pub fn model(&self) -> &Model {
        &self.config.model
    }

    /// Sets or clears the instruction.
    pub fn set_instruction(&mut self, instruction: Option<String>) {
        self.config.instruction = instruction;
    }

    /// Returns the current instruction, if any.
    pub fn instruction(&self) -> Option<&str> {
        self.config.instruction.as_deref()
    }

    /// Returns the session counters.
    pub fn stats(&self) -> TutorStats {
        TutorStats {
            turn_count: self.session.len(),
            completed: self.completed,
            failed: self.failed,
        }
    }

    fn check_idle(&self) -> Result<()> {
        if self.state == DispatchState::Dispatched {
            DISPATCH_REFUSED.click();
            return Err(Error::busy(
                "wait for the current answer before asking again",
            ));
        }
        Ok(())
    }

    fn build_request(&self, pending: PendingRequest) -> GenerateRequest {
        GenerateRequest::new(
            self.config.model.clone(),
            self.config.instruction.clone(),
            pending,
        )
        .with_temperature(self.config.temperature)
        .with_max_output_tokens(self.config.max_output_tokens)
    }
}
