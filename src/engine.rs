//! The conversation engine.
//!
//! [`ChatEngine`] owns the message log, the input buffer with its recall
//! history, and the submission lifecycle:
//!
//! ```text
//! Idle -> Submitting -> Streaming -> Idle
//! Idle -> Submitting -> Error -> Idle
//! ```
//!
//! A submission appends the user turn, sends the request on the tokio
//! runtime, and hands a successful reply to a [`RevealHandle`].  The
//! assistant turn is committed only when the reveal completes.  A failed
//! request commits [`FALLBACK_REPLY`] at once.  At most one turn is in flight;
//! submissions made while busy are rejected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::bus::{QuestionBus, Subscription};
use crate::directive;
use crate::error::{Error, FailureReason, Result};
use crate::observability::{
    ENGINE_FAILURES, ENGINE_INJECTED, ENGINE_REJECTED, ENGINE_SUBMISSIONS, ENGINE_TURN_DURATION,
};
use crate::recall::{self, DEFAULT_RECALL_CAPACITY, Direction, RecallHistory};
use crate::render::Renderer;
use crate::reveal::{DEFAULT_TICK, PendingStream, RevealHandle, RevealSink};
use crate::service::ChatService;
use crate::types::{ChatRequest, ChatResponse, Message, MessageId};

/// The assistant turn committed when a request fails for any reason.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// The seed assistant turn every conversation starts with.
pub const DEFAULT_GREETING: &str =
    "Hi! I'm happy to answer questions about my background, projects, and experience.";

/// Where a conversation is in its submission lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatPhase {
    /// Ready for a submission.
    #[default]
    Idle,
    /// A request is in flight.
    Submitting,
    /// A reply is being revealed.
    Streaming,
    /// A request failed; the fallback is being committed.
    Error,
}

/// Which view the surrounding UI shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// The conversation.
    #[default]
    Conversation,
    /// The portfolio content browser.
    Portfolio,
}

/////////////////////////////////////////// EngineConfig ///////////////////////////////////////

/// Settings for a [`ChatEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Text of the seed assistant turn.
    pub greeting: String,

    /// Time between revealed graphemes.
    pub tick: Duration,

    /// How many submissions recall remembers.
    pub recall_capacity: usize,
}

impl EngineConfig {
    /// Creates a config with the default greeting, a 20 ms tick, and five
    /// recall entries.
    pub fn new() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            tick: DEFAULT_TICK,
            recall_capacity: DEFAULT_RECALL_CAPACITY,
        }
    }

    /// Sets the greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Sets the reveal tick.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Sets the recall capacity.
    pub fn with_recall_capacity(mut self, capacity: usize) -> Self {
        self.recall_capacity = capacity;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/////////////////////////////////////// ConversationSnapshot ///////////////////////////////////

/// Point-in-time copy of everything the view layer shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSnapshot {
    /// The committed log, seed greeting first.
    pub messages: Vec<Message>,
    /// The input buffer.
    pub input: String,
    /// True between submission and the reply (or failure) arriving.
    pub loading: bool,
    /// Lifecycle phase.
    pub phase: ChatPhase,
    /// Revealed prefix of the reply being streamed, if any.
    pub streaming_text: Option<String>,
    /// Current view.
    pub view: View,
    /// Recall entries, most recent first.
    pub recall: Vec<String>,
    /// Recall cursor; `-1` when not browsing.
    pub cursor: isize,
    /// Why the most recent failed request failed.
    pub last_failure: Option<FailureReason>,
}

/// Counters for one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Number of committed turns, seed included.
    pub message_count: usize,
    /// Accepted submissions.
    pub submissions: u64,
    /// Submissions rejected as empty or busy.
    pub rejected: u64,
    /// Requests that ended in the fallback reply.
    pub failures: u64,
    /// Entries held by recall.
    pub recall_len: usize,
    /// Why the most recent failed request failed.
    pub last_failure: Option<FailureReason>,
}

//////////////////////////////////////////// ChatEngine ////////////////////////////////////////

struct EngineState {
    messages: Vec<Message>,
    input: String,
    cursor: Option<usize>,
    recall: RecallHistory,
    loading: bool,
    phase: ChatPhase,
    streaming: Option<String>,
    reveal: Option<RevealHandle>,
    view: View,
    turn: u64,
    turn_started: Option<Instant>,
    submissions: u64,
    rejected: u64,
    failures: u64,
    last_failure: Option<FailureReason>,
    renderer: Box<dyn Renderer>,
}

struct Shared {
    state: Mutex<EngineState>,
    service: Arc<dyn ChatService>,
    runtime: Handle,
    cancel: CancellationToken,
    phase_tx: watch::Sender<ChatPhase>,
    tick: Duration,
}

/// Conversation state and submission lifecycle.
///
/// Dropping the engine (or calling [`ChatEngine::shutdown`]) cancels any
/// in-flight request and reveal; nothing mutates the conversation after.
pub struct ChatEngine {
    shared: Arc<Shared>,
    subscription: Option<Subscription>,
}

impl ChatEngine {
    /// Creates an engine seeded with the configured greeting.
    ///
    /// # Errors
    ///
    /// Fails when called outside a tokio runtime.
    pub fn new<S, R>(config: EngineConfig, service: S, renderer: R) -> Result<Self>
    where
        S: ChatService + 'static,
        R: Renderer + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| Error::runtime(format!("chat engine requires a tokio runtime: {e}")))?;
        let mut renderer: Box<dyn Renderer> = Box::new(renderer);
        let greeting = Message::assistant(config.greeting);
        renderer.print_reply(&greeting);
        let state = EngineState {
            messages: vec![greeting],
            input: String::new(),
            cursor: None,
            recall: RecallHistory::new(config.recall_capacity),
            loading: false,
            phase: ChatPhase::Idle,
            streaming: None,
            reveal: None,
            view: View::Conversation,
            turn: 0,
            turn_started: None,
            submissions: 0,
            rejected: 0,
            failures: 0,
            last_failure: None,
            renderer,
        };
        let (phase_tx, _) = watch::channel(ChatPhase::Idle);
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            service: Arc::new(service),
            runtime,
            cancel: CancellationToken::new(),
            phase_tx,
            tick: config.tick,
        });
        Ok(Self {
            shared,
            subscription: None,
        })
    }

    /// Subscribes to `bus` so published questions are injected here.
    ///
    /// Replaces any earlier subscription.
    pub fn attach(&mut self, bus: &QuestionBus) {
        let shared = Arc::downgrade(&self.shared);
        self.subscription = Some(bus.subscribe(move |event| {
            if let Some(shared) = Weak::upgrade(&shared) {
                shared.inject(&event.question);
            }
        }));
    }

    /// Stops receiving published questions.
    pub fn detach(&mut self) {
        self.subscription = None;
    }

    /// True while subscribed to a bus.
    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    /// Submits `text` as the next user turn.
    ///
    /// Returns the id of the committed user turn, or `None` if the
    /// submission was rejected because `text` is blank or a turn is already
    /// in flight.
    pub fn submit(&self, text: &str) -> Option<MessageId> {
        let mut state = self.shared.lock();
        self.shared.submit_locked(&mut state, text, false)
    }

    /// Submits the input buffer.
    pub fn submit_input(&self) -> Option<MessageId> {
        let mut state = self.shared.lock();
        let text = state.input.clone();
        self.shared.submit_locked(&mut state, &text, false)
    }

    /// Submits a question that came from outside the input line.
    ///
    /// Switches the view to the conversation first, even when the
    /// submission itself is rejected.
    pub fn inject_external_question(&self, text: &str) -> Option<MessageId> {
        self.shared.inject(text)
    }

    /// Walks recall one step and loads the entry into the input buffer.
    ///
    /// Returns the new input, or `None` when the step is a no-op.
    pub fn navigate_history(&self, direction: Direction) -> Option<String> {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let text = state.recall.navigate(&mut state.cursor, direction)?;
        state.input.clone_from(&text);
        Some(text)
    }

    /// Replaces the input buffer.
    pub fn set_input(&self, text: impl Into<String>) {
        self.shared.lock().input = text.into();
    }

    /// The input buffer.
    pub fn input(&self) -> String {
        self.shared.lock().input.clone()
    }

    /// True when the input buffer holds something and no turn is in flight.
    pub fn can_send(&self) -> bool {
        let state = self.shared.lock();
        !state.input.trim().is_empty() && state.phase == ChatPhase::Idle
    }

    /// Switches the view.
    pub fn set_view(&self, view: View) {
        let mut state = self.shared.lock();
        if state.view != view {
            state.view = view;
            state.renderer.switch_view(view);
        }
    }

    /// The current view.
    pub fn view(&self) -> View {
        self.shared.lock().view
    }

    /// The committed log, seed greeting first.
    pub fn messages(&self) -> Vec<Message> {
        self.shared.lock().messages.clone()
    }

    /// Copies the view-visible state.
    pub fn snapshot(&self) -> ConversationSnapshot {
        let state = self.shared.lock();
        ConversationSnapshot {
            messages: state.messages.clone(),
            input: state.input.clone(),
            loading: state.loading,
            phase: state.phase,
            streaming_text: state.streaming.clone(),
            view: state.view,
            recall: state.recall.iter().map(str::to_string).collect(),
            cursor: recall::cursor_offset(state.cursor),
            last_failure: state.last_failure,
        }
    }

    /// The lifecycle phase.
    pub fn phase(&self) -> ChatPhase {
        self.shared.lock().phase
    }

    /// True between submission and the reply (or failure) arriving.
    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    /// Revealed prefix of the reply being streamed, if any.
    pub fn streaming_text(&self) -> Option<String> {
        self.shared.lock().streaming.clone()
    }

    /// Follow-up prompts offered by the most recent assistant turn, one
    /// group per directive.
    pub fn follow_up_groups(&self) -> Vec<Vec<String>> {
        let state = self.shared.lock();
        state
            .messages
            .iter()
            .rev()
            .find(|message| !message.is_user())
            .map(|message| directive::prompt_groups(&message.text))
            .unwrap_or_default()
    }

    /// Follow-up prompts of the most recent assistant turn, groups
    /// concatenated in the order they are numbered for picking.
    pub fn follow_ups(&self) -> Vec<String> {
        self.follow_up_groups().into_iter().flatten().collect()
    }

    /// Counters for this engine.
    pub fn stats(&self) -> EngineStats {
        let state = self.shared.lock();
        EngineStats {
            message_count: state.messages.len(),
            submissions: state.submissions,
            rejected: state.rejected,
            failures: state.failures,
            recall_len: state.recall.len(),
            last_failure: state.last_failure,
        }
    }

    /// Waits until no turn is in flight.
    ///
    /// # Errors
    ///
    /// Fails if the engine is shut down while waiting.
    pub async fn wait_idle(&self) -> Result<()> {
        let mut phase = self.shared.phase_tx.subscribe();
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => {
                Err(Error::runtime("chat engine shut down"))
            }
            idle = phase.wait_for(|phase| *phase == ChatPhase::Idle) => {
                idle.map(|_| ()).map_err(|e| Error::runtime(e.to_string()))
            }
        }
    }

    /// Cancels the in-flight request and reveal and stops listening to the bus.
    ///
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.subscription = None;
        let mut state = self.shared.lock();
        if !self.shared.cancel.is_cancelled() {
            tracing::debug!(phase = ?state.phase, "chat engine shut down");
        }
        self.shared.cancel.cancel();
        state.reveal = None;
    }

    /// True once [`ChatEngine::shutdown`] has run.
    pub fn is_shut_down(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl Drop for ChatEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ChatEngine")
            .field("messages", &state.messages.len())
            .field("phase", &state.phase)
            .field("view", &state.view)
            .field("attached", &self.subscription.is_some())
            .finish()
    }
}

////////////////////////////////////////////// Shared //////////////////////////////////////////

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut EngineState, phase: ChatPhase) {
        tracing::debug!(from = ?state.phase, to = ?phase, "chat phase");
        state.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    fn inject(self: &Arc<Self>, text: &str) -> Option<MessageId> {
        let mut guard = self.lock();
        if self.cancel.is_cancelled() {
            return None;
        }
        ENGINE_INJECTED.click();
        let state = &mut *guard;
        if state.view != View::Conversation {
            state.view = View::Conversation;
            state.renderer.switch_view(View::Conversation);
        }
        self.submit_locked(state, text, true)
    }

    fn submit_locked(
        self: &Arc<Self>,
        state: &mut EngineState,
        text: &str,
        injected: bool,
    ) -> Option<MessageId> {
        if self.cancel.is_cancelled() {
            return None;
        }
        if text.trim().is_empty() || state.phase != ChatPhase::Idle {
            ENGINE_REJECTED.click();
            state.rejected += 1;
            tracing::debug!(phase = ?state.phase, "submission rejected");
            return None;
        }
        ENGINE_SUBMISSIONS.click();
        state.submissions += 1;
        state.turn += 1;
        state.turn_started = Some(Instant::now());

        let request = ChatRequest::new(text, &state.messages[1..]);
        let message = Message::user(text);
        let id = message.id;
        state.renderer.print_user(&message, injected);
        state.messages.push(message);
        state.recall.push(text);
        state.input.clear();
        state.cursor = None;
        state.loading = true;
        state.renderer.set_loading(true);
        self.set_phase(state, ChatPhase::Submitting);

        let token = self.cancel.child_token();
        let service = Arc::clone(&self.service);
        let shared = Arc::downgrade(self);
        let turn = state.turn;
        self.runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                outcome = service.send(&request) => outcome,
            };
            if let Some(shared) = shared.upgrade() {
                shared.finish_request(turn, outcome);
            }
        });
        Some(id)
    }

    fn finish_request(self: &Arc<Self>, turn: u64, outcome: Result<ChatResponse>) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if self.cancel.is_cancelled() || state.turn != turn {
            return;
        }
        state.loading = false;
        state.renderer.set_loading(false);
        match outcome {
            Ok(response) => {
                self.set_phase(state, ChatPhase::Streaming);
                state.streaming = Some(String::new());
                state.renderer.start_reveal();
                let sink = EngineSink {
                    shared: Arc::downgrade(self),
                    turn,
                };
                state.reveal = Some(RevealHandle::spawn(
                    &self.runtime,
                    PendingStream::new(response.response),
                    self.tick,
                    &self.cancel,
                    sink,
                ));
            }
            Err(err) => {
                ENGINE_FAILURES.click();
                let reason = err.reason();
                tracing::warn!(%reason, error = %err, "chat request failed");
                state.failures += 1;
                state.last_failure = Some(reason);
                self.set_phase(state, ChatPhase::Error);
                let message = Message::assistant(FALLBACK_REPLY);
                state.renderer.print_reply(&message);
                state.messages.push(message);
                self.finish_turn(state);
            }
        }
    }

    fn reveal_progress(&self, turn: u64, revealed: &str, delta: &str) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if self.cancel.is_cancelled() || state.turn != turn {
            return;
        }
        state.streaming = Some(revealed.to_string());
        state.renderer.print_text(delta);
    }

    fn reveal_complete(&self, turn: u64, full_text: String) {
        let mut guard = self.lock();
        let state = &mut *guard;
        if self.cancel.is_cancelled() || state.turn != turn {
            return;
        }
        state.reveal = None;
        state.streaming = None;
        let message = Message::assistant(full_text);
        state.renderer.finish_reveal(&message);
        state.messages.push(message);
        self.finish_turn(state);
    }

    fn finish_turn(&self, state: &mut EngineState) {
        if let Some(started) = state.turn_started.take() {
            ENGINE_TURN_DURATION.add(started.elapsed().as_secs_f64());
        }
        self.set_phase(state, ChatPhase::Idle);
    }
}

struct EngineSink {
    shared: Weak<Shared>,
    turn: u64,
}

impl RevealSink for EngineSink {
    fn progress(&mut self, revealed: &str, delta: &str) {
        if let Some(shared) = self.shared.upgrade() {
            shared.reveal_progress(self.turn, revealed, delta);
        }
    }

    fn complete(&mut self, full_text: String) {
        if let Some(shared) = self.shared.upgrade() {
            shared.reveal_complete(self.turn, full_text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Origin;
    use std::collections::VecDeque;
    use tokio::sync::Notify;

    #[derive(Clone)]
    enum Reply {
        Text(&'static str),
        Status(u16),
        Malformed,
    }

    /// Replies from a script, optionally waiting on a gate first.
    #[derive(Clone, Default)]
    struct ScriptedService {
        replies: Arc<Mutex<VecDeque<Reply>>>,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedService {
        fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into_iter().collect())),
                ..Self::default()
            }
        }

        fn gated(replies: impl IntoIterator<Item = Reply>) -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let service = Self {
                gate: Some(Arc::clone(&gate)),
                ..Self::new(replies)
            };
            (service, gate)
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatService for ScriptedService {
        async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Text(text)) => Ok(ChatResponse::new(text)),
                Some(Reply::Status(status)) => Err(Error::api(status, "scripted failure")),
                Some(Reply::Malformed) | None => {
                    Err(Error::serialization("missing field `response`", None))
                }
            }
        }
    }

    /// Renderer that records what it was asked to show.
    #[derive(Clone, Default)]
    struct RecordingRenderer {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingRenderer {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn revealed(&self) -> String {
            self.events()
                .iter()
                .filter_map(|event| event.strip_prefix("text:"))
                .collect()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Renderer for RecordingRenderer {
        fn print_user(&mut self, message: &Message, injected: bool) {
            self.push(format!("user:{}:{injected}", message.text));
        }

        fn set_loading(&mut self, loading: bool) {
            self.push(format!("loading:{loading}"));
        }

        fn print_text(&mut self, text: &str) {
            self.push(format!("text:{text}"));
        }

        fn finish_reveal(&mut self, message: &Message) {
            self.push(format!("finish:{}", message.text));
        }

        fn print_reply(&mut self, message: &Message) {
            self.push(format!("reply:{}", message.text));
        }

        fn switch_view(&mut self, view: View) {
            self.push(format!("view:{view:?}"));
        }

        fn print_error(&mut self, error: &str) {
            self.push(format!("error:{error}"));
        }

        fn print_info(&mut self, info: &str) {
            self.push(format!("info:{info}"));
        }
    }

    fn engine(service: &ScriptedService) -> (ChatEngine, RecordingRenderer) {
        let renderer = RecordingRenderer::default();
        let engine =
            ChatEngine::new(EngineConfig::new(), service.clone(), renderer.clone()).unwrap();
        (engine, renderer)
    }

    fn texts(engine: &ChatEngine) -> Vec<(Origin, String)> {
        engine
            .messages()
            .into_iter()
            .map(|message| (message.origin, message.text))
            .collect()
    }

    #[test]
    fn requires_a_runtime() {
        let err = ChatEngine::new(EngineConfig::new(), ScriptedService::default(), ()).unwrap_err();
        assert!(matches!(err, Error::Runtime { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn starts_with_the_greeting() {
        let service = ScriptedService::default();
        let renderer = RecordingRenderer::default();
        let engine = ChatEngine::new(
            EngineConfig::new().with_greeting("Hey there."),
            service,
            renderer.clone(),
        )
        .unwrap();
        assert_eq!(texts(&engine), vec![(Origin::Assistant, "Hey there.".to_string())]);
        assert_eq!(engine.phase(), ChatPhase::Idle);
        assert_eq!(engine.view(), View::Conversation);
        assert!(!engine.can_send());
        assert_eq!(renderer.events(), vec!["reply:Hey there.".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn hello_streams_then_commits() {
        let service = ScriptedService::new([Reply::Text("Hi there!")]);
        let (engine, renderer) = engine(&service);

        assert!(engine.submit("Hello").is_some());
        assert!(engine.is_loading());
        assert_eq!(engine.phase(), ChatPhase::Submitting);
        assert!(!engine.can_send());

        // Two graphemes in; nothing committed yet.
        tokio::time::sleep(DEFAULT_TICK * 2 + Duration::from_millis(5)).await;
        assert_eq!(engine.phase(), ChatPhase::Streaming);
        assert!(!engine.is_loading());
        assert_eq!(engine.streaming_text().as_deref(), Some("Hi"));
        assert_eq!(engine.messages().len(), 2);

        engine.wait_idle().await.unwrap();
        assert_eq!(
            texts(&engine),
            vec![
                (Origin::Assistant, DEFAULT_GREETING.to_string()),
                (Origin::User, "Hello".to_string()),
                (Origin::Assistant, "Hi there!".to_string()),
            ]
        );
        assert_eq!(engine.streaming_text(), None);
        assert_eq!(renderer.revealed(), "Hi there!");

        let requests = service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].message, "Hello");
        assert!(requests[0].history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_submission_is_ignored() {
        let service = ScriptedService::default();
        let (engine, _) = engine(&service);
        assert_eq!(engine.submit(""), None);
        assert_eq!(engine.submit("   \t"), None);
        assert_eq!(engine.messages().len(), 1);
        assert_eq!(engine.phase(), ChatPhase::Idle);
        assert_eq!(engine.stats().rejected, 2);
        tokio::task::yield_now().await;
        assert!(service.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_request_commits_fallback() {
        let service = ScriptedService::new([Reply::Status(500), Reply::Text("Back again.")]);
        let (engine, renderer) = engine(&service);

        engine.submit("Hello").unwrap();
        engine.wait_idle().await.unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.messages[2].text, FALLBACK_REPLY);
        assert_eq!(snapshot.messages[2].origin, Origin::Assistant);
        assert_eq!(snapshot.last_failure, Some(FailureReason::Status(500)));
        assert!(!snapshot.loading);
        assert_eq!(snapshot.phase, ChatPhase::Idle);
        // The fallback is committed without a reveal.
        assert!(renderer.revealed().is_empty());
        assert!(renderer.events().contains(&format!("reply:{FALLBACK_REPLY}")));

        // The fallback is part of the history sent next.
        engine.submit("Still there?").unwrap();
        engine.wait_idle().await.unwrap();
        let requests = service.requests();
        assert_eq!(requests[1].history.len(), 2);
        assert_eq!(requests[1].history[1].content, FALLBACK_REPLY);
        assert_eq!(engine.stats().failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reply_is_a_failure() {
        let service = ScriptedService::new([Reply::Malformed]);
        let (engine, _) = engine(&service);
        engine.submit("Hello").unwrap();
        engine.wait_idle().await.unwrap();
        assert_eq!(engine.messages()[2].text, FALLBACK_REPLY);
        assert_eq!(engine.snapshot().last_failure, Some(FailureReason::Malformed));
    }

    #[tokio::test(start_paused = true)]
    async fn one_turn_in_flight() {
        let (service, gate) = ScriptedService::gated([Reply::Text("first reply")]);
        let (engine, _) = engine(&service);

        assert!(engine.submit("first").is_some());
        assert_eq!(engine.submit("second"), None);
        engine.set_input("third");
        assert!(!engine.can_send());
        assert_eq!(engine.submit_input(), None);
        assert_eq!(engine.input(), "third");

        gate.notify_one();
        engine.wait_idle().await.unwrap();
        assert_eq!(engine.messages().len(), 3);
        assert_eq!(service.requests().len(), 1);
        assert!(engine.can_send());
    }

    #[tokio::test(start_paused = true)]
    async fn turns_commit_in_submission_order() {
        let service = ScriptedService::new([Reply::Text("one"), Reply::Text("two")]);
        let (engine, _) = engine(&service);

        engine.submit("first").unwrap();
        engine.wait_idle().await.unwrap();
        engine.submit("second").unwrap();
        engine.wait_idle().await.unwrap();

        let messages = engine.messages();
        let origins: Vec<Origin> = messages.iter().map(|m| m.origin).collect();
        assert_eq!(
            origins,
            vec![
                Origin::Assistant,
                Origin::User,
                Origin::Assistant,
                Origin::User,
                Origin::Assistant,
            ]
        );
        assert!(messages.windows(2).all(|pair| pair[0].id < pair[1].id));

        // The seed greeting is never sent.
        let requests = service.requests();
        let history: Vec<&str> = requests[1]
            .history
            .iter()
            .map(|turn| turn.content.as_str())
            .collect();
        assert_eq!(history, vec!["first", "one"]);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_clears_input_and_cursor() {
        let service = ScriptedService::new([Reply::Text("ok"), Reply::Text("ok")]);
        let (engine, _) = engine(&service);

        engine.set_input("What do you build?");
        assert!(engine.can_send());
        engine.submit_input().unwrap();
        assert_eq!(engine.input(), "");
        engine.wait_idle().await.unwrap();

        assert_eq!(
            engine.navigate_history(Direction::Older).as_deref(),
            Some("What do you build?")
        );
        assert_eq!(engine.snapshot().cursor, 0);
        engine.submit_input().unwrap();
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.cursor, -1);
        assert_eq!(snapshot.input, "");
        assert_eq!(snapshot.recall.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn recall_walks_previous_inputs() {
        let service = ScriptedService::new([Reply::Text("a"), Reply::Text("b"), Reply::Text("c")]);
        let (engine, _) = engine(&service);
        assert_eq!(engine.navigate_history(Direction::Older), None);

        for input in ["one", "two", "three"] {
            engine.submit(input).unwrap();
            engine.wait_idle().await.unwrap();
        }

        assert_eq!(engine.navigate_history(Direction::Newer), None);
        assert_eq!(engine.navigate_history(Direction::Older).as_deref(), Some("three"));
        assert_eq!(engine.navigate_history(Direction::Older).as_deref(), Some("two"));
        assert_eq!(engine.navigate_history(Direction::Older).as_deref(), Some("one"));
        assert_eq!(engine.navigate_history(Direction::Older).as_deref(), Some("one"));
        assert_eq!(engine.input(), "one");
        assert_eq!(engine.navigate_history(Direction::Newer).as_deref(), Some("two"));
        assert_eq!(engine.navigate_history(Direction::Newer).as_deref(), Some("three"));
        assert_eq!(engine.navigate_history(Direction::Newer).as_deref(), Some(""));
        assert_eq!(engine.input(), "");
        assert_eq!(engine.snapshot().cursor, -1);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_ups_come_from_latest_reply() {
        let reply = "Happy to. <question-buttons>[What stack?]|[Team size?]</question-buttons>";
        let service = ScriptedService::new([Reply::Text(reply)]);
        let (engine, renderer) = engine(&service);
        assert!(engine.follow_ups().is_empty());

        engine.submit("Tell me about the project").unwrap();
        engine.wait_idle().await.unwrap();
        assert_eq!(engine.messages()[2].text, reply);
        assert_eq!(engine.follow_ups(), vec!["What stack?", "Team size?"]);
        assert_eq!(renderer.revealed(), "Happy to. ");
        assert!(renderer.events().contains(&format!("finish:{reply}")));
    }

    #[tokio::test(start_paused = true)]
    async fn follow_ups_keep_one_group_per_directive() {
        let reply = "Two ways in. <question-buttons>[Projects?]</question-buttons> \
                     <question-buttons>[Stack?]|[Team?]</question-buttons>";
        let service = ScriptedService::new([Reply::Text(reply)]);
        let (engine, _) = engine(&service);

        engine.submit("Where do I start?").unwrap();
        engine.wait_idle().await.unwrap();
        assert_eq!(
            engine.follow_up_groups(),
            vec![vec!["Projects?"], vec!["Stack?", "Team?"]]
        );
        assert_eq!(engine.follow_ups(), vec!["Projects?", "Stack?", "Team?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn recall_keeps_five_and_walks_back_to_empty_input() {
        let inputs = ["1", "2", "3", "4", "5", "6", "7"];
        let service = ScriptedService::new(inputs.iter().map(|_| Reply::Text("ok")));
        let (engine, _) = engine(&service);

        for input in inputs {
            engine.submit(input).unwrap();
            engine.wait_idle().await.unwrap();
        }
        assert_eq!(engine.snapshot().recall, vec!["7", "6", "5", "4", "3"]);

        for _ in 0..5 {
            engine.navigate_history(Direction::Older);
        }
        assert_eq!(engine.input(), "3");
        assert_eq!(engine.snapshot().cursor, 4);

        for _ in 0..5 {
            engine.navigate_history(Direction::Newer);
        }
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.input, "");
        assert_eq!(snapshot.cursor, -1);
        assert_eq!(snapshot.recall, vec!["7", "6", "5", "4", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn published_question_switches_view_and_submits() {
        let bus = QuestionBus::new();
        let service = ScriptedService::new([Reply::Text("It was great.")]);
        let (mut engine, renderer) = engine(&service);
        engine.attach(&bus);
        assert!(engine.is_attached());
        engine.set_view(View::Portfolio);

        assert_eq!(bus.publish("How was the internship?"), 1);
        assert_eq!(engine.view(), View::Conversation);
        assert_eq!(engine.phase(), ChatPhase::Submitting);
        engine.wait_idle().await.unwrap();

        let messages = engine.messages();
        assert_eq!(messages[1].text, "How was the internship?");
        assert_eq!(messages[2].text, "It was great.");
        assert!(
            renderer
                .events()
                .contains(&"user:How was the internship?:true".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn busy_injection_still_switches_view() {
        let bus = QuestionBus::new();
        let (service, gate) = ScriptedService::gated([Reply::Text("done")]);
        let (mut engine, _) = engine(&service);
        engine.attach(&bus);

        engine.submit("first").unwrap();
        engine.set_view(View::Portfolio);
        bus.publish("Another question");
        assert_eq!(engine.view(), View::Conversation);
        assert_eq!(engine.messages().len(), 2);

        gate.notify_one();
        engine.wait_idle().await.unwrap();
        assert_eq!(engine.messages().len(), 3);
        assert_eq!(service.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn detach_stops_injection() {
        let bus = QuestionBus::new();
        let service = ScriptedService::default();
        let (mut engine, _) = engine(&service);
        engine.attach(&bus);
        engine.detach();
        assert_eq!(bus.publish("anyone?"), 0);
        assert_eq!(engine.messages().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_request_commits_nothing() {
        let (service, gate) = ScriptedService::gated([Reply::Text("too late")]);
        let (mut engine, _) = engine(&service);

        engine.submit("Hello").unwrap();
        tokio::task::yield_now().await;
        engine.shutdown();
        gate.notify_one();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(engine.is_shut_down());
        assert_eq!(engine.messages().len(), 2);
        assert!(engine.wait_idle().await.is_err());
        assert_eq!(engine.submit("again"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_mid_reveal_commits_nothing() {
        let service = ScriptedService::new([Reply::Text("a reply long enough to interrupt")]);
        let (mut engine, renderer) = engine(&service);

        engine.submit("Hello").unwrap();
        tokio::time::sleep(DEFAULT_TICK * 3 + Duration::from_millis(5)).await;
        assert_eq!(engine.phase(), ChatPhase::Streaming);
        engine.shutdown();
        let revealed = renderer.revealed();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(engine.messages().len(), 2);
        assert_eq!(renderer.revealed(), revealed);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_engine_unsubscribes() {
        let bus = QuestionBus::new();
        let service = ScriptedService::default();
        let (mut engine, _) = engine(&service);
        engine.attach(&bus);
        assert_eq!(bus.subscriber_count(), 1);
        drop(engine);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish("hello?"), 0);
    }
}
