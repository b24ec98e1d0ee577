//! Turn controller: one request/response cycle at a time.
//!
//! The controller owns the conversation log, the mode filters and the pending
//! image. A submit appends the user turn and hands the prompt to a background
//! thread, which only calls the response client and sends the result back
//! over a channel. The log is only ever touched on the thread that owns the
//! controller, when [`TurnController::poll`] or [`TurnController::wait`]
//! picks the result up.

use crate::conversation::ConversationLog;
use crate::error_messages::describe_request_error;
use crate::prompts::PromptBuilder;
use anyhow::{anyhow, Context};
use providers::ResponseClient;
use shared::agent_api::{ImageAttachment, Prompt};
use shared::{ChatError, ModeFilters, Sender, SessionState, Subject, Turn};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Text of the user turn when only an image was sent
pub const IMAGE_PLACEHOLDER: &str = "[image]";

type Completion = anyhow::Result<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    AwaitingResponse,
}

/// Transitions reported to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A user turn was appended and a request is in flight
    Submitted,
    /// The reply arrived and was appended as a bot turn
    Responded,
    /// The request failed; a bot turn describing the failure was appended
    Failed { error: String },
}

/// Side effects hung off controller transitions (auto-save, notifications).
pub trait TurnObserver {
    fn on_event(&mut self, event: &TurnEvent, log: &ConversationLog, filters: &ModeFilters);
}

pub struct TurnController {
    log: ConversationLog,
    filters: ModeFilters,
    pending: Option<ImageAttachment>,
    builder: PromptBuilder,
    client: Arc<dyn ResponseClient>,
    response_delay: Duration,
    inflight: Option<Receiver<Completion>>,
    observers: Vec<Box<dyn TurnObserver>>,
}

impl TurnController {
    pub fn new(client: Arc<dyn ResponseClient>, builder: PromptBuilder) -> Self {
        Self {
            log: ConversationLog::new(),
            filters: ModeFilters::default(),
            pending: None,
            builder,
            client,
            response_delay: Duration::ZERO,
            inflight: None,
            observers: Vec::new(),
        }
    }

    /// Fixed pause the background thread takes before each request.
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn TurnObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> ControllerState {
        if self.inflight.is_some() {
            ControllerState::AwaitingResponse
        } else {
            ControllerState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == ControllerState::Idle
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn filters(&self) -> &ModeFilters {
        &self.filters
    }

    pub fn pending_attachment(&self) -> Option<&ImageAttachment> {
        self.pending.as_ref()
    }

    /// Hold an image until the next submit. Replaces any earlier attachment.
    pub fn attach(&mut self, image: ImageAttachment) {
        debug!(mime = %image.mime_type, bytes = image.bytes.len(), "Image attached");
        self.pending = Some(image);
    }

    pub fn set_subject(&mut self, subject: Subject) {
        self.filters.subject = subject;
    }

    pub fn set_math_only(&mut self, on: bool) {
        self.filters.math_only = on;
    }

    pub fn set_science_only(&mut self, on: bool) {
        self.filters.science_only = on;
    }

    /// Start one request cycle.
    ///
    /// Whitespace-only text counts as no text, and a missing `image` falls
    /// back to the pending attachment. Rejected with [`ChatError::EmptyInput`]
    /// when there is nothing to send and [`ChatError::Busy`] while a request
    /// is in flight; a rejected submit changes nothing.
    pub fn submit(
        &mut self,
        text: Option<&str>,
        image: Option<ImageAttachment>,
    ) -> Result<(), ChatError> {
        if self.inflight.is_some() {
            debug!("Submit rejected: a request is already in flight");
            return Err(ChatError::Busy);
        }

        let text = text.filter(|t| !t.trim().is_empty());
        let image = image.or_else(|| self.pending.take());

        // History for the prompt excludes the turn being submitted; the cue carries it
        let prompt = self
            .builder
            .build(&self.log, &self.filters, text, image.as_ref())?;

        let user_turn = Turn::now(Sender::User, text.unwrap_or(IMAGE_PLACEHOLDER))
            .with_image(image.is_some());
        self.log.append(user_turn);
        self.pending = None;

        info!(
            has_text = text.is_some(),
            has_image = image.is_some(),
            subject = self.filters.subject.as_str(),
            "Dispatching request"
        );
        self.inflight = Some(self.dispatch(prompt));
        self.notify(&TurnEvent::Submitted);
        Ok(())
    }

    fn dispatch(&self, prompt: Prompt) -> Receiver<Completion> {
        let (tx, rx) = mpsc::channel();
        let client = Arc::clone(&self.client);
        let delay = self.response_delay;

        let spawned = thread::Builder::new()
            .name("tutorbot-request".into())
            .spawn(move || {
                let result = run_request(client, prompt, delay);
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            // The sender went down with the closure, so the next poll reports the failure
            error!(error = %e, "Failed to start request thread");
        }
        rx
    }

    /// Apply a finished request, if there is one. Never blocks.
    pub fn poll(&mut self) -> Option<TurnEvent> {
        let rx = self.inflight.as_ref()?;
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(anyhow!("the request ended without a reply")),
        };
        Some(self.complete(result))
    }

    /// Block until the in-flight request finishes and apply it.
    /// Returns `None` straight away when idle.
    pub fn wait(&mut self) -> Option<TurnEvent> {
        let rx = self.inflight.as_ref()?;
        let result = rx
            .recv()
            .unwrap_or_else(|_| Err(anyhow!("the request ended without a reply")));
        Some(self.complete(result))
    }

    fn complete(&mut self, result: Completion) -> TurnEvent {
        self.inflight = None;
        let event = match result {
            Ok(reply) => {
                info!(chars = reply.len(), "Response received");
                self.log.append(Turn::now(Sender::Bot, reply));
                TurnEvent::Responded
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), "Request failed");
                self.log.append(Turn::now(Sender::Bot, describe_request_error(&e)));
                TurnEvent::Failed {
                    error: format!("{:#}", e),
                }
            }
        };
        self.notify(&event);
        event
    }

    /// Replace the whole session, e.g. after a load. Not allowed mid-request.
    pub fn restore(&mut self, state: SessionState) -> Result<(), ChatError> {
        if self.inflight.is_some() {
            return Err(ChatError::Busy);
        }
        self.log.replace_all(state.turns);
        self.filters = state.filters;
        Ok(())
    }

    /// Start over with an empty log. Not allowed mid-request.
    pub fn clear(&mut self) -> Result<(), ChatError> {
        if self.inflight.is_some() {
            return Err(ChatError::Busy);
        }
        self.log.clear();
        Ok(())
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            filters: self.filters,
            turns: self.log.turns().to_vec(),
        }
    }

    fn notify(&mut self, event: &TurnEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(event, &self.log, &self.filters);
        }
    }
}

/// Body of the background thread: the only thing it does is call the client.
fn run_request(client: Arc<dyn ResponseClient>, prompt: Prompt, delay: Duration) -> Completion {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    rt.block_on(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        client.send(&prompt).await
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a fixed outcome and records every prompt it sees.
    struct ScriptedClient {
        reply: Result<String, String>,
        seen: Arc<Mutex<Vec<Prompt>>>,
    }

    impl ScriptedClient {
        fn ok(reply: &str) -> (Arc<Self>, Arc<Mutex<Vec<Prompt>>>) {
            Self::with(Ok(reply.to_string()))
        }

        fn failing(error: &str) -> (Arc<Self>, Arc<Mutex<Vec<Prompt>>>) {
            Self::with(Err(error.to_string()))
        }

        fn with(reply: Result<String, String>) -> (Arc<Self>, Arc<Mutex<Vec<Prompt>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Arc::new(Self {
                    reply,
                    seen: seen.clone(),
                }),
                seen,
            )
        }
    }

    #[async_trait]
    impl ResponseClient for ScriptedClient {
        async fn send(&self, prompt: &Prompt) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(prompt.clone());
            self.reply.clone().map_err(|e| anyhow!(e))
        }
    }

    /// Holds each request until the test releases a reply.
    struct GatedClient {
        replies: Mutex<mpsc::Receiver<String>>,
    }

    impl GatedClient {
        fn new() -> (Arc<Self>, mpsc::Sender<String>) {
            let (tx, rx) = mpsc::channel();
            (
                Arc::new(Self {
                    replies: Mutex::new(rx),
                }),
                tx,
            )
        }
    }

    #[async_trait]
    impl ResponseClient for GatedClient {
        async fn send(&self, _prompt: &Prompt) -> anyhow::Result<String> {
            self.replies
                .lock()
                .unwrap()
                .recv()
                .map_err(|_| anyhow!("gate closed"))
        }
    }

    struct PanickingClient;

    #[async_trait]
    impl ResponseClient for PanickingClient {
        async fn send(&self, _prompt: &Prompt) -> anyhow::Result<String> {
            panic!("client blew up");
        }
    }

    struct RecordingObserver {
        events: Arc<Mutex<Vec<(TurnEvent, usize)>>>,
    }

    impl TurnObserver for RecordingObserver {
        fn on_event(&mut self, event: &TurnEvent, log: &ConversationLog, _filters: &ModeFilters) {
            self.events.lock().unwrap().push((event.clone(), log.len()));
        }
    }

    fn controller(client: Arc<dyn ResponseClient>) -> TurnController {
        TurnController::new(client, PromptBuilder::default())
    }

    fn image() -> ImageAttachment {
        ImageAttachment::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg")
    }

    #[test]
    fn test_end_to_end_cycle() {
        let (client, gate) = GatedClient::new();
        let mut ctl = controller(client);
        ctl.set_subject(Subject::Math);

        ctl.submit(Some("2+2?"), None).unwrap();
        assert_eq!(ctl.state(), ControllerState::AwaitingResponse);
        assert_eq!(ctl.log().len(), 1);
        assert_eq!(ctl.log().turns()[0].sender, Sender::User);
        assert_eq!(ctl.log().turns()[0].text, "2+2?");

        gate.send("4".to_string()).unwrap();
        assert_eq!(ctl.wait(), Some(TurnEvent::Responded));

        assert_eq!(ctl.state(), ControllerState::Idle);
        let texts: Vec<(Sender, &str)> = ctl
            .log()
            .turns()
            .iter()
            .map(|t| (t.sender, t.text.as_str()))
            .collect();
        assert_eq!(texts, vec![(Sender::User, "2+2?"), (Sender::Bot, "4")]);
    }

    #[test]
    fn test_second_submit_rejected_while_waiting() {
        let (client, gate) = GatedClient::new();
        let mut ctl = controller(client);

        ctl.submit(Some("q1"), None).unwrap();
        assert_eq!(ctl.submit(Some("q2"), None), Err(ChatError::Busy));
        assert_eq!(ctl.log().len(), 1);
        assert_eq!(ctl.poll(), None);

        gate.send("a1".to_string()).unwrap();
        ctl.wait().unwrap();
        ctl.submit(Some("q2"), None).unwrap();
        assert_eq!(ctl.log().len(), 3);
        assert_eq!(ctl.log().turns()[2].text, "q2");

        gate.send("a2".to_string()).unwrap();
        ctl.wait().unwrap();
        assert_eq!(ctl.log().len(), 4);
    }

    #[test]
    fn test_request_error_becomes_bot_turn() {
        let (client, _) = ScriptedClient::failing("gemini error: 401 Unauthorized");
        let mut ctl = controller(client);

        ctl.submit(Some("hello"), None).unwrap();
        let event = ctl.wait().unwrap();

        assert!(matches!(event, TurnEvent::Failed { .. }));
        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(ctl.log().len(), 2);
        let reply = &ctl.log().turns()[1];
        assert_eq!(reply.sender, Sender::Bot);
        assert!(reply.text.contains("API key"));

        ctl.submit(Some("again"), None).unwrap();
        ctl.wait().unwrap();
        assert_eq!(ctl.log().len(), 4);
    }

    #[test]
    fn test_failed_gemini_request_keeps_key_out_of_log() {
        let auth = shared::settings::ProviderAuth {
            api_key: Some("SECRETKEY123".into()),
        };
        let client = providers::gemini::GeminiClient::from_auth("gemini-1.5-flash", &auth)
            .unwrap()
            .with_base_url("http://127.0.0.1:9/v1beta/models");
        let mut ctl = TurnController::new(Arc::new(client), PromptBuilder::default());

        ctl.submit(Some("hi"), None).unwrap();
        let event = ctl.wait().unwrap();

        assert!(matches!(event, TurnEvent::Failed { .. }));
        let reply = &ctl.log().turns()[1];
        assert_eq!(reply.sender, Sender::Bot);
        assert!(!reply.text.contains("SECRETKEY123"));
        if let TurnEvent::Failed { error } = event {
            assert!(!error.contains("SECRETKEY123"));
        }
    }

    #[test]
    fn test_panicking_client_still_returns_to_idle() {
        let mut ctl = controller(Arc::new(PanickingClient));

        ctl.submit(Some("hello"), None).unwrap();
        let event = ctl.wait().unwrap();

        assert!(matches!(event, TurnEvent::Failed { .. }));
        assert!(ctl.is_idle());
        assert!(!ctl.log().turns()[1].text.is_empty());
    }

    #[test]
    fn test_empty_submit_is_noop() {
        let (client, seen) = ScriptedClient::ok("unused");
        let mut ctl = controller(client);

        assert_eq!(ctl.submit(None, None), Err(ChatError::EmptyInput));
        assert_eq!(ctl.submit(Some("   \n"), None), Err(ChatError::EmptyInput));
        assert!(ctl.log().is_empty());
        assert!(ctl.is_idle());
        assert_eq!(ctl.wait(), None);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_image_only_submit_uses_pending_attachment() {
        let (client, seen) = ScriptedClient::ok("That's a cat.");
        let mut ctl = controller(client);

        ctl.attach(image());
        ctl.submit(None, None).unwrap();

        assert!(ctl.pending_attachment().is_none());
        let user_turn = &ctl.log().turns()[0];
        assert_eq!(user_turn.text, IMAGE_PLACEHOLDER);
        assert!(user_turn.has_image);

        ctl.wait().unwrap();
        let prompts = seen.lock().unwrap();
        assert_eq!(prompts[0].image, Some(image()));
        assert!(!prompts[0].text.ends_with("Bot:"));
    }

    #[test]
    fn test_attachment_cleared_even_on_failure() {
        let (client, _) = ScriptedClient::failing("boom");
        let mut ctl = controller(client);

        ctl.attach(image());
        ctl.submit(Some("what is this?"), None).unwrap();
        ctl.wait().unwrap();

        assert!(ctl.pending_attachment().is_none());
        assert!(ctl.log().turns()[0].has_image);
    }

    #[test]
    fn test_busy_submit_keeps_attachment() {
        let (client, gate) = GatedClient::new();
        let mut ctl = controller(client);

        ctl.submit(Some("first"), None).unwrap();
        ctl.attach(image());
        assert_eq!(ctl.submit(None, None), Err(ChatError::Busy));
        assert!(ctl.pending_attachment().is_some());

        gate.send("ok".to_string()).unwrap();
        ctl.wait().unwrap();
    }

    #[test]
    fn test_prompt_does_not_repeat_new_turn() {
        let (client, seen) = ScriptedClient::ok("hi there");
        let mut ctl = controller(client);
        ctl.set_math_only(true);
        ctl.set_science_only(true);

        ctl.submit(Some("hi"), None).unwrap();
        ctl.wait().unwrap();

        let prompts = seen.lock().unwrap();
        assert_eq!(prompts[0].text.matches("User: hi").count(), 1);
        assert!(prompts[0].text.ends_with("User: hi\nBot:"));
        assert!(prompts[0].text.contains(crate::prompts::MATH_ONLY_DIRECTIVE));
        assert!(prompts[0].text.contains(crate::prompts::SCIENCE_ONLY_DIRECTIVE));
    }

    #[test]
    fn test_observers_see_each_transition() {
        let (client, _) = ScriptedClient::ok("fine");
        let mut ctl = controller(client);
        let events = Arc::new(Mutex::new(Vec::new()));
        ctl.add_observer(Box::new(RecordingObserver {
            events: events.clone(),
        }));

        ctl.submit(Some("how are you"), None).unwrap();
        ctl.wait().unwrap();

        let events = events.lock().unwrap();
        assert_eq!(
            *events,
            vec![(TurnEvent::Submitted, 1), (TurnEvent::Responded, 2)]
        );
    }

    #[test]
    fn test_restore_and_clear_blocked_mid_request() {
        let (client, gate) = GatedClient::new();
        let mut ctl = controller(client);

        ctl.submit(Some("q"), None).unwrap();
        assert_eq!(ctl.restore(SessionState::default()), Err(ChatError::Busy));
        assert_eq!(ctl.clear(), Err(ChatError::Busy));

        gate.send("a".to_string()).unwrap();
        ctl.wait().unwrap();

        let restored = SessionState {
            filters: ModeFilters {
                subject: Subject::English,
                math_only: false,
                science_only: false,
            },
            turns: vec![Turn::with_timestamp(Sender::Bot, "welcome back", "08:00:00")],
        };
        ctl.restore(restored.clone()).unwrap();
        assert_eq!(ctl.snapshot(), restored);

        ctl.clear().unwrap();
        assert!(ctl.log().is_empty());
        assert_eq!(ctl.filters().subject, Subject::English);
    }

    #[test]
    fn test_poll_picks_up_result() {
        let (client, _) = ScriptedClient::ok("done");
        let mut ctl = controller(client);
        ctl.submit(Some("go"), None).unwrap();

        let mut event = None;
        for _ in 0..500 {
            event = ctl.poll();
            if event.is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(event, Some(TurnEvent::Responded));
        assert!(ctl.is_idle());
    }
}
