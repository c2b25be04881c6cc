//! The conversation session controller.
//!
//! Owns the transcript, the composition and the dispatch state machine
//! (`Idle -> Pending -> Idle`). At most one request is outstanding; every
//! settled request appends exactly one assistant message, whether it
//! succeeded or not.
//!
//! Event loops drive it in two steps, [`Session::begin_dispatch`] and
//! [`Session::settle`], so the request can run on another task. Callers that
//! can simply await use [`Session::submit`].

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::attachment::{self, AttachmentTicket, FileSelection};
use crate::backend::{ChatRequest, ChatService};
use crate::error::ChatError;
use crate::gate;
use crate::render::{RenderSignal, RenderSync};
use crate::state::{Composition, DispatchState, EncodedImage, Message};
use crate::transcript::{Transcript, DEFAULT_GREETING};

/// Instruction sent when the user attaches an image without typing anything.
pub const DEFAULT_IMAGE_PROMPT: &str = "What is in this image?";

#[derive(Debug)]
pub struct Session {
    transcript: Transcript,
    composition: Composition,
    dispatch: DispatchState,
    render: RenderSync,
    next_ticket: u64,
    current_ticket: Option<AttachmentTicket>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_greeting(DEFAULT_GREETING)
    }

    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        Self {
            transcript: Transcript::with_greeting(greeting),
            composition: Composition::default(),
            dispatch: DispatchState::Idle,
            render: RenderSync::default(),
            next_ticket: 0,
            current_ticket: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.dispatch
    }

    pub fn is_pending(&self) -> bool {
        self.dispatch == DispatchState::Pending
    }

    pub fn can_submit(&self) -> bool {
        gate::can_submit(self.dispatch, &self.composition)
    }

    pub fn can_edit(&self) -> bool {
        gate::can_edit(self.dispatch)
    }

    /// Receive a signal after every append and every dispatch state change.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RenderSignal> {
        self.render.subscribe()
    }

    /// Mutable access to the draft text, or `None` while a request is pending.
    pub fn draft_mut(&mut self) -> Option<&mut String> {
        if !self.can_edit() {
            return None;
        }
        Some(&mut self.composition.draft_text)
    }

    pub fn set_draft_text(&mut self, text: impl Into<String>) -> bool {
        match self.draft_mut() {
            Some(draft) => {
                *draft = text.into();
                true
            }
            None => false,
        }
    }

    /// Accept a file for encoding. Non-images and selections made while a
    /// request is pending are ignored without any state change.
    pub fn select_attachment(&mut self, selection: &FileSelection) -> Option<AttachmentTicket> {
        if !self.can_edit() {
            debug!("attachment selection ignored while pending");
            return None;
        }
        if !selection.is_image() {
            debug!(content_type = %selection.content_type, "ignoring non-image selection");
            return None;
        }

        self.next_ticket += 1;
        let ticket = AttachmentTicket(self.next_ticket);
        self.current_ticket = Some(ticket);
        debug!(path = %selection.path.display(), "attachment selected");
        Some(ticket)
    }

    /// Install an encoded image if `ticket` is still the current selection.
    pub fn install_attachment(&mut self, ticket: AttachmentTicket, image: EncodedImage) -> bool {
        if self.current_ticket != Some(ticket) {
            debug!("dropping stale attachment");
            return false;
        }

        self.current_ticket = None;
        debug!(attachment = %image.describe(), "attachment ready");
        self.composition.draft_attachment = Some(image);
        true
    }

    /// Select, encode and install a file in one step.
    pub async fn attach_file(&mut self, selection: &FileSelection) -> bool {
        let Some(ticket) = self.select_attachment(selection) else {
            return false;
        };

        match attachment::encode(selection).await {
            Ok(image) => self.install_attachment(ticket, image),
            Err(e) => {
                warn!("failed to encode attachment: {}", e);
                false
            }
        }
    }

    /// Remove the attachment and forget any selection still being encoded.
    pub fn clear_attachment(&mut self) {
        self.composition.draft_attachment = None;
        self.current_ticket = None;
    }

    /// Idle -> Pending. Snapshots and clears the composition, appends the
    /// user message and returns the request to send. Returns `None` (and
    /// changes nothing) if the input gate is closed.
    pub fn begin_dispatch(&mut self) -> Option<ChatRequest> {
        if !self.can_submit() {
            debug!(state = ?self.dispatch, "submit rejected");
            return None;
        }

        let text = self.composition.draft_text.trim();
        let message = if text.is_empty() {
            DEFAULT_IMAGE_PROMPT.to_string()
        } else {
            text.to_string()
        };
        let attachment = self.composition.draft_attachment.clone();
        let user_message = Message::user(Some(message.clone()), attachment.clone())?;

        self.composition.take();
        self.append(user_message);
        self.set_dispatch(DispatchState::Pending);

        info!(
            message_len = message.len(),
            attachment = ?attachment.as_ref().map(EncodedImage::describe),
            "dispatching chat request"
        );

        Some(ChatRequest {
            message,
            image: attachment.map(|image| image.payload().to_string()),
        })
    }

    /// Pending -> Idle. Appends exactly one assistant message for the outcome.
    /// Ignored when nothing is pending.
    pub fn settle(&mut self, outcome: Result<String, ChatError>) -> bool {
        if !self.is_pending() {
            warn!("settle called with no request pending");
            return false;
        }

        let reply = match outcome {
            Ok(text) => {
                info!(reply_len = text.len(), "chat request succeeded");
                Message::assistant(text)
            }
            Err(e) => {
                warn!(transport = e.is_transport(), "chat request failed: {}", e);
                Message::assistant(e.fallback_text())
            }
        };

        self.append(reply);
        self.set_dispatch(DispatchState::Idle);
        true
    }

    /// Send the current composition and wait for the reply.
    /// Returns `false` if the submission was rejected.
    pub async fn submit<S: ChatService>(&mut self, service: &S) -> bool {
        let Some(request) = self.begin_dispatch() else {
            return false;
        };
        let outcome = service.chat(&request).await;
        self.settle(outcome)
    }

    fn append(&mut self, message: Message) {
        let index = self.transcript.append(message);
        self.render.notify(RenderSignal::Appended(index));
    }

    fn set_dispatch(&mut self, state: DispatchState) {
        if self.dispatch != state {
            self.dispatch = state;
            self.render.notify(RenderSignal::DispatchChanged(state));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{TransportError, CONNECTIVITY_FAILURE_TEXT, GENERIC_FAILURE_TEXT};
    use crate::state::Role;
    use std::future::Future;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Answers every request with the same scripted outcome.
    struct ScriptedService {
        outcome: fn() -> Result<String, ChatError>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedService {
        fn new(outcome: fn() -> Result<String, ChatError>) -> Self {
            Self {
                outcome,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn replying() -> Self {
            Self::new(|| Ok("Hi! How can I help?".to_string()))
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl ChatService for ScriptedService {
        fn chat(
            &self,
            request: &ChatRequest,
        ) -> impl Future<Output = Result<String, ChatError>> + Send {
            self.requests.lock().unwrap().push(request.clone());
            let outcome = (self.outcome)();
            async move { outcome }
        }
    }

    fn png() -> EncodedImage {
        EncodedImage::from_bytes("image/png", b"\x89PNG").unwrap()
    }

    fn attach(session: &mut Session, image: EncodedImage) {
        let ticket = session
            .select_attachment(&FileSelection::from_path("photo.png"))
            .unwrap();
        assert!(session.install_attachment(ticket, image));
    }

    fn texts(session: &Session) -> Vec<(Role, Option<&str>)> {
        session
            .transcript()
            .messages()
            .iter()
            .map(|m| (m.role(), m.text()))
            .collect()
    }

    #[tokio::test]
    async fn test_blank_submit_is_noop() {
        let mut session = Session::new();
        let service = ScriptedService::replying();
        session.set_draft_text("   ");

        assert!(!session.submit(&service).await);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.dispatch_state(), DispatchState::Idle);
        assert!(service.requests().is_empty());
    }

    #[test]
    fn test_non_image_selection_changes_nothing() {
        let mut session = Session::new();
        session.set_draft_text("keep me");
        let before = session.composition().clone();

        assert!(session
            .select_attachment(&FileSelection::from_path("report.pdf"))
            .is_none());
        assert_eq!(session.composition(), &before);
    }

    #[test]
    fn test_non_image_selection_keeps_pending_encode_valid() {
        let mut session = Session::new();
        let ticket = session
            .select_attachment(&FileSelection::from_path("photo.png"))
            .unwrap();

        session.select_attachment(&FileSelection::from_path("notes.txt"));

        assert!(session.install_attachment(ticket, png()));
    }

    #[tokio::test]
    async fn test_text_exchange_appends_user_then_assistant() {
        let mut session = Session::new();
        let service = ScriptedService::replying();
        session.set_draft_text("Hello");

        assert!(session.submit(&service).await);

        assert_eq!(
            texts(&session),
            vec![
                (Role::Assistant, Some(DEFAULT_GREETING)),
                (Role::User, Some("Hello")),
                (Role::Assistant, Some("Hi! How can I help?")),
            ]
        );
        assert_eq!(session.dispatch_state(), DispatchState::Idle);
        assert!(session.composition().is_empty());
        assert_eq!(
            service.requests(),
            vec![ChatRequest {
                message: "Hello".to_string(),
                image: None,
            }]
        );
    }

    #[tokio::test]
    async fn test_draft_is_trimmed_before_sending() {
        let mut session = Session::new();
        let service = ScriptedService::replying();
        session.set_draft_text("  Hello  \n");

        session.submit(&service).await;

        assert_eq!(service.requests()[0].message, "Hello");
        assert_eq!(session.transcript().messages()[1].text(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_transport_failure_appends_connectivity_text() {
        let mut session = Session::new();
        let service = ScriptedService::new(|| {
            Err(TransportError::Aborted("connection refused".to_string()).into())
        });
        session.set_draft_text("Hello");

        assert!(session.submit(&service).await);

        assert_eq!(session.transcript().len(), 3);
        let last = session.transcript().last().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert_eq!(last.text(), Some(CONNECTIVITY_FAILURE_TEXT));
        assert_eq!(session.dispatch_state(), DispatchState::Idle);
    }

    #[tokio::test]
    async fn test_application_failure_appends_generic_text() {
        let mut session = Session::new();
        let service = ScriptedService::new(|| {
            Err(ChatError::Application {
                status: 200,
                detail: Some("model overloaded".to_string()),
            })
        });
        session.set_draft_text("Hello");

        assert!(session.submit(&service).await);

        assert_eq!(session.transcript().len(), 3);
        assert_eq!(
            session.transcript().last().unwrap().text(),
            Some(GENERIC_FAILURE_TEXT)
        );
        assert_eq!(session.dispatch_state(), DispatchState::Idle);
    }

    #[test]
    fn test_second_submit_while_pending_is_noop() {
        let mut session = Session::new();
        session.set_draft_text("first");
        assert!(session.begin_dispatch().is_some());
        assert_eq!(session.dispatch_state(), DispatchState::Pending);
        let len = session.transcript().len();

        // Editing is locked, so the draft stays empty and the gate stays closed.
        assert!(!session.set_draft_text("second"));
        assert!(session.begin_dispatch().is_none());

        assert_eq!(session.transcript().len(), len);
        assert_eq!(session.dispatch_state(), DispatchState::Pending);
    }

    #[test]
    fn test_editing_locked_while_pending() {
        let mut session = Session::new();
        session.set_draft_text("question");
        session.begin_dispatch();

        assert!(session.draft_mut().is_none());
        assert!(session
            .select_attachment(&FileSelection::from_path("photo.png"))
            .is_none());
        assert!(!session.can_submit());

        session.settle(Ok("answer".to_string()));
        assert!(session.draft_mut().is_some());
    }

    #[tokio::test]
    async fn test_image_with_blank_text_uses_default_prompt() {
        let mut session = Session::new();
        let service = ScriptedService::replying();
        attach(&mut session, png());

        assert!(session.submit(&service).await);

        let user = &session.transcript().messages()[1];
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.text(), Some(DEFAULT_IMAGE_PROMPT));
        assert_eq!(user.attachment(), Some(&png()));

        let request = &service.requests()[0];
        assert_eq!(request.message, DEFAULT_IMAGE_PROMPT);
        assert_eq!(request.image.as_deref(), Some("data:image/png;base64,iVBORw=="));
        assert!(session.composition().draft_attachment.is_none());
    }

    #[tokio::test]
    async fn test_cleared_attachment_is_not_sent() {
        let mut session = Session::new();
        let service = ScriptedService::replying();
        attach(&mut session, png());
        session.clear_attachment();
        assert!(session.composition().draft_attachment.is_none());

        session.set_draft_text("just text");
        assert!(session.submit(&service).await);

        assert!(session.transcript().messages()[1].attachment().is_none());
        assert_eq!(service.requests()[0].image, None);
    }

    #[test]
    fn test_clear_discards_in_flight_encode() {
        let mut session = Session::new();
        let selection = FileSelection::from_path("photo.png");
        let stale = session.select_attachment(&selection).unwrap();

        session.clear_attachment();
        assert!(!session.install_attachment(stale, png()));
        assert!(session.composition().draft_attachment.is_none());

        // The same file can be picked again.
        let fresh = session.select_attachment(&selection).unwrap();
        assert!(session.install_attachment(fresh, png()));
    }

    #[test]
    fn test_newer_selection_wins() {
        let mut session = Session::new();
        let first = session
            .select_attachment(&FileSelection::from_path("a.png"))
            .unwrap();
        let second = session
            .select_attachment(&FileSelection::from_path("b.jpg"))
            .unwrap();

        assert!(!session.install_attachment(first, png()));
        assert!(session.install_attachment(second, png()));
    }

    #[tokio::test]
    async fn test_repeated_exchange_is_not_deduplicated() {
        let mut session = Session::new();
        let service = ScriptedService::replying();

        for _ in 0..2 {
            session.set_draft_text("Hello");
            assert!(session.submit(&service).await);
        }

        assert_eq!(
            texts(&session),
            vec![
                (Role::Assistant, Some(DEFAULT_GREETING)),
                (Role::User, Some("Hello")),
                (Role::Assistant, Some("Hi! How can I help?")),
                (Role::User, Some("Hello")),
                (Role::Assistant, Some("Hi! How can I help?")),
            ]
        );
        assert_eq!(service.requests().len(), 2);
    }

    #[test]
    fn test_settle_without_pending_request_is_ignored() {
        let mut session = Session::new();
        assert!(!session.settle(Ok("unsolicited".to_string())));
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.dispatch_state(), DispatchState::Idle);
    }

    #[tokio::test]
    async fn test_render_signals_follow_every_mutation() {
        let mut session = Session::new();
        let mut signals = session.subscribe();
        let service = ScriptedService::replying();
        session.set_draft_text("Hello");

        session.submit(&service).await;

        let mut received = Vec::new();
        while let Ok(signal) = signals.try_recv() {
            received.push(signal);
        }
        assert_eq!(
            received,
            vec![
                RenderSignal::Appended(1),
                RenderSignal::DispatchChanged(DispatchState::Pending),
                RenderSignal::Appended(2),
                RenderSignal::DispatchChanged(DispatchState::Idle),
            ]
        );
    }

    #[tokio::test]
    async fn test_attach_file_reads_and_installs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pixel.gif");
        std::fs::write(&path, b"GIF89a").unwrap();
        let mut session = Session::new();

        assert!(session.attach_file(&FileSelection::from_path(&path)).await);

        let image = session.composition().draft_attachment.as_ref().unwrap();
        assert_eq!(image.mime_type(), "image/gif");
        assert!(session.can_submit());
    }

    #[tokio::test]
    async fn test_attach_missing_file_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut session = Session::new();

        assert!(!session
            .attach_file(&FileSelection::from_path(dir.path().join("missing.png")))
            .await);
        assert!(session.composition().is_empty());
    }
}
