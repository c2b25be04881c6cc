use std::path::PathBuf;

use assistant_core::{
    attachment, AttachmentError, AttachmentTicket, BackendClient, ChatError, EncodedImage,
    ChatService, FileSelection, HealthStatus, RenderSignal, Session, TransportError,
};
use ratatui::layout::Rect;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    /// Typing a file path in the attach prompt
    AttachPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Checking,
    Online,
    Offline,
}

type DispatchTask = JoinHandle<Result<String, ChatError>>;
type EncodeTask = JoinHandle<Result<EncodedImage, AttachmentError>>;

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation
    pub session: Session,
    pub client: BackendClient,
    render_rx: mpsc::UnboundedReceiver<RenderSignal>,

    // Composition editing
    pub input_cursor: usize, // char index into the draft
    pub path_input: String,
    pub path_cursor: usize,

    // Transcript view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_width: u16,
    pub chat_total_lines: u16, // wrapped line count of the last drawn transcript
    pub chat_area: Option<Rect>,
    follow_tail: bool,

    pub animation_frame: u8,
    pub server_status: ServerStatus,

    // Background work
    dispatch_task: Option<DispatchTask>,
    encode_task: Option<(AttachmentTicket, EncodeTask)>,
    health_task: Option<JoinHandle<HealthStatus>>,
}

impl App {
    pub fn new(mut session: Session, client: BackendClient) -> Self {
        let render_rx = session.subscribe();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            session,
            client,
            render_rx,

            input_cursor: 0,
            path_input: String::new(),
            path_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_total_lines: 0,
            chat_area: None,
            follow_tail: false,

            animation_frame: 0,
            server_status: ServerStatus::Checking,

            dispatch_task: None,
            encode_task: None,
            health_task: None,
        }
    }

    pub fn start_health_check(&mut self) {
        let client = self.client.clone();
        self.server_status = ServerStatus::Checking;
        self.health_task = Some(tokio::spawn(async move { client.health().await }));
    }

    /// Hand the composition to the dispatcher. Does nothing if the input gate
    /// is closed.
    pub fn send_message(&mut self) -> bool {
        let Some(request) = self.session.begin_dispatch() else {
            return false;
        };

        self.input_cursor = 0;
        let client = self.client.clone();
        self.dispatch_task = Some(tokio::spawn(async move { client.chat(&request).await }));
        true
    }

    pub fn open_attach_prompt(&mut self) {
        if !self.session.can_edit() {
            return;
        }
        self.path_input.clear();
        self.path_cursor = 0;
        self.input_mode = InputMode::AttachPath;
    }

    /// Start encoding the file typed into the attach prompt.
    pub fn attach_from_prompt(&mut self) {
        let path = expand_path(&self.path_input);
        self.path_input.clear();
        self.path_cursor = 0;
        self.input_mode = InputMode::Editing;

        let Some(path) = path else {
            return;
        };
        let selection = FileSelection::from_path(path);
        let Some(ticket) = self.session.select_attachment(&selection) else {
            return;
        };

        if let Some((_, previous)) = self.encode_task.take() {
            previous.abort();
        }
        self.encode_task = Some((
            ticket,
            tokio::spawn(async move { attachment::encode(&selection).await }),
        ));
    }

    pub fn clear_attachment(&mut self) {
        self.session.clear_attachment();
        if let Some((_, task)) = self.encode_task.take() {
            task.abort();
        }
    }

    pub fn is_encoding(&self) -> bool {
        self.encode_task.is_some()
    }

    /// Collect finished background tasks and feed their results to the session.
    pub async fn poll_tasks(&mut self) {
        if self.dispatch_task.as_ref().is_some_and(JoinHandle::is_finished) {
            if let Some(task) = self.dispatch_task.take() {
                let outcome = match task.await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(TransportError::Aborted(e.to_string()).into()),
                };
                self.session.settle(outcome);
            }
        }

        if self
            .encode_task
            .as_ref()
            .is_some_and(|(_, task)| task.is_finished())
        {
            if let Some((ticket, task)) = self.encode_task.take() {
                match task.await {
                    Ok(Ok(image)) => {
                        self.session.install_attachment(ticket, image);
                    }
                    Ok(Err(e)) => warn!("attachment rejected: {}", e),
                    Err(e) => warn!("attachment task failed: {}", e),
                }
            }
        }

        if self.health_task.as_ref().is_some_and(JoinHandle::is_finished) {
            if let Some(task) = self.health_task.take() {
                self.server_status = match task.await {
                    Ok(HealthStatus::Online) => ServerStatus::Online,
                    _ => ServerStatus::Offline,
                };
                debug!(status = ?self.server_status, "server health");
            }
        }
    }

    /// Scroll to the newest entry if the transcript or dispatch state changed.
    pub fn sync_render(&mut self) {
        let mut changed = false;
        while self.render_rx.try_recv().is_ok() {
            changed = true;
        }
        if changed {
            self.scroll_chat_to_bottom();
        }
    }

    pub fn tick_animation(&mut self) {
        if self.session.is_pending() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Draft editing. All of these are no-ops while a request is pending.

    pub fn insert_char(&mut self, c: char) {
        let cursor = self.input_cursor;
        if let Some(draft) = self.session.draft_mut() {
            let byte_pos = char_to_byte_index(draft, cursor);
            draft.insert(byte_pos, c);
            self.input_cursor += 1;
        }
    }

    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r') {
            self.insert_char(c);
        }
    }

    pub fn backspace(&mut self) {
        if self.input_cursor == 0 {
            return;
        }
        let cursor = self.input_cursor - 1;
        if let Some(draft) = self.session.draft_mut() {
            let byte_pos = char_to_byte_index(draft, cursor);
            draft.remove(byte_pos);
            self.input_cursor = cursor;
        }
    }

    pub fn delete(&mut self) {
        let cursor = self.input_cursor;
        if let Some(draft) = self.session.draft_mut() {
            if cursor < draft.chars().count() {
                let byte_pos = char_to_byte_index(draft, cursor);
                draft.remove(byte_pos);
            }
        }
    }

    pub fn cursor_left(&mut self) {
        self.input_cursor = self.input_cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let len = self.session.composition().draft_text.chars().count();
        self.input_cursor = (self.input_cursor + 1).min(len);
    }

    pub fn cursor_home(&mut self) {
        self.input_cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.input_cursor = self.session.composition().draft_text.chars().count();
    }

    // Attach prompt editing

    pub fn path_insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.path_input, self.path_cursor);
        self.path_input.insert(byte_pos, c);
        self.path_cursor += 1;
    }

    pub fn path_backspace(&mut self) {
        if self.path_cursor > 0 {
            self.path_cursor -= 1;
            let byte_pos = char_to_byte_index(&self.path_input, self.path_cursor);
            self.path_input.remove(byte_pos);
        }
    }

    // Transcript scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.chat_total_lines.saturating_sub(self.chat_height);
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max);
    }

    /// Pin the transcript to its newest line on the next draw, once the
    /// wrapped height of the current content is known.
    pub fn scroll_chat_to_bottom(&mut self) {
        self.follow_tail = true;
    }

    /// Record the measured transcript height and apply a pending
    /// scroll-to-bottom. Called by the renderer before drawing.
    pub fn update_chat_metrics(&mut self, total_lines: u16, height: u16, width: u16) {
        self.chat_total_lines = total_lines;
        self.chat_height = height;
        self.chat_width = width;

        let max = total_lines.saturating_sub(height);
        if std::mem::take(&mut self.follow_tail) {
            self.chat_scroll = max;
        } else {
            self.chat_scroll = self.chat_scroll.min(max);
        }
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Clean up a typed or pasted path: trim, drop surrounding quotes, expand `~`.
fn expand_path(raw: &str) -> Option<PathBuf> {
    let trimmed = raw.trim().trim_matches(|c| c == '\'' || c == '"').trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Some(home.join(rest));
        }
    }
    Some(PathBuf::from(trimmed))
}
