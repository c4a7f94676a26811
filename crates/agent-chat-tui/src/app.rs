use anyhow::Result;
use ratatui::layout::Rect;
use tracing::{info, warn};

use agent_chat_core::{export_images, AgentClient, ChatMessage, ChatRole, Config, Conversation, TurnOutcome};

pub struct App {
    pub should_quit: bool,
    pub config: Config,
    pub client: AgentClient,

    // Conversation state
    pub conversation: Conversation,
    pub loading: bool,   // loading indicator shown
    pub in_flight: bool, // a turn is waiting for its reply
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Transcript scrolling
    pub scroll: u16,
    pub max_scroll: u16,
    pub follow: bool, // keep the newest message in view
    pub chat_height: u16,

    // One-line feedback shown in the footer
    pub status: Option<String>,

    // Areas for mouse hit-testing, set while rendering
    pub chat_area: Option<Rect>,
    pub send_area: Option<Rect>,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client = AgentClient::from_config(&config)?;

        Ok(Self {
            should_quit: false,
            config,
            client,

            conversation: Conversation::new(),
            loading: false,
            in_flight: false,
            animation_frame: 0,

            input: String::new(),
            cursor: 0,

            scroll: 0,
            max_scroll: 0,
            follow: true,
            chat_height: 0,

            status: None,

            chat_area: None,
            send_area: None,
        })
    }

    /// Take the input box contents as a new user turn.
    ///
    /// Returns the query to dispatch, or `None` when nothing should be sent:
    /// the trimmed input is empty, or a reply is still pending.
    pub fn submit(&mut self) -> Option<String> {
        let query = self.input.trim();
        if query.is_empty() {
            return None;
        }
        if self.in_flight {
            self.status = Some("Still waiting for the previous reply".to_string());
            return None;
        }

        let query = query.to_string();
        self.input.clear();
        self.cursor = 0;
        self.status = None;

        self.conversation.append(ChatMessage::user(query.clone()));
        self.loading = true;
        self.in_flight = true;
        self.follow = true;

        Some(query)
    }

    /// Apply the joined result of a dispatched turn.
    pub fn finish_turn(&mut self, outcome: TurnOutcome) {
        self.in_flight = false;
        self.follow = true;

        // None only for a failure under the stall policy; the indicator stays up.
        if let Some(message) = outcome.into_message(self.config.on_failure) {
            self.conversation.append(message);
            self.loading = false;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.loading {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
        if self.scroll >= self.max_scroll {
            self.follow = true;
        }
    }

    pub fn scroll_half_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_half_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    /// Save the images of the newest assistant reply that has any.
    pub fn save_latest_images(&mut self) {
        let latest = self
            .conversation
            .all()
            .iter()
            .enumerate()
            .rev()
            .find(|(_, m)| m.role == ChatRole::Assistant && m.has_images());

        let Some((idx, message)) = latest else {
            self.status = Some("No images to save".to_string());
            return;
        };

        let dir = self.config.image_dir();
        let stem = format!("reply-{}", idx + 1);
        self.status = Some(match export_images(&message.images, &dir, &stem) {
            Ok(paths) if paths.is_empty() => "Images are links; nothing to save".to_string(),
            Ok(paths) => {
                info!(count = paths.len(), dir = %dir.display(), "saved reply images");
                format!("Saved {} image(s) to {}", paths.len(), dir.display())
            }
            Err(e) => {
                warn!(error = %e, "failed to save images");
                format!("Could not save images: {}", e)
            }
        });
    }

    // Input editing
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor < char_count {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        let char_count = self.input.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_chat_core::{DispatchError, Endpoint, FailurePolicy};

    fn test_app() -> App {
        App::new(Config::new()).unwrap()
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.insert_char(c);
        }
    }

    fn success(query: &str, answer: &str, images: &[&str]) -> TurnOutcome {
        TurnOutcome {
            query: query.to_string(),
            answer: Ok(answer.to_string()),
            images: Ok(images.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn agent_down(query: &str) -> TurnOutcome {
        TurnOutcome {
            query: query.to_string(),
            answer: Err(DispatchError::Status {
                endpoint: Endpoint::Agent,
                status: 503,
                detail: Some("connection refused".to_string()),
            }),
            images: Ok(Vec::new()),
        }
    }

    #[test]
    fn test_hello_scenario() {
        let mut app = test_app();
        type_text(&mut app, "Hello");

        let query = app.submit().unwrap();
        assert_eq!(query, "Hello");
        assert_eq!(app.conversation.all(), &[ChatMessage::user("Hello")]);
        assert!(app.loading);
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);

        app.finish_turn(success(&query, "Hi there!", &["a.png", "b.png"]));
        assert_eq!(
            app.conversation.all(),
            &[
                ChatMessage::user("Hello"),
                ChatMessage::assistant("Hi there!", vec!["a.png".into(), "b.png".into()]),
            ]
        );
        assert!(!app.loading);
        assert!(!app.in_flight);
    }

    #[test]
    fn test_weather_failure_reports_error() {
        let mut app = test_app();
        type_text(&mut app, "Weather?");
        let query = app.submit().unwrap();

        app.finish_turn(agent_down(&query));

        let messages = app.conversation.all();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::user("Weather?"));
        assert_eq!(messages[1].role, ChatRole::Assistant);
        assert!(messages[1].content.starts_with("Error:"));
        assert!(messages[1].images.is_empty());
        assert!(!app.loading, "loading indicator must be cleared after a failure");
    }

    #[test]
    fn test_weather_failure_legacy_stall_diverges() {
        // The stall policy keeps the old behaviour: nothing appended, indicator stuck.
        let mut config = Config::new();
        config.on_failure = FailurePolicy::Stall;
        let mut app = App::new(config).unwrap();
        type_text(&mut app, "Weather?");
        let query = app.submit().unwrap();

        app.finish_turn(agent_down(&query));

        assert_eq!(app.conversation.all(), &[ChatMessage::user("Weather?")]);
        assert!(app.loading);
        assert!(!app.in_flight);

        // A later successful turn clears the stuck indicator.
        type_text(&mut app, "Again");
        let query = app.submit().unwrap();
        app.finish_turn(success(&query, "Sunny", &[]));
        assert!(!app.loading);
        assert_eq!(app.conversation.len(), 3);
    }

    #[test]
    fn test_empty_and_whitespace_submit_is_noop() {
        let mut app = test_app();
        assert!(app.submit().is_none());

        type_text(&mut app, "   \t ");
        assert!(app.submit().is_none());
        assert!(app.conversation.is_empty());
        assert!(!app.loading);
        assert!(!app.in_flight);
    }

    #[test]
    fn test_input_is_trimmed() {
        let mut app = test_app();
        type_text(&mut app, "  spaced out  ");
        assert_eq!(app.submit().as_deref(), Some("spaced out"));
        assert_eq!(app.conversation.all()[0].content, "spaced out");
    }

    #[test]
    fn test_n_turns_alternate() {
        let mut app = test_app();
        for i in 0..5 {
            type_text(&mut app, &format!("question {}", i));
            let query = app.submit().unwrap();
            app.finish_turn(success(&query, &format!("answer {}", i), &[]));
        }

        let messages = app.conversation.all();
        assert_eq!(messages.len(), 10);
        for (i, msg) in messages.iter().enumerate() {
            let expected = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
            assert_eq!(msg.role, expected);
        }
    }

    #[test]
    fn test_submit_while_pending_is_ignored() {
        let mut app = test_app();
        type_text(&mut app, "first");
        app.submit().unwrap();

        type_text(&mut app, "second");
        assert!(app.submit().is_none());
        assert_eq!(app.input, "second");
        assert_eq!(app.conversation.len(), 1);
        assert!(app.status.is_some());
    }

    #[test]
    fn test_utf8_editing() {
        let mut app = test_app();
        type_text(&mut app, "héllo");
        app.cursor_left();
        app.cursor_left();
        app.backspace();
        assert_eq!(app.input, "hélo");
        app.cursor_home();
        app.delete();
        assert_eq!(app.input, "élo");
        app.cursor_end();
        app.insert_char('!');
        assert_eq!(app.input, "élo!");
    }

    #[test]
    fn test_scrolling_releases_and_regains_follow() {
        let mut app = test_app();
        app.max_scroll = 10;
        app.scroll = 10;

        app.scroll_up(3);
        assert!(!app.follow);
        assert_eq!(app.scroll, 7);

        app.scroll_down(100);
        assert_eq!(app.scroll, 10);
        assert!(app.follow);
    }

    #[test]
    fn test_save_latest_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new();
        config.image_dir = Some(dir.path().to_path_buf());
        let mut app = App::new(config).unwrap();

        app.save_latest_images();
        assert_eq!(app.status.as_deref(), Some("No images to save"));

        let png = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
        type_text(&mut app, "Show me");
        let query = app.submit().unwrap();
        app.finish_turn(success(&query, "Here", &[png]));

        app.save_latest_images();
        assert!(dir.path().join("reply-2-1.png").exists());
        assert!(app.status.unwrap().starts_with("Saved 1 image(s)"));
    }

    #[test]
    fn test_tick_only_animates_while_loading() {
        let mut app = test_app();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);

        app.loading = true;
        app.tick_animation();
        app.tick_animation();
        app.tick_animation();
        assert_eq!(app.animation_frame, 0);
        app.tick_animation();
        assert_eq!(app.animation_frame, 1);
    }
}
