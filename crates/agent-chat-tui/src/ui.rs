use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use agent_chat_core::{ChatMessage, ChatRole, ImageRef};
use crate::app::App;

pub const IMAGES_HEADER: &str = "Relevant Images";
pub const THINKING: &str = "Thinking";
const PLACEHOLDER: &str = "Ask the agent something...";

/// Collect text up to the closing `delim`; the flag is false if it never closes.
fn take_until(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, delim: &str) -> (String, bool) {
    let mut inner = String::new();
    let first = delim.chars().next().unwrap_or('*');
    while let Some(c) = chars.next() {
        if c == first && (delim.len() == 1 || chars.peek() == Some(&first)) {
            if delim.len() == 2 {
                chars.next();
            }
            return (inner, true);
        }
        inner.push(c);
    }
    (inner, false)
}

/// Render one line of a reply, styling **bold** and `code` spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        let delim = match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                "**"
            }
            '`' => "`",
            _ => {
                current_text.push(c);
                continue;
            }
        };

        let (inner, closed) = take_until(&mut chars, delim);
        if !closed || inner.is_empty() {
            // No closing delimiter, treat as literal
            current_text.push_str(delim);
            current_text.push_str(&inner);
            if closed {
                current_text.push_str(delim);
            }
            continue;
        }

        if !current_text.is_empty() {
            spans.push(Span::raw(std::mem::take(&mut current_text)));
        }
        let style = if delim == "`" {
            Style::default().fg(Color::Green)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        spans.push(Span::styled(inner, style));
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn role_line(role: ChatRole) -> Line<'static> {
    let (label, color) = match role {
        ChatRole::User => ("You:", Color::Cyan),
        ChatRole::Assistant => ("Agent:", Color::Yellow),
    };
    Line::from(Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)))
}

/// The whole conversation as styled text.
///
/// Pure: the same messages, loading flag and animation frame always give the
/// same text. The chat pane is rebuilt from this on every frame.
pub fn transcript(messages: &[ChatMessage], loading: bool, animation_frame: u8) -> Text<'static> {
    if messages.is_empty() && !loading {
        return Text::from(Span::styled(PLACEHOLDER, Style::default().fg(Color::DarkGray)));
    }

    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in messages {
        lines.push(role_line(msg.role));
        match msg.role {
            ChatRole::User => {
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            ChatRole::Assistant => {
                for line in msg.content.lines() {
                    if msg.failed {
                        lines.push(Line::from(Span::styled(line.to_string(), Style::default().fg(Color::Red))));
                    } else {
                        lines.push(parse_markdown_line(line));
                    }
                }

                if msg.has_images() {
                    lines.push(Line::default());
                    lines.push(Line::from(Span::styled(
                        IMAGES_HEADER,
                        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                    )));
                    for (i, src) in msg.images.iter().enumerate() {
                        lines.push(Line::from(vec![
                            Span::styled(format!("  [{}] ", i + 1), Style::default().fg(Color::Magenta)),
                            Span::styled(ImageRef::parse(src).label(), Style::default().fg(Color::DarkGray)),
                        ]));
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    if loading {
        lines.push(role_line(ChatRole::Assistant));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize % 3) + 1);
        lines.push(Line::from(Span::styled(
            format!("{}{}", THINKING, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    Text::from(lines)
}

/// Rows the text occupies once word-wrapped to `width` columns, counted
/// with the same wrapper the chat pane renders with.
fn wrapped_height(text: &Text<'static>, width: u16) -> u16 {
    let rows = Paragraph::new(text.clone())
        .wrap(Wrap { trim: false })
        .line_count(width.max(1));
    rows.min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input row, footer
    let [header_area, chat_area, input_row, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    let [input_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(10),
    ])
    .areas(input_row);

    // Store areas for mouse hit-testing
    app.chat_area = Some(chat_area);
    app.send_area = Some(send_area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_send_button(app, frame, send_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" Agent Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let inner_width = area.width.saturating_sub(2);
    app.chat_height = area.height.saturating_sub(2);

    let text = transcript(app.conversation.all(), app.loading, app.animation_frame);

    // Newest content (or the loading indicator) stays in view unless the user scrolled back
    app.max_scroll = wrapped_height(&text, inner_width).saturating_sub(app.chat_height);
    app.scroll = if app.follow {
        app.max_scroll
    } else {
        app.scroll.min(app.max_scroll)
    };

    let border_color = if app.follow { Color::DarkGray } else { Color::Cyan };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Conversation ({}) ", app.conversation.len()));

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Message (Enter to send) ");

    // Keep the cursor visible with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);

    frame.render_widget(input, area);

    let cursor_x = (cursor_pos - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_send_button(app: &App, frame: &mut Frame, area: Rect) {
    let style = if app.in_flight {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Black).bg(Color::Yellow).bold()
    };

    let button = Paragraph::new(Line::from(" Send ").centered())
        .style(style)
        .block(Block::default().borders(Borders::ALL));

    frame.render_widget(button, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let (mode_text, mode_style) = if app.in_flight {
        (" WAITING ", Style::default().bg(Color::Yellow).fg(Color::Black))
    } else {
        (" READY ", Style::default().bg(Color::Blue).fg(Color::White))
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" ^S ", key_style),
        Span::styled(" save images ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ];

    if let Some(status) = &app.status {
        spans.push(Span::styled(format!("  {}", status), Style::default().bg(Color::Black).fg(Color::Yellow)));
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
