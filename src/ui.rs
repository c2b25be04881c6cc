use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use assistant_core::{Message, Role};

use crate::app::{App, InputMode, ServerStatus};

/// Style `**bold**` and `*italic*` runs in a line of assistant text.
/// Unclosed markers are kept as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some(start) = rest.find('*') else {
            spans.push(Span::raw(rest.to_string()));
            break;
        };

        let (marker, modifier) = if rest[start..].starts_with("**") {
            ("**", Modifier::BOLD)
        } else {
            ("*", Modifier::ITALIC)
        };
        let body_start = start + marker.len();

        match rest[body_start..].find(marker) {
            Some(len) if len > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                let body = &rest[body_start..body_start + len];
                spans.push(Span::styled(
                    body.to_string(),
                    Style::default().add_modifier(modifier),
                ));
                rest = &rest[body_start + len + marker.len()..];
            }
            _ => {
                spans.push(Span::raw(rest[..body_start].to_string()));
                rest = &rest[body_start..];
            }
        }
    }

    Line::from(spans)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let attachment_height = if app.session.composition().draft_attachment.is_some() || app.is_encoding() {
        1
    } else {
        0
    };

    let [header_area, chat_area, attachment_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(attachment_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if attachment_height > 0 {
        render_attachment_chip(app, frame, attachment_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.input_mode == InputMode::AttachPath {
        render_attach_prompt(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (status_text, status_color) = match app.server_status {
        ServerStatus::Checking => ("● checking", Color::Yellow),
        ServerStatus::Online => ("● online", Color::Green),
        ServerStatus::Offline => ("● offline", Color::Red),
    };

    let title = Line::from(vec![
        Span::styled(" AI Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(app.client.base_url().to_string(), Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn message_lines(msg: &Message) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.role() {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            if let Some(image) = msg.attachment() {
                lines.push(Line::from(Span::styled(
                    format!("[image: {}]", image.describe()),
                    Style::default().fg(Color::Magenta),
                )));
            }
            for line in msg.text().unwrap_or_default().lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            for line in msg.text().unwrap_or_default().lines() {
                lines.push(parse_markdown_line(line));
            }
        }
    }

    lines.push(Line::default());
    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    // Inner size minus borders
    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    let border_color = if app.input_mode == InputMode::Normal {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Chat ");

    let mut lines: Vec<Line> = app
        .session
        .transcript()
        .messages()
        .iter()
        .flat_map(message_lines)
        .collect();

    if app.session.is_pending() {
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat(app.animation_frame as usize + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Measure with the same wrapping that is drawn, before borders are added
    let chat = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });
    let total_lines = u16::try_from(chat.line_count(inner_width)).unwrap_or(u16::MAX);
    app.update_chat_metrics(total_lines, inner_height, inner_width);

    let chat = chat.block(block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_attachment_chip(app: &App, frame: &mut Frame, area: Rect) {
    let label = match &app.session.composition().draft_attachment {
        Some(image) => format!(" 📎 {} ", image.describe()),
        None => " 📎 encoding... ".to_string(),
    };

    let chip = Line::from(vec![
        Span::styled(label, Style::default().bg(Color::Magenta).fg(Color::White)),
        Span::styled(" Ctrl+X remove", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(chip), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let pending = app.session.is_pending();
    let editing = app.input_mode == InputMode::Editing;

    let (title, border_color) = if pending {
        (" Waiting for reply... ", Color::DarkGray)
    } else if editing {
        (" Message (Enter to send) ", Color::Yellow)
    } else {
        (" Message (i to type) ", Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let draft = &app.session.composition().draft_text;
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;

    // Horizontal scroll to keep the cursor visible
    let scroll_offset = if inner_width > 0 && cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let (visible_text, text_style) = if pending {
        (String::new(), Style::default().fg(Color::DarkGray))
    } else if draft.is_empty() && !editing {
        (
            "Type your message or attach an image...".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        // Newlines show as a return symbol in the single-line box
        let text = draft
            .chars()
            .map(|c| if c == '\n' { '⏎' } else { c })
            .skip(scroll_offset)
            .take(inner_width)
            .collect();
        (text, Style::default().fg(Color::Cyan))
    };

    let input = Paragraph::new(visible_text).style(text_style).block(block);
    frame.render_widget(input, area);

    if editing && !pending {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::AttachPath => (" ATTACH ", Style::default().bg(Color::Magenta).fg(Color::White)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(key, key_style),
            Span::styled(label, label_style),
        ]
    };

    let hints: Vec<Span> = match app.input_mode {
        InputMode::Normal => [
            hint(" i ", " type "),
            hint(" j/k ", " scroll "),
            hint(" a ", " attach "),
            hint(" x ", " remove image "),
            hint(" q ", " quit "),
        ]
        .concat(),
        InputMode::Editing => [
            hint(" Enter ", " send "),
            hint(" Alt+Enter ", " newline "),
            hint(" Ctrl+O ", " attach "),
            hint(" Esc ", " stop typing "),
        ]
        .concat(),
        InputMode::AttachPath => [hint(" Enter ", " attach "), hint(" Esc ", " cancel ")].concat(),
    };

    let footer_content = Line::from(
        [Span::styled(mode_text, mode_style), Span::styled(" ", label_style)]
            .into_iter()
            .chain(hints)
            .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_attach_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let width = area.width.saturating_sub(4).min(70);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + area.height / 3,
        width,
        height: 3,
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" Attach image (path) ");

    let inner_width = popup.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width > 0 && app.path_cursor >= inner_width {
        app.path_cursor - inner_width + 1
    } else {
        0
    };
    let visible: String = app
        .path_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(visible).block(block), popup);

    let cursor_x = (app.path_cursor - scroll_offset) as u16;
    frame.set_cursor_position((popup.x + cursor_x + 1, popup.y + 1));
}
