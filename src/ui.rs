use chrono::{DateTime, Local, Utc};
use kirin_core::{Participant, SessionStatus};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::App;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, chat, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn participant_color(participant: Participant) -> Color {
    match participant {
        Participant::User => Color::Cyan,
        Participant::Assistant => Color::Yellow,
        Participant::Server => Color::Red,
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let (session_text, session_color) = match app.session_status {
        SessionStatus::Pending => ("connecting".to_string(), Color::DarkGray),
        SessionStatus::Ready(id) => (format!("thread {}", id), Color::Green),
        SessionStatus::Unavailable => ("no conversation context".to_string(), Color::Red),
    };

    let title = Line::from(vec![
        Span::styled(" Kirin ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}] ", app.model()), Style::default().fg(Color::White)),
        Span::styled(session_text, Style::default().fg(session_color)),
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
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow {
        app.scroll_to_bottom();
    }

    let mut lines: Vec<Line> = Vec::new();
    for msg in &app.messages {
        let color = participant_color(msg.author);
        lines.push(Line::from(vec![
            Span::styled(
                format!("{}:", msg.author.display_name()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {}", format_timestamp(&msg.created_at)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        for line in msg.text.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
    }

    if app.composing {
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("{} is typing{}", Participant::Assistant.display_name(), dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let title = match &app.notice {
        Some(notice) => format!(" {} ", notice),
        None => " Type prompt here ".to_string(),
    };
    let border_color = if app.notice.is_some() { Color::Red } else { Color::Yellow };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 || app.cursor < inner_width {
        0
    } else {
        app.cursor - inner_width + 1
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(participant_color(Participant::User)))
        .block(input_block);
    frame.render_widget(input, area);

    let cursor_x = (app.cursor - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
    ];
    if app.composing {
        hints.push(Span::styled(" Esc ", key_style));
        hints.push(Span::styled(" stop ", label_style));
    }
    hints.extend(vec![
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Ctrl-C ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
