use std::io;
use ratatui::{
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    layout::{Layout, Constraint, Direction, Rect},
    style::{Style, Color, Modifier},
    Terminal, Frame,
    text::Line,
    prelude::{Span, Text},
};
use crossterm::{
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    execute,
    event::{DisableMouseCapture, EnableMouseCapture},
};

use crate::controllers::{App, CommentThread, LoadState, Mode, PostEntry};
use crate::models::{can_modify, Session};

const CURSOR: &str = "▏";
const PLACEHOLDER: &str = "Ask or share something ...";

pub fn setup_terminal() -> io::Result<Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

pub fn restore_terminal(terminal: &mut Terminal<ratatui::backend::CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()
}

pub fn render_ui<B: ratatui::backend::Backend>(f: &mut Frame<B>, app: &mut App) {
    // The post form only exists for a signed-in session
    let form_height = if app.session().is_some() { 4 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints(
            [
                Constraint::Length(form_height),
                Constraint::Min(3),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(f.size());

    if let Some(session) = app.session() {
        let form = post_form(session, &app.mode);
        f.render_widget(form, chunks[0]);
    }
    render_feed(f, app, chunks[1]);
    f.render_widget(status_line(app), chunks[2]);
}

fn post_form(session: &Session, mode: &Mode) -> Paragraph<'static> {
    let (title, content) = match mode {
        Mode::Compose(buffer) => (
            "New post (Enter to post, Alt+Enter for newline, Esc to cancel)",
            Text::styled(format!("{}{}", buffer, CURSOR), Style::default().fg(Color::Yellow)),
        ),
        _ => (
            "New post [n]",
            Text::styled(PLACEHOLDER, Style::default().fg(Color::DarkGray)),
        ),
    };
    let mut lines = vec![Line::from(Span::styled(
        format!("{} {}", session.display_name, session.avatar_url),
        Style::default().add_modifier(Modifier::DIM),
    ))];
    lines.extend(content.lines);
    Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: false })
}

fn render_feed<B: ratatui::backend::Backend>(f: &mut Frame<B>, app: &mut App, area: Rect) {
    let title = match app.session() {
        Some(session) => format!("Feed · signed in as {}", session.display_name),
        None => "Feed · read-only [l] to sign in".to_string(),
    };
    let block = Block::default().title(title).borders(Borders::ALL);

    let message = match &app.feed {
        LoadState::Loading => Some(Text::raw("Loading...")),
        LoadState::Failed(e) => Some(Text::styled(
            format!("Could not load the feed: {}. Press r to retry.", e),
            Style::default().fg(Color::Red),
        )),
        LoadState::Loaded(list) if list.items.is_empty() => Some(Text::raw("No posts yet")),
        LoadState::Loaded(_) => None,
    };
    if let Some(message) = message {
        f.render_widget(Paragraph::new(message).block(block).wrap(Wrap { trim: false }), area);
        return;
    }

    // Create the feed of posts
    let selected = app.selected_entry().map(|e| e.post.id.clone());
    let items: Vec<ListItem> = app
        .entries()
        .iter()
        .map(|entry| {
            let is_selected = selected.as_deref() == Some(entry.post.id.as_str());
            let thread = app.thread(&entry.post.id);
            ListItem::new(post_lines(entry, thread, app.session(), &app.mode, is_selected))
                .style(Style::default())
        })
        .collect();

    // Create a List from the items and highlight the currently selected one
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    if let LoadState::Loaded(feed) = &mut app.feed {
        f.render_stateful_widget(list, area, &mut feed.state);
    }
}

/// Author header, body, action row and, when expanded, the comment thread.
pub fn post_lines(
    entry: &PostEntry,
    thread: Option<&CommentThread>,
    session: Option<&Session>,
    mode: &Mode,
    is_selected: bool,
) -> Vec<Line<'static>> {
    let post = &entry.post;
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{} posted {}", post.author.name, post.display_time()),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  {}", post.author.photo_url),
            Style::default().add_modifier(Modifier::DIM),
        ),
    ])];

    match entry.buffer() {
        Some(buffer) => {
            let text = Text::styled(format!("{}{}", buffer, CURSOR), Style::default().fg(Color::Yellow));
            lines.extend(text.lines);
        }
        None => lines.extend(Text::raw(post.body.clone()).lines),
    }

    let mut actions = vec![Span::styled(
        match thread {
            Some(t) => format!("[c] hide comments ({})", t.comments().len()),
            None => "[c] comments".to_string(),
        },
        Style::default().fg(Color::Blue),
    )];
    if entry.can_modify(session) {
        let hint = if entry.is_editing() {
            "  [Enter] Save  [Esc] Cancel"
        } else {
            "  [e] Edit  [d] Delete"
        };
        actions.push(Span::styled(hint, Style::default().fg(Color::Magenta)));
    }
    lines.push(Line::from(actions));

    if let Some(thread) = thread {
        lines.extend(thread_lines(thread, session, mode, is_selected));
    }
    lines.push(Line::from(""));
    lines
}

fn thread_lines(
    thread: &CommentThread,
    session: Option<&Session>,
    mode: &Mode,
    is_selected: bool,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if session.is_some() {
        let form = match mode {
            Mode::Comment { post_id, buffer } if *post_id == thread.post_id => Span::styled(
                format!("    Comment: {}{}", buffer, CURSOR),
                Style::default().fg(Color::Yellow),
            ),
            _ => Span::styled(
                "    [a] Write a comment...",
                Style::default().fg(Color::DarkGray),
            ),
        };
        lines.push(Line::from(form));
    }

    match &thread.state {
        LoadState::Loading => lines.push(Line::from("    Loading comments...")),
        LoadState::Failed(e) => lines.push(Line::from(Span::styled(
            format!("    Could not load comments: {}", e),
            Style::default().fg(Color::Red),
        ))),
        LoadState::Loaded(comments) if comments.is_empty() => {
            lines.push(Line::from("    No comments yet"));
        }
        LoadState::Loaded(comments) => {
            for (i, comment) in comments.iter().enumerate() {
                let marker = if is_selected && thread.selected == Some(i) { "  » " } else { "    " };
                let mut spans = vec![
                    Span::raw(marker),
                    Span::styled(
                        format!("{} · {}: ", comment.author_name, comment.display_time()),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(comment.body.clone()),
                ];
                if can_modify(session, &comment.author_email) {
                    spans.push(Span::styled("  [x] Delete", Style::default().fg(Color::Magenta)));
                }
                lines.push(Line::from(spans));
            }
        }
    }
    lines
}

fn status_line(app: &App) -> Paragraph<'static> {
    if let Some(status) = &app.status {
        return Paragraph::new(status.clone()).style(Style::default().fg(Color::Yellow));
    }
    let hint = match &app.mode {
        Mode::Browse => "j/k move  c comments  J/K pick comment  x delete comment  a comment  n post  r refresh  l sign in/out  q quit",
        Mode::Compose(_) => "Enter post  Esc cancel",
        Mode::Edit { .. } => "Enter save  Esc cancel",
        Mode::Comment { .. } => "Enter send  Esc cancel",
    };
    Paragraph::new(hint).style(Style::default().fg(Color::DarkGray))
}
