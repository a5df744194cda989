use crate::controller::{Controller, Message};
use crate::session::AuthMode;
use crate::state::{AppState, AuthField, Screen, TodoFocus};
use crate::task::{count_summary, Filter, Task};
use crate::theme::Palette;
use crossterm::event::{self, Event};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Frame, Terminal,
};
use std::{io, thread, time::Duration};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::error;

const TICK_RATE: Duration = Duration::from_millis(250);

pub async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    controller: &mut Controller,
    rx: &mut UnboundedReceiver<Message>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, controller.state()))?;

        let Some(msg) = rx.recv().await else {
            return Ok(());
        };
        controller.update(msg);
        while let Ok(msg) = rx.try_recv() {
            controller.update(msg);
        }
        if controller.should_quit() {
            return Ok(());
        }
    }
}

/// Forwards terminal input to the event loop, with a tick when idle.
/// Sends [`Message::InputClosed`] before exiting on a terminal error.
pub fn spawn_input_thread(tx: UnboundedSender<Message>) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        let msg = match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => Message::Key(key),
                Ok(Event::Resize(..)) => Message::Tick,
                Ok(_) => continue,
                Err(err) => {
                    error!(%err, "failed to read terminal event");
                    let _ = tx.send(Message::InputClosed);
                    return;
                }
            },
            Ok(false) => Message::Tick,
            Err(err) => {
                error!(%err, "failed to poll terminal events");
                let _ = tx.send(Message::InputClosed);
                return;
            }
        };
        if tx.send(msg).is_err() {
            return;
        }
    })
}

/// Replaces control characters so terminal escape sequences in user text are never emitted.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

pub fn draw(f: &mut Frame, state: &AppState) {
    let palette = state.theme.palette();
    f.render_widget(
        Block::default().style(Style::default().bg(palette.bg).fg(palette.fg)),
        f.area(),
    );
    match state.screen {
        Screen::Auth => draw_auth(f, state, &palette),
        Screen::Todo => draw_todo(f, state, &palette),
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn field<'a>(title: &'a str, value: String, focused: bool, palette: &Palette) -> Paragraph<'a> {
    let border = if focused {
        Style::default().fg(palette.accent)
    } else {
        Style::default().fg(palette.muted)
    };
    Paragraph::new(value).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border),
    )
}

fn draw_auth(f: &mut Frame, state: &AppState, palette: &Palette) {
    let auth = &state.auth;
    let area = centered(f.area(), 50, 17);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(1),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(
            "To-Do List",
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        chunks[0],
    );

    let selected = match auth.mode {
        AuthMode::Login => 0,
        AuthMode::Signup => 1,
    };
    f.render_widget(
        Tabs::new(vec![AuthMode::Login.title(), AuthMode::Signup.title()])
            .select(selected)
            .style(Style::default().fg(palette.muted))
            .highlight_style(
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            ),
        chunks[1],
    );

    f.render_widget(
        field(
            "Email",
            auth.email.clone(),
            auth.focus == AuthField::Email,
            palette,
        ),
        chunks[2],
    );
    f.render_widget(
        field(
            "Password",
            "•".repeat(auth.password.chars().count()),
            auth.focus == AuthField::Password,
            palette,
        ),
        chunks[3],
    );

    let status = if auth.pending {
        let waiting = match auth.mode {
            AuthMode::Login => "Signing in...",
            AuthMode::Signup => "Creating account...",
        };
        Span::styled(waiting, Style::default().fg(palette.muted))
    } else if let Some(message) = auth.error(auth.mode) {
        Span::styled(sanitize(message), Style::default().fg(palette.danger))
    } else {
        Span::raw("")
    };
    f.render_widget(Paragraph::new(status), chunks[4]);

    f.render_widget(
        Paragraph::new(vec![
            Line::from("←/→ login or sign up · Tab next field · Enter submit"),
            Line::from("Ctrl+T theme · Esc quit"),
        ])
        .style(Style::default().fg(palette.muted)),
        chunks[5],
    );
}

fn task_item<'a>(task: &Task, deleting: bool, palette: &Palette) -> ListItem<'a> {
    let (mark, mut style) = if task.completed {
        (
            "[x] ",
            Style::default()
                .fg(palette.done)
                .add_modifier(Modifier::CROSSED_OUT),
        )
    } else {
        ("[ ] ", Style::default().fg(palette.fg))
    };
    let mut spans = vec![Span::raw(mark), Span::raw(sanitize(&task.text))];
    if deleting {
        style = Style::default()
            .fg(palette.muted)
            .add_modifier(Modifier::DIM);
        spans.push(Span::raw("  (deleting)"));
    }
    ListItem::new(Line::from(spans)).style(style)
}

fn draw_todo(f: &mut Frame, state: &AppState, palette: &Palette) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(f.area());

    let email = state
        .session
        .user()
        .map(|u| sanitize(&u.email))
        .unwrap_or_default();
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                "To-Do List",
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::raw(email),
            Span::styled(
                format!("  [{} theme]", state.theme.as_str()),
                Style::default().fg(palette.muted),
            ),
        ])),
        chunks[0],
    );

    f.render_widget(
        field(
            "New task",
            state.task_input.clone(),
            state.focus == TodoFocus::Input,
            palette,
        ),
        chunks[1],
    );

    let selected = Filter::ALL
        .iter()
        .position(|filter| *filter == state.filter)
        .unwrap_or(0);
    f.render_widget(
        Tabs::new(vec!["1 All", "2 Active", "3 Completed"])
            .select(selected)
            .style(Style::default().fg(palette.muted))
            .highlight_style(
                Style::default()
                    .fg(palette.accent)
                    .add_modifier(Modifier::BOLD),
            ),
        chunks[2],
    );

    let list_border = if state.focus == TodoFocus::List {
        Style::default().fg(palette.accent)
    } else {
        Style::default().fg(palette.muted)
    };
    let block = Block::default()
        .title("Tasks")
        .borders(Borders::ALL)
        .border_style(list_border);
    let visible = state.visible_tasks();
    if state.loading {
        f.render_widget(
            Paragraph::new("Loading tasks...")
                .alignment(Alignment::Center)
                .block(block),
            chunks[3],
        );
    } else if visible.is_empty() {
        f.render_widget(
            Paragraph::new("No tasks here. Add one above!")
                .style(Style::default().fg(palette.muted))
                .alignment(Alignment::Center)
                .block(block),
            chunks[3],
        );
    } else {
        let items: Vec<ListItem> = visible
            .iter()
            .map(|t| task_item(t, state.deleting.contains(&t.id), palette))
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_symbol("> ")
            .highlight_style(Style::default().bg(palette.selection));
        let mut list_state = ListState::default();
        if state.focus == TodoFocus::List {
            list_state.select(Some(state.selected));
        }
        f.render_stateful_widget(list, chunks[3], &mut list_state);
    }

    f.render_widget(
        Paragraph::new(count_summary(&state.tasks, state.filter))
            .style(Style::default().fg(palette.fg)),
        chunks[4],
    );
    let hints = match state.focus {
        TodoFocus::Input => "Enter add · Tab list · Ctrl+T theme · Esc quit",
        TodoFocus::List => {
            "Space toggle · d delete · 1/2/3/f filter · o sign out · Tab input · q quit"
        }
    };
    f.render_widget(
        Paragraph::new(hints).style(Style::default().fg(palette.muted)),
        chunks[5],
    );
}
