//! Controller: turns input and API completions into state changes.
//!
//! All mutation happens in [`Controller::update`], called from the event loop
//! one message at a time. API calls run in spawned tasks and report back as
//! messages on the same channel, so the screen keeps redrawing while a request
//! is in flight.

use crate::api::TaskApi;
use crate::error::ClientError;
use crate::session::{AuthData, AuthMode, Session};
use crate::state::{AppState, AuthField, Screen, TodoFocus};
use crate::storage::ClientStorage;
use crate::task::{Filter, Task, TaskPatch};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

pub enum Message {
    Key(KeyEvent),
    Tick,
    /// Terminal input can no longer be read.
    InputClosed,
    AuthFinished {
        mode: AuthMode,
        result: Result<AuthData, ClientError>,
    },
    TasksLoaded {
        token: String,
        result: Result<Vec<Task>, ClientError>,
    },
    TaskCreated {
        token: String,
        result: Result<Task, ClientError>,
    },
    TaskUpdated {
        token: String,
        id: String,
        result: Result<Task, ClientError>,
    },
    TaskDeleted {
        token: String,
        id: String,
        result: Result<(), ClientError>,
    },
    /// The post-delete display delay has elapsed.
    DeleteSettled { token: String, id: String },
}

#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub delete_delay: Duration,
    pub error_display: Duration,
}

pub struct Controller {
    state: AppState,
    api: Arc<dyn TaskApi>,
    storage: ClientStorage,
    timing: Timing,
    tx: UnboundedSender<Message>,
}

impl Controller {
    /// Restores session and theme from `storage`; a restored session starts loading tasks.
    pub fn new(
        api: Arc<dyn TaskApi>,
        storage: ClientStorage,
        timing: Timing,
        tx: UnboundedSender<Message>,
    ) -> Self {
        let state = AppState::new(storage.load_session(), storage.load_theme());
        let mut controller = Self {
            state,
            api,
            storage,
            timing,
            tx,
        };
        if controller.state.screen == Screen::Todo {
            info!("restored persisted session");
            controller.load_tasks();
        }
        controller
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn should_quit(&self) -> bool {
        self.state.should_quit
    }

    pub fn update(&mut self, msg: Message) {
        match msg {
            Message::Key(key) => self.handle_key(key),
            Message::Tick => {
                self.state.expire_transients(Instant::now());
            }
            Message::InputClosed => {
                warn!("terminal input closed, shutting down");
                self.state.should_quit = true;
            }
            Message::AuthFinished { mode, result } => self.finish_auth(mode, result),
            Message::TasksLoaded { token, result } => {
                if !self.is_current(&token) {
                    debug!("dropping task list for ended session");
                    return;
                }
                self.state.loading = false;
                match result {
                    Ok(tasks) => {
                        debug!(count = tasks.len(), "tasks loaded");
                        self.state.replace_tasks(tasks);
                    }
                    Err(err) => error!(%err, "failed to load todos"),
                }
            }
            Message::TaskCreated { token, result } => {
                if !self.is_current(&token) {
                    return;
                }
                match result {
                    Ok(task) => {
                        debug!(id = %task.id, "task created");
                        self.state.prepend_task(task);
                        self.state.task_input.clear();
                    }
                    Err(err) => error!(%err, "failed to create todo"),
                }
            }
            Message::TaskUpdated { token, id, result } => {
                if !self.is_current(&token) {
                    return;
                }
                match result {
                    Ok(task) => {
                        self.state.merge_task(task);
                    }
                    Err(err) => error!(%id, %err, "failed to update todo"),
                }
            }
            Message::TaskDeleted { token, id, result } => {
                if !self.is_current(&token) {
                    return;
                }
                match result {
                    Ok(()) => {
                        let delay = self.timing.delete_delay;
                        self.spawn(async move {
                            tokio::time::sleep(delay).await;
                            Message::DeleteSettled { token, id }
                        });
                    }
                    Err(err) => {
                        error!(%id, %err, "failed to delete todo");
                        self.state.deleting.remove(&id);
                    }
                }
            }
            Message::DeleteSettled { token, id } => {
                if self.is_current(&token) {
                    self.state.remove_task(&id);
                }
            }
        }
    }

    fn is_current(&self, token: &str) -> bool {
        self.state.session.token() == Some(token)
    }

    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = Message> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            // The receiver only goes away at shutdown.
            let _ = tx.send(fut.await);
        });
    }

    pub fn submit_auth(&mut self) {
        if self.state.auth.pending {
            return;
        }
        let mode = self.state.auth.mode;
        let email = self.state.auth.email.trim().to_string();
        let password = self.state.auth.password.clone();
        *self.state.auth.error_slot(mode) = None;
        self.state.auth.pending = true;
        info!(?mode, %email, "submitting credentials");

        let api = Arc::clone(&self.api);
        self.spawn(async move {
            let result = match mode {
                AuthMode::Login => api.login(&email, &password).await,
                AuthMode::Signup => api.signup(&email, &password).await,
            };
            Message::AuthFinished { mode, result }
        });
    }

    fn finish_auth(&mut self, mode: AuthMode, result: Result<AuthData, ClientError>) {
        if !self.state.auth.pending {
            return;
        }
        self.state.auth.pending = false;
        match result {
            Ok(data) => {
                info!(email = %data.email, "signed in");
                let session = Session::from_auth(data);
                if let Err(err) = self.storage.save_session(&session) {
                    warn!(%err, "failed to persist session");
                }
                self.state.sign_in(session);
                self.load_tasks();
            }
            Err(err) => {
                warn!(?mode, %err, "authentication failed");
                self.state.set_auth_error(
                    mode,
                    err.to_string(),
                    Instant::now(),
                    self.timing.error_display,
                );
            }
        }
    }

    pub fn sign_out(&mut self) {
        info!("signing out");
        self.state.sign_out();
        if let Err(err) = self.storage.clear_session() {
            warn!(%err, "failed to clear persisted session");
        }
    }

    pub fn load_tasks(&mut self) {
        let Some(token) = self.state.session.token().map(str::to_string) else {
            return;
        };
        self.state.loading = true;
        let api = Arc::clone(&self.api);
        self.spawn(async move {
            let result = api.list(&token).await;
            Message::TasksLoaded { token, result }
        });
    }

    pub fn add_task(&mut self) {
        let text = self.state.task_input.trim().to_string();
        if text.is_empty() {
            return;
        }
        let Some(token) = self.state.session.token().map(str::to_string) else {
            return;
        };
        let api = Arc::clone(&self.api);
        self.spawn(async move {
            let result = api.create(&token, &text).await;
            Message::TaskCreated { token, result }
        });
    }

    pub fn toggle_task(&mut self, id: &str) {
        let Some(task) = self.state.task(id) else {
            return;
        };
        let patch = TaskPatch::completed(!task.completed);
        let Some(token) = self.state.session.token().map(str::to_string) else {
            return;
        };
        let id = id.to_string();
        let api = Arc::clone(&self.api);
        self.spawn(async move {
            let result = api.update(&token, &id, &patch).await;
            Message::TaskUpdated { token, id, result }
        });
    }

    /// Marks the task as deleting; it leaves the mirror after the display delay.
    pub fn delete_task(&mut self, id: &str) {
        let Some(token) = self.state.session.token().map(str::to_string) else {
            return;
        };
        if self.state.task(id).is_none() || !self.state.deleting.insert(id.to_string()) {
            return;
        }
        let id = id.to_string();
        let api = Arc::clone(&self.api);
        self.spawn(async move {
            let result = api.remove(&token, &id).await;
            Message::TaskDeleted { token, id, result }
        });
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.state.set_filter(filter);
    }

    pub fn toggle_theme(&mut self) {
        self.state.theme = self.state.theme.toggle();
        if let Err(err) = self.storage.save_theme(self.state.theme) {
            warn!(%err, "failed to persist theme");
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => self.state.should_quit = true,
                KeyCode::Char('t') => self.toggle_theme(),
                _ => {}
            }
            return;
        }
        match self.state.screen {
            Screen::Auth => self.handle_auth_key(key.code),
            Screen::Todo => match self.state.focus {
                TodoFocus::Input => self.handle_input_key(key.code),
                TodoFocus::List => self.handle_list_key(key.code),
            },
        }
    }

    fn handle_auth_key(&mut self, code: KeyCode) {
        let auth = &mut self.state.auth;
        match code {
            KeyCode::Esc => self.state.should_quit = true,
            KeyCode::Left | KeyCode::Right => auth.mode = auth.mode.toggle(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                auth.focus = match auth.focus {
                    AuthField::Email => AuthField::Password,
                    AuthField::Password => AuthField::Email,
                }
            }
            KeyCode::Enter => self.submit_auth(),
            KeyCode::Backspace => {
                auth.focused_field().pop();
            }
            KeyCode::Char(c) => auth.focused_field().push(c),
            _ => {}
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Tab | KeyCode::Down => self.state.focus = TodoFocus::List,
            KeyCode::Esc => self.state.should_quit = true,
            KeyCode::Enter => self.add_task(),
            KeyCode::Backspace => {
                self.state.task_input.pop();
            }
            KeyCode::Char(c) => self.state.task_input.push(c),
            _ => {}
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Tab => self.state.focus = TodoFocus::Input,
            KeyCode::Char('q') | KeyCode::Esc => self.state.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => self.state.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.state.move_selection(1),
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(id) = self.state.selected_task().map(|t| t.id.clone()) {
                    self.toggle_task(&id);
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.state.selected_task().map(|t| t.id.clone()) {
                    self.delete_task(&id);
                }
            }
            KeyCode::Char('1') => self.set_filter(Filter::All),
            KeyCode::Char('2') => self.set_filter(Filter::Active),
            KeyCode::Char('3') => self.set_filter(Filter::Completed),
            KeyCode::Char('f') => self.set_filter(self.state.filter.next()),
            KeyCode::Char('o') => self.sign_out(),
            _ => {}
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
