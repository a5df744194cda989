use crate::session::{AuthMode, Session};
use crate::task::{filter_tasks, Filter, Task};
use crate::theme::Theme;
use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Auth,
    Todo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TodoFocus {
    #[default]
    Input,
    List,
}

/// Message that disappears once `expires_at` has passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transient {
    pub text: String,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub focus: AuthField,
    pub email: String,
    pub password: String,
    pub login_error: Option<Transient>,
    pub signup_error: Option<Transient>,
    pub pending: bool,
}

impl AuthForm {
    pub fn error_slot(&mut self, mode: AuthMode) -> &mut Option<Transient> {
        match mode {
            AuthMode::Login => &mut self.login_error,
            AuthMode::Signup => &mut self.signup_error,
        }
    }

    pub fn error(&self, mode: AuthMode) -> Option<&str> {
        match mode {
            AuthMode::Login => self.login_error.as_ref(),
            AuthMode::Signup => self.signup_error.as_ref(),
        }
        .map(|t| t.text.as_str())
    }

    pub fn focused_field(&mut self) -> &mut String {
        match self.focus {
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }

    fn reset(&mut self) {
        self.email.clear();
        self.password.clear();
        self.focus = AuthField::Email;
        self.pending = false;
    }
}

/// Everything the renderer needs, owned by the controller.
#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub session: Session,
    pub tasks: Vec<Task>,
    pub filter: Filter,
    pub theme: Theme,
    pub auth: AuthForm,
    pub task_input: String,
    pub focus: TodoFocus,
    pub selected: usize,
    pub deleting: HashSet<String>,
    pub loading: bool,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(session: Session, theme: Theme) -> Self {
        let screen = if session.is_signed_in() {
            Screen::Todo
        } else {
            Screen::Auth
        };
        Self {
            screen,
            session,
            tasks: Vec::new(),
            filter: Filter::All,
            theme,
            auth: AuthForm::default(),
            task_input: String::new(),
            focus: TodoFocus::Input,
            selected: 0,
            deleting: HashSet::new(),
            loading: false,
            should_quit: false,
        }
    }

    pub fn sign_in(&mut self, session: Session) {
        self.session = session;
        self.auth.pending = false;
        self.screen = Screen::Todo;
        self.focus = TodoFocus::Input;
        self.selected = 0;
    }

    /// Drops session, task mirror and form contents and returns to the auth screen.
    pub fn sign_out(&mut self) {
        self.session.clear();
        self.tasks.clear();
        self.deleting.clear();
        self.loading = false;
        self.auth.reset();
        self.task_input.clear();
        self.focus = TodoFocus::Input;
        self.selected = 0;
        self.screen = Screen::Auth;
    }

    pub fn set_auth_error(&mut self, mode: AuthMode, text: String, now: Instant, ttl: Duration) {
        *self.auth.error_slot(mode) = Some(Transient {
            text,
            expires_at: now + ttl,
        });
    }

    /// Clears expired transient messages; returns true if anything changed.
    pub fn expire_transients(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for slot in [&mut self.auth.login_error, &mut self.auth.signup_error] {
            if slot.as_ref().is_some_and(|t| t.expires_at <= now) {
                *slot = None;
                changed = true;
            }
        }
        changed
    }

    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.deleting.retain(|id| self.tasks.iter().any(|t| &t.id == id));
        self.clamp_selection();
    }

    pub fn prepend_task(&mut self, task: Task) {
        self.tasks.insert(0, task);
    }

    /// Copies the server's copy of a task over the mirror entry with the same id.
    pub fn merge_task(&mut self, updated: Task) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == updated.id) {
            Some(task) => {
                *task = updated;
                self.clamp_selection();
                true
            }
            None => false,
        }
    }

    pub fn remove_task(&mut self, id: &str) {
        self.tasks.retain(|t| t.id != id);
        self.deleting.remove(id);
        self.clamp_selection();
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn visible_tasks(&self) -> Vec<&Task> {
        filter_tasks(&self.tasks, self.filter)
    }

    pub fn selected_task(&self) -> Option<&Task> {
        self.visible_tasks().get(self.selected).copied()
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.clamp_selection();
    }

    pub fn move_selection(&mut self, delta: isize) {
        let len = self.visible_tasks().len();
        if len == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected as isize + delta).clamp(0, len as isize - 1) as usize;
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_tasks().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}
