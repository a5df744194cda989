use super::*;
use crate::session::User;
use crate::storage::ClientStorage;
use crate::task::sample;
use crate::theme::Theme;
use async_trait::async_trait;
use std::sync::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

#[derive(Default)]
struct FakeApi {
    tasks: Mutex<Vec<Task>>,
    next_id: Mutex<u32>,
    fail_mutations: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            tasks: Mutex::new(vec![sample("1", "call mom", false)]),
            fail_mutations: true,
            ..Self::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_token(token: &str) -> crate::error::Result<()> {
        if token == "tok" {
            Ok(())
        } else {
            Err(ClientError::Api("Not authorized".into()))
        }
    }
}

#[async_trait]
impl TaskApi for FakeApi {
    async fn signup(&self, email: &str, _password: &str) -> crate::error::Result<AuthData> {
        self.record(format!("signup {email}"));
        if email == "taken@b.com" {
            return Err(ClientError::Api("User already exists".into()));
        }
        Ok(AuthData {
            token: "tok".into(),
            email: email.into(),
        })
    }

    async fn login(&self, email: &str, password: &str) -> crate::error::Result<AuthData> {
        self.record(format!("login {email}"));
        if password != "x" {
            return Err(ClientError::Api("Invalid credentials".into()));
        }
        Ok(AuthData {
            token: "tok".into(),
            email: email.into(),
        })
    }

    async fn list(&self, token: &str) -> crate::error::Result<Vec<Task>> {
        self.record("list".into());
        Self::check_token(token)?;
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn create(&self, token: &str, text: &str) -> crate::error::Result<Task> {
        self.record(format!("create {text}"));
        Self::check_token(token)?;
        if self.fail_mutations {
            return Err(ClientError::Api("create failed".into()));
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let task = sample(&format!("new-{next}"), text, false);
        self.tasks.lock().unwrap().insert(0, task.clone());
        Ok(task)
    }

    async fn update(
        &self,
        token: &str,
        id: &str,
        patch: &TaskPatch,
    ) -> crate::error::Result<Task> {
        self.record(format!("update {id}"));
        Self::check_token(token)?;
        if self.fail_mutations {
            return Err(ClientError::Api("update failed".into()));
        }
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ClientError::Api("Todo not found".into()))?;
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }
        if let Some(text) = &patch.text {
            task.text = text.clone();
        }
        Ok(task.clone())
    }

    async fn remove(&self, token: &str, id: &str) -> crate::error::Result<()> {
        self.record(format!("remove {id}"));
        Self::check_token(token)?;
        if self.fail_mutations {
            return Err(ClientError::Api("delete failed".into()));
        }
        self.tasks.lock().unwrap().retain(|t| t.id != id);
        Ok(())
    }
}

struct Harness {
    controller: Controller,
    rx: UnboundedReceiver<Message>,
    api: Arc<FakeApi>,
    dir: TempDir,
}

impl Harness {
    fn storage_path(dir: &TempDir) -> std::path::PathBuf {
        dir.path().join("storage.json")
    }

    fn new(api: FakeApi) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        Self::with_storage(api, dir)
    }

    fn signed_in(api: FakeApi) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = ClientStorage::open(Self::storage_path(&dir));
        storage
            .save_session(&Session::new(
                "tok",
                User {
                    email: "a@b.com".into(),
                },
            ))
            .expect("seed session");
        Self::with_storage(api, dir)
    }

    fn with_storage(api: FakeApi, dir: TempDir) -> Self {
        let api = Arc::new(api);
        let (tx, rx) = unbounded_channel();
        let timing = Timing {
            delete_delay: Duration::from_millis(20),
            error_display: Duration::from_secs(5),
        };
        let storage = ClientStorage::open(Self::storage_path(&dir));
        let controller = Controller::new(api.clone(), storage, timing, tx);
        Self {
            controller,
            rx,
            api,
            dir,
        }
    }

    /// Applies the next completion message from a spawned effect.
    async fn pump(&mut self) {
        let msg = tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("message before timeout")
            .expect("channel open");
        self.controller.update(msg);
    }

    fn press(&mut self, code: KeyCode) {
        self.controller
            .update(Message::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            self.press(KeyCode::Char(c));
        }
    }

    fn stored(&self) -> ClientStorage {
        ClientStorage::open(Self::storage_path(&self.dir))
    }

    fn ids(&self) -> Vec<String> {
        self.controller
            .state()
            .tasks
            .iter()
            .map(|t| t.id.clone())
            .collect()
    }
}

#[tokio::test]
async fn login_sets_session_switches_screen_and_loads_tasks() {
    let mut h = Harness::new(FakeApi::with_tasks(vec![
        sample("2", "pay rent", true),
        sample("1", "call mom", false),
    ]));
    assert_eq!(h.controller.state().screen, Screen::Auth);

    h.type_text("  a@b.com ");
    h.press(KeyCode::Tab);
    h.type_text("x");
    h.press(KeyCode::Enter);
    h.pump().await;

    let state = h.controller.state();
    assert_eq!(state.screen, Screen::Todo);
    assert_eq!(state.session.token(), Some("tok"));
    assert_eq!(state.session.user().map(|u| u.email.as_str()), Some("a@b.com"));
    assert!(state.loading);
    assert_eq!(h.stored().load_session(), state.session);

    h.pump().await;
    assert!(!h.controller.state().loading);
    assert_eq!(h.ids(), vec!["2", "1"]);
    assert_eq!(
        *h.api.calls.lock().unwrap(),
        vec!["login a@b.com".to_string(), "list".to_string()]
    );
}

#[tokio::test]
async fn failed_login_shows_message_under_login_form() {
    let mut h = Harness::new(FakeApi::default());
    h.type_text("a@b.com");
    h.press(KeyCode::Tab);
    h.type_text("nope");
    h.press(KeyCode::Enter);
    h.pump().await;

    let state = h.controller.state();
    assert_eq!(state.screen, Screen::Auth);
    assert!(!state.session.is_signed_in());
    assert_eq!(state.auth.error(AuthMode::Login), Some("Invalid credentials"));
    assert_eq!(state.auth.error(AuthMode::Signup), None);
}

#[tokio::test]
async fn signup_tab_uses_signup_endpoint() {
    let mut h = Harness::new(FakeApi::default());
    h.press(KeyCode::Right);
    assert_eq!(h.controller.state().auth.mode, AuthMode::Signup);
    h.type_text("taken@b.com");
    h.press(KeyCode::Enter);
    h.pump().await;
    assert_eq!(
        h.controller.state().auth.error(AuthMode::Signup),
        Some("User already exists")
    );

    h.press(KeyCode::Tab);
    h.press(KeyCode::Tab);
    h.press(KeyCode::Backspace);
    for _ in 0.."taken@b.com".len() {
        h.press(KeyCode::Backspace);
    }
    h.type_text("new@b.com");
    h.press(KeyCode::Enter);
    assert_eq!(h.controller.state().auth.error(AuthMode::Signup), None);
    h.pump().await;
    assert_eq!(h.controller.state().screen, Screen::Todo);
    assert!(h.api.calls.lock().unwrap().contains(&"signup new@b.com".to_string()));
}

#[tokio::test]
async fn persisted_session_starts_on_todo_screen() {
    let mut h = Harness::signed_in(FakeApi::with_tasks(vec![sample("1", "call mom", false)]));
    assert_eq!(h.controller.state().screen, Screen::Todo);
    assert!(h.controller.state().loading);
    h.pump().await;
    assert_eq!(h.ids(), vec!["1"]);
}

#[tokio::test]
async fn adding_task_places_it_first_and_clears_input() {
    let mut h = Harness::signed_in(FakeApi::with_tasks(vec![sample("1", "call mom", false)]));
    h.pump().await;

    h.type_text("   ");
    h.press(KeyCode::Enter);
    assert!(h.rx.try_recv().is_err());

    h.press(KeyCode::Backspace);
    h.type_text("Buy milk");
    h.press(KeyCode::Enter);
    h.pump().await;

    let state = h.controller.state();
    assert_eq!(state.tasks.len(), 2);
    assert_eq!(state.tasks[0].text, "Buy milk");
    assert!(!state.tasks[0].completed);
    assert!(state.task_input.is_empty());
}

#[tokio::test]
async fn toggling_twice_restores_completed_flag() {
    let mut h = Harness::signed_in(FakeApi::with_tasks(vec![sample("1", "call mom", false)]));
    h.pump().await;

    h.controller.toggle_task("1");
    h.pump().await;
    assert!(h.controller.state().task("1").is_some_and(|t| t.completed));

    h.controller.toggle_task("1");
    h.pump().await;
    assert!(h.controller.state().task("1").is_some_and(|t| !t.completed));

    h.controller.toggle_task("missing");
    assert!(h.rx.try_recv().is_err());
}

#[tokio::test]
async fn delete_removes_task_after_display_delay() {
    let mut h = Harness::signed_in(FakeApi::with_tasks(vec![
        sample("2", "pay rent", true),
        sample("1", "call mom", false),
    ]));
    h.pump().await;

    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('d'));
    assert!(h.controller.state().deleting.contains("2"));

    h.pump().await;
    assert!(
        h.controller.state().task("2").is_some(),
        "still shown during the delay"
    );

    h.pump().await;
    assert_eq!(h.ids(), vec!["1"]);
    assert!(h.controller.state().deleting.is_empty());
}

#[tokio::test]
async fn failed_mutations_leave_prior_state() {
    let mut h = Harness::signed_in(FakeApi::failing());
    h.pump().await;

    h.type_text("Buy milk");
    h.press(KeyCode::Enter);
    h.pump().await;
    assert_eq!(h.ids(), vec!["1"]);
    assert_eq!(h.controller.state().task_input, "Buy milk");

    h.controller.toggle_task("1");
    h.pump().await;
    assert!(h.controller.state().task("1").is_some_and(|t| !t.completed));

    h.controller.delete_task("1");
    assert!(h.controller.state().deleting.contains("1"));
    h.pump().await;
    assert!(h.controller.state().deleting.is_empty());
    assert_eq!(h.ids(), vec!["1"]);
}

#[tokio::test]
async fn logout_clears_state_and_drops_late_completions() {
    let mut h = Harness::signed_in(FakeApi::with_tasks(vec![sample("1", "call mom", false)]));

    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('o'));
    let state = h.controller.state();
    assert_eq!(state.screen, Screen::Auth);
    assert_eq!(state.session.token(), None);
    assert_eq!(state.session.user(), None);
    assert!(state.tasks.is_empty());
    assert!(!h.stored().load_session().is_signed_in());

    // The list request issued at startup lands after logout.
    h.pump().await;
    assert!(h.controller.state().tasks.is_empty());
    assert!(!h.controller.state().loading);
}

#[tokio::test]
async fn filters_and_theme_from_keys() {
    let mut h = Harness::signed_in(FakeApi::with_tasks(vec![
        sample("2", "pay rent", true),
        sample("1", "call mom", false),
    ]));
    h.pump().await;

    h.press(KeyCode::Tab);
    h.press(KeyCode::Char('2'));
    assert_eq!(h.controller.state().filter, Filter::Active);
    h.press(KeyCode::Char('f'));
    assert_eq!(h.controller.state().filter, Filter::Completed);
    h.press(KeyCode::Char('1'));
    assert_eq!(h.controller.state().filter, Filter::All);

    let before = h.controller.state().theme;
    h.controller.update(Message::Key(KeyEvent::new(
        KeyCode::Char('t'),
        KeyModifiers::CONTROL,
    )));
    assert_eq!(h.controller.state().theme, before.toggle());
    assert_eq!(h.stored().load_theme(), before.toggle());
    assert_eq!(h.controller.state().theme, Theme::Light);

    h.controller.update(Message::Key(KeyEvent::new(
        KeyCode::Char('c'),
        KeyModifiers::CONTROL,
    )));
    assert!(h.controller.should_quit());
}

#[tokio::test]
async fn only_ctrl_c_quits_among_control_keys() {
    let mut h = Harness::new(FakeApi::default());
    h.controller.update(Message::Key(KeyEvent::new(
        KeyCode::Char('q'),
        KeyModifiers::CONTROL,
    )));
    assert!(!h.controller.should_quit());
    assert!(h.controller.state().auth.email.is_empty());

    h.controller.update(Message::Key(KeyEvent::new(
        KeyCode::Char('c'),
        KeyModifiers::CONTROL,
    )));
    assert!(h.controller.should_quit());
}

#[tokio::test]
async fn closed_input_stops_the_app() {
    let mut h = Harness::signed_in(FakeApi::default());
    assert!(!h.controller.should_quit());
    h.controller.update(Message::InputClosed);
    assert!(h.controller.should_quit());
}

#[tokio::test]
async fn delete_without_session_marks_nothing() {
    let mut h = Harness::new(FakeApi::default());
    h.controller
        .state
        .replace_tasks(vec![sample("1", "call mom", false)]);

    h.controller.delete_task("1");
    assert!(h.controller.state().deleting.is_empty());
    assert!(h.rx.try_recv().is_err());
    assert!(h.api.calls.lock().unwrap().is_empty());
}
