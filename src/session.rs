use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
}

/// Data returned by both `/auth/login` and `/auth/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthData {
    pub token: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

impl AuthMode {
    pub fn toggle(self) -> Self {
        match self {
            AuthMode::Login => AuthMode::Signup,
            AuthMode::Signup => AuthMode::Login,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            AuthMode::Login => "Login",
            AuthMode::Signup => "Sign up",
        }
    }
}

/// Signed-in identity. A token is only ever held together with its user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    credentials: Option<(String, User)>,
}

impl Session {
    pub fn new(token: impl Into<String>, user: User) -> Self {
        Self {
            credentials: Some((token.into(), user)),
        }
    }

    pub fn from_auth(data: AuthData) -> Self {
        Self::new(data.token, User { email: data.email })
    }

    /// Rebuilds a session from storage; both halves must be present.
    pub fn restore(token: Option<String>, user: Option<User>) -> Self {
        match (token, user) {
            (Some(token), Some(user)) if !token.is_empty() => Self::new(token, user),
            _ => Self::default(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|(token, _)| token.as_str())
    }

    pub fn user(&self) -> Option<&User> {
        self.credentials.as_ref().map(|(_, user)| user)
    }

    pub fn is_signed_in(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn clear(&mut self) {
        self.credentials = None;
    }
}
