//! REST proxy for the to-do service.
//!
//! Every endpoint answers with the same envelope, `{success, data, message}`,
//! and the body is decoded whatever the HTTP status is: the server reports
//! failures through `success: false` plus a message.

use crate::error::{ClientError, Result};
use crate::session::AuthData;
use crate::task::{Task, TaskPatch};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn signup(&self, email: &str, password: &str) -> Result<AuthData>;
    async fn login(&self, email: &str, password: &str) -> Result<AuthData>;
    /// Tasks newest first, as sorted by the server.
    async fn list(&self, token: &str) -> Result<Vec<Task>>;
    async fn create(&self, token: &str, text: &str) -> Result<Task>;
    async fn update(&self, token: &str, id: &str, patch: &TaskPatch) -> Result<Task>;
    async fn remove(&self, token: &str, id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<Option<T>> {
        if self.success {
            Ok(self.data)
        } else {
            Err(ClientError::Api(
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ))
        }
    }

    fn into_data(self) -> Result<T> {
        self.into_result()?
            .ok_or_else(|| ClientError::Api("response carried no data".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct TodoList {
    #[serde(default)]
    todos: Vec<Task>,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct NewTask<'a> {
    text: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    http: Client,
    base_url: String,
}

impl HttpTaskApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Envelope<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(%status, bytes = body.len(), "api response");
        Ok(serde_json::from_slice(&body)?)
    }

    async fn authenticate(&self, path: &str, email: &str, password: &str) -> Result<AuthData> {
        let request = self
            .http
            .post(self.url(path))
            .json(&Credentials { email, password });
        self.send::<AuthData>(request).await?.into_data()
    }
}

#[async_trait]
impl TaskApi for HttpTaskApi {
    async fn signup(&self, email: &str, password: &str) -> Result<AuthData> {
        self.authenticate("/auth/signup", email, password).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthData> {
        self.authenticate("/auth/login", email, password).await
    }

    async fn list(&self, token: &str) -> Result<Vec<Task>> {
        let request = self
            .http
            .get(self.url("/todos"))
            .query(&[("sort", "-createdAt")])
            .bearer_auth(token);
        let list = self.send::<TodoList>(request).await?.into_result()?;
        Ok(list.map(|l| l.todos).unwrap_or_default())
    }

    async fn create(&self, token: &str, text: &str) -> Result<Task> {
        let request = self
            .http
            .post(self.url("/todos"))
            .bearer_auth(token)
            .json(&NewTask { text });
        self.send::<Task>(request).await?.into_data()
    }

    async fn update(&self, token: &str, id: &str, patch: &TaskPatch) -> Result<Task> {
        let request = self
            .http
            .patch(self.url(&format!("/todos/{id}")))
            .bearer_auth(token)
            .json(patch);
        self.send::<Task>(request).await?.into_data()
    }

    async fn remove(&self, token: &str, id: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.url(&format!("/todos/{id}")))
            .bearer_auth(token);
        self.send::<serde_json::Value>(request)
            .await?
            .into_result()
            .map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
