use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::api::models::{Chat, ChatMember, Identity, Lookup, Message, NewChat};
use crate::core::config::ClientConfig;
use crate::core::error::{AppError, AppResult, HttpError};
use crate::telegram::Credential;

/// Authenticated access to the backend's REST resources.
///
/// Every call carries `Authorization: twa <credential>` and a JSON content
/// type. Non-2xx answers become [`HttpError`]; nothing is retried or cached.
/// Calls that may legitimately find nothing return [`Lookup`]: the backend
/// answers those with either `404` or `200 null`.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// `GET /users/me`
    async fn get_me(&self, credential: &Credential) -> AppResult<Identity>;

    /// `GET /users/{id}`
    async fn get_user(&self, id: &str, credential: &Credential) -> AppResult<Lookup<Identity>>;

    /// `GET /users/{match_id}/chat`
    async fn get_chat_by_match_id(&self, match_id: &str, credential: &Credential) -> AppResult<Lookup<Chat>>;

    /// `GET /chats/{id}`
    async fn get_chat(&self, id: i64, credential: &Credential) -> AppResult<Chat>;

    /// `GET /chats/{id}/messages`
    async fn get_chat_messages(&self, id: i64, credential: &Credential) -> AppResult<Vec<Message>>;

    /// `GET /chats/{id}/members`
    async fn get_chat_members(&self, id: i64, credential: &Credential) -> AppResult<Vec<ChatMember>>;

    /// `POST /chats` with `{"match_id": ...}`
    async fn create_chat(&self, match_id: &str, credential: &Credential) -> AppResult<Chat>;

    /// `GET /chats`
    async fn list_chats(&self, credential: &Credential) -> AppResult<Vec<Chat>>;

    /// `DELETE /chats/{id}`
    async fn delete_chat(&self, id: i64, credential: &Credential) -> AppResult<()>;
}

/// reqwest-backed [`ResourceApi`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> AppResult<Self> {
        let base = Url::parse(&config.api_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            base: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, path: &str, credential: &Credential) -> RequestBuilder {
        let url = format!("{}{}", self.base, path);
        tracing::debug!(%method, %url, "Backend request");
        self.http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, credential.authorization())
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, url = %response.url(), "Backend rejected request");
            return Err(HttpError::new(status).into());
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// 404 and `200 null` both mean "nothing there".
    async fn lookup<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<Lookup<T>> {
        match self.json::<Option<T>>(request).await {
            Ok(value) => Ok(value.into()),
            Err(AppError::Http(err)) if err.status == StatusCode::NOT_FOUND => Ok(Lookup::NotFound),
            Err(err) => Err(err),
        }
    }
}

fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[async_trait]
impl ResourceApi for ApiClient {
    async fn get_me(&self, credential: &Credential) -> AppResult<Identity> {
        self.json(self.request(Method::GET, "/users/me", credential)).await
    }

    async fn get_user(&self, id: &str, credential: &Credential) -> AppResult<Lookup<Identity>> {
        let path = format!("/users/{}", segment(id));
        self.lookup(self.request(Method::GET, &path, credential)).await
    }

    async fn get_chat_by_match_id(&self, match_id: &str, credential: &Credential) -> AppResult<Lookup<Chat>> {
        let path = format!("/users/{}/chat", segment(match_id));
        self.lookup(self.request(Method::GET, &path, credential)).await
    }

    async fn get_chat(&self, id: i64, credential: &Credential) -> AppResult<Chat> {
        let path = format!("/chats/{}", id);
        self.json(self.request(Method::GET, &path, credential)).await
    }

    async fn get_chat_messages(&self, id: i64, credential: &Credential) -> AppResult<Vec<Message>> {
        let path = format!("/chats/{}/messages", id);
        self.json(self.request(Method::GET, &path, credential)).await
    }

    async fn get_chat_members(&self, id: i64, credential: &Credential) -> AppResult<Vec<ChatMember>> {
        let path = format!("/chats/{}/members", id);
        self.json(self.request(Method::GET, &path, credential)).await
    }

    async fn create_chat(&self, match_id: &str, credential: &Credential) -> AppResult<Chat> {
        let body = NewChat {
            match_id: match_id.to_string(),
        };
        let request = self.request(Method::POST, "/chats", credential).json(&body);
        self.json(request).await
    }

    async fn list_chats(&self, credential: &Credential) -> AppResult<Vec<Chat>> {
        self.json(self.request(Method::GET, "/chats", credential)).await
    }

    async fn delete_chat(&self, id: i64, credential: &Credential) -> AppResult<()> {
        let path = format!("/chats/{}", id);
        self.send(self.request(Method::DELETE, &path, credential)).await?;
        Ok(())
    }
}
