use reqwest::{IntoUrl, Method, RequestBuilder};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::handler::{AuthHandler, RequestOptions};

/// Wrapper around `reqwest::Client` that sends every request through an [`AuthHandler`].
///
/// Mirrors `reqwest::Client`'s builder-then-send shape: `get`/`post`/`put`/`patch`/`delete`/
/// `head` return a plain, unauthenticated [`RequestBuilder`] for the caller to customize (body,
/// headers, query) and `build()`. Authentication happens once the built [`reqwest::Request`] is
/// handed to [`execute`](Self::execute) — unlike a statically cached bearer token, acquiring one
/// here can itself require network I/O, so it can't happen at request-building time.
#[derive(Debug, Clone)]
pub struct ForgeHttpClient {
    handler: AuthHandler,
    client: reqwest::Client,
}

impl ForgeHttpClient {
    /// Creates a new client with a fresh default `reqwest::Client`.
    #[must_use]
    pub fn new(handler: AuthHandler) -> Self {
        Self::with_client(handler, reqwest::Client::new())
    }

    /// Set a custom `reqwest::Client`.
    #[must_use]
    pub fn with_client(handler: AuthHandler, client: reqwest::Client) -> Self {
        Self { handler, client }
    }

    /// Executes `request` through the wrapped [`AuthHandler`], with no cancellation.
    ///
    /// # Errors
    /// See [`AuthHandler::send`].
    pub async fn execute(&self, request: reqwest::Request, options: RequestOptions) -> Result<reqwest::Response> {
        self.execute_cancellable(request, options, CancellationToken::new()).await
    }

    /// Executes `request`, honoring `cancel` for the token acquisition, every retry wait, and
    /// every in-flight send.
    ///
    /// # Errors
    /// See [`AuthHandler::send`].
    pub async fn execute_cancellable(
        &self,
        request: reqwest::Request,
        options: RequestOptions,
        cancel: CancellationToken,
    ) -> Result<reqwest::Response> {
        self.handler.send(request, options, cancel).await
    }

    /// Start building a `GET` request.
    pub fn get<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.request(Method::GET, url)
    }

    /// Start building a `POST` request.
    pub fn post<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.request(Method::POST, url)
    }

    /// Start building a `PUT` request.
    pub fn put<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.request(Method::PUT, url)
    }

    /// Start building a `PATCH` request.
    pub fn patch<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.request(Method::PATCH, url)
    }

    /// Start building a `DELETE` request.
    pub fn delete<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.request(Method::DELETE, url)
    }

    /// Start building a `HEAD` request.
    pub fn head<U: IntoUrl>(&self, url: U) -> RequestBuilder {
        self.client.request(Method::HEAD, url)
    }
}
