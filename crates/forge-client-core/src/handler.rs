use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use http::header::AUTHORIZATION;
use reqwest::{Client, Request, Response, StatusCode};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::cache::TokenCache;
use crate::config::ForgeConfig;
use crate::error::{Error, Result};
use crate::policy::{ResiliencyPolicy, DEFAULT_TIMEOUT};
use crate::token_fetcher;

/// Per-request overrides for a single [`AuthHandler::send`] call.
///
/// Leaving `scope` unset means the caller is managing its own `Authorization` header (or the
/// call genuinely needs none) — the handler then neither attaches nor refreshes a token for
/// that request, regardless of what the response status turns out to be.
#[derive(Clone, Debug, Default, typed_builder::TypedBuilder)]
pub struct RequestOptions {
    /// Overrides the default per-attempt timeout for this call. Runs against an independent
    /// circuit-breaker scope rather than the handler's shared one — see
    /// [`AuthHandler`]'s struct docs.
    #[builder(default, setter(strip_option))]
    pub timeout: Option<Duration>,
    /// OAuth scope to request a token for. Unset means "don't manage auth for this call".
    #[builder(default, setter(strip_option, into))]
    pub scope: Option<String>,
    /// Named credential set from [`ForgeConfig`] to authenticate as. Empty/unset uses the
    /// default service credentials.
    #[builder(default, setter(strip_option, into))]
    pub agent: Option<String>,
}

struct Shared {
    config: ForgeConfig,
    http_client: Client,
    cache: TokenCache,
    refresh_lock: Semaphore,
    default_policy: ResiliencyPolicy,
}

/// A [`ResiliencyPolicy`] to run a call through: either the handler's shared, long-lived
/// instance, or a one-off built for a custom per-call timeout.
///
/// Per-call custom timeouts get their own breaker rather than sharing the handler's: a caller
/// asking for an unusually short or long timeout is opting into different failure behavior,
/// and shouldn't be able to trip (or be tripped by) the breaker guarding every other call.
enum PolicyRef<'a> {
    Shared(&'a ResiliencyPolicy),
    Owned(ResiliencyPolicy),
}

impl Deref for PolicyRef<'_> {
    type Target = ResiliencyPolicy;

    fn deref(&self) -> &ResiliencyPolicy {
        match self {
            PolicyRef::Shared(policy) => policy,
            PolicyRef::Owned(policy) => policy,
        }
    }
}

/// The resilient, authenticated interposer between a caller and Forge's HTTP APIs.
///
/// Wraps a [`reqwest::Client`], a process-local [`TokenCache`], and a shared
/// [`ResiliencyPolicy`]; for every [`send`](AuthHandler::send) call it attaches a bearer token
/// (fetching or reusing one as needed), runs the request through the timeout/retry/breaker
/// composition, and reactively refreshes the token exactly once if the first attempt comes
/// back `401`.
///
/// Cheap to clone — internally an `Arc` — so a single instance can be shared across tasks.
#[derive(Clone)]
pub struct AuthHandler {
    shared: Arc<Shared>,
}

impl fmt::Debug for AuthHandler {
    /// Deliberately opaque: `Shared` carries `ForgeConfig` (client secrets, redacted via
    /// `veil` but still not meant to round-trip through `Debug` a second time here) and a
    /// live [`TokenCache`] of bearer headers, so this prints only the struct name rather
    /// than descending into any field.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthHandler").finish_non_exhaustive()
    }
}

impl AuthHandler {
    /// Builds a handler with a fresh default [`reqwest::Client`].
    #[must_use]
    pub fn new(config: ForgeConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Builds a handler reusing a caller-supplied [`reqwest::Client`], e.g. one with custom
    /// connection pooling or TLS settings.
    #[must_use]
    pub fn with_client(config: ForgeConfig, http_client: Client) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                http_client,
                cache: TokenCache::new(),
                refresh_lock: Semaphore::new(1),
                default_policy: ResiliencyPolicy::new(DEFAULT_TIMEOUT),
            }),
        }
    }

    /// Sends `request`, attaching and, if needed, refreshing a bearer token, and running the
    /// send through the composed resiliency policy.
    ///
    /// # Errors
    /// - [`Error::InvalidArgument`] if `request`'s URI is empty.
    /// - [`Error::Cancelled`] if `cancel` fires before the call completes.
    /// - [`Error::CircuitOpen`] if the relevant breaker is currently open.
    /// - Whatever [`token_fetcher::fetch`] or the transport surface otherwise.
    pub async fn send(
        &self,
        mut request: Request,
        options: RequestOptions,
        cancel: CancellationToken,
    ) -> Result<Response> {
        if request.url().as_str().trim().is_empty() {
            return Err(Error::InvalidArgument { field: "uri" });
        }

        let policy = match options.timeout {
            Some(timeout) => PolicyRef::Owned(ResiliencyPolicy::new(timeout)),
            None => PolicyRef::Shared(&self.shared.default_policy),
        };

        let agent = options.agent.unwrap_or_default();
        let has_auth_header = request.headers().contains_key(AUTHORIZATION);
        let auth_managed = !has_auth_header && options.scope.is_some();

        if let Some(scope) = options.scope.as_deref() {
            if !has_auth_header {
                self.ensure_token(&mut request, &agent, scope, false, &policy, &cancel)
                    .await?;
            }
        }

        let response = self
            .shared
            .default_policy_execute(&policy, &request, &cancel)
            .await;

        if !auth_managed {
            return response;
        }

        match response {
            Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED => {
                tracing::debug!("got 401 on a handler-managed request, refreshing token once");
                let scope = options.scope.as_deref().expect("auth_managed implies scope");
                self.ensure_token(&mut request, &agent, scope, true, &policy, &cancel)
                    .await?;
                self.shared
                    .default_policy_execute(&policy, &request, &cancel)
                    .await
            }
            other => other,
        }
    }

    /// Enters the process-wide refresh critical section, serves a cached token if one is live
    /// and `force_refresh` is false, otherwise fetches a fresh one and caches it, then attaches
    /// the resulting header to `request`.
    async fn ensure_token(
        &self,
        request: &mut Request,
        agent: &str,
        scope: &str,
        force_refresh: bool,
        policy: &ResiliencyPolicy,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let cache_key = format!("{agent}{scope}");

        let _permit = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.shared.refresh_lock.acquire() => {
                permit.expect("refresh semaphore is never closed")
            }
        };

        let cached = if force_refresh {
            None
        } else {
            self.shared.cache.try_get(&cache_key)
        };

        let header = match cached {
            Some(header) => header,
            None => {
                let (header, ttl) = token_fetcher::fetch(
                    &self.shared.config,
                    &self.shared.http_client,
                    policy,
                    agent,
                    scope,
                    cancel,
                )
                .await?;
                self.shared.cache.add(cache_key, header.clone(), ttl);
                header
            }
        };

        request
            .headers_mut()
            .insert(AUTHORIZATION, (*header).clone());
        Ok(())
    }
}

impl Shared {
    /// Runs `request` through `policy`, cloning it fresh for every attempt — a
    /// `reqwest::Request` cannot generally be replayed once consumed, so each retry needs its
    /// own copy of the method, URL, headers and body.
    async fn default_policy_execute(
        &self,
        policy: &ResiliencyPolicy,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let client = self.http_client.clone();
        let template = request
            .try_clone()
            .expect("retryable requests must have a buffered, clonable body");

        let attempt = move || -> BoxFuture<'static, reqwest::Result<Response>> {
            let client = client.clone();
            let req = template
                .try_clone()
                .expect("retryable requests must have a buffered, clonable body");
            async move { client.execute(req).await }.boxed()
        };

        policy.execute(attempt, cancel).await
    }
}
