use http::StatusCode;
use reqwest::Response;

use crate::error::{Error, Result};

/// Translates a non-success HTTP response into a typed, terminal [`Error`].
///
/// If `response`'s status is in the 2xx range, it is returned unchanged. Otherwise the body
/// is read fully and the stream disposed, and the response becomes an [`Error::TooManyRequests`]
/// (for 429, carrying the `Retry-After` delta if present) or [`Error::HttpFailure`].
///
/// The retry layer in [`crate::policy`] already handles 429 and the other transient statuses
/// internally; this validator exists for callers that sit above or bypass the resiliency
/// policy (notably [`crate::token_fetcher`], which never retries on a non-2xx response) and
/// want a terminal exception instead of an HTTP response to inspect.
///
/// # Errors
/// Returns [`Error::TooManyRequests`] for a 429 response, [`Error::HttpFailure`] otherwise.
pub async fn validate(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let retry_after = parse_retry_after(&response);
    let body = response.text().await.unwrap_or_default();

    let message = if body.is_empty() {
        format!(
            "The server returned the non-success status code {} ({}).",
            status.as_u16(),
            reason_phrase(status)
        )
    } else {
        format!(
            "The server returned the non-success status code {} ({}).\nMore error details:\n{body}.",
            status.as_u16(),
            reason_phrase(status)
        )
    };

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::TooManyRequests {
            status: status.as_u16(),
            retry_after,
            message,
        });
    }

    Err(Error::HttpFailure {
        status: status.as_u16(),
        message,
    })
}

fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

/// Parses a delta-seconds `Retry-After` header. Absolute-date form is ignored, per spec.
pub(crate) fn parse_retry_after(response: &Response) -> Option<std::time::Duration> {
    let value = response.headers().get(http::header::RETRY_AFTER)?;
    let seconds: u64 = value.to_str().ok()?.trim().parse().ok()?;
    Some(std::time::Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn success_passes_through_unchanged() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/ok").with_status(200).create_async().await;

        let response = reqwest::get(format!("{}/ok", server.url())).await.unwrap();
        let validated = validate(response).await.unwrap();
        assert!(validated.status().is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_2xx_becomes_http_failure_with_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/broken")
            .with_status(503)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let response = reqwest::get(format!("{}/broken", server.url())).await.unwrap();
        let err = validate(response).await.unwrap_err();
        match err {
            Error::HttpFailure { status, message } => {
                assert_eq!(status, 503);
                assert!(message.contains("upstream exploded"));
                assert!(message.starts_with("The server returned the non-success status code 503"));
            }
            other => panic!("expected HttpFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn too_many_requests_carries_retry_after_delta() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/slow-down")
            .with_status(429)
            .with_header("retry-after", "2")
            .create_async()
            .await;

        let response = reqwest::get(format!("{}/slow-down", server.url())).await.unwrap();
        let err = validate(response).await.unwrap_err();
        match err {
            Error::TooManyRequests {
                status,
                retry_after,
                ..
            } => {
                assert_eq!(status, 429);
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(2)));
            }
            other => panic!("expected TooManyRequests, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_omits_error_details_clause() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/empty").with_status(500).create_async().await;

        let response = reqwest::get(format!("{}/empty", server.url())).await.unwrap();
        let err = validate(response).await.unwrap_err();
        match err {
            Error::HttpFailure { message, .. } => {
                assert!(!message.contains("More error details"));
            }
            other => panic!("expected HttpFailure, got {other:?}"),
        }
    }
}
