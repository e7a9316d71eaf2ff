//! Shared HTTP plumbing for the collaborator clients.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};

/// `tenant-lifecycle/{version}`
pub fn user_agent() -> String {
    format!("tenant-lifecycle/{}", env!("CARGO_PKG_VERSION"))
}

/// One client per process; every request it issues is capped at `timeout`.
pub fn client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent())
        .timeout(timeout)
        .build()
}

/// Body text of a failed response, truncated so log lines stay readable.
pub(crate) async fn error_message(response: Response) -> String {
    const LIMIT: usize = 512;
    let text = response.text().await.unwrap_or_default();
    if text.len() <= LIMIT {
        return text;
    }
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Run `call`, failing with `on_timeout(limit)` when it does not settle in time.
pub(crate) async fn bounded<T, E, F>(
    limit: Duration,
    call: F,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}
