use std::time::Duration;

use reqwest::{Client, Response};

use crate::error::{Stage, WeatherError};

/// Build the shared HTTP client with a bounded per-request timeout.
pub(crate) fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(user_agent.to_owned()).timeout(timeout).build()
}

/// Map a non-success status to `UpstreamHttp` for the given stage.
pub(crate) fn check_status(stage: Stage, response: Response) -> Result<Response, WeatherError> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!(%stage, status = status.as_u16(), url = %response.url(), "upstream returned error status");
        return Err(WeatherError::UpstreamHttp { stage, status: status.as_u16() });
    }
    Ok(response)
}

/// Read and parse a JSON body, reporting parse failures against `stage`.
pub(crate) async fn read_json<T>(stage: Stage, response: Response) -> Result<T, WeatherError>
where
    T: serde::de::DeserializeOwned,
{
    let body = response
        .text()
        .await
        .map_err(|source| WeatherError::Transport { stage, source })?;

    serde_json::from_str(&body).map_err(|e| WeatherError::MalformedResponse {
        stage,
        reason: format!("{e}: {}", truncate_body(&body)),
    })
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
