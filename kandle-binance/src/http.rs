//! Shared HTTP error normalization for the archive and REST sources.

use std::time::Duration;

use kandle_core::FcpError;

/// Map a transport error to the taxonomy.
pub(crate) fn map_reqwest(err: &reqwest::Error, timeout: Duration) -> FcpError {
    if err.is_timeout() {
        FcpError::Timeout(timeout)
    } else {
        FcpError::Network(err.to_string())
    }
}

/// Turn a non-success status into the right error.
///
/// 429 and 418 become `RateLimited`, honoring the `Retry-After` header and
/// defaulting to 60s without it. 418 is the venue's escalation of ignored
/// 429s, so both take the same path.
pub(crate) fn status_error(resp: &reqwest::Response) -> FcpError {
    let status = resp.status().as_u16();
    if status == 429 || status == 418 {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return FcpError::rate_limited(retry_after);
    }
    FcpError::Http { status }
}
