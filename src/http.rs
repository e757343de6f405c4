//! Shared HTTP plumbing for the lookup service and the remote store.
use std::time::Duration;

/// How a failed request should be treated by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureClass {
    /// Worth retrying: timeouts, dropped connections, 408/429/5xx, bodies
    /// that failed to decode.
    Transient,
    /// Credentials missing or rejected.
    Unauthorized,
    /// The endpoint or request setup is wrong for every record alike.
    Misconfigured,
    /// The service understood the request and refused this one query.
    Rejected,
}

pub(crate) fn agent(timeout_secs: u64) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(timeout_secs)))
        .build()
        .into()
}

/// Classify by status code or transport category, never by message text.
pub(crate) fn classify(err: &ureq::Error) -> FailureClass {
    match err {
        ureq::Error::StatusCode(status) => classify_status(*status),
        ureq::Error::BadUri(_)
        | ureq::Error::InvalidProxyUrl
        | ureq::Error::RequireHttpsOnly(_)
        | ureq::Error::TlsRequired => FailureClass::Misconfigured,
        _ => FailureClass::Transient,
    }
}

pub(crate) fn classify_status(status: u16) -> FailureClass {
    match status {
        401 | 403 => FailureClass::Unauthorized,
        408 | 429 => FailureClass::Transient,
        422 => FailureClass::Rejected,
        status if status >= 500 => FailureClass::Transient,
        _ => FailureClass::Misconfigured,
    }
}
