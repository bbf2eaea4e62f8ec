// Vendor endpoint construction
//
// Operators paste whatever URL the vendor app shows them: sometimes the bare
// cloud server, sometimes the full relay-control endpoint, often with a
// trailing slash. Both endpoints are derived from that one string.

use url::Url;

use crate::error::Error;

pub const STATUS_PATH: &str = "/device/status";
pub const CONTROL_PATH: &str = "/device/relay/control";

fn trimmed_base(server_url: &str) -> &str {
    server_url.trim().trim_end_matches('/')
}

/// Build the status endpoint for a configured server URL.
///
/// A URL that already points at the relay-control endpoint (any case) is
/// rewritten to the status endpoint; anything else gets the status path
/// appended.
pub fn status_url(server_url: &str) -> Result<Url, Error> {
    let base = trimmed_base(server_url);
    let lower = base.to_ascii_lowercase();

    let target = match lower.find(CONTROL_PATH) {
        Some(pos) => format!(
            "{}{STATUS_PATH}{}",
            &base[..pos],
            &base[pos + CONTROL_PATH.len()..]
        ),
        None => format!("{base}{STATUS_PATH}"),
    };

    Ok(Url::parse(&target)?)
}

/// Build the relay-control endpoint for a configured server URL.
pub fn control_url(server_url: &str) -> Result<Url, Error> {
    let base = trimmed_base(server_url);

    let target = if base.to_ascii_lowercase().contains(CONTROL_PATH) {
        base.to_owned()
    } else {
        format!("{base}{CONTROL_PATH}")
    };

    Ok(Url::parse(&target)?)
}
