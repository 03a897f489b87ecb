use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// shortest literal accepted as an encoded payload.
pub const MIN_PAYLOAD_LEN: usize = 100;

// `var <name> = "<base64>";` on a single line, no concatenation.
static ENCODED_VAR_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"var\s+\w+\s*=\s*"([A-Za-z0-9+/=]{{{MIN_PAYLOAD_LEN},}})";"#
    ))
    .ok()
});

/// finds the first base64 literal assigned to a `var` in script text.
///
/// returns `None` when nothing matches. strings split across lines or built
/// from concatenations are not recognised.
pub fn extract_encoded_string(input: &str) -> Option<String> {
    let Some(re) = ENCODED_VAR_RE.as_ref() else {
        debug!("encoded payload pattern failed to compile");
        return None;
    };

    let payload = re
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    debug!(found = payload.is_some(), input_len = input.len(), "scanned for encoded payload");
    payload
}
