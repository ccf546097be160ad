//! Redaction of command lines before they reach the logs

use crate::git::mask_credentials;
use kiln_core::CommandSpec;

/// Replacement for a redacted argument
pub const REDACTED: &str = "***";

/// Name fragments that mark an argument as sensitive (upper case)
const SENSITIVE_MARKERS: [&str; 6] = ["PASSWORD", "SECRET", "TOKEN", "CREDENTIAL", "AUTH", "KEY="];

/// Whether `arg` mentions a sensitive name anywhere, ignoring case
pub fn is_sensitive(arg: &str) -> bool {
    let upper = arg.to_ascii_uppercase();
    SENSITIVE_MARKERS.iter().any(|marker| upper.contains(marker))
}

/// Redact sensitive arguments wholesale and mask URL credentials in the rest
///
/// Matching is deliberately broad: `--authfile` and `oauth2` URLs are
/// redacted too.
pub fn sanitize_args<S: AsRef<str>>(args: &[S]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            if is_sensitive(arg) {
                REDACTED.to_string()
            } else if arg.contains("://") {
                mask_credentials(arg)
            } else {
                arg.to_string()
            }
        })
        .collect()
}

/// Loggable command line for `spec`; the environment is never included
pub fn sanitize_command(spec: &CommandSpec) -> String {
    std::iter::once(spec.program.clone())
        .chain(sanitize_args(&spec.args))
        .collect::<Vec<_>>()
        .join(" ")
}
