//! File association by mime pattern.

use crate::logging::single_line;
use crate::package::manifest::PackageMetadata;
use log::warn;
use regex::Regex;

/// Tests `mime` against a manifest pattern.
///
/// The pattern is an unanchored regular expression. Patterns using
/// lookaround or backreferences go through the backtracking engine. A
/// pattern neither engine compiles is compared to `mime` by exact string
/// equality instead.
pub fn mime_matches(pattern: &str, mime: &str) -> bool {
    if let Ok(re) = Regex::new(pattern) {
        return re.is_match(mime);
    }

    match fancy_regex::Regex::new(pattern) {
        Ok(re) => re.is_match(mime).unwrap_or_else(|err| {
            warn!(
                "event=mime_pattern module=package status=error pattern={} error={}",
                pattern,
                single_line(&err.to_string(), 120)
            );
            false
        }),
        Err(err) => {
            warn!(
                "event=mime_pattern module=package status=invalid pattern={} error={}",
                pattern,
                single_line(&err.to_string(), 120)
            );
            pattern == mime
        }
    }
}

/// Names of the packages able to open `mime`, in manifest order.
pub fn compatible_packages(metadata: &[PackageMetadata], mime: &str) -> Vec<String> {
    metadata
        .iter()
        .filter(|package| {
            package
                .mimes
                .as_ref()
                .is_some_and(|patterns| patterns.iter().any(|p| mime_matches(p, mime)))
        })
        .map(|package| package.name.clone())
        .collect()
}
