//! DNS subject alternative names.

use crate::error::EnrollError;

/// Split a comma-separated list into trimmed names, preserving order.
///
/// Empty segments are dropped, so `""` and `" , "` both yield no names.
pub fn parse_dns_alt_names(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Check that a name can be encoded as a DNS `subjectAltName` entry.
///
/// Entries are IA5 (ASCII) strings; internationalized names must be given in
/// their punycode form.
pub fn validate_dns_alt_name(name: &str) -> Result<(), EnrollError> {
    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii() || c.is_ascii_whitespace() || c.is_ascii_control())
    {
        return Err(EnrollError::Configuration(format!(
            "invalid DNS alt name '{}': character {:?} is not allowed",
            name, c
        )));
    }
    Ok(())
}

/// Render names as a subjectAltName extension value, e.g.
/// `DNS:a.example,DNS:b.example`. Returns `None` when there are no names, in
/// which case no extension is requested.
pub fn san_extension_value(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    Some(
        names
            .iter()
            .map(|name| format!("DNS:{}", name))
            .collect::<Vec<_>>()
            .join(","),
    )
}
