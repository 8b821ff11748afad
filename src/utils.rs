//! # URL Utilities
//!
//! Query-string merging shared by wire request construction and API key auth.

use reqwest::Url;

/// Overwrite query parameters on `url`.
///
/// Every existing pair whose name appears in `overrides` is dropped, the rest
/// keep their order, and the overrides are appended. Path and fragment are
/// untouched. An empty override set leaves the URL byte-for-byte unchanged.
pub(crate) fn merge_query_pairs<'a, I>(url: &mut Url, overrides: I)
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let overrides: Vec<(&str, &str)> = overrides.into_iter().collect();
    if overrides.is_empty() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !overrides.iter().any(|(o, _)| o == name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut pairs = url.query_pairs_mut();
    pairs.clear();
    for (name, value) in &kept {
        pairs.append_pair(name, value);
    }
    for (name, value) in overrides {
        pairs.append_pair(name, value);
    }
}
