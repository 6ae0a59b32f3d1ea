use std::collections::BTreeSet;
use url::Url;

/// Collects the decoded query pairs of a URL as an unordered set
pub fn query_pairs(url: &Url) -> BTreeSet<(String, String)> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// Checks whether a response resolved to the resource that was requested
///
/// Host, explicit port and path must match exactly; query parameters are
/// compared as unordered sets so `?a=1&b=2` and `?b=2&a=1` are the same
/// request. The scheme and fragment are not compared, and a port equal to
/// its scheme's default counts as absent, so an http to https upgrade on
/// default ports is the same resource.
///
/// # Examples
///
/// ```
/// use listing_harvester::url::same_resource;
/// use url::Url;
///
/// let requested = Url::parse("https://example.com/x?a=1&b=2").unwrap();
/// let reordered = Url::parse("https://example.com/x?b=2&a=1").unwrap();
/// let moved = Url::parse("https://example.com/y?a=1&b=2").unwrap();
///
/// assert!(same_resource(&requested, &reordered));
/// assert!(!same_resource(&requested, &moved));
/// ```
pub fn same_resource(requested: &Url, actual: &Url) -> bool {
    requested.host_str() == actual.host_str()
        && requested.port() == actual.port()
        && requested.path() == actual.path()
        && query_pairs(requested) == query_pairs(actual)
}
