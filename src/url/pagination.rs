use crate::{UrlError, UrlResult};
use std::collections::BTreeMap;
use url::Url;

/// Query parameter carrying the page number
pub const PAGE_PARAM: &str = "page";

/// Builds the request URL for one page of a seed
///
/// The fixed parameters are appended after any query the seed already
/// carries. Page 1 never carries the page parameter: the target answers
/// `page=1` with a redirect to the bare URL, which would read as a redirect
/// mismatch. Higher pages append `page={page}` last.
///
/// # Examples
///
/// ```
/// use listing_harvester::url::page_url;
/// use std::collections::BTreeMap;
/// use url::Url;
///
/// let seed = Url::parse("https://example.com/review/shop").unwrap();
/// let fixed = BTreeMap::from([("sort".to_string(), "recency".to_string())]);
///
/// assert_eq!(
///     page_url(&seed, &fixed, 1).unwrap().as_str(),
///     "https://example.com/review/shop?sort=recency"
/// );
/// assert_eq!(
///     page_url(&seed, &fixed, 3).unwrap().as_str(),
///     "https://example.com/review/shop?sort=recency&page=3"
/// );
/// ```
pub fn page_url(seed: &Url, fixed_params: &BTreeMap<String, String>, page: u32) -> UrlResult<Url> {
    if seed.cannot_be_a_base() {
        return Err(UrlError::CannotBeABase(seed.to_string()));
    }

    let mut url = seed.clone();
    url.set_fragment(None);

    let has_params = !fixed_params.is_empty() || page > 1;
    if has_params {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in fixed_params {
            pairs.append_pair(key, value);
        }
        if page > 1 {
            pairs.append_pair(PAGE_PARAM, &page.to_string());
        }
    }

    // Avoid a dangling `?` when the seed had an empty query
    if url.query() == Some("") {
        url.set_query(None);
    }

    Ok(url)
}
