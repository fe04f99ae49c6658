//! Deep links from search results back to wiki pages.

use url::Url;

use wikisearch_shared::{Result, WikiSearchError};

/// Query parameter selecting the portal application.
pub const PARAMETER_PAGE: &str = "page";
/// Query parameter carrying the wiki page name.
pub const PARAMETER_PAGE_NAME: &str = "page_name";
/// Query parameter carrying the wiki action.
pub const PARAMETER_ACTION: &str = "action";
/// Action that displays a page.
pub const ACTION_VIEW: &str = "view";

/// Parse and validate the portal entry URL. Only absolute http(s) URLs are accepted.
pub fn parse_portal_url(portal_url: &str) -> Result<Url> {
    let url = Url::parse(portal_url)
        .map_err(|e| WikiSearchError::config(format!("invalid portal_url '{portal_url}': {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WikiSearchError::config(format!(
            "portal_url must use http or https, got '{other}'"
        ))),
    }
}

/// Build the view link of a wiki page: `<portal>?page=<label>&page_name=<name>&action=view`.
///
/// Query parameters already present on the portal URL are kept.
pub fn topic_url(portal_url: &Url, page_path_label: &str, page_name: &str) -> String {
    let mut url = portal_url.clone();
    url.query_pairs_mut()
        .append_pair(PARAMETER_PAGE, page_path_label)
        .append_pair(PARAMETER_PAGE_NAME, page_name)
        .append_pair(PARAMETER_ACTION, ACTION_VIEW);
    url.to_string()
}
