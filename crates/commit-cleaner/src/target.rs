//! Which pages the cleaner should be injected into.
//!
//! Injection itself belongs to the embedding extension; this only answers
//! whether a URL is a pull request page of the hosted or on-premises service.

use std::sync::LazyLock;

use regex::Regex;

static PULL_REQUEST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://(?:dev\.azure\.com|[^/]+\.visualstudio\.com)/.*/_git/[^/]+/pull[rR]equest/")
        .expect("pull request url pattern is valid")
});

pub fn is_pull_request_url(url: &str) -> bool {
    PULL_REQUEST_URL.is_match(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_pull_request_pages() {
        assert!(is_pull_request_url(
            "https://dev.azure.com/contoso/Web/_git/portal/pullrequest/4821"
        ));
        assert!(is_pull_request_url(
            "https://contoso.visualstudio.com/Web/_git/portal/pullRequest/17?_a=overview"
        ));
    }

    #[test]
    fn rejects_other_pages() {
        assert!(!is_pull_request_url("https://dev.azure.com/contoso/Web/_git/portal"));
        assert!(!is_pull_request_url("http://dev.azure.com/contoso/Web/_git/portal/pullrequest/1"));
        assert!(!is_pull_request_url("https://example.com/contoso/_git/portal/pullrequest/1"));
    }
}
