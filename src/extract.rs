//! Stateless helpers for cleaning and normalizing scraped text.

use url::Url;

/// Strips every character that is not a digit or decimal point and parses
/// the remainder as a float. Empty or unparseable input yields `0.0`.
///
/// Thousands separators are handled by being stripped, not understood:
/// `"$1,234.56"` becomes `1234.56` because the comma goes away.
pub fn clean_price(raw: &str) -> f64 {
    let stripped: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    stripped.parse().unwrap_or(0.0)
}

/// Collapses runs of whitespace to a single space and trims the ends.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prefixes `base_origin` unless the value already carries a scheme.
/// Applied to every scraped link before it becomes a fetch request.
pub fn absolutize(url: &str, base_origin: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("{}{}", base_origin, url)
    }
}

/// Returns the first run of digits as an integer, else `default`.
pub fn extract_number(text: &str, default: i64) -> i64 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().unwrap_or(default)
}

/// Returns the URL unchanged when it parses as an absolute URL, otherwise
/// an empty string.
pub fn validate_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(_) => url.to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_price_strips_currency_and_separators() {
        assert_eq!(clean_price("$1,234.56"), 1234.56);
        assert_eq!(clean_price("$19.99"), 19.99);
        assert_eq!(clean_price("  USD 42 "), 42.0);
    }

    #[test]
    fn clean_price_defaults_to_zero() {
        assert_eq!(clean_price(""), 0.0);
        assert_eq!(clean_price("N/A"), 0.0);
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Widget \n\t Pro  "), "Widget Pro");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn absolutize_prefixes_relative_urls() {
        assert_eq!(
            absolutize("/p/123", "https://example.com"),
            "https://example.com/p/123"
        );
        assert_eq!(
            absolutize("https://x.com/p", "https://example.com"),
            "https://x.com/p"
        );
    }

    #[test]
    fn extract_number_returns_first_digit_run() {
        assert_eq!(extract_number("page 42 of 100", 0), 42);
        assert_eq!(extract_number("no digits here", 7), 7);
        assert_eq!(extract_number("", 0), 0);
    }

    #[test]
    fn validate_url_rejects_garbage() {
        assert_eq!(
            validate_url("https://proxy.example.com:8080"),
            "https://proxy.example.com:8080"
        );
        assert_eq!(validate_url("not a url"), "");
    }
}
