/// Shared formatting and escaping helpers
///
/// Small pure functions used by both controllers: HTML escaping for
/// anything user-entered that ends up in markup, slugification for
/// download filenames, and order formatting that keeps whole numbers
/// free of a trailing ".0".

/// Escape a string for safe embedding in HTML text or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Maximum length of a slugified category in a download filename.
const SLUG_MAX: usize = 60;

/// Turn a category name into a filename-safe slug.
///
/// Lowercases, collapses whitespace runs to single hyphens, strips
/// everything outside `[a-z0-9-_.]`, and truncates to 60 characters.
/// Falls back to "category" when nothing usable remains.
pub fn slug(s: &str) -> String {
    let lowered = s.trim().to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    let mut in_space = false;
    for c in lowered.chars() {
        if c.is_whitespace() {
            in_space = true;
            continue;
        }
        if in_space {
            out.push('-');
            in_space = false;
        }
        match c {
            'a'..='z' | '0'..='9' | '-' | '_' | '.' => out.push(c),
            _ => {}
        }
    }

    out.truncate(SLUG_MAX);
    if out.is_empty() {
        "category".to_string()
    } else {
        out
    }
}

/// Format an order value for display and filenames.
/// Whole numbers render without a fractional part (3, not 3.0).
pub fn format_order(order: f64) -> String {
    if order.fract() == 0.0 && order.is_finite() {
        format!("{}", order as i64)
    } else {
        format!("{}", order)
    }
}

/// Synthesize the client-side download filename for a card face.
pub fn download_filename(category: &str, order: f64, side: &str) -> String {
    format!("{}_order-{}_{}.png", slug(category), format_order(order), side)
}

/// Build the lowercase haystack the free-text filter matches against.
pub fn search_haystack(category: &str, side: &str, order: f64) -> String {
    format!("{} {} {}", category, side, format_order(order)).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b class="x">&'"#),
            "&lt;b class=&quot;x&quot;&gt;&amp;&#039;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_slug_basic() {
        assert_eq!(slug("Dragon Cards"), "dragon-cards");
        assert_eq!(slug("  Spaced   Out  "), "spaced-out");
        assert_eq!(slug("keep-this_one.v2"), "keep-this_one.v2");
    }

    #[test]
    fn test_slug_strips_and_falls_back() {
        assert_eq!(slug("ไพ่มังกร"), "category");
        assert_eq!(slug(""), "category");
        assert_eq!(slug("A/B:C"), "abc");
    }

    #[test]
    fn test_slug_truncates() {
        let long = "x".repeat(100);
        assert_eq!(slug(&long).len(), 60);
    }

    #[test]
    fn test_format_order() {
        assert_eq!(format_order(3.0), "3");
        assert_eq!(format_order(-2.0), "-2");
        assert_eq!(format_order(1.5), "1.5");
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(
            download_filename("Dragon Cards", 1.0, "front"),
            "dragon-cards_order-1_front.png"
        );
    }

    #[test]
    fn test_search_haystack() {
        assert_eq!(search_haystack("Dragons", "Front", 2.0), "dragons front 2");
    }
}
