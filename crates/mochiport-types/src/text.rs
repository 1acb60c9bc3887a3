//! Small string helpers used on both sides of the API.

/// Truncate to at most `max_chars` characters, appending an ellipsis when
/// anything was cut. Whitespace at both ends is dropped first.
pub fn truncate_chars(input: &str, max_chars: usize) -> String {
    let trimmed = input.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max_chars).collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}

pub fn word_count(input: &str) -> usize {
    input.split_whitespace().count()
}

/// Trim, lowercase and de-duplicate tags, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Case-insensitive substring match used by in-memory search.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate_chars("  hello  ", 10), "hello");
        assert_eq!(truncate_chars("hello world again", 11), "hello world...");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn words_and_tags() {
        assert_eq!(word_count(" one  two\nthree "), 3);
        assert_eq!(word_count(""), 0);

        let tags = vec![" Work ".to_string(), "work".into(), "".into(), "Home".into()];
        assert_eq!(normalize_tags(&tags), vec!["work".to_string(), "home".to_string()]);
    }
}
