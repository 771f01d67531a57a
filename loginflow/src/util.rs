use crate::data::Headers;

pub fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub fn contains_any_ignore_case<S: AsRef<str>>(haystack: &str, needles: &[S]) -> bool {
    let haystack = haystack.to_lowercase();

    needles
        .iter()
        .any(|needle| haystack.contains(&needle.as_ref().to_lowercase()))
}

/// Cuts `text` to at most `max_len` bytes without splitting a character.
pub fn truncate_on_char_boundary(text: &mut String, max_len: usize) {
    if text.len() <= max_len {
        return;
    }

    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

/// Method plus URL without fragment, used to decide whether two steps are the same request.
pub fn request_identity(method: &str, url: &str) -> String {
    let url = url.split('#').next().unwrap_or(url);

    format!("{} {}", method.to_uppercase(), url.trim_end_matches('/'))
}
