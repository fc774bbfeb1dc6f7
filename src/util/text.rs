use std::borrow::Cow;

/// Truncates a string to at most `max_chars` Unicode scalar values.
///
/// Returns the input borrowed when it already fits. No ellipsis is added:
/// this is for hard length limits imposed by remote APIs, not display.
///
/// # Examples
///
/// ```
/// use feedhook::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 5), "Hello");
/// assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((byte_end, _)) => Cow::Owned(s[..byte_end].to_string()),
        None => Cow::Borrowed(s),
    }
}

/// Removes control characters that would corrupt terminal output.
///
/// Feed titles are remote input; a stray escape sequence in one must not
/// reach the status table. Newlines and tabs become spaces.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(char::is_control) {
        return Cow::Borrowed(s);
    }

    Cow::Owned(
        s.chars()
            .filter_map(|c| match c {
                '\n' | '\r' | '\t' => Some(' '),
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect(),
    )
}
