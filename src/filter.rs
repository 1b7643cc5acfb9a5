//! Keyword filter applied to every log file before archiving.

/// Terms that make a line worth archiving. Matched case-insensitively.
pub const KEYWORDS: [&str; 3] = ["login", "logout", "fail"];

/// Returns the lines containing at least one of [`KEYWORDS`], in their
/// original order and with their original line terminators.
pub fn filter_log_lines<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| is_relevant(line))
        .map(str::to_owned)
        .collect()
}

/// Whether a single line mentions any keyword.
pub fn is_relevant(line: &str) -> bool {
    let lowered = line.to_lowercase();
    KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Splits file content into lines. `\r\n`, `\r` and `\n` all end a line and
/// every ended line comes back terminated by a single `\n`. A trailing line
/// without a terminator is kept as is.
pub fn split_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rest = content;
    while let Some(end) = rest.find(|c| c == '\r' || c == '\n') {
        let next = if rest[end..].starts_with("\r\n") {
            end + 2
        } else {
            end + 1
        };
        lines.push(format!("{}\n", &rest[..end]));
        rest = &rest[next..];
    }
    if !rest.is_empty() {
        lines.push(rest.to_string());
    }
    lines
}
