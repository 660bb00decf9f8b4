// Utilities for quoted strings in DBC statements.
//
// These helpers support escaped quotes (\") and multi-line quoted strings,
// which are common in CM_ comments or attribute values.

// Count unescaped double quotes in a string.
// A quote is considered escaped if immediately preceded by an odd number of backslashes.
pub(crate) fn count_unescaped_quotes(s: &str) -> usize {
    let mut count = 0usize;
    let mut backslashes = 0usize;
    for ch in s.chars() {
        if ch == '\\' {
            backslashes += 1;
            continue;
        }
        if ch == '"' && backslashes % 2 == 0 {
            count += 1;
        }
        backslashes = 0;
    }
    count
}

// True while a statement still has an open quoted segment.
pub(crate) fn has_open_quote(s: &str) -> bool {
    count_unescaped_quotes(s) % 2 == 1
}

// --- helper: collect strings within "" ---
// Unclosed trailing quotes are dropped.
pub(crate) fn collect_all_quoted(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut backslashes = 0usize;

    for ch in s.chars() {
        let escaped: bool = backslashes % 2 == 1;
        backslashes = if ch == '\\' { backslashes + 1 } else { 0 };
        if ch == '"' && !escaped {
            match current.take() {
                Some(buf) => out.push(unescape(&buf)),
                None => current = Some(String::new()),
            }
        } else if let Some(buf) = current.as_mut() {
            buf.push(ch);
        }
    }
    out
}

// Split on whitespace, keeping every quoted string (quotes included) as one token.
pub(crate) fn tokenize(s: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    let mut chars = s.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        let mut end: usize = s.len();
        chars.next();
        if ch == '"' {
            let mut backslashes = 0usize;
            for (i, c) in chars.by_ref() {
                if c == '"' && backslashes % 2 == 0 {
                    end = i + 1;
                    break;
                }
                backslashes = if c == '\\' { backslashes + 1 } else { 0 };
            }
        } else {
            while let Some(&(i, c)) = chars.peek() {
                if c.is_whitespace() {
                    end = i;
                    break;
                }
                chars.next();
            }
        }
        out.push(&s[start..end]);
    }
    out
}

// Content of a "quoted" token, None for bare tokens.
pub(crate) fn unquote(token: &str) -> Option<&str> {
    token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
}

pub(crate) fn unescape(s: &str) -> String {
    s.replace("\\\"", "\"").replace("\\\\", "\\")
}
