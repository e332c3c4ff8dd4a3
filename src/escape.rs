//! Escaping rules shared by the payload encoders.

/// Characters that carry meaning inside a `WIFI:` payload.
const WIFI_SPECIAL: [char; 4] = ['\\', ';', ',', ':'];

/// Backslash-escapes `\ ; , :` for the `WIFI:` URI scheme.
///
/// ```rust
/// use coldlink::escape::escape_wifi;
///
/// assert_eq!(escape_wifi("Home;Net"), "Home\\;Net");
/// ```
pub fn escape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if WIFI_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape_wifi`]. A trailing lone backslash is kept as is.
pub fn unescape_wifi(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Escapes a vCard / iCalendar text value.
///
/// Backslashes go first so the escapes introduced afterwards are not doubled.
/// CRLF and lone CR are folded into `\n`.
pub fn escape_text(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\\n")
        .replace(';', "\\;")
        .replace(',', "\\,")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wifi_escapes_every_special_character() {
        assert_eq!(escape_wifi(r"a\b;c,d:e"), r"a\\b\;c\,d\:e");
        assert_eq!(escape_wifi("plain"), "plain");
    }

    #[test]
    fn wifi_escape_round_trips() {
        for value in ["Home;Net", "a,b", r"back\slash", "x:y", r"\;,:", "", "caf\u{e9};"] {
            assert_eq!(unescape_wifi(&escape_wifi(value)), value);
        }
    }

    #[test]
    fn unescape_keeps_trailing_backslash() {
        assert_eq!(unescape_wifi("abc\\"), "abc\\");
    }

    #[test]
    fn text_escape_does_not_double_escape() {
        assert_eq!(escape_text("a;b"), r"a\;b");
        assert_eq!(escape_text(r"a\;b"), r"a\\\;b");
        assert_eq!(escape_text("line1\nline2"), r"line1\nline2");
        assert_eq!(escape_text("one, two"), r"one\, two");
    }

    #[test]
    fn text_escape_normalizes_carriage_returns() {
        assert_eq!(escape_text("a\r\nb\rc"), r"a\nb\nc");
    }
}
