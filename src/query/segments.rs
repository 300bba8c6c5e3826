//! Splits query text into code, literals and comments.
//!
//! Every rewrite in the adapter runs on code segments only, so string
//! literals and backtick-quoted identifiers survive byte for byte.

/// A slice of query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Query code, eligible for rewriting.
    Code(&'a str),
    /// Quoted string or backtick identifier, including its delimiters.
    Literal(&'a str),
    /// `//` or `/* */` comment, including its delimiters.
    Comment(&'a str),
}

/// Splits `query` into segments. Unterminated literals and block comments
/// extend to the end of the input.
#[must_use]
pub fn split(query: &str) -> Vec<Segment<'_>> {
    let bytes = query.as_bytes();
    let mut segments = Vec::new();
    let mut code_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let end = match bytes[i] {
            b'\'' | b'"' => Some((quoted_end(bytes, i), true)),
            b'`' => Some((backtick_end(bytes, i), true)),
            b'/' if bytes.get(i + 1) == Some(&b'/') => Some((line_comment_end(bytes, i), false)),
            b'/' if bytes.get(i + 1) == Some(&b'*') => Some((block_comment_end(bytes, i), false)),
            _ => None,
        };
        let Some((end, literal)) = end else {
            i += 1;
            continue;
        };
        if code_start < i {
            segments.push(Segment::Code(&query[code_start..i]));
        }
        let text = &query[i..end];
        segments.push(if literal {
            Segment::Literal(text)
        } else {
            Segment::Comment(text)
        });
        i = end;
        code_start = end;
    }
    if code_start < bytes.len() {
        segments.push(Segment::Code(&query[code_start..]));
    }
    segments
}

fn quoted_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn backtick_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            // Doubled backtick escapes a literal backtick.
            if bytes.get(i + 1) == Some(&b'`') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn line_comment_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |offset| start + offset)
}

fn block_comment_end(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| start + 2 + offset + 2)
}

/// Removes comments, keeping line structure. A block comment becomes a
/// single space so the tokens around it stay separated.
#[must_use]
pub fn strip_comments(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for segment in split(query) {
        match segment {
            Segment::Code(text) | Segment::Literal(text) => out.push_str(text),
            Segment::Comment(text) if text.starts_with("/*") => out.push(' '),
            Segment::Comment(_) => {},
        }
    }
    out
}

/// Returns the query with every literal replaced by an empty string literal
/// and comments removed, for pattern detection that must not see quoted
/// text.
#[must_use]
pub fn masked(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    for segment in split(query) {
        match segment {
            Segment::Code(text) => out.push_str(text),
            Segment::Literal(_) => out.push_str("''"),
            Segment::Comment(_) => out.push(' '),
        }
    }
    out
}

/// Applies `rewrite` to every code segment and reassembles the query.
pub fn map_code(query: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(query.len());
    for segment in split(query) {
        match segment {
            Segment::Code(text) => out.push_str(&rewrite(text)),
            Segment::Literal(text) | Segment::Comment(text) => out.push_str(text),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_literals_and_comments() {
        let segments = split("MATCH (n) // find\nWHERE n.name = 'a//b' /* x */ RETURN `weird``name`");
        assert_eq!(
            segments,
            vec![
                Segment::Code("MATCH (n) "),
                Segment::Comment("// find"),
                Segment::Code("\nWHERE n.name = "),
                Segment::Literal("'a//b'"),
                Segment::Code(" "),
                Segment::Comment("/* x */"),
                Segment::Code(" RETURN "),
                Segment::Literal("`weird``name`"),
            ]
        );
    }

    #[test]
    fn test_escaped_quotes() {
        let segments = split(r#"RETURN 'it\'s' + "say \"hi\"" AS s"#);
        assert_eq!(segments[1], Segment::Literal(r"'it\'s'"));
        assert_eq!(segments[3], Segment::Literal(r#""say \"hi\"""#));
    }

    #[test]
    fn test_strip_comments_preserves_literals() {
        let query = "MATCH (f:File) // trailing\nWHERE f.filePath = 'http://x/*y*/' /* inline */RETURN f";
        assert_eq!(
            strip_comments(query),
            "MATCH (f:File) \nWHERE f.filePath = 'http://x/*y*/'  RETURN f"
        );
    }

    #[test]
    fn test_unterminated_input() {
        assert_eq!(
            split("RETURN 'open"),
            vec![Segment::Code("RETURN "), Segment::Literal("'open")]
        );
        assert_eq!(strip_comments("RETURN 1 /* open"), "RETURN 1  ");
    }

    #[test]
    fn test_masked() {
        assert_eq!(masked("WHERE n.x = 'shortestPath(' // c"), "WHERE n.x = ''  ");
    }

    #[test]
    fn test_map_code_skips_literals() {
        let out = map_code("RETURN 'abc' + abc", |code| code.replace("abc", "xyz"));
        assert_eq!(out, "RETURN 'abc' + xyz");
    }

    #[test]
    fn test_multibyte_text() {
        let query = "RETURN 'héllo' // ünïcode\n, 'ok'";
        assert_eq!(strip_comments(query), "RETURN 'héllo' \n, 'ok'");
    }
}
