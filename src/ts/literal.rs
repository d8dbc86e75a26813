//! Evaluation of Python string literals as documentation text.
//!
//! Only plain `str` literals (optionally raw or `u`-prefixed, possibly
//! implicitly concatenated) count as documentation blocks. Bytes and
//! f-strings never do.

use tree_sitter::Node;

/// A string literal split into its prefix, delimiter and raw body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralParts<'a> {
    pub prefix: &'a str,
    pub quote: &'a str,
    pub body: &'a str,
}

impl LiteralParts<'_> {
    pub fn is_raw(&self) -> bool {
        self.prefix.contains(['r', 'R'])
    }

    /// True for bytes and formatted literals.
    pub fn is_non_text(&self) -> bool {
        self.prefix.contains(['b', 'B', 'f', 'F'])
    }
}

/// Split the source text of a single string literal.
pub fn split_literal(text: &str) -> Option<LiteralParts<'_>> {
    let prefix_len = text
        .find(|c: char| !matches!(c, 'r' | 'R' | 'u' | 'U' | 'f' | 'F' | 'b' | 'B'))
        .unwrap_or(text.len());
    let (prefix, rest) = text.split_at(prefix_len);

    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| rest.starts_with(q))?;

    if rest.len() < quote.len() * 2 || !rest.ends_with(quote) {
        return None;
    }

    Some(LiteralParts {
        prefix,
        quote: &rest[..quote.len()],
        body: &rest[quote.len()..rest.len() - quote.len()],
    })
}

/// Value of a `string` or `concatenated_string` node, if it is a plain text literal.
pub fn string_value(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "string" => {
            let parts = split_literal(&source[node.byte_range()])?;
            if parts.is_non_text() {
                return None;
            }
            Some(decode_body(parts.body, parts.is_raw()))
        }
        "concatenated_string" => {
            let mut value = String::new();
            let mut cursor = node.walk();
            for part in node.named_children(&mut cursor) {
                if part.kind() == "comment" {
                    continue;
                }
                value.push_str(&string_value(part, source)?);
            }
            Some(value)
        }
        _ => None,
    }
}

/// If `statement` is a bare string expression, return the literal node.
pub fn bare_string<'t>(statement: Node<'t>, source: &str) -> Option<Node<'t>> {
    if statement.kind() != "expression_statement" || statement.named_child_count() != 1 {
        return None;
    }
    let expr = statement.named_child(0)?;
    string_value(expr, source).map(|_| expr)
}

/// Resolve backslash escapes in a non-raw literal body.
pub fn decode_body(body: &str, raw: bool) -> String {
    if raw || !body.contains('\\') {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0b}'),
            '0'..='7' => {
                let mut digits = String::from(next);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = chars.clone().take(width).collect();
                let decoded = (digits.len() == width && digits.chars().all(|d| d.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            // \N{NAME} and unknown escapes are kept verbatim.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    out
}

/// Normalize docstring text the way Python's `inspect.cleandoc` does.
///
/// Tabs are expanded, leading whitespace is removed from the first line,
/// the common margin of the remaining lines is removed, and leading and
/// trailing blank lines are dropped.
pub fn clean_docstring(text: &str) -> String {
    let expanded: Vec<String> = text.lines().map(expand_tabs).collect();
    let Some((first, rest)) = expanded.split_first() else {
        return String::new();
    };

    let margin = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut lines: Vec<&str> = Vec::with_capacity(expanded.len());
    lines.push(first.trim_start());
    for line in rest {
        lines.push(line.get(margin..).unwrap_or_else(|| line.trim_start()));
    }

    while lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + 8);
    let mut column = 0usize;
    for c in line.chars() {
        if c == '\t' {
            let pad = 8 - column % 8;
            out.extend(std::iter::repeat(' ').take(pad));
            column += pad;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}
