//! Rendering replacement text as a documentation block.
//!
//! The formatter only produces lines. Where they go, and what surrounds them
//! on the first and last line, is decided by the rewrite path from a freshly
//! located [`DocSpan`](crate::ts::DocSpan).

use regex::Regex;
use std::sync::LazyLock;

static DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^([rRuUfFbB]*)("""|'''|"|')"#).unwrap());

/// Quoting convention of a block: string prefix plus a triple delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterStyle {
    pub prefix: String,
    /// Always `"""` or `'''`.
    pub quote: &'static str,
}

impl Default for DelimiterStyle {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            quote: "\"\"\"",
        }
    }
}

impl DelimiterStyle {
    /// Detect the style of an existing literal from its source text.
    ///
    /// Single-character delimiters are upgraded to their triple form.
    /// Unrecognised text falls back to `"""` with no prefix.
    pub fn detect(literal: &str) -> Self {
        let Some(caps) = DELIMITER.captures(literal) else {
            return Self::default();
        };
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        let quote = match caps.get(2).map(|m| m.as_str()) {
            Some("'''") | Some("'") => "'''",
            _ => "\"\"\"",
        };
        Self {
            prefix: prefix.to_string(),
            quote,
        }
    }

    pub fn opening(&self) -> String {
        format!("{}{}", self.prefix, self.quote)
    }

    fn quote_char(&self) -> char {
        if self.quote == "'''" {
            '\''
        } else {
            '"'
        }
    }

    pub fn is_raw(&self) -> bool {
        self.prefix.contains(['r', 'R'])
    }

    /// A style able to hold `text` verbatim.
    ///
    /// Raw literals cannot escape anything, so a raw style first tries the
    /// other triple quote and otherwise drops the raw prefix.
    pub fn fitting(&self, text: &str) -> Self {
        if !self.is_raw() {
            return self.clone();
        }
        let fits = |quote: char| !text.contains(quote) && !text.trim_end().ends_with('\\');
        if fits(self.quote_char()) {
            return self.clone();
        }
        let (other, other_char) = if self.quote == "'''" {
            ("\"\"\"", '"')
        } else {
            ("'''", '\'')
        };
        if fits(other_char) {
            return Self {
                prefix: self.prefix.clone(),
                quote: other,
            };
        }
        Self {
            prefix: self.prefix.replace(['r', 'R'], ""),
            quote: self.quote,
        }
    }

    fn escape_backslashes(&self, text: &str) -> String {
        if self.is_raw() {
            text.to_string()
        } else {
            text.replace('\\', "\\\\")
        }
    }

    /// Escape text so it cannot terminate the literal early.
    ///
    /// Runs of three or more quote characters are escaped, as is a trailing
    /// run when the closing delimiter follows on the same line.
    fn escape(&self, text: &str, closes: bool) -> String {
        let q = self.quote_char();
        let chars: Vec<char> = self.escape_backslashes(text).chars().collect();
        let mut out = String::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            if chars[i] != q {
                out.push(chars[i]);
                i += 1;
                continue;
            }
            let run = chars[i..].iter().take_while(|&&c| c == q).count();
            let escape = run >= 3 || (closes && i + run == chars.len());
            for _ in 0..run {
                if escape {
                    out.push('\\');
                }
                out.push(q);
            }
            i += run;
        }
        out
    }

    /// Escape every occurrence of the quote character.
    fn escape_all(&self, text: &str) -> String {
        let q = self.quote_char();
        self.escape_backslashes(text).replace(q, &format!("\\{q}"))
    }
}

/// Renders documentation text into source lines.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatter {
    /// Content shorter than this many characters stays on one line.
    pub single_line_threshold: usize,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            single_line_threshold: 60,
        }
    }
}

impl TextFormatter {
    pub fn new(single_line_threshold: usize) -> Self {
        Self {
            single_line_threshold,
        }
    }

    /// Format `text` as a block opening at `indentation`.
    ///
    /// With `attribute_owner` set the block becomes an
    /// `owner.__doc__ = ...` assignment.
    pub fn format(
        &self,
        text: &str,
        style: &DelimiterStyle,
        indentation: &str,
        attribute_owner: Option<&str>,
    ) -> Vec<String> {
        let lead = attribute_owner
            .map(|owner| format!("{owner}.__doc__ = "))
            .unwrap_or_default();
        let style = style.fitting(text);
        let open = style.opening();
        let close = style.quote;

        let body = trim_blank_lines(text);
        if body.is_empty() {
            return vec![format!("{indentation}{lead}{open}{close}")];
        }

        if let [only] = body.as_slice() {
            let only = only.trim();
            if attribute_owner.is_some() {
                return vec![format!(
                    "{indentation}{lead}{open}{}{close}",
                    style.escape_all(only)
                )];
            }
            if only.chars().count() < self.single_line_threshold {
                return vec![format!(
                    "{indentation}{lead}{open}{}{close}",
                    style.escape(only, true)
                )];
            }
        }

        let margin = body
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.len() - line.trim_start().len())
            .min()
            .unwrap_or(0);

        let mut lines = Vec::with_capacity(body.len() + 2);
        lines.push(format!("{indentation}{lead}{open}"));
        for line in &body {
            if line.trim().is_empty() {
                lines.push(String::new());
            } else {
                let dedented = line.get(margin..).unwrap_or_else(|| line.trim_start());
                lines.push(format!("{indentation}{}", style.escape(dedented.trim_end(), false)));
            }
        }
        lines.push(format!("{indentation}{close}"));
        lines
    }
}

fn trim_blank_lines(text: &str) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.iter().position(|line| !line.trim().is_empty());
    let end = lines.iter().rposition(|line| !line.trim().is_empty());
    match (start, end) {
        (Some(start), Some(end)) => lines[start..=end].to_vec(),
        _ => Vec::new(),
    }
}

/// Line terminator used by `source`.
pub fn detect_newline(source: &str) -> &'static str {
    if source.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}
