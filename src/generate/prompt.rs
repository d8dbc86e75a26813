use crate::config::FormattingConfig;
use crate::model::{DocKind, DocumentationRecord};

const DEFAULT_PREAMBLE: &str = "\
You are improving Python docstrings for clarity and precision.

Priorities, in order:
1. Improve the accuracy and readability of the existing text.
2. Keep every piece of existing information.
3. Use the imperative mood (\"Compute\", not \"Computes\").
4. Use consistent, precise terminology.

Never remove information, references or citations. Never modify Examples
sections or code blocks. Keep reStructuredText roles such as :math:, :param:
and :attr: working, and keep *emphasis* markers intact. Do not bring in
content that belongs to other functions or classes.";

const MULTI_LINE_RULES: &str = "\
Formatting:
- Wrap lines at {width} characters at most; {indent} columns of indentation are already accounted for.
- Do not indent any line.
- Use the full width when wrapping.
- Keep Examples sections exactly as they are.";

const SINGLE_LINE_RULES: &str = "\
Formatting:
- A single line of at most {width} characters (indentation already accounted for).
- Do not indent the line.";

const REPLY_FORMAT: &str = "\
Respond with the improved docstring in a reStructuredText code block, followed by a brief explanation, exactly like this:

Improved Docstring

```reStructuredText
improved docstring content
```

Explanation

```text
brief explanation of the changes
```

The docstring content must not include the surrounding quotes. \
Write backslashes once, as they should read in the rendered text (e.g. :math:`\\lambda`); \
they are escaped when the docstring is written back.";

/// Prompt shape for one family of declarations.
#[derive(Debug, PartialEq, Eq)]
pub struct Template {
    pub heading: &'static str,
    pub closing: &'static str,
    pub single_line: bool,
    pub shows_parent: bool,
}

static MODULE: Template = Template {
    heading: "MODULE TO IMPROVE",
    closing: "Return only the improved module docstring. Describe the module's purpose and key components.",
    single_line: false,
    shows_parent: false,
};

static CLASS: Template = Template {
    heading: "CLASS TO IMPROVE",
    closing: "Return only the improved docstring. Focus on the class purpose and key functionality.",
    single_line: false,
    shows_parent: false,
};

static FUNCTION: Template = Template {
    heading: "FUNCTION TO IMPROVE",
    closing: "Return only the improved docstring. Keep it focused, concise and appropriately sized.",
    single_line: false,
    shows_parent: false,
};

static METHOD: Template = Template {
    heading: "METHOD TO IMPROVE",
    closing: "Return only the improved docstring. Keep it concise and relevant to the method's role.",
    single_line: false,
    shows_parent: true,
};

static PROPERTY: Template = Template {
    heading: "PROPERTY TO IMPROVE",
    closing: "Return only the improved docstring. Focus on what the property represents.",
    single_line: false,
    shows_parent: false,
};

static MODULE_ATTRIBUTE: Template = Template {
    heading: "MODULE ATTRIBUTE TO DOCUMENT",
    closing: "Return a single-line docstring describing the attribute's purpose.",
    single_line: true,
    shows_parent: false,
};

impl Template {
    pub fn for_kind(kind: DocKind) -> &'static Template {
        match kind {
            DocKind::Module => &MODULE,
            DocKind::Class => &CLASS,
            DocKind::Function | DocKind::AsyncFunction | DocKind::NestedFunction => &FUNCTION,
            DocKind::Method | DocKind::AsyncMethod | DocKind::StaticMethod | DocKind::ClassMethod => {
                &METHOD
            }
            DocKind::Property => &PROPERTY,
            DocKind::ModuleAttribute => &MODULE_ATTRIBUTE,
        }
    }
}

/// Indentation the rewritten block is expected to carry.
///
/// Module docstrings sit at column zero. Otherwise the first `def`/`class`
/// line of the context gives the base, plus one level.
pub fn indentation_for(record: &DocumentationRecord, unit: &str) -> String {
    if record.kind == DocKind::Module {
        return String::new();
    }
    record
        .context_text
        .lines()
        .find(|line| {
            let stripped = line.trim_start();
            stripped.starts_with("def ")
                || stripped.starts_with("class ")
                || stripped.starts_with("async def ")
        })
        .map(|line| {
            let base = &line[..line.len() - line.trim_start().len()];
            format!("{base}{unit}")
        })
        .unwrap_or_else(|| unit.to_string())
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    preamble: String,
    line_length: usize,
    indent_unit: String,
}

impl PromptBuilder {
    pub fn new(formatting: &FormattingConfig, preamble: Option<&str>) -> Self {
        Self {
            preamble: preamble.unwrap_or(DEFAULT_PREAMBLE).trim().to_string(),
            line_length: formatting.line_length,
            indent_unit: formatting.indentation.clone(),
        }
    }

    pub fn render(&self, record: &DocumentationRecord) -> String {
        let template = Template::for_kind(record.kind);
        let indent = indentation_for(record, &self.indent_unit).chars().count();
        let width = self.line_length.saturating_sub(indent).max(1);

        let rules = if template.single_line {
            SINGLE_LINE_RULES
        } else {
            MULTI_LINE_RULES
        };
        let rules = rules
            .replace("{width}", &width.to_string())
            .replace("{indent}", &indent.to_string());

        let mut prompt = String::new();
        prompt.push_str(&self.preamble);
        prompt.push_str("\n\n");
        prompt.push_str(&rules);
        prompt.push_str("\n\n");
        if template.shows_parent {
            if let Some(parent) = &record.parent_name {
                prompt.push_str(&format!("Parent class: {parent}\n\n"));
            }
        }
        prompt.push_str(&format!("{}:\n{}\n\n", template.heading, record.context_text));
        prompt.push_str(&format!("Current docstring:\n{}\n\n", record.content));
        prompt.push_str(template.closing);
        if !template.single_line {
            prompt.push_str(&format!("\nEnsure every line respects the {width}-character limit."));
        }
        prompt.push_str("\n\n");
        prompt.push_str(REPLY_FORMAT);
        prompt.push('\n');
        prompt
    }
}
