use crate::ts::errors::TreeSitterError;
use ast_grep_language::{LanguageExt, SupportLang};
use tree_sitter::{Node, Parser, Tree};

/// Tree-sitter parser wrapper for Python source code.
pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    /// Create a new Python parser.
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut parser = Parser::new();
        // Get the tree-sitter Language from ast-grep-language
        let ts_lang = SupportLang::Python.get_ts_language();
        parser
            .set_language(&ts_lang)
            .map_err(|_| TreeSitterError::LanguageSet)?;

        Ok(Self { parser })
    }

    /// Parse source code into a tree-sitter Tree.
    pub fn parse(&mut self, source: &str) -> Result<Tree, TreeSitterError> {
        self.parser
            .parse(source, None)
            .ok_or(TreeSitterError::ParseFailed)
    }

    /// Parse source code and return the tree along with the source.
    pub fn parse_with_source<'a>(
        &mut self,
        source: &'a str,
    ) -> Result<ParsedSource<'a>, TreeSitterError> {
        let tree = self.parse(source)?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource<'a> {
    pub source: &'a str,
    pub tree: Tree,
}

impl<'a> ParsedSource<'a> {
    /// Get the root node of the tree.
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Get all ERROR nodes in the tree.
    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        let mut errors = Vec::new();
        collect_error_nodes(self.tree.root_node(), &mut errors);
        errors
    }

    /// The first syntax error, as a 1-based line/column error.
    pub fn first_error(&self) -> Option<TreeSitterError> {
        self.error_nodes()
            .into_iter()
            .min_by_key(|e| e.byte_start)
            .map(|e| TreeSitterError::SyntaxError {
                line: e.start_point.row + 1,
                column: e.start_point.column + 1,
            })
    }

    /// Extract text for a node's byte range.
    pub fn node_text(&self, node: Node<'_>) -> &'a str {
        &self.source[node.byte_range()]
    }

    /// Source lines without terminators, in the same numbering as tree rows.
    pub fn lines(&self) -> Vec<&'a str> {
        self.source
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect()
    }
}

/// Information about an ERROR node in the parse tree.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    pub byte_start: usize,
    pub byte_end: usize,
    pub start_point: tree_sitter::Point,
    pub end_point: tree_sitter::Point,
}

fn collect_error_nodes(node: Node<'_>, errors: &mut Vec<ErrorNode>) {
    if node.is_error() || node.is_missing() {
        errors.push(ErrorNode {
            byte_start: node.start_byte(),
            byte_end: node.end_byte(),
            start_point: node.start_position(),
            end_point: node.end_position(),
        });
    }

    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, errors);
    }
}

/// Named children of `node`, skipping comments.
pub fn statements<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect()
}

/// The definition wrapped by a `decorated_definition`, or the node itself.
pub fn unwrap_decorated(node: Node<'_>) -> Node<'_> {
    if node.kind() == "decorated_definition" {
        if let Some(definition) = node.child_by_field_name("definition") {
            return definition;
        }
    }
    node
}

/// Name of a `function_definition` or `class_definition`.
pub fn definition_name<'a>(node: Node<'_>, source: &'a str) -> Option<&'a str> {
    node.child_by_field_name("name")
        .map(|name| &source[name.byte_range()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_python() {
        let mut parser = PythonParser::new().unwrap();
        let source = "def main():\n    print(\"hello\")\n";
        let parsed = parser.parse_with_source(source).unwrap();

        assert!(!parsed.has_errors());
        assert_eq!(parsed.root_node().kind(), "module");
    }

    #[test]
    fn parse_invalid_python() {
        let mut parser = PythonParser::new().unwrap();
        let source = "def main(:\n    pass\n";
        let parsed = parser.parse_with_source(source).unwrap();

        assert!(parsed.has_errors());
        assert!(!parsed.error_nodes().is_empty());
        assert!(matches!(
            parsed.first_error(),
            Some(TreeSitterError::SyntaxError { line: 1, .. })
        ));
    }

    #[test]
    fn statements_skip_comments() {
        let mut parser = PythonParser::new().unwrap();
        let source = "def f():\n    # note\n    \"\"\"Doc.\"\"\"\n    return 1\n";
        let parsed = parser.parse_with_source(source).unwrap();

        let function = statements(parsed.root_node())[0];
        let body = function.child_by_field_name("body").unwrap();
        let first = statements(body)[0];
        assert_eq!(first.kind(), "expression_statement");
        assert_eq!(parsed.node_text(first), "\"\"\"Doc.\"\"\"");
    }

    #[test]
    fn decorated_definitions_unwrap() {
        let mut parser = PythonParser::new().unwrap();
        let source = "@property\ndef value(self):\n    return 1\n";
        let parsed = parser.parse_with_source(source).unwrap();

        let decorated = statements(parsed.root_node())[0];
        assert_eq!(decorated.kind(), "decorated_definition");
        let function = unwrap_decorated(decorated);
        assert_eq!(function.kind(), "function_definition");
        assert_eq!(definition_name(function, source), Some("value"));
    }
}
