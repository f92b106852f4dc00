use crate::lang::Language;
use crate::results::{Capture, Match, QueryResult, QueryResults};
use crate::ts::errors::{CompileErrorKind, QueryCompileError};
use crate::ts::predicates::{self, extract_predicates, Predicate};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};
use tree_sitter::{Node, Query, QueryCursor, StreamingIterator};

/// A named query as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub name: String,
    pub query: String,
}

impl QueryDefinition {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
        }
    }
}

/// A query compiled against one grammar, with its predicates lifted out and
/// grouped by the pattern they belong to.
pub struct CompiledQuery {
    name: String,
    query: Query,
    predicates: Vec<Vec<Predicate>>,
}

impl CompiledQuery {
    /// Compile a query's pattern text for `language`.
    ///
    /// # Query Syntax
    ///
    /// Tree-sitter S-expression patterns with trailing predicates:
    /// ```text
    /// ((identifier) @left
    ///  (identifier) @right
    ///  (#eq? @left @right))
    /// ```
    pub fn compile(language: Language, definition: &QueryDefinition) -> Result<Self, QueryCompileError> {
        let name = definition.name.as_str();
        let text = definition.query.as_str();

        let result = Self::compile_inner(language, name, text);
        if let Err(e) = &result {
            error!(query = name, line = e.line, kind = %e.kind, "query failed to compile");
        }
        result
    }

    fn compile_inner(language: Language, name: &str, text: &str) -> Result<Self, QueryCompileError> {
        let extracted = extract_predicates(text).map_err(|e| {
            QueryCompileError::at_offset(name, text, e.offset, CompileErrorKind::Syntax, e.message)
        })?;

        let query = Query::new(&language.grammar(), &extracted.pattern_text).map_err(|e| {
            QueryCompileError::at_offset(name, text, e.offset, e.kind.into(), e.message)
        })?;

        let mut predicates: Vec<Vec<Predicate>> = vec![Vec::new(); query.pattern_count()];
        for expr in &extracted.predicates {
            let fail = |kind, message: String| {
                QueryCompileError::at_offset(name, text, expr.offset, kind, message)
            };

            let pattern = (0..query.pattern_count())
                .rev()
                .find(|&i| query.start_byte_for_pattern(i) <= expr.offset)
                .ok_or_else(|| {
                    fail(
                        CompileErrorKind::Predicate,
                        format!("predicate #{} is outside of any pattern", expr.operator),
                    )
                })?;

            if let Some(unknown) = expr
                .capture_names()
                .find(|capture| query.capture_index_for_name(capture).is_none())
            {
                return Err(fail(
                    CompileErrorKind::Capture,
                    format!("invalid capture name @{unknown}"),
                ));
            }

            let predicate = Predicate::compile(expr).map_err(|(kind, message)| fail(kind, message))?;
            if !predicate.is_supported() {
                warn!(
                    query = name,
                    operator = %expr.operator,
                    "unsupported predicate operator; captures pass through unfiltered"
                );
            }
            predicates[pattern].push(predicate);
        }

        debug!(
            query = name,
            language = language.name(),
            patterns = query.pattern_count(),
            predicates = extracted.predicates.len(),
            "compiled query"
        );

        Ok(Self {
            name: name.to_string(),
            query,
            predicates,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capture names defined in the query.
    pub fn capture_names(&self) -> &[&str] {
        self.query.capture_names()
    }

    /// Run the query from `root` and collect every surviving match.
    pub fn execute(&self, root: Node<'_>, source: &[u8]) -> QueryResult {
        let names = self.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, root, source);
        let mut found = Vec::new();

        // tree-sitter 0.25+ uses StreamingIterator
        while let Some(m) = matches.next() {
            if m.captures.is_empty() {
                continue;
            }

            let raw: Vec<Capture> = m
                .captures
                .iter()
                .map(|c| Capture::from_node(names[c.index as usize], c.node, source))
                .collect();

            if tracing::enabled!(tracing::Level::TRACE) {
                let mut preliminary = Match::new();
                for capture in &raw {
                    preliminary.insert_replacing(capture.clone());
                }
                let texts: Vec<_> = preliminary
                    .captures()
                    .map(|c| format!("{}={:?}", c.name, c.text))
                    .collect();
                trace!(query = %self.name, pattern = m.pattern_index, captures = ?texts, "raw match");
            }

            let kept = predicates::apply(&self.predicates[m.pattern_index], &raw);
            if kept.is_empty() {
                continue;
            }

            found.push(kept.into_iter().cloned().collect::<Match>());
        }

        QueryResult::new(self.name.clone(), found)
    }
}

/// Every query of one run, compiled for one language.
pub struct QuerySet {
    language: Language,
    queries: Vec<CompiledQuery>,
}

impl QuerySet {
    /// Compile all definitions, stopping at the first failure.
    pub fn compile(language: Language, definitions: &[QueryDefinition]) -> Result<Self, QueryCompileError> {
        let queries = definitions
            .iter()
            .map(|definition| CompiledQuery::compile(language, definition))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { language, queries })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledQuery> {
        self.queries.iter()
    }

    /// Run every query against one parsed file.
    pub fn execute(&self, root: Node<'_>, source: &[u8]) -> QueryResults {
        self.iter()
            .map(|query| query.execute(root, source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::parser::SourceParser;

    fn rust() -> Language {
        Language::from_name("rust").unwrap()
    }

    fn run(language: Language, query: &str, source: &str) -> QueryResult {
        let compiled = CompiledQuery::compile(language, &QueryDefinition::new("q", query)).unwrap();
        let mut parser = SourceParser::new(language).unwrap();
        let parsed = parser.parse_source(source.as_bytes().to_vec()).unwrap();
        compiled.execute(parsed.root_node(), &parsed.source)
    }

    #[test]
    fn collects_captures_with_positions() {
        let result = run(
            rust(),
            "(function_item name: (identifier) @name) @function",
            "fn helper() {}\n\nfn main() {}\n",
        );

        assert_eq!(result.query_name, "q");
        assert_eq!(result.len(), 2);

        let second = &result.matches[1];
        let name = second.get("name").unwrap();
        assert_eq!(name.text, "main");
        assert_eq!(name.kind, "identifier");
        assert_eq!(name.start_point.row, 2);
        assert_eq!(name.start_point.column, 3);
        assert_eq!(second.get("function").unwrap().kind, "function_item");
    }

    #[test]
    fn predicates_apply_per_pattern() {
        let query = r#"
((function_item name: (identifier) @fn) (#eq? @fn "main"))
((struct_item name: (type_identifier) @ty))
"#;
        let result = run(rust(), query, "fn main() {}\nfn other() {}\nstruct S;\n");

        let captured: Vec<_> = result
            .matches
            .iter()
            .flat_map(|m| m.captures().map(|c| c.text.clone()).collect::<Vec<_>>())
            .collect();
        assert_eq!(captured, vec!["main", "S"]);
    }

    #[test]
    fn builtin_predicate_handling_is_bypassed() {
        // left and right differ, so only the inequality holds
        let query = "(let_declaration pattern: (identifier) @l value: (identifier) @r (#not-eq? @l @r))";
        let result = run(rust(), query, "fn f() { let a = b; let c = c; }");
        assert_eq!(result.len(), 1);
        assert_eq!(result.matches[0].get("l").unwrap().text, "a");
    }

    #[test]
    fn unknown_capture_in_predicate_is_reported() {
        let err = CompiledQuery::compile(
            rust(),
            &QueryDefinition::new("bad", "((identifier) @a\n (#eq? @zzz \"x\"))"),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind, CompileErrorKind::Capture);
        assert_eq!(err.line, 2);
        assert_eq!(err.query, "bad");
    }

    #[test]
    fn invalid_node_type_reports_line() {
        let err = CompiledQuery::compile(
            rust(),
            &QueryDefinition::new("broken", "(function_item)\n(no_such_node)"),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind, CompileErrorKind::NodeType);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn query_set_keys_results_by_name() {
        let set = QuerySet::compile(
            rust(),
            &[
                QueryDefinition::new("fns", "(function_item) @f"),
                QueryDefinition::new("structs", "(struct_item) @s"),
            ],
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        let names: Vec<_> = set.iter().map(|q| (q.name(), q.capture_names().to_vec())).collect();
        assert_eq!(names, vec![("fns", vec!["f"]), ("structs", vec!["s"])]);

        let mut parser = SourceParser::new(rust()).unwrap();
        let parsed = parser.parse_source(b"fn a() {}\nfn b() {}\n".to_vec()).unwrap();
        let results = set.execute(parsed.root_node(), &parsed.source);

        assert_eq!(results.get("fns").unwrap().len(), 2);
        assert!(results.get("structs").unwrap().is_empty());
    }
}
