//! Template rendering for command output and parameterised query texts.

use crate::ts::QueryDefinition;
use minijinja::Environment;
use serde::Serialize;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to render query {name}: {source}")]
    Query {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("failed to render template: {0}")]
    Template(#[from] minijinja::Error),
}

/// Render a one-off template against any serializable context.
pub fn render_template<S: Serialize>(template: &str, context: S) -> Result<String, RenderError> {
    let env = Environment::new();
    Ok(env.render_str(template, context)?)
}

/// Query texts that may still contain template parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTemplates {
    queries: Vec<QueryDefinition>,
}

impl QueryTemplates {
    pub fn new(queries: Vec<QueryDefinition>) -> Self {
        Self { queries }
    }

    pub fn definitions(&self) -> &[QueryDefinition] {
        &self.queries
    }

    /// Render every query with `params` into a new set.
    ///
    /// Queries whose rendered text is blank are dropped, so parameters can
    /// switch whole queries off.
    pub fn render<S: Serialize>(&self, params: S) -> Result<RenderedQueries, RenderError> {
        let env = Environment::new();
        let context = minijinja::Value::from_serialize(&params);

        let mut rendered = Vec::with_capacity(self.queries.len());
        for query in &self.queries {
            let text = env
                .render_str(&query.query, &context)
                .map_err(|source| RenderError::Query {
                    name: query.name.clone(),
                    source,
                })?;
            if text.trim().is_empty() {
                continue;
            }
            rendered.push(QueryDefinition::new(query.name.clone(), text));
        }

        Ok(RenderedQueries { queries: rendered })
    }
}

/// Queries after parameter substitution. There is no way back to
/// [`QueryTemplates`], so a set cannot be rendered twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedQueries {
    queries: Vec<QueryDefinition>,
}

impl RenderedQueries {
    pub fn definitions(&self) -> &[QueryDefinition] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn into_definitions(self) -> Vec<QueryDefinition> {
        self.queries
    }

    /// Print the queries as a YAML list of `{name, query}`.
    pub fn write_yaml(&self, w: &mut dyn Write) -> Result<(), serde_yaml::Error> {
        serde_yaml::to_writer(w, &self.queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_parameters_into_queries() {
        let templates = QueryTemplates::new(vec![
            QueryDefinition::new(
                "named",
                "((identifier) @id (#eq? @id \"{{ name }}\"))",
            ),
            QueryDefinition::new("optional", "{% if extra %}(comment) @c{% endif %}"),
        ]);

        let rendered = templates.render(json!({"name": "main", "extra": false})).unwrap();
        assert_eq!(rendered.len(), 1);
        assert_eq!(
            rendered.definitions()[0].query,
            "((identifier) @id (#eq? @id \"main\"))"
        );

        // the templates themselves are untouched and can be rendered again
        let again = templates.render(json!({"name": "x", "extra": true})).unwrap();
        assert_eq!(again.len(), 2);
        assert_eq!(templates.definitions()[0].query, "((identifier) @id (#eq? @id \"{{ name }}\"))");
    }

    #[test]
    fn broken_query_template_names_query() {
        let templates = QueryTemplates::new(vec![QueryDefinition::new("bad", "{% if %}")]);
        let err = templates.render(json!({})).unwrap_err();
        assert!(matches!(err, RenderError::Query { ref name, .. } if name == "bad"));
    }

    #[test]
    fn writes_queries_as_yaml() {
        let rendered = QueryTemplates::new(vec![QueryDefinition::new("q", "(x) @x")])
            .render(json!({}))
            .unwrap();
        let mut out = Vec::new();
        rendered.write_yaml(&mut out).unwrap();
        let back: Vec<QueryDefinition> = serde_yaml::from_slice(&out).unwrap();
        assert_eq!(back, rendered.into_definitions());
    }

    #[test]
    fn renders_templates() {
        let out = render_template("{{ items | join(\",\") }}", json!({"items": ["a", "b"]})).unwrap();
        assert_eq!(out, "a,b");
    }
}
