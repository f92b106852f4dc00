use crate::lang::Language;
use crate::ts::QueryDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// A reusable query command loaded from YAML.
///
/// ```yaml
/// name: functions
/// short: List function names
/// language: go
/// flags:
///   - name: prefix
///     type: string
///     default: ""
/// queries:
///   - name: functions
///     query: |
///       ((function_declaration name: (identifier) @name)
///        (#match? @name "^{{ prefix }}"))
/// template: |
///   {% for m in Results.functions.matches %}{{ m.name.text }}
///   {% endfor %}
/// ```
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct CommandDescription {
    pub name: String,
    #[serde(default)]
    pub short: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub long: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub queries: Vec<QueryDefinition>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<FlagDefinition>,
}

impl CommandDescription {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                query: None,
                field: "name",
            });
        }

        if self.queries.is_empty() {
            issues.push(ValidationIssue::EmptyQueryList);
        }

        let mut seen = HashSet::new();
        for query in &self.queries {
            if query.name.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    query: None,
                    field: "queries.name",
                });
            } else if !seen.insert(query.name.as_str()) {
                issues.push(ValidationIssue::DuplicateQuery {
                    name: query.name.clone(),
                });
            }
            if query.query.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    query: Some(query.name.clone()),
                    field: "query",
                });
            }
        }

        if let Some(language) = &self.language {
            if Language::from_name(language).is_err() {
                issues.push(ValidationIssue::UnknownLanguage {
                    language: language.clone(),
                });
            }
        }

        let mut flag_names = HashSet::new();
        for flag in &self.flags {
            if flag.name.trim().is_empty() {
                issues.push(ValidationIssue::InvalidFlag {
                    flag: None,
                    message: "missing name".to_string(),
                });
                continue;
            }
            if !flag_names.insert(flag.name.as_str()) {
                issues.push(ValidationIssue::InvalidFlag {
                    flag: Some(flag.name.clone()),
                    message: "declared more than once".to_string(),
                });
            }
            if flag.kind == FlagType::Choice && flag.choices.is_empty() {
                issues.push(ValidationIssue::InvalidFlag {
                    flag: Some(flag.name.clone()),
                    message: "choice flag without choices".to_string(),
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn flag(&self, name: &str) -> Option<&FlagDefinition> {
        self.flags.iter().find(|flag| flag.name == name)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FlagType {
    #[default]
    String,
    StringList,
    Int,
    Float,
    Bool,
    Choice,
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlagType::String => "string",
            FlagType::StringList => "string-list",
            FlagType::Int => "int",
            FlagType::Float => "float",
            FlagType::Bool => "bool",
            FlagType::Choice => "choice",
        };
        f.write_str(name)
    }
}

/// A parameter of a command, available to query texts and the template.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FlagDefinition {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: FlagType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

impl FlagDefinition {
    /// Convert raw command-line values into a typed value.
    ///
    /// List flags accept repeated values and comma-separated values; every
    /// other type takes the last value given.
    pub fn parse_value(&self, raw: &[String]) -> Result<Value, String> {
        if self.kind == FlagType::StringList {
            let items = raw
                .iter()
                .flat_map(|value| value.split(','))
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect();
            return Ok(Value::Array(items));
        }

        let Some(value) = raw.last() else {
            return Err(format!("flag '{}' has no value", self.name));
        };
        let invalid = || format!("flag '{}' expects {}, got '{value}'", self.name, self.kind);

        match self.kind {
            FlagType::String => Ok(Value::String(value.clone())),
            FlagType::Int => value
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid()),
            FlagType::Float => value
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| invalid()),
            FlagType::Bool => match value.trim().to_ascii_lowercase().as_str() {
                "" | "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            FlagType::Choice => {
                if self.choices.iter().any(|choice| choice == value) {
                    Ok(Value::String(value.clone()))
                } else {
                    Err(format!(
                        "flag '{}' must be one of [{}], got '{value}'",
                        self.name,
                        self.choices.join(", ")
                    ))
                }
            }
            FlagType::StringList => Err(invalid()),
        }
    }

    /// Value used when the flag is not given on the command line.
    pub fn default_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        match self.kind {
            FlagType::StringList => Value::Array(Vec::new()),
            FlagType::Bool => Value::Bool(false),
            _ => Value::Null,
        }
    }
}

/// Every problem found in a command, one per line when displayed.
#[derive(Error, Debug, Clone)]
#[error("{}", join_lines(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn join_lines(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyQueryList,
    MissingField {
        query: Option<String>,
        field: &'static str,
    },
    DuplicateQuery {
        name: String,
    },
    UnknownLanguage {
        language: String,
    },
    InvalidFlag {
        flag: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyQueryList => write!(f, "command contains no queries"),
            ValidationIssue::MissingField { query, field } => match query {
                Some(name) => write!(f, "query '{name}' missing required field '{field}'"),
                None => write!(f, "command missing required field '{field}'"),
            },
            ValidationIssue::DuplicateQuery { name } => {
                write!(f, "query name '{name}' is used more than once")
            }
            ValidationIssue::UnknownLanguage { language } => {
                write!(f, "unsupported language '{language}'")
            }
            ValidationIssue::InvalidFlag { flag, message } => match flag {
                Some(name) => write!(f, "flag '{name}' is invalid: {message}"),
                None => write!(f, "invalid flag: {message}"),
            },
        }
    }
}
