//! Language catalog backed by the grammars bundled in ast-grep-language.
//!
//! Maps user-facing language names (and a few aliases) to tree-sitter
//! grammars, source file names to languages, and languages to the default
//! globs used when recursing into directories.

use ast_grep_language::{LanguageExt, SupportLang};
use globset::{Glob, GlobMatcher};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LanguageError {
    #[error("unsupported language name: {name}")]
    UnknownName { name: String },

    #[error("unsupported file name: {path}")]
    UnknownFile { path: String },
}

/// A language known to the query engine.
#[derive(Debug, Clone, Copy)]
pub struct Language {
    name: &'static str,
    grammar: SupportLang,
    file_patterns: &'static [&'static str],
}

const CATALOG: &[Language] = &[
    Language::new("bash", SupportLang::Bash, &["*.sh", "*.bash"]),
    Language::new("c", SupportLang::C, &["*.c"]),
    Language::new("cpp", SupportLang::Cpp, &["*.cpp", "*.cc", "*.h", "*.hpp"]),
    Language::new("csharp", SupportLang::CSharp, &["*.cs"]),
    Language::new("css", SupportLang::Css, &["*.css"]),
    Language::new("elixir", SupportLang::Elixir, &["*.ex", "*.exs"]),
    Language::new("go", SupportLang::Go, &["*.go"]),
    Language::new("haskell", SupportLang::Haskell, &["*.hs"]),
    Language::new("html", SupportLang::Html, &["*.html", "*.htm"]),
    Language::new("java", SupportLang::Java, &["*.java"]),
    Language::new("javascript", SupportLang::JavaScript, &["*.js", "*.jsx", "*.mjs"]),
    Language::new("json", SupportLang::Json, &["*.json"]),
    Language::new("kotlin", SupportLang::Kotlin, &["*.kt", "*.kts"]),
    Language::new("lua", SupportLang::Lua, &["*.lua"]),
    Language::new("php", SupportLang::Php, &["*.php"]),
    Language::new("python", SupportLang::Python, &["*.py"]),
    Language::new("ruby", SupportLang::Ruby, &["*.rb"]),
    Language::new("rust", SupportLang::Rust, &["*.rs"]),
    Language::new("scala", SupportLang::Scala, &["*.scala"]),
    Language::new("swift", SupportLang::Swift, &["*.swift"]),
    Language::new("typescript", SupportLang::TypeScript, &["*.ts"]),
    Language::new("tsx", SupportLang::Tsx, &["*.tsx"]),
    Language::new("yaml", SupportLang::Yaml, &["*.yml", "*.yaml"]),
];

const ALIASES: &[(&str, &str)] = &[
    ("golang", "go"),
    ("sh", "bash"),
    ("c++", "cpp"),
    ("cs", "csharp"),
    ("js", "javascript"),
    ("py", "python"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("ts", "typescript"),
    ("yml", "yaml"),
];

impl Language {
    const fn new(
        name: &'static str,
        grammar: SupportLang,
        file_patterns: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            grammar,
            file_patterns,
        }
    }

    /// Look up a language by name or alias.
    pub fn from_name(name: &str) -> Result<Self, LanguageError> {
        let lowered = name.trim().to_ascii_lowercase();
        let canonical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == lowered)
            .map_or(lowered.as_str(), |(_, target)| *target);

        CATALOG
            .iter()
            .find(|lang| lang.name == canonical)
            .copied()
            .ok_or_else(|| LanguageError::UnknownName {
                name: name.to_string(),
            })
    }

    /// Detect the language of a file from its base name.
    pub fn for_path(path: impl AsRef<Path>) -> Result<Self, LanguageError> {
        let path = path.as_ref();
        let base = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        CATALOG
            .iter()
            .find(|lang| {
                lang.file_patterns
                    .iter()
                    .filter_map(|pattern| compile_pattern(pattern))
                    .any(|matcher| matcher.is_match(&base))
            })
            .copied()
            .ok_or_else(|| LanguageError::UnknownFile {
                path: path.display().to_string(),
            })
    }

    /// All languages in catalog order.
    pub fn all() -> &'static [Language] {
        CATALOG
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The tree-sitter grammar for this language.
    pub fn grammar(&self) -> tree_sitter::Language {
        self.grammar.get_ts_language()
    }

    /// Recursive globs matching every source file of this language.
    pub fn default_globs(&self) -> Vec<String> {
        self.file_patterns
            .iter()
            .map(|pattern| format!("**/{pattern}"))
            .collect()
    }
}

impl PartialEq for Language {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Language {}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for Language {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

fn compile_pattern(pattern: &str) -> Option<GlobMatcher> {
    Glob::new(pattern).ok().map(|glob| glob.compile_matcher())
}

/// Default globs for a language given by name.
pub fn default_globs(name: &str) -> Result<Vec<String>, LanguageError> {
    Language::from_name(name).map(|lang| lang.default_globs())
}
