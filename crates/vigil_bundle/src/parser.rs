//! Script parsing.
//!
//! A [`ScriptParser`] turns an entrypoint path into its content plus the
//! content of every local file it transitively imports. The built-in
//! [`ImportScanner`] understands ES module and CommonJS import forms.

use crate::error::BundleError;
use crate::runtime::Runtime;
use async_trait::async_trait;
use indexmap::IndexSet;
use logos::Logos;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lexical view of a script, just detailed enough to find module specifiers
///
/// Comments are skipped. String and template literals are single tokens, so
/// text inside them is never mistaken for code.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
enum Token<'src> {
    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice())]
    Ident(&'src str),

    #[regex(r#"'([^'\\\n]|\\.)*'"#, unquote)]
    #[regex(r#""([^"\\\n]|\\.)*""#, unquote)]
    Str(&'src str),

    #[regex(r"`([^`\\]|\\.)*`", unquote)]
    Template(&'src str),

    #[token(".")]
    Dot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token("*")]
    Star,
    #[token(";")]
    Semicolon,
}

fn unquote<'src>(lex: &mut logos::Lexer<'src, Token<'src>>) -> &'src str {
    let slice = lex.slice();
    &slice[1..slice.len() - 1]
}

type Lexeme<'src> = Result<Token<'src>, ()>;

const SCRIPT_EXTENSIONS: &[&str] = &[".ts", ".js", ".mts", ".mjs", ".cts", ".cjs", ".tsx", ".jsx", ".json"];

/// A file and its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute (canonical) path
    pub file_path: PathBuf,
    /// File content
    pub content: String,
}

/// Result of parsing an entrypoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// The entrypoint itself
    pub entrypoint: SourceFile,
    /// Every local file reachable through imports, entrypoint excluded
    pub dependencies: Vec<SourceFile>,
}

/// Parses an entrypoint into its dependency closure
#[async_trait]
pub trait ScriptParser: Send + Sync {
    /// Parse `entrypoint` and all local files it imports
    ///
    /// # Errors
    ///
    /// Returns error if a file cannot be read, a local import cannot be
    /// resolved, or an external package is not supported
    async fn parse(&self, entrypoint: &Path) -> Result<ParsedFile, BundleError>;
}

/// Import scanner for JavaScript and TypeScript
#[derive(Debug, Clone)]
pub struct ImportScanner {
    runtime: Runtime,
}

impl ImportScanner {
    /// Create a scanner accepting the packages of `runtime`
    #[must_use]
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    /// Runtime this scanner checks packages against
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

#[async_trait]
impl ScriptParser for ImportScanner {
    async fn parse(&self, entrypoint: &Path) -> Result<ParsedFile, BundleError> {
        let entry_path = canonical(entrypoint).await?;
        let entry_content = read(&entry_path).await?;

        let mut visited = IndexSet::new();
        visited.insert(entry_path.clone());

        let mut queue = VecDeque::new();
        queue.push_back((entry_path.clone(), entry_content.clone()));

        let mut dependencies = Vec::new();
        let mut unsupported = IndexSet::new();

        while let Some((path, content)) = queue.pop_front() {
            if is_json(&path) {
                continue;
            }
            for specifier in extract_imports(&content) {
                if !is_local(&specifier) {
                    let package = package_name(&specifier);
                    if !self.runtime.provides(package) {
                        unsupported.insert(package.to_string());
                    }
                    continue;
                }

                let resolved = resolve_local(&path, &specifier).await.ok_or_else(|| {
                    BundleError::MissingDependency {
                        importer: path.display().to_string(),
                        specifier: specifier.clone(),
                    }
                })?;
                let resolved = canonical(&resolved).await?;
                if !visited.insert(resolved.clone()) {
                    continue;
                }

                debug!(importer = %path.display(), dependency = %resolved.display(), "resolved local import");
                let dep_content = read(&resolved).await?;
                dependencies.push(SourceFile {
                    file_path: resolved.clone(),
                    content: dep_content.clone(),
                });
                queue.push_back((resolved, dep_content));
            }
        }

        if !unsupported.is_empty() {
            return Err(BundleError::UnsupportedDependencies {
                path: entry_path.display().to_string(),
                packages: unsupported.into_iter().collect(),
            });
        }

        Ok(ParsedFile {
            entrypoint: SourceFile {
                file_path: entry_path,
                content: entry_content,
            },
            dependencies,
        })
    }
}

/// Import specifiers in source order, duplicates removed
#[must_use]
pub fn extract_imports(source: &str) -> Vec<String> {
    let tokens: Vec<Lexeme<'_>> = Token::lexer(source).collect();

    let mut seen = IndexSet::new();
    for (idx, token) in tokens.iter().enumerate() {
        let Ok(Token::Ident(word)) = token else {
            continue;
        };
        // Member access such as `loader.require(...)` or `import.meta`.
        if idx > 0 && matches!(tokens[idx - 1], Ok(Token::Dot)) {
            continue;
        }
        let rest = &tokens[idx + 1..];
        let specifier = match *word {
            "import" => import_specifier(rest),
            "export" => from_clause(rest),
            "require" => call_argument(rest),
            _ => None,
        };
        if let Some(specifier) = specifier {
            seen.insert(specifier.to_string());
        }
    }
    seen.into_iter().collect()
}

/// `import './x'`, `import('./x')` or `import ... from './x'`
fn import_specifier<'src>(rest: &[Lexeme<'src>]) -> Option<&'src str> {
    match rest.first() {
        Some(Ok(Token::Str(specifier))) => Some(*specifier),
        Some(Ok(Token::LParen)) => call_argument(rest),
        _ => from_clause(rest),
    }
}

/// `('./x')` with an optional second argument
fn call_argument<'src>(rest: &[Lexeme<'src>]) -> Option<&'src str> {
    match rest {
        [Ok(Token::LParen), Ok(Token::Str(specifier) | Token::Template(specifier)), Ok(Token::RParen | Token::Comma), ..]
            if !specifier.contains("${") =>
        {
            Some(*specifier)
        }
        _ => None,
    }
}

/// Bindings up to `from './x'`; anything else ends the clause
fn from_clause<'src>(rest: &[Lexeme<'src>]) -> Option<&'src str> {
    for (idx, token) in rest.iter().enumerate() {
        match token {
            Ok(Token::Ident("import" | "export")) => return None,
            Ok(Token::Ident("from")) => {
                if let Some(Ok(Token::Str(specifier))) = rest.get(idx + 1) {
                    return Some(*specifier);
                }
            }
            Ok(Token::Ident(_) | Token::LBrace | Token::RBrace | Token::Comma | Token::Star) => {}
            _ => return None,
        }
    }
    None
}

fn is_local(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Package part of a bare specifier (`@scope/pkg/sub` -> `@scope/pkg`)
fn package_name(specifier: &str) -> &str {
    let mut end = specifier.len();
    let mut slashes = 0;
    let needed = if specifier.starts_with('@') { 2 } else { 1 };
    for (idx, c) in specifier.char_indices() {
        if c == '/' {
            slashes += 1;
            if slashes == needed {
                end = idx;
                break;
            }
        }
    }
    &specifier[..end]
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

async fn resolve_local(importer: &Path, specifier: &str) -> Option<PathBuf> {
    let candidate = match importer.parent() {
        Some(dir) => dir.join(specifier),
        None => PathBuf::from(specifier),
    };

    if is_file(&candidate).await {
        return Some(candidate);
    }

    // TypeScript sources are imported with their emitted `.js` name.
    let emitted = candidate.extension().and_then(|ext| ext.to_str()).and_then(|ext| match ext {
        "js" => Some("ts"),
        "mjs" => Some("mts"),
        "cjs" => Some("cts"),
        "jsx" => Some("tsx"),
        _ => None,
    });
    if let Some(ts_ext) = emitted {
        let swapped = candidate.with_extension(ts_ext);
        if is_file(&swapped).await {
            return Some(swapped);
        }
    }

    for ext in SCRIPT_EXTENSIONS {
        let with_ext = with_suffix(&candidate, ext);
        if is_file(&with_ext).await {
            return Some(with_ext);
        }
    }

    for ext in SCRIPT_EXTENSIONS {
        let index = candidate.join(format!("index{}", ext));
        if is_file(&index).await {
            return Some(index);
        }
    }

    None
}

async fn canonical(path: &Path) -> Result<PathBuf, BundleError> {
    tokio::fs::canonicalize(path)
        .await
        .map_err(|e| BundleError::io(path, e))
}

async fn read(path: &Path) -> Result<String, BundleError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BundleError::io(path, e))
}
