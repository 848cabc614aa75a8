//! Well-formedness check for modified artifacts.
//!
//! Structured formats are parsed with their real parsers. Source files get a
//! delimiter-balance scan that understands string literals and comments.
//! Unknown file types pass.

use std::path::Path;

/// Comment syntax of a source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentStyle {
    /// `# ...`
    Hash,
    /// `// ...` and `/* ... */`
    Slash,
}

/// Language family inferred from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Toml,
    Source {
        comments: CommentStyle,
        /// `'` delimits strings (false where it marks lifetimes/chars).
        single_quote_strings: bool,
    },
    Unchecked,
}

fn format_of(path: &str) -> Format {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" => Format::Json,
        "yaml" | "yml" => Format::Yaml,
        "toml" => Format::Toml,
        "py" | "rb" | "sh" | "bash" => Format::Source {
            comments: CommentStyle::Hash,
            single_quote_strings: true,
        },
        "js" | "jsx" | "ts" | "tsx" | "java" | "kt" | "go" | "c" | "h" | "cpp" | "cs" | "swift"
        | "php" => Format::Source {
            comments: CommentStyle::Slash,
            single_quote_strings: true,
        },
        "rs" => Format::Source {
            comments: CommentStyle::Slash,
            single_quote_strings: false,
        },
        _ => Format::Unchecked,
    }
}

/// Checks that `contents` is a well-formed artifact for `path`.
///
/// Returns a description of the first problem found.
pub fn check_well_formed(path: &str, contents: &str) -> Result<(), String> {
    if contents.trim().is_empty() {
        return Err(format!("{} is empty", path));
    }

    match format_of(path) {
        Format::Json => serde_json::from_str::<serde_json::Value>(contents)
            .map(|_| ())
            .map_err(|e| format!("{}: invalid JSON: {}", path, e)),
        Format::Yaml => serde_yaml::from_str::<serde_yaml::Value>(contents)
            .map(|_| ())
            .map_err(|e| format!("{}: invalid YAML: {}", path, e)),
        Format::Toml => toml::from_str::<toml::Table>(contents)
            .map(|_| ())
            .map_err(|e| format!("{}: invalid TOML: {}", path, e)),
        Format::Source {
            comments,
            single_quote_strings,
        } => check_delimiters(contents, comments, single_quote_strings)
            .map_err(|e| format!("{}: {}", path, e)),
        Format::Unchecked => Ok(()),
    }
}

fn closing_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn check_delimiters(
    contents: &str,
    comments: CommentStyle,
    single_quote_strings: bool,
) -> Result<(), String> {
    let chars: Vec<char> = contents.chars().collect();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut line = 1usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '\n' => line += 1,
            '#' if comments == CommentStyle::Hash => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if comments == CommentStyle::Slash && next == Some('/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if comments == CommentStyle::Slash && next == Some('*') => {
                let start = line;
                i += 2;
                loop {
                    match chars.get(i) {
                        None => return Err(format!("unterminated block comment opened on line {}", start)),
                        Some('*') if chars.get(i + 1) == Some(&'/') => {
                            i += 2;
                            break;
                        }
                        Some('\n') => line += 1,
                        Some(_) => {}
                    }
                    i += 1;
                }
                continue;
            }
            '\'' if !single_quote_strings => {
                // Char literal ('x' or '\n'); anything else is a lifetime.
                if chars.get(i + 2) == Some(&'\'') && next != Some('\\') {
                    i += 3;
                    continue;
                }
                if next == Some('\\') {
                    let mut j = i + 2;
                    while j < chars.len() && chars[j] != '\'' && chars[j] != '\n' {
                        j += 1;
                    }
                    i = j + 1;
                    continue;
                }
            }
            '"' | '\'' | '`' => {
                let quote = c;
                let start = line;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(format!("unterminated string opened on line {}", start)),
                        Some('\\') => i += 1,
                        Some(q) if *q == quote => break,
                        Some('\n') => line += 1,
                        Some(_) => {}
                    }
                    i += 1;
                }
            }
            '(' | '[' | '{' => stack.push((c, line)),
            ')' | ']' | '}' => match stack.pop() {
                Some((open, _)) if closing_for(open) == c => {}
                Some((open, opened)) => {
                    return Err(format!(
                        "line {}: '{}' closes '{}' opened on line {}",
                        line, c, open, opened
                    ))
                }
                None => return Err(format!("line {}: unmatched '{}'", line, c)),
            },
            _ => {}
        }
        i += 1;
    }

    match stack.pop() {
        Some((open, opened)) => Err(format!("'{}' opened on line {} is never closed", open, opened)),
        None => Ok(()),
    }
}
