//! Lightweight statement-type checks on raw SQL text.
//!
//! This is not a parser. A small lexer skips string literals, quoted identifiers
//! and comments, tracks parenthesis depth and splits on `;`. That is enough to
//! reject anything that is not a single read-only statement before it reaches the
//! engine, and to spot a top-level ORDER BY in a reference query.

use crate::error::RunnerError;

const ALLOWED_LEADING: &[&str] = &["select", "with", "values"];

/// Statement verbs that are neither read-only nor caught by `MUTATING_KEYWORDS`.
const OTHER_VERBS: &[&str] = &["explain", "analyze", "end", "replace"];

const MUTATING_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "create", "alter", "attach", "detach", "pragma",
    "vacuum", "reindex", "begin", "commit", "rollback", "savepoint", "release",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word, lower-cased.
    Word(String),
    Open,
    Close,
    Semicolon,
    Other,
}

#[derive(Debug, Clone)]
struct Lexed {
    token: Token,
    depth: usize,
}

fn lex(sql: &str) -> Vec<Lexed> {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            '\'' | '"' | '`' => {
                // Doubled quote is an escaped quote inside the literal.
                i += 1;
                while i < chars.len() {
                    if chars[i] == c {
                        if chars.get(i + 1) == Some(&c) {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
                out.push(Lexed { token: Token::Other, depth });
            }
            '[' => {
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                i += 1;
                out.push(Lexed { token: Token::Other, depth });
            }
            '(' => {
                out.push(Lexed { token: Token::Open, depth });
                depth += 1;
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                out.push(Lexed { token: Token::Close, depth });
                i += 1;
            }
            ';' => {
                out.push(Lexed { token: Token::Semicolon, depth });
                i += 1;
            }
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
                out.push(Lexed { token: Token::Word(word), depth });
            }
            c if c.is_whitespace() => i += 1,
            _ => {
                out.push(Lexed { token: Token::Other, depth });
                i += 1;
            }
        }
    }
    out
}

/// Split lexed tokens into non-empty statements.
fn statements(tokens: &[Lexed]) -> Vec<&[Lexed]> {
    tokens
        .split(|t| t.token == Token::Semicolon)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accept exactly one SELECT / WITH ... SELECT / VALUES statement.
pub fn check_read_only(sql: &str) -> Result<(), RunnerError> {
    let tokens = lex(sql);
    let stmts = statements(&tokens);
    if stmts.is_empty() {
        return Err(RunnerError::SyntaxError("query is empty".into()));
    }

    for stmt in &stmts {
        if let Some(keyword) = stmt.iter().find_map(|t| match &t.token {
            Token::Word(w) if MUTATING_KEYWORDS.contains(&w.as_str()) => Some(w.to_uppercase()),
            _ => None,
        }) {
            return Err(RunnerError::Forbidden(format!(
                "{keyword} is not allowed; only read-only SELECT queries can be graded"
            )));
        }
        let leading = stmt.iter().find_map(|t| match &t.token {
            Token::Word(w) => Some(w.as_str()),
            Token::Open => None,
            _ => Some(""),
        });
        match leading {
            Some(w) if ALLOWED_LEADING.contains(&w) => {}
            Some("") | None => {
                return Err(RunnerError::SyntaxError(
                    "query must start with SELECT, WITH or VALUES".into(),
                ))
            }
            Some(w) if OTHER_VERBS.contains(&w) => {
                return Err(RunnerError::Forbidden(format!(
                    "{} statements are not allowed; only read-only SELECT queries can be graded",
                    w.to_uppercase()
                )))
            }
            // Not a statement verb at all (e.g. a typo); the engine reports the syntax error.
            Some(_) => {}
        }
    }

    if stmts.len() > 1 {
        return Err(RunnerError::Forbidden(format!(
            "found {} statements; submit exactly one SELECT query",
            stmts.len()
        )));
    }
    Ok(())
}

/// True when ORDER BY appears outside any parentheses, i.e. it orders the final result.
pub fn has_top_level_order_by(sql: &str) -> bool {
    let tokens = lex(sql);
    tokens.windows(2).any(|w| {
        w[0].depth == 0
            && w[0].token == Token::Word("order".into())
            && w[1].token == Token::Word("by".into())
    })
}
