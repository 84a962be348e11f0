//! Lexical read-only check for learner queries.
//!
//! The check runs before a statement reaches the engine. It understands just
//! enough SQL lexing to ignore keywords inside comments, string literals and
//! quoted identifiers. The engine connection is additionally opened with
//! `query_only`, so anything slipping past this check still cannot write.

use crate::model::QueryError;

/// Leading keyword of an accepted statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    With,
    Values,
    Explain,
}

impl StatementKind {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "SELECT" => Some(StatementKind::Select),
            "WITH" => Some(StatementKind::With),
            "VALUES" => Some(StatementKind::Values),
            "EXPLAIN" => Some(StatementKind::Explain),
            _ => None,
        }
    }
}

/// Keywords that mutate data, schema, the transaction state or the connection.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "UPSERT", "MERGE", "CREATE", "DROP", "ALTER",
    "TRUNCATE", "RENAME", "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX", "ANALYZE", "BEGIN",
    "COMMIT", "ROLLBACK", "SAVEPOINT", "RELEASE", "GRANT", "REVOKE",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare word, uppercased.
    Word(String),
    OpenParen,
    Semicolon,
    Other,
}

/// Verify that `sql` is a single read-only statement.
///
/// # Errors
///
/// Returns `QueryError::Forbidden` when a write or DDL keyword appears outside
/// comments and literals, and `QueryError::Syntax` for empty input, multiple
/// statements, unterminated comments or literals, or an unknown leading keyword.
pub fn ensure_read_only(sql: &str) -> Result<StatementKind, QueryError> {
    let tokens = tokenize(sql)?;

    for (i, token) in tokens.iter().enumerate() {
        let Token::Word(word) = token else { continue };
        if !FORBIDDEN_KEYWORDS.contains(&word.as_str()) {
            continue;
        }
        // replace(x, y, z) is a scalar function, not REPLACE INTO
        if word == "REPLACE" && tokens.get(i + 1) == Some(&Token::OpenParen) {
            continue;
        }
        return Err(QueryError::Forbidden {
            reason: format!("{word} statements are not allowed; only SELECT queries can be run"),
        });
    }

    let mut statements = tokens
        .split(|t| *t == Token::Semicolon)
        .filter(|statement| !statement.is_empty());

    let Some(first) = statements.next() else {
        return Err(syntax("query is empty"));
    };
    if statements.next().is_some() {
        return Err(syntax("only one statement can be run at a time"));
    }

    match first.first() {
        Some(Token::Word(word)) => StatementKind::from_keyword(word).ok_or_else(|| {
            syntax(&format!(
                "near \"{word}\": expected a statement starting with SELECT, WITH, VALUES or EXPLAIN"
            ))
        }),
        _ => Err(syntax("query must start with SELECT, WITH, VALUES or EXPLAIN")),
    }
}

fn syntax(message: &str) -> QueryError {
    QueryError::Syntax {
        message: message.to_string(),
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '-' if chars.peek() == Some(&'-') => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                let mut closed = false;
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        closed = true;
                        break;
                    }
                    prev = c;
                }
                if !closed {
                    return Err(syntax("unterminated /* comment"));
                }
            }
            '\'' | '"' | '`' | '[' => {
                let close = if c == '[' { ']' } else { c };
                skip_quoted(&mut chars, close)?;
                tokens.push(Token::Other);
            }
            '(' => tokens.push(Token::OpenParen),
            ';' => tokens.push(Token::Semicolon),
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word.to_ascii_uppercase()));
            }
            _ => tokens.push(Token::Other),
        }
    }

    Ok(tokens)
}

/// Consume a quoted literal; a doubled closing quote is an escaped quote.
fn skip_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    close: char,
) -> Result<(), QueryError> {
    while let Some(c) = chars.next() {
        if c == close {
            if close != ']' && chars.peek() == Some(&close) {
                chars.next();
                continue;
            }
            return Ok(());
        }
    }
    Err(syntax(if close == '\'' {
        "unterminated string literal"
    } else {
        "unterminated quoted identifier"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forbidden(sql: &str) -> bool {
        matches!(ensure_read_only(sql), Err(QueryError::Forbidden { .. }))
    }

    fn syntax_error(sql: &str) -> bool {
        matches!(ensure_read_only(sql), Err(QueryError::Syntax { .. }))
    }

    #[test]
    fn accepts_read_statements() {
        assert_eq!(
            ensure_read_only("SELECT * FROM students;"),
            Ok(StatementKind::Select)
        );
        assert_eq!(
            ensure_read_only("  with t AS (SELECT 1) SELECT * FROM t"),
            Ok(StatementKind::With)
        );
        assert_eq!(ensure_read_only("VALUES (1), (2)"), Ok(StatementKind::Values));
        assert_eq!(
            ensure_read_only("EXPLAIN QUERY PLAN SELECT 1"),
            Ok(StatementKind::Explain)
        );
    }

    #[test]
    fn rejects_writes() {
        assert!(forbidden("DELETE FROM students"));
        assert!(forbidden("insert into students values (6, 'Zed', 30, 'A', 'Paris')"));
        assert!(forbidden("UPDATE employees SET salary = 0"));
        assert!(forbidden("DROP TABLE students"));
        assert!(forbidden("PRAGMA query_only = OFF"));
        assert!(forbidden("ATTACH DATABASE 'x.db' AS x"));
        assert!(forbidden("REPLACE INTO products VALUES (1, 'x', 1, 1)"));
    }

    #[test]
    fn rejects_writes_hidden_after_a_select() {
        assert!(forbidden("SELECT 1; DROP TABLE students"));
        assert!(forbidden("WITH x AS (SELECT 1) DELETE FROM students"));
    }

    #[test]
    fn ignores_keywords_in_literals_and_comments() {
        assert!(ensure_read_only("SELECT 'DELETE FROM students' AS s").is_ok());
        assert!(ensure_read_only("SELECT 'it''s; DROP' AS s").is_ok());
        assert!(ensure_read_only("SELECT \"update\" FROM t").is_ok());
        assert!(ensure_read_only("SELECT [drop] FROM t").is_ok());
        assert!(ensure_read_only("-- DELETE everything\nSELECT 1").is_ok());
        assert!(ensure_read_only("SELECT /* INSERT */ 1").is_ok());
    }

    #[test]
    fn replace_function_is_allowed() {
        assert!(ensure_read_only("SELECT REPLACE(region, 'North', 'N') FROM sales").is_ok());
        assert!(ensure_read_only("SELECT replace (name, 'a', 'b') FROM t").is_ok());
    }

    #[test]
    fn statement_count_is_checked() {
        assert!(syntax_error(""));
        assert!(syntax_error("  ;; -- nothing\n"));
        assert!(syntax_error("SELECT 1; SELECT 2"));
        assert!(ensure_read_only("SELECT 1;;").is_ok());
    }

    #[test]
    fn unknown_leading_keyword_is_a_syntax_error() {
        assert!(syntax_error("SELEC name FROM students"));
        assert!(syntax_error("(SELECT 1)"));
    }

    #[test]
    fn unterminated_input_is_a_syntax_error() {
        assert!(syntax_error("SELECT 'abc"));
        assert!(syntax_error("SELECT /* never closed"));
        assert!(syntax_error("SELECT \"col"));
    }
}
