//! SQL generation for cell edits and classification of user-entered SQL

pub mod query_builder;

/// What a user-entered statement does to the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Changes data or schema, needs an undo snapshot
    Mutation,
    /// Anything else is run as a query and shown as a result table
    Query,
}

impl StatementKind {
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            StatementKind::Query
        } else {
            StatementKind::Mutation
        }
    }

    /// Keyword-based guess for SQL the engine could not prepare. Only plain
    /// reads count as queries; anything else gets a snapshot.
    pub fn classify(sql: &str) -> Self {
        let first_word = strip_leading_comments(sql)
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match first_word.as_str() {
            "select" | "values" | "explain" => StatementKind::Query,
            _ => StatementKind::Mutation,
        }
    }
}

fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(line_comment) = rest.strip_prefix("--") {
            rest = line_comment
                .split_once('\n')
                .map_or("", |(_, after)| after)
                .trim_start();
        } else if let Some(block) = rest.strip_prefix("/*") {
            rest = block
                .split_once("*/")
                .map_or("", |(_, after)| after)
                .trim_start();
        } else {
            return rest;
        }
    }
}
