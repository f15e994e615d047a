//! Just enough statement recognition to emulate the knowledge-base SQL surface.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Statement {
    CreateKnowledgeBase { name: String },
    DropKnowledgeBase { name: String },
    ShowKnowledgeBases,
    Insert { name: String, rows: Vec<String> },
    Select { name: String, limit: Option<usize> },
    Count { name: String },
}

pub(crate) fn parse(sql: &str) -> Result<Statement, String> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    let words: Vec<&str> = trimmed.split_whitespace().collect();
    let upper = |i: usize| words.get(i).map(|w| w.to_ascii_uppercase());
    let name_at = |i: usize| {
        words
            .get(i)
            .map(|w| w.trim_end_matches(';').to_string())
            .ok_or_else(|| format!("missing name in: {trimmed}"))
    };

    match (upper(0).as_deref(), upper(1).as_deref()) {
        (Some("CREATE"), Some("KNOWLEDGE_BASE")) => Ok(Statement::CreateKnowledgeBase {
            name: name_at(2)?,
        }),
        (Some("DROP"), Some("KNOWLEDGE_BASE")) => Ok(Statement::DropKnowledgeBase {
            name: name_at(2)?,
        }),
        (Some("SHOW"), Some("KNOWLEDGE_BASES")) => Ok(Statement::ShowKnowledgeBases),
        (Some("INSERT"), Some("INTO")) => {
            let values_at = trimmed
                .to_ascii_uppercase()
                .find(" VALUES ")
                .ok_or_else(|| "INSERT without VALUES".to_string())?;
            Ok(Statement::Insert {
                name: name_at(2)?,
                rows: tuples(&trimmed[values_at + " VALUES ".len()..]),
            })
        }
        (Some("SELECT"), _) => {
            let from = words
                .iter()
                .position(|w| w.eq_ignore_ascii_case("FROM"))
                .ok_or_else(|| "SELECT without FROM".to_string())?;
            let limit = words
                .iter()
                .rposition(|w| w.eq_ignore_ascii_case("LIMIT"))
                .and_then(|i| words.get(i + 1))
                .and_then(|n| n.parse().ok());
            let name = name_at(from + 1)?;
            if upper(1).is_some_and(|w| w.starts_with("COUNT(")) {
                return Ok(Statement::Count { name });
            }
            Ok(Statement::Select { name, limit })
        }
        _ => Err(format!("unsupported statement: {trimmed}")),
    }
}

/// Top-level parenthesized groups, honoring single-quoted strings.
fn tuples(values: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0usize;
    let mut chars = values.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if in_quote {
            if c == '\'' {
                if chars.peek().is_some_and(|(_, n)| *n == '\'') {
                    chars.next();
                } else {
                    in_quote = false;
                }
            }
            continue;
        }
        match c {
            '\'' => in_quote = true,
            '(' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    out.push(values[start..i].to_string());
                }
            }
            _ => {}
        }
    }
    out
}
