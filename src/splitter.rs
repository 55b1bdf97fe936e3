//! Splitting of SPARQL and RSP-QL query text into its top-level parts.
//!
//! Queries arrive preprocessed to a single line. The splitter recognizes
//! the prefix declarations, the query form, the result part, the FROM
//! clauses and the WHERE clause by scanning at brace depth zero, so that
//! keywords inside a CONSTRUCT template or a nested graph pattern are
//! never mistaken for top-level structure.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ParserError, ParserResult};
use crate::query::{ParsedQuery, Prefix, QueryForm, SplitQuery};
use crate::sparql;

/// Namespace bound to the empty prefix when an RSP-QL query uses `:`
/// without declaring it.
pub const RSP_PREFIX_URI: &str = "<http://acrasycompany.org/rsp#>";

static PREFIX_DECLARATION_ANCHORED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*PREFIX\s+\S+\s+<[^<>]+>").unwrap());

static SPARQL_FROM_NAMED_GRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*FROM\s+NAMED\s+(\S+)").unwrap());
static SPARQL_FROM_DEFAULT_GRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*FROM\s+(\S+)").unwrap());
static RSP_QL_FROM_NAMED_GRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*FROM\s+NAMED\s+GRAPH\s+(\S+)").unwrap());
static RSP_QL_FROM_DEFAULT_GRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*FROM\s+GRAPH\s+(\S+)").unwrap());

static SELECT_CLAUSE_ENTRY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let variable = format!("\\?(?:{})", sparql::varname());
    let expression = format!("\\(\\s*\\S+\\s+AS\\s+{variable}\\s*\\)");
    Regex::new(&format!("(?:{expression}|{variable})\\s+")).unwrap()
});
static SELECT_CLAUSE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    let variable = format!("\\?(?:{})", sparql::varname());
    let expression = format!("\\(\\s*\\S+\\s+AS\\s+{variable}\\s*\\)");
    Regex::new(&format!("^(?:(?:{expression}|{variable})\\s+)+$")).unwrap()
});

fn invalid_format_error() -> ParserError {
    ParserError::MalformedQuery("query does not have valid SPARQL format".to_string())
}

/// Splits a query into prefix part, form, result part, FROM part, WHERE
/// clause content and trailing part.
pub fn split_sparql_query(query: &str) -> ParserResult<SplitQuery> {
    // prefix declarations
    let mut offset = 0;
    while let Some(declaration) = PREFIX_DECLARATION_ANCHORED_REGEX.find(&query[offset..]) {
        offset += declaration.end();
    }
    let prefix_part = query[..offset].trim().to_string();

    // query form keyword
    let after_prefixes = &query[offset..];
    let body_offset = offset + (after_prefixes.len() - after_prefixes.trim_start().len());
    let body = &query[body_offset..];
    let forms = [
        (QueryForm::Construct, "CONSTRUCT"),
        (QueryForm::Select, "SELECT"),
        (QueryForm::Ask, "ASK"),
        (QueryForm::Describe, "DESCRIBE"),
    ];
    let (form, keyword) = forms
        .iter()
        .find(|(_, keyword)| sparql::keyword_at(body, 0, keyword))
        .ok_or_else(invalid_format_error)?;
    let body = &body[keyword.len()..];

    // scan at brace depth zero for the first FROM keyword and the WHERE
    // clause opening the outermost group pattern
    let mut depth = 0usize;
    let mut from_start = None;
    let mut where_location = None;
    let mut previous: Option<char> = None;
    for (index, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        let boundary = match previous {
            None => true,
            Some(p) => p.is_whitespace() || p == '}' || p == ')',
        };
        if depth == 0 && boundary {
            if sparql::keyword_at(body, index, "WHERE") {
                let after_keyword = &body[index + 5..];
                let whitespace = after_keyword.len() - after_keyword.trim_start().len();
                if after_keyword[whitespace..].starts_with('{') {
                    where_location = Some((index, index + 5 + whitespace));
                    break;
                }
            } else if from_start.is_none()
                && sparql::keyword_at(body, index, "FROM")
                && body[index + 4..].starts_with(char::is_whitespace)
            {
                from_start = Some(index);
            }
        }
        previous = Some(c);
    }
    let (where_start, brace_start) = where_location.ok_or_else(invalid_format_error)?;

    let (result_part, from_part) = match from_start {
        Some(from) => (&body[..from], &body[from..where_start]),
        None => (&body[..where_start], ""),
    };

    // the WHERE clause runs to the brace matching its opening brace
    let mut depth = 0usize;
    let mut close = None;
    for (index, c) in body[brace_start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(brace_start + index);
                    break;
                }
            }
            _ => {}
        }
    }
    let close = close.ok_or_else(invalid_format_error)?;
    let where_part = &body[brace_start + 1..close];
    if where_part.is_empty() {
        return Err(invalid_format_error());
    }
    let trailing_part = &body[close + 1..];
    if trailing_part.contains('{') || trailing_part.contains('}') {
        return Err(invalid_format_error());
    }

    Ok(SplitQuery {
        prefix_part,
        form: *form,
        result_part: parse_query_result_part(result_part.trim(), *form)?,
        from_part: from_part.trim().to_string(),
        where_part: where_part.trim().to_string(),
        trailing_part: trailing_part.trim().to_string(),
    })
}

/// Strips the surrounding braces of a CONSTRUCT template. A result part
/// with only one of the two braces is rejected.
fn parse_query_result_part(result_part: &str, form: QueryForm) -> ParserResult<String> {
    if let Some(inner) = result_part.strip_prefix('{') {
        match inner.strip_suffix('}') {
            Some(content) => Ok(content.trim().to_string()),
            None => Err(ParserError::MalformedQuery(format!(
                "format of {form} clause is invalid"
            ))),
        }
    } else if result_part.ends_with('}') {
        Err(ParserError::MalformedQuery(format!(
            "format of {form} clause is invalid"
        )))
    } else {
        Ok(result_part.to_string())
    }
}

fn parse_prefix_declarations(prefix_part: &str) -> Vec<Prefix> {
    sparql::PREFIX_DECLARATION_REGEX
        .captures_iter(prefix_part)
        .map(|captures| Prefix::new(captures[1].trim(), captures[2].trim()))
        .collect()
}

fn parse_query_internal(query: &str, rsp_ql: bool) -> ParserResult<ParsedQuery> {
    let mut split = split_sparql_query(query)?;
    let mut prefixes = parse_prefix_declarations(&split.prefix_part);

    // the same name may be declared twice, but only for the same namespace
    for (index, prefix) in prefixes.iter().enumerate() {
        if prefixes[..index]
            .iter()
            .any(|other| other.name == prefix.name && other.uri != prefix.uri)
        {
            return Err(ParserError::DuplicatePrefix(prefix.name.clone()));
        }
    }

    let query_without_prefixes = if split.prefix_part.is_empty() {
        query.to_string()
    } else {
        query.replace(&split.prefix_part, "")
    };

    for name in sparql::find_used_prefix_names(&query_without_prefixes) {
        if !prefixes.iter().any(|prefix| prefix.name == name) {
            if rsp_ql && name == ":" {
                // RSP-QL binds the empty prefix implicitly
                split.prefix_part = format!("{} PREFIX : {}", split.prefix_part, RSP_PREFIX_URI)
                    .trim()
                    .to_string();
                prefixes.push(Prefix::new(":", RSP_PREFIX_URI));
            } else {
                return Err(ParserError::UndefinedPrefix(name));
            }
        }
    }

    // prefixes that are declared but never used are dropped
    prefixes.retain(|prefix| sparql::prefix_occurs(&query_without_prefixes, &prefix.name, false));

    Ok(ParsedQuery::new(split, prefixes))
}

/// Parses a SPARQL query into its split form and its used prefixes.
pub fn parse_sparql_query(query: &str) -> ParserResult<ParsedQuery> {
    parse_query_internal(query, false)
}

/// Parses an RSP-QL query into its split form and its used prefixes,
/// implicitly declaring the empty prefix when the query uses it.
pub fn parse_rsp_ql_query(query: &str) -> ParserResult<ParsedQuery> {
    parse_query_internal(query, true)
}

/// Resolves the graph names of all `FROM NAMED` clauses of a SPARQL
/// query, returning them with the FROM part leftover after removing the
/// matched clauses.
pub fn retrieve_graph_names_from_sparql_from_part(
    from_part: &str,
    prefixes: &[Prefix],
) -> ParserResult<(Vec<String>, String)> {
    let mut leftover = from_part.to_string();
    let mut graph_names = Vec::new();
    for captures in SPARQL_FROM_NAMED_GRAPH_REGEX.captures_iter(from_part) {
        graph_names.push(sparql::resolve_graph_name(&captures[1], prefixes)?);
        leftover = leftover.replace(captures[0].trim(), "").trim().to_string();
    }
    Ok((graph_names, leftover))
}

/// Resolves the graph names of all `FROM NAMED GRAPH` clauses of an
/// RSP-QL query, as [`retrieve_graph_names_from_sparql_from_part`] does
/// for SPARQL.
pub fn retrieve_graph_names_from_rsp_ql_from_part(
    from_part: &str,
    prefixes: &[Prefix],
) -> ParserResult<(Vec<String>, String)> {
    let mut leftover = from_part.to_string();
    let mut graph_names = Vec::new();
    for captures in RSP_QL_FROM_NAMED_GRAPH_REGEX.captures_iter(from_part) {
        graph_names.push(sparql::resolve_graph_name(&captures[1], prefixes)?);
        leftover = leftover.replace(captures[0].trim(), "").trim().to_string();
    }
    Ok((graph_names, leftover))
}

/// Removes all `FROM <graph>` default graph clauses from a FROM part
/// leftover.
pub fn remove_sparql_default_graph_clauses(from_part_leftover: &str) -> String {
    let mut leftover = from_part_leftover.to_string();
    for clause in SPARQL_FROM_DEFAULT_GRAPH_REGEX.find_iter(from_part_leftover) {
        leftover = leftover.replace(clause.as_str().trim(), "").trim().to_string();
    }
    leftover
}

/// Removes all `FROM GRAPH <graph>` default graph clauses from a FROM
/// part leftover of an RSP-QL query.
pub fn remove_rsp_ql_default_graph_clauses(from_part_leftover: &str) -> String {
    let mut leftover = from_part_leftover.to_string();
    for clause in RSP_QL_FROM_DEFAULT_GRAPH_REGEX.find_iter(from_part_leftover) {
        leftover = leftover.replace(clause.as_str().trim(), "").trim().to_string();
    }
    leftover
}

/// Splits the result part of a SELECT query into its entries, each a
/// plain variable or an `(expression AS ?variable)` projection. Returns
/// an empty list if the clause has any other shape, e.g. `SELECT *`.
pub fn parse_select_clause(select_clause: &str) -> Vec<String> {
    let formatted = format!("{} ", select_clause.trim());
    if !SELECT_CLAUSE_REGEX.is_match(&formatted) {
        return Vec::new();
    }
    SELECT_CLAUSE_ENTRY_REGEX
        .find_iter(&formatted)
        .map(|entry| entry.as_str().trim().to_string())
        .collect()
}
