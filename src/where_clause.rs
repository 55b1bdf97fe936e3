//! Itemization of WHERE clauses into graph patterns and keyword
//! expressions.
//!
//! A WHERE clause is first cut into graph items and free expression
//! items. For the stream query those items are then divided further:
//! graph patterns on stream IRIs and keyword expressions stay in the
//! derived stream query, while graph patterns on any other IRI form the
//! context part that the derivation instantiates.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ParserError, ParserResult};
use crate::input::InputQueryLanguage;
use crate::query::Prefix;
use crate::sparql;

static SPARQL_GRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(GRAPH)\s+(\S+)\s+\{").unwrap());

static RSP_QL_GRAPH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(WINDOW|GRAPH)\s+(\S+)\s+\{").unwrap());

static FILTER_EXISTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^FILTER\s+(?:NOT\s+)?EXISTS\s+\{").unwrap());

/// Keywords that may start a free-standing expression in a WHERE clause.
const EXPRESSION_KEYWORDS: [&str; 8] = [
    "OPTIONAL", "UNION", "GRAPH", "BIND", "GROUP BY", "HAVING", "MINUS", "FILTER",
];

/// One item of a WHERE clause: either free-standing pattern text or a
/// named graph pattern with its clause content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhereClauseItem {
    /// Pattern text outside any graph, for example a triple block or a
    /// FILTER expression.
    Expression(String),
    /// A GRAPH pattern (or WINDOW pattern in an RSP-QL query) with its
    /// resolved graph name and the clause between its braces.
    Graph { name: String, clause: String },
}

/// A stream query WHERE clause divided into the patterns that describe
/// context data and the items that stay in the derived stream query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionedWhereClause {
    /// Concatenated clauses of all graph patterns on non-stream IRIs.
    pub context_part: String,
    /// Stream graph patterns and keyword expressions, in query order.
    pub stream_items: Vec<WhereClauseItem>,
}

fn unbalanced_braces_error() -> ParserError {
    ParserError::MalformedQuery("WHERE clause contains unbalanced braces".to_string())
}

/// Index of the `}` closing the brace group whose content starts at
/// `open_end`, or `None` if the group never closes.
fn matching_brace_end(text: &str, open_end: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, c) in text[open_end..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open_end + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// First occurrence of any expression keyword in `text` at or after
/// byte position `from`. Keywords are recognized in any ASCII case.
fn find_keyword(text: &str, from: usize) -> Option<(usize, &'static str)> {
    let bytes = text.as_bytes();
    (from..bytes.len()).find_map(|index| {
        EXPRESSION_KEYWORDS
            .iter()
            .find(|keyword| {
                bytes[index..]
                    .get(..keyword.len())
                    .is_some_and(|window| window.eq_ignore_ascii_case(keyword.as_bytes()))
            })
            .map(|keyword| (index, *keyword))
    })
}

/// Cuts a WHERE clause into graph items and the expression items between
/// them. In an RSP-QL query both WINDOW and GRAPH patterns count as
/// graph items, in a SPARQL query only GRAPH patterns do.
///
/// Graph names are resolved against the query prefixes and must occur in
/// `input_graph_names`, the names declared by the query's FROM part.
pub fn parse_where_clause(
    where_clause: &str,
    prefixes: &[Prefix],
    input_graph_names: &[String],
    language: InputQueryLanguage,
) -> ParserResult<Vec<WhereClauseItem>> {
    let regex = match language {
        InputQueryLanguage::Sparql => &SPARQL_GRAPH_REGEX,
        InputQueryLanguage::RspQl => &RSP_QL_GRAPH_REGEX,
    };

    let mut items = Vec::new();
    let mut last_end = 0;
    for captures in regex.captures_iter(where_clause) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(2)) else {
            continue;
        };
        // a graph keyword inside an already consumed clause stays part
        // of that clause
        if whole.start() < last_end {
            continue;
        }
        let expression = where_clause[last_end..whole.start()].trim();
        if !expression.is_empty() {
            items.push(WhereClauseItem::Expression(expression.to_string()));
        }
        let close =
            matching_brace_end(where_clause, whole.end()).ok_or_else(unbalanced_braces_error)?;
        let name = sparql::resolve_graph_name(name.as_str(), prefixes)?;
        if !input_graph_names.contains(&name) {
            return Err(ParserError::MalformedQuery(format!(
                "graph name '{name}' not specified with FROM"
            )));
        }
        items.push(WhereClauseItem::Graph {
            name,
            clause: where_clause[whole.end()..close].trim().to_string(),
        });
        last_end = close + 1;
    }
    let expression = where_clause[last_end..].trim();
    if !expression.is_empty() {
        items.push(WhereClauseItem::Expression(expression.to_string()));
    }
    Ok(items)
}

/// Divides the items of a stream query WHERE clause over the context
/// part and the stream items of the derived stream query.
///
/// Graph patterns on one of the `stream_graph_names` are kept as stream
/// items. Graph patterns on any other name contribute their clause to
/// the context part and may not contain expression keywords, since the
/// context part becomes a plain pattern conjunction. Expression items
/// are split per keyword and kept as stream items.
pub fn partition_stream_query_where_clause(
    items: Vec<WhereClauseItem>,
    stream_graph_names: &[String],
) -> ParserResult<PartitionedWhereClause> {
    let mut context_part = String::new();
    let mut stream_items = Vec::new();
    for item in items {
        match item {
            WhereClauseItem::Expression(expression) => {
                stream_items.extend(split_expression_by_sparql_keywords(&expression)?);
            }
            WhereClauseItem::Graph { name, clause } => {
                if stream_graph_names.contains(&name) {
                    stream_items.push(WhereClauseItem::Graph { name, clause });
                } else {
                    if find_keyword(&clause, 0).is_some() {
                        return Err(ParserError::IllegalContextExpression);
                    }
                    context_part.push_str(&clause);
                    context_part.push(' ');
                }
            }
        }
    }
    Ok(PartitionedWhereClause {
        context_part: context_part.trim().to_string(),
        stream_items,
    })
}

/// Splits free expression text into one item per expression keyword.
/// Each item runs from its keyword to the next keyword, except that an
/// uppercase FILTER EXISTS item extends over its full brace group. Text
/// before the first keyword is rejected.
fn split_expression_by_sparql_keywords(expression: &str) -> ParserResult<Vec<WhereClauseItem>> {
    let mut items = Vec::new();
    let mut leftover = expression.trim().to_string();
    while !leftover.is_empty() {
        let Some((start, keyword)) = find_keyword(&leftover, 0) else {
            return Err(ParserError::UnexpectedTopLevelExpression(leftover));
        };
        if start > 0 {
            return Err(ParserError::UnexpectedTopLevelExpression(
                leftover[..start].trim().to_string(),
            ));
        }
        let item_end = if let Some(exists) = FILTER_EXISTS_REGEX.find(&leftover) {
            let close =
                matching_brace_end(&leftover, exists.end()).ok_or_else(unbalanced_braces_error)?;
            close + 1
        } else {
            match find_keyword(&leftover, keyword.len() + 1) {
                Some((next, _)) => next,
                None => leftover.len(),
            }
        };
        items.push(WhereClauseItem::Expression(
            leftover[..item_end].trim().to_string(),
        ));
        leftover = leftover[item_end..].trim().to_string();
    }
    Ok(items)
}

/// The variables of the context part that the derived stream query still
/// carries, in order of occurrence in the context part. These are the
/// variables the derivation will substitute.
pub fn retrieve_input_variables(context_part: &str, body_variables: &[String]) -> Vec<String> {
    sparql::find_unbound_variables(context_part)
        .into_iter()
        .filter(|variable| body_variables.contains(variable))
        .collect()
}

/// The variables of the stream query result part that do not occur in
/// the context part, in order of occurrence in the result part. These
/// stay unbound in the derived stream query.
pub fn retrieve_output_variables(context_part: &str, result_part: &str) -> Vec<String> {
    let context_variables = sparql::find_unbound_variables(context_part);
    sparql::find_unbound_variables(result_part)
        .into_iter()
        .filter(|variable| !context_variables.contains(variable))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn cuts_where_clause_into_expressions_and_graphs() {
        let items = parse_where_clause(
            "?a rdf:type ?b . GRAPH <g1> { ?s :v ?v . } FILTER (?v > 3)",
            &[],
            &names(&["<g1>"]),
            InputQueryLanguage::Sparql,
        )
        .unwrap();
        assert_eq!(
            items,
            vec![
                WhereClauseItem::Expression("?a rdf:type ?b .".to_string()),
                WhereClauseItem::Graph {
                    name: "<g1>".to_string(),
                    clause: "?s :v ?v .".to_string(),
                },
                WhereClauseItem::Expression("FILTER (?v > 3)".to_string()),
            ]
        );
    }

    #[test]
    fn extracts_clause_without_space_after_brace() {
        let items = parse_where_clause(
            "GRAPH <g1> {?s :v ?v}",
            &[],
            &names(&["<g1>"]),
            InputQueryLanguage::Sparql,
        )
        .unwrap();
        assert_eq!(
            items,
            vec![WhereClauseItem::Graph {
                name: "<g1>".to_string(),
                clause: "?s :v ?v".to_string(),
            }]
        );
    }

    #[test]
    fn resolves_prefixed_graph_names() {
        let prefixes = vec![Prefix::new("ex:", "<http://example.org/>")];
        let items = parse_where_clause(
            "GRAPH ex:g1 { ?s :v ?v . }",
            &prefixes,
            &names(&["<http://example.org/g1>"]),
            InputQueryLanguage::Sparql,
        )
        .unwrap();
        assert_eq!(
            items,
            vec![WhereClauseItem::Graph {
                name: "<http://example.org/g1>".to_string(),
                clause: "?s :v ?v .".to_string(),
            }]
        );
    }

    #[test]
    fn rejects_graph_name_missing_from_from_part() {
        let result = parse_where_clause(
            "GRAPH <g2> { ?s :v ?v . }",
            &[],
            &names(&["<g1>"]),
            InputQueryLanguage::Sparql,
        );
        assert!(matches!(
            result,
            Err(ParserError::MalformedQuery(message))
                if message.contains("not specified with FROM")
        ));
    }

    #[test]
    fn rejects_unbalanced_graph_pattern() {
        let result = parse_where_clause(
            "GRAPH <g1> { ?s :v ?v .",
            &[],
            &names(&["<g1>"]),
            InputQueryLanguage::Sparql,
        );
        assert!(matches!(result, Err(ParserError::MalformedQuery(_))));
    }

    #[test]
    fn window_patterns_count_as_graphs_in_rsp_ql_only() {
        let clause = "WINDOW <w1> { ?s :v ?v . }";
        let rsp_ql = parse_where_clause(
            clause,
            &[],
            &names(&["<w1>"]),
            InputQueryLanguage::RspQl,
        )
        .unwrap();
        assert!(matches!(rsp_ql[0], WhereClauseItem::Graph { .. }));

        let sparql = parse_where_clause(
            clause,
            &[],
            &names(&["<w1>"]),
            InputQueryLanguage::Sparql,
        )
        .unwrap();
        assert_eq!(
            sparql,
            vec![WhereClauseItem::Expression(clause.to_string())]
        );
    }

    #[test]
    fn nested_graph_keyword_stays_inside_outer_clause() {
        let items = parse_where_clause(
            "GRAPH <g1> { ?s :v ?v . GRAPH <g2> { ?a ?b ?c } }",
            &[],
            &names(&["<g1>"]),
            InputQueryLanguage::Sparql,
        )
        .unwrap();
        assert_eq!(
            items,
            vec![WhereClauseItem::Graph {
                name: "<g1>".to_string(),
                clause: "?s :v ?v . GRAPH <g2> { ?a ?b ?c }".to_string(),
            }]
        );
    }

    #[test]
    fn partitions_context_and_stream_patterns() {
        let items = parse_where_clause(
            "GRAPH <s1> { ?p :hasValue ?v . } GRAPH <c1> { ?p rdf:type :Patient . }",
            &[],
            &names(&["<s1>", "<c1>"]),
            InputQueryLanguage::Sparql,
        )
        .unwrap();
        let partitioned =
            partition_stream_query_where_clause(items, &names(&["<s1>"])).unwrap();
        assert_eq!(partitioned.context_part, "?p rdf:type :Patient .");
        assert_eq!(
            partitioned.stream_items,
            vec![WhereClauseItem::Graph {
                name: "<s1>".to_string(),
                clause: "?p :hasValue ?v .".to_string(),
            }]
        );
    }

    #[test]
    fn rejects_keywords_inside_context_graphs() {
        let items = vec![WhereClauseItem::Graph {
            name: "<c1>".to_string(),
            clause: "?p :hasAge ?a . filter (?a > 18)".to_string(),
        }];
        assert_eq!(
            partition_stream_query_where_clause(items, &names(&["<s1>"])),
            Err(ParserError::IllegalContextExpression)
        );
    }

    #[test]
    fn splits_expressions_per_keyword() {
        let items = vec![WhereClauseItem::Expression(
            "FILTER (?v > 3) OPTIONAL { ?a :q ?c . }".to_string(),
        )];
        let partitioned = partition_stream_query_where_clause(items, &[]).unwrap();
        assert_eq!(
            partitioned.stream_items,
            vec![
                WhereClauseItem::Expression("FILTER (?v > 3)".to_string()),
                WhereClauseItem::Expression("OPTIONAL { ?a :q ?c . }".to_string()),
            ]
        );
    }

    #[test]
    fn splits_expressions_on_lowercase_keywords() {
        let items = vec![WhereClauseItem::Expression(
            "filter (?v > 3) Optional { ?a :q ?c . }".to_string(),
        )];
        let partitioned = partition_stream_query_where_clause(items, &[]).unwrap();
        assert_eq!(
            partitioned.stream_items,
            vec![
                WhereClauseItem::Expression("filter (?v > 3)".to_string()),
                WhereClauseItem::Expression("Optional { ?a :q ?c . }".to_string()),
            ]
        );
    }

    #[test]
    fn filter_exists_extends_over_its_brace_group() {
        let items = vec![WhereClauseItem::Expression(
            "FILTER EXISTS { GRAPH <g> { ?s ?p ?o } } BIND (1 AS ?x)".to_string(),
        )];
        let partitioned = partition_stream_query_where_clause(items, &[]).unwrap();
        assert_eq!(
            partitioned.stream_items,
            vec![
                WhereClauseItem::Expression(
                    "FILTER EXISTS { GRAPH <g> { ?s ?p ?o } }".to_string()
                ),
                WhereClauseItem::Expression("BIND (1 AS ?x)".to_string()),
            ]
        );
    }

    #[test]
    fn filter_not_exists_extends_over_its_brace_group() {
        let items = vec![WhereClauseItem::Expression(
            "FILTER NOT EXISTS { ?s :flagged true } FILTER (?v < 10)".to_string(),
        )];
        let partitioned = partition_stream_query_where_clause(items, &[]).unwrap();
        assert_eq!(
            partitioned.stream_items,
            vec![
                WhereClauseItem::Expression("FILTER NOT EXISTS { ?s :flagged true }".to_string()),
                WhereClauseItem::Expression("FILTER (?v < 10)".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_pattern_without_leading_keyword() {
        let items = vec![WhereClauseItem::Expression(
            "?s ?p ?o . FILTER (?v > 3)".to_string(),
        )];
        assert_eq!(
            partition_stream_query_where_clause(items, &[]),
            Err(ParserError::UnexpectedTopLevelExpression(
                "?s ?p ?o .".to_string()
            ))
        );
    }

    #[test]
    fn input_variables_keep_context_order() {
        let body_variables = names(&["?v", "?q"]);
        assert_eq!(
            retrieve_input_variables("?p :x ?v . ?q :y ?v .", &body_variables),
            vec!["?v", "?q"]
        );
    }

    #[test]
    fn output_variables_exclude_context_variables() {
        assert_eq!(
            retrieve_output_variables("?p :x ?v .", "?v ?alert"),
            vec!["?alert"]
        );
    }
}
