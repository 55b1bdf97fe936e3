//! Assembly of RSP-QL query bodies from itemized WHERE clauses.
//!
//! The streaming part of a stream query is rewritten into a standalone
//! RSP-QL query: every distinct stream graph becomes a numbered window
//! (`FROM NAMED WINDOW :win0 ON <stream> [...]`), and the graph patterns
//! on those streams are regrouped under `WINDOW :winN { ... }` blocks.

use crate::error::{ParserError, ParserResult};
use crate::query::QueryForm;
use crate::sparql;
use crate::where_clause::WhereClauseItem;
use crate::window::ConvertedStreamWindow;

/// An RSP-QL query body generated from the streaming part of a stream
/// query, together with the derived properties the later generation
/// steps need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RspQlQueryBody {
    /// The full query body, without prefix declarations.
    pub body: String,
    /// Unbound variables of the body, excluding window parameter
    /// placeholders.
    pub unbound_variables: Vec<String>,
    pub query_form: QueryForm,
    /// The rendered result part (braced for CONSTRUCT, empty for ASK).
    pub result_part: String,
    pub where_clause: String,
}

/// Builds the RSP-QL query body for the given WHERE clause items.
///
/// Stream graphs are numbered in order of first appearance in the items.
/// Each of them must have a matching entry in `stream_windows`; a stream
/// graph without one yields [`ParserError::MissingWindowDefinition`].
pub fn create_rsp_ql_query_body(
    query_form: QueryForm,
    query_output: &str,
    items: &[WhereClauseItem],
    solution_modifier: &str,
    stream_windows: &[ConvertedStreamWindow],
) -> ParserResult<RspQlQueryBody> {
    // distinct stream graph names, in order of first appearance
    let mut stream_graphs: Vec<&str> = Vec::new();
    for item in items {
        if let WhereClauseItem::Graph { name, .. } = item {
            if !stream_graphs.contains(&name.as_str()) {
                stream_graphs.push(name);
            }
        }
    }

    let mut from_parts = Vec::new();
    for (number, graph) in stream_graphs.iter().enumerate() {
        let window = stream_windows
            .iter()
            .find(|window| window.stream_iri == *graph)
            .ok_or_else(|| ParserError::MissingWindowDefinition((*graph).to_string()))?;
        from_parts.push(format!(
            "FROM NAMED WINDOW :win{number} ON {graph} [{}]",
            window.window_definition
        ));
    }
    let from_part = from_parts.join("\n");

    // every graph item name was collected above
    let window_number =
        |name: &str| stream_graphs.iter().position(|graph| *graph == name).unwrap_or(0);

    let where_clause = if stream_graphs.len() == 1 {
        // a single stream graph takes all items, including the keyword
        // expressions that sat between the graph patterns
        let mut grouped = String::new();
        let mut graph_name = "";
        for item in items {
            match item {
                WhereClauseItem::Expression(expression) => {
                    grouped.push_str(expression);
                    grouped.push(' ');
                }
                WhereClauseItem::Graph { name, clause } => {
                    grouped.push_str(clause);
                    grouped.push(' ');
                    graph_name = name;
                }
            }
        }
        format!("WINDOW :win{} {{\n{grouped}\n}}", window_number(graph_name))
    } else {
        // keyword expressions stay at the top level of the WHERE clause
        let mut parts = Vec::new();
        for item in items {
            match item {
                WhereClauseItem::Expression(expression) => parts.push(expression.clone()),
                WhereClauseItem::Graph { name, clause } => {
                    parts.push(format!("WINDOW :win{} {{\n{clause}\n}}", window_number(name)));
                }
            }
        }
        parts.join("\n")
    };

    let result_part = match query_form {
        QueryForm::Construct => format!("{{ {query_output} }}"),
        QueryForm::Ask => String::new(),
        _ => query_output.to_string(),
    };

    let body = format!(
        "{query_form}\n{result_part}\n{from_part}\nWHERE {{\n{where_clause}\n}}\n{solution_modifier}"
    );

    // the FROM part is left out of the scan: anything unbound in a window
    // definition is a window parameter, not an input variable
    let unbound_variables = sparql::find_unbound_variables(&format!(
        "{query_form}\n{result_part}\n\nWHERE {{\n{where_clause}\n}}\n{solution_modifier}"
    ));

    Ok(RspQlQueryBody {
        body,
        unbound_variables,
        query_form,
        result_part,
        where_clause,
    })
}
