//! Error types for the query derivation pipeline.

use thiserror::Error;

use crate::query::QueryForm;

/// Result alias used by every stage of the derivation pipeline.
pub type ParserResult<T> = Result<T, ParserError>;

/// Reasons a query derivation input can be rejected.
///
/// A derivation either succeeds completely or fails with exactly one of
/// these variants; there is no partial output. Variants that cover several
/// related rejection sites carry the full reason as a string, the others
/// carry the offending token.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParserError {
    /// The caller input misses required fields for its declared input
    /// language, or combines fields that are mutually exclusive.
    #[error("{0}")]
    InvalidInput(String),

    /// A query string does not match the recognized query grammar
    /// (prefix declarations, form keyword, result clause, optional FROM
    /// clauses, WHERE clause, optional solution modifier).
    #[error("{0}")]
    MalformedQuery(String),

    /// A prefix name occurs in a query body without being declared.
    #[error("query string contains undefined prefix '{0}'")]
    UndefinedPrefix(String),

    /// The same prefix name is declared twice with different URIs.
    #[error("multiple prefixes are present with name '{0}'")]
    DuplicatePrefix(String),

    /// A window definition string does not match one of the two
    /// supported temporal shapes, or is declared inconsistently.
    #[error("{0}")]
    InvalidWindowDefinition(String),

    /// A stream graph is referenced in the WHERE clause without any
    /// window being defined for its IRI.
    #[error("window parameters of input stream '{0}' are not specified in input")]
    MissingWindowDefinition(String),

    /// A configured stream window and the query's own window declaration
    /// for the same stream IRI carry different window definitions, or the
    /// configured IRI has no counterpart in the query at all.
    #[error("{0}")]
    InconsistentWindowDefinition(String),

    /// A final query lacks the WHERE clause that every supported form
    /// requires (for ASK queries the WHERE keyword must be explicit).
    #[error("final query of {0} form should have a non-empty WHERE clause")]
    MissingWhereClause(QueryForm),

    /// A solution modifier occurs where none is allowed, or references
    /// variables it may not reference.
    #[error("{0}")]
    DisallowedSolutionModifier(String),

    /// A non-stream graph pattern contains a SPARQL keyword, which is
    /// illegal because such patterns become plain rule antecedents.
    #[error("non-streaming graph patterns of stream query cannot contain special \
             SPARQL keywords - such expressions should be placed outside the graph")]
    IllegalContextExpression,

    /// Free text in a WHERE clause, outside any graph pattern, does not
    /// start with a recognized SPARQL keyword.
    #[error("SPARQL pattern without known keyword found outside graph in stream \
             query WHERE clause: {0}")]
    UnexpectedTopLevelExpression(String),

    /// The stream query's WHERE clause references no stream graph at all.
    #[error("stream query should at least contain 1 graph on stream IRI in WHERE clause")]
    NoStreamGraphReference,

    /// The stream-to-final-query variable mapping is not a valid partial
    /// bijection between the two queries' variables.
    #[error("{0}")]
    InvalidVariableMapping(String),

    /// A window parameter variable has neither a configured default value
    /// nor an occurrence in the context part, or has both.
    #[error("{0}")]
    InvalidWindowParameter(String),

    /// The result clause references variables that are neither bound in
    /// the WHERE clause nor substituted during the query derivation.
    #[error("{0}")]
    UnboundResultVariable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_offending_token() {
        let err = ParserError::UndefinedPrefix("ex:".to_string());
        assert_eq!(
            err.to_string(),
            "query string contains undefined prefix 'ex:'"
        );
    }

    #[test]
    fn display_includes_query_form() {
        let err = ParserError::MissingWhereClause(QueryForm::Ask);
        assert!(err.to_string().contains("ASK"));
    }
}
