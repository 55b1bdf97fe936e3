//! Input and output containers of the query derivation parser.
//!
//! A [`ParserInput`] bundles everything the caller hands over for one
//! derivation: the queries themselves, the stream window metadata and the
//! optional solution modifier and variable mapping. It is validated once and
//! then preprocessed into a normalized copy before any parsing starts.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ParserError, ParserResult};
use crate::query::QueryForm;
use crate::window::WindowParameter;

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Query language of the incoming query set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputQueryLanguage {
    /// A chain of regular SPARQL queries, with the window parameters of each
    /// stream given separately as [`StreamWindow`] entries.
    Sparql,
    /// A single RSP-QL query which already carries its window definitions in
    /// the `FROM NAMED WINDOW` clauses.
    RspQl,
}

impl fmt::Display for InputQueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputQueryLanguage::Sparql => write!(f, "SPARQL"),
            InputQueryLanguage::RspQl => write!(f, "RSP-QL"),
        }
    }
}

/// Window metadata of a single input stream.
///
/// The stream IRI is spelled exactly as it appears in the queries,
/// including its angle brackets. For SPARQL inputs the
/// `window_definition` is required, since the queries themselves only
/// reference the stream IRI. For RSP-QL inputs the definition lives in
/// the query itself, so an entry usually just supplies default window
/// parameter values; a definition given anyway must match the one in
/// the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamWindow {
    pub stream_iri: String,
    pub window_definition: Option<String>,
    pub default_window_parameter_values: BTreeMap<String, String>,
}

impl StreamWindow {
    pub fn new(stream_iri: impl Into<String>, window_definition: impl Into<String>) -> Self {
        StreamWindow {
            stream_iri: stream_iri.into().trim().to_string(),
            window_definition: Some(window_definition.into()),
            default_window_parameter_values: BTreeMap::new(),
        }
    }

    /// Creates an entry that only carries default parameter values, as used
    /// for RSP-QL inputs where the definition lives in the query itself.
    pub fn defaults_only(
        stream_iri: impl Into<String>,
        default_window_parameter_values: BTreeMap<String, String>,
    ) -> Self {
        StreamWindow {
            stream_iri: stream_iri.into().trim().to_string(),
            window_definition: None,
            default_window_parameter_values,
        }
    }

    pub fn with_default_parameter_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.default_window_parameter_values = values;
        self
    }

    fn is_valid(&self) -> bool {
        !self.stream_iri.trim().is_empty()
            && self
                .window_definition
                .as_deref()
                .is_some_and(|definition| !definition.trim().is_empty())
    }
}

/// Full input of a single query derivation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserInput {
    pub input_query_language: InputQueryLanguage,
    pub stream_windows: Vec<StreamWindow>,
    pub stream_query: String,
    pub intermediate_queries: Vec<String>,
    pub final_query: Option<String>,
    pub solution_modifier: String,
    pub stream_to_final_query_variable_mapping: BTreeMap<String, String>,
}

impl ParserInput {
    pub fn new(
        input_query_language: InputQueryLanguage,
        stream_query: impl Into<String>,
    ) -> Self {
        ParserInput {
            input_query_language,
            stream_windows: Vec::new(),
            stream_query: stream_query.into(),
            intermediate_queries: Vec::new(),
            final_query: None,
            solution_modifier: String::new(),
            stream_to_final_query_variable_mapping: BTreeMap::new(),
        }
    }

    pub fn with_stream_windows(mut self, stream_windows: Vec<StreamWindow>) -> Self {
        self.stream_windows = stream_windows;
        self
    }

    pub fn with_intermediate_queries(mut self, intermediate_queries: Vec<String>) -> Self {
        self.intermediate_queries = intermediate_queries;
        self
    }

    pub fn with_final_query(mut self, final_query: impl Into<String>) -> Self {
        self.final_query = Some(final_query.into());
        self
    }

    pub fn with_solution_modifier(mut self, solution_modifier: impl Into<String>) -> Self {
        self.solution_modifier = solution_modifier.into();
        self
    }

    pub fn with_variable_mapping(mut self, mapping: BTreeMap<String, String>) -> Self {
        self.stream_to_final_query_variable_mapping = mapping;
        self
    }

    /// Checks the structural consistency of the input before any parsing.
    pub fn validate(&self) -> ParserResult<()> {
        match self.input_query_language {
            InputQueryLanguage::RspQl => {
                // an RSP-QL query carries its window definitions itself, so
                // separate entries may only supply default parameter values
                if !self.stream_windows.iter().all(|window| {
                    !window.stream_iri.is_empty()
                        && !window.default_window_parameter_values.is_empty()
                }) {
                    return Err(ParserError::InvalidInput(
                        "stream windows should only be specified for an RSP-QL query if they \
                         contain the stream IRI and a non-empty list of default window \
                         parameter values - otherwise you should only define them in the \
                         RSP-QL stream query"
                            .to_string(),
                    ));
                }
            }
            InputQueryLanguage::Sparql => {
                // a SPARQL stream query only references stream IRIs, so the
                // window parameters must come in as separate entries
                if self.stream_windows.is_empty() {
                    return Err(ParserError::InvalidInput(
                        "no names & window parameters specified of the stream graph IRI(s)"
                            .to_string(),
                    ));
                }
                if !self.stream_windows.iter().all(StreamWindow::is_valid) {
                    return Err(ParserError::InvalidInput(
                        "some of the defined stream windows are incomplete or invalid"
                            .to_string(),
                    ));
                }
            }
        }

        if self.stream_query.trim().is_empty() {
            return Err(ParserError::InvalidInput(
                "no stream query specified".to_string(),
            ));
        }

        // an RSP-QL input is a single query, nothing can follow it
        if self.input_query_language == InputQueryLanguage::RspQl
            && (!self.intermediate_queries.is_empty() || self.has_final_query())
        {
            return Err(ParserError::InvalidInput(
                "final and/or intermediate queries are specified, which is not possible \
                 if the input query language is RSP-QL"
                    .to_string(),
            ));
        }

        if self.intermediate_queries.iter().any(|query| query.is_empty()) {
            return Err(ParserError::InvalidInput(
                "some of the intermediate queries are invalid or empty".to_string(),
            ));
        }

        if !self.stream_to_final_query_variable_mapping.is_empty()
            && (self.input_query_language != InputQueryLanguage::Sparql
                || !self.has_final_query())
        {
            return Err(ParserError::InvalidInput(
                "a variable mapping from stream to final query can only be provided if the \
                 input query language is SPARQL and if a final query is specified"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Returns a normalized copy in which every query is collapsed to a
    /// single line and the solution modifier is ready for template insertion.
    pub fn preprocess(self) -> Self {
        let solution_modifier = if self.solution_modifier.trim().is_empty() {
            String::new()
        } else {
            format!("{} ", preprocess_query(&self.solution_modifier))
        };
        ParserInput {
            input_query_language: self.input_query_language,
            stream_windows: self.stream_windows,
            stream_query: preprocess_query(&self.stream_query),
            intermediate_queries: self
                .intermediate_queries
                .iter()
                .map(|query| preprocess_query(query))
                .collect(),
            final_query: self.final_query.as_deref().map(preprocess_query),
            solution_modifier,
            stream_to_final_query_variable_mapping: self.stream_to_final_query_variable_mapping,
        }
    }

    pub fn has_final_query(&self) -> bool {
        self.final_query
            .as_deref()
            .is_some_and(|query| !query.trim().is_empty())
    }
}

pub(crate) fn preprocess_query(query: &str) -> String {
    WHITESPACE_REGEX.replace_all(query, " ").trim().to_string()
}

/// Result of a successful query derivation: the three artifacts handed to
/// the reasoning component, plus the form of the derived RSP-QL query and
/// the window parameters listed in the sensor query rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOutput {
    pub query_pattern: String,
    pub sensor_query_rule: String,
    pub goal: String,
    pub query_form: QueryForm,
    /// Window parameters of all stream windows, in window order.
    pub window_parameters: Vec<WindowParameter>,
}

impl ParserOutput {
    pub fn new(
        query_pattern: String,
        sensor_query_rule: String,
        goal: String,
        query_form: QueryForm,
    ) -> Self {
        ParserOutput {
            query_pattern,
            sensor_query_rule,
            goal,
            query_form,
            window_parameters: Vec::new(),
        }
    }

    pub fn with_window_parameters(mut self, window_parameters: Vec<WindowParameter>) -> Self {
        self.window_parameters = window_parameters;
        self
    }

    pub fn is_non_empty(&self) -> bool {
        !self.query_pattern.is_empty()
            && !self.sensor_query_rule.is_empty()
            && !self.goal.is_empty()
    }
}
