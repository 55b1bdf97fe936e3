//! Orchestration of the query derivation pipeline.
//!
//! [`DivideQueryParser`] turns one [`ParserInput`] into the three textual
//! artifacts that drive the query derivation of an external reasoner: the
//! query pattern, the sensor query rule and the goal. It chains the other
//! modules of this crate: variable hygiene, query splitting, WHERE clause
//! partitioning, window conversion and artifact generation.
//!
//! Two input shapes are normalized by rewriting and rerunning the
//! pipeline: a non-CONSTRUCT stream query without final query becomes an
//! equivalent CONSTRUCT and final query pair, and a non-CONSTRUCT RSP-QL
//! query is translated to the SPARQL input format first.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use log::debug;
use oxigraph::sparql::{QueryResults, SparqlEvaluator};
use oxigraph::store::Store;
use regex::Regex;

use crate::body::{self, RspQlQueryBody};
use crate::error::{ParserError, ParserResult};
use crate::generator;
use crate::hygiene::{self, CleanInput};
use crate::input::{self, InputQueryLanguage, ParserInput, ParserOutput, StreamWindow};
use crate::query::{ParsedQuery, Prefix, QueryForm};
use crate::sparql;
use crate::splitter;
use crate::where_clause::{self, PartitionedWhereClause, WhereClauseItem};
use crate::window::{self, ConvertedStreamWindow, ParsedStreamWindow, WindowParameter};

static WINDOW_REFERENCE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"WINDOW\s+(\S+)").unwrap());
static GROUP_BY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)GROUP\s+BY").unwrap());
static GROUP_BY_END_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ORDER|LIMIT|OFFSET").unwrap());
static SELECT_EXPRESSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\(\s*(\S+)\s+AS\s+(\?(?:{}))\s*\)$",
        sparql::varname()
    ))
    .unwrap()
});
static FULL_VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^\?(?:{})$", sparql::varname())).unwrap());

/// Compiler of declarative query input into the three artifacts of the
/// query derivation: a query pattern, a sensor query rule and a goal.
///
/// A parser carries no per-derivation state. The flags set at
/// construction apply to every [`parse`](DivideQueryParser::parse) call.
#[derive(Debug, Clone)]
pub struct DivideQueryParser {
    process_unmapped_variable_matches: bool,
    validate_unbound_variables: bool,
}

impl Default for DivideQueryParser {
    fn default() -> Self {
        DivideQueryParser {
            process_unmapped_variable_matches: true,
            validate_unbound_variables: true,
        }
    }
}

impl DivideQueryParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether a final query variable sharing its name with a stream
    /// query variable counts as mapped to it even when the variable
    /// mapping does not list the pair.
    pub fn with_unmapped_variable_matching(mut self, enabled: bool) -> Self {
        self.process_unmapped_variable_matches = enabled;
        self
    }

    /// Sets whether the result part of the derived RSP-QL query body is
    /// checked for variables that would stay unbound after derivation.
    pub fn with_result_variable_validation(mut self, enabled: bool) -> Self {
        self.validate_unbound_variables = enabled;
        self
    }

    /// Derives the query pattern, sensor query rule and goal for the
    /// given input.
    ///
    /// The input is validated and whitespace-normalized first. All query
    /// rewriting happens on copies with collision-free variable names;
    /// the returned artifacts spell every variable the way the input
    /// does.
    pub fn parse(&self, input: ParserInput) -> ParserResult<ParserOutput> {
        input.validate()?;
        let input = input.preprocess();
        let input = hygiene::process_stream_to_final_query_variable_mapping(
            input,
            self.process_unmapped_variable_matches,
        )?;
        let clean = hygiene::clean_input_from_overlapping_variables(input);
        debug!(
            "deriving artifacts from {} input with {} stream window(s)",
            clean.input.input_query_language,
            clean.input.stream_windows.len()
        );

        let pattern_counter = generator::next_pattern_counter();
        let output = match clean.input.input_query_language {
            InputQueryLanguage::Sparql => {
                self.parse_from_sparql_queries(&clean, pattern_counter)?
            }
            InputQueryLanguage::RspQl => self.parse_from_rsp_ql_query(&clean, pattern_counter)?,
        };

        Ok(hygiene::restore_original_variables_in_output(
            output,
            &clean.variable_mapping,
        ))
    }

    /// Splits a SPARQL query and resolves the prefixes it uses.
    pub fn parse_sparql_query(&self, query: &str) -> ParserResult<ParsedQuery> {
        splitter::parse_sparql_query(query)
    }

    /// Validates a set of context-enriching queries: each must be an
    /// executable CONSTRUCT query without FROM clauses and without
    /// solution modifiers.
    pub fn validate_context_enrichment(&self, queries: &[String]) -> ParserResult<()> {
        for query in queries {
            let query = input::preprocess_query(query);
            let split = splitter::split_sparql_query(&query)?;
            if split.form != QueryForm::Construct {
                return Err(ParserError::InvalidInput(
                    "context-enriching query should be of CONSTRUCT form".to_string(),
                ));
            }
            if split.has_from_part() {
                return Err(ParserError::InvalidInput(
                    "context-enriching query should not contain any FROM clauses".to_string(),
                ));
            }
            if split.has_trailing_part() {
                return Err(ParserError::InvalidInput(
                    "context-enriching query should not contain any solution modifiers".to_string(),
                ));
            }
            execute_against_empty_store(&query)?;
        }
        Ok(())
    }

    /// Parses a chain of SPARQL input queries into the derivation
    /// artifacts.
    fn parse_from_sparql_queries(
        &self,
        clean: &CleanInput,
        pattern_counter: u64,
    ) -> ParserResult<ParserOutput> {
        validate_sparql_query(&clean.input.stream_query, "stream")?;
        let parsed_stream_query = splitter::parse_sparql_query(&clean.input.stream_query)?;

        // without a final query, a non-CONSTRUCT stream query is first
        // rewritten into an equivalent CONSTRUCT and final query pair
        if !clean.input.has_final_query() && parsed_stream_query.split.form != QueryForm::Construct
        {
            return self.parse_transformed_stream_query(
                clean,
                &parsed_stream_query,
                pattern_counter,
            );
        }

        if parsed_stream_query.split.has_trailing_part() {
            return Err(disallowed_solution_modifier_error());
        }

        for stream_window in &clean.input.stream_windows {
            window::validate_window_definition(stream_window)?;
        }

        let (input_graph_names, from_part_leftover) =
            splitter::retrieve_graph_names_from_sparql_from_part(
                &parsed_stream_query.split.from_part,
                &parsed_stream_query.prefixes,
            )?;
        let from_part_leftover = splitter::remove_sparql_default_graph_clauses(&from_part_leftover);
        if !from_part_leftover.trim().is_empty() {
            return Err(ParserError::MalformedQuery(format!(
                "SPARQL query contains invalid part '{from_part_leftover}'"
            )));
        }

        let items = where_clause::parse_where_clause(
            &parsed_stream_query.split.where_part,
            &parsed_stream_query.prefixes,
            &input_graph_names,
            InputQueryLanguage::Sparql,
        )?;

        let stream_iris: Vec<String> = clean
            .input
            .stream_windows
            .iter()
            .map(|stream_window| stream_window.stream_iri.clone())
            .collect();
        let partitioned = where_clause::partition_stream_query_where_clause(items, &stream_iris)?;
        ensure_stream_graph_reference(&partitioned)?;

        let solution_modifier_variables =
            validate_solution_modifier(&clean.input.solution_modifier)?;

        let parsed_stream_windows = validate_window_variables(
            &clean.input.stream_windows,
            &partitioned.context_part,
            &clean.variable_mapping,
        )?;

        let derived = if clean.input.has_final_query() {
            parse_final_and_intermediate_queries(&clean.input, &parsed_stream_query)?
        } else {
            // the stream query is known to be a CONSTRUCT query here, so
            // its result doubles as goal antecedent and consequence
            let result_part = parsed_stream_query.split.result_part.clone();
            DerivedQueryParts {
                query_output: result_part.clone(),
                query_form: parsed_stream_query.split.form,
                goal: generator::create_goal(
                    &parsed_stream_query.prefixes,
                    &result_part,
                    &result_part,
                ),
                intermediate_queries: Vec::new(),
                query_pattern_prefixes: parsed_stream_query.prefixes.clone(),
                sensor_query_rule_prefixes: parsed_stream_query.prefixes.clone(),
            }
        };

        self.generate_artifacts(
            clean,
            derived,
            &partitioned,
            parsed_stream_query.split.result_part.clone(),
            &parsed_stream_windows,
            &solution_modifier_variables,
            pattern_counter,
        )
    }

    /// Rewrites a non-CONSTRUCT stream query without final query into an
    /// equivalent CONSTRUCT and final query pair, and reruns the SPARQL
    /// parsing on the rewritten input.
    ///
    /// The CONSTRUCT template links both queries through freshly
    /// generated marker properties, one triple per result variable. An
    /// ASK query has no result variables and gets a single marker
    /// triple.
    fn parse_transformed_stream_query(
        &self,
        clean: &CleanInput,
        parsed_stream_query: &ParsedQuery,
        pattern_counter: u64,
    ) -> ParserResult<ParserOutput> {
        let split = &parsed_stream_query.split;
        let (construct_template, final_query) = match split.form {
            QueryForm::Select => {
                let select_variables: Vec<String> =
                    splitter::parse_select_clause(&split.result_part)
                        .into_iter()
                        .filter(|entry| FULL_VARIABLE_REGEX.is_match(entry))
                        .collect();
                let template = marker_template(&select_variables);
                let final_query = format!(
                    "{} SELECT {} WHERE {{ {template} }}",
                    split.prefix_part, split.result_part
                )
                .trim()
                .to_string();
                (template, final_query)
            }
            QueryForm::Describe => {
                let describe_variables = sparql::find_unbound_variables(&split.result_part);
                let template = marker_template(&describe_variables);
                let final_query = format!(
                    "{} DESCRIBE {} WHERE {{ {template} }}",
                    split.prefix_part, split.result_part
                )
                .trim()
                .to_string();
                (template, final_query)
            }
            // ASK; a CONSTRUCT query never reaches this rewrite
            _ => {
                let template = format!(
                    "{} {} {} .",
                    sparql::marker_property_iri(),
                    sparql::marker_property_iri(),
                    sparql::marker_property_iri()
                );
                let final_query = format!("{} ASK WHERE {{ {template} }}", split.prefix_part)
                    .trim()
                    .to_string();
                (template, final_query)
            }
        };

        let stream_query = format!(
            "{}\nCONSTRUCT\n{{\n{construct_template}\n}}\n{}\nWHERE {{\n{}\n}} {}",
            split.prefix_part, split.from_part, split.where_part, split.trailing_part
        )
        .trim()
        .to_string();

        let input = ParserInput::new(clean.input.input_query_language, stream_query)
            .with_stream_windows(clean.input.stream_windows.clone())
            .with_final_query(final_query)
            .with_solution_modifier(clean.input.solution_modifier.clone())
            .with_variable_mapping(clean.input.stream_to_final_query_variable_mapping.clone())
            .preprocess();
        let clean = CleanInput {
            input,
            unbound_variables: clean.unbound_variables.clone(),
            variable_mapping: clean.variable_mapping.clone(),
        };
        self.parse_from_sparql_queries(&clean, pattern_counter)
    }

    /// Parses an RSP-QL input query into the derivation artifacts.
    fn parse_from_rsp_ql_query(
        &self,
        clean: &CleanInput,
        pattern_counter: u64,
    ) -> ParserResult<ParserOutput> {
        let parsed_stream_query = splitter::parse_rsp_ql_query(&clean.input.stream_query)?;

        if parsed_stream_query.split.has_trailing_part() {
            return Err(disallowed_solution_modifier_error());
        }

        let from_part =
            splitter::remove_rsp_ql_default_graph_clauses(&parsed_stream_query.split.from_part);
        let (mut input_graph_names, from_part_leftover) =
            splitter::retrieve_graph_names_from_rsp_ql_from_part(
                &from_part,
                &parsed_stream_query.prefixes,
            )?;
        let completed_stream_windows = window::complete_stream_windows_from_rsp_ql_from_part(
            &clean.input.stream_windows,
            &from_part_leftover,
            &parsed_stream_query.prefixes,
        )?;
        input_graph_names.extend(
            completed_stream_windows
                .iter()
                .map(|(window_name, _)| window_name.clone()),
        );

        // only CONSTRUCT RSP-QL queries are processed directly; other
        // forms are translated to the SPARQL input format first
        if parsed_stream_query.split.form != QueryForm::Construct {
            return self.parse_translated_rsp_ql_query(
                clean,
                &parsed_stream_query,
                &input_graph_names,
                &completed_stream_windows,
                pattern_counter,
            );
        }

        let items = where_clause::parse_where_clause(
            &parsed_stream_query.split.where_part,
            &parsed_stream_query.prefixes,
            &input_graph_names,
            InputQueryLanguage::RspQl,
        )?;

        // stripped of its WINDOW and GRAPH wrappers the query must read
        // as one plain CONSTRUCT query
        let prefix_declarations = parsed_stream_query
            .prefixes
            .iter()
            .map(|prefix| format!("PREFIX {} {}", prefix.name, prefix.uri))
            .collect::<Vec<_>>()
            .join(" ");
        let item_clauses = items
            .iter()
            .map(|item| match item {
                WhereClauseItem::Expression(expression) => expression.as_str(),
                WhereClauseItem::Graph { clause, .. } => clause.as_str(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        validate_sparql_query(
            &format!(
                "{prefix_declarations} CONSTRUCT {{ {} }} WHERE {{ {item_clauses} }}",
                parsed_stream_query.split.result_part
            ),
            "stream",
        )?;

        // graph patterns on a window name switch to the stream IRI of
        // that window
        let items: Vec<WhereClauseItem> = items
            .into_iter()
            .map(|item| match item {
                WhereClauseItem::Graph { name, clause } => {
                    let name = completed_stream_windows
                        .iter()
                        .find(|(window_name, _)| *window_name == name)
                        .map(|(_, stream_window)| stream_window.stream_iri.clone())
                        .unwrap_or(name);
                    WhereClauseItem::Graph { name, clause }
                }
                item => item,
            })
            .collect();

        let stream_iris: Vec<String> = completed_stream_windows
            .iter()
            .map(|(_, stream_window)| stream_window.stream_iri.clone())
            .collect();
        let partitioned = where_clause::partition_stream_query_where_clause(items, &stream_iris)?;
        ensure_stream_graph_reference(&partitioned)?;

        let solution_modifier_variables =
            validate_solution_modifier(&clean.input.solution_modifier)?;

        let stream_windows: Vec<StreamWindow> = completed_stream_windows
            .into_iter()
            .map(|(_, stream_window)| stream_window)
            .collect();
        let parsed_stream_windows = validate_window_variables(
            &stream_windows,
            &partitioned.context_part,
            &clean.variable_mapping,
        )?;

        let result_part = parsed_stream_query.split.result_part.clone();
        let derived = DerivedQueryParts {
            query_output: result_part.clone(),
            query_form: parsed_stream_query.split.form,
            goal: generator::create_goal(&parsed_stream_query.prefixes, &result_part, &result_part),
            intermediate_queries: Vec::new(),
            query_pattern_prefixes: parsed_stream_query.prefixes.clone(),
            sensor_query_rule_prefixes: parsed_stream_query.prefixes.clone(),
        };

        self.generate_artifacts(
            clean,
            derived,
            &partitioned,
            result_part,
            &parsed_stream_windows,
            &solution_modifier_variables,
            pattern_counter,
        )
    }

    /// Translates a non-CONSTRUCT RSP-QL query to the SPARQL input
    /// format and reruns the SPARQL parsing on it. Named windows become
    /// named graphs on the stream IRI, with the window definitions
    /// carried over as separate stream windows.
    fn parse_translated_rsp_ql_query(
        &self,
        clean: &CleanInput,
        parsed_stream_query: &ParsedQuery,
        input_graph_names: &[String],
        completed_stream_windows: &[(String, StreamWindow)],
        pattern_counter: u64,
    ) -> ParserResult<ParserOutput> {
        let mut from_part = String::new();
        for input_graph_name in input_graph_names {
            let stream_iri = completed_stream_windows
                .iter()
                .find(|(window_name, _)| window_name == input_graph_name)
                .map(|(_, stream_window)| stream_window.stream_iri.as_str())
                .unwrap_or(input_graph_name);
            from_part.push_str(&format!("FROM NAMED {stream_iri} "));
        }

        let mut where_clause = parsed_stream_query.split.where_part.clone();
        loop {
            let reference = WINDOW_REFERENCE_REGEX
                .captures(&where_clause)
                .map(|captures| {
                    (
                        captures.get(0).map_or(0..0, |found| found.range()),
                        captures[1].to_string(),
                    )
                });
            let Some((range, window_reference)) = reference else {
                break;
            };
            let window_name =
                sparql::resolve_graph_name(&window_reference, &parsed_stream_query.prefixes)?;
            let stream_iri = completed_stream_windows
                .iter()
                .find(|(name, _)| *name == window_name)
                .map(|(_, stream_window)| stream_window.stream_iri.clone())
                .ok_or_else(|| {
                    ParserError::InvalidWindowDefinition(format!(
                        "window name '{window_name}' is not defined in the FROM part of the \
                         RSP-QL stream query"
                    ))
                })?;
            where_clause.replace_range(range, &format!("GRAPH {stream_iri}"));
        }

        let stream_query = format!(
            "{} {} {} {} WHERE {{ {} }} {}",
            parsed_stream_query.split.prefix_part,
            parsed_stream_query.split.form,
            parsed_stream_query.split.result_part,
            from_part,
            where_clause,
            parsed_stream_query.split.trailing_part
        );

        let stream_windows: Vec<StreamWindow> = completed_stream_windows
            .iter()
            .map(|(_, stream_window)| stream_window.clone())
            .collect();
        let input = ParserInput::new(InputQueryLanguage::Sparql, stream_query)
            .with_stream_windows(stream_windows)
            .with_solution_modifier(clean.input.solution_modifier.clone())
            .with_variable_mapping(clean.input.stream_to_final_query_variable_mapping.clone())
            .preprocess();
        let clean = CleanInput {
            input,
            unbound_variables: clean.unbound_variables.clone(),
            variable_mapping: clean.variable_mapping.clone(),
        };
        self.parse_from_sparql_queries(&clean, pattern_counter)
    }

    /// Converts the parsed stream windows and builds the three artifacts
    /// from the partitioned stream query and the branch-dependent derived
    /// parts.
    fn generate_artifacts(
        &self,
        clean: &CleanInput,
        derived: DerivedQueryParts,
        partitioned: &PartitionedWhereClause,
        stream_query_result_part: String,
        parsed_stream_windows: &[ParsedStreamWindow],
        solution_modifier_variables: &[String],
        pattern_counter: u64,
    ) -> ParserResult<ParserOutput> {
        let mut converted_stream_windows = Vec::new();
        for parsed_stream_window in parsed_stream_windows {
            converted_stream_windows.push(window::convert_parsed_stream_window(
                parsed_stream_window,
                &clean.unbound_variables,
            )?);
        }

        let DerivedQueryParts {
            mut query_output,
            query_form,
            goal,
            intermediate_queries,
            query_pattern_prefixes,
            sensor_query_rule_prefixes,
        } = derived;
        let mut context_part = partitioned.context_part.clone();
        let mut stream_items = partitioned.stream_items.clone();
        let mut stream_query_result_part = stream_query_result_part;
        let mut solution_modifier = clean.input.solution_modifier.clone();

        let mut rsp_ql_query_body = body::create_rsp_ql_query_body(
            query_form,
            &query_output,
            &stream_items,
            &solution_modifier,
            &converted_stream_windows,
        )?;

        let mut input_variables = where_clause::retrieve_input_variables(
            &context_part,
            &rsp_ql_query_body.unbound_variables,
        );

        if self.validate_unbound_variables {
            validate_unbound_variables_in_rsp_ql_query_body(
                &rsp_ql_query_body,
                &input_variables,
                &clean.variable_mapping,
            )?;
        }

        // input variables are substituted during the derivation, so the
        // modifier cannot sort or group on them
        if input_variables
            .iter()
            .any(|variable| solution_modifier_variables.contains(variable))
        {
            return Err(ParserError::DisallowedSolutionModifier(
                "solution modifier contains variable that will be instantiated by the query \
                 derivation"
                    .to_string(),
            ));
        }
        let body_variables = sparql::find_unbound_variables(
            &rsp_ql_query_body.body.replace(&solution_modifier, ""),
        );
        if !solution_modifier_variables
            .iter()
            .all(|variable| body_variables.contains(variable))
        {
            return Err(ParserError::DisallowedSolutionModifier(
                "solution modifier contains variables that do not occur in the instantiated \
                 RSP-QL query body"
                    .to_string(),
            ));
        }

        // a SELECT output listing an input variable would lose that
        // variable to the substitution, so the substituted spelling is
        // aliased back to the selected name
        if query_form == QueryForm::Select {
            let select_variables = splitter::parse_select_clause(&query_output);
            let select_input_variables: Vec<String> = select_variables
                .iter()
                .filter(|variable| input_variables.contains(*variable))
                .cloned()
                .collect();
            if !select_input_variables.is_empty() {
                let mut renames: BTreeMap<String, String> = BTreeMap::new();
                for variable in &select_input_variables {
                    renames.insert(
                        variable.clone(),
                        sparql::generate_variable_outside(&clean.unbound_variables),
                    );
                }

                input_variables = input_variables
                    .into_iter()
                    .map(|variable| renames.get(&variable).cloned().unwrap_or(variable))
                    .collect();

                for (variable, renamed) in &renames {
                    context_part = context_part.replace(variable.as_str(), renamed);
                    stream_query_result_part =
                        stream_query_result_part.replace(variable.as_str(), renamed);
                    solution_modifier = solution_modifier.replace(variable.as_str(), renamed);
                }

                converted_stream_windows = converted_stream_windows
                    .into_iter()
                    .map(|stream_window| rename_window_variables(stream_window, &renames))
                    .collect();

                query_output = select_variables
                    .iter()
                    .map(|variable| match renames.get(variable) {
                        Some(renamed) => format!("({renamed} AS {variable})"),
                        None => variable.clone(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");

                stream_items = stream_items
                    .into_iter()
                    .map(|item| rename_item_variables(item, &renames))
                    .collect();

                rsp_ql_query_body = body::create_rsp_ql_query_body(
                    query_form,
                    &query_output,
                    &stream_items,
                    &solution_modifier,
                    &converted_stream_windows,
                )?;
            }
        }

        let sensor_query_rule_result = generator::extend_output_of_stream_query(
            &stream_items,
            &stream_query_result_part,
            &sensor_query_rule_prefixes,
        )?;

        let query_pattern = generator::create_query_pattern(
            query_form,
            &query_pattern_prefixes,
            &rsp_ql_query_body.body,
            pattern_counter,
        );

        let output_variables =
            where_clause::retrieve_output_variables(&context_part, &sensor_query_rule_result);

        let all_window_parameters: Vec<WindowParameter> = converted_stream_windows
            .iter()
            .flat_map(|stream_window| stream_window.window_parameters.iter().cloned())
            .collect();

        let sensor_query_rule = generator::create_sensor_query_rule(
            &sensor_query_rule_prefixes,
            &context_part,
            &sensor_query_rule_result,
            &input_variables,
            &all_window_parameters,
            &output_variables,
            &intermediate_queries,
        );

        debug!(
            "derived {} query pattern with {} input variable(s), {} output variable(s) and \
             {} window parameter(s)",
            query_form.lowercase(),
            input_variables.len(),
            output_variables.len(),
            all_window_parameters.len()
        );

        Ok(
            ParserOutput::new(query_pattern, sensor_query_rule, goal, query_form)
                .with_window_parameters(all_window_parameters),
        )
    }
}

/// Artifact inputs that differ between a derivation with and without a
/// final query.
struct DerivedQueryParts {
    query_output: String,
    query_form: QueryForm,
    goal: String,
    intermediate_queries: Vec<ParsedQuery>,
    query_pattern_prefixes: Vec<Prefix>,
    sensor_query_rule_prefixes: Vec<Prefix>,
}

/// Parses and validates the final and intermediate queries, deriving the
/// query output, goal and prefix sets from them.
fn parse_final_and_intermediate_queries(
    input: &ParserInput,
    parsed_stream_query: &ParsedQuery,
) -> ParserResult<DerivedQueryParts> {
    // only the last query of the chain may have a non-CONSTRUCT form
    if parsed_stream_query.split.form != QueryForm::Construct {
        return Err(ParserError::InvalidInput(
            "stream query should be a CONSTRUCT query if another final query is specified"
                .to_string(),
        ));
    }

    let final_query = input.final_query.as_deref().unwrap_or_default();
    let parsed_final_query = splitter::parse_sparql_query(final_query)?;

    if !parsed_final_query.split.has_where_part() {
        return Err(ParserError::MissingWhereClause(parsed_final_query.split.form));
    }
    // an ASK query carries no result part, so anything between the
    // keyword and WHERE is a syntax error the splitter cannot attribute
    if parsed_final_query.split.form == QueryForm::Ask
        && !parsed_final_query.split.result_part.trim().is_empty()
    {
        return Err(ParserError::MalformedQuery(
            "final query of ASK form should fulfill regex 'ASK (FROM .*)* WHERE {.*}'".to_string(),
        ));
    }
    if parsed_final_query.split.has_from_part() {
        return Err(ParserError::InvalidInput(
            "final query cannot contain any FROM parts".to_string(),
        ));
    }
    if parsed_final_query.split.has_trailing_part() {
        return Err(disallowed_solution_modifier_error());
    }

    let parsed_final_query =
        solve_prefix_conflicts(&parsed_stream_query.prefixes, parsed_final_query);

    let query_output = parsed_final_query.split.result_part.clone();
    let query_form = parsed_final_query.split.form;

    let mut query_pattern_prefixes = parsed_stream_query.prefixes.clone();
    query_pattern_prefixes.extend(parsed_final_query.prefixes.iter().cloned());
    query_pattern_prefixes.sort();
    query_pattern_prefixes.dedup();

    let mut sensor_query_rule_prefixes = parsed_stream_query.prefixes.clone();

    let goal = if query_form == QueryForm::Construct {
        generator::create_goal(
            &parsed_final_query.prefixes,
            &parsed_final_query.split.where_part,
            &query_output,
        )
    } else {
        // a SELECT, ASK or DESCRIBE goal matches on the final query
        // WHERE clause without deriving anything new from it
        generator::create_goal(
            &parsed_final_query.prefixes,
            &parsed_final_query.split.where_part,
            &parsed_final_query.split.where_part,
        )
    };

    let mut intermediate_queries = Vec::new();
    for intermediate_query in &input.intermediate_queries {
        let parsed_intermediate_query = splitter::parse_sparql_query(intermediate_query)?;
        if parsed_intermediate_query.split.has_trailing_part() {
            return Err(disallowed_solution_modifier_error());
        }
        let parsed_intermediate_query =
            solve_prefix_conflicts(&query_pattern_prefixes, parsed_intermediate_query);
        sensor_query_rule_prefixes.extend(parsed_intermediate_query.prefixes.iter().cloned());
        if parsed_intermediate_query.split.form != QueryForm::Construct {
            return Err(ParserError::InvalidInput(
                "intermediate queries should always be CONSTRUCT queries".to_string(),
            ));
        }
        intermediate_queries.push(parsed_intermediate_query);
    }
    sensor_query_rule_prefixes.sort();
    sensor_query_rule_prefixes.dedup();

    Ok(DerivedQueryParts {
        query_output,
        query_form,
        goal,
        intermediate_queries,
        query_pattern_prefixes,
        sensor_query_rule_prefixes,
    })
}

/// One marker triple per variable, with freshly generated properties.
fn marker_template(variables: &[String]) -> String {
    variables
        .iter()
        .map(|variable| {
            format!(
                "{variable} {} {} .",
                sparql::marker_property_iri(),
                sparql::marker_property_iri()
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_sparql_query(query: &str, query_name: &str) -> ParserResult<()> {
    if spargebra::Query::parse(query, None).is_err() {
        return Err(ParserError::MalformedQuery(format!(
            "{query_name} query is invalid SPARQL"
        )));
    }
    Ok(())
}

/// Runs a CONSTRUCT query against an empty store, proving it executable.
fn execute_against_empty_store(query: &str) -> ParserResult<()> {
    let invalid_query_error =
        || ParserError::InvalidInput("context-enriching query should be valid SPARQL".to_string());
    let store = Store::new().map_err(|_| invalid_query_error())?;
    let prepared = SparqlEvaluator::new()
        .parse_query(query)
        .map_err(|_| invalid_query_error())?;
    match prepared.on_store(&store).execute() {
        Ok(QueryResults::Graph(triples)) => {
            for triple in triples {
                triple.map_err(|_| invalid_query_error())?;
            }
            Ok(())
        }
        _ => Err(invalid_query_error()),
    }
}

fn disallowed_solution_modifier_error() -> ParserError {
    ParserError::DisallowedSolutionModifier(
        "input queries cannot contain solution modifiers, since these cannot be preserved \
         in the derived queries; a solution modifier for the derived queries can be defined \
         as a separate input entry"
            .to_string(),
    )
}

fn ensure_stream_graph_reference(partitioned: &PartitionedWhereClause) -> ParserResult<()> {
    if partitioned
        .stream_items
        .iter()
        .any(|item| matches!(item, WhereClauseItem::Graph { .. }))
    {
        Ok(())
    } else {
        Err(ParserError::NoStreamGraphReference)
    }
}

/// Renames every prefix of `parsed` that shares its name with an
/// existing prefix of different URI. An existing name for the same URI
/// is reused, otherwise a fresh prefix name is generated. The renames
/// are applied to all query parts that can carry prefixed names.
fn solve_prefix_conflicts(existing_prefixes: &[Prefix], parsed: ParsedQuery) -> ParsedQuery {
    let conflicting: Vec<Prefix> = parsed
        .prefixes
        .iter()
        .filter(|prefix| {
            existing_prefixes
                .iter()
                .any(|existing| existing.name == prefix.name && existing.uri != prefix.uri)
        })
        .cloned()
        .collect();
    if conflicting.is_empty() {
        return parsed;
    }

    let ParsedQuery {
        mut split,
        mut prefixes,
    } = parsed;
    let replace_in_result_part = matches!(
        split.form,
        QueryForm::Construct | QueryForm::Describe | QueryForm::Select
    );

    for conflicting_prefix in &conflicting {
        let replacement = existing_prefixes
            .iter()
            .find(|existing| existing.uri == conflicting_prefix.uri)
            .cloned()
            .unwrap_or_else(|| {
                Prefix::new(sparql::generate_prefix_name(), conflicting_prefix.uri.clone())
            });

        split.prefix_part = sparql::replace_prefix_name(
            &split.prefix_part,
            &conflicting_prefix.name,
            &replacement.name,
            false,
        );
        if replace_in_result_part {
            split.result_part = sparql::replace_prefix_name(
                &split.result_part,
                &conflicting_prefix.name,
                &replacement.name,
                false,
            );
        }
        split.where_part = sparql::replace_prefix_name(
            &split.where_part,
            &conflicting_prefix.name,
            &replacement.name,
            false,
        );

        prefixes.retain(|prefix| prefix != conflicting_prefix);
        prefixes.push(replacement);
    }

    ParsedQuery::new(split, prefixes)
}

/// Checks the solution modifier for valid SPARQL by attaching it to a
/// synthetic query that binds all its variables, and returns those
/// variables.
fn validate_solution_modifier(solution_modifier: &str) -> ParserResult<Vec<String>> {
    if solution_modifier.trim().is_empty() {
        return Ok(Vec::new());
    }
    let solution_modifier_variables = sparql::find_unbound_variables(solution_modifier);

    // with GROUP BY the synthetic query may only select the grouped
    // variables
    let (select_variables, where_clause_variables) = match group_by_clause(solution_modifier) {
        Some(clause) => (
            sparql::find_unbound_variables(clause),
            solution_modifier_variables.clone(),
        ),
        None => {
            let select_variables = if solution_modifier_variables.is_empty() {
                vec!["?x".to_string()]
            } else {
                solution_modifier_variables.clone()
            };
            (select_variables.clone(), select_variables)
        }
    };

    let synthetic_query = format!(
        "SELECT {} WHERE {{ {} }} {}",
        select_variables.join(" "),
        where_clause_variables
            .iter()
            .map(|variable| format!("{variable} ?a ?b . "))
            .collect::<Vec<_>>()
            .join(" "),
        solution_modifier
    );
    if spargebra::Query::parse(&synthetic_query, None).is_err() {
        return Err(ParserError::DisallowedSolutionModifier(
            "defined solution modifier is no valid SPARQL".to_string(),
        ));
    }
    Ok(solution_modifier_variables)
}

/// The GROUP BY clause of a solution modifier, cut off before any ORDER,
/// LIMIT or OFFSET part.
fn group_by_clause(solution_modifier: &str) -> Option<&str> {
    let keyword = GROUP_BY_REGEX.find(solution_modifier)?;
    let rest = &solution_modifier[keyword.start()..];
    let keyword_len = keyword.len();
    let end = GROUP_BY_END_REGEX
        .find(&rest[keyword_len..])
        .map_or(rest.len(), |found| keyword_len + found.start());
    Some(rest[..end].trim_end())
}

/// Parses every stream window against the variable renames, and checks
/// that each of its variables can be bound during the derivation: the
/// variable must occur in the context part or carry a configured default
/// value, never both.
fn validate_window_variables(
    stream_windows: &[StreamWindow],
    context_part: &str,
    variable_mapping: &BTreeMap<String, String>,
) -> ParserResult<Vec<ParsedStreamWindow>> {
    let context_variables = sparql::find_unbound_variables(context_part);
    let mut parsed_stream_windows = Vec::new();
    for stream_window in stream_windows {
        let parsed = window::parse_stream_window(stream_window, variable_mapping)?;
        for variable in &parsed.unbound_variables {
            let has_default = parsed.default_window_parameter_values.contains_key(variable);
            let in_context = context_variables.contains(variable);
            if has_default && in_context {
                return Err(window_variable_error(
                    variable,
                    variable_mapping,
                    "the first condition is fulfilled, so a default value cannot be \
                     specified in the configuration",
                ));
            }
            if !has_default && !in_context {
                return Err(window_variable_error(
                    variable,
                    variable_mapping,
                    "the first condition is not fulfilled, so a default value should be \
                     specified in the configuration",
                ));
            }
        }
        parsed_stream_windows.push(parsed);
    }
    Ok(parsed_stream_windows)
}

fn window_variable_error(
    variable: &str,
    variable_mapping: &BTreeMap<String, String>,
    condition: &str,
) -> ParserError {
    ParserError::InvalidWindowParameter(format!(
        "variables defined in the stream window parameters should either occur in the \
         context part of the stream query (in order to be able to be substituted during \
         the query derivation), or a default value for this variable should be specified \
         in the configuration; for variable {}, {condition}",
        restore_variable_name(variable, variable_mapping)
    ))
}

/// The original spelling of a variable that the hygiene pass renamed.
fn restore_variable_name(variable: &str, variable_mapping: &BTreeMap<String, String>) -> String {
    variable_mapping
        .iter()
        .find(|(_, renamed)| renamed.as_str() == variable)
        .map(|(original, _)| original.clone())
        .unwrap_or_else(|| variable.to_string())
}

/// Checks the result part of the generated RSP-QL query body for
/// variables that would stay unbound after the query derivation, and for
/// SELECT aliases that would redefine a bound variable.
fn validate_unbound_variables_in_rsp_ql_query_body(
    rsp_ql_query_body: &RspQlQueryBody,
    input_variables: &[String],
    variable_mapping: &BTreeMap<String, String>,
) -> ParserResult<()> {
    let where_clause_variables = sparql::find_unbound_variables(&rsp_ql_query_body.where_clause);
    let (expected_variables, forbidden_variables) = find_unbound_variables_in_query_result_part(
        &rsp_ql_query_body.result_part,
        rsp_ql_query_body.query_form,
    )?;

    let mut problematic = Vec::new();
    for variable in &forbidden_variables {
        if where_clause_variables.contains(variable)
            || input_variables.contains(variable)
            || expected_variables.contains(variable)
        {
            problematic.push(restore_variable_name(variable, variable_mapping));
        }
    }
    if !problematic.is_empty() {
        return Err(ParserError::UnboundResultVariable(format!(
            "the SELECT clause of the resulting RSP-QL query body will contain template \
             variables that are not allowed in the WHERE clause, but that are present \
             there: {} - make sure the SELECT clause of the stream or final query is valid",
            problematic.join(", ")
        )));
    }

    let mut problematic = Vec::new();
    for variable in &expected_variables {
        if !where_clause_variables.contains(variable) && !input_variables.contains(variable) {
            problematic.push(restore_variable_name(variable, variable_mapping));
        }
    }
    if !problematic.is_empty() {
        return Err(ParserError::UnboundResultVariable(format!(
            "resulting RSP-QL query body will contain invalid variables in result part, \
             that are not present in WHERE clause and will also not be replaced during \
             the query derivation: {} - make sure these variables occur in the WHERE \
             clause of the stream query, or map a stream query variable to each of them",
            problematic.join(", ")
        )));
    }
    Ok(())
}

/// The variables of a query result part, split into those that must be
/// bound by the WHERE clause and, for SELECT aliases, those that may
/// not.
fn find_unbound_variables_in_query_result_part(
    result_part: &str,
    query_form: QueryForm,
) -> ParserResult<(Vec<String>, Vec<String>)> {
    if query_form != QueryForm::Select {
        return Ok((sparql::find_unbound_variables(result_part), Vec::new()));
    }

    let entries = splitter::parse_select_clause(result_part);
    if entries.is_empty() {
        return Err(ParserError::MalformedQuery(
            "SELECT clause of resulting RSP-QL query is invalid, which is probably caused \
             by an invalid SELECT clause in the stream or final query"
                .to_string(),
        ));
    }

    let mut expected_variables: Vec<String> = Vec::new();
    let mut forbidden_variables: Vec<String> = Vec::new();
    for entry in &entries {
        if let Some(captures) = SELECT_EXPRESSION_REGEX.captures(entry) {
            let alias_source = captures[1].to_string();
            if FULL_VARIABLE_REGEX.is_match(&alias_source)
                && !expected_variables.contains(&alias_source)
            {
                expected_variables.push(alias_source);
            }
            let alias = captures[2].to_string();
            if !forbidden_variables.contains(&alias) {
                forbidden_variables.push(alias);
            }
        } else if !expected_variables.contains(entry) {
            expected_variables.push(entry.clone());
        }
    }
    Ok((expected_variables, forbidden_variables))
}

/// Applies variable renames to a converted stream window: placeholders
/// in the definition and the parameter list follow the new names.
fn rename_window_variables(
    stream_window: ConvertedStreamWindow,
    renames: &BTreeMap<String, String>,
) -> ConvertedStreamWindow {
    let ConvertedStreamWindow {
        stream_iri,
        mut window_definition,
        window_parameters,
    } = stream_window;
    for (variable, renamed) in renames {
        window_definition = window_definition.replace(
            &sparql::window_placeholder(variable),
            &sparql::window_placeholder(renamed),
        );
    }
    let window_parameters = window_parameters
        .into_iter()
        .map(|parameter| {
            let WindowParameter {
                variable,
                value,
                parameter_type,
                is_substitution_variable,
            } = parameter;
            let variable = renames.get(&variable).cloned().unwrap_or(variable);
            let value = if is_substitution_variable {
                variable.clone()
            } else {
                value
            };
            WindowParameter {
                variable,
                value,
                parameter_type,
                is_substitution_variable,
            }
        })
        .collect();
    ConvertedStreamWindow {
        stream_iri,
        window_definition,
        window_parameters,
    }
}

fn rename_item_variables(
    item: WhereClauseItem,
    renames: &BTreeMap<String, String>,
) -> WhereClauseItem {
    let rename = |mut text: String| {
        for (variable, renamed) in renames {
            text = text.replace(variable.as_str(), renamed);
        }
        text
    };
    match item {
        WhereClauseItem::Expression(expression) => WhereClauseItem::Expression(rename(expression)),
        WhereClauseItem::Graph { name, clause } => WhereClauseItem::Graph {
            name,
            clause: rename(clause),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(name: &str, uri: &str) -> Prefix {
        Prefix::new(name, uri)
    }

    fn parse(query: &str) -> ParsedQuery {
        splitter::parse_sparql_query(query).unwrap()
    }

    #[test]
    fn prefix_conflict_reuses_existing_name_for_same_uri() {
        let existing = vec![
            prefix("ex:", "<http://example.org/>"),
            prefix("other:", "<http://data.example.org/>"),
        ];
        let parsed = parse(
            "PREFIX ex: <http://data.example.org/> CONSTRUCT { ?s ex:p ?o } WHERE { ?s ex:p ?o }",
        );
        let solved = solve_prefix_conflicts(&existing, parsed);
        assert!(solved
            .prefixes
            .contains(&prefix("other:", "<http://data.example.org/>")));
        assert!(solved.split.result_part.contains("other:p"));
        assert!(solved.split.where_part.contains("other:p"));
        assert!(!solved.split.where_part.contains("ex:p"));
    }

    #[test]
    fn prefix_conflict_mints_fresh_name_without_matching_uri() {
        let existing = vec![prefix("ex:", "<http://example.org/>")];
        let parsed = parse(
            "PREFIX ex: <http://data.example.org/> CONSTRUCT { ?s ex:p ?o } WHERE { ?s ex:p ?o }",
        );
        let solved = solve_prefix_conflicts(&existing, parsed);
        let renamed = solved
            .prefixes
            .iter()
            .find(|prefix| prefix.uri == "<http://data.example.org/>")
            .unwrap();
        assert!(renamed.name.starts_with("newPrefix"));
        assert!(solved.split.prefix_part.contains(&renamed.name));
        assert!(solved.split.where_part.contains(&renamed.name));
    }

    #[test]
    fn prefix_without_conflict_stays_untouched() {
        let existing = vec![prefix("ex:", "<http://example.org/>")];
        let parsed = parse(
            "PREFIX ex: <http://example.org/> CONSTRUCT { ?s ex:p ?o } WHERE { ?s ex:p ?o }",
        );
        let solved = solve_prefix_conflicts(&existing, parsed.clone());
        assert_eq!(solved, parsed);
    }

    #[test]
    fn group_by_clause_is_cut_before_order_and_limit() {
        assert_eq!(
            group_by_clause("GROUP BY ?v ORDER BY ?w LIMIT 10"),
            Some("GROUP BY ?v")
        );
        assert_eq!(group_by_clause("ORDER BY ?v LIMIT 10"), None);
        assert_eq!(
            group_by_clause("group by ?v having (count(?s) > 2) offset 5"),
            Some("group by ?v having (count(?s) > 2)")
        );
    }

    #[test]
    fn solution_modifier_validation_returns_its_variables() {
        assert_eq!(validate_solution_modifier("").unwrap(), Vec::<String>::new());
        assert_eq!(
            validate_solution_modifier("LIMIT 10 ").unwrap(),
            Vec::<String>::new()
        );
        assert_eq!(
            validate_solution_modifier("ORDER BY ?v ").unwrap(),
            vec!["?v".to_string()]
        );
        assert_eq!(
            validate_solution_modifier("GROUP BY ?v ").unwrap(),
            vec!["?v".to_string()]
        );
    }

    #[test]
    fn invalid_solution_modifier_is_rejected() {
        let error = validate_solution_modifier("SORT BY ?v ").unwrap_err();
        assert!(matches!(error, ParserError::DisallowedSolutionModifier(_)));
    }

    #[test]
    fn select_result_part_splits_expected_and_forbidden_variables() {
        let (expected, forbidden) =
            find_unbound_variables_in_query_result_part("?v ?w", QueryForm::Select).unwrap();
        assert_eq!(expected, vec!["?v".to_string(), "?w".to_string()]);
        assert!(forbidden.is_empty());

        let (expected, forbidden) =
            find_unbound_variables_in_query_result_part("(?x AS ?y) ?z", QueryForm::Select)
                .unwrap();
        assert_eq!(expected, vec!["?x".to_string(), "?z".to_string()]);
        assert_eq!(forbidden, vec!["?y".to_string()]);

        let (expected, forbidden) =
            find_unbound_variables_in_query_result_part("(COUNT(?a) AS ?c)", QueryForm::Select)
                .unwrap();
        assert!(expected.is_empty());
        assert_eq!(forbidden, vec!["?c".to_string()]);
    }

    #[test]
    fn construct_result_part_expects_all_its_variables() {
        let (expected, forbidden) = find_unbound_variables_in_query_result_part(
            "?s <http://example.org/p> ?o .",
            QueryForm::Construct,
        )
        .unwrap();
        assert_eq!(expected, vec!["?s".to_string(), "?o".to_string()]);
        assert!(forbidden.is_empty());
    }

    #[test]
    fn star_select_clause_in_result_part_is_rejected() {
        let error =
            find_unbound_variables_in_query_result_part("*", QueryForm::Select).unwrap_err();
        assert!(matches!(error, ParserError::MalformedQuery(_)));
    }

    fn body_of(query_form: QueryForm, result_part: &str, where_clause: &str) -> RspQlQueryBody {
        RspQlQueryBody {
            body: format!("SELECT {result_part} WHERE {{ {where_clause} }}"),
            unbound_variables: sparql::find_unbound_variables(where_clause),
            query_form,
            result_part: result_part.to_string(),
            where_clause: where_clause.to_string(),
        }
    }

    #[test]
    fn alias_redefining_bound_variable_is_rejected() {
        let body = body_of(QueryForm::Select, "(?a AS ?b)", "?a ?p ?b .");
        let error =
            validate_unbound_variables_in_rsp_ql_query_body(&body, &[], &BTreeMap::new())
                .unwrap_err();
        assert!(matches!(error, ParserError::UnboundResultVariable(_)));
        assert!(error.to_string().contains("?b"));
    }

    #[test]
    fn unbound_result_variable_is_reported_with_original_name() {
        let body = body_of(QueryForm::Select, "?missing", "?s ?p ?o .");
        let mut variable_mapping = BTreeMap::new();
        variable_mapping.insert("?gone".to_string(), "?missing".to_string());
        let error =
            validate_unbound_variables_in_rsp_ql_query_body(&body, &[], &variable_mapping)
                .unwrap_err();
        assert!(error.to_string().contains("?gone"));
    }

    #[test]
    fn result_variables_bound_by_where_clause_or_inputs_pass() {
        let body = body_of(QueryForm::Select, "?s ?o", "?s ?p ?o .");
        assert!(
            validate_unbound_variables_in_rsp_ql_query_body(&body, &[], &BTreeMap::new()).is_ok()
        );

        let body = body_of(QueryForm::Select, "?c", "?s ?p ?o .");
        assert!(validate_unbound_variables_in_rsp_ql_query_body(
            &body,
            &["?c".to_string()],
            &BTreeMap::new()
        )
        .is_ok());
    }

    #[test]
    fn window_variable_needs_context_occurrence_or_default() {
        let stream_window = StreamWindow::new("<http://example.org/stream>", "RANGE PT?{x}S");
        let error = validate_window_variables(
            &[stream_window],
            "?patient <http://example.org/id> ?id .",
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(error.to_string().contains("should be specified"));
    }

    #[test]
    fn window_variable_default_conflicts_with_context_occurrence() {
        let mut defaults = BTreeMap::new();
        defaults.insert("?x".to_string(), "5".to_string());
        let stream_window = StreamWindow::new("<http://example.org/stream>", "RANGE PT?{x}S")
            .with_default_parameter_values(defaults);
        let error = validate_window_variables(
            &[stream_window],
            "?patient <http://example.org/threshold> ?x .",
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(error.to_string().contains("cannot be specified"));
    }

    #[test]
    fn window_variable_error_uses_the_original_variable_name() {
        let stream_window =
            StreamWindow::new("<http://example.org/stream>", "RANGE PT?{length}S");
        let mut variable_mapping = BTreeMap::new();
        variable_mapping.insert("?length".to_string(), "?a0".to_string());
        let error =
            validate_window_variables(&[stream_window], "", &variable_mapping).unwrap_err();
        assert!(error.to_string().contains("?length"));
        assert!(!error.to_string().contains("?a0"));
    }

    #[test]
    fn context_enrichment_accepts_an_executable_construct_query() {
        let parser = DivideQueryParser::new();
        let queries = vec![
            "PREFIX ex: <http://example.org/> CONSTRUCT { ?s ex:enriched ?v } WHERE { ?s ex:raw ?v }"
                .to_string(),
        ];
        assert!(parser.validate_context_enrichment(&queries).is_ok());
    }

    #[test]
    fn context_enrichment_rejects_non_construct_queries() {
        let parser = DivideQueryParser::new();
        let queries = vec!["SELECT ?s WHERE { ?s ?p ?o }".to_string()];
        let error = parser.validate_context_enrichment(&queries).unwrap_err();
        assert!(error.to_string().contains("CONSTRUCT form"));
    }

    #[test]
    fn context_enrichment_rejects_from_clauses_and_modifiers() {
        let parser = DivideQueryParser::new();
        let with_from = vec![
            "CONSTRUCT { ?s ?p ?o } FROM <http://example.org/graph> WHERE { ?s ?p ?o }"
                .to_string(),
        ];
        let error = parser.validate_context_enrichment(&with_from).unwrap_err();
        assert!(error.to_string().contains("FROM clauses"));

        let with_modifier =
            vec!["CONSTRUCT { ?s ?p ?o } WHERE { ?s ?p ?o } LIMIT 10".to_string()];
        let error = parser
            .validate_context_enrichment(&with_modifier)
            .unwrap_err();
        assert!(error.to_string().contains("solution modifiers"));
    }

    #[test]
    fn context_enrichment_rejects_unexecutable_queries() {
        let parser = DivideQueryParser::new();
        let queries = vec!["CONSTRUCT { ?s ex:p ?o } WHERE { ?s ex:p ?o }".to_string()];
        let error = parser.validate_context_enrichment(&queries).unwrap_err();
        assert!(error.to_string().contains("valid SPARQL"));
    }
}
