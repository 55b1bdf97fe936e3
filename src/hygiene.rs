//! Variable hygiene across the input queries.
//!
//! The derivation substitutes variables by plain text replacement, which
//! is only sound when no variable name is a substring of another. The
//! passes in this module establish that property before parsing starts
//! and undo their renames on the generated artifacts afterwards.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ParserError, ParserResult};
use crate::input::{InputQueryLanguage, ParserInput, ParserOutput};
use crate::query::QueryForm;
use crate::{sparql, splitter};

/// A parser input whose variable names are safe for text replacement,
/// together with the renames that produced it.
#[derive(Debug, Clone)]
pub struct CleanInput {
    pub input: ParserInput,
    /// All variables of the cleaned queries, in order of occurrence over
    /// stream query, final query and intermediate queries.
    pub unbound_variables: Vec<String>,
    /// Renames applied to the input, from original name to clean name.
    /// Empty when the input needed no renames.
    pub variable_mapping: BTreeMap<String, String>,
}

/// Generates a variable that shares no substring relation with any taken
/// name, and marks it as taken itself.
fn fresh_variable(taken: &mut Vec<String>) -> String {
    let fresh = sparql::generate_unbound_variable(|candidate| {
        taken
            .iter()
            .all(|variable| !variable.contains(candidate) && !candidate.contains(variable.as_str()))
    });
    taken.push(fresh.clone());
    fresh
}

fn unbound_variables_in_input(input: &ParserInput) -> Vec<String> {
    let mut variables = sparql::find_unbound_variables(&input.stream_query);
    let mut remaining: Vec<&str> = Vec::new();
    if let Some(final_query) = &input.final_query {
        remaining.push(final_query);
    }
    remaining.extend(input.intermediate_queries.iter().map(String::as_str));
    for text in remaining {
        for variable in sparql::find_unbound_variables(text) {
            if !variables.contains(&variable) {
                variables.push(variable);
            }
        }
    }
    variables
}

/// Aligns the variables of the final query with those of the stream
/// query, following the declared stream-to-final-query variable mapping.
///
/// Every mapped final query variable is renamed to its stream query
/// counterpart. A final query variable that happens to share its name
/// with a stream query variable without being mapped to it counts as a
/// match when `process_unmapped_variable_matches` is set; otherwise the
/// name collision is accidental and the final query occurrence is
/// renamed apart. Only the final query text is rewritten.
pub fn process_stream_to_final_query_variable_mapping(
    input: ParserInput,
    process_unmapped_variable_matches: bool,
) -> ParserResult<ParserInput> {
    // the mapping only relates a SPARQL stream query to a final query
    if input.input_query_language != InputQueryLanguage::Sparql || !input.has_final_query() {
        return Ok(input);
    }
    let Some(mut final_query) = input.final_query.clone() else {
        return Ok(input);
    };

    if spargebra::Query::parse(&final_query, None).is_err() {
        return Err(ParserError::MalformedQuery(
            "final query is invalid SPARQL".to_string(),
        ));
    }
    let split_final_query = splitter::split_sparql_query(&final_query)?;

    let mapping = &input.stream_to_final_query_variable_mapping;

    // an ASK query has no result part, so nothing of the final query
    // ends up in the derived stream query and no mapping applies
    if split_final_query.form == QueryForm::Ask {
        if mapping.is_empty() {
            return Ok(input);
        }
        return Err(ParserError::InvalidVariableMapping(
            "no stream to final query variable mapping should be provided if the final \
             query is an ASK query"
                .to_string(),
        ));
    }

    let stream_query_variables = sparql::find_unbound_variables(&input.stream_query);
    let final_query_variables = sparql::find_unbound_variables(&final_query);

    if !mapping
        .keys()
        .all(|variable| stream_query_variables.contains(variable))
    {
        return Err(ParserError::InvalidVariableMapping(
            "stream to final query variable mapping contains variable names that do \
             not occur in stream query"
                .to_string(),
        ));
    }
    if !mapping
        .values()
        .all(|variable| final_query_variables.contains(variable))
    {
        return Err(ParserError::InvalidVariableMapping(
            "stream to final query variable mapping contains variable names that do \
             not occur in final query"
                .to_string(),
        ));
    }
    let mut seen_values = BTreeSet::new();
    for value in mapping.values() {
        if !seen_values.insert(value) {
            return Err(ParserError::InvalidVariableMapping(format!(
                "stream to final query variable mapping contains duplicate mapping to \
                 variable '{value}'"
            )));
        }
    }

    let reverse_mapping: BTreeMap<&String, &String> =
        mapping.iter().map(|(key, value)| (value, key)).collect();

    // guards fresh name generation against every name on either side
    let mut conflicting: Vec<String> = final_query_variables
        .iter()
        .chain(stream_query_variables.iter())
        .cloned()
        .collect();

    // one replacement per final query variable; variables that keep
    // their name map to themselves so that the containment-ordered
    // replacement below cannot clip them
    let mut required_replacements: Vec<(String, String)> = Vec::new();
    for final_query_variable in &final_query_variables {
        if let Some(stream_query_variable) = reverse_mapping.get(final_query_variable) {
            required_replacements
                .push((final_query_variable.clone(), (*stream_query_variable).clone()));
            conflicting.push((*stream_query_variable).clone());
        } else if stream_query_variables.contains(final_query_variable)
            && (mapping.contains_key(final_query_variable) || !process_unmapped_variable_matches)
        {
            let fresh = fresh_variable(&mut conflicting);
            required_replacements.push((final_query_variable.clone(), fresh));
        } else {
            required_replacements
                .push((final_query_variable.clone(), final_query_variable.clone()));
        }
    }

    // replace in two phases through unique temporal names, so that
    // cross mappings such as ?a to ?b next to ?b to ?a cannot clash
    let mut temporal_replacements = BTreeMap::new();
    let mut final_replacements = Vec::new();
    for (original, target) in &required_replacements {
        let temporal = fresh_variable(&mut conflicting);
        temporal_replacements.insert(original.clone(), temporal.clone());
        final_replacements.push((temporal, target.clone()));
    }
    let mut temporal_keys: Vec<String> = temporal_replacements.keys().cloned().collect();
    sparql::sort_longest_contains_first(&mut temporal_keys);
    for key in &temporal_keys {
        if let Some(temporal) = temporal_replacements.get(key) {
            final_query = final_query.replace(key.as_str(), temporal);
        }
    }
    // temporal names share no substring relation, so order is free here
    for (temporal, target) in &final_replacements {
        final_query = final_query.replace(temporal.as_str(), target);
    }

    Ok(ParserInput {
        final_query: Some(final_query),
        ..input
    })
}

/// Renames every variable whose name contains another variable's name,
/// over all queries of the input at once. The returned mapping lets
/// [`restore_original_variables_in_output`] undo the renames once the
/// artifacts are generated.
pub fn clean_input_from_overlapping_variables(input: ParserInput) -> CleanInput {
    let unbound_variables = unbound_variables_in_input(&input);

    // the longer name of an overlapping pair is the one renamed, which
    // keeps the replacements in this pass safe as well
    let problematic: Vec<String> = unbound_variables
        .iter()
        .filter(|variable| {
            unbound_variables
                .iter()
                .any(|other| other != *variable && variable.contains(other.as_str()))
        })
        .cloned()
        .collect();

    if problematic.is_empty() {
        return CleanInput {
            input,
            unbound_variables,
            variable_mapping: BTreeMap::new(),
        };
    }

    let mut guard: Vec<String> = unbound_variables
        .iter()
        .filter(|variable| !problematic.contains(variable))
        .cloned()
        .collect();
    let mut sorted_problematic = problematic;
    sparql::sort_longest_contains_first(&mut sorted_problematic);

    let mut variable_mapping = BTreeMap::new();
    for variable in &sorted_problematic {
        let fresh = fresh_variable(&mut guard);
        variable_mapping.insert(variable.clone(), fresh);
    }

    let ParserInput {
        input_query_language,
        stream_windows,
        mut stream_query,
        mut intermediate_queries,
        mut final_query,
        mut solution_modifier,
        stream_to_final_query_variable_mapping,
    } = input;
    for variable in &sorted_problematic {
        let Some(replacement) = variable_mapping.get(variable) else {
            continue;
        };
        stream_query = stream_query.replace(variable.as_str(), replacement);
        final_query = final_query.map(|query| query.replace(variable.as_str(), replacement));
        intermediate_queries = intermediate_queries
            .into_iter()
            .map(|query| query.replace(variable.as_str(), replacement))
            .collect();
        solution_modifier = solution_modifier.replace(variable.as_str(), replacement);
    }

    let input = ParserInput {
        input_query_language,
        stream_windows,
        stream_query,
        intermediate_queries,
        final_query,
        solution_modifier,
        stream_to_final_query_variable_mapping,
    };
    let unbound_variables = unbound_variables_in_input(&input);
    CleanInput {
        input,
        unbound_variables,
        variable_mapping,
    }
}

/// Replaces every clean variable name in the generated artifacts by the
/// original name it stands for, including the substitution parameter
/// form used inside window definitions.
pub fn restore_original_variables_in_output(
    output: ParserOutput,
    variable_mapping: &BTreeMap<String, String>,
) -> ParserOutput {
    let query_form = output.query_form;
    let mut query_pattern = output.query_pattern;
    let mut sensor_query_rule = output.sensor_query_rule;
    let mut goal = output.goal;
    let mut window_parameters = output.window_parameters;
    for (original, renamed) in variable_mapping {
        query_pattern = query_pattern.replace(
            &sparql::window_placeholder(renamed),
            &sparql::window_placeholder(original),
        );
        query_pattern = query_pattern.replace(renamed.as_str(), original);
        sensor_query_rule = sensor_query_rule.replace(renamed.as_str(), original);
        goal = goal.replace(renamed.as_str(), original);
        for parameter in &mut window_parameters {
            parameter.variable = parameter.variable.replace(renamed.as_str(), original);
            parameter.value = parameter.value.replace(renamed.as_str(), original);
        }
    }
    ParserOutput::new(query_pattern, sensor_query_rule, goal, query_form)
        .with_window_parameters(window_parameters)
}
