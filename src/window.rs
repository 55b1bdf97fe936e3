//! Stream window definitions and their parameters.
//!
//! A window definition is the text between the square brackets of a
//! `FROM NAMED WINDOW` clause, e.g. `RANGE PT30S STEP PT10S` or
//! `FROM NOW-?{start} TO NOW-PT0S`. Each parameter position holds either
//! a `?{name}` placeholder (substituted at query derivation time), a
//! `PT?{name}U` placeholder carrying a time unit, or a literal duration.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ParserError, ParserResult};
use crate::input::StreamWindow;
use crate::query::Prefix;
use crate::sparql;

static WINDOW_DEFINITION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:RANGE\s+(\S+)|FROM\s+NOW-(\S+)\s+TO\s+NOW-(\S+))(?:\s+(?:(TUMBLING)|STEP\s+(\S+)))?\s*$",
    )
    .unwrap()
});

static FROM_NAMED_WINDOW_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*FROM\s+NAMED\s+WINDOW\s+(\S+)\s+ON\s+(\S+)\s+\[([^\[\]]+)\]").unwrap()
});

// parameter tokens are whitespace-delimited, so these are anchored
static PLACEHOLDER_PARAMETER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^\\?\\{{({})\\}}$", sparql::varname())).unwrap()
});
static DURATION_PLACEHOLDER_PARAMETER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^PT\\?\\{{({})\\}}([SMH])$", sparql::varname())).unwrap()
});
static LITERAL_PARAMETER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PT(\d+)([SMH])$").unwrap());

/// Value type of a window parameter, determining how the substituted
/// value is interpreted when the derived query is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowParameterType {
    XsdDuration,
    TimeSeconds,
    TimeMinutes,
    TimeHours,
}

impl WindowParameterType {
    pub fn iri(&self) -> &'static str {
        match self {
            WindowParameterType::XsdDuration => "<http://www.w3.org/2001/XMLSchema#duration>",
            WindowParameterType::TimeSeconds => "<http://www.w3.org/2006/time#seconds>",
            WindowParameterType::TimeMinutes => "<http://www.w3.org/2006/time#minutes>",
            WindowParameterType::TimeHours => "<http://www.w3.org/2006/time#hours>",
        }
    }

    fn from_unit(unit: &str) -> WindowParameterType {
        match unit {
            "S" => WindowParameterType::TimeSeconds,
            "M" => WindowParameterType::TimeMinutes,
            _ => WindowParameterType::TimeHours,
        }
    }
}

/// A single window parameter as listed in the sensor query rule.
///
/// For a substitution variable, `value` equals `variable` and the actual
/// value is filled in by the query derivation. Otherwise `value` holds a
/// default from the input configuration or a literal from the definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowParameter {
    pub variable: String,
    pub value: String,
    pub parameter_type: WindowParameterType,
    pub is_substitution_variable: bool,
}

/// A stream window whose definition has been aligned with the variable
/// renaming of the input queries, with defaults re-keyed accordingly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStreamWindow {
    pub stream_iri: String,
    pub window_definition: String,
    pub default_window_parameter_values: BTreeMap<String, String>,
    pub unbound_variables: Vec<String>,
}

/// A stream window in which every parameter position has been replaced
/// by a `?{name}` placeholder, with the extracted parameters alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedStreamWindow {
    pub stream_iri: String,
    pub window_definition: String,
    pub window_parameters: Vec<WindowParameter>,
}

struct WindowDefinitionParts {
    parameters: Vec<String>,
    canonical: String,
}

fn match_window_definition(definition: &str) -> Option<WindowDefinitionParts> {
    let captures = WINDOW_DEFINITION_REGEX.captures(definition)?;
    let mut parameters = Vec::new();
    let mut canonical;
    if let Some(range) = captures.get(1) {
        canonical = format!("RANGE {}", range.as_str());
        parameters.push(range.as_str().to_string());
    } else if let (Some(from), Some(to)) = (captures.get(2), captures.get(3)) {
        canonical = format!("FROM NOW-{} TO NOW-{}", from.as_str(), to.as_str());
        parameters.push(from.as_str().to_string());
        parameters.push(to.as_str().to_string());
    } else {
        return None;
    }
    if captures.get(4).is_some() {
        canonical.push_str(" TUMBLING");
    } else if let Some(step) = captures.get(5) {
        canonical.push_str(&format!(" STEP {}", step.as_str()));
        parameters.push(step.as_str().to_string());
    }
    Some(WindowDefinitionParts {
        parameters,
        canonical,
    })
}

/// Checks that the window definition of a stream window matches the
/// RSP-QL window grammar.
pub fn validate_window_definition(stream_window: &StreamWindow) -> ParserResult<()> {
    let definition = stream_window.window_definition.as_deref().unwrap_or("");
    if match_window_definition(definition).is_none() {
        return Err(invalid_definition_error(&stream_window.stream_iri));
    }
    Ok(())
}

fn invalid_definition_error(stream_iri: &str) -> ParserError {
    ParserError::InvalidWindowDefinition(format!(
        "stream window with name '{stream_iri}' contains invalid RSP-QL window definition"
    ))
}

/// Aligns a stream window with the variable renaming applied to the
/// input queries. Placeholder variables that were renamed are rewritten
/// in the definition, and their default values are re-keyed. A default
/// for a variable that does not occur in the definition is rejected.
pub fn parse_stream_window(
    stream_window: &StreamWindow,
    variable_mapping: &BTreeMap<String, String>,
) -> ParserResult<ParsedStreamWindow> {
    let mut window_definition = match stream_window.window_definition.clone() {
        Some(definition) => definition,
        None => return Err(invalid_definition_error(&stream_window.stream_iri)),
    };
    let mut defaults = stream_window.default_window_parameter_values.clone();

    let mut unbound_variables: Vec<String> = Vec::new();
    for variable in sparql::find_window_placeholder_variables(&window_definition) {
        if let Some(mapped) = variable_mapping.get(&variable) {
            window_definition = window_definition.replace(
                &sparql::window_placeholder(&variable),
                &sparql::window_placeholder(mapped),
            );
            if let Some(value) = defaults.remove(&variable) {
                defaults.insert(mapped.clone(), value);
            }
            if !unbound_variables.contains(mapped) {
                unbound_variables.push(mapped.clone());
            }
        } else if !unbound_variables.contains(&variable) {
            unbound_variables.push(variable);
        }
    }

    for key in defaults.keys() {
        if !unbound_variables.contains(key) {
            return Err(ParserError::InvalidWindowParameter(format!(
                "configuration of stream window with IRI '{}' contains default value for \
                 variable '{}' which does not occur in window definition",
                stream_window.stream_iri, key
            )));
        }
    }

    Ok(ParsedStreamWindow {
        stream_iri: stream_window.stream_iri.clone(),
        window_definition,
        default_window_parameter_values: defaults,
        unbound_variables,
    })
}

/// Replaces every parameter position of the window definition by a
/// `?{name}` placeholder and collects the corresponding parameters.
/// Fresh variables minted for literal parameters avoid `taken_variables`.
pub fn convert_parsed_stream_window(
    parsed: &ParsedStreamWindow,
    taken_variables: &[String],
) -> ParserResult<ConvertedStreamWindow> {
    let parts = match_window_definition(&parsed.window_definition)
        .ok_or_else(|| invalid_definition_error(&parsed.stream_iri))?;

    let mut window_definition = parsed.window_definition.clone();
    let mut window_parameters = Vec::new();
    for token in &parts.parameters {
        let parameter = create_window_parameter(
            token,
            &parsed.default_window_parameter_values,
            taken_variables,
        )?;
        window_definition = window_definition.replace(
            token.as_str(),
            &sparql::window_placeholder(&parameter.variable),
        );
        window_parameters.push(parameter);
    }

    Ok(ConvertedStreamWindow {
        stream_iri: parsed.stream_iri.clone(),
        window_definition,
        window_parameters,
    })
}

fn create_window_parameter(
    parameter: &str,
    defaults: &BTreeMap<String, String>,
    taken_variables: &[String],
) -> ParserResult<WindowParameter> {
    if let Some(captures) = PLACEHOLDER_PARAMETER_REGEX.captures(parameter) {
        Ok(placeholder_parameter(
            &captures[1],
            WindowParameterType::XsdDuration,
            defaults,
        ))
    } else if let Some(captures) = DURATION_PLACEHOLDER_PARAMETER_REGEX.captures(parameter) {
        Ok(placeholder_parameter(
            &captures[1],
            WindowParameterType::from_unit(&captures[2]),
            defaults,
        ))
    } else if let Some(captures) = LITERAL_PARAMETER_REGEX.captures(parameter) {
        // literal durations get a fresh variable so they can still be
        // listed with the other window parameters
        let variable = sparql::generate_unbound_variable(|candidate| {
            taken_variables.iter().all(|taken| !candidate.contains(taken.as_str()))
        });
        Ok(WindowParameter {
            variable,
            value: captures[1].to_string(),
            parameter_type: WindowParameterType::from_unit(&captures[2]),
            is_substitution_variable: false,
        })
    } else {
        Err(ParserError::InvalidWindowParameter(format!(
            "invalid window parameter '{parameter}'"
        )))
    }
}

fn placeholder_parameter(
    name: &str,
    parameter_type: WindowParameterType,
    defaults: &BTreeMap<String, String>,
) -> WindowParameter {
    let variable = format!("?{name}");
    match defaults.get(&variable) {
        Some(value) => WindowParameter {
            variable,
            value: value.clone(),
            parameter_type,
            is_substitution_variable: false,
        },
        None => WindowParameter {
            value: variable.clone(),
            variable,
            parameter_type,
            is_substitution_variable: true,
        },
    }
}

/// Extracts the stream windows from the `FROM NAMED WINDOW` clauses of an
/// RSP-QL query and merges in the default parameter values of the
/// separately configured stream windows.
///
/// Returns pairs of resolved window name and stream window, in order of
/// appearance in the query.
pub fn complete_stream_windows_from_rsp_ql_from_part(
    stream_windows: &[StreamWindow],
    from_part: &str,
    prefixes: &[Prefix],
) -> ParserResult<Vec<(String, StreamWindow)>> {
    let mut leftover = from_part.to_string();
    let mut windows: Vec<(String, StreamWindow)> = Vec::new();
    for captures in FROM_NAMED_WINDOW_REGEX.captures_iter(from_part) {
        let window_name = sparql::resolve_graph_name(&captures[1], prefixes)?;
        if windows.iter().any(|(name, _)| name == &window_name) {
            return Err(ParserError::InvalidWindowDefinition(format!(
                "window name '{window_name}' defined more than once"
            )));
        }
        let stream_name = sparql::resolve_graph_name(&captures[2], prefixes)?;
        let definition = match match_window_definition(&captures[3]) {
            Some(parts) => parts.canonical,
            None => {
                return Err(ParserError::InvalidWindowDefinition(format!(
                    "window definition of stream '{stream_name}' is no valid RSP-QL"
                )));
            }
        };
        windows.push((window_name, StreamWindow::new(stream_name, definition)));
        leftover = leftover.replace(captures[0].trim(), "").trim().to_string();
    }
    if !leftover.trim().is_empty() {
        return Err(ParserError::MalformedQuery(format!(
            "RSP-QL query contains invalid part '{leftover}'"
        )));
    }

    // every separately configured stream window must correspond to a
    // window in the query, with the same definition if it specifies one
    for defined in stream_windows {
        match windows
            .iter_mut()
            .find(|(_, window)| window.stream_iri == defined.stream_iri)
        {
            Some((_, matching)) => {
                if let Some(defined_definition) = defined.window_definition.as_deref() {
                    let canonical = match_window_definition(defined_definition)
                        .map(|parts| parts.canonical)
                        .ok_or_else(|| invalid_definition_error(&defined.stream_iri))?;
                    if matching.window_definition.as_deref() != Some(canonical.as_str()) {
                        return Err(ParserError::InconsistentWindowDefinition(format!(
                            "configuration contains stream window with IRI '{}' that has a \
                             different window definition than the corresponding stream window \
                             present in the RSP-QL stream query",
                            defined.stream_iri
                        )));
                    }
                }
                matching.default_window_parameter_values =
                    defined.default_window_parameter_values.clone();
            }
            None => {
                return Err(ParserError::InconsistentWindowDefinition(format!(
                    "configuration contains stream window with IRI '{}' that does not occur \
                     in the RSP-QL stream query",
                    defined.stream_iri
                )));
            }
        }
    }

    Ok(windows)
}
