//! Generation of the three textual artifacts of a query derivation.
//!
//! A derivation produces a query pattern (the RSP-QL query template,
//! wrapped in a SHACL-style description of its prefixes and form), a
//! sensor query rule (a rule whose antecedent is the context part of the
//! stream query and whose consequence instantiates the pattern), and a
//! goal (a rule mapping the final query result onto the overall result).
//! All three are plain text for consumption by a rule-based reasoner.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use oxigraph::io::{RdfFormat, RdfParser};
use spargebra::algebra::GraphPattern;

use crate::error::{ParserError, ParserResult};
use crate::query::{ParsedQuery, Prefix, QueryForm};
use crate::sparql;
use crate::where_clause::WhereClauseItem;
use crate::window::{WindowParameter, WindowParameterType};

const DIVIDE_QUERY_URI: &str = "<http://idlab.ugent.be/sensdesc/query#>";
const SENSDESC_URI: &str = "<http://idlab.ugent.be/sensdesc#>";
const SHACL_URI: &str = "<http://www.w3.org/ns/shacl#>";
const OWL_URI: &str = "<http://www.w3.org/2002/07/owl#>";
const RDF_URI: &str = "<http://www.w3.org/1999/02/22-rdf-syntax-ns#>";
const XSD_URI: &str = "<http://www.w3.org/2001/XMLSchema#>";

static PATTERN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Hands out the number that ties a query pattern to its prefix
/// declarations. Every derivation uses a fresh one, so patterns loaded
/// into the same reasoner knowledge base cannot collide.
pub fn next_pattern_counter() -> u64 {
    PATTERN_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// The fixed vocabulary prefixes of the generated artifacts, with their
/// names resolved against the prefixes of the parsed input queries.
///
/// A name is only replaced when an input prefix uses the same name for a
/// different URI; the replacement keeps the vocabulary URI under a fresh
/// unambiguous name.
struct DividePrefixes {
    prefixes: Vec<Prefix>,
    base: String,
    sd: String,
    sh: String,
    owl: String,
    rdf: String,
    xsd: String,
}

impl DividePrefixes {
    fn resolve(used_prefixes: &[Prefix]) -> DividePrefixes {
        let resolve_name = |default_name: &str, uri: &str| {
            let conflict = used_prefixes
                .iter()
                .any(|prefix| prefix.name == default_name && prefix.uri != uri);
            if conflict {
                sparql::generate_divide_prefix_name()
            } else {
                default_name.to_string()
            }
        };

        let base = resolve_name(":", DIVIDE_QUERY_URI);
        let sd = resolve_name("sd:", SENSDESC_URI);
        let sh = resolve_name("sh:", SHACL_URI);
        let owl = resolve_name("owl:", OWL_URI);
        let rdf = resolve_name("rdf:", RDF_URI);
        let xsd = resolve_name("xsd:", XSD_URI);

        let prefixes = vec![
            Prefix::new(base.clone(), DIVIDE_QUERY_URI),
            Prefix::new(sd.clone(), SENSDESC_URI),
            Prefix::new(sh.clone(), SHACL_URI),
            Prefix::new(owl.clone(), OWL_URI),
            Prefix::new(rdf.clone(), RDF_URI),
            Prefix::new(xsd.clone(), XSD_URI),
        ];

        DividePrefixes {
            prefixes,
            base,
            sd,
            sh,
            owl,
            rdf,
            xsd,
        }
    }
}

/// Renders prefixes as a single line of Turtle `@prefix` declarations.
pub fn turtle_prefix_list(prefixes: &[Prefix]) -> String {
    prefixes
        .iter()
        .map(|prefix| format!("@prefix {} {} .", prefix.name, prefix.uri))
        .collect::<Vec<_>>()
        .join(" ")
}

fn shacl_prefix_list(prefixes: &[Prefix], divide: &DividePrefixes, pattern_counter: u64) -> String {
    prefixes
        .iter()
        .map(|prefix| {
            format!(
                "{base}prefixes-{pattern_counter} {sh}declare [ {sh}prefix \"{}\" ; \
                 {sh}namespace \"{}\"^^{xsd}anyURI ] .",
                prefix.name_without_colon(),
                prefix.uri_without_brackets(),
                base = divide.base,
                sh = divide.sh,
                xsd = divide.xsd,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Creates the query pattern artifact: the RSP-QL query body, quoted as a
/// literal and described with its form and the prefixes it uses.
///
/// Only prefixes actually occurring in the body are declared. The empty
/// prefix name cannot be declared this way, so its occurrences in the
/// body are rewritten to a fresh name first.
pub fn create_query_pattern(
    query_form: QueryForm,
    prefixes: &[Prefix],
    rsp_ql_query_body: &str,
    pattern_counter: u64,
) -> String {
    let mut body = rsp_ql_query_body.to_string();
    let mut prefixes_present: Vec<Prefix> = Vec::new();
    for prefix in prefixes {
        // window references like :win0 share the empty prefix name but
        // are no prefix usage
        if !sparql::prefix_occurs(&body, &prefix.name, true) {
            continue;
        }
        if prefix.name == ":" {
            let renamed = Prefix::new(sparql::generate_divide_prefix_name(), prefix.uri.clone());
            body = sparql::replace_prefix_name(&body, ":", &renamed.name, true);
            prefixes_present.push(renamed);
        } else {
            prefixes_present.push(prefix.clone());
        }
    }
    prefixes_present.sort();
    prefixes_present.dedup();

    let divide = DividePrefixes::resolve(&prefixes_present);
    let divide_prefix_list = turtle_prefix_list(&divide.prefixes);
    let shacl_prefix_list = shacl_prefix_list(&prefixes_present, &divide, pattern_counter);

    format!(
        "{divide_prefix_list}\n\
         {base}prefixes-{pattern_counter} {rdf}type {owl}Ontology .\n\
         {shacl_prefix_list}\n\
         {base}pattern {rdf}type {sd}QueryPattern ; {sh}prefixes {base}prefixes-{pattern_counter} ; \
         {sh}{form} \"\"\"{body}\"\"\".",
        base = divide.base,
        rdf = divide.rdf,
        owl = divide.owl,
        sd = divide.sd,
        sh = divide.sh,
        form = query_form.lowercase(),
    )
}

/// Creates the sensor query rule artifact.
///
/// The rule derives a query instance from the context part of the stream
/// query: its consequence declares the input variables to substitute into
/// the pattern, the window parameters, the output variables (turned into
/// blank nodes), and the stream query result itself. Each additional
/// intermediate query is appended as a rule of its own.
pub fn create_sensor_query_rule(
    prefixes: &[Prefix],
    context_part: &str,
    stream_query_result: &str,
    input_variables: &[String],
    window_parameters: &[WindowParameter],
    output_variables: &[String],
    additional_queries: &[ParsedQuery],
) -> String {
    let divide = DividePrefixes::resolve(prefixes);

    let mut all_prefixes = divide.prefixes.clone();
    all_prefixes.extend(prefixes.iter().cloned());
    all_prefixes.sort();
    all_prefixes.dedup();
    let prefix_list = turtle_prefix_list(&all_prefixes);

    let mut sorted_input_variables = input_variables.to_vec();
    sparql::sort_longest_contains_first(&mut sorted_input_variables);
    let input_variables_string = sorted_input_variables
        .iter()
        .map(|variable| format!("(\"{variable}\" {variable})"))
        .collect::<Vec<_>>()
        .join(" ");

    let window_parameters_string = window_parameters
        .iter()
        .map(|parameter| {
            // a default duration value is a plain string to the reasoner,
            // substitution variables and numeric values are not quoted
            let value = if !parameter.is_substitution_variable
                && parameter.parameter_type == WindowParameterType::XsdDuration
            {
                format!("\"{}\"", parameter.value)
            } else {
                parameter.value.clone()
            };
            format!(
                "(\"{}\" {} {})",
                parameter.variable,
                value,
                parameter.parameter_type.iri()
            )
        })
        .collect::<Vec<_>>()
        .join(" ");

    let mut result = stream_query_result.to_string();
    let mut output_variable_entries = Vec::new();
    for variable in output_variables {
        let blank = variable.replacen('?', "_:", 1);
        output_variable_entries.push(format!("(\"{variable}\" {blank})"));
        // single-pass replacement is safe: after variable cleaning, no
        // variable name contains another
        result = result.replace(variable.as_str(), &blank);
    }
    let output_variables_string = output_variable_entries.join(" ");

    let rule = format!(
        "{prefix_list}\n\
         {{\n\
         {context_part}\n\
         }}\n\
         =>\n\
         {{\n\
         _:q {rdf}type {sd}Query ;\n    \
         {sd}pattern {base}pattern ;\n    \
         {sd}inputVariables ({input_variables_string}) ;\n    \
         {sd}windowParameters ({window_parameters_string}) ;\n    \
         {sd}outputVariables ({output_variables_string}) .\n\
         \n\
         {result}\n\
         }} .",
        rdf = divide.rdf,
        sd = divide.sd,
        base = divide.base,
    );

    let additional_rules = additional_queries
        .iter()
        .map(|query| {
            format!(
                "{{\n{}\n}}\n=>\n{{\n{}\n}} .",
                query.split.where_part, query.split.result_part
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{rule}\n\n{additional_rules}")
}

/// Creates the goal artifact: a rule with the given antecedent and
/// consequence, preceded by the prefixes both of them use.
pub fn create_goal(prefixes: &[Prefix], antecedent: &str, consequence: &str) -> String {
    let mut prefixes = prefixes.to_vec();
    prefixes.sort();
    prefixes.dedup();
    let prefix_list = turtle_prefix_list(&prefixes);
    format!("{prefix_list}\n{{\n{antecedent}\n}}\n=>\n{{\n{consequence}\n}} .")
}

/// Extends the output of the stream query with the triple patterns of its
/// streaming WHERE clause items, for use as sensor query rule consequence.
///
/// Unbound variables are temporarily swapped for unique IRIs so the query
/// text can be round-tripped through an RDF parser. Keyword expressions
/// such as FILTER are no valid triples and are filtered out by parsing
/// every item as a query and keeping only its basic graph patterns. The
/// result is one statement per line, with prefixed names expanded.
pub fn extend_output_of_stream_query(
    stream_items: &[WhereClauseItem],
    stream_query_output: &str,
    prefixes: &[Prefix],
) -> ParserResult<String> {
    let query_prefix_string = prefixes
        .iter()
        .map(|prefix| format!("PREFIX {} {}", prefix.name, prefix.uri))
        .collect::<Vec<_>>()
        .join(" ");
    let turtle_prefix_string = turtle_prefix_list(prefixes);

    let mut variable_mapping: BTreeMap<String, String> = BTreeMap::new();
    let mut output_variables = sparql::find_unbound_variables(stream_query_output);
    sparql::sort_longest_contains_first(&mut output_variables);
    for variable in &output_variables {
        variable_mapping.insert(variable.clone(), sparql::variable_mapping_iri());
    }

    let mut transformed_output = format!("{turtle_prefix_string}\n{stream_query_output}");
    for variable in &output_variables {
        transformed_output =
            transformed_output.replace(variable.as_str(), &variable_mapping[variable]);
    }
    let mut statements = parse_turtle_statements(&transformed_output).ok_or_else(|| {
        ParserError::InvalidInput(
            "parser will generate invalid output of sensor query rule, caused by an \
             invalid stream query"
                .to_string(),
        )
    })?;

    for item in stream_items {
        let mut content = match item {
            WhereClauseItem::Expression(expression) => expression.clone(),
            WhereClauseItem::Graph { clause, .. } => clause.clone(),
        };

        let mut item_variables = sparql::find_unbound_variables(&content);
        sparql::sort_longest_contains_first(&mut item_variables);
        for variable in item_variables {
            let mapping = variable_mapping
                .entry(variable.clone())
                .or_insert_with(sparql::variable_mapping_iri)
                .clone();
            content = content.replace(variable.as_str(), &mapping);
        }

        // an item that does not parse as a query body is simply not
        // carried into the rule consequence
        let query = format!("{query_prefix_string} SELECT * WHERE {{ {content} }}");
        let Ok(query) = spargebra::Query::parse(&query, None) else {
            continue;
        };

        let mut triples = Vec::new();
        collect_basic_triples(query_pattern(&query), &mut triples);
        if triples.is_empty() {
            continue;
        }

        let triple_block = triples
            .iter()
            .map(|triple| format!("{triple} ."))
            .collect::<Vec<_>>()
            .join("\n");
        let Some(parsed) = parse_turtle_statements(&format!("{turtle_prefix_string}\n{triple_block}"))
        else {
            continue;
        };
        statements.extend(parsed);
    }

    statements.sort();
    statements.dedup();
    let mut extra_output = statements.join("\n");
    for (variable, mapping) in &variable_mapping {
        extra_output = extra_output.replace(mapping.as_str(), variable);
    }
    Ok(extra_output)
}

/// Parses Turtle text into one `subject predicate object .` line per
/// statement, with prefixed names expanded to full IRIs. Returns `None`
/// when the text is no valid Turtle.
fn parse_turtle_statements(text: &str) -> Option<Vec<String>> {
    let parser = RdfParser::from_format(RdfFormat::Turtle).for_slice(text.as_bytes());
    let mut statements = Vec::new();
    for quad in parser {
        let quad = quad.ok()?;
        statements.push(format!(
            "{} {} {} .",
            quad.subject, quad.predicate, quad.object
        ));
    }
    Some(statements)
}

fn query_pattern(query: &spargebra::Query) -> &GraphPattern {
    match query {
        spargebra::Query::Select { pattern, .. }
        | spargebra::Query::Construct { pattern, .. }
        | spargebra::Query::Describe { pattern, .. }
        | spargebra::Query::Ask { pattern, .. } => pattern,
    }
}

/// Collects the triple patterns of every basic graph pattern in the
/// algebra tree. Property paths, VALUES and service patterns carry no
/// plain triples and are skipped.
fn collect_basic_triples(pattern: &GraphPattern, triples: &mut Vec<String>) {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            triples.extend(patterns.iter().map(|triple| triple.to_string()));
        }
        GraphPattern::Join { left, right }
        | GraphPattern::Union { left, right }
        | GraphPattern::Minus { left, right }
        | GraphPattern::LeftJoin { left, right, .. } => {
            collect_basic_triples(left, triples);
            collect_basic_triples(right, triples);
        }
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Graph { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Project { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::Group { inner, .. } => collect_basic_triples(inner, triples),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SplitQuery;

    fn prefix(name: &str, uri: &str) -> Prefix {
        Prefix::new(name, uri)
    }

    #[test]
    fn query_pattern_declares_used_prefixes_and_quotes_the_body() {
        let prefixes = [
            prefix("ex:", "<http://example.org/>"),
            prefix("foaf:", "<http://xmlns.com/foaf/0.1/>"),
        ];
        let body = "CONSTRUCT\n{ ?a ex:b ?c . }\n\
                    FROM NAMED WINDOW :win0 ON <urn:s> [RANGE PT10S]\n\
                    WHERE {\nWINDOW :win0 {\n?a ex:b ?c . \n}\n}\n";

        let pattern = create_query_pattern(QueryForm::Construct, &prefixes, body, 7);

        assert_eq!(
            pattern,
            "@prefix : <http://idlab.ugent.be/sensdesc/query#> . \
             @prefix sd: <http://idlab.ugent.be/sensdesc#> . \
             @prefix sh: <http://www.w3.org/ns/shacl#> . \
             @prefix owl: <http://www.w3.org/2002/07/owl#> . \
             @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> . \
             @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n\
             :prefixes-7 rdf:type owl:Ontology .\n\
             :prefixes-7 sh:declare [ sh:prefix \"ex\" ; \
             sh:namespace \"http://example.org/\"^^xsd:anyURI ] .\n\
             :pattern rdf:type sd:QueryPattern ; sh:prefixes :prefixes-7 ; \
             sh:construct \"\"\"CONSTRUCT\n{ ?a ex:b ?c . }\n\
             FROM NAMED WINDOW :win0 ON <urn:s> [RANGE PT10S]\n\
             WHERE {\nWINDOW :win0 {\n?a ex:b ?c . \n}\n}\n\"\"\"."
        );
        // foaf: does not occur in the body and is not declared
        assert!(!pattern.contains("foaf"));
    }

    #[test]
    fn query_pattern_rewrites_the_empty_prefix_name() {
        let prefixes = [prefix(":", "<http://example.org/>")];
        let body = "SELECT\n?a\n\
                    FROM NAMED WINDOW :win0 ON <urn:s> [RANGE PT10S]\n\
                    WHERE {\nWINDOW :win0 {\n?a :b :c . \n}\n}\n";

        let pattern = create_query_pattern(QueryForm::Select, &prefixes, body, 1);

        assert!(pattern.contains("sh:prefix \"divide-g"));
        assert!(pattern.contains("sh:namespace \"http://example.org/\"^^xsd:anyURI"));
        // the body tokens now carry the fresh name, window refs are kept
        assert!(!pattern.contains(" :b "));
        assert!(!pattern.contains(" :c "));
        assert!(pattern.contains("WINDOW :win0 {"));
        assert!(pattern.contains("ON <urn:s>"));
    }

    #[test]
    fn query_pattern_renames_conflicting_vocabulary_prefixes() {
        let prefixes = [prefix("sd:", "<http://example.org/sd#>")];
        let body = "ASK\n\n\
                    FROM NAMED WINDOW :win0 ON <urn:s> [RANGE PT10S]\n\
                    WHERE {\nWINDOW :win0 {\n?a sd:b ?c . \n}\n}\n";

        let pattern = create_query_pattern(QueryForm::Ask, &prefixes, body, 1);

        // the input prefix keeps its name in the declarations
        assert!(pattern.contains("sh:prefix \"sd\""));
        assert!(pattern.contains("sh:namespace \"http://example.org/sd#\"^^xsd:anyURI"));
        // the vocabulary prefix moved to a fresh name with its own URI
        assert!(!pattern.contains("@prefix sd: <http://idlab.ugent.be/sensdesc#>"));
        assert!(pattern.contains("<http://idlab.ugent.be/sensdesc#>"));
        assert!(!pattern.contains(" sd:QueryPattern"));
        assert!(pattern.contains("QueryPattern"));
    }

    #[test]
    fn sensor_query_rule_lists_variables_and_appends_result() {
        let prefixes = [prefix("ex:", "<http://example.org/>")];
        let window_parameters = [
            WindowParameter {
                variable: "?size".to_string(),
                value: "PT30S".to_string(),
                parameter_type: WindowParameterType::XsdDuration,
                is_substitution_variable: false,
            },
            WindowParameter {
                variable: "?slide".to_string(),
                value: "?slide".to_string(),
                parameter_type: WindowParameterType::XsdDuration,
                is_substitution_variable: true,
            },
            WindowParameter {
                variable: "?x4".to_string(),
                value: "10".to_string(),
                parameter_type: WindowParameterType::TimeSeconds,
                is_substitution_variable: false,
            },
        ];

        let rule = create_sensor_query_rule(
            &prefixes,
            "?p rdf:type ex:Patient .",
            "?p ex:emits ?o .",
            &["?p".to_string()],
            &window_parameters,
            &["?o".to_string()],
            &[],
        );

        assert_eq!(
            rule,
            "@prefix : <http://idlab.ugent.be/sensdesc/query#> . \
             @prefix ex: <http://example.org/> . \
             @prefix owl: <http://www.w3.org/2002/07/owl#> . \
             @prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> . \
             @prefix sd: <http://idlab.ugent.be/sensdesc#> . \
             @prefix sh: <http://www.w3.org/ns/shacl#> . \
             @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n\
             {\n\
             ?p rdf:type ex:Patient .\n\
             }\n\
             =>\n\
             {\n\
             _:q rdf:type sd:Query ;\n    \
             sd:pattern :pattern ;\n    \
             sd:inputVariables ((\"?p\" ?p)) ;\n    \
             sd:windowParameters ((\"?size\" \"PT30S\" \
             <http://www.w3.org/2001/XMLSchema#duration>) \
             (\"?slide\" ?slide <http://www.w3.org/2001/XMLSchema#duration>) \
             (\"?x4\" 10 <http://www.w3.org/2006/time#seconds>)) ;\n    \
             sd:outputVariables ((\"?o\" _:o)) .\n\
             \n\
             ?p ex:emits _:o .\n\
             } .\n\n"
        );
    }

    #[test]
    fn sensor_query_rule_orders_containing_input_variables_first() {
        let rule = create_sensor_query_rule(
            &[],
            "?a ?ab ?b .",
            "?a ?ab ?b .",
            &["?a".to_string(), "?ab".to_string(), "?b".to_string()],
            &[],
            &[],
            &[],
        );

        assert!(rule.contains(
            "sd:inputVariables ((\"?ab\" ?ab) (\"?a\" ?a) (\"?b\" ?b))"
        ));
    }

    #[test]
    fn sensor_query_rule_appends_a_rule_per_additional_query() {
        let additional = ParsedQuery::new(
            SplitQuery {
                prefix_part: String::new(),
                form: QueryForm::Construct,
                result_part: "?p ex:status ?s .".to_string(),
                from_part: String::new(),
                where_part: "?p ex:rawStatus ?s .".to_string(),
                trailing_part: String::new(),
            },
            vec![],
        );

        let rule = create_sensor_query_rule(
            &[prefix("ex:", "<http://example.org/>")],
            "?p a ex:Patient .",
            "?p ex:status ?s .",
            &["?p".to_string()],
            &[],
            &["?s".to_string()],
            &[additional],
        );

        assert!(rule.ends_with(
            "} .\n\n\
             {\n\
             ?p ex:rawStatus ?s .\n\
             }\n\
             =>\n\
             {\n\
             ?p ex:status ?s .\n\
             } ."
        ));
    }

    #[test]
    fn goal_renders_prefixes_antecedent_and_consequence() {
        let prefixes = [
            prefix("ex:", "<http://example.org/>"),
            prefix("owl:", "<http://www.w3.org/2002/07/owl#>"),
        ];

        let goal = create_goal(&prefixes, "?p ex:status ?s .", "?p ex:alarm ?s .");

        assert_eq!(
            goal,
            "@prefix ex: <http://example.org/> . \
             @prefix owl: <http://www.w3.org/2002/07/owl#> .\n\
             {\n\
             ?p ex:status ?s .\n\
             }\n\
             =>\n\
             {\n\
             ?p ex:alarm ?s .\n\
             } ."
        );
    }

    #[test]
    fn extend_output_merges_stream_triples_into_the_output() {
        let prefixes = [prefix("ex:", "<http://example.org/>")];
        let items = vec![WhereClauseItem::Graph {
            name: "<urn:s>".to_string(),
            clause: "?p ex:produces ?o . FILTER (?o > 3)".to_string(),
        }];

        let extended =
            extend_output_of_stream_query(&items, "?p ex:emits ?o .", &prefixes).unwrap();

        assert_eq!(
            extended,
            "?p <http://example.org/emits> ?o .\n\
             ?p <http://example.org/produces> ?o ."
        );
    }

    #[test]
    fn extend_output_drops_pure_keyword_items() {
        let prefixes = [prefix("ex:", "<http://example.org/>")];
        let items = vec![
            WhereClauseItem::Expression("FILTER (?o > 3)".to_string()),
            WhereClauseItem::Expression("GROUP BY ?p HAVING (?o > 2)".to_string()),
        ];

        let extended =
            extend_output_of_stream_query(&items, "?p ex:emits ?o .", &prefixes).unwrap();

        assert_eq!(extended, "?p <http://example.org/emits> ?o .");
    }

    #[test]
    fn extend_output_expands_prefixed_names_and_typed_literals() {
        let prefixes = [prefix("ex:", "<http://example.org/>")];

        let extended =
            extend_output_of_stream_query(&[], "?p a ex:Sensor ; ex:level 5 .", &prefixes)
                .unwrap();

        assert_eq!(
            extended,
            "?p <http://example.org/level> \
             \"5\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n\
             ?p <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> \
             <http://example.org/Sensor> ."
        );
    }

    #[test]
    fn extend_output_rejects_output_that_is_no_valid_turtle() {
        let error = extend_output_of_stream_query(&[], "?p ex:emits .", &[]).unwrap_err();

        assert!(matches!(error, ParserError::InvalidInput(_)));
        assert_eq!(
            error.to_string(),
            "parser will generate invalid output of sensor query rule, caused by an \
             invalid stream query"
        );
    }
}
