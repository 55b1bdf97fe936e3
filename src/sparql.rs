//! Text-level SPARQL and RSP-QL helpers shared by the pipeline stages.
//!
//! The derivation pipeline rewrites query text by literal substring
//! substitution, so everything here is careful about token boundaries:
//! prefix names are only recognized after a boundary character, and
//! freshly generated names are checked against an exclusion set before
//! they are handed out.

use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

use crate::error::{ParserError, ParserResult};
use crate::query::Prefix;

// character classes from the SPARQL 1.1 grammar, spelled out as class members
const PN_CHARS_BASE: &str = "A-Za-z\\x{00C0}-\\x{00D6}\\x{00D8}-\\x{00F6}\\x{00F8}-\\x{02FF}\
                             \\x{0370}-\\x{037D}\\x{037F}-\\x{1FFF}\\x{200C}-\\x{200D}\
                             \\x{2070}-\\x{218F}\\x{2C00}-\\x{2FEF}\\x{3001}-\\x{D7FF}\
                             \\x{F900}-\\x{FDCF}\\x{FDF0}-\\x{FFFD}\\x{10000}-\\x{EFFFF}";

fn pn_chars_u() -> String {
    format!("{PN_CHARS_BASE}_")
}

fn pn_chars() -> String {
    format!("{}\\-0-9\\x{{00B7}}\\x{{0300}}-\\x{{036F}}\\x{{203F}}-\\x{{2040}}", pn_chars_u())
}

fn pn_prefix() -> String {
    let chars = pn_chars();
    format!("[{PN_CHARS_BASE}](?:[{chars}.]*[{chars}])?")
}

pub(crate) fn varname() -> String {
    let first = pn_chars_u();
    format!(
        "[{first}0-9][{first}0-9\\x{{00B7}}\\x{{0300}}-\\x{{036F}}\\x{{203F}}-\\x{{2040}}]*"
    )
}

/// `PREFIX <name> <uri>` declaration; group 1 is the name including its
/// colon, group 2 the URI including its angle brackets.
pub static PREFIX_DECLARATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PREFIX\s+(\S+)\s+(<[^<>]+>)").unwrap());

/// Prefix-name occurrence (`PNAME_NS`) after a boundary character; group 2
/// is the name including its colon.
static USED_PREFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("(\\s|\\(|^|\\^)((?:{})?:)", pn_prefix())).unwrap()
});

/// Unbound variable (`?name`); the whole match includes the question mark.
static VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("\\?{}", varname())).unwrap());

/// Window parameter placeholder (`?{name}`); group 1 is the bare name.
static WINDOW_PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("\\?\\{{({})\\}}", varname())).unwrap());

/// Recognizes the remainder of a named-window token (`:win0 `) directly
/// after a prefix-name occurrence.
static WINDOW_REF_REMAINDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^win[0-9]+\s").unwrap());

static VARIABLE_COUNTER: AtomicU64 = AtomicU64::new(0);
static PREFIX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Returns all unbound variables in the given query part, in order of
/// first occurrence and without duplicates. Names include the leading
/// question mark; `?{name}` placeholders are not reported.
pub fn find_unbound_variables(query_part: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for m in VAR_REGEX.find_iter(query_part) {
        let variable = m.as_str();
        if !seen.iter().any(|s| s == variable) {
            seen.push(variable.to_string());
        }
    }
    seen
}

/// Returns all variables referenced as `?{name}` placeholders in a window
/// definition, in order of first occurrence, spelled with a leading
/// question mark.
pub fn find_window_placeholder_variables(definition: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for c in WINDOW_PLACEHOLDER_REGEX.captures_iter(definition) {
        let variable = format!("?{}", &c[1]);
        if !seen.iter().any(|s| s == &variable) {
            seen.push(variable);
        }
    }
    seen
}

/// The `?{name}` placeholder spelling of an unbound variable `?name`.
pub fn window_placeholder(variable: &str) -> String {
    format!("?{{{}}}", variable.strip_prefix('?').unwrap_or(variable))
}

/// Returns every prefix name (including the colon) used in the given
/// query text, in order of occurrence.
pub fn find_used_prefix_names(text: &str) -> Vec<String> {
    USED_PREFIX_REGEX
        .captures_iter(text)
        .map(|c| c[2].to_string())
        .collect()
}

/// True if `text` carries `keyword` at byte position `index`, compared
/// ASCII case insensitively.
pub(crate) fn keyword_at(text: &str, index: usize, keyword: &str) -> bool {
    let bytes = text.as_bytes();
    let keyword = keyword.as_bytes();
    index + keyword.len() <= bytes.len()
        && bytes[index..index + keyword.len()].eq_ignore_ascii_case(keyword)
}

fn boundary_before(text: &str, index: usize) -> bool {
    if index == 0 {
        return true;
    }
    match text[..index].chars().next_back() {
        Some(c) => c.is_whitespace() || c == '(' || c == '^',
        None => false,
    }
}

/// True if the prefix `name` occurs in `text` after a boundary character
/// (whitespace, an opening parenthesis, a caret, or the text start).
/// With `skip_window_refs`, occurrences that start a `:winN ` window
/// token are not counted.
pub fn prefix_occurs(text: &str, name: &str, skip_window_refs: bool) -> bool {
    let mut search_from = 0;
    while let Some(relative) = text[search_from..].find(name) {
        let index = search_from + relative;
        let after = &text[index + name.len()..];
        if boundary_before(text, index)
            && !(skip_window_refs && WINDOW_REF_REMAINDER_REGEX.is_match(after))
        {
            return true;
        }
        search_from = index + name.len().max(1);
    }
    false
}

/// Replaces every boundary-delimited occurrence of the prefix `name` in
/// `text` by `replacement`, leaving `:winN ` window tokens untouched when
/// `skip_window_refs` is set.
pub fn replace_prefix_name(
    text: &str,
    name: &str,
    replacement: &str,
    skip_window_refs: bool,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut index = 0;
    while index < text.len() {
        if text[index..].starts_with(name) && boundary_before(text, index) {
            let after = &text[index + name.len()..];
            if !(skip_window_refs && WINDOW_REF_REMAINDER_REGEX.is_match(after)) {
                out.push_str(replacement);
                index += name.len();
                continue;
            }
        }
        match text[index..].chars().next() {
            Some(c) => {
                out.push(c);
                index += c.len_utf8();
            }
            None => break,
        }
    }
    out
}

/// Orders names so that any name containing another comes before it.
/// Substitution by literal replacement is only safe in this order.
pub fn sort_longest_contains_first(names: &mut [String]) {
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
}

/// Generates an unbound variable name accepted by the given predicate.
/// Candidates are drawn from a process-wide counter, so accepted names
/// are also unique across derivations.
pub fn generate_unbound_variable<F>(accept: F) -> String
where
    F: Fn(&str) -> bool,
{
    loop {
        let n = VARIABLE_COUNTER.fetch_add(1, Ordering::Relaxed);
        // the leading letter rotates so a taken short name cannot block
        // every candidate
        let stem = (b'a' + (n % 26) as u8) as char;
        let candidate = format!("?{stem}{n}");
        if accept(&candidate) {
            return candidate;
        }
    }
}

/// A variable name that shares no substring relation with any name in
/// `conflicting`, in either direction.
pub fn generate_variable_outside(conflicting: &[String]) -> String {
    generate_unbound_variable(|candidate| {
        conflicting
            .iter()
            .all(|s| !s.contains(candidate) && !candidate.contains(s.as_str()))
    })
}

/// A fresh IRI used to temporarily stand in for an unbound variable when
/// query text is round-tripped through an RDF parser.
pub fn variable_mapping_iri() -> String {
    let n = VARIABLE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("<http://idlab.ugent.be/divide/variable-mapping/{n}>")
}

/// A fresh IRI used as a marker property when a query result part is
/// synthesized from a list of variables.
pub fn marker_property_iri() -> String {
    let n = VARIABLE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("<http://idlab.ugent.be/divide/tmp/property/{n}>")
}

/// A globally unique prefix name for resolving prefix-name conflicts
/// between sub-queries.
pub fn generate_prefix_name() -> String {
    format!("newPrefix{}:", PREFIX_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// A globally unique replacement name for a conflicting fixed-vocabulary
/// prefix.
pub fn generate_divide_prefix_name() -> String {
    format!("divide-g{}:", PREFIX_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Resolves a graph name against a set of prefixes. A name in angle
/// brackets is taken as is; otherwise it must start with one of the
/// declared prefix names and is expanded to a full IRI.
pub fn resolve_graph_name(graph_name: &str, prefixes: &[Prefix]) -> ParserResult<String> {
    if let Some(rest) = graph_name.strip_prefix('<') {
        if !rest.ends_with('>') {
            return Err(ParserError::MalformedQuery(format!(
                "invalid graph name '{graph_name}'"
            )));
        }
        Ok(graph_name.to_string())
    } else {
        for prefix in prefixes {
            if let Some(local) = graph_name.strip_prefix(prefix.name.as_str()) {
                let uri_open = prefix.uri.strip_suffix('>').unwrap_or(&prefix.uri);
                return Ok(format!("{uri_open}{local}>"));
            }
        }
        Err(ParserError::MalformedQuery(format!(
            "invalid graph name '{graph_name}' (no valid IRI & no existing prefix used)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_variables_in_first_occurrence_order() {
        let vars = find_unbound_variables("?b ?a ?b ?c");
        assert_eq!(vars, vec!["?b", "?a", "?c"]);
    }

    #[test]
    fn placeholders_are_not_variables() {
        assert!(find_unbound_variables("RANGE ?{x} STEP PT5S").is_empty());
        assert_eq!(
            find_window_placeholder_variables("FROM NOW-?{x} TO NOW-?{y}"),
            vec!["?x", "?y"]
        );
    }

    #[test]
    fn window_placeholder_spelling() {
        assert_eq!(window_placeholder("?seconds"), "?{seconds}");
    }

    #[test]
    fn used_prefixes_require_a_boundary() {
        let names = find_used_prefix_names("?s ex:v ?o . ?s rdf:type ex:T");
        assert_eq!(names, vec!["ex:", "rdf:", "ex:"]);
        // a colon inside an IRI is not a prefix occurrence
        assert!(find_used_prefix_names("?s <http://example.org/v> ?o").is_empty());
    }

    #[test]
    fn unnamed_prefix_is_detected() {
        assert_eq!(find_used_prefix_names("?s :v ?o"), vec![":"]);
    }

    #[test]
    fn prefix_occurrence_skips_window_tokens() {
        let body = "FROM NAMED WINDOW :win0 ON <s> [RANGE PT5S]\nWHERE { ?s :v ?o }";
        assert!(prefix_occurs(body, ":", true));
        let only_window = "FROM NAMED WINDOW :win0 ON <s> [RANGE PT5S]";
        assert!(!prefix_occurs(only_window, ":", true));
        assert!(prefix_occurs(only_window, ":", false));
    }

    #[test]
    fn prefix_replacement_preserves_window_tokens() {
        let body = "WINDOW :win0 { ?s :v ?o }";
        let replaced = replace_prefix_name(body, ":", "divide-g0:", true);
        assert_eq!(replaced, "WINDOW :win0 { ?s divide-g0:v ?o }");
    }

    #[test]
    fn containment_sorted_before_substitution() {
        let mut names = vec!["?v".to_string(), "?value".to_string(), "?val".to_string()];
        sort_longest_contains_first(&mut names);
        assert_eq!(names, vec!["?value", "?val", "?v"]);
    }

    #[test]
    fn generated_variable_avoids_exclusions() {
        let taken = vec!["?patient".to_string()];
        let fresh = generate_variable_outside(&taken);
        assert!(!taken.iter().any(|t| t.contains(&fresh)));
        assert!(fresh.starts_with('?'));
    }

    #[test]
    fn graph_names_resolve_through_prefixes() {
        let prefixes = vec![Prefix::new("ex:", "<http://example.org/>")];
        assert_eq!(
            resolve_graph_name("ex:stream", &prefixes).unwrap(),
            "<http://example.org/stream>"
        );
        assert_eq!(
            resolve_graph_name("<http://example.org/g>", &prefixes).unwrap(),
            "<http://example.org/g>"
        );
        assert!(resolve_graph_name("unknown:g", &prefixes).is_err());
        assert!(resolve_graph_name("<http://example.org/g", &prefixes).is_err());
    }
}
