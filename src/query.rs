//! Value types produced and consumed by the query derivation stages.
//!
//! Every type here is an immutable snapshot: each pipeline stage takes one
//! of these values and returns a new one instead of rewriting in place.

use std::fmt;

/// Form keyword of a SPARQL or RSP-QL query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryForm {
    Construct,
    Select,
    Ask,
    Describe,
}

impl QueryForm {
    /// Parses a form keyword, case-insensitively.
    pub fn from_keyword(keyword: &str) -> Option<QueryForm> {
        if keyword.eq_ignore_ascii_case("CONSTRUCT") {
            Some(QueryForm::Construct)
        } else if keyword.eq_ignore_ascii_case("SELECT") {
            Some(QueryForm::Select)
        } else if keyword.eq_ignore_ascii_case("ASK") {
            Some(QueryForm::Ask)
        } else if keyword.eq_ignore_ascii_case("DESCRIBE") {
            Some(QueryForm::Describe)
        } else {
            None
        }
    }

    /// The lowercase spelling used in generated shape descriptions,
    /// e.g. `sh:construct`.
    pub fn lowercase(&self) -> &'static str {
        match self {
            QueryForm::Construct => "construct",
            QueryForm::Select => "select",
            QueryForm::Ask => "ask",
            QueryForm::Describe => "describe",
        }
    }
}

impl fmt::Display for QueryForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryForm::Construct => "CONSTRUCT",
            QueryForm::Select => "SELECT",
            QueryForm::Ask => "ASK",
            QueryForm::Describe => "DESCRIBE",
        })
    }
}

/// A declared prefix name/URI pair.
///
/// The name keeps its trailing colon and the URI keeps its surrounding
/// angle brackets, exactly as they appear in a `PREFIX` declaration. Two
/// prefixes are equal only if both fields are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix {
    pub name: String,
    pub uri: String,
}

impl Prefix {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Prefix {
        Prefix {
            name: name.into(),
            uri: uri.into(),
        }
    }

    /// The prefix name without its trailing colon.
    pub fn name_without_colon(&self) -> &str {
        self.name.strip_suffix(':').unwrap_or(&self.name)
    }

    /// The URI without its surrounding angle brackets.
    pub fn uri_without_brackets(&self) -> &str {
        self.uri
            .strip_prefix('<')
            .and_then(|u| u.strip_suffix('>'))
            .unwrap_or(&self.uri)
    }
}

/// The normalized decomposition of one input query string.
///
/// Parts that are absent in the query are empty strings. The result part
/// has its outer braces removed for CONSTRUCT queries; the WHERE part is
/// the clause content without the `WHERE` keyword and braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitQuery {
    pub prefix_part: String,
    pub form: QueryForm,
    pub result_part: String,
    pub from_part: String,
    pub where_part: String,
    pub trailing_part: String,
}

impl SplitQuery {
    pub fn has_from_part(&self) -> bool {
        !self.from_part.trim().is_empty()
    }

    pub fn has_where_part(&self) -> bool {
        !self.where_part.trim().is_empty()
    }

    pub fn has_trailing_part(&self) -> bool {
        !self.trailing_part.trim().is_empty()
    }
}

/// A [`SplitQuery`] together with its set of prefixes that are actually
/// used in the query body. Prefixes declared but unused are dropped when
/// this value is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    pub split: SplitQuery,
    pub prefixes: Vec<Prefix>,
}

impl ParsedQuery {
    pub fn new(split: SplitQuery, mut prefixes: Vec<Prefix>) -> ParsedQuery {
        // sorted so that downstream prefix lists render deterministically
        prefixes.sort();
        prefixes.dedup();
        ParsedQuery { split, prefixes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_form_keywords_are_case_insensitive() {
        assert_eq!(QueryForm::from_keyword("construct"), Some(QueryForm::Construct));
        assert_eq!(QueryForm::from_keyword("Select"), Some(QueryForm::Select));
        assert_eq!(QueryForm::from_keyword("ASK"), Some(QueryForm::Ask));
        assert_eq!(QueryForm::from_keyword("DESCRIBE"), Some(QueryForm::Describe));
        assert_eq!(QueryForm::from_keyword("INSERT"), None);
    }

    #[test]
    fn prefix_strips_decorations() {
        let prefix = Prefix::new("ex:", "<http://example.org/>");
        assert_eq!(prefix.name_without_colon(), "ex");
        assert_eq!(prefix.uri_without_brackets(), "http://example.org/");

        let unnamed = Prefix::new(":", "<http://example.org/>");
        assert_eq!(unnamed.name_without_colon(), "");
    }

    #[test]
    fn parsed_query_deduplicates_prefixes() {
        let split = SplitQuery {
            prefix_part: String::new(),
            form: QueryForm::Construct,
            result_part: String::new(),
            from_part: String::new(),
            where_part: String::new(),
            trailing_part: String::new(),
        };
        let parsed = ParsedQuery::new(
            split,
            vec![
                Prefix::new("ex:", "<http://example.org/>"),
                Prefix::new("ex:", "<http://example.org/>"),
            ],
        );
        assert_eq!(parsed.prefixes.len(), 1);
    }
}
