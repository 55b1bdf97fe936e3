//! Compiles declarative query input into the artifacts that drive a
//! rule-based query derivation: an RSP-QL query pattern, a sensor query
//! rule and a goal.
//!
//! The entry point is [`DivideQueryParser`].

mod body;
mod error;
mod generator;
mod hygiene;
mod input;
mod parser;
mod query;
mod sparql;
mod splitter;
mod where_clause;
mod window;

pub use error::{ParserError, ParserResult};
pub use generator::turtle_prefix_list;
pub use input::{InputQueryLanguage, ParserInput, ParserOutput, StreamWindow};
pub use parser::DivideQueryParser;
pub use query::{ParsedQuery, Prefix, QueryForm, SplitQuery};
pub use splitter::parse_sparql_query;
pub use window::{WindowParameter, WindowParameterType};
