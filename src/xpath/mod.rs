//! XPath 1.0 Engine
//!
//! - All 13 axes (attribute selections yield values, namespace is empty)
//! - Predicates, unions, arithmetic, comparison and boolean operators
//! - The core function library
//! - Compiled expression caching

pub mod axes;
pub mod cache;
pub mod compiler;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod value;

pub use cache::{CompiledCache, DEFAULT_CACHE_CAPACITY};
pub use compiler::{compile, CompiledExpr};
pub use eval::{evaluate, evaluate_compiled, evaluate_from_node, EvalContext};
pub use value::XPathValue;
