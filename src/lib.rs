//! Compiles MongoDB-style metadata filters into EdgeQL predicate fragments
//! for Gel vector store queries.
//!
//! ```
//! use serde_json::json;
//!
//! let fragment = gelfilter::compile(&json!({"$in": {"year": [2020, 2021]}})).unwrap();
//! assert_eq!(
//!     fragment,
//!     r#"<str>json_get(.metadata, "year") in array_unpack([2020, 2021])"#
//! );
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod input;

pub use config::{CompileMode, CompilerConfig};
pub use error::{Error, Result};
pub use filter::{CompiledFilter, FilterAst, FilterCompiler, compile, filter_clause};
