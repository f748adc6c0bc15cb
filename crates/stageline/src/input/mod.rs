//! Reading and cleaning source files.

mod clean;
mod parser;
mod source;

pub use clean::{CleanSummary, Cleaner, snake_case};
pub use parser::{Parser, ParserConfig};
pub use source::{DataTable, SourceMetadata};
