pub mod exporter;
pub mod serializer;
pub mod snippets;

pub use exporter::DataExporter;
pub use snippets::{SnippetStore, SqlSnippet};
