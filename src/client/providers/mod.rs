pub mod arxiv;
pub mod doi;
pub mod isbn;
pub mod registry;
pub mod traits;

pub use arxiv::ArxivAdapter;
pub use doi::DoiAdapter;
pub use isbn::IsbnAdapter;
pub use registry::AdapterRegistry;
pub use traits::{titles_similar, FetchError, FetchErrorKind, SearchQuery, SearchType, SourceAdapter};
