pub mod cache;
pub mod engine;
pub mod error;
pub mod http;
pub mod source;

pub use cache::TransactionCache;
pub use engine::{EngineConfig, FetchOptions, LedgerStats, RetrievalEngine};
pub use error::SourceError;
pub use http::HttpTransactionSource;
pub use source::{PageQuery, RawTransaction, TransactionSource};
