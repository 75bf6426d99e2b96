//! Retrieval over per-session vector collections

mod search;

pub use search::{rank_results, Retriever, ERROR_MESSAGE, NO_DOCUMENTS_MESSAGE, NO_RESULTS_MESSAGE};
