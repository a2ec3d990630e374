pub mod db;
pub mod summary_llm;

pub use db::DbAdapter;
pub use summary_llm::OpenAiSummaryAdapter;
