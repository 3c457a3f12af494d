pub mod analyzer;
pub mod llm;
pub mod summary;
