pub mod answer;
pub mod extractor;
pub mod llm;
pub mod prompt;
pub mod sanitizer;
pub mod store;

pub use answer::{AnswerRequest, AnswerService};
pub use extractor::{ExtractedDocument, ExtractionRequest, ExtractionStrategy, Extractor};
pub use llm::{Completion, CompletionOptions, CompletionService, GroqClient};
pub use sanitizer::{sanitize, AnswerMode, SanitizedAnswer};
pub use store::{DocumentStore, NewDocument};
