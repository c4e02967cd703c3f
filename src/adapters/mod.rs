// Adapters layer: concrete implementations of the domain ports for external systems.

pub mod openai;
pub mod serper;

pub use openai::OpenAiChatModel;
pub use serper::SerperSearch;
