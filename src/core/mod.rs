pub mod artifact;
pub mod config;
pub mod description;
pub mod feasibility;
pub mod generation;
pub mod history;
pub mod llm;
pub mod ollama;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod publish;
pub mod renderer;
pub mod reset;
pub mod rules;
pub mod status;

pub use artifact::*;
pub use config::*;
pub use description::*;
pub use generation::*;
pub use history::*;
pub use llm::*;
pub use ollama::*;
pub use parser::*;
pub use pipeline::*;
pub use progress::*;
pub use publish::*;
pub use renderer::*;
pub use reset::*;
pub use rules::*;
pub use status::*;
