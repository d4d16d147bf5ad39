pub mod gemini;

pub use gemini::{ChatTurn, GeminiClient, Role};
