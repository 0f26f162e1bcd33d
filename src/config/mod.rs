// Configuration management module
// TOML settings stored in the application directory, plus the interactive editor

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, DEFAULT_RESULT_LIMIT, DEFAULT_SIMILARITY_THRESHOLD, EmbeddingConfig, EmbeddingProviderKind, GenerationConfig,
    GenerationProviderKind, HttpConfig, IngestConfig, OllamaConfig, OpenAiConfig, RetrievalConfig,
};
