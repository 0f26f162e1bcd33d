
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{
    Config, ConfigError, EmbeddingProviderKind, GenerationProviderKind, OllamaConfig, OpenAiConfig,
};

const CONNECTION_TEST_TIMEOUT_SECS: u64 = 5;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Folio Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Providers").bold().yellow());
    eprintln!("Choose where embeddings and answers are generated.");
    eprintln!();

    configure_providers(&mut config)?;

    if uses_ollama(&config) {
        eprintln!();
        eprintln!("{}", style("Ollama Configuration").bold().yellow());
        configure_ollama(&mut config.ollama)?;
    }

    if uses_openai(&config) {
        eprintln!();
        eprintln!("{}", style("OpenAI Configuration").bold().yellow());
        configure_openai(&mut config.openai)?;
    }

    eprintln!();
    eprintln!("{}", style("Retrieval Defaults").bold().yellow());
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if uses_ollama(&config) {
        if test_ollama_connection(&config.ollama) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before loading documents.");
        }
    }

    if uses_openai(&config) {
        if test_openai_connection(&config.openai) {
            eprintln!("{}", style("✓ OpenAI connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style(format!(
                    "⚠ Warning: Could not reach OpenAI (is ${} set?)",
                    config.openai.api_key_env
                ))
                .yellow()
            );
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    eprintln!("  Dimensions: {}", style(config.embedding.dimensions).cyan());

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!("  Provider: {}", style(config.generation.provider).cyan());

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Threshold: {}", style(config.retrieval.threshold).cyan());
    eprintln!("  Limit: {}", style(config.retrieval.limit).cyan());
    eprintln!(
        "  Ingest Concurrency: {}",
        style(config.ingest.max_concurrency).cyan()
    );

    if uses_ollama(&config) {
        eprintln!();
        eprintln!("{}", style("Ollama Settings:").bold().yellow());
        match config.ollama.ollama_url() {
            Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
            Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
        }
        eprintln!(
            "  Embedding Model: {}",
            style(&config.ollama.embedding_model).cyan()
        );
        eprintln!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
    }

    if uses_openai(&config) {
        eprintln!();
        eprintln!("{}", style("OpenAI Settings:").bold().yellow());
        eprintln!("  Base URL: {}", style(&config.openai.base_url).cyan());
        let key_state = if config.openai.api_key().is_some() {
            style("set").green()
        } else {
            style("missing").red()
        };
        eprintln!(
            "  API Key (${}): {}",
            config.openai.api_key_env, key_state
        );
        eprintln!(
            "  Embedding Model: {}",
            style(&config.openai.embedding_model).cyan()
        );
        eprintln!("  Chat Model: {}", style(&config.openai.chat_model).cyan());
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let dir = Config::config_dir().context("Failed to locate configuration directory")?;
    Config::load(&dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn uses_ollama(config: &Config) -> bool {
    config.embedding.provider == EmbeddingProviderKind::Ollama
        || config.generation.provider == GenerationProviderKind::Ollama
}

fn uses_openai(config: &Config) -> bool {
    config.embedding.provider == EmbeddingProviderKind::OpenAi
        || config.generation.provider == GenerationProviderKind::OpenAi
}

fn configure_providers(config: &mut Config) -> Result<()> {
    let embedding_kinds = [
        EmbeddingProviderKind::OpenAi,
        EmbeddingProviderKind::Ollama,
        EmbeddingProviderKind::Hashing,
    ];
    let embedding_labels: Vec<String> = embedding_kinds.iter().map(|k| k.to_string()).collect();
    let default_index = embedding_kinds
        .iter()
        .position(|&k| k == config.embedding.provider)
        .unwrap_or(0);

    let embedding_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(&embedding_labels)
        .interact()?;
    let embedding_provider = embedding_kinds[embedding_index];

    let dimensions: u32 = Input::new()
        .with_prompt("Embedding dimensions (must match the model output)")
        .default(suggested_dimensions(embedding_provider, config))
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            if (1..=8192).contains(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidEmbeddingDimensions(*input))
            }
        })
        .interact_text()?;

    let generation_kinds = [GenerationProviderKind::OpenAi, GenerationProviderKind::Ollama];
    let generation_labels: Vec<String> = generation_kinds.iter().map(|k| k.to_string()).collect();
    let default_index = generation_kinds
        .iter()
        .position(|&k| k == config.generation.provider)
        .unwrap_or(0);

    let generation_index = Select::new()
        .with_prompt("Answer generation provider")
        .default(default_index)
        .items(&generation_labels)
        .interact()?;

    config.embedding.provider = embedding_provider;
    config.embedding.dimensions = dimensions;
    config.generation.provider = generation_kinds[generation_index];

    Ok(())
}

/// Keep the configured dimension unless the provider changed, then offer that provider's usual size
fn suggested_dimensions(provider: EmbeddingProviderKind, config: &Config) -> u32 {
    if provider == config.embedding.provider {
        return config.embedding.dimensions;
    }

    match provider {
        EmbeddingProviderKind::OpenAi => 1536,
        EmbeddingProviderKind::Ollama => 768,
        EmbeddingProviderKind::Hashing => 512,
    }
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(ollama.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_chat_model(chat_model)?;

    Ok(())
}

fn configure_openai(openai: &mut OpenAiConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(openai.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OpenAiConfig {
                base_url: input.clone(),
                ..OpenAiConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(openai.api_key_env.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(openai.embedding_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(openai.chat_model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    openai.base_url = base_url;
    openai.api_key_env = api_key_env;
    openai.embedding_model = embedding_model;
    openai.chat_model = chat_model;
    openai.validate()?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    let threshold: f32 = Input::new()
        .with_prompt("Minimum similarity (0-1, results must score above it)")
        .default(config.retrieval.threshold)
        .validate_with(|input: &f32| -> Result<(), ConfigError> {
            if (0.0..=1.0).contains(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidThreshold(*input))
            }
        })
        .interact_text()?;

    let limit: u32 = Input::new()
        .with_prompt("Maximum chunks per query")
        .default(config.retrieval.limit)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err(ConfigError::InvalidLimit(*input))
            }
        })
        .interact_text()?;

    config.retrieval.threshold = threshold;
    config.retrieval.limit = limit;

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Value cannot be empty")
    } else {
        Ok(())
    }
}

fn test_agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(
            CONNECTION_TEST_TIMEOUT_SECS,
        )))
        .build()
        .into()
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    match test_agent().get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}

fn test_openai_connection(openai: &OpenAiConfig) -> bool {
    let Some(api_key) = openai.api_key() else {
        return false;
    };
    let Some(url) = openai
        .api_url()
        .ok()
        .and_then(|base| base.join("models").ok())
    else {
        return false;
    };

    test_agent()
        .get(url.as_str())
        .header("Authorization", &format!("Bearer {}", api_key))
        .call()
        .is_ok()
}
