use super::*;
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn default_config() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::OpenAi);
    assert_eq!(config.embedding.dimensions, 1536);
    assert_eq!(config.generation.provider, GenerationProviderKind::OpenAi);
    assert_eq!(config.retrieval.threshold, 0.78);
    assert_eq!(config.retrieval.limit, 5);
    assert_eq!(config.ingest.max_concurrency, 8);
    assert_eq!(config.ollama.host, "localhost");
    assert_eq!(config.ollama.port, 11434);
    assert_eq!(config.openai.api_key_env, "OPENAI_API_KEY");
}

#[test]
fn config_validation() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    let mut invalid_config = config.clone();
    invalid_config.ollama.protocol = "ftp".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidProtocol(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.ollama.port = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.embedding.dimensions = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidEmbeddingDimensions(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.threshold = 1.01;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidThreshold(_))
    ));

    let mut invalid_config = config.clone();
    invalid_config.retrieval.threshold = f32::NAN;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.retrieval.limit = 0;
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidLimit(0))
    ));

    let mut invalid_config = config.clone();
    invalid_config.ingest.max_concurrency = 0;
    assert!(invalid_config.validate().is_err());

    let mut invalid_config = config.clone();
    invalid_config.openai.api_key_env = "  ".to_string();
    assert!(matches!(
        invalid_config.validate(),
        Err(ConfigError::InvalidApiKeyEnv(_))
    ));

    let mut invalid_config = config;
    invalid_config.openai.embedding_model = String::new();
    assert!(invalid_config.validate().is_err());
}

#[test]
fn stream_timeout_validation() {
    let config = Config::default();
    assert_eq!(config.http.stream_timeout_secs, 300);

    let mut config = Config::default();
    config.http.stream_timeout_secs = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidStreamTimeout(0))
    ));

    config.http.stream_timeout_secs = 3601;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidStreamTimeout(3601))
    ));

    let partial = r#"
        [http]
        stream_timeout_secs = 90
    "#;
    let config: Config = toml::from_str(partial).expect("partial config parses");
    assert_eq!(config.http.stream_timeout_secs, 90);
    assert_eq!(config.http.timeout_secs, 30);
    assert!(config.validate().is_ok());
}

#[test]
fn ollama_url_generation() {
    let config = Config::default();
    let url = config
        .ollama
        .ollama_url()
        .expect("should generate ollama_url successfully");
    assert_eq!(url.as_str(), "http://localhost:11434/");
}

#[test]
fn openai_url_keeps_version_prefix() {
    let mut openai = OpenAiConfig::default();
    let url = openai.api_url().expect("default base url parses");
    assert_eq!(
        url.join("embeddings").expect("join works").as_str(),
        "https://api.openai.com/v1/embeddings"
    );

    openai.base_url = "http://127.0.0.1:9000/v1/".to_string();
    let url = openai.api_url().expect("custom base url parses");
    assert_eq!(
        url.join("responses").expect("join works").as_str(),
        "http://127.0.0.1:9000/v1/responses"
    );
}

#[test]
fn toml_serialization() {
    let config = Config::default();
    let toml_str = toml::to_string(&config).expect("should serialize toml correctly");
    let parsed_config: Config = toml::from_str(&toml_str).expect("should parse toml correctly");
    assert_eq!(config, parsed_config);
}

#[test]
fn partial_toml_uses_defaults() {
    let partial = r#"
        [embedding]
        provider = "ollama"
        dimensions = 768

        [retrieval]
        limit = 3
    "#;

    let config: Config = toml::from_str(partial).expect("partial config parses");
    assert_eq!(config.embedding.provider, EmbeddingProviderKind::Ollama);
    assert_eq!(config.embedding.dimensions, 768);
    assert_eq!(config.retrieval.limit, 3);
    assert_eq!(config.retrieval.threshold, DEFAULT_SIMILARITY_THRESHOLD);
    assert_eq!(config.generation.provider, GenerationProviderKind::OpenAi);
}

#[test]
fn unknown_provider_is_rejected() {
    let invalid = r#"
        [embedding]
        provider = "word2vec"
    "#;

    let result: Result<Config, toml::de::Error> = toml::from_str(invalid);
    assert!(result.is_err());
}

#[test]
fn setter_validation() {
    let mut config = OllamaConfig::default();

    assert!(config.set_protocol("https".to_string()).is_ok());
    assert!(config.set_host("example.com".to_string()).is_ok());
    assert!(config.set_port(8080).is_ok());
    assert!(config.set_embedding_model("mxbai-embed-large".to_string()).is_ok());
    assert!(config.set_chat_model("qwen2.5:7b".to_string()).is_ok());

    assert!(config.set_protocol("ftp".to_string()).is_err());
    assert!(config.set_port(0).is_err());
    assert!(config.set_embedding_model(String::new()).is_err());
    assert!(config.set_chat_model("   ".to_string()).is_err());
}

#[test]
fn load_missing_file_returns_defaults() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let config = Config::load(temp_dir.path()).expect("missing config falls back to defaults");

    assert_eq!(config.base_dir, temp_dir.path());
    assert_eq!(config.embedding, EmbeddingConfig::default());
    assert_eq!(config.database_path(), temp_dir.path().join("folio.db"));
    assert_eq!(config.vector_database_path(), temp_dir.path().join("vectors"));
}

#[test]
fn save_and_reload() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    let mut config = Config::load(temp_dir.path()).expect("defaults load");
    config.embedding.provider = EmbeddingProviderKind::Hashing;
    config.embedding.dimensions = 256;
    config.retrieval.threshold = 0.5;

    config.save().expect("config saves");
    assert!(config.config_file_path().exists());

    let reloaded = Config::load(temp_dir.path()).expect("config reloads");
    assert_eq!(reloaded, config);
}

#[test]
fn load_rejects_invalid_values() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");
    std::fs::write(
        temp_dir.path().join("config.toml"),
        "[retrieval]\nthreshold = 2.0\n",
    )
    .expect("should write config");

    assert!(Config::load(temp_dir.path()).is_err());
}

#[test]
#[serial]
fn config_dir_honours_home_override() {
    let temp_dir = TempDir::new().expect("should create TempDir successfully");

    // SAFETY: serialized with the other tests touching FOLIO_HOME
    unsafe { std::env::set_var("FOLIO_HOME", temp_dir.path()) };
    let dir = Config::config_dir().expect("override resolves");
    unsafe { std::env::remove_var("FOLIO_HOME") };

    assert_eq!(dir, temp_dir.path());
}
