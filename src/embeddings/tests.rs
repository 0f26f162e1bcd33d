use super::*;

#[test]
fn normalize_input_flattens_newlines() {
    assert_eq!(normalize_input("a\nb"), "a b");
    assert_eq!(normalize_input("a\r\nb\rc"), "a b c");
    assert_eq!(normalize_input("no breaks"), "no breaks");
}

#[test]
fn ensure_dimensions_checks_length() {
    assert!(ensure_dimensions("test", &[0.0; 4], 4).is_ok());

    let err = ensure_dimensions("test", &[0.0; 3], 4).expect_err("length differs");
    assert!(matches!(err, FolioError::Provider(_)));
    assert!(err.to_string().contains("expected 4"));
}

#[test]
fn builds_hashing_provider_without_network() {
    let mut config = Config::default();
    config.embedding.provider = EmbeddingProviderKind::Hashing;
    config.embedding.dimensions = 64;

    let provider = build_embedding_provider(&config).expect("hashing provider builds");
    assert_eq!(provider.name(), "hashing");
    assert_eq!(provider.dimensions(), 64);
}

#[test]
fn builds_ollama_provider_from_config() {
    let mut config = Config::default();
    config.embedding.provider = EmbeddingProviderKind::Ollama;
    config.embedding.dimensions = 768;

    let provider = build_embedding_provider(&config).expect("ollama provider builds");
    assert_eq!(provider.name(), "ollama");
    assert_eq!(provider.dimensions(), 768);
}
