#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.generation.max_output_tokens, 250);
        assert_eq!(config.generation.replies_per_question, 3);
        assert_eq!(config.generation.max_empty_retries, None);
        assert_eq!(config.embedding.chunk_size, 100);
        assert_eq!(config.dataset.min_human_answers, 3);
    }

    #[test]
    fn test_default_retry_is_unbounded() {
        let options = GenerationConfig::default().backend_options();
        assert_eq!(options.retry, RetryPolicy::Unbounded);
        assert_eq!(options.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            "[generation]\nmax_empty_retries = 5\n\n[paths]\ndata_dir = \"/tmp/cp\"\n",
        )
        .unwrap();
        assert_eq!(config.generation.backend_options().retry, RetryPolicy::bounded(5));
        assert_eq!(config.generation.request_timeout_secs, 120);
        assert_eq!(
            config.paths.exclusions_for("gpt35.json"),
            PathBuf::from("/tmp/cp/filtered/rows_to_remove_gpt35.json")
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.services.manifest, default_manifest());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("counterpoint.toml");
        std::fs::write(&path, "[generation\nmax_output_tokens = ").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
