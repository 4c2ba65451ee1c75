#[cfg(test)]
mod tests {
    use crate::config::CliConfig;
    use crate::{parse_value_args, Args};
    use clap::Parser;
    use intrudr_engine::{AttackMode, ValueSource};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["intrudr"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_load_config_defaults() {
        let config = CliConfig::load(&args(&[])).unwrap();

        assert_eq!(config.dispatch.max_workers, 12);
        assert_eq!(config.dispatch.timeout_ms, 60_000);
        assert_eq!(config.dispatch.retries, 1);
        assert!(!config.dispatch.verify_tls);
        assert!(config.dispatch.record_raw);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_config_from_cli() {
        let args = args(&[
            "--workers",
            "3",
            "--timeout",
            "2.5",
            "--retries",
            "0",
            "--proxy",
            "http://127.0.0.1:8080",
            "--verify-tls",
            "--no-raw",
            "--log-level",
            "debug",
        ]);

        let config = CliConfig::load(&args).unwrap();
        assert_eq!(config.dispatch.max_workers, 3);
        assert_eq!(config.dispatch.timeout_ms, 2_500);
        assert_eq!(config.dispatch.retries, 0);
        assert_eq!(config.dispatch.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert!(config.dispatch.verify_tls);
        assert!(!config.dispatch.record_raw);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
            [dispatch]
            max_workers = 4
            jitter_min_ms = 0
            jitter_max_ms = 10

            [logging]
            level = "info"
            log_file = "/tmp/intrudr.log"
        "#;
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let path = temp_file.path().to_str().unwrap();
        let config = CliConfig::load(&args(&["--config", path])).unwrap();

        assert_eq!(config.dispatch.max_workers, 4);
        assert_eq!(config.dispatch.jitter_max_ms, 10);
        // Unset keys keep their defaults
        assert_eq!(config.dispatch.retries, 1);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.log_file.as_deref(), Some("/tmp/intrudr.log"));
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[dispatch]\nmax_workers = 4\nretries = 3\n")
            .unwrap();

        let path = temp_file.path().to_str().unwrap();
        let config = CliConfig::load(&args(&["--config", path, "--workers", "8"])).unwrap();

        assert_eq!(config.dispatch.max_workers, 8);
        assert_eq!(config.dispatch.retries, 3);
    }

    #[test]
    fn test_invalid_config_values() {
        assert!(CliConfig::load(&args(&["--workers", "0"])).is_err());
        assert!(CliConfig::load(&args(&["--timeout", "0"])).is_err());

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[dispatch]\nmax_workers = \"many\"\n").unwrap();
        let path = temp_file.path().to_str().unwrap();
        assert!(CliConfig::load(&args(&["--config", path])).is_err());

        assert!(CliConfig::load(&args(&["--config", "/nonexistent/intrudr.toml"])).is_err());
    }

    #[test]
    fn test_mode_argument() {
        assert_eq!(args(&["--mode", "pitchfork"]).mode, Some(AttackMode::Pitchfork));
        assert_eq!(args(&["-m", "battering-ram"]).mode, Some(AttackMode::BatteringRam));
        assert_eq!(args(&[]).mode, None);
        assert!(Args::try_parse_from(["intrudr", "--mode", "shotgun"]).is_err());
    }

    #[test]
    fn test_hide_requests_flag() {
        assert!(!args(&[]).hide_requests);
        assert!(args(&["--hide-requests"]).hide_requests);
    }

    #[test]
    fn test_parse_value_args() {
        let values: Vec<String> = ["user=alice", "user=bob", "pass=@words.txt", "q=a=b", "empty="]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let sources = parse_value_args(&values).unwrap();
        assert_eq!(
            sources["user"],
            ValueSource::Manual {
                values: vec!["alice".to_string(), "bob".to_string()]
            }
        );
        assert_eq!(
            sources["pass"],
            ValueSource::Wordlist {
                path: PathBuf::from("words.txt")
            }
        );
        assert_eq!(
            sources["q"],
            ValueSource::Manual {
                values: vec!["a=b".to_string()]
            }
        );
        assert_eq!(
            sources["empty"],
            ValueSource::Manual {
                values: vec![String::new()]
            }
        );
    }

    #[test]
    fn test_parse_value_args_errors() {
        assert!(parse_value_args(&["novalue".to_string()]).is_err());
        assert!(parse_value_args(&["=x".to_string()]).is_err());
        assert!(parse_value_args(&["a=1".to_string(), "a=@list.txt".to_string()]).is_err());
        assert!(parse_value_args(&["a=@list.txt".to_string(), "a=1".to_string()]).is_err());
    }
}
