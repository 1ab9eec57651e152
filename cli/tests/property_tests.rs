use pkgctl::cli::normalize_legacy_flags;
use pkgctl::config::Config;
use pkgctl::discovery::strip_embedded_suffix;
use pkgctl::dispatcher::PackageCommand;
use proptest::prelude::*;
use sdk::errors::PackageError;

const COMMANDS: [&str; 7] = [
    "add-repo",
    "list",
    "list-available",
    "install",
    "deploy",
    "redeploy",
    "update",
];

proptest! {
    // Anything outside the command set is rejected during validation
    #[test]
    fn test_unknown_tokens_rejected(
        token in "[a-zA-Z_-]{0,16}",
        args in proptest::collection::vec("[a-z0-9.]{1,8}", 0..4),
    ) {
        prop_assume!(!COMMANDS.contains(&token.as_str()));
        let result = PackageCommand::parse(&token, &args);
        prop_assert!(matches!(result, Err(PackageError::UnrecognizedCommand(_))));
    }

    // Known commands with enough arguments always validate
    #[test]
    fn test_known_commands_with_arguments_accepted(
        idx in 0..COMMANDS.len(),
        args in proptest::collection::vec("[a-z0-9.]{1,8}", 2..5),
    ) {
        let command = PackageCommand::parse(COMMANDS[idx], &args).unwrap();
        prop_assert_eq!(command.name(), COMMANDS[idx]);
    }

    #[test]
    fn test_embedded_suffix_stripping_is_idempotent(host in "[a-z0-9.:,/]{1,24}") {
        let once = strip_embedded_suffix(&format!("{}(embedded)", host)).to_string();
        prop_assert_eq!(strip_embedded_suffix(&once), once.as_str());
        prop_assert_eq!(once, host.trim());
    }

    // Command arguments are never rewritten
    #[test]
    fn test_legacy_flags_leave_command_args_alone(
        args in proptest::collection::vec("-?[a-zA-Z]{1,8}", 0..5),
    ) {
        let mut argv = vec!["pkgctl".to_string(), "deploy".to_string()];
        argv.extend(args);
        prop_assert_eq!(normalize_legacy_flags(argv.clone()), argv);
    }

    #[test]
    fn test_config_parsing_round_trip(
        log_level in "error|warn|info|debug|trace",
        session_timeout in 1..=600u64,
        http_timeout in 1..=600u64,
        port in 1024..=65535u16,
    ) {
        let toml_text = format!(
            "[core]\nlog_level = \"{}\"\n\n[cluster]\nsolr_url = \"http://localhost:{}/solr\"\nsession_timeout_secs = {}\n\n[http]\ntimeout_secs = {}\n",
            log_level, port, session_timeout, http_timeout
        );
        let config = Config::from_toml(&toml_text).unwrap();
        let reparsed = Config::from_toml(&toml::to_string_pretty(&config).unwrap()).unwrap();

        prop_assert_eq!(reparsed.core.log_level, log_level);
        prop_assert_eq!(reparsed.cluster.solr_url, format!("http://localhost:{}/solr", port));
        prop_assert_eq!(reparsed.cluster.session_timeout_secs, session_timeout);
        prop_assert_eq!(reparsed.http.timeout_secs, http_timeout);
    }
}
