use std::io::Write;
use std::time::Duration;

use repair_agents::config::{ConfigOverrides, EnvSource, ProviderKind, RepairConfig};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn file_values_feed_the_orchestrator_settings() {
    let file = write_config(
        r#"
max_iterations = 2
max_review_attempts = 4
request_timeout_secs = 30
run_deadline_secs = 600

[provider]
kind = "groq"
model = "llama-3.3-70b-versatile"
api_key = "gsk-test"
"#,
    );

    let config = RepairConfig::from_file(file.path()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.max_iterations, 2);
    assert_eq!(config.max_review_attempts, 4);
    assert_eq!(config.request_timeout(), Duration::from_secs(30));
    assert_eq!(config.run_deadline(), Some(Duration::from_secs(600)));

    let endpoint = config.provider.resolve_with(|_| None).unwrap();
    assert_eq!(endpoint.kind, ProviderKind::Groq);
    assert_eq!(endpoint.base_url, ProviderKind::Groq.default_base_url());
    assert_eq!(endpoint.model, "llama-3.3-70b-versatile");
    assert_eq!(endpoint.api_key, "gsk-test");
}

#[test]
fn switching_provider_on_the_command_line_drops_file_endpoint() {
    let file = write_config(
        r#"
[provider]
kind = "together"
base_url = "https://proxy.internal/v1"
model = "custom"
"#,
    );

    let mut config = RepairConfig::from_file(file.path()).unwrap();
    config.apply_overrides(&ConfigOverrides {
        provider: Some(ProviderKind::Local),
        ..Default::default()
    });

    let endpoint = config.provider.resolve_with(|_| None).unwrap();
    assert_eq!(endpoint.base_url, ProviderKind::Local.default_base_url());
    assert_eq!(endpoint.model, ProviderKind::Local.default_model());
}

#[test]
fn malformed_file_reports_its_path() {
    let file = write_config("max_iterations = \"many\"");
    let err = RepairConfig::from_file(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains(&file.path().display().to_string()));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(RepairConfig::from_file(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn dotenv_file_supplies_provider_and_key() {
    let file = write_config(
        "# credentials\nREPAIR_PROVIDER=together\nTOGETHER_API_KEY=\"tk-from-dotenv\"\nREPAIR_MAX_REVIEW_ATTEMPTS=4\n",
    );

    let env = EnvSource::from_file(file.path()).unwrap();
    assert_eq!(env.file_entries(), 3);

    let config = RepairConfig::load(None, &env).unwrap();
    assert_eq!(config.provider.kind, ProviderKind::Together);
    assert_eq!(config.max_review_attempts, 4);

    let endpoint = config.provider.resolve(&env).unwrap();
    assert_eq!(endpoint.api_key, "tk-from-dotenv");
    assert_eq!(endpoint.base_url, ProviderKind::Together.default_base_url());
}

#[test]
fn malformed_dotenv_file_is_an_error() {
    let file = write_config("REPAIR_PROVIDER='unterminated\n");
    assert!(EnvSource::from_file(file.path()).is_err());
}

#[test]
fn process_only_source_reads_no_file() {
    assert_eq!(EnvSource::process().file_entries(), 0);
}
