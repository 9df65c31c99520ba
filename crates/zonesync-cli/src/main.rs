// # zonesync - DNS record reconciliation CLI
//
// Thin integration layer: reads configuration from the environment, loads
// the desired state document and hands both to zonesync-core. No
// reconciliation logic lives here.
//
// ## Configuration
//
// ### Target
// - `ZONESYNC_DOMAIN`: Domain to reconcile (required)
// - `ZONESYNC_RECORDS_FILE`: JSON array of records, the desired state
//   (required except in export mode)
// - `ZONESYNC_MODE`: validate | plan | apply | export (default: plan)
// - `ZONESYNC_BACKUP_FILE`: Where apply writes the live zone before changing
//   it, and where export writes it (export prints to stdout when unset)
//
// ### Provider
// - `ZONESYNC_PROFILE`: Credential profile (default: default)
// - `ZONESYNC_ENVIRONMENT`: production | ote (default: production)
// - `ZONESYNC_API_KEY` / `ZONESYNC_API_SECRET`, or the profile-scoped
//   `ZONESYNC_<PROFILE>_API_KEY` / `ZONESYNC_<PROFILE>_API_SECRET`
//
// ### Reconciliation
// - `ZONESYNC_PRUNE`: Delete live record sets absent from the file
// - `ZONESYNC_STRICT`: Abort on any invalid record set
// - `ZONESYNC_STOP_ON_ERROR`: Stop scheduling after the first failure
// - `ZONESYNC_PARALLELISM`: Concurrent operations (default: 5)
// - `ZONESYNC_DEADLINE_SECS`: Stop scheduling after this many seconds
//
// ### Transport
// - `ZONESYNC_MAX_RETRIES`: Retries per call (default: 5)
// - `ZONESYNC_RATE_CAPACITY`: Token bucket burst (default: 60)
// - `ZONESYNC_RATE_REFILL`: Tokens per second (default: 1)
//
// ### Logging
// - `ZONESYNC_LOG_LEVEL`: trace | debug | info | warn | error (default: info)
//
// ## Example
//
// ```bash
// export ZONESYNC_DOMAIN=example.com
// export ZONESYNC_RECORDS_FILE=./example.com.json
// export ZONESYNC_API_KEY=...
// export ZONESYNC_API_SECRET=...
// export ZONESYNC_MODE=apply
//
// zonesync
// ```

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use zonesync_core::config::DEFAULT_PROFILE;
use zonesync_core::reconcile::DEFAULT_EVENT_CAPACITY;
use zonesync_core::{
    BulkResult, CredentialProvider, EnvCredentialStore, Environment, Error, ProviderConfig,
    ProviderContext, ProviderRegistry, RateLimitConfig, RateLimiters, ReconcileOptions,
    Reconciler, Record, RecordSet, RetryConfig, SyncConfig, TransportConfig, validator,
};

/// Process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZonesyncExitCode {
    /// Everything succeeded
    Success = 0,
    /// Configuration error or invalid desired state
    ConfigError = 1,
    /// Runtime failure, e.g. credentials rejected on the live fetch
    RuntimeError = 2,
    /// Reconciliation finished with failed or skipped keys
    PartialFailure = 3,
}

impl From<ZonesyncExitCode> for ExitCode {
    fn from(code: ZonesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// What the run does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Check the records file only, no network
    Validate,
    /// Fetch live state and print the operations (dry run)
    Plan,
    /// Apply the operations
    Apply,
    /// Write the live zone as a snapshot, change nothing
    Export,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "validate" => Ok(Mode::Validate),
            "plan" => Ok(Mode::Plan),
            "apply" => Ok(Mode::Apply),
            "export" => Ok(Mode::Export),
            other => anyhow::bail!(
                "ZONESYNC_MODE '{}' is not valid. Valid modes: validate, plan, apply, export",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    domain: String,
    records_file: Option<PathBuf>,
    backup_file: Option<PathBuf>,
    mode: Mode,
    profile: String,
    environment: Environment,
    prune: bool,
    strict: bool,
    stop_on_error: bool,
    parallelism: Option<usize>,
    deadline_secs: Option<u64>,
    max_retries: Option<u32>,
    rate_capacity: Option<u32>,
    rate_refill: Option<u32>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mode: Mode = var("ZONESYNC_MODE").as_deref().unwrap_or("plan").parse()?;
        let records_file = var("ZONESYNC_RECORDS_FILE").map(PathBuf::from);
        if records_file.is_none() && mode != Mode::Export {
            anyhow::bail!("ZONESYNC_RECORDS_FILE is required (a JSON array of records)");
        }

        Ok(Self {
            domain: var("ZONESYNC_DOMAIN")
                .context("ZONESYNC_DOMAIN is required. Set it via: export ZONESYNC_DOMAIN=example.com")?
                .trim()
                .to_lowercase(),
            records_file,
            backup_file: var("ZONESYNC_BACKUP_FILE").map(PathBuf::from),
            mode,
            profile: var("ZONESYNC_PROFILE").unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            environment: var("ZONESYNC_ENVIRONMENT")
                .as_deref()
                .unwrap_or("production")
                .parse()
                .map_err(|e: Error| anyhow::anyhow!("ZONESYNC_ENVIRONMENT: {}", e))?,
            prune: parse_bool("ZONESYNC_PRUNE", var("ZONESYNC_PRUNE"))?,
            strict: parse_bool("ZONESYNC_STRICT", var("ZONESYNC_STRICT"))?,
            stop_on_error: parse_bool("ZONESYNC_STOP_ON_ERROR", var("ZONESYNC_STOP_ON_ERROR"))?,
            parallelism: parse_num("ZONESYNC_PARALLELISM", var("ZONESYNC_PARALLELISM"))?,
            deadline_secs: parse_num("ZONESYNC_DEADLINE_SECS", var("ZONESYNC_DEADLINE_SECS"))?,
            max_retries: parse_num("ZONESYNC_MAX_RETRIES", var("ZONESYNC_MAX_RETRIES"))?,
            rate_capacity: parse_num("ZONESYNC_RATE_CAPACITY", var("ZONESYNC_RATE_CAPACITY"))?,
            rate_refill: parse_num("ZONESYNC_RATE_REFILL", var("ZONESYNC_RATE_REFILL"))?,
            log_level: var("ZONESYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        validate_domain_name(&self.domain)?;

        if let Some(records_file) = &self.records_file
            && self.mode != Mode::Export
            && !records_file.is_file()
        {
            anyhow::bail!(
                "ZONESYNC_RECORDS_FILE does not exist or is not a file: {}",
                records_file.display()
            );
        }

        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            anyhow::bail!("ZONESYNC_MAX_RETRIES must be between 0 and 10. Got: {}", max_retries);
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.sync_config().validate()?;
        Ok(())
    }

    /// Core configuration built from the environment settings
    fn sync_config(&self) -> SyncConfig {
        let provider = ProviderConfig::GoDaddy {
            profile: self.profile.clone(),
            environment: self.environment,
            base_url: None,
        };
        let mut config = SyncConfig::new(self.domain.clone(), provider);

        let defaults = RateLimitConfig::default();
        config.rate_limit = RateLimitConfig {
            capacity: self.rate_capacity.unwrap_or(defaults.capacity),
            refill_per_sec: self.rate_refill.unwrap_or(defaults.refill_per_sec),
            blocking: true,
        };

        let retry = RetryConfig::default();
        config.transport = TransportConfig {
            retry: RetryConfig {
                max_retries: self.max_retries.unwrap_or(retry.max_retries),
                ..retry
            },
            ..TransportConfig::default()
        };

        let options = ReconcileOptions::default();
        config.reconcile = ReconcileOptions {
            strict: self.strict,
            prune_extraneous: self.prune,
            parallelism: self.parallelism.unwrap_or(options.parallelism),
            stop_on_first_error: self.stop_on_error,
            dry_run: self.mode != Mode::Apply,
            deadline_secs: self.deadline_secs,
            backup_path: self.backup_file.clone(),
        };
        config
    }
}

fn parse_bool(name: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{} must be a boolean (true/false). Got: {}", name, v),
        },
    }
}

fn parse_num<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", name, v))
        })
        .transpose()
}

/// Basic RFC 1035 checks on the zone name
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.len() > 253 {
        anyhow::bail!("Domain name too long: {} chars (max 253). Got: {}", domain.len(), domain);
    }
    if !domain.contains('.') {
        anyhow::bail!("Domain name must have at least two labels. Got: {}", domain);
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("Domain name has empty label: '{}'", domain);
        }
        if label.len() > 63 {
            anyhow::bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            anyhow::bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric and hyphen only.",
                label
            );
        }
        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!("Domain label cannot start or end with hyphen. Label: '{}'", label);
        }
    }

    Ok(())
}

/// Load the desired state document
fn load_records(path: &Path) -> Result<RecordSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<Record> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of records", path.display()))?;
    Ok(RecordSet::from_records(records))
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ZonesyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZonesyncExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZonesyncExitCode::RuntimeError.into();
        }
    };

    if config.mode == Mode::Export {
        return rt.block_on(export(config)).into();
    }

    let Some(records_file) = config.records_file.clone() else {
        error!("ZONESYNC_RECORDS_FILE is required");
        return ZonesyncExitCode::ConfigError.into();
    };

    let desired = match load_records(&records_file) {
        Ok(desired) => desired,
        Err(e) => {
            error!("{:#}", e);
            return ZonesyncExitCode::ConfigError.into();
        }
    };
    info!(
        "Loaded {} record set(s) for {} from {}",
        desired.len(),
        config.domain,
        records_file.display()
    );

    if config.mode == Mode::Validate {
        return validate_only(&desired);
    }

    rt.block_on(run(config, desired)).into()
}

/// Offline check of the desired state
fn validate_only(desired: &RecordSet) -> ExitCode {
    for record in desired.records() {
        for warning in validator::warnings(record) {
            println!("warning: {}: {}", record.key(), warning.message);
        }
    }
    match validator::validate_set(desired) {
        Ok(()) => {
            println!("{} record set(s) valid", desired.len());
            ZonesyncExitCode::Success.into()
        }
        Err(invalid) => {
            for entry in &invalid {
                println!("invalid: {}: {}", entry.key, entry.error);
            }
            println!("{} of {} record set(s) invalid", invalid.len(), desired.len());
            ZonesyncExitCode::ConfigError.into()
        }
    }
}

async fn run(config: Config, desired: RecordSet) -> ZonesyncExitCode {
    let sync = config.sync_config();

    // Ctrl-C stops scheduling and stops transports from retrying
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, letting in-flight operations finish");
            on_signal.cancel();
        }
    });

    let reconciler = match connect(&sync, cancel.clone()).await {
        Ok(reconciler) => reconciler,
        Err(code) => return code,
    };

    match reconciler
        .reconcile_with_cancel(&sync.domain, &desired, &sync.reconcile, cancel)
        .await
    {
        Ok(result) => report(&result),
        Err(Error::InvalidDesiredState { failures }) => {
            for entry in &failures {
                println!("invalid: {}: {}", entry.key, entry.error);
            }
            error!("Desired state rejected: {} invalid record set(s)", failures.len());
            ZonesyncExitCode::ConfigError
        }
        Err(e @ Error::Config(_)) => {
            error!("{}", e);
            ZonesyncExitCode::ConfigError
        }
        Err(e) => {
            error!("Reconciliation of {} failed: {}", sync.domain, e);
            ZonesyncExitCode::RuntimeError
        }
    }
}

/// Write the live zone to the backup file, or stdout
async fn export(config: Config) -> ZonesyncExitCode {
    let sync = config.sync_config();
    let reconciler = match connect(&sync, CancellationToken::new()).await {
        Ok(reconciler) => reconciler,
        Err(code) => return code,
    };

    let snapshot = match reconciler.export(&sync.domain).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Export of {} failed: {}", sync.domain, e);
            return ZonesyncExitCode::RuntimeError;
        }
    };

    match &config.backup_file {
        Some(path) => match snapshot.write(path).await {
            Ok(()) => {
                info!(
                    "Exported {} record(s) of {} to {}",
                    snapshot.records.len(),
                    sync.domain,
                    path.display()
                );
                ZonesyncExitCode::Success
            }
            Err(e) => {
                error!("{}", e);
                ZonesyncExitCode::RuntimeError
            }
        },
        None => match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                println!("{}", json);
                ZonesyncExitCode::Success
            }
            Err(e) => {
                error!("Failed to serialize snapshot: {}", e);
                ZonesyncExitCode::RuntimeError
            }
        },
    }
}

/// Check credentials and build the reconciler
async fn connect(
    sync: &SyncConfig,
    shutdown: CancellationToken,
) -> std::result::Result<Reconciler, ZonesyncExitCode> {
    let credentials = Arc::new(EnvCredentialStore::new());
    if let Err(e) = credentials.get_credentials(sync.provider.profile()).await {
        error!("{}", e);
        return Err(ZonesyncExitCode::ConfigError);
    }

    build_reconciler(sync, credentials, shutdown).map_err(|e| {
        error!("Failed to set up provider: {:#}", e);
        ZonesyncExitCode::ConfigError
    })
}

fn build_reconciler(
    sync: &SyncConfig,
    credentials: Arc<dyn CredentialProvider>,
    shutdown: CancellationToken,
) -> Result<Reconciler> {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "godaddy")]
    {
        debug!("Registering GoDaddy provider");
        zonesync_provider_godaddy::register(&registry);
    }

    let context = ProviderContext::new(
        credentials,
        Arc::new(RateLimiters::new(sync.rate_limit.clone())?),
        sync.transport.clone(),
    )
    .with_shutdown(shutdown);
    let provider = registry.create_provider(&sync.provider, &context)?;

    let (reconciler, mut events) = Reconciler::new(provider, DEFAULT_EVENT_CAPACITY);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => debug!("event: {}", json),
                Err(e) => debug!("event {:?} (unserializable: {})", event, e),
            }
        }
    });
    Ok(reconciler)
}

fn report(result: &BulkResult) -> ZonesyncExitCode {
    print!("{}", result);
    if result.is_success() {
        ZonesyncExitCode::Success
    } else {
        ZonesyncExitCode::PartialFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_to_a_dry_run_plan() {
        let config = Config::from_lookup(lookup(&[
            ("ZONESYNC_DOMAIN", "Example.com"),
            ("ZONESYNC_RECORDS_FILE", "records.json"),
        ]))
        .unwrap();

        assert_eq!(config.domain, "example.com");
        assert_eq!(config.mode, Mode::Plan);
        assert_eq!(config.profile, "default");
        assert_eq!(config.environment, Environment::Production);

        let sync = config.sync_config();
        assert!(sync.reconcile.dry_run);
        assert_eq!(sync.reconcile.parallelism, 5);
        assert_eq!(sync.rate_limit.capacity, 60);
    }

    #[test]
    fn apply_mode_with_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("ZONESYNC_DOMAIN", "example.com"),
            ("ZONESYNC_RECORDS_FILE", "records.json"),
            ("ZONESYNC_MODE", "apply"),
            ("ZONESYNC_ENVIRONMENT", "ote"),
            ("ZONESYNC_PRUNE", "true"),
            ("ZONESYNC_STOP_ON_ERROR", "1"),
            ("ZONESYNC_PARALLELISM", "2"),
            ("ZONESYNC_MAX_RETRIES", "3"),
            ("ZONESYNC_RATE_CAPACITY", "10"),
            ("ZONESYNC_DEADLINE_SECS", "120"),
        ]))
        .unwrap();

        let sync = config.sync_config();
        assert!(!sync.reconcile.dry_run);
        assert!(sync.reconcile.prune_extraneous);
        assert!(sync.reconcile.stop_on_first_error);
        assert_eq!(sync.reconcile.parallelism, 2);
        assert_eq!(sync.reconcile.deadline_secs, Some(120));
        assert_eq!(sync.transport.retry.max_retries, 3);
        assert_eq!(sync.rate_limit.capacity, 10);
        assert_eq!(sync.rate_limit.refill_per_sec, 1);
        assert!(matches!(
            sync.provider,
            ProviderConfig::GoDaddy {
                environment: Environment::Ote,
                ..
            }
        ));
    }

    #[test]
    fn export_needs_no_records_file() {
        let config = Config::from_lookup(lookup(&[
            ("ZONESYNC_DOMAIN", "example.com"),
            ("ZONESYNC_MODE", "export"),
            ("ZONESYNC_BACKUP_FILE", "/var/backups/example.com.json"),
        ]))
        .unwrap();

        assert_eq!(config.mode, Mode::Export);
        assert!(config.records_file.is_none());
        assert!(config.validate().is_ok());

        let err = Config::from_lookup(lookup(&[("ZONESYNC_DOMAIN", "example.com")])).unwrap_err();
        assert!(err.to_string().contains("ZONESYNC_RECORDS_FILE"));
    }

    #[test]
    fn backup_file_reaches_reconcile_options() {
        let config = Config::from_lookup(lookup(&[
            ("ZONESYNC_DOMAIN", "example.com"),
            ("ZONESYNC_RECORDS_FILE", "records.json"),
            ("ZONESYNC_MODE", "apply"),
            ("ZONESYNC_PRUNE", "true"),
            ("ZONESYNC_BACKUP_FILE", "backup.json"),
        ]))
        .unwrap();

        assert_eq!(
            config.sync_config().reconcile.backup_path,
            Some(PathBuf::from("backup.json"))
        );
    }

    #[test]
    fn missing_domain_is_an_error() {
        let err = Config::from_lookup(lookup(&[("ZONESYNC_RECORDS_FILE", "r.json")])).unwrap_err();
        assert!(err.to_string().contains("ZONESYNC_DOMAIN"));
    }

    #[test]
    fn bad_values_are_rejected() {
        let base = [
            ("ZONESYNC_DOMAIN", "example.com"),
            ("ZONESYNC_RECORDS_FILE", "records.json"),
        ];
        for (name, value) in [
            ("ZONESYNC_MODE", "destroy"),
            ("ZONESYNC_PRUNE", "maybe"),
            ("ZONESYNC_PARALLELISM", "-1"),
            ("ZONESYNC_ENVIRONMENT", "staging"),
        ] {
            let mut vars = base.to_vec();
            vars.push((name, value));
            assert!(
                Config::from_lookup(lookup(&vars)).is_err(),
                "{}={} accepted",
                name,
                value
            );
        }
    }

    #[test]
    fn domain_names() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("sub-domain.example.co.uk").is_ok());
        assert!(validate_domain_name("localhost").is_err());
        assert!(validate_domain_name("-bad.com").is_err());
        assert!(validate_domain_name("bad..com").is_err());
        assert!(validate_domain_name("under_score.com").is_err());
    }
}
