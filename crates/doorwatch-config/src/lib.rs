//! Configuration for doorwatch.
//!
//! TOML file plus `DOORWATCH_*` environment overrides, validated and
//! translated into `doorwatch_core::PipelineConfig` and classifier
//! transport settings. The binary adds CLI-flag handling on top.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use doorwatch_api::{TlsMode, TransportConfig};
use doorwatch_core::config::{DEFAULT_LABELS, DEFAULT_TIMEZONE};
use doorwatch_core::{FrameRoute, GateScope, PipelineConfig, SiteId};

/// Prefix for environment overrides; nested keys are joined with `__`,
/// e.g. `DOORWATCH_PIPELINE__GATE_SCOPE=per-site`.
pub const ENV_PREFIX: &str = "DOORWATCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default)]
    pub classifier: ClassifierSection,

    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateScopeSetting {
    #[default]
    Global,
    PerSite,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteEntry {
    /// Camera file-name prefix.
    pub prefix: String,
    /// Account (site) id the prefix belongs to.
    pub site: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSection {
    #[serde(default)]
    pub gate_scope: GateScopeSetting,

    /// IANA zone name used in alert timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Candidate labels, in classifier order.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Labels whose best match sends no photo alert.
    #[serde(default)]
    pub suppress_labels: Vec<String>,

    #[serde(default = "default_partitions")]
    pub dedup_partitions: usize,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Overall bound on one classification, in seconds. 0 = no bound.
    #[serde(default)]
    pub classifier_timeout_secs: u64,

    /// Site for frames no route matches (per-site scope).
    pub default_site: Option<u64>,

    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            gate_scope: GateScopeSetting::default(),
            timezone: default_timezone(),
            labels: default_labels(),
            suppress_labels: Vec::new(),
            dedup_partitions: default_partitions(),
            queue_capacity: default_queue_capacity(),
            classifier_timeout_secs: 0,
            default_site: None,
            routes: Vec::new(),
        }
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.name().into()
}
fn default_labels() -> Vec<String> {
    DEFAULT_LABELS.iter().map(|l| (*l).to_owned()).collect()
}
fn default_partitions() -> usize {
    4
}
fn default_queue_capacity() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierSection {
    /// Full prediction URL.
    pub endpoint: Option<String>,

    /// HTTP request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Bearer token (plaintext; prefer `api_key_env`).
    pub api_key: Option<String>,

    /// Environment variable holding the bearer token.
    pub api_key_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept any TLS certificate.
    #[serde(default)]
    pub insecure: bool,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout(),
            api_key: None,
            api_key_env: None,
            ca_cert: None,
            insecure: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsSection {
    /// Directory polled for raw lock poll bodies (`*.json`).
    pub poll_inbox: PathBuf,
    /// Directory polled for camera frames (`*.jpg`, `*.jpeg`, `*.png`).
    pub camera_inbox: PathBuf,
    /// Directory alerts are written to.
    pub outbox: PathBuf,
    /// Directory holding the gate and dedup changelogs.
    pub state_dir: PathBuf,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_ms: u64,
}

impl Default for PathsSection {
    fn default() -> Self {
        let base = data_dir();
        Self {
            poll_inbox: base.join("inbox").join("polls"),
            camera_inbox: base.join("inbox").join("frames"),
            outbox: base.join("outbox"),
            state_dir: base.join("state"),
            scan_interval_ms: default_scan_interval(),
        }
    }
}

impl PathsSection {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

fn default_scan_interval() -> u64 {
    1000
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "doorwatch").map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn data_dir() -> PathBuf {
    ProjectDirs::from("", "", "doorwatch").map_or_else(
        || dirs_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("doorwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from `path` (or the default path) plus environment.
/// A missing file is not an error; defaults apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Render a config as pretty TOML.
pub fn render_config(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

// ── Translation ─────────────────────────────────────────────────────

/// Classifier endpoint plus the transport to reach it.
#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub endpoint: Url,
    pub transport: TransportConfig,
}

impl Config {
    /// Validate the `[pipeline]` section and build the runtime config.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let p = &self.pipeline;

        let timezone: Tz = p
            .timezone
            .parse()
            .map_err(|e| invalid("pipeline.timezone", format!("unknown time zone '{}': {e}", p.timezone)))?;

        if p.labels.is_empty() {
            return Err(invalid("pipeline.labels", "at least one label is required"));
        }
        let mut seen = HashSet::new();
        for label in &p.labels {
            if label.trim().is_empty() {
                return Err(invalid("pipeline.labels", "labels must not be blank"));
            }
            if !seen.insert(label.as_str()) {
                return Err(invalid("pipeline.labels", format!("duplicate label '{label}'")));
            }
        }
        if let Some(unknown) = p.suppress_labels.iter().find(|l| !seen.contains(l.as_str())) {
            return Err(invalid(
                "pipeline.suppress_labels",
                format!("'{unknown}' is not one of the configured labels"),
            ));
        }

        if p.dedup_partitions == 0 {
            return Err(invalid("pipeline.dedup_partitions", "must be at least 1"));
        }
        if p.queue_capacity == 0 {
            return Err(invalid("pipeline.queue_capacity", "must be at least 1"));
        }

        let gate_scope = match p.gate_scope {
            GateScopeSetting::Global => GateScope::Global,
            GateScopeSetting::PerSite => GateScope::PerSite,
        };
        if gate_scope == GateScope::PerSite && p.routes.is_empty() && p.default_site.is_none() {
            return Err(invalid(
                "pipeline.routes",
                "per-site scope needs at least one route or a default_site",
            ));
        }
        let routes = p
            .routes
            .iter()
            .map(|r| {
                if r.prefix.is_empty() {
                    return Err(invalid("pipeline.routes", "route prefix must not be empty"));
                }
                Ok(FrameRoute {
                    prefix: r.prefix.clone(),
                    site: SiteId(r.site),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PipelineConfig {
            gate_scope,
            timezone,
            labels: p.labels.clone(),
            suppress_labels: p.suppress_labels.clone(),
            routes,
            default_site: p.default_site.map(SiteId),
            dedup_partitions: p.dedup_partitions,
            queue_capacity: p.queue_capacity,
            classifier_timeout: (p.classifier_timeout_secs > 0)
                .then(|| Duration::from_secs(p.classifier_timeout_secs)),
        })
    }

    /// Validate the `[classifier]` section and resolve its credential.
    pub fn classifier_settings(&self) -> Result<ClassifierSettings, ConfigError> {
        let c = &self.classifier;

        let raw = c
            .endpoint
            .as_deref()
            .ok_or_else(|| invalid("classifier.endpoint", "not set"))?;
        let endpoint: Url = raw
            .parse()
            .map_err(|e| invalid("classifier.endpoint", format!("invalid URL '{raw}': {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(invalid(
                "classifier.endpoint",
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }

        if c.timeout_secs == 0 {
            return Err(invalid("classifier.timeout_secs", "must be at least 1"));
        }

        let tls = if c.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = c.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        Ok(ClassifierSettings {
            endpoint,
            transport: TransportConfig {
                tls,
                timeout: Duration::from_secs(c.timeout_secs),
                bearer_token: resolve_api_key(c)?,
            },
        })
    }
}

/// Resolve the classifier bearer token: `api_key_env` first, then the
/// plaintext `api_key`. No token is fine; the endpoint may be open.
pub fn resolve_api_key(section: &ClassifierSection) -> Result<Option<SecretString>, ConfigError> {
    if let Some(ref env_name) = section.api_key_env {
        return match std::env::var(env_name) {
            Ok(val) if !val.is_empty() => Ok(Some(SecretString::from(val))),
            _ => Err(invalid(
                "classifier.api_key_env",
                format!("environment variable '{env_name}' is not set"),
            )),
        };
    }
    Ok(section.api_key.clone().map(SecretString::from))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn load(toml: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();
        load_config(Some(&path)).unwrap()
    }

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_translate() {
        let cfg = load("");
        let pipeline = cfg.to_pipeline_config().unwrap();
        assert_eq!(pipeline.gate_scope, GateScope::Global);
        assert_eq!(pipeline.timezone, DEFAULT_TIMEZONE);
        assert_eq!(pipeline.labels, vec!["burglar-alert", "no-burglar-alert"]);
        assert_eq!(pipeline.dedup_partitions, 4);
        assert_eq!(pipeline.classifier_timeout, None);
        assert_eq!(cfg.paths.scan_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn per_site_routes_translate() {
        let cfg = load(
            r#"
            [pipeline]
            gate_scope = "per-site"
            timezone = "Europe/London"
            default_site = 345
            classifier_timeout_secs = 20

            [[pipeline.routes]]
            prefix = "garage-"
            site = 2
            "#,
        );
        let pipeline = cfg.to_pipeline_config().unwrap();
        assert_eq!(pipeline.gate_scope, GateScope::PerSite);
        assert_eq!(pipeline.timezone, chrono_tz::Europe::London);
        assert_eq!(pipeline.default_site, Some(SiteId(345)));
        assert_eq!(
            pipeline.routes,
            vec![FrameRoute {
                prefix: "garage-".into(),
                site: SiteId(2),
            }]
        );
        assert_eq!(pipeline.classifier_timeout, Some(Duration::from_secs(20)));
    }

    #[test]
    fn invalid_pipeline_settings_are_rejected() {
        let cases = [
            ("[pipeline]\ntimezone = \"Mars/Olympus\"", "pipeline.timezone"),
            ("[pipeline]\nlabels = []", "pipeline.labels"),
            ("[pipeline]\nlabels = [\"a\", \"a\"]", "pipeline.labels"),
            ("[pipeline]\nsuppress_labels = [\"cat\"]", "pipeline.suppress_labels"),
            ("[pipeline]\ndedup_partitions = 0", "pipeline.dedup_partitions"),
            ("[pipeline]\ngate_scope = \"per-site\"", "pipeline.routes"),
        ];
        for (toml, field) in cases {
            let err = load(toml).to_pipeline_config().unwrap_err();
            assert_eq!(field_of(err), field, "for {toml:?}");
        }
    }

    #[test]
    fn classifier_settings_resolve() {
        let cfg = load(
            r#"
            [classifier]
            endpoint = "https://inference.local/v1/classify"
            timeout_secs = 5
            api_key = "plain-token"
            insecure = true
            "#,
        );
        let settings = cfg.classifier_settings().unwrap();
        assert_eq!(settings.endpoint.as_str(), "https://inference.local/v1/classify");
        assert_eq!(settings.transport.timeout, Duration::from_secs(5));
        assert!(matches!(settings.transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(
            settings.transport.bearer_token.unwrap().expose_secret(),
            "plain-token"
        );
    }

    #[test]
    fn classifier_endpoint_is_required_and_checked() {
        assert_eq!(
            field_of(load("").classifier_settings().unwrap_err()),
            "classifier.endpoint"
        );
        assert_eq!(
            field_of(
                load("[classifier]\nendpoint = \"ftp://host/x\"")
                    .classifier_settings()
                    .unwrap_err()
            ),
            "classifier.endpoint"
        );
    }

    #[test]
    fn missing_api_key_env_is_an_error() {
        let cfg = load(
            r#"
            [classifier]
            endpoint = "http://localhost:8080/classify"
            api_key_env = "DOORWATCH_TEST_SURELY_UNSET_TOKEN"
            "#,
        );
        assert_eq!(
            field_of(cfg.classifier_settings().unwrap_err()),
            "classifier.api_key_env"
        );
    }

    #[test]
    fn rendered_config_loads_back() {
        let cfg = load("[pipeline]\nsuppress_labels = [\"no-burglar-alert\"]");
        let rendered = render_config(&cfg).unwrap();
        assert!(rendered.contains("suppress_labels"));

        let reloaded = load(&rendered);
        assert_eq!(reloaded.pipeline.suppress_labels, vec!["no-burglar-alert"]);
    }
}
