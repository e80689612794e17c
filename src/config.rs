//! Service configuration (command line flags, each backed by an environment variable)

use crate::provision::{ProvisionMode, DEFAULT_CHROMIUM_CANDIDATES};
use crate::render::RenderSettings;
use crate::scaffold::DEFAULT_MERMAID_URL;
use crate::{Error, Result};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "diagramshot", version, about = "Render Mermaid diagrams to PNG over HTTP")]
pub struct ServiceConfig {
    /// Address the HTTP server listens on
    #[arg(long, env = "DIAGRAMSHOT_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Use the minimal Chromium bundle and sandbox-free flags
    #[arg(long, env = "DIAGRAMSHOT_SERVERLESS", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    pub serverless: bool,

    /// Chrome binary for local mode (auto-detected when omitted)
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Chromium binary locations tried in serverless mode, in order
    #[arg(long = "chromium-path", env = "DIAGRAMSHOT_CHROMIUM_PATH", value_delimiter = ',')]
    pub chromium_paths: Vec<PathBuf>,

    /// Script URL of the Mermaid bundle injected into each page
    #[arg(long, env = "DIAGRAMSHOT_MERMAID_URL", default_value = DEFAULT_MERMAID_URL)]
    pub mermaid_url: String,

    /// Default timeout for navigation, lookups and evaluation inside the page
    #[arg(long, env = "DIAGRAMSHOT_PAGE_TIMEOUT_MS", default_value_t = 30_000)]
    pub page_timeout_ms: u64,

    /// Ceiling for a whole render, browser launch included
    #[arg(long, env = "DIAGRAMSHOT_REQUEST_TIMEOUT_MS", default_value_t = 60_000)]
    pub request_timeout_ms: u64,
}

impl ServiceConfig {
    pub fn provision_mode(&self) -> ProvisionMode {
        if self.serverless {
            ProvisionMode::Serverless
        } else {
            ProvisionMode::Local
        }
    }

    /// Serverless binary candidates, falling back to the well-known locations.
    pub fn chromium_candidates(&self) -> Vec<PathBuf> {
        if self.chromium_paths.is_empty() {
            DEFAULT_CHROMIUM_CANDIDATES.iter().map(PathBuf::from).collect()
        } else {
            self.chromium_paths.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_timeout_ms == 0 {
            return Err(Error::ConfigError("page timeout must be greater than zero".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::ConfigError("request timeout must be greater than zero".into()));
        }
        let parsed = url::Url::parse(&self.mermaid_url)
            .map_err(|e| Error::ConfigError(format!("mermaid url {:?}: {}", self.mermaid_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::ConfigError(format!(
                "mermaid url must be http(s), got {:?}",
                parsed.scheme()
            )));
        }
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            mermaid_url: self.mermaid_url.clone(),
            page_timeout: Duration::from_millis(self.page_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            ..RenderSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = ServiceConfig::parse_from(["diagramshot"]);
        assert_eq!(cfg.bind, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.mermaid_url, DEFAULT_MERMAID_URL);
        assert_eq!(cfg.page_timeout_ms, 30_000);
        assert_eq!(cfg.request_timeout_ms, 60_000);
        assert_eq!(cfg.chromium_candidates().len(), DEFAULT_CHROMIUM_CANDIDATES.len());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn serverless_flag_and_paths() {
        let cfg = ServiceConfig::parse_from([
            "diagramshot",
            "--serverless",
            "--chromium-path",
            "/var/task/chromium,/tmp/chromium",
        ]);
        assert_eq!(cfg.provision_mode(), ProvisionMode::Serverless);
        assert_eq!(
            cfg.chromium_candidates(),
            vec![PathBuf::from("/var/task/chromium"), PathBuf::from("/tmp/chromium")]
        );
    }

    #[test]
    fn rejects_zero_timeouts() {
        let cfg = ServiceConfig::parse_from(["diagramshot", "--page-timeout-ms", "0"]);
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn rejects_non_http_mermaid_url() {
        let cfg = ServiceConfig::parse_from(["diagramshot", "--mermaid-url", "file:///tmp/mermaid.js"]);
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn settings_follow_config() {
        let cfg = ServiceConfig::parse_from([
            "diagramshot",
            "--mermaid-url",
            "http://127.0.0.1:9000/mermaid.min.js",
            "--request-timeout-ms",
            "5000",
        ]);
        let settings = cfg.render_settings();
        assert_eq!(settings.mermaid_url, "http://127.0.0.1:9000/mermaid.min.js");
        assert_eq!(settings.request_timeout, Duration::from_millis(5000));
        assert_eq!(settings.page_timeout, Duration::from_millis(30_000));
    }
}
