use std::path::PathBuf;

use assistant_core::Config;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "assistant")]
#[command(version, about = "Chat with the AI assistant from your terminal")]
pub struct Cli {
    /// Backend base URL
    #[arg(short, long, env = "ASSISTANT_SERVER_URL")]
    pub server: Option<String>,

    /// Request timeout in seconds (0 disables the timeout)
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Directory for log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Write the effective server URL and timeout to the config file
    #[arg(long)]
    pub save_config: bool,
}

impl Cli {
    /// Layer command line values (and the environment) over the config file.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(server) = self.server.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            config.server_url = Some(server.to_string());
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = Some(timeout);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let cli = Cli::parse_from(["assistant", "--server", "http://example.test:8080", "-t", "5"]);
        let file = Config {
            server_url: Some("http://localhost:5000".to_string()),
            request_timeout_secs: Some(60),
            greeting: Some("Hi.".to_string()),
        };

        let config = cli.apply(file);

        assert_eq!(config.server_url(), "http://example.test:8080");
        assert_eq!(config.request_timeout_secs, Some(5));
        assert_eq!(config.greeting(), "Hi.");
    }

    #[test]
    fn test_missing_flags_keep_config_values() {
        let cli = Cli {
            server: None,
            timeout: None,
            log_dir: None,
            save_config: false,
        };
        let file = Config {
            server_url: Some("http://10.1.1.1:5000".to_string()),
            ..Config::default()
        };

        assert_eq!(cli.apply(file.clone()), file);
    }
}
