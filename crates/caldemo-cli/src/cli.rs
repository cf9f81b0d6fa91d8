//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use caldemo_core::TracingOutputFormat;

/// caldemo - authorize against Google Calendar and exercise one event
#[derive(Debug, Default, Parser)]
#[command(name = "caldemo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file
    #[arg(long, env = "CALDEMO_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// OAuth client-secret JSON file
    #[arg(long, value_name = "PATH")]
    pub credentials: Option<PathBuf>,

    /// Where the OAuth token is cached
    #[arg(long, value_name = "PATH")]
    pub token_cache: Option<PathBuf>,

    /// Calendar to operate on
    #[arg(long)]
    pub calendar_id: Option<String>,

    /// Paste the authorization code instead of running a local listener
    #[arg(long)]
    pub manual: bool,

    /// Override the port of the redirect URI
    #[arg(long)]
    pub port: Option<u16>,

    /// Also open the authorization URL in the default browser
    #[arg(long)]
    pub open_browser: bool,
}

/// Log formats selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

impl From<LogFormat> for TracingOutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => TracingOutputFormat::Pretty,
            LogFormat::Compact => TracingOutputFormat::Compact,
            LogFormat::Json => TracingOutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::parse_from([
            "caldemo",
            "--credentials",
            "/tmp/credentials.json",
            "--manual",
            "--port",
            "9090",
            "--calendar-id",
            "team@example.com",
        ]);
        assert_eq!(cli.credentials, Some(PathBuf::from("/tmp/credentials.json")));
        assert!(cli.manual);
        assert_eq!(cli.port, Some(9090));
        assert_eq!(cli.calendar_id.as_deref(), Some("team@example.com"));
        assert!(!cli.debug);
        assert_eq!(cli.log_format, LogFormat::Compact);
    }

    #[test]
    fn parses_log_format() {
        let cli = Cli::parse_from(["caldemo", "-v", "--log-format", "json"]);
        assert!(cli.debug);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(
            TracingOutputFormat::from(cli.log_format),
            TracingOutputFormat::Json
        );
        assert!(Cli::try_parse_from(["caldemo", "--log-format", "xml"]).is_err());
    }
}
