//! CLI argument definitions using clap derive macros.

use std::time::Duration;

use clap::Parser;

use batchfetch_core::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT,
    DEFAULT_TRANSFER_TIMEOUT, RequestConfig,
};

/// Fetch a batch of URLs with deadlines and retries.
///
/// Batchfetch runs one request per URL under a concurrency cap. Each request
/// gets a connect timeout, an absolute transfer deadline and a fixed number
/// of attempts.
#[derive(Parser, Debug)]
#[command(name = "batchfetch")]
#[command(author, version, about)]
pub struct Args {
    /// URLs to fetch (read from stdin, one per line, when omitted)
    pub urls: Vec<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Maximum concurrent requests (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// HTTP method for every request
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Extra request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Form field sent url-encoded, key=value (repeatable)
    #[arg(short = 'd', long = "data", value_parser = parse_form_field, conflicts_with = "json")]
    pub form: Vec<(String, String)>,

    /// JSON document sent as the request body
    #[arg(long, value_parser = parse_json)]
    pub json: Option<serde_json::Value>,

    /// Attempts per request, including the first (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_RETRY_LIMIT as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub retries: u8,

    /// Pause between failed attempts in milliseconds (max 60000)
    #[arg(long, default_value_t = duration_millis(DEFAULT_RETRY_DELAY), value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub retry_delay_ms: u64,

    /// Seconds allowed to establish each connection (1-300)
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..=300))]
    pub connect_timeout_secs: u64,

    /// Seconds allowed for each exchange once connected (1-3600)
    #[arg(long, default_value_t = DEFAULT_TRANSFER_TIMEOUT.as_secs(), value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub transfer_timeout_secs: u64,
}

impl Args {
    /// Timing and retry settings shared by every request in the run.
    #[must_use]
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            transfer_timeout: Duration::from_secs(self.transfer_timeout_secs),
            retry_limit: u32::from(self.retries),
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name is empty in {raw:?}"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn parse_form_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    if key.is_empty() {
        return Err(format!("form key is empty in {raw:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_json(raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON document: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["batchfetch"]).unwrap();
        assert!(args.urls.is_empty());
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        assert_eq!(args.concurrency, 10); // DEFAULT_CONCURRENCY
        assert_eq!(args.method, "GET");
        assert_eq!(args.retries, 3); // DEFAULT_RETRY_LIMIT
        assert_eq!(args.retry_delay_ms, 3000);
        assert_eq!(args.connect_timeout_secs, 10);
        assert_eq!(args.transfer_timeout_secs, 15);
    }

    #[test]
    fn test_cli_default_request_config_matches_library_defaults() {
        let args = Args::try_parse_from(["batchfetch"]).unwrap();
        assert_eq!(args.request_config(), RequestConfig::default());
    }

    #[test]
    fn test_cli_positional_urls_collected() {
        let args =
            Args::try_parse_from(["batchfetch", "http://a.test/", "http://b.test/x"]).unwrap();
        assert_eq!(args.urls, vec!["http://a.test/", "http://b.test/x"]);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["batchfetch", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["batchfetch", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_flag_sets_quiet() {
        let args = Args::try_parse_from(["batchfetch", "--quiet"]).unwrap();
        assert!(args.quiet);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["batchfetch", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["batchfetch", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        assert_eq!(
            Args::try_parse_from(["batchfetch", "-c", "1"]).unwrap().concurrency,
            1
        );
        assert_eq!(
            Args::try_parse_from(["batchfetch", "--concurrency", "100"])
                .unwrap()
                .concurrency,
            100
        );
        for rejected in ["0", "101"] {
            let err = Args::try_parse_from(["batchfetch", "-c", rejected]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_retries_zero_rejected() {
        let err = Args::try_parse_from(["batchfetch", "-r", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_retries_over_max_rejected() {
        let err = Args::try_parse_from(["batchfetch", "--retries", "11"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_zero_timeouts_rejected() {
        let err =
            Args::try_parse_from(["batchfetch", "--connect-timeout-secs", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err =
            Args::try_parse_from(["batchfetch", "--transfer-timeout-secs", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_request_config_from_flags() {
        let args = Args::try_parse_from([
            "batchfetch",
            "-r",
            "5",
            "--retry-delay-ms",
            "250",
            "--connect-timeout-secs",
            "2",
            "--transfer-timeout-secs",
            "30",
        ])
        .unwrap();
        let config = args.request_config();
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.transfer_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_cli_headers_are_repeatable_and_trimmed() {
        let args = Args::try_parse_from([
            "batchfetch",
            "-H",
            "Accept: application/json",
            "--header",
            "X-Trace-Id:abc",
        ])
        .unwrap();
        assert_eq!(
            args.headers,
            vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("X-Trace-Id".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_cli_header_without_colon_rejected() {
        let err = Args::try_parse_from(["batchfetch", "-H", "Accept"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_form_fields_keep_order_and_empty_values() {
        let args =
            Args::try_parse_from(["batchfetch", "-X", "POST", "-d", "q=rust", "-d", "page="])
                .unwrap();
        assert_eq!(args.method, "POST");
        assert_eq!(
            args.form,
            vec![
                ("q".to_string(), "rust".to_string()),
                ("page".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_cli_form_field_without_equals_rejected() {
        let err = Args::try_parse_from(["batchfetch", "-d", "rust"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_json_document_parsed() {
        let args = Args::try_parse_from(["batchfetch", "--json", r#"{"ids":[1,2]}"#]).unwrap();
        assert_eq!(args.json.unwrap()["ids"][1], 2);
    }

    #[test]
    fn test_cli_invalid_json_document_rejected() {
        let err = Args::try_parse_from(["batchfetch", "--json", "{ids"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_form_and_json_conflict() {
        let err = Args::try_parse_from(["batchfetch", "-d", "a=1", "--json", "{}"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
