//! Command-line argument parsing for rebg-watch
//!
//! Uses clap for argument parsing with derive macros.

use std::path::PathBuf;

use clap::Parser;
use rebg_client::{ClientConfig, ConfigLoader};
use rebg_protocol::Field;
use rebg_utils::Result;

/// rebg-watch - print live trace state as JSON lines
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Trace backend endpoint (ws:// or wss://)
    ///
    /// Overrides the endpoint from the config file.
    #[arg(long, short = 'e', env = "REBG_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long, short = 'c', env = "REBG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Field to watch; repeat for several. Defaults to all of them.
    #[arg(long = "field", short = 'f', value_parser = parse_field)]
    pub fields: Vec<Field>,

    /// Request the register snapshot for this step index on connect
    #[arg(long)]
    pub registers: Option<u64>,

    /// Print registers, steps and memory operations in decoded form
    #[arg(long, default_value_t = false)]
    pub decode: bool,

    /// Forward each stdin line to the backend as a raw command
    #[arg(long, default_value_t = false)]
    pub stdin: bool,

    /// Log filter, e.g. "debug" or "rebg_client=trace"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Also append logs to rebg.log in the log directory
    #[arg(long, default_value_t = false)]
    pub log_file: bool,
}

fn parse_field(s: &str) -> std::result::Result<Field, String> {
    Field::from_wire_key(s).ok_or_else(|| {
        let known: Vec<_> = Field::ALL.iter().map(|f| f.wire_key()).collect();
        format!("unknown field '{}', expected one of: {}", s, known.join(", "))
    })
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Fields to subscribe to
    pub fn selected_fields(&self) -> Vec<Field> {
        if self.fields.is_empty() {
            Field::ALL.to_vec()
        } else {
            let mut fields = self.fields.clone();
            fields.sort();
            fields.dedup();
            fields
        }
    }

    /// Load the config file and apply command-line overrides
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ConfigLoader::load_from_path(path)?,
            None => ConfigLoader::load()?,
        };

        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }

        ConfigLoader::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebg_utils::RebgError;
    use tempfile::tempdir;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["rebg-watch"]);
        assert!(args.fields.is_empty());
        assert!(args.registers.is_none());
        assert!(!args.stdin);
        assert!(!args.decode);
        assert!(args.log_level.is_none());
        assert!(!args.log_file);
        assert_eq!(args.selected_fields(), Field::ALL.to_vec());
    }

    #[test]
    fn test_field_selection() {
        let args = Args::parse_from([
            "rebg-watch",
            "-f",
            "registers",
            "--field",
            "mem_ops",
            "-f",
            "registers",
        ]);
        assert_eq!(args.selected_fields(), vec![Field::Registers, Field::MemOps]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Args::try_parse_from(["rebg-watch", "--field", "heap"]).unwrap_err();
        assert!(err.to_string().contains("unknown field 'heap'"));
    }

    #[test]
    fn test_registers_and_stdin() {
        let args = Args::parse_from(["rebg-watch", "--registers", "42", "--stdin", "--decode"]);
        assert_eq!(args.registers, Some(42));
        assert!(args.stdin);
        assert!(args.decode);
    }

    #[test]
    fn test_endpoint_overrides_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "endpoint = \"ws://10.0.0.2:9001\"\n").unwrap();

        let path_arg = path.to_str().unwrap();
        let args = Args::parse_from(["rebg-watch", "-c", path_arg]);
        assert_eq!(args.client_config().unwrap().endpoint, "ws://10.0.0.2:9001");

        let args =
            Args::parse_from(["rebg-watch", "-c", path_arg, "-e", "ws://127.0.0.1:7000"]);
        assert_eq!(args.client_config().unwrap().endpoint, "ws://127.0.0.1:7000");
    }

    #[test]
    fn test_invalid_endpoint_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let args = Args::parse_from([
            "rebg-watch",
            "-c",
            path.to_str().unwrap(),
            "-e",
            "http://localhost:9001",
        ]);
        assert!(matches!(args.client_config(), Err(RebgError::Config(_))));
    }
}
