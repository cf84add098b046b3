use clap::Parser;

use cairn_core::error::{CacheError, CairnError, ConfigError, IngestError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "cairn",
    version,
    about = "Cluster flat API namespaces into stable documentation folders"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

/// Map an error chain to a process exit code.
///
///   0 success
///   1 general error
///   2 configuration error
///   3 cache schema mismatch
///   4 manifest ingestion error
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CairnError>() {
            return match e {
                CairnError::Config(_) => 2,
                CairnError::Cache(CacheError::SchemaMismatch { .. }) => 3,
                CairnError::Ingest(_) => 4,
                CairnError::Cache(_) | CairnError::Persist(_) => 1,
            };
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return 2;
        }
        if let Some(CacheError::SchemaMismatch { .. }) = cause.downcast_ref::<CacheError>() {
            return 3;
        }
        if cause.downcast_ref::<IngestError>().is_some() {
            return 4;
        }
    }
    1
}

fn main() {
    let cli = Cli::parse();

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match commands::run(cli.command, cli.quiet) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(classify_exit_code(&e));
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn exit_code_config() {
        let err = anyhow::Error::new(ConfigError::Invalid("min_cluster_size".into()))
            .context("Cannot load config: cairn.toml");
        assert_eq!(classify_exit_code(&err), 2);
    }

    #[test]
    fn exit_code_schema_mismatch() {
        let result: Result<(), CacheError> = Err(CacheError::SchemaMismatch {
            found: 1,
            expected: 2,
        });
        let err = result.context("Cannot load cache").unwrap_err();
        assert_eq!(classify_exit_code(&err), 3);
    }

    #[test]
    fn exit_code_corrupt_cache_is_general() {
        let err = anyhow::Error::new(CacheError::Corrupt {
            path: "cache.json".into(),
            message: "expected value".into(),
        });
        assert_eq!(classify_exit_code(&err), 1);
    }

    #[test]
    fn exit_code_ingest() {
        let err = anyhow::Error::new(IngestError::Pattern("[".into()));
        assert_eq!(classify_exit_code(&err), 4);
    }

    #[test]
    fn exit_code_wrapped_cairn_error() {
        let err = anyhow::Error::new(CairnError::from(ConfigError::Parse("bad".into())));
        assert_eq!(classify_exit_code(&err), 2);
    }

    #[test]
    fn exit_code_general() {
        let err = anyhow::anyhow!("Something unexpected happened");
        assert_eq!(classify_exit_code(&err), 1);
    }
}
