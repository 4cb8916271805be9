use crate::commands::{run_bulk, run_export, run_import, BulkArgs, ExportArgs, ImportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use pt_jobs::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "pt-jobs",
    about = "Import, reconcile and export PT Jobs board records from CSV",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP admin service (default command)
    Serve(ServeArgs),
    /// Import one or more CSV files for a single record type
    Import(ImportArgs),
    /// Run the standard start-up import plan over a directory of exports
    Bulk(BulkArgs),
    /// Write every stored record of one type as CSV
    Export(ExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Import(args) => run_import(args),
        Command::Bulk(args) => run_bulk(args),
        Command::Export(args) => run_export(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_jobs::imports::StatusMode;
    use pt_jobs::records::EntityKind;
    use std::path::PathBuf;

    #[test]
    fn import_flags_parse() {
        let cli = Cli::try_parse_from([
            "pt-jobs",
            "import",
            "job-seekers",
            "a.csv",
            "b.csv",
            "--dry-run",
            "--status",
            "pending",
            "--limit",
            "25",
            "--no-create",
        ])
        .expect("arguments parse");

        let Some(Command::Import(args)) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.entity, EntityKind::JobSeeker);
        assert_eq!(args.sources, vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]);
        assert!(args.dry_run);
        assert_eq!(args.status, Some(StatusMode::Pending));
        assert_eq!(args.limit, Some(25));
        assert!(args.no_create);
        assert!(!args.no_update);
    }

    #[test]
    fn unknown_entity_is_rejected() {
        assert!(Cli::try_parse_from(["pt-jobs", "export", "packages"]).is_err());
    }

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["pt-jobs"]).expect("no arguments parse");
        assert!(cli.command.is_none());
    }
}
