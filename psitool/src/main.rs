//! psitool: inspect, build and convert PSI/SI tables.

use std::process::ExitCode;

use clap::Parser;
use log::{debug, error, warn};
use psitool_codec::{CodecContext, Problem, ProblemLog, Registry, Strictness};

mod commands;
mod config;
mod context;
mod logging;

use context::{Cli, Commands};

/// Problems meaning a table or descriptor is missing from the output.
fn is_rejection(problem: &Problem) -> bool {
    matches!(problem, Problem::SkippedElement { .. } | Problem::Omitted { .. })
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Command line takes precedence over the config file
    let file_config = config::resolve_config(cli.config.as_deref())?;
    logging::init_logging(
        file_config.logging.log_dir.as_deref(),
        file_config
            .logging
            .retention_days
            .unwrap_or(config::DEFAULT_RETENTION_DAYS),
        cli.verbose,
        file_config.logging.level.as_deref(),
    )?;

    let standards = match cli.standards {
        Some(standards) => standards,
        None => file_config.codec.standards()?,
    };
    let strictness = if cli.strict || file_config.codec.strict.unwrap_or(false) {
        Strictness::Strict
    } else {
        Strictness::Lenient
    };

    let problems = ProblemLog::new();
    let ctx = CodecContext::with_registry(Registry::global())
        .with_standards(standards)
        .with_strictness(strictness)
        .with_fix_pds(file_config.codec.fix_pds.unwrap_or(false))
        .with_default_pds(file_config.codec.default_pds)
        .with_problem_log(&problems);
    debug!("{:?}", ctx);

    let result = match &cli.command {
        Commands::Inspect { input, table_id } => commands::inspect::inspect(&ctx, input, *table_id),
        Commands::ToXml { input, output } => commands::convert::to_xml(&ctx, input, output.as_deref()),
        Commands::FromXml {
            input,
            output,
            fix_pds,
        } => {
            let ctx = if *fix_pds { ctx.with_fix_pds(true) } else { ctx };
            commands::convert::from_xml(&ctx, input, output.as_deref())
        }
        Commands::List { tables, descriptors } => {
            commands::list::list(ctx.registry(), *tables, *descriptors);
            Ok(())
        }
    };
    if let Err(e) = result {
        error!("{}", e);
        return Err(e);
    }

    let rejected = problems.take().iter().filter(|p| is_rejection(p)).count();
    if rejected > 0 {
        warn!("{} tables or descriptors rejected", rejected);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use psitool_codec::Standards;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["psitool", "inspect", "nit.bin", "--tid", "0x40", "-s", "dvb,isdb", "--strict"])
            .unwrap();
        assert!(cli.strict);
        assert_eq!(cli.standards, Some(Standards::DVB | Standards::ISDB));
        assert!(matches!(cli.command, Commands::Inspect { table_id: Some(0x40), .. }));
    }

    #[test]
    fn test_list_kinds_exclusive() {
        assert!(Cli::try_parse_from(["psitool", "list", "--tables", "--descriptors"]).is_err());
    }

    #[test]
    fn test_rejections() {
        assert!(is_rejection(&Problem::Omitted {
            name: "table 0x42".into(),
            reason: "x".into()
        }));
        assert!(!is_rejection(&Problem::ExtraneousData {
            name: "SDT".into(),
            size: 2
        }));
    }
}
