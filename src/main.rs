use clap::Parser;
use sentinelhub::utils::error::ErrorSeverity;
use sentinelhub::utils::{logger, validation::Validate};
use sentinelhub::CliConfig;

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // logging
    if cli.json_logs {
        logger::init_json_logger(if cli.verbose { Some("debug") } else { None });
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI config: {:?}", cli);

    // validate arguments and config file
    let config = match cli.validate().and_then(|_| cli.load_client_config()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = cli.run(&config).await {
        tracing::error!("❌ Command failed: {} (Severity: {:?})", e, e.severity());

        eprintln!("❌ {}", e);
        eprintln!("💡 Hint: {}", e.recovery_suggestion());

        // exit code by severity
        let exit_code = match e.severity() {
            ErrorSeverity::Medium => 2,   // transient network or service error
            ErrorSeverity::High => 1,     // bad arguments or request
            ErrorSeverity::Critical => 3, // system error
        };
        std::process::exit(exit_code);
    }
}
