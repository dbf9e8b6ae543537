use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::config::{AppConfig, Environment};
use crate::database::Database;
use crate::mailer;
use crate::routes::AppState;
use crate::server;

#[derive(Parser)]
#[command(name = "marketier-api")]
#[command(about = "Marketier marketplace JSON API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Configuration preset: development, staging or production")]
    pub env: Option<String>,

    #[arg(long, global = true, help = "PostgreSQL DSN, overrides DATABASE_URL")]
    pub db_dsn: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API server")]
    Serve(ServeArgs),

    #[command(about = "Apply database migrations and exit")]
    Migrate,
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[arg(long, help = "API server port")]
    pub port: Option<u16>,

    #[arg(long, help = "Enable the per-client rate limiter (true/false)")]
    pub limiter_enabled: Option<bool>,

    #[arg(long, help = "Rate limiter sustained requests per second")]
    pub limiter_rps: Option<f64>,

    #[arg(long, help = "Rate limiter burst size")]
    pub limiter_burst: Option<u32>,
}

impl ServeArgs {
    /// Layer the flags over `config` and check the resulting limiter settings.
    fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst = burst;
        }
        if config.limiter.enabled {
            config.limiter.validate().context("invalid rate limiter configuration")?;
        }
        Ok(())
    }
}

/// Preset (flag or `APP_ENV`), then environment variables, then global flags.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match cli.env.as_deref() {
        Some(name) => {
            let environment = Environment::parse(name).ok_or_else(|| anyhow!("unknown environment '{}'", name))?;
            AppConfig::for_environment(environment).with_env_overrides()
        }
        None => AppConfig::from_env(),
    };

    if let Some(dsn) = &cli.db_dsn {
        config.database.url = dsn.clone();
    }
    Ok(config)
}

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Serve(args) => {
            args.apply(&mut config)?;
            let db = Database::connect_lazy(&config.database).context("database configuration")?;
            let mailer = mailer::from_config(&config.mail);
            server::serve(AppState::new(config, db, mailer)).await
        }
        Commands::Migrate => {
            let db = Database::connect_lazy(&config.database).context("database configuration")?;
            db.migrate().await.context("migration failed")?;
            db.close().await;
            info!("Migrations complete");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_flags_override_config() {
        let cli = Cli::parse_from([
            "marketier-api",
            "--env",
            "production",
            "--db-dsn",
            "postgres://u:p@db/marketier",
            "serve",
            "--port",
            "9000",
            "--limiter-enabled",
            "false",
            "--limiter-burst",
            "10",
        ]);

        let mut config = load_config(&cli).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.database.url, "postgres://u:p@db/marketier");

        let Commands::Serve(args) = &cli.command else {
            panic!("expected serve");
        };
        args.apply(&mut config).unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(!config.limiter.enabled);
        assert_eq!(config.limiter.burst, 10);
    }

    fn serve_args(flags: &[&str]) -> ServeArgs {
        let argv = ["marketier-api", "serve"].into_iter().chain(flags.iter().copied());
        match Cli::parse_from(argv).command {
            Commands::Serve(args) => args,
            Commands::Migrate => panic!("expected serve"),
        }
    }

    #[test]
    fn rejects_limiter_settings_that_block_or_bypass() {
        let mut config = AppConfig::for_environment(Environment::Development);
        config.limiter.enabled = true;

        for flags in [
            ["--limiter-burst", "0"],
            ["--limiter-rps", "0"],
            ["--limiter-rps=-1", "--limiter-burst=4"],
            ["--limiter-rps", "NaN"],
        ] {
            let mut candidate = config.clone();
            assert!(serve_args(&flags).apply(&mut candidate).is_err(), "accepted {:?}", flags);
        }

        // Disabled limiter settings are never used
        let args = serve_args(&["--limiter-enabled", "false", "--limiter-burst", "0"]);
        assert!(args.apply(&mut config).is_ok());
    }

    #[test]
    fn rejects_unknown_environment() {
        let cli = Cli::parse_from(["marketier-api", "--env", "moon", "migrate"]);
        assert!(load_config(&cli).is_err());
    }
}
