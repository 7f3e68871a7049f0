//! `agora` command-line entry point.
//!
//! # Responsibility
//! - Serve the HTTP API over one SQLite database file.
//! - Offer maintenance commands that need no running server.

use agora_core::db::migrations::latest_version;
use agora_core::{open_db, AccountService, SqliteUserRepository};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::signal;

#[derive(Debug, Parser)]
#[command(name = "agora", version, about = "Agora social, library and blog backend")]
struct Cli {
    /// SQLite database file; created when missing.
    #[arg(long, env = "AGORA_DB", default_value = "agora.sqlite3", global = true)]
    db: PathBuf,

    /// Directory for rolling log files. Logs go to stderr when unset.
    #[arg(long, env = "AGORA_LOG_DIR", global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "AGORA_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the HTTP server until Ctrl+C or SIGTERM.
    Serve {
        #[arg(long, env = "AGORA_BIND", default_value = "127.0.0.1:8000")]
        bind: SocketAddr,
    },
    /// Applies pending schema migrations and exits.
    Migrate,
    /// Creates a staff account allowed to edit the library catalog.
    CreateStaff {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, env = "AGORA_STAFF_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    match cli.command {
        Command::Serve { bind } => serve(&cli.db, bind).await,
        Command::Migrate => migrate(&cli.db),
        Command::CreateStaff {
            username,
            email,
            password,
        } => create_staff(&cli.db, &username, &email, &password),
    }
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let level = match cli.log_level.as_deref() {
        Some(level) => level,
        None => agora_core::default_log_level(),
    };
    let log_dir = match cli.log_dir.as_deref() {
        Some(dir) if dir.is_relative() => Some(
            std::env::current_dir()
                .context("failed to resolve the working directory")?
                .join(dir),
        ),
        Some(dir) => Some(dir.to_path_buf()),
        None => None,
    };
    let log_dir = log_dir
        .as_deref()
        .map(|dir| dir.to_str().context("log directory is not valid UTF-8"))
        .transpose()?;
    agora_core::init_logging(level, log_dir).map_err(anyhow::Error::msg)
}

async fn serve(db: &Path, bind: SocketAddr) -> Result<()> {
    let conn = open_db(db).with_context(|| format!("failed to open {}", db.display()))?;
    let app = agora_api::router(agora_api::AppState::new(conn));

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    log::info!("event=server_start module=cli status=ok addr={bind}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = shutdown_signal().await {
                log::error!("event=server_signal module=cli status=error error={err}");
            }
        })
        .await
        .context("HTTP server failed")?;

    log::info!("event=server_stop module=cli status=ok");
    Ok(())
}

fn migrate(db: &Path) -> Result<()> {
    open_db(db).with_context(|| format!("failed to migrate {}", db.display()))?;
    println!("{} is at schema version {}", db.display(), latest_version());
    Ok(())
}

fn create_staff(db: &Path, username: &str, email: &str, password: &str) -> Result<()> {
    let mut conn = open_db(db).with_context(|| format!("failed to open {}", db.display()))?;
    let user = AccountService::new(SqliteUserRepository::try_new(&mut conn)?)
        .create_staff(username, email, password)
        .context("failed to create staff account")?;
    println!("created staff user {} (id {})", user.username, user.id);
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }
    log::info!("event=server_signal module=cli status=ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "agora",
            "--db",
            "data/agora.db",
            "--log-level",
            "warn",
            "serve",
            "--bind",
            "0.0.0.0:9000",
        ])
        .unwrap();
        assert_eq!(cli.db, PathBuf::from("data/agora.db"));
        assert_eq!(cli.log_level.as_deref(), Some("warn"));
        match cli.command {
            Command::Serve { bind } => assert_eq!(bind, SocketAddr::from(([0, 0, 0, 0], 9000))),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_flags_may_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["agora", "migrate", "--db", "late.db"]).unwrap();
        assert_eq!(cli.db, PathBuf::from("late.db"));
        assert!(matches!(cli.command, Command::Migrate));
    }

    #[test]
    fn environment_fills_unset_flags() {
        std::env::set_var("AGORA_LOG_LEVEL", "debug");
        std::env::set_var("AGORA_BIND", "127.0.0.1:9100");
        let from_env = Cli::try_parse_from(["agora", "serve"]);
        let overridden = Cli::try_parse_from([
            "agora",
            "--log-level",
            "error",
            "serve",
            "--bind",
            "127.0.0.1:9200",
        ]);
        std::env::remove_var("AGORA_LOG_LEVEL");
        std::env::remove_var("AGORA_BIND");

        let cli = from_env.unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Serve { bind } if bind.port() == 9100));

        let cli = overridden.unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("error"));
        assert!(matches!(cli.command, Command::Serve { bind } if bind.port() == 9200));
    }

    #[test]
    fn create_staff_requires_username_and_password() {
        let missing_username =
            Cli::try_parse_from(["agora", "create-staff", "--password", "s3cret-pass"]);
        assert!(missing_username.is_err());

        let cli = Cli::try_parse_from([
            "agora",
            "create-staff",
            "--username",
            "keeper",
            "--password",
            "s3cret-pass",
        ])
        .unwrap();
        match cli.command {
            Command::CreateStaff {
                username,
                email,
                password,
            } => {
                assert_eq!(username, "keeper");
                assert_eq!(email, "");
                assert_eq!(password, "s3cret-pass");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn create_staff_writes_a_staff_account() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("agora.sqlite3");

        create_staff(&db, "keeper", "keeper@example.com", "s3cret-pass").unwrap();
        assert!(create_staff(&db, "keeper", "", "s3cret-pass").is_err());

        let mut conn = open_db(&db).unwrap();
        let session = AccountService::new(SqliteUserRepository::try_new(&mut conn).unwrap())
            .login("keeper", "s3cret-pass")
            .unwrap();
        assert!(session.user.is_staff);
        assert_eq!(session.user.email, "keeper@example.com");
    }

    #[test]
    fn migrate_creates_the_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("fresh.sqlite3");
        migrate(&db).unwrap();
        assert!(db.exists());
    }
}
