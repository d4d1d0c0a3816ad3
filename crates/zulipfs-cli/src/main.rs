use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use zulipfs_config::ZulipFsConfig;

mod commands;
mod errors;

#[derive(Parser)]
#[command(name = "zulipfs", version, about = "zulipfs - Zulip channels and topics as a filesystem")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List channels (at /) or the topics of a channel
    Ls {
        /// Path to list (defaults to /)
        path: Option<String>,
    },
    /// Print the rendered content of a topic
    Cat {
        /// Path to the topic file
        path: String,
    },
    /// Show metadata for a channel or topic
    Stat {
        /// Path to inspect
        path: String,
    },
    /// Post a message to a topic
    Post {
        /// Path to the topic file
        path: String,
        /// Message body (reads from stdin if not provided)
        content: Option<String>,
    },
    /// Show effective configuration
    Config,
    /// Validate configuration file
    Validate,
    /// Mount zulipfs as a FUSE filesystem
    #[cfg_attr(not(feature = "fuse"), command(hide = true))]
    Mount {
        /// Directory to mount at
        mountpoint: PathBuf,
        /// Let other users access the mount
        #[arg(long)]
        allow_other: bool,
        /// Filesystem name reported to the kernel
        #[arg(long)]
        fs_name: Option<String>,
    },
    /// Unmount a zulipfs FUSE filesystem
    Unmount {
        /// Mount point to unmount
        mountpoint: PathBuf,
        /// Force unmount even if busy
        #[arg(short, long)]
        force: bool,
    },
}

fn find_config() -> Option<PathBuf> {
    // 1. ZULIPFS_CONFIG environment variable
    if let Ok(path) = std::env::var("ZULIPFS_CONFIG") {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. zulipfs.yaml in current directory
    let cwd_config = PathBuf::from("zulipfs.yaml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. ~/.config/zulipfs/config.yaml
    if let Some(home) = dirs_next::home_dir() {
        let home_config = home.join(".config/zulipfs/config.yaml");
        if home_config.exists() {
            return Some(home_config);
        }
    }

    None
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // Unmount only talks to the OS
    if let Commands::Unmount { mountpoint, force } = cli.command {
        let args = commands::unmount::UnmountArgs { mountpoint, force };
        return commands::unmount::run(args);
    }

    let config_path = cli
        .config
        .or_else(find_config)
        .ok_or("No configuration file found. Use --config, set ZULIPFS_CONFIG, or create zulipfs.yaml")?;

    match cli.command {
        Commands::Validate => {
            return commands::validate::run(&config_path).await;
        }
        Commands::Config => {
            return commands::config::run(&config_path).await;
        }
        #[cfg(feature = "fuse")]
        Commands::Mount {
            mountpoint,
            allow_other,
            fs_name,
        } => {
            let config = ZulipFsConfig::from_file(&config_path)?;
            let args = commands::mount::MountArgs {
                mountpoint,
                allow_other,
                fs_name,
            };
            // The FUSE bridge drives its own runtime and must not block a worker of this one.
            return tokio::task::spawn_blocking(move || {
                commands::mount::run(config, args).map_err(|e| e.to_string())
            })
            .await?
            .map_err(Into::into);
        }
        #[cfg(not(feature = "fuse"))]
        Commands::Mount { .. } => {
            return Err("zulipfs was built without FUSE support (enable the `fuse` feature)".into());
        }
        _ => {}
    }

    let config = ZulipFsConfig::from_file(&config_path)?;
    let adapter = commands::connect(&config).await?;

    match cli.command {
        Commands::Ls { path } => {
            commands::ls::run(&adapter, path).await?;
        }
        Commands::Cat { path } => {
            commands::cat::run(&adapter, &path).await?;
        }
        Commands::Stat { path } => {
            commands::stat::run(&adapter, &path).await?;
        }
        Commands::Post { path, content } => {
            commands::post::run(&adapter, &path, content).await?;
        }
        Commands::Validate
        | Commands::Config
        | Commands::Mount { .. }
        | Commands::Unmount { .. } => {
            return Err("Internal error: command should have been handled earlier".into());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = err.exit_code();
            let code = if code < 0 {
                1u8
            } else if code > 255 {
                255u8
            } else {
                code as u8
            };
            return ExitCode::from(code);
        }
    };

    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        errors::print_error(e.as_ref());
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_post_without_content() {
        let cli = Cli::try_parse_from(["zulipfs", "post", "/general/greetings"]).unwrap();
        match cli.command {
            Commands::Post { path, content } => {
                assert_eq!(path, "/general/greetings");
                assert!(content.is_none());
            }
            _ => panic!("expected post"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["zulipfs", "ls", "-v", "--config", "zulipfs.yaml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("zulipfs.yaml")));
        assert!(matches!(cli.command, Commands::Ls { path: None }));
    }

    #[test]
    fn test_parse_mount_overrides() {
        let cli = Cli::try_parse_from([
            "zulipfs",
            "mount",
            "/mnt/zulip",
            "--allow-other",
            "--fs-name",
            "chat",
        ])
        .unwrap();
        match cli.command {
            Commands::Mount {
                mountpoint,
                allow_other,
                fs_name,
            } => {
                assert_eq!(mountpoint, PathBuf::from("/mnt/zulip"));
                assert!(allow_other);
                assert_eq!(fs_name.as_deref(), Some("chat"));
            }
            _ => panic!("expected mount"),
        }
    }

    #[test]
    fn test_parse_unmount_force() {
        let cli = Cli::try_parse_from(["zulipfs", "unmount", "-f", "/mnt/zulip"]).unwrap();
        assert!(matches!(cli.command, Commands::Unmount { force: true, .. }));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["zulipfs"]).is_err());
    }
}
