// SPDX-License-Identifier: AGPL-3.0-or-later
//! ipsec-conf: IPSec configuration generator for racoon and ipsec-tools
//!
//! Creates keys and configuration for every host of a host-to-host IPSec mesh.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ipsec_conf::{
    conf,
    config::validate_hostname,
    keys::{self, PlainRsaGen},
    Config, Provisioner,
};

/// ipsec-conf: racoon and ipsec-tools configuration generator
///
/// Generates plain RSA keys, racoon.conf and ipsec-tools.conf for every
/// host listed in the configuration file.
#[derive(Parser, Debug)]
#[command(name = "ipsec-conf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "ipsec-conf.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Dry run mode (no files are written)
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Generated file to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfKind {
    /// racoon.conf
    Racoon,
    /// ipsec-tools.conf
    Setkey,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate keys and configuration for every host
    Provision {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create or reuse the keypair of one host
    Keys {
        /// Hostname the key files are named after
        hostname: String,

        /// Prefix directory (default: <output_dir>/<hostname>)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Write racoon.conf and ipsec-tools.conf for one host
    #[command(alias = "config-files")]
    Conf {
        /// Hostname from the hosts table
        hostname: String,

        /// Prefix directory (default: <output_dir>/<hostname>)
        #[arg(short, long)]
        prefix: Option<PathBuf>,
    },

    /// Print a generated file for one host
    Show {
        /// Which file to render
        #[arg(value_enum)]
        kind: ConfKind,

        /// Hostname from the hosts table
        hostname: String,
    },

    /// Show configuration
    Config,

    /// Initialize a new configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = cli
        .config
        .exists()
        .then(|| Config::from_file(&cli.config));

    // Command line flags win over the configured level
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        match &loaded {
            Some(Ok(config)) => config.logging.level.as_str(),
            _ => "warn",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_target(cli.debug)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init { force } = cli.command {
        return init_config(&cli.config, force);
    }
    if let Commands::Version = cli.command {
        println!("ipsec-conf v{}", env!("CARGO_PKG_VERSION"));
        println!("racoon and ipsec-tools configuration generator");
        return Ok(());
    }

    let config = match loaded {
        Some(result) => result
            .with_context(|| format!("Failed to load config from {}", cli.config.display()))?,
        None => Config::default(),
    };
    let from_file = cli.config.exists();

    match cli.command {
        Commands::Config => show_config(&config, from_file),
        Commands::Keys { hostname, prefix } => {
            make_host_keys(&config, &hostname, prefix, cli.dry_run)
        }
        Commands::Conf { hostname, prefix } => {
            write_host_conf(&config, &hostname, prefix, cli.dry_run)
        }
        Commands::Show { kind, hostname } => show_conf(&config, kind, &hostname),
        Commands::Provision { json } => {
            if !from_file {
                anyhow::bail!(
                    "Configuration file not found: {}. Run 'ipsec-conf init' and list your hosts.",
                    cli.config.display()
                );
            }
            provision(&config, cli.dry_run, json)
        }
        Commands::Init { .. } | Commands::Version => Ok(()),
    }
}

/// Initialize a new configuration file
fn init_config(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let default_config = r#"# SPDX-License-Identifier: AGPL-3.0-or-later
# ipsec-conf configuration

# Every host gets <output_dir>/<hostname> laid out like its root filesystem
output_dir = "ipsec"
certs_folder = "etc/racoon/certs"

[hosts]
# alpha = "192.168.1.10"
# beta = "192.168.1.11"

[keygen]
program = "plainrsa-gen"
bits = 4096

[crypto]
exchange_mode = "main"
lifetime_hours = 12
encryption_algorithm = "3des"
hash_algorithm = "sha256"
authentication_method = "rsasig"
dh_group = "modp1024"
pfs_group = "modp1024"
sa_encryption_algorithm = "3des"
sa_authentication_algorithm = "hmac_sha256"
compression_algorithm = "deflate"
certificate_path = "/etc/racoon/certs"
log_level = "notify"
policy_level = "require"

[logging]
level = "warn"
"#;

    std::fs::write(config_path, default_config)?;
    info!("Created configuration file: {}", config_path.display());
    println!("Created configuration file: {}", config_path.display());
    Ok(())
}

/// Show the current configuration
fn show_config(config: &Config, from_file: bool) -> anyhow::Result<()> {
    if !from_file {
        println!("No configuration file found. Using defaults:");
        println!();
    }
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Create or reuse one host's keypair
fn make_host_keys(
    config: &Config,
    hostname: &str,
    prefix: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    validate_hostname(hostname)?;
    let prefix = prefix.unwrap_or_else(|| config.host_prefix(hostname));

    if dry_run {
        let private_key = keys::private_key_path(hostname, &prefix, &config.certs_folder);
        if private_key.exists() {
            println!("[DRY RUN] Would reuse private key {}", private_key.display());
        } else {
            println!(
                "[DRY RUN] Would run: {} -b {} -f {}",
                config.keygen.program,
                config.keygen.bits,
                private_key.display()
            );
        }
        println!(
            "[DRY RUN] Would write public key {}",
            keys::public_key_path(hostname, &prefix, &config.certs_folder).display()
        );
        return Ok(());
    }

    let provider = PlainRsaGen::new(config.keygen.program.clone());
    let host_keys = keys::provision_keys(
        hostname,
        &prefix,
        &config.certs_folder,
        &provider,
        config.keygen.bits,
    )?;

    if host_keys.generated {
        println!("Generated private key: {}", host_keys.private_key.display());
    } else {
        println!("Using existing private key: {}", host_keys.private_key.display());
    }

    if !host_keys.public_derived {
        eprintln!(
            "No PUB line found in {}; public key not written",
            host_keys.private_key.display()
        );
        std::process::exit(1);
    }

    println!("Public key: {}", host_keys.public_key.display());
    Ok(())
}

/// Write both config files for one host
fn write_host_conf(
    config: &Config,
    hostname: &str,
    prefix: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    validate_hostname(hostname)?;
    let host_ip = config.host_ip(hostname)?;
    let prefix = prefix.unwrap_or_else(|| config.host_prefix(hostname));
    info!(host = %hostname, ip = %host_ip, prefix = %prefix.display(), "Writing config files");

    if dry_run {
        conf::render_racoon_conf(hostname, &config.hosts, &config.crypto)?;
        conf::render_setkey_conf(hostname, &config.hosts, &config.crypto)?;
        let files = conf::ConfFiles::under(&prefix);
        println!("[DRY RUN] Would write {}", files.racoon.display());
        println!("[DRY RUN] Would write {}", files.setkey.display());
        return Ok(());
    }

    let files = conf::make_conf(hostname, &config.hosts, &prefix, &config.crypto)?;
    println!("Wrote {}", files.racoon.display());
    println!("Wrote {}", files.setkey.display());
    Ok(())
}

/// Print a rendered config file
fn show_conf(config: &Config, kind: ConfKind, hostname: &str) -> anyhow::Result<()> {
    let contents = match kind {
        ConfKind::Racoon => conf::render_racoon_conf(hostname, &config.hosts, &config.crypto)?,
        ConfKind::Setkey => conf::render_setkey_conf(hostname, &config.hosts, &config.crypto)?,
    };
    print!("{}", contents);
    Ok(())
}

/// Provision every host in the configuration
fn provision(config: &Config, dry_run: bool, json: bool) -> anyhow::Result<()> {
    if config.hosts.is_empty() {
        anyhow::bail!("No hosts configured. Add entries under [hosts].");
    }

    let provider = PlainRsaGen::new(config.keygen.program.clone());
    let report = Provisioner::new(config, &provider, dry_run).run()?;

    if json {
        println!("{}", report.to_json()?);
    } else {
        if dry_run {
            println!("[DRY RUN] Would provision {} hosts", report.hosts.len());
        } else {
            println!("Provisioned {} hosts", report.hosts.len());
        }
        println!();
        println!("Results:");
        println!("  Duration: {} ms", report.total_duration_ms);
        println!("  Keys generated: {}", report.keys_generated);
        println!("  Keys reused: {}", report.keys_reused);
        println!("  Public keys copied: {}", report.keys_copied);
        println!("  Config files: {}", report.files_written.len());
        for hostname in &report.public_key_failures {
            println!("  Missing public key: {}", hostname);
        }
    }

    if !report.success() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["ipsec-conf", "version"]).unwrap();
        match cli.command {
            Commands::Version => {}
            _ => panic!("Expected Version command"),
        }
    }

    #[test]
    fn test_cli_keys_command() {
        let cli =
            Cli::try_parse_from(["ipsec-conf", "keys", "alpha", "--prefix", "/tmp/alpha"]).unwrap();
        match cli.command {
            Commands::Keys { hostname, prefix } => {
                assert_eq!(hostname, "alpha");
                assert_eq!(prefix, Some(PathBuf::from("/tmp/alpha")));
            }
            _ => panic!("Expected Keys command"),
        }
    }

    #[test]
    fn test_cli_show_command() {
        let cli = Cli::try_parse_from(["ipsec-conf", "show", "setkey", "beta"]).unwrap();
        match cli.command {
            Commands::Show { kind, hostname } => {
                assert_eq!(kind, ConfKind::Setkey);
                assert_eq!(hostname, "beta");
            }
            _ => panic!("Expected Show command"),
        }
    }

    #[test]
    fn test_cli_dry_run_flag() {
        let cli = Cli::try_parse_from(["ipsec-conf", "--dry-run", "provision"]).unwrap();
        assert!(cli.dry_run);
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["ipsec-conf", "-v", "provision", "--json"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Provision { json } => assert!(json),
            _ => panic!("Expected Provision command"),
        }
    }
}
