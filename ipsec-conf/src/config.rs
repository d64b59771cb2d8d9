// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration management for ipsec-conf

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};

use crate::error::{IpsecConfError, Result};

/// Hostname to IP address table.
///
/// Ordered so that peer blocks are always emitted in the same order.
pub type HostTable = BTreeMap<String, String>;

/// Default location of the key files relative to a host prefix
pub const DEFAULT_CERTS_FOLDER: &str = "etc/racoon/certs";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for a provisioning run; each host gets `<output_dir>/<hostname>`
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Key directory relative to a host prefix
    #[serde(default = "default_certs_folder")]
    pub certs_folder: PathBuf,

    /// Hostname to IP address table
    #[serde(default)]
    pub hosts: HostTable,

    /// Key generation settings
    #[serde(default)]
    pub keygen: KeygenConfig,

    /// IKE, SA and policy parameters
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the external key generation tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeygenConfig {
    /// Program invoked to create private keys
    #[serde(default = "default_keygen_program")]
    pub program: String,

    /// RSA modulus size in bits
    #[serde(default = "default_key_bits")]
    pub bits: u32,
}

/// Cryptographic parameters written into racoon.conf and ipsec-tools.conf.
///
/// Defaults match what racoon deployments of this tool have always shipped
/// with: 3DES, SHA-256, RSA signatures and MODP-1024.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoConfig {
    #[serde(default = "default_exchange_mode")]
    pub exchange_mode: String,

    /// Phase 1 lifetime in hours
    #[serde(default = "default_lifetime_hours")]
    pub lifetime_hours: u32,

    #[serde(default = "default_encryption")]
    pub encryption_algorithm: String,

    #[serde(default = "default_hash")]
    pub hash_algorithm: String,

    #[serde(default = "default_auth_method")]
    pub authentication_method: String,

    #[serde(default = "default_dh_group")]
    pub dh_group: String,

    #[serde(default = "default_dh_group")]
    pub pfs_group: String,

    #[serde(default = "default_encryption")]
    pub sa_encryption_algorithm: String,

    #[serde(default = "default_sa_auth")]
    pub sa_authentication_algorithm: String,

    #[serde(default = "default_compression")]
    pub compression_algorithm: String,

    /// Directory racoon reads keys from on the target host
    #[serde(default = "default_certificate_path")]
    pub certificate_path: String,

    /// racoon `log` directive
    #[serde(default = "default_racoon_log")]
    pub log_level: String,

    /// IPsec level for the esp and ah policy requests (require, use, unique)
    #[serde(default = "default_policy_level")]
    pub policy_level: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for KeygenConfig {
    fn default() -> Self {
        Self {
            program: default_keygen_program(),
            bits: default_key_bits(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            exchange_mode: default_exchange_mode(),
            lifetime_hours: default_lifetime_hours(),
            encryption_algorithm: default_encryption(),
            hash_algorithm: default_hash(),
            authentication_method: default_auth_method(),
            dh_group: default_dh_group(),
            pfs_group: default_dh_group(),
            sa_encryption_algorithm: default_encryption(),
            sa_authentication_algorithm: default_sa_auth(),
            compression_algorithm: default_compression(),
            certificate_path: default_certificate_path(),
            log_level: default_racoon_log(),
            policy_level: default_policy_level(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            certs_folder: default_certs_folder(),
            hosts: HostTable::new(),
            keygen: KeygenConfig::default(),
            crypto: CryptoConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed and validated configuration or an error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(IpsecConfError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for (hostname, ip) in &self.hosts {
            validate_hostname(hostname)?;
            if ip.parse::<IpAddr>().is_err() {
                return Err(invalid(format!(
                    "host '{}' has an invalid IP address '{}'",
                    hostname, ip
                )));
            }
        }

        // Joined onto every host prefix, so it has to stay below it
        if self.certs_folder.as_os_str().is_empty()
            || !self
                .certs_folder
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(invalid(format!(
                "certs_folder must be a relative path inside the host prefix, got '{}'",
                self.certs_folder.display()
            )));
        }

        if self.keygen.program.trim().is_empty() {
            return Err(invalid("keygen program cannot be empty".to_string()));
        }

        if self.keygen.bits < 1024 {
            return Err(invalid(format!(
                "keygen bits must be at least 1024, got {}",
                self.keygen.bits
            )));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "logging level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }

        self.crypto.validate()
    }

    /// Look up the IP address of a host
    pub fn host_ip(&self, hostname: &str) -> Result<&str> {
        self.hosts
            .get(hostname)
            .map(String::as_str)
            .ok_or_else(|| IpsecConfError::HostNotFound {
                hostname: hostname.to_string(),
            })
    }

    /// Prefix directory for a host within a provisioning run
    pub fn host_prefix(&self, hostname: &str) -> PathBuf {
        self.output_dir.join(hostname)
    }
}

impl CryptoConfig {
    /// Every value ends up as a bare token inside a racoon or setkey
    /// statement, so it must not be able to open or close one.
    pub fn validate(&self) -> Result<()> {
        let tokens = [
            ("exchange_mode", &self.exchange_mode),
            ("encryption_algorithm", &self.encryption_algorithm),
            ("hash_algorithm", &self.hash_algorithm),
            ("authentication_method", &self.authentication_method),
            ("dh_group", &self.dh_group),
            ("pfs_group", &self.pfs_group),
            ("sa_encryption_algorithm", &self.sa_encryption_algorithm),
            ("sa_authentication_algorithm", &self.sa_authentication_algorithm),
            ("compression_algorithm", &self.compression_algorithm),
            ("certificate_path", &self.certificate_path),
            ("log_level", &self.log_level),
            ("policy_level", &self.policy_level),
        ];

        for (name, value) in tokens {
            if !is_single_token(value) {
                return Err(invalid(format!(
                    "crypto.{} must be a single token, got '{}'",
                    name, value
                )));
            }
        }

        if self.lifetime_hours == 0 {
            return Err(invalid("crypto.lifetime_hours must be positive".to_string()));
        }

        Ok(())
    }
}

/// Check that a hostname can name a key file inside a host prefix
pub fn validate_hostname(hostname: &str) -> Result<()> {
    if hostname.is_empty() {
        return Err(invalid("hostname cannot be empty".to_string()));
    }
    if hostname == "." || hostname == ".." {
        return Err(invalid(format!("'{}' is not a usable hostname", hostname)));
    }
    if !is_single_token(hostname) || hostname.contains(['/', '\\']) {
        return Err(invalid(format!(
            "hostname '{}' contains characters that cannot be used in a key filename",
            hostname
        )));
    }
    Ok(())
}

fn is_single_token(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ';' | '{' | '}' | '"'))
}

fn invalid(message: String) -> IpsecConfError {
    IpsecConfError::InvalidConfig { message }
}

// Default value functions

fn default_output_dir() -> PathBuf {
    PathBuf::from("ipsec")
}

fn default_certs_folder() -> PathBuf {
    PathBuf::from(DEFAULT_CERTS_FOLDER)
}

fn default_keygen_program() -> String {
    "plainrsa-gen".to_string()
}

fn default_key_bits() -> u32 {
    crate::keys::DEFAULT_KEY_BITS
}

fn default_exchange_mode() -> String {
    "main".to_string()
}

fn default_lifetime_hours() -> u32 {
    12
}

fn default_encryption() -> String {
    "3des".to_string()
}

fn default_hash() -> String {
    "sha256".to_string()
}

fn default_auth_method() -> String {
    "rsasig".to_string()
}

fn default_dh_group() -> String {
    "modp1024".to_string()
}

fn default_sa_auth() -> String {
    "hmac_sha256".to_string()
}

fn default_compression() -> String {
    "deflate".to_string()
}

fn default_certificate_path() -> String {
    "/etc/racoon/certs".to_string()
}

fn default_racoon_log() -> String {
    "notify".to_string()
}

fn default_policy_level() -> String {
    "require".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}
