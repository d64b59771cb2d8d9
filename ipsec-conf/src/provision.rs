// SPDX-License-Identifier: AGPL-3.0-or-later
//! Full provisioning run over every host in the configuration
//!
//! Each host gets its own prefix `<output_dir>/<hostname>` that mirrors the
//! root filesystem of the target machine. A run generates or reuses every
//! host's keys, hands each public key to every peer, then renders both
//! config files per host.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::conf::{self, ConfFiles};
use crate::config::Config;
use crate::error::Result;
use crate::keys::{self, KeyProvider};

/// Runs key provisioning and config rendering for a whole host table
pub struct Provisioner<'a> {
    config: &'a Config,
    provider: &'a dyn KeyProvider,
    /// Whether to run in dry-run mode (no filesystem changes)
    dry_run: bool,
}

/// Result of a provisioning run
#[derive(Debug, Default, Serialize)]
pub struct ProvisionReport {
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Hosts processed, in table order
    pub hosts: Vec<String>,
    /// Private keys created by the run
    pub keys_generated: usize,
    /// Private keys that already existed
    pub keys_reused: usize,
    /// Hosts whose private key had no PUB line
    pub public_key_failures: Vec<String>,
    /// Public keys copied into peer prefixes
    pub keys_copied: usize,
    /// Config files written
    pub files_written: Vec<PathBuf>,
    /// Total duration
    pub total_duration_ms: u64,
}

impl ProvisionReport {
    /// True when every host ended up with a public key
    pub fn success(&self) -> bool {
        self.public_key_failures.is_empty()
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<'a> Provisioner<'a> {
    /// Create a new provisioner
    pub fn new(config: &'a Config, provider: &'a dyn KeyProvider, dry_run: bool) -> Self {
        Self {
            config,
            provider,
            dry_run,
        }
    }

    /// Provision every host in the table
    pub fn run(&self) -> Result<ProvisionReport> {
        let start_time = std::time::Instant::now();
        let mut report = ProvisionReport {
            dry_run: self.dry_run,
            hosts: self.config.hosts.keys().cloned().collect(),
            ..ProvisionReport::default()
        };

        info!(
            hosts = report.hosts.len(),
            output_dir = %self.config.output_dir.display(),
            dry_run = self.dry_run,
            "Starting provisioning"
        );

        for hostname in self.config.hosts.keys() {
            self.make_host_keys(hostname, &mut report)?;
        }

        for hostname in self.config.hosts.keys() {
            if report.public_key_failures.contains(hostname) {
                warn!(host = %hostname, "Skipping distribution, no public key");
                continue;
            }
            for (peer, _) in conf::peers(hostname, &self.config.hosts) {
                self.distribute_key(hostname, peer)?;
                report.keys_copied += 1;
            }
        }

        for hostname in self.config.hosts.keys() {
            let files = self.write_host_conf(hostname)?;
            report.files_written.push(files.racoon);
            report.files_written.push(files.setkey);
        }

        report.total_duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            generated = report.keys_generated,
            reused = report.keys_reused,
            copied = report.keys_copied,
            files = report.files_written.len(),
            duration_ms = report.total_duration_ms,
            "Provisioning completed"
        );

        Ok(report)
    }

    fn make_host_keys(&self, hostname: &str, report: &mut ProvisionReport) -> Result<()> {
        let prefix = self.config.host_prefix(hostname);

        if self.dry_run {
            let private_key = keys::private_key_path(hostname, &prefix, &self.config.certs_folder);
            if private_key.exists() {
                info!("[DRY RUN] Would reuse private key {}", private_key.display());
                report.keys_reused += 1;
            } else {
                info!("[DRY RUN] Would write private key to {}", private_key.display());
                report.keys_generated += 1;
            }
            return Ok(());
        }

        let host_keys = keys::provision_keys(
            hostname,
            &prefix,
            &self.config.certs_folder,
            self.provider,
            self.config.keygen.bits,
        )?;

        if host_keys.generated {
            report.keys_generated += 1;
        } else {
            report.keys_reused += 1;
        }
        if !host_keys.public_derived {
            report.public_key_failures.push(hostname.to_string());
        }

        debug!(host = %hostname, public_key = %host_keys.public_key.display(), "Host keys ready");
        Ok(())
    }

    fn distribute_key(&self, hostname: &str, peer: &str) -> Result<()> {
        let from = self.config.host_prefix(hostname);
        let to = self.config.host_prefix(peer);

        if self.dry_run {
            info!(
                "[DRY RUN] Would copy {} -> {}",
                keys::public_key_path(hostname, &from, &self.config.certs_folder).display(),
                keys::public_key_path(hostname, &to, &self.config.certs_folder).display()
            );
            return Ok(());
        }

        keys::copy_public_keys(hostname, &from, &to, &self.config.certs_folder)?;
        Ok(())
    }

    fn write_host_conf(&self, hostname: &str) -> Result<ConfFiles> {
        let prefix = self.config.host_prefix(hostname);

        if self.dry_run {
            let files = ConfFiles::under(&prefix);
            // Render anyway so a bad host table fails the dry run too
            conf::render_racoon_conf(hostname, &self.config.hosts, &self.config.crypto)?;
            conf::render_setkey_conf(hostname, &self.config.hosts, &self.config.crypto)?;
            info!("[DRY RUN] Would write {}", files.racoon.display());
            info!("[DRY RUN] Would write {}", files.setkey.display());
            return Ok(files);
        }

        conf::make_conf(hostname, &self.config.hosts, &prefix, &self.config.crypto)
    }
}
