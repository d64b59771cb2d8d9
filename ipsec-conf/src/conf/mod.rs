// SPDX-License-Identifier: AGPL-3.0-or-later
//! racoon.conf and ipsec-tools.conf generation
//!
//! Both files are rebuilt from scratch on every call. Each host gets one
//! block per peer, where the peers are every other entry of the host table.

mod racoon;
mod setkey;

pub use setkey::Direction;

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{CryptoConfig, HostTable};
use crate::error::{IpsecConfError, Result};

/// racoon.conf location relative to a host prefix
pub const RACOON_CONF: &str = "etc/racoon/racoon.conf";

/// ipsec-tools.conf location relative to a host prefix
pub const SETKEY_CONF: &str = "etc/ipsec-tools.conf";

/// Paths written by [`make_conf`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfFiles {
    pub racoon: PathBuf,
    pub setkey: PathBuf,
}

impl ConfFiles {
    /// Config file locations under `prefix`
    pub fn under<P: AsRef<Path>>(prefix: P) -> Self {
        let prefix = prefix.as_ref();
        Self {
            racoon: prefix.join(RACOON_CONF),
            setkey: prefix.join(SETKEY_CONF),
        }
    }
}

/// Every host except `host`, in table order, paired with its address
pub fn peers<'a>(
    host: &'a str,
    ip_addresses: &'a HostTable,
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    ip_addresses
        .iter()
        .filter(move |(name, _)| name.as_str() != host)
        .map(|(name, ip)| (name.as_str(), ip.as_str()))
}

fn lookup<'a>(host: &str, ip_addresses: &'a HostTable) -> Result<&'a str> {
    ip_addresses
        .get(host)
        .map(String::as_str)
        .ok_or_else(|| IpsecConfError::HostNotFound {
            hostname: host.to_string(),
        })
}

/// Render racoon.conf for `host`
///
/// Keys are expected to be named `<hostname>` and `<hostname>.pub` inside
/// the certificate path.
pub fn render_racoon_conf(
    host: &str,
    ip_addresses: &HostTable,
    crypto: &CryptoConfig,
) -> Result<String> {
    lookup(host, ip_addresses)?;

    let mut out = String::new();
    racoon::write_header(&mut out, crypto);
    for (peer, peer_ip) in peers(host, ip_addresses) {
        racoon::write_remote(&mut out, host, peer_ip, peer, crypto);
    }
    racoon::write_sainfo(&mut out, crypto);
    Ok(out)
}

/// Render ipsec-tools.conf for `host`
pub fn render_setkey_conf(
    host: &str,
    ip_addresses: &HostTable,
    crypto: &CryptoConfig,
) -> Result<String> {
    let host_ip = lookup(host, ip_addresses)?;

    let mut out = String::new();
    setkey::write_header(&mut out);
    for (_, peer_ip) in peers(host, ip_addresses) {
        setkey::write_spd(&mut out, host_ip, peer_ip, Direction::Out, &crypto.policy_level);
        setkey::write_spd(&mut out, peer_ip, host_ip, Direction::In, &crypto.policy_level);
    }
    Ok(out)
}

/// Make the racoon.conf file for `host`
pub fn make_racoon_conf<P: AsRef<Path>>(
    filename: P,
    host: &str,
    ip_addresses: &HostTable,
    crypto: &CryptoConfig,
) -> Result<()> {
    let contents = render_racoon_conf(host, ip_addresses, crypto)?;
    write_conf(filename.as_ref(), &contents)
}

/// Make the ipsec-tools.conf file for `host`
pub fn make_setkey_conf<P: AsRef<Path>>(
    filename: P,
    host: &str,
    ip_addresses: &HostTable,
    crypto: &CryptoConfig,
) -> Result<()> {
    let contents = render_setkey_conf(host, ip_addresses, crypto)?;
    write_conf(filename.as_ref(), &contents)
}

/// Make racoon.conf and ipsec-tools.conf for `host` under `prefix`
pub fn make_conf<P: AsRef<Path>>(
    host: &str,
    ip_addresses: &HostTable,
    prefix: P,
    crypto: &CryptoConfig,
) -> Result<ConfFiles> {
    let files = ConfFiles::under(prefix);

    info!("Writing to {}", files.racoon.display());
    make_racoon_conf(&files.racoon, host, ip_addresses, crypto)?;

    info!("Writing to {}", files.setkey.display());
    make_setkey_conf(&files.setkey, host, ip_addresses, crypto)?;

    Ok(files)
}

fn write_conf(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
