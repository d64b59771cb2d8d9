// SPDX-License-Identifier: AGPL-3.0-or-later
//! ipsec-conf: IPSec configuration generator for racoon and ipsec-tools
//!
//! Given a table of hostnames and IP addresses, ipsec-conf produces for
//! every host the files a host-to-host IPSec mesh needs.
//!
//! # Features
//!
//! * **Keys:** plain RSA keypairs for racoon via `plainrsa-gen`, generated once and reused
//! * **Distribution:** every host's public key copied into each peer's certs directory
//! * **racoon.conf:** one `remote` block per peer plus a shared `sainfo anonymous` block
//! * **ipsec-tools.conf:** an inbound and outbound ESP+AH transport policy per peer

pub mod conf;
pub mod config;
pub mod error;
pub mod keys;
pub mod provision;

pub use config::{Config, CryptoConfig, HostTable};
pub use error::{IpsecConfError, Result};
pub use provision::{ProvisionReport, Provisioner};
