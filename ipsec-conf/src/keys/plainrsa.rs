// SPDX-License-Identifier: AGPL-3.0-or-later
//! racoon `plain_rsa` key handling
//!
//! Private keys come from an external generator (normally `plainrsa-gen`).
//! The public half is the `# : PUB <base64>` comment line the generator
//! places at the top of the private key file.

use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::error::{IpsecConfError, Result};

/// Default RSA modulus size
pub const DEFAULT_KEY_BITS: u32 = 4096;

/// Source of private key files.
///
/// Everything else in the crate only needs a file to appear at `path`, so
/// tests can swap the external tool for an in-process fake.
pub trait KeyProvider {
    /// Create a private key of `bits` bits at `path`
    fn generate(&self, path: &Path, bits: u32) -> Result<()>;
}

/// Key provider backed by the `plainrsa-gen` command line tool
#[derive(Debug, Clone)]
pub struct PlainRsaGen {
    program: String,
}

impl PlainRsaGen {
    /// Create a provider that runs `program` instead of `plainrsa-gen`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for PlainRsaGen {
    fn default() -> Self {
        Self::new("plainrsa-gen")
    }
}

impl KeyProvider for PlainRsaGen {
    fn generate(&self, path: &Path, bits: u32) -> Result<()> {
        info!(
            "Executing: {} -b {} -f {}",
            self.program,
            bits,
            path.display()
        );

        let status = Command::new(&self.program)
            .arg("-b")
            .arg(bits.to_string())
            .arg("-f")
            .arg(path)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| IpsecConfError::KeyGeneration {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        // Exit status is advisory; callers read the key file afterwards.
        if !status.success() {
            warn!(program = %self.program, %status, "Key generator exited unsuccessfully");
        }

        Ok(())
    }
}

/// Create an RSA private key at `filename` using `plainrsa-gen`
pub fn make_plainrsa_private<P: AsRef<Path>>(filename: P, bits: u32) -> Result<()> {
    PlainRsaGen::default().generate(filename.as_ref(), bits)
}

/// Extract the public key from the text of a private key file.
///
/// Returns the remainder of the first line made of exactly four
/// whitespace separated words whose third word is `PUB`, with the leading
/// word dropped and the rest joined by single spaces.
pub fn parse_public_key(private_key: &str) -> Option<String> {
    private_key.lines().find_map(|line| {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() == 4 && words[2] == "PUB" {
            Some(words[1..].join(" "))
        } else {
            None
        }
    })
}

/// Create an RSA public key file from a private key file
///
/// # Returns
///
/// `true` if a `PUB` line was found and the public key written. When no such
/// line exists the public key file is left untouched and `false` is returned.
pub fn make_plainrsa_public<P, Q>(private_filename: P, public_filename: Q) -> Result<bool>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let private_filename = private_filename.as_ref();
    let contents = std::fs::read_to_string(private_filename)?;

    match parse_public_key(&contents) {
        Some(public_key) => {
            std::fs::write(public_filename.as_ref(), public_key)?;
            Ok(true)
        }
        None => {
            debug!(path = %private_filename.display(), "No PUB line in private key");
            Ok(false)
        }
    }
}
