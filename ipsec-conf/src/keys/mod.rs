// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-host key provisioning and distribution
//!
//! Keys live under `<prefix>/<certs_folder>/<hostname>` (private) and
//! `<prefix>/<certs_folder>/<hostname>.pub` (public).

pub(crate) mod plainrsa;

pub use plainrsa::{
    make_plainrsa_private, make_plainrsa_public, parse_public_key, KeyProvider, PlainRsaGen,
    DEFAULT_KEY_BITS,
};

use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::validate_hostname;
use crate::error::Result;

/// Outcome of provisioning one host's keypair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostKeys {
    /// Private key path
    pub private_key: PathBuf,
    /// Public key path
    pub public_key: PathBuf,
    /// Whether the private key was created by this call
    pub generated: bool,
    /// Whether a public key could be derived from the private key
    pub public_derived: bool,
}

/// Private key path for `hostname`
pub fn private_key_path(hostname: &str, prefix: &Path, certs_folder: &Path) -> PathBuf {
    prefix.join(certs_folder).join(hostname)
}

/// Public key path for `hostname`
pub fn public_key_path(hostname: &str, prefix: &Path, certs_folder: &Path) -> PathBuf {
    prefix.join(certs_folder).join(format!("{}.pub", hostname))
}

/// Make RSA public and private keys for a host
///
/// An existing private key is always reused. The public key is derived again
/// on every call.
///
/// # Returns
///
/// The path of the public key file
pub fn make_keys<P, C>(
    hostname: &str,
    prefix: P,
    certs_folder: C,
    provider: &dyn KeyProvider,
    bits: u32,
) -> Result<PathBuf>
where
    P: AsRef<Path>,
    C: AsRef<Path>,
{
    provision_keys(hostname, prefix.as_ref(), certs_folder.as_ref(), provider, bits)
        .map(|keys| keys.public_key)
}

/// Same as [`make_keys`] but reports what happened
pub fn provision_keys(
    hostname: &str,
    prefix: &Path,
    certs_folder: &Path,
    provider: &dyn KeyProvider,
    bits: u32,
) -> Result<HostKeys> {
    validate_hostname(hostname)?;
    let private_key = private_key_path(hostname, prefix, certs_folder);
    let public_key = public_key_path(hostname, prefix, certs_folder);

    for path in [&private_key, &public_key] {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
    }

    let generated = if private_key.exists() {
        info!("Using existing private key {}", private_key.display());
        false
    } else {
        info!("Writing private key to {}", private_key.display());
        provider.generate(&private_key, bits)?;
        true
    };

    info!("Writing public key to {}", public_key.display());
    let public_derived = make_plainrsa_public(&private_key, &public_key)?;
    if !public_derived {
        warn!(
            host = %hostname,
            path = %private_key.display(),
            "Private key has no PUB line, public key not written"
        );
    }

    restrict_to_owner(&private_key)?;

    Ok(HostKeys {
        private_key,
        public_key,
        generated,
        public_derived,
    })
}

/// Copy a host's public key from one prefix to another
///
/// Permissions and access/modification times follow the source file. Copying
/// a key onto itself fails with [`io::ErrorKind::InvalidInput`] and leaves
/// the file untouched.
///
/// # Returns
///
/// The destination path
pub fn copy_public_keys<P, Q, C>(
    hostname: &str,
    prefix: P,
    prefix2: Q,
    certs_folder: C,
) -> Result<PathBuf>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    C: AsRef<Path>,
{
    validate_hostname(hostname)?;
    let certs_folder = certs_folder.as_ref();
    let src = public_key_path(hostname, prefix.as_ref(), certs_folder);
    let dst = public_key_path(hostname, prefix2.as_ref(), certs_folder);

    info!("Copying {} -> {}", src.display(), dst.display());

    let metadata = fs::metadata(&src)?;
    if let Some(dir) = dst.parent() {
        fs::create_dir_all(dir)?;
    }
    if dst.exists() && fs::canonicalize(&src)? == fs::canonicalize(&dst)? {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} and {} are the same file", src.display(), dst.display()),
        )
        .into());
    }
    fs::copy(&src, &dst)?;

    let times = FileTimes::new()
        .set_accessed(metadata.accessed()?)
        .set_modified(metadata.modified()?);
    File::open(&dst)?.set_times(times)?;

    Ok(dst)
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::plainrsa::tests::{FakeProvider, PRIVATE_KEY_FIXTURE};
    use super::*;
    use crate::config::DEFAULT_CERTS_FOLDER;
    use crate::error::IpsecConfError;
    use tempfile::tempdir;

    #[test]
    fn test_key_paths() {
        let prefix = Path::new("/srv/alpha");
        let certs = Path::new(DEFAULT_CERTS_FOLDER);
        assert_eq!(
            private_key_path("alpha", prefix, certs),
            PathBuf::from("/srv/alpha/etc/racoon/certs/alpha")
        );
        assert_eq!(
            public_key_path("alpha", prefix, certs),
            PathBuf::from("/srv/alpha/etc/racoon/certs/alpha.pub")
        );
    }

    #[test]
    fn test_make_keys_generates_once() {
        let temp_dir = tempdir().unwrap();
        let provider = FakeProvider::default();

        let public = make_keys("alpha", temp_dir.path(), DEFAULT_CERTS_FOLDER, &provider, 1024)
            .unwrap();
        assert_eq!(provider.calls.get(), 1);
        assert_eq!(
            public,
            temp_dir.path().join("etc/racoon/certs/alpha.pub")
        );
        assert_eq!(
            fs::read_to_string(&public).unwrap(),
            ": PUB 0sAwEAAc5Wq1Lw8pQoN3p"
        );
    }

    #[test]
    fn test_make_keys_reuses_private_key() {
        let temp_dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let certs = Path::new(DEFAULT_CERTS_FOLDER);

        let first = provision_keys("alpha", temp_dir.path(), certs, &provider, 1024).unwrap();
        assert!(first.generated);
        let mtime = fs::metadata(&first.private_key).unwrap().modified().unwrap();

        // Remove the public key so the second call has to write it again
        fs::remove_file(&first.public_key).unwrap();

        let second = provision_keys("alpha", temp_dir.path(), certs, &provider, 1024).unwrap();
        assert!(!second.generated);
        assert!(second.public_derived);
        assert_eq!(provider.calls.get(), 1);
        assert_eq!(
            fs::metadata(&second.private_key).unwrap().modified().unwrap(),
            mtime
        );
        assert_eq!(
            fs::read_to_string(&second.public_key).unwrap(),
            ": PUB 0sAwEAAc5Wq1Lw8pQoN3p"
        );
        assert_eq!(fs::read_to_string(&second.private_key).unwrap(), PRIVATE_KEY_FIXTURE);
    }

    #[test]
    fn test_make_keys_without_pub_line() {
        let temp_dir = tempdir().unwrap();
        let certs = Path::new(DEFAULT_CERTS_FOLDER);
        let private = private_key_path("alpha", temp_dir.path(), certs);
        fs::create_dir_all(private.parent().unwrap()).unwrap();
        fs::write(&private, ": RSA\t{\n\t}\n").unwrap();

        let provider = FakeProvider::default();
        let keys = provision_keys("alpha", temp_dir.path(), certs, &provider, 1024).unwrap();
        assert!(!keys.generated);
        assert!(!keys.public_derived);
        assert!(!keys.public_key.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_make_keys_restricts_private_key() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let keys = provision_keys(
            "alpha",
            temp_dir.path(),
            Path::new(DEFAULT_CERTS_FOLDER),
            &provider,
            1024,
        )
        .unwrap();

        let mode = fs::metadata(&keys.private_key).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_copy_public_keys() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let provider = FakeProvider::default();

        let src = make_keys("alpha", source.path(), DEFAULT_CERTS_FOLDER, &provider, 1024)
            .unwrap();
        let dst = copy_public_keys("alpha", source.path(), dest.path(), DEFAULT_CERTS_FOLDER)
            .unwrap();

        assert_eq!(dst, dest.path().join("etc/racoon/certs/alpha.pub"));
        assert_eq!(fs::read(&src).unwrap(), fs::read(&dst).unwrap());
        assert_eq!(
            fs::metadata(&src).unwrap().modified().unwrap(),
            fs::metadata(&dst).unwrap().modified().unwrap()
        );
    }

    #[test]
    fn test_copy_public_keys_same_file() {
        let temp_dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let public = make_keys("alpha", temp_dir.path(), DEFAULT_CERTS_FOLDER, &provider, 1024)
            .unwrap();
        let before = fs::read(&public).unwrap();

        let result =
            copy_public_keys("alpha", temp_dir.path(), temp_dir.path(), DEFAULT_CERTS_FOLDER);
        match result {
            Err(IpsecConfError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::InvalidInput),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
        assert_eq!(fs::read(&public).unwrap(), before);
    }

    #[test]
    fn test_copy_public_keys_same_file_through_other_path() {
        let temp_dir = tempdir().unwrap();
        let provider = FakeProvider::default();
        let public = make_keys("alpha", temp_dir.path(), DEFAULT_CERTS_FOLDER, &provider, 1024)
            .unwrap();
        let before = fs::read(&public).unwrap();

        // Same directory, spelled differently
        let other = temp_dir.path().join("etc").join("..");
        let result = copy_public_keys("alpha", temp_dir.path(), &other, DEFAULT_CERTS_FOLDER);
        assert!(matches!(result, Err(IpsecConfError::Io(_))));
        assert_eq!(fs::read(&public).unwrap(), before);
    }

    #[test]
    fn test_copy_public_keys_overwrites_destination() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let provider = FakeProvider::default();

        let src = make_keys("alpha", source.path(), DEFAULT_CERTS_FOLDER, &provider, 1024)
            .unwrap();
        let stale = public_key_path("alpha", dest.path(), Path::new(DEFAULT_CERTS_FOLDER));
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, ": PUB 0sStaleKeyFromAnEarlierRunThatIsLonger").unwrap();

        let dst = copy_public_keys("alpha", source.path(), dest.path(), DEFAULT_CERTS_FOLDER)
            .unwrap();
        assert_eq!(dst, stale);
        assert_eq!(fs::read(&src).unwrap(), fs::read(&dst).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_public_keys_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let provider = FakeProvider::default();

        let src = make_keys("alpha", source.path(), DEFAULT_CERTS_FOLDER, &provider, 1024)
            .unwrap();
        fs::set_permissions(&src, fs::Permissions::from_mode(0o640)).unwrap();

        let dst = copy_public_keys("alpha", source.path(), dest.path(), DEFAULT_CERTS_FOLDER)
            .unwrap();
        let mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_copy_public_keys_rejects_bad_hostname() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let result = copy_public_keys("../alpha", source.path(), dest.path(), DEFAULT_CERTS_FOLDER);
        assert!(matches!(result, Err(IpsecConfError::InvalidConfig { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_provision_keys_rejects_bad_hostname() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempdir().unwrap();
        let prefix = temp_dir.path().join("p");
        let victim = temp_dir.path().join("victim.txt");
        fs::write(&victim, "not a key").unwrap();
        fs::set_permissions(&victim, fs::Permissions::from_mode(0o644)).unwrap();

        let provider = FakeProvider::default();
        let result = provision_keys(
            "../../../../victim.txt",
            &prefix,
            Path::new(DEFAULT_CERTS_FOLDER),
            &provider,
            1024,
        );
        assert!(matches!(result, Err(IpsecConfError::InvalidConfig { .. })));
        assert_eq!(provider.calls.get(), 0);
        assert!(!prefix.exists());
        let mode = fs::metadata(&victim).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_copy_public_keys_missing_source() {
        let source = tempdir().unwrap();
        let dest = tempdir().unwrap();
        let result = copy_public_keys("alpha", source.path(), dest.path(), DEFAULT_CERTS_FOLDER);
        assert!(matches!(result, Err(IpsecConfError::Io(_))));
    }
}
