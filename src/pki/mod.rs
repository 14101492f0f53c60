//! Root certificate authority bootstrap
//!
//! Cluster nodes trust each other through a shared root CA that is embedded
//! into every rendered cloud-config. This module generates that CA when the
//! operator did not supply one, and loads the key/certificate text for
//! rendering.
//!
//! The renderer never mutates CA material: it is generated once at startup if
//! absent and read-only afterwards.

use std::path::{Path, PathBuf};

use ::time::{Duration, OffsetDateTime};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use thiserror::Error;
use tracing::info;
use x509_parser::prelude::*;

use crate::{Error, Result};

/// Lifetime of generated root CAs
pub const CA_VALIDITY_YEARS: i64 = 10;

/// File name of the generated CA private key
pub const CA_KEY_FILE: &str = "ca-key.pem";

/// File name of the generated CA certificate
pub const CA_CERT_FILE: &str = "ca.pem";

/// Common name of generated root CAs
pub const CA_COMMON_NAME: &str = "cloud-config-server root CA";

/// Failures while generating, parsing or writing CA material
#[derive(Debug, Error)]
pub enum PkiError {
    /// rcgen could not produce the key pair or the certificate
    #[error("cannot generate root CA {what}: {message}")]
    Generate {
        /// `key` or `certificate`
        what: &'static str,
        /// rcgen message
        message: String,
    },

    /// Text is not a usable certificate or key
    #[error("invalid {what}: {message}")]
    Parse {
        /// Kind of material that was expected
        what: &'static str,
        /// Decoder message
        message: String,
    },

    /// Reading or writing CA files failed
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// DER bytes of the first PEM block in `text` tagged `tag`
pub fn pem_block(text: &str, tag: &str) -> std::result::Result<Vec<u8>, PkiError> {
    let parse_err = |message: String| PkiError::Parse {
        what: "PEM",
        message,
    };
    ::pem::parse_many(text)
        .map_err(|e| parse_err(e.to_string()))?
        .into_iter()
        .find(|block| block.tag() == tag)
        .map(::pem::Pem::into_contents)
        .ok_or_else(|| parse_err(format!("no {tag} block found")))
}

/// Parameters for a self-signed root valid from now for [`CA_VALIDITY_YEARS`]
fn root_ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = params.not_before + Duration::days(365 * CA_VALIDITY_YEARS);
    params
}

/// Subject and validity window of a certificate
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// Start of validity, Unix seconds
    pub not_before: i64,
    /// End of validity, Unix seconds
    pub not_after: i64,
    /// Subject CN, empty when absent
    pub common_name: String,
    /// Basic constraints mark it as a CA
    pub is_ca: bool,
}

impl CertificateInfo {
    /// Read the first `CERTIFICATE` block of PEM text
    pub fn from_pem(text: &str) -> std::result::Result<Self, PkiError> {
        let der = pem_block(text, "CERTIFICATE")?;
        let (_, cert) = X509Certificate::from_der(&der).map_err(|e| PkiError::Parse {
            what: "certificate",
            message: e.to_string(),
        })?;

        let validity = cert.validity();
        let info = Self {
            not_before: validity.not_before.timestamp(),
            not_after: validity.not_after.timestamp(),
            common_name: cert
                .subject()
                .iter_common_name()
                .find_map(|cn| cn.as_str().ok())
                .map(str::to_owned)
                .unwrap_or_default(),
            is_ca: cert.is_ca(),
        };
        Ok(info)
    }

    /// Seconds between `not_before` and `not_after`
    pub fn lifetime_secs(&self) -> i64 {
        self.not_after - self.not_before
    }

    /// Past `not_after`
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc().unix_timestamp() >= self.not_after
    }
}

/// Root CA as PEM text, either freshly generated or read back from disk
#[derive(Clone)]
pub struct CertificateAuthority {
    ca_key_pem: String,
    ca_cert_pem: String,
}

impl CertificateAuthority {
    /// Generate a key pair and a self-signed root certificate
    pub fn new(common_name: &str) -> std::result::Result<Self, PkiError> {
        let key = KeyPair::generate().map_err(|e| PkiError::Generate {
            what: "key",
            message: e.to_string(),
        })?;
        let cert = root_ca_params(common_name)
            .self_signed(&key)
            .map_err(|e| PkiError::Generate {
                what: "certificate",
                message: e.to_string(),
            })?;

        Ok(Self {
            ca_key_pem: key.serialize_pem(),
            ca_cert_pem: cert.pem(),
        })
    }

    /// Accept existing PEM text once both halves parse
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> std::result::Result<Self, PkiError> {
        KeyPair::from_pem(key_pem).map_err(|e| PkiError::Parse {
            what: "CA key",
            message: e.to_string(),
        })?;
        CertificateInfo::from_pem(cert_pem)?;

        Ok(Self {
            ca_key_pem: key_pem.to_owned(),
            ca_cert_pem: cert_pem.to_owned(),
        })
    }

    /// Certificate PEM
    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    /// Private key PEM
    pub fn ca_key_pem(&self) -> &str {
        &self.ca_key_pem
    }

    /// Parsed view of the certificate
    pub fn cert_info(&self) -> std::result::Result<CertificateInfo, PkiError> {
        CertificateInfo::from_pem(&self.ca_cert_pem)
    }

    /// Persist the key (owner-only on unix) and the certificate
    pub fn write(&self, key_path: &Path, cert_path: &Path) -> std::result::Result<(), PkiError> {
        write_file(key_path, &self.ca_key_pem)?;
        write_file(cert_path, &self.ca_cert_pem)
    }
}

#[cfg(unix)]
fn write_file(path: &Path, contents: &str) -> std::result::Result<(), PkiError> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let io_err = |source| PkiError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(io_err)?;
    file.write_all(contents.as_bytes()).map_err(io_err)
}

#[cfg(not(unix))]
fn write_file(path: &Path, contents: &str) -> std::result::Result<(), PkiError> {
    std::fs::write(path, contents).map_err(|source| PkiError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Locations of CA key and certificate files
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaPaths {
    /// Private key path
    pub key: PathBuf,
    /// Certificate path
    pub cert: PathBuf,
}

impl CaPaths {
    /// Standard file names inside a directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            key: dir.join(CA_KEY_FILE),
            cert: dir.join(CA_CERT_FILE),
        }
    }

    /// Returns an error naming the first path that does not exist
    pub fn check_exist(&self) -> Result<()> {
        for path in [&self.cert, &self.key] {
            if !path.is_file() {
                return Err(Error::CaMaterial {
                    path: path.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "file is not ready",
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Make sure a root CA exists in `dir`, generating one if needed
///
/// Existing files are never overwritten. If only one of the two files is
/// present the directory is left alone and an error is returned.
pub fn ensure_root_ca(dir: impl AsRef<Path>) -> Result<CaPaths> {
    let paths = CaPaths::in_dir(dir.as_ref());

    match (paths.key.exists(), paths.cert.exists()) {
        (true, true) => {
            info!(cert = %paths.cert.display(), "using existing root CA");
        }
        (false, false) => {
            info!(dir = %dir.as_ref().display(), "no CA provided, generating root CA");
            std::fs::create_dir_all(dir.as_ref()).map_err(|source| PkiError::Io {
                path: dir.as_ref().to_path_buf(),
                source,
            })?;
            let ca = CertificateAuthority::new(CA_COMMON_NAME)?;
            ca.write(&paths.key, &paths.cert)?;
        }
        _ => {
            paths.check_exist()?;
        }
    }

    Ok(paths)
}

/// CA key and certificate text as embedded into rendered documents
#[derive(Clone, Debug)]
pub struct CaMaterial {
    key_pem: String,
    cert_pem: String,
}

impl CaMaterial {
    /// Wrap already-loaded PEM text
    pub fn new(key_pem: impl Into<String>, cert_pem: impl Into<String>) -> Self {
        Self {
            key_pem: key_pem.into(),
            cert_pem: cert_pem.into(),
        }
    }

    /// Read key and certificate from files
    ///
    /// Content is treated as opaque text; it is not parsed.
    pub fn load(key_path: impl AsRef<Path>, cert_path: impl AsRef<Path>) -> Result<Self> {
        let read = |path: &Path| {
            std::fs::read_to_string(path).map_err(|source| Error::CaMaterial {
                path: path.to_path_buf(),
                source,
            })
        };
        Ok(Self {
            key_pem: read(key_path.as_ref())?,
            cert_pem: read(cert_path.as_ref())?,
        })
    }

    /// Read from standard paths
    pub fn from_paths(paths: &CaPaths) -> Result<Self> {
        Self::load(&paths.key, &paths.cert)
    }

    /// Private key text
    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// Certificate text
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_generated_ca_yields_key_and_certificate_pem() {
        let ca = CertificateAuthority::new("Test CA").expect("CA creation should succeed");
        assert!(ca.ca_cert_pem().contains("BEGIN CERTIFICATE"));
        assert!(ca.ca_key_pem().contains("PRIVATE KEY"));
    }

    #[test]
    fn story_generated_ca_is_a_ten_year_root() {
        let ca = CertificateAuthority::new("Test CA").unwrap();
        let info = ca.cert_info().expect("cert info should parse");
        assert_eq!(info.common_name, "Test CA");
        assert!(info.is_ca);
        assert!(!info.is_expired());
        assert!(info.lifetime_secs() >= (CA_VALIDITY_YEARS * 365 - 1) * 86_400);
    }

    #[test]
    fn story_ca_pem_text_reloads_unchanged() {
        let ca1 = CertificateAuthority::new("Persistent CA").unwrap();
        let ca2 = CertificateAuthority::from_pem(ca1.ca_cert_pem(), ca1.ca_key_pem())
            .expect("saved CA should load");
        assert_eq!(ca1.ca_cert_pem(), ca2.ca_cert_pem());
    }

    #[test]
    fn story_unparseable_ca_halves_are_rejected() {
        let ca = CertificateAuthority::new("Test CA").unwrap();
        assert!(matches!(
            CertificateAuthority::from_pem(ca.ca_cert_pem(), "not a key"),
            Err(PkiError::Parse { what: "CA key", .. })
        ));
        assert!(matches!(
            CertificateAuthority::from_pem("not a cert", ca.ca_key_pem()),
            Err(PkiError::Parse { what: "PEM", .. })
        ));
    }

    #[test]
    fn story_pem_block_requires_matching_tag() {
        let ca = CertificateAuthority::new("Test CA").unwrap();
        assert!(!pem_block(ca.ca_cert_pem(), "CERTIFICATE").unwrap().is_empty());
        assert!(pem_block(ca.ca_key_pem(), "CERTIFICATE").is_err());
        assert!(pem_block("garbage", "CERTIFICATE").is_err());
    }

    #[test]
    fn story_root_ca_is_generated_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ensure_root_ca(dir.path()).expect("CA should be generated");
        assert_eq!(paths, CaPaths::in_dir(dir.path()));

        let first = std::fs::read_to_string(&paths.cert).unwrap();
        let again = ensure_root_ca(dir.path()).unwrap();
        let second = std::fs::read_to_string(&again.cert).unwrap();
        assert_eq!(first, second, "existing CA must not be overwritten");

        let loaded = CertificateAuthority::from_pem(
            &second,
            &std::fs::read_to_string(&again.key).unwrap(),
        );
        assert!(loaded.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn story_generated_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let paths = ensure_root_ca(dir.path()).unwrap();
        let mode = std::fs::metadata(&paths.key).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn story_half_present_ca_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CA_CERT_FILE), "cert").unwrap();
        let err = ensure_root_ca(dir.path()).unwrap_err();
        assert!(err.to_string().contains(CA_KEY_FILE));
        assert!(!dir.path().join(CA_KEY_FILE).exists());
    }

    #[test]
    fn story_ca_material_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CaPaths::in_dir(dir.path());
        std::fs::write(&paths.key, "KEY\n").unwrap();
        std::fs::write(&paths.cert, "CERT\n").unwrap();

        let ca = CaMaterial::from_paths(&paths).unwrap();
        assert_eq!(ca.key_pem(), "KEY\n");
        assert_eq!(ca.cert_pem(), "CERT\n");
    }

    #[test]
    fn story_missing_ca_material_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CaPaths::in_dir(dir.path());
        let err = CaMaterial::from_paths(&paths).unwrap_err();
        assert!(matches!(err, Error::CaMaterial { .. }));
        assert!(err.to_string().contains(CA_KEY_FILE));
    }
}
