//! Certificate provisioning for the gateway's TLS listener.
//!
//! A self-signed certificate and its key are generated on first use and
//! stored as a single PEM file under `<data_dir>/ssl/`. Later starts reuse
//! the stored file, so clients can pin it across restarts.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use {thiserror::Error, tracing::info};

const CERTIFICATE_DIR: &str = "ssl";
const CERTIFICATE_FILE: &str = "tiller.pem";

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate storage error: {0}")]
    Io(#[from] io::Error),
    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),
}

/// Hands out the path to the gateway's PEM file, creating it if absent.
pub struct CertificateProvider {
    dir: PathBuf,
}

impl CertificateProvider {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join(CERTIFICATE_DIR),
        }
    }

    /// Path to a PEM file containing the certificate followed by its key.
    ///
    /// Generates a self-signed pair on first use; afterwards the stored
    /// file is returned as-is.
    pub fn certificate_path(&self) -> Result<PathBuf, CertificateError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(CERTIFICATE_FILE);
        if !path.exists() {
            let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;
            let mut pem = certified.cert.pem();
            pem.push_str(&certified.key_pair.serialize_pem());
            fs::write(&path, pem)?;
            info!(path = %path.display(), "generated self-signed certificate");
        }
        Ok(path)
    }
}
