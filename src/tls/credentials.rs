//! TLS credential file discovery.
//!
//! Each kind of material is looked up in three places, first hit wins:
//! an explicit file named by an environment variable, the first matching
//! file under `SSL_PATH`, and a conventional file under `./ssl/`.
//! Nothing found is not an error here; the secure socket layer decides
//! later whether missing material matters.

use crate::tls::agent::TlsMaterial;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

pub const SSL_PEM_TRUSTSTORE: &str = "SSL_PEM_TRUSTSTORE";
pub const SSL_PATH: &str = "SSL_PATH";
pub const SSL_PRIVATE_KEYFILE: &str = "SSL_PRIVATE_KEYFILE";
pub const SSL_CLIENT_PEM: &str = "SSL_CLIENT_PEM";
pub const SSL_PKCS12_KEYSTORE: &str = "SSL_PKCS12_KEYSTORE";
pub const SSL_KEYSTORE_PASS_FILE: &str = "SSL_KEYSTORE_PASS_FILE";

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Extension rule for files found under `SSL_PATH`.
#[derive(Debug, Clone, Copy)]
struct ExtRule {
    exts: &'static [&'static str],
    /// Require the extension to end the file name.
    anchored: bool,
}

impl ExtRule {
    fn matches(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.exts.iter().any(|ext| {
            let dotted = format!(".{}", ext);
            if self.anchored {
                name.ends_with(&dotted)
            } else {
                name.contains(&dotted)
            }
        })
    }
}

const CA_RULE: ExtRule = ExtRule {
    exts: &["pem", "cert"],
    anchored: false,
};
const CLIENT_PEM_RULE: ExtRule = ExtRule {
    exts: &["pem", "cert"],
    anchored: true,
};
const KEY_RULE: ExtRule = ExtRule {
    exts: &["key"],
    anchored: true,
};
const PFX_RULE: ExtRule = ExtRule {
    exts: &["p12", "pfx"],
    anchored: false,
};
const PWD_RULE: ExtRule = ExtRule {
    exts: &["pwd", "txt"],
    anchored: false,
};

/// Locates CA, client certificate, key, PKCS#12 and passphrase files.
#[derive(Clone)]
pub struct CredentialFiles {
    lookup: Option<Lookup>,
    base_dir: PathBuf,
}

impl fmt::Debug for CredentialFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFiles")
            .field("enabled", &self.lookup.is_some())
            .field("base_dir", &self.base_dir)
            .finish()
    }
}

impl Default for CredentialFiles {
    fn default() -> Self {
        Self::from_env()
    }
}

impl CredentialFiles {
    /// Discover from the process environment, relative to the working directory.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), ".")
    }

    /// Discover using a custom variable lookup and base directory.
    pub fn from_lookup<F>(lookup: F, base_dir: impl Into<PathBuf>) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Some(Arc::new(lookup)),
            base_dir: base_dir.into(),
        }
    }

    /// A source that never finds anything.
    pub fn none() -> Self {
        Self {
            lookup: None,
            base_dir: PathBuf::new(),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        self.lookup
            .as_ref()
            .and_then(|f| f(key))
            .filter(|v| !v.is_empty())
    }

    fn locate(&self, env_key: &str, rule: ExtRule, fallback: &str) -> Option<PathBuf> {
        self.lookup.as_ref()?;

        let explicit = self.var(env_key).map(PathBuf::from);
        let in_dir = self
            .var(SSL_PATH)
            .and_then(|dir| first_file_in_directory(Path::new(&dir), rule));
        let conventional = Some(self.base_dir.join(fallback));

        [explicit, in_dir, conventional]
            .into_iter()
            .flatten()
            .find(|p| p.is_file())
    }

    pub fn ca_location(&self) -> Option<PathBuf> {
        self.locate(SSL_PEM_TRUSTSTORE, CA_RULE, "ssl/local.pem")
    }

    pub fn pem_location(&self) -> Option<PathBuf> {
        self.locate(SSL_CLIENT_PEM, CLIENT_PEM_RULE, "ssl/local.pem")
    }

    pub fn key_location(&self) -> Option<PathBuf> {
        self.locate(SSL_PRIVATE_KEYFILE, KEY_RULE, "ssl/local.key")
    }

    pub fn pfx_location(&self) -> Option<PathBuf> {
        self.locate(SSL_PKCS12_KEYSTORE, PFX_RULE, "ssl/local.p12")
    }

    pub fn pwd_location(&self) -> Option<PathBuf> {
        self.locate(SSL_KEYSTORE_PASS_FILE, PWD_RULE, "ssl/local.pwd")
    }

    pub fn ca(&self) -> Option<String> {
        self.ca_location().and_then(|p| read_text(&p))
    }

    pub fn cert(&self) -> Option<String> {
        self.pem_location().and_then(|p| read_text(&p))
    }

    pub fn key(&self) -> Option<String> {
        self.key_location().and_then(|p| read_text(&p))
    }

    pub fn pfx(&self) -> Option<Vec<u8>> {
        self.pfx_location().and_then(|p| match fs::read(&p) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "unreadable PKCS#12 keystore");
                None
            }
        })
    }

    /// Passphrase file contents without the trailing line break.
    pub fn passphrase(&self) -> Option<Zeroizing<String>> {
        self.pwd_location()
            .and_then(|p| read_text(&p))
            .map(|s| Zeroizing::new(s.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Everything discoverable, as one bundle.
    pub fn load(&self) -> TlsMaterial {
        TlsMaterial {
            ca: self.ca(),
            cert: self.cert(),
            key: self.key(),
            passphrase: self.passphrase(),
            pfx: self.pfx(),
        }
    }
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable credential file");
            None
        }
    }
}

/// First regular file in `dir` (by name) matching `rule`. A file path is
/// tested directly.
fn first_file_in_directory(dir: &Path, rule: ExtRule) -> Option<PathBuf> {
    if dir.is_file() {
        let name = dir.file_name()?.to_string_lossy();
        return rule.matches(&name).then(|| dir.to_path_buf());
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    files.into_iter().find(|p| {
        p.file_name()
            .map(|n| rule.matches(&n.to_string_lossy()))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(vars: &[(&str, String)], base: &Path) -> CredentialFiles {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        CredentialFiles::from_lookup(move |k| vars.get(k).cloned(), base)
    }

    #[test]
    fn test_nothing_found_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let files = source(&[], dir.path());
        assert!(files.ca_location().is_none());
        let material = files.load();
        assert!(material.ca.is_none());
        assert!(material.pfx.is_none());
        assert!(!material.is_sufficient());
    }

    #[test]
    fn test_conventional_fallback() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("ssl")).unwrap();
        fs::write(dir.path().join("ssl/local.pem"), "CA").unwrap();
        fs::write(dir.path().join("ssl/local.pwd"), "secret\n").unwrap();

        let files = source(&[], dir.path());
        assert_eq!(files.ca().as_deref(), Some("CA"));
        // The same conventional file backs the client certificate.
        assert_eq!(files.cert().as_deref(), Some("CA"));
        assert_eq!(files.passphrase().as_deref().map(|s| s.as_str()), Some("secret"));
        assert!(files.key().is_none());
    }

    #[test]
    fn test_explicit_env_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("trust.crt");
        fs::write(&explicit, "EXPLICIT").unwrap();
        fs::create_dir(dir.path().join("ssl")).unwrap();
        fs::write(dir.path().join("ssl/local.pem"), "FALLBACK").unwrap();

        let files = source(
            &[(SSL_PEM_TRUSTSTORE, explicit.display().to_string())],
            dir.path(),
        );
        assert_eq!(files.ca().as_deref(), Some("EXPLICIT"));
    }

    #[test]
    fn test_ssl_path_directory_scan() {
        let dir = tempfile::tempdir().unwrap();
        let ssl_dir = dir.path().join("certs");
        fs::create_dir(&ssl_dir).unwrap();
        fs::write(ssl_dir.join("client.KEY"), "KEY").unwrap();
        fs::write(ssl_dir.join("bundle.p12"), [0u8, 1, 2]).unwrap();
        fs::write(ssl_dir.join("notes.key.bak"), "NOPE").unwrap();

        let files = source(&[(SSL_PATH, ssl_dir.display().to_string())], dir.path());
        assert_eq!(files.key().as_deref(), Some("KEY"));
        assert_eq!(files.pfx(), Some(vec![0u8, 1, 2]));
    }

    #[test]
    fn test_missing_explicit_file_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("ssl")).unwrap();
        fs::write(dir.path().join("ssl/local.key"), "LOCAL").unwrap();

        let files = source(
            &[(SSL_PRIVATE_KEYFILE, "/does/not/exist.key".to_string())],
            dir.path(),
        );
        assert_eq!(files.key().as_deref(), Some("LOCAL"));
    }

    #[test]
    fn test_none_source() {
        let files = CredentialFiles::none();
        assert!(files.pwd_location().is_none());
        assert!(files.load().passphrase.is_none());
    }

    #[test]
    fn test_ext_rules() {
        assert!(CA_RULE.matches("chain.pem.old"));
        assert!(!CLIENT_PEM_RULE.matches("chain.pem.old"));
        assert!(CLIENT_PEM_RULE.matches("CLIENT.CERT"));
        assert!(PWD_RULE.matches("pass.txt"));
        assert!(!KEY_RULE.matches("key.pem"));
    }
}
