//! Provider API keys: loading, lifetime and lookup.
//!
//! Keys are read once at start-up from a local dotenv-style file that is
//! kept out of version control:
//!
//! ```text
//! GEMINI_API_KEY=...
//! OPENAI_API_KEY=...
//! GROQ_API_KEY=...
//! ```
//!
//! Unquoted and double-quoted values expand `$VAR` references, so a key
//! containing `$` must be wrapped in single quotes.
//!
//! Entries missing from the file fall back to environment variables of the
//! same name and then to the OS keychain. The resulting [`Credentials`] are
//! installed process-wide with [`install`] and never change afterwards.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::middleware::keyring::{self, KEYRING_SERVICE};
use crate::providers::ProviderId;

/// File name looked up in the working directory and the config directory.
pub const CREDENTIALS_FILE: &str = "credentials.env";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credentials file {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed credentials file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("credentials are already installed")]
    AlreadyInstalled,
}

/// A provider API key.
///
/// `Debug` never shows the value and the memory is zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key. Only call this when building a request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Where a key was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    File,
    Environment,
    Keyring,
    Explicit,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::File => "credentials file",
            Self::Environment => "environment",
            Self::Keyring => "keychain",
            Self::Explicit => "explicit",
        })
    }
}

#[derive(Debug, Clone)]
struct Slot {
    key: ApiKey,
    source: KeySource,
}

/// Which sources [`Credentials::load`] consults, in order.
#[derive(Debug, Clone)]
pub struct CredentialSources {
    pub file: Option<PathBuf>,
    pub env: bool,
    pub keyring: bool,
}

impl Default for CredentialSources {
    fn default() -> Self {
        Self {
            file: default_credentials_path(),
            env: true,
            keyring: true,
        }
    }
}

impl CredentialSources {
    /// Only the given file; no environment or keychain fallback.
    pub fn file_only(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            env: false,
            keyring: false,
        }
    }
}

/// `./credentials.env` if it exists, else the per-user config location.
pub fn default_credentials_path() -> Option<PathBuf> {
    let local = PathBuf::from(CREDENTIALS_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir().map(|dir| dir.join("trash-analyzer").join(CREDENTIALS_FILE))
}

/// One optional key per provider.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    gemini: Option<Slot>,
    openai: Option<Slot>,
    groq: Option<Slot>,
}

impl Credentials {
    /// Load keys from the configured sources.
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load(sources: &CredentialSources) -> Result<Self, CredentialError> {
        let mut creds = match &sources.file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        for id in ProviderId::ALL {
            if creds.is_configured(id) {
                continue;
            }
            if sources.env
                && let Ok(value) = std::env::var(id.env_var())
            {
                let value = Zeroizing::new(value);
                creds.insert(id, &value, KeySource::Environment);
            }
            if sources.keyring && !creds.is_configured(id) {
                match keyring::lookup_password(KEYRING_SERVICE, id.slug()) {
                    Ok(Some(value)) => creds.insert(id, &value, KeySource::Keyring),
                    Ok(None) => {}
                    Err(e) => tracing::debug!(provider = id.slug(), error = %e, "keychain unavailable"),
                }
            }
        }

        for id in ProviderId::ALL {
            if let Some(source) = creds.source(id) {
                tracing::debug!(provider = id.slug(), %source, "API key loaded");
            }
        }
        Ok(creds)
    }

    /// Parse a credentials file. A missing file yields empty credentials.
    pub fn from_file(path: &Path) -> Result<Self, CredentialError> {
        let contents = match std::fs::read(path) {
            Ok(bytes) => Zeroizing::new(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no credentials file");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CredentialError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let mut creds = Self::default();
        for item in dotenvy::from_read_iter(contents.as_slice()) {
            let (name, value) = item.map_err(|source| CredentialError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            let value = Zeroizing::new(value);
            if let Some(id) = ProviderId::from_env_var(&name) {
                creds.insert(id, &value, KeySource::File);
            }
        }
        Ok(creds)
    }

    /// Set a key in code. Empty keys are ignored.
    pub fn with_key(mut self, provider: ProviderId, key: &str) -> Self {
        self.insert(provider, key, KeySource::Explicit);
        self
    }

    fn insert(&mut self, provider: ProviderId, key: &str, source: KeySource) {
        if key.trim().is_empty() {
            return;
        }
        *self.slot_mut(provider) = Some(Slot {
            key: ApiKey::new(key),
            source,
        });
    }

    fn slot(&self, provider: ProviderId) -> Option<&Slot> {
        match provider {
            ProviderId::Gemini => self.gemini.as_ref(),
            ProviderId::OpenAi => self.openai.as_ref(),
            ProviderId::Groq => self.groq.as_ref(),
        }
    }

    fn slot_mut(&mut self, provider: ProviderId) -> &mut Option<Slot> {
        match provider {
            ProviderId::Gemini => &mut self.gemini,
            ProviderId::OpenAi => &mut self.openai,
            ProviderId::Groq => &mut self.groq,
        }
    }

    /// Typed lookup; `None` selects the default provider (Gemini).
    pub fn get(&self, provider: Option<ProviderId>) -> Option<&ApiKey> {
        self.slot(provider.unwrap_or_default()).map(|s| &s.key)
    }

    /// Look up a key by provider name, ignoring case.
    ///
    /// `None` means the default provider. An unrecognized name, or a
    /// recognized provider without a key, yields `None`.
    pub fn get_api_key(&self, provider: Option<&str>) -> Option<&ApiKey> {
        match provider {
            None => self.get(None),
            Some(name) => self.get(Some(ProviderId::parse(name)?)),
        }
    }

    pub fn is_configured(&self, provider: ProviderId) -> bool {
        self.slot(provider).is_some()
    }

    pub fn source(&self, provider: ProviderId) -> Option<KeySource> {
        self.slot(provider).map(|s| s.source)
    }
}

static CREDENTIALS: OnceLock<Credentials> = OnceLock::new();

/// Install the process-wide credentials. Only the first call succeeds.
pub fn install(credentials: Credentials) -> Result<&'static Credentials, CredentialError> {
    let mut credentials = Some(credentials);
    let installed = CREDENTIALS.get_or_init(|| credentials.take().unwrap_or_default());
    if credentials.is_some() {
        return Err(CredentialError::AlreadyInstalled);
    }
    Ok(installed)
}

/// The installed credentials, if any.
pub fn global() -> Option<&'static Credentials> {
    CREDENTIALS.get()
}

/// Resolve a provider name to its key using the installed credentials.
///
/// Absent or `"gemini"` (any case) gives the Gemini key; `"openai"` and
/// `"groq"` give theirs; anything else gives `None`.
pub fn get_api_key(provider: Option<&str>) -> Option<&'static ApiKey> {
    global()?.get_api_key(provider)
}
