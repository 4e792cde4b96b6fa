//! OS keychain access for provider API keys.
//!
//! Uses the `keyring` crate to provide a cross-platform interface to:
//! - macOS: Keychain
//! - Linux: Secret Service (GNOME Keyring / KWallet)
//! - Windows: Credential Manager

use anyhow::Result;
use zeroize::Zeroizing;

/// Keychain service name under which every provider key is filed.
pub const KEYRING_SERVICE: &str = "trash-analyzer";

/// Store a password in the OS keychain.
pub fn set_password(service: &str, user: &str, secret: &str) -> Result<()> {
    let entry = keyring::Entry::new(service, user)?;
    entry.set_password(secret)?;
    Ok(())
}

/// Retrieve a password from the OS keychain.
pub fn get_password(service: &str, user: &str) -> Result<Zeroizing<String>> {
    let entry = keyring::Entry::new(service, user)?;
    Ok(Zeroizing::new(entry.get_password()?))
}

/// Like [`get_password`], but a missing entry is `Ok(None)`.
pub fn lookup_password(service: &str, user: &str) -> Result<Option<Zeroizing<String>>> {
    let entry = keyring::Entry::new(service, user)?;
    match entry.get_password() {
        Ok(secret) => Ok(Some(Zeroizing::new(secret))),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Delete a password from the OS keychain.
pub fn delete_password(service: &str, user: &str) -> Result<()> {
    let entry = keyring::Entry::new(service, user)?;
    entry.delete_credential()?;
    Ok(())
}
