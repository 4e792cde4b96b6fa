//! Integration tests for keychain storage.

use trash_analyzer::middleware::keyring;

#[test]
#[ignore] // Requires actual keychain access
fn test_keyring_set_and_get() {
    let service = "trash-analyzer-test";
    let user = "gemini";

    keyring::set_password(service, user, "g-secret").unwrap();
    let secret = keyring::get_password(service, user).unwrap();
    assert_eq!(secret.as_str(), "g-secret");

    let _ = keyring::delete_password(service, user);
}

#[test]
#[ignore] // Requires actual keychain access
fn test_keyring_update() {
    let service = "trash-analyzer-test";
    let user = "openai";

    keyring::set_password(service, user, "first").unwrap();
    keyring::set_password(service, user, "second").unwrap();
    assert_eq!(keyring::get_password(service, user).unwrap().as_str(), "second");

    let _ = keyring::delete_password(service, user);
}

#[test]
#[ignore] // Requires actual keychain access
fn test_keyring_delete_then_lookup() {
    let service = "trash-analyzer-test";
    let user = "groq";

    keyring::set_password(service, user, "k1").unwrap();
    keyring::delete_password(service, user).unwrap();
    assert!(keyring::lookup_password(service, user).unwrap().is_none());
}

#[test]
fn test_keyring_get_nonexistent() {
    let result = keyring::get_password("trash-analyzer-test", "nonexistent-provider");
    assert!(result.is_err(), "Should fail to get nonexistent password");
}
