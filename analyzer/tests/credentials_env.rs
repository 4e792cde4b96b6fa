//! Environment fallback. Kept in its own test binary because it mutates
//! process environment variables.

use std::io::Write;

use trash_analyzer::middleware::credentials::{CredentialSources, Credentials, KeySource};
use trash_analyzer::providers::ProviderId;

#[test]
fn file_wins_over_environment_and_environment_fills_gaps() {
    // SAFETY: this is the only test in this binary, so nothing else reads
    // the environment concurrently.
    unsafe {
        std::env::set_var("GEMINI_API_KEY", "env-gemini");
        std::env::set_var("GROQ_API_KEY", "env-groq");
        std::env::remove_var("OPENAI_API_KEY");
    }

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "GEMINI_API_KEY=file-gemini").unwrap();

    let sources = CredentialSources {
        file: Some(file.path().to_path_buf()),
        env: true,
        keyring: false,
    };
    let creds = Credentials::load(&sources).unwrap();

    assert_eq!(creds.get_api_key(None).unwrap().expose(), "file-gemini");
    assert_eq!(creds.source(ProviderId::Gemini), Some(KeySource::File));
    assert_eq!(creds.get_api_key(Some("groq")).unwrap().expose(), "env-groq");
    assert_eq!(creds.source(ProviderId::Groq), Some(KeySource::Environment));
    assert!(creds.get_api_key(Some("openai")).is_none());

    let without_env = Credentials::load(&CredentialSources::file_only(file.path())).unwrap();
    assert!(without_env.get_api_key(Some("groq")).is_none());
}
