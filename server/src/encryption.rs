use std::io::{Cursor, Read as _, Write as _};
use std::iter;
use std::sync::Arc;

use age::x25519::Identity;
use age::{Decryptor, Encryptor};
use color_eyre::eyre::{eyre, Result};

/// Seal a plaintext into an opaque, authenticated string.
///
/// age encryption detects any tampering on open, so a sealed value round-
/// tripped through an untrusted client either opens to the original
/// plaintext or fails outright.
pub async fn seal(plaintext: &str, key: &Arc<Identity>) -> Result<String> {
    let data = plaintext.as_bytes().to_vec();
    let key = key.clone();

    // age is CPU-bound, keep it off the async workers
    let sealed = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
        let recipient = key.to_public();
        let recipients = iter::once(&recipient as &dyn age::Recipient);
        let encryptor = Encryptor::with_recipients(recipients)
            .map_err(|e| eyre!("Failed to create encryptor: {}", e))?;

        let mut sealed = vec![];
        let mut writer = encryptor
            .wrap_output(&mut sealed)
            .map_err(|e| eyre!("Failed to start encryption: {}", e))?;
        writer
            .write_all(&data)
            .map_err(|e| eyre!("Failed to write plaintext: {}", e))?;
        writer
            .finish()
            .map_err(|e| eyre!("Failed to finish encryption: {}", e))?;

        Ok(sealed)
    })
    .await??;

    Ok(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        &sealed,
    ))
}

/// Open a value produced by [`seal`]. Fails on any corruption or on a value
/// sealed under a different key.
pub async fn open(sealed: &str, key: &Arc<Identity>) -> Result<String> {
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, sealed)
        .map_err(|e| eyre!("Failed to decode sealed value: {}", e))?;
    let key = key.clone();

    let plaintext = tokio::task::spawn_blocking(move || -> Result<String> {
        let decryptor = Decryptor::new(Cursor::new(bytes))
            .map_err(|e| eyre!("Failed to create decryptor: {}", e))?;

        let identities = iter::once(key.as_ref() as &dyn age::Identity);
        let mut reader = decryptor
            .decrypt(identities)
            .map_err(|e| eyre!("Failed to decrypt: {}", e))?;

        let mut plaintext = String::new();
        reader
            .read_to_string(&mut plaintext)
            .map_err(|e| eyre!("Failed to read decrypted data: {}", e))?;

        Ok(plaintext)
    })
    .await??;

    Ok(plaintext)
}
