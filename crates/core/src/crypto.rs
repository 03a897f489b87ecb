use aes::{Aes128, Aes256};
use base64::{Engine, prelude::BASE64_STANDARD};
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::Deserialize;
use tracing::debug;

use crate::errors::DecryptError;

/// aes block size in bytes. cbc without padding only accepts multiples of it.
pub const BLOCK_SIZE: usize = 16;

const ENVELOPE_KEY_LEN: usize = 32;

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// json envelope produced by cryptojs when encrypting with a passphrase.
#[derive(Debug, Deserialize)]
struct CryptoJsEnvelope {
    ct: String,
    iv: String,
    s: String,
}

/// decrypts a base64 payload with `key` using aes-cbc and no padding.
///
/// raw payloads are decrypted with aes-128, `key` as the cipher key and a zero iv.
/// payloads that decode to a cryptojs envelope (`{"ct","iv","s"}`) use `key` as the
/// passphrase instead; key and iv are derived from it with `EVP_BytesToKey`.
///
/// the returned bytes are the plaintext as-is, including any trailing padding the
/// encoder may have left in the last block.
pub fn decrypt(payload: &str, key: &[u8]) -> Result<Vec<u8>, DecryptError> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let raw = BASE64_STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|source| DecryptError::Base64 {
            len: payload.len(),
            source,
        })?;

    if let Some(envelope) = parse_envelope(&raw) {
        debug!(len = raw.len(), "payload is a cryptojs envelope");
        return decrypt_envelope(&envelope, key, raw.len());
    }

    decrypt_raw(&raw, key)
}

/// decrypts already decoded ciphertext with aes-128-cbc, zero iv, no padding.
pub fn decrypt_raw(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, DecryptError> {
    decrypt_cbc::<Aes128CbcDec>(ciphertext, key, &[0u8; BLOCK_SIZE])
}

/// inverse of [`decrypt_raw`], returning base64.
///
/// `plaintext` must already be block aligned; nothing is padded.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<String, DecryptError> {
    let len = plaintext.len();
    if len % BLOCK_SIZE != 0 {
        return Err(DecryptError::Misaligned { len });
    }

    let cipher = Aes128CbcEnc::new_from_slices(key, &[0u8; BLOCK_SIZE]).map_err(|_| {
        DecryptError::InvalidKey {
            len,
            key_len: key.len(),
        }
    })?;

    let mut buf = plaintext.to_vec();
    let ciphertext = cipher
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|_| DecryptError::Cipher { len })?;

    Ok(BASE64_STANDARD.encode(ciphertext))
}

fn decrypt_cbc<C>(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>, DecryptError>
where
    C: KeyIvInit + BlockDecryptMut,
{
    let len = ciphertext.len();
    if len % BLOCK_SIZE != 0 {
        return Err(DecryptError::Misaligned { len });
    }

    let cipher = C::new_from_slices(key, iv).map_err(|_| DecryptError::InvalidKey {
        len,
        key_len: key.len(),
    })?;

    let mut buf = ciphertext.to_vec();
    let plaintext = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| DecryptError::Cipher { len })?;

    Ok(plaintext.to_vec())
}

fn parse_envelope(raw: &[u8]) -> Option<CryptoJsEnvelope> {
    if raw.first() != Some(&b'{') {
        return None;
    }
    serde_json::from_slice(raw).ok()
}

fn decrypt_envelope(
    envelope: &CryptoJsEnvelope,
    passphrase: &[u8],
    len: usize,
) -> Result<Vec<u8>, DecryptError> {
    let salt = hex::decode(&envelope.s).map_err(|err| DecryptError::Envelope {
        len,
        reason: format!("salt is not hex: {err}"),
    })?;

    let (key, derived_iv) = evp_bytes_to_key(passphrase, &salt, ENVELOPE_KEY_LEN, BLOCK_SIZE);
    let iv = if envelope.iv.is_empty() {
        derived_iv
    } else {
        let iv = hex::decode(&envelope.iv).map_err(|err| DecryptError::Envelope {
            len,
            reason: format!("iv is not hex: {err}"),
        })?;
        if iv.len() != BLOCK_SIZE {
            return Err(DecryptError::Envelope {
                len,
                reason: format!("iv must be {BLOCK_SIZE} bytes, got {}", iv.len()),
            });
        }
        iv
    };

    let ciphertext =
        BASE64_STANDARD
            .decode(envelope.ct.as_bytes())
            .map_err(|source| DecryptError::Base64 {
                len: envelope.ct.len(),
                source,
            })?;

    decrypt_cbc::<Aes256CbcDec>(&ciphertext, &key, &iv)
}

/// encrypts like cryptojs does with a passphrase, returning the base64 envelope.
///
/// the plaintext is pkcs7 padded; [`decrypt`] hands those tail bytes back untouched.
pub fn encrypt_envelope(
    plaintext: &[u8],
    passphrase: &[u8],
    salt: &[u8; 8],
) -> Result<String, DecryptError> {
    let (key, iv) = evp_bytes_to_key(passphrase, salt, ENVELOPE_KEY_LEN, BLOCK_SIZE);
    let len = plaintext.len();

    let cipher = Aes256CbcEnc::new_from_slices(&key, &iv).map_err(|_| {
        DecryptError::InvalidKey {
            len,
            key_len: key.len(),
        }
    })?;

    let mut buf = vec![0u8; len + BLOCK_SIZE - len % BLOCK_SIZE];
    buf[..len].copy_from_slice(plaintext);
    let ciphertext = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut buf, len)
        .map_err(|_| DecryptError::Cipher { len })?;

    let envelope = serde_json::json!({
        "ct": BASE64_STANDARD.encode(ciphertext),
        "iv": hex::encode(&iv),
        "s": hex::encode(salt),
    });
    Ok(BASE64_STANDARD.encode(envelope.to_string()))
}

/// openssl `EVP_BytesToKey` with md5 and a single iteration.
fn evp_bytes_to_key(
    passphrase: &[u8],
    salt: &[u8],
    key_len: usize,
    iv_len: usize,
) -> (Vec<u8>, Vec<u8>) {
    let mut derived = Vec::with_capacity(key_len + iv_len + 16);
    let mut block: Vec<u8> = Vec::new();

    while derived.len() < key_len + iv_len {
        let mut input = block;
        input.extend_from_slice(passphrase);
        input.extend_from_slice(salt);
        block = md5::compute(&input).0.to_vec();
        derived.extend_from_slice(&block);
    }

    let iv = derived[key_len..key_len + iv_len].to_vec();
    derived.truncate(key_len);
    (derived, iv)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8; 16] = b"3&!Z0M,VIZ;dZW==";

    fn pad(bytes: &[u8]) -> Vec<u8> {
        let mut out = bytes.to_vec();
        while out.len() % BLOCK_SIZE != 0 {
            out.push(b' ');
        }
        out
    }

    #[test]
    fn decrypt_recovers_block_aligned_plaintext() {
        let padded = pad(br#"{"embed":{"v720":"https://e.test/a"}}"#);

        let encoded = encrypt(&padded, KEY).expect("aligned plaintext encrypts");
        let decoded = decrypt(&encoded, KEY).expect("own ciphertext decrypts");
        assert_eq!(decoded, padded);
    }

    #[test]
    fn decrypt_with_wrong_key_does_not_return_plaintext() {
        let plaintext = [b'a'; 32];
        let encoded = encrypt(&plaintext, KEY).expect("aligned plaintext encrypts");
        let decoded = decrypt(&encoded, b"0123456789abcdef").expect("cipher still runs");
        assert_ne!(decoded, plaintext);
    }

    #[test]
    fn decrypt_rejects_misaligned_ciphertext() {
        for len in [1usize, 15, 17, 31, 33] {
            let encoded = BASE64_STANDARD.encode(vec![7u8; len]);
            let err = decrypt(&encoded, KEY).expect_err("misaligned payload must fail");
            assert!(
                matches!(err, DecryptError::Misaligned { len: l } if l == len),
                "unexpected error for {len}: {err}"
            );
        }
    }

    #[test]
    fn decrypt_rejects_invalid_base64() {
        let err = decrypt("not*base64!", KEY).expect_err("garbage must fail");
        assert!(matches!(err, DecryptError::Base64 { len: 11, .. }));
    }

    #[test]
    fn decrypt_rejects_short_key() {
        let encoded = BASE64_STANDARD.encode([0u8; 16]);
        let err = decrypt(&encoded, b"short").expect_err("5 byte key must fail");
        assert!(matches!(err, DecryptError::InvalidKey { len: 16, key_len: 5 }));
    }

    #[test]
    fn encrypt_rejects_misaligned_plaintext() {
        let err = encrypt(b"abc", KEY).expect_err("3 bytes are not a block");
        assert!(matches!(err, DecryptError::Misaligned { len: 3 }));
    }

    #[test]
    fn decrypt_ignores_whitespace_in_payload() {
        let encoded = encrypt(&[b'x'; 16], KEY).expect("aligned plaintext encrypts");
        let wrapped = format!("{}\n{}", &encoded[..10], &encoded[10..]);
        assert_eq!(decrypt(&wrapped, KEY).expect("decrypts"), vec![b'x'; 16]);
    }

    #[test]
    fn decrypt_handles_cryptojs_envelope() {
        let salt = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let (key, iv) = evp_bytes_to_key(KEY, &salt, ENVELOPE_KEY_LEN, BLOCK_SIZE);
        let plaintext = [b'z'; 48];

        let mut buf = plaintext.to_vec();
        let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
            .expect("derived key fits aes-256")
            .encrypt_padded_mut::<NoPadding>(&mut buf, plaintext.len())
            .expect("aligned plaintext encrypts")
            .to_vec();

        let envelope = serde_json::json!({
            "ct": BASE64_STANDARD.encode(&ciphertext),
            "iv": hex::encode(&iv),
            "s": hex::encode(salt),
        });
        let payload = BASE64_STANDARD.encode(envelope.to_string());

        assert_eq!(decrypt(&payload, KEY).expect("envelope decrypts"), plaintext);
    }

    #[test]
    fn envelope_keeps_pkcs7_tail() {
        let payload = encrypt_envelope(b"\"https://cdn.test/a.m3u8\"", KEY, &[9u8; 8])
            .expect("envelope encrypts");
        let plaintext = decrypt(&payload, KEY).expect("envelope decrypts");

        assert_eq!(plaintext.len(), 32);
        assert_eq!(&plaintext[..25], b"\"https://cdn.test/a.m3u8\"");
        assert!(plaintext[25..].iter().all(|b| *b == 7));
    }

    #[test]
    fn envelope_with_short_iv_is_an_envelope_error() {
        let envelope = serde_json::json!({
            "ct": BASE64_STANDARD.encode([0u8; 16]),
            "iv": hex::encode([0u8; 8]),
            "s": hex::encode([1u8; 8]),
        });
        let payload = BASE64_STANDARD.encode(envelope.to_string());

        let err = decrypt(&payload, KEY).expect_err("8 byte iv must fail");
        assert!(
            matches!(&err, DecryptError::Envelope { reason, .. } if reason.contains("16 bytes")),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn evp_bytes_to_key_first_block_is_md5_of_passphrase_and_salt() {
        let salt = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let (key, iv) = evp_bytes_to_key(b"password", &salt, 32, 16);
        assert_eq!(key.len(), 32);
        assert_eq!(iv.len(), 16);

        let first = md5::compute([&b"password"[..], &salt[..]].concat());
        assert_eq!(&key[..16], &first.0[..]);
    }
}
