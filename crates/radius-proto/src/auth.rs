use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the header Authenticator field and of one hiding block
pub const AUTHENTICATOR_LENGTH: usize = 16;

/// Generate a Request Authenticator per RFC 2865 Section 3
///
/// The value is random, with the low four bytes seeded from the current
/// Unix time so that it is also unique over the lifetime of the secret.
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut rng = rand::rng();
    let mut authenticator = [0u8; 16];
    rng.fill(&mut authenticator);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as u32)
        .unwrap_or_default();
    for (byte, seed) in authenticator[12..].iter_mut().zip(now.to_be_bytes()) {
        *byte ^= seed;
    }

    authenticator
}

/// Calculate Response Authenticator per RFC 2865 Section 3
///
/// Response Authenticator = MD5(Code + ID + Length + Request Authenticator + Attributes + Secret)
///
/// `packet` is the complete encoded response; whatever its authenticator
/// field holds is replaced by `request_authenticator` for the hash.
pub fn calculate_response_authenticator(
    packet: &[u8],
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> [u8; 16] {
    let mut context = md5::Context::new();
    context.consume(&packet[..4]);
    context.consume(request_authenticator);
    context.consume(&packet[20..]);
    context.consume(secret);
    context.compute().0
}

/// Verify the Response Authenticator of an encoded response packet
pub fn verify_response_authenticator(
    packet: &[u8],
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> bool {
    let calculated = calculate_response_authenticator(packet, request_authenticator, secret);
    packet[4..20] == calculated
}

fn hiding_pad(secret: &[u8], salt: &[u8]) -> [u8; 16] {
    let mut context = md5::Context::new();
    context.consume(secret);
    context.consume(salt);
    context.compute().0
}

/// Hide a User-Password value per RFC 2865 Section 5.2
///
/// The password is zero padded to a multiple of 16 bytes, then each block is
/// XORed with MD5(secret + request_authenticator) for the first block, and
/// MD5(secret + previous ciphertext block) for subsequent blocks.
pub fn encrypt_user_password(password: &[u8], secret: &[u8], authenticator: &[u8; 16]) -> Vec<u8> {
    let blocks = password.len().div_ceil(AUTHENTICATOR_LENGTH).max(1);
    let mut result = password.to_vec();
    result.resize(blocks * AUTHENTICATOR_LENGTH, 0);

    let mut salt = *authenticator;
    for chunk in result.chunks_mut(AUTHENTICATOR_LENGTH) {
        let pad = hiding_pad(secret, &salt);
        for (byte, key) in chunk.iter_mut().zip(pad) {
            *byte ^= key;
        }
        salt.copy_from_slice(chunk);
    }

    result
}

/// Recover a User-Password value per RFC 2865 Section 5.2
///
/// Returns `None` unless `encrypted` is a non-empty multiple of 16 bytes.
///
/// All trailing NUL bytes are stripped from the result. The padding is
/// indistinguishable from NULs at the end of the original password, so such
/// passwords do not survive a round trip; this is inherent to RFC 2865.
pub fn decrypt_user_password(
    encrypted: &[u8],
    secret: &[u8],
    authenticator: &[u8; 16],
) -> Option<Vec<u8>> {
    if encrypted.is_empty() || encrypted.len() % AUTHENTICATOR_LENGTH != 0 {
        return None;
    }

    let mut result = Vec::with_capacity(encrypted.len());
    let mut salt: &[u8] = authenticator;

    for chunk in encrypted.chunks(AUTHENTICATOR_LENGTH) {
        let pad = hiding_pad(secret, salt);
        result.extend(chunk.iter().zip(pad).map(|(byte, key)| byte ^ key));
        salt = chunk;
    }

    while result.last() == Some(&0) {
        result.pop();
    }

    Some(result)
}
