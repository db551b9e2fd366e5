use rand::RngCore;

/// Random invite token: 32 bytes from the OS-seeded thread RNG, hex encoded.
pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
