use rand::Rng;

/// Safe character set for poll codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const POLL_ID_LENGTH: usize = 6;

/// Generate a random poll code that people can type from a projector
pub fn create_poll_id() -> String {
    let mut rng = rand::rng();
    (0..POLL_ID_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

pub fn create_participant_id() -> String {
    ulid::Ulid::new().to_string()
}

pub fn create_nomination_id() -> String {
    ulid::Ulid::new().to_string()
}
