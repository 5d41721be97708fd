use rand::Rng;

const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PUBLIC_ID_LENGTH: usize = 10;

/// Generate a 10-char uppercase alphanumeric public id.
/// Used for course_id, order_id, enrollment_id, etc. These ids are exposed
/// in URLs instead of the serial primary keys.
pub fn generate_public_id() -> String {
    let mut rng = rand::thread_rng();
    (0..PUBLIC_ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Generate a numeric one-time code for password resets (7 digits).
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..7).map(|_| rng.gen_range(0..10).to_string()).collect()
}

/// Derive the username from an email address (the part before '@').
/// Matches the registration behavior: username defaults to the email prefix.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_id_shape() {
        let id = generate_public_id();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_otp_is_seven_digits() {
        let otp = generate_otp();
        assert_eq!(otp.len(), 7);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("student@example.com"), "student");
        assert_eq!(username_from_email("no-at-sign"), "no-at-sign");
    }
}
