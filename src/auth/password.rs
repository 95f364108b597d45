use std::sync::OnceLock;

pub const MIN_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "12345678", "123456789", "1234567890", "password", "password1",
    "qwerty", "qwertyuiop", "abc123", "111111", "iloveyou", "letmein",
    "welcome", "monkey", "dragon", "football", "baseball", "sunshine",
    "princess", "admin", "passw0rd", "trustno1", "superman", "whatever",
];

pub fn hash(plaintext: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, cost)
}

/// Constant-time check via bcrypt; malformed hashes never match.
pub fn verify(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Burn the same bcrypt work as a real check when the username is unknown,
/// so response timing doesn't reveal which accounts exist.
pub fn verify_dummy(plaintext: &str, cost: u32) {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    if let Some(dummy) = DUMMY.get_or_init(|| bcrypt::hash("not-a-real-password", cost).ok()) {
        let _ = bcrypt::verify(plaintext, dummy);
    }
}

/// Strength rules for a new password; empty when acceptable.
pub fn strength_errors(password: &str, username: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    let lowered = password.to_lowercase();
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        errors.push("This password is too common.".to_string());
    }

    if too_similar(&lowered, &username.to_lowercase()) {
        errors.push("The password is too similar to the username.".to_string());
    }

    errors
}

fn too_similar(password: &str, username: &str) -> bool {
    if username.is_empty() {
        return false;
    }
    password == username
        || (username.chars().count() >= 3 && password.contains(username))
        || (password.chars().count() >= 3 && username.contains(password))
}
