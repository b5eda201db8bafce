use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Opaque bearer tokens for candidate-facing interview links. 22 alphanumeric
/// characters carry ~130 bits of entropy.
pub const INTERVIEW_TOKEN_LENGTH: usize = 22;

pub fn generate_opaque_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn confirmation_url(frontend_url: &str, token: &str) -> String {
    format!("{}/interviews/confirm/{}", frontend_url.trim_end_matches('/'), token)
}

pub fn cancellation_url(frontend_url: &str, token: &str) -> String {
    format!("{}/interviews/cancel/{}", frontend_url.trim_end_matches('/'), token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_alphanumeric_and_sized() {
        let t = generate_opaque_token(INTERVIEW_TOKEN_LENGTH);
        assert_eq!(t.len(), INTERVIEW_TOKEN_LENGTH);
        assert!(t.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = generate_opaque_token(INTERVIEW_TOKEN_LENGTH);
        let b = generate_opaque_token(INTERVIEW_TOKEN_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn urls_strip_trailing_slash() {
        assert_eq!(
            confirmation_url("https://app.example.com/", "abc"),
            "https://app.example.com/interviews/confirm/abc"
        );
    }
}
