use chrono::{Duration, NaiveDateTime, Utc};
use rand::Rng;

pub const OTP_TTL_MINUTES: i64 = 5;

/// Six-digit one-time login code.
pub fn generate_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

pub fn expiry() -> NaiveDateTime {
    Utc::now().naive_utc() + Duration::minutes(OTP_TTL_MINUTES)
}

pub fn verify_code(
    stored: Option<&str>,
    stored_expiry: Option<NaiveDateTime>,
    submitted: &str,
    now: NaiveDateTime,
) -> Result<(), &'static str> {
    let stored = stored.ok_or("no code was requested for this account")?;
    let stored_expiry = stored_expiry.ok_or("no code was requested for this account")?;

    if now > stored_expiry {
        return Err("code has expired, please request a new one");
    }
    if stored != submitted {
        return Err("invalid code");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_six_digits() {
        for _ in 0..20 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_verify_matching_code() {
        let now = Utc::now().naive_utc();
        let exp = now + Duration::minutes(5);
        assert!(verify_code(Some("123456"), Some(exp), "123456", now).is_ok());
    }

    #[test]
    fn test_verify_wrong_code() {
        let now = Utc::now().naive_utc();
        let exp = now + Duration::minutes(5);
        assert!(verify_code(Some("123456"), Some(exp), "654321", now).is_err());
    }

    #[test]
    fn test_verify_expired_code() {
        let now = Utc::now().naive_utc();
        let exp = now - Duration::minutes(1);
        assert!(verify_code(Some("123456"), Some(exp), "123456", now).is_err());
    }

    #[test]
    fn test_verify_without_requested_code() {
        let now = Utc::now().naive_utc();
        assert!(verify_code(None, None, "123456", now).is_err());
    }
}
