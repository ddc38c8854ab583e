use bcrypt::{hash, verify, DEFAULT_COST};

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    Ok(hash(password, DEFAULT_COST)?)
}

pub fn verify_password(password: &str, hashed: &str) -> anyhow::Result<bool> {
    Ok(verify(password, hashed)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hashed = hash_password("secure_password_123").unwrap();
        assert!(verify_password("secure_password_123", &hashed).unwrap());
        assert!(!verify_password("wrong_password", &hashed).unwrap());
    }
}
