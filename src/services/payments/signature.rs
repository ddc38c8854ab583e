use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(data: &str, secret: &str) -> String {
    // HMAC accepts keys of any length, so new_from_slice cannot fail here.
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex-encoded HMAC. Anything that does not decode
/// as hex is rejected outright.
fn hmac_verify(data: &str, signature: &str, secret: &str) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    match hex::decode(signature) {
        Ok(sig) => mac.verify_slice(&sig).is_ok(),
        Err(_) => false,
    }
}

/// Gateway signature over `order_id|payment_id` with the key secret.
pub fn payment_signature(order_id: &str, payment_id: &str, secret: &str) -> String {
    hmac_hex(&format!("{order_id}|{payment_id}"), secret)
}

pub fn verify_payment_signature(
    order_id: &str,
    payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    hmac_verify(&format!("{order_id}|{payment_id}"), signature, secret)
}

/// Webhooks are signed over the raw request body with a separate secret.
pub fn webhook_signature(raw_body: &str, secret: &str) -> String {
    hmac_hex(raw_body, secret)
}

pub fn verify_webhook_signature(raw_body: &str, signature: &str, secret: &str) -> bool {
    hmac_verify(raw_body, signature, secret)
}
