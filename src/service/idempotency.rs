use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Key sent to the provider for one attempt. Pure in `(session_id,
/// attempt_number)`, so resubmitting attempt N after a crash reuses the key.
pub fn attempt_idempotency_key(session_id: Uuid, attempt_number: u32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(attempt_number.to_be_bytes());
    format!("att_{}", hex_prefix(&hasher.finalize(), 24))
}

/// Key for capture/refund/void on an attempt. `processed_minor` is the amount
/// already captured or refunded before this call, so a replay of the same call
/// reuses the key while the next partial operation gets a fresh one.
pub fn follow_up_idempotency_key(attempt_key: &str, operation: &str, processed_minor: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(attempt_key.as_bytes());
    hasher.update([0u8]);
    hasher.update(operation.as_bytes());
    hasher.update(processed_minor.to_be_bytes());
    format!("{}_{}", &operation[..operation.len().min(3)], hex_prefix(&hasher.finalize(), 24))
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n / 2).map(|b| format!("{:02x}", b)).collect()
}
