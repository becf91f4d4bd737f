/// Key layout and encoding utilities for Fjall partitions
///
/// Partition structure:
/// - `jobs`: job:{task_id} -> JobSnapshot (JSON)
/// - `idempotency`: idem:{key} -> IdempotencyRecord (JSON)
/// - `metadata`: meta:{key} -> value (string)

/// Encode a job key: job:{task_id}
pub fn encode_job_key(task_id: &str) -> Vec<u8> {
    format!("job:{}", task_id).into_bytes()
}

/// Decode a job key: job:{task_id} -> task_id
pub fn decode_job_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("job:").map(String::from)
}

/// Encode an idempotency key: idem:{key}
pub fn encode_idem_key(key: &str) -> Vec<u8> {
    format!("idem:{}", key).into_bytes()
}

/// Decode an idempotency key: idem:{key} -> key
pub fn decode_idem_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("idem:").map(String::from)
}

/// Encode a metadata key: meta:{key}
pub fn encode_meta_key(key: &str) -> Vec<u8> {
    format!("meta:{}", key).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_key_encoding() {
        let key = encode_job_key("0192f7c3-aaaa");
        assert_eq!(key, b"job:0192f7c3-aaaa");
        assert_eq!(decode_job_key(&key).unwrap(), "0192f7c3-aaaa");
        assert_eq!(decode_job_key(b"idem:x"), None);
    }

    #[test]
    fn test_idem_key_encoding() {
        let key = encode_idem_key("client-key:1");
        assert_eq!(key, b"idem:client-key:1");
        assert_eq!(decode_idem_key(&key).unwrap(), "client-key:1");
    }

    #[test]
    fn test_meta_key_encoding() {
        let key = encode_meta_key("last_prune");
        assert_eq!(key, b"meta:last_prune");
    }
}
