/// Key layout and encoding utilities for ledger partitions
///
/// Partition structure:
/// - `objects`: obj:{cid} -> ObjectRecord (JSON)
/// - `payments`: pay:{order_id} -> PaymentRecord (JSON)
/// - `pending`: pending:{order_id} -> empty (index of unprocessed payments)

/// Encode an object key: obj:{cid}
pub fn encode_object_key(cid: &str) -> Vec<u8> {
    format!("obj:{}", cid).into_bytes()
}

/// Encode a payment key: pay:{order_id}
pub fn encode_payment_key(order_id: &str) -> Vec<u8> {
    format!("pay:{}", order_id).into_bytes()
}

/// Encode a pending-index key: pending:{order_id}
pub fn encode_pending_key(order_id: &str) -> Vec<u8> {
    format!("pending:{}", order_id).into_bytes()
}

/// Decode a pending-index key: pending:{order_id} -> order_id
pub fn decode_pending_key(key: &[u8]) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str.strip_prefix("pending:").map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_encoding() {
        let key = encode_object_key("bafybeigdyr");
        assert_eq!(key, b"obj:bafybeigdyr");
    }

    #[test]
    fn test_payment_key_encoding() {
        assert_eq!(encode_payment_key("o1"), b"pay:o1");
    }

    #[test]
    fn test_pending_key_encoding() {
        let key = encode_pending_key("order:with:colons");
        assert_eq!(key, b"pending:order:with:colons");
        assert_eq!(decode_pending_key(&key).unwrap(), "order:with:colons");
    }

    #[test]
    fn test_decode_rejects_foreign_prefix() {
        assert!(decode_pending_key(b"pay:o1").is_none());
        assert!(decode_pending_key(b"obj:c1").is_none());
    }
}
