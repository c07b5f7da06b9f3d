//! Random identifiers used to keep parallel runs from colliding.

const BASE62: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Length of generated unique ids.
pub const UNIQUE_ID_LEN: usize = 6;

/// A short random id over `[0-9A-Za-z]`.
pub fn unique_id() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    bytes
        .iter()
        .take(UNIQUE_ID_LEN)
        .map(|b| BASE62[(*b as usize) % BASE62.len()] as char)
        .collect()
}

/// Lower-cased unique id, safe for AWS resource names.
pub fn lower_unique_id() -> String {
    unique_id().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_id_shape() {
        let id = unique_id();
        assert_eq!(id.len(), UNIQUE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_lower_unique_id() {
        let id = lower_unique_id();
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_unique_ids_do_not_repeat() {
        let ids: HashSet<String> = (0..1000).map(|_| lower_unique_id()).collect();
        // 36^6 possibilities; a handful of collisions in 1000 would indicate a broken source
        assert!(ids.len() >= 995);
    }
}
