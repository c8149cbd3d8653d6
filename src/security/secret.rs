//! Short-lived container for sensitive text.
//!
//! Zeroing is best-effort: the buffer wipes its own bytes with [`zeroize`]
//! before releasing them, but copies made by callers (for example the
//! `String` returned from [`SecretBuffer::reveal`]) are outside its control.
//! Prefer [`SecretBuffer::expose`] when the bytes only need to be written
//! somewhere.

use std::fmt;

use zeroize::Zeroize;

pub struct SecretBuffer {
    bytes: Vec<u8>,
    cleared: bool,
}

impl SecretBuffer {
    /// Copy `text` into a new buffer. The caller's string is not aliased.
    pub fn new(text: &str) -> Self {
        Self::from_bytes(text.as_bytes().to_vec())
    }

    /// Take ownership of already-collected bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            cleared: false,
        }
    }

    /// A fresh copy of the secret; empty once cleared.
    pub fn reveal(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Borrow the raw bytes without copying them.
    pub fn expose(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Overwrite every byte with zero and drop the backing storage.
    /// Calling this again is a no-op.
    pub fn clear(&mut self) {
        if self.cleared {
            return;
        }
        self.bytes.zeroize();
        self.bytes = Vec::new();
        self.cleared = true;
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("len", &self.bytes.len())
            .field("cleared", &self.cleared)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let secret = SecretBuffer::new("hunter2");
        assert_eq!(secret.reveal(), "hunter2");
        assert_eq!(secret.expose(), b"hunter2");
        assert_eq!(secret.len(), 7);
    }

    #[test]
    fn test_does_not_alias_input() {
        let mut input = String::from("hunter2");
        let secret = SecretBuffer::new(&input);
        input.clear();
        input.push_str("changed");
        assert_eq!(secret.reveal(), "hunter2");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut secret = SecretBuffer::new("hunter2");
        secret.clear();
        assert_eq!(secret.reveal(), "");
        assert!(secret.is_cleared());
        assert!(secret.is_empty());

        secret.clear();
        assert_eq!(secret.reveal(), "");
        assert!(secret.is_cleared());
    }

    #[test]
    fn test_drop_after_clear() {
        let mut secret = SecretBuffer::from_bytes(b"hunter2".to_vec());
        secret.clear();
        assert_eq!(secret.expose(), b"");
        drop(secret);
    }

    #[test]
    fn test_debug_redacts() {
        let secret = SecretBuffer::new("hunter2");
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("len: 7"));
    }
}
