//! The PIT-assist token index.
//!
//! One row per reflexive PIT name: the token this forwarder generated for
//! its downstream hop, and the token the upstream hop gave us. Rows are
//! write-once and live exactly as long as the PIT entry they describe.
//! Token 0 is reserved and means "absent".

use log::trace;
use rand::Rng;
use rust_rnfd_common::{Error, Name};
use std::collections::HashMap;

/// Attempts before token generation gives up; hitting this means the PRNG
/// is misconfigured, not that the space is full.
const MAX_TOKEN_ATTEMPTS: u32 = 64;

#[derive(Debug, Default)]
pub struct PitAssist {
    name_to_token: HashMap<Name, u32>,
    token_to_name: HashMap<u32, Name>,
    name_to_prev_token: HashMap<Name, u32>,
    prev_token_to_name: HashMap<u32, Name>,
}

impl PitAssist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_name(&self, name: &Name) -> bool {
        self.name_to_token.contains_key(name)
    }

    /// Creates the row for `name`: draws a fresh downstream token and
    /// records `prev_token` as the upstream's label for this name.
    pub fn create_name(&mut self, name: Name, prev_token: u32) -> Result<u32, Error> {
        let token = self.generate_token()?;
        trace!("pit-assist create name={} token={} prev-token={}", name, token, prev_token);
        self.name_to_token.insert(name.clone(), token);
        self.token_to_name.insert(token, name.clone());
        self.name_to_prev_token.insert(name.clone(), prev_token);
        self.prev_token_to_name.insert(prev_token, name);
        Ok(token)
    }

    pub fn name_to_token(&self, name: &Name) -> Option<u32> {
        self.name_to_token.get(name).copied()
    }

    pub fn token_to_name(&self, token: u32) -> Option<&Name> {
        self.token_to_name.get(&token)
    }

    pub fn name_to_prev_token(&self, name: &Name) -> Option<u32> {
        self.name_to_prev_token.get(name).copied()
    }

    pub fn prev_token_to_name(&self, prev_token: u32) -> Option<&Name> {
        self.prev_token_to_name.get(&prev_token)
    }

    /// Destroys the row for `name`, together with its PIT entry.
    pub fn erase_name(&mut self, name: &Name) {
        if let Some(token) = self.name_to_token.remove(name) {
            self.token_to_name.remove(&token);
        }
        if let Some(prev_token) = self.name_to_prev_token.remove(name) {
            // another row may have claimed the reverse mapping since
            if self.prev_token_to_name.get(&prev_token) == Some(name) {
                self.prev_token_to_name.remove(&prev_token);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.name_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_token.is_empty()
    }

    fn generate_token(&self) -> Result<u32, Error> {
        let mut rng = rand::thread_rng();
        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let token: u32 = rng.gen();
            if token == 0 || self.token_to_name.contains_key(&token) {
                continue;
            }
            return Ok(token);
        }
        Err(Error::TokenExhausted(MAX_TOKEN_ATTEMPTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_uri(uri).unwrap()
    }

    #[test]
    fn row_round_trip() {
        let mut assist = PitAssist::new();
        let n = name("/example/testApp/1234");
        let token = assist.create_name(n.clone(), 2345).unwrap();

        assert_ne!(token, 0);
        assert_eq!(assist.name_to_token(&n), Some(token));
        assert_eq!(assist.token_to_name(token), Some(&n));
        assert_eq!(assist.name_to_prev_token(&n), Some(2345));
        assert_eq!(assist.prev_token_to_name(2345), Some(&n));
        assert!(assist.has_name(&n));
    }

    #[test]
    fn tokens_are_unique_across_live_rows() {
        let mut assist = PitAssist::new();
        let mut seen = std::collections::HashSet::new();
        for i in 0..256 {
            let token = assist.create_name(name(&format!("/n/{}", i)), i).unwrap();
            assert!(seen.insert(token), "token {} reused", token);
        }
        assert_eq!(assist.len(), 256);
    }

    #[test]
    fn erase_destroys_the_whole_row() {
        let mut assist = PitAssist::new();
        let n = name("/a");
        let token = assist.create_name(n.clone(), 99).unwrap();

        assist.erase_name(&n);
        assert!(!assist.has_name(&n));
        assert_eq!(assist.token_to_name(token), None);
        assert_eq!(assist.prev_token_to_name(99), None);
        assert!(assist.is_empty());
    }

    #[test]
    fn erase_keeps_a_reclaimed_prev_token() {
        let mut assist = PitAssist::new();
        let a = name("/a");
        let b = name("/b");
        assist.create_name(a.clone(), 7).unwrap();
        // a later row reclaims the same upstream token
        assist.create_name(b.clone(), 7).unwrap();

        assist.erase_name(&a);
        assert_eq!(assist.prev_token_to_name(7), Some(&b));
    }

    #[test]
    fn missing_lookups_return_none() {
        let assist = PitAssist::new();
        assert_eq!(assist.token_to_name(0xDEADBEEF), None);
        assert_eq!(assist.name_to_token(&name("/nope")), None);
    }
}
