//! Per-category pools of retired tokens

use rustc_hash::FxHashMap;
use tokenflow_core::{Token, TokenCategory};

/// Bounded free lists of reset tokens, one per category
#[derive(Debug)]
pub(crate) struct TokenPools {
    pools: FxHashMap<TokenCategory, Vec<Token>>,
    capacity: usize,
}

impl TokenPools {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            pools: FxHashMap::default(),
            capacity,
        }
    }

    /// Pop a token that can serve `category`.
    ///
    /// A pooled token that fails the reuse check means the pool is corrupt;
    /// the whole pool is dropped and the caller builds a fresh token.
    pub(crate) fn take(&mut self, category: TokenCategory) -> Option<Token> {
        let pool = self.pools.get_mut(&category)?;
        let token = pool.pop()?;
        if token.is_reusable_as(category) {
            tracing::debug!("TokenPools: reusing {} for {category}", token.id());
            return Some(token);
        }
        tracing::warn!(
            "TokenPools: pooled {} ({}, {}) is not reusable as {category}, clearing {} pooled tokens",
            token.id(),
            token.category(),
            token.state(),
            pool.len() + 1
        );
        pool.clear();
        None
    }

    /// Return a reset token. Returns false, dropping the token, when its
    /// category pool is full.
    pub(crate) fn give(&mut self, token: Token) -> bool {
        let pool = self.pools.entry(token.category()).or_default();
        if pool.len() >= self.capacity {
            tracing::debug!("TokenPools: {} pool full, dropping {}", token.category(), token.id());
            return false;
        }
        tracing::debug!("TokenPools: pooled {}", token.id());
        pool.push(token);
        true
    }

    pub(crate) fn len(&self, category: TokenCategory) -> usize {
        self.pools.get(&category).map_or(0, Vec::len)
    }

    /// Mutable access for tests that need to corrupt a pooled token
    #[cfg(test)]
    pub(crate) fn peek_mut(&mut self, category: TokenCategory) -> Option<&mut Token> {
        self.pools.get_mut(&category)?.last_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.pools.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokenflow_core::{TokenFactory, TokenSpec, TokenState};

    #[test]
    fn test_pool_is_bounded() {
        let mut factory = TokenFactory::new();
        let mut pools = TokenPools::new(2);
        let accepted = (0..4)
            .filter(|_| pools.give(factory.create(TokenSpec::new(TokenCategory::Timer, "t"))))
            .count();
        assert_eq!(accepted, 2);
        assert_eq!(pools.len(TokenCategory::Timer), 2);
        assert_eq!(pools.len(TokenCategory::Io), 0);
    }

    #[test]
    fn test_take_matches_category() {
        let mut factory = TokenFactory::new();
        let mut pools = TokenPools::new(5);
        pools.give(factory.create(TokenSpec::new(TokenCategory::Network, "n")));

        assert!(pools.take(TokenCategory::Timer).is_none());
        let token = pools.take(TokenCategory::Network).unwrap();
        assert_eq!(token.category(), TokenCategory::Network);
        assert_eq!(pools.len(TokenCategory::Network), 0);
    }

    #[test]
    fn test_stale_token_clears_pool() {
        let mut factory = TokenFactory::new();
        let mut pools = TokenPools::new(5);
        pools.give(factory.create(TokenSpec::new(TokenCategory::Io, "a")));
        pools.give(factory.create(TokenSpec::new(TokenCategory::Io, "b")));
        if let Some(token) = pools.peek_mut(TokenCategory::Io) {
            token.set_state(TokenState::Processing);
        }

        assert!(pools.take(TokenCategory::Io).is_none());
        assert_eq!(pools.len(TokenCategory::Io), 0);
    }
}
