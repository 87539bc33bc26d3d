// src/core/token_lock.rs

//! In-flight operation tracking.

use crate::core::commons::lock_unpoisoned;
use crate::core::paths::absolute_lexical;
use crate::models::OperationKind;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Identity of an in-flight operation: `"<kind> <normalized path>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationToken(String);

impl OperationToken {
    /// Builds the token for `kind` on `target`.
    ///
    /// Local paths are made absolute and lower-cased, so `Foo.cs`, `./foo.cs` and the
    /// full path all map to one token. Depot paths (`//depot/...`) are only lower-cased.
    pub fn new(kind: OperationKind, target: &str) -> Self {
        let normalized = if target.starts_with("//") {
            target.to_lowercase()
        } else {
            normalize_path(Path::new(target))
        };
        Self(format!("{} {}", kind, normalized))
    }

    /// Token for `kind` on a local file.
    pub fn for_path(kind: OperationKind, path: &Path) -> Self {
        Self::new(kind, &path.to_string_lossy())
    }

    /// The token text, `"<kind> <path>"`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Absolute, lexically cleaned, lower-cased form of `path`.
pub fn normalize_path(path: &Path) -> String {
    absolute_lexical(path).to_string_lossy().to_lowercase()
}

/// Set of operations currently in flight. At most one operation per token at a time.
#[derive(Debug, Default)]
pub struct TokenLock {
    in_flight: Mutex<HashSet<OperationToken>>,
}

impl TokenLock {
    /// An empty lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `token`; `false` if it is already in flight.
    pub fn try_insert(&self, token: &OperationToken) -> bool {
        let inserted = lock_unpoisoned(&self.in_flight).insert(token.clone());
        if inserted {
            log::debug!("## Locked \"{}\"", token);
        } else {
            log::error!("{} already in progress", token);
        }
        inserted
    }

    /// Removes `token`. Releasing a token that is not held is logged and otherwise ignored.
    pub fn release(&self, token: &OperationToken) -> bool {
        let removed = lock_unpoisoned(&self.in_flight).remove(token);
        if removed {
            log::debug!("## Unlocked \"{}\"", token);
        } else {
            log::warn!("Released \"{}\" which was not locked", token);
        }
        removed
    }

    /// Reserves `token`, returning a guard that releases it when dropped.
    pub fn try_reserve(self: &Arc<Self>, token: OperationToken) -> Option<Reservation> {
        self.try_insert(&token).then(|| Reservation {
            lock: Arc::clone(self),
            token,
        })
    }

    /// Whether `token` is in flight.
    pub fn is_reserved(&self, token: &OperationToken) -> bool {
        lock_unpoisoned(&self.in_flight).contains(token)
    }

    /// Number of operations in flight.
    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.in_flight).len()
    }

    /// `true` when nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a token until dropped.
#[derive(Debug)]
pub struct Reservation {
    lock: Arc<TokenLock>,
    token: OperationToken,
}

impl Reservation {
    /// The token being held.
    pub fn token(&self) -> &OperationToken {
        &self.token
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.lock.release(&self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(path: &str) -> OperationToken {
        OperationToken::new(OperationKind::Edit, path)
    }

    #[test]
    fn test_reserve_release_cycle() {
        let lock = TokenLock::new();
        let t = token("/work/main.cs");
        assert!(lock.try_insert(&t));
        assert!(!lock.try_insert(&t));
        assert!(lock.release(&t));
        assert!(lock.try_insert(&t));
    }

    #[test]
    fn test_releasing_unknown_token_is_harmless() {
        let lock = TokenLock::new();
        assert!(!lock.release(&token("/work/never.cs")));
        assert!(lock.is_empty());
    }

    #[test]
    fn test_reservation_releases_on_drop() {
        let lock = Arc::new(TokenLock::new());
        let t = token("/work/main.cs");
        let reservation = lock.try_reserve(t.clone()).unwrap();
        assert!(lock.is_reserved(&t));
        assert!(lock.try_reserve(t.clone()).is_none());

        drop(reservation);
        assert!(!lock.is_reserved(&t));
        assert!(lock.try_reserve(t).is_some());
    }

    #[test]
    fn test_kinds_on_same_path_are_independent() {
        let lock = TokenLock::new();
        assert!(lock.try_insert(&OperationToken::new(OperationKind::Edit, "/w/a.cs")));
        assert!(lock.try_insert(&OperationToken::new(OperationKind::Diff, "/w/a.cs")));
        assert_eq!(lock.len(), 2);
    }

    #[test]
    fn test_token_normalizes_case_and_relative_paths() {
        let cwd = std::env::current_dir().unwrap();
        let absolute = cwd.join("Src").join("Main.CS");
        assert_eq!(
            token("src/main.cs"),
            OperationToken::for_path(OperationKind::Edit, &absolute)
        );
        assert_eq!(token("./src/../src/main.cs"), token("src/main.cs"));
        assert!(token("src/main.cs").as_str().starts_with("edit "));
    }

    #[test]
    fn test_depot_paths_are_only_lowercased() {
        let t = OperationToken::new(OperationKind::History, "//Depot/Main/Foo.cs");
        assert_eq!(t.as_str(), "history //depot/main/foo.cs");
    }
}
