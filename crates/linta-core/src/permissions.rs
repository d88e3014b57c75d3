use std::collections::BTreeMap;
use std::fmt;

use crate::scope::Scope;
use crate::source_map::Pos;

/// One requirement or grant for a single category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPermission {
    pub scope: Scope,
    /// Action or workflow that imposed the requirement; empty for explicit declarations.
    pub provenance: String,
    pub pos: Pos,
}

impl fmt::Display for JobPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.provenance.is_empty() {
            write!(f, "{}", self.scope)
        } else {
            write!(f, "{} (required by {})", self.scope, self.provenance)
        }
    }
}

/// Category -> strongest scope, with the provenance of whoever first asked for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobPermissions {
    entries: BTreeMap<String, JobPermission>,
}

impl JobPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The implicit grant of a job that declares no permissions at all.
    ///
    /// This mirrors GitHub's restricted default token and may change with the platform.
    pub fn baseline(pos: Pos) -> Self {
        let mut p = Self::new();
        p.add("contents", "", Scope::Read, pos);
        p
    }

    /// Keeps the strongest scope per key. Ties keep the entry that was added first.
    pub fn add(&mut self, key: &str, provenance: &str, scope: Scope, pos: Pos) {
        match self.entries.get_mut(key) {
            Some(curr) if curr.scope >= scope => {}
            Some(curr) => {
                *curr = JobPermission {
                    scope,
                    provenance: provenance.to_string(),
                    pos,
                };
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    JobPermission {
                        scope,
                        provenance: provenance.to_string(),
                        pos,
                    },
                );
            }
        }
    }

    /// Folds every entry of `other` in with [`JobPermissions::add`].
    pub fn merge(&mut self, other: &JobPermissions) {
        for (k, v) in other.iter() {
            self.add(k, &v.provenance, v.scope, v.pos);
        }
    }

    pub fn get(&self, key: &str) -> Option<&JobPermission> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobPermission)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_keeps_max_scope_and_first_provenance_on_ties() {
        for a in Scope::ALL {
            for b in Scope::ALL {
                let mut p = JobPermissions::new();
                p.add("contents", "first", a, Pos::new(1, 1));
                p.add("contents", "second", b, Pos::new(2, 1));
                let got = p.get("contents").expect("entry");
                assert_eq!(got.scope, a.max(b), "{a} then {b}");
                let want = if a >= b { "first" } else { "second" };
                assert_eq!(got.provenance, want, "{a} then {b}");
                assert_eq!(p.len(), 1);
            }
        }
    }

    #[test]
    fn add_is_idempotent() {
        let mut p = JobPermissions::new();
        p.add("issues", "actions/stale", Scope::Write, Pos::new(3, 9));
        let once = p.clone();
        p.add("issues", "actions/stale", Scope::Write, Pos::new(3, 9));
        assert_eq!(p, once);
    }

    #[test]
    fn empty_and_baseline() {
        assert!(JobPermissions::new().is_empty());
        let base = JobPermissions::baseline(Pos::default());
        assert_eq!(base.len(), 1);
        let contents = base.get("contents").expect("contents");
        assert_eq!(contents.scope, Scope::Read);
        assert!(contents.provenance.is_empty());
    }

    #[test]
    fn display_omits_empty_provenance() {
        let declared = JobPermission {
            scope: Scope::Write,
            provenance: String::new(),
            pos: Pos::default(),
        };
        assert_eq!(declared.to_string(), "write");
        let derived = JobPermission {
            provenance: "actions/checkout".to_string(),
            ..declared
        };
        assert_eq!(derived.to_string(), "write (required by actions/checkout)");
    }
}
