use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Permission categories GitHub accepts under `permissions:`.
pub const CATEGORIES: [&str; 13] = [
    "actions",
    "checks",
    "contents",
    "deployments",
    "id-token",
    "issues",
    "discussions",
    "packages",
    "pages",
    "pull-requests",
    "repository-projects",
    "security-events",
    "statuses",
];

pub fn is_known_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

/// Strength of a granted or required permission. Ordered `None < Read < Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    None,
    Read,
    Write,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::None, Scope::Read, Scope::Write];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::None => "none",
            Scope::Read => "read",
            Scope::Write => "write",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Scope::None),
            "read" => Ok(Scope::Read),
            "write" => Ok(Scope::Write),
            other => Err(format!("invalid permission value: {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_is_total_and_transitive() {
        for a in Scope::ALL {
            for b in Scope::ALL {
                let n = [a < b, a == b, a > b].iter().filter(|x| **x).count();
                assert_eq!(n, 1, "{a} vs {b}");
                for c in Scope::ALL {
                    if a <= b && b <= c {
                        assert!(a <= c, "{a} <= {b} <= {c}");
                    }
                }
            }
        }
        assert!(Scope::None < Scope::Read && Scope::Read < Scope::Write);
    }

    #[test]
    fn canonical_tokens_round_trip() {
        for s in ["none", "read", "write"] {
            let scope: Scope = s.parse().expect("parse scope");
            assert_eq!(scope.to_string(), s);
        }
        for bad in ["", "Read", "admin", "write-all"] {
            assert!(bad.parse::<Scope>().is_err(), "{bad:?} must be rejected");
        }
    }

    #[test]
    fn categories_are_recognized() {
        assert!(is_known_category("pull-requests"));
        assert!(is_known_category("id-token"));
        assert!(!is_known_category("pull_requests"));
        assert!(!is_known_category("models"));
    }
}
