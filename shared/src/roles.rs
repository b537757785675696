use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Application roles. Wire values are the ones stored in profile documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "stajyer")]
    Intern,
    #[serde(rename = "yonetici")]
    Manager,
}

pub const INTERN: &str = "stajyer";
pub const MANAGER: &str = "yonetici";

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Intern => INTERN,
            Role::Manager => MANAGER,
        }
    }

    /// Display label used on pages
    pub fn label(&self) -> &'static str {
        match self {
            Role::Intern => "Stajyer",
            Role::Manager => "Yönetici",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            INTERN => Ok(Role::Intern),
            MANAGER => Ok(Role::Manager),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

pub fn is_intern(role: &str) -> bool {
    role == INTERN
}

pub fn is_manager(role: &str) -> bool {
    role == MANAGER
}

pub fn require_manager(role: &str) -> bool {
    is_manager(role)
}

const BOTH: &[Role] = &[Role::Intern, Role::Manager];
const MANAGER_ONLY: &[Role] = &[Role::Manager];

/// Page path patterns and the roles allowed on them.
/// A `[name]` segment matches any single path segment.
pub const PAGE_PERMISSIONS: &[(&str, &[Role])] = &[
    ("/dashboard", MANAGER_ONLY),
    ("/activities", BOTH),
    ("/activities/new", BOTH),
    ("/students/[id]", MANAGER_ONLY),
    ("/settings", BOTH),
];

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    pattern.len() == path.len()
        && pattern.iter().zip(path.iter()).all(|(expected, actual)| {
            (expected.starts_with('[') && expected.ends_with(']')) || expected == actual
        })
}

/// Roles configured for a page, or `None` when the page is not in the table.
pub fn page_permissions(path: &str) -> Option<&'static [Role]> {
    PAGE_PERMISSIONS
        .iter()
        .find(|(pattern, _)| pattern_matches(pattern, path))
        .map(|(_, roles)| *roles)
}

/// Whether `role` may open `path`. Pages missing from the table are allowed.
pub fn can_access_page(role: Role, path: &str) -> bool {
    match page_permissions(path) {
        Some(roles) => roles.contains(&role),
        None => true,
    }
}

/// Managers may read anyone's data; interns only their own.
pub fn can_access_user_data(current_user_id: &str, target_user_id: &str, current_user_role: Role) -> bool {
    if current_user_role == Role::Manager {
        return true;
    }
    current_user_id == target_user_id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_pages_follow_table() {
        for (pattern, roles) in PAGE_PERMISSIONS {
            for role in [Role::Intern, Role::Manager] {
                assert_eq!(can_access_page(role, pattern), roles.contains(&role), "{} {}", role, pattern);
            }
        }
        assert!(!can_access_page(Role::Intern, "/dashboard"));
        assert!(can_access_page(Role::Manager, "/dashboard"));
        assert!(can_access_page(Role::Intern, "/activities/new"));
    }

    #[test]
    fn test_dynamic_segment_matches_concrete_path() {
        assert!(!can_access_page(Role::Intern, "/students/abc123"));
        assert!(can_access_page(Role::Manager, "/students/abc123"));
        assert_eq!(page_permissions("/students"), None);
        assert_eq!(page_permissions("/students/a/b"), None);
    }

    #[test]
    fn test_unmapped_pages_default_allow() {
        for path in ["/", "/help", "/activities/x/edit", "/reports"] {
            assert!(can_access_page(Role::Intern, path));
            assert!(can_access_page(Role::Manager, path));
        }
    }

    #[test]
    fn test_user_data_access() {
        assert!(can_access_user_data("u1", "u1", Role::Intern));
        assert!(can_access_user_data("u1", "u1", Role::Manager));
        assert!(can_access_user_data("m1", "u2", Role::Manager));
        assert!(!can_access_user_data("u1", "u2", Role::Intern));
    }

    #[test]
    fn test_role_predicates() {
        assert!(is_intern("stajyer"));
        assert!(!is_intern("yonetici"));
        assert!(is_manager("yonetici"));
        assert!(require_manager("yonetici"));
        assert!(!require_manager("admin"));
        assert_eq!("yonetici".parse::<Role>(), Ok(Role::Manager));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Intern).unwrap(), "\"stajyer\"");
        let role: Role = serde_json::from_str("\"yonetici\"").unwrap();
        assert_eq!(role, Role::Manager);
    }
}
