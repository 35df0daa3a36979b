//! User roles.

use serde::{Deserialize, Serialize};

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0} (expected customer, seller, editor, content_manager or admin)")]
pub struct RoleParseError(pub String);

/// Role stored on a profile and mirrored into the identity provider's
/// custom claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Browses, buys, reviews and messages sellers.
    #[default]
    Customer,
    /// Lists products and fulfils their line items.
    Seller,
    /// Moderates product listings and reviews.
    Editor,
    /// Manages content pages and banners.
    ContentManager,
    /// Full access, including platform locks and user roles.
    Admin,
}

impl Role {
    pub const ALL: [Self; 5] = [
        Self::Customer,
        Self::Seller,
        Self::Editor,
        Self::ContentManager,
        Self::Admin,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Seller => "seller",
            Self::Editor => "editor",
            Self::ContentManager => "content_manager",
            Self::Admin => "admin",
        }
    }

    /// Staff roles see a back-office dashboard.
    #[must_use]
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Editor | Self::ContentManager | Self::Admin)
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "customer" | "buyer" => Ok(Self::Customer),
            "seller" | "vendor" => Ok(Self::Seller),
            "editor" => Ok(Self::Editor),
            "content_manager" => Ok(Self::ContentManager),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_parse_accepts_aliases() {
        assert_eq!("Content-Manager".parse::<Role>(), Ok(Role::ContentManager));
        assert_eq!("vendor".parse::<Role>(), Ok(Role::Seller));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_staff_roles() {
        assert!(!Role::Customer.is_staff());
        assert!(!Role::Seller.is_staff());
        assert!(Role::Editor.is_staff());
        assert!(Role::Admin.is_staff());
    }
}
