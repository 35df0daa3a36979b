//! Role-based access and the platform maintenance lock.
//!
//! Every request is checked against the global platform flags and the
//! caller's role before reaching a handler. Admins are never locked out, so
//! they can always reach the switch that turns a lock off again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Role;

/// Global platform switches, stored as the `platform` setting.
///
/// Missing fields deserialize to their unlocked defaults, so an absent or
/// partial settings row never locks anyone out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformFlags {
    pub maintenance_mode: bool,
    pub maintenance_message: Option<String>,
    pub checkout_locked: bool,
    pub registration_locked: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PlatformFlags {
    pub const DEFAULT_MAINTENANCE_MESSAGE: &'static str =
        "The marketplace is undergoing maintenance. Please check back soon.";

    #[must_use]
    pub fn maintenance_message(&self) -> &str {
        self.maintenance_message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(Self::DEFAULT_MAINTENANCE_MESSAGE)
    }
}

/// A part of the application guarded by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Browsing, search, product pages, content pages.
    Public,
    /// The signed-in user's own profile, orders, messages and claims.
    Account,
    Checkout,
    Registration,
    SellerDashboard,
    EditorDashboard,
    ContentDashboard,
    AdminDashboard,
}

impl Area {
    /// Roles allowed in a dashboard area, or `None` if any role may enter.
    #[must_use]
    pub const fn required_roles(self) -> Option<&'static [Role]> {
        match self {
            Self::SellerDashboard => Some(&[Role::Seller, Role::Admin]),
            Self::EditorDashboard => Some(&[Role::Editor, Role::Admin]),
            Self::ContentDashboard => Some(&[Role::ContentManager, Role::Admin]),
            Self::AdminDashboard => Some(&[Role::Admin]),
            Self::Public | Self::Account | Self::Checkout | Self::Registration => None,
        }
    }

    const fn requires_login(self) -> bool {
        !matches!(self, Self::Public | Self::Registration)
    }
}

/// Why the gate refused a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Denial {
    #[error("{0}")]
    Maintenance(String),
    #[error("checkout is temporarily disabled")]
    CheckoutLocked,
    #[error("registration is temporarily disabled")]
    RegistrationLocked,
    #[error("sign in required")]
    Unauthenticated,
    #[error("your role does not have access to this area")]
    Forbidden,
}

/// Decide whether a caller with `role` (or no session) may enter `area`.
///
/// # Errors
///
/// Returns the first [`Denial`] that applies, checking platform locks before
/// authentication and role requirements.
pub fn gate(role: Option<Role>, area: Area, flags: &PlatformFlags) -> Result<(), Denial> {
    if role == Some(Role::Admin) {
        return Ok(());
    }

    if flags.maintenance_mode {
        return Err(Denial::Maintenance(flags.maintenance_message().to_owned()));
    }
    if area == Area::Checkout && flags.checkout_locked {
        return Err(Denial::CheckoutLocked);
    }
    if area == Area::Registration && flags.registration_locked {
        return Err(Denial::RegistrationLocked);
    }

    let Some(role) = role else {
        return if area.requires_login() {
            Err(Denial::Unauthenticated)
        } else {
            Ok(())
        };
    };

    match area.required_roles() {
        Some(allowed) if !allowed.contains(&role) => Err(Denial::Forbidden),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn maintenance() -> PlatformFlags {
        PlatformFlags {
            maintenance_mode: true,
            ..PlatformFlags::default()
        }
    }

    #[test]
    fn test_admin_bypasses_every_lock() {
        let flags = PlatformFlags {
            maintenance_mode: true,
            checkout_locked: true,
            registration_locked: true,
            ..PlatformFlags::default()
        };
        assert_eq!(gate(Some(Role::Admin), Area::Checkout, &flags), Ok(()));
        assert_eq!(gate(Some(Role::Admin), Area::AdminDashboard, &flags), Ok(()));
    }

    #[test]
    fn test_maintenance_blocks_everyone_else() {
        let flags = maintenance();
        for role in [None, Some(Role::Customer), Some(Role::Seller), Some(Role::Editor)] {
            assert!(matches!(
                gate(role, Area::Public, &flags),
                Err(Denial::Maintenance(_))
            ));
        }
    }

    #[test]
    fn test_maintenance_message_falls_back_to_default() {
        let mut flags = maintenance();
        flags.maintenance_message = Some("  ".to_owned());
        assert_eq!(
            gate(None, Area::Public, &flags),
            Err(Denial::Maintenance(
                PlatformFlags::DEFAULT_MAINTENANCE_MESSAGE.to_owned()
            ))
        );

        flags.maintenance_message = Some("Back at 5pm".to_owned());
        assert_eq!(
            gate(None, Area::Public, &flags),
            Err(Denial::Maintenance("Back at 5pm".to_owned()))
        );
    }

    #[test]
    fn test_checkout_and_registration_locks() {
        let flags = PlatformFlags {
            checkout_locked: true,
            registration_locked: true,
            ..PlatformFlags::default()
        };
        assert_eq!(
            gate(Some(Role::Customer), Area::Checkout, &flags),
            Err(Denial::CheckoutLocked)
        );
        assert_eq!(
            gate(None, Area::Registration, &flags),
            Err(Denial::RegistrationLocked)
        );
        assert_eq!(gate(Some(Role::Customer), Area::Account, &flags), Ok(()));
    }

    #[test]
    fn test_anonymous_access() {
        let flags = PlatformFlags::default();
        assert_eq!(gate(None, Area::Public, &flags), Ok(()));
        assert_eq!(gate(None, Area::Registration, &flags), Ok(()));
        assert_eq!(gate(None, Area::Checkout, &flags), Err(Denial::Unauthenticated));
        assert_eq!(
            gate(None, Area::SellerDashboard, &flags),
            Err(Denial::Unauthenticated)
        );
    }

    #[test]
    fn test_dashboard_role_matrix() {
        let flags = PlatformFlags::default();
        let allowed = |role, area| gate(Some(role), area, &flags).is_ok();

        assert!(allowed(Role::Seller, Area::SellerDashboard));
        assert!(!allowed(Role::Customer, Area::SellerDashboard));
        assert!(allowed(Role::Editor, Area::EditorDashboard));
        assert!(!allowed(Role::Seller, Area::EditorDashboard));
        assert!(allowed(Role::ContentManager, Area::ContentDashboard));
        assert!(!allowed(Role::Editor, Area::ContentDashboard));
        assert!(!allowed(Role::Editor, Area::AdminDashboard));
        assert!(allowed(Role::Admin, Area::ContentDashboard));
    }

    #[test]
    fn test_partial_settings_deserialize_unlocked() {
        let flags: PlatformFlags =
            serde_json::from_str(r#"{"checkout_locked": true}"#).expect("valid json");
        assert!(flags.checkout_locked);
        assert!(!flags.maintenance_mode);
        assert!(flags.updated_at.is_none());
    }
}
