//! Session lifecycle rules as the server applies them on each request.
//!
//! These run without a database: they walk a tracked session through the
//! inactivity policy and the access gate the way the session activity and
//! platform gate middleware do.

use bazaar_core::{
    Area, Denial, ExpiryKind, InactivityPolicy, PlatformFlags, Role, SessionEndReason,
    SessionVerdict, gate,
};
use chrono::{DateTime, Duration, Utc};

fn start() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_767_225_600, 0).expect("valid timestamp")
}

// =============================================================================
// Inactivity
// =============================================================================

#[test]
fn test_regular_activity_keeps_session_alive_until_max_age() {
    let policy = InactivityPolicy::new(Duration::minutes(30), Duration::hours(2));
    let started = start();
    let mut last = started;

    // A request every 20 minutes never trips the idle timeout.
    for step in 1..6 {
        let now = started + Duration::minutes(20 * step);
        match policy.evaluate(started, last, now) {
            SessionVerdict::Active { needs_touch } => {
                assert!(needs_touch, "20 minutes idle should refresh activity");
                last = now;
            }
            SessionVerdict::Expired(kind) => panic!("expired early at step {step}: {kind:?}"),
        }
    }

    let now = started + Duration::hours(2);
    assert_eq!(
        policy.evaluate(started, last, now),
        SessionVerdict::Expired(ExpiryKind::MaxAge)
    );
}

#[test]
fn test_rapid_requests_do_not_touch_every_time() {
    let policy = InactivityPolicy::default();
    let started = start();

    assert_eq!(
        policy.evaluate(started, started, started + Duration::seconds(5)),
        SessionVerdict::Active { needs_touch: false }
    );
}

#[test]
fn test_idle_session_ends_with_idle_reason() {
    let policy = InactivityPolicy::default();
    let started = start();
    let verdict = policy.evaluate(started, started, started + policy.idle_timeout);

    let SessionVerdict::Expired(kind) = verdict else {
        panic!("expected expiry, got {verdict:?}");
    };
    assert_eq!(SessionEndReason::from(kind), SessionEndReason::IdleTimeout);
}

#[test]
fn test_prune_cutoff_matches_evaluate() {
    let policy = InactivityPolicy::default();
    let now = start() + Duration::hours(1);
    let cutoff = policy.idle_cutoff(now);

    // A session last active exactly at the cutoff is idle-expired by both.
    assert_eq!(
        policy.evaluate(cutoff, cutoff, now),
        SessionVerdict::Expired(ExpiryKind::Idle)
    );
}

// =============================================================================
// Gate
// =============================================================================

#[test]
fn test_maintenance_admits_only_admins() {
    let flags = PlatformFlags {
        maintenance_mode: true,
        maintenance_message: Some("Back at noon".to_owned()),
        ..PlatformFlags::default()
    };

    for role in [
        Role::Customer,
        Role::Seller,
        Role::Editor,
        Role::ContentManager,
    ] {
        assert_eq!(
            gate(Some(role), Area::Public, &flags),
            Err(Denial::Maintenance("Back at noon".to_owned())),
            "{role} should be locked out"
        );
    }
    assert_eq!(
        gate(None, Area::Public, &flags),
        Err(Denial::Maintenance("Back at noon".to_owned()))
    );
    assert_eq!(gate(Some(Role::Admin), Area::AdminDashboard, &flags), Ok(()));
}

#[test]
fn test_checkout_lock_leaves_browsing_open() {
    let flags = PlatformFlags {
        checkout_locked: true,
        ..PlatformFlags::default()
    };

    assert_eq!(gate(Some(Role::Customer), Area::Public, &flags), Ok(()));
    assert_eq!(gate(Some(Role::Customer), Area::Account, &flags), Ok(()));
    assert_eq!(
        gate(Some(Role::Customer), Area::Checkout, &flags),
        Err(Denial::CheckoutLocked)
    );
    assert_eq!(gate(Some(Role::Admin), Area::Checkout, &flags), Ok(()));
}

#[test]
fn test_dashboards_by_role() {
    let flags = PlatformFlags::default();
    let cases = [
        (Role::Seller, Area::SellerDashboard, true),
        (Role::Seller, Area::EditorDashboard, false),
        (Role::Editor, Area::EditorDashboard, true),
        (Role::Editor, Area::ContentDashboard, false),
        (Role::ContentManager, Area::ContentDashboard, true),
        (Role::ContentManager, Area::AdminDashboard, false),
        (Role::Customer, Area::SellerDashboard, false),
        (Role::Admin, Area::SellerDashboard, true),
    ];

    for (role, area, allowed) in cases {
        let result = gate(Some(role), area, &flags);
        if allowed {
            assert_eq!(result, Ok(()), "{role} in {area:?}");
        } else {
            assert_eq!(result, Err(Denial::Forbidden), "{role} in {area:?}");
        }
    }
}
