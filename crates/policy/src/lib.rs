//! Token lifetime policy engine.
//!
//! Pure, infallible, read-only consumer of role and device-trust state. The
//! role × device-state rules live in one declarative table so they can be
//! audited and extended without touching calling code.

use devtrust_models::{Role, TokenPolicy};

/// One row of the lifetime policy table.
#[derive(Debug, Clone, Copy)]
pub struct PolicyRule {
    pub role: Role,
    /// Lifetime for a never-seen device, in minutes.
    pub new_device_minutes: i64,
    /// Lifetime for an explicitly trusted device, in minutes.
    pub trusted_device_minutes: i64,
    /// MFA requirement is a function of role alone.
    pub requires_mfa: bool,
}

/// The complete lifetime policy, one rule per role.
pub const POLICY_TABLE: &[PolicyRule] = &[
    PolicyRule {
        role: Role::SuperAdmin,
        new_device_minutes: 10,
        trusted_device_minutes: 15,
        requires_mfa: true,
    },
    PolicyRule {
        role: Role::Admin,
        new_device_minutes: 15,
        trusted_device_minutes: 30,
        requires_mfa: true,
    },
    PolicyRule {
        role: Role::Moderator,
        new_device_minutes: 20,
        trusted_device_minutes: 30,
        requires_mfa: true,
    },
    PolicyRule {
        role: Role::User,
        new_device_minutes: 20,
        trusted_device_minutes: 30,
        requires_mfa: false,
    },
    PolicyRule {
        role: Role::Guest,
        new_device_minutes: 5,
        trusted_device_minutes: 10,
        requires_mfa: false,
    },
];

/// Compute the token policy for one issuance.
///
/// A device that is neither new nor trusted falls back to the "new device"
/// lifetime: the shorter window is the conservative default. Device novelty
/// never forces MFA on its own; it only narrows the window before MFA can
/// be completed.
pub fn compute_policy(role: Role, is_new_device: bool, is_device_trusted: bool) -> TokenPolicy {
    let rule = POLICY_TABLE
        .iter()
        .find(|rule| rule.role == role)
        .unwrap_or(&POLICY_TABLE[POLICY_TABLE.len() - 1]);

    let lifetime_minutes = if is_device_trusted && !is_new_device {
        rule.trusted_device_minutes
    } else {
        rule.new_device_minutes
    };

    TokenPolicy {
        role,
        lifetime_minutes,
        requires_mfa: rule.requires_mfa,
        is_new_device,
        is_device_trusted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_role() {
        for role in [
            Role::SuperAdmin,
            Role::Admin,
            Role::Moderator,
            Role::User,
            Role::Guest,
        ] {
            assert!(POLICY_TABLE.iter().any(|rule| rule.role == role));
        }
    }

    #[test]
    fn super_admin_on_new_device() {
        let policy = compute_policy(Role::SuperAdmin, true, false);
        assert_eq!(policy.lifetime_minutes, 10);
        assert!(policy.requires_mfa);
    }

    #[test]
    fn guest_on_trusted_device() {
        let policy = compute_policy(Role::Guest, false, true);
        assert_eq!(policy.lifetime_minutes, 10);
        assert!(!policy.requires_mfa);
    }

    #[test]
    fn neither_new_nor_trusted_uses_shorter_window() {
        let policy = compute_policy(Role::Admin, false, false);
        assert_eq!(policy.lifetime_minutes, 15);
    }

    #[test]
    fn trusted_but_also_new_stays_conservative() {
        // A first sighting cannot ride a trusted lifetime.
        let policy = compute_policy(Role::User, true, true);
        assert_eq!(policy.lifetime_minutes, 20);
    }

    #[test]
    fn mfa_requirement_ignores_device_state() {
        for (new, trusted) in [(true, false), (false, true), (false, false)] {
            assert!(compute_policy(Role::Moderator, new, trusted).requires_mfa);
            assert!(!compute_policy(Role::User, new, trusted).requires_mfa);
        }
    }

    #[test]
    fn full_table_matches_policy_document() {
        let expected = [
            (Role::SuperAdmin, 10, 15, true),
            (Role::Admin, 15, 30, true),
            (Role::Moderator, 20, 30, true),
            (Role::User, 20, 30, false),
            (Role::Guest, 5, 10, false),
        ];

        for (role, new_min, trusted_min, mfa) in expected {
            assert_eq!(compute_policy(role, true, false).lifetime_minutes, new_min);
            assert_eq!(
                compute_policy(role, false, true).lifetime_minutes,
                trusted_min
            );
            assert_eq!(compute_policy(role, true, false).requires_mfa, mfa);
        }
    }
}
