//! Access Control Evaluator
//!
//! Pure decision logic combining a room's rules, its access list, and a
//! visitor's trust tier. Re-run at the moment of every stateful action
//! (view, knock, enter); decisions are never cached across a visit.
//!
//! Precedence, first match wins:
//! 1. Access-list entry for the visitor (NEVER_ALLOW / DIRECT_ENTRY / MUST_KNOCK)
//! 2. Tier default: membership in `visible_to_tiers`, then the policy table
//! 3. Door-state gate (LOCKED/DND) — absolute, not overridable by the access list
//! 4. Owner-presence gate — entry needs an active session; knocking does not

use super::policy::{EntryMode, TierPolicy};
use crate::core_room::access_list::AccessMode;
use crate::core_room::room::Room;
use crate::core_room::types::{DoorState, TierLabel, UserId};
use serde::{Deserialize, Serialize};

/// What the visitor may do with the room right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessDecision {
    /// The room does not exist as far as this visitor is concerned
    NoVisibility,
    /// Room is visible but no knock or entry is currently possible
    VisibleOnly,
    /// Visitor may request entry
    CanKnock,
    /// Visitor may enter without knocking
    CanEnterDirect,
}

/// Why a gate (rather than the rules) is blocking knock/entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockedReason {
    DoorLocked,
    DoorDnd,
    OwnerAway,
}

/// Evaluator output: final capability plus the gate that limited it, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub decision: AccessDecision,
    pub blocked: Option<BlockedReason>,
}

impl Evaluation {
    fn ungated(decision: AccessDecision) -> Self {
        Evaluation { decision, blocked: None }
    }

    pub fn may_view(&self) -> bool {
        self.decision > AccessDecision::NoVisibility
    }

    pub fn may_knock(&self) -> bool {
        self.decision >= AccessDecision::CanKnock
    }

    pub fn may_enter_direct(&self) -> bool {
        self.decision == AccessDecision::CanEnterDirect && self.blocked.is_none()
    }
}

/// Evaluate a visitor against a room.
///
/// `owner_present` is whether the owner currently has an active session.
/// The owner of the room is always `CAN_ENTER_DIRECT` in their own room.
pub fn evaluate(
    room: &Room,
    visitor_id: &UserId,
    visitor_tier: &TierLabel,
    policy: &TierPolicy,
    owner_present: bool,
) -> Evaluation {
    if visitor_id == &room.owner_id {
        return Evaluation::ungated(AccessDecision::CanEnterDirect);
    }

    // Steps 1-2: access-list override, else tier default
    let base = match room.access_entry(visitor_id).map(|e| e.access_mode) {
        Some(AccessMode::NeverAllow) => {
            return Evaluation::ungated(AccessDecision::NoVisibility);
        }
        Some(AccessMode::DirectEntry) => AccessDecision::CanEnterDirect,
        Some(AccessMode::MustKnock) => AccessDecision::CanKnock,
        None => {
            if !room.visible_to_tiers.contains(visitor_tier) {
                return Evaluation::ungated(AccessDecision::NoVisibility);
            }
            match policy.default_mode(visitor_tier) {
                Some(EntryMode::DirectEntry) => AccessDecision::CanEnterDirect,
                Some(EntryMode::Knock) => AccessDecision::CanKnock,
                // Tier unknown to the policy table
                None => return Evaluation::ungated(AccessDecision::NoVisibility),
            }
        }
    };

    // Step 3: door gate, absolute
    match room.door_state {
        DoorState::Locked => {
            return Evaluation {
                decision: AccessDecision::VisibleOnly,
                blocked: Some(BlockedReason::DoorLocked),
            };
        }
        DoorState::DoNotDisturb => {
            return Evaluation {
                decision: AccessDecision::VisibleOnly,
                blocked: Some(BlockedReason::DoorDnd),
            };
        }
        DoorState::Open => {}
    }

    // Step 4: entry needs the owner in the room; knocking does not
    if base == AccessDecision::CanEnterDirect && !owner_present {
        return Evaluation {
            decision: AccessDecision::CanKnock,
            blocked: Some(BlockedReason::OwnerAway),
        };
    }

    Evaluation::ungated(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_room::types::DoorState;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn room_visible_to(labels: &[&str]) -> Room {
        let tiers: HashSet<TierLabel> = labels.iter().map(|l| TierLabel::new(*l)).collect();
        Room::new(UserId::new("alice"), tiers)
    }

    fn peoples() -> TierLabel {
        TierLabel::new("PEOPLES")
    }

    fn others() -> TierLabel {
        TierLabel::new("OTHERS")
    }

    #[test]
    fn test_owner_always_enters_own_room() {
        let mut room = room_visible_to(&[]);
        room.door_state = DoorState::Locked;

        let eval = evaluate(
            &room,
            &UserId::new("alice"),
            &others(),
            &TierPolicy::standard(),
            false,
        );
        assert_eq!(eval.decision, AccessDecision::CanEnterDirect);
    }

    #[test]
    fn test_tier_defaults() {
        let room = room_visible_to(&["PEOPLES", "OTHERS"]);
        let policy = TierPolicy::standard();
        let bob = UserId::new("bob");

        let close = evaluate(&room, &bob, &peoples(), &policy, true);
        assert_eq!(close.decision, AccessDecision::CanEnterDirect);

        let distant = evaluate(&room, &bob, &others(), &policy, true);
        assert_eq!(distant.decision, AccessDecision::CanKnock);
    }

    #[test]
    fn test_tier_not_visible() {
        let room = room_visible_to(&["PEOPLES"]);
        let eval = evaluate(
            &room,
            &UserId::new("bob"),
            &others(),
            &TierPolicy::standard(),
            true,
        );
        assert_eq!(eval.decision, AccessDecision::NoVisibility);
        assert!(!eval.may_view());
    }

    #[test]
    fn test_unknown_tier_is_invisible() {
        let mut room = room_visible_to(&["PEOPLES"]);
        room.visible_to_tiers.insert(TierLabel::new("MYSTERY"));

        let eval = evaluate(
            &room,
            &UserId::new("bob"),
            &TierLabel::new("MYSTERY"),
            &TierPolicy::standard(),
            true,
        );
        assert_eq!(eval.decision, AccessDecision::NoVisibility);
    }

    #[test]
    fn test_must_knock_caps_direct_tier() {
        let mut room = room_visible_to(&["PEOPLES"]);
        let bob = UserId::new("bob");
        room.upsert_access_entry(bob.clone(), AccessMode::MustKnock, None);

        let eval = evaluate(&room, &bob, &peoples(), &TierPolicy::standard(), true);
        assert_eq!(eval.decision, AccessDecision::CanKnock);
    }

    #[test]
    fn test_direct_entry_overrides_tier_restriction() {
        // Bob's tier cannot even see the room, but a DIRECT_ENTRY entry wins
        let mut room = room_visible_to(&["PEOPLES"]);
        let bob = UserId::new("bob");
        room.upsert_access_entry(bob.clone(), AccessMode::DirectEntry, None);

        let eval = evaluate(&room, &bob, &others(), &TierPolicy::standard(), true);
        assert_eq!(eval.decision, AccessDecision::CanEnterDirect);
    }

    #[test]
    fn test_door_gate_beats_direct_entry() {
        let mut room = room_visible_to(&["PEOPLES"]);
        let bob = UserId::new("bob");
        room.upsert_access_entry(bob.clone(), AccessMode::DirectEntry, None);
        room.door_state = DoorState::DoNotDisturb;

        let eval = evaluate(&room, &bob, &peoples(), &TierPolicy::standard(), true);
        assert_eq!(eval.decision, AccessDecision::VisibleOnly);
        assert_eq!(eval.blocked, Some(BlockedReason::DoorDnd));
        assert!(!eval.may_knock());
    }

    #[test]
    fn test_locked_and_dnd_report_distinct_reasons() {
        let mut room = room_visible_to(&["OTHERS"]);
        let bob = UserId::new("bob");

        room.door_state = DoorState::Locked;
        let locked = evaluate(&room, &bob, &others(), &TierPolicy::standard(), true);
        assert_eq!(locked.blocked, Some(BlockedReason::DoorLocked));

        room.door_state = DoorState::DoNotDisturb;
        let dnd = evaluate(&room, &bob, &others(), &TierPolicy::standard(), true);
        assert_eq!(dnd.blocked, Some(BlockedReason::DoorDnd));
    }

    #[test]
    fn test_owner_away_demotes_direct_entry_to_knock() {
        let room = room_visible_to(&["PEOPLES"]);
        let eval = evaluate(
            &room,
            &UserId::new("bob"),
            &peoples(),
            &TierPolicy::standard(),
            false,
        );

        assert_eq!(eval.decision, AccessDecision::CanKnock);
        assert_eq!(eval.blocked, Some(BlockedReason::OwnerAway));
        assert!(eval.may_knock());
        assert!(!eval.may_enter_direct());
    }

    #[test]
    fn test_owner_away_leaves_knock_tier_unchanged() {
        let room = room_visible_to(&["OTHERS"]);
        let eval = evaluate(
            &room,
            &UserId::new("bob"),
            &others(),
            &TierPolicy::standard(),
            false,
        );

        assert_eq!(eval.decision, AccessDecision::CanKnock);
        assert_eq!(eval.blocked, None);
    }

    fn arb_door_state() -> impl Strategy<Value = DoorState> {
        prop_oneof![
            Just(DoorState::Open),
            Just(DoorState::Locked),
            Just(DoorState::DoNotDisturb),
        ]
    }

    fn arb_tier() -> impl Strategy<Value = TierLabel> {
        prop_oneof![
            Just(TierLabel::new("PEOPLES")),
            Just(TierLabel::new("OTHERS")),
            Just(TierLabel::new("UNKNOWN")),
        ]
    }

    proptest! {
        /// NEVER_ALLOW dominates every tier, door state, and presence combination
        #[test]
        fn prop_never_allow_dominates(
            door in arb_door_state(),
            tier in arb_tier(),
            owner_present in any::<bool>(),
        ) {
            let mut room = room_visible_to(&["PEOPLES", "OTHERS", "UNKNOWN"]);
            let bob = UserId::new("bob");
            room.upsert_access_entry(bob.clone(), AccessMode::NeverAllow, None);
            room.door_state = door;

            let eval = evaluate(&room, &bob, &tier, &TierPolicy::standard(), owner_present);
            prop_assert_eq!(eval.decision, AccessDecision::NoVisibility);
        }

        /// DIRECT_ENTRY grants entry whenever the door is open and the owner is in
        #[test]
        fn prop_direct_entry_enters_when_open(tier in arb_tier()) {
            let mut room = room_visible_to(&["PEOPLES"]);
            let bob = UserId::new("bob");
            room.upsert_access_entry(bob.clone(), AccessMode::DirectEntry, None);

            let eval = evaluate(&room, &bob, &tier, &TierPolicy::standard(), true);
            prop_assert!(eval.may_enter_direct());
        }

        /// A closed door never lets anything through, whatever the rules say
        #[test]
        fn prop_closed_door_blocks_all(
            tier in arb_tier(),
            owner_present in any::<bool>(),
            locked in any::<bool>(),
        ) {
            let mut room = room_visible_to(&["PEOPLES", "OTHERS", "UNKNOWN"]);
            let bob = UserId::new("bob");
            room.upsert_access_entry(bob.clone(), AccessMode::DirectEntry, None);
            room.door_state = if locked { DoorState::Locked } else { DoorState::DoNotDisturb };

            let eval = evaluate(&room, &bob, &tier, &TierPolicy::standard(), owner_present);
            prop_assert!(!eval.may_knock());
            prop_assert!(!eval.may_enter_direct());
        }
    }
}
