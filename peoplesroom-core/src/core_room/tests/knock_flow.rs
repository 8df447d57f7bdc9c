//! Knock lifecycle scenarios: create, resolve, remember, expiry, rate limit

use super::{service, service_with};
use crate::core_access::{AccessDecision, StaticTierProvider};
use crate::core_knock::{KnockError, KnockStatus, MAX_MESSAGE_CHARS};
use crate::core_room::service::{ForbiddenReason, KnockAction, ServiceError};
use crate::core_room::types::{Timestamp, TierLabel, UserId};
use std::time::Duration;

fn alice() -> UserId {
    UserId::new("alice")
}

fn bob() -> UserId {
    UserId::new("bob")
}

#[tokio::test]
async fn test_knock_approve_remember_then_direct_entry() {
    // Bob knocks, the owner approves with remember=true, and from then
    // on Bob walks in without knocking.
    let svc = service();
    svc.start_session(&alice()).await.unwrap();

    let knock = svc
        .create_knock(&alice(), &bob(), Some("hi".to_string()))
        .await
        .unwrap();
    assert_eq!(knock.status, KnockStatus::Pending);
    assert_eq!(knock.message.as_deref(), Some("hi"));

    let resolved = svc
        .respond_knock(&alice(), &bob(), KnockAction::Approve, true)
        .await
        .unwrap();
    assert_eq!(resolved.status, KnockStatus::Approved);

    // First entry (would have been covered by the approval alone)
    svc.enter_room(&alice(), &bob()).await.unwrap();
    svc.leave_room(&alice(), &bob()).await.unwrap();

    // Later visit: no pending knock required, the remembered rule applies
    let status = svc.room_status(&alice(), &bob()).await.unwrap();
    assert_eq!(status.decision, AccessDecision::CanEnterDirect);

    svc.enter_room(&alice(), &bob()).await.unwrap();
}

#[tokio::test]
async fn test_approval_without_remember_is_single_use() {
    let svc = service();
    svc.start_session(&alice()).await.unwrap();

    svc.create_knock(&alice(), &bob(), None).await.unwrap();
    svc.respond_knock(&alice(), &bob(), KnockAction::Approve, false)
        .await
        .unwrap();

    svc.enter_room(&alice(), &bob()).await.unwrap();
    svc.leave_room(&alice(), &bob()).await.unwrap();

    // The approval was consumed on the first entry
    let result = svc.enter_room(&alice(), &bob()).await;
    assert!(matches!(
        result,
        Err(ServiceError::Forbidden(ForbiddenReason::EntryNotPermitted))
    ));
}

#[tokio::test]
async fn test_denied_knock_does_not_grant_entry() {
    let svc = service();
    svc.start_session(&alice()).await.unwrap();

    svc.create_knock(&alice(), &bob(), None).await.unwrap();
    svc.respond_knock(&alice(), &bob(), KnockAction::Deny, false)
        .await
        .unwrap();

    let result = svc.enter_room(&alice(), &bob()).await;
    assert!(matches!(
        result,
        Err(ServiceError::Forbidden(ForbiddenReason::EntryNotPermitted))
    ));
}

#[tokio::test]
async fn test_duplicate_pending_knock_conflicts() {
    let svc = service();
    svc.my_room(&alice()).await;

    svc.create_knock(&alice(), &bob(), None).await.unwrap();
    let result = svc.create_knock(&alice(), &bob(), None).await;
    assert!(matches!(
        result,
        Err(ServiceError::Knock(KnockError::AlreadyPending))
    ));
}

#[tokio::test]
async fn test_resolving_twice_fails() {
    let svc = service();
    svc.my_room(&alice()).await;

    svc.create_knock(&alice(), &bob(), None).await.unwrap();
    svc.respond_knock(&alice(), &bob(), KnockAction::Deny, false)
        .await
        .unwrap();

    let result = svc
        .respond_knock(&alice(), &bob(), KnockAction::Approve, false)
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Knock(KnockError::AlreadyResolved(
            KnockStatus::Denied
        )))
    ));
}

#[tokio::test]
async fn test_resolving_a_foreign_knock_fails() {
    let svc = service();
    svc.my_room(&alice()).await;
    svc.my_room(&UserId::new("mallory")).await;

    svc.create_knock(&alice(), &bob(), None).await.unwrap();

    // Mallory has no such knock on their board
    let result = svc
        .respond_knock(&UserId::new("mallory"), &bob(), KnockAction::Approve, false)
        .await;
    assert!(matches!(result, Err(ServiceError::Knock(KnockError::NotFound))));
}

#[tokio::test]
async fn test_rate_limit_is_global_across_owners() {
    let svc = service();
    for owner in ["a", "b", "c", "d"] {
        svc.my_room(&UserId::new(owner)).await;
    }

    for owner in ["a", "b", "c"] {
        svc.create_knock(&UserId::new(owner), &bob(), None)
            .await
            .unwrap();
    }

    // 4th knock within the hour, to yet another owner, is rejected
    let result = svc.create_knock(&UserId::new("d"), &bob(), None).await;
    match result {
        Err(ServiceError::Knock(KnockError::RateLimited { retry_after_secs })) => {
            assert!(retry_after_secs <= 3600);
        }
        other => panic!("expected RateLimited, got {:?}", other.map(|k| k.status)),
    }

    // Carol's budget is untouched
    assert!(svc
        .create_knock(&UserId::new("a"), &UserId::new("carol"), None)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_message_bound() {
    let svc = service();
    svc.my_room(&alice()).await;

    let result = svc
        .create_knock(&alice(), &bob(), Some("x".repeat(MAX_MESSAGE_CHARS + 1)))
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::Knock(KnockError::MessageTooLong(_)))
    ));

    // Empty message is fine
    assert!(svc.create_knock(&alice(), &bob(), None).await.is_ok());
}

#[tokio::test]
async fn test_sweep_expires_pending_knocks() {
    let svc = service();
    svc.my_room(&alice()).await;
    let mut rx = svc.bus().subscribe(&alice());

    svc.create_knock(&alice(), &bob(), None).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().kind(), "KNOCK_CREATED");

    // Run the sweep as if 31 minutes have passed
    let future = Timestamp::now().plus(Duration::from_secs(31 * 60));
    svc.sweep_now(future).await;

    assert_eq!(rx.recv().await.unwrap().kind(), "KNOCK_EXPIRED");

    // The lapsed knock can no longer be approved
    let result = svc
        .respond_knock(&alice(), &bob(), KnockAction::Approve, false)
        .await;
    assert!(matches!(result, Err(ServiceError::Knock(KnockError::Expired))));

    assert!(svc.pending_knocks(&alice()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pending_knocks_listed_for_owner() {
    let svc = service();
    svc.my_room(&alice()).await;

    svc.create_knock(&alice(), &bob(), Some("one".into()))
        .await
        .unwrap();
    svc.create_knock(&alice(), &UserId::new("carol"), Some("two".into()))
        .await
        .unwrap();

    let pending = svc.pending_knocks(&alice()).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|k| k.status == KnockStatus::Pending));
}

#[tokio::test]
async fn test_knock_while_owner_away_is_allowed() {
    // Even a direct-entry visitor can only knock when the owner is out
    let mut provider = StaticTierProvider::new(TierLabel::new("OTHERS"));
    provider.set(bob(), alice(), TierLabel::new("PEOPLES"));
    let svc = service_with(provider);

    svc.my_room(&alice()).await;

    let status = svc.room_status(&alice(), &bob()).await.unwrap();
    assert_eq!(status.decision, AccessDecision::CanKnock);

    assert!(svc.create_knock(&alice(), &bob(), None).await.is_ok());
}

#[tokio::test]
async fn test_knock_events_scoped_to_room() {
    let svc = service();
    svc.my_room(&alice()).await;
    let mut rx = svc.bus().subscribe(&alice());

    svc.create_knock(&alice(), &bob(), Some("hello".into()))
        .await
        .unwrap();
    svc.respond_knock(&alice(), &bob(), KnockAction::Approve, true)
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap().kind(), "KNOCK_CREATED");
    // remember=true writes the access list before the approval event
    assert_eq!(rx.recv().await.unwrap().kind(), "ACCESS_LIST_UPDATED");
    assert_eq!(rx.recv().await.unwrap().kind(), "KNOCK_APPROVED");
}
