//! Room service orchestrator
//!
//! The write path for every room operation: runs the access evaluator,
//! commits the mutation under the owner's shard lock, and publishes the
//! corresponding events before the lock is released so subscribers see
//! them in commit order.

use super::access_list::AccessMode;
use super::room::{Room, RoomError, SettingsPatch};
use super::store::{RoomShard, RoomStore};
use super::types::{DoorState, PresenceMode, Timestamp, UserId, VisitorListMode};
use crate::config::RoomsConfig;
use crate::core_access::{evaluate, AccessDecision, BlockedReason, Evaluation, TierPolicy, TierProvider};
use crate::core_events::{AccessListChange, EventBus, RoomEvent};
use crate::core_knock::{Knock, KnockError, KnockRateLimiter, KnockStatus, RateLimiterConfig};
use crate::core_presence::{OwnerSession, SessionError, Visitor};
use crate::shutdown::ShutdownCoordinator;
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why an action was forbidden, precise enough to render a specific message
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForbiddenReason {
    #[error("This room is not available to you")]
    NotVisible,

    #[error("The door is locked")]
    DoorLocked,

    #[error("The owner does not want to be disturbed")]
    DoorDnd,

    #[error("The owner is not in their room")]
    OwnerAway,

    #[error("You are not permitted to knock here")]
    KnockNotPermitted,

    #[error("Entry requires an approved knock")]
    EntryNotPermitted,
}

impl From<BlockedReason> for ForbiddenReason {
    fn from(reason: BlockedReason) -> Self {
        match reason {
            BlockedReason::DoorLocked => ForbiddenReason::DoorLocked,
            BlockedReason::DoorDnd => ForbiddenReason::DoorDnd,
            BlockedReason::OwnerAway => ForbiddenReason::OwnerAway,
        }
    }
}

/// Room service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Forbidden(ForbiddenReason),

    #[error("No room exists for user {0}")]
    RoomNotFound(UserId),

    #[error(transparent)]
    Knock(#[from] KnockError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Owner's view of their own room
#[derive(Debug, Clone, Serialize)]
pub struct OwnerRoomView {
    pub room: Room,
    pub session: SessionView,
    pub pending_knocks: Vec<Knock>,
}

/// Session summary inside views
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub is_active: bool,
    pub started_at: Option<Timestamp>,
    pub visitors: Vec<Visitor>,
}

impl SessionView {
    fn from_shard(shard: &RoomShard) -> Self {
        match &shard.session {
            Some(session) => {
                let mut visitors: Vec<Visitor> = session.visitors.values().cloned().collect();
                visitors.sort_by_key(|v| v.joined_at);
                SessionView {
                    is_active: true,
                    started_at: Some(session.started_at),
                    visitors,
                }
            }
            None => SessionView {
                is_active: false,
                started_at: None,
                visitors: Vec::new(),
            },
        }
    }
}

/// A visitor's status view of someone else's room
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatusView {
    pub owner_id: UserId,
    pub door_state: DoorState,
    pub decision: AccessDecision,
    pub blocked: Option<BlockedReason>,
    /// None when the owner ghosts their presence for this viewer
    pub owner_present: Option<bool>,
    /// None when the visitor list is hidden from this viewer
    pub visitor_count: Option<usize>,
    pub visitors: Option<Vec<Visitor>>,
    pub my_status: MyStatus,
}

/// The viewer's own relationship to the room
#[derive(Debug, Clone, Serialize)]
pub struct MyStatus {
    pub inside: bool,
    pub knock: Option<Knock>,
}

/// Outcome of a knock resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnockAction {
    Approve,
    Deny,
}

/// The Peoples Room service: store + evaluator + knock workflow +
/// presence tracking + event publication behind one API.
pub struct RoomService {
    store: RoomStore,
    policy: TierPolicy,
    tiers: Arc<dyn TierProvider>,
    limiter: Mutex<KnockRateLimiter>,
    bus: EventBus,
    config: RoomsConfig,
}

impl RoomService {
    pub fn new(config: RoomsConfig, policy: TierPolicy, tiers: Arc<dyn TierProvider>) -> Self {
        let limiter = KnockRateLimiter::new(RateLimiterConfig {
            max_knocks: config.knock_rate_max,
            window: config.knock_rate_window,
        });

        RoomService {
            store: RoomStore::new(policy.known_tiers()),
            policy,
            tiers,
            limiter: Mutex::new(limiter),
            bus: EventBus::new(config.event_buffer),
            config,
        }
    }

    /// The event bus (subscribe-side)
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    async fn evaluate_visitor(&self, shard: &RoomShard, visitor_id: &UserId) -> Evaluation {
        let tier = self
            .tiers
            .tier_for(visitor_id, &shard.room.owner_id)
            .await;
        evaluate(
            &shard.room,
            visitor_id,
            &tier,
            &self.policy,
            shard.owner_present(),
        )
    }

    /// Lapse overdue knocks on a shard and publish their expiry events
    fn sweep_shard(&self, shard: &mut RoomShard, now: Timestamp) {
        for knock in shard.knocks.sweep(now, self.config.knock_history) {
            counter!("peoplesroom_knocks_expired_total").increment(1);
            self.bus.publish(RoomEvent::KnockExpired {
                owner_id: knock.owner_id,
                knock_id: knock.id,
                visitor_id: knock.visitor_id,
            });
        }
    }

    // ------------------------------------------------------------------
    // Owner: room and settings
    // ------------------------------------------------------------------

    /// The owner's room plus live session, creating the room on first access
    pub async fn my_room(&self, owner_id: &UserId) -> OwnerRoomView {
        let shard = self.store.shard(owner_id).await;
        let mut shard = shard.lock().await;
        let now = Timestamp::now();
        self.sweep_shard(&mut shard, now);

        OwnerRoomView {
            room: shard.room.clone(),
            session: SessionView::from_shard(&shard),
            pending_knocks: shard.knocks.pending(now).into_iter().cloned().collect(),
        }
    }

    /// Apply a partial settings update to the owner's room
    pub async fn update_settings(
        &self,
        owner_id: &UserId,
        patch: SettingsPatch,
    ) -> ServiceResult<Room> {
        let shard = self.store.shard(owner_id).await;
        let mut shard = shard.lock().await;

        let door_before = shard.room.door_state;
        let changed = shard.room.apply_settings(patch);
        let door_after = shard.room.door_state;

        if door_before != door_after {
            self.publish_door_event(owner_id, door_after);
        }
        if changed {
            debug!(owner = %owner_id, "room settings updated");
            self.bus.publish(RoomEvent::SettingsChanged {
                owner_id: owner_id.clone(),
            });
        }

        Ok(shard.room.clone())
    }

    /// Lock the door: no new knocks or entries until unlocked.
    /// Visitors already inside are unaffected.
    pub async fn lock_door(&self, owner_id: &UserId) -> ServiceResult<DoorState> {
        self.set_door(owner_id, DoorState::Locked).await
    }

    pub async fn unlock_door(&self, owner_id: &UserId) -> ServiceResult<DoorState> {
        self.set_door(owner_id, DoorState::Open).await
    }

    async fn set_door(&self, owner_id: &UserId, state: DoorState) -> ServiceResult<DoorState> {
        let shard = self.store.shard(owner_id).await;
        let mut shard = shard.lock().await;

        if shard.room.set_door_state(state).is_some() {
            info!(owner = %owner_id, ?state, "door state changed");
            self.publish_door_event(owner_id, state);
        }
        Ok(shard.room.door_state)
    }

    fn publish_door_event(&self, owner_id: &UserId, state: DoorState) {
        let event = match state {
            DoorState::Open => RoomEvent::DoorUnlocked {
                owner_id: owner_id.clone(),
            },
            DoorState::Locked | DoorState::DoNotDisturb => RoomEvent::DoorLocked {
                owner_id: owner_id.clone(),
                door_state: state,
            },
        };
        self.bus.publish(event);
    }

    // ------------------------------------------------------------------
    // Owner: access list
    // ------------------------------------------------------------------

    pub async fn set_access_entry(
        &self,
        owner_id: &UserId,
        subject_id: UserId,
        access_mode: AccessMode,
        notes: Option<String>,
    ) -> ServiceResult<()> {
        let shard = self.store.shard(owner_id).await;
        let mut shard = shard.lock().await;

        shard
            .room
            .upsert_access_entry(subject_id.clone(), access_mode, notes);
        self.bus.publish(RoomEvent::AccessListUpdated {
            owner_id: owner_id.clone(),
            subject_id,
            change: AccessListChange::Set,
        });
        Ok(())
    }

    pub async fn remove_access_entry(
        &self,
        owner_id: &UserId,
        subject_id: &UserId,
    ) -> ServiceResult<()> {
        let shard = self.store.shard(owner_id).await;
        let mut shard = shard.lock().await;

        shard.room.remove_access_entry(subject_id)?;
        self.bus.publish(RoomEvent::AccessListUpdated {
            owner_id: owner_id.clone(),
            subject_id: subject_id.clone(),
            change: AccessListChange::Removed,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Owner: session lifecycle
    // ------------------------------------------------------------------

    /// Owner enters their room. Explicit conflict if already inside.
    pub async fn start_session(&self, owner_id: &UserId) -> ServiceResult<SessionView> {
        let shard = self.store.shard(owner_id).await;
        let mut shard = shard.lock().await;

        if shard.session.is_some() {
            return Err(SessionError::AlreadyActive.into());
        }

        let now = Timestamp::now();
        shard.session = Some(OwnerSession::new(now));
        info!(owner = %owner_id, "session started");
        counter!("peoplesroom_sessions_started_total").increment(1);
        self.bus.publish(RoomEvent::SessionStarted {
            owner_id: owner_id.clone(),
            started_at: now,
        });

        Ok(SessionView::from_shard(&shard))
    }

    /// Owner exits: every visitor is evicted (a leave event each), then
    /// the session ends.
    pub async fn end_session(&self, owner_id: &UserId) -> ServiceResult<()> {
        let shard = self
            .store
            .shard_if_exists(owner_id)
            .await
            .ok_or_else(|| ServiceError::RoomNotFound(owner_id.clone()))?;
        let mut shard = shard.lock().await;

        let mut session = shard.session.take().ok_or(SessionError::NotActive)?;
        let evicted = session.drain_visitors();
        info!(owner = %owner_id, evicted = evicted.len(), "session ended");

        for visitor in evicted {
            self.bus.publish(RoomEvent::VisitorLeft {
                owner_id: owner_id.clone(),
                visitor_id: visitor.user_id,
            });
        }
        self.bus.publish(RoomEvent::SessionEnded {
            owner_id: owner_id.clone(),
        });

        Ok(())
    }

    // ------------------------------------------------------------------
    // Visitor: status, knock, enter, leave
    // ------------------------------------------------------------------

    /// Status view of a room for a given viewer. The evaluator runs fresh;
    /// presence and the visitor list are filtered by the room's modes.
    pub async fn room_status(
        &self,
        owner_id: &UserId,
        viewer_id: &UserId,
    ) -> ServiceResult<RoomStatusView> {
        let shard = self
            .store
            .shard_if_exists(owner_id)
            .await
            .ok_or_else(|| ServiceError::RoomNotFound(owner_id.clone()))?;
        let mut shard = shard.lock().await;
        self.sweep_shard(&mut shard, Timestamp::now());

        let evaluation = self.evaluate_visitor(&shard, viewer_id).await;
        if !evaluation.may_view() {
            return Err(ServiceError::Forbidden(ForbiddenReason::NotVisible));
        }

        let is_owner = viewer_id == owner_id;
        let present = shard.owner_present();

        let owner_present = if is_owner || shard.room.presence_mode == PresenceMode::PublicPresence
        {
            Some(present)
        } else {
            None
        };

        let inside = shard
            .session
            .as_ref()
            .map(|s| s.contains(viewer_id))
            .unwrap_or(false);

        let may_list = is_owner
            || match shard.room.show_visitor_list_mode {
                VisitorListMode::Everyone => true,
                VisitorListMode::VisitorsOnly => inside,
                VisitorListMode::OwnerOnly => false,
            };
        let (visitor_count, visitors) = if may_list {
            let view = SessionView::from_shard(&shard);
            (Some(view.visitors.len()), Some(view.visitors))
        } else {
            (None, None)
        };

        Ok(RoomStatusView {
            owner_id: owner_id.clone(),
            door_state: shard.room.door_state,
            decision: evaluation.decision,
            blocked: evaluation.blocked,
            owner_present,
            visitor_count,
            visitors,
            my_status: MyStatus {
                inside,
                knock: shard.knocks.get(viewer_id).cloned(),
            },
        })
    }

    /// Create a knock on someone's door
    pub async fn create_knock(
        &self,
        owner_id: &UserId,
        visitor_id: &UserId,
        message: Option<String>,
    ) -> ServiceResult<Knock> {
        // Owners do not knock on their own door
        if visitor_id == owner_id {
            return Err(ServiceError::Forbidden(ForbiddenReason::KnockNotPermitted));
        }

        let shard = self
            .store
            .shard_if_exists(owner_id)
            .await
            .ok_or_else(|| ServiceError::RoomNotFound(owner_id.clone()))?;
        let mut shard = shard.lock().await;
        let now = Timestamp::now();
        self.sweep_shard(&mut shard, now);

        let tier = self.tiers.tier_for(visitor_id, owner_id).await;
        let evaluation = evaluate(
            &shard.room,
            visitor_id,
            &tier,
            &self.policy,
            shard.owner_present(),
        );

        if !evaluation.may_view() {
            counter!("peoplesroom_denials_total").increment(1);
            return Err(ServiceError::Forbidden(ForbiddenReason::NotVisible));
        }
        match evaluation.blocked {
            Some(BlockedReason::DoorLocked) => {
                counter!("peoplesroom_denials_total").increment(1);
                return Err(ServiceError::Forbidden(ForbiddenReason::DoorLocked));
            }
            Some(BlockedReason::DoorDnd) => {
                counter!("peoplesroom_denials_total").increment(1);
                return Err(ServiceError::Forbidden(ForbiddenReason::DoorDnd));
            }
            // Knocking while the owner is away is fine
            Some(BlockedReason::OwnerAway) | None => {}
        }
        if !evaluation.may_knock() {
            counter!("peoplesroom_denials_total").increment(1);
            return Err(ServiceError::Forbidden(ForbiddenReason::KnockNotPermitted));
        }

        // Duplicate check precedes the rate limiter so a repeated knock
        // does not burn budget
        if let Some(existing) = shard.knocks.get(visitor_id) {
            if existing.is_live(now) {
                return Err(KnockError::AlreadyPending.into());
            }
        }

        let knock = Knock::new(
            owner_id.clone(),
            visitor_id.clone(),
            tier,
            message,
            now,
            self.config.knock_ttl,
        )?;

        {
            let mut limiter = self.limiter.lock().await;
            if let Err(retry_after) = limiter.check_and_record(visitor_id, now) {
                warn!(visitor = %visitor_id, "knock rate limited");
                return Err(KnockError::RateLimited {
                    retry_after_secs: retry_after.as_secs(),
                }
                .into());
            }
        }

        let knock = shard.knocks.insert(knock, now)?.clone();
        debug!(owner = %owner_id, visitor = %visitor_id, knock = %knock.id, "knock created");
        counter!("peoplesroom_knocks_created_total").increment(1);
        self.bus.publish(RoomEvent::KnockCreated {
            owner_id: owner_id.clone(),
            knock_id: knock.id.clone(),
            visitor_id: visitor_id.clone(),
            message: knock.message.clone(),
            expires_at: knock.expires_at,
        });

        Ok(knock)
    }

    /// Owner resolves a pending knock. Approving with `remember` promotes
    /// the visitor to a standing DIRECT_ENTRY rule in the same commit.
    pub async fn respond_knock(
        &self,
        owner_id: &UserId,
        visitor_id: &UserId,
        action: KnockAction,
        remember: bool,
    ) -> ServiceResult<Knock> {
        let shard = self
            .store
            .shard_if_exists(owner_id)
            .await
            .ok_or(KnockError::NotFound)?;
        let mut shard = shard.lock().await;
        let now = Timestamp::now();
        self.sweep_shard(&mut shard, now);

        let knock = shard.knocks.get_mut(visitor_id).ok_or(KnockError::NotFound)?;
        match action {
            KnockAction::Approve => knock.approve(now)?,
            KnockAction::Deny => knock.deny(now)?,
        }
        let knock = knock.clone();

        match action {
            KnockAction::Approve => {
                if remember {
                    shard
                        .room
                        .upsert_access_entry(visitor_id.clone(), AccessMode::DirectEntry, None);
                    self.bus.publish(RoomEvent::AccessListUpdated {
                        owner_id: owner_id.clone(),
                        subject_id: visitor_id.clone(),
                        change: AccessListChange::Set,
                    });
                }
                info!(owner = %owner_id, visitor = %visitor_id, remember, "knock approved");
                counter!("peoplesroom_knocks_approved_total").increment(1);
                self.bus.publish(RoomEvent::KnockApproved {
                    owner_id: owner_id.clone(),
                    knock_id: knock.id.clone(),
                    visitor_id: visitor_id.clone(),
                    remembered: remember,
                });
            }
            KnockAction::Deny => {
                info!(owner = %owner_id, visitor = %visitor_id, "knock denied");
                counter!("peoplesroom_knocks_denied_total").increment(1);
                self.bus.publish(RoomEvent::KnockDenied {
                    owner_id: owner_id.clone(),
                    knock_id: knock.id.clone(),
                    visitor_id: visitor_id.clone(),
                });
            }
        }

        Ok(knock)
    }

    /// Live knocks waiting on the owner
    pub async fn pending_knocks(&self, owner_id: &UserId) -> ServiceResult<Vec<Knock>> {
        let shard = self
            .store
            .shard_if_exists(owner_id)
            .await
            .ok_or_else(|| ServiceError::RoomNotFound(owner_id.clone()))?;
        let mut shard = shard.lock().await;
        let now = Timestamp::now();
        self.sweep_shard(&mut shard, now);

        Ok(shard.knocks.pending(now).into_iter().cloned().collect())
    }

    /// Visitor enters a room: fresh CAN_ENTER_DIRECT, or an approved
    /// unconsumed knock. The door gate applies either way, and the owner
    /// must be in.
    pub async fn enter_room(
        &self,
        owner_id: &UserId,
        visitor_id: &UserId,
    ) -> ServiceResult<Visitor> {
        // Owners occupy their room through the session, not as visitors
        if visitor_id == owner_id {
            return Err(ServiceError::Forbidden(ForbiddenReason::EntryNotPermitted));
        }

        let shard = self
            .store
            .shard_if_exists(owner_id)
            .await
            .ok_or_else(|| ServiceError::RoomNotFound(owner_id.clone()))?;
        let mut shard = shard.lock().await;
        let now = Timestamp::now();
        self.sweep_shard(&mut shard, now);

        let tier = self.tiers.tier_for(visitor_id, owner_id).await;
        let evaluation = evaluate(
            &shard.room,
            visitor_id,
            &tier,
            &self.policy,
            shard.owner_present(),
        );

        if !evaluation.may_view() {
            return Err(ServiceError::Forbidden(ForbiddenReason::NotVisible));
        }
        if let Some(reason @ (BlockedReason::DoorLocked | BlockedReason::DoorDnd)) =
            evaluation.blocked
        {
            counter!("peoplesroom_denials_total").increment(1);
            return Err(ServiceError::Forbidden(reason.into()));
        }
        if !shard.owner_present() {
            return Err(ServiceError::Forbidden(ForbiddenReason::OwnerAway));
        }

        if !evaluation.may_enter_direct() {
            // Fall back to a knock approval
            let approved = shard
                .knocks
                .get_mut(visitor_id)
                .filter(|k| k.status == KnockStatus::Approved && !k.consumed);
            match approved {
                Some(knock) => knock.consume()?,
                None => {
                    counter!("peoplesroom_denials_total").increment(1);
                    return Err(ServiceError::Forbidden(ForbiddenReason::EntryNotPermitted));
                }
            }
        }

        let session = shard.session.as_mut().ok_or(SessionError::NotActive)?;
        let visitor = session.add_visitor(visitor_id.clone(), tier, now)?;
        debug!(owner = %owner_id, visitor = %visitor_id, "visitor entered");
        counter!("peoplesroom_entries_total").increment(1);
        self.bus.publish(RoomEvent::VisitorEntered {
            owner_id: owner_id.clone(),
            visitor: visitor.clone(),
        });

        Ok(visitor)
    }

    /// Visitor leaves. Idempotent: leaving a room you are not in is a no-op.
    pub async fn leave_room(&self, owner_id: &UserId, visitor_id: &UserId) -> ServiceResult<()> {
        let Some(shard) = self.store.shard_if_exists(owner_id).await else {
            return Ok(());
        };
        let mut shard = shard.lock().await;

        let left = shard
            .session
            .as_mut()
            .and_then(|s| s.remove_visitor(visitor_id));
        if left.is_some() {
            self.bus.publish(RoomEvent::VisitorLeft {
                owner_id: owner_id.clone(),
                visitor_id: visitor_id.clone(),
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Background maintenance
    // ------------------------------------------------------------------

    /// Expire overdue knocks and prune idle limiter/bus state until shutdown
    pub fn spawn_expiry_sweep(
        self: &Arc<Self>,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.config.sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        service.sweep_all(Timestamp::now()).await;
                    }
                    _ = shutdown.wait_for_shutdown() => {
                        info!("expiry sweep stopping");
                        break;
                    }
                }
            }
        })
    }

    async fn sweep_all(&self, now: Timestamp) {
        for owner_id in self.store.owners().await {
            if let Some(shard) = self.store.shard_if_exists(&owner_id).await {
                let mut shard = shard.lock().await;
                self.sweep_shard(&mut shard, now);
            }
        }
        self.limiter.lock().await.prune(now);
        self.bus.prune();
    }

    /// Test-only hook: run one sweep pass at a chosen instant
    #[cfg(test)]
    pub(crate) async fn sweep_now(&self, now: Timestamp) {
        self.sweep_all(now).await;
    }
}
