//! Ride state machine.
//!
//! ```text
//! pending ──confirm──► confirmed ──start──► started ──complete──► completed
//!    │                     │
//!    └───────cancel────────┴──► cancelled
//! ```
//!
//! Every transition is applied in the database as a single conditional update whose `WHERE`
//! clause lists [`Transition::from_states`]. When that update matches no row, another request got
//! there first; [`resolve`] decides whether the caller should see an idempotent success, a
//! conflict, or a not-found.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::types::{CaptainId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RideStatus {
    Pending,
    Confirmed,
    Started,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Statuses in which a rider or captain is still tied to the ride.
    pub const UNFINISHED: [RideStatus; 3] = [RideStatus::Pending, RideStatus::Confirmed, RideStatus::Started];

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Confirmed => "confirmed",
            RideStatus::Started => "started",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_unfinished(&self) -> bool {
        Self::UNFINISHED.contains(self)
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Start,
    Complete,
    Cancel,
}

impl Transition {
    /// States the ride must be in for this transition to apply.
    pub fn from_states(self) -> &'static [RideStatus] {
        match self {
            Transition::Confirm => &[RideStatus::Pending],
            Transition::Start => &[RideStatus::Confirmed],
            Transition::Complete => &[RideStatus::Started],
            Transition::Cancel => &[RideStatus::Pending, RideStatus::Confirmed],
        }
    }

    pub fn target(self) -> RideStatus {
        match self {
            Transition::Confirm => RideStatus::Confirmed,
            Transition::Start => RideStatus::Started,
            Transition::Complete => RideStatus::Completed,
            Transition::Cancel => RideStatus::Cancelled,
        }
    }

    /// Timestamp column stamped when the transition applies.
    pub fn timestamp_column(self) -> &'static str {
        match self {
            Transition::Confirm => "confirmed_at",
            Transition::Start => "started_at",
            Transition::Complete => "completed_at",
            Transition::Cancel => "cancelled_at",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Transition::Confirm => "confirm",
            Transition::Start => "start",
            Transition::Complete => "end",
            Transition::Cancel => "cancel",
        }
    }
}

/// Who is asking for the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(UserId),
    Captain(CaptainId),
}

/// The parts of a ride the state machine looks at.
#[derive(Debug, Clone, Copy)]
pub struct RideView {
    pub status: RideStatus,
    pub user_id: UserId,
    pub captain_id: Option<CaptainId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The transition may be attempted.
    Proceed,
    /// The same actor already applied this transition; report success without side effects.
    AlreadyApplied,
    /// The ride is in a state the transition cannot leave from.
    Conflict(String),
    /// The actor has no business with this ride.
    NotFound,
}

/// Decide what a transition request means against the ride's current state.
pub fn resolve(ride: RideView, transition: Transition, actor: Actor) -> Resolution {
    let is_assigned = |captain: CaptainId| ride.captain_id == Some(captain);

    let visible = match (transition, actor) {
        // Pending rides are open to every captain
        (Transition::Confirm, Actor::Captain(_)) => true,
        (Transition::Start | Transition::Complete, Actor::Captain(c)) => is_assigned(c),
        (Transition::Cancel, Actor::User(u)) => ride.user_id == u,
        (Transition::Cancel, Actor::Captain(c)) => is_assigned(c),
        _ => false,
    };
    if !visible {
        return Resolution::NotFound;
    }

    if ride.status == transition.target() {
        let same_actor = match (transition, actor) {
            (Transition::Confirm, Actor::Captain(c)) => is_assigned(c),
            _ => true,
        };
        if same_actor {
            return Resolution::AlreadyApplied;
        }
    }

    if transition.from_states().contains(&ride.status) {
        return Resolution::Proceed;
    }

    let message = match (transition, ride.status) {
        (Transition::Confirm, RideStatus::Cancelled) => "Ride has been cancelled".to_string(),
        (Transition::Confirm, _) => "Ride already confirmed".to_string(),
        (t, status) => format!("Cannot {} a ride that is {}", t.verb(), status),
    };
    Resolution::Conflict(message)
}
