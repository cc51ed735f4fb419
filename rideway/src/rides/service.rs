//! Ride operations that span the database, the maps provider and the realtime hub.
//!
//! Handlers call these after authenticating and validating. Every status change goes through
//! [`transition`], which applies the conditional update and, when it matches nothing, decides
//! from the ride's current state whether the caller sees an idempotent success or an error.
//! Events are only pushed for transitions this call actually applied.

use tracing::{info, instrument, warn};

use crate::{
    AppState,
    api::models::rides::{NewRide, RideResponse},
    auth::password,
    db::{
        errors::DbError,
        handlers::{Captains, Ratings, Repository, Rides, Users},
        models::{
            captains::CaptainDBResponse,
            rides::{RideCreateDBRequest, RideDBResponse, RideParticipant},
            users::UserDBResponse,
        },
    },
    errors::{Error, Result},
    maps::{Coordinates, DistanceTime},
    realtime::{ServerEvent, messages::PaymentRequiredPayload},
    rides::{
        fare::{self, FareQuote},
        lifecycle::{Actor, Resolution, Transition, resolve},
    },
    types::{AccountKind, RideId, abbrev_uuid},
};

/// A ride after a transition request
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub ride: RideDBResponse,
    /// `false` when the same actor had already applied this transition
    pub applied: bool,
}

fn ride_not_found() -> Error {
    Error::not_found("Ride")
}

fn active_ride_conflict() -> Error {
    Error::Conflict {
        message: "You already have an active ride".to_string(),
    }
}

/// Rides carries unique indexes over unfinished rides per rider and per captain; a violation
/// means the caller lost a race for that slot.
fn unfinished_ride_conflict(err: DbError) -> Error {
    if err.is_unique_on("rides", "user_id") || err.is_unique_on("rides", "captain_id") {
        active_ride_conflict()
    } else {
        err.into()
    }
}

/// Route distance and time plus the fare for every vehicle type.
#[instrument(skip(state), err)]
pub async fn quote(state: &AppState, pickup: &str, destination: &str) -> Result<(FareQuote, DistanceTime)> {
    let route = state.maps.distance_time(pickup, destination).await?;
    let fares = fare::quote(&state.config.rides.fares, route.distance_meters(), route.duration_seconds());
    Ok((fares, route))
}

/// Create a pending ride for `user` and offer it to nearby captains.
#[instrument(skip_all, fields(user_id = %abbrev_uuid(&user.id), vehicle_type = %request.vehicle_type), err)]
pub async fn create_ride(state: &AppState, user: &UserDBResponse, request: NewRide) -> Result<RideDBResponse> {
    {
        let mut conn = state.db.acquire().await?;
        if Rides::new(&mut conn)
            .find_unfinished(RideParticipant::User(user.id))
            .await?
            .is_some()
        {
            return Err(active_ride_conflict());
        }
    }

    let (fares, route) = quote(state, &request.pickup, &request.destination).await?;
    let pickup_location = match state.maps.geocode(&request.pickup).await {
        Ok(coordinates) => Some(coordinates),
        Err(e) => {
            warn!("Could not geocode pickup, nearby captains will not be notified: {}", e);
            None
        }
    };

    let ride = {
        let mut conn = state.db.acquire().await?;
        Rides::new(&mut conn)
            .create(&RideCreateDBRequest {
                user_id: user.id,
                pickup: request.pickup,
                destination: request.destination,
                pickup_latitude: pickup_location.map(|c| c.ltd),
                pickup_longitude: pickup_location.map(|c| c.lng),
                vehicle_type: request.vehicle_type,
                fare: fares.for_vehicle(request.vehicle_type),
                distance_meters: Some(route.distance_meters()),
                duration_seconds: Some(route.duration_seconds()),
                otp: password::generate_otp(state.config.rides.otp_length),
            })
            .await
            .map_err(unfinished_ride_conflict)?
    };
    metrics::counter!("rideway_rides_created_total", "vehicle_type" => ride.vehicle_type.as_str()).increment(1);
    info!("Created ride {} for {} ({})", abbrev_uuid(&ride.id), ride.fare, ride.vehicle_type);

    if let Some(center) = pickup_location {
        notify_nearby_captains(state, &ride, user, center).await?;
    }

    Ok(ride)
}

async fn notify_nearby_captains(state: &AppState, ride: &RideDBResponse, user: &UserDBResponse, center: Coordinates) -> Result<()> {
    let captains = {
        let mut conn = state.db.acquire().await?;
        Captains::new(&mut conn)
            .find_available_near(ride.vehicle_type, center, state.config.rides.captain_search_radius_km)
            .await?
    };

    let event = ServerEvent::NewRide(RideResponse::without_otp(ride.clone()).with_user(user.clone()));
    let delivered = captains
        .iter()
        .filter(|captain| state.hub.send(AccountKind::Captain, captain.id, &event))
        .count();
    info!("Offered ride {} to {}/{} nearby captains", abbrev_uuid(&ride.id), delivered, captains.len());
    Ok(())
}

/// Apply `transition` for `actor`, resolving a miss against the ride's current state.
#[instrument(skip(state), fields(ride_id = %abbrev_uuid(&ride_id)), err)]
pub async fn transition(state: &AppState, ride_id: RideId, transition: Transition, actor: Actor) -> Result<TransitionOutcome> {
    let mut conn = state.db.acquire().await?;
    let mut rides = Rides::new(&mut conn);

    if let Some(ride) = rides
        .apply_transition(ride_id, transition, actor)
        .await
        .map_err(unfinished_ride_conflict)?
    {
        metrics::counter!("rideway_ride_transitions_total", "status" => transition.target().as_str()).increment(1);
        return Ok(TransitionOutcome { ride, applied: true });
    }

    let current = rides.get_by_id(ride_id).await?.ok_or_else(ride_not_found)?;
    match resolve(current.view(), transition, actor) {
        Resolution::AlreadyApplied => Ok(TransitionOutcome {
            ride: current,
            applied: false,
        }),
        Resolution::Conflict(message) => Err(Error::Conflict { message }),
        Resolution::NotFound => Err(ride_not_found()),
        // Statuses only move forward, so a miss that now looks applicable means the actor guard
        // and the resolver disagree.
        Resolution::Proceed => Err(Error::Conflict {
            message: "Ride changed while updating, please retry".to_string(),
        }),
    }
}

async fn load_user(state: &AppState, ride: &RideDBResponse) -> Result<Option<UserDBResponse>> {
    let mut conn = state.db.acquire().await?;
    Ok(Users::new(&mut conn).get_by_id(ride.user_id).await?)
}

async fn load_captain(state: &AppState, ride: &RideDBResponse) -> Result<Option<CaptainDBResponse>> {
    let Some(captain_id) = ride.captain_id else {
        return Ok(None);
    };
    let mut conn = state.db.acquire().await?;
    Ok(Captains::new(&mut conn).get_by_id(captain_id).await?)
}

/// `pending → confirmed` for `captain`.
pub async fn confirm(state: &AppState, captain: &CaptainDBResponse, ride_id: RideId) -> Result<TransitionOutcome> {
    {
        let mut conn = state.db.acquire().await?;
        let mut rides = Rides::new(&mut conn);
        let ride = rides.get_by_id(ride_id).await?.ok_or_else(ride_not_found)?;

        if ride.vehicle_type != captain.vehicle_type {
            return Err(Error::BadRequest {
                message: format!("This ride needs a {}", ride.vehicle_type),
            });
        }

        let busy = rides.find_unfinished(RideParticipant::Captain(captain.id)).await?;
        if busy.is_some_and(|other| other.id != ride_id) {
            return Err(active_ride_conflict());
        }
    }

    let outcome = transition(state, ride_id, Transition::Confirm, Actor::Captain(captain.id)).await?;
    if outcome.applied {
        let event = ServerEvent::RideConfirmed(RideResponse::for_rider(outcome.ride.clone()).with_captain(captain.clone()));
        state.hub.send(AccountKind::User, outcome.ride.user_id, &event);
    }
    Ok(outcome)
}

/// `confirmed → started`, once the captain presents the rider's OTP.
pub async fn start(state: &AppState, captain: &CaptainDBResponse, ride_id: RideId, otp: &str) -> Result<TransitionOutcome> {
    {
        let mut conn = state.db.acquire().await?;
        let ride = Rides::new(&mut conn).get_by_id(ride_id).await?.ok_or_else(ride_not_found)?;
        if ride.captain_id != Some(captain.id) {
            return Err(ride_not_found());
        }
        if ride.otp != otp {
            return Err(Error::BadRequest {
                message: "Invalid OTP".to_string(),
            });
        }
    }

    let outcome = transition(state, ride_id, Transition::Start, Actor::Captain(captain.id)).await?;
    if outcome.applied {
        let event = ServerEvent::RideStarted(RideResponse::for_rider(outcome.ride.clone()).with_captain(captain.clone()));
        state.hub.send(AccountKind::User, outcome.ride.user_id, &event);
    }
    Ok(outcome)
}

/// `started → completed`, then ask the rider to pay.
pub async fn end(state: &AppState, captain: &CaptainDBResponse, ride_id: RideId) -> Result<TransitionOutcome> {
    let outcome = transition(state, ride_id, Transition::Complete, Actor::Captain(captain.id)).await?;
    if outcome.applied {
        let ride = &outcome.ride;
        let ended = ServerEvent::RideEnded(RideResponse::for_rider(ride.clone()).with_captain(captain.clone()));
        state.hub.send(AccountKind::User, ride.user_id, &ended);

        let payment = ServerEvent::PaymentRequired(PaymentRequiredPayload {
            ride_id: ride.id,
            amount: ride.fare,
            currency: state.config.rides.currency.clone(),
        });
        state.hub.send(AccountKind::User, ride.user_id, &payment);
    }
    Ok(outcome)
}

/// Cancel a pending or confirmed ride and tell the other party.
pub async fn cancel(state: &AppState, actor: Actor, ride_id: RideId) -> Result<TransitionOutcome> {
    let outcome = transition(state, ride_id, Transition::Cancel, actor).await?;
    if outcome.applied {
        let ride = &outcome.ride;
        match actor {
            Actor::User(_) => {
                if let Some(captain_id) = ride.captain_id {
                    let mut response = RideResponse::without_otp(ride.clone());
                    if let Some(user) = load_user(state, ride).await? {
                        response = response.with_user(user);
                    }
                    state.hub.send(AccountKind::Captain, captain_id, &ServerEvent::RideCancelled(response));
                }
            }
            Actor::Captain(_) => {
                let mut response = RideResponse::for_rider(ride.clone());
                if let Some(captain) = load_captain(state, ride).await? {
                    response = response.with_captain(captain);
                }
                state.hub.send(AccountKind::User, ride.user_id, &ServerEvent::RideCancelled(response));
            }
        }
    }
    Ok(outcome)
}

/// A ride as seen by one of its participants. Anyone else gets a not-found.
pub async fn details(state: &AppState, actor: Actor, ride_id: RideId) -> Result<RideResponse> {
    let mut conn = state.db.acquire().await?;
    let ride = Rides::new(&mut conn).get_by_id(ride_id).await?.ok_or_else(ride_not_found)?;
    let rating = Ratings::new(&mut conn).get_for_ride(ride_id).await?;

    let mut response = match actor {
        Actor::User(user_id) if ride.user_id == user_id => {
            let captain = match ride.captain_id {
                Some(id) => Captains::new(&mut conn).get_by_id(id).await?,
                None => None,
            };
            let mut response = RideResponse::for_rider(ride);
            if let Some(captain) = captain {
                response = response.with_captain(captain);
            }
            response
        }
        Actor::Captain(captain_id) if ride.captain_id == Some(captain_id) => {
            let user = Users::new(&mut conn).get_by_id(ride.user_id).await?;
            let mut response = RideResponse::without_otp(ride);
            if let Some(user) = user {
                response = response.with_user(user);
            }
            response
        }
        _ => return Err(ride_not_found()),
    };

    if let Some(rating) = rating {
        response = response.with_rating(rating);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::captains::CaptainStatus;
    use crate::rides::lifecycle::RideStatus;
    use crate::test_utils::{create_test_captain, create_test_state, create_test_user};
    use crate::types::VehicleType;
    use sqlx::SqlitePool;
    use tokio::sync::mpsc;

    fn new_ride(vehicle_type: VehicleType) -> NewRide {
        NewRide {
            pickup: "MG Road".to_string(),
            destination: "Indiranagar".to_string(),
            vehicle_type,
        }
    }

    /// Register a socket channel for an account and return its receiving end
    fn connect(state: &AppState, kind: AccountKind, id: uuid::Uuid) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(16);
        state.hub.register((kind, id), state.hub.next_connection_id(), tx);
        rx
    }

    fn next_event(rx: &mut mpsc::Receiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.try_recv().expect("an event")).unwrap()
    }

    async fn place_captain(pool: &SqlitePool, vehicle_type: VehicleType, at: Coordinates) -> CaptainDBResponse {
        let captain = create_test_captain(pool, vehicle_type).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut captains = Captains::new(&mut conn);
        captains.set_status(captain.id, CaptainStatus::Active).await.unwrap();
        captains.update_location(captain.id, at).await.unwrap();
        captains.get_by_id(captain.id).await.unwrap().unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_ride_prices_and_notifies_nearby_captains(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;

        // Right at the pickup, a few km away, and one with the wrong vehicle
        let near = place_captain(&pool, VehicleType::Auto, Coordinates::new(12.9756, 77.6050)).await;
        let far = place_captain(&pool, VehicleType::Auto, Coordinates::new(13.1986, 77.7066)).await;
        let car = place_captain(&pool, VehicleType::Car, Coordinates::new(12.9756, 77.6050)).await;
        let mut near_rx = connect(&state, AccountKind::Captain, near.id);
        let mut far_rx = connect(&state, AccountKind::Captain, far.id);
        let mut car_rx = connect(&state, AccountKind::Captain, car.id);

        let ride = create_ride(&state, &user, new_ride(VehicleType::Auto)).await.unwrap();
        assert_eq!(ride.status, RideStatus::Pending);
        assert_eq!(ride.otp.len(), state.config.rides.otp_length);
        assert!(ride.pickup_latitude.is_some());

        let (fares, _) = quote(&state, "MG Road", "Indiranagar").await.unwrap();
        assert_eq!(ride.fare, fares.auto);

        let offer = next_event(&mut near_rx);
        assert_eq!(offer["event"], "new-ride");
        assert_eq!(offer["data"]["_id"], ride.id.to_string());
        assert!(offer["data"].get("otp").is_none());
        assert!(far_rx.try_recv().is_err());
        assert!(car_rx.try_recv().is_err());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_one_unfinished_ride_per_user(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;

        create_ride(&state, &user, new_ride(VehicleType::Car)).await.unwrap();
        assert!(matches!(
            create_ride(&state, &user, new_ride(VehicleType::Car)).await,
            Err(Error::Conflict { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_full_lifecycle_emits_events(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Car).await;
        let mut user_rx = connect(&state, AccountKind::User, user.id);

        let ride = create_ride(&state, &user, new_ride(VehicleType::Car)).await.unwrap();

        let confirmed = confirm(&state, &captain, ride.id).await.unwrap();
        assert!(confirmed.applied);
        assert_eq!(confirmed.ride.captain_id, Some(captain.id));
        let event = next_event(&mut user_rx);
        assert_eq!(event["event"], "ride-confirmed");
        assert_eq!(event["data"]["captain"]["_id"], captain.id.to_string());

        assert!(matches!(
            start(&state, &captain, ride.id, "000000x").await,
            Err(Error::BadRequest { .. })
        ));
        let started = start(&state, &captain, ride.id, &ride.otp).await.unwrap();
        assert_eq!(started.ride.status, RideStatus::Started);
        assert_eq!(next_event(&mut user_rx)["event"], "ride-started");

        let ended = end(&state, &captain, ride.id).await.unwrap();
        assert_eq!(ended.ride.status, RideStatus::Completed);
        assert_eq!(next_event(&mut user_rx)["event"], "ride-ended");
        let payment = next_event(&mut user_rx);
        assert_eq!(payment["event"], "payment-required");
        assert_eq!(payment["data"]["amount"], ride.fare);
        assert_eq!(payment["data"]["currency"], state.config.rides.currency);

        // Repeating is harmless and silent
        let again = end(&state, &captain, ride.id).await.unwrap();
        assert!(!again.applied);
        assert!(user_rx.try_recv().is_err());

        // Too late to cancel
        assert!(matches!(
            cancel(&state, Actor::User(user.id), ride.id).await,
            Err(Error::Conflict { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_confirm_rules(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let other_user = create_test_user(&pool).await;
        let bike = create_test_captain(&pool, VehicleType::Bike).await;
        let first = create_test_captain(&pool, VehicleType::Car).await;
        let second = create_test_captain(&pool, VehicleType::Car).await;

        let ride = create_ride(&state, &user, new_ride(VehicleType::Car)).await.unwrap();

        assert!(matches!(
            confirm(&state, &bike, ride.id).await,
            Err(Error::BadRequest { .. })
        ));

        assert!(confirm(&state, &first, ride.id).await.unwrap().applied);
        assert!(!confirm(&state, &first, ride.id).await.unwrap().applied);
        match confirm(&state, &second, ride.id).await {
            Err(Error::Conflict { message }) => assert_eq!(message, "Ride already confirmed"),
            other => panic!("expected conflict, got {other:?}"),
        }

        // A captain already on a ride cannot take another
        let other = create_ride(&state, &other_user, new_ride(VehicleType::Car)).await.unwrap();
        assert!(matches!(
            confirm(&state, &first, other.id).await,
            Err(Error::Conflict { .. })
        ));

        // Only the assigned captain can start
        assert!(matches!(
            start(&state, &second, ride.id, &ride.otp).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_confirms_have_one_winner(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let ride = create_ride(&state, &user, new_ride(VehicleType::Car)).await.unwrap();

        let mut captains = Vec::new();
        for _ in 0..4 {
            captains.push(create_test_captain(&pool, VehicleType::Car).await);
        }

        let attempts = captains.iter().map(|captain| confirm(&state, captain, ride.id));
        let results = futures::future::join_all(attempts).await;

        let winners = results.iter().filter(|r| matches!(r, Ok(o) if o.applied)).count();
        let losers = results.iter().filter(|r| matches!(r, Err(Error::Conflict { .. }))).count();
        assert_eq!(winners, 1);
        assert_eq!(losers, 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_creates_leave_one_ride(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;

        let attempts = (0..4).map(|_| create_ride(&state, &user, new_ride(VehicleType::Car)));
        let results = futures::future::join_all(attempts).await;

        let created = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(Error::Conflict { message }) if message == "You already have an active ride"))
            .count();
        assert_eq!(created, 1);
        assert_eq!(rejected, 3);

        let (pending,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rides WHERE user_id = ? AND status = 'pending'")
            .bind(user.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(pending, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_captain_confirming_two_rides_at_once_gets_one(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let captain = create_test_captain(&pool, VehicleType::Car).await;
        let mut ride_ids = Vec::new();
        for _ in 0..2 {
            let user = create_test_user(&pool).await;
            ride_ids.push(create_ride(&state, &user, new_ride(VehicleType::Car)).await.unwrap().id);
        }

        let attempts = ride_ids.iter().map(|ride_id| confirm(&state, &captain, *ride_id));
        let results = futures::future::join_all(attempts).await;

        assert_eq!(results.iter().filter(|r| matches!(r, Ok(o) if o.applied)).count(), 1);
        assert_eq!(results.iter().filter(|r| matches!(r, Err(Error::Conflict { .. }))).count(), 1);

        let (held,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rides WHERE captain_id = ? AND status = 'confirmed'")
            .bind(captain.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(held, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_cancel_notifies_the_other_party(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Car).await;
        let mut captain_rx = connect(&state, AccountKind::Captain, captain.id);

        let ride = create_ride(&state, &user, new_ride(VehicleType::Car)).await.unwrap();
        confirm(&state, &captain, ride.id).await.unwrap();

        let cancelled = cancel(&state, Actor::User(user.id), ride.id).await.unwrap();
        assert_eq!(cancelled.ride.cancelled_by, Some(AccountKind::User));
        let event = next_event(&mut captain_rx);
        assert_eq!(event["event"], "ride-cancelled");
        assert!(event["data"].get("otp").is_none());

        let repeat = cancel(&state, Actor::User(user.id), ride.id).await.unwrap();
        assert!(!repeat.applied);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_details_visible_to_participants_only(pool: SqlitePool) {
        let state = create_test_state(pool.clone());
        let user = create_test_user(&pool).await;
        let captain = create_test_captain(&pool, VehicleType::Car).await;
        let stranger = create_test_captain(&pool, VehicleType::Car).await;

        let ride = create_ride(&state, &user, new_ride(VehicleType::Car)).await.unwrap();
        confirm(&state, &captain, ride.id).await.unwrap();

        let for_user = details(&state, Actor::User(user.id), ride.id).await.unwrap();
        assert_eq!(for_user.otp.as_deref(), Some(ride.otp.as_str()));
        assert_eq!(for_user.captain.map(|c| c.id), Some(captain.id));

        let for_captain = details(&state, Actor::Captain(captain.id), ride.id).await.unwrap();
        assert!(for_captain.otp.is_none());
        assert_eq!(for_captain.user.map(|u| u.id), Some(user.id));

        assert!(matches!(
            details(&state, Actor::Captain(stranger.id), ride.id).await,
            Err(Error::NotFound { .. })
        ));
    }
}
