//! One WebSocket connection.
//!
//! The connection is authenticated on upgrade, so every [`Session`] already knows its
//! [`Principal`]. Client frames are handled in order by [`Session::handle_text`]; failures are
//! reported back to the client as an `error` event and never close the socket. Events queued
//! through the [`Hub`](super::Hub) are forwarded from the session's outbound channel.

use std::collections::HashSet;

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket},
};
use chrono::Utc;
use futures::{Sink, SinkExt, StreamExt};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use crate::{
    AppState,
    auth::current_user::Principal,
    db::{
        handlers::{Captains, Rides},
        models::{captains::CaptainStatus, rides::RideDBResponse},
    },
    errors::{Error, Result},
    maps::Coordinates,
    realtime::{
        ClientEvent, ServerEvent,
        messages::{ChatMessage, PaymentSuccessPayload},
    },
    rides::lifecycle::PaymentStatus,
    types::{AccountKind, RideId, abbrev_uuid},
};

/// Longest chat message relayed
const MAX_MESSAGE_CHARS: usize = 1000;

pub struct Session {
    state: AppState,
    principal: Principal,
    connection_id: u64,
    sender: mpsc::Sender<String>,
    joined: bool,
    rooms: HashSet<RideId>,
}

impl Session {
    pub fn new(state: AppState, principal: Principal, sender: mpsc::Sender<String>) -> Self {
        let connection_id = state.hub.next_connection_id();
        Self {
            state,
            principal,
            connection_id,
            sender,
            joined: false,
            rooms: HashSet::new(),
        }
    }

    fn key(&self) -> (AccountKind, Uuid) {
        (self.principal.kind(), self.principal.id())
    }

    /// Handle one text frame, returning the reply to send back, if any.
    pub async fn handle_text(&mut self, text: &str) -> Option<ServerEvent> {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                trace!("Unparseable socket frame: {}", e);
                return Some(ServerEvent::error("Invalid message"));
            }
        };

        match self.handle(event).await {
            Ok(reply) => reply,
            Err(e) => Some(ServerEvent::error(e.user_message())),
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) -> Result<Option<ServerEvent>> {
        match event {
            ClientEvent::Join { user_id, user_type } => self.join(user_id, user_type).await,
            ClientEvent::UpdateLocationCaptain { user_id, location } => self.update_location(user_id, location).await,
            ClientEvent::JoinRoom { ride_id } => self.join_room(ride_id).await,
            ClientEvent::Message { ride_id, msg } => self.relay_message(ride_id, msg).await,
            ClientEvent::PaymentSuccess { ride_id } => self.payment_success(ride_id).await,
        }
    }

    #[instrument(skip(self), fields(connection_id = self.connection_id), err)]
    async fn join(&mut self, user_id: Uuid, user_type: AccountKind) -> Result<Option<ServerEvent>> {
        if (user_type, user_id) != self.key() {
            return Err(Error::Forbidden {
                message: "Cannot join as another account".to_string(),
            });
        }

        self.state.hub.register(self.key(), self.connection_id, self.sender.clone());
        self.joined = true;

        if user_type == AccountKind::Captain {
            let mut conn = self.state.db.acquire().await?;
            Captains::new(&mut conn).set_status(user_id, CaptainStatus::Active).await?;
        }
        info!("{} {} joined", user_type, abbrev_uuid(&user_id));
        Ok(None)
    }

    async fn update_location(&mut self, user_id: Uuid, location: Coordinates) -> Result<Option<ServerEvent>> {
        if self.key() != (AccountKind::Captain, user_id) {
            return Err(Error::Forbidden {
                message: "Only captains can share a location".to_string(),
            });
        }
        if !location.is_valid() {
            return Err(Error::BadRequest {
                message: "Invalid location data".to_string(),
            });
        }

        let mut conn = self.state.db.acquire().await?;
        Captains::new(&mut conn).update_location(user_id, location).await?;
        trace!("Captain {} at {}, {}", abbrev_uuid(&user_id), location.ltd, location.lng);
        Ok(None)
    }

    /// Load a ride this session's account takes part in.
    async fn participating_ride(&self, ride_id: RideId) -> Result<RideDBResponse> {
        let mut conn = self.state.db.acquire().await?;
        let ride = Rides::new(&mut conn)
            .get_by_id(ride_id)
            .await?
            .ok_or_else(|| Error::not_found("Ride"))?;

        let id = self.principal.id();
        let participates = match self.principal.kind() {
            AccountKind::User => ride.user_id == id,
            AccountKind::Captain => ride.captain_id == Some(id),
        };
        if !participates {
            return Err(Error::not_found("Ride"));
        }
        Ok(ride)
    }

    async fn join_room(&mut self, ride_id: RideId) -> Result<Option<ServerEvent>> {
        self.participating_ride(ride_id).await?;
        self.rooms.insert(ride_id);
        debug!("Connection {} entered ride {}", self.connection_id, abbrev_uuid(&ride_id));
        Ok(None)
    }

    async fn relay_message(&mut self, ride_id: RideId, msg: String) -> Result<Option<ServerEvent>> {
        if !self.rooms.contains(&ride_id) {
            return Err(Error::BadRequest {
                message: "Join the ride before sending messages".to_string(),
            });
        }
        let msg = msg.trim();
        if msg.is_empty() || msg.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::BadRequest {
                message: format!("Message must be between 1 and {MAX_MESSAGE_CHARS} characters"),
            });
        }

        let ride = self.participating_ride(ride_id).await?;
        let (kind, recipient) = match self.principal.kind() {
            AccountKind::User => match ride.captain_id {
                Some(captain_id) => (AccountKind::Captain, captain_id),
                None => {
                    return Err(Error::BadRequest {
                        message: "No captain has accepted this ride yet".to_string(),
                    });
                }
            },
            AccountKind::Captain => (AccountKind::User, ride.user_id),
        };

        let event = ServerEvent::ReceiveMessage(ChatMessage {
            ride_id,
            msg: msg.to_string(),
            from: self.principal.kind(),
            sent_at: Utc::now(),
        });
        self.state.hub.send(kind, recipient, &event);
        Ok(None)
    }

    async fn payment_success(&mut self, ride_id: RideId) -> Result<Option<ServerEvent>> {
        if self.principal.kind() != AccountKind::User {
            return Err(Error::Forbidden {
                message: "Only the rider can report a payment".to_string(),
            });
        }
        let ride = self.participating_ride(ride_id).await?;
        if ride.payment_status != PaymentStatus::Paid {
            return Err(Error::BadRequest {
                message: "Ride has not been paid".to_string(),
            });
        }

        if let Some(captain_id) = ride.captain_id {
            let event = ServerEvent::PaymentSuccess(PaymentSuccessPayload { ride_id });
            self.state.hub.send(AccountKind::Captain, captain_id, &event);
        }
        Ok(None)
    }

    /// Drop this connection's registration. A captain whose last connection closes goes inactive.
    pub async fn close(self) {
        if !self.joined {
            return;
        }
        let (kind, id) = self.key();
        if !self.state.hub.unregister((kind, id), self.connection_id) {
            // A newer connection owns the registration
            return;
        }
        if kind == AccountKind::Captain {
            match self.state.db.acquire().await {
                Ok(mut conn) => {
                    if let Err(e) = Captains::new(&mut conn).set_status(id, CaptainStatus::Inactive).await {
                        warn!("Failed to mark captain {} inactive: {}", abbrev_uuid(&id), e);
                    }
                }
                Err(e) => warn!("Failed to mark captain {} inactive: {}", abbrev_uuid(&id), e),
            }
        }
        info!("{} {} disconnected", kind, abbrev_uuid(&id));
    }
}

async fn send_event<S>(sink: &mut S, event: &ServerEvent) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(frame) => sink.send(Message::Text(frame.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.name(), e);
            true
        }
    }
}

/// Drive a socket until the client goes away or stops answering pings.
#[instrument(skip_all, fields(kind = %principal.kind(), id = %abbrev_uuid(&principal.id())))]
pub async fn run(socket: WebSocket, state: AppState, principal: Principal) {
    metrics::counter!("rideway_socket_connections_total", "kind" => principal.kind().as_str()).increment(1);
    let realtime = state.config.realtime.clone();
    let (tx, mut rx) = mpsc::channel::<String>(realtime.channel_capacity);
    let (mut sink, mut stream) = socket.split();
    let mut session = Session::new(state, principal, tx);

    let mut ping = tokio::time::interval(realtime.ping_interval);
    // The first tick completes immediately
    ping.tick().await;
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            inbound = stream.next() => {
                let Some(Ok(message)) = inbound else {
                    break;
                };
                last_seen = Instant::now();
                match message {
                    Message::Text(text) => {
                        if let Some(reply) = session.handle_text(text.as_str()).await
                            && !send_event(&mut sink, &reply).await
                        {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    // Pongs only refresh last_seen
                    _ => {}
                }
            }

            Some(frame) = rx.recv() => {
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() > realtime.client_timeout {
                    debug!("Client silent for {:?}, closing", last_seen.elapsed());
                    break;
                }
                if sink.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    session.close().await;
}
