//! Operation kinds
//!
//! Every write that can be queued is one of a closed set of operations, each
//! with its own validated shape. Queued items carry the typed operation
//! rather than a free-form map so an item replayed hours later has exactly
//! the shape it was enqueued with.
//!
//! Mutations are GraphQL writes; socket events are real-time emissions
//! (chat sends, Q&A, reactions) replayed over the socket connection.

use crate::shared::error::SyncError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

const MAX_TICKETS_PER_ORDER: u32 = 10;
const MAX_LEAD_NOTES: usize = 2_000;
const MAX_DISPLAY_NAME: usize = 120;
const MAX_MESSAGE_TEXT: usize = 4_000;

/// GraphQL write operations that may be queued
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationKind {
    /// Register the current user for an event
    RegisterForEvent {
        event_id: String,
        ticket_tier_id: String,
        quantity: u32,
    },
    /// Cancel an existing registration
    CancelRegistration { registration_id: String },
    /// Vote in a live poll
    SubmitPollVote { poll_id: String, option_id: String },
    /// Sponsor lead capture
    CaptureLead {
        sponsor_id: String,
        attendee_id: String,
        notes: Option<String>,
    },
    /// On-site check-in
    CheckInAttendee { event_id: String, attendee_id: String },
    /// Profile edit
    UpdateProfile {
        display_name: String,
        headline: Option<String>,
    },
}

impl MutationKind {
    /// GraphQL operation name
    pub fn operation_name(&self) -> &'static str {
        match self {
            MutationKind::RegisterForEvent { .. } => "RegisterForEvent",
            MutationKind::CancelRegistration { .. } => "CancelRegistration",
            MutationKind::SubmitPollVote { .. } => "SubmitPollVote",
            MutationKind::CaptureLead { .. } => "CaptureLead",
            MutationKind::CheckInAttendee { .. } => "CheckInAttendee",
            MutationKind::UpdateProfile { .. } => "UpdateProfile",
        }
    }

    /// GraphQL document sent on replay
    pub fn document(&self) -> &'static str {
        match self {
            MutationKind::RegisterForEvent { .. } => {
                "mutation RegisterForEvent($eventId: ID!, $ticketTierId: ID!, $quantity: Int!, $idempotencyKey: ID!) { \
                 registerForEvent(eventId: $eventId, ticketTierId: $ticketTierId, quantity: $quantity, idempotencyKey: $idempotencyKey) { id status } }"
            }
            MutationKind::CancelRegistration { .. } => {
                "mutation CancelRegistration($registrationId: ID!, $idempotencyKey: ID!) { \
                 cancelRegistration(registrationId: $registrationId, idempotencyKey: $idempotencyKey) { id status } }"
            }
            MutationKind::SubmitPollVote { .. } => {
                "mutation SubmitPollVote($pollId: ID!, $optionId: ID!, $idempotencyKey: ID!) { \
                 submitPollVote(pollId: $pollId, optionId: $optionId, idempotencyKey: $idempotencyKey) { id } }"
            }
            MutationKind::CaptureLead { .. } => {
                "mutation CaptureLead($sponsorId: ID!, $attendeeId: ID!, $notes: String, $idempotencyKey: ID!) { \
                 captureLead(sponsorId: $sponsorId, attendeeId: $attendeeId, notes: $notes, idempotencyKey: $idempotencyKey) { id } }"
            }
            MutationKind::CheckInAttendee { .. } => {
                "mutation CheckInAttendee($eventId: ID!, $attendeeId: ID!, $idempotencyKey: ID!) { \
                 checkInAttendee(eventId: $eventId, attendeeId: $attendeeId, idempotencyKey: $idempotencyKey) { id checkedInAt } }"
            }
            MutationKind::UpdateProfile { .. } => {
                "mutation UpdateProfile($displayName: String!, $headline: String, $idempotencyKey: ID!) { \
                 updateProfile(displayName: $displayName, headline: $headline, idempotencyKey: $idempotencyKey) { id } }"
            }
        }
    }

    /// GraphQL variables, including the idempotency key
    pub fn variables(&self, idempotency_key: &Uuid) -> Value {
        let mut variables = match self {
            MutationKind::RegisterForEvent {
                event_id,
                ticket_tier_id,
                quantity,
            } => json!({ "eventId": event_id, "ticketTierId": ticket_tier_id, "quantity": quantity }),
            MutationKind::CancelRegistration { registration_id } => {
                json!({ "registrationId": registration_id })
            }
            MutationKind::SubmitPollVote { poll_id, option_id } => {
                json!({ "pollId": poll_id, "optionId": option_id })
            }
            MutationKind::CaptureLead {
                sponsor_id,
                attendee_id,
                notes,
            } => json!({ "sponsorId": sponsor_id, "attendeeId": attendee_id, "notes": notes }),
            MutationKind::CheckInAttendee {
                event_id,
                attendee_id,
            } => json!({ "eventId": event_id, "attendeeId": attendee_id }),
            MutationKind::UpdateProfile {
                display_name,
                headline,
            } => json!({ "displayName": display_name, "headline": headline }),
        };
        variables["idempotencyKey"] = Value::String(idempotency_key.to_string());
        variables
    }

    /// Schema checks run before anything is queued
    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            MutationKind::RegisterForEvent {
                event_id,
                ticket_tier_id,
                quantity,
            } => {
                require_id("event_id", event_id)?;
                require_id("ticket_tier_id", ticket_tier_id)?;
                if *quantity == 0 || *quantity > MAX_TICKETS_PER_ORDER {
                    return Err(SyncError::validation(
                        "quantity",
                        format!("must be between 1 and {}", MAX_TICKETS_PER_ORDER),
                    ));
                }
                Ok(())
            }
            MutationKind::CancelRegistration { registration_id } => {
                require_id("registration_id", registration_id)
            }
            MutationKind::SubmitPollVote { poll_id, option_id } => {
                require_id("poll_id", poll_id)?;
                require_id("option_id", option_id)
            }
            MutationKind::CaptureLead {
                sponsor_id,
                attendee_id,
                notes,
            } => {
                require_id("sponsor_id", sponsor_id)?;
                require_id("attendee_id", attendee_id)?;
                if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_LEAD_NOTES) {
                    return Err(SyncError::validation(
                        "notes",
                        format!("must be at most {} characters", MAX_LEAD_NOTES),
                    ));
                }
                Ok(())
            }
            MutationKind::CheckInAttendee {
                event_id,
                attendee_id,
            } => {
                require_id("event_id", event_id)?;
                require_id("attendee_id", attendee_id)
            }
            MutationKind::UpdateProfile { display_name, .. } => {
                require_text("display_name", display_name, MAX_DISPLAY_NAME)
            }
        }
    }
}

/// Real-time emissions that may be queued
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SocketEventKind {
    /// Session chat message
    ChatSend { session_id: String, text: String },
    /// Q&A question
    AskQuestion { session_id: String, text: String },
    /// Emoji reaction
    React { session_id: String, emoji: String },
}

impl SocketEventKind {
    /// Socket event name
    pub fn event_name(&self) -> &'static str {
        match self {
            SocketEventKind::ChatSend { .. } => "chat:send",
            SocketEventKind::AskQuestion { .. } => "qa:ask",
            SocketEventKind::React { .. } => "reaction:send",
        }
    }

    /// Queue channel; events for one session replay in order
    pub fn channel(&self) -> &str {
        match self {
            SocketEventKind::ChatSend { session_id, .. }
            | SocketEventKind::AskQuestion { session_id, .. }
            | SocketEventKind::React { session_id, .. } => session_id,
        }
    }

    /// Emitted payload, including the idempotency key
    pub fn payload(&self, idempotency_key: &Uuid) -> Value {
        let mut payload = match self {
            SocketEventKind::ChatSend { session_id, text }
            | SocketEventKind::AskQuestion { session_id, text } => {
                json!({ "sessionId": session_id, "text": text })
            }
            SocketEventKind::React { session_id, emoji } => {
                json!({ "sessionId": session_id, "emoji": emoji })
            }
        };
        payload["idempotencyKey"] = Value::String(idempotency_key.to_string());
        payload
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        match self {
            SocketEventKind::ChatSend { session_id, text }
            | SocketEventKind::AskQuestion { session_id, text } => {
                require_id("session_id", session_id)?;
                require_text("text", text, MAX_MESSAGE_TEXT)
            }
            SocketEventKind::React { session_id, emoji } => {
                require_id("session_id", session_id)?;
                require_text("emoji", emoji, 16)
            }
        }
    }
}

fn require_id(field: &str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(field, "cannot be empty"));
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(SyncError::validation(field, "contains control characters"));
    }
    Ok(())
}

fn require_text(field: &str, value: &str, max_chars: usize) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(field, "cannot be empty"));
    }
    if value.chars().count() > max_chars {
        return Err(SyncError::validation(
            field,
            format!("must be at most {} characters", max_chars),
        ));
    }
    Ok(())
}
