use super::{CommandInteraction, Message, Reaction};

/// Event names listeners subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Error,
    MessageCreate,
    InteractionCreate,
    ReactionAdd,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::Error => "error",
            EventKind::MessageCreate => "messageCreate",
            EventKind::InteractionCreate => "interactionCreate",
            EventKind::ReactionAdd => "messageReactionAdd",
        }
    }
}

/// Event delivered by the transport
#[derive(Debug, Clone)]
pub enum Event {
    Ready,
    /// Transport-level failure that did not close the connection
    Error(String),
    MessageCreate(Message),
    InteractionCreate(CommandInteraction),
    ReactionAdd(Reaction),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Ready => EventKind::Ready,
            Event::Error(_) => EventKind::Error,
            Event::MessageCreate(_) => EventKind::MessageCreate,
            Event::InteractionCreate(_) => EventKind::InteractionCreate,
            Event::ReactionAdd(_) => EventKind::ReactionAdd,
        }
    }

    /// Whether the payload contains an incompletely hydrated structure
    pub fn has_partial(&self) -> bool {
        match self {
            Event::Ready | Event::Error(_) => false,
            Event::MessageCreate(m) => m.has_partial(),
            Event::InteractionCreate(i) => i.has_partial(),
            Event::ReactionAdd(r) => r.has_partial(),
        }
    }
}
