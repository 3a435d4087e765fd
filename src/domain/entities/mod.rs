//! Domain entities - Platform objects exchanged with the transport

pub mod user;
pub mod message;
pub mod interaction;
pub mod reaction;
pub mod event;

pub use user::{User, Member, Permission};
pub use message::{Message, Mentions, Attachment, OutgoingMessage};
pub use interaction::{CommandInteraction, CommandOption, OptionKind, Resolved};
pub use reaction::{Reaction, ReactionFilter};
pub use event::{Event, EventKind};
