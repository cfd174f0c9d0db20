pub mod action;
pub mod branch;
pub mod inforequest;
pub mod mail;
pub mod obligee;

pub use action::{
    Action, ActionDraft, ActionType, DisclosureLevel, NewAction, NewActionDraft, Origin,
    ParseEnumError,
};
pub use branch::{Branch, NewBranch};
pub use inforequest::{Inforequest, NewInforequest};
pub use mail::{Direction, Message, NewMessage, Recipient, RecipientKind};
pub use obligee::{Addressee, Obligee, ObligeeFields, ObligeeSnapshot};
