//! Data models
//!
//! Plain structs mirroring the database schema, plus the input types the
//! API deserializes.

pub mod guest;
pub mod message;
pub mod page;
pub mod survey;
pub mod template;

pub use guest::{CreateGuestInput, Guest, RsvpStatus, UpdateGuestInput};
pub use message::{
    CreateMessageInput, Message, MessageRecipient, MessageStatus, RecipientStatus,
    UpdateMessageInput,
};
pub use page::{Page, PageTranslation, UpsertPageInput, UpsertTranslationInput};
pub use survey::{
    CreateSurveyBlockInput, SurveyBlock, SurveyBlockKind, SurveyResponse, UpdateSurveyBlockInput,
};
pub use template::{CreateTemplateInput, Template, UpdateTemplateInput};
