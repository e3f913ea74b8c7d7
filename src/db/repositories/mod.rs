//! Repository layer
//!
//! One trait per aggregate with a sqlx implementation that dispatches on
//! the configured database driver.

pub mod guest;
pub mod message;
pub mod page;
pub mod survey;
pub mod template;

pub use guest::{GuestRepository, SqlxGuestRepository};
pub use message::{MessageRepository, SqlxMessageRepository};
pub use page::{PageRepository, SqlxPageRepository};
pub use survey::{SqlxSurveyRepository, SurveyRepository};
pub use template::{SqlxTemplateRepository, TemplateRepository};
