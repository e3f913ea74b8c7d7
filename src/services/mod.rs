//! Services layer - Business logic
//!
//! Services coordinate repositories, the template renderer and the mail
//! provider; HTTP handlers stay thin and map service results to responses.

pub mod campaign;
pub mod guest;
pub mod mailer;
pub mod page;
pub mod rsvp;
pub mod survey;
pub mod template;

pub use campaign::{build_variables, sample_variables, spawn_scheduler, CampaignService};
pub use guest::GuestService;
pub use mailer::Mailer;
pub use page::PageService;
pub use rsvp::{RsvpError, RsvpService, RsvpSubmission, RsvpView};
pub use survey::{SurveyAnswer, SurveyService};
pub use template::TemplateService;
