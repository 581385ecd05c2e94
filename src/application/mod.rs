pub mod elicitation;
pub mod list_change;
pub mod progress;
mod recovery;
pub mod response;
pub mod resubmit;
pub mod two_step;
pub mod visibility;
