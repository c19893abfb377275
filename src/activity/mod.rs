// Declare submodules
pub mod activity_dto;
pub mod activity_gateway;
pub mod activity_handlers;
pub mod activity_models;
pub mod activity_poller;
pub mod announced_set;

// Re-export public items
pub use activity_dto::StartPollingRequest;
pub use activity_gateway::{ActivityGateway, HttpActivityGateway};
pub use activity_handlers::{get_polling_status, start_polling, stop_polling};
pub use activity_models::{ActivityRecord, ActivityStatus, AnnounceTemplate};
pub use activity_poller::{ActivityPoller, PollSettings, PollerHandle, PollerStatus};
pub use announced_set::AnnouncedSet;
