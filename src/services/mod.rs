pub mod accounts;
pub mod attendance;
pub mod bootstrap;
pub mod events;
pub mod notifier;
pub mod participant_sync;
pub mod profiles;
pub mod registrants;
pub mod settings;
pub mod zoom_entities;
