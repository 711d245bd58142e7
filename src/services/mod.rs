pub mod link_service;
pub mod shorten;

pub use link_service::{
    AccessEvent, CreateLinkRequest, CreatedLink, LinkService, ResolveOutcome, StatsPage,
};
pub use shorten::HashGenerator;
