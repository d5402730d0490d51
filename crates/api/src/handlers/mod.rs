pub mod admin;
pub mod flows;
pub mod jobs;
pub mod mip003;
pub mod webhooks;
