pub mod channel_request;
pub mod invite;
