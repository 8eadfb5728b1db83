pub mod consts;
pub mod engine;
pub mod server;
pub mod setting;
pub mod slack;
pub mod standup;
pub mod store;
