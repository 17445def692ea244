pub mod jolpica;
pub mod poller;
pub mod publisher;
pub mod schedule;
pub mod selector;
pub mod sensors;
pub mod timing;
