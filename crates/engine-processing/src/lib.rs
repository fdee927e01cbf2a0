pub mod cb;
pub mod classify;
pub mod context;
pub mod controller;
pub mod error;
pub mod item;
pub mod job;
pub mod merge;
pub mod partition;
pub mod retry;
pub mod routing;
pub mod split;
pub mod state_manager;
pub mod transform;

#[cfg(test)]
mod testing;
