pub mod error;
pub mod metrics;
pub mod retry;
pub mod state;
pub mod status;
pub mod tables;

pub mod event_bus {
    pub mod bus;
}
