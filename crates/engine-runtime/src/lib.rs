pub mod context;
pub mod error;
pub mod runner;

pub mod actor {
    pub mod mailbox;
    pub mod scheduler;
    pub mod worker;
}

pub mod collaborators {
    pub mod export;
    pub mod notify;
    pub mod status_board;

    pub use export::{DirectoryExport, spawn_export};
    pub use notify::{LogNotifier, Notifier, WebhookNotifier, notifier_for, spawn_notifier};
    pub use status_board::JsonStatusBoard;
}
