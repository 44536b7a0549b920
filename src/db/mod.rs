mod connection;
pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

pub use connection::Database;
pub use models::{
    NewSession, NewTask, Priority, Session, SessionHistory, SessionKind, SessionRecord,
    SessionStats, StatsPeriod, Task, TaskHistoryEntry, TaskStats, TaskStatus, TaskUpdate, User,
};
