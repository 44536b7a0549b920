pub mod session;
pub mod task;
pub mod user;

pub use session::{NewSession, Session, SessionHistory, SessionKind, SessionRecord, SessionStats};
pub use task::{
    NewTask, Priority, StatsPeriod, Task, TaskHistoryEntry, TaskStats, TaskStatus, TaskUpdate,
};
pub use user::User;
