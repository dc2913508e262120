pub mod bus;
pub mod error;
pub mod event;
pub mod scheduler;
pub mod session;
pub mod session_manager;
pub mod tool_call;
pub mod turn;

pub use bus::{Event, EventBus, EventKind, EventPayload, Subscription};
pub use error::{CoreError, ErrorKind, Result};
pub use event::SessionEvent;
pub use scheduler::{Action, Schedule, Scheduler, SchedulerConfig};
pub use session::{
    SandboxPolicy, Session, SessionConfig, SessionId, SessionKey, SessionMetadata, SessionStatus,
};
pub use session_manager::{SessionManager, SessionStore};
pub use tool_call::{ToolResultData, ToolStatus, ToolUse};
pub use turn::{ContentBlock, Role, TokenUsage, Turn};
