pub mod auth;
pub mod auth_flow;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod feedback;
pub mod persistence;
pub mod session;
pub mod submit;

pub use auth::{AuthClient, SignOutScope, SignUpOutcome};
pub use auth_flow::{AuthFlow, AuthOutcome, AuthTab, MIN_PASSWORD_LEN, sign_out};
pub use config::{BackendConfig, DEFAULT_TABLE};
pub use dashboard::{Dashboard, RECENT_LIMIT, load_dashboard};
pub use error::{ALREADY_REGISTERED, BackendError, ConfigError, Result};
pub use feedback::{Notice, NoticeVariant, Route};
pub use persistence::{Direction, MemoryPersistence, Persistence, Query, RestPersistence};
pub use session::{AuthUser, Session, SessionStore, mask_token, session_key};
pub use submit::{SubmissionAdapter, SubmitOutcome};
