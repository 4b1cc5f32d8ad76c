pub mod bridge;
pub mod login;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod traits;
pub mod types;

pub use login::{CodeRequest, LoginFlow, SessionError};
pub use traits::{PlatformError, PlatformSession, SessionFactory};
pub use types::{Credentials, MediaKind, MediaRef, RawMessage};
