//! User authentication with a weekly login allowance.
//!
//! Provides:
//! - Flat-file user store (username -> password + login history), with an
//!   in-memory backend for tests
//! - Weekly login policy (at most N logins per Monday-anchored week)
//! - Login flow that checks credentials and the policy, then records the login
//! - HMAC-signed session cookies
//!
//! ## Design Decisions
//! - Passwords are stored and compared as plain strings. Existing stores hold
//!   them that way and there is no registration path to migrate through.
//! - Every login is one `UserStore::update`, so the check-then-append cycle is
//!   serialised per store.

pub mod login;
pub mod policy;
pub mod session;
pub mod store;

pub use login::{authenticate, LoginGrant};
pub use policy::{can_login, LoginPolicy, WeekAnchor};
pub use session::{Session, SessionSigner};
pub use store::{JsonFileStore, MemoryStore, UserRecord, UserStore, Users};
