mod delegate;

pub use delegate::{AuthDelegate, AuthError, HttpAuthDelegate, UserIdentity};
