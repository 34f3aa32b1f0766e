//! Credential storage trait.

use crate::StoreError;
use tracker_types::Auth;

/// Account name to trusted public key.
pub trait AuthStore {
    fn get_auth(&self, account: &str) -> Result<Auth, StoreError>;
    fn put_auth(&self, auth: &Auth) -> Result<(), StoreError>;
    fn iter_auths(&self) -> Result<Vec<Auth>, StoreError>;

    /// Replace the key of an existing account.
    fn update_public_key(&self, account: &str, public_key: &str) -> Result<(), StoreError>;
}
