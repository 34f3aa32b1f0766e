//! Authentication gate for relay subscribers.
//!
//! A credential is an encoded `SignMessage`. It is accepted only when it
//! decodes, names an account present in the credential store, and carries a
//! valid signature over its challenge under that account's stored key. The
//! caller learns nothing beyond accept/reject.

use std::sync::Arc;

use tracing::debug;
use tracker_crypto::verify_signed_message;
use tracker_store::AuthStore;
use tracker_types::SignMessage;

pub struct AuthGate {
    store: Arc<dyn AuthStore + Send + Sync>,
}

impl AuthGate {
    pub fn new(store: Arc<dyn AuthStore + Send + Sync>) -> Self {
        Self { store }
    }

    pub fn verify(&self, credential: &[u8]) -> bool {
        let msg = match SignMessage::decode(credential) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "rejecting undecodable credential");
                return false;
            }
        };
        let auth = match self.store.get_auth(&msg.account_name) {
            Ok(auth) => auth,
            Err(e) => {
                debug!(account = %msg.account_name, error = %e, "rejecting credential");
                return false;
            }
        };
        let ok = verify_signed_message(&msg, &auth.public_key);
        if !ok {
            debug!(account = %msg.account_name, "signature verification failed");
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tracker_crypto::{keypair_from_seed, sign_challenge};
    use tracker_store::StoreError;
    use tracker_types::Auth;

    #[derive(Default)]
    struct MapAuthStore(Mutex<HashMap<String, Auth>>);

    impl AuthStore for MapAuthStore {
        fn get_auth(&self, account: &str) -> Result<Auth, StoreError> {
            self.0
                .lock()
                .unwrap()
                .get(account)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(account.to_string()))
        }
        fn put_auth(&self, auth: &Auth) -> Result<(), StoreError> {
            self.0
                .lock()
                .unwrap()
                .insert(auth.account.clone(), auth.clone());
            Ok(())
        }
        fn iter_auths(&self) -> Result<Vec<Auth>, StoreError> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }
        fn update_public_key(&self, _: &str, _: &str) -> Result<(), StoreError> {
            unimplemented!()
        }
    }

    fn gate_with(account: &str, seed: u8) -> AuthGate {
        let store = MapAuthStore::default();
        store
            .put_auth(&Auth {
                account: account.into(),
                public_key: keypair_from_seed(&[seed; 32]).public.to_hex(),
            })
            .unwrap();
        AuthGate::new(Arc::new(store))
    }

    #[test]
    fn accepts_valid_credential() {
        let gate = gate_with("sn1", 1);
        let kp = keypair_from_seed(&[1; 32]);
        assert!(gate.verify(&sign_challenge("sn1", &kp.private).unwrap()));
    }

    #[test]
    fn rejects_wrong_key_unknown_account_and_garbage() {
        let gate = gate_with("sn1", 1);
        let wrong = keypair_from_seed(&[2; 32]);
        assert!(!gate.verify(&sign_challenge("sn1", &wrong.private).unwrap()));
        assert!(!gate.verify(&sign_challenge("sn2", &wrong.private).unwrap()));
        assert!(!gate.verify(b"garbage"));
    }
}
