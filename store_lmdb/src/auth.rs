//! LMDB implementation of AuthStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use tracker_store::{AuthStore, StoreError};
use tracker_types::Auth;

use crate::LmdbError;

pub struct LmdbAuthStore {
    pub(crate) env: Arc<Env>,
    pub(crate) auth_db: Database<Bytes, Bytes>,
}

fn decode(bytes: &[u8]) -> Result<Auth, LmdbError> {
    bincode::deserialize(bytes).map_err(|e| LmdbError::Serialization(e.to_string()))
}

fn encode(auth: &Auth) -> Result<Vec<u8>, LmdbError> {
    bincode::serialize(auth).map_err(|e| LmdbError::Serialization(e.to_string()))
}

impl AuthStore for LmdbAuthStore {
    fn get_auth(&self, account: &str) -> Result<Auth, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .auth_db
            .get(&rtxn, account.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| StoreError::NotFound(format!("auth '{account}'")))?;
        Ok(decode(bytes)?)
    }

    fn put_auth(&self, auth: &Auth) -> Result<(), StoreError> {
        let bytes = encode(auth)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.auth_db
            .put(&mut wtxn, auth.account.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn iter_auths(&self) -> Result<Vec<Auth>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut auths = Vec::new();
        for entry in self.auth_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, val) = entry.map_err(LmdbError::from)?;
            auths.push(decode(val)?);
        }
        Ok(auths)
    }

    fn update_public_key(&self, account: &str, public_key: &str) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut auth = match self
            .auth_db
            .get(&wtxn, account.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => decode(bytes)?,
            None => return Err(StoreError::NotFound(format!("auth '{account}'"))),
        };
        auth.public_key = public_key.to_string();
        let bytes = encode(&auth)?;
        self.auth_db
            .put(&mut wtxn, account.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
