//! User lookup and first-login creation

use tracing::{debug, info};

use super::DocumentDataLayer;
use crate::storage::error::{AdapterResult, StoreError};
use crate::storage::handle::CollectionKind;
use crate::storage::helper::now;
use crate::storage::normalize::normalize_for_write;
use crate::storage::types::{PersistedUser, User};

impl DocumentDataLayer {
    pub(super) async fn find_user(&self, identifier: &str) -> AdapterResult<Option<PersistedUser>> {
        debug!(identifier, "Retrieving user");
        let users = self.collection(CollectionKind::Users)?;
        match users.read(identifier, identifier).await {
            Ok(doc) => {
                let user = PersistedUser::from_document(&doc).map_err(StoreError::from)?;
                debug!(identifier, "User found");
                Ok(Some(user))
            }
            Err(e) if e.is_not_found() => {
                info!(identifier, "User not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the user document; on conflict, return the stored user
    pub(super) async fn insert_user(&self, user: &User) -> AdapterResult<PersistedUser> {
        let users = self.collection(CollectionKind::Users)?;
        let doc = normalize_for_write(user.to_document(now()));

        match users.create(doc).await {
            Ok(stored) => {
                info!(identifier = %user.identifier, "User created");
                Ok(PersistedUser::from_document(&stored).map_err(StoreError::from)?)
            }
            Err(e) if e.is_conflict() => {
                info!(identifier = %user.identifier, "User already exists, retrieving existing user");
                self.find_user(&user.identifier).await?.ok_or_else(|| {
                    StoreError::NotFound {
                        container: users.name().to_string(),
                        id: user.identifier.clone(),
                    }
                    .into()
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
