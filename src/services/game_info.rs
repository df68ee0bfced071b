use std::sync::Arc;

use crate::{
    chain::{
        decode::{decode_account, decode_endless_game, decode_pool_table_id, dynamic_field_name},
        ChainRpc,
    },
    config::ChainObjects,
    error::{AppError, Result},
    game::session::{AccountInfo, GameSessionSnapshot, SessionKey},
    utils::ids_eq,
};

/// Reads authoritative game progress from chain storage.
pub struct GameInfoFetcher {
    chain: Arc<dyn ChainRpc>,
    objects: ChainObjects,
    max_scan_pages: usize,
}

impl GameInfoFetcher {
    pub fn new(chain: Arc<dyn ChainRpc>, objects: ChainObjects, max_scan_pages: usize) -> Self {
        Self {
            chain,
            objects,
            max_scan_pages: max_scan_pages.max(1),
        }
    }

    /// The identity's data-pool entry, or `None` for an identity that never
    /// played (or an empty identity).
    pub async fn fetch_account(&self, identity: &str) -> Result<Option<AccountInfo>> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Ok(None);
        }

        let Some(entry_id) = self.find_entry(identity).await? else {
            return Ok(None);
        };
        let Some(entry) = self.chain.get_object(&entry_id).await? else {
            tracing::warn!(
                "Pool entry {} for {} listed but not readable yet",
                entry_id,
                identity
            );
            return Ok(None);
        };
        decode_account(identity, &entry.fields).map(Some)
    }

    pub async fn fetch_session(
        &self,
        identity: &str,
        session_key: &SessionKey,
    ) -> Result<Option<GameSessionSnapshot>> {
        if session_key.is_endless() {
            return self.fetch_endless_session().await.map(Some);
        }
        let Some(account) = self.fetch_account(identity).await? else {
            return Ok(None);
        };
        Ok(account.game(session_key).cloned())
    }

    pub async fn fetch_endless_session(&self) -> Result<GameSessionSnapshot> {
        let object = self
            .chain
            .get_object(&self.objects.endless_game_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("endless game {}", self.objects.endless_game_id))
            })?;
        decode_endless_game(&object.fields)
    }

    /// First identity token owned by `owner`.
    pub async fn find_identity_token(&self, owner: &str) -> Result<Option<String>> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Ok(None);
        }
        let struct_type = self.objects.identity_type();
        let mut cursor = None;
        for _ in 0..self.max_scan_pages {
            let page = self
                .chain
                .get_owned_objects(owner, &struct_type, cursor.take())
                .await?;
            if let Some(found) = page.data.into_iter().next() {
                return Ok(Some(found.object_id));
            }
            if !page.has_next_page {
                return Ok(None);
            }
            cursor = page.next_cursor;
        }
        tracing::warn!("Owned object scan for {} hit the page cap", owner);
        Ok(None)
    }

    async fn find_entry(&self, identity: &str) -> Result<Option<String>> {
        let pool = self
            .chain
            .get_object(&self.objects.data_pool_id)
            .await?
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Data pool {} does not exist on this network",
                    self.objects.data_pool_id
                ))
            })?;
        let table_id = decode_pool_table_id(&pool.fields)?;

        let mut cursor = None;
        for page_no in 0..self.max_scan_pages {
            let page = self.chain.get_dynamic_fields(&table_id, cursor.take()).await?;
            let found = page.data.into_iter().find(|entry| {
                dynamic_field_name(&entry.name).is_some_and(|name| ids_eq(name, identity))
            });
            if let Some(entry) = found {
                tracing::debug!("Found pool entry for {} on page {}", identity, page_no);
                return Ok(Some(entry.object_id));
            }
            if !page.has_next_page || page.next_cursor.is_none() {
                return Ok(None);
            }
            cursor = page.next_cursor;
        }
        tracing::warn!(
            "Pool scan for {} stopped after {} pages",
            identity,
            self.max_scan_pages
        );
        Ok(None)
    }
}
