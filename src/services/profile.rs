//! Profile operations: contact details and saved cards.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::profile_repository::ProfileStore;
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};
use crate::payments::types::{BindCardRequest, CardSecret, Cardholder};
use crate::payments::CardGateway;

#[derive(Debug, Clone, Serialize)]
pub struct ContactInfo {
    pub user_id: String,
    pub email: Option<String>,
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedCard {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
}

pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    cards: Arc<dyn CardGateway>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn ProfileStore>, cards: Arc<dyn CardGateway>) -> Self {
        Self { store, cards }
    }

    /// Upsert email and/or invoice carrier; omitted fields keep their
    /// stored value.
    pub async fn save_contact(
        &self,
        user_id: &str,
        email: Option<&str>,
        carrier: Option<&str>,
    ) -> AppResult<ContactInfo> {
        let profile = self.store.upsert_contact(user_id, email, carrier).await?;
        Ok(ContactInfo {
            user_id: profile.user_id,
            email: profile.email,
            carrier: profile.invoice_carrier,
        })
    }

    /// Stored contact details; a user without a profile row just has
    /// nothing saved yet.
    pub async fn get_contact(&self, user_id: &str) -> AppResult<ContactInfo> {
        let profile = self.store.find_by_user_id(user_id).await?;
        Ok(match profile {
            Some(profile) => ContactInfo {
                user_id: profile.user_id,
                email: profile.email,
                carrier: profile.invoice_carrier,
            },
            None => ContactInfo {
                user_id: user_id.to_string(),
                email: None,
                carrier: None,
            },
        })
    }

    /// Exchange a prime for reusable card credentials and store them
    pub async fn bind_card(
        &self,
        user_id: &str,
        prime: &str,
        cardholder: Cardholder,
    ) -> AppResult<SavedCard> {
        let bound = self
            .cards
            .bind_card(&BindCardRequest {
                prime: prime.to_string(),
                cardholder,
            })
            .await?;

        self.store
            .set_card(
                user_id,
                &bound.card_secret.card_key,
                &bound.card_secret.card_token,
                bound.card_last_four.as_deref(),
            )
            .await?;

        info!(user_id, "Card bound");
        Ok(SavedCard {
            user_id: user_id.to_string(),
            card_last_four: bound.card_last_four,
        })
    }

    /// Remove the stored card at the gateway and locally
    pub async fn remove_card(&self, user_id: &str) -> AppResult<()> {
        let profile = self.store.find_by_user_id(user_id).await?;
        let secret = profile.and_then(|p| match (p.card_key, p.card_token) {
            (Some(card_key), Some(card_token)) => Some(CardSecret {
                card_key,
                card_token,
            }),
            _ => None,
        });
        let Some(secret) = secret else {
            return Err(AppError::new(AppErrorKind::Domain(DomainError::CardNotBound {
                user_id: user_id.to_string(),
            })));
        };

        self.cards.remove_card(&secret).await?;

        if !self.store.clear_card(user_id).await? {
            // Gateway removal succeeded but the row vanished under us
            warn!(user_id, "Card removed at gateway but no profile row to clear");
        }

        info!(user_id, "Card removed");
        Ok(())
    }
}
