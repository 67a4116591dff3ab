//! Install-instruction reconciliation.
//!
//! Installation content for an iccid comes from three sources, tried in
//! order as an explicit strategy list: the live provider call, the
//! persisted instruction records from earlier fetches, and finally the
//! order detail row for SIMs sold before instructions were cached. A
//! tier that fails or comes back empty hands over to the next; only when
//! all three produce nothing is the lookup a 404.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::cache::{keys, RedisCache};
use crate::database::instruction_repository::{InstructionStore, NewInstructionRecord};
use crate::database::order_repository::{OrderDetail, OrderStore};
use crate::error::{AppError, AppErrorKind, AppResult, DomainError};
use crate::esim::client::EsimGateway;
use crate::esim::instructions::{ensure_network_setup, latest_block, network_setups_from_apn};
use crate::esim::types::{
    InstructionSet, ManualInstallation, OsInstructionBlock, QrInstallation,
};

const OS_IOS: &str = "ios";
const OS_ANDROID: &str = "android";

const INSTALL_QRCODE: &str = "qrcode";
const INSTALL_MANUAL: &str = "manual";
const INSTALL_NETWORK: &str = "network_setup";

/// Normalized installation content for one SIM. Each OS array carries at
/// most one block: the one picked by the version rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub ios: Vec<OsInstructionBlock>,
    pub android: Vec<OsInstructionBlock>,
    /// Which tier produced the content
    pub source: String,
}

#[derive(Debug, Clone, Copy)]
enum Tier {
    Live,
    Records,
    OrderDetail,
}

impl Tier {
    fn label(&self) -> &'static str {
        match self {
            Tier::Live => "live",
            Tier::Records => "records",
            Tier::OrderDetail => "order_detail",
        }
    }
}

const TIERS: [Tier; 3] = [Tier::Live, Tier::Records, Tier::OrderDetail];

pub struct InstructionService {
    provider: Arc<dyn EsimGateway>,
    store: Arc<dyn InstructionStore>,
    orders: Arc<dyn OrderStore>,
    cache: Option<RedisCache>,
}

impl InstructionService {
    pub fn new(
        provider: Arc<dyn EsimGateway>,
        store: Arc<dyn InstructionStore>,
        orders: Arc<dyn OrderStore>,
        cache: Option<RedisCache>,
    ) -> Self {
        Self {
            provider,
            store,
            orders,
            cache,
        }
    }

    pub async fn get_instructions(
        &self,
        iccid: &str,
        language: &str,
    ) -> AppResult<InstructionContent> {
        let key = keys::sim::InstructionsKey::new(iccid, language).to_string();
        if let Some(cache) = &self.cache {
            match cache.get::<InstructionContent>(&key).await {
                Ok(Some(content)) => return Ok(content),
                Ok(None) => {}
                Err(err) => warn!(iccid, error = %err, "Instruction cache read failed"),
            }
        }

        for tier in TIERS {
            let attempt = match tier {
                Tier::Live => self.from_live(iccid, language).await,
                Tier::Records => self.from_records(iccid).await,
                Tier::OrderDetail => self.from_order_detail(iccid).await,
            };
            let set = match attempt {
                Ok(Some(set)) => set,
                Ok(None) => continue,
                Err(err) => {
                    warn!(iccid, tier = tier.label(), error = %err, "Instruction tier failed");
                    continue;
                }
            };

            let content = normalize(set, tier.label());
            if let Some(cache) = &self.cache {
                if let Err(err) = cache.set(&key, &content, None).await {
                    warn!(iccid, error = %err, "Instruction cache write failed");
                }
            }
            return Ok(content);
        }

        Err(AppError::new(AppErrorKind::Domain(
            DomainError::InstructionsNotFound {
                iccid: iccid.to_string(),
            },
        )))
    }

    /// Tier 1: live provider content, APN-backfilled and persisted
    async fn from_live(&self, iccid: &str, language: &str) -> AppResult<Option<InstructionSet>> {
        let mut set = self.provider.get_install_instructions(iccid, language).await?;
        if set.ios.is_empty() && set.android.is_empty() {
            return Ok(None);
        }

        // Blocks without a network_setup get one synthesized from the
        // SIM's persisted APN data, when we have it.
        if needs_network_setup(&set) {
            let detail = self.orders.find_detail_by_iccid(iccid).await.unwrap_or_else(|err| {
                warn!(iccid, error = %err, "Order detail lookup failed during normalization");
                None
            });
            if let Some(detail) = detail {
                let (ios, android) = network_setups_from_apn(
                    detail.apn.as_ref(),
                    detail.apn_type.as_deref(),
                    detail.apn_value.as_deref(),
                    detail.is_roaming,
                );
                ensure_network_setup(&mut set, ios.as_ref(), android.as_ref());
            }
        }

        self.persist_blocks(iccid, &set).await;
        Ok(Some(set))
    }

    /// Tier 2: reassemble from persisted instruction records
    async fn from_records(&self, iccid: &str) -> AppResult<Option<InstructionSet>> {
        let records = self.store.find_by_iccid(iccid).await?;
        if records.is_empty() {
            return Ok(None);
        }

        let mut blocks: BTreeMap<(String, String), OsInstructionBlock> = BTreeMap::new();
        for record in records {
            let block = blocks
                .entry((record.os_type.clone(), record.version.clone()))
                .or_insert_with(|| OsInstructionBlock {
                    version: Some(record.version.clone()).filter(|v| !v.is_empty()),
                    ..Default::default()
                });
            match record.install_type.as_str() {
                INSTALL_QRCODE => {
                    block.installation_via_qr_code = serde_json::from_value(record.content).ok();
                }
                INSTALL_MANUAL => {
                    block.installation_manual = serde_json::from_value(record.content).ok();
                }
                INSTALL_NETWORK => {
                    block.network_setup = serde_json::from_value(record.content).ok();
                }
                other => {
                    warn!(iccid, install_type = other, "Unknown instruction record type");
                }
            }
        }

        let mut set = InstructionSet::default();
        for ((os_type, _), block) in blocks {
            match os_type.as_str() {
                OS_IOS => set.ios.push(block),
                OS_ANDROID => set.android.push(block),
                other => warn!(iccid, os_type = other, "Unknown instruction record OS"),
            }
        }
        if set.ios.is_empty() && set.android.is_empty() {
            return Ok(None);
        }
        Ok(Some(set))
    }

    /// Tier 3: minimal content from the order detail of a legacy sale
    async fn from_order_detail(&self, iccid: &str) -> AppResult<Option<InstructionSet>> {
        let Some(detail) = self.orders.find_detail_by_iccid(iccid).await? else {
            return Ok(None);
        };
        Ok(Some(set_from_order_detail(&detail)))
    }

    /// Best-effort snapshot of every block into the instruction records
    async fn persist_blocks(&self, iccid: &str, set: &InstructionSet) {
        for (os_type, blocks) in [(OS_IOS, &set.ios), (OS_ANDROID, &set.android)] {
            for block in blocks {
                let version = block.version.clone().unwrap_or_default();
                let pieces = [
                    (INSTALL_QRCODE, serialize_part(&block.installation_via_qr_code)),
                    (INSTALL_MANUAL, serialize_part(&block.installation_manual)),
                    (INSTALL_NETWORK, serialize_part(&block.network_setup)),
                ];
                for (install_type, content) in pieces {
                    let Some(content) = content else { continue };
                    let record = NewInstructionRecord {
                        iccid: iccid.to_string(),
                        os_type: os_type.to_string(),
                        install_type: install_type.to_string(),
                        version: version.clone(),
                        content,
                    };
                    if let Err(err) = self.store.upsert(record).await {
                        warn!(
                            iccid,
                            os_type,
                            install_type,
                            error = %err,
                            "Instruction record upsert failed"
                        );
                    }
                }
            }
        }
    }
}

fn serialize_part<T: Serialize>(part: &Option<T>) -> Option<serde_json::Value> {
    part.as_ref().and_then(|p| serde_json::to_value(p).ok())
}

fn needs_network_setup(set: &InstructionSet) -> bool {
    set.ios
        .iter()
        .chain(set.android.iter())
        .any(|block| block.network_setup.is_none())
}

fn normalize(set: InstructionSet, source: &str) -> InstructionContent {
    let ios = latest_block(&set.ios).cloned().into_iter().collect();
    let android = latest_block(&set.android).cloned().into_iter().collect();
    InstructionContent {
        language: set.language,
        ios,
        android,
        source: source.to_string(),
    }
}

/// Synthesize one block per OS from the fields stored with the sale
fn set_from_order_detail(detail: &OrderDetail) -> InstructionSet {
    let manual_code = match (detail.lpa.as_deref(), detail.matching_id.as_deref()) {
        (Some(lpa), Some(matching_id)) => Some(format!("{}${}", lpa, matching_id)),
        (Some(lpa), None) => Some(lpa.to_string()),
        _ => None,
    };
    let qr = if detail.qrcode.is_some() || detail.qrcode_url.is_some() {
        Some(QrInstallation {
            steps: json!({
                "1": "Open the camera and scan the QR code",
                "2": "Follow the on-screen prompts to add the eSIM"
            }),
            qr_code_data: detail.qrcode.clone(),
            qr_code_url: detail.qrcode_url.clone(),
            direct_apple_installation_url: None,
        })
    } else {
        None
    };
    let manual = manual_code.map(|code| ManualInstallation {
        steps: json!({
            "1": "Add an eSIM manually in your device settings",
            "2": "Enter the SM-DP+ address and activation code below"
        }),
        smdp_address_and_activation_code: Some(code),
        confirmation_code: detail.confirmation_code.clone(),
    });
    let (ios_setup, android_setup) = network_setups_from_apn(
        detail.apn.as_ref(),
        detail.apn_type.as_deref(),
        detail.apn_value.as_deref(),
        detail.is_roaming,
    );

    let block = |network_setup: Option<crate::esim::types::NetworkSetup>| OsInstructionBlock {
        model: None,
        version: None,
        installation_via_qr_code: qr.clone(),
        installation_manual: manual.clone(),
        network_setup,
    };

    InstructionSet {
        language: None,
        ios: vec![block(ios_setup)],
        android: vec![block(android_setup)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn detail() -> OrderDetail {
        OrderDetail {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            iccid: "8988303000000123456".to_string(),
            lpa: Some("lpa.airalo.com".to_string()),
            matching_id: Some("TEST-MATCHING".to_string()),
            qrcode: Some("LPA:1$lpa.airalo.com$TEST-MATCHING".to_string()),
            qrcode_url: None,
            apn_type: Some("automatic".to_string()),
            apn_value: Some("globaldata".to_string()),
            is_roaming: Some(false),
            confirmation_code: None,
            apn: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn order_detail_synthesis_covers_both_os() {
        let set = set_from_order_detail(&detail());
        assert_eq!(set.ios.len(), 1);
        assert_eq!(set.android.len(), 1);

        let ios = &set.ios[0];
        assert_eq!(
            ios.installation_manual
                .as_ref()
                .unwrap()
                .smdp_address_and_activation_code
                .as_deref(),
            Some("lpa.airalo.com$TEST-MATCHING")
        );
        assert!(ios.installation_via_qr_code.is_some());
        assert_eq!(
            ios.network_setup.as_ref().unwrap().apn_value.as_deref(),
            Some("globaldata")
        );
    }

    #[test]
    fn order_detail_without_apn_leaves_network_setup_out() {
        let mut d = detail();
        d.apn_type = None;
        d.apn_value = None;
        let set = set_from_order_detail(&d);
        assert!(set.ios[0].network_setup.is_none());
    }

    #[test]
    fn normalize_picks_latest_per_os() {
        let set = InstructionSet {
            language: Some("EN".to_string()),
            ios: vec![
                OsInstructionBlock {
                    version: Some("14.0".to_string()),
                    ..Default::default()
                },
                OsInstructionBlock {
                    version: Some("16.0,15.0".to_string()),
                    ..Default::default()
                },
            ],
            android: vec![],
        };
        let content = normalize(set, "live");
        assert_eq!(content.ios.len(), 1);
        assert_eq!(content.ios[0].version.as_deref(), Some("16.0,15.0"));
        assert!(content.android.is_empty());
        assert_eq!(content.source, "live");
    }
}
