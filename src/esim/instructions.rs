//! Instruction normalization helpers.
//!
//! Pure functions over the wire types: picking the "latest" block out of
//! a per-OS list, and synthesizing `network_setup` sections from APN
//! data when the provider (or a legacy order row) did not include them.

use serde_json::{json, Value};

use super::types::{InstructionSet, NetworkSetup, OsInstructionBlock};

/// Pick the entry to show by default from one OS's block list.
///
/// Versioned entries compete on the maximum of their comma-separated
/// version numbers ("16.0,15.0" counts as 16.0). When no entry has a
/// parseable version the provider convention is that the second entry is
/// the broadly applicable one, so that is returned when it exists.
pub fn latest_block(blocks: &[OsInstructionBlock]) -> Option<&OsInstructionBlock> {
    let mut best: Option<(&OsInstructionBlock, (u32, u32))> = None;
    for block in blocks {
        if let Some(max_version) = block.version.as_deref().and_then(max_parsed_version) {
            match &best {
                Some((_, current)) if *current >= max_version => {}
                _ => best = Some((block, max_version)),
            }
        }
    }
    if let Some((block, _)) = best {
        return Some(block);
    }

    if blocks.len() >= 2 {
        blocks.get(1)
    } else {
        blocks.first()
    }
}

fn max_parsed_version(version: &str) -> Option<(u32, u32)> {
    version
        .split(',')
        .filter_map(|piece| parse_version(piece.trim()))
        .max()
}

fn parse_version(piece: &str) -> Option<(u32, u32)> {
    let mut parts = piece.split('.');
    let major = parts.next()?.trim().parse::<u32>().ok()?;
    let minor = parts
        .next()
        .and_then(|minor| minor.trim().parse::<u32>().ok())
        .unwrap_or(0);
    Some((major, minor))
}

/// Build per-OS network setups from a SIM's APN data.
///
/// The raw `apn` JSON splits iOS and Android when the operator needs
/// different values; in that case each side gets its own setup. A flat
/// `apn_type`/`apn_value` pair means both OSes share one configuration.
pub fn network_setups_from_apn(
    apn: Option<&Value>,
    apn_type: Option<&str>,
    apn_value: Option<&str>,
    is_roaming: Option<bool>,
) -> (Option<NetworkSetup>, Option<NetworkSetup>) {
    if let Some(raw) = apn {
        let ios = raw.get("ios").and_then(|obj| setup_from_apn_obj(obj, true));
        let android = raw
            .get("android")
            .and_then(|obj| setup_from_apn_obj(obj, false));
        if ios.is_some() || android.is_some() {
            return (ios, android);
        }
    }

    if apn_type.is_none() && apn_value.is_none() {
        return (None, None);
    }
    let ios = Some(build_setup(true, apn_type, apn_value, is_roaming));
    let android = Some(build_setup(false, apn_type, apn_value, is_roaming));
    (ios, android)
}

fn setup_from_apn_obj(obj: &Value, ios: bool) -> Option<NetworkSetup> {
    let apn_type = obj.get("apn_type").and_then(Value::as_str);
    let apn_value = obj.get("apn_value").and_then(Value::as_str);
    if apn_type.is_none() && apn_value.is_none() {
        return None;
    }
    let is_roaming = obj.get("is_roaming").and_then(Value::as_bool);
    Some(build_setup(ios, apn_type, apn_value, is_roaming))
}

fn build_setup(
    ios: bool,
    apn_type: Option<&str>,
    apn_value: Option<&str>,
    is_roaming: Option<bool>,
) -> NetworkSetup {
    NetworkSetup {
        steps: default_network_steps(ios),
        apn_type: apn_type.map(str::to_string),
        apn_value: apn_value.map(str::to_string),
        is_roaming,
    }
}

fn default_network_steps(ios: bool) -> Value {
    if ios {
        json!({
            "1": "Go to Settings > Cellular/Mobile Data and select the installed eSIM",
            "2": "Enter the APN shown below under Cellular/Mobile Data Network",
            "3": "Enable data roaming for this line if indicated"
        })
    } else {
        json!({
            "1": "Go to Settings > Network & Internet > SIMs and select the installed eSIM",
            "2": "Enter the APN shown below under Access Point Names",
            "3": "Enable data roaming for this SIM if indicated"
        })
    }
}

/// Attach synthesized network setups to blocks missing one
pub fn ensure_network_setup(
    set: &mut InstructionSet,
    ios: Option<&NetworkSetup>,
    android: Option<&NetworkSetup>,
) {
    if let Some(setup) = ios {
        for block in &mut set.ios {
            if block.network_setup.is_none() {
                block.network_setup = Some(setup.clone());
            }
        }
    }
    if let Some(setup) = android {
        for block in &mut set.android {
            if block.network_setup.is_none() {
                block.network_setup = Some(setup.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(version: Option<&str>) -> OsInstructionBlock {
        OsInstructionBlock {
            version: version.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn highest_max_version_wins() {
        let blocks = vec![block(Some("14.0")), block(Some("16.0,15.0"))];
        let chosen = latest_block(&blocks).unwrap();
        assert_eq!(chosen.version.as_deref(), Some("16.0,15.0"));
    }

    #[test]
    fn unversioned_entries_are_skipped_when_any_version_parses() {
        let blocks = vec![block(None), block(Some("13.0")), block(Some("12.0"))];
        let chosen = latest_block(&blocks).unwrap();
        assert_eq!(chosen.version.as_deref(), Some("13.0"));
    }

    #[test]
    fn no_parseable_versions_picks_second_entry() {
        let blocks = vec![
            block(Some("latest")),
            block(Some("all models")),
            block(None),
        ];
        let chosen = latest_block(&blocks).unwrap();
        assert_eq!(chosen.version.as_deref(), Some("all models"));
    }

    #[test]
    fn single_unversioned_entry_is_returned() {
        let blocks = vec![block(None)];
        assert!(latest_block(&blocks).is_some());
    }

    #[test]
    fn empty_list_yields_none() {
        assert!(latest_block(&[]).is_none());
    }

    #[test]
    fn tie_keeps_the_first_block() {
        let blocks = vec![block(Some("15.0")), block(Some("15.0,14.0"))];
        let chosen = latest_block(&blocks).unwrap();
        assert_eq!(chosen.version.as_deref(), Some("15.0"));
    }

    #[test]
    fn split_apn_json_produces_distinct_setups() {
        let apn = json!({
            "ios": {"apn_type": "manual", "apn_value": "globaldata-ios"},
            "android": {"apn_type": "automatic", "apn_value": "globaldata"}
        });
        let (ios, android) =
            network_setups_from_apn(Some(&apn), Some("automatic"), Some("fallback"), None);
        assert_eq!(ios.unwrap().apn_value.as_deref(), Some("globaldata-ios"));
        assert_eq!(android.unwrap().apn_value.as_deref(), Some("globaldata"));
    }

    #[test]
    fn flat_apn_fields_are_shared_across_os() {
        let (ios, android) =
            network_setups_from_apn(None, Some("automatic"), Some("internet"), Some(true));
        let ios = ios.unwrap();
        let android = android.unwrap();
        assert_eq!(ios.apn_value.as_deref(), Some("internet"));
        assert_eq!(android.apn_value.as_deref(), Some("internet"));
        assert_eq!(ios.is_roaming, Some(true));
        // step text differs per OS even when the APN is shared
        assert_ne!(ios.steps, android.steps);
    }

    #[test]
    fn no_apn_data_yields_nothing() {
        let (ios, android) = network_setups_from_apn(None, None, None, None);
        assert!(ios.is_none());
        assert!(android.is_none());
    }

    #[test]
    fn ensure_network_setup_fills_only_missing_blocks() {
        let mut set = InstructionSet {
            language: Some("EN".to_string()),
            ios: vec![
                OsInstructionBlock {
                    network_setup: Some(NetworkSetup {
                        apn_value: Some("existing".to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                OsInstructionBlock::default(),
            ],
            android: vec![OsInstructionBlock::default()],
        };
        let synthesized = NetworkSetup {
            apn_value: Some("synth".to_string()),
            ..Default::default()
        };

        ensure_network_setup(&mut set, Some(&synthesized), None);

        assert_eq!(
            set.ios[0].network_setup.as_ref().unwrap().apn_value.as_deref(),
            Some("existing")
        );
        assert_eq!(
            set.ios[1].network_setup.as_ref().unwrap().apn_value.as_deref(),
            Some("synth")
        );
        assert!(set.android[0].network_setup.is_none());
    }
}
