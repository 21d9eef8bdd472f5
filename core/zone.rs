//! ZoneMapper — availability-zone to region lookup.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::ZoneError;

/// Sentinel zone name meaning "use the region's default zone list".
pub const DEFAULT_ZONE: &str = "defaultZone";

fn default_region_zone_table() -> HashMap<&'static str, Vec<&'static str>> {
    let mut table = HashMap::new();
    table.insert("us-east-1", vec!["us-east-1a", "us-east-1c", "us-east-1d", "us-east-1e"]);
    table.insert("us-west-1", vec!["us-west-1a", "us-west-1c"]);
    table.insert("us-west-2", vec!["us-west-2a", "us-west-2b", "us-west-2c"]);
    table.insert("eu-west-1", vec!["eu-west-1a", "eu-west-1b", "eu-west-1c"]);
    table
}

struct State {
    /// zone -> region
    zone_to_region: HashMap<String, String>,
    /// last list of regions passed to `configure_regions_to_fetch`, kept so
    /// `refresh()` can re-apply it.
    last_regions: Vec<String>,
}

/// Maintains `zone -> region`, seeded with a default `region -> [zones]`
/// table and refreshable against a caller-supplied per-region zone list.
pub struct ZoneMapper {
    defaults: HashMap<&'static str, Vec<&'static str>>,
    /// region -> configured zones, as supplied by the caller (e.g. from
    /// `availabilityZones[region]` in configuration).
    configured: RwLock<HashMap<String, Vec<String>>>,
    state: RwLock<State>,
}

impl ZoneMapper {
    pub fn new(configured_zones: HashMap<String, Vec<String>>) -> Self {
        ZoneMapper {
            defaults: default_region_zone_table(),
            configured: RwLock::new(configured_zones),
            state: RwLock::new(State {
                zone_to_region: HashMap::new(),
                last_regions: Vec::new(),
            }),
        }
    }

    /// Rebuilds the zone->region map for the given list of regions. For
    /// each region: use its configured zones if any (and not just the
    /// `defaultZone` sentinel); otherwise fall back to the default table;
    /// otherwise fail with `MappingMissing`.
    pub fn configure_regions_to_fetch(&self, regions: &[String]) -> Result<(), ZoneError> {
        let configured = self.configured.read();
        let mut new_map = HashMap::new();

        for region in regions {
            let zones = configured
                .get(region)
                .filter(|zs| !(zs.is_empty() || zs.as_slice() == [DEFAULT_ZONE.to_string()]))
                .cloned()
                .or_else(|| {
                    self.defaults
                        .get(region.as_str())
                        .map(|zs| zs.iter().map(|z| z.to_string()).collect::<Vec<_>>())
                })
                .ok_or_else(|| ZoneError::MappingMissing(region.clone()))?;

            for zone in zones {
                new_map.insert(zone, region.clone());
            }
        }

        let mut state = self.state.write();
        state.zone_to_region = new_map;
        state.last_regions = regions.to_vec();
        Ok(())
    }

    /// Returns the mapped region for `zone`, or `None` (meaning "local") if
    /// unknown and the trailing-character heuristic also fails to resolve
    /// it to a known region.
    pub fn region_for(&self, zone: &str) -> Option<String> {
        let state = self.state.read();
        if let Some(region) = state.zone_to_region.get(zone) {
            return Some(region.clone());
        }

        if zone.is_empty() {
            return None;
        }
        let trimmed = &zone[..zone.len() - 1];
        if state.zone_to_region.values().any(|r| r == trimmed) {
            Some(trimmed.to_string())
        } else {
            None
        }
    }

    /// Re-applies the last configured region list under a mutual-exclusion
    /// guard. A no-op if `configure_regions_to_fetch` has never been called.
    pub fn refresh(&self) -> Result<(), ZoneError> {
        let regions = {
            let state = self.state.read();
            state.last_regions.clone()
        };
        if regions.is_empty() {
            return Ok(());
        }
        self.configure_regions_to_fetch(&regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_table_when_unconfigured() {
        let mapper = ZoneMapper::new(HashMap::new());
        mapper.configure_regions_to_fetch(&["us-east-1".to_string()]).unwrap();
        assert_eq!(mapper.region_for("us-east-1a"), Some("us-east-1".to_string()));
    }

    #[test]
    fn configured_zones_override_defaults() {
        let mut configured = HashMap::new();
        configured.insert("us-east-1".to_string(), vec!["us-east-1z".to_string()]);
        let mapper = ZoneMapper::new(configured);
        mapper.configure_regions_to_fetch(&["us-east-1".to_string()]).unwrap();
        assert_eq!(mapper.region_for("us-east-1z"), Some("us-east-1".to_string()));
        assert_eq!(mapper.region_for("us-east-1a"), None);
    }

    #[test]
    fn default_zone_sentinel_falls_back_to_table() {
        let mut configured = HashMap::new();
        configured.insert("us-east-1".to_string(), vec![DEFAULT_ZONE.to_string()]);
        let mapper = ZoneMapper::new(configured);
        mapper.configure_regions_to_fetch(&["us-east-1".to_string()]).unwrap();
        assert_eq!(mapper.region_for("us-east-1a"), Some("us-east-1".to_string()));
    }

    #[test]
    fn missing_region_fails() {
        let mapper = ZoneMapper::new(HashMap::new());
        let err = mapper.configure_regions_to_fetch(&["mars-1".to_string()]).unwrap_err();
        assert!(matches!(err, ZoneError::MappingMissing(r) if r == "mars-1"));
    }

    #[test]
    fn trailing_character_heuristic_resolves_unknown_zone() {
        let mapper = ZoneMapper::new(HashMap::new());
        mapper.configure_regions_to_fetch(&["us-east-1".to_string()]).unwrap();
        // "us-east-1" is a known region (present in map values); "us-east-1x"
        // isn't a configured zone, but stripping the trailing char yields it.
        assert_eq!(mapper.region_for("us-east-1x"), Some("us-east-1".to_string()));
    }

    #[test]
    fn unresolvable_zone_is_local() {
        let mapper = ZoneMapper::new(HashMap::new());
        mapper.configure_regions_to_fetch(&["us-east-1".to_string()]).unwrap();
        assert_eq!(mapper.region_for("ap-south-1a"), None);
    }

    #[test]
    fn region_for_is_stable_across_repeated_calls() {
        let mapper = ZoneMapper::new(HashMap::new());
        mapper.configure_regions_to_fetch(&["us-west-2".to_string()]).unwrap();
        let first = mapper.region_for("us-west-2b");
        let second = mapper.region_for("us-west-2b");
        assert_eq!(first, second);
    }

    #[test]
    fn refresh_reapplies_last_region_list() {
        let mapper = ZoneMapper::new(HashMap::new());
        mapper.configure_regions_to_fetch(&["us-east-1".to_string()]).unwrap();
        mapper.refresh().unwrap();
        assert_eq!(mapper.region_for("us-east-1a"), Some("us-east-1".to_string()));
    }
}
