use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::error::CafeScoutError;

/// The fixed preference vocabulary. Every `FilterState` carries exactly
/// these keys; anything else is rejected at the toggle boundary and ignored
/// on deserialization.
pub const FILTER_KEYS: [&str; 7] = [
    "pastries", "food", "coffee", "wifi", "outlets", "seating", "study",
];

/// Keyword heuristics per filter, matched against a place's name and
/// provider type tags. The provider exposes no structured signal for
/// concepts like "study-friendly" or "seating", so those are inferred from
/// name/type keywords rather than silently treated as always-false.
pub fn filter_keywords(key: &str) -> &'static [&'static str] {
    match key {
        "pastries" => &[
            "bakery", "pastry", "croissant", "muffin", "scone", "danish", "donut", "cake",
        ],
        "food" => &[
            "restaurant", "food", "dining", "meal", "lunch", "breakfast", "brunch", "bistro",
            "eatery", "sandwich",
        ],
        "coffee" => &[
            "coffee", "espresso", "cappuccino", "latte", "roaster", "cafe",
        ],
        "wifi" => &["wifi", "internet", "wireless", "laptop friendly"],
        "outlets" => &["outlet", "charging", "plug", "workspace", "laptop"],
        "seating" => &["seating", "spacious", "cozy", "roomy", "lounge"],
        "study" => &["quiet", "study", "workspace", "coworking", "library"],
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterValue {
    #[default]
    Neutral,
    Include,
    Exclude,
}

impl FilterValue {
    /// One step through the cycle neutral -> include -> exclude -> neutral.
    pub fn toggled(self) -> Self {
        match self {
            FilterValue::Neutral => FilterValue::Include,
            FilterValue::Include => FilterValue::Exclude,
            FilterValue::Exclude => FilterValue::Neutral,
        }
    }
}

/// Tri-state preference flags over the fixed vocabulary. Invariant: every
/// key in `FILTER_KEYS` is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    values: BTreeMap<&'static str, FilterValue>,
}

impl FilterState {
    /// All-neutral state, the per-session default.
    pub fn new() -> Self {
        Self {
            values: FILTER_KEYS
                .iter()
                .map(|key| (*key, FilterValue::Neutral))
                .collect(),
        }
    }

    /// A state with the given keys set to include, everything else neutral.
    /// Unknown keys fail with `InvalidFilterKey`.
    pub fn including<'a>(keys: impl IntoIterator<Item = &'a str>) -> Result<Self, CafeScoutError> {
        let mut state = Self::new();
        for key in keys {
            let canonical = Self::canonical(key)?;
            state.values.insert(canonical, FilterValue::Include);
        }
        Ok(state)
    }

    pub fn get(&self, key: &str) -> Option<FilterValue> {
        self.values.get(key).copied()
    }

    /// Advance exactly one key one step through the tri-state cycle.
    pub fn toggle(&mut self, key: &str) -> Result<FilterValue, CafeScoutError> {
        let canonical = Self::canonical(key)?;
        let next = self.values[canonical].toggled();
        self.values.insert(canonical, next);
        Ok(next)
    }

    /// Set one key directly. Used for derived per-request states (e.g.
    /// merging model-suggested filters); session states only change through
    /// `toggle`.
    pub fn set(&mut self, key: &str, value: FilterValue) -> Result<(), CafeScoutError> {
        let canonical = Self::canonical(key)?;
        self.values.insert(canonical, value);
        Ok(())
    }

    /// Partition keys into (include, exclude), omitting neutral from both.
    pub fn active(&self) -> (Vec<&'static str>, Vec<&'static str>) {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for (key, value) in &self.values {
            match value {
                FilterValue::Include => include.push(*key),
                FilterValue::Exclude => exclude.push(*key),
                FilterValue::Neutral => {}
            }
        }
        (include, exclude)
    }

    pub fn is_all_neutral(&self) -> bool {
        self.values.values().all(|v| *v == FilterValue::Neutral)
    }

    /// Compact one-line summary of active filters for the reasoning prompt.
    /// Empty string when everything is neutral.
    pub fn prompt_summary(&self) -> String {
        let (include, exclude) = self.active();
        let mut parts = Vec::new();
        if !include.is_empty() {
            parts.push(format!("I want places with: {}.", include.join(", ")));
        }
        if !exclude.is_empty() {
            parts.push(format!("I want to avoid: {}.", exclude.join(", ")));
        }
        parts.join(" ")
    }

    fn canonical(key: &str) -> Result<&'static str, CafeScoutError> {
        FILTER_KEYS
            .iter()
            .find(|k| **k == key)
            .copied()
            .ok_or_else(|| CafeScoutError::InvalidFilterKey(key.to_string()))
    }
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}

impl Serialize for FilterState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FilterState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FilterStateVisitor;

        impl<'de> Visitor<'de> for FilterStateVisitor {
            type Value = FilterState;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of filter name to neutral/include/exclude")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut state = FilterState::new();
                while let Some((key, value)) = access.next_entry::<String, FilterValue>()? {
                    match FilterState::canonical(&key) {
                        Ok(canonical) => {
                            state.values.insert(canonical, value);
                        }
                        // Unknown keys are dropped at the boundary, never stored.
                        Err(_) => debug!(key, "Ignoring unknown filter key"),
                    }
                }
                Ok(state)
            }
        }

        deserializer.deserialize_map(FilterStateVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_toggles_return_to_start() {
        for key in FILTER_KEYS {
            let mut state = FilterState::new();
            let start = state.clone();
            state.toggle(key).unwrap();
            state.toggle(key).unwrap();
            state.toggle(key).unwrap();
            assert_eq!(state, start, "cycle broken for {key}");
        }
    }

    #[test]
    fn toggle_changes_only_the_named_key() {
        let mut state = FilterState::new();
        state.toggle("wifi").unwrap();
        assert_eq!(state.get("wifi"), Some(FilterValue::Include));
        for key in FILTER_KEYS.iter().filter(|k| **k != "wifi") {
            assert_eq!(state.get(key), Some(FilterValue::Neutral));
        }
    }

    #[test]
    fn toggle_unknown_key_is_rejected_before_mutation() {
        let mut state = FilterState::new();
        let err = state.toggle("parking").unwrap_err();
        assert!(matches!(err, CafeScoutError::InvalidFilterKey(_)));
        assert!(state.is_all_neutral());
    }

    #[test]
    fn active_partitions_and_omits_neutral() {
        let mut state = FilterState::new();
        state.toggle("wifi").unwrap();
        state.toggle("food").unwrap();
        state.toggle("food").unwrap();
        let (include, exclude) = state.active();
        assert_eq!(include, vec!["wifi"]);
        assert_eq!(exclude, vec!["food"]);
    }

    #[test]
    fn deserialize_fills_missing_keys_and_drops_unknown() {
        let state: FilterState =
            serde_json::from_str(r#"{"wifi":"include","parking":"exclude"}"#).unwrap();
        assert_eq!(state.get("wifi"), Some(FilterValue::Include));
        assert_eq!(state.get("parking"), None);
        assert_eq!(state.get("study"), Some(FilterValue::Neutral));
    }

    #[test]
    fn serialize_round_trips() {
        let mut state = FilterState::new();
        state.toggle("outlets").unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let back: FilterState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn every_filter_key_has_keywords() {
        for key in FILTER_KEYS {
            assert!(!filter_keywords(key).is_empty(), "no keywords for {key}");
        }
    }

    #[test]
    fn prompt_summary_mentions_active_filters_only() {
        let mut state = FilterState::new();
        assert_eq!(state.prompt_summary(), "");
        state.toggle("wifi").unwrap();
        state.toggle("food").unwrap();
        state.toggle("food").unwrap();
        let summary = state.prompt_summary();
        assert!(summary.contains("places with: wifi"));
        assert!(summary.contains("avoid: food"));
    }
}
