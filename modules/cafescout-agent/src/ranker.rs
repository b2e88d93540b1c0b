use std::cmp::Ordering;

use tracing::debug;

use cafescout_common::{filter_keywords, haversine_km, FilterState, Place, FILTER_KEYS};

/// Two id-less candidates this close with the same normalized name are the
/// same physical place.
const DEDUP_DISTANCE_KM: f64 = 0.05;

/// Score, filter, dedupe, and order candidates. Exclusion and dedup run
/// against the full pool; truncation to `cap` happens last.
pub fn rank(candidates: Vec<Place>, filters: &FilterState, cap: usize) -> Vec<Place> {
    let (include, exclude) = filters.active();

    let mut survivors: Vec<Place> = Vec::with_capacity(candidates.len());
    for mut place in candidates {
        attach_matches(&mut place);

        // Hard exclusion: an exclude-state match removes the place outright,
        // regardless of rating.
        if exclude
            .iter()
            .any(|key| place.filter_matches.get(*key).copied().unwrap_or(false))
        {
            debug!(place = %place.name, "Dropping place matching an excluded filter");
            continue;
        }

        if is_duplicate(&survivors, &place) {
            debug!(place = %place.name, "Dropping duplicate candidate");
            continue;
        }

        survivors.push(place);
    }

    // Stable sort keeps provider relevance order among full ties.
    survivors.sort_by(|a, b| {
        b.match_count(&include)
            .cmp(&a.match_count(&include))
            .then_with(|| rating_desc(a.rating, b.rating))
            .then_with(|| {
                b.user_ratings_total
                    .unwrap_or(0)
                    .cmp(&a.user_ratings_total.unwrap_or(0))
            })
    });

    survivors.truncate(cap);
    survivors
}

/// Populate the full per-filter boolean map from the keyword heuristic over
/// name + provider type tags.
fn attach_matches(place: &mut Place) {
    let haystack = format!(
        "{} {}",
        place.name.to_lowercase(),
        place.types.join(" ").to_lowercase()
    );
    for key in FILTER_KEYS {
        let matched = filter_keywords(key)
            .iter()
            .any(|keyword| haystack.contains(keyword));
        place.filter_matches.insert(key.to_string(), matched);
    }
}

/// First occurrence wins: same provider id, or (absent ids) same normalized
/// name within the distance tolerance.
fn is_duplicate(kept: &[Place], candidate: &Place) -> bool {
    kept.iter().any(|existing| {
        if !candidate.place_id.is_empty() && !existing.place_id.is_empty() {
            return candidate.place_id == existing.place_id;
        }
        if normalized_name(&candidate.name) != normalized_name(&existing.name) {
            return false;
        }
        match (candidate.location, existing.location) {
            (Some(a), Some(b)) => haversine_km(a, b) < DEDUP_DISTANCE_KM,
            // No coordinates to separate them: same name collapses.
            _ => true,
        }
    })
}

fn normalized_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Descending rating, missing ratings sorted last.
fn rating_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafescout_common::GeoPoint;

    fn place(id: &str, name: &str, rating: Option<f64>, reviews: Option<u32>) -> Place {
        Place {
            place_id: id.to_string(),
            name: name.to_string(),
            rating,
            user_ratings_total: reviews,
            vicinity: Some("somewhere".to_string()),
            types: vec!["cafe".to_string()],
            photo_urls: Vec::new(),
            location: None,
            maps_link: String::new(),
            filter_matches: Default::default(),
        }
    }

    fn filters(include: &[&str], exclude: &[&str]) -> FilterState {
        let mut state = FilterState::new();
        for key in include {
            state.toggle(key).unwrap();
        }
        for key in exclude {
            state.toggle(key).unwrap();
            state.toggle(key).unwrap();
        }
        state
    }

    #[test]
    fn excluded_filter_match_removes_place_regardless_of_rating() {
        let candidates = vec![
            place("a", "Quiet Study Hall Coffee", Some(5.0), Some(9000)),
            place("b", "Plain Espresso Bar", Some(3.9), Some(40)),
        ];
        let ranked = rank(candidates, &filters(&[], &["study"]), 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].place_id, "b");
    }

    #[test]
    fn include_wifi_exclude_food_keeps_only_wifi_place() {
        let mut wifi_only = place("a", "Laptop Lounge", Some(4.0), Some(100));
        wifi_only.types = vec!["cafe".to_string(), "wifi".to_string()];
        let mut wifi_and_food = place("b", "Wifi Restaurant", Some(4.8), Some(500));
        wifi_and_food.types = vec!["restaurant".to_string(), "wifi".to_string()];

        let ranked = rank(vec![wifi_only, wifi_and_food], &filters(&["wifi"], &["food"]), 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].place_id, "a");
        assert!(ranked[0].filter_matches["wifi"]);
    }

    #[test]
    fn include_match_count_beats_rating() {
        // Matches coffee + pastries vs coffee only.
        let double = place("a", "Bakery Coffee Co", Some(4.0), Some(50));
        let single = place("b", "Espresso Bar", Some(4.9), Some(5000));
        let ranked = rank(vec![single, double], &filters(&["coffee", "pastries"], &[]), 5);
        assert_eq!(ranked[0].place_id, "a");
    }

    #[test]
    fn rating_tie_breaks_on_review_count() {
        let few = place("a", "Cafe One", Some(4.5), Some(12));
        let many = place("b", "Cafe Two", Some(4.5), Some(2400));
        let ranked = rank(vec![few, many], &FilterState::new(), 5);
        assert_eq!(ranked[0].place_id, "b");
        assert_eq!(ranked[1].place_id, "a");
    }

    #[test]
    fn missing_rating_sorts_last() {
        let unrated = place("a", "Mystery Cafe", None, Some(3));
        let rated = place("b", "Known Cafe", Some(3.1), Some(3));
        let ranked = rank(vec![unrated, rated], &FilterState::new(), 5);
        assert_eq!(ranked[0].place_id, "b");
    }

    #[test]
    fn duplicate_place_ids_collapse_to_first_occurrence() {
        let mut first = place("same", "Twin Cafe", Some(4.2), Some(80));
        first.photo_urls = vec!["http://photo/first".to_string()];
        let second = place("same", "Twin Cafe", Some(1.0), Some(2));

        let ranked = rank(vec![first, second], &FilterState::new(), 5);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].rating, Some(4.2));
        assert_eq!(ranked[0].photo_urls, vec!["http://photo/first".to_string()]);
    }

    #[test]
    fn idless_places_collapse_by_name_and_proximity() {
        let mut a = place("", "Corner Cafe", Some(4.0), Some(10));
        a.location = Some(GeoPoint { lat: 47.6062, lng: -122.3321 });
        let mut b = place("", "corner cafe ", Some(3.0), Some(5));
        b.location = Some(GeoPoint { lat: 47.6063, lng: -122.3322 });
        // Same name but across town: a distinct place.
        let mut c = place("", "Corner Cafe", Some(2.0), Some(1));
        c.location = Some(GeoPoint { lat: 47.70, lng: -122.40 });

        let ranked = rank(vec![a, b, c], &FilterState::new(), 5);
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn truncation_happens_after_exclusion_and_dedup() {
        let mut candidates = vec![
            place("dup", "Dup Cafe", Some(5.0), Some(10)),
            place("dup", "Dup Cafe", Some(5.0), Some(10)),
            place("x", "Study Nook", Some(5.0), Some(10)),
        ];
        for i in 0..4 {
            candidates.push(place(&format!("p{i}"), "Filler Cafe", Some(4.0), Some(i)));
        }
        // cap 3: the dup and the excluded place must not consume slots.
        let ranked = rank(candidates, &filters(&[], &["study"]), 3);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|p| p.name != "Study Nook"));
    }

    #[test]
    fn all_neutral_filters_order_by_rating() {
        let low = place("a", "Low Cafe", Some(3.2), Some(10));
        let high = place("b", "High Cafe", Some(4.8), Some(10));
        let mid = place("c", "Mid Cafe", Some(4.0), Some(10));
        let ranked = rank(vec![low, high, mid], &FilterState::new(), 5);
        let names: Vec<_> = ranked.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["High Cafe", "Mid Cafe", "Low Cafe"]);
    }
}
