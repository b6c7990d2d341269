use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::places::Place;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CuisineKey {
    Pizza,
    Burger,
    Chicken,
    Thai,
    Indian,
    Chinese,
    Coffee,
    Noodle,
    Sushi,
    Asian,
    Kebab,
    Bakery,
    Fish,
    Default,
}

/// Keywords in match order, paired with the key they resolve to.
const KEYWORDS: &[(&str, CuisineKey)] = &[
    ("pizza", CuisineKey::Pizza),
    ("burger", CuisineKey::Burger),
    ("chicken", CuisineKey::Chicken),
    ("sandwich", CuisineKey::Burger),
    ("thai", CuisineKey::Thai),
    ("indian", CuisineKey::Indian),
    ("chinese", CuisineKey::Chinese),
    ("coffee", CuisineKey::Coffee),
    ("noodle", CuisineKey::Noodle),
    ("sushi", CuisineKey::Sushi),
    ("asian", CuisineKey::Asian),
    ("kebab", CuisineKey::Kebab),
    ("bakery", CuisineKey::Bakery),
    ("fish", CuisineKey::Fish),
];

/// The cuisines that get a filter card, in display order.
pub const CARD_CATEGORIES: [CuisineKey; 6] = [
    CuisineKey::Burger,
    CuisineKey::Pizza,
    CuisineKey::Chicken,
    CuisineKey::Chinese,
    CuisineKey::Thai,
    CuisineKey::Indian,
];

impl CuisineKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CuisineKey::Pizza => "pizza",
            CuisineKey::Burger => "burger",
            CuisineKey::Chicken => "chicken",
            CuisineKey::Thai => "thai",
            CuisineKey::Indian => "indian",
            CuisineKey::Chinese => "chinese",
            CuisineKey::Coffee => "coffee",
            CuisineKey::Noodle => "noodle",
            CuisineKey::Sushi => "sushi",
            CuisineKey::Asian => "asian",
            CuisineKey::Kebab => "kebab",
            CuisineKey::Bakery => "bakery",
            CuisineKey::Fish => "fish",
            CuisineKey::Default => "default",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CuisineKey::Pizza => "Pizza",
            CuisineKey::Burger => "Burger",
            CuisineKey::Chicken => "Chicken",
            CuisineKey::Thai => "Thai",
            CuisineKey::Indian => "Indian",
            CuisineKey::Chinese => "Chinese",
            CuisineKey::Coffee => "Coffee",
            CuisineKey::Noodle => "Noodles",
            CuisineKey::Sushi => "Sushi",
            CuisineKey::Asian => "Asian",
            CuisineKey::Kebab => "Kebab",
            CuisineKey::Bakery => "Bakery",
            CuisineKey::Fish => "Fish",
            CuisineKey::Default => "Other",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            CuisineKey::Pizza => "🍕",
            CuisineKey::Burger => "🍔",
            CuisineKey::Chicken => "🍗",
            CuisineKey::Thai => "🍜",
            CuisineKey::Indian => "🍛",
            CuisineKey::Chinese => "🥡",
            CuisineKey::Coffee => "☕",
            CuisineKey::Noodle => "🍝",
            CuisineKey::Sushi => "🍣",
            CuisineKey::Asian => "🥢",
            CuisineKey::Kebab => "🥙",
            CuisineKey::Bakery => "🥐",
            CuisineKey::Fish => "🐟",
            CuisineKey::Default => "🍽️",
        }
    }

    /// Maps a single cuisine token to a key; `sandwich` folds into `burger`.
    fn from_token(token: &str) -> Option<CuisineKey> {
        let token = if token == "sandwich" { "burger" } else { token };
        KEYWORDS
            .iter()
            .find(|(keyword, _)| *keyword == token)
            .map(|(_, key)| *key)
    }
}

impl fmt::Display for CuisineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CuisineKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if lowered == "default" {
            return Ok(CuisineKey::Default);
        }
        CuisineKey::from_token(&lowered).ok_or_else(|| format!("unknown cuisine: {}", s))
    }
}

/// Derives the cuisine of a place from its `cuisine` tag, falling back to its name.
pub fn categorize(place: &Place) -> CuisineKey {
    if let Some(cuisine) = place.tag("cuisine") {
        let from_tag = cuisine
            .split(';')
            .map(|token| token.trim().to_lowercase())
            .find_map(|token| CuisineKey::from_token(&token));
        if let Some(key) = from_tag {
            return key;
        }
    }

    let name = place.name.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(keyword, _)| name.contains(name_search_term(keyword)))
        .map(|(_, key)| *key)
        .unwrap_or(CuisineKey::Default)
}

/// The text looked for in a place name for a keyword entry. Sandwich and
/// kebab entries search for "burger" but keep their own key.
fn name_search_term(keyword: &str) -> &str {
    match keyword {
        "sandwich" | "kebab" => "burger",
        other => other,
    }
}

/// A card key: either the implicit "All" card or one cuisine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKey {
    All,
    Cuisine(CuisineKey),
}

impl CardKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKey::All => "all",
            CardKey::Cuisine(key) => key.as_str(),
        }
    }
}

impl Serialize for CardKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl FromStr for CardKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CardKey::All)
        } else {
            s.parse::<CuisineKey>().map(CardKey::Cuisine)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCard {
    pub key: CardKey,
    pub label: String,
    pub icon: &'static str,
    pub count: usize,
    pub active: bool,
}

/// The set of active cuisine filters; empty means "All".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    active: BTreeSet<CuisineKey>,
}

impl Selection {
    pub fn is_all(&self) -> bool {
        self.active.is_empty()
    }

    pub fn contains(&self, key: CuisineKey) -> bool {
        self.active.contains(&key)
    }

    pub fn toggle(&mut self, key: CardKey) {
        match key {
            CardKey::All => self.active.clear(),
            CardKey::Cuisine(cuisine) => {
                if !self.active.remove(&cuisine) {
                    self.active.insert(cuisine);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = CuisineKey> + '_ {
        self.active.iter().copied()
    }

    pub fn matches(&self, place: &Place) -> bool {
        self.is_all() || self.active.contains(&categorize(place))
    }
}

impl FromIterator<CuisineKey> for Selection {
    fn from_iter<I: IntoIterator<Item = CuisineKey>>(iter: I) -> Self {
        Self {
            active: iter.into_iter().collect(),
        }
    }
}

pub fn filter_places<'a>(places: &'a [Place], selection: &Selection) -> Vec<&'a Place> {
    places.iter().filter(|place| selection.matches(place)).collect()
}

/// Builds the "All" card plus one card per fixed category that has at least one place.
pub fn category_cards(places: &[Place], selection: &Selection) -> Vec<CategoryCard> {
    let mut counts = [0usize; CARD_CATEGORIES.len()];
    for place in places {
        let key = categorize(place);
        if let Some(slot) = CARD_CATEGORIES.iter().position(|c| *c == key) {
            counts[slot] += 1;
        }
    }

    let mut cards = vec![CategoryCard {
        key: CardKey::All,
        label: "All".to_string(),
        icon: CuisineKey::Default.emoji(),
        count: places.len(),
        active: selection.is_all(),
    }];
    cards.extend(
        CARD_CATEGORIES
            .iter()
            .zip(counts)
            .filter(|(_, count)| *count > 0)
            .map(|(key, count)| CategoryCard {
                key: CardKey::Cuisine(*key),
                label: key.label().to_string(),
                icon: key.emoji(),
                count,
                active: selection.contains(*key),
            }),
    );
    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn place(name: &str, cuisine: Option<&str>) -> Place {
        let mut tags = HashMap::new();
        tags.insert("name".to_string(), name.to_string());
        if let Some(c) = cuisine {
            tags.insert("cuisine".to_string(), c.to_string());
        }
        Place {
            name: name.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            distance_meters: 0.0,
            tags,
        }
    }

    #[test]
    fn sandwich_tag_folds_into_burger() {
        assert_eq!(categorize(&place("Subs", Some("Sandwich"))), CuisineKey::Burger);
    }

    #[test]
    fn first_recognised_tag_token_wins() {
        assert_eq!(categorize(&place("X", Some("regional; Thai ;pizza"))), CuisineKey::Thai);
        assert_eq!(categorize(&place("X", Some("mexican;fish"))), CuisineKey::Fish);
    }

    #[test]
    fn unrecognised_tag_falls_back_to_name() {
        assert_eq!(categorize(&place("Golden Chicken Hut", Some("mexican"))), CuisineKey::Chicken);
    }

    #[test]
    fn name_matching_follows_keyword_order() {
        assert_eq!(categorize(&place("Pizza & Burger Bar", None)), CuisineKey::Pizza);
        assert_eq!(categorize(&place("Thai Noodle House", None)), CuisineKey::Thai);
    }

    #[test]
    fn sandwich_and_kebab_names_search_for_burger() {
        assert_eq!(categorize(&place("The Sandwich Shop", None)), CuisineKey::Default);
        assert_eq!(categorize(&place("KEBAB KING", None)), CuisineKey::Default);
        assert_eq!(categorize(&place("Kebab & Burger Grill", None)), CuisineKey::Burger);
    }

    #[test]
    fn kebab_tag_keeps_its_own_key() {
        assert_eq!(categorize(&place("KEBAB KING", Some("kebab"))), CuisineKey::Kebab);
    }

    #[test]
    fn missing_everything_is_default() {
        assert_eq!(categorize(&place("Joe's", None)), CuisineKey::Default);
        let mut bare = place("Joe's", None);
        bare.tags.clear();
        assert_eq!(categorize(&bare), CuisineKey::Default);
    }

    #[test]
    fn categorize_is_deterministic() {
        let p = place("Noodle Bar", Some("asian;noodle"));
        assert_eq!(categorize(&p), categorize(&p));
    }

    #[test]
    fn cards_skip_empty_categories() {
        let mut places = vec![
            place("A", Some("pizza")),
            place("B", Some("pizza")),
            place("C", Some("pizza")),
        ];
        places.extend((0..4).map(|i| place(&format!("Plain {}", i), None)));

        let cards = category_cards(&places, &Selection::default());
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].key, CardKey::All);
        assert_eq!(cards[0].count, 7);
        assert!(cards[0].active);
        assert_eq!(cards[1].key, CardKey::Cuisine(CuisineKey::Pizza));
        assert_eq!(cards[1].count, 3);
        assert!(!cards.iter().any(|c| c.key == CardKey::Cuisine(CuisineKey::Indian)));
    }

    #[test]
    fn selection_is_a_union_filter() {
        let places = vec![
            place("A", Some("burger")),
            place("B", Some("pizza")),
            place("C", Some("thai")),
            place("D", None),
        ];
        let selection: Selection = [CuisineKey::Burger, CuisineKey::Pizza].into_iter().collect();
        let names: Vec<&str> = filter_places(&places, &selection).iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);

        assert_eq!(filter_places(&places, &Selection::default()).len(), 4);
    }

    #[test]
    fn toggling_twice_restores_all() {
        let mut selection = Selection::default();
        selection.toggle(CardKey::Cuisine(CuisineKey::Thai));
        assert!(selection.contains(CuisineKey::Thai));
        selection.toggle(CardKey::Cuisine(CuisineKey::Thai));
        assert!(selection.is_all());

        selection.toggle(CardKey::Cuisine(CuisineKey::Indian));
        selection.toggle(CardKey::All);
        assert!(selection.is_all());
    }

    #[test]
    fn card_keys_parse_from_paths() {
        assert_eq!("all".parse::<CardKey>().unwrap(), CardKey::All);
        assert_eq!("Pizza".parse::<CardKey>().unwrap(), CardKey::Cuisine(CuisineKey::Pizza));
        assert!("tapas".parse::<CardKey>().is_err());
    }
}
