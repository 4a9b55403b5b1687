//! Vegetation label to fuel class mapping.
//!
//! Labels are normalised (trimmed, uppercased) and tested against an ordered
//! rule list; the first matching rule wins. The list is plain data in
//! [`FUEL_RULES`] so the priority order can be inspected and tested.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical vegetation hazard category used to index the APZ table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelClass {
    Rainforest,
    Forest,
    GrassyWoodland,
    ForestedWetland,
    TallHeath,
    ShortHeath,
    AridShrubland,
    FreshwaterWetland,
    Grassland,
    NotClassified,
}

impl FuelClass {
    /// The nine classified categories, in table order.
    pub const CLASSIFIED: [FuelClass; 9] = [
        FuelClass::Rainforest,
        FuelClass::Forest,
        FuelClass::GrassyWoodland,
        FuelClass::ForestedWetland,
        FuelClass::TallHeath,
        FuelClass::ShortHeath,
        FuelClass::AridShrubland,
        FuelClass::FreshwaterWetland,
        FuelClass::Grassland,
    ];

    /// Full descriptive name of the category.
    pub fn name(&self) -> &'static str {
        match self {
            FuelClass::Rainforest => "Rainforest",
            FuelClass::Forest => {
                "Forest (wet and dry sclerophyll) including Coastal Swamp Forest, \
                 Pine Plantations and Sub-Alpine Woodland"
            }
            FuelClass::GrassyWoodland => "Grassy and Semi-Arid Woodland (including Mallee)",
            FuelClass::ForestedWetland => "Forested Wetland (excluding Coastal Swamp Forest)",
            FuelClass::TallHeath => "Tall Heath",
            FuelClass::ShortHeath => "Short Heath",
            FuelClass::AridShrubland => "Arid-Shrubland (acacia and chenopod)",
            FuelClass::FreshwaterWetland => "Freshwater Wetland",
            FuelClass::Grassland => "Grassland",
            FuelClass::NotClassified => "Not Classified",
        }
    }

    /// Short snake_case key used in tables and CSV output.
    pub fn key(&self) -> &'static str {
        match self {
            FuelClass::Rainforest => "rainforest",
            FuelClass::Forest => "forest",
            FuelClass::GrassyWoodland => "grassy_woodland",
            FuelClass::ForestedWetland => "forested_wetland",
            FuelClass::TallHeath => "tall_heath",
            FuelClass::ShortHeath => "short_heath",
            FuelClass::AridShrubland => "arid_shrubland",
            FuelClass::FreshwaterWetland => "freshwater_wetland",
            FuelClass::Grassland => "grassland",
            FuelClass::NotClassified => "not_classified",
        }
    }
}

impl fmt::Display for FuelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One classification rule.
///
/// `any_of` is a disjunction of conjunctions: the rule matches when every
/// keyword of at least one group occurs in the normalised label at the start
/// of a word ("PINE" matches "PINE PLANTATIONS" but not "ALPINE").
#[derive(Debug, Clone, Copy)]
pub struct FuelRule {
    pub name: &'static str,
    pub any_of: &'static [&'static [&'static str]],
    pub class: FuelClass,
}

impl FuelRule {
    pub fn matches(&self, normalized: &str) -> bool {
        self.any_of
            .iter()
            .any(|group| group.iter().all(|keyword| starts_word(normalized, keyword)))
    }
}

fn starts_word(text: &str, keyword: &str) -> bool {
    text.match_indices(keyword).any(|(i, _)| {
        text[..i]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Label that short-circuits to [`FuelClass::NotClassified`].
pub const NOT_CLASSIFIED_LABEL: &str = "NOT CLASSIFIED";

/// Classification rules in priority order.
pub const FUEL_RULES: &[FuelRule] = &[
    // Must precede the wetland + forest rule
    FuelRule {
        name: "coastal swamp forest",
        any_of: &[&["COASTAL SWAMP FOREST"]],
        class: FuelClass::Forest,
    },
    FuelRule {
        name: "rainforest",
        any_of: &[&["RAINFOREST"]],
        class: FuelClass::Rainforest,
    },
    FuelRule {
        name: "sclerophyll forest",
        any_of: &[&["SCLEROPHYLL"], &["PINE"], &["SUB-ALPINE"], &["SUBALPINE"]],
        class: FuelClass::Forest,
    },
    FuelRule {
        name: "grassy or semi-arid woodland",
        any_of: &[&["MALLEE"], &["WOODLAND", "GRASSY"], &["SEMI-ARID", "WOODLAND"]],
        class: FuelClass::GrassyWoodland,
    },
    FuelRule {
        name: "forested wetland",
        any_of: &[&["WETLAND", "FOREST"]],
        class: FuelClass::ForestedWetland,
    },
    FuelRule {
        name: "tall heath",
        any_of: &[&["TALL HEATH"], &["WALLUM"]],
        class: FuelClass::TallHeath,
    },
    FuelRule {
        name: "short heath",
        any_of: &[&["HEATH"]],
        class: FuelClass::ShortHeath,
    },
    FuelRule {
        name: "arid shrubland",
        any_of: &[&["ARID"], &["CHENOPOD"]],
        class: FuelClass::AridShrubland,
    },
    FuelRule {
        name: "freshwater wetland",
        any_of: &[&["FRESHWATER"]],
        class: FuelClass::FreshwaterWetland,
    },
    FuelRule {
        name: "grassland",
        any_of: &[&["GRASSLAND"]],
        class: FuelClass::Grassland,
    },
];

/// Trim and uppercase a vegetation label.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_uppercase()
}

/// First rule matching `label`, or `None` when the label is unclassified.
pub fn matching_rule(label: &str) -> Option<&'static FuelRule> {
    let normalized = normalize_label(label);
    if normalized == NOT_CLASSIFIED_LABEL {
        return None;
    }
    FUEL_RULES.iter().find(|rule| rule.matches(&normalized))
}

/// Map a free-text vegetation label to its fuel class.
///
/// Total: labels that match no rule are [`FuelClass::NotClassified`].
///
/// # Example
///
/// ```
/// use apz::fuel::{classify_vegetation, FuelClass};
///
/// assert_eq!(classify_vegetation("Coastal Swamp Forest"), FuelClass::Forest);
/// assert_eq!(classify_vegetation("  grassland "), FuelClass::Grassland);
/// assert_eq!(classify_vegetation("Urban"), FuelClass::NotClassified);
/// ```
pub fn classify_vegetation(label: &str) -> FuelClass {
    matching_rule(label)
        .map(|rule| rule.class)
        .unwrap_or(FuelClass::NotClassified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coastal_swamp_forest_overrides_wetland_rule() {
        let label = "Coastal Swamp Forest";
        assert_eq!(classify_vegetation(label), FuelClass::Forest);
        assert_eq!(matching_rule(label).unwrap().name, "coastal swamp forest");
        assert!(classify_vegetation(label).name().starts_with("Forest (wet and dry sclerophyll)"));
    }

    #[test]
    fn test_generic_wetland_forest() {
        assert_eq!(
            classify_vegetation("Forested Wetlands"),
            FuelClass::ForestedWetland
        );
    }

    #[test]
    fn test_keyword_rules() {
        let cases = [
            ("North Coast Wet Sclerophyll Forests", FuelClass::Forest),
            ("Pine plantation", FuelClass::Forest),
            ("Sub-alpine Woodlands", FuelClass::Forest),
            ("Subtropical Rainforests", FuelClass::Rainforest),
            ("Mallee Woodlands and Shrublands", FuelClass::GrassyWoodland),
            ("Western Slopes Grassy Woodlands", FuelClass::GrassyWoodland),
            ("Semi-arid Woodlands (Grassy sub-formation)", FuelClass::GrassyWoodland),
            ("Wallum Sand Heaths", FuelClass::TallHeath),
            ("Sydney Coastal Heaths", FuelClass::ShortHeath),
            ("Aeolian Chenopod Shrublands", FuelClass::AridShrubland),
            ("Arid Shrublands (Acacia sub-formation)", FuelClass::AridShrubland),
            ("Inland Floodplain Swamps (Freshwater Wetlands)", FuelClass::FreshwaterWetland),
            ("Temperate Montane Grasslands", FuelClass::Grassland),
        ];
        for (label, expected) in cases {
            assert_eq!(classify_vegetation(label), expected, "label: {}", label);
        }
    }

    #[test]
    fn test_keywords_match_at_word_start() {
        assert_eq!(classify_vegetation("Alpine Herbfields"), FuelClass::NotClassified);
        assert!(matching_rule("Alpine Herbfields").is_none());

        // SUB-ALPINE decides, not the PINE inside it
        assert_eq!(classify_vegetation("Sub-alpine Woodlands"), FuelClass::Forest);
        assert_eq!(classify_vegetation("Subalpine Woodlands"), FuelClass::Forest);
        assert_eq!(classify_vegetation("Pine Plantations"), FuelClass::Forest);

        // Suffixes and hyphenated prefixes still match
        assert_eq!(classify_vegetation("Semi-arid Woodlands"), FuelClass::GrassyWoodland);
        assert_eq!(classify_vegetation("Grasslands"), FuelClass::Grassland);
    }

    #[test]
    fn test_not_classified() {
        assert_eq!(classify_vegetation(" not classified "), FuelClass::NotClassified);
        assert_eq!(classify_vegetation(""), FuelClass::NotClassified);
        assert_eq!(classify_vegetation("Cleared land"), FuelClass::NotClassified);
        assert!(matching_rule("NOT CLASSIFIED").is_none());
    }

    #[test]
    fn test_rule_priority_is_list_order() {
        // "HEATH" alone would match short heath; the tall heath rule is earlier
        assert_eq!(classify_vegetation("Tall Heath"), FuelClass::TallHeath);

        let tall = FUEL_RULES.iter().position(|r| r.class == FuelClass::TallHeath);
        let short = FUEL_RULES.iter().position(|r| r.class == FuelClass::ShortHeath);
        assert!(tall < short);
    }

    #[test]
    fn test_every_classified_class_reachable() {
        for class in FuelClass::CLASSIFIED {
            assert!(
                FUEL_RULES.iter().any(|r| r.class == class),
                "{:?} has no rule",
                class
            );
        }
    }
}
