//! Static symptom reference list and its text filter.

use serde::Serialize;

/// One reference entry shown by the lookup view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SymptomInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
}

pub static SYMPTOM_REFERENCE: [SymptomInfo; 8] = [
    SymptomInfo {
        name: "Headache",
        description: "Pain or pressure in the head, temples or behind the eyes.",
        keywords: &["head", "migraine", "pain", "pressure"],
    },
    SymptomInfo {
        name: "Fever",
        description: "Body temperature above the normal range, often with chills.",
        keywords: &["temperature", "hot", "chills", "sweating"],
    },
    SymptomInfo {
        name: "Cough",
        description: "Sudden expulsion of air from the lungs, dry or productive.",
        keywords: &["throat", "chest", "phlegm", "breathing"],
    },
    SymptomInfo {
        name: "Rash",
        description: "Area of irritated or swollen skin that may be red or bumpy.",
        keywords: &["skin", "itchy", "red", "bumps"],
    },
    SymptomInfo {
        name: "Nausea",
        description: "Uneasy stomach with an urge to vomit.",
        keywords: &["stomach", "vomit", "queasy", "sick"],
    },
    SymptomInfo {
        name: "Fatigue",
        description: "Persistent tiredness or lack of energy not relieved by sleep.",
        keywords: &["tired", "exhausted", "energy", "weak"],
    },
    SymptomInfo {
        name: "Sore Throat",
        description: "Pain or scratchiness in the throat, worse when swallowing.",
        keywords: &["throat", "swallowing", "scratchy", "hoarse"],
    },
    SymptomInfo {
        name: "Dizziness",
        description: "Feeling lightheaded, unsteady or as if the room is spinning.",
        keywords: &["lightheaded", "vertigo", "balance", "spinning"],
    },
];

/// Entries whose name, description or any keyword contains `query`,
/// ignoring case. A blank query returns the whole list. Order is preserved.
pub fn filter_symptoms(query: &str) -> Vec<SymptomInfo> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return SYMPTOM_REFERENCE.to_vec();
    }
    SYMPTOM_REFERENCE
        .iter()
        .filter(|entry| {
            entry.name.to_lowercase().contains(&needle)
                || entry.description.to_lowercase().contains(&needle)
                || entry
                    .keywords
                    .iter()
                    .any(|k| k.to_lowercase().contains(&needle))
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[SymptomInfo]) -> Vec<&'static str> {
        entries.iter().map(|e| e.name).collect()
    }

    #[test]
    fn empty_query_returns_all_in_order() {
        let all = filter_symptoms("");
        assert_eq!(
            names(&all),
            vec![
                "Headache",
                "Fever",
                "Cough",
                "Rash",
                "Nausea",
                "Fatigue",
                "Sore Throat",
                "Dizziness"
            ]
        );
        assert_eq!(filter_symptoms("   "), all);
    }

    #[test]
    fn keyword_match() {
        assert_eq!(names(&filter_symptoms("itchy")), vec!["Rash"]);
    }

    #[test]
    fn case_insensitive() {
        assert_eq!(names(&filter_symptoms("RASH")), vec!["Rash"]);
        assert_eq!(names(&filter_symptoms("sore THROAT")), vec!["Sore Throat"]);
    }

    #[test]
    fn matches_description_and_keeps_order() {
        // "throat" is a keyword of Cough and the name of Sore Throat.
        assert_eq!(names(&filter_symptoms("throat")), vec!["Cough", "Sore Throat"]);
    }

    #[test]
    fn no_match_is_empty() {
        assert!(filter_symptoms("fracture").is_empty());
    }

    #[test]
    fn repeated_filtering_is_stable() {
        assert_eq!(filter_symptoms("pain"), filter_symptoms("pain"));
        assert_eq!(filter_symptoms(""), filter_symptoms(""));
    }
}
