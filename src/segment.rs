//! Rule-based segment classification from RFM codes

use crate::scoring::Scores;

/// Customer-value segment derived from the RFM code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Champions,
    Leales,
    Potenciales,
    EnRiesgo,
}

const CHAMPIONS: [&str; 4] = ["555", "554", "545", "544"];
const LEALES: [&str; 3] = ["543", "444", "433"];
const EN_RIESGO: [&str; 3] = ["111", "112", "121"];

impl Segment {
    /// All segments in report order
    pub const ALL: [Segment; 4] = [
        Segment::Champions,
        Segment::Leales,
        Segment::Potenciales,
        Segment::EnRiesgo,
    ];

    /// Label used in exported tables
    pub fn label(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::Leales => "Leales",
            Segment::Potenciales => "Potenciales",
            Segment::EnRiesgo => "En riesgo",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a three-digit RFM code to its segment.
///
/// Total: any code outside the fixed tables falls back to `Potenciales`.
pub fn classify(rfm_code: &str) -> Segment {
    if CHAMPIONS.contains(&rfm_code) {
        Segment::Champions
    } else if LEALES.contains(&rfm_code) {
        Segment::Leales
    } else if EN_RIESGO.contains(&rfm_code) {
        Segment::EnRiesgo
    } else {
        Segment::Potenciales
    }
}

pub fn classify_scores(scores: &Scores) -> Segment {
    classify(&scores.rfm_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_fixed_table() {
        assert_eq!(classify("555"), Segment::Champions);
        assert_eq!(classify("544"), Segment::Champions);
        assert_eq!(classify("543"), Segment::Leales);
        assert_eq!(classify("433"), Segment::Leales);
        assert_eq!(classify("121"), Segment::EnRiesgo);
        assert_eq!(classify("211"), Segment::Potenciales);
        assert_eq!(classify("not a code"), Segment::Potenciales);
    }

    #[test]
    fn test_classification_is_total_over_all_codes() {
        let mut counts: HashMap<Segment, usize> = HashMap::new();
        for r in 1..=5u8 {
            for f in 1..=5u8 {
                for m in 1..=5u8 {
                    let segment = classify_scores(&Scores { r, f, m });
                    *counts.entry(segment).or_insert(0) += 1;
                }
            }
        }

        assert_eq!(counts.values().sum::<usize>(), 125);
        assert_eq!(counts[&Segment::Champions], 4);
        assert_eq!(counts[&Segment::Leales], 3);
        assert_eq!(counts[&Segment::EnRiesgo], 3);
        assert_eq!(counts[&Segment::Potenciales], 115);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Segment::EnRiesgo.to_string(), "En riesgo");
        assert_eq!(Segment::ALL.len(), 4);
    }
}
