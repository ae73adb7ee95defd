//! Content negotiation against the `Accept` header.
//!
//! [`negotiate`] is pure: it only looks at the header value and the offered media types, which
//! keeps it usable outside of a dispatch.
//!
//! For every offered type the most specific matching preference decides its quality, so
//! `text/*, text/plain;q=0` rejects `text/plain` while still accepting `text/html`. The offered
//! type with the highest quality wins; ties go to the more specific preference, then to the
//! earlier offered type.

use mime::Mime;
use std::cmp::Ordering;
use thiserror::Error;

/// How precisely a preference names a media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    /// `*/*`
    Any,
    /// `type/*`
    Subtype,
    /// `type/subtype`
    Exact,
}

/// One parsed entry of an `Accept` header.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaPreference {
    range: Mime,
    quality: f32,
    specificity: Specificity,
}

impl MediaPreference {
    /// Parses one comma separated entry, `None` if the range or its quality is malformed.
    pub fn parse(entry: &str) -> Option<Self> {
        let range = entry.trim().parse::<Mime>().ok()?;

        let specificity = match (range.type_() == mime::STAR, range.subtype() == mime::STAR) {
            (true, true) => Specificity::Any,
            (false, true) => Specificity::Subtype,
            (false, false) => Specificity::Exact,
            // `*/json` is not a valid media range
            (true, false) => return None,
        };

        let quality = match range.get_param("q") {
            Some(q) => parse_quality(q.as_str())?,
            None => 1.0,
        };

        Some(Self { range, quality, specificity })
    }

    pub fn range(&self) -> &Mime {
        &self.range
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// Whether this preference covers `offered`; parameters of `offered` are ignored.
    pub fn matches(&self, offered: &Mime) -> bool {
        match self.specificity {
            Specificity::Any => true,
            Specificity::Subtype => self.range.type_() == offered.type_(),
            Specificity::Exact => self.range.type_() == offered.type_() && self.range.subtype() == offered.subtype(),
        }
    }
}

fn parse_quality(value: &str) -> Option<f32> {
    let q = value.trim().parse::<f32>().ok()?;
    (0.0..=1.0).contains(&q).then_some(q)
}

/// Parses an `Accept` header value, skipping malformed entries.
pub fn parse_accept(header: &str) -> Vec<MediaPreference> {
    header.split(',').filter(|entry| !entry.trim().is_empty()).filter_map(MediaPreference::parse).collect()
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("none of the available representations is acceptable: {}", .offered.join(", "))]
pub struct NotAcceptable {
    offered: Vec<String>,
}

impl NotAcceptable {
    fn new(offered: &[Mime]) -> Self {
        Self { offered: offered.iter().map(ToString::to_string).collect() }
    }

    pub fn offered(&self) -> &[String] {
        &self.offered
    }
}

/// Chooses one of `offered` for a request whose `Accept` header is `accept`.
///
/// A missing or blank header, or one where no entry parses, selects the first offered type.
pub fn negotiate<'a>(accept: Option<&str>, offered: &'a [Mime]) -> Result<&'a Mime, NotAcceptable> {
    let preferences = accept.map(parse_accept).unwrap_or_default();
    if preferences.is_empty() {
        return offered.first().ok_or_else(|| NotAcceptable::new(offered));
    }

    let mut best: Option<(&Mime, f32, Specificity)> = None;
    for candidate in offered {
        let Some(preference) = preference_for(&preferences, candidate) else {
            continue;
        };
        if preference.quality <= 0.0 {
            continue;
        }

        let better = match best {
            None => true,
            Some((_, quality, specificity)) => match preference.quality.partial_cmp(&quality) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => preference.specificity > specificity,
                _ => false,
            },
        };
        if better {
            best = Some((candidate, preference.quality, preference.specificity));
        }
    }

    best.map(|(mime, _, _)| mime).ok_or_else(|| NotAcceptable::new(offered))
}

/// The most specific preference covering `offered`; among equally specific ones the highest quality.
fn preference_for<'p>(preferences: &'p [MediaPreference], offered: &Mime) -> Option<&'p MediaPreference> {
    preferences.iter().filter(|preference| preference.matches(offered)).max_by(|a, b| {
        a.specificity.cmp(&b.specificity).then(a.quality.partial_cmp(&b.quality).unwrap_or(Ordering::Equal))
    })
}

#[cfg(test)]
mod tests {
    use super::{negotiate, parse_accept, MediaPreference, Specificity};
    use mime::Mime;

    fn offered() -> Vec<Mime> {
        vec![mime::APPLICATION_JSON, "application/xml".parse().unwrap()]
    }

    #[test]
    fn quality_decides() {
        let offered = offered();
        let chosen = negotiate(Some("application/xml;q=1.0, application/json;q=0.9"), &offered).unwrap();
        assert_eq!(chosen.essence_str(), "application/xml");
    }

    #[test]
    fn missing_header_selects_first() {
        let offered = offered();
        assert_eq!(negotiate(None, &offered).unwrap(), &mime::APPLICATION_JSON);
        assert_eq!(negotiate(Some("   "), &offered).unwrap(), &mime::APPLICATION_JSON);
    }

    #[test]
    fn nothing_acceptable() {
        let offered = offered();
        let error = negotiate(Some("video/mp4"), &offered).unwrap_err();
        assert_eq!(error.offered(), ["application/json", "application/xml"]);
    }

    #[test]
    fn full_wildcard_keeps_offered_order() {
        let offered = offered();
        assert_eq!(negotiate(Some("*/*"), &offered).unwrap(), &mime::APPLICATION_JSON);
    }

    #[test]
    fn specificity_breaks_quality_ties() {
        let offered = vec![mime::TEXT_HTML, mime::APPLICATION_JSON];
        let chosen = negotiate(Some("text/*, application/json"), &offered).unwrap();
        assert_eq!(chosen, &mime::APPLICATION_JSON);
    }

    #[test]
    fn most_specific_preference_overrides_range() {
        let offered = vec![mime::TEXT_PLAIN, mime::TEXT_HTML];
        let chosen = negotiate(Some("text/*, text/plain;q=0"), &offered).unwrap();
        assert_eq!(chosen, &mime::TEXT_HTML);

        let error = negotiate(Some("text/*;q=0.5, text/plain;q=0, text/html;q=0"), &offered);
        assert!(error.is_err());
    }

    #[test]
    fn zero_quality_is_not_acceptable() {
        let offered = offered();
        assert!(negotiate(Some("application/json;q=0, application/xml;q=0"), &offered).is_err());
    }

    #[test]
    fn offered_parameters_are_ignored() {
        let offered = vec![mime::TEXT_PLAIN_UTF_8];
        assert_eq!(negotiate(Some("text/plain"), &offered).unwrap(), &mime::TEXT_PLAIN_UTF_8);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let preferences = parse_accept("application/json;q=abc, nonsense, */json, text/*;q=0.4, */*;q=2");
        assert_eq!(preferences.len(), 1);
        assert_eq!(preferences[0].specificity(), Specificity::Subtype);
        assert!((preferences[0].quality() - 0.4).abs() < f32::EPSILON);
    }

    #[test]
    fn unparsable_header_behaves_as_missing() {
        let offered = offered();
        assert_eq!(negotiate(Some("garbage"), &offered).unwrap(), &mime::APPLICATION_JSON);
    }

    #[test]
    fn preference_specificity() {
        assert_eq!(MediaPreference::parse("*/*").unwrap().specificity(), Specificity::Any);
        assert_eq!(MediaPreference::parse("image/*").unwrap().specificity(), Specificity::Subtype);
        assert_eq!(MediaPreference::parse("image/png").unwrap().specificity(), Specificity::Exact);
    }
}
