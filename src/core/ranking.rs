//! Query normalization, candidate merging and ranking.

use crate::core::parser;
use crate::models::media::{Candidate, MediaType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::LazyLock;

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\{[^}]*\}").unwrap());

/// Normalize free text for comparison and cache keys.
///
/// Lowercases, drops bracketed groups, quality tokens and punctuation, and
/// collapses whitespace. When only quality tokens remain they are kept.
pub fn normalize(text: &str, media_type: MediaType) -> String {
    let without_groups = BRACKETED.replace_all(text, " ");
    let tokens: Vec<&str> = without_groups
        .split(|c: char| c.is_whitespace() || c == '.' || c == '_')
        .filter(|t| !t.is_empty())
        .collect();

    let kept: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !parser::is_quality_tag(t, media_type))
        .collect();
    let kept = if kept.is_empty() { tokens } else { kept };

    let joined = kept.join(" ").to_lowercase();
    let cleaned: String = joined
        .chars()
        .filter(|c| !matches!(c, '\'' | '\u{2019}'))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether two years may describe the same work.
///
/// Release dates differ by a year between regions often enough that ±1 is
/// treated as the same; an unknown year is compatible with anything.
pub fn years_compatible(a: Option<u16>, b: Option<u16>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.abs_diff(b) <= 1,
        _ => true,
    }
}

/// A merged group: one representative candidate standing for every
/// provider result that agreed on the same work.
#[derive(Debug, Clone)]
pub struct MergedCandidate {
    pub candidate: Candidate,
    /// Index of the representative's provider in the priority list.
    pub priority: usize,
    /// Normalized title used for grouping.
    pub key: String,
}

impl MergedCandidate {
    fn has_provider_of(&self, other: &Candidate) -> bool {
        other
            .provider_ids
            .keys()
            .any(|provider| self.candidate.provider_ids.contains_key(provider))
    }

    fn absorb(&mut self, other: &Candidate) {
        let rep = &mut self.candidate;
        for (provider, id) in &other.provider_ids {
            rep.provider_ids
                .entry(provider.clone())
                .or_insert_with(|| id.clone());
        }
        if rep.year.is_none() {
            rep.year = other.year;
        }
        if rep.score.is_none() {
            rep.score = other.score;
        }
        if rep.creator.is_none() {
            rep.creator = other.creator.clone();
        }
    }
}

/// Group candidates by normalized title and compatible year.
///
/// `found` must be in provider priority order (with the provider's index);
/// the first member of each group becomes its representative. A group holds
/// at most one result per provider: two results from the same provider are
/// two works, however alike they look.
pub fn merge(found: Vec<(usize, Candidate)>) -> Vec<MergedCandidate> {
    let mut groups: Vec<MergedCandidate> = Vec::new();

    for (priority, candidate) in found {
        let key = normalize(&candidate.title, candidate.media_type);
        let existing = groups.iter_mut().find(|g| {
            g.key == key
                && g.candidate.content_type() == candidate.content_type()
                && years_compatible(g.candidate.year, candidate.year)
                && !g.has_provider_of(&candidate)
        });

        match existing {
            Some(group) => group.absorb(&candidate),
            None => groups.push(MergedCandidate {
                candidate,
                priority,
                key,
            }),
        }
    }

    groups
}

/// One ranking criterion; earlier criteria dominate later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingCriterion {
    /// Normalized title equal to the normalized query first.
    ExactTitle,
    /// Closest to the query year first (skipped when the query has no year).
    YearProximity,
    /// Higher-priority provider first.
    ProviderPriority,
    /// Most recent release first.
    YearRecency,
    /// Alphabetical by title.
    Title,
}

/// What ranking compares against.
#[derive(Debug, Clone, Copy)]
pub struct RankingContext<'a> {
    pub normalized_query: &'a str,
    pub year: Option<u16>,
}

/// Ordered list of ranking criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingPolicy {
    criteria: Vec<RankingCriterion>,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            criteria: vec![
                RankingCriterion::ExactTitle,
                RankingCriterion::YearProximity,
                RankingCriterion::ProviderPriority,
                RankingCriterion::YearRecency,
                RankingCriterion::Title,
            ],
        }
    }
}

impl RankingPolicy {
    pub fn new(criteria: Vec<RankingCriterion>) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &[RankingCriterion] {
        &self.criteria
    }

    fn compare_by(
        criterion: RankingCriterion,
        a: &MergedCandidate,
        b: &MergedCandidate,
        ctx: &RankingContext<'_>,
    ) -> Ordering {
        match criterion {
            RankingCriterion::ExactTitle => {
                let a_exact = a.key == ctx.normalized_query;
                let b_exact = b.key == ctx.normalized_query;
                b_exact.cmp(&a_exact)
            }
            RankingCriterion::YearProximity => match ctx.year {
                Some(year) => {
                    let distance = |c: &MergedCandidate| c.candidate.year.map(|y| y.abs_diff(year));
                    option_first(distance(a), distance(b))
                }
                None => Ordering::Equal,
            },
            RankingCriterion::ProviderPriority => a.priority.cmp(&b.priority),
            RankingCriterion::YearRecency => option_first(
                a.candidate.year.map(std::cmp::Reverse),
                b.candidate.year.map(std::cmp::Reverse),
            ),
            RankingCriterion::Title => a.key.cmp(&b.key),
        }
    }

    /// Compare two groups; ties after every criterion fall back to the
    /// candidate id so the order is total.
    pub fn compare(&self, a: &MergedCandidate, b: &MergedCandidate, ctx: &RankingContext<'_>) -> Ordering {
        self.criteria
            .iter()
            .map(|c| Self::compare_by(*c, a, b, ctx))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| a.candidate.id.to_string().cmp(&b.candidate.id.to_string()))
    }

    /// Sort groups and return their representatives, best first.
    pub fn rank(&self, mut groups: Vec<MergedCandidate>, ctx: &RankingContext<'_>) -> Vec<Candidate> {
        groups.sort_by(|a, b| self.compare(a, b, ctx));
        groups.into_iter().map(|g| g.candidate).collect()
    }
}

/// Ascending order with `None` last.
fn option_first<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::ContentType;

    fn movie(provider: &str, id: &str, title: &str, year: Option<u16>) -> Candidate {
        Candidate::new(provider, id, ContentType::Movie, title).with_year(year)
    }

    #[test]
    fn test_normalize_strips_noise() {
        assert_eq!(normalize("  The.Matrix [1080p] ", MediaType::Video), "the matrix");
        assert_eq!(normalize("The Matrix 1080p BluRay x264", MediaType::Video), "the matrix");
        assert_eq!(normalize("Schindler's List", MediaType::Video), "schindlers list");
        assert_eq!(normalize("Harder, Better,  Faster", MediaType::Music), "harder better faster");
    }

    #[test]
    fn test_normalize_keeps_all_quality_input() {
        assert_eq!(normalize("1080p", MediaType::Video), "1080p");
    }

    #[test]
    fn test_years_compatible() {
        assert!(years_compatible(Some(1999), Some(2000)));
        assert!(!years_compatible(Some(1999), Some(2001)));
        assert!(years_compatible(None, Some(2001)));
    }

    #[test]
    fn test_merge_groups_agreeing_providers() {
        let found = vec![
            (0, movie("tmdb", "603", "The Matrix", Some(1999))),
            (0, movie("tmdb", "624860", "The Matrix Resurrections", Some(2021))),
            (1, movie("omdb", "tt0133093", "The Matrix", Some(2000)).with_score(Some(8.7))),
        ];
        let groups = merge(found);
        assert_eq!(groups.len(), 2);

        let matrix = &groups[0].candidate;
        assert_eq!(matrix.provider(), "tmdb");
        assert_eq!(matrix.year, Some(1999));
        assert_eq!(matrix.score, Some(8.7));
        assert_eq!(matrix.provider_ids.get("omdb").map(String::as_str), Some("tt0133093"));
    }

    #[test]
    fn test_merge_keeps_distant_years_apart() {
        let found = vec![
            (0, movie("tmdb", "1", "Dune", Some(1984))),
            (0, movie("tmdb", "2", "Dune", Some(2021))),
            (1, movie("omdb", "3", "Dune", None)),
        ];
        let groups = merge(found);
        assert_eq!(groups.len(), 2);
        assert!(groups[0].candidate.provider_ids.contains_key("omdb"));
    }

    #[test]
    fn test_merge_never_folds_one_providers_results() {
        let found = vec![
            (0, movie("tmdb", "1", "Dune", Some(2020))),
            (0, movie("tmdb", "2", "Dune", Some(2021))),
            (1, movie("omdb", "3", "Dune", Some(2021))),
        ];
        let groups = merge(found);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].candidate.provider_ids.len(), 2);
        assert_eq!(groups[0].candidate.provider_ids["omdb"], "3");
        assert_eq!(groups[1].candidate.provider_ids.len(), 1);
        assert_eq!(groups[1].candidate.provider_ids["tmdb"], "2");
    }

    #[test]
    fn test_default_policy_order() {
        let groups = merge(vec![
            (0, movie("tmdb", "1", "The Matrix Reloaded", Some(2003))),
            (0, movie("tmdb", "2", "The Matrix", Some(1999))),
            (1, movie("omdb", "3", "Matrix", Some(1993))),
            (1, movie("omdb", "4", "Matrix", Some(2010))),
        ]);
        let ctx = RankingContext {
            normalized_query: "the matrix",
            year: None,
        };
        let ranked = RankingPolicy::default().rank(groups, &ctx);
        let ids: Vec<&str> = ranked.iter().map(|c| c.id.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "4", "3"]);
    }

    #[test]
    fn test_year_proximity_before_priority() {
        let groups = merge(vec![
            (0, movie("tmdb", "1", "Dune", Some(1984))),
            (1, movie("omdb", "2", "Dune", Some(2021))),
        ]);
        let ctx = RankingContext {
            normalized_query: "dune",
            year: Some(2021),
        };
        let ranked = RankingPolicy::default().rank(groups, &ctx);
        assert_eq!(ranked[0].id.id, "2");
    }

    #[test]
    fn test_custom_policy() {
        let groups = merge(vec![
            (0, movie("tmdb", "1", "B Movie", Some(1990))),
            (1, movie("omdb", "2", "A Movie", Some(2020))),
        ]);
        let ctx = RankingContext {
            normalized_query: "movie",
            year: None,
        };
        let policy = RankingPolicy::new(vec![RankingCriterion::Title]);
        let ranked = policy.rank(groups, &ctx);
        assert_eq!(ranked[0].title, "A Movie");
    }
}
