use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::ai::CompletionApi;
use crate::models::{MediaType, Recommendation};

pub const DEFAULT_LIMIT: usize = 5;

struct TableEntry {
    title: &'static str,
    description: &'static str,
    category: &'static str,
    confidence: f32,
}

/// Curated fallback tables, one per content type. Categories are plain
/// lowercase words so the naive substring lookup below can hit them.
const MOVIE_TABLE: &[TableEntry] = &[
    TableEntry {
        title: "The Shawshank Redemption",
        description: "A banker maintains hope through decades in prison.",
        category: "drama crime",
        confidence: 0.97,
    },
    TableEntry {
        title: "Parasite",
        description: "A poor family schemes its way into a wealthy household.",
        category: "thriller drama korean",
        confidence: 0.95,
    },
    TableEntry {
        title: "The Dark Knight",
        description: "Batman faces an anarchist criminal mastermind.",
        category: "action crime",
        confidence: 0.94,
    },
    TableEntry {
        title: "Alien",
        description: "A deep-space crew is hunted by a lethal stowaway.",
        category: "horror sci-fi",
        confidence: 0.93,
    },
    TableEntry {
        title: "Spirited Away",
        description: "A girl must work in a bathhouse for spirits to free her parents.",
        category: "animation fantasy family",
        confidence: 0.93,
    },
    TableEntry {
        title: "The Grand Budapest Hotel",
        description: "A concierge and his lobby boy are framed for murder.",
        category: "comedy",
        confidence: 0.9,
    },
    TableEntry {
        title: "Get Out",
        description: "A visit to a girlfriend's family estate turns sinister.",
        category: "horror thriller",
        confidence: 0.9,
    },
    TableEntry {
        title: "Blade Runner 2049",
        description: "A replicant blade runner unearths a buried secret.",
        category: "sci-fi",
        confidence: 0.89,
    },
    TableEntry {
        title: "Before Sunrise",
        description: "Two strangers share one night walking through Vienna.",
        category: "romance drama",
        confidence: 0.87,
    },
    TableEntry {
        title: "Free Solo",
        description: "Alex Honnold climbs El Capitan without a rope.",
        category: "documentary",
        confidence: 0.86,
    },
];

const SHOW_TABLE: &[TableEntry] = &[
    TableEntry {
        title: "Breaking Bad",
        description: "A chemistry teacher builds a drug empire.",
        category: "drama crime",
        confidence: 0.97,
    },
    TableEntry {
        title: "The Wire",
        description: "Baltimore's institutions seen through police and streets.",
        category: "drama crime",
        confidence: 0.95,
    },
    TableEntry {
        title: "Severance",
        description: "Office workers have their memories surgically split.",
        category: "sci-fi thriller",
        confidence: 0.93,
    },
    TableEntry {
        title: "The Haunting of Hill House",
        description: "Siblings confront the house that broke their family.",
        category: "horror drama",
        confidence: 0.92,
    },
    TableEntry {
        title: "Squid Game",
        description: "Debtors compete in deadly children's games.",
        category: "thriller korean",
        confidence: 0.91,
    },
    TableEntry {
        title: "Fleabag",
        description: "A dry-witted Londoner narrates her unraveling life.",
        category: "comedy drama",
        confidence: 0.91,
    },
    TableEntry {
        title: "Planet Earth II",
        description: "Wildlife filmed at a scale never attempted before.",
        category: "documentary",
        confidence: 0.9,
    },
    TableEntry {
        title: "Arcane",
        description: "Two sisters end up on opposite sides of a city at war.",
        category: "animation action fantasy",
        confidence: 0.9,
    },
    TableEntry {
        title: "Dark",
        description: "A missing child exposes four families' tangled timelines.",
        category: "sci-fi mystery german",
        confidence: 0.89,
    },
    TableEntry {
        title: "Derry Girls",
        description: "Teenage life in 1990s Northern Ireland.",
        category: "comedy",
        confidence: 0.87,
    },
];

static TOP_N_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:top|best)\s*(\d{1,2})?\b").expect("top-n pattern is valid"));

/// Serve recommendations for a free-text query. When an AI client is
/// configured it gets the first shot; any failure falls back to the static
/// tables so the endpoint always answers.
pub async fn recommendations(
    ai: Option<&dyn CompletionApi>,
    query: &str,
    max_results: Option<usize>,
) -> Vec<Recommendation> {
    let limit = effective_limit(query, max_results);

    if let Some(client) = ai {
        match client.suggest(query, limit).await {
            Ok(recs) if !recs.is_empty() => return recs,
            Ok(_) => warn!("completion returned no candidates, using static tables"),
            Err(e) => warn!("completion failed, using static tables: {e:#}"),
        }
    }

    static_recommendations(query, limit)
}

/// "top/best N" phrasing wins over the request-body cap; both default to 5.
fn effective_limit(query: &str, max_results: Option<usize>) -> usize {
    let from_query = TOP_N_RE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok());
    from_query
        .or(max_results)
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MOVIE_TABLE.len() + SHOW_TABLE.len())
}

/// Table lookup: media words pick the table, remaining words match entry
/// categories by naive substring. No match degrades to the highest-confidence
/// entries of the selected table(s).
pub fn static_recommendations(query: &str, limit: usize) -> Vec<Recommendation> {
    let lowered = query.to_lowercase();
    let media = lowered
        .split_whitespace()
        .find_map(|token| MediaType::parse(token));

    let tables: Vec<&TableEntry> = match media {
        Some(MediaType::Movie) => MOVIE_TABLE.iter().collect(),
        Some(MediaType::Tv) => SHOW_TABLE.iter().collect(),
        None => MOVIE_TABLE.iter().chain(SHOW_TABLE.iter()).collect(),
    };

    let mut matched: Vec<&TableEntry> = tables
        .iter()
        .copied()
        .filter(|entry| {
            lowered
                .split_whitespace()
                .any(|token| token.len() > 2 && entry.category.contains(token))
        })
        .collect();
    if matched.is_empty() {
        matched = tables;
    }

    matched.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    matched
        .into_iter()
        .take(limit)
        .map(|entry| Recommendation {
            title: entry.title.to_string(),
            description: entry.description.to_string(),
            category: entry.category.to_string(),
            confidence: entry.confidence,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;

    #[test]
    fn horror_movies_query_hits_horror_entries() {
        let recs = static_recommendations("top 5 best horror movies", 5);
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.category.contains("horror")));
        // Movie table only; no show titles allowed.
        assert!(recs.iter().all(|r| r.title != "The Haunting of Hill House"));
    }

    #[test]
    fn show_wording_selects_the_show_table() {
        let recs = static_recommendations("best crime shows", 5);
        assert!(recs.iter().any(|r| r.title == "Breaking Bad"));
        assert!(recs.iter().all(|r| r.title != "The Dark Knight"));
    }

    #[test]
    fn unmatched_category_degrades_to_top_confidence() {
        let recs = static_recommendations("xyzzy movies", 3);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].title, "The Shawshank Redemption");
    }

    #[test]
    fn top_n_in_query_overrides_body_cap() {
        assert_eq!(effective_limit("top 2 thrillers", Some(8)), 2);
        assert_eq!(effective_limit("thrillers", Some(8)), 8);
        assert_eq!(effective_limit("thrillers", None), DEFAULT_LIMIT);
    }

    #[test]
    fn results_sorted_by_confidence() {
        let recs = static_recommendations("drama", 10);
        for pair in recs.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    struct FailingAi;

    #[async_trait]
    impl CompletionApi for FailingAi {
        async fn suggest(&self, _query: &str, _max: usize) -> anyhow::Result<Vec<Recommendation>> {
            Err(anyhow!("model unavailable"))
        }
    }

    #[tokio::test]
    async fn ai_failure_falls_back_to_tables() {
        let recs = recommendations(Some(&FailingAi), "best horror movies", None).await;
        assert!(!recs.is_empty());
        assert!(recs.iter().all(|r| r.category.contains("horror")));
    }
}
