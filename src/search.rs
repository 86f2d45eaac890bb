use anyhow::Result;
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::models::{ContentItem, MediaType, SearchFilters};
use crate::query::{self, SearchMode};
use crate::tmdb::{language_name, DiscoverFilters, TmdbApi, PAGE_SIZE};

/// Hard cap on pagination fan-out per content type.
const MAX_PAGES: u32 = 5;

/// How many merged results get real provider/trailer lookups.
const ENRICH_COUNT: usize = 3;

/// Pool for placeholder platform data on non-enriched results.
const PLACEHOLDER_POOL: &[&str] = &[
    "Netflix",
    "Amazon Prime Video",
    "Hulu",
    "Disney Plus",
    "Max",
    "Apple TV+",
];

/// Full search pipeline: interpret the query, fan out to the upstream API for
/// both content types, merge, enrich the top results, filter and sort.
pub async fn search_content(
    tmdb: &dyn TmdbApi,
    raw_query: &str,
    client_filters: &SearchFilters,
) -> Result<Vec<ContentItem>> {
    let intent = query::interpret(raw_query);
    debug!(?intent, query = raw_query, "interpreted search query");

    let mut effective = client_filters.clone();
    if effective.media_type.is_none() {
        if let Some(hint) = intent.media_hint {
            effective.media_type = Some(hint.as_path().to_string());
        }
    }

    let plan = match &intent.mode {
        SearchMode::TitleSearch { term } => FetchPlan::Search(term.clone()),
        SearchMode::Discover { filters } => FetchPlan::Discover(filters.clone()),
    };

    let (movies, shows) = tokio::join!(
        fetch_pages(tmdb, MediaType::Movie, &plan),
        fetch_pages(tmdb, MediaType::Tv, &plan),
    );

    // One failed content type degrades to a partial result; both failing is
    // an upstream error.
    let mut merged = match (movies, shows) {
        (Ok(m), Ok(t)) => {
            let mut all = m;
            all.extend(t);
            all
        }
        (Ok(m), Err(e)) => {
            warn!("TV fetch failed, returning movies only: {e:#}");
            m
        }
        (Err(e), Ok(t)) => {
            warn!("Movie fetch failed, returning TV only: {e:#}");
            t
        }
        (Err(e), Err(_)) => return Err(e),
    };
    debug!(count = merged.len(), "merged upstream results");

    enrich_top(tmdb, &mut merged).await;

    let mut results = apply_filters(merged, &effective);
    debug!(count = results.len(), "after filter stage");
    sort_by_rating(&mut results);

    if let Some(limit) = intent.limit {
        results.truncate(limit);
    }
    Ok(results)
}

#[derive(Debug, Clone)]
enum FetchPlan {
    Search(String),
    Discover(DiscoverFilters),
}

/// Fetch page 1, 2, ... for one content type until a short page signals
/// end-of-results or the page cap is hit. A failure on the first page
/// propagates; a failure mid-loop keeps what was already fetched.
async fn fetch_pages(
    tmdb: &dyn TmdbApi,
    media: MediaType,
    plan: &FetchPlan,
) -> Result<Vec<ContentItem>> {
    let mut all = Vec::new();
    for page in 1..=MAX_PAGES {
        let fetched = match plan {
            FetchPlan::Search(term) => tmdb.search_page(media, term, page).await,
            FetchPlan::Discover(filters) => tmdb.discover_page(media, filters, page).await,
        };
        match fetched {
            Ok(items) => {
                let len = items.len();
                all.extend(items);
                if len < PAGE_SIZE {
                    break;
                }
            }
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!("{media} page {page} failed, keeping {} items: {e:#}", all.len());
                break;
            }
        }
    }
    Ok(all)
}

/// Top results get real watch-provider and trailer lookups (two concurrent
/// calls per item); the rest get placeholder platform data. A failed lookup
/// degrades the item, never the request.
async fn enrich_top(tmdb: &dyn TmdbApi, items: &mut [ContentItem]) {
    for item in items.iter_mut().take(ENRICH_COUNT) {
        let (providers, trailer) = tokio::join!(
            tmdb.watch_providers(item.media_type, item.id),
            tmdb.trailer(item.media_type, item.id),
        );
        match providers {
            Ok(p) if !p.is_empty() => item.platforms = p,
            Ok(_) => item.platforms = placeholder_platforms(),
            Err(e) => {
                warn!("provider lookup failed for {} {}: {e:#}", item.media_type, item.id);
                item.platforms = placeholder_platforms();
            }
        }
        match trailer {
            Ok(url) => item.trailer_url = url,
            Err(e) => {
                warn!("trailer lookup failed for {} {}: {e:#}", item.media_type, item.id);
            }
        }
    }
    for item in items.iter_mut().skip(ENRICH_COUNT) {
        if item.platforms.is_empty() {
            item.platforms = placeholder_platforms();
        }
    }
}

fn placeholder_platforms() -> Vec<String> {
    let mut rng = rand::rng();
    let count = rng.random_range(1..=2);
    PLACEHOLDER_POOL
        .choose_multiple(&mut rng, count)
        .map(|s| (*s).to_string())
        .collect()
}

/// Conjunction of independent per-field predicates; absent fields filter
/// nothing, so field order never matters.
pub fn apply_filters(items: Vec<ContentItem>, filters: &SearchFilters) -> Vec<ContentItem> {
    items
        .into_iter()
        .filter(|item| matches_filters(item, filters))
        .collect()
}

fn matches_filters(item: &ContentItem, filters: &SearchFilters) -> bool {
    if let Some(requested) = filters.media_type.as_deref().and_then(MediaType::parse) {
        if requested != item.media_type {
            return false;
        }
    }
    if let Some(genre) = &filters.genre {
        if !item.genres.iter().any(|g| g.eq_ignore_ascii_case(genre)) {
            return false;
        }
    }
    if let Some(lang) = &filters.language {
        let matched = item.language.as_deref().is_some_and(|l| {
            l.eq_ignore_ascii_case(lang) || l.eq_ignore_ascii_case(&language_name(lang))
        });
        if !matched {
            return false;
        }
    }
    if let Some(country) = &filters.country {
        if !item.countries.iter().any(|c| c.eq_ignore_ascii_case(country)) {
            return false;
        }
    }
    if let Some(platform) = &filters.platform {
        let needle = platform.to_lowercase();
        if !item
            .platforms
            .iter()
            .any(|p| p.to_lowercase().contains(&needle))
        {
            return false;
        }
    }
    if let Some(floor) = filters.min_rating {
        if item.rating < floor {
            return false;
        }
    }
    if let Some(year) = filters.year {
        let item_year = item.year.as_deref().and_then(|y| y.parse::<i32>().ok());
        match item_year {
            Some(y) if (y - year).abs() <= 1 => {}
            _ => return false,
        }
    }
    true
}

/// Primary rating descending, popularity descending as tie-break.
pub fn sort_by_rating(items: &mut [ContentItem]) {
    items.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then(b.popularity.total_cmp(&a.popularity))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, media: MediaType, rating: f32, popularity: f32) -> ContentItem {
        ContentItem {
            id: 1,
            title: title.to_string(),
            media_type: media,
            description: String::new(),
            year: Some("2020".to_string()),
            poster_url: None,
            backdrop_url: None,
            rating,
            popularity,
            genres: vec!["Drama".to_string()],
            platforms: vec!["Netflix".to_string()],
            cast: Vec::new(),
            runtime_minutes: None,
            countries: vec!["US".to_string()],
            language: Some("English".to_string()),
            trailer_url: None,
            status: None,
        }
    }

    #[test]
    fn filters_are_a_conjunction() {
        let items = vec![
            item("keep", MediaType::Movie, 8.0, 1.0),
            item("wrong type", MediaType::Tv, 8.0, 1.0),
            item("low rating", MediaType::Movie, 5.0, 1.0),
        ];
        let filters = SearchFilters {
            media_type: Some("movie".to_string()),
            min_rating: Some(7.0),
            ..Default::default()
        };
        let out = apply_filters(items, &filters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "keep");
    }

    #[test]
    fn language_filter_accepts_code_or_name() {
        let items = vec![item("en", MediaType::Movie, 7.0, 1.0)];
        for lang in ["en", "English", "english"] {
            let filters = SearchFilters {
                language: Some(lang.to_string()),
                ..Default::default()
            };
            assert_eq!(apply_filters(items.clone(), &filters).len(), 1, "{lang}");
        }
    }

    #[test]
    fn year_filter_tolerates_one_year() {
        let items = vec![item("t", MediaType::Movie, 7.0, 1.0)]; // year 2020
        for (year, expect) in [(2019, 1), (2020, 1), (2021, 1), (2022, 0)] {
            let filters = SearchFilters {
                year: Some(year),
                ..Default::default()
            };
            assert_eq!(apply_filters(items.clone(), &filters).len(), expect, "{year}");
        }
    }

    #[test]
    fn missing_year_fails_year_filter() {
        let mut no_year = item("t", MediaType::Movie, 7.0, 1.0);
        no_year.year = None;
        let filters = SearchFilters {
            year: Some(2020),
            ..Default::default()
        };
        assert!(apply_filters(vec![no_year], &filters).is_empty());
    }

    #[test]
    fn platform_filter_is_substring_match() {
        let items = vec![item("t", MediaType::Movie, 7.0, 1.0)];
        let filters = SearchFilters {
            platform: Some("netf".to_string()),
            ..Default::default()
        };
        assert_eq!(apply_filters(items, &filters).len(), 1);
    }

    #[test]
    fn sort_is_rating_then_popularity() {
        let mut items = vec![
            item("b", MediaType::Movie, 7.0, 5.0),
            item("c", MediaType::Movie, 7.0, 2.0),
            item("a", MediaType::Movie, 9.0, 0.0),
        ];
        sort_by_rating(&mut items);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_filters_keep_everything() {
        let items = vec![
            item("x", MediaType::Movie, 1.0, 1.0),
            item("y", MediaType::Tv, 2.0, 2.0),
        ];
        assert_eq!(apply_filters(items, &SearchFilters::default()).len(), 2);
    }
}
