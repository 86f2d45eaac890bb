use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::models::{ContentItem, MediaType, TrendingWindow};

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w500";
const BACKDROP_BASE: &str = "https://image.tmdb.org/t/p/original";

/// Upstream page size; a shorter page signals end-of-results.
pub const PAGE_SIZE: usize = 20;

/// Region used for watch-provider lookups.
const WATCH_REGION: &str = "US";

/// Structured filter set for the upstream category-browse (discover) endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoverFilters {
    pub genre_id: Option<i32>,
    pub language: Option<String>,
    pub provider_id: Option<i32>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
}

#[async_trait]
pub trait TmdbApi: Send + Sync {
    /// One page of direct title-search results for a single content type.
    async fn search_page(&self, media: MediaType, term: &str, page: u32)
        -> Result<Vec<ContentItem>>;
    /// One page of category-browse (discover) results.
    async fn discover_page(
        &self,
        media: MediaType,
        filters: &DiscoverFilters,
        page: u32,
    ) -> Result<Vec<ContentItem>>;
    /// Trending movies and TV for a time window, merged by the upstream API.
    async fn trending(&self, window: TrendingWindow, page: u32) -> Result<Vec<ContentItem>>;
    /// Full record for one title, including credits, trailer and providers.
    async fn detail(&self, media: MediaType, id: i64) -> Result<ContentItem>;
    /// Flatrate streaming platforms for one title, region-scoped.
    async fn watch_providers(&self, media: MediaType, id: i64) -> Result<Vec<String>>;
    /// Best trailer URL for one title, if the upstream has one.
    async fn trailer(&self, media: MediaType, id: i64) -> Result<Option<String>>;
}

impl TmdbClient {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY not set")?;
        let user_agent = format!("cinescout/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self { client, api_key })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{TMDB_BASE}{path}");
        let res = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            // Key is passed as a query param, so the path is safe to log.
            let snippet: String = text.chars().take(200).collect();
            return Err(anyhow!("{path} -> {status}: {snippet}"));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn search_page(
        &self,
        media: MediaType,
        term: &str,
        page: u32,
    ) -> Result<Vec<ContentItem>> {
        let path = format!("/search/{}", media.as_path());
        let data: ListResponse = self
            .get_json(
                &path,
                &[
                    ("query", term.to_string()),
                    ("page", page.to_string()),
                    ("language", "en-US".to_string()),
                    ("include_adult", "false".to_string()),
                ],
            )
            .await?;
        Ok(map_list(data.results, Some(media)))
    }

    async fn discover_page(
        &self,
        media: MediaType,
        filters: &DiscoverFilters,
        page: u32,
    ) -> Result<Vec<ContentItem>> {
        let path = format!("/discover/{}", media.as_path());
        let mut params = vec![
            ("page", page.to_string()),
            ("language", "en-US".to_string()),
            ("include_adult", "false".to_string()),
            ("sort_by", "popularity.desc".to_string()),
        ];
        if let Some(genre) = filters.genre_id {
            params.push(("with_genres", genre.to_string()));
        }
        if let Some(lang) = &filters.language {
            params.push(("with_original_language", lang.clone()));
        }
        if let Some(provider) = filters.provider_id {
            params.push(("with_watch_providers", provider.to_string()));
            params.push(("watch_region", WATCH_REGION.to_string()));
        }
        if let Some(year) = filters.year {
            let key = match media {
                MediaType::Movie => "primary_release_year",
                MediaType::Tv => "first_air_date_year",
            };
            params.push((key, year.to_string()));
        }
        let data: ListResponse = self.get_json(&path, &params).await?;
        Ok(map_list(data.results, Some(media)))
    }

    async fn trending(&self, window: TrendingWindow, page: u32) -> Result<Vec<ContentItem>> {
        let path = format!("/trending/all/{}", window.as_path());
        let data: ListResponse = self
            .get_json(
                &path,
                &[("page", page.to_string()), ("language", "en-US".to_string())],
            )
            .await?;
        // The merged trending feed includes people; map_list drops them.
        Ok(map_list(data.results, None))
    }

    async fn detail(&self, media: MediaType, id: i64) -> Result<ContentItem> {
        let path = format!("/{}/{}", media.as_path(), id);
        let data: DetailAppended = self
            .get_json(
                &path,
                &[
                    ("language", "en-US".to_string()),
                    (
                        "append_to_response",
                        "credits,videos,watch/providers".to_string(),
                    ),
                ],
            )
            .await?;
        Ok(map_detail(data, media))
    }

    async fn watch_providers(&self, media: MediaType, id: i64) -> Result<Vec<String>> {
        let path = format!("/{}/{}/watch/providers", media.as_path(), id);
        let data: ProvidersResponse = self.get_json(&path, &[]).await?;
        Ok(flatrate_names(&data))
    }

    async fn trailer(&self, media: MediaType, id: i64) -> Result<Option<String>> {
        let path = format!("/{}/{}/videos", media.as_path(), id);
        let data: Videos = self
            .get_json(&path, &[("language", "en-US".to_string())])
            .await?;
        Ok(select_trailer(&data))
    }
}

// Raw upstream shapes.

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    results: Vec<ListItem>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    id: i64,
    title: Option<String>,
    name: Option<String>,
    #[serde(default)]
    overview: String,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    vote_average: f32,
    #[serde(default)]
    popularity: f32,
    #[serde(default)]
    genre_ids: Vec<i32>,
    original_language: Option<String>,
    media_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ProductionCountry {
    iso_3166_1: String,
}

#[derive(Debug, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Videos {
    #[serde(default)]
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    site: String,
    #[serde(rename = "type")]
    video_type: String,
    key: String,
}

#[derive(Debug, Deserialize)]
struct ProvidersResponse {
    #[serde(default)]
    results: std::collections::HashMap<String, RegionProviders>,
}

#[derive(Debug, Deserialize, Default)]
struct RegionProviders {
    #[serde(default)]
    flatrate: Vec<ProviderEntry>,
}

#[derive(Debug, Deserialize)]
struct ProviderEntry {
    provider_name: String,
}

#[derive(Debug, Deserialize)]
struct DetailAppended {
    id: i64,
    title: Option<String>,
    name: Option<String>,
    #[serde(default)]
    overview: String,
    release_date: Option<String>,
    first_air_date: Option<String>,
    poster_path: Option<String>,
    backdrop_path: Option<String>,
    #[serde(default)]
    vote_average: f32,
    #[serde(default)]
    popularity: f32,
    #[serde(default)]
    genres: Vec<Genre>,
    runtime: Option<f32>,
    #[serde(default)]
    episode_run_time: Vec<f32>,
    origin_country: Option<Vec<String>>,
    production_countries: Option<Vec<ProductionCountry>>,
    original_language: Option<String>,
    status: Option<String>,
    credits: Option<Credits>,
    videos: Option<Videos>,
    #[serde(rename = "watch/providers")]
    watch_providers: Option<ProvidersResponse>,
}

// Mapping helpers.

fn map_list(raw: Vec<ListItem>, forced: Option<MediaType>) -> Vec<ContentItem> {
    raw.into_iter()
        .filter_map(|item| map_list_item(item, forced))
        .collect()
}

fn map_list_item(raw: ListItem, forced: Option<MediaType>) -> Option<ContentItem> {
    let media = match forced {
        Some(m) => m,
        None => match raw.media_type.as_deref() {
            Some("movie") => MediaType::Movie,
            Some("tv") => MediaType::Tv,
            _ => return None,
        },
    };
    let title = raw.title.or(raw.name)?;
    let date = raw.release_date.or(raw.first_air_date);
    Some(ContentItem {
        id: raw.id,
        title,
        media_type: media,
        description: raw.overview,
        year: date.as_deref().and_then(extract_year),
        poster_url: raw.poster_path.as_deref().map(poster_url),
        backdrop_url: raw.backdrop_path.as_deref().map(backdrop_url),
        rating: raw.vote_average,
        popularity: raw.popularity,
        genres: raw.genre_ids.iter().filter_map(|id| genre_name(*id)).map(str::to_string).collect(),
        platforms: Vec::new(),
        cast: Vec::new(),
        runtime_minutes: None,
        countries: Vec::new(),
        language: raw.original_language.as_deref().map(language_name),
        trailer_url: None,
        status: None,
    })
}

fn map_detail(raw: DetailAppended, media: MediaType) -> ContentItem {
    let title = raw
        .title
        .or(raw.name)
        .unwrap_or_else(|| format!("#{}", raw.id));
    let date = raw.release_date.or(raw.first_air_date);
    let runtime = raw
        .runtime
        .or_else(|| raw.episode_run_time.first().copied());
    let countries = match (&raw.origin_country, &raw.production_countries) {
        (Some(o), _) if !o.is_empty() => o.clone(),
        (_, Some(p)) => p.iter().map(|c| c.iso_3166_1.clone()).collect(),
        _ => Vec::new(),
    };
    let cast = raw
        .credits
        .as_ref()
        .map(|c| top_names(&c.cast, 10))
        .unwrap_or_default();
    let trailer = raw.videos.as_ref().and_then(select_trailer);
    let platforms = raw
        .watch_providers
        .as_ref()
        .map(flatrate_names)
        .unwrap_or_default();

    ContentItem {
        id: raw.id,
        title,
        media_type: media,
        description: raw.overview,
        year: date.as_deref().and_then(extract_year),
        poster_url: raw.poster_path.as_deref().map(poster_url),
        backdrop_url: raw.backdrop_path.as_deref().map(backdrop_url),
        rating: raw.vote_average,
        popularity: raw.popularity,
        genres: raw.genres.into_iter().map(|g| g.name).collect(),
        platforms,
        cast,
        runtime_minutes: runtime,
        countries,
        language: raw.original_language.as_deref().map(language_name),
        trailer_url: trailer,
        status: raw.status,
    }
}

fn poster_url(path: &str) -> String {
    format!("{POSTER_BASE}{path}")
}

fn backdrop_url(path: &str) -> String {
    format!("{BACKDROP_BASE}{path}")
}

fn extract_year(date: &str) -> Option<String> {
    let year = date.split('-').next()?;
    if year.len() == 4 {
        Some(year.to_string())
    } else {
        None
    }
}

fn top_names(list: &[CastMember], max: usize) -> Vec<String> {
    list.iter().take(max).map(|c| c.name.clone()).collect()
}

fn select_trailer(videos: &Videos) -> Option<String> {
    videos
        .results
        .iter()
        .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Trailer")
        .or_else(|| {
            videos
                .results
                .iter()
                .find(|v| v.site.eq_ignore_ascii_case("YouTube") && v.video_type == "Teaser")
        })
        .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
}

fn flatrate_names(data: &ProvidersResponse) -> Vec<String> {
    data.results
        .get(WATCH_REGION)
        .map(|region| {
            region
                .flatrate
                .iter()
                .map(|p| p.provider_name.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Upstream genre ids for movies and TV, merged. TV keeps its compound
/// entries (e.g. "Sci-Fi & Fantasy") distinct from the movie ids.
pub fn genre_name(id: i32) -> Option<&'static str> {
    let name = match id {
        28 => "Action",
        12 => "Adventure",
        16 => "Animation",
        35 => "Comedy",
        80 => "Crime",
        99 => "Documentary",
        18 => "Drama",
        10751 => "Family",
        14 => "Fantasy",
        36 => "History",
        27 => "Horror",
        10402 => "Music",
        9648 => "Mystery",
        10749 => "Romance",
        878 => "Science Fiction",
        10770 => "TV Movie",
        53 => "Thriller",
        10752 => "War",
        37 => "Western",
        10759 => "Action & Adventure",
        10762 => "Kids",
        10763 => "News",
        10764 => "Reality",
        10765 => "Sci-Fi & Fantasy",
        10766 => "Soap",
        10767 => "Talk",
        10768 => "War & Politics",
        _ => return None,
    };
    Some(name)
}

pub fn language_name(code: &str) -> String {
    let name = match code {
        "en" => "English",
        "fr" => "French",
        "es" => "Spanish",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "sv" => "Swedish",
        "da" => "Danish",
        "no" => "Norwegian",
        "fi" => "Finnish",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "th" => "Thai",
        "vi" => "Vietnamese",
        _ => return code.to_string(),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_search_item_with_forced_type() {
        let raw = ListItem {
            id: 42,
            title: Some("Alien".to_string()),
            name: None,
            overview: "In space...".to_string(),
            release_date: Some("1979-05-25".to_string()),
            first_air_date: None,
            poster_path: Some("/alien.jpg".to_string()),
            backdrop_path: None,
            vote_average: 8.4,
            popularity: 99.0,
            genre_ids: vec![27, 878],
            original_language: Some("en".to_string()),
            media_type: None,
        };
        let item = map_list_item(raw, Some(MediaType::Movie)).unwrap();
        assert_eq!(item.year.as_deref(), Some("1979"));
        assert_eq!(item.genres, vec!["Horror", "Science Fiction"]);
        assert_eq!(item.language.as_deref(), Some("English"));
        assert!(item.poster_url.unwrap().ends_with("/alien.jpg"));
    }

    #[test]
    fn trending_drops_people() {
        let person = ListItem {
            id: 1,
            title: None,
            name: Some("Some Actor".to_string()),
            overview: String::new(),
            release_date: None,
            first_air_date: None,
            poster_path: None,
            backdrop_path: None,
            vote_average: 0.0,
            popularity: 10.0,
            genre_ids: vec![],
            original_language: None,
            media_type: Some("person".to_string()),
        };
        assert!(map_list_item(person, None).is_none());
    }

    #[test]
    fn selects_trailer_over_teaser() {
        let videos = Videos {
            results: vec![
                Video {
                    site: "YouTube".to_string(),
                    video_type: "Teaser".to_string(),
                    key: "teaser".to_string(),
                },
                Video {
                    site: "YouTube".to_string(),
                    video_type: "Trailer".to_string(),
                    key: "trailer".to_string(),
                },
            ],
        };
        assert_eq!(
            select_trailer(&videos).as_deref(),
            Some("https://www.youtube.com/watch?v=trailer")
        );
    }

    #[test]
    fn year_requires_four_digits() {
        assert_eq!(extract_year("2024-01-01").as_deref(), Some("2024"));
        assert_eq!(extract_year(""), None);
    }
}
