use serde::{Deserialize, Serialize};
use std::fmt;

/// Movie vs TV show, as the upstream API distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn as_path(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "movie" | "movies" | "film" | "films" => Some(MediaType::Movie),
            "tv" | "show" | "shows" | "series" => Some(MediaType::Tv),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

/// An upstream catalog record normalized to the shape the UI renders.
/// Built fresh per request, discarded with the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub title: String,
    pub media_type: MediaType,
    pub description: String,
    pub year: Option<String>,
    pub poster_url: Option<String>,
    pub backdrop_url: Option<String>,
    pub rating: f32,
    pub popularity: f32,
    pub genres: Vec<String>,
    pub platforms: Vec<String>,
    pub cast: Vec<String>,
    pub runtime_minutes: Option<f32>,
    pub countries: Vec<String>,
    pub language: Option<String>,
    pub trailer_url: Option<String>,
    pub status: Option<String>,
}

/// Caller-supplied filters for the search endpoint. Every field is optional;
/// absent fields filter nothing.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub media_type: Option<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub platform: Option<String>,
    pub min_rating: Option<f32>,
    pub year: Option<i32>,
}

/// One recommendation row, from the static tables or the AI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub category: String,
    pub confidence: f32,
}

/// Trending time window supported by the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrendingWindow {
    #[default]
    Day,
    Week,
}

impl TrendingWindow {
    pub fn as_path(&self) -> &'static str {
        match self {
            TrendingWindow::Day => "day",
            TrendingWindow::Week => "week",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "day" => Some(TrendingWindow::Day),
            "week" => Some(TrendingWindow::Week),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_media_type_aliases() {
        assert_eq!(MediaType::parse("Movie"), Some(MediaType::Movie));
        assert_eq!(MediaType::parse("movies"), Some(MediaType::Movie));
        assert_eq!(MediaType::parse("series"), Some(MediaType::Tv));
        assert_eq!(MediaType::parse("TV"), Some(MediaType::Tv));
        assert_eq!(MediaType::parse("podcast"), None);
    }
}
