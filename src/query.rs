use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::MediaType;
use crate::tmdb::DiscoverFilters;

/// What the interpreter decided to do with a free-text query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchMode {
    /// Direct title search with the residual term.
    TitleSearch { term: String },
    /// Category browse with structured filters.
    Discover { filters: DiscoverFilters },
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryIntent {
    pub mode: SearchMode,
    /// Parsed "top/best N" cap, if the query asked for one.
    pub limit: Option<usize>,
    /// "movie"/"film" vs "show"/"series" wording, if present.
    pub media_hint: Option<MediaType>,
}

static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("year pattern is valid"));

static TOP_N_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:top|best)\s*(\d{1,2})?\b").expect("top-n pattern is valid"));

/// Keyword -> upstream genre id. Longer synonyms first so phrase removal
/// takes "science fiction" before "fiction" would ever match anything.
const GENRE_KEYWORDS: &[(&str, i32)] = &[
    ("science fiction", 878),
    ("sci-fi", 878),
    ("scifi", 878),
    ("documentary", 99),
    ("documentaries", 99),
    ("animation", 16),
    ("animated", 16),
    ("adventure", 12),
    ("thriller", 53),
    ("romance", 10749),
    ("romantic", 10749),
    ("fantasy", 14),
    ("mystery", 9648),
    ("western", 37),
    ("history", 36),
    ("historical", 36),
    ("comedy", 35),
    ("comedies", 35),
    ("horror", 27),
    ("action", 28),
    ("family", 10751),
    ("crime", 80),
    ("drama", 18),
    ("war", 10752),
];

const LANGUAGE_KEYWORDS: &[(&str, &str)] = &[
    ("english", "en"),
    ("french", "fr"),
    ("spanish", "es"),
    ("german", "de"),
    ("italian", "it"),
    ("portuguese", "pt"),
    ("russian", "ru"),
    ("japanese", "ja"),
    ("korean", "ko"),
    ("chinese", "zh"),
    ("hindi", "hi"),
    ("turkish", "tr"),
    ("thai", "th"),
];

/// Keyword -> upstream watch-provider id.
const PLATFORM_KEYWORDS: &[(&str, i32)] = &[
    ("netflix", 8),
    ("disney plus", 337),
    ("disney+", 337),
    ("disney", 337),
    ("amazon prime", 9),
    ("prime video", 9),
    ("prime", 9),
    ("apple tv+", 350),
    ("apple tv", 350),
    ("hbo max", 1899),
    ("hbo", 1899),
    ("hulu", 15),
    ("paramount+", 531),
    ("paramount", 531),
    ("peacock", 386),
];

/// Words that never carry title information on their own.
const STOP_WORDS: &[&str] = &[
    "top", "best", "the", "a", "an", "of", "in", "on", "from", "with", "for", "me", "some",
    "find", "watch", "movie", "movies", "film", "films", "show", "shows", "series", "tv",
    "new", "good", "great",
];

static PLATFORM_PATTERNS: Lazy<Vec<(Regex, i32)>> = Lazy::new(|| {
    PLATFORM_KEYWORDS
        .iter()
        .map(|(keyword, id)| (keyword_regex(keyword), *id))
        .collect()
});

static LANGUAGE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    LANGUAGE_KEYWORDS
        .iter()
        .map(|(keyword, code)| (keyword_regex(keyword), *code))
        .collect()
});

static GENRE_PATTERNS: Lazy<Vec<(Regex, i32)>> = Lazy::new(|| {
    GENRE_KEYWORDS
        .iter()
        .map(|(keyword, id)| (keyword_regex(keyword), *id))
        .collect()
});

/// Word-boundary pattern for a keyword, so "war" never eats the middle of
/// "star wars". Boundaries only apply next to alphanumerics; "disney+" ends
/// on a non-word character and gets none there.
fn keyword_regex(keyword: &str) -> Regex {
    let mut pattern = String::new();
    if keyword.starts_with(|c: char| c.is_alphanumeric()) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(keyword));
    if keyword.ends_with(|c: char| c.is_alphanumeric()) {
        pattern.push_str(r"\b");
    }
    Regex::new(&pattern).expect("escaped keyword is a valid pattern")
}

/// Classify a free-text query into either a direct title search or a
/// structured discovery request. Pure and deterministic; never touches I/O.
pub fn interpret(query: &str) -> QueryIntent {
    let mut working = query.to_lowercase();

    let limit = TOP_N_RE.captures(&working).map(|caps| {
        caps.get(1)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(10)
    });

    let mut filters = DiscoverFilters::default();

    let year_match = YEAR_RE
        .find(&working)
        .map(|m| (m.range(), m.as_str().parse::<i32>().ok()));
    if let Some((range, year)) = year_match {
        filters.year = year;
        // Remove exactly the matched span; the same digits may also appear
        // embedded in an earlier token.
        working.replace_range(range, " ");
    }
    for (re, id) in PLATFORM_PATTERNS.iter() {
        if let Some(stripped) = strip_match(re, &working) {
            filters.provider_id = Some(*id);
            working = stripped;
            break;
        }
    }
    for (re, code) in LANGUAGE_PATTERNS.iter() {
        if let Some(stripped) = strip_match(re, &working) {
            filters.language = Some((*code).to_string());
            working = stripped;
            break;
        }
    }
    for (re, id) in GENRE_PATTERNS.iter() {
        if let Some(stripped) = strip_match(re, &working) {
            filters.genre_id = Some(*id);
            working = stripped;
            break;
        }
    }

    let media_hint = media_hint(&working);
    let residual = residual_term(&working);
    let has_filters = filters != DiscoverFilters::default();

    let mode = if has_filters && residual.is_empty() {
        SearchMode::Discover { filters }
    } else if residual.is_empty() {
        SearchMode::TitleSearch {
            term: query.trim().to_string(),
        }
    } else {
        SearchMode::TitleSearch { term: residual }
    };

    QueryIntent {
        mode,
        limit,
        media_hint,
    }
}

/// Strip a precompiled keyword pattern; returns the stripped text only on a
/// match.
fn strip_match(re: &Regex, text: &str) -> Option<String> {
    if re.is_match(text) {
        Some(re.replace(text, " ").into_owned())
    } else {
        None
    }
}

fn media_hint(text: &str) -> Option<MediaType> {
    for token in text.split_whitespace() {
        match token {
            "movie" | "movies" | "film" | "films" => return Some(MediaType::Movie),
            "show" | "shows" | "series" | "tv" => return Some(MediaType::Tv),
            _ => {}
        }
    }
    None
}

/// Strip stop words and bare numbers; whatever remains is title text.
fn residual_term(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discover_filters(intent: &QueryIntent) -> &DiscoverFilters {
        match &intent.mode {
            SearchMode::Discover { filters } => filters,
            other => panic!("expected discover, got {other:?}"),
        }
    }

    #[test]
    fn plain_title_stays_a_title_search() {
        let intent = interpret("Everything Everywhere All at Once");
        match intent.mode {
            SearchMode::TitleSearch { term } => {
                assert_eq!(term, "everything everywhere all at once")
            }
            other => panic!("unexpected mode {other:?}"),
        }
        assert_eq!(intent.limit, None);
    }

    #[test]
    fn genre_only_query_becomes_discover() {
        let intent = interpret("best horror movies");
        let filters = discover_filters(&intent);
        assert_eq!(filters.genre_id, Some(27));
        assert_eq!(intent.media_hint, Some(MediaType::Movie));
        assert_eq!(intent.limit, Some(10));
    }

    #[test]
    fn top_n_cap_is_parsed() {
        let intent = interpret("top 5 korean thriller movies");
        assert_eq!(intent.limit, Some(5));
        let filters = discover_filters(&intent);
        assert_eq!(filters.genre_id, Some(53));
        assert_eq!(filters.language.as_deref(), Some("ko"));
    }

    #[test]
    fn platform_and_year_extracted() {
        let intent = interpret("comedy shows on netflix from 2020");
        let filters = discover_filters(&intent);
        assert_eq!(filters.provider_id, Some(8));
        assert_eq!(filters.year, Some(2020));
        assert_eq!(filters.genre_id, Some(35));
        assert_eq!(intent.media_hint, Some(MediaType::Tv));
    }

    #[test]
    fn residual_title_wins_over_discover() {
        // "dark" is title text, so the genre alone must not force discovery.
        let intent = interpret("dark comedy gangster");
        match intent.mode {
            SearchMode::TitleSearch { term } => assert_eq!(term, "dark gangster"),
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn science_fiction_phrase_matches_before_fragments() {
        let intent = interpret("best science fiction films");
        let filters = discover_filters(&intent);
        assert_eq!(filters.genre_id, Some(878));
    }

    #[test]
    fn unrecognized_input_degrades_to_raw_query() {
        let intent = interpret("the best of the");
        match intent.mode {
            SearchMode::TitleSearch { term } => assert_eq!(term, "the best of the"),
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn genre_word_needs_its_own_token() {
        // "star wars" must not trip the "war" genre keyword.
        let intent = interpret("star wars");
        match intent.mode {
            SearchMode::TitleSearch { term } => assert_eq!(term, "star wars"),
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn year_removal_respects_match_boundaries() {
        // The year must be cut at the boundary-checked match position, not at
        // the first substring occurrence of the same digits.
        let intent = interpret("a2020x 2020");
        assert_eq!(intent.media_hint, None);
        match intent.mode {
            SearchMode::TitleSearch { term } => assert_eq!(term, "a2020x"),
            other => panic!("unexpected mode {other:?}"),
        }
    }

    #[test]
    fn interpretation_is_case_insensitive() {
        let a = interpret("TOP 3 FRENCH HORROR MOVIES");
        let b = interpret("top 3 french horror movies");
        assert_eq!(a, b);
        assert_eq!(a.limit, Some(3));
    }
}
