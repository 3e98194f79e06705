use std::path::Path;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Episode numbering recovered from a file path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodePathInfo {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub end_episode: Option<u32>,
    /// Set for date-based shows; ordinal fields stay `None` in that case.
    pub air_date: Option<NaiveDate>,
}

impl EpisodePathInfo {
    pub fn is_date_based(&self) -> bool {
        self.air_date.is_some()
    }
}

/// Episode naming patterns in order of preference. Multi-episode spans must
/// be tried before their single-episode prefixes.
static EPISODE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "multi_episode_dash",
            Regex::new(r"[Ss](\d+)[Ee](\d+)-[Ee]?(\d+)").unwrap(),
        ),
        (
            "multi_episode_concat",
            Regex::new(r"[Ss](\d+)[Ee](\d+)[Ee](\d+)").unwrap(),
        ),
        ("s00e00", Regex::new(r"[Ss](\d+)[Ee](\d+)").unwrap()),
        ("s00_e00", Regex::new(r"[Ss](\d+)[ ._][Ee](\d+)").unwrap()),
        ("0x00", Regex::new(r"(?:^|\D)(\d+)[xX](\d+)").unwrap()),
        (
            "season_episode",
            Regex::new(r"(?i)season\s*(\d+)\s*episode\s*(\d+)").unwrap(),
        ),
        ("ep000", Regex::new(r"(?i)(?:ep|episode)[ ._]?(\d)(\d{2})").unwrap()),
    ]
});

/// Date-based episode patterns (daily shows).
static DATE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "date_ymd",
            Regex::new(r"(\d{4})[\-\.](\d{1,2})[\-\.](\d{1,2})").unwrap(),
        ),
        (
            "date_dmy",
            Regex::new(r"(\d{1,2})[\-\.](\d{1,2})[\-\.](\d{4})").unwrap(),
        ),
    ]
});

/// Season folder patterns.
static SEASON_FOLDER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)^season\s*(\d+)$").unwrap(),
        Regex::new(r"(?i)^season(\d+)$").unwrap(),
        Regex::new(r"(?i)^s(\d{1,2})$").unwrap(),
        Regex::new(r"(?i)^series\s*(\d+)$").unwrap(),
    ]
});

/// Bare episode-number patterns for files inside a season folder.
static FOLDER_EPISODE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)(?:e|ep|episode)\s*(\d+)").unwrap(),
        Regex::new(r"^\s*(\d+)\s*[-_.]").unwrap(),
        Regex::new(r"^(\d{1,3})\s").unwrap(),
        Regex::new(r"^(\d{1,3})$").unwrap(),
    ]
});

/// Stacked movie part suffixes: `part1`, `pt2`, `cd1`, `disc 2`, ...
static STACK_PART_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(.*?)[ _.\-]+(?:part|pt|cd|disc|disk)[ _.\-]?(\d{1,2})$").unwrap()
});

/// Extract episode numbering from a file path.
///
/// Date-based patterns win over ordinal ones (a daily show named
/// `2019-03-01.mkv` must not parse as season 2019). When the filename alone
/// yields nothing, the parent folder is consulted for a season number plus a
/// bare episode number in the filename.
pub fn parse_episode(path: &Path) -> Option<EpisodePathInfo> {
    let filename = path.file_stem()?.to_str()?;

    for (pattern_name, pattern) in DATE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(filename) {
            let (year, month, day) = match *pattern_name {
                "date_ymd" => (
                    captures[1].parse().ok()?,
                    captures[2].parse().ok()?,
                    captures[3].parse().ok()?,
                ),
                "date_dmy" => (
                    captures[3].parse().ok()?,
                    captures[2].parse().ok()?,
                    captures[1].parse().ok()?,
                ),
                _ => continue,
            };
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                debug!("parsed date-based episode {} from {}", date, filename);
                return Some(EpisodePathInfo {
                    air_date: Some(date),
                    ..Default::default()
                });
            }
        }
    }

    for (pattern_name, pattern) in EPISODE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(filename) {
            let season: u32 = captures[1].parse().ok()?;
            let episode: u32 = captures[2].parse().ok()?;
            let end_episode = match *pattern_name {
                "multi_episode_dash" | "multi_episode_concat" => {
                    captures.get(3).and_then(|m| m.as_str().parse().ok())
                }
                _ => None,
            };
            debug!(
                "parsed episode S{:02}E{:02} ({}) from {}",
                season, episode, pattern_name, filename
            );
            return Some(EpisodePathInfo {
                season: Some(season),
                episode: Some(episode),
                end_episode,
                air_date: None,
            });
        }
    }

    parse_from_folder_structure(path)
}

fn parse_from_folder_structure(path: &Path) -> Option<EpisodePathInfo> {
    let filename = path.file_stem()?.to_str()?;
    let parent_name = path.parent()?.file_name()?.to_str()?;
    let season = parse_season_folder(parent_name)?;

    for pattern in FOLDER_EPISODE_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(filename) {
            if let Ok(episode) = captures[1].parse::<u32>() {
                debug!(
                    "parsed episode S{:02}E{:02} from folder+filename",
                    season, episode
                );
                return Some(EpisodePathInfo {
                    season: Some(season),
                    episode: Some(episode),
                    end_episode: None,
                    air_date: None,
                });
            }
        }
    }
    None
}

/// Parse a season number from a folder name. `Specials` maps to season 0.
pub fn parse_season_folder(folder_name: &str) -> Option<u32> {
    if folder_name.eq_ignore_ascii_case("specials")
        || folder_name.eq_ignore_ascii_case("special")
    {
        return Some(0);
    }
    for pattern in SEASON_FOLDER_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(folder_name) {
            if let Ok(season) = captures[1].parse::<u32>() {
                return Some(season);
            }
        }
    }
    None
}

/// Split a stacked movie file stem into (base name, part number).
pub fn parse_stack_part(stem: &str) -> Option<(String, u32)> {
    let captures = STACK_PART_PATTERN.captures(stem)?;
    let base = captures[1].trim().to_string();
    let part: u32 = captures[2].parse().ok()?;
    if base.is_empty() {
        return None;
    }
    Some((base, part))
}
