//! Tackle statistics: sorting, player filtering and category ranking.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::models::{CategoryCount, TackleStat};

/// Number of categories drawn in the bar graph.
pub const TOP_CATEGORIES: usize = 6;

/// Column the stats table is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatsSort {
    #[default]
    Player,
    Total,
    Completed,
    Missed,
    Possible,
    Percentage,
    Starred,
}

impl StatsSort {
    pub const ALL: [StatsSort; 7] = [
        StatsSort::Player,
        StatsSort::Total,
        StatsSort::Completed,
        StatsSort::Missed,
        StatsSort::Possible,
        StatsSort::Percentage,
        StatsSort::Starred,
    ];

    /// The next sort key, wrapping around.
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|s| *s == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            StatsSort::Player => "Player",
            StatsSort::Total => "Total",
            StatsSort::Completed => "Completed",
            StatsSort::Missed => "Missed",
            StatsSort::Possible => "Possible",
            StatsSort::Percentage => "%",
            StatsSort::Starred => "Starred",
        }
    }

    /// Orders two rows. Numeric keys sort descending, ties by player name.
    pub fn compare(self, a: &TackleStat, b: &TackleStat) -> Ordering {
        let by_name = || a.player.to_lowercase().cmp(&b.player.to_lowercase());
        let key = match self {
            StatsSort::Player => return by_name(),
            StatsSort::Total => b.total.cmp(&a.total),
            StatsSort::Completed => b.completed.cmp(&a.completed),
            StatsSort::Missed => b.missed.cmp(&a.missed),
            StatsSort::Possible => b.possible.cmp(&a.possible),
            StatsSort::Starred => b.starred.cmp(&a.starred),
            StatsSort::Percentage => match (a.percentage(), b.percentage()) {
                (Some(x), Some(y)) => y.total_cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };
        key.then_with(by_name)
    }
}

/// Sorts rows in place by `sort`.
pub fn sort_stats(stats: &mut [TackleStat], sort: StatsSort) {
    stats.sort_by(|a, b| sort.compare(a, b));
}

/// True if `input` equals the initials of the whitespace-separated parts of
/// `name`, ignoring case.
///
/// # Examples
///
/// ```
/// use tagging_rugby::tui::stats::matches_initials;
///
/// assert!(matches_initials("John Doe", "jd"));
/// assert!(!matches_initials("John Doe", "j"));
/// assert!(!matches_initials("John Doe", "jdx"));
/// ```
pub fn matches_initials(name: &str, input: &str) -> bool {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return false;
    }
    let initials: String = name
        .split_whitespace()
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_lowercase)
        .collect();
    initials == input
}

/// Players whose name contains `query` or whose initials equal it.
pub fn matching_players<'a>(stats: &'a [TackleStat], query: &str) -> Vec<&'a str> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    stats
        .iter()
        .filter(|s| s.player.to_lowercase().contains(&needle) || matches_initials(&s.player, &needle))
        .map(|s| s.player.as_str())
        .collect()
}

/// Set of players highlighted in the stats table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerFilter {
    players: BTreeSet<String>,
}

impl PlayerFilter {
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn contains(&self, player: &str) -> bool {
        self.players.contains(player)
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    /// Applies a filter query against the known rows.
    ///
    /// A single match, or an exact name match, toggles that player. Several
    /// matches toggle as a group: all are added if any is missing, otherwise
    /// all are removed. Returns the number of players affected.
    pub fn apply(&mut self, stats: &[TackleStat], query: &str) -> usize {
        let matches = matching_players(stats, query);
        let needle = query.trim().to_lowercase();
        let exact = matches
            .iter()
            .find(|p| p.to_lowercase() == needle)
            .copied();

        let single = match matches.as_slice() {
            [only] => Some(*only),
            _ => None,
        };

        if let Some(player) = exact.or(single) {
            self.toggle(player);
            return 1;
        }
        if matches.iter().any(|p| !self.players.contains(*p)) {
            self.players.extend(matches.iter().map(|p| p.to_string()));
        } else {
            for player in &matches {
                self.players.remove(*player);
            }
        }
        matches.len()
    }

    fn toggle(&mut self, player: &str) {
        if !self.players.remove(player) {
            self.players.insert(player.to_string());
        }
    }
}

/// A row ready for display; `dimmed` rows are outside an active filter.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRow {
    pub stat: TackleStat,
    pub dimmed: bool,
}

/// Sorts rows and moves filtered players first.
pub fn arrange(stats: &[TackleStat], filter: &PlayerFilter, sort: StatsSort) -> Vec<StatsRow> {
    let mut sorted = stats.to_vec();
    sort_stats(&mut sorted, sort);
    let (picked, rest): (Vec<_>, Vec<_>) = sorted
        .into_iter()
        .partition(|s| filter.is_empty() || filter.contains(&s.player));
    picked
        .into_iter()
        .map(|stat| StatsRow { stat, dimmed: false })
        .chain(rest.into_iter().map(|stat| StatsRow { stat, dimmed: true }))
        .collect()
}

/// The most frequent categories, count descending then name ascending.
pub fn top_categories(counts: &[CategoryCount]) -> Vec<CategoryCount> {
    let mut counts = counts.to_vec();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));
    counts.truncate(TOP_CATEGORIES);
    counts
}

/// State of the full-screen stats view.
#[derive(Debug, Clone, Default)]
pub struct StatsView {
    pub sort: StatsSort,
    pub filter: PlayerFilter,
    pub input: String,
    /// Aggregate across every video instead of the current one.
    pub all_videos: bool,
}
