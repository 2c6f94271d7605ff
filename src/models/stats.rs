use serde::{Deserialize, Serialize};

/// Per-player tackle aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TackleStat {
    pub player: String,
    pub total: i64,
    pub completed: i64,
    pub missed: i64,
    pub possible: i64,
    pub other: i64,
    pub starred: i64,
}

impl TackleStat {
    /// Completion rate over decided tackles.
    ///
    /// `possible` and `other` are excluded from the denominator. Returns
    /// `None` when no tackle was completed or missed.
    pub fn percentage(&self) -> Option<f64> {
        let decided = self.completed + self.missed;
        if decided == 0 {
            None
        } else {
            Some(self.completed as f64 / decided as f64 * 100.0)
        }
    }

    /// Percentage formatted for display, `-` when undefined.
    pub fn percentage_label(&self) -> String {
        match self.percentage() {
            Some(pct) => format!("{pct:.0}%"),
            None => "-".to_string(),
        }
    }

    /// Sums a set of rows into a `TOTAL` row.
    pub fn total<'a>(stats: impl IntoIterator<Item = &'a TackleStat>) -> TackleStat {
        stats.into_iter().fold(
            TackleStat {
                player: "TOTAL".to_string(),
                ..Default::default()
            },
            |mut acc, s| {
                acc.total += s.total;
                acc.completed += s.completed;
                acc.missed += s.missed;
                acc.possible += s.possible;
                acc.other += s.other;
                acc.starred += s.starred;
                acc
            },
        )
    }
}

/// Number of notes in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}
