//! Budget enforcement and display ordering of search records.

use crate::record::SearchRecord;

/// Final result of one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Records ordered by `(channel, date, time)`
    pub records: Vec<SearchRecord>,
    /// Some matching lines are not part of `records`
    pub truncated: bool,
    /// Records dropped by the ranker to stay within the budget
    pub omitted: usize,
    /// Matched lines dropped because they did not parse
    pub skipped_lines: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultRanker {
    budget: usize,
}

impl ResultRanker {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Keep the `budget` newest records and order them for display.
    ///
    /// `upstream_truncated` carries truncation that already happened while
    /// searching; the outcome is truncated if either stage withheld results.
    pub fn rank(&self, mut records: Vec<SearchRecord>, upstream_truncated: bool) -> SearchOutcome {
        let mut omitted = 0;
        if records.len() > self.budget {
            records.sort_by(|a, b| (b.date(), b.time()).cmp(&(a.date(), a.time())));
            omitted = records.len() - self.budget;
            records.truncate(self.budget);
        }

        records.sort_by(|a, b| {
            (a.channel(), a.date(), a.time()).cmp(&(b.channel(), b.date(), b.time()))
        });

        SearchOutcome {
            records,
            truncated: upstream_truncated || omitted > 0,
            omitted,
            skipped_lines: 0,
        }
    }
}
