use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::task::Task;

/// Partition tasks by calendar date. Within a group, tasks keep the order
/// they had in the source list; callers wanting newest-day-first iterate
/// the map in reverse.
pub fn group_by_date(tasks: &[Task]) -> BTreeMap<NaiveDate, Vec<&Task>> {
    let mut grouped: BTreeMap<NaiveDate, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        grouped.entry(task.date).or_default().push(task);
    }
    grouped
}

/// Select the tasks whose date falls in the month containing `today`.
///
/// This is a point-in-time filter: `today` is the caller's wall clock, not
/// anything intrinsic to the data.
pub fn month_tasks<'a>(tasks: &'a [Task], today: NaiveDate) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.date.year() == today.year() && t.date.month() == today.month())
        .collect()
}

/// Hours summed per project for one month, plus totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySummary {
    pub per_project: BTreeMap<String, f64>,
    pub total_hours: f64,
    pub task_count: usize,
}

impl MonthlySummary {
    /// Projects ranked by descending hours; equal hours keep alphabetical
    /// order (stable sort over the map's iteration order).
    pub fn ranked(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .per_project
            .iter()
            .map(|(p, h)| (p.as_str(), *h))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

/// Summarize the month containing `today`: per-project hours, total hours,
/// and how many entries the month has. An empty list is a valid input and
/// yields an empty summary, not an error.
pub fn monthly_summary(tasks: &[Task], today: NaiveDate) -> MonthlySummary {
    let subset = month_tasks(tasks, today);
    let mut per_project: BTreeMap<String, f64> = BTreeMap::new();
    let mut total_hours = 0.0;
    for task in &subset {
        *per_project.entry(task.project.clone()).or_insert(0.0) += task.hours;
        total_hours += task.hours;
    }
    MonthlySummary {
        per_project,
        total_hours,
        task_count: subset.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn task(id: i64, project: &str, name: &str, date: &str, hours: f64) -> Task {
        Task {
            id,
            project: project.into(),
            task: name.into(),
            date: d(date),
            hours,
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task(1, "A", "x", "2024-06-01", 2.0),
            task(2, "B", "y", "2024-06-01", 1.0),
            task(3, "A", "z", "2024-05-15", 5.0),
        ]
    }

    #[test]
    fn grouping_keys_are_the_distinct_dates() {
        let tasks = sample();
        let grouped = group_by_date(&tasks);

        let keys: BTreeSet<NaiveDate> = grouped.keys().copied().collect();
        let dates: BTreeSet<NaiveDate> = tasks.iter().map(|t| t.date).collect();
        assert_eq!(keys, dates);

        assert_eq!(grouped[&d("2024-06-01")].len(), 2);
        assert_eq!(grouped[&d("2024-05-15")].len(), 1);
    }

    #[test]
    fn grouping_loses_and_duplicates_nothing() {
        let tasks = sample();
        let grouped = group_by_date(&tasks);

        let mut ids: Vec<i64> = grouped
            .values()
            .flat_map(|group| group.iter().map(|t| t.id))
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn grouping_preserves_source_order_within_a_day() {
        let tasks = sample();
        let grouped = group_by_date(&tasks);
        let day: Vec<i64> = grouped[&d("2024-06-01")].iter().map(|t| t.id).collect();
        assert_eq!(day, vec![1, 2]);
    }

    #[test]
    fn month_filter_is_idempotent() {
        let tasks = sample();
        let today = d("2024-06-15");
        let once: Vec<Task> = month_tasks(&tasks, today).into_iter().cloned().collect();
        let twice: Vec<Task> = month_tasks(&once, today).into_iter().cloned().collect();
        assert_eq!(once, twice);
    }

    #[test]
    fn summary_for_june_2024() {
        let tasks = sample();
        let summary = monthly_summary(&tasks, d("2024-06-15"));

        assert_eq!(summary.per_project.len(), 2);
        assert_eq!(summary.per_project["A"], 2.0);
        assert_eq!(summary.per_project["B"], 1.0);
        assert_eq!(summary.total_hours, 3.0);
        assert_eq!(summary.task_count, 2);
    }

    #[test]
    fn per_project_sums_equal_the_total() {
        let tasks = vec![
            task(1, "A", "x", "2024-06-01", 1.25),
            task(2, "B", "y", "2024-06-02", 0.75),
            task(3, "A", "z", "2024-06-03", 2.5),
            task(4, "C", "w", "2024-06-04", 0.25),
        ];
        let summary = monthly_summary(&tasks, d("2024-06-30"));
        let sum: f64 = summary.per_project.values().sum();
        assert!((sum - summary.total_hours).abs() < 1e-9);
    }

    #[test]
    fn empty_list_yields_empty_summary() {
        let summary = monthly_summary(&[], d("2024-06-15"));
        assert_eq!(summary, MonthlySummary::default());
        assert!(group_by_date(&[]).is_empty());
    }

    #[test]
    fn ranking_is_descending_with_stable_ties() {
        let tasks = vec![
            task(1, "B", "x", "2024-06-01", 2.0),
            task(2, "A", "y", "2024-06-02", 2.0),
            task(3, "C", "z", "2024-06-03", 4.0),
        ];
        let summary = monthly_summary(&tasks, d("2024-06-15"));
        let ranked = summary.ranked();
        assert_eq!(ranked[0], ("C", 4.0));
        // A before B: equal hours keep alphabetical map order
        assert_eq!(ranked[1], ("A", 2.0));
        assert_eq!(ranked[2], ("B", 2.0));
    }

    #[test]
    fn december_boundary_does_not_leak_into_january() {
        let tasks = vec![
            task(1, "A", "x", "2023-12-31", 1.0),
            task(2, "A", "y", "2024-01-01", 2.0),
        ];
        let summary = monthly_summary(&tasks, d("2024-01-10"));
        assert_eq!(summary.task_count, 1);
        assert_eq!(summary.total_hours, 2.0);
    }
}
