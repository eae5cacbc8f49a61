//! Read-only views derived from the weekly task list.
//!
//! Everything here is a pure function of the task slice and the local
//! calendar date; callers recompute on demand instead of caching.

use crate::domain::day_index::DayIndex;
use crate::domain::models::{Priority, Task, TaskType};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

pub const STREAK_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DayProgress {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct TypeGroups {
    pub study: Vec<Task>,
    pub gym: Vec<Task>,
    pub rest: Vec<Task>,
}

impl TypeGroups {
    pub fn get(&self, task_type: TaskType) -> &[Task] {
        match task_type {
            TaskType::Study => &self.study,
            TaskType::Gym => &self.gym,
            TaskType::Rest => &self.rest,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TypeTotals {
    pub study: u32,
    pub gym: u32,
    pub rest: u32,
}

impl TypeTotals {
    fn add(&mut self, task_type: TaskType, amount: u32) {
        let slot = match task_type {
            TaskType::Study => &mut self.study,
            TaskType::Gym => &mut self.gym,
            TaskType::Rest => &mut self.rest,
        };
        *slot = slot.saturating_add(amount);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DaySummary {
    pub day: DayIndex,
    pub name: &'static str,
    pub is_today: bool,
    pub progress: DayProgress,
    pub hours: f64,
    pub tasks: TypeGroups,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeeklySummary {
    pub days: Vec<DaySummary>,
    pub total_tasks: usize,
    pub total_completed: usize,
    pub total_hours: f64,
    pub week_progress: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerformanceMetrics {
    pub best_day: DayIndex,
    pub best_day_name: &'static str,
    pub streak: u32,
    pub average_daily_hours: f64,
    pub goals_achieved: usize,
    pub completion_rate: u32,
}

/// `round(part / whole * 100)`, 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    let scaled = (part as f64 / whole as f64) * 100.0;
    scaled.round().clamp(0.0, 100.0) as u32
}

pub fn tasks_for_day(tasks: &[Task], day: DayIndex) -> Vec<Task> {
    tasks.iter().filter(|task| task.day == day).cloned().collect()
}

pub fn today_tasks(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    tasks_for_day(tasks, DayIndex::for_date(today))
}

/// Today's open tasks, which are the ones the focus timer can be bound to.
pub fn timer_candidates(tasks: &[Task], today: NaiveDate) -> Vec<Task> {
    let day = DayIndex::for_date(today);
    tasks
        .iter()
        .filter(|task| task.day == day && !task.completed)
        .cloned()
        .collect()
}

pub fn group_by_type(tasks: &[Task]) -> TypeGroups {
    let mut groups = TypeGroups::default();
    for task in tasks {
        match task.task_type {
            TaskType::Study => groups.study.push(task.clone()),
            TaskType::Gym => groups.gym.push(task.clone()),
            TaskType::Rest => groups.rest.push(task.clone()),
        }
    }
    groups
}

pub fn day_progress(tasks: &[Task], day: DayIndex) -> DayProgress {
    let (total, completed) = tasks
        .iter()
        .filter(|task| task.day == day)
        .fold((0usize, 0usize), |(total, completed), task| {
            (total + 1, completed + usize::from(task.completed))
        });
    DayProgress {
        total,
        completed,
        remaining: total - completed,
        percentage: percentage(completed, total),
    }
}

pub fn weekly_summary(tasks: &[Task], today: NaiveDate) -> WeeklySummary {
    let today_index = DayIndex::for_date(today);
    let days = DayIndex::ALL
        .into_iter()
        .map(|day| {
            let day_tasks = tasks_for_day(tasks, day);
            DaySummary {
                day,
                name: day.name(),
                is_today: day == today_index,
                progress: day_progress(tasks, day),
                hours: minutes_to_hours(day_tasks.iter().map(|task| task.duration)),
                tasks: group_by_type(&day_tasks),
            }
        })
        .collect::<Vec<_>>();

    let total_tasks = tasks.len();
    let total_completed = tasks.iter().filter(|task| task.completed).count();

    WeeklySummary {
        days,
        total_tasks,
        total_completed,
        total_hours: minutes_to_hours(tasks.iter().map(|task| task.duration)),
        week_progress: percentage(total_completed, total_tasks),
    }
}

/// Day with the strictly highest completion percentage; Saturday when none
/// has any progress.
pub fn best_day(tasks: &[Task]) -> DayIndex {
    let mut best = DayIndex::SATURDAY;
    let mut best_percentage = 0;
    for day in DayIndex::ALL {
        let progress = day_progress(tasks, day);
        if progress.percentage > best_percentage {
            best_percentage = progress.percentage;
            best = day;
        }
    }
    best
}

/// Counts fully completed days walking back from `today`, skipping days
/// with nothing scheduled and stopping at the first incomplete one.
pub fn streak(tasks: &[Task], today: NaiveDate) -> u32 {
    let mut streak = 0;
    for offset in 0..STREAK_WINDOW_DAYS {
        let date = today - Duration::days(offset);
        let progress = day_progress(tasks, DayIndex::for_date(date));
        if progress.total == 0 {
            continue;
        }
        if progress.completed < progress.total {
            break;
        }
        streak += 1;
    }
    streak
}

pub fn completion_rate(tasks: &[Task]) -> u32 {
    let completed = tasks.iter().filter(|task| task.completed).count();
    percentage(completed, tasks.len())
}

pub fn type_distribution(tasks: &[Task]) -> TypeTotals {
    let mut totals = TypeTotals::default();
    for task in tasks {
        totals.add(task.task_type, 1);
    }
    totals
}

/// Completed minutes per task type.
pub fn time_spent_by_type(tasks: &[Task]) -> TypeTotals {
    let mut totals = TypeTotals::default();
    for task in tasks.iter().filter(|task| task.completed) {
        totals.add(task.task_type, task.duration);
    }
    totals
}

/// Completed hours spread over the seven days, to one decimal.
pub fn average_daily_hours(tasks: &[Task]) -> f64 {
    let completed_minutes: u64 = tasks
        .iter()
        .filter(|task| task.completed)
        .map(|task| u64::from(task.duration))
        .sum();
    let hours = completed_minutes as f64 / 7.0 / 60.0;
    (hours * 10.0).round() / 10.0
}

pub fn high_priority_completed(tasks: &[Task]) -> usize {
    tasks
        .iter()
        .filter(|task| task.completed && task.priority == Priority::High)
        .count()
}

pub fn performance_metrics(tasks: &[Task], today: NaiveDate) -> PerformanceMetrics {
    let best = best_day(tasks);
    PerformanceMetrics {
        best_day: best,
        best_day_name: best.name(),
        streak: streak(tasks, today),
        average_daily_hours: average_daily_hours(tasks),
        goals_achieved: high_priority_completed(tasks),
        completion_rate: completion_rate(tasks),
    }
}

fn minutes_to_hours(minutes: impl Iterator<Item = u32>) -> f64 {
    let total: u64 = minutes.map(u64::from).sum();
    total as f64 / 60.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn created_at() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-14T08:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn day(value: u8) -> DayIndex {
        DayIndex::new(value).expect("valid day")
    }

    fn task(title: &str, task_type: TaskType, day_value: u8, duration: u32, completed: bool) -> Task {
        Task {
            id: Some(format!("tsk-{title}")),
            title: title.to_string(),
            description: None,
            task_type,
            day: day(day_value),
            duration,
            priority: Priority::Medium,
            completed,
            completed_at: completed.then(created_at),
            created_at: created_at(),
            updated_at: created_at(),
        }
    }

    // 2026-02-18 is a Wednesday (index 4).
    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 18).expect("valid date")
    }

    #[test]
    fn day_progress_rounds_and_guards_empty_days() {
        let tasks = vec![
            task("a", TaskType::Study, 2, 60, true),
            task("b", TaskType::Gym, 2, 30, false),
            task("c", TaskType::Rest, 2, 30, false),
        ];
        let progress = day_progress(&tasks, day(2));
        assert_eq!(progress.total, 3);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.remaining, 2);
        assert_eq!(progress.percentage, 33);

        assert_eq!(day_progress(&tasks, day(5)), DayProgress::default());
    }

    #[test]
    fn today_tasks_use_the_weekday_mapping() {
        let tasks = vec![
            task("wed", TaskType::Study, 4, 60, false),
            task("sat", TaskType::Study, 0, 60, false),
        ];
        let today = today_tasks(&tasks, wednesday());
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].title, "wed");
    }

    #[test]
    fn group_by_type_preserves_order() {
        let tasks = vec![
            task("s1", TaskType::Study, 0, 30, false),
            task("g1", TaskType::Gym, 0, 30, false),
            task("s2", TaskType::Study, 1, 30, false),
        ];
        let groups = group_by_type(&tasks);
        let titles = groups
            .get(TaskType::Study)
            .iter()
            .map(|task| task.title.as_str())
            .collect::<Vec<_>>();
        assert_eq!(titles, vec!["s1", "s2"]);
        assert_eq!(groups.gym.len(), 1);
        assert!(groups.rest.is_empty());
    }

    #[test]
    fn weekly_summary_totals_span_all_days() {
        let tasks = vec![
            task("a", TaskType::Study, 0, 90, true),
            task("b", TaskType::Gym, 4, 60, false),
            task("c", TaskType::Rest, 6, 30, true),
        ];
        let summary = weekly_summary(&tasks, wednesday());

        assert_eq!(summary.days.len(), 7);
        assert_eq!(summary.total_tasks, 3);
        assert_eq!(summary.total_completed, 2);
        assert!((summary.total_hours - 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.week_progress, 67);
        assert!(summary.days[4].is_today);
        assert_eq!(summary.days[4].name, "Wednesday");
        assert_eq!(summary.days[0].progress.percentage, 100);
        assert_eq!(summary.days[0].tasks.study.len(), 1);

        let empty = weekly_summary(&[], wednesday());
        assert_eq!(empty.week_progress, 0);
    }

    #[test]
    fn best_day_prefers_first_of_ties_and_defaults_to_saturday() {
        assert_eq!(best_day(&[]), DayIndex::SATURDAY);

        let tasks = vec![
            task("mon", TaskType::Study, 2, 30, true),
            task("thu", TaskType::Study, 5, 30, true),
            task("sat", TaskType::Study, 0, 30, false),
        ];
        assert_eq!(best_day(&tasks), day(2));
    }

    #[test]
    fn streak_skips_empty_days_and_counts_weekend_twice_a_week() {
        let tasks = vec![
            task("sat", TaskType::Study, 0, 60, true),
            task("sun", TaskType::Gym, 1, 60, true),
        ];
        // Every Saturday and Sunday inside the 30-day window qualifies.
        let count = streak(&tasks, wednesday());
        let expected = (0..STREAK_WINDOW_DAYS)
            .map(|offset| DayIndex::for_date(wednesday() - Duration::days(offset)).value())
            .filter(|value| *value <= 1)
            .count() as u32;
        assert_eq!(count, expected);
        assert!(count >= 8);
    }

    #[test]
    fn streak_stops_at_first_incomplete_day() {
        let tasks = vec![
            task("wed", TaskType::Study, 4, 60, true),
            task("tue", TaskType::Study, 3, 60, false),
            task("mon", TaskType::Study, 2, 60, true),
        ];
        assert_eq!(streak(&tasks, wednesday()), 1);

        let open_today = vec![task("wed", TaskType::Study, 4, 60, false)];
        assert_eq!(streak(&open_today, wednesday()), 0);
    }

    #[test]
    fn performance_metrics_collects_secondary_stats() {
        let mut high = task("exam", TaskType::Study, 4, 420, true);
        high.priority = Priority::High;
        let tasks = vec![
            high,
            task("run", TaskType::Gym, 4, 60, false),
            task("nap", TaskType::Rest, 3, 30, true),
        ];

        let metrics = performance_metrics(&tasks, wednesday());
        assert_eq!(metrics.goals_achieved, 1);
        assert_eq!(metrics.completion_rate, 67);
        assert_eq!(metrics.best_day, day(3));
        // (420 + 30) / 7 / 60 = 1.07 -> 1.1
        assert!((metrics.average_daily_hours - 1.1).abs() < 1e-9);

        assert_eq!(type_distribution(&tasks), TypeTotals { study: 1, gym: 1, rest: 1 });
        assert_eq!(time_spent_by_type(&tasks), TypeTotals { study: 420, gym: 0, rest: 30 });
        assert_eq!(timer_candidates(&tasks, wednesday()).len(), 1);
    }

    fn arb_task() -> impl Strategy<Value = Task> {
        (0u8..7, 1u32..240, any::<bool>()).prop_map(|(day_value, duration, completed)| {
            task("t", TaskType::Study, day_value, duration, completed)
        })
    }

    proptest! {
        #[test]
        fn day_percentage_stays_in_bounds(tasks in prop::collection::vec(arb_task(), 0..40), day_value in 0u8..7) {
            let day_index = day(day_value);
            let progress = day_progress(&tasks, day_index);
            prop_assert!(progress.percentage <= 100);
            if tasks_for_day(&tasks, day_index).is_empty() {
                prop_assert_eq!(progress.percentage, 0);
            }
            prop_assert!(completion_rate(&tasks) <= 100);
        }
    }
}
