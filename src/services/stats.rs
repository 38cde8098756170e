//! Statistics service: dashboard aggregation queries

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::Row;

use crate::{
    api::stats::{
        BookCounts, DashboardStats, HistogramEntry, PopularBook, RangeOption, UserCounts,
    },
    error::AppResult,
    repository::Repository,
};

/// Reporting range tokens understood by the dashboard
const RANGES: &[(&str, &str)] = &[
    ("today", "Hari Ini"),
    ("yesterday", "Kemarin"),
    ("7d", "7 Hari Terakhir"),
    ("30d", "30 Hari Terakhir"),
    ("all", "Semua"),
];

/// Resolve a range token to a half-open `[start, end)` window on UTC
/// midnights. `None` means unbounded. Unrecognized tokens get a
/// single-day window ending now.
fn resolve_window(range: &str, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let midnight = Utc.from_utc_datetime(&now.date_naive().and_hms_opt(0, 0, 0)?);
    let tomorrow = midnight + Duration::days(1);
    match range {
        "today" => Some((midnight, tomorrow)),
        "yesterday" => Some((midnight - Duration::days(1), midnight)),
        // 7d/30d run from the midnight 7/30 days back through the end
        // of today, so they span 8 and 31 calendar days
        "7d" => Some((midnight - Duration::days(7), tomorrow)),
        "30d" => Some((midnight - Duration::days(30), tomorrow)),
        "all" => None,
        _ => Some((now - Duration::days(1), now)),
    }
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// The range tokens offered to the dashboard UI
    pub fn get_ranges(&self) -> Vec<RangeOption> {
        RANGES
            .iter()
            .map(|(value, label)| RangeOption {
                value: value.to_string(),
                label: label.to_string(),
            })
            .collect()
    }

    /// Assemble the full dashboard payload for one range token.
    /// Loans are attributed to the period they started in, returns
    /// included, so a window always describes lending activity.
    pub async fn get_dashboard_stats(&self, range: &str) -> AppResult<DashboardStats> {
        let window = resolve_window(range, Utc::now());

        let borrowed = self.count_started(window, None).await?;
        let returned = self.count_started(window, Some("returned")).await?;

        let (book_total, book_available) = self.repository.books.dashboard_counts().await?;
        let user_total = self.repository.users.count().await?;
        let mut users = UserCounts {
            total: user_total,
            admin: 0,
            user: 0,
        };
        for (role, count) in self.repository.users.role_distribution().await? {
            match role.as_str() {
                "admin" => users.admin = count,
                "user" => users.user = count,
                _ => {}
            }
        }

        // Bounded ranges get daily buckets; the unbounded range gets
        // monthly buckets across all time
        let (daily_data, monthly_data) = match window {
            Some((start, end)) => (
                self.histogram("YYYY-MM-DD", Some((start, end))).await?,
                Vec::new(),
            ),
            None => (Vec::new(), self.histogram("YYYY-MM", None).await?),
        };
        let popular_books = self.popular_books(5).await?;

        Ok(DashboardStats {
            range: range.to_string(),
            borrowed,
            returned,
            total: borrowed + returned,
            users,
            books: BookCounts {
                total: book_total,
                available: book_available,
                borrowed: book_total - book_available,
            },
            daily_data,
            monthly_data,
            popular_books,
        })
    }

    async fn count_started(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        status: Option<&str>,
    ) -> AppResult<i64> {
        let mut conditions = vec!["TRUE".to_string()];
        let mut idx = 0usize;
        if window.is_some() {
            conditions.push(format!("borrowed_at >= ${} AND borrowed_at < ${}", idx + 1, idx + 2));
            idx += 2;
        }
        if status.is_some() {
            idx += 1;
            conditions.push(format!("status = ${}", idx));
        }
        let query = format!(
            "SELECT COUNT(*) FROM borrows WHERE {}",
            conditions.join(" AND ")
        );

        let mut count = sqlx::query_scalar::<_, i64>(&query);
        if let Some((start, end)) = window {
            count = count.bind(start).bind(end);
        }
        if let Some(s) = status {
            count = count.bind(s);
        }
        Ok(count.fetch_one(&self.repository.pool).await?)
    }

    /// Loan counts grouped by period and status. `pattern` is a
    /// Postgres TO_CHAR format, daily or monthly.
    async fn histogram(
        &self,
        pattern: &str,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> AppResult<Vec<HistogramEntry>> {
        let where_clause = if window.is_some() {
            "WHERE borrowed_at >= $2 AND borrowed_at < $3"
        } else {
            ""
        };
        let query = format!(
            r#"
            SELECT TO_CHAR(borrowed_at, $1) as period, status, COUNT(*) as count
            FROM borrows
            {where_clause}
            GROUP BY period, status
            ORDER BY period ASC, status ASC
            "#,
        );

        let mut rows = sqlx::query(&query).bind(pattern);
        if let Some((start, end)) = window {
            rows = rows.bind(start).bind(end);
        }
        let rows = rows.fetch_all(&self.repository.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| HistogramEntry {
                period: row.get("period"),
                status: row.get("status"),
                count: row.get("count"),
            })
            .collect())
    }

    /// Most borrowed books of all time; ties break on the lower book
    /// ID so the ordering is stable.
    async fn popular_books(&self, limit: i64) -> AppResult<Vec<PopularBook>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id as book_id, b.title, b.level, COUNT(*) as borrow_count
            FROM borrows br
            JOIN books b ON br.book_id = b.id
            GROUP BY b.id, b.title, b.level
            ORDER BY borrow_count DESC, b.id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.repository.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PopularBook {
                book_id: row.get("book_id"),
                title: row.get("title"),
                level: row.get("level"),
                borrow_count: row.get("borrow_count"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn today_is_one_midnight_to_the_next() {
        let now = at("2026-03-15T14:30:00Z");
        let (start, end) = resolve_window("today", now).unwrap();
        assert_eq!(start, at("2026-03-15T00:00:00Z"));
        assert_eq!(end, at("2026-03-16T00:00:00Z"));
    }

    #[test]
    fn yesterday_ends_at_todays_midnight() {
        let now = at("2026-03-15T00:00:01Z");
        let (start, end) = resolve_window("yesterday", now).unwrap();
        assert_eq!(start, at("2026-03-14T00:00:00Z"));
        assert_eq!(end, at("2026-03-15T00:00:00Z"));
    }

    #[test]
    fn seven_day_window_spans_eight_days_through_today() {
        let now = at("2026-03-15T23:59:59Z");
        let (start, end) = resolve_window("7d", now).unwrap();
        assert_eq!(start, at("2026-03-08T00:00:00Z"));
        assert_eq!(end, at("2026-03-16T00:00:00Z"));
    }

    #[test]
    fn thirty_day_window_spans_31_midnights() {
        let now = at("2026-03-15T12:00:00Z");
        let (start, end) = resolve_window("30d", now).unwrap();
        assert_eq!(end - start, Duration::days(31));
    }

    #[test]
    fn all_range_is_unbounded() {
        assert!(resolve_window("all", Utc::now()).is_none());
    }

    #[test]
    fn unknown_ranges_get_one_day_ending_now() {
        let now = at("2026-03-15T08:00:00Z");
        let (start, end) = resolve_window("fortnight", now).unwrap();
        assert_eq!(end, now);
        assert_eq!(end - start, Duration::days(1));
    }
}
