//! Report windows
//!
//! Spending reports aggregate over today / yesterday / this week / this
//! month, where "today" follows the configured local offset rather than
//! server UTC. Windows are half-open `[start, end)` in UTC so the store
//! can compare against `TIMESTAMPTZ` columns directly.

use chrono::{DateTime, Datelike, Duration, FixedOffset, TimeZone, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Today,
    Yesterday,
    Week,
    Month,
}

impl ReportPeriod {
    /// Parses the classifier's period token. Accepts Portuguese and English
    /// spellings; anything unrecognized falls back to the current month.
    pub fn parse(token: Option<&str>) -> Self {
        let token = match token {
            Some(t) => t.trim().to_lowercase(),
            None => return ReportPeriod::Month,
        };
        match token.as_str() {
            "today" | "hoje" | "dia" | "day" => ReportPeriod::Today,
            "yesterday" | "ontem" => ReportPeriod::Yesterday,
            "week" | "semana" | "essa semana" | "this week" => ReportPeriod::Week,
            _ => ReportPeriod::Month,
        }
    }

    /// Reply label, pt-BR.
    pub fn label(&self) -> &'static str {
        match self {
            ReportPeriod::Today => "hoje",
            ReportPeriod::Yesterday => "ontem",
            ReportPeriod::Week => "essa semana",
            ReportPeriod::Month => "esse mês",
        }
    }

    /// UTC window covering this period at `now`, seen from `offset`.
    /// Weeks start on Monday; month/week windows are clamped to `now` on
    /// the open end only in the sense that future spend cannot exist yet.
    pub fn window(&self, now: DateTime<Utc>, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_now = now.with_timezone(&offset);
        let today = local_now.date_naive();

        let (start_date, end_date) = match self {
            ReportPeriod::Today => (today, today + Duration::days(1)),
            ReportPeriod::Yesterday => (today - Duration::days(1), today),
            ReportPeriod::Week => {
                let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
                (monday, monday + Duration::days(7))
            }
            ReportPeriod::Month => {
                let first = today.with_day(1).unwrap_or(today);
                let next_first = if first.month() == 12 {
                    first
                        .with_year(first.year() + 1)
                        .and_then(|d| d.with_month(1))
                } else {
                    first.with_month(first.month() + 1)
                }
                .unwrap_or(first + Duration::days(31));
                (first, next_first)
            }
        };

        let to_utc = |date: chrono::NaiveDate| {
            offset
                .from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now)
        };

        (to_utc(start_date), to_utc(end_date))
    }
}

/// Portuguese month name for the local date at `now`; the default token for
/// bill listings when the utterance names no month.
pub fn current_month_name(now: DateTime<Utc>, offset: FixedOffset) -> &'static str {
    const MONTHS: [&str; 12] = [
        "janeiro",
        "fevereiro",
        "março",
        "abril",
        "maio",
        "junho",
        "julho",
        "agosto",
        "setembro",
        "outubro",
        "novembro",
        "dezembro",
    ];
    let month = now.with_timezone(&offset).month() as usize;
    MONTHS[month - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).expect("valid offset")
    }

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(ReportPeriod::parse(Some("hoje")), ReportPeriod::Today);
        assert_eq!(ReportPeriod::parse(Some("ONTEM")), ReportPeriod::Yesterday);
        assert_eq!(ReportPeriod::parse(Some("semana")), ReportPeriod::Week);
        assert_eq!(ReportPeriod::parse(Some("month")), ReportPeriod::Month);
        assert_eq!(ReportPeriod::parse(None), ReportPeriod::Month);
        assert_eq!(ReportPeriod::parse(Some("whatever")), ReportPeriod::Month);
    }

    #[test]
    fn test_today_window_respects_offset() {
        // 01:30 UTC on June 10 is still June 9 at UTC-3.
        let now = at(2025, 6, 10, 1);
        let (start, end) = ReportPeriod::Today.window(now, offset());
        assert_eq!(start, at(2025, 6, 9, 3));
        assert_eq!(end, at(2025, 6, 10, 3));
    }

    #[test]
    fn test_yesterday_precedes_today() {
        let now = at(2025, 6, 10, 15);
        let (y_start, y_end) = ReportPeriod::Yesterday.window(now, offset());
        let (t_start, _) = ReportPeriod::Today.window(now, offset());
        assert_eq!(y_end, t_start);
        assert_eq!(y_end - y_start, Duration::days(1));
    }

    #[test]
    fn test_week_starts_monday() {
        // 2025-06-12 is a Thursday.
        let now = at(2025, 6, 12, 15);
        let (start, end) = ReportPeriod::Week.window(now, offset());
        // Monday 2025-06-09 00:00 local = 03:00 UTC.
        assert_eq!(start, at(2025, 6, 9, 3));
        assert_eq!(end - start, Duration::days(7));
    }

    #[test]
    fn test_month_window_crosses_year() {
        let now = at(2025, 12, 15, 12);
        let (start, end) = ReportPeriod::Month.window(now, offset());
        assert_eq!(start, at(2025, 12, 1, 3));
        assert_eq!(end, at(2026, 1, 1, 3));
    }

    #[test]
    fn test_current_month_name_uses_local_date() {
        // 01:00 UTC on July 1 is June 30 at UTC-3.
        assert_eq!(current_month_name(at(2025, 7, 1, 1), offset()), "junho");
        assert_eq!(current_month_name(at(2025, 7, 1, 12), offset()), "julho");
    }
}
