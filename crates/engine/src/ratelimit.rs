//! Per-campaign connection-request rate limiting.
//!
//! A pure decision function over the campaign's counters. It never
//! throws and never writes; callers persist the returned counter patch
//! (resets merged with any increment into a single write, so a reset can
//! never be lost to a concurrent increment).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::models::Campaign;

/// Daily/weekly ceilings for `send_connection_request`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub daily: u32,
    pub weekly: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self { daily: 60, weekly: 200 }
    }
}

impl RateLimits {
    /// Read `DAILY_LIMIT` / `WEEKLY_LIMIT` from the environment, keeping
    /// the defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let parse = |name: &str, fallback: u32| {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };
        Self {
            daily: parse("DAILY_LIMIT", defaults.daily),
            weekly: parse("WEEKLY_LIMIT", defaults.weekly),
        }
    }
}

/// Campaign-counter changes that must be persisted in one write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterPatch {
    pub requests_sent_this_day: Option<i32>,
    pub requests_sent_this_week: Option<i32>,
    pub last_daily_requests_reset: Option<DateTime<Utc>>,
    pub last_weekly_requests_reset: Option<DateTime<Utc>>,
}

impl CounterPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of the rate-limit gate.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub can_proceed: bool,
    /// How long to defer when `can_proceed` is false.
    pub wait: Option<chrono::Duration>,
    /// Effective counters after any boundary reset.
    pub requests_sent_this_day: i32,
    pub requests_sent_this_week: i32,
    /// Reset updates to persist regardless of the verdict.
    pub patch: CounterPatch,
}

impl RateDecision {
    /// Fold the "one more request was sent" increment into the reset
    /// patch, producing the single write to persist on success.
    pub fn patch_with_increment(&self) -> CounterPatch {
        let mut patch = self.patch.clone();
        patch.requests_sent_this_day = Some(self.requests_sent_this_day + 1);
        patch.requests_sent_this_week = Some(self.requests_sent_this_week + 1);
        patch
    }
}

/// Decide whether the campaign may send a connection request at `now`.
///
/// Boundary detection and the next-reset instants are computed in `now`'s
/// time zone; production passes `Local::now()`.
pub fn check<Tz: TimeZone>(campaign: &Campaign, limits: &RateLimits, now: DateTime<Tz>) -> RateDecision {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);

    let mut day_count = campaign.requests_sent_this_day;
    let mut week_count = campaign.requests_sent_this_week;
    let mut patch = CounterPatch::default();

    let day_reset_due = match campaign.last_daily_requests_reset {
        None => true,
        Some(last) => clock::crossed_day_boundary(&last.with_timezone(&tz), &now),
    };
    if day_reset_due {
        day_count = 0;
        patch.requests_sent_this_day = Some(0);
        patch.last_daily_requests_reset = Some(now_utc);
    }

    let week_reset_due = match campaign.last_weekly_requests_reset {
        None => true,
        Some(last) => clock::crossed_week_boundary(&last.with_timezone(&tz), &now),
    };
    if week_reset_due {
        week_count = 0;
        patch.requests_sent_this_week = Some(0);
        patch.last_weekly_requests_reset = Some(now_utc);
    }

    let daily_exhausted = day_count >= limits.daily as i32;
    let weekly_exhausted = week_count >= limits.weekly as i32;

    let wait = if daily_exhausted || weekly_exhausted {
        let mut until = None::<DateTime<Tz>>;
        if daily_exhausted {
            until = Some(clock::next_midnight(&now));
        }
        if weekly_exhausted {
            let week_reset = clock::next_week_start(&now);
            until = Some(match until {
                Some(day_reset) if day_reset > week_reset => day_reset,
                _ => week_reset,
            });
        }
        until.map(|u| u - now)
    } else {
        None
    };

    RateDecision {
        can_proceed: wait.is_none(),
        wait,
        requests_sent_this_day: day_count,
        requests_sent_this_week: week_count,
        patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowDefinition;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn campaign(day: i32, week: i32, last_daily: Option<DateTime<Utc>>, last_weekly: Option<DateTime<Utc>>) -> Campaign {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap();
        Campaign {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            connected_account_id: Uuid::new_v4(),
            prospect_list_id: Some("list".into()),
            name: "test".into(),
            workflow: WorkflowDefinition::default(),
            status: crate::models::CampaignStatus::InProgress,
            start_date: None,
            leads_per_day: 10,
            requests_sent_this_day: day,
            requests_sent_this_week: week,
            last_daily_requests_reset: last_daily,
            last_weekly_requests_reset: last_weekly,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn under_the_limits_proceeds_without_patch() {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2025, 3, 12, 1, 0, 0).unwrap();
        let c = campaign(3, 30, Some(earlier), Some(earlier));
        let decision = check(&c, &RateLimits::default(), now);
        assert!(decision.can_proceed);
        assert!(decision.patch.is_empty());
        assert_eq!(decision.requests_sent_this_day, 3);
    }

    #[test]
    fn day_boundary_zeroes_the_daily_counter() {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 0, 5, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2025, 3, 11, 23, 0, 0).unwrap();
        let c = campaign(60, 61, Some(yesterday), Some(yesterday));
        let decision = check(&c, &RateLimits::default(), now);
        assert!(decision.can_proceed);
        assert_eq!(decision.requests_sent_this_day, 0);
        assert_eq!(decision.patch.requests_sent_this_day, Some(0));
        assert_eq!(decision.patch.last_daily_requests_reset, Some(now));
        // Weekly counter untouched mid-week.
        assert_eq!(decision.requests_sent_this_week, 61);
        assert_eq!(decision.patch.requests_sent_this_week, None);
    }

    #[test]
    fn missing_reset_timestamps_count_as_due() {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap();
        let c = campaign(59, 199, None, None);
        let decision = check(&c, &RateLimits::default(), now);
        assert!(decision.can_proceed);
        assert_eq!(decision.requests_sent_this_day, 0);
        assert_eq!(decision.requests_sent_this_week, 0);
    }

    #[test]
    fn daily_limit_defers_to_next_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2025, 3, 12, 1, 0, 0).unwrap();
        let c = campaign(1, 5, Some(earlier), Some(earlier));
        let limits = RateLimits { daily: 1, weekly: 200 };
        let decision = check(&c, &limits, now);
        assert!(!decision.can_proceed);
        let expected = Utc.with_ymd_and_hms(2025, 3, 13, 0, 0, 0).unwrap() - now;
        assert_eq!(decision.wait, Some(expected));
    }

    #[test]
    fn weekly_limit_wins_when_it_resets_later() {
        // Wednesday; both limits exhausted. The weekly reset (Monday) is
        // further out than the daily one (tomorrow), so it wins.
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2025, 3, 12, 1, 0, 0).unwrap();
        let c = campaign(60, 200, Some(earlier), Some(earlier));
        let decision = check(&c, &RateLimits::default(), now);
        assert!(!decision.can_proceed);
        let expected = Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap() - now;
        assert_eq!(decision.wait, Some(expected));
    }

    #[test]
    fn increment_merges_into_the_reset_patch() {
        let now = Utc.with_ymd_and_hms(2025, 3, 12, 0, 5, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2025, 3, 11, 23, 0, 0).unwrap();
        let c = campaign(60, 70, Some(yesterday), Some(yesterday));
        let decision = check(&c, &RateLimits::default(), now);
        let patch = decision.patch_with_increment();
        // Reset-to-zero and the new send collapse into one write.
        assert_eq!(patch.requests_sent_this_day, Some(1));
        assert_eq!(patch.requests_sent_this_week, Some(71));
        assert_eq!(patch.last_daily_requests_reset, Some(now));
    }
}
