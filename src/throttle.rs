use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use crate::types::PullRequest;

/// Reports whether `comment` was already posted on the pull request
/// within `window` of now.
///
/// Only comments present in the fetched snapshot are considered. A
/// window of zero or less disables throttling.
pub fn is_throttled(pr: &PullRequest, comment: &str, window: TimeDelta) -> bool {
    is_throttled_at(pr, comment, window, Utc::now())
}

/// [`is_throttled`] evaluated at a fixed instant.
///
/// Bodies are compared after trimming surrounding whitespace. Comments
/// whose timestamp does not parse as RFC 3339 are skipped.
pub fn is_throttled_at(
    pr: &PullRequest,
    comment: &str,
    window: TimeDelta,
    now: DateTime<Utc>,
) -> bool {
    if window <= TimeDelta::zero() {
        return false;
    }

    let cutoff = now - window;
    let wanted = comment.trim();

    for prior in &pr.comments {
        if prior.body.trim() != wanted {
            continue;
        }

        let created_at = match DateTime::parse_from_rfc3339(&prior.created_at) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                trace!(
                    pr_number = pr.number,
                    created_at = %prior.created_at,
                    error = %e,
                    "Skipping comment with unparsable timestamp"
                );
                continue;
            }
        };

        if created_at > cutoff {
            debug!(
                repo = %pr.repo,
                pr_number = pr.number,
                author = %prior.author_login,
                %created_at,
                comment = wanted,
                "Throttled: identical comment posted recently"
            );
            return true;
        }
    }

    false
}

/// Parses a throttle window such as `30s`, `5m` or `2h`. A unitless
/// number is taken as minutes.
pub fn parse_throttle_duration(throttle_str: &str) -> Result<TimeDelta> {
    let throttle_str = throttle_str.trim();

    if let Ok(minutes) = throttle_str.parse::<i64>() {
        return TimeDelta::try_minutes(minutes)
            .with_context(|| format!("Throttle duration out of range: '{throttle_str}'"));
    }

    let (number, seconds_per_unit) = if let Some(seconds) = throttle_str.strip_suffix('s') {
        (seconds, 1)
    } else if let Some(minutes) = throttle_str.strip_suffix('m') {
        (minutes, 60)
    } else if let Some(hours) = throttle_str.strip_suffix('h') {
        (hours, 3600)
    } else {
        anyhow::bail!(
            "Invalid throttle format '{throttle_str}'. Supported formats: unitless number (minutes), '30s', '5m', '2h'"
        );
    };

    let value: i64 = number
        .trim()
        .parse()
        .with_context(|| format!("Invalid throttle duration: '{throttle_str}'"))?;

    value
        .checked_mul(seconds_per_unit)
        .and_then(TimeDelta::try_seconds)
        .with_context(|| format!("Throttle duration out of range: '{throttle_str}'"))
}
