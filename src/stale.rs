use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use chrono_humanize::{Accuracy, HumanTime, Tense};

use crate::types::PullRequest;

/// Label carried by update PRs, used by `close` when none is given.
pub const DEFAULT_STALE_LABEL: &str = "dependencies";

/// Comment left on a pull request before it is closed.
pub const CLOSE_COMMENT: &str = "Closed due to inactivity.";

/// Parses an age such as `720h`, `30d`, `2w` or `720h30m`.
///
/// Units are `s`, `m`, `h`, `d` and `w`. A bare number means hours. The
/// result must be positive.
pub fn parse_older_than(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim();
    if duration_str.is_empty() {
        bail!("Duration must not be empty");
    }

    if duration_str.chars().all(|c| c.is_ascii_digit()) {
        let hours: i64 = duration_str
            .parse()
            .with_context(|| format!("Invalid hours value in duration: '{}'", duration_str))?;
        return positive(Duration::try_hours(hours), duration_str);
    }

    let mut total = Duration::zero();
    let mut digits = String::new();

    for c in duration_str.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        if digits.is_empty() {
            bail!(
                "Invalid duration (expected format: 720h, 30d, 2w, 90m): '{}'",
                duration_str
            );
        }
        let value: i64 = digits
            .parse()
            .with_context(|| format!("Invalid number in duration: '{}'", duration_str))?;
        digits.clear();

        let part = match c {
            's' => Duration::try_seconds(value),
            'm' => Duration::try_minutes(value),
            'h' => Duration::try_hours(value),
            'd' => Duration::try_days(value),
            'w' => Duration::try_weeks(value),
            other => bail!("Unknown unit '{}' in duration: '{}'", other, duration_str),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .with_context(|| format!("Duration out of range: '{}'", duration_str))?;
    }

    if !digits.is_empty() {
        bail!("Missing unit after '{}' in duration: '{}'", digits, duration_str);
    }

    positive(Some(total), duration_str)
}

fn positive(duration: Option<Duration>, input: &str) -> Result<Duration> {
    match duration {
        Some(d) if d <= Duration::zero() => {
            bail!("Duration must be greater than zero: '{}'", input)
        }
        // The cutoff `now - d` must still be a representable time.
        Some(d) if Utc::now().checked_sub_signed(d).is_some() => Ok(d),
        _ => bail!("Duration out of range: '{}'", input),
    }
}

/// Open PRs carrying `label` (case-insensitive) created at or before
/// `now - older_than`, in input order. A cutoff before the earliest
/// representable time selects nothing.
pub fn select_stale(
    prs: Vec<PullRequest>,
    label: &str,
    older_than: Duration,
    now: DateTime<Utc>,
) -> Vec<PullRequest> {
    let Some(cutoff) = now.checked_sub_signed(older_than) else {
        return Vec::new();
    };

    prs.into_iter()
        .filter(|pr| pr.has_label(label))
        .filter(|pr| pr.created_at <= cutoff)
        .collect()
}

/// A duration spelled out, e.g. "4 weeks and 2 days".
pub fn describe_duration(duration: Duration) -> String {
    HumanTime::from(duration).to_text_en(Accuracy::Precise, Tense::Present)
}

/// Age relative to `now`, e.g. "2 months ago".
pub fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    HumanTime::from(created_at - now).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::types::{MergeState, Repo};

    fn pr(number: u64, labels: &[&str], created_at: DateTime<Utc>) -> PullRequest {
        PullRequest {
            repo: Repo::new("owner", "repo").unwrap(),
            number,
            node_id: format!("PR_{number}"),
            title: format!("Bump pkg{number} from 1 to 2"),
            url: format!("https://github.com/owner/repo/pull/{number}"),
            author_login: "dependabot[bot]".to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            created_at,
            merge_state: MergeState::Clean,
            review_decision: None,
            checks: vec![],
        }
    }

    #[test]
    fn test_parse_single_units() {
        assert_eq!(parse_older_than("90s").unwrap(), Duration::seconds(90));
        assert_eq!(parse_older_than("45m").unwrap(), Duration::minutes(45));
        assert_eq!(parse_older_than("720h").unwrap(), Duration::hours(720));
        assert_eq!(parse_older_than("30d").unwrap(), Duration::days(30));
        assert_eq!(parse_older_than("2w").unwrap(), Duration::weeks(2));
    }

    #[test]
    fn test_parse_bare_number_is_hours() {
        assert_eq!(parse_older_than("4320").unwrap(), Duration::hours(4320));
        assert_eq!(parse_older_than(" 24 ").unwrap(), Duration::hours(24));
    }

    #[test]
    fn test_parse_combined_units() {
        assert_eq!(
            parse_older_than("720h30m").unwrap(),
            Duration::hours(720) + Duration::minutes(30)
        );
        assert_eq!(parse_older_than("1w2d").unwrap(), Duration::days(9));
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_older_than("").is_err());
        assert!(parse_older_than("h").is_err());
        assert!(parse_older_than("10y").is_err());
        assert!(parse_older_than("10h5").is_err());
        assert!(parse_older_than("-5h").is_err());
        assert!(parse_older_than("0h").is_err());
        assert!(parse_older_than("0").is_err());
        assert!(parse_older_than("99999999999999999999h").is_err());
    }

    #[test]
    fn test_select_stale() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let prs = vec![
            pr(1, &["dependencies"], now - Duration::days(60)),
            pr(2, &["Dependencies", "go"], now - Duration::days(31)),
            pr(3, &["dependencies"], now - Duration::days(5)),
            pr(4, &["enhancement"], now - Duration::days(90)),
            pr(5, &["dependencies"], now - Duration::days(30)),
        ];

        let stale = select_stale(prs, DEFAULT_STALE_LABEL, Duration::days(30), now);
        let numbers: Vec<u64> = stale.iter().map(|pr| pr.number).collect();
        assert_eq!(numbers, vec![1, 2, 5]);
    }

    #[test]
    fn test_parse_rejects_cutoff_before_representable_time() {
        let err = parse_older_than("9999999999h").unwrap_err();
        assert!(err.to_string().contains("out of range"), "unexpected: {err}");
        assert!(parse_older_than("999999999w").is_err());
        assert!(parse_older_than("876000h").is_ok());
    }

    #[test]
    fn test_select_stale_with_unrepresentable_cutoff() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let prs = vec![pr(1, &["dependencies"], now - Duration::days(3650))];

        let huge = Duration::seconds(35_999_999_996_400);
        assert!(select_stale(prs, DEFAULT_STALE_LABEL, huge, now).is_empty());
    }

    #[test]
    fn test_describe_duration() {
        let described = describe_duration(Duration::days(30));
        assert!(described.contains("4 weeks"), "unexpected: {described}");
        assert!(described.contains("2 days"), "unexpected: {described}");
    }

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let age = format_age(now - Duration::days(60), now);
        assert!(age.contains("month"), "unexpected age: {age}");
        assert!(age.ends_with("ago"), "unexpected age: {age}");
    }
}
