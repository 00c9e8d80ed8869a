// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Grouping keys used by the request aggregator: column-set signatures and
//! UTC time truncation.

use std::hash::Hasher;
use std::time::{SystemTime, UNIX_EPOCH};

use derive_more::Display;
use fnv::FnvHasher;

use crate::constants::{MILLIS_PER_DAY, MILLIS_PER_HOUR, SIGNATURE_SEPARATOR};

/// Width of the window a timestamp is truncated to.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum TimeGranularity {
    #[display("Hour")]
    Hour,
    #[display("Day")]
    Day,
}

/// Current wall clock time in epoch milliseconds.
pub fn current_time_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}

/// Truncates an epoch millisecond timestamp to the start of its UTC hour or day.
///
/// Epoch time has no leap seconds, so both windows are fixed-width and the
/// truncation is plain floor arithmetic. Pre-epoch timestamps floor toward
/// negative infinity, so the result is never later than the input.
///
/// # Examples
///
/// ```
/// use profile_actor::util::{truncate_time_ms, TimeGranularity};
///
/// // 2023-02-21T23:27:55.123Z
/// let t = 1_677_022_075_123;
/// assert_eq!(truncate_time_ms(t, TimeGranularity::Hour), 1_677_020_400_000);
/// assert_eq!(truncate_time_ms(t, TimeGranularity::Day), 1_676_937_600_000);
/// ```
pub fn truncate_time_ms(timestamp_ms: i64, granularity: TimeGranularity) -> i64 {
    let window = match granularity {
        TimeGranularity::Hour => MILLIS_PER_HOUR,
        TimeGranularity::Day => MILLIS_PER_DAY,
    };
    timestamp_ms - timestamp_ms.rem_euclid(window)
}

/// Order-invariant signature of a set of column names.
///
/// Names are sorted and joined before hashing with FNV-1a, so the same set
/// yields the same signature regardless of the order it arrives in. Only an
/// equality shortcut: callers that merge on it confirm the sets match.
pub fn signature<S: AsRef<str>>(column_names: &[S]) -> u64 {
    let mut names: Vec<&str> = column_names.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();

    let mut hasher = FnvHasher::default();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            let mut buf = [0; 4];
            hasher.write(SIGNATURE_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.write(name.as_bytes());
    }
    hasher.finish()
}
