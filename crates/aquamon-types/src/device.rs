//! Device identifier ordering.
//!
//! Device ids usually look like `tank-2` or `sensor10`: an alphabetic prefix
//! followed by a unit number. Plain string ordering puts `tank-10` before
//! `tank-2`, so ids are compared by prefix first and then by the numeric
//! suffix as a number.

use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Split an id into its prefix and trailing number, if any.
///
/// ```
/// use aquamon_types::device::split_numeric_suffix;
///
/// assert_eq!(split_numeric_suffix("tank-10"), ("tank-", Some(10)));
/// assert_eq!(split_numeric_suffix("pond"), ("pond", None));
/// ```
#[must_use]
pub fn split_numeric_suffix(id: &str) -> (&str, Option<u64>) {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    match digits_start {
        Some(start) => match id[start..].parse::<u64>() {
            Ok(n) => (&id[..start], Some(n)),
            Err(_) => (id, None),
        },
        None => (id, None),
    }
}

/// Compare two device ids by (prefix, numeric suffix, full id).
#[must_use]
pub fn compare_device_ids(a: &str, b: &str) -> Ordering {
    let (prefix_a, num_a) = split_numeric_suffix(a);
    let (prefix_b, num_b) = split_numeric_suffix(b);

    prefix_a
        .to_lowercase()
        .cmp(&prefix_b.to_lowercase())
        .then_with(|| num_a.cmp(&num_b))
        .then_with(|| a.cmp(b))
}

/// Deduplicate and sort device ids for selection lists.
///
/// ```
/// use aquamon_types::sorted_devices;
///
/// let devices = sorted_devices(["tank-2", "tank-10", "pond-1", "tank-2"]);
/// assert_eq!(devices, vec!["pond-1", "tank-2", "tank-10"]);
/// ```
#[must_use]
pub fn sorted_devices<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<String> = ids.into_iter().map(|s| s.as_ref().to_string()).collect();
    let mut devices: Vec<String> = unique.into_iter().collect();
    devices.sort_by(|a, b| compare_device_ids(a, b));
    devices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_numeric_suffix() {
        assert_eq!(split_numeric_suffix("sensor-2"), ("sensor-", Some(2)));
        assert_eq!(split_numeric_suffix("sensor10"), ("sensor", Some(10)));
        assert_eq!(split_numeric_suffix("42"), ("", Some(42)));
        assert_eq!(split_numeric_suffix(""), ("", None));
        assert_eq!(split_numeric_suffix("a1b"), ("a1b", None));
    }

    #[test]
    fn test_split_numeric_suffix_overflow_keeps_whole_id() {
        let id = "tank-99999999999999999999999";
        assert_eq!(split_numeric_suffix(id), (id, None));
    }

    #[test]
    fn test_numeric_suffix_sorts_numerically() {
        let devices = sorted_devices(["sensor-10", "sensor-2", "sensor-1"]);
        assert_eq!(devices, vec!["sensor-1", "sensor-2", "sensor-10"]);
    }

    #[test]
    fn test_mixed_prefixes() {
        let devices = sorted_devices(["tank-2", "tank-10", "pond-1"]);
        assert_eq!(devices, vec!["pond-1", "tank-2", "tank-10"]);
    }

    #[test]
    fn test_ids_without_suffix_sort_first_within_prefix() {
        let devices = sorted_devices(["tank-3", "tank-", "Tank-1"]);
        assert_eq!(devices, vec!["tank-", "Tank-1", "tank-3"]);
    }

    #[test]
    fn test_dedup_and_empty_id() {
        let devices = sorted_devices(["b", "", "a", "b", ""]);
        assert_eq!(devices, vec!["", "a", "b"]);
    }
}
