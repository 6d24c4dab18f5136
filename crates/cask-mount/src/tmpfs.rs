//! tmpfs mount options.
//!
//! Every tmpfs starts from `noexec,nosuid,nodev`. User options are appended
//! and merged so that the last occurrence of each key wins: a flag such as
//! `exec` replaces its opposite `noexec`, and `size=64m` replaces an earlier
//! `size=...`.

use std::collections::HashSet;

use cask_common::{CaskError, CaskResult};

/// Options every tmpfs mount starts with.
pub const BASE_OPTIONS: [&str; 3] = ["noexec", "nosuid", "nodev"];

/// `key=value` options tmpfs understands.
const DATA_KEYS: [&str; 7] = ["size", "mode", "uid", "gid", "nr_inodes", "nr_blocks", "mpol"];

/// Mount flags paired with their negation. Both spellings share one key.
const FLAG_FAMILIES: [(&str, &str); 12] = [
    ("exec", "noexec"),
    ("suid", "nosuid"),
    ("dev", "nodev"),
    ("rw", "ro"),
    ("atime", "noatime"),
    ("diratime", "nodiratime"),
    ("relatime", "norelatime"),
    ("strictatime", "nostrictatime"),
    ("async", "sync"),
    ("nodirsync", "dirsync"),
    ("nomand", "mand"),
    ("nolazytime", "lazytime"),
];

fn option_key(option: &str) -> &str {
    if let Some((key, _)) = option.split_once('=') {
        return key;
    }
    FLAG_FAMILIES
        .iter()
        .find(|(on, off)| option == *on || option == *off)
        .map_or(option, |(on, _)| on)
}

fn validate(option: &str) -> CaskResult<()> {
    let invalid = |reason: &str| CaskError::invalid_argument(format!("invalid tmpfs option {option:?}: {reason}"));

    let Some((key, value)) = option.split_once('=') else {
        return Ok(());
    };
    if !DATA_KEYS.contains(&key) {
        return Err(invalid("unknown option"));
    }
    if value.is_empty() {
        return Err(invalid("missing value"));
    }

    match key {
        "size" => {
            let digits = value.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G', '%']);
            if digits.is_empty()
                || value.len() - digits.len() > 1
                || !digits.bytes().all(|b| b.is_ascii_digit())
            {
                return Err(invalid("expected a number with an optional k, m, g or % suffix"));
            }
        }
        "mode" => {
            if u32::from_str_radix(value, 8).is_err() {
                return Err(invalid("expected an octal mode"));
            }
        }
        "uid" | "gid" => {
            if value.parse::<u32>().is_err() {
                return Err(invalid("expected a numeric id"));
            }
        }
        "nr_inodes" | "nr_blocks" => {
            let digits = value.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("expected a number with an optional k, m or g suffix"));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Merge user options into the base set.
///
/// The result keeps the order of the surviving options. `defaults` and empty
/// entries are dropped.
///
/// # Errors
///
/// Returns [`CaskError::InvalidArgument`] for an unknown `key=value` option or
/// a malformed value.
pub fn merge_options<S: AsRef<str>>(user: &[S]) -> CaskResult<Vec<String>> {
    let combined: Vec<&str> = BASE_OPTIONS
        .iter()
        .copied()
        .chain(user.iter().map(|option| option.as_ref().trim()))
        .filter(|option| !option.is_empty() && *option != "defaults")
        .collect();

    for option in &combined {
        validate(option)?;
    }

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(combined.len());
    for option in combined.into_iter().rev() {
        if seen.insert(option_key(option)) {
            merged.push(option.to_string());
        }
    }
    merged.reverse();
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_set(options: &[String]) -> HashSet<&str> {
        options.iter().map(String::as_str).collect()
    }

    #[test]
    fn base_options_only() {
        let merged = merge_options::<&str>(&[]).unwrap();
        assert_eq!(merged, vec!["noexec", "nosuid", "nodev"]);
    }

    #[test]
    fn later_flag_overrides_base() {
        let merged = merge_options(&["size=64m", "exec"]).unwrap();
        assert_eq!(
            as_set(&merged),
            HashSet::from(["nosuid", "nodev", "size=64m", "exec"])
        );
    }

    #[test]
    fn later_data_key_wins() {
        let merged = merge_options(&["size=1g", "mode=1777", "size=10%", "defaults"]).unwrap();
        assert_eq!(merged, vec!["noexec", "nosuid", "nodev", "mode=1777", "size=10%"]);
    }

    #[test]
    fn rejects_bad_values() {
        for bad in [
            "size=lots",
            "size=10mm",
            "mode=999",
            "uid=root",
            "color=blue",
            "size=",
        ] {
            assert!(merge_options(&[bad]).is_err(), "{bad}");
        }
    }

    #[test]
    fn unknown_flags_pass_through() {
        let merged = merge_options(&["ro", "rw", "huge"]).unwrap();
        assert!(merged.contains(&"rw".to_string()));
        assert!(!merged.contains(&"ro".to_string()));
        assert!(merged.contains(&"huge".to_string()));
    }
}
