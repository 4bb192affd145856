//! Parser for the `/proc/<pid>/maps` text format.

use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::error::ProcessError;
use crate::memory::{MemoryRegion, Protection};

const MAPS_LINE: &str =
    r"^([0-9a-fA-F]+)-([0-9a-fA-F]+)\s+([r-])([w-])([x-])[ps]\s+([0-9a-fA-F]+)\s+\S+\s+\d+\s*(.*)$";

fn maps_line() -> Result<&'static Regex, ProcessError> {
    static RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MAPS_LINE))
        .as_ref()
        .map_err(|e| ProcessError::InvalidPattern {
            what: "maps line",
            detail: e.to_string(),
        })
}

/// Parse maps content into regions, in file order.
///
/// Lines that do not match the expected shape are skipped.
pub fn parse_maps(content: &str) -> Result<Vec<MemoryRegion>, ProcessError> {
    let re = maps_line()?;
    Ok(content
        .lines()
        .filter_map(|line| {
            let region = parse_line(re, line);
            if region.is_none() && !line.trim().is_empty() {
                trace!(line, "skipping unparsable maps line");
            }
            region
        })
        .collect())
}

fn parse_line(re: &Regex, line: &str) -> Option<MemoryRegion> {
    let caps = re.captures(line)?;
    let start = u64::from_str_radix(&caps[1], 16).ok()?;
    let end = u64::from_str_radix(&caps[2], 16).ok()?;
    let offset = u64::from_str_radix(&caps[6], 16).ok()?;
    let protection = Protection::new(&caps[3] == "r", &caps[4] == "w", &caps[5] == "x");
    Some(MemoryRegion {
        start,
        end,
        offset,
        protection,
        name: caps[7].trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
00400000-00452000 r-xp 00000000 08:02 173521      /usr/bin/dbus-daemon
00651000-00652000 r--p 00051000 08:02 173521      /usr/bin/dbus-daemon
00e03000-00e24000 rw-p 00000000 00:00 0           [heap]
7ffd3e1b4000-7ffd3e1d5000 rw-p 00000000 00:00 0
ffffffffff600000-ffffffffff601000 --xp 00000000 00:00 0   [vsyscall]
";

    #[test]
    fn parses_all_lines() {
        let regions = parse_maps(SAMPLE).unwrap();
        assert_eq!(regions.len(), 5);
    }

    #[test]
    fn parses_fields() {
        let regions = parse_maps(SAMPLE).unwrap();
        let text = &regions[0];
        assert_eq!(text.start, 0x400000);
        assert_eq!(text.end, 0x452000);
        assert_eq!(text.protection, Protection::new(true, false, true));
        assert_eq!(text.name, "/usr/bin/dbus-daemon");

        let ro = &regions[1];
        assert_eq!(ro.offset, 0x51000);
        assert!(!ro.protection.write);

        assert_eq!(regions[2].name, "[heap]");
        assert_eq!(regions[2].protection, Protection::read_write());
    }

    #[test]
    fn anonymous_regions_have_empty_names() {
        let regions = parse_maps(SAMPLE).unwrap();
        assert_eq!(regions[3].name, "");
        assert_eq!(regions[3].start, 0x7ffd3e1b4000);
    }

    #[test]
    fn unreadable_region_is_flagged() {
        let regions = parse_maps(SAMPLE).unwrap();
        assert!(!regions[4].is_readable());
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let regions = parse_maps("not a maps line\n\n00001000-00002000 rw-s 00000000 00:05 12 /dev/zero\n").unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].name, "/dev/zero");
    }

    #[test]
    fn maps_pattern_compiles() {
        assert!(maps_line().is_ok());
    }
}
