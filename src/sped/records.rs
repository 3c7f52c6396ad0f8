//! Reading EFD text back into records and checking its control counts.

use std::collections::BTreeMap;
use std::fmt;

/// Split EFD content into records, each a list of fields with the
/// register code first. Blank lines are skipped; empty fields are kept.
///
/// ```
/// use sped_audit::sped::parse_records;
///
/// let records = parse_records("|0001|0|\r\n|C190|000|5102|18,00|||\r\n");
/// assert_eq!(records[0], ["0001", "0"]);
/// assert_eq!(records[1].len(), 6);
/// ```
pub fn parse_records(content: &str) -> Vec<Vec<String>> {
    content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let inner = line.strip_prefix('|').unwrap_or(line);
            let inner = inner.strip_suffix('|').unwrap_or(inner);
            inner.split('|').map(String::from).collect()
        })
        .collect()
}

/// A control record whose declared value disagrees with the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMismatch {
    /// The control record, e.g. `C990` or `9900:C170`.
    pub control: String,
    pub declared: usize,
    pub actual: usize,
}

impl fmt::Display for ControlMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: declared {}, found {}",
            self.control, self.declared, self.actual
        )
    }
}

fn declared(record: &[String], index: usize) -> usize {
    record
        .get(index)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Check every record-count control line of an EFD file.
///
/// Verified: `C990` against the block-C record count, one `9900` per
/// register against its occurrences (and every register present must be
/// listed), `9990` against the block-9 records before `9999`, and `9999`
/// against the total record count. Returns all mismatches found.
pub fn verify_control_counts(content: &str) -> Result<(), Vec<ControlMismatch>> {
    let records = parse_records(content);
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in &records {
        if let Some(reg) = r.first() {
            *counts.entry(reg.as_str()).or_insert(0) += 1;
        }
    }
    let count = |reg: &str| counts.get(reg).copied().unwrap_or(0);

    let mut mismatches = Vec::new();
    let mut check = |control: String, declared: usize, actual: usize| {
        if declared != actual {
            mismatches.push(ControlMismatch {
                control,
                declared,
                actual,
            });
        }
    };

    let find = |reg: &str| records.iter().find(|r| r.first().map(String::as_str) == Some(reg));

    let block_c: usize = counts
        .iter()
        .filter(|(reg, _)| reg.starts_with('C'))
        .map(|(_, n)| *n)
        .sum();
    if block_c > 0 {
        check("C990".into(), find("C990").map(|r| declared(r, 1)).unwrap_or(0), block_c);
    }

    let mut listed: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records.iter().filter(|r| r.first().map(String::as_str) == Some("9900")) {
        let reg = r.get(1).map(String::as_str).unwrap_or("");
        listed.insert(reg, declared(r, 2));
    }
    for (reg, actual) in &counts {
        let declared = listed.get(reg).copied().unwrap_or(0);
        check(format!("9900:{reg}"), declared, *actual);
    }
    for (reg, declared) in &listed {
        if !counts.contains_key(reg) {
            check(format!("9900:{reg}"), *declared, 0);
        }
    }

    check(
        "9990".into(),
        find("9990").map(|r| declared(r, 1)).unwrap_or(0),
        count("9001") + count("9900") + count("9990"),
    );
    check(
        "9999".into(),
        find("9999").map(|r| declared(r, 1)).unwrap_or(0),
        records.len(),
    );

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(mismatches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "|0000|017|0|01032024|31032024|ACME|1||SP|||||A|1|\r\n\
|0001|0|\r\n\
|C001|1|\r\n\
|C990|2|\r\n\
|9001|0|\r\n\
|0990|2|\r\n\
|9900|0000|1|\r\n\
|9900|0001|1|\r\n\
|9900|0990|1|\r\n\
|9900|9001|1|\r\n\
|9900|9900|9|\r\n\
|9900|9990|1|\r\n\
|9900|9999|1|\r\n\
|9900|C001|1|\r\n\
|9900|C990|1|\r\n\
|9990|11|\r\n\
|9999|17|\r\n";

    #[test]
    fn minimal_file_verifies() {
        assert_eq!(verify_control_counts(MINIMAL), Ok(()));
    }

    #[test]
    fn tampered_total_is_reported() {
        let tampered = MINIMAL.replace("|9999|17|", "|9999|18|");
        let err = verify_control_counts(&tampered).unwrap_err();
        assert_eq!(
            err,
            vec![ControlMismatch {
                control: "9999".into(),
                declared: 18,
                actual: 17
            }]
        );
    }

    #[test]
    fn unlisted_register_is_reported() {
        let extra = MINIMAL.replace("|C990|2|\r\n", "|C100|1|\r\n|C990|3|\r\n");
        let err = verify_control_counts(&extra).unwrap_err();
        assert!(err.iter().any(|m| m.control == "9900:C100" && m.declared == 0));
    }

    #[test]
    fn empty_fields_survive_parsing() {
        let records = parse_records("|0000|017|0||x|\n\n|9999|2|");
        assert_eq!(records, vec![vec!["0000", "017", "0", "", "x"], vec!["9999", "2"]]);
    }
}
