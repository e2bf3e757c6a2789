//! Result assembly: raw rows from either path become the canonical
//! [`AttendanceResult`].

use crate::models::{AttendanceResult, ExtractedSubject, RawSubjectRow, StudentInfo, Subject};
use crate::status;
use chrono::Utc;

/// Keep only the rows of the last term name observed.
///
/// The subject endpoint returns all historical terms concatenated; treating
/// the last one as current is a policy choice, not a guarantee — the source
/// gives no explicit "current" flag and no ordering contract.
pub fn filter_current_term(rows: Vec<RawSubjectRow>) -> Vec<RawSubjectRow> {
    let mut terms: Vec<&str> = Vec::new();
    for row in &rows {
        if !terms.contains(&row.term_name.as_str()) {
            terms.push(row.term_name.as_str());
        }
    }
    let Some(current) = terms.last().map(|t| t.to_string()) else {
        return rows;
    };
    rows.into_iter().filter(|r| r.term_name == current).collect()
}

/// Map one ERP row to a domain subject. The string count fields win when they
/// parse; the numeric `stdAtt*` fields back them up.
pub fn subject_from_row(row: &RawSubjectRow, threshold: f64) -> Subject {
    let attended = count_of(row.present_count.as_deref(), row.std_att_present_count);
    let absent = count_of(row.absent_count.as_deref(), row.std_att_absent_count);
    let total = attended + absent;
    let percentage = status::percentage(attended, total);

    Subject {
        name: row.subject.clone(),
        code: row.subject_code.clone(),
        attended,
        total,
        percentage,
        status: status::status_for(percentage, threshold, total),
    }
}

pub fn subjects_from_rows(rows: &[RawSubjectRow], threshold: f64) -> Vec<Subject> {
    rows.iter().map(|r| subject_from_row(r, threshold)).collect()
}

/// Model-extracted rows: a subject with zero classes held carries no
/// percentage information, so such rows are dropped rather than shown.
pub fn subjects_from_extracted(rows: Vec<ExtractedSubject>, threshold: f64) -> Vec<Subject> {
    rows.into_iter()
        .filter(|r| r.total > 0)
        .map(|r| {
            let percentage = status::percentage(r.attended, r.total);
            Subject {
                status: status::status_for(percentage, threshold, r.total),
                name: r.name,
                code: r.code,
                attended: r.attended,
                total: r.total,
                percentage,
            }
        })
        .collect()
}

pub fn build_result(
    student: StudentInfo,
    subjects: Vec<Subject>,
    threshold: f64,
) -> AttendanceResult {
    AttendanceResult {
        student,
        subjects,
        last_updated: Utc::now(),
        threshold,
    }
}

fn count_of(text: Option<&str>, numeric: Option<i64>) -> u32 {
    text.and_then(|v| v.trim().parse::<u32>().ok())
        .or_else(|| numeric.and_then(|n| u32::try_from(n).ok()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    fn row(term: &str, present: &str, absent: &str) -> RawSubjectRow {
        RawSubjectRow {
            subject: "Maths".to_string(),
            subject_code: "MA101".to_string(),
            present_count: Some(present.to_string()),
            absent_count: Some(absent.to_string()),
            term_name: term.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter_keeps_last_term_only() {
        let rows = vec![
            row("2023-24 ODD", "10", "2"),
            row("2023-24 EVEN", "20", "4"),
            row("2024-25 ODD", "30", "6"),
            row("2024-25 ODD", "28", "2"),
        ];
        let kept = filter_current_term(rows);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.term_name == "2024-25 ODD"));
    }

    #[test]
    fn test_string_counts_win_over_numeric() {
        let mut r = row("t", "54", "6");
        r.std_att_present_count = Some(99);
        let s = subject_from_row(&r, 75.0);
        assert_eq!(s.attended, 54);
        assert_eq!(s.total, 60);
        assert_eq!(s.percentage, 90.0);
        assert_eq!(s.status, Status::Safe);
    }

    #[test]
    fn test_numeric_fallback_when_strings_unparseable() {
        let r = RawSubjectRow {
            subject: "Physics".to_string(),
            present_count: Some("N/A".to_string()),
            absent_count: None,
            std_att_present_count: Some(40),
            std_att_absent_count: Some(40),
            term_name: "t".to_string(),
            ..Default::default()
        };
        let s = subject_from_row(&r, 75.0);
        assert_eq!(s.attended, 40);
        assert_eq!(s.total, 80);
        assert_eq!(s.status, Status::Low);
    }

    #[test]
    fn test_zero_total_row_is_no_data() {
        let s = subject_from_row(&row("t", "0", "0"), 75.0);
        assert_eq!(s.total, 0);
        assert_eq!(s.percentage, 0.0);
        assert_eq!(s.status, Status::NoData);
    }

    #[test]
    fn test_extracted_rows_drop_zero_totals() {
        let rows = vec![
            ExtractedSubject {
                name: "Chemistry".to_string(),
                code: String::new(),
                attended: 57,
                total: 76,
            },
            ExtractedSubject {
                name: "Seminar".to_string(),
                code: String::new(),
                attended: 0,
                total: 0,
            },
        ];
        let subjects = subjects_from_extracted(rows, 75.0);
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].percentage, 75.0);
        assert_eq!(subjects[0].status, Status::Critical);
    }
}
