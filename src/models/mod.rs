use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Attendance status ─────────────────────────────────────────────────────────

/// Where a subject sits relative to the attendance threshold.
///
/// Always recomputable from `(percentage, total, threshold)` — see
/// [`crate::status::status_for`]. Never an independent source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Safe,
    Critical,
    Low,
    NoData,
}

// ── Engine output ─────────────────────────────────────────────────────────────

/// One course's attendance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    /// Stable identifier from the ERP; may be empty.
    pub code: String,
    pub attended: u32,
    pub total: u32,
    pub percentage: f64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub name: String,
    pub usn: String,
}

impl Default for StudentInfo {
    fn default() -> Self {
        // Absence of either field is not an error — placeholders stand in.
        Self {
            name: "Student".to_string(),
            usn: String::new(),
        }
    }
}

/// The unit of output of one successful scrape. Immutable once built;
/// ownership passes entirely to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceResult {
    pub student: StudentInfo,
    pub subjects: Vec<Subject>,
    pub last_updated: DateTime<Utc>,
    pub threshold: f64,
}

/// The `{success, data?, error?}` shape handed to the HTTP-handler layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<AttendanceResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn ok(data: AttendanceResult) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ── Detected login form ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMethod {
    Get,
    Post,
}

/// Transient product of the login-form detector; lives for a single
/// authentication attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedForm {
    /// Absolute submission URL.
    pub action: String,
    pub method: FormMethod,
    pub username_field: String,
    pub password_field: String,
    /// Hidden inputs (CSRF tokens, view-state), forwarded verbatim in
    /// document order.
    pub hidden_fields: Vec<(String, String)>,
}

// ── Raw ERP responses (fast path) ─────────────────────────────────────────────

/// One row of the known ERP family's subject-attendance JSON. The schema is
/// inconsistent across deployments: counts arrive as strings in some and only
/// as the `stdAtt*` numeric fields in others, so both are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSubjectRow {
    #[serde(default)]
    pub subject: String,
    #[serde(rename = "subjectCode", default)]
    pub subject_code: String,
    #[serde(rename = "presentCount", default)]
    pub present_count: Option<String>,
    #[serde(rename = "absentCount", default)]
    pub absent_count: Option<String>,
    #[serde(rename = "stdAttPresentCount", default)]
    pub std_att_present_count: Option<i64>,
    #[serde(rename = "stdAttAbsentCount", default)]
    pub std_att_absent_count: Option<i64>,
    #[serde(rename = "termName", default)]
    pub term_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcademicInfo {
    #[serde(rename = "rollNo", default)]
    pub roll_no: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcademicInfoResponse {
    #[serde(rename = "hasAcademicInfo", default)]
    pub has_academic_info: bool,
    #[serde(rename = "AcademicInfo", default)]
    pub academic_info: Option<AcademicInfo>,
}

// ── Model-extracted rows (generic path) ───────────────────────────────────────

/// A subject row recovered from arbitrary HTML by the content-extraction
/// model, after count coercion. Rows with `total == 0` are dropped before
/// assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedSubject {
    pub name: String,
    pub code: String,
    pub attended: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization_shape() {
        let result = AttendanceResult {
            student: StudentInfo::default(),
            subjects: vec![],
            last_updated: Utc::now(),
            threshold: 75.0,
        };
        let json = serde_json::to_string(&FetchOutcome::ok(result)).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"lastUpdated\""));
        assert!(!json.contains("\"error\""));

        let json = serde_json::to_string(&FetchOutcome::err("nope")).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Status::NoData).unwrap(), "\"no_data\"");
        assert_eq!(serde_json::to_string(&Status::Safe).unwrap(), "\"safe\"");
    }

    #[test]
    fn test_raw_row_tolerates_missing_fields() {
        let row: RawSubjectRow = serde_json::from_str(
            r#"{"subject":"Maths","termName":"SEM 3","stdAttPresentCount":12}"#,
        )
        .unwrap();
        assert_eq!(row.subject, "Maths");
        assert_eq!(row.present_count, None);
        assert_eq!(row.std_att_present_count, Some(12));
    }
}
