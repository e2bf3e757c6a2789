//! Pure attendance math: percentage, status classification and the two
//! planning numbers (classes that can be missed / must be attended).

use crate::models::Status;

/// Margin above the threshold before a subject counts as safe.
pub const SAFE_BUFFER: f64 = 5.0;

/// Attendance percentage rounded to two decimals. Zero when no classes were
/// held.
pub fn percentage(attended: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (attended as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Classify a percentage against the threshold.
///
/// `NoData` applies only when no classes were held — a 0% over real classes
/// is `Low`, not missing data.
pub fn status_for(percentage: f64, threshold: f64, total: u32) -> Status {
    if total == 0 {
        Status::NoData
    } else if percentage >= threshold + SAFE_BUFFER {
        Status::Safe
    } else if percentage >= threshold {
        Status::Critical
    } else {
        Status::Low
    }
}

/// Largest number of future classes that can be missed while attendance stays
/// at or above the threshold.
///
/// attended / (total + x) >= threshold/100  ⇒  x <= attended·100/threshold − total
pub fn classes_to_bunk(attended: u32, total: u32, threshold: f64) -> u32 {
    if threshold <= 0.0 {
        return u32::MAX;
    }
    let can_bunk = (attended as f64 * 100.0 / threshold - total as f64).floor();
    can_bunk.max(0.0) as u32
}

/// Number of consecutive classes that must be attended to reach the
/// threshold. `None` when the threshold is 100% or more — unattainable once
/// a single class was missed, and the formula would divide by zero.
pub fn classes_needed_to_attend(attended: u32, total: u32, threshold: f64) -> Option<u32> {
    if threshold >= 100.0 {
        return None;
    }
    // (attended + x) / (total + x) >= threshold/100
    //   ⇒  x >= (total·threshold − attended·100) / (100 − threshold)
    let needed =
        ((total as f64 * threshold - attended as f64 * 100.0) / (100.0 - threshold)).ceil();
    Some(needed.max(0.0) as u32)
}
