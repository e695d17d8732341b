//! Validation of `schedules.json`

use crate::error::{CoreError, CoreResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

/// File name of the schedules definition inside a project
pub const SCHEDULES_FILE: &str = "schedules.json";

/// Who to notify, and when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub on_success: bool,
    #[serde(default)]
    pub on_failure: bool,
}

/// Which actions a schedule runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOptions {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub include_dependencies: bool,
    #[serde(default)]
    pub full_refresh: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cron: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ScheduleOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

/// Contents of `schedules.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulesJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_notification: Option<Notification>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
}

impl SchedulesJson {
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(|e| CoreError::SchedulesParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Every problem with the schedules, in file order. Empty means valid.
pub fn validate_schedules(schedules: &SchedulesJson) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(notification) = &schedules.default_notification {
        check_emails(notification, &mut errors);
    }

    let mut names: HashSet<&str> = HashSet::new();
    for schedule in &schedules.schedules {
        if schedule.name.is_empty() {
            errors.push("schedule name is required".to_string());
        }
        if !names.insert(schedule.name.as_str()) {
            errors.push(format!(
                "{} is not unique. All the schedules name should be unique.",
                schedule.name
            ));
        }

        if schedule.cron.trim().is_empty() {
            errors.push("cron expression is required".to_string());
        } else if !is_valid_cron(&schedule.cron) {
            errors.push(format!("{} is not a valid cron expression", schedule.cron));
        }

        if let Some(notification) = &schedule.notification {
            check_emails(notification, &mut errors);
        }
    }
    errors
}

fn check_emails(notification: &Notification, errors: &mut Vec<String>) {
    for email in &notification.emails {
        if !is_valid_email(email) {
            errors.push(format!("{} is not a valid email address", email));
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE
        .get_or_init(|| {
            Regex::new(
                r#"(?i)^(([^<>()\[\]\.,;:\s@"]+(\.[^<>()\[\]\.,;:\s@"]+)*)|(".+"))@(([^<>()\[\]\.,;:\s@"]+\.)+[^<>()\[\]\.,;:\s@"]{2,})$"#,
            )
            .expect("valid regex")
        })
        .is_match(email)
}

/// One cron field: its bounds and optional symbolic names
struct CronField {
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Offset of `names[0]`
    name_base: u32,
    allow_question: bool,
}

const MONTH_NAMES: &[&str] = &[
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAY_NAMES: &[&str] = &["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

const SECOND: CronField = CronField { min: 0, max: 59, names: &[], name_base: 0, allow_question: false };
const MINUTE: CronField = CronField { min: 0, max: 59, names: &[], name_base: 0, allow_question: false };
const HOUR: CronField = CronField { min: 0, max: 23, names: &[], name_base: 0, allow_question: false };
const DAY_OF_MONTH: CronField = CronField { min: 1, max: 31, names: &[], name_base: 0, allow_question: true };
const MONTH: CronField = CronField { min: 1, max: 12, names: MONTH_NAMES, name_base: 1, allow_question: false };
const DAY_OF_WEEK: CronField = CronField { min: 0, max: 7, names: DAY_NAMES, name_base: 0, allow_question: true };

const MACROS: &[&str] = &[
    "@yearly", "@annually", "@monthly", "@weekly", "@daily", "@midnight", "@hourly",
];

/// Accepts five-field and six-field (leading seconds) expressions and the
/// `@daily` style macros.
pub fn is_valid_cron(expression: &str) -> bool {
    let expression = expression.trim();
    if expression.starts_with('@') {
        return MACROS.contains(&expression.to_ascii_lowercase().as_str());
    }
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let layout: &[&CronField] = match fields.len() {
        5 => &[&MINUTE, &HOUR, &DAY_OF_MONTH, &MONTH, &DAY_OF_WEEK],
        6 => &[&SECOND, &MINUTE, &HOUR, &DAY_OF_MONTH, &MONTH, &DAY_OF_WEEK],
        _ => return false,
    };
    fields
        .iter()
        .zip(layout)
        .all(|(text, field)| field_is_valid(text, field))
}

fn field_is_valid(text: &str, field: &CronField) -> bool {
    static ITEM_RE: OnceLock<Regex> = OnceLock::new();
    let item_re = ITEM_RE.get_or_init(|| {
        Regex::new(r"^(?:(\*)|([A-Za-z0-9]+)(?:-([A-Za-z0-9]+))?)(?:/(\d+))?$").expect("valid regex")
    });

    if text == "?" {
        return field.allow_question;
    }
    text.split(',').all(|item| {
        if field.allow_question && field.names.is_empty() && item == "L" {
            return true;
        }
        if field.allow_question && !field.names.is_empty() {
            if let Some((day, nth)) = item.split_once('#') {
                return parse_value(day, field).is_some()
                    && matches!(nth.parse::<u32>(), Ok(1..=5));
            }
        }
        let Some(caps) = item_re.captures(item) else {
            return false;
        };
        if let Some(step) = caps.get(4) {
            match step.as_str().parse::<u32>() {
                Ok(step) if step > 0 => {}
                _ => return false,
            }
        }
        if caps.get(1).is_some() {
            return true;
        }
        let start = caps.get(2).and_then(|m| parse_value(m.as_str(), field));
        let Some(start) = start else {
            return false;
        };
        match caps.get(3) {
            Some(end) => parse_value(end.as_str(), field).is_some_and(|end| start <= end),
            None => true,
        }
    })
}

fn parse_value(text: &str, field: &CronField) -> Option<u32> {
    let value = match text.parse::<u32>() {
        Ok(n) => n,
        Err(_) => {
            let upper = text.to_ascii_uppercase();
            let idx = field.names.iter().position(|n| *n == upper)?;
            field.name_base + idx as u32
        }
    };
    (field.min..=field.max).contains(&value).then_some(value)
}

#[cfg(test)]
#[path = "schedules_test.rs"]
mod tests;
