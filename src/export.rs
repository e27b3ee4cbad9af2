//! Row models for the spreadsheet and printable exports. Producing the actual
//! .xlsx/.pdf bytes is left to the host; these are the values it lays out.

use crate::backup::BackupMeta;
use crate::ledger::Ledger;
use crate::model::Roster;
use serde::Serialize;

const DAY_COURSE: &str = "주간";

/// One spreadsheet row, keyed by the school system's upload column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExcelRow {
    #[serde(rename = "학번")]
    pub student_id: u64,
    #[serde(rename = "성명")]
    pub name: String,
    #[serde(rename = "이전주야과정구분")]
    pub prev_course: String,
    #[serde(rename = "이전학년")]
    pub prev_grade: String,
    #[serde(rename = "이전반")]
    pub prev_class: String,
    #[serde(rename = "이전번호")]
    pub prev_number: String,
    #[serde(rename = "진급주야과정구분")]
    pub next_course: String,
    #[serde(rename = "진급학년")]
    pub next_grade: String,
    #[serde(rename = "진급반코드")]
    pub next_class_code: String,
    #[serde(rename = "진급반번호")]
    pub next_number: String,
}

fn pad2(s: &str) -> String {
    format!("{s:0>2}")
}

pub fn excel_rows(roster: &Roster) -> Vec<ExcelRow> {
    roster
        .students()
        .map(|(key, s)| {
            let seat: u64 = s.number.trim().parse().unwrap_or(0);
            ExcelRow {
                student_id: u64::from(key.grade) * 1000 + u64::from(key.class) * 100 + seat,
                name: s.name.clone(),
                prev_course: DAY_COURSE.to_string(),
                prev_grade: if s.prev_grade.is_empty() {
                    String::new()
                } else {
                    format!("{}학년", s.prev_grade)
                },
                prev_class: pad2(&s.prev_class),
                prev_number: s.prev_number.clone(),
                next_course: DAY_COURSE.to_string(),
                next_grade: format!("{}학년", key.grade),
                next_class_code: pad2(&key.class.to_string()),
                next_number: s.number.clone(),
            }
        })
        .collect()
}

pub const PDF_COLUMNS: [&str; 10] = [
    "학년", "반", "번호", "성명", "생년월일", "성별", "기준성적", "이전학년", "이전반", "이전번호",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfClassSheet {
    pub heading: String,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfReport {
    pub title: String,
    pub columns: Vec<String>,
    pub sheets: Vec<PdfClassSheet>,
    pub history: Vec<String>,
}

fn grade_digits(grade: &str) -> Option<u32> {
    let digits: String = grade.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// One sheet per class (grade/class order) followed by the change history.
/// `year` is the school year printed in each heading.
pub fn pdf_report(roster: &Roster, ledger: &Ledger, meta: &BackupMeta, year: i32) -> PdfReport {
    let school = meta.school_name.as_deref().unwrap_or_default();
    let grade_label = meta.grade.as_deref().unwrap_or_default();
    let session_grade = meta.grade.as_deref().and_then(grade_digits);

    let sheets = roster
        .classes()
        .map(|(key, students)| {
            let next_grade = session_grade.unwrap_or(key.grade) + 1;
            PdfClassSheet {
                heading: format!("{year}학년도 {next_grade}학년 {}반", key.class),
                rows: students
                    .iter()
                    .map(|s| {
                        vec![
                            key.grade.to_string(),
                            key.class.to_string(),
                            s.number.clone(),
                            s.name.clone(),
                            s.birth_date.clone(),
                            s.gender.label().to_string(),
                            s.score.clone(),
                            s.prev_grade.clone(),
                            s.prev_class.clone(),
                            s.prev_number.clone(),
                        ]
                    })
                    .collect(),
            }
        })
        .collect();

    PdfReport {
        title: format!("{school} {grade_label} NU:CLASS 반편성내역")
            .trim()
            .to_string(),
        columns: PDF_COLUMNS.iter().map(|c| c.to_string()).collect(),
        sheets,
        history: ledger.history.clone(),
    }
}

/// `<school>_<grade>` prefix the exported files are named with.
pub fn file_stem(meta: &BackupMeta) -> String {
    let school = meta.school_name.as_deref().unwrap_or("nuclass");
    match meta.grade.as_deref() {
        Some(g) if !g.is_empty() => format!("{school}_{g}"),
        _ => school.to_string(),
    }
}
