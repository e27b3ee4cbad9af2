use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Keys the original browser store kept next to class data; never classes.
const SENTINEL_KEYS: [&str; 2] = ["history", "undefined"];

/// Current grade + class number, e.g. `3-2`.
///
/// Field order gives the display order: grade first, then class, both numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassKey {
    pub grade: u32,
    pub class: u32,
}

impl ClassKey {
    pub fn new(grade: u32, class: u32) -> Self {
        Self { grade, class }
    }
}

impl fmt::Display for ClassKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.grade, self.class)
    }
}

impl FromStr for ClassKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() || SENTINEL_KEYS.contains(&t) {
            return Err(CoreError::InvalidClassKey(s.to_string()));
        }
        let Some((g, c)) = t.split_once('-') else {
            return Err(CoreError::InvalidClassKey(s.to_string()));
        };
        let digits = |v: &str| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit());
        if !digits(g) || !digits(c) {
            return Err(CoreError::InvalidClassKey(s.to_string()));
        }
        match (g.parse::<u32>(), c.parse::<u32>()) {
            (Ok(grade), Ok(class)) => Ok(ClassKey { grade, class }),
            _ => Err(CoreError::InvalidClassKey(s.to_string())),
        }
    }
}

impl Serialize for ClassKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClassKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A (class, name) pair used for the changed/moved display markers.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StudentTag {
    pub class_key: ClassKey,
    pub name: String,
}

impl StudentTag {
    pub fn new(class_key: ClassKey, name: impl Into<String>) -> Self {
        Self {
            class_key,
            name: name.into(),
        }
    }
}

impl fmt::Display for StudentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.class_key, self.name)
    }
}

impl FromStr for StudentTag {
    type Err = CoreError;

    // `<grade>-<class>-<name>`; the name may itself contain '-'.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CoreError::InvalidClassKey(s.to_string());
        let first = s.find('-').ok_or_else(bad)?;
        let second = s[first + 1..].find('-').ok_or_else(bad)? + first + 1;
        let class_key: ClassKey = s[..second].parse()?;
        Ok(StudentTag {
            class_key,
            name: s[second + 1..].to_string(),
        })
    }
}

impl Serialize for StudentTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StudentTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "남")]
    Male,
    #[serde(rename = "여")]
    Female,
}

impl Gender {
    pub fn from_token(t: &str) -> Option<Self> {
        match t {
            "남" => Some(Gender::Male),
            "여" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gender::Male => "남",
            Gender::Female => "여",
        }
    }
}

/// Previous-record summary used for transfer-in students.
pub const TRANSFER_IN: &str = "전입";

/// One student row. Serialized with the Korean column names the roster
/// documents (and existing backup files) use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "번호")]
    pub number: String,
    #[serde(rename = "성명")]
    pub name: String,
    #[serde(rename = "생년월일")]
    pub birth_date: String,
    #[serde(rename = "성별")]
    pub gender: Gender,
    #[serde(rename = "기준성적")]
    pub score: String,
    #[serde(rename = "이전학적", default)]
    pub prev_summary: String,
    #[serde(rename = "이전학적학년", default)]
    pub prev_grade: String,
    #[serde(rename = "이전학적반", default)]
    pub prev_class: String,
    #[serde(rename = "이전학적번호", default)]
    pub prev_number: String,
    #[serde(rename = "비고", default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Student {
    /// Numeric score; unparseable text counts as 0.
    pub fn score_value(&self) -> f64 {
        self.score.trim().parse::<f64>().unwrap_or(0.0)
    }

    pub fn prev_class_number(&self) -> Option<u32> {
        self.prev_class.trim().parse::<u32>().ok()
    }

    pub fn is_transfer_in(&self) -> bool {
        self.prev_summary == TRANSFER_IN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub class_key: ClassKey,
    pub index: usize,
}

impl Position {
    pub fn new(class_key: ClassKey, index: usize) -> Self {
        Self { class_key, index }
    }

    pub(crate) fn invalid(&self) -> CoreError {
        CoreError::InvalidPosition {
            class_key: self.class_key.to_string(),
            index: self.index,
        }
    }
}

/// Class key → ordered students. Order within a class is the display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Roster {
    classes: BTreeMap<ClassKey, Vec<Student>>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient load from loosely typed class data (e.g. an older backup):
    /// sentinel and malformed keys are skipped, malformed class lists too.
    pub fn from_class_data(raw: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut roster = Roster::new();
        for (key, value) in raw {
            let Ok(class_key) = key.parse::<ClassKey>() else {
                continue;
            };
            let Ok(students) = serde_json::from_value::<Vec<Student>>(value.clone()) else {
                continue;
            };
            roster.classes.insert(class_key, students);
        }
        roster
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains_class(&self, key: &ClassKey) -> bool {
        self.classes.contains_key(key)
    }

    pub fn class(&self, key: &ClassKey) -> Option<&[Student]> {
        self.classes.get(key).map(|v| v.as_slice())
    }

    pub(crate) fn class_mut(&mut self, key: &ClassKey) -> Option<&mut Vec<Student>> {
        self.classes.get_mut(key)
    }

    pub fn get(&self, pos: &Position) -> Option<&Student> {
        self.classes.get(&pos.class_key)?.get(pos.index)
    }

    /// Appends to the class, creating it when absent.
    pub fn push(&mut self, key: ClassKey, student: Student) {
        self.classes.entry(key).or_default().push(student);
    }

    /// Creates an empty class if it does not exist yet.
    pub fn ensure_class(&mut self, key: ClassKey) {
        self.classes.entry(key).or_default();
    }

    /// Classes in grade/class order.
    pub fn classes(&self) -> impl Iterator<Item = (&ClassKey, &[Student])> {
        self.classes.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub(crate) fn classes_mut(&mut self) -> impl Iterator<Item = (&ClassKey, &mut Vec<Student>)> {
        self.classes.iter_mut()
    }

    pub fn class_keys(&self) -> Vec<ClassKey> {
        self.classes.keys().copied().collect()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn student_count(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    /// Every student with its current class, class order then seat order.
    pub fn students(&self) -> impl Iterator<Item = (ClassKey, &Student)> {
        self.classes
            .iter()
            .flat_map(|(k, v)| v.iter().map(move |s| (*k, s)))
    }
}
