//! Separation constraints and violation detection.
//!
//! A group forbids any two of its members from sharing a class; a team only
//! forbids members from sharing the leader's class. Every query resolves
//! student references against the roster it is given, so results always
//! reflect the current placement.

use crate::error::{CoreError, CoreResult};
use crate::model::{ClassKey, Gender, Position, Roster, Student};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Attributes captured when a name is shared by several students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disambiguator {
    pub prev_class: String,
    pub gender: Gender,
}

impl Disambiguator {
    fn matches(&self, s: &Student) -> bool {
        if s.gender != self.gender {
            return false;
        }
        match (self.prev_class.trim().parse::<u32>(), s.prev_class_number()) {
            (Ok(a), Some(b)) => a == b,
            _ => self.prev_class.trim() == s.prev_class.trim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disambiguator: Option<Disambiguator>,
}

impl StudentRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            disambiguator: None,
        }
    }

    pub fn disambiguated(name: impl Into<String>, prev_class: impl Into<String>, gender: Gender) -> Self {
        Self {
            name: name.into(),
            disambiguator: Some(Disambiguator {
                prev_class: prev_class.into(),
                gender,
            }),
        }
    }

    /// Display form, e.g. `김민수` or `김민수(이전 5반, 남)`.
    pub fn label(&self) -> String {
        match &self.disambiguator {
            None => self.name.clone(),
            Some(d) => format!("{}(이전 {}반, {})", self.name, d.prev_class, d.gender.label()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeparationGroup {
    pub id: String,
    pub students: Vec<StudentRef>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeparationTeam {
    pub id: String,
    pub leader: StudentRef,
    pub members: Vec<StudentRef>,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintBook {
    #[serde(default)]
    pub groups: Vec<SeparationGroup>,
    #[serde(default)]
    pub teams: Vec<SeparationTeam>,
}

impl ConstraintBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.teams.is_empty()
    }

    pub fn add_group(&mut self, students: Vec<StudentRef>, reason: &str) -> CoreResult<String> {
        validate_refs(&students)?;
        if students.len() < 2 {
            return Err(CoreError::InvalidConstraint(
                "a group needs at least two students".to_string(),
            ));
        }
        let id = Uuid::new_v4().to_string();
        self.groups.push(SeparationGroup {
            id: id.clone(),
            students,
            reason: reason.trim().to_string(),
        });
        Ok(id)
    }

    pub fn remove_group(&mut self, id: &str) -> CoreResult<SeparationGroup> {
        let idx = self
            .groups
            .iter()
            .position(|g| g.id == id)
            .ok_or_else(|| CoreError::UnknownConstraint(id.to_string()))?;
        Ok(self.groups.remove(idx))
    }

    pub fn add_team(
        &mut self,
        leader: StudentRef,
        members: Vec<StudentRef>,
        reason: &str,
    ) -> CoreResult<String> {
        validate_refs(&members)?;
        if leader.name.trim().is_empty() {
            return Err(CoreError::InvalidConstraint(
                "team leader name is empty".to_string(),
            ));
        }
        if members.is_empty() {
            return Err(CoreError::InvalidConstraint(
                "a team needs at least one member".to_string(),
            ));
        }
        if members.contains(&leader) {
            return Err(CoreError::InvalidConstraint(format!(
                "{} is both leader and member",
                leader.label()
            )));
        }
        let id = Uuid::new_v4().to_string();
        self.teams.push(SeparationTeam {
            id: id.clone(),
            leader,
            members,
            reason: reason.trim().to_string(),
        });
        Ok(id)
    }

    pub fn remove_team(&mut self, id: &str) -> CoreResult<SeparationTeam> {
        let idx = self
            .teams
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CoreError::UnknownConstraint(id.to_string()))?;
        Ok(self.teams.remove(idx))
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.teams.clear();
    }
}

fn validate_refs(refs: &[StudentRef]) -> CoreResult<()> {
    for (i, r) in refs.iter().enumerate() {
        if r.name.trim().is_empty() {
            return Err(CoreError::InvalidConstraint("student name is empty".to_string()));
        }
        if refs[..i].contains(r) {
            return Err(CoreError::InvalidConstraint(format!(
                "{} listed twice",
                r.label()
            )));
        }
    }
    Ok(())
}

/// Resolves a reference to the single student it names.
pub fn locate(roster: &Roster, r: &StudentRef) -> CoreResult<Position> {
    let mut candidates: Vec<(Position, &Student)> = Vec::new();
    for (key, class) in roster.classes() {
        for (i, s) in class.iter().enumerate() {
            if s.name == r.name {
                candidates.push((Position::new(*key, i), s));
            }
        }
    }

    let not_found = || CoreError::StudentNotFound(r.label());
    match (candidates.len(), &r.disambiguator) {
        (0, _) => Err(not_found()),
        (1, None) => Ok(candidates[0].0),
        (_, None) => Err(CoreError::AmbiguousStudentReference(r.name.clone())),
        (_, Some(d)) => {
            let hits: Vec<Position> = candidates
                .iter()
                .filter(|(_, s)| d.matches(s))
                .map(|(p, _)| *p)
                .collect();
            match hits.len() {
                0 => Err(not_found()),
                1 => Ok(hits[0]),
                _ => Err(CoreError::AmbiguousStudentReference(r.label())),
            }
        }
    }
}

pub fn class_of(roster: &Roster, r: &StudentRef) -> CoreResult<ClassKey> {
    locate(roster, r).map(|p| p.class_key)
}

/// Resolved members of a constraint; unresolvable references drop out.
fn resolve_all<'a>(roster: &Roster, refs: &'a [StudentRef]) -> Vec<(&'a StudentRef, Position)> {
    refs.iter()
        .filter_map(|r| locate(roster, r).ok().map(|p| (r, p)))
        .collect()
}

/// Per-class members of a group that share the class with another member.
fn group_collisions<'a>(
    roster: &Roster,
    group: &'a SeparationGroup,
) -> (BTreeMap<ClassKey, Vec<&'a StudentRef>>, BTreeMap<ClassKey, usize>) {
    let resolved = resolve_all(roster, &group.students);
    let mut members: BTreeMap<ClassKey, Vec<&StudentRef>> = BTreeMap::new();
    let mut pairs: BTreeMap<ClassKey, usize> = BTreeMap::new();
    for (i, (ra, pa)) in resolved.iter().enumerate() {
        for (rb, pb) in &resolved[i + 1..] {
            if pa.class_key != pb.class_key || pa == pb {
                continue;
            }
            *pairs.entry(pa.class_key).or_default() += 1;
            let list = members.entry(pa.class_key).or_default();
            for r in [*ra, *rb] {
                if !list.contains(&r) {
                    list.push(r);
                }
            }
        }
    }
    // Keep definition order regardless of pair discovery order.
    for list in members.values_mut() {
        list.sort_by_key(|r| group.students.iter().position(|x| x == *r));
    }
    (members, pairs)
}

/// Leader's class and the members sitting in it.
fn team_collisions<'a>(
    roster: &Roster,
    team: &'a SeparationTeam,
) -> Option<(ClassKey, Vec<&'a StudentRef>)> {
    let leader = locate(roster, &team.leader).ok()?;
    let hits: Vec<&StudentRef> = resolve_all(roster, &team.members)
        .into_iter()
        .filter(|(_, p)| p.class_key == leader.class_key && *p != leader)
        .map(|(r, _)| r)
        .collect();
    Some((leader.class_key, hits))
}

/// Number of colliding pairs per class. Classes without violations are absent.
pub fn violations_per_class(roster: &Roster, book: &ConstraintBook) -> BTreeMap<ClassKey, usize> {
    let mut counts: BTreeMap<ClassKey, usize> = BTreeMap::new();
    for group in &book.groups {
        let (_, pairs) = group_collisions(roster, group);
        for (key, n) in pairs {
            *counts.entry(key).or_default() += n;
        }
    }
    for team in &book.teams {
        if let Some((key, hits)) = team_collisions(roster, team) {
            if !hits.is_empty() {
                *counts.entry(key).or_default() += hits.len();
            }
        }
    }
    counts
}

fn with_reason(text: String, reason: &str) -> String {
    if reason.is_empty() {
        text
    } else {
        format!("{text} ({reason})")
    }
}

/// Human-readable violations for one class: groups first, then teams, each in
/// definition order.
pub fn violation_details(roster: &Roster, book: &ConstraintBook, class: &ClassKey) -> Vec<String> {
    let mut out = Vec::new();
    for group in &book.groups {
        let (members, _) = group_collisions(roster, group);
        if let Some(list) = members.get(class) {
            let names: Vec<String> = list.iter().map(|r| r.label()).collect();
            out.push(with_reason(format!("[그룹] {}", names.join(", ")), &group.reason));
        }
    }
    for team in &book.teams {
        let Some((key, hits)) = team_collisions(roster, team) else {
            continue;
        };
        if key != *class || hits.is_empty() {
            continue;
        }
        let names: Vec<String> = hits.iter().map(|r| r.label()).collect();
        out.push(with_reason(
            format!("[팀] 리더 {} ↔ {}", team.leader.label(), names.join(", ")),
            &team.reason,
        ));
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupCheck {
    pub has_violation: bool,
    pub colliding_class_numbers: BTreeSet<u32>,
}

pub fn check_group(roster: &Roster, group: &SeparationGroup) -> GroupCheck {
    let (_, pairs) = group_collisions(roster, group);
    let colliding_class_numbers: BTreeSet<u32> = pairs.keys().map(|k| k.class).collect();
    GroupCheck {
        has_violation: !colliding_class_numbers.is_empty(),
        colliding_class_numbers,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCheck {
    pub has_violation: bool,
    pub colliding_members: Vec<String>,
}

pub fn check_team(roster: &Roster, team: &SeparationTeam) -> TeamCheck {
    let colliding_members: Vec<String> = team_collisions(roster, team)
        .map(|(_, hits)| hits.iter().map(|r| r.label()).collect())
        .unwrap_or_default();
    TeamCheck {
        has_violation: !colliding_members.is_empty(),
        colliding_members,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassViolations {
    pub class_key: ClassKey,
    pub count: usize,
    pub details: Vec<String>,
}

/// Count and details for every class that currently has a violation.
pub fn violation_report(roster: &Roster, book: &ConstraintBook) -> Vec<ClassViolations> {
    violations_per_class(roster, book)
        .into_iter()
        .map(|(class_key, count)| ClassViolations {
            class_key,
            count,
            details: violation_details(roster, book, &class_key),
        })
        .collect()
}
