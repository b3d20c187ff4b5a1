use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hours after an exam ends during which a teacher may still enter and submit marks.
pub const SUBMISSION_GRACE_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamType {
    Midterm,
    Final,
    Quiz,
    Monthly,
}

impl ExamType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "midterm" => Some(Self::Midterm),
            "final" => Some(Self::Final),
            "quiz" => Some(Self::Quiz),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Midterm => "Midterm",
            Self::Final => "Final",
            Self::Quiz => "Quiz",
            Self::Monthly => "Monthly",
        }
    }

    /// The single score component an exam of this type feeds.
    pub fn score_field(self) -> ScoreField {
        match self {
            Self::Midterm => ScoreField::Midterm,
            Self::Final => ScoreField::Final,
            Self::Quiz | Self::Monthly => ScoreField::Homework,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreField {
    Midterm,
    Final,
    Homework,
}

impl ScoreField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "midterm" => Some(Self::Midterm),
            "final" => Some(Self::Final),
            "homework" => Some(Self::Homework),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Midterm => "midterm",
            Self::Final => "final",
            Self::Homework => "homework",
        }
    }
}

/// One student's row inside a marks entry.
///
/// A `None` component is "not entered" for the exam-type field and
/// "not applicable" for the others; both count as 0 in the total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentMark {
    pub student_id: String,
    pub name: String,
    pub midterm: Option<f64>,
    pub final_score: Option<f64>,
    pub homework: Option<f64>,
    pub total: f64,
    pub percentage: i64,
}

impl StudentMark {
    pub fn new(student_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn get(&self, field: ScoreField) -> Option<f64> {
        match field {
            ScoreField::Midterm => self.midterm,
            ScoreField::Final => self.final_score,
            ScoreField::Homework => self.homework,
        }
    }

    /// Sets one component and recomputes the derived columns.
    pub fn set(&mut self, field: ScoreField, value: Option<f64>) {
        match field {
            ScoreField::Midterm => self.midterm = value,
            ScoreField::Final => self.final_score = value,
            ScoreField::Homework => self.homework = value,
        }
        self.recompute();
    }

    /// `percentage` divides by a fixed 3 regardless of how many components apply.
    pub fn recompute(&mut self) {
        self.total = self.midterm.unwrap_or(0.0)
            + self.final_score.unwrap_or(0.0)
            + self.homework.unwrap_or(0.0);
        self.percentage = (self.total / 3.0).round() as i64;
    }
}

/// Every row has a value in the field the exam type feeds. Zero counts as entered.
pub fn marks_complete(rows: &[StudentMark], exam_type: ExamType) -> bool {
    let field = exam_type.score_field();
    rows.iter().all(|r| r.get(field).is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarksStatus {
    Draft,
    Submitted,
    Approved,
}

impl MarksStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            "approved" => Some(Self::Approved),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::Approved => "approved",
        }
    }
}

impl fmt::Display for MarksStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Teacher,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "teacher" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
    pub teacher_id: Option<String>,
}

impl Actor {
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            teacher_id: None,
        }
    }

    pub fn teacher(id: impl Into<String>) -> Self {
        Self {
            role: Role::Teacher,
            teacher_id: Some(id.into()),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarksEvent {
    Edit,
    Submit,
    AutoApprove { complete: bool },
    Approve,
    Reject,
}

impl MarksEvent {
    fn name(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Submit => "submit",
            Self::AutoApprove { .. } => "auto-approve",
            Self::Approve => "approve",
            Self::Reject => "reject",
        }
    }
}

/// Facts about the exam that the transition guards need.
#[derive(Debug, Clone, Copy)]
pub struct Gate<'a> {
    pub now: NaiveDateTime,
    pub exam_end: NaiveDateTime,
    pub owner: Option<&'a str>,
}

impl Gate<'_> {
    pub fn deadline(&self) -> NaiveDateTime {
        deadline_for(self.exam_end)
    }

    pub fn past_deadline(&self) -> bool {
        self.now > self.deadline()
    }
}

pub fn deadline_for(exam_end: NaiveDateTime) -> NaiveDateTime {
    exam_end + Duration::hours(SUBMISSION_GRACE_HOURS)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {event} marks that are {from}")]
    Invalid {
        from: MarksStatus,
        event: &'static str,
    },
    #[error("only an admin may {0} marks")]
    AdminOnly(&'static str),
    #[error("submission deadline passed at {0}")]
    DeadlinePassed(NaiveDateTime),
    #[error("exam is owned by another teacher")]
    NotOwner,
    #[error("marks are incomplete")]
    Incomplete,
}

impl TransitionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "invalid_transition",
            Self::AdminOnly(_) => "forbidden",
            Self::DeadlinePassed(_) => "deadline_passed",
            Self::NotOwner => "not_owner",
            Self::Incomplete => "incomplete",
        }
    }
}

fn teacher_guard(actor: &Actor, gate: &Gate<'_>) -> Result<(), TransitionError> {
    if actor.is_admin() {
        return Ok(());
    }
    if let Some(owner) = gate.owner {
        if actor.teacher_id.as_deref() != Some(owner) {
            return Err(TransitionError::NotOwner);
        }
    }
    if gate.past_deadline() {
        return Err(TransitionError::DeadlinePassed(gate.deadline()));
    }
    Ok(())
}

/// The single place where the marks lifecycle is decided.
pub fn transition(
    from: MarksStatus,
    event: MarksEvent,
    actor: &Actor,
    gate: &Gate<'_>,
) -> Result<MarksStatus, TransitionError> {
    let invalid = || TransitionError::Invalid {
        from,
        event: event.name(),
    };
    match event {
        MarksEvent::Edit | MarksEvent::Submit => {
            if from != MarksStatus::Draft {
                return Err(invalid());
            }
            teacher_guard(actor, gate)?;
            Ok(if event == MarksEvent::Edit {
                MarksStatus::Draft
            } else {
                MarksStatus::Submitted
            })
        }
        MarksEvent::AutoApprove { complete } => {
            if from != MarksStatus::Submitted {
                return Err(invalid());
            }
            if !complete {
                return Err(TransitionError::Incomplete);
            }
            Ok(MarksStatus::Approved)
        }
        MarksEvent::Approve | MarksEvent::Reject => {
            if !actor.is_admin() {
                return Err(TransitionError::AdminOnly(event.name()));
            }
            if from != MarksStatus::Submitted {
                return Err(invalid());
            }
            Ok(if event == MarksEvent::Approve {
                MarksStatus::Approved
            } else {
                MarksStatus::Draft
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 11, day)
            .expect("date")
            .and_hms_opt(hour, 0, 0)
            .expect("time")
    }

    fn gate(now: NaiveDateTime, owner: Option<&str>) -> Gate<'_> {
        Gate {
            now,
            exam_end: at(1, 10),
            owner,
        }
    }

    #[test]
    fn total_tracks_every_component_update() {
        let mut m = StudentMark::new("DU-2025-001", "Amina Yusuf");
        m.set(ScoreField::Midterm, Some(40.0));
        assert_eq!(m.total, 40.0);
        m.set(ScoreField::Final, Some(50.0));
        m.set(ScoreField::Homework, Some(0.0));
        assert_eq!(m.total, 90.0);
        assert_eq!(m.percentage, 30);
        m.set(ScoreField::Midterm, None);
        assert_eq!(m.total, 50.0);
        assert_eq!(m.percentage, 17);
    }

    #[test]
    fn completeness_only_looks_at_exam_type_field() {
        let mut a = StudentMark::new("a", "A");
        let mut b = StudentMark::new("b", "B");
        a.set(ScoreField::Final, Some(0.0));
        b.set(ScoreField::Final, Some(71.0));
        let rows = vec![a, b];
        assert!(marks_complete(&rows, ExamType::Final));
        assert!(!marks_complete(&rows, ExamType::Midterm));
        assert!(marks_complete(&[], ExamType::Quiz));
    }

    #[test]
    fn teacher_submit_respects_deadline() {
        let teacher = Actor::teacher("T-1");
        let before = gate(at(2, 9), None);
        assert_eq!(
            transition(MarksStatus::Draft, MarksEvent::Submit, &teacher, &before),
            Ok(MarksStatus::Submitted)
        );

        let late = gate(at(2, 11), None);
        assert_eq!(
            transition(MarksStatus::Draft, MarksEvent::Submit, &teacher, &late),
            Err(TransitionError::DeadlinePassed(at(2, 10)))
        );
        assert_eq!(
            transition(MarksStatus::Draft, MarksEvent::Submit, &Actor::admin(), &late),
            Ok(MarksStatus::Submitted)
        );
    }

    #[test]
    fn owned_exam_rejects_other_teachers() {
        let g = gate(at(1, 12), Some("T-1"));
        assert_eq!(
            transition(MarksStatus::Draft, MarksEvent::Edit, &Actor::teacher("T-2"), &g),
            Err(TransitionError::NotOwner)
        );
        assert_eq!(
            transition(MarksStatus::Draft, MarksEvent::Edit, &Actor::teacher("T-1"), &g),
            Ok(MarksStatus::Draft)
        );
    }

    #[test]
    fn draft_never_reaches_approved_directly() {
        let g = gate(at(1, 12), None);
        let admin = Actor::admin();
        for event in [
            MarksEvent::Approve,
            MarksEvent::AutoApprove { complete: true },
            MarksEvent::Reject,
        ] {
            let res = transition(MarksStatus::Draft, event, &admin, &g);
            assert_eq!(res.map_err(|e| e.code()), Err("invalid_transition"));
        }
    }

    #[test]
    fn submitted_entries_approve_reject_and_lock() {
        let g = gate(at(1, 12), None);
        let admin = Actor::admin();
        let teacher = Actor::teacher("T-1");

        assert_eq!(
            transition(MarksStatus::Submitted, MarksEvent::Approve, &teacher, &g),
            Err(TransitionError::AdminOnly("approve"))
        );
        assert_eq!(
            transition(MarksStatus::Submitted, MarksEvent::Reject, &admin, &g),
            Ok(MarksStatus::Draft)
        );
        assert_eq!(
            transition(
                MarksStatus::Submitted,
                MarksEvent::AutoApprove { complete: false },
                &admin,
                &g
            ),
            Err(TransitionError::Incomplete)
        );
        assert_eq!(
            transition(
                MarksStatus::Submitted,
                MarksEvent::AutoApprove { complete: true },
                &teacher,
                &g
            ),
            Ok(MarksStatus::Approved)
        );
        for status in [MarksStatus::Submitted, MarksStatus::Approved] {
            assert!(transition(status, MarksEvent::Edit, &admin, &g).is_err());
        }
    }
}
