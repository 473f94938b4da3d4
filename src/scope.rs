use std::collections::HashSet;
use std::fmt;

use crate::error::ReportError;
use crate::models::{Class, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    TakeAttendance,
    SubmitSchedule,
    GenerateReports,
    WriteRemarks,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::TakeAttendance => "take attendance",
            Action::SubmitSchedule => "submit schedules",
            Action::GenerateReports => "generate reports",
            Action::WriteRemarks => "write remarks",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    AllDepartments,
    Department(String),
    Nothing,
}

/// What the signed-in user may see and do, computed once per session and
/// passed explicitly into report generation.
#[derive(Debug, Clone)]
pub struct Scope {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
    pub visibility: Visibility,
    actions: HashSet<Action>,
}

impl Scope {
    pub fn for_user(user: &User) -> Self {
        let actions: &[Action] = match user.role {
            Role::Iqa => &[Action::GenerateReports, Action::WriteRemarks],
            Role::Hod => &[Action::GenerateReports, Action::WriteRemarks],
            Role::Trainer => &[Action::TakeAttendance, Action::GenerateReports],
            Role::ClassRep => &[Action::SubmitSchedule],
        };
        let visibility = match (user.role, user.department.as_deref()) {
            (Role::Iqa, _) => Visibility::AllDepartments,
            (_, Some(department)) if !department.trim().is_empty() => {
                Visibility::Department(department.to_string())
            }
            _ => Visibility::Nothing,
        };
        Scope {
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            role: user.role,
            visibility,
            actions: actions.iter().copied().collect(),
        }
    }

    pub fn permits(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    pub fn require(&self, action: Action) -> Result<(), ReportError> {
        if self.permits(action) {
            Ok(())
        } else {
            Err(ReportError::Forbidden(format!(
                "{} {} may not {action}",
                self.role, self.user_name
            )))
        }
    }

    pub fn admits_department(&self, department: &str) -> bool {
        match &self.visibility {
            Visibility::AllDepartments => true,
            Visibility::Department(own) => own == department,
            Visibility::Nothing => false,
        }
    }

    pub fn admits_class(&self, class: &Class) -> bool {
        self.admits_department(&class.department)
    }

    pub fn require_class(&self, class: &Class) -> Result<(), ReportError> {
        if self.admits_class(class) {
            Ok(())
        } else {
            Err(ReportError::Forbidden(format!(
                "class {} belongs to {}, outside the scope of {}",
                class.name, class.department, self.user_name
            )))
        }
    }

    /// Trainers only ever see the sessions they delivered themselves.
    pub fn own_trainer_id(&self) -> Option<&str> {
        (self.role == Role::Trainer).then_some(self.user_id.as_str())
    }

    pub fn department_label(&self) -> &str {
        match &self.visibility {
            Visibility::AllDepartments => "all departments",
            Visibility::Department(department) => department,
            Visibility::Nothing => "no department",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, department: Option<&str>) -> User {
        User {
            id: "user-1".to_string(),
            name: "Test User".to_string(),
            username: "test".to_string(),
            role,
            department: department.map(str::to_string),
        }
    }

    fn class(department: &str) -> Class {
        Class {
            id: "class-1".to_string(),
            name: "CS-L6-24S".to_string(),
            department: department.to_string(),
        }
    }

    #[test]
    fn iqa_sees_every_department() {
        let scope = Scope::for_user(&user(Role::Iqa, None));
        assert!(scope.admits_department("Design"));
        assert!(scope.admits_department("Computer Science"));
        assert!(scope.permits(Action::GenerateReports));
        assert!(scope.own_trainer_id().is_none());
    }

    #[test]
    fn hod_is_bound_to_department() {
        let scope = Scope::for_user(&user(Role::Hod, Some("Computer Science")));
        assert!(scope.admits_class(&class("Computer Science")));
        assert!(!scope.admits_class(&class("Design")));
        assert!(matches!(
            scope.require_class(&class("Design")),
            Err(ReportError::Forbidden(_))
        ));
    }

    #[test]
    fn department_bound_role_without_department_sees_nothing() {
        let scope = Scope::for_user(&user(Role::Hod, None));
        assert_eq!(scope.visibility, Visibility::Nothing);
        assert!(!scope.admits_department("Computer Science"));
    }

    #[test]
    fn class_rep_cannot_generate_reports() {
        let scope = Scope::for_user(&user(Role::ClassRep, Some("Design")));
        assert!(scope.permits(Action::SubmitSchedule));
        assert!(scope.require(Action::GenerateReports).is_err());
    }

    #[test]
    fn trainer_is_limited_to_own_sessions() {
        let scope = Scope::for_user(&user(Role::Trainer, Some("Design")));
        assert_eq!(scope.own_trainer_id(), Some("user-1"));
        assert!(scope.permits(Action::TakeAttendance));
        assert!(!scope.permits(Action::WriteRemarks));
    }
}
