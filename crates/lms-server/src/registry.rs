//! Relationship and constraint registry for the LMS schema.
//!
//! Every entity, foreign key, delete policy, unique key, check rule and
//! ordered index of the platform is declared here, in one schema bundle.
//! The table below is authoritative; cascade planning and restrict checks
//! read it from the catalog at runtime.
//!
//! | Relation | Child field | Parent | On delete |
//! |---|---|---|---|
//! | `course_teacher` | Course.teacherId | User (TEACHER/ADMIN) | RESTRICT |
//! | `lesson_course` | Lesson.courseId | Course | CASCADE |
//! | `assignment_course` | Assignment.courseId | Course | CASCADE |
//! | `submission_assignment` | Submission.assignmentId | Assignment | CASCADE |
//! | `submission_student` | Submission.studentId | User (STUDENT) | RESTRICT |
//! | `submission_grader` | Submission.gradedByTeacherId | User (TEACHER/ADMIN) | RESTRICT |
//! | `enrollment_student` | Enrollment.studentId | User (STUDENT) | RESTRICT |
//! | `enrollment_course` | Enrollment.courseId | Course | CASCADE |
//! | `consultation_teacher` | Consultation.teacherId | User (TEACHER/ADMIN) | RESTRICT |
//! | `consultation_student` | Consultation.studentId | User (STUDENT) | RESTRICT |
//! | `consultation_course` | Consultation.courseId | Course | RESTRICT |

use lms_core::{
    CheckRule, ConstraintDef, EntityDef, FieldDef, FieldType, IndexDef, RelationDef, ScalarType,
    SchemaBundle, TargetRule,
};

use crate::model::{ConsultationStatus, CourseStatus, Role};

/// Entity names.
pub mod entities {
    pub const USER: &str = "User";
    pub const COURSE: &str = "Course";
    pub const LESSON: &str = "Lesson";
    pub const ASSIGNMENT: &str = "Assignment";
    pub const SUBMISSION: &str = "Submission";
    pub const ENROLLMENT: &str = "Enrollment";
    pub const CONSULTATION: &str = "Consultation";

    /// All entities, parents before children.
    pub const ALL: [&str; 7] = [
        USER,
        COURSE,
        LESSON,
        ASSIGNMENT,
        SUBMISSION,
        ENROLLMENT,
        CONSULTATION,
    ];
}

/// Name of the ordered lesson index over (courseId, orderIndex).
pub const LESSON_ORDER_INDEX: &str = "lesson_course_order";

/// Name of the e-mail unique constraint.
pub const USER_EMAIL_UNIQUE: &str = "user_email_unique";

/// Name of the one-submission-per-student constraint.
pub const SUBMISSION_UNIQUE: &str = "submission_assignment_student_unique";

/// Name of the one-enrollment-per-course constraint.
pub const ENROLLMENT_UNIQUE: &str = "enrollment_student_course_unique";

/// Build the full LMS schema bundle.
pub fn lms_schema() -> SchemaBundle {
    use entities::*;

    let roles = Role::names();
    let teacher_roles = [Role::Teacher.as_str(), Role::Admin.as_str()];
    let student_role = [Role::Student.as_str()];

    let user = EntityDef::new(USER).with_fields([
        FieldDef::scalar("email", ScalarType::String).with_index(),
        FieldDef::scalar("passwordHash", ScalarType::String),
        FieldDef::scalar("firstName", ScalarType::String),
        FieldDef::scalar("lastName", ScalarType::String),
        FieldDef::new("role", FieldType::enum_type("Role", &roles)),
    ]);

    let course = EntityDef::new(COURSE).with_fields([
        FieldDef::scalar("title", ScalarType::String),
        FieldDef::scalar("description", ScalarType::String),
        FieldDef::scalar("category", ScalarType::String),
        FieldDef::new(
            "status",
            FieldType::enum_type("CourseStatus", &CourseStatus::names()),
        ),
        FieldDef::scalar("teacherId", ScalarType::Int64).with_index(),
    ]);

    let lesson = EntityDef::new(LESSON)
        .with_fields([
            FieldDef::scalar("courseId", ScalarType::Int64).with_index(),
            FieldDef::scalar("title", ScalarType::String),
            FieldDef::scalar("orderIndex", ScalarType::Int32).with_index(),
            FieldDef::optional_scalar("content", ScalarType::String),
            FieldDef::new("attachments", FieldType::array_scalar(ScalarType::String)),
        ])
        .with_default_order(lms_core::catalog::OrderBy::asc("orderIndex"));

    let assignment = EntityDef::new(ASSIGNMENT).with_fields([
        FieldDef::scalar("courseId", ScalarType::Int64).with_index(),
        FieldDef::scalar("title", ScalarType::String),
        FieldDef::optional_scalar("description", ScalarType::String),
        FieldDef::optional_scalar("dueDate", ScalarType::Timestamp),
        FieldDef::scalar("maxScore", ScalarType::Int32),
        FieldDef::new("attachments", FieldType::array_scalar(ScalarType::String)),
    ]);

    let submission = EntityDef::new(SUBMISSION).with_fields([
        FieldDef::scalar("assignmentId", ScalarType::Int64).with_index(),
        FieldDef::scalar("studentId", ScalarType::Int64).with_index(),
        FieldDef::optional_scalar("content", ScalarType::String),
        FieldDef::new("attachments", FieldType::array_scalar(ScalarType::String)),
        FieldDef::scalar("submittedAt", ScalarType::Timestamp),
        FieldDef::optional_scalar("score", ScalarType::Float64),
        FieldDef::optional_scalar("feedback", ScalarType::String),
        FieldDef::optional_scalar("gradedByTeacherId", ScalarType::Int64),
        FieldDef::optional_scalar("gradedAt", ScalarType::Timestamp),
    ]);

    let enrollment = EntityDef::new(ENROLLMENT).with_fields([
        FieldDef::scalar("studentId", ScalarType::Int64).with_index(),
        FieldDef::scalar("courseId", ScalarType::Int64).with_index(),
        FieldDef::scalar("enrolledAt", ScalarType::Timestamp),
    ]);

    let consultation = EntityDef::new(CONSULTATION).with_fields([
        FieldDef::scalar("teacherId", ScalarType::Int64).with_index(),
        FieldDef::scalar("studentId", ScalarType::Int64).with_index(),
        FieldDef::scalar("courseId", ScalarType::Int64).with_index(),
        FieldDef::scalar("scheduledAt", ScalarType::Timestamp),
        FieldDef::scalar("topic", ScalarType::String),
        FieldDef::new(
            "status",
            FieldType::enum_type("ConsultationStatus", &ConsultationStatus::names()),
        ),
    ]);

    SchemaBundle::new(0)
        .with_entity(user)
        .with_entity(course)
        .with_entity(lesson)
        .with_entity(assignment)
        .with_entity(submission)
        .with_entity(enrollment)
        .with_entity(consultation)
        // Relations
        .with_relation(
            RelationDef::new("course_teacher", COURSE, "teacherId", USER)
                .with_target_rule(TargetRule::new("role", &teacher_roles)),
        )
        .with_relation(RelationDef::new("lesson_course", LESSON, "courseId", COURSE).cascade())
        .with_relation(
            RelationDef::new("assignment_course", ASSIGNMENT, "courseId", COURSE).cascade(),
        )
        .with_relation(
            RelationDef::new("submission_assignment", SUBMISSION, "assignmentId", ASSIGNMENT)
                .cascade(),
        )
        .with_relation(
            RelationDef::new("submission_student", SUBMISSION, "studentId", USER)
                .with_target_rule(TargetRule::new("role", &student_role)),
        )
        .with_relation(
            RelationDef::new("submission_grader", SUBMISSION, "gradedByTeacherId", USER)
                .with_target_rule(TargetRule::new("role", &teacher_roles)),
        )
        .with_relation(
            RelationDef::new("enrollment_student", ENROLLMENT, "studentId", USER)
                .with_target_rule(TargetRule::new("role", &student_role)),
        )
        .with_relation(
            RelationDef::new("enrollment_course", ENROLLMENT, "courseId", COURSE).cascade(),
        )
        .with_relation(
            RelationDef::new("consultation_teacher", CONSULTATION, "teacherId", USER)
                .with_target_rule(TargetRule::new("role", &teacher_roles)),
        )
        .with_relation(
            RelationDef::new("consultation_student", CONSULTATION, "studentId", USER)
                .with_target_rule(TargetRule::new("role", &student_role)),
        )
        .with_relation(RelationDef::new(
            "consultation_course",
            CONSULTATION,
            "courseId",
            COURSE,
        ))
        // Unique keys
        .with_constraint(ConstraintDef::unique(USER_EMAIL_UNIQUE, USER, "email"))
        .with_constraint(ConstraintDef::unique_composite(
            SUBMISSION_UNIQUE,
            SUBMISSION,
            ["assignmentId", "studentId"],
        ))
        .with_constraint(ConstraintDef::unique_composite(
            ENROLLMENT_UNIQUE,
            ENROLLMENT,
            ["studentId", "courseId"],
        ))
        // Checks
        .with_constraint(ConstraintDef::check(
            "user_email_format",
            USER,
            "email",
            CheckRule::Email,
        ))
        .with_constraint(ConstraintDef::check(
            "course_title_present",
            COURSE,
            "title",
            CheckRule::NonEmpty,
        ))
        .with_constraint(ConstraintDef::check(
            "lesson_title_present",
            LESSON,
            "title",
            CheckRule::NonEmpty,
        ))
        .with_constraint(ConstraintDef::check(
            "lesson_order_non_negative",
            LESSON,
            "orderIndex",
            CheckRule::NonNegative,
        ))
        .with_constraint(ConstraintDef::check(
            "assignment_title_present",
            ASSIGNMENT,
            "title",
            CheckRule::NonEmpty,
        ))
        .with_constraint(ConstraintDef::check(
            "assignment_max_score_non_negative",
            ASSIGNMENT,
            "maxScore",
            CheckRule::NonNegative,
        ))
        // Ordered retrieval
        .with_index(IndexDef::new(
            LESSON_ORDER_INDEX,
            LESSON,
            ["courseId", "orderIndex"],
        ))
}
