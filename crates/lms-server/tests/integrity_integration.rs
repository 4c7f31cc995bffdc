//! Integration tests for the LMS integrity rules.

use chrono::{Duration, Utc};
use lms_proto::{FieldValue, Mutation, MutationBatch};
use lms_server::model::{
    Assignment, Consultation, Course, Enrollment, Grade, Lesson, NewAssignment, NewConsultation,
    NewCourse, NewLesson, NewSubmission, NewUser, Role, Submission, User,
};
use lms_server::{
    ensure_seeded, Error, Gateway, PersistenceGateway, SeedConfig, SeedOutcome, ServerConfig,
    ADMIN_ID,
};

struct TestContext {
    gateway: Gateway,
    _dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path().join("lms")).with_flush_every_ms(None);
        Self {
            gateway: Gateway::open(&config).unwrap(),
            _dir: dir,
        }
    }

    fn user(&self, email: &str, role: Role) -> User {
        self.gateway
            .insert(NewUser::with_password(email, "pw", "First", "Last", role).unwrap())
            .unwrap()
    }

    fn course(&self, teacher: &User) -> Course {
        self.gateway
            .insert(NewCourse::draft("Rust", "programming", teacher.id))
            .unwrap()
    }
}

/// Teacher, student, course with a lesson, an assignment with a submission,
/// and an enrollment.
struct Classroom {
    teacher: User,
    student: User,
    course: Course,
    lesson: Lesson,
    assignment: Assignment,
    submission: Submission,
    enrollment: Enrollment,
}

fn classroom(ctx: &TestContext) -> Classroom {
    let g = &ctx.gateway;
    let teacher = ctx.user("t@x.com", Role::Teacher);
    let student = ctx.user("s@x.com", Role::Student);
    let course = ctx.course(&teacher);
    let lesson = g.insert(NewLesson::new(course.id, "Basics", 1)).unwrap();
    let assignment = g
        .insert(NewAssignment::new(course.id, "Homework", 10).due(Utc::now() + Duration::days(7)))
        .unwrap();
    let submission = g
        .insert(NewSubmission::new(assignment.id, student.id).with_content("answer"))
        .unwrap();
    let enrollment = g.enroll(student.id, course.id).unwrap();

    Classroom {
        teacher,
        student,
        course,
        lesson,
        assignment,
        submission,
        enrollment,
    }
}

#[test]
fn test_email_unique() {
    let ctx = TestContext::new();
    let first = ctx.user("a@x.com", Role::Student);

    let err = ctx
        .gateway
        .insert(NewUser::with_password("a@x.com", "pw", "B", "B", Role::Teacher).unwrap())
        .unwrap_err();
    assert!(err.is_unique_violation(), "got {err}");

    let still: User = ctx.gateway.fetch(first.id).unwrap();
    assert_eq!(still.email, "a@x.com");
    assert_eq!(ctx.gateway.list("User").unwrap().len(), 1);
}

#[test]
fn test_email_unique_on_update() {
    let ctx = TestContext::new();
    ctx.user("a@x.com", Role::Student);
    let b = ctx.user("b@x.com", Role::Student);

    let err = ctx
        .gateway
        .update("User", b.id, vec![FieldValue::new("email", "a@x.com")])
        .unwrap_err();
    assert!(err.is_unique_violation());

    // Re-saving a row with its own e-mail is not a conflict.
    ctx.gateway
        .update("User", b.id, vec![FieldValue::new("email", "b@x.com")])
        .unwrap();
}

#[test]
fn test_one_enrollment_per_course() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);

    let err = ctx
        .gateway
        .enroll(room.student.id, room.course.id)
        .unwrap_err();
    assert!(err.is_unique_violation());

    let enrollments = ctx.gateway.enrollments_for_student(room.student.id).unwrap();
    assert_eq!(enrollments, vec![room.enrollment]);
}

#[test]
fn test_one_submission_per_assignment() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);

    let err = ctx
        .gateway
        .insert(NewSubmission::new(room.assignment.id, room.student.id))
        .unwrap_err();
    assert!(err.is_unique_violation());

    // Another student may still submit.
    let other = ctx.user("o@x.com", Role::Student);
    ctx.gateway
        .insert(NewSubmission::new(room.assignment.id, other.id))
        .unwrap();
    assert_eq!(
        ctx.gateway
            .submissions_for_assignment(room.assignment.id)
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_course_delete_cascades() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);
    let g = &ctx.gateway;

    let result = g.remove::<Course>(room.course.id).unwrap();
    assert_eq!(result.affected, 1);
    assert_eq!(result.cascaded.len(), 4);

    assert!(g.fetch::<Course>(room.course.id).unwrap_err().is_not_found());
    assert!(g.fetch::<Lesson>(room.lesson.id).unwrap_err().is_not_found());
    assert!(g
        .fetch::<Assignment>(room.assignment.id)
        .unwrap_err()
        .is_not_found());
    assert!(g
        .fetch::<Submission>(room.submission.id)
        .unwrap_err()
        .is_not_found());
    assert!(g
        .fetch::<Enrollment>(room.enrollment.id)
        .unwrap_err()
        .is_not_found());

    // Users are untouched.
    g.fetch::<User>(room.teacher.id).unwrap();
    g.fetch::<User>(room.student.id).unwrap();
    assert!(g.lessons_for_course(room.course.id).unwrap().is_empty());
}

#[test]
fn test_teacher_delete_blocked_by_course() {
    let ctx = TestContext::new();
    let teacher = ctx.user("t@x.com", Role::Teacher);
    let course = ctx.course(&teacher);

    let err = ctx.gateway.remove::<User>(teacher.id).unwrap_err();
    assert!(err.is_referential(), "got {err}");

    ctx.gateway.fetch::<User>(teacher.id).unwrap();
    ctx.gateway.fetch::<Course>(course.id).unwrap();

    // Once the course is gone the teacher can be removed.
    ctx.gateway.remove::<Course>(course.id).unwrap();
    ctx.gateway.remove::<User>(teacher.id).unwrap();
}

#[test]
fn test_student_delete_blocked_by_submission() {
    let ctx = TestContext::new();
    let teacher = ctx.user("t@x.com", Role::Teacher);
    let student = ctx.user("s@x.com", Role::Student);
    let course = ctx.course(&teacher);
    let assignment = ctx
        .gateway
        .insert(NewAssignment::new(course.id, "Essay", 100))
        .unwrap();
    ctx.gateway
        .insert(NewSubmission::new(assignment.id, student.id))
        .unwrap();

    let err = ctx.gateway.remove::<User>(student.id).unwrap_err();
    assert!(err.is_referential());
    ctx.gateway.fetch::<User>(student.id).unwrap();
}

#[test]
fn test_grader_delete_blocked() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);
    let grader = ctx.user("g@x.com", Role::Teacher);

    let graded = ctx
        .gateway
        .grade_submission(room.submission.id, Grade::new(9.0, grader.id).with_feedback("ok"))
        .unwrap();
    assert!(graded.is_graded());
    assert_eq!(graded.graded_by_teacher_id, Some(grader.id));

    let err = ctx.gateway.remove::<User>(grader.id).unwrap_err();
    assert!(err.is_referential());
}

#[test]
fn test_grader_must_teach() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);

    let err = ctx
        .gateway
        .grade_submission(room.submission.id, Grade::new(5.0, room.student.id))
        .unwrap_err();
    assert!(err.is_referential());

    let err = ctx
        .gateway
        .grade_submission(room.submission.id, Grade::new(5.0, 999))
        .unwrap_err();
    assert!(err.is_referential());
}

#[test]
fn test_role_change_keeps_dependents_valid() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);
    let g = &ctx.gateway;

    // A teacher with a course cannot become a student.
    let err = g
        .update("User", room.teacher.id, vec![FieldValue::new("role", "STUDENT")])
        .unwrap_err();
    assert!(err.is_referential(), "got {err}");
    assert_eq!(g.fetch::<User>(room.teacher.id).unwrap().role, Role::Teacher);

    // A student with enrollments and submissions cannot become a teacher.
    let mut student = room.student.clone();
    student.role = Role::Teacher;
    assert!(g.save(&student).unwrap_err().is_referential());
    assert_eq!(g.fetch::<User>(room.student.id).unwrap().role, Role::Student);

    // Moving between allowed roles, or changing a user with no dependents, works.
    let admin = g
        .update("User", room.teacher.id, vec![FieldValue::new("role", "ADMIN")])
        .unwrap();
    assert_eq!(admin.get("role").and_then(|v| v.as_str()), Some("ADMIN"));
    let idle = ctx.user("idle@x.com", Role::Teacher);
    g.update("User", idle.id, vec![FieldValue::new("role", "STUDENT")])
        .unwrap();

    // The course can still be created for the promoted admin.
    ctx.course(&g.fetch::<User>(room.teacher.id).unwrap());
}

#[test]
fn test_course_teacher_role() {
    let ctx = TestContext::new();
    let student = ctx.user("s@x.com", Role::Student);

    let err = ctx
        .gateway
        .insert(NewCourse::draft("Rust", "programming", student.id))
        .unwrap_err();
    assert!(err.is_referential());

    let err = ctx
        .gateway
        .insert(NewCourse::draft("Rust", "programming", 77))
        .unwrap_err();
    assert!(err.is_referential());
}

#[test]
fn test_consultation_restricts_all_parents() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);
    let consultation: Consultation = ctx
        .gateway
        .insert(NewConsultation::new(
            room.teacher.id,
            room.student.id,
            room.course.id,
            Utc::now() + Duration::days(1),
            "Project scope",
        ))
        .unwrap();

    assert!(ctx.gateway.remove::<Course>(room.course.id).unwrap_err().is_referential());
    assert!(ctx.gateway.remove::<User>(room.teacher.id).unwrap_err().is_referential());

    // The failed course delete removed nothing from its cascade closure.
    ctx.gateway.fetch::<Lesson>(room.lesson.id).unwrap();
    ctx.gateway.fetch::<Submission>(room.submission.id).unwrap();

    ctx.gateway.remove::<Consultation>(consultation.id).unwrap();
    ctx.gateway.remove::<Course>(room.course.id).unwrap();
}

#[test]
fn test_validation_errors() {
    let ctx = TestContext::new();
    let teacher = ctx.user("t@x.com", Role::Teacher);

    let err = ctx
        .gateway
        .insert(NewUser::with_password("not-an-email", "pw", "A", "B", Role::Student).unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = ctx
        .gateway
        .insert(NewCourse::draft("  ", "programming", teacher.id))
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = ctx
        .gateway
        .create(
            "Course",
            vec![
                FieldValue::new("title", "Rust"),
                FieldValue::new("teacherId", teacher.id),
            ],
        )
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = ctx
        .gateway
        .update("User", teacher.id, vec![FieldValue::new("role", "JANITOR")])
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_batch_rolls_back() {
    let ctx = TestContext::new();
    let room = classroom(&ctx);

    let batch = MutationBatch::from_mutations(vec![
        Mutation::delete("Lesson", room.lesson.id),
        Mutation::delete("User", room.teacher.id),
    ]);
    let err = ctx.gateway.execute_batch(&batch).unwrap_err();
    assert!(err.is_referential());

    ctx.gateway.fetch::<Lesson>(room.lesson.id).unwrap();
}

#[test]
fn test_scenario_seed_then_rerun() {
    let ctx = TestContext::new();
    let seed = SeedConfig::new("admin@lms.local", "admin-pw");

    assert_eq!(
        ensure_seeded(&ctx.gateway, &seed).unwrap(),
        SeedOutcome::Created
    );
    assert_eq!(
        ensure_seeded(&ctx.gateway, &seed).unwrap(),
        SeedOutcome::AlreadyPresent
    );

    let users: Vec<User> = ctx.gateway.fetch_all().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, ADMIN_ID);
    assert_eq!(users[0].role, Role::Admin);

    // The admin may teach.
    let course = ctx.course(&users[0]);
    assert_eq!(course.teacher_id, ADMIN_ID);
}

#[test]
fn test_rows_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::new(dir.path().join("lms")).with_flush_every_ms(None);

    let course_id = {
        let gateway = Gateway::open(&config).unwrap();
        ensure_seeded(&gateway, &SeedConfig::new("admin@lms.local", "pw")).unwrap();
        let detail = gateway
            .create_course_with_lessons(
                NewCourse::draft("Rust", "programming", ADMIN_ID),
                vec![NewLesson::new(0, "Two", 2), NewLesson::new(0, "One", 1)],
            )
            .unwrap();
        gateway.database().flush().unwrap();
        detail.course.id
    };

    let gateway = Gateway::open(&config).unwrap();
    assert_eq!(gateway.database().schema_version(), 1);

    let titles: Vec<String> = gateway
        .lessons_for_course(course_id)
        .unwrap()
        .into_iter()
        .map(|l| l.title)
        .collect();
    assert_eq!(titles, ["One", "Two"]);

    // Unique keys and sequences persisted with the rows.
    assert!(gateway
        .insert(NewUser::with_password("admin@lms.local", "pw", "A", "B", Role::Admin).unwrap())
        .unwrap_err()
        .is_unique_violation());
    let next = gateway
        .insert(NewUser::with_password("t@x.com", "pw", "T", "T", Role::Teacher).unwrap())
        .unwrap();
    assert_eq!(next.id, 2);
}
