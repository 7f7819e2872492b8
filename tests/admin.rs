mod common;

use astrohub::{
    model::{
        CrudRepository,
        entity::{
            Course, CourseFilter, CourseModule, CoursePrice, DailyBriefing, Notification, Quiz,
            UserEntity,
        },
    },
    web::{AuthenticatedUser, UserRole},
};
use axum::http::StatusCode;

use crate::common::{
    Action, Flow, PASSWORD, QUIZ_TEXT, create_course, create_module, create_quiz, create_user,
    login_action, login_admin_action, logout_action, setup_app,
};

const COURSE_FORM: &[(&str, &str)] = &[
    ("title", "Exoplanet Hunting"),
    ("description", "Transit photometry for beginners"),
    ("subject", "Astrophysics"),
    ("level", "Intermediate"),
    ("standard", "Undergraduate"),
    ("region", "fr"),
    ("price", "12.5"),
    ("currency", ""),
];

#[tokio::test]
async fn course_lifecycle() {
    let mut app = setup_app().await;

    Flow::new()
        .step(login_admin_action())
        .step(
            Action::new("incomplete course", "POST", "/admin/create-course")
                .with_form(&[("title", "Exoplanet Hunting"), ("subject", "Astrophysics")])
                .assert_text("All course fields including Academic Path are required.")
                .assert_text("Exoplanet Hunting"),
        )
        .step(
            Action::new("bad price", "POST", "/admin/create-course")
                .with_form(&[
                    ("title", "Exoplanet Hunting"),
                    ("description", "Transit photometry for beginners"),
                    ("subject", "Astrophysics"),
                    ("level", "Intermediate"),
                    ("standard", "Undergraduate"),
                    ("price", "-3"),
                ])
                .assert_text("Price must be a positive amount such as 19.99."),
        )
        .step(
            Action::new("create course", "POST", "/admin/create-course")
                .with_form(COURSE_FORM)
                .expect_redirect("/admin/manage-courses"),
        )
        .step(
            Action::new("manage courses", "GET", "/admin/manage-courses")
                .assert_text("created successfully.")
                .assert_text("Exoplanet Hunting")
                .assert_text("USD 12.50"),
        )
        .run(&mut app.server)
        .await;

    let actor = AuthenticatedUser::admin();
    let courses = Course::filtered(app.state.pool(), &actor, &CourseFilter::default())
        .await
        .unwrap();
    assert_eq!(courses.len(), 1);
    let course = &courses[0];
    assert_eq!(course.region(), "FR");
    assert_eq!(course.price_cents(), 1250);
    assert_eq!(course.currency(), "USD");
    assert!(course.instructor_id().is_some());

    let edit = format!("/admin/edit-course/{}", course.id());
    let prices = format!("/admin/course/{}/prices", course.id());

    Flow::new()
        .step(Action::new("edit page", "GET", &edit).assert_text("Transit photometry"))
        .step(
            Action::new("edit course", "POST", &edit)
                .with_form(&[
                    ("title", "Exoplanet Hunting II"),
                    ("description", "Radial velocity too"),
                    ("subject", "Astrophysics"),
                    ("level", "Advanced"),
                    ("standard", "Undergraduate"),
                    ("region", ""),
                    ("price", ""),
                    ("currency", "EUR"),
                ])
                .expect_redirect("/admin/manage-courses"),
        )
        .step(
            Action::new("bad override", "POST", &prices)
                .with_form(&[("country", "France"), ("price", "9.99")])
                .expect_redirect(&edit),
        )
        .step(Action::new("edit page again", "GET", &edit).assert_text("Country must be a two-letter code."))
        .step(
            Action::new("price override", "POST", &prices)
                .with_form(&[("country", "in"), ("price", "499"), ("currency", "INR")])
                .expect_redirect(&edit),
        )
        .step(Action::new("edit page with price", "GET", &edit).assert_text("Price for IN saved."))
        .run(&mut app.server)
        .await;

    let course = Course::find_by_id(app.state.pool(), &actor, course.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(course.title(), "Exoplanet Hunting II");
    assert_eq!(course.region(), "GLOBAL");
    assert_eq!(course.price_cents(), 0);

    let price = CoursePrice::find_for(app.state.pool(), &actor, course.id(), "IN")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(price.price_cents(), 49900);

    Flow::new()
        .step(
            Action::new("drop override", "POST", format!("{prices}/IN/delete"))
                .expect_redirect(&edit),
        )
        .step(
            Action::new("delete course", "POST", format!("/admin/delete-course/{}", course.id()))
                .expect_redirect("/admin/manage-courses"),
        )
        .step(
            Action::new("courses after delete", "GET", "/admin/manage-courses")
                .assert_text("Course deleted successfully.")
                .assert_no_text("Exoplanet Hunting II"),
        )
        .run(&mut app.server)
        .await;

    assert!(
        Course::find_by_id(app.state.pool(), &actor, course.id())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn modules_and_quizzes() {
    let mut app = setup_app().await;
    let course = create_course(&app.state, "Orbital Mechanics", "GLOBAL", 0).await;
    let create_module_path = format!("/admin/create-module/{}", course.id());
    let course_page = format!("/admin/course/{}", course.id());

    Flow::new()
        .step(login_admin_action())
        .step(Action::new("module form", "GET", &create_module_path))
        .step(
            Action::new("module without order", "POST", &create_module_path)
                .with_form(&[("title", "Hohmann Transfers"), ("description", "Two burns")])
                .assert_text("Title, Description, and Order are required."),
        )
        .step(
            Action::new("create module", "POST", &create_module_path)
                .with_form(&[
                    ("title", "Hohmann Transfers"),
                    ("description", "Two burns"),
                    ("video_url", ""),
                    ("module_number", "1"),
                ])
                .expect_redirect(&course_page),
        )
        .step(
            Action::new("course modules", "GET", &course_page)
                .assert_text("created successfully!")
                .assert_text("Hohmann Transfers"),
        )
        .run(&mut app.server)
        .await;

    let actor = AuthenticatedUser::admin();
    let module = CourseModule::find_by_title(app.state.pool(), &actor, "Hohmann Transfers")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(module.order(), 1);
    assert!(module.video_url().is_none());

    let add_quiz = format!("/admin/modules/{}/add-quiz", module.id());

    Flow::new()
        .step(Action::new("quiz form", "GET", &add_quiz).assert_text("Deploy Quiz"))
        .step(
            Action::new("malformed quiz", "POST", &add_quiz)
                .with_form(&[("quiz_title", "Checkpoint"), ("questions", "Only a question?\nYes\nNo")])
                .assert_text("Failed to save quiz: Question 1 must mark exactly one option with ")
                .assert_text("Only a question?"),
        )
        .step(
            Action::new("deploy quiz", "POST", &add_quiz)
                .with_form(&[("quiz_title", "Checkpoint"), ("questions", QUIZ_TEXT)])
                .expect_redirect(&course_page),
        )
        .step(Action::new("course modules again", "GET", &course_page).assert_text("Quiz deployed successfully!"))
        .run(&mut app.server)
        .await;

    let quiz = Quiz::find_for_module(app.state.pool(), &actor, module.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quiz.questions(app.state.pool()).await.unwrap().len(), 2);

    let edit_quiz = format!("/admin/quiz/edit/{}", quiz.id());

    Flow::new()
        .step(Action::new("second quiz", "GET", &add_quiz).expect_redirect(&edit_quiz))
        .step(Action::new("edit form", "GET", &edit_quiz).assert_text("*The Sun"))
        .step(
            Action::new("edit quiz", "POST", &edit_quiz)
                .with_form(&[("quiz_title", "Final Check"), ("questions", "Is Pluto a planet?\nYes\n*No")])
                .expect_redirect(&course_page),
        )
        .run(&mut app.server)
        .await;

    let quiz = Quiz::find_for_module(app.state.pool(), &actor, module.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(quiz.title(), "Final Check");
    let questions = quiz.questions(app.state.pool()).await.unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].correct_index(), 1);

    Flow::new()
        .step(
            Action::new(
                "delete module",
                "POST",
                format!("/admin/delete-module/{}/{}", course.id(), module.id()),
            )
            .expect_redirect(&course_page),
        )
        .run(&mut app.server)
        .await;

    assert!(
        Quiz::find_for_module(app.state.pool(), &actor, module.id())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn user_management() {
    let mut app = setup_app().await;
    let lyra = create_user(&app.state, "Lyra", Some("US")).await;
    let deneb = create_user(&app.state, "Deneb", Some("US")).await;
    let admin = UserEntity::find_by_username(app.state.pool(), &AuthenticatedUser::admin(), "admin")
        .await
        .unwrap()
        .unwrap();

    let lyra_id = lyra.id().to_string();
    let admin_id = admin.id().to_string();

    Flow::new()
        .step(login_admin_action())
        .step(Action::new("users", "GET", "/admin/manage-users").assert_text("Deneb"))
        .step(
            Action::new("promote", "POST", "/admin/user/role")
                .with_form(&[("userId", lyra_id.as_str()), ("newRole", "admin")])
                .expect_redirect("/admin/manage-users"),
        )
        .step(Action::new("users after promote", "GET", "/admin/manage-users").assert_text("User role updated to admin."))
        .step(
            Action::new("demote self", "POST", "/admin/user/role")
                .with_form(&[("userId", admin_id.as_str()), ("newRole", "user")])
                .expect_redirect("/admin/manage-users"),
        )
        .step(Action::new("users after self", "GET", "/admin/manage-users").assert_text("You cannot change your own role!"))
        .step(
            Action::new("delete self", "POST", format!("/admin/delete-user/{admin_id}"))
                .expect_redirect("/admin/manage-users"),
        )
        .step(
            Action::new("users after self delete", "GET", "/admin/manage-users")
                .assert_text("You cannot delete your own account via the admin panel."),
        )
        .step(
            Action::new("delete user", "POST", format!("/admin/delete-user/{}", deneb.id()))
                .expect_redirect("/admin/manage-users"),
        )
        .step(
            Action::new("users after delete", "GET", "/admin/manage-users")
                .assert_text("User deleted successfully.")
                .assert_no_text("Deneb"),
        )
        .step(logout_action())
        .step(login_action("Lyra", PASSWORD).expect_redirect("/admin/dashboard"))
        .run(&mut app.server)
        .await;

    let actor = AuthenticatedUser::admin();
    let lyra = UserEntity::find_by_id(app.state.pool(), &actor, lyra.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lyra.role(), UserRole::Admin);
    assert!(
        UserEntity::find_by_id(app.state.pool(), &actor, deneb.id())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn daily_fact_and_broadcast() {
    let mut app = setup_app().await;
    let lyra = create_user(&app.state, "Lyra", Some("US")).await;
    create_user(&app.state, "Deneb", Some("US")).await;

    Flow::new()
        .step(login_admin_action())
        .step(
            Action::new("empty fact", "POST", "/admin/update-fact")
                .with_form(&[("factText", "   ")])
                .expect_redirect("/admin/manage-fact"),
        )
        .step(Action::new("fact page", "GET", "/admin/manage-fact").assert_text("Fact content cannot be empty."))
        .step(
            Action::new("update fact", "POST", "/admin/update-fact")
                .with_form(&[("factText", "A day on Venus is longer than its year.")])
                .expect_redirect("/admin/dashboard"),
        )
        .step(
            Action::new("empty broadcast", "POST", "/admin/broadcast")
                .with_form(&[("title", "Maintenance"), ("message", "")])
                .assert_text("Title and message are required."),
        )
        .step(
            Action::new("broadcast", "POST", "/admin/broadcast")
                .with_form(&[("title", "Maintenance"), ("message", "Back at dawn."), ("kind", "System")])
                .expect_redirect("/admin/dashboard"),
        )
        .step(
            Action::new("dashboard", "GET", "/admin/dashboard")
                .assert_text("Broadcast successful: Signal transmitted to 3 users."),
        )
        .step(Action::new("analytics", "GET", "/admin/analytics"))
        .step(logout_action())
        .step(
            Action::new("explorer home", "GET", "/")
                .assert_text("A day on Venus is longer than its year."),
        )
        .run(&mut app.server)
        .await;

    let actor = AuthenticatedUser::admin();
    let fact = DailyBriefing::current(app.state.pool(), &actor).await.unwrap();
    assert_eq!(fact.content(), "A day on Venus is longer than its year.");

    let inbox = Notification::latest_for_user(app.state.pool(), &actor, lyra.id(), 15)
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind(), "system");
    assert_eq!(inbox[0].title(), "Maintenance");
}

#[tokio::test]
async fn analytics_lists_every_course() {
    let mut app = setup_app().await;
    let course = create_course(&app.state, "Stellar Neighbours", "GLOBAL", 0).await;
    let module = create_module(&app.state, &course, "Nearby Stars", 1).await;
    create_quiz(&app.state, &module).await;

    Flow::new()
        .step(login_admin_action())
        .step(
            Action::new("analytics", "GET", "/admin/analytics")
                .assert_text("Stellar Neighbours"),
        )
        .step(
            Action::new("unknown course", "GET", "/admin/course/nope")
                .with_expect(StatusCode::NOT_FOUND),
        )
        .run(&mut app.server)
        .await;
}
