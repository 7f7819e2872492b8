mod common;

use std::sync::Arc;

use astrohub::{
    external::{MemoryMailer, StaticLocator, StaticOAuth},
    model::entity::UserEntity,
    web::{AuthenticatedUser, flash::FLASH_COOKIE, session::AUTH_TOKEN},
};
use axum::http::StatusCode;
use tower_cookies::cookie::SameSite;

use crate::common::{
    Action, Flow, PASSWORD, create_user, login_action, login_admin_action, logout_action,
    register_action, setup_app, setup_app_from, setup_app_with,
};

#[tokio::test]
async fn register_verify_and_pick_country() {
    let mut app = setup_app().await;

    Flow::new()
        .step(register_action("vega", "vega@example.com", PASSWORD).expect_redirect("/auth/verify"))
        .step(Action::new("verify page", "GET", "/auth/verify").assert_text("vega@example.com"))
        .run(&mut app.server)
        .await;

    assert_eq!(app.mailer.sent_count(), 1);
    let otp = app.mailer.last_otp_for("vega@example.com").unwrap();
    assert_eq!(otp.len(), 6);

    Flow::new()
        .step(
            Action::new("wrong code", "POST", "/auth/verify")
                .with_form(&[("otp", "not-it")])
                .assert_text("Invalid code."),
        )
        .step(
            Action::new("verify", "POST", "/auth/verify")
                .with_form(&[("otp", otp.as_str())])
                .expect_redirect("/auth/select-country")
                .assert_cookie(AUTH_TOKEN, |cookie| {
                    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
                    assert_eq!(cookie.path(), Some("/"));
                    assert_eq!(cookie.http_only(), Some(true));
                }),
        )
        .step(
            Action::new("bad country", "POST", "/auth/update-country")
                .with_form(&[("country", "Germany")])
                .expect_redirect("/auth/select-country"),
        )
        .step(
            Action::new("select country", "GET", "/auth/select-country")
                .assert_text("Please select a valid country."),
        )
        .step(
            Action::new("update country", "POST", "/auth/update-country")
                .with_form(&[("country", "de")])
                .expect_redirect("/courses"),
        )
        .step(
            Action::new("catalog", "GET", "/courses")
                .assert_text("Profile updated! Showing courses for DE."),
        )
        .run(&mut app.server)
        .await;

    let user = UserEntity::find_by_username(app.state.pool(), &AuthenticatedUser::admin(), "vega")
        .await
        .unwrap()
        .unwrap();
    assert!(user.is_verified());
    assert_eq!(user.country(), Some("DE"));
}

#[tokio::test]
async fn registration_rejects_short_passwords_and_duplicates() {
    let mut app = setup_app().await;
    create_user(&app.state, "Lyra", Some("US")).await;

    Flow::new()
        .step(
            register_action("nova", "nova@example.com", "abc")
                .assert_text("Password must be at least 6 characters.")
                .assert_text("nova@example.com"),
        )
        .step(
            register_action("nova", "", PASSWORD).assert_text("All fields are required."),
        )
        .step(
            register_action("Lyra", "someone@example.com", PASSWORD)
                .assert_text("Username or Email already registered."),
        )
        .step(
            register_action("other", "lyra@example.com", PASSWORD)
                .assert_text("Username or Email already registered."),
        )
        .run(&mut app.server)
        .await;

    assert_eq!(app.mailer.sent_count(), 0);
}

#[tokio::test]
async fn failed_mail_delivery_is_reported() {
    let mut app = setup_app_from(MemoryMailer::failing(), StaticLocator::none(), None).await;

    Flow::new()
        .step(
            register_action("orion", "orion@example.com", PASSWORD)
                .assert_text("Server error during registration."),
        )
        .run(&mut app.server)
        .await;
}

#[tokio::test]
async fn login_by_username_or_email() {
    let mut app = setup_app().await;
    create_user(&app.state, "Lyra", Some("US")).await;
    create_user(&app.state, "Deneb", None).await;

    Flow::new()
        .step(login_action("Lyra", "wrong-password").assert_text("Invalid Identity or Access Key."))
        .step(login_action("nobody", PASSWORD).assert_text("Invalid Identity or Access Key."))
        .step(login_action("lyra@example.com", PASSWORD).expect_redirect("/"))
        .step(
            Action::new("login page while signed in", "GET", "/auth/login").expect_redirect("/"),
        )
        .step(logout_action())
        .step(login_action("Deneb", PASSWORD).expect_redirect("/auth/select-country"))
        .run(&mut app.server)
        .await;
}

#[tokio::test]
async fn unverified_accounts_are_sent_back_to_verification() {
    let mut app = setup_app().await;

    Flow::new()
        .step(register_action("rigel", "rigel@example.com", PASSWORD).expect_redirect("/auth/verify"))
        .step(
            login_action("rigel", PASSWORD)
                .with_clear_cookies(true)
                .assert_text("Account not verified."),
        )
        .step(
            Action::new("resend", "POST", "/auth/resend-otp").assert_text("New code sent!"),
        )
        .run(&mut app.server)
        .await;

    assert_eq!(app.mailer.sent_count(), 2);
}

#[tokio::test]
async fn admin_lands_on_the_dashboard() {
    let mut app = setup_app().await;
    create_user(&app.state, "Lyra", Some("US")).await;

    Flow::new()
        .step(login_admin_action())
        .step(Action::new("admin dashboard", "GET", "/admin/dashboard"))
        .step(logout_action())
        .step(
            Action::new("anonymous admin", "GET", "/admin/dashboard")
                .expect_redirect("/auth/login")
                .assert_cookie(FLASH_COOKIE, |_| {}),
        )
        .step(login_action("Lyra", PASSWORD).expect_redirect("/"))
        .step(
            Action::new("user on admin", "GET", "/admin/dashboard")
                .with_expect(StatusCode::FORBIDDEN),
        )
        .run(&mut app.server)
        .await;
}

#[tokio::test]
async fn protected_pages_redirect_guests_with_a_message() {
    let mut app = setup_app().await;

    Flow::new()
        .step(Action::new("settings", "GET", "/user/settings").expect_redirect("/auth/login"))
        .step(
            Action::new("login page", "GET", "/auth/login")
                .assert_text("You must be logged in to view this page."),
        )
        .run(&mut app.server)
        .await;
}

#[tokio::test]
async fn hand_made_flash_cookies_are_ignored() {
    let mut app = setup_app().await;
    let unsigned = "eyJraW5kIjoiZXJyb3IiLCJtZXNzYWdlIjoiUGxhbnRlZCBub3RpY2UifQ";

    Flow::new()
        .step(
            Action::new("login page", "GET", "/auth/login")
                .with_header("cookie", &format!("{FLASH_COOKIE}={unsigned}"))
                .assert_no_text("Planted notice"),
        )
        .step(Action::new("guarded page", "GET", "/user/settings").expect_redirect("/auth/login"))
        .step(
            Action::new("login page", "GET", "/auth/login")
                .assert_text("You must be logged in to view this page."),
        )
        .run(&mut app.server)
        .await;
}

#[tokio::test]
async fn google_sign_in_without_provider() {
    let mut app = setup_app().await;

    Flow::new()
        .step(Action::new("google", "GET", "/auth/google").expect_redirect("/auth/login"))
        .step(
            Action::new("login page", "GET", "/auth/login")
                .assert_text("Google sign-in is not available."),
        )
        .run(&mut app.server)
        .await;
}

#[tokio::test]
async fn google_sign_in_creates_a_verified_account() {
    let oauth = StaticOAuth::new("stargazer@example.com", "Star Gazer");
    let mut app = setup_app_with(StaticLocator::none(), Some(Arc::new(oauth))).await;

    app.server.save_cookies();
    let resp = app.server.get("/auth/google").await;
    resp.assert_status(StatusCode::SEE_OTHER);
    assert!(!resp.cookie("oauth_state").value().is_empty());

    Flow::new()
        .step(
            Action::new("forged state", "GET", "/auth/google/callback")
                .with_param("code", "abc")
                .with_param("state", "forged")
                .expect_redirect("/auth/login"),
        )
        .step(
            Action::new("login page", "GET", "/auth/login")
                .assert_text("Google sign-in failed. Please try again."),
        )
        .run(&mut app.server)
        .await;

    // the failed attempt consumed the stored state
    let resp = app.server.get("/auth/google").await;
    let state = resp.cookie("oauth_state").value().to_string();

    Flow::new()
        .step(
            Action::new("callback", "GET", "/auth/google/callback")
                .with_param("code", "abc")
                .with_param("state", &state)
                .expect_redirect("/auth/select-country"),
        )
        .run(&mut app.server)
        .await;

    let user = UserEntity::find_by_email(
        app.state.pool(),
        &AuthenticatedUser::admin(),
        "stargazer@example.com",
    )
    .await
    .unwrap()
    .unwrap();
    assert!(user.is_verified());
    assert!(user.username().starts_with("star"));

    Flow::new()
        .step(
            login_action("stargazer@example.com", "oauth")
                .with_clear_cookies(true)
                .assert_text("Invalid Identity or Access Key."),
        )
        .run(&mut app.server)
        .await;
}
