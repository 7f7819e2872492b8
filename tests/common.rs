use std::{collections::HashMap, sync::Arc};

use astrohub::{
    auth::hash_password,
    build_server_with,
    external::{GeoLocator, MemoryMailer, OAuthProvider, StaticLocator},
    model::{
        CrudRepository, DbConnection,
        entity::{
            Course, CourseCreate, CourseModule, CourseModuleCreate, Quiz, QuizCreate, UserEntity,
            UserEntityCreateUpdate,
        },
        quiz_format,
    },
    web::{AppState, AuthenticatedUser, Services, UserRole},
};
use axum::http::{HeaderName, HeaderValue, StatusCode, header::LOCATION};
use axum_test::TestServer;
use serde_json::Value;
use tower_cookies::Cookie;
use uuid::Uuid;

pub const PASSWORD: &str = "stardust42";

/// Server over a private in-memory database, with recording test doubles for mail,
/// geolocation and OAuth.
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub mailer: MemoryMailer,
}

pub async fn setup_app() -> TestApp {
    setup_app_with(StaticLocator::none(), None).await
}

#[allow(unused)]
pub async fn setup_app_with(
    geo: StaticLocator,
    oauth: Option<Arc<dyn OAuthProvider>>,
) -> TestApp {
    setup_app_from(MemoryMailer::new(), geo, oauth).await
}

pub async fn setup_app_from(
    mailer: MemoryMailer,
    geo: StaticLocator,
    oauth: Option<Arc<dyn OAuthProvider>>,
) -> TestApp {
    let db = DbConnection::in_memory().await.unwrap();
    db.migrate().await.unwrap();

    let services = Services {
        mailer: Arc::new(mailer.clone()),
        geo: Arc::new(geo) as Arc<dyn GeoLocator>,
        oauth,
    };

    let (state, app) = build_server_with(db, services).await.unwrap();
    TestApp {
        server: TestServer::new(app).unwrap(),
        state,
        mailer,
    }
}

// Direct fixtures, bypassing the HTTP surface.

pub async fn create_user(state: &AppState, username: &str, country: Option<&str>) -> UserEntity {
    let mut user = UserEntity::create(
        state.pool(),
        &AuthenticatedUser::admin(),
        UserEntityCreateUpdate {
            username: username.to_string(),
            email: format!("{}@example.com", username.to_lowercase()),
            password_hash: hash_password(PASSWORD).unwrap(),
            role: UserRole::User.to_string(),
            is_verified: true,
        },
    )
    .await
    .unwrap();
    if let Some(country) = country {
        user.set_country(state.pool(), country).await.unwrap();
    }
    user
}

pub async fn create_course(state: &AppState, title: &str, region: &str, price_cents: i64) -> Course {
    Course::create(
        state.pool(),
        &AuthenticatedUser::admin(),
        CourseCreate {
            title: title.to_string(),
            description: format!("All about {title}"),
            subject: String::from("Astronomy"),
            level: String::from("Beginner"),
            standard: String::from("High School"),
            region: region.to_string(),
            price_cents,
            currency: String::from("USD"),
            instructor_id: None,
        },
    )
    .await
    .unwrap()
}

pub async fn create_module(state: &AppState, course: &Course, title: &str, order: i64) -> CourseModule {
    CourseModule::create(
        state.pool(),
        &AuthenticatedUser::admin(),
        CourseModuleCreate {
            course_id: course.id(),
            module_title: title.to_string(),
            module_content: format!("Notes on {title}"),
            video_url: None,
            module_order: order,
        },
    )
    .await
    .unwrap()
}

/// Two questions: the correct answers are option 0 and option 1.
pub const QUIZ_TEXT: &str = "Closest star to Earth?\n*The Sun\nProxima Centauri\n\nLargest planet?\nSaturn\n*Jupiter\nNeptune";

pub async fn create_quiz(state: &AppState, module: &CourseModule) -> Quiz {
    Quiz::create(
        state.pool(),
        &AuthenticatedUser::admin(),
        QuizCreate {
            module_id: module.id(),
            quiz_title: String::from("Checkpoint"),
            questions: quiz_format::parse(QUIZ_TEXT).unwrap(),
        },
    )
    .await
    .unwrap()
}

pub struct FlowContext {
    pub store: HashMap<&'static str, Value>, // a way to pass data between steps
}

impl FlowContext {
    pub fn new() -> Self {
        Self {
            store: HashMap::new(),
        }
    }

    pub fn store(&mut self, key: &'static str, val: Value) {
        self.store.insert(key, val);
    }

    #[allow(unused)]
    pub fn get(&self, key: &str) -> &Value {
        self.store.get(key).expect("missing store key")
    }
}

pub struct Action {
    #[allow(unused)]
    pub name: &'static str,
    pub method: &'static str,
    pub path: String,
    pub form: Option<Vec<(String, String)>>,
    pub dyn_form: Option<Box<dyn Fn(&FlowContext) -> Vec<(String, String)> + Send + Sync>>,
    pub headers: Vec<(&'static str, String)>,
    pub expect: StatusCode,
    pub location: Option<String>,
    pub clear_cookies: bool,
    pub save_cookies: bool,
    pub query_params: Vec<(String, String)>,
    pub cookie_asserts: Vec<(&'static str, Box<dyn Fn(&Cookie) + Send + Sync>)>,
    pub body_asserts: Vec<Box<dyn Fn(&str) + Send + Sync>>,
    pub save_as: Option<&'static str>,
}

impl Action {
    pub fn new(name: &'static str, method: &'static str, path: impl Into<String>) -> Self {
        Self {
            name,
            method,
            path: path.into(),
            form: None,
            dyn_form: None,
            headers: vec![],
            expect: StatusCode::OK,
            location: None,
            clear_cookies: false,
            save_cookies: true,
            query_params: vec![],
            cookie_asserts: vec![],
            body_asserts: vec![],
            save_as: None,
        }
    }

    pub fn with_form(mut self, fields: &[(&str, &str)]) -> Self {
        self.form = Some(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    #[allow(unused)]
    pub fn with_dyn_form<F>(mut self, f: F) -> Self
    where
        F: Fn(&FlowContext) -> Vec<(String, String)> + Send + Sync + 'static,
    {
        self.dyn_form = Some(Box::new(f));
        self
    }

    #[allow(unused)]
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn with_expect(mut self, expect: StatusCode) -> Self {
        self.expect = expect;
        self
    }

    /// Expects a `303 See Other` to exactly `location`.
    pub fn expect_redirect(mut self, location: &str) -> Self {
        self.expect = StatusCode::SEE_OTHER;
        self.location = Some(location.to_string());
        self
    }

    #[allow(unused)]
    pub fn with_save_cookies(mut self, save_cookies: bool) -> Self {
        self.save_cookies = save_cookies;
        self
    }

    pub fn with_clear_cookies(mut self, clear_cookies: bool) -> Self {
        self.clear_cookies = clear_cookies;
        self
    }

    #[allow(unused)]
    pub fn with_param(mut self, key: &str, val: &str) -> Self {
        self.query_params.push((String::from(key), String::from(val)));
        self
    }

    #[allow(unused)]
    pub fn with_save_as(mut self, key: &'static str) -> Self {
        self.save_as = Some(key);
        self
    }

    #[allow(unused)]
    pub fn assert_cookie<F>(mut self, name: &'static str, check: F) -> Self
    where
        F: Fn(&Cookie) + Send + Sync + 'static,
    {
        self.cookie_asserts.push((name, Box::new(check)));
        self
    }

    pub fn assert_body<F>(mut self, check: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.body_asserts.push(Box::new(check));
        self
    }

    pub fn assert_text(self, needle: &'static str) -> Self {
        self.assert_body(move |body| {
            assert!(body.contains(needle), "expected `{needle}` in:\n{body}");
        })
    }

    #[allow(unused)]
    pub fn assert_no_text(self, needle: &'static str) -> Self {
        self.assert_body(move |body| {
            assert!(!body.contains(needle), "unexpected `{needle}` in:\n{body}");
        })
    }
}

pub struct Flow {
    actions: Vec<Action>,
}

impl Flow {
    pub fn new() -> Self {
        Self { actions: vec![] }
    }

    pub fn step(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub async fn run(self, server: &mut TestServer) {
        let mut ctx = FlowContext::new(); // create new context for this flow
        for action in self.actions {
            println!("==> Running test action `{}`", action.name);
            if action.clear_cookies {
                server.clear_cookies();
            }

            if action.save_cookies {
                server.save_cookies();
            } else {
                server.do_not_save_cookies();
            }

            let mut req = match action.method {
                "GET" => server.get(&action.path),
                "POST" => server.post(&action.path),
                "PUT" => server.put(&action.path),
                "DELETE" => server.delete(&action.path),
                _ => panic!("unsupported method {}", action.method),
            };

            match (action.dyn_form, action.form) {
                (Some(f), _) => req = req.form(&f(&ctx)),
                (_, Some(fields)) => req = req.form(&fields),
                _ => {}
            }

            for (name, value) in action.headers {
                req = req.add_header(
                    HeaderName::from_static(name),
                    HeaderValue::from_str(&value).unwrap(),
                );
            }

            for (k, v) in action.query_params {
                req = req.add_query_param(&k, v);
            }

            let resp = req.await;
            resp.assert_status(action.expect);

            if let Some(expected) = action.location {
                let location = resp
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_else(|| panic!("`{}` did not redirect", action.name));
                assert_eq!(location, expected);
            }

            let cookies = resp.cookies();
            for (cookie_name, check) in action.cookie_asserts {
                let cookie = cookies
                    .get(cookie_name)
                    .unwrap_or_else(|| panic!("Cookie {} is not set", cookie_name));
                check(cookie);
            }

            if !action.body_asserts.is_empty() {
                let body = resp.text();
                for check in action.body_asserts {
                    check(&body);
                }
            }

            if let Some(save_key) = action.save_as {
                ctx.store(save_key, resp.json::<Value>());
            }
        }
    }
}

// Common actions builders

pub fn login_action(identity: &str, password: &str) -> Action {
    Action::new("login", "POST", "/auth/login")
        .with_form(&[("username", identity), ("password", password)])
}

pub fn login_admin_action() -> Action {
    login_action("admin", "admin123").expect_redirect("/admin/dashboard")
}

pub fn register_action(username: &str, email: &str, password: &str) -> Action {
    Action::new("register", "POST", "/auth/register").with_form(&[
        ("username", username),
        ("email", email),
        ("password", password),
    ])
}

pub fn logout_action() -> Action {
    Action::new("logout", "POST", "/auth/logout").expect_redirect("/")
}

#[allow(unused)]
pub fn id_path(prefix: &str, id: Uuid) -> String {
    format!("{prefix}{id}")
}
