use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::web::session::AUTH_TOKEN;

pub struct CookieAuthModifier;

impl Modify for CookieAuthModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(schema) = openapi.components.as_mut() {
            schema.add_security_scheme(
                "cookie",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    AUTH_TOKEN,
                    "Session token of the signed-in explorer",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::routes::notifications::notifications_list_handler,
        crate::web::routes::notifications::notifications_mark_read_handler,
        crate::web::routes::notifications::notifications_clear_handler,
        crate::web::routes::user::module_quiz_handler,
    ),
    modifiers(&CookieAuthModifier),
)]
pub struct ApiDoc;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn document_lists_json_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/notifications"));
        assert!(doc.paths.paths.contains_key("/api/notifications/clear"));
        assert!(doc.paths.paths.contains_key("/user/course/module/{id}/quiz"));
    }
}
