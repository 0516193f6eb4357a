use actix_web::{error::JsonPayloadError, web};
use common::error::AppError;

pub mod routes {
    pub mod user;
}
pub mod services {
    pub mod lifecycle;
    pub(crate) mod loyalty;
    pub(crate) mod points;
    pub mod user;
}
pub mod dtos {
    pub mod user;
}
pub mod misc {
    pub mod email_template;
}
pub mod validation;

pub use services::user::{LoyaltyPolicy, UserService};

fn json_error(err: JsonPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Malformed request body: {}", err)).into()
}

/// The `UserService` RPC surface. Expects `web::Data<UserService>` in app data.
pub fn mount_users() -> actix_web::Scope {
    web::scope("/rpc/UserService")
        .app_data(web::JsonConfig::default().error_handler(json_error))
        .service(routes::user::post_save_or_update)
        .service(routes::user::post_find)
        .service(routes::user::post_find_one)
        .service(routes::user::post_find_one_by_email)
        .service(routes::user::post_clear_data)
        .service(routes::user::post_add_points)
        .service(routes::user::post_use_points)
        .service(routes::user::post_set_last_purchase_date)
        .service(routes::user::post_check_loyalty)
}
