use actix_web::HttpResponse;
use serde::Serialize;

use super::error::Res;

/// JSON success responses for RPC handlers.
pub struct Success;
impl Success {
    pub fn ok<T: Serialize>(body: T) -> Res<HttpResponse> {
        Ok(HttpResponse::Ok().json(body))
    }
}
