use actix_web::{Responder, post, web};
use common::{error::Res, http::Success};

use crate::{
    dtos::user::{
        DateUpdated, EmailAddressRequest, EmailList, FindRequest, LastPurchaseRequest,
        PaginatedUsers, PointsData, PointsResponse, UserDraft, UserIdRequest, YearsRequest,
    },
    services::user::UserService,
};

/// Creates a user, or updates it when the draft carries an id.
///
/// # Returns
///
/// The stored user, including its new version.
#[post("/saveOrUpdate")]
pub async fn post_save_or_update(
    service: web::Data<UserService>,
    req: web::Json<UserDraft>,
) -> Res<impl Responder> {
    let user = service.save_or_update(req.into_inner()).await?;
    Success::ok(user)
}

/// Paginated, sortable user listing.
#[post("/find")]
pub async fn post_find(
    service: web::Data<UserService>,
    req: web::Json<FindRequest>,
) -> Res<impl Responder> {
    let page = service.find(req.into_inner()).await?;
    Success::ok(PaginatedUsers {
        elements_number: page.total,
        users: page.items,
    })
}

#[post("/findOne")]
pub async fn post_find_one(
    service: web::Data<UserService>,
    req: web::Json<UserIdRequest>,
) -> Res<impl Responder> {
    Success::ok(service.find_one(req.id).await?)
}

#[post("/findOneByEmail")]
pub async fn post_find_one_by_email(
    service: web::Data<UserService>,
    req: web::Json<EmailAddressRequest>,
) -> Res<impl Responder> {
    Success::ok(service.find_one_by_email(&req.email_address).await?)
}

/// Anonymizes a user. The customer code and points survive.
#[post("/clearData")]
pub async fn post_clear_data(
    service: web::Data<UserService>,
    req: web::Json<UserIdRequest>,
) -> Res<impl Responder> {
    Success::ok(service.clear_data(req.id).await?)
}

/// # Returns
///
/// `{"points": <new balance>}`
#[post("/addPoints")]
pub async fn post_add_points(
    service: web::Data<UserService>,
    req: web::Json<PointsData>,
) -> Res<impl Responder> {
    let points = service.add_points(req.into_inner()).await?;
    Success::ok(PointsResponse { points })
}

/// # Returns
///
/// `{"points": <remaining balance>}`
#[post("/usePoints")]
pub async fn post_use_points(
    service: web::Data<UserService>,
    req: web::Json<PointsData>,
) -> Res<impl Responder> {
    let points = service.use_points(req.into_inner()).await?;
    Success::ok(PointsResponse { points })
}

#[post("/setLastPurchaseDate")]
pub async fn post_set_last_purchase_date(
    service: web::Data<UserService>,
    req: web::Json<LastPurchaseRequest>,
) -> Res<impl Responder> {
    let updated = service.set_last_purchase_date(req.date, req.user_id).await?;
    Success::ok(DateUpdated { updated })
}

/// Runs the loyalty expiry sweep.
///
/// # Returns
///
/// One email payload per demoted customer, for the mailer to send.
#[post("/checkLoyalty")]
pub async fn post_check_loyalty(
    service: web::Data<UserService>,
    req: web::Json<YearsRequest>,
) -> Res<impl Responder> {
    let email_templates = service.check_loyalty(req.year).await?;
    Success::ok(EmailList { email_templates })
}
