//! # Route Configuration
//!
//! The wire protocol this emulator speaks has exactly one shape: `POST /`
//! with an `X-Amz-Target: AWSCognitoIdentityProviderService.<Operation>`
//! header selecting the operation. Rather than hand-rolling that dispatch
//! inside a single handler, each operation is registered as its own route
//! on the same path, guarded on the exact `X-Amz-Target` value — the
//! registry the design notes describe is this list of (guard, handler)
//! pairs, resolved by Actix's normal route-matching instead of a match
//! statement. Any request whose target doesn't match one of these falls
//! through to [`handlers::unsupported_operation`].
//!
//! ```text
//! /
//! ├── POST  (X-Amz-Target: ...InitiateAuth)                 → initiate_auth
//! ├── POST  (X-Amz-Target: ...RespondToAuthChallenge)        → respond_to_auth_challenge
//! ├── POST  (X-Amz-Target: ...SignUp)                        → sign_up
//! ├── POST  (X-Amz-Target: ...ConfirmSignUp)                 → confirm_sign_up
//! ├── POST  (X-Amz-Target: ...ForgotPassword)                → forgot_password
//! ├── POST  (X-Amz-Target: ...ConfirmForgotPassword)         → confirm_forgot_password
//! ├── POST  (X-Amz-Target: ...ChangePassword)                → change_password
//! ├── POST  (X-Amz-Target: ...GlobalSignOut)                 → global_sign_out
//! ├── POST  (X-Amz-Target: ...AdminUserGlobalSignOut)        → admin_user_global_sign_out
//! ├── POST  (X-Amz-Target: ...CreateUserPool)                → create_user_pool
//! ├── POST  (X-Amz-Target: ...CreateUserPoolClient)          → create_user_pool_client
//! ├── POST  (X-Amz-Target: ...CreateGroup)                   → create_group
//! ├── POST  (X-Amz-Target: ...DeleteGroup)                   → delete_group
//! ├── POST  (X-Amz-Target: ...GetGroup)                      → get_group
//! ├── POST  (X-Amz-Target: ...AdminAddUserToGroup)            → admin_add_user_to_group
//! ├── POST  (X-Amz-Target: ...AdminRemoveUserFromGroup)       → admin_remove_user_from_group
//! ├── POST  (X-Amz-Target: ...AdminCreateUser)                → admin_create_user
//! ├── POST  (X-Amz-Target: ...AdminDeleteUser)                → admin_delete_user
//! ├── POST  (X-Amz-Target: ...AdminUpdateUserAttributes)      → admin_update_user_attributes
//! ├── POST  (X-Amz-Target: ...ListUsers)                      → list_users
//! ├── POST  (else)                                            → unsupported_operation
//! ├── GET   /{user_pool_id}/.well-known/jwks.json             → jwks
//! ├── GET   /{user_pool_id}/.well-known/openid-configuration  → openid_configuration
//! └── GET   /health                                           → health_check
//! ```

use actix_web::{guard, web};

use super::handlers;

/// Builds a guard matching the exact `X-Amz-Target` value for `operation`.
/// The prefix is folded in at compile time via `concat!`, so every call
/// site below passes a literal and the guard holds a `&'static str`.
macro_rules! amz_target {
    ($operation:literal) => {
        guard::Header(
            "X-Amz-Target",
            concat!("AWSCognitoIdentityProviderService.", $operation),
        )
    };
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(handlers::health_check)))
        .service(
            web::resource("/{user_pool_id}/.well-known/jwks.json").route(web::get().to(handlers::jwks)),
        )
        .service(
            web::resource("/{user_pool_id}/.well-known/openid-configuration")
                .route(web::get().to(handlers::openid_configuration)),
        )
        .service(
            web::resource("/")
                .route(
                    web::post()
                        .guard(amz_target!("InitiateAuth"))
                        .to(handlers::initiate_auth),
                )
                .route(
                    web::post()
                        .guard(amz_target!("RespondToAuthChallenge"))
                        .to(handlers::respond_to_auth_challenge),
                )
                .route(web::post().guard(amz_target!("SignUp")).to(handlers::sign_up))
                .route(
                    web::post()
                        .guard(amz_target!("ConfirmSignUp"))
                        .to(handlers::confirm_sign_up),
                )
                .route(
                    web::post()
                        .guard(amz_target!("ForgotPassword"))
                        .to(handlers::forgot_password),
                )
                .route(
                    web::post()
                        .guard(amz_target!("ConfirmForgotPassword"))
                        .to(handlers::confirm_forgot_password),
                )
                .route(
                    web::post()
                        .guard(amz_target!("ChangePassword"))
                        .to(handlers::change_password),
                )
                .route(
                    web::post()
                        .guard(amz_target!("GlobalSignOut"))
                        .to(handlers::global_sign_out),
                )
                .route(
                    web::post()
                        .guard(amz_target!("AdminUserGlobalSignOut"))
                        .to(handlers::admin_user_global_sign_out),
                )
                .route(
                    web::post()
                        .guard(amz_target!("CreateUserPool"))
                        .to(handlers::create_user_pool),
                )
                .route(
                    web::post()
                        .guard(amz_target!("CreateUserPoolClient"))
                        .to(handlers::create_user_pool_client),
                )
                .route(web::post().guard(amz_target!("CreateGroup")).to(handlers::create_group))
                .route(web::post().guard(amz_target!("DeleteGroup")).to(handlers::delete_group))
                .route(web::post().guard(amz_target!("GetGroup")).to(handlers::get_group))
                .route(
                    web::post()
                        .guard(amz_target!("AdminAddUserToGroup"))
                        .to(handlers::admin_add_user_to_group),
                )
                .route(
                    web::post()
                        .guard(amz_target!("AdminRemoveUserFromGroup"))
                        .to(handlers::admin_remove_user_from_group),
                )
                .route(
                    web::post()
                        .guard(amz_target!("AdminCreateUser"))
                        .to(handlers::admin_create_user),
                )
                .route(
                    web::post()
                        .guard(amz_target!("AdminDeleteUser"))
                        .to(handlers::admin_delete_user),
                )
                .route(
                    web::post()
                        .guard(amz_target!("AdminUpdateUserAttributes"))
                        .to(handlers::admin_update_user_attributes),
                )
                .route(web::post().guard(amz_target!("ListUsers")).to(handlers::list_users))
                .route(web::post().to(handlers::unsupported_operation)),
        );
}
