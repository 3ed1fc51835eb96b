//! # API Layer
//!
//! Bridges the AWS Cognito Identity Provider wire protocol with the
//! domain layer in [`crate::auth`], [`crate::admin`], and
//! [`crate::facade`].
//!
//! | Module       | Responsibility                                         |
//! |--------------|---------------------------------------------------------|
//! | [`dto`]      | `PascalCase` request/response shapes, `From` conversions |
//! | [`handlers`] | One `async fn` per operation, `Result<HttpResponse, ApiError>` |
//! | [`routes`]   | `X-Amz-Target` → handler registration                   |

pub mod dto;
pub mod handlers;
pub mod routes;

#[cfg(test)]
mod tests;
