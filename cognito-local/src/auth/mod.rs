//! # Authentication State Machine
//!
//! `InitiateAuth` / `RespondToAuthChallenge` and their public self-service
//! counterparts (`SignUp`, `ConfirmSignUp`, `ForgotPassword`,
//! `ConfirmForgotPassword`, `ChangePassword`, global sign-out). Each
//! operation is a small orchestrator over the facade, the trigger
//! runtime, the token generator, the OTP service, and the messages
//! service — one service struct, one method per use case, domain errors
//! propagated with `?`.

pub mod challenges;
pub mod context;
pub mod flow;
pub mod self_service;

pub use challenges::{ChallengeName, ChallengeStore, PendingChallenge};
pub use context::AuthContext;
pub use flow::{initiate_auth, respond_to_auth_challenge, AuthenticationResult, InitiateAuthOutcome};
pub use self_service::{
    admin_user_global_sign_out, change_password, confirm_forgot_password, confirm_sign_up, forgot_password,
    global_sign_out, sign_up, SignUpOutcome,
};
