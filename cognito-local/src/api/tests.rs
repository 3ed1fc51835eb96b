//! End-to-end scenarios driven through the actual HTTP surface
//! ([`actix_web::test`] against the configured [`super::routes`]), rather
//! than calling the domain layer directly — these are the literal
//! scenarios a wire-protocol conformance suite exercises.

use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::ChallengeStore;
use crate::clock::{RandomIdSource, SystemClock};
use crate::domain::{
    AppClient, MfaConfiguration, SchemaAttribute, TokenValidity, User, UserAttribute, UserPool, UserStatus,
};
use crate::facade::CognitoFacade;
use crate::messages::MessagesService;
use crate::otp::RandomOtpService;
use crate::tokens::keystore::KeyStore;
use crate::AppState;

fn temp_dir(label: &str) -> std::path::PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("cognito-local-scenario-{label}-{}", Uuid::new_v4()));
    dir
}

async fn test_state(label: &str) -> web::Data<AppState> {
    let data_dir = temp_dir(label);
    let keystore = KeyStore::load_or_generate(&data_dir.join("signing-key.pem")).unwrap();
    let facade = CognitoFacade::load(data_dir.clone(), "us-east-1".to_string()).await.unwrap();

    web::Data::new(AppState {
        facade,
        keystore,
        issuer_base_url: "http://localhost:9229".to_string(),
        clock: Arc::new(SystemClock),
        ids: Arc::new(RandomIdSource),
        otp: Arc::new(RandomOtpService),
        messages: MessagesService::new(data_dir.join("delivery-log.jsonl")),
        challenges: ChallengeStore::new(),
    })
}

async fn create_pool_and_client(
    state: &AppState,
    pool_id: &str,
    client_id: &str,
    mfa_configuration: MfaConfiguration,
) -> (UserPool, AppClient) {
    let now = Utc::now();
    let pool = state
        .facade
        .create_user_pool(UserPool {
            id: pool_id.to_string(),
            name: "scenario-pool".to_string(),
            mfa_configuration,
            password_policy: Default::default(),
            auto_verified_attributes: vec![],
            schema: vec![SchemaAttribute {
                name: "email".to_string(),
                attribute_data_type: crate::domain::AttributeDataType::String,
                mutable: true,
                required: false,
            }],
            lambda_config: HashMap::new(),
            token_validity: TokenValidity::default(),
            creation_date: now,
            last_modified_date: now,
        })
        .await
        .unwrap();

    let client = state
        .facade
        .create_app_client(AppClient {
            client_id: client_id.to_string(),
            user_pool_id: pool.id.clone(),
            client_name: "scenario-client".to_string(),
            client_secret: None,
            explicit_auth_flows: vec![],
            access_token_validity_seconds: None,
            id_token_validity_seconds: None,
            refresh_token_validity_seconds: None,
            read_attributes: vec![],
            write_attributes: vec![],
        })
        .await
        .unwrap();

    (pool, client)
}

async fn save_user(state: &AppState, pool_id: &str, user: User) -> User {
    let store = state.facade.pool(pool_id).await.unwrap();
    store.save_user(user, Utc::now()).await.unwrap()
}

fn base_user(username: &str, password: &str) -> User {
    let now = Utc::now();
    User {
        username: username.to_string(),
        sub: Uuid::new_v4(),
        attributes: vec![UserAttribute {
            name: "email".to_string(),
            value: format!("{username}@example.com"),
        }],
        password: password.to_string(),
        user_status: UserStatus::Confirmed,
        enabled: true,
        confirmation_code: None,
        mfa_code: None,
        mfa_options: vec![],
        user_mfa_setting_list: vec![],
        preferred_mfa_setting: None,
        refresh_tokens: Default::default(),
        creation_date: now,
        last_modified_date: now,
    }
}

#[actix_web::test]
async fn s1_password_login_without_mfa_returns_tokens() {
    let state = test_state("s1").await;
    create_pool_and_client(&state, "us-east-1_S1", "c1", MfaConfiguration::Off).await;
    save_user(&state, "us-east-1_S1", base_user("alice", "p@ss")).await;

    let app = test::init_service(App::new().app_data(state.clone()).configure(super::routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.InitiateAuth"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "AuthFlow": "USER_PASSWORD_AUTH",
            "AuthParameters": {"USERNAME": "alice", "PASSWORD": "p@ss"},
        }))
        .to_request();

    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: serde_json::Value = test::read_body_json(resp).await;
    let result = &body["AuthenticationResult"];
    assert!(result["AccessToken"].as_str().unwrap().len() > 0);
    assert!(result["IdToken"].as_str().unwrap().len() > 0);
    assert!(result["RefreshToken"].as_str().unwrap().len() > 0);

    let store = state.facade.pool("us-east-1_S1").await.unwrap();
    let alice = store.get_user_by_username("alice").await.unwrap();
    assert_eq!(alice.refresh_tokens.len(), 1);
    assert!(alice.refresh_tokens.contains(result["RefreshToken"].as_str().unwrap()));
}

#[actix_web::test]
async fn s2_s3_s4_mfa_challenge_then_completion_and_mismatch() {
    let state = test_state("s2").await;
    create_pool_and_client(&state, "us-east-1_S2", "c1", MfaConfiguration::On).await;
    let mut alice = base_user("alice", "p@ss");
    alice.user_mfa_setting_list = vec!["SOFTWARE_TOKEN_MFA".to_string()];
    save_user(&state, "us-east-1_S2", alice).await;

    let app = test::init_service(App::new().app_data(state.clone()).configure(super::routes::configure)).await;

    // S2: password login triggers the MFA challenge.
    let req = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.InitiateAuth"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "AuthFlow": "USER_PASSWORD_AUTH",
            "AuthParameters": {"USERNAME": "alice", "PASSWORD": "p@ss"},
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["ChallengeName"], "SOFTWARE_TOKEN_MFA");
    let session = body["Session"].as_str().unwrap().to_string();

    let store = state.facade.pool("us-east-1_S2").await.unwrap();
    let alice = store.get_user_by_username("alice").await.unwrap();
    assert_eq!(alice.mfa_code.as_deref(), Some("999999"));

    // S4: wrong code is rejected and does not consume the session.
    // (RespondToAuthChallenge sessions are single-use, so S4 must run
    // against a fresh challenge rather than reusing S2's.)
    let wrong_req = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.RespondToAuthChallenge"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "ChallengeName": "SOFTWARE_TOKEN_MFA",
            "Session": session,
            "ChallengeResponses": {"USERNAME": "alice", "SOFTWARE_TOKEN_MFA_CODE": "111111"},
        }))
        .to_request();
    let resp = test::call_service(&app, wrong_req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["__type"], "CodeMismatchException");

    // S3: a second challenge, completed with the right code.
    let req = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.InitiateAuth"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "AuthFlow": "USER_PASSWORD_AUTH",
            "AuthParameters": {"USERNAME": "alice", "PASSWORD": "p@ss"},
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let session = body["Session"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.RespondToAuthChallenge"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "ChallengeName": "SOFTWARE_TOKEN_MFA",
            "Session": session,
            "ChallengeResponses": {"USERNAME": "alice", "SOFTWARE_TOKEN_MFA_CODE": "999999"},
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["AuthenticationResult"]["AccessToken"].as_str().unwrap().len() > 0);

    let alice = store.get_user_by_username("alice").await.unwrap();
    assert!(alice.mfa_code.is_none());
}

#[actix_web::test]
async fn s5_refresh_auth_does_not_rotate_the_token() {
    let state = test_state("s5").await;
    create_pool_and_client(&state, "us-east-1_S5", "c1", MfaConfiguration::Off).await;
    save_user(&state, "us-east-1_S5", base_user("alice", "p@ss")).await;

    let app = test::init_service(App::new().app_data(state.clone()).configure(super::routes::configure)).await;

    let login = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.InitiateAuth"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "AuthFlow": "USER_PASSWORD_AUTH",
            "AuthParameters": {"USERNAME": "alice", "PASSWORD": "p@ss"},
        }))
        .to_request();
    let resp = test::call_service(&app, login).await;
    let body: serde_json::Value = test::read_body_json(resp).await;
    let refresh_token = body["AuthenticationResult"]["RefreshToken"].as_str().unwrap().to_string();

    let refresh = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.InitiateAuth"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "AuthParameters": {"REFRESH_TOKEN": refresh_token},
        }))
        .to_request();
    let resp = test::call_service(&app, refresh).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["AuthenticationResult"]["AccessToken"].as_str().unwrap().len() > 0);

    let store = state.facade.pool("us-east-1_S5").await.unwrap();
    let alice = store.get_user_by_username("alice").await.unwrap();
    assert_eq!(alice.refresh_tokens.len(), 1);
    assert!(alice.refresh_tokens.contains(&refresh_token));
}

#[actix_web::test]
async fn sign_up_and_confirm_round_trip_through_http() {
    let state = test_state("signup").await;
    create_pool_and_client(&state, "us-east-1_SU", "c1", MfaConfiguration::Off).await;

    let app = test::init_service(App::new().app_data(state.clone()).configure(super::routes::configure)).await;

    let sign_up = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.SignUp"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "Username": "carol",
            "Password": "p@ssword1",
            "UserAttributes": [{"Name": "email", "Value": "carol@example.com"}],
        }))
        .to_request();
    let resp = test::call_service(&app, sign_up).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["UserConfirmed"], false);

    let store = state.facade.pool("us-east-1_SU").await.unwrap();
    let carol = store.get_user_by_username("carol").await.unwrap();
    let code = carol.confirmation_code.clone().unwrap();

    let confirm = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.ConfirmSignUp"))
        .set_json(serde_json::json!({
            "ClientId": "c1",
            "Username": "carol",
            "ConfirmationCode": code,
        }))
        .to_request();
    let resp = test::call_service(&app, confirm).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let carol = store.get_user_by_username("carol").await.unwrap();
    assert_eq!(carol.user_status, UserStatus::Confirmed);
}

#[actix_web::test]
async fn unknown_target_is_rejected_as_unsupported_operation() {
    let state = test_state("unsupported").await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(super::routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/")
        .insert_header(("X-Amz-Target", "AWSCognitoIdentityProviderService.DescribeUserPool"))
        .set_json(serde_json::json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["__type"], "UnsupportedOperationException");
}

#[actix_web::test]
async fn jwks_endpoint_serves_the_pool_signing_key() {
    let state = test_state("jwks").await;
    create_pool_and_client(&state, "us-east-1_JWKS", "c1", MfaConfiguration::Off).await;
    let app = test::init_service(App::new().app_data(state.clone()).configure(super::routes::configure)).await;

    let req = test::TestRequest::get()
        .uri("/us-east-1_JWKS/.well-known/jwks.json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert!(body["keys"].as_array().unwrap().len() >= 1);
}
