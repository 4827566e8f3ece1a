use std::sync::Arc;

use accounts::{Accounts, AccountsConfig};
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::test;
use api::create_app;
use api::state::AppState;
use auth::JwtKeys;
use db::MemoryStore;
use serde_json::{json, Value};

const PASSWORD: &str = "Str0ng-Passw0rd";

fn state() -> AppState {
    let config = AccountsConfig::new(JwtKeys::from_secret("test_secret_key"));
    let accounts = Accounts::new(Arc::new(MemoryStore::new()), config);
    AppState {
        jwt: accounts.jwt_keys().clone(),
        accounts,
        access_ttl: 900,
        refresh_ttl: 60 * 60 * 24 * 7,
        cookie_domain: "localhost".into(),
        cookie_secure: false,
    }
}

async fn send<S, R>(app: &S, req: R) -> (StatusCode, Value)
where
    S: Service<R, Response = ServiceResponse, Error = actix_web::Error>,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn with_token(req: test::TestRequest, token: &str) -> test::TestRequest {
    req.insert_header(("Authorization", format!("Bearer {token}")))
}

fn register_body(email: &str, name: &str, role: &str) -> Value {
    json!({
        "email": email,
        "name": name,
        "password": PASSWORD,
        "password_confirm": PASSWORD,
        "role": role,
    })
}

/// Register through the API and return `(user id, access token)`.
macro_rules! register {
    ($app:expr, $email:expr, $role:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(register_body($email, "Some Body", $role))
            .to_request();
        let (status, body) = send($app, req).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["data"]["user"]["id"].as_str().unwrap().to_string(),
            body["data"]["tokens"]["access"].as_str().unwrap().to_string(),
        )
    }};
}

fn doctor_body(email: &str, license: &str) -> Value {
    json!({
        "email": email,
        "name": "Gregory House",
        "password": "anything-goes",
        "specialization": "Diagnostics",
        "license_number": license,
        "experience_years": 12,
    })
}

#[actix_web::test]
async fn index_lists_endpoints() {
    let app = test::init_service(create_app(state())).await;
    let (status, body) = send(&app, test::TestRequest::get().uri("/").to_request()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["errors"].is_null());
    assert_eq!(body["data"]["endpoints"]["mappings"]["list_create"], "/api/mappings");
}

#[actix_web::test]
async fn register_login_refresh_logout() {
    let app = test::init_service(create_app(state())).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body(" Jane@X.com ", "Jane   Doe", "patient"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["user"]["email"], "jane@x.com");
    assert_eq!(body["data"]["user"]["name"], "Jane Doe");
    assert!(body["data"]["user"].get("password_hash").is_none());

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(register_body("JANE@x.com", "Jane Again", "patient"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["code"], "CONFLICT");
    assert_eq!(body["errors"]["fields"][0]["field"], "email");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "jane@x.com", "password": "wrong"}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"]["code"], "AUTHENTICATION_FAILED");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "jane@x.com", "password": PASSWORD}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.response().cookies().any(|c| c.name() == "access_token"));
    let body: Value = test::read_body_json(resp).await;
    let access = body["data"]["tokens"]["access"].as_str().unwrap().to_string();
    let refresh = body["data"]["tokens"]["refresh"].as_str().unwrap().to_string();
    assert!(access.starts_with("ey"));

    // the patient sees the profile created at registration
    let req = with_token(test::TestRequest::get().uri("/api/patients"), &access).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_count"], 1);
    assert_eq!(body["data"]["results"][0]["email"], "jane@x.com");

    // refresh via body rotates the token
    let req = test::TestRequest::post()
        .uri("/api/auth/token/refresh")
        .set_json(json!({"refresh": refresh}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let rotated = body["data"]["tokens"]["refresh"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/auth/token/refresh")
        .set_json(json!({"refresh": refresh}))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // refresh via cookie, then log out with it
    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .cookie(actix_web::cookie::Cookie::new("refresh_token", rotated.clone()))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = test::TestRequest::post()
        .uri("/api/auth/token/refresh")
        .cookie(actix_web::cookie::Cookie::new("refresh_token", rotated))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn doctor_lifecycle() {
    let app = test::init_service(create_app(state())).await;
    let (_, admin) = register!(&app, "admin@x.com", "admin");
    let (_, patient) = register!(&app, "p@x.com", "patient");

    let (status, body) = send(&app, test::TestRequest::get().uri("/api/doctors").to_request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"]["code"], "AUTHENTICATION_FAILED");

    let req = with_token(test::TestRequest::post().uri("/api/doctors"), &patient)
        .set_json(doctor_body("d@x.com", "md123"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errors"]["code"], "PERMISSION_DENIED");

    let req = with_token(test::TestRequest::post().uri("/api/doctors"), &admin)
        .set_json(doctor_body("d@x.com", "md123"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["license_number"], "MD123");
    assert_eq!(body["data"]["is_available"], true);
    let doctor_id = body["data"]["id"].as_str().unwrap().to_string();

    let req = with_token(test::TestRequest::post().uri("/api/doctors"), &admin)
        .set_json(doctor_body("d2@x.com", "MD123"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["code"], "CONFLICT");
    assert_eq!(body["errors"]["fields"][0]["field"], "license_number");

    let uri = format!("/api/doctors/{doctor_id}");
    let req = with_token(test::TestRequest::put().uri(&uri), &admin)
        .set_json(json!({"specialization": "Nephrology"}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["code"], "VALIDATION_ERROR");

    let req = with_token(test::TestRequest::patch().uri(&uri), &admin)
        .set_json(json!({"is_available": false, "phone": "+14155550123"}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["user"]["phone"], "+14155550123");

    let req = with_token(test::TestRequest::get().uri("/api/doctors/available"), &patient)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_count"], 0);

    // the doctor logs in, then loses access once deleted
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "d@x.com", "password": "anything-goes"}))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let req = with_token(test::TestRequest::delete().uri(&uri), &admin).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let req = with_token(test::TestRequest::get().uri(&uri), &admin).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"]["code"], "NOT_FOUND");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({"email": "d@x.com", "password": "anything-goes"}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["errors"]["code"], "ACCOUNT_DISABLED");
}

#[actix_web::test]
async fn patients_are_scoped_to_their_creator() {
    let app = test::init_service(create_app(state())).await;
    let (_, admin) = register!(&app, "admin@x.com", "admin");
    let (_, other_admin) = register!(&app, "boss@x.com", "admin");

    let req = with_token(test::TestRequest::post().uri("/api/patients"), &admin)
        .set_json(json!({
            "email": "p@x.com",
            "name": "Pat Ient",
            "password": "pw",
            "blood_group": "AB+",
            "emergency_contact": "+14155550123",
        }))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["blood_group"], "AB+");
    let uri = format!("/api/patients/{}", body["data"]["id"].as_str().unwrap());

    let req = with_token(test::TestRequest::get().uri(&uri), &other_admin).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = with_token(test::TestRequest::patch().uri(&uri), &admin)
        .set_json(json!({"allergies": "latex", "blood_group": null}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["allergies"], "latex");
    assert!(body["data"]["blood_group"].is_null());

    let req = with_token(test::TestRequest::get().uri("/api/patients/not-a-uuid"), &admin)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let req = with_token(test::TestRequest::get().uri("/api/patients?page=3"), &admin)
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Invalid page.");

    let req = with_token(test::TestRequest::delete().uri(&uri), &admin).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let req = with_token(test::TestRequest::get().uri("/api/patients"), &admin).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"]["total_count"], 0);
}

#[actix_web::test]
async fn mapping_lifecycle() {
    let app = test::init_service(create_app(state())).await;
    let (_, admin) = register!(&app, "admin@x.com", "admin");
    let (patient_id, patient) = register!(&app, "a@x.com", "patient");

    let req = with_token(test::TestRequest::post().uri("/api/doctors"), &admin)
        .set_json(doctor_body("doc@x.com", "MD123"))
        .to_request();
    let (_, body) = send(&app, req).await;
    let doctor_id = body["data"]["user_id"].as_str().unwrap().to_string();

    let assign = |notes: &str| {
        json!({"patient": patient_id, "doctor": doctor_id, "notes": notes})
    };

    let req = with_token(test::TestRequest::post().uri("/api/mappings"), &admin)
        .set_json(json!({"patient": patient_id, "doctor": patient_id}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["code"], "ROLE_MISMATCH");

    let req = with_token(test::TestRequest::post().uri("/api/mappings"), &admin)
        .set_json(assign("checkup"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["is_active"], true);
    let mapping_uri = format!("/api/mappings/{}", body["data"]["id"].as_str().unwrap());

    let req = with_token(test::TestRequest::post().uri("/api/mappings"), &admin)
        .set_json(assign("again"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["code"], "CONFLICT");

    let uri = format!("/api/mappings/patient/{patient_id}");
    let req = with_token(test::TestRequest::get().uri(&uri), &patient).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["assigned_doctors"][0]["notes"], "checkup");
    assert_eq!(
        body["data"]["assigned_doctors"][0]["doctor_profile"]["license_number"],
        "MD123"
    );

    // only the creator may change the mapping
    let req = with_token(test::TestRequest::patch().uri(&mapping_uri), &patient)
        .set_json(json!({"notes": "mine now"}))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = with_token(test::TestRequest::put().uri(&mapping_uri), &admin)
        .set_json(json!({"notes": "annual"}))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["notes"], "annual");

    let req = with_token(test::TestRequest::delete().uri(&mapping_uri), &admin).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let req = with_token(test::TestRequest::get().uri(&uri), &patient).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"]["count"], 0);

    let req = with_token(test::TestRequest::post().uri("/api/mappings"), &admin)
        .set_json(assign("follow-up"))
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(format!("/api/mappings/{}", body["data"]["id"].as_str().unwrap()), mapping_uri);

    let req = with_token(test::TestRequest::get().uri("/api/mappings"), &admin).to_request();
    let (_, body) = send(&app, req).await;
    assert_eq!(body["data"]["total_count"], 1);
}

#[actix_web::test]
async fn malformed_json_is_reported_in_the_envelope() {
    let app = test::init_service(create_app(state())).await;
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"]["code"], "VALIDATION_ERROR");
}
