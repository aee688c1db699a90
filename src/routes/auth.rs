// Sign-in, sign-up and session endpoints

use axum::{
    extract::{
        Multipart, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;
use std::collections::HashMap;

use super::extract::AppJson;
use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{Credentials, ShopOwnerSignup},
    registration::{
        BasicInfo, BusinessDetails, KycDocuments, RegistrationError, RegistrationRequest, Role, SignupFlow,
        UploadedFile,
    },
    session::Session,
};

pub async fn login(
    State(app_state): State<AppState>,
    AppJson(credentials): AppJson<Credentials>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/auth/login for {}", credentials.email);
    let auth = app_state.backend.login(&credentials).await?;
    app_state.sessions.insert(&auth.access_token, auth.user.clone()).await;
    Ok(Json(auth))
}

pub async fn register(
    State(app_state): State<AppState>,
    AppJson(info): AppJson<BasicInfo>,
) -> AppResult<impl IntoResponse> {
    tracing::info!("[HANDLER] /api/auth/register for {}", info.email);

    let mut flow = SignupFlow::new();
    let submitted = flow
        .choose_role(Role::NormalUser)
        .and_then(|_| flow.submit_basic_info(info));
    if let Err(e) = submitted {
        tracing::info!("Sign-up stopped at {}: {}", flow.step(), e);
        return Err(e.into());
    }
    let RegistrationRequest::Normal(signup) = flow.finish()? else {
        return Err(AppError::InternalServerError(anyhow::anyhow!(
            "Normal sign-up produced a shop owner application"
        )));
    };

    let auth = app_state.backend.register(&signup).await?;
    app_state.sessions.insert(&auth.access_token, auth.user.clone()).await;
    Ok(Json(auth))
}

fn upload_error(error: MultipartError, limit_mb: usize, context: &str) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Uploads are limited to {} MB in total", limit_mb))
    } else {
        AppError::BadRequest(format!("{}: {}", context, error.body_text()))
    }
}

async fn read_file(field: Field<'_>, name: &str, limit_mb: usize) -> AppResult<UploadedFile> {
    let file_name = field.file_name().unwrap_or(name).to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| upload_error(e, limit_mb, &format!("Failed to read upload '{}'", name)))?;
    Ok(UploadedFile {
        file_name,
        content_type,
        bytes: bytes.to_vec(),
    })
}

// Accepts the form's camelCase names as well as snake_case
fn take(fields: &mut HashMap<String, String>, camel: &str, snake: &str) -> String {
    fields
        .remove(camel)
        .or_else(|| fields.remove(snake))
        .unwrap_or_default()
}

fn parse_years(raw: &str) -> Result<u32, RegistrationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(RegistrationError::MissingField("Years in business"));
    }
    raw.parse()
        .map_err(|_| RegistrationError::Invalid("Years in business must be a whole number".into()))
}

fn submit_shop_owner_steps(
    flow: &mut SignupFlow,
    basic: BasicInfo,
    fields: &mut HashMap<String, String>,
    documents: KycDocuments,
) -> Result<(), RegistrationError> {
    flow.choose_role(Role::ShopOwner)?;
    flow.submit_basic_info(basic)?;
    flow.submit_business_details(BusinessDetails {
        business_name: take(fields, "businessName", "business_name"),
        business_address: take(fields, "businessAddress", "business_address"),
        business_type: take(fields, "businessType", "business_type"),
        years_in_business: parse_years(&take(fields, "yearsInBusiness", "years_in_business"))?,
        cnic_number: take(fields, "cnicNumber", "cnic_number"),
    })?;
    flow.submit_documents(documents)?;
    Ok(())
}

pub async fn register_shop_owner(
    State(app_state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<impl IntoResponse> {
    let mut multipart = multipart?;
    let limit_mb = app_state.settings.max_upload_mb;
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut documents = KycDocuments::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, limit_mb, "Invalid multipart body"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "businessLicense" | "business_license" => {
                documents.business_license = Some(read_file(field, &name, limit_mb).await?)
            }
            "cnicFront" | "cnic_front" => documents.cnic_front = Some(read_file(field, &name, limit_mb).await?),
            "cnicBack" | "cnic_back" => documents.cnic_back = Some(read_file(field, &name, limit_mb).await?),
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| upload_error(e, limit_mb, &format!("Failed to read field '{}'", name)))?;
                fields.insert(name, value);
            }
        }
    }

    let basic = BasicInfo {
        name: take(&mut fields, "name", "name"),
        email: take(&mut fields, "email", "email"),
        password: take(&mut fields, "password", "password"),
        confirm_password: take(&mut fields, "confirmPassword", "confirm_password"),
        phone: take(&mut fields, "phone", "phone"),
        city: take(&mut fields, "city", "city"),
    };
    let email = basic.email.clone();
    tracing::info!("[HANDLER] /api/auth/register-shop-owner for {}", email);

    let mut flow = SignupFlow::new();
    if let Err(e) = submit_shop_owner_steps(&mut flow, basic, &mut fields, documents) {
        tracing::info!("Shop owner sign-up for {} stopped at {}: {}", email, flow.step(), e);
        return Err(e.into());
    }
    let RegistrationRequest::ShopOwner(application) = flow.finish()? else {
        return Err(AppError::InternalServerError(anyhow::anyhow!(
            "Shop owner sign-up produced a normal registration"
        )));
    };

    let outcome = app_state.backend.register_shop_owner(&application).await?;
    match &outcome {
        ShopOwnerSignup::SignedIn(auth) => {
            app_state.sessions.insert(&auth.access_token, auth.user.clone()).await;
        }
        ShopOwnerSignup::PendingReview(ack) => {
            tracing::info!("Shop owner {} pending review: {}", email, ack.message);
        }
    }
    Ok(Json(outcome))
}

pub async fn current_user(session: Session) -> impl IntoResponse {
    Json(session.user)
}

pub async fn logout(State(app_state): State<AppState>, session: Session) -> impl IntoResponse {
    app_state.sessions.remove(&session.access_token).await;
    tracing::info!("[HANDLER] /api/auth/logout for {}", session.user.email);
    Json(json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use crate::{
        mock_backend::MockBackend,
        models::User,
        config::test_settings,
        routes::test_support::{body_json, router, router_with, send},
        session::tests::token_expiring_in,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use std::sync::Arc;

    fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn signup_body() -> serde_json::Value {
        serde_json::json!({
            "name": "Ahmed Raza",
            "email": "ahmed@example.com",
            "password": "Secret#123",
            "confirm_password": "Secret#123",
            "phone": "03001234567",
            "city": "Karachi"
        })
    }

    const BOUNDARY: &str = "phoneflip-boundary";

    fn multipart_body(text: &[(&str, &str)], files: &[&str], file_size: usize) -> Body {
        let content = "A".repeat(file_size);
        let mut body = String::new();
        for (name, value) in text {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for name in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.png\"\r\nContent-Type: image/png\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        Body::from(body)
    }

    fn shop_owner_request(files: &[&str]) -> Request<Body> {
        shop_owner_request_sized(files, 7)
    }

    fn shop_owner_request_sized(files: &[&str], file_size: usize) -> Request<Body> {
        let text = [
            ("name", "Khan Mobiles Owner"),
            ("email", "owner@khanmobiles.pk"),
            ("password", "Secret#123"),
            ("confirmPassword", "Secret#123"),
            ("phone", "03009876543"),
            ("city", "Lahore"),
            ("businessName", "Khan Mobiles"),
            ("businessAddress", "Hall Road"),
            ("businessType", "Mobile Phone Shop"),
            ("yearsInBusiness", "5"),
            ("cnicNumber", "35202-1234567-1"),
        ];
        Request::post("/api/auth/register-shop-owner")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(multipart_body(&text, files, file_size))
            .unwrap()
    }

    #[tokio::test]
    async fn register_then_use_the_session() {
        let backend = Arc::new(MockBackend::default());
        let response = send(router(backend.clone()), json_post("/api/auth/register", signup_body())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "ahmed@example.com");
        assert!(body["access_token"].is_string());

        let duplicate = send(router(backend), json_post("/api/auth/register", signup_body())).await;
        assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(duplicate).await["detail"], "Email already registered");
    }

    #[tokio::test]
    async fn register_rejects_mismatched_passwords_before_calling_backend() {
        let mut body = signup_body();
        body["confirm_password"] = "nope".into();
        let response = send(router(Arc::new(MockBackend::default())), json_post("/api/auth/register", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["detail"], "Passwords do not match");
    }

    #[tokio::test]
    async fn login_failure_is_unauthorized() {
        let backend = Arc::new(MockBackend::default());
        let response = send(
            router(backend),
            json_post("/api/auth/login", serde_json::json!({"email": "x@example.com", "password": "bad"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_and_logout_use_the_bearer_session() {
        let token = token_expiring_in(600);
        let user = User {
            id: Some("u1".into()),
            name: "Zara".into(),
            email: "zara@example.com".into(),
            phone: None,
            city: None,
            role: Some("normal_user".into()),
        };
        let backend = Arc::new(MockBackend::default().with_user(&token, user));
        let app = router(backend);

        let me = Request::get("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let body = body_json(send(app.clone(), me).await).await;
        assert_eq!(body["name"], "Zara");

        let logout = Request::post("/api/auth/logout")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(app, logout).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_token_never_reaches_backend() {
        let token = token_expiring_in(-600);
        let me = Request::get("/api/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = send(router(Arc::new(MockBackend::default())), me).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["detail"], "Token expired");
    }

    #[tokio::test]
    async fn shop_owner_upload_runs_every_step() {
        let backend = Arc::new(MockBackend::default());
        let response = send(
            router(backend.clone()),
            shop_owner_request(&["businessLicense", "cnicFront", "cnicBack"]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "pending");

        let applications = backend.shop_applications();
        assert_eq!(applications.len(), 1);
        assert_eq!(applications[0].business.years_in_business, 5);
        assert_eq!(applications[0].documents.fields().len(), 3);
    }

    #[tokio::test]
    async fn shop_owner_without_documents_is_rejected() {
        let backend = Arc::new(MockBackend::default());
        let response = send(router(backend.clone()), shop_owner_request(&["businessLicense"])).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["detail"], "CNIC front is required");
        assert!(backend.shop_applications().is_empty());
    }

    const ALL_DOCUMENTS: [&str; 3] = ["businessLicense", "cnicFront", "cnicBack"];

    #[tokio::test]
    async fn phone_photo_sized_documents_are_accepted() {
        let backend = Arc::new(MockBackend::default());
        let response = send(
            router(backend.clone()),
            shop_owner_request_sized(&ALL_DOCUMENTS, 1024 * 1024),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let applications = backend.shop_applications();
        assert_eq!(applications.len(), 1);
        let cnic_front = applications[0].documents.cnic_front.as_ref().unwrap();
        assert_eq!(cnic_front.bytes.len(), 1024 * 1024);
    }

    #[tokio::test]
    async fn uploads_over_the_limit_are_413() {
        let backend = Arc::new(MockBackend::default());
        let settings = crate::config::Settings {
            max_upload_mb: 1,
            ..test_settings()
        };
        let response = send(
            router_with(settings, backend.clone()),
            shop_owner_request_sized(&ALL_DOCUMENTS, 1024 * 1024),
        )
        .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(response).await["detail"], "Uploads are limited to 1 MB in total");
        assert!(backend.shop_applications().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_gets_a_json_detail() {
        let request = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"email\": "))
            .unwrap();
        let response = send(router(Arc::new(MockBackend::default())), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let detail = body_json(response).await["detail"].as_str().unwrap().to_string();
        assert!(!detail.is_empty());
    }

    #[tokio::test]
    async fn shop_owner_sign_up_without_multipart_is_a_json_error() {
        let response = send(
            router(Arc::new(MockBackend::default())),
            json_post("/api/auth/register-shop-owner", signup_body()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["detail"].is_string());
    }
}
