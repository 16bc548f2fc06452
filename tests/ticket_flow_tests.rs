// tests/ticket_flow_tests.rs
//
// Requires a running Postgres in DATABASE_URL; each test skips itself when
// the variable is not set.

use std::io::Cursor;

use quejas_backend::{
    config::Config,
    repository::{tickets, users::{self, NewUser}},
    routes,
    state::AppState,
    utils::hash::hash_password,
};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use sqlx::{PgPool, postgres::PgPoolOptions};

const PASSWORD: &str = "password123";

struct TestApp {
    address: String,
    pool: PgPool,
    client: reqwest::Client,
    _uploads: tempfile::TempDir,
    upload_root: std::path::PathBuf,
}

struct TestUser {
    id: i64,
    token: String,
}

/// Spawns the app on a random port, or returns None without a database.
async fn spawn_app() -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let uploads = tempfile::tempdir().unwrap();
    let config = Config {
        database_url,
        jwt_secret: "ticket_flow_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        upload_dir: uploads.path().to_path_buf(),
        admin_email: None,
        admin_password: None,
        port: 0,
    };

    let app = routes::create_router(AppState::new(pool.clone(), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Some(TestApp {
        address,
        pool,
        client: reqwest::Client::new(),
        upload_root: uploads.path().to_path_buf(),
        _uploads: uploads,
    })
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Provisions a user and logs in through the API.
    async fn user(&self, role: &str) -> TestUser {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let email = format!("u{}@uni.mx", &tag[..12]);
        let new_user = NewUser {
            email: email.clone(),
            password: hash_password(PASSWORD).unwrap(),
            user_code: format!("C{}", &tag[..12]),
            role: role.to_string(),
            name: "Ana".to_string(),
            last_name: "Ruiz".to_string(),
            study_area: "Ingeniería".to_string(),
            study_speciality: Some("Software".to_string()),
            term: 4,
        };
        let id = users::insert_user(&self.pool, &new_user).await.unwrap();

        let login: Value = self
            .client
            .post(self.url("/login"))
            .json(&serde_json::json!({ "email": email.to_uppercase(), "password": PASSWORD }))
            .send()
            .await
            .expect("Login failed")
            .json()
            .await
            .unwrap();
        assert_eq!(login["success"], true);

        TestUser {
            id,
            token: login["token"].as_str().expect("Token not found").to_string(),
        }
    }

    async fn create_ticket(&self, user: &TestUser, form: Form) -> reqwest::Response {
        self.client
            .post(self.url("/post"))
            .bearer_auth(&user.token)
            .multipart(form)
            .send()
            .await
            .expect("Create failed")
    }

    async fn resolve(&self, admin: &TestUser, id: i64, form: Form) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/tickets/{}/resolve", id)))
            .bearer_auth(&admin.token)
            .multipart(form)
            .send()
            .await
            .expect("Resolve failed")
    }

    async fn get_json(&self, user: &TestUser, path: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&user.token)
            .send()
            .await
            .expect("Request failed");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

fn ticket_form(category: &str, subject: &str) -> Form {
    Form::new()
        .text("type", "queja")
        .text("category", category.to_string())
        .text("subject", subject.to_string())
        .text("description", "El proyector no enciende.")
}

fn resolve_form(admin_response: &str, time_spent: &str) -> Form {
    Form::new()
        .text("assigned_to", "Mantenimiento")
        .text("admin_response", admin_response.to_string())
        .text("status", "resuelto")
        .text("resolution_date", "2025-03-10")
        .text("time_spent", time_spent.to_string())
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    buf.into_inner()
}

async fn count_responses(pool: &PgPool, complaint_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM complaint_responses WHERE complaint_id = $1")
        .bind(complaint_id)
        .fetch_one(pool)
        .await
}

async fn status_of(pool: &PgPool, id: i64) -> String {
    sqlx::query_scalar::<_, String>("SELECT status FROM complaints WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn created_ticket_starts_pending() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;

    let form = ticket_form("infraestructura", "Proyector roto en aula 301").text("status", "resuelto");
    let response = app.create_ticket(&student, form).await;

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "pendiente");
    let id = body["complaint_id"].as_i64().expect("complaint_id");
    assert_eq!(status_of(&app.pool, id).await, "pendiente");
}

#[tokio::test]
async fn short_subject_inserts_nothing() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;

    let response = app.create_ticket(&student, ticket_form("biblioteca", "Hi")).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["errors"][0].as_str().unwrap().contains("al menos 5"));
    let mine = tickets::list_tickets_for_user(&app.pool, student.id).await.unwrap();
    assert!(mine.is_empty());
}

#[tokio::test]
async fn category_filter_and_display_name() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let admin = app.user("admin").await;

    let body: Value = app
        .create_ticket(&student, ticket_form("biblioteca", "Faltan libros de cálculo"))
        .await
        .json()
        .await
        .unwrap();
    let id = body["complaint_id"].as_i64().unwrap();

    let find = |list: &Value| {
        list["tickets"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["id"].as_i64() == Some(id))
            .cloned()
    };

    let (_, all) = app.get_json(&admin, "/api/tickets").await;
    let listed = find(&all).expect("ticket in full list");
    assert_eq!(listed["category_name"], "Biblioteca");
    assert_eq!(listed["user_initials"], "AR");

    let (_, library) = app.get_json(&admin, "/api/tickets/filter/biblioteca").await;
    assert!(find(&library).is_some());

    let (_, cafeteria) = app.get_json(&admin, "/api/tickets/filter/cafeteria").await;
    assert!(find(&cafeteria).is_none());

    let (_, everything) = app.get_json(&admin, "/api/tickets/filter/todos").await;
    assert!(find(&everything).is_some());
}

#[tokio::test]
async fn resolving_twice_keeps_one_response() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let admin = app.user("admin").await;

    let body: Value = app
        .create_ticket(&student, ticket_form("infraestructura", "Fuga de agua en baños"))
        .await
        .json()
        .await
        .unwrap();
    let id = body["complaint_id"].as_i64().unwrap();

    let first = app.resolve(&admin, id, resolve_form("Se cerró la llave", "2.5")).await;
    assert_eq!(first.status().as_u16(), 200);
    assert_eq!(count_responses(&app.pool, id).await.unwrap(), 1);

    let second = app.resolve(&admin, id, resolve_form("Se cambió la tubería", "")).await;
    assert_eq!(second.status().as_u16(), 200);
    assert_eq!(count_responses(&app.pool, id).await.unwrap(), 1);

    let (status, detail) = app.get_json(&admin, &format!("/api/tickets/{}", id)).await;
    assert_eq!(status, 200);
    assert_eq!(detail["ticket"]["status"], "resuelto");
    assert_eq!(detail["ticket"]["response"]["admin_response"], "Se cambió la tubería");
    assert!(detail["ticket"]["response"]["time_spent"].is_null());
}

#[tokio::test]
async fn time_spent_out_of_range_is_rejected() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let admin = app.user("admin").await;

    let body: Value = app
        .create_ticket(&student, ticket_form("cafeteria", "Comida fría en la cafetería"))
        .await
        .json()
        .await
        .unwrap();
    let id = body["complaint_id"].as_i64().unwrap();

    let response = app.resolve(&admin, id, resolve_form("Revisado", "150")).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(count_responses(&app.pool, id).await.unwrap(), 0);
    assert_eq!(status_of(&app.pool, id).await, "pendiente");
}

#[tokio::test]
async fn set_status_is_idempotent() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let admin = app.user("admin").await;

    let body: Value = app
        .create_ticket(&student, ticket_form("seguridad", "Lámpara fundida en estacionamiento"))
        .await
        .json()
        .await
        .unwrap();
    let id = body["complaint_id"].as_i64().unwrap();

    for _ in 0..2 {
        let response = app
            .client
            .put(app.url(&format!("/api/tickets/{}/status", id)))
            .bearer_auth(&admin.token)
            .json(&serde_json::json!({ "status": "resuelto" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    assert_eq!(status_of(&app.pool, id).await, "resuelto");
    assert_eq!(count_responses(&app.pool, id).await.unwrap(), 0);

    let missing = app
        .client
        .put(app.url("/api/tickets/999999999/status"))
        .bearer_auth(&admin.token)
        .json(&serde_json::json!({ "status": "escalado" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn user_ticket_list_is_self_or_admin() {
    let Some(app) = spawn_app().await else { return };
    let student_a = app.user("student").await;
    let student_b = app.user("student").await;
    let admin = app.user("admin").await;
    let path = format!("/api/tickets/user/{}", student_a.id);

    assert_eq!(app.get_json(&student_a, &path).await.0, 200);
    assert_eq!(app.get_json(&admin, &path).await.0, 200);
    assert_eq!(app.get_json(&student_b, &path).await.0, 403);
}

#[tokio::test]
async fn attachments_are_stored_and_scaled() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let admin = app.user("admin").await;

    let form = ticket_form("laboratorios", "Microscopio descompuesto")
        .part(
            "attachments",
            Part::bytes(png(2400, 1200)).file_name("microscopio.png").mime_str("image/png").unwrap(),
        )
        .part(
            "attachments",
            Part::bytes(b"detalle del equipo".to_vec()).file_name("notas.txt").mime_str("text/plain").unwrap(),
        );
    let response = app.create_ticket(&student, form).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    let id = body["complaint_id"].as_i64().unwrap();

    let (_, detail) = app.get_json(&admin, &format!("/api/tickets/{}", id)).await;
    let image_path = detail["ticket"]["image_path"].as_str().expect("image path");
    assert_eq!(detail["ticket"]["attachments"].as_array().unwrap().len(), 2);

    let (w, h) = image::image_dimensions(app.upload_root.join(image_path)).unwrap();
    assert!(w <= 1920 && h <= 1080);
    assert_eq!((w, h), (1920, 960));
}

#[tokio::test]
async fn rejected_attachment_aborts_creation() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;

    let form = ticket_form("otros", "Archivo sospechoso adjunto").part(
        "attachments",
        Part::bytes(b"MZ".to_vec()).file_name("setup.exe").mime_str("application/octet-stream").unwrap(),
    );
    let response = app.create_ticket(&student, form).await;

    assert_eq!(response.status().as_u16(), 400);
    assert!(tickets::list_tickets_for_user(&app.pool, student.id).await.unwrap().is_empty());
    assert!(!app.upload_root.join("complaints").exists());
}

#[tokio::test]
async fn proof_image_with_wrong_type_writes_nothing() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let admin = app.user("admin").await;

    let body: Value = app
        .create_ticket(&student, ticket_form("docentes", "Profesor no asistió a clase"))
        .await
        .json()
        .await
        .unwrap();
    let id = body["complaint_id"].as_i64().unwrap();

    let form = resolve_form("Se habló con el docente", "1").part(
        "resolution_image",
        Part::bytes(png(8, 8)).file_name("prueba.png").mime_str("application/pdf").unwrap(),
    );
    let response = app.resolve(&admin, id, form).await;

    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(count_responses(&app.pool, id).await.unwrap(), 0);
    assert!(!app.upload_root.join("resolutions").exists());
}

#[tokio::test]
async fn students_only_see_their_own_ticket() {
    let Some(app) = spawn_app().await else { return };
    let owner = app.user("student").await;
    let other = app.user("student").await;

    let body: Value = app
        .create_ticket(&owner, ticket_form("biblioteca", "Horario de biblioteca muy corto"))
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/tickets/{}", body["complaint_id"].as_i64().unwrap());

    let (status, detail) = app.get_json(&owner, &path).await;
    assert_eq!(status, 200);
    assert!(detail["ticket"]["response"].is_null());
    assert_eq!(app.get_json(&other, &path).await.0, 404);
}

#[tokio::test]
async fn stats_count_by_status() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let admin = app.user("admin").await;

    app.create_ticket(&student, ticket_form("otros", "Sugerencia para el campus")).await;

    let (status, body) = app.get_json(&admin, "/api/tickets/stats").await;
    assert_eq!(status, 200);
    let stats = &body["stats"];
    let by_status: i64 = stats["by_status"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["count"].as_i64().unwrap())
        .sum();
    assert_eq!(by_status, stats["total"].as_i64().unwrap());
    assert!(stats["total"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn inactive_users_cannot_log_in() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;
    let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(student.id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(student.id)
        .execute(&app.pool)
        .await
        .unwrap();

    let response = app
        .client
        .post(app.url("/login"))
        .json(&serde_json::json!({ "email": email, "password": PASSWORD }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn profile_update_recomputes_initials() {
    let Some(app) = spawn_app().await else { return };
    let student = app.user("student").await;

    let response = app
        .client
        .post(app.url("/profile"))
        .bearer_auth(&student.token)
        .json(&serde_json::json!({ "name": "Beatriz", "personal_description": "Estudiante de 4to" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert!(response.headers().get("set-cookie").is_some());

    let (_, body) = app.get_json(&student, "/profile").await;
    assert_eq!(body["profile"]["name"], "Beatriz");
    assert_eq!(body["profile"]["initials"], "BR");
}
