use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{error, get, post, web, App, HttpResponse, HttpServer, Responder};
use anyhow::Context;
use chrono::NaiveDate;
use futures::TryStreamExt;
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use email_extractor_lib::{export, logger, AppConfig, AppError, EmailStore, RecordQuery};

mod job_manager;
use job_manager::JobManager;

struct AppState {
    job_manager: Arc<JobManager>,
    config: Arc<AppConfig>,
}

/// Raw query string; dates arrive as text so blank values can be ignored.
#[derive(Debug, Default, Deserialize)]
struct RecordsParams {
    keyword: Option<String>,
    email: Option<String>,
    source: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

impl RecordsParams {
    fn into_query(self) -> Result<RecordQuery, AppError> {
        Ok(RecordQuery {
            keyword: self.keyword,
            email: self.email,
            source: self.source,
            date_from: parse_date(self.date_from)?,
            date_to: parse_date(self.date_to)?,
        })
    }
}

fn parse_date(value: Option<String>) -> Result<Option<NaiveDate>, AppError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::InvalidDate(s.to_string())),
    }
}

fn output_path(config: &AppConfig, job_id: &str) -> PathBuf {
    config.server.output_dir.join(format!("results_{}.csv", job_id))
}

#[get("/api/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("Server is running")
}

#[post("/api/upload")]
async fn upload_file(mut payload: Multipart, data: web::Data<AppState>) -> actix_web::Result<HttpResponse> {
    let upload_dir = data.config.server.upload_dir.clone();
    std::fs::create_dir_all(&upload_dir).map_err(error::ErrorInternalServerError)?;

    let job_id = Uuid::new_v4().to_string();
    let mut saved_path: Option<PathBuf> = None;

    while let Some(mut field) = payload.try_next().await? {
        let Some(disposition) = field.content_disposition() else {
            continue;
        };
        if disposition.get_name() != Some("file") {
            continue;
        }

        // Keep the extension so the loader can tell Excel from CSV
        let extension = disposition
            .get_filename()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| matches!(ext.as_str(), "xlsx" | "xls" | "xlsm" | "ods" | "csv"))
            .unwrap_or_else(|| "csv".to_string());

        let file_path = upload_dir.join(format!("{}.{}", job_id, extension));
        let mut f = std::fs::File::create(&file_path).map_err(error::ErrorInternalServerError)?;
        while let Some(chunk) = field.try_next().await? {
            f.write_all(&chunk).map_err(error::ErrorInternalServerError)?;
        }
        saved_path = Some(file_path);
    }

    let Some(file_path) = saved_path else {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "status": "error",
            "message": "Multipart field `file` is required."
        })));
    };

    let output = output_path(&data.config, &job_id);
    data.job_manager
        .start_job(job_id.clone(), file_path, output, data.config.clone());

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "job_id": job_id,
        "message": "File uploaded and job queued."
    })))
}

#[get("/api/status/{job_id}")]
async fn get_status(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();

    match data.job_manager.status(&job_id) {
        Some(job) => HttpResponse::Ok().json(job),
        None => HttpResponse::NotFound().json("Job not found"),
    }
}

#[get("/api/download/{job_id}")]
async fn download_result(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let job_id = path.into_inner();
    let output = output_path(&data.config, &job_id);

    match std::fs::read(&output) {
        Ok(content) => HttpResponse::Ok()
            .content_type("text/csv")
            .append_header((
                "Content-Disposition",
                format!("attachment; filename=\"new_emails_{}.csv\"", job_id),
            ))
            .body(content),
        Err(_) => HttpResponse::NotFound().body("Result file not generated yet."),
    }
}

async fn query_records(
    params: RecordsParams,
    config: Arc<AppConfig>,
) -> actix_web::Result<Vec<email_extractor_lib::EmailRecord>> {
    let query = params.into_query().map_err(error::ErrorBadRequest)?;

    web::block(move || {
        let store = EmailStore::open(&config.store)?;
        store.search(&query)
    })
    .await?
    .map_err(error::ErrorInternalServerError)
}

#[get("/api/records")]
async fn list_records(
    params: web::Query<RecordsParams>,
    data: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let records = query_records(params.into_inner(), data.config.clone()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": records.len(),
        "records": records,
    })))
}

#[get("/api/records/export")]
async fn export_records(
    params: web::Query<RecordsParams>,
    data: web::Data<AppState>,
) -> actix_web::Result<HttpResponse> {
    let records = query_records(params.into_inner(), data.config.clone()).await?;

    let mut body = Vec::new();
    export::write_records_csv(&mut body, &records).map_err(error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .append_header(("Content-Disposition", "attachment; filename=\"emails.csv\""))
        .body(body))
}

/// Advisory only; an unreadable size never fails the request.
#[get("/api/db-size")]
async fn db_size(data: web::Data<AppState>) -> impl Responder {
    let config = data.config.clone();
    let usage = web::block(move || {
        EmailStore::open(&config.store)
            .ok()
            .and_then(|store| store.quota_usage())
    })
    .await
    .ok()
    .flatten();

    match usage {
        Some(u) => HttpResponse::Ok().json(serde_json::json!({
            "available": true,
            "size_gb": u.size_gb,
            "quota_gb": u.quota_gb,
        })),
        None => HttpResponse::Ok().json(serde_json::json!({ "available": false })),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logger::init();

    let config_path = std::env::var_os("EMAIL_EXTRACTOR_CONFIG").map(PathBuf::from);
    let config = Arc::new(AppConfig::load(config_path.as_deref()).context("loading configuration")?);

    // Create the schema up front so the first request doesn't race the first job
    EmailStore::open(&config.store).context("opening database")?;

    let job_manager = Arc::new(JobManager::new());
    let state = web::Data::new(AppState {
        job_manager,
        config: config.clone(),
    });

    let bind = (config.server.host.clone(), config.server.port);
    log::info!("Starting Web Server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .service(health_check)
            .service(upload_file)
            .service(get_status)
            .service(download_result)
            .service(export_records)
            .service(list_records)
            .service(db_size)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test as actix_test;

    fn state(dir: &std::path::Path) -> web::Data<AppState> {
        let mut config = AppConfig::default();
        config.store.database_path = dir.join("emails.db");
        config.server.output_dir = dir.join("outputs");
        config.server.upload_dir = dir.join("uploads");
        web::Data::new(AppState {
            job_manager: Arc::new(JobManager::new()),
            config: Arc::new(config),
        })
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(None).unwrap(), None);
        assert_eq!(parse_date(Some("  ".into())).unwrap(), None);
        assert_eq!(
            parse_date(Some("2024-02-29".into())).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert!(matches!(
            parse_date(Some("29/02/2024".into())),
            Err(AppError::InvalidDate(_))
        ));
    }

    #[actix_web::test]
    async fn test_records_endpoint_filters() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(dir.path());
        {
            let store = EmailStore::open(&data.config.store).unwrap();
            store.insert(&email_extractor_lib::NewEmail {
                keyword: "acme",
                email: "a@acme.com",
                source: "https://acme.com",
                ..Default::default()
            });
            store.insert(&email_extractor_lib::NewEmail {
                keyword: "beta",
                email: "b@beta.io",
                source: "https://beta.io",
                ..Default::default()
            });
        }

        let app = actix_test::init_service(App::new().app_data(data.clone()).service(list_records)).await;
        let req = actix_test::TestRequest::get()
            .uri("/api/records?keyword=ACME&date_from=&source=")
            .to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["count"], 1);
        assert_eq!(body["records"][0]["email"], "a@acme.com");
    }

    #[actix_web::test]
    async fn test_records_endpoint_rejects_bad_date() {
        let dir = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(App::new().app_data(state(dir.path())).service(list_records)).await;
        let req = actix_test::TestRequest::get()
            .uri("/api/records?date_from=yesterday")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_db_size_gauge() {
        let dir = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(App::new().app_data(state(dir.path())).service(db_size)).await;
        let req = actix_test::TestRequest::get().uri("/api/db-size").to_request();
        let body: serde_json::Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["available"], true);
        assert_eq!(body["quota_gb"], 0.5);
    }

    #[actix_web::test]
    async fn test_status_and_download_unknown_job() {
        let dir = tempfile::tempdir().unwrap();
        let app = actix_test::init_service(
            App::new()
                .app_data(state(dir.path()))
                .service(get_status)
                .service(download_result),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/api/status/nope").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), 404);

        let req = actix_test::TestRequest::get().uri("/api/download/nope").to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), 404);
    }
}
