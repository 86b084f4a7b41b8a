use std::path::Path;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::de::DeserializeOwned;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::error::AppError;
use crate::genome::{
    FishGenome, FitnessReport, GenomePair, MissingGenePolicy, SimulationParameters, breed,
    evaluate_fitness, random_genome,
};
use crate::views;

const HX_REQUEST_HEADER: &str = "HX-Request";

#[derive(Clone, Debug)]
pub struct AppState {
    pub missing_gene_policy: MissingGenePolicy,
    pub breeding_params: SimulationParameters,
}

impl AppState {
    pub fn new(missing_gene_policy: MissingGenePolicy) -> Self {
        Self {
            missing_gene_policy,
            breeding_params: SimulationParameters::DEFAULT,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(MissingGenePolicy::default())
    }
}

pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/simulation", get(simulation_handler))
        .route("/api/breed", post(breed_handler))
        .route("/api/genome/random", get(random_genome_handler))
        .route("/api/fitness", post(fitness_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn request_rng() -> SmallRng {
    SmallRng::seed_from_u64(rand::random::<u64>())
}

/// Decodes the first JSON value in the body; anything after it is ignored.
/// A `null` body decodes as `T::default()`.
fn decode_first_value<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, AppError> {
    match serde_json::Deserializer::from_slice(body)
        .into_iter::<Option<T>>()
        .next()
    {
        Some(value) => Ok(value?.unwrap_or_default()),
        None => Err(AppError::BadRequest("empty request body".to_string())),
    }
}

fn ensure_finite(offspring: &FishGenome) -> Result<(), AppError> {
    match offspring.iter().find(|(_, value)| !value.is_finite()) {
        Some((gene, value)) => Err(AppError::Internal(format!(
            "non-finite offspring gene {gene}={value}"
        ))),
        None => Ok(()),
    }
}

fn is_partial_refresh(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST_HEADER)
        .and_then(|value| value.to_str().ok())
        == Some("true")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn simulation_handler(headers: HeaderMap) -> Result<Html<String>, AppError> {
    let params = SimulationParameters::DEFAULT;
    let html = if is_partial_refresh(&headers) {
        views::simulation_content(&params)?
    } else {
        views::simulation_page(&params)?
    };
    Ok(Html(html))
}

async fn breed_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FishGenome>, AppError> {
    let pair: GenomePair = decode_first_value(&body)?;
    let offspring = breed(
        &pair.fish1,
        &pair.fish2,
        &state.breeding_params,
        state.missing_gene_policy,
        &mut request_rng(),
    )?;
    ensure_finite(&offspring)?;
    debug!(
        "bred offspring with {} genes (policy={})",
        offspring.len(),
        state.missing_gene_policy.label()
    );
    Ok(Json(offspring))
}

async fn random_genome_handler() -> Json<FishGenome> {
    Json(random_genome(&mut request_rng()))
}

async fn fitness_handler(body: Bytes) -> Result<Json<FitnessReport>, AppError> {
    let genome: FishGenome = decode_first_value(&body)?;
    Ok(Json(evaluate_fitness(&genome, &SimulationParameters::DEFAULT)))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use tower::ServiceExt;

    use super::*;

    fn static_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static")
    }

    fn test_router() -> Router {
        router(AppState::default(), &static_dir())
    }

    fn strict_router() -> Router {
        router(
            AppState::new(MissingGenePolicy::StrictKeyMatch),
            &static_dir(),
        )
    }

    fn always_crossover_router() -> Router {
        let state = AppState {
            breeding_params: SimulationParameters {
                crossover_rate: 1.0,
                mutation_rate: 0.0,
                ..SimulationParameters::DEFAULT
            },
            ..AppState::default()
        };
        router(state, &static_dir())
    }

    async fn post_body(app: Router, uri: &str, body: &str) -> Response {
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    async fn get_uri(app: Router, uri: &str, hx_request: bool) -> Response {
        let mut builder = Request::builder().uri(uri);
        if hx_request {
            builder = builder.header("HX-Request", "true");
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_text(response: Response) -> String {
        String::from_utf8(body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn breed_returns_offspring_json() {
        let resp = post_body(
            test_router(),
            "/api/breed",
            r#"{"fish1":{"speed":0.5},"fish2":{"speed":0.9}}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert!(json["speed"].is_number());
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn breed_ignores_content_type() {
        let resp = test_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/breed")
                    .body(Body::from(r#"{"fish1":{"size":0.1},"fish2":{"size":0.3}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn breed_rejects_malformed_json() {
        let resp = post_body(test_router(), "/api/breed", "not json").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "Bad Request");
    }

    #[tokio::test]
    async fn breed_rejects_non_numeric_genes() {
        let resp = post_body(
            test_router(),
            "/api/breed",
            r#"{"fish1":{"speed":"fast"},"fish2":{"speed":0.9}}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn breed_keeps_first_parent_genes() {
        let resp = post_body(
            test_router(),
            "/api/breed",
            r#"{"fish1":{"speed":0.5,"size":0.4},"fish2":{"speed":0.9,"color":0.1}}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let offspring: FishGenome = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        let mut genes: Vec<_> = offspring.keys().cloned().collect();
        genes.sort();
        assert_eq!(genes, vec!["size".to_string(), "speed".to_string()]);
    }

    #[tokio::test]
    async fn strict_breed_rejects_mismatched_parents() {
        let resp = post_body(
            strict_router(),
            "/api/breed",
            r#"{"fish1":{"speed":0.5,"size":0.4},"fish2":{"speed":0.9}}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "Bad Request");

        let resp = post_body(
            strict_router(),
            "/api/breed",
            r#"{"fish1":{"speed":0.5},"fish2":{"speed":0.9}}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn breed_overflow_is_internal_error() {
        let resp = post_body(
            always_crossover_router(),
            "/api/breed",
            r#"{"fish1":{"speed":1.7e308},"fish2":{"speed":1.7e308}}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(resp).await, "Internal Server Error");
    }

    #[test]
    fn ensure_finite_flags_infinite_genes() {
        let mut offspring: FishGenome = [("speed".to_string(), 0.4)].into_iter().collect();
        assert!(ensure_finite(&offspring).is_ok());
        offspring.insert("size".to_string(), f64::INFINITY);
        assert!(matches!(
            ensure_finite(&offspring),
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn breed_null_body_yields_empty_offspring() {
        let resp = post_body(test_router(), "/api/breed", "null").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "{}");

        let resp = post_body(
            test_router(),
            "/api/breed",
            r#"{"fish1":null,"fish2":{"speed":0.9}}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "{}");
    }

    #[tokio::test]
    async fn breed_reads_only_first_json_value() {
        let resp = post_body(
            always_crossover_router(),
            "/api/breed",
            "{\"fish1\":{\"speed\":0.5},\"fish2\":{\"speed\":0.9}} \n{}",
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let offspring: FishGenome = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert!((offspring["speed"] - 0.7).abs() < 1e-12);
    }

    #[tokio::test]
    async fn breed_rejects_empty_body() {
        let resp = post_body(test_router(), "/api/breed", "").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "Bad Request");
    }

    #[tokio::test]
    async fn simulation_renders_full_page() {
        let resp = get_uri(test_router(), "/simulation", false).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(
            resp.headers()
                .get(header::CONTENT_TYPE)
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let html = body_text(resp).await;
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains(r#"id="simulation-content""#));
    }

    #[tokio::test]
    async fn simulation_renders_fragment_for_htmx() {
        let resp = get_uri(test_router(), "/simulation", true).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.starts_with(r#"<section id="simulation-content""#));
        assert!(!html.contains("<html"));
        assert!(!html.contains("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn random_genome_returns_known_genes() {
        let resp = get_uri(test_router(), "/api/genome/random", false).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let genome: FishGenome = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        let mut genes: Vec<_> = genome.keys().cloned().collect();
        genes.sort();
        assert_eq!(genes, vec!["color", "size", "speed"]);
        assert!(genome.values().all(|value| (0.0..1.0).contains(value)));
    }

    #[tokio::test]
    async fn fitness_scores_genome() {
        let resp = post_body(
            test_router(),
            "/api/fitness",
            r#"{"speed":1.0,"size":0.5,"color":0.5}"#,
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        let fitness = json["fitness"].as_f64().unwrap();
        assert!((fitness - 1.2).abs() < 1e-9);
        assert!(json["genes"]["speed"].is_number());
    }

    #[tokio::test]
    async fn fitness_rejects_malformed_json() {
        let resp = post_body(test_router(), "/api/fitness", "[1, 2").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(resp).await, "Bad Request");
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let resp = get_uri(test_router(), "/health", false).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn static_files_are_served_without_prefix() {
        let resp = get_uri(test_router(), "/static/js/simulation.js", false).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let script = body_text(resp).await;
        assert!(script.contains("/api/breed"));

        let resp = get_uri(test_router(), "/static/js/missing.js", false).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
