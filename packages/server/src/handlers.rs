//! HTTP handler functions for the population trend API.

use actix_web::{HttpResponse, web};
use population_dataset::DatasetError;
use population_dataset::aggregate::{aggregate_region, aggregate_region_item};
use population_server_models::{
    ApiCoverage, ApiDatasetInfo, ApiError, ApiHealth, ApiHorizonRefresh, ApiRegion, ApiRegions,
    ApiSeries, SeriesQueryParams,
};
use population_source::horizon::HorizonCheck;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/regions`
///
/// Lists the regions present in the current dataset alongside every
/// configured region.
pub async fn regions(state: web::Data<AppState>) -> HttpResponse {
    let dataset = match state.cache.dataset().await {
        Ok(dataset) => dataset,
        Err(e) => return unavailable(&e),
    };

    let configured = state
        .cache
        .table()
        .regions
        .iter()
        .map(|region| ApiRegion {
            code: region.code.to_string(),
            label: region.label.clone(),
            name: dataset
                .records_in_region(region.code.as_str())
                .next()
                .map(|r| r.record.region_name.clone()),
        })
        .collect();

    HttpResponse::Ok().json(ApiRegions {
        dataset: ApiDatasetInfo::from(&*dataset),
        available: dataset.region_names(),
        items: dataset.item_labels(),
        configured,
    })
}

/// `GET /api/series/{region}`
///
/// `region` may be a region code, the name the API reports, or the
/// configured label (case-insensitive). Responds 404 when it matches
/// none of them.
pub async fn series(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<SeriesQueryParams>,
) -> HttpResponse {
    let requested = path.into_inner();
    let dataset = match state.cache.dataset().await {
        Ok(dataset) => dataset,
        Err(e) => return unavailable(&e),
    };

    let configured = state.cache.table().find_region(&requested);
    let region = configured.map_or(requested.as_str(), |r| r.code.as_str());
    let known = configured.is_some() || dataset.records_in_region(region).next().is_some();
    if !known {
        return HttpResponse::NotFound()
            .json(ApiError::new(format!("Unknown region {requested:?}")));
    }

    let mut series = match params.item.as_deref() {
        Some(item) => aggregate_region_item(&dataset, region, item),
        None => aggregate_region(&dataset, region),
    };
    series.region = requested;

    HttpResponse::Ok().json(ApiSeries {
        dataset: ApiDatasetInfo::from(&*dataset),
        item: params.into_inner().item,
        series,
    })
}

/// `GET /api/coverage`
///
/// Reports which requests failed or came back empty and which records
/// were dropped while building the current dataset.
pub async fn coverage(state: web::Data<AppState>) -> HttpResponse {
    match state.cache.dataset().await {
        Ok(dataset) => HttpResponse::Ok().json(ApiCoverage::from(&*dataset)),
        Err(e) => unavailable(&e),
    }
}

/// `POST /api/horizon/refresh`
///
/// Runs horizon discovery now. On change the cached dataset is dropped
/// and rebuilt on the next data request.
pub async fn refresh_horizon(state: web::Data<AppState>) -> HttpResponse {
    let check = state.cache.refresh_horizon().await;
    let snapshot = state.cache.horizon();

    HttpResponse::Ok().json(ApiHorizonRefresh {
        changed: check.is_changed(),
        discovered: !matches!(check, HorizonCheck::Unknown),
        effective_horizon: state.cache.effective_horizon(),
        version: snapshot.version,
    })
}

fn unavailable(e: &DatasetError) -> HttpResponse {
    log::error!("Dataset unavailable: {e}");
    HttpResponse::ServiceUnavailable().json(ApiError::new(format!("Dataset unavailable: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use actix_web::{App, http::StatusCode, test};
    use async_trait::async_trait;
    use population_dataset::DatasetCache;
    use population_source::SourceError;
    use population_source::horizon::HorizonDiscovery;
    use population_source::kosis::{PopulationApi, WindowPayload};
    use population_source::table::population_table;
    use population_source_models::{RegionCode, RequestWindow};
    use serde_json::{Value, json};

    use super::*;

    /// Serves fixed records for (region, window start) pairs, "no data"
    /// elsewhere.
    struct StubApi {
        records: BTreeMap<(String, String), Vec<Value>>,
        offline: AtomicBool,
    }

    #[async_trait]
    impl PopulationApi for StubApi {
        async fn fetch_window(
            &self,
            region: &RegionCode,
            window: RequestWindow,
        ) -> Result<WindowPayload, SourceError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(SourceError::Normalization {
                    message: "offline".to_string(),
                });
            }
            let key = (region.to_string(), window.start.to_string());
            Ok(self.records.get(&key).map_or_else(
                || WindowPayload::NoData {
                    reason: "-1: no data".to_string(),
                },
                |entries| WindowPayload::Records(entries.clone()),
            ))
        }
    }

    fn state(offline: bool) -> web::Data<AppState> {
        let mut records = BTreeMap::new();
        records.insert(
            ("41250".to_string(), "200801".to_string()),
            vec![
                json!({"PRD_DE": "20080101", "C1_NM": "동두천시", "C2_NM": "23세", "ITM_NM": "T2", "DT": "1000"}),
                json!({"PRD_DE": "20080101", "C1_NM": "동두천시", "C2_NM": "100세 이상", "ITM_NM": "T2", "DT": "5"}),
                json!({"PRD_DE": "20080101", "C1_NM": "동두천시", "C2_NM": "계", "ITM_NM": "T2", "DT": "1005"}),
            ],
        );
        let api = StubApi {
            records,
            offline: AtomicBool::new(offline),
        };
        let cache = DatasetCache::new(
            Arc::new(api),
            HorizonDiscovery::disabled(),
            population_table().unwrap(),
            4,
        );
        web::Data::new(AppState {
            cache: Arc::new(cache),
        })
    }

    #[actix_web::test]
    async fn health_reports_version() {
        let app = test::init_service(App::new().configure(crate::configure)).await;
        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[actix_web::test]
    async fn series_sums_cohorts_and_totals() {
        let app = test::init_service(
            App::new()
                .app_data(state(false))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/series/41250")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["region"], "41250");
        assert_eq!(body["cohortSeries"]["200801"]["15-24"], 1000.0);
        assert_eq!(body["cohortSeries"]["200801"]["75-99"], 5.0);
        assert_eq!(body["totalSeries"]["200801"], 1005.0);
        assert_eq!(body["dataset"]["horizon"], "202501");
        assert_eq!(body["dataset"]["partial"], false);
    }

    #[actix_web::test]
    async fn series_accepts_configured_label_and_item_filter() {
        let app = test::init_service(
            App::new()
                .app_data(state(false))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/series/dongducheon-si?item=T3")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["region"], "dongducheon-si");
        assert_eq!(body["item"], "T3");
        assert_eq!(body["totalSeries"], json!({}));
    }

    #[actix_web::test]
    async fn unknown_region_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(state(false))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/series/99999")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn regions_lists_available_and_configured() {
        let app = test::init_service(
            App::new()
                .app_data(state(false))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/regions").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["available"], json!(["동두천시"]));
        assert_eq!(body["items"], json!(["T2"]));
        assert_eq!(body["configured"].as_array().unwrap().len(), 10);
        assert_eq!(body["configured"][0]["code"], "41250");
        assert_eq!(body["configured"][0]["name"], "동두천시");
        assert_eq!(body["configured"][1]["name"], Value::Null);
    }

    #[actix_web::test]
    async fn coverage_reports_empty_windows() {
        let app = test::init_service(
            App::new()
                .app_data(state(false))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::get().uri("/api/coverage").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["requested"], 40);
        assert_eq!(body["succeeded"], 1);
        assert_eq!(body["emptyWindows"].as_array().unwrap().len(), 39);
        assert_eq!(body["dataset"]["recordCount"], 2);
    }

    #[actix_web::test]
    async fn unreachable_api_is_service_unavailable() {
        let app = test::init_service(
            App::new()
                .app_data(state(true))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/series/41250")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[actix_web::test]
    async fn refresh_without_discovery_keeps_default_horizon() {
        let app = test::init_service(
            App::new()
                .app_data(state(false))
                .configure(crate::configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/horizon/refresh")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["changed"], false);
        assert_eq!(body["discovered"], false);
        assert_eq!(body["effectiveHorizon"], "202501");
        assert_eq!(body["version"], 0);
    }
}
