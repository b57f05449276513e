use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub country: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Car {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

/// Incoming car fields. Both are required; missing or blank values are
/// reported back as field errors with a 400.
#[derive(Debug, Default, Deserialize)]
pub struct CarInput {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl CarInput {
    pub fn errors(&self) -> Map<String, Value> {
        let mut errors = Map::new();
        for (field, value) in [("name", &self.name), ("color", &self.color)] {
            if value.as_deref().map_or(true, |value| value.trim().is_empty()) {
                errors.insert(field.to_string(), json!(["can't be blank"]));
            }
        }
        errors
    }
}

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub name: Option<String>,
}

pub type Db = Arc<RwLock<HashMap<Uuid, Car>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/cities", get(find_city))
        .route("/cars", get(list_cars).post(create_car))
        .route("/cars/{id}", get(get_car).put(update_car).delete(delete_car))
        .route("/status/{code}", any(status))
        .route("/anything", any(anything))
        .route("/anything/{*rest}", any(anything))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Known cities answer with a body; `Unknown` answers 200 with an empty
/// body; everything else is a 404.
pub fn lookup_city(name: &str) -> Option<Option<City>> {
    let city = |name: &str, country: &str| City {
        name: name.to_string(),
        country: country.to_string(),
    };
    match name {
        "London" => Some(Some(city("London City", "UK"))),
        "Manchester" => Some(Some(city("Manchester City", "UK"))),
        "Stockholm" => Some(Some(city("Stockholm City", "Sweden"))),
        "Unknown" => Some(None),
        _ => None,
    }
}

async fn find_city(Query(query): Query<CityQuery>) -> Response {
    match query.name.as_deref().and_then(lookup_city) {
        Some(Some(city)) => Json(city).into_response(),
        Some(None) => StatusCode::OK.into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "city not found" }))).into_response(),
    }
}

async fn list_cars(State(db): State<Db>) -> Json<Vec<Car>> {
    let cars = db.read().await;
    let mut cars: Vec<Car> = cars.values().cloned().collect();
    cars.sort_by(|a, b| a.name.cmp(&b.name));
    Json(cars)
}

async fn create_car(State(db): State<Db>, Json(input): Json<CarInput>) -> Response {
    let errors = input.errors();
    if !errors.is_empty() {
        tracing::debug!(fields = errors.len(), "rejecting invalid car");
        let mut body = input_echo(&input);
        body["errors"] = Value::Object(errors);
        return (StatusCode::BAD_REQUEST, Json(body)).into_response();
    }
    let car = Car {
        id: Uuid::new_v4(),
        name: input.name.unwrap_or_default(),
        color: input.color.unwrap_or_default(),
    };
    db.write().await.insert(car.id, car.clone());
    tracing::debug!(id = %car.id, name = %car.name, "car created");
    (StatusCode::CREATED, Json(car)).into_response()
}

async fn get_car(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<Json<Car>, StatusCode> {
    let cars = db.read().await;
    cars.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn update_car(
    State(db): State<Db>,
    Path(id): Path<Uuid>,
    Json(input): Json<CarInput>,
) -> Result<Json<Car>, StatusCode> {
    let mut cars = db.write().await;
    let car = cars.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = input.name {
        car.name = name;
    }
    if let Some(color) = input.color {
        car.color = color;
    }
    Ok(Json(car.clone()))
}

async fn delete_car(State(db): State<Db>, Path(id): Path<Uuid>) -> Result<StatusCode, StatusCode> {
    let mut cars = db.write().await;
    cars.remove(&id).map(|_| StatusCode::NO_CONTENT).ok_or(StatusCode::NOT_FOUND)
}

/// Answer with the requested status code and a small JSON body.
async fn status(Path(code): Path<u16>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let reason = status.canonical_reason().unwrap_or("unknown");
    (status, Json(json!({ "status": code, "message": reason }))).into_response()
}

/// Echo the request back: method, path, query pairs, headers and body.
async fn anything(
    method: Method,
    uri: Uri,
    Query(args): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), Value::from(value)))
        })
        .collect();
    let data = String::from_utf8_lossy(&body).into_owned();
    let json = serde_json::from_str::<Value>(&data).unwrap_or(Value::Null);

    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "args": args,
        "headers": headers,
        "data": data,
        "json": json,
    }))
}

fn input_echo(input: &CarInput) -> Value {
    json!({ "name": input.name, "color": input.color })
}
