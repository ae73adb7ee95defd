//! An in-memory pet store driven through the dispatcher without any network.
//!
//! run with `cargo run -p micro-dispatch --example petstore`

use http::header::{ACCEPT, CONTENT_TYPE};
use http::Request;
use http_body_util::BodyExt;
use micro_dispatch::interceptor::{AccessLog, Deadline, Recovery};
use micro_dispatch::router::{delete, get, post, Group};
use micro_dispatch::typed::typed;
use micro_dispatch::validate::RuleValidator;
use micro_dispatch::{Dispatcher, HandlerError, Router, TypedRequest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
struct NewPet {
    #[validate(length(min = 1, max = 32, message = "must have 1 to 32 characters"))]
    name: String,
    #[validate(range(max = 40, message = "must be at most 40"))]
    age: u8,
}

#[derive(Debug, Clone, Serialize)]
struct Pet {
    id: u64,
    name: String,
    age: u8,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    min_age: u8,
}

#[derive(Debug, Default)]
struct Store {
    next_id: AtomicU64,
    pets: Mutex<BTreeMap<u64, Pet>>,
}

impl Store {
    fn insert(&self, new_pet: NewPet) -> Result<Pet, HandlerError> {
        let mut pets = self.pets.lock().map_err(|e| HandlerError::internal(e.to_string()))?;
        if pets.values().any(|pet| pet.name == new_pet.name) {
            return Err(HandlerError::conflict(format!("a pet named '{}' already exists", new_pet.name)));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let pet = Pet { id, name: new_pet.name, age: new_pet.age };
        pets.insert(id, pet.clone());
        Ok(pet)
    }

    fn get(&self, id: u64) -> Result<Pet, HandlerError> {
        let pets = self.pets.lock().map_err(|e| HandlerError::internal(e.to_string()))?;
        pets.get(&id).cloned().ok_or_else(|| HandlerError::not_found(format!("no pet with id {id}")))
    }

    fn list(&self, min_age: u8) -> Result<Vec<Pet>, HandlerError> {
        let pets = self.pets.lock().map_err(|e| HandlerError::internal(e.to_string()))?;
        Ok(pets.values().filter(|pet| pet.age >= min_age).cloned().collect())
    }

    fn remove(&self, id: u64) -> Result<(), HandlerError> {
        let mut pets = self.pets.lock().map_err(|e| HandlerError::internal(e.to_string()))?;
        pets.remove(&id).map(|_| ()).ok_or_else(|| HandlerError::not_found(format!("no pet with id {id}")))
    }
}

fn router(store: &Arc<Store>) -> Router {
    let create = {
        let store = Arc::clone(store);
        move |request: TypedRequest<NewPet>| {
            let store = Arc::clone(&store);
            async move { store.insert(request.into_data()) }
        }
    };
    let show = {
        let store = Arc::clone(store);
        move |request: TypedRequest<()>| {
            let store = Arc::clone(&store);
            async move { store.get(request.path_param("id")?) }
        }
    };
    let list = {
        let store = Arc::clone(store);
        move |request: TypedRequest<()>| {
            let store = Arc::clone(&store);
            async move {
                let listing: Listing = request.query()?;
                store.list(listing.min_age)
            }
        }
    };
    let remove = {
        let store = Arc::clone(store);
        move |request: TypedRequest<()>| {
            let store = Arc::clone(&store);
            async move { store.remove(request.path_param("id")?) }
        }
    };

    Router::builder()
        .interceptor(Recovery)
        .interceptor(AccessLog)
        .group(
            Group::new("/api/v1")
                .interceptor(Deadline::new(Duration::from_secs(5)))
                .route("/pets", post(typed(create).validator(RuleValidator)))
                .route("/pets", get(typed(list)))
                .route("/pets/:id", get(typed(show)))
                .route("/pets/:id", delete(typed(remove))),
        )
        .build()
        .unwrap()
}

async fn send(dispatcher: &Dispatcher, request: Request<String>) {
    let line = format!("{} {}", request.method(), request.uri());
    let response = dispatcher.dispatch(request).await;
    let status = response.status();
    let body = match response.into_body().collect().await {
        Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).into_owned(),
        Err(e) => format!("<unreadable body: {e}>"),
    };
    info!("{line} -> {status}");
    println!("{line}\n  {status} {body}\n");
}

fn json(method: http::Method, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn plain(method: http::Method, uri: &str) -> Request<String> {
    Request::builder().method(method).uri(uri).body(String::new()).unwrap()
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {e}");
    }

    let store = Arc::new(Store::default());
    let dispatcher = Dispatcher::new(router(&store));

    send(&dispatcher, json(http::Method::POST, "/api/v1/pets", r#"{"name":"kitty","age":3}"#)).await;
    send(&dispatcher, json(http::Method::POST, "/api/v1/pets", r#"{"name":"rex","age":7}"#)).await;
    send(&dispatcher, json(http::Method::POST, "/api/v1/pets", r#"{"name":"kitty","age":1}"#)).await;
    send(&dispatcher, json(http::Method::POST, "/api/v1/pets", r#"{"name":"","age":99}"#)).await;
    send(&dispatcher, json(http::Method::POST, "/api/v1/pets", r#"{"name": "#)).await;
    send(&dispatcher, plain(http::Method::GET, "/api/v1/pets?min_age=5")).await;
    send(&dispatcher, plain(http::Method::GET, "/api/v1/pets/1")).await;
    send(&dispatcher, plain(http::Method::PUT, "/api/v1/pets/1")).await;
    send(&dispatcher, plain(http::Method::DELETE, "/api/v1/pets/2")).await;
    send(&dispatcher, plain(http::Method::GET, "/api/v1/pets/2")).await;

    let mut request = plain(http::Method::GET, "/api/v1/owners");
    request.headers_mut().insert(ACCEPT, http::HeaderValue::from_static("text/plain"));
    send(&dispatcher, request).await;
}
