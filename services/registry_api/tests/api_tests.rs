use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use ed25519_dalek::{Signer, SigningKey};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use registry_api::config::Network;
use registry_api::model::{Role, User};
use registry_api::{router, AppState, Config, Store};

struct Harness {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

fn config(dir: &TempDir) -> Config {
    Config {
        listen: "127.0.0.1:0".parse().unwrap(),
        data_dir: dir.path().to_path_buf(),
        network: Network::Testnet,
        // nothing listens here
        rpc_url: Some("http://127.0.0.1:9".into()),
        contract_id: Some("CREGISTRY".into()),
        ipfs_api_url: None,
        ipfs_gateway: "https://ipfs.io".into(),
        jwt_secret: "test-secret".into(),
        jwt_expire_hours: 1,
        cors_origins: vec!["*".into()],
        max_file_size: 1024 * 1024,
    }
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir);
    let store = Store::open(&cfg.db_path()).unwrap();
    let state = AppState::new(cfg, store);
    Harness { app: router(state.clone()), state, _dir: dir }
}

fn wallet(seed: u8) -> (SigningKey, String) {
    let key = SigningKey::from_bytes(&[seed; 32]);
    let address = stellar_strkey::ed25519::PublicKey(key.verifying_key().to_bytes()).to_string();
    (key, address)
}

impl Harness {
    /// Store a user with `role` and return `(address, bearer token)`.
    fn login_as(&self, seed: u8, role: Role) -> (String, String) {
        let (_, address) = wallet(seed);
        let mut user = User::citizen(address.clone());
        user.role = role;
        self.state.store.put_user(&user).unwrap();
        let token = self.state.tokens.issue(&user).unwrap();
        (address, token)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn create(
        &self,
        token: &str,
        token_id: u64,
        location: &str,
        owner: &str,
        lon_lat: [f64; 2],
    ) -> (StatusCode, Value) {
        self.call(
            Method::POST,
            "/api/v1/properties",
            Some(token),
            Some(json!({
                "token_id": token_id,
                "owner_address": owner,
                "location": location,
                "coordinates": { "type": "Point", "coordinates": lon_lat },
                "area": 750.0,
                "value": 5_000_000_000i64,
                "property_type": "RESIDENTIAL",
            })),
        )
        .await
    }
}

const DAKAR: [f64; 2] = [-17.4441, 14.6937];
const PIKINE: [f64; 2] = [-17.3900, 14.7550];
const SAINT_LOUIS: [f64; 2] = [-16.4896, 16.0179];

#[tokio::test]
async fn health_reports_network() {
    let h = harness();
    let (status, body) = h.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["network"], "testnet");
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let h = harness();
    let (_, owner) = wallet(50);
    let (status, body) = h
        .call(
            Method::POST,
            "/api/v1/properties",
            None,
            Some(json!({ "token_id": 1, "owner_address": owner, "location": "Lot 1, Dakar",
                         "area": 10.0, "property_type": "OTHER" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let (status, _) = h
        .call(Method::GET, "/api/v1/users/me", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn roles_gate_mutations() {
    let h = harness();
    let (_, citizen) = h.login_as(1, Role::Citizen);
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, owner) = wallet(50);

    let (status, body) = h.create(&citizen, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "PERMISSION_DENIED");

    let (status, _) = h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::CREATED);

    // only surveyors verify, only admins change status
    let (status, _) = h
        .call(Method::POST, "/api/v1/properties/1/verify", Some(&notary), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h
        .call(
            Method::PATCH,
            "/api/v1/properties/1",
            Some(&notary),
            Some(json!({ "status": "FROZEN" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn duplicate_location_conflicts() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, owner) = wallet(50);

    let (status, body) = h.create(&notary, 1, "  Lot 7, Medina, Dakar ", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["location"], "Lot 7, Medina, Dakar");
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["value_formatted"], "500.00 XLM");

    let (status, body) = h.create(&notary, 2, "Lot 7, Medina, Dakar", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");

    let (status, _) = h.create(&notary, 1, "Lot 8, Medina, Dakar", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = h.create(&notary, 3, "Lot", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h.call(Method::GET, "/api/v1/properties", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn transfer_moves_property_between_owners() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, alice) = wallet(60);
    let (_, bob) = wallet(61);

    h.create(&notary, 1, "Parcel 12, Pikine", &alice, PIKINE).await;

    let (status, body) = h
        .call(
            Method::POST,
            "/api/v1/properties/1/transfer",
            Some(&notary),
            Some(json!({ "new_owner_address": alice })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = h
        .call(
            Method::POST,
            "/api/v1/properties/1/transfer",
            Some(&notary),
            Some(json!({ "new_owner_address": bob, "transfer_value": 80_000_000i64, "tx_hash": "abc123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["owner_address"], bob.as_str());
    assert_eq!(body["value"], 80_000_000i64);
    assert_eq!(body["status"], "ACTIVE");

    let uri = format!("/api/v1/blockchain/properties/by-owner/{alice}");
    let (_, body) = h.call(Method::GET, &uri, None, None).await;
    assert_eq!(body["count"], 0);
    let uri = format!("/api/v1/blockchain/properties/by-owner/{bob}");
    let (_, body) = h.call(Method::GET, &uri, None, None).await;
    assert_eq!(body["token_ids"], json!([1]));

    let uri = format!("/api/v1/properties?owner_address={bob}");
    let (_, body) = h.call(Method::GET, &uri, None, None).await;
    assert_eq!(body["total"], 1);

    let (_, body) = h.call(Method::GET, "/api/v1/properties/1/history", None, None).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["event_type"], "transferred");
    assert_eq!(history[1]["from_address"], alice.as_str());
    assert_eq!(history[1]["transaction_hash"], "abc123");
}

#[tokio::test]
async fn frozen_property_cannot_be_transferred() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, admin) = h.login_as(3, Role::Admin);
    let (_, alice) = wallet(60);
    let (_, bob) = wallet(61);
    h.create(&notary, 1, "Parcel 12, Pikine", &alice, PIKINE).await;

    let (status, _) = h
        .call(Method::PATCH, "/api/v1/properties/1", Some(&admin), Some(json!({ "status": "TRANSFERRED" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = h
        .call(Method::PATCH, "/api/v1/properties/1", Some(&admin), Some(json!({ "status": "FROZEN" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = h
        .call(
            Method::POST,
            "/api/v1/properties/1/transfer",
            Some(&notary),
            Some(json!({ "new_owner_address": bob })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn signature_login_round_trip() {
    let h = harness();
    let (key, address) = wallet(9);

    let (status, body) = h
        .call(Method::POST, "/api/v1/users/auth/nonce", None, Some(json!({ "wallet_address": address })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let nonce = body["nonce"].as_str().unwrap().to_string();
    let message = body["message"].as_str().unwrap().to_string();
    assert!(message.contains(&nonce));

    let signature = hex::encode(key.sign(message.as_bytes()).to_bytes());
    let login = json!({ "wallet_address": address, "nonce": nonce, "signature": signature });
    let (status, body) = h
        .call(Method::POST, "/api/v1/users/auth/verify", None, Some(login.clone()))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["role"], "CITIZEN");
    let token = body["access_token"].as_str().unwrap().to_string();

    let (status, body) = h.call(Method::GET, "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["wallet_address"], address.as_str());
    assert!(body["last_login"].is_string());

    // the nonce was consumed
    let (status, _) = h.call(Method::POST, "/api/v1/users/auth/verify", None, Some(login)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = h
        .call(
            Method::PATCH,
            "/api/v1/users/me",
            Some(&token),
            Some(json!({ "first_name": "Awa", "last_name": "Diop", "email": "awa@example.sn" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = h.call(Method::GET, "/api/v1/users/me", Some(&token), None).await;
    assert_eq!(body["full_name"], "Awa Diop");
}

#[tokio::test]
async fn wrong_key_cannot_log_in() {
    let h = harness();
    let (_, address) = wallet(9);
    let (impostor, _) = wallet(10);

    let (_, body) = h
        .call(Method::POST, "/api/v1/users/auth/nonce", None, Some(json!({ "wallet_address": address })))
        .await;
    let message = body["message"].as_str().unwrap();
    let signature = hex::encode(impostor.sign(message.as_bytes()).to_bytes());
    let (status, body) = h
        .call(
            Method::POST,
            "/api/v1/users/auth/verify",
            None,
            Some(json!({ "wallet_address": address, "nonce": body["nonce"], "signature": signature })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert!(h.state.store.get_user(&address).unwrap().is_none());
}

#[tokio::test]
async fn role_change_applies_to_existing_token() {
    let h = harness();
    let (_, admin) = h.login_as(3, Role::Admin);
    let (clerk, clerk_token) = h.login_as(4, Role::Citizen);
    let (_, owner) = wallet(50);

    let (status, _) = h.create(&clerk_token, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/api/v1/users/{clerk}/role");
    let (status, _) = h.call(Method::PUT, &uri, Some(&clerk_token), Some(json!({ "role": "NOTARY" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = h.call(Method::PUT, &uri, Some(&admin), Some(json!({ "role": "NOTARY" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "NOTARY");

    let (status, _) = h.create(&clerk_token, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn radius_filtering() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, owner) = wallet(50);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;
    h.create(&notary, 2, "Parcel 12, Pikine", &owner, PIKINE).await;
    h.create(&notary, 3, "Quartier Nord, Saint-Louis", &owner, SAINT_LOUIS).await;

    let (status, body) = h
        .call(
            Method::GET,
            "/api/v1/properties?latitude=14.6937&longitude=-17.4441&radius_km=15",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, body) = h
        .call(
            Method::GET,
            "/api/v1/search/nearby?latitude=14.6937&longitude=-17.4441&radius_km=20",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let hits = body["properties"].as_array().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0]["token_id"], 1);
    assert_eq!(hits[0]["distance_km"], 0.0);
    assert!(hits[1]["distance_km"].as_f64().unwrap() > 5.0);

    let (status, _) = h
        .call(Method::GET, "/api/v1/search/nearby?latitude=14.6&longitude=-17.4&radius_km=80", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = h
        .call(Method::GET, "/api/v1/properties?min_area=100&max_area=10", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = h
        .call(Method::GET, "/api/v1/properties/map/bounds?north=15&south=14.5&east=-17&west=-17.5", None, None)
        .await;
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["features"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn stats_aggregate_over_the_mirror() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, surveyor) = h.login_as(5, Role::Surveyor);
    let (_, alice) = wallet(60);
    let (_, bob) = wallet(61);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &alice, DAKAR).await;
    h.create(&notary, 2, "Parcel 12, Pikine", &bob, PIKINE).await;

    for _ in 0..2 {
        let (status, body) = h
            .call(Method::POST, "/api/v1/properties/2/verify", Some(&surveyor), Some(json!({ "verified": true })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_verified"], true);
    }

    let (status, body) = h.call(Method::GET, "/api/v1/properties/stats/overview", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_properties"], 2);
    assert_eq!(body["verified_properties"], 1);
    assert_eq!(body["verification_rate"], 50.0);
    assert_eq!(body["total_area"], 1500.0);
    assert_eq!(body["total_value"], 10_000_000_000i64);
    assert_eq!(body["by_type"]["RESIDENTIAL"], 2);
    assert_eq!(body["unique_owners"], 2);

    let (_, body) = h.call(Method::GET, "/api/v1/properties/2/history", None, None).await;
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
}

fn multipart_body(boundary: &str, token_id: u64, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"property_id\"\r\n\r\n{token_id}\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"document_type\"\r\n\r\nsurvey_report\r\n\
             --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"survey.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn document_upload_and_download() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (owner, owner_token) = h.login_as(6, Role::Citizen);
    let (_, stranger) = h.login_as(7, Role::Citizen);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;

    let content = b"survey of lot 1: 750 m2, boundaries checked";
    let upload = |token: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/documents/upload")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "multipart/form-data; boundary=XBOUNDARYX")
            .body(Body::from(multipart_body("XBOUNDARYX", 1, content)))
            .unwrap()
    };

    let (status, _) = h.send(upload(&stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, doc) = h.send(upload(&owner_token)).await;
    assert_eq!(status, StatusCode::CREATED, "{doc}");
    assert_eq!(doc["document_type"], "SURVEY_REPORT");
    assert_eq!(doc["filename"], "survey.txt");
    assert_eq!(doc["size"], content.len());
    let id = doc["id"].as_str().unwrap().to_string();

    let (_, listing) = h.call(Method::GET, "/api/v1/documents/property/1", None, None).await;
    assert_eq!(listing["documents"].as_array().unwrap().len(), 1);

    let req = Request::builder()
        .uri(format!("/api/v1/documents/{id}/download"))
        .body(Body::empty())
        .unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/plain");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], content);

    let uri = format!("/api/v1/documents/{id}/verify");
    let (status, body) = h.call(Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["verified"], true);
}

#[tokio::test]
async fn create_with_inline_deed_sets_document_hash() {
    use base64::Engine;

    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, owner) = wallet(50);
    let deed = b"title deed 0001";
    let (status, body) = h
        .call(
            Method::POST,
            "/api/v1/properties",
            Some(&notary),
            Some(json!({
                "token_id": 4,
                "owner_address": owner,
                "location": "Lot 4, Almadies, Dakar",
                "area": 25_000.0,
                "property_type": "COMMERCIAL",
                "document": {
                    "filename": "deed.pdf",
                    "mime_type": "application/pdf",
                    "content_base64": base64::engine::general_purpose::STANDARD.encode(deed),
                },
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["area_formatted"], "2.50 ha");
    let hash = body["document_hash"].as_str().unwrap();
    assert_eq!(hash, registry_api::ipfs::sha256_hex(deed));

    let (_, listing) = h.call(Method::GET, "/api/v1/documents/property/4", None, None).await;
    assert_eq!(listing["documents"][0]["document_type"], "TITLE_DEED");
}

#[tokio::test]
async fn admin_ingests_ledger_events() {
    let h = harness();
    let (_, admin) = h.login_as(3, Role::Admin);
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, owner) = wallet(50);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;

    let event = json!({
        "tx_hash": "f00d",
        "ledger": 4242,
        "event": { "value_updated": { "token_id": 1, "value": 123 } }
    });
    let (status, _) = h
        .call(Method::POST, "/api/v1/blockchain/events", Some(&notary), Some(event.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = h
        .call(Method::POST, "/api/v1/blockchain/events", Some(&admin), Some(event))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["value"], 123);

    let (_, body) = h.call(Method::GET, "/api/v1/properties/1/geojson", None, None).await;
    assert_eq!(body["type"], "Feature");
    assert_eq!(body["geometry"]["type"], "Point");
}

#[tokio::test]
async fn unknown_property_is_not_found() {
    let h = harness();
    let (status, body) = h.call(Method::GET, "/api/v1/properties/99", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "property 99 not found");
}

#[tokio::test]
async fn unreachable_rpc_reports_unavailable() {
    let h = harness();
    let (status, body) = h.call(Method::GET, "/api/v1/blockchain/status", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "UNAVAILABLE");
}

#[tokio::test]
async fn transaction_lookup_validates_hash() {
    let h = harness();
    let (status, _) = h
        .call(Method::GET, "/api/v1/blockchain/transaction/not-a-hash", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/blockchain/transaction/{}", "ab".repeat(32));
    let (status, _) = h.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn extreme_paging_and_values_do_not_break_reads() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, tax) = h.login_as(8, Role::TaxAuthority);
    let (_, owner) = wallet(50);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;

    let (status, body) = h
        .call(Method::GET, "/api/v1/properties?skip=18446744073709551615", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["properties"].as_array().unwrap().len(), 0);
    assert_eq!(body["has_next"], false);
    let (status, _) = h
        .call(Method::GET, "/api/v1/search/properties?skip=18446744073709551615", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    // beyond i64 is refused before anything is stored
    let (status, _) = h
        .call(
            Method::PATCH,
            "/api/v1/properties/1",
            Some(&tax),
            Some(json!({ "value": 9_223_372_036_854_775_808u64 })),
        )
        .await;
    assert!(status.is_client_error());

    for _ in 0..2 {
        let (status, body) = h
            .call(Method::PATCH, "/api/v1/properties/1", Some(&tax), Some(json!({ "value": i64::MAX })))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["value"], i64::MAX);
    }
    h.create(&notary, 2, "Parcel 12, Pikine", &owner, PIKINE).await;

    for uri in [
        "/api/v1/properties/1/geojson",
        "/api/v1/properties/map/bounds?north=15&south=14.5&east=-17&west=-17.5",
        "/api/v1/properties/stats/overview",
        "/api/v1/search/filters/options",
        "/api/v1/search/statistics",
    ] {
        let (status, _) = h.call(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
    }
    let (_, body) = h.call(Method::GET, "/api/v1/search/filters/options", None, None).await;
    assert_eq!(body["value_range"]["max"], i64::MAX);
}

#[tokio::test]
async fn rejected_patch_changes_nothing() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, admin) = h.login_as(3, Role::Admin);
    let (_, tax) = h.login_as(8, Role::TaxAuthority);
    let (_, owner) = wallet(50);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;

    // value is allowed for the tax authority, status is not
    let (status, _) = h
        .call(
            Method::PATCH,
            "/api/v1/properties/1",
            Some(&tax),
            Some(json!({ "value": 1, "status": "FROZEN" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .call(
            Method::PATCH,
            "/api/v1/properties/1",
            Some(&admin),
            Some(json!({
                "coordinates": { "type": "Point", "coordinates": PIKINE },
                "value": 2,
                "status": "TRANSFERRED",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = h.call(Method::GET, "/api/v1/properties/1", None, None).await;
    assert_eq!(body["value"], 5_000_000_000i64);
    assert_eq!(body["status"], "ACTIVE");
    assert_eq!(body["coordinates"]["coordinates"], json!(DAKAR));
    let (_, body) = h.call(Method::GET, "/api/v1/properties/1/history", None, None).await;
    assert_eq!(body["history"].as_array().unwrap().len(), 1);

    let (status, body) = h
        .call(
            Method::PATCH,
            "/api/v1/properties/1",
            Some(&admin),
            Some(json!({ "value": 2, "status": "DISPUTED", "tx_hash": "beef" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["value"], 2);
    assert_eq!(body["status"], "DISPUTED");
    let (_, body) = h.call(Method::GET, "/api/v1/properties/1/history", None, None).await;
    assert_eq!(body["history"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn ledger_locations_keep_their_exact_text() {
    let h = harness();
    let (_, admin) = h.login_as(3, Role::Admin);
    let (_, owner) = wallet(50);

    for (token_id, location) in [(1, "Lot A "), (2, "Lot A")] {
        let event = json!({
            "tx_hash": null,
            "ledger": 100 + token_id,
            "event": { "registered": {
                "token_id": token_id,
                "owner": owner,
                "location": location,
                "coordinates": "14.6937,-17.4441",
                "area": 300.0,
                "value": 0,
                "property_type": "RESIDENTIAL",
            } }
        });
        let (status, body) = h
            .call(Method::POST, "/api/v1/blockchain/events", Some(&admin), Some(event))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["location"], location);
        assert_eq!(body["coordinates"]["coordinates"], json!(DAKAR));
    }

    let (_, body) = h.call(Method::GET, "/api/v1/properties", None, None).await;
    assert_eq!(body["total"], 2);
}

#[tokio::test]
async fn export_downloads_filtered_rows() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (_, owner) = wallet(50);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;
    h.create(&notary, 2, "Quartier Nord, Saint-Louis", &owner, SAINT_LOUIS).await;

    let req = Request::builder()
        .uri("/api/v1/search/export?q=dakar")
        .body(Body::empty())
        .unwrap();
    let resp = h.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/csv");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("token_id,location"));
    assert!(lines[1].starts_with("1,\"Lot 1, Plateau, Dakar\""));

    let (status, body) = h
        .call(Method::GET, "/api/v1/search/export?format=json", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn documents_bulk_verify_and_delete() {
    let h = harness();
    let (_, notary) = h.login_as(2, Role::Notary);
    let (owner, owner_token) = h.login_as(6, Role::Citizen);
    let (_, stranger) = h.login_as(7, Role::Citizen);
    h.create(&notary, 1, "Lot 1, Plateau, Dakar", &owner, DAKAR).await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/documents/upload")
        .header("authorization", format!("Bearer {owner_token}"))
        .header("content-type", "multipart/form-data; boundary=XBOUNDARYX")
        .body(Body::from(multipart_body("XBOUNDARYX", 1, b"boundary survey")))
        .unwrap();
    let (status, doc) = h.send(req).await;
    assert_eq!(status, StatusCode::CREATED, "{doc}");
    let id = doc["id"].as_str().unwrap().to_string();
    let missing = "00000000-0000-0000-0000-000000000000";

    let batch = json!({ "document_ids": [id, missing] });
    let (status, _) = h
        .call(Method::POST, "/api/v1/documents/bulk-verify", Some(&stranger), Some(batch.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = h
        .call(Method::POST, "/api/v1/documents/bulk-verify", Some(&notary), Some(batch))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["results"][0]["status"], "success");
    assert_eq!(body["results"][0]["verification"]["verified"], true);
    assert_eq!(body["results"][1]["status"], "error");

    let uri = format!("/api/v1/documents/{id}");
    let (status, _) = h.call(Method::DELETE, &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = h.call(Method::DELETE, &uri, Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = h.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
