use medcart::api::ApiClient;
use medcart::config::{ApiSettings, Settings};
use medcart::models::{CartStatus, MedicationLine, NewCart, NewOrder, OrderLine, OrderType};
use medcart::stores::{CartsStore, MedicationsStore, OrdersStore};
use medcart::App;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> ApiClient {
    ApiClient::new(&ApiSettings {
        origin: server.uri(),
        ..ApiSettings::default()
    })
    .unwrap()
}

fn cart_json(id: i64, status: &str) -> Value {
    json!({
        "id": id,
        "status": status,
        "patientId": format!("patient-{}", id),
        "operation": "Dekompression",
        "operationDate": "2025-12-05",
        "anaesthesiaType": "General",
        "roomNumber": "OR-3"
    })
}

fn item_json(id: i64, cart_id: i64, medication_id: &str) -> Value {
    json!({
        "id": id,
        "cart_id": cart_id,
        "inventory_id": 1,
        "medication_id": medication_id,
        "time_sensitive": false,
        "amount": 2.0,
        "unit": "mL"
    })
}

async fn mount_get(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn loaded_carts(server: &MockServer) -> CartsStore {
    mount_get(server, "/api/carts", json!([cart_json(1, "Prepared"), cart_json(2, "In-Use")])).await;
    mount_get(
        server,
        "/api/cart-items",
        json!([item_json(10, 1, "m1"), item_json(11, 2, "m2"), item_json(12, 1, "m3")]),
    )
    .await;

    let store = CartsStore::new(api(server));
    store.fetch_carts().await;
    store
}

fn posted_bodies(requests: &[wiremock::Request], route: &str) -> Vec<Value> {
    requests
        .iter()
        .filter(|r| r.url.path() == route)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ===== Carts =====

#[tokio::test]
async fn fetch_carts_attaches_matching_items() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/carts", json!([cart_json(1, "Prepared"), cart_json(2, "In-Use")])).await;
    mount_get(
        &server,
        "/api/cart-items",
        json!([
            item_json(10, 1, "m1"),
            item_json(11, 2, "m2"),
            item_json(12, 1, "m3"),
            item_json(13, 99, "orphan")
        ]),
    )
    .await;

    let store = CartsStore::new(api(&server));
    let carts = store.fetch_carts().await;

    assert_eq!(store.count(), 2);
    assert_eq!(store.error(), None);
    assert!(!store.loading());

    let items: Vec<Vec<i64>> = carts
        .iter()
        .map(|c| c.items.iter().map(|i| i.id).collect())
        .collect();
    assert_eq!(items, vec![vec![10, 12], vec![11]]);
    assert_eq!(store.cart_items().len(), 4);
    assert_eq!(store.carts(), carts);
}

#[tokio::test]
async fn failed_read_resets_list_and_records_error() {
    let server = MockServer::start().await;
    let store = loaded_carts(&server).await;
    assert_eq!(store.count(), 2);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_get(&server, "/api/cart-items", json!([])).await;

    let carts = store.fetch_carts().await;

    assert!(carts.is_empty());
    assert!(store.carts().is_empty());
    assert!(store.cart_items().is_empty());
    assert_eq!(store.error().as_deref(), Some("Failed to fetch carts (500)"));
}

#[tokio::test]
async fn non_array_body_reads_as_empty() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/carts", json!({"carts": []})).await;
    mount_get(&server, "/api/cart-items", json!([])).await;

    let store = CartsStore::new(api(&server));
    store.fetch_carts().await;

    assert_eq!(store.count(), 0);
    assert_eq!(store.error(), None);
}

#[tokio::test]
async fn failed_write_leaves_cache_untouched() {
    let server = MockServer::start().await;
    let store = loaded_carts(&server).await;
    let before = store.carts();

    Mock::given(method("POST"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Room OR-3 is booked"})))
        .mount(&server)
        .await;

    let err = store.add_cart(NewCart::for_patient("p9")).await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "Room OR-3 is booked");
    assert_eq!(store.carts(), before);
    assert_eq!(store.error().as_deref(), Some("Room OR-3 is booked"));
}

#[tokio::test]
async fn write_failure_without_detail_uses_generic_message() {
    let server = MockServer::start().await;
    let store = loaded_carts(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/api/carts/2"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = store.delete_cart(2).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to delete cart (503)");
    assert_eq!(store.count(), 2);
}

#[tokio::test]
async fn successful_write_keeps_earlier_read_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_get(&server, "/api/cart-items", json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json(3, "Prepared")))
        .mount(&server)
        .await;

    let store = CartsStore::new(api(&server));
    store.fetch_carts().await;
    store.add_cart(NewCart::for_patient("patient-3")).await.unwrap();

    assert_eq!(store.count(), 1);
    assert_eq!(store.error().as_deref(), Some("Failed to fetch carts (500)"));
}

#[tokio::test]
async fn add_cart_appends_server_copy() {
    let server = MockServer::start().await;
    let store = loaded_carts(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json(3, "Prepared")))
        .mount(&server)
        .await;

    let created = store.add_cart(NewCart::for_patient("patient-3")).await.unwrap();

    assert_eq!(created.id, 3);
    assert_eq!(store.count(), 3);
    assert_eq!(store.carts().last().map(|c| c.id), Some(3));
}

#[tokio::test]
async fn status_update_replaces_slot_and_keeps_items() {
    let server = MockServer::start().await;
    let store = loaded_carts(&server).await;

    Mock::given(method("PATCH"))
        .and(path("/api/carts/1/status"))
        .and(body_json(json!({"new_status": "Closed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json(1, "Closed")))
        .expect(1)
        .mount(&server)
        .await;

    let updated = store.update_cart_status(1, CartStatus::Closed).await.unwrap();

    assert_eq!(updated.status, CartStatus::Closed);
    let cached = store.get_cart(1).unwrap();
    assert_eq!(cached.status, CartStatus::Closed);
    assert_eq!(cached.items.len(), 2);
    assert_eq!(store.carts()[0].id, 1);
}

#[tokio::test]
async fn delete_cart_removes_by_id() {
    let server = MockServer::start().await;
    let store = loaded_carts(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/api/carts/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "deleted"})))
        .mount(&server)
        .await;

    store.delete_cart(1).await.unwrap();

    assert_eq!(store.count(), 1);
    assert!(store.get_cart(1).is_none());
}

#[tokio::test]
async fn item_writes_rejoin_the_owning_cart() {
    let server = MockServer::start().await;
    let store = loaded_carts(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/cart-items/add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_json(20, 2, "m9")))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/cart-items/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "removed"})))
        .mount(&server)
        .await;

    let request = MedicationLine::new("m9", 2.0).to_request(2).unwrap();
    store.add_cart_item(request).await.unwrap();
    store.delete_cart_item(10).await.unwrap();

    let ids = |cart_id| -> Vec<i64> {
        store.get_cart(cart_id).unwrap().items.iter().map(|i| i.id).collect()
    };
    assert_eq!(ids(1), vec![12]);
    assert_eq!(ids(2), vec![11, 20]);
}

#[tokio::test]
async fn cart_with_medications_attaches_in_order_then_refreshes() {
    let server = MockServer::start().await;
    let store = CartsStore::new(api(&server));

    Mock::given(method("POST"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json(5, "Prepared")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart-items/add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_json(50, 5, "m1")))
        .expect(2)
        .mount(&server)
        .await;
    mount_get(&server, "/api/carts", json!([cart_json(5, "Prepared")])).await;
    mount_get(&server, "/api/cart-items", json!([item_json(50, 5, "m1"), item_json(51, 5, "m2")])).await;

    let lines = vec![
        MedicationLine::new("m1", 2.0),
        MedicationLine {
            amount: 1.0,
            ..MedicationLine::default()
        },
        MedicationLine::new("m2", 4.0),
    ];
    let cart = store
        .add_cart_with_medications(NewCart::for_patient("patient-5"), &lines)
        .await
        .unwrap();

    assert_eq!(cart.id, 5);
    assert_eq!(cart.items.len(), 2);

    let requests = server.received_requests().await.unwrap();
    let attached: Vec<Value> = posted_bodies(&requests, "/api/cart-items/add")
        .into_iter()
        .map(|body| body["medication_id"].clone())
        .collect();
    assert_eq!(attached, vec![json!("m1"), json!("m2")]);
    assert!(posted_bodies(&requests, "/api/cart-items/add")
        .iter()
        .all(|body| body["cart_id"] == json!(5)));
}

#[tokio::test]
async fn failed_attachment_keeps_cart_and_skips_refresh() {
    let server = MockServer::start().await;
    let store = CartsStore::new(api(&server));

    Mock::given(method("POST"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json(7, "Prepared")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart-items/add"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "Out of stock"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let lines = vec![MedicationLine::new("m1", 2.0), MedicationLine::new("m2", 1.0)];
    let err = store
        .add_cart_with_medications(NewCart::for_patient("p1"), &lines)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Out of stock");
    assert_eq!(store.count(), 1);
    assert_eq!(store.get_cart(7).unwrap().patient_id, "patient-7");
    assert_eq!(store.error().as_deref(), Some("Out of stock"));
}

// ===== Medications =====

#[tokio::test]
async fn options_sum_stock_across_records() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/api/medications",
        json!([
            {"medicationId": "relaxant-001", "name": "Midazolam", "dosage": "5 mg/ml"},
            {"medicationId": "opioid-002", "name": "Fentanyl", "dosage": "", "quantity": "10 amp"}
        ]),
    )
    .await;
    mount_get(
        &server,
        "/api/inventory",
        json!([
            {"id": 1, "medicationId": "relaxant-001", "amount": 40, "unit": "mL"},
            {"id": 2, "medicationId": "relaxant-001", "amount": 2.5, "unit": "mL"}
        ]),
    )
    .await;

    let store = MedicationsStore::new(api(&server));
    store.refresh().await;

    let options = store.options();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].label, "Midazolam — 5 mg/ml");
    assert_eq!(options[0].available_amount, 42.5);
    assert_eq!(options[0].unit, "mL");
    assert_eq!(options[1].label, "Fentanyl — 10 amp");
    assert_eq!(options[1].available_amount, 0.0);
    assert_eq!(options[1].unit, "");

    assert_eq!(store.total_available("relaxant-001"), 42.5);
    assert_eq!(store.first_inventory_id("relaxant-001"), Some(1));
    assert_eq!(store.first_inventory_id("opioid-002"), None);
    assert_eq!(store.inventory_for_medication("relaxant-001").len(), 2);
    assert_eq!(store.by_id("opioid-002").unwrap().name, "Fentanyl");
}

#[tokio::test]
async fn inventory_failure_keeps_catalog() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/medications", json!([{"medicationId": "m1", "name": "Propofol"}])).await;
    Mock::given(method("GET"))
        .and(path("/api/inventory"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = MedicationsStore::new(api(&server));
    store.refresh().await;

    assert_eq!(store.medications().len(), 1);
    assert!(store.inventory().is_empty());
    assert_eq!(store.error().as_deref(), Some("Failed to fetch inventory (502)"));
    assert_eq!(store.total_available("m1"), 0.0);
}

// ===== Orders =====

#[tokio::test]
async fn fetched_orders_filter_by_type() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/orders", json!([{"id": "o1", "orderType": "internal", "items": []}])).await;

    let store = OrdersStore::new(api(&server));
    let orders = store.fetch_orders().await;

    assert_eq!(orders.len(), 1);
    assert_eq!(store.orders()[0].id, "o1");
    assert!(store.get_orders_by_type(OrderType::External).is_empty());
    assert_eq!(store.get_orders_by_type(OrderType::Internal).len(), 1);
    assert!(store.get_order("o1").is_some());
}

#[tokio::test]
async fn add_order_sends_provisional_id_and_caches_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "orderType": "external",
            "isRush": true,
            "items": [{"medicationId": "m1", "name": "Propofol", "quantity": 20}]
        })))
        .mount(&server)
        .await;

    let store = OrdersStore::new(api(&server));
    let order = store
        .add_order(NewOrder {
            needed_by: Some("2025-12-10".into()),
            ordered_by: Some("Pharmacy Vendor".into()),
            is_rush: true,
            comment: None,
            items: vec![OrderLine {
                medication_id: "m1".into(),
                name: "Propofol".into(),
                quantity: 20.0,
                ..OrderLine::default()
            }],
            order_type: OrderType::External,
        })
        .await
        .unwrap();

    assert_eq!(order.id, "42");
    assert_eq!(store.count(), 1);

    let requests = server.received_requests().await.unwrap();
    let sent = &posted_bodies(&requests, "/api/orders")[0];
    assert!(sent["id"].as_str().unwrap().starts_with("ord-"));
    assert!(sent["createdAt"].is_string());
    assert_eq!(sent["orderType"], json!("external"));
}

#[tokio::test]
async fn order_submit_keeps_earlier_read_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "orderType": "internal"})))
        .mount(&server)
        .await;

    let store = OrdersStore::new(api(&server));
    store.fetch_orders().await;
    store
        .add_order(NewOrder {
            needed_by: None,
            ordered_by: None,
            is_rush: false,
            comment: None,
            items: Vec::new(),
            order_type: OrderType::Internal,
        })
        .await
        .unwrap();

    assert_eq!(store.count(), 1);
    assert_eq!(store.error().as_deref(), Some("Failed to fetch orders (503)"));
}

#[tokio::test]
async fn remove_order_drops_cached_entry() {
    let server = MockServer::start().await;
    mount_get(
        &server,
        "/api/orders",
        json!([{"id": 1, "orderType": "internal"}, {"id": 2, "orderType": "external"}]),
    )
    .await;
    Mock::given(method("DELETE"))
        .and(path("/api/orders/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"detail": "Order '1' deleted successfully"})))
        .mount(&server)
        .await;

    let store = OrdersStore::new(api(&server));
    store.fetch_orders().await;
    store.remove_order("1").await.unwrap();

    let ids: Vec<String> = store.orders().into_iter().map(|o| o.id).collect();
    assert_eq!(ids, vec!["2".to_string()]);
}

// ===== Bootstrap =====

fn settings(server: &MockServer, prefs: &std::path::Path) -> Settings {
    let mut settings = Settings::default();
    settings.api.origin = server.uri();
    settings.prefs.path = prefs.display().to_string();
    settings
}

#[tokio::test]
async fn init_reports_each_failed_store() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/carts", json!([cart_json(1, "Prepared")])).await;
    mount_get(&server, "/api/cart-items", json!([])).await;
    mount_get(&server, "/api/medications", json!([])).await;
    mount_get(&server, "/api/inventory", json!([])).await;
    Mock::given(method("GET"))
        .and(path("/api/orders"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let app = App::new(settings(&server, &dir.path().join("prefs.json"))).unwrap();
    let report = app.init().await;

    assert!(!report.is_ok());
    assert_eq!(
        report.failures,
        vec![("orders", "Failed to fetch orders (500)".to_string())]
    );
    assert_eq!(app.carts.count(), 1);
    assert_eq!(app.session.current_user().unwrap().name, "Merel");
}

#[tokio::test]
async fn app_fills_inventory_reference_from_stock() {
    let server = MockServer::start().await;
    mount_get(&server, "/api/carts", json!([])).await;
    mount_get(&server, "/api/cart-items", json!([])).await;
    mount_get(&server, "/api/orders", json!([])).await;
    mount_get(&server, "/api/medications", json!([{"medicationId": "m1", "name": "Propofol"}])).await;
    mount_get(
        &server,
        "/api/inventory",
        json!([{"id": 8, "medicationId": "m1", "amount": 5, "unit": "mL"}]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/carts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_json(4, "Prepared")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart-items/add"))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_json(40, 4, "m1")))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let app = App::new(settings(&server, &dir.path().join("prefs.json"))).unwrap();
    assert!(app.init().await.is_ok());

    app.add_cart_with_medications(NewCart::for_patient("patient-4"), vec![MedicationLine::new("m1", 1.0)])
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let sent = &posted_bodies(&requests, "/api/cart-items/add")[0];
    assert_eq!(sent["inventory_id"], json!(8));
}
