//! 服务层测试

use db_gateway::{
    auth::{password::legacy_digest, AuthError, PasswordHasher, TokenService},
    policy::TableAllowList,
    repository::ResultSet,
    services::{AuthService, GatewayError, GatewayOutput, TableService},
    statement::{Operation, RowPayload, StatementBuilder, ValidationError},
};
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{create_test_config, MemoryCredentials, RecordingExecutor};

fn token_service() -> Arc<TokenService> {
    Arc::new(TokenService::from_config(&create_test_config().security).unwrap())
}

fn auth_service(credentials: MemoryCredentials, hasher: PasswordHasher) -> AuthService {
    AuthService::new(Arc::new(credentials), token_service(), hasher)
}

fn table_service(executor: Arc<RecordingExecutor>) -> TableService {
    TableService::new(
        token_service(),
        Arc::new(TableAllowList::new([("users", "username"), ("products", "product_id")])),
        StatementBuilder::new(["stock_date"]),
        executor,
    )
}

fn payload(value: serde_json::Value) -> RowPayload {
    value.as_object().cloned().unwrap()
}

// ==================== AuthService ====================

#[tokio::test]
async fn test_login_issues_verifiable_token() {
    let service = auth_service(
        MemoryCredentials::default().with_user("alice", "pw"),
        PasswordHasher::new(),
    );

    let token = service.login(Some("alice"), Some("pw")).await.unwrap();
    assert_eq!(token_service().verify(&token), Ok("alice".to_string()));
}

#[tokio::test]
async fn test_login_error_taxonomy() {
    let service = auth_service(
        MemoryCredentials::default().with_user("alice", "pw"),
        PasswordHasher::new(),
    );

    assert_eq!(service.login(None, Some("pw")).await, Err(AuthError::MissingFields));
    assert_eq!(service.login(Some("alice"), Some("")).await, Err(AuthError::MissingFields));
    assert_eq!(service.login(Some("bob"), Some("pw")).await, Err(AuthError::UserNotFound));
    assert_eq!(
        service.login(Some("alice"), Some("PW")).await,
        Err(AuthError::InvalidCredentials)
    );

    let down = auth_service(MemoryCredentials::unavailable(), PasswordHasher::new());
    assert_eq!(down.login(Some("alice"), Some("pw")).await, Err(AuthError::Backend));
}

#[tokio::test]
async fn test_login_with_legacy_digest() {
    let credentials = || MemoryCredentials::default().with_digest("carol", &legacy_digest("pw"));

    let strict = auth_service(credentials(), PasswordHasher::new());
    assert_eq!(
        strict.login(Some("carol"), Some("pw")).await,
        Err(AuthError::InvalidCredentials)
    );

    let migrating = auth_service(
        credentials(),
        PasswordHasher::new().accept_legacy_digests(true),
    );
    assert!(migrating.login(Some("carol"), Some("pw")).await.is_ok());
}

// ==================== TableService ====================

#[tokio::test]
async fn test_token_checked_before_table() {
    let executor = Arc::new(RecordingExecutor::default());
    let service = table_service(executor.clone());

    let err = service
        .execute(Operation::Select, "garbage", Some("nope"), None)
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Unauthorized);
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn test_validation_order() {
    let executor = Arc::new(RecordingExecutor::default());
    let service = table_service(executor.clone());
    let token = token_service().issue("alice").unwrap();

    assert_eq!(
        service.execute(Operation::Select, &token, None, None).await,
        Err(GatewayError::MissingFields)
    );
    assert_eq!(
        service.execute(Operation::Select, &token, Some("Users"), None).await,
        Err(GatewayError::InvalidTable)
    );
    assert_eq!(
        service.execute(Operation::Insert, &token, Some("users"), None).await,
        Err(GatewayError::MissingFields)
    );
    assert_eq!(
        service
            .execute(Operation::Delete, &token, Some("users"), Some(&RowPayload::new()))
            .await,
        Err(GatewayError::Validation(ValidationError::EmptyPayload))
    );
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn test_select_shapes_rows() {
    let executor = Arc::new(RecordingExecutor::returning(ResultSet {
        columns: vec!["product_id".to_string(), "name".to_string()],
        rows: vec![vec![json!(1), json!("Desk")], vec![json!(2), json!("Chair")]],
    }));
    let service = table_service(executor);
    let token = token_service().issue("alice").unwrap();

    let output = service
        .execute(Operation::Select, &token, Some("products"), None)
        .await
        .unwrap();

    match output {
        GatewayOutput::Rows(rows) => {
            assert_eq!(rows.len(), 2);
            assert_eq!(rows[1]["name"], "Chair");
            assert_eq!(rows[0].keys().next().map(String::as_str), Some("product_id"));
        }
        other => panic!("unexpected output: {:?}", other),
    }
}

#[tokio::test]
async fn test_write_returns_ack() {
    let executor = Arc::new(RecordingExecutor::default());
    let service = table_service(executor.clone());
    let token = token_service().issue("alice").unwrap();
    let data = payload(json!({"username": "dave", "stock_date": "2024-01-01"}));

    let output = service
        .execute(Operation::Insert, &token, Some("users"), Some(&data))
        .await
        .unwrap();

    assert_eq!(output, GatewayOutput::Ack { rows_affected: 1 });
    assert_eq!(
        executor.statements()[0].sql,
        "INSERT INTO users (username, stock_date) VALUES ($1, TO_DATE($2, 'YYYY-MM-DD'))"
    );
}

#[tokio::test]
async fn test_executor_failure_maps_to_execution_failed() {
    let service = table_service(Arc::new(RecordingExecutor::failing()));
    let token = token_service().issue("alice").unwrap();
    let data = payload(json!({"username": "dave"}));

    assert_eq!(
        service
            .execute(Operation::Delete, &token, Some("users"), Some(&data))
            .await,
        Err(GatewayError::ExecutionFailed)
    );
}

#[tokio::test]
async fn test_write_casts_parameters_to_column_types() {
    let executor = Arc::new(
        RecordingExecutor::default()
            .with_column_types(&[("product_id", "integer"), ("price", "numeric")]),
    );
    let service = table_service(executor.clone());
    let token = token_service().issue("alice").unwrap();
    let data = payload(json!({"product_id": "3", "price": null, "stock_date": "2024-01-01"}));

    service
        .execute(Operation::Update, &token, Some("products"), Some(&data))
        .await
        .unwrap();

    assert_eq!(
        executor.statements()[0].sql,
        "UPDATE products SET price = CAST($1 AS numeric), stock_date = TO_DATE($2, 'YYYY-MM-DD') \
         WHERE product_id = CAST($3 AS integer)"
    );
}

#[tokio::test]
async fn test_select_does_not_cast() {
    let executor = Arc::new(RecordingExecutor::default().with_column_types(&[("product_id", "integer")]));
    let service = table_service(executor.clone());
    let token = token_service().issue("alice").unwrap();

    service
        .execute(Operation::Select, &token, Some("products"), None)
        .await
        .unwrap();

    assert_eq!(executor.statements()[0].sql, "SELECT * FROM products");
}
