//! REST API server example for the back-office workflow engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /api/transactions` - Teller creates a transaction
//! - `GET  /api/transactions` - Filtered, paginated list
//! - `PUT  /api/transactions` - Generic status transition (reject, complete, delete request)
//! - `POST /api/transactions/update-real-amount` - Auditor validation
//! - `POST /api/transactions/execute` - Execution with receipt proof
//! - `POST /api/transactions/complete-all` - Bulk completion for a cashier
//! - `DELETE /api/transactions/{id}` - Deletion request
//! - `POST /api/transactions/{id}/validate-delete` - Deletion approval
//! - `GET/POST/PUT /api/ria-cash-declarations` - Cash declaration workflow
//! - `GET/POST/PUT /api/expenses` - Petty-cash expense reviews
//! - `GET  /api/settings?type=public` - Public commission settings
//! - `POST /api/receipt/generate` - Issue an international transfer receipt
//! - `GET  /api/receipts?search=` - Receipt history
//!
//! Session handling is out of scope: the acting identity travels in the
//! request body (or query for DELETE), exactly as a gateway would inject it.
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST http://localhost:3000/api/transactions \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": "tx-1", "kind": "transfer", "amount": "250000", "currency": "XAF",
//!        "agency": "Douala Akwa", "actor": "alice", "role": "cashier"}'
//!
//! curl -X POST http://localhost:3000/api/transactions/update-real-amount \
//!   -H "Content-Type: application/json" \
//!   -d '{"transactionId": "tx-1", "realAmountEUR": "380", "validatedBy": "bob"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use guichet_rs::{
    Actor, CommissionConfig, DeclarationBook, DeclarationDraft, DeclarationId, DeclarationStatus,
    DeclarationUpdate, Engine, EventBus, ExpenseBook, ExpenseDraft, ExpenseId, ExpenseStatus,
    RateBoard, ReceiptHistory, ReceiptTotals, ReceiptUpload, Role, TransactionDraft,
    TransactionFilter, TransactionId, TransactionStatus, WorkflowError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
struct CreateTransactionRequest {
    #[serde(flatten)]
    draft: TransactionDraft,
    actor: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct StatusUpdateRequest {
    id: TransactionId,
    status: TransactionStatus,
    #[serde(default)]
    expected_status: Option<TransactionStatus>,
    #[serde(default)]
    rejection_reason: Option<String>,
    actor: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    transaction_id: TransactionId,
    #[serde(rename = "realAmountEUR")]
    real_amount_eur: Decimal,
    validated_by: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    transaction_id: TransactionId,
    receipt_file_name: String,
    receipt_size: u64,
    #[serde(default)]
    executor_comment: Option<String>,
    #[serde(default)]
    executed_by: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

#[derive(Debug, Deserialize)]
struct CompleteAllRequest {
    cashier: String,
}

#[derive(Debug, Deserialize)]
struct ActorQuery {
    actor: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct CreateDeclarationRequest {
    #[serde(flatten)]
    draft: DeclarationDraft,
    actor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DeclarationAction {
    Submit,
    Validate,
    Reject,
    Correct,
    Update,
}

#[derive(Debug, Deserialize)]
struct DeclarationActionRequest {
    id: DeclarationId,
    action: DeclarationAction,
    actor: String,
    role: Role,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    data: Option<DeclarationUpdate>,
}

#[derive(Debug, Deserialize)]
struct DeclarationListQuery {
    /// `pending`, `all` (default), or `stats`.
    #[serde(default, rename = "type")]
    view: Option<String>,
    #[serde(default)]
    guichetier: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateExpenseRequest {
    #[serde(flatten)]
    draft: ExpenseDraft,
    actor: String,
}

#[derive(Debug, Deserialize)]
struct ExpenseStatusUpdateRequest {
    id: ExpenseId,
    status: ExpenseStatus,
    #[serde(default)]
    rejection_reason: Option<String>,
    actor: String,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct ExpenseListQuery {
    #[serde(default)]
    status: Option<ExpenseStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateReceiptRequest {
    beneficiary: String,
    amount_received: Decimal,
    #[serde(default)]
    commission_rate: Option<Decimal>,
    issued_by: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

// === Application State ===

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    declarations: Arc<DeclarationBook>,
    expenses: Arc<ExpenseBook>,
    receipts: Arc<ReceiptHistory>,
    config: CommissionConfig,
}

// === Error Handling ===

struct AppError(WorkflowError);

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            WorkflowError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
            WorkflowError::ActionNotAvailable { .. } => {
                (StatusCode::CONFLICT, "ACTION_NOT_AVAILABLE")
            }
            WorkflowError::StaleStatus { .. } => (StatusCode::CONFLICT, "STALE_STATUS"),
            WorkflowError::InvalidDeclarationTransition { .. } => {
                (StatusCode::CONFLICT, "INVALID_DECLARATION_TRANSITION")
            }
            WorkflowError::NotAuthorized { .. } => (StatusCode::FORBIDDEN, "NOT_AUTHORIZED"),
            WorkflowError::NotOwner => (StatusCode::FORBIDDEN, "NOT_OWNER"),
            WorkflowError::TransactionNotFound => {
                (StatusCode::NOT_FOUND, "TRANSACTION_NOT_FOUND")
            }
            WorkflowError::DeclarationNotFound => {
                (StatusCode::NOT_FOUND, "DECLARATION_NOT_FOUND")
            }
            WorkflowError::ReceiptNotFound => (StatusCode::NOT_FOUND, "RECEIPT_NOT_FOUND"),
            WorkflowError::DuplicateTransaction => {
                (StatusCode::CONFLICT, "DUPLICATE_TRANSACTION")
            }
            WorkflowError::DuplicateDeclaration => {
                (StatusCode::CONFLICT, "DUPLICATE_DECLARATION")
            }
            WorkflowError::DuplicateReceipt => (StatusCode::CONFLICT, "DUPLICATE_RECEIPT"),
            WorkflowError::DeclarationNotEditable => {
                (StatusCode::CONFLICT, "DECLARATION_NOT_EDITABLE")
            }
            WorkflowError::ExpenseNotFound => (StatusCode::NOT_FOUND, "EXPENSE_NOT_FOUND"),
            WorkflowError::DuplicateExpense => (StatusCode::CONFLICT, "DUPLICATE_EXPENSE"),
            WorkflowError::InvalidExpenseTransition { .. } => {
                (StatusCode::CONFLICT, "INVALID_EXPENSE_TRANSITION")
            }
            WorkflowError::InvalidRealAmount => (StatusCode::BAD_REQUEST, "INVALID_REAL_AMOUNT"),
            WorkflowError::InvalidAmount => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            WorkflowError::MissingRejectionReason => {
                (StatusCode::BAD_REQUEST, "MISSING_REJECTION_REASON")
            }
            WorkflowError::MissingComment => (StatusCode::BAD_REQUEST, "MISSING_COMMENT"),
            WorkflowError::MissingReceipt => (StatusCode::BAD_REQUEST, "MISSING_RECEIPT"),
            WorkflowError::ReceiptTooLarge => (StatusCode::BAD_REQUEST, "RECEIPT_TOO_LARGE"),
            WorkflowError::UnsupportedReceiptType { .. } => {
                (StatusCode::BAD_REQUEST, "UNSUPPORTED_RECEIPT_TYPE")
            }
            WorkflowError::InvalidRate => (StatusCode::BAD_REQUEST, "INVALID_RATE"),
        };

        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Transaction Handlers ===

async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::new(request.actor, request.role);
    let tx = state.engine.create(request.draft, &actor)?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "data": tx }))))
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(filter): Query<TransactionFilter>,
) -> Json<serde_json::Value> {
    let page = state.engine.list(&filter);
    Json(json!({ "ok": true, "data": page.data, "total": page.total }))
}

async fn update_transaction_status(
    State(state): State<AppState>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(request.actor, request.role);
    let tx = state.engine.transition(
        &request.id,
        request.expected_status,
        request.status,
        &actor,
        request.rejection_reason.as_deref(),
    )?;
    Ok(Json(json!({ "ok": true, "data": tx })))
}

async fn update_real_amount(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(request.validated_by, Role::Auditor);
    let tx = state
        .engine
        .validate(&request.transaction_id, &actor, request.real_amount_eur)?;
    Ok(Json(json!({
        "transaction": tx,
        "message": "transaction validated"
    })))
}

async fn execute_transaction(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(
        request.executed_by.unwrap_or_else(|| "executor".to_string()),
        request.role.unwrap_or(Role::Executor),
    );
    let upload = ReceiptUpload::new(request.receipt_file_name, request.receipt_size);
    state.engine.execute(
        &request.transaction_id,
        &actor,
        &upload,
        request.executor_comment,
    )?;
    Ok(Json(json!({ "ok": true, "message": "transaction executed" })))
}

async fn complete_all(
    State(state): State<AppState>,
    Json(request): Json<CompleteAllRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(request.cashier, Role::Cashier);
    let outcome = state.engine.complete_all(&actor)?;
    Ok(Json(json!({
        "ok": outcome.is_full_success(),
        "completed": outcome.completed,
        "failed": outcome.failure_count(),
    })))
}

async fn request_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(query.actor, query.role);
    let tx = state
        .engine
        .request_delete(&TransactionId(id), &actor)?;
    Ok(Json(json!({ "ok": true, "status": tx.status })))
}

async fn validate_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(query): Json<ActorQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(query.actor, query.role);
    state.engine.approve_delete(&TransactionId(id), &actor)?;
    Ok(Json(json!({ "ok": true, "message": "transaction deleted" })))
}

// === Cash Declaration Handlers ===

async fn list_declarations(
    State(state): State<AppState>,
    Query(query): Query<DeclarationListQuery>,
) -> Json<serde_json::Value> {
    match query.view.as_deref() {
        Some("stats") => Json(json!({ "ok": true, "data": state.declarations.stats() })),
        Some("pending") => {
            let data = state
                .declarations
                .list(Some(DeclarationStatus::Submitted), query.guichetier.as_deref());
            Json(json!({ "ok": true, "data": data }))
        }
        _ => {
            let data = state.declarations.list(None, query.guichetier.as_deref());
            Json(json!({ "ok": true, "data": data }))
        }
    }
}

async fn create_declaration(
    State(state): State<AppState>,
    Json(request): Json<CreateDeclarationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::new(request.actor, Role::Cashier);
    let declaration = state.declarations.create(request.draft, &actor)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "data": declaration })),
    ))
}

async fn dispatch_declaration_action(
    State(state): State<AppState>,
    Json(request): Json<DeclarationActionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(request.actor, request.role);
    let declaration = match request.action {
        DeclarationAction::Submit => state.declarations.submit(&request.id, &actor)?,
        DeclarationAction::Validate => {
            state
                .declarations
                .validate(&request.id, &actor, request.comment)?
        }
        DeclarationAction::Reject => state.declarations.reject(
            &request.id,
            &actor,
            request.comment.as_deref().unwrap_or_default(),
        )?,
        DeclarationAction::Correct => {
            state
                .declarations
                .request_correction(&request.id, &actor, request.comment)?
        }
        DeclarationAction::Update => state.declarations.update(
            &request.id,
            &actor,
            request.data.unwrap_or_default(),
        )?,
    };
    Ok(Json(json!({ "ok": true, "data": declaration })))
}

// === Expense Handlers ===

async fn list_expenses(
    State(state): State<AppState>,
    Query(query): Query<ExpenseListQuery>,
) -> Json<serde_json::Value> {
    let data = state.expenses.list(query.status);
    Json(json!({ "ok": true, "data": data }))
}

async fn create_expense(
    State(state): State<AppState>,
    Json(request): Json<CreateExpenseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor::new(request.actor, Role::Cashier);
    let expense = state.expenses.create(request.draft, &actor)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "data": expense })),
    ))
}

async fn update_expense_status(
    State(state): State<AppState>,
    Json(request): Json<ExpenseStatusUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = Actor::new(request.actor, request.role);
    let expense = state.expenses.set_status(
        &request.id,
        &actor,
        request.status,
        request.rejection_reason.as_deref(),
    )?;
    Ok(Json(json!({ "ok": true, "data": expense })))
}

// === Settings & Receipt Handlers ===

async fn public_settings(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "data": {
            "settings": {
                "commission_international_pct": state.config.international_pct,
            },
            "eur_to_xaf": state.engine.rates().current(),
        }
    }))
}

async fn generate_receipt(
    State(state): State<AppState>,
    Json(request): Json<GenerateReceiptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let rate = request
        .commission_rate
        .unwrap_or(state.config.international_pct);
    let totals = ReceiptTotals::compute(request.amount_received, rate)?;
    let receipt = state
        .receipts
        .issue(request.beneficiary, totals, request.issued_by)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "data": receipt })),
    ))
}

async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Json<serde_json::Value> {
    let data = state.receipts.search(query.search.as_deref().unwrap_or(""));
    Json(json!({ "ok": true, "data": data }))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/transactions",
            get(list_transactions)
                .post(create_transaction)
                .put(update_transaction_status),
        )
        .route("/api/transactions/update-real-amount", post(update_real_amount))
        .route("/api/transactions/execute", post(execute_transaction))
        .route("/api/transactions/complete-all", post(complete_all))
        .route("/api/transactions/{id}", delete(request_delete))
        .route("/api/transactions/{id}/validate-delete", post(validate_delete))
        .route(
            "/api/ria-cash-declarations",
            get(list_declarations)
                .post(create_declaration)
                .put(dispatch_declaration_action),
        )
        .route(
            "/api/expenses",
            get(list_expenses)
                .post(create_expense)
                .put(update_expense_status),
        )
        .route("/api/settings", get(public_settings))
        .route("/api/receipt/generate", post(generate_receipt))
        .route("/api/receipts", get(list_receipts))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let bus = Arc::new(EventBus::new());
    let rates = Arc::new(RateBoard::new(dec!(655.957)).expect("peg rate is positive"));
    let config = CommissionConfig::default();
    let state = AppState {
        engine: Arc::new(Engine::new(rates, config.clone(), bus.clone())),
        declarations: Arc::new(DeclarationBook::new(bus)),
        expenses: Arc::new(ExpenseBook::new()),
        receipts: Arc::new(ReceiptHistory::new()),
        config,
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    println!("Back-office API server running on http://127.0.0.1:3000");

    axum::serve(listener, app).await.unwrap();
}
