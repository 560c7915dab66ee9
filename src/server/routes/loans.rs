//! Borrow, return and extend, plus loan listings.
//!
//! Notifications are written after the loan transaction commits; a failed
//! write is logged and never undoes the loan.

use crate::auth::Operation;
use crate::loans::{DateRange, LibraryStats};
use crate::models::{Loan, LoanView};
use crate::notify::messages;
use crate::server::{ApiError, AppState, Caller};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/loans", get(list_loans_handler).post(borrow_handler))
        .route("/loans/overdue", get(overdue_handler))
        .route("/loans/{id}/return", post(return_handler))
        .route("/loans/{id}/extend", post(extend_handler))
        .route("/stats", get(stats_handler))
}

#[derive(Debug, Default, Deserialize)]
struct LoanFilter {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BorrowRequest {
    book_id: i64,
    #[serde(default)]
    duration: i64,
}

async fn book_title(state: &AppState, book_id: i64) -> String {
    match state.books.get(book_id).await {
        Ok(book) => book.title,
        Err(_) => messages::FALLBACK_TITLE.to_string(),
    }
}

/// GET /api/loans?start_date=&end_date=
///
/// Admins see every loan, members only their own. The date filter applies
/// to the admin listing and is ignored unless both dates parse.
async fn list_loans_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Query(filter): Query<LoanFilter>,
) -> Result<Json<Vec<LoanView>>, ApiError> {
    if caller.identity.is_admin() {
        caller.authorize(Operation::ListAllLoans)?;
        let range = DateRange::parse(filter.start_date.as_deref(), filter.end_date.as_deref());
        return Ok(Json(state.loans.list_all_loans(range).await?));
    }

    let me = caller.authorize(Operation::ListOwnLoans)?;
    Ok(Json(state.loans.list_loans_for_user(me.user_id).await?))
}

/// POST /api/loans
async fn borrow_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<BorrowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let me = caller.authorize(Operation::Borrow)?;
    let loan = state.loans.borrow(me.user_id, req.book_id, req.duration).await?;
    state.metrics.loans_borrowed.inc();

    let title = book_title(&state, loan.book_id).await;
    state
        .notifications
        .emit(loan.user_id, &messages::borrowed(&title, loan.due_date))
        .await;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// GET /api/loans/overdue
async fn overdue_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<LoanView>>, ApiError> {
    let me = caller.authorize(Operation::ListOwnLoans)?;
    Ok(Json(state.loans.list_overdue_for_user(me.user_id).await?))
}

/// POST /api/loans/{id}/return
async fn return_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Loan>, ApiError> {
    caller.authorize(Operation::ReturnLoan)?;
    let loan = state.loans.return_loan(id).await?;
    state.metrics.loans_returned.inc();

    let title = book_title(&state, loan.book_id).await;
    state
        .notifications
        .emit(loan.user_id, &messages::returned(&title, loan.fine))
        .await;

    Ok(Json(loan))
}

/// POST /api/loans/{id}/extend
async fn extend_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<i64>,
) -> Result<Json<Loan>, ApiError> {
    let me = caller.authorize(Operation::ExtendLoan)?;
    let loan = state.loans.extend(me, id).await?;
    state.metrics.loans_extended.inc();
    Ok(Json(loan))
}

/// GET /api/stats
async fn stats_handler(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<LibraryStats>, ApiError> {
    caller.authorize(Operation::ViewStats)?;
    Ok(Json(state.loans.stats().await?))
}
