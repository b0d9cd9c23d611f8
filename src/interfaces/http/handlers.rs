use super::error::ApiError;
use super::request_id::RequestId;
use crate::application::engine::TransferEngine;
use crate::domain::account::{Account, AccountId, Balance};
use crate::domain::transfer::{TransferId, TransferRecord, TransferRequest};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type SharedEngine = Arc<TransferEngine>;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub account_id: AccountId,
    pub initial_balance: Decimal,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountResponse {
    pub account_id: AccountId,
    pub balance: Balance,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_id: account.id,
            balance: account.balance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferResponse {
    pub transaction_id: TransferId,
    pub source_account_id: AccountId,
    pub destination_account_id: AccountId,
    pub amount: Decimal,
}

impl From<TransferRecord> for TransferResponse {
    fn from(record: TransferRecord) -> Self {
        Self {
            transaction_id: record.id,
            source_account_id: record.source_account_id,
            destination_account_id: record.destination_account_id,
            amount: record.amount,
        }
    }
}

/// POST /api/v1/accounts
pub async fn create_account(
    State(engine): State<SharedEngine>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let Json(request) = payload
        .map_err(|rejection| ApiError::invalid_request(request_id.clone(), rejection.body_text()))?;

    let account = engine
        .create_account(request.account_id, request.initial_balance)
        .await
        .map_err(|err| ApiError::account(request_id, err))?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// GET /api/v1/accounts/{account_id}
pub async fn get_account(
    State(engine): State<SharedEngine>,
    Extension(request_id): Extension<RequestId>,
    path: Result<Path<AccountId>, PathRejection>,
) -> Result<Json<AccountResponse>, ApiError> {
    let Path(account_id) = path
        .map_err(|rejection| ApiError::invalid_request(request_id.clone(), rejection.body_text()))?;

    let account = engine
        .get_account(account_id)
        .await
        .map_err(|err| ApiError::account(request_id, err))?;

    Ok(Json(account.into()))
}

/// POST /api/v1/transactions
pub async fn transfer_money(
    State(engine): State<SharedEngine>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Json<TransferResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|rejection| ApiError::invalid_request(request_id.clone(), rejection.body_text()))?;

    let record = engine
        .transfer(request)
        .await
        .map_err(|err| ApiError::transfer(request_id, err))?;

    Ok(Json(record.into()))
}
